/// The Ariadne string: moves a character has taken since entering the maze.
///
/// Stored oldest-first internally; `iter()` yields most-recent-first.
/// Every move is recorded, `Stay` included. Before recording, a trail
/// whose two most recent moves cancel out (`N,S`, `E,W`, ...) drops both,
/// so a dead end walked in and out folds away one step late.

use super::compass::Compass;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Trail {
    moves: Vec<Compass>,
}

impl Trail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a move. Returns true when a cancelling pair was dropped first.
    pub fn push(&mut self, dir: Compass) -> bool {
        let folded = self.can_go_back();
        if folded {
            self.moves.truncate(self.moves.len() - 2);
        }
        self.moves.push(dir);
        folded
    }

    /// Most recent move.
    #[cfg(test)]
    pub fn last(&self) -> Option<Compass> {
        self.moves.last().copied()
    }

    /// Do the two most recent moves cancel out?
    pub fn can_go_back(&self) -> bool {
        match self.moves.as_slice() {
            [.., older, newer] => newer.is_cardinal() && *older == newer.opposite(),
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn clear(&mut self) {
        self.moves.clear();
    }

    /// Most recent first.
    pub fn iter(&self) -> impl Iterator<Item = Compass> + '_ {
        self.moves.iter().rev().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    use crate::domain::compass::Compass::{East, North, South, Stay, West};

    fn trail_of(moves: &[Compass]) -> Trail {
        let mut t = Trail::new();
        for m in moves {
            t.push(*m);
        }
        t
    }

    fn listed(t: &Trail) -> Vec<Compass> {
        t.iter().collect()
    }

    #[test]
    fn stay_is_recorded() {
        let mut t = Trail::new();
        assert!(t.is_empty());
        t.push(Stay);
        t.push(Stay);
        assert_eq!(listed(&t), vec![Stay, Stay]);
    }

    #[test]
    fn a_fresh_reversal_is_kept_until_the_next_move() {
        let mut t = trail_of(&[East]);
        assert!(!t.push(West));
        assert_eq!(listed(&t), vec![West, East]);
        assert!(t.can_go_back());

        assert!(t.push(Stay));
        assert_eq!(listed(&t), vec![Stay]);
    }

    #[test]
    fn folding_keeps_older_moves() {
        let mut t = trail_of(&[East, East, South, North]);
        assert!(t.push(East));
        assert_eq!(listed(&t), vec![East, East, East]);
    }

    #[test]
    fn iter_is_most_recent_first() {
        let t = trail_of(&[North, East, South]);
        assert_eq!(listed(&t), vec![South, East, North]);
        assert_eq!(t.last(), Some(South));
    }

    #[test]
    fn stay_pairs_never_fold() {
        let t = trail_of(&[Stay, Stay, Stay]);
        assert!(!t.can_go_back());
        assert_eq!(t.len(), 3);
    }

    fn any_move() -> impl Strategy<Value = Compass> {
        prop::sample::select(vec![North, East, South, West, Stay])
    }

    proptest! {
        #[test]
        fn backtrack_law(history in prop::collection::vec(any_move(), 0..40), next in any_move()) {
            let mut t = trail_of(&history);
            let before: Vec<Compass> = listed(&t);
            let cancels = before.len() >= 2
                && before[0].is_cardinal()
                && before[1] == before[0].opposite();

            let folded = t.push(next);

            prop_assert_eq!(folded, cancels);
            prop_assert_eq!(t.last(), Some(next));
            let rest = if cancels { &before[2..] } else { &before[..] };
            prop_assert_eq!(&listed(&t)[1..], rest);
        }

        #[test]
        fn only_the_newest_pair_can_cancel(history in prop::collection::vec(any_move(), 0..60)) {
            let t = trail_of(&history);
            let v = listed(&t);
            // Below the newest pair, every adjacent pair was checked on the push after it.
            for w in v.windows(2).skip(1) {
                prop_assert!(!(w[0].is_cardinal() && w[1] == w[0].opposite()));
            }
        }
    }
}
