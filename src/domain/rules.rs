/// Movement legality and cheat detection, truth-table driven.
///
/// Pure functions over the grid, no side effects. These encode
/// "what is legal" without performing the move.
///
/// ## Step Truth Table
///
/// ┌──────────────────────────────┬────────┐
/// │ Condition                     │ Allow? │
/// ├──────────────────────────────┼────────┤
/// │ direction not N/E/S/W         │ DENY   │
/// │ target cell off the grid      │ DENY   │
/// │ target is Wall                │ DENY   │
/// │ target is Player / Minotaur   │ DENY   │
/// │ target is Path / Exit / Dead  │ ALLOW  │
/// └──────────────────────────────┴────────┘
///
/// ## Proposal Truth Table
///
/// ┌──────────────────────────────┬──────────┐
/// │ Proposed move                 │ Verdict  │
/// ├──────────────────────────────┼──────────┤
/// │ Stay                          │ valid    │
/// │ cardinal, flag set            │ valid    │
/// │ cardinal, flag clear          │ cheat    │
/// │ diagonal                      │ cheat    │
/// └──────────────────────────────┴──────────┘

use super::compass::{Compass, Pos};
use super::map::Map;

/// Can a character at `pos` take one step towards `dir`?
pub fn can_go(map: &Map, pos: Pos, dir: Compass) -> bool {
    map.neighbour(pos, dir)
        .and_then(|next| map.get(next))
        .is_some_and(|sym| sym.is_walkable())
}

/// The four legality flags handed to an AI each round.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Openings {
    pub north: bool,
    pub east: bool,
    pub south: bool,
    pub west: bool,
}

impl Openings {
    /// Fresh flags for `pos`, computed against the current grid.
    pub fn sense(map: &Map, pos: Pos) -> Self {
        Openings {
            north: can_go(map, pos, Compass::North),
            east: can_go(map, pos, Compass::East),
            south: can_go(map, pos, Compass::South),
            west: can_go(map, pos, Compass::West),
        }
    }

    pub fn allows(self, dir: Compass) -> bool {
        match dir {
            Compass::North => self.north,
            Compass::East => self.east,
            Compass::South => self.south,
            Compass::West => self.west,
            _ => false,
        }
    }

    pub fn any(self) -> bool {
        self.north || self.east || self.south || self.west
    }

    /// Open cardinal directions, clockwise from North.
    pub fn open(self) -> impl Iterator<Item = Compass> {
        Compass::CARDINALS.into_iter().filter(move |d| self.allows(*d))
    }
}

/// Is `dir` an honest answer to `openings`?
pub fn is_valid_move(dir: Compass, openings: Openings) -> bool {
    dir == Compass::Stay || openings.allows(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_from(rows: &[&str]) -> Map {
        Map::parse(rows).unwrap()
    }

    #[test]
    fn walls_and_occupants_block() {
        let m = map_from(&[
            "*.*",
            "&@+",
            "*?*",
        ]);
        let o = Openings::sense(&m, Pos::new(1, 1));
        assert!(o.north);
        assert!(o.east);
        assert!(o.south);
        assert!(!o.west);
    }

    #[test]
    fn grid_edge_blocks() {
        let m = map_from(&["@."]);
        let o = Openings::sense(&m, Pos::new(0, 0));
        assert_eq!(o, Openings { north: false, east: true, south: false, west: false });
        assert!(!can_go(&m, Pos::new(1, 0), Compass::East));
    }

    #[test]
    fn diagonals_never_legal() {
        let m = map_from(&["...", ".@.", "..."]);
        assert!(!can_go(&m, Pos::new(1, 1), Compass::NorthEast));
        assert!(!can_go(&m, Pos::new(1, 1), Compass::Stay));
    }

    #[test]
    fn stay_is_always_valid() {
        let closed = Openings::default();
        assert!(is_valid_move(Compass::Stay, closed));
        assert!(!is_valid_move(Compass::North, closed));
        assert!(!closed.any());
    }

    #[test]
    fn proposal_verdicts() {
        let o = Openings { north: true, east: false, south: true, west: false };
        assert!(is_valid_move(Compass::North, o));
        assert!(!is_valid_move(Compass::East, o));
        assert!(!is_valid_move(Compass::SouthEast, o));
        assert_eq!(o.open().collect::<Vec<_>>(), vec![Compass::North, Compass::South]);
    }
}
