/// Events emitted during a round.
/// The presentation layer consumes these for fight animations and logs.

use crate::domain::compass::{Compass, Pos};
use crate::domain::entity::{Fate, Role};

/// A character, addressed by role and setup order.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct Who {
    pub role: Role,
    pub index: usize,
}

impl Who {
    pub fn theseus(index: usize) -> Self {
        Who { role: Role::Theseus, index }
    }

    pub fn minotaur(index: usize) -> Self {
        Who { role: Role::Minotaur, index }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FightOutcome {
    Draw,
    Winner(Who),
}

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    RoundStarted { step: u64 },
    FightStarted { a: Who, b: Who, health_a: f64, health_b: f64 },
    /// One exchange of blows. Healths are as shown on this frame.
    FightTick { a: Who, b: Who, tick: usize, health_a: f64, health_b: f64 },
    FightEnded { a: Who, b: Who, health_a: f64, health_b: f64, outcome: FightOutcome },
    MoveRefused { who: Who, dir: Compass },
    Cheated { who: Who, dir: Compass },
    Died { who: Who, pos: Pos, fate: Fate },
    Exited { who: Who, pos: Pos, fate: Fate },
}
