/// End-of-game classification.
///
/// ## Player Decision Table (first match wins)
///
/// ┌─────────────────────────────────────────┬──────────────────────┐
/// │ Condition                                │ Ending               │
/// ├─────────────────────────────────────────┼──────────────────────┤
/// │ player exited, final level               │ WinAndAlive          │
/// │ player exited, not final                 │ NextLevelAndAlive    │
/// │ some player alive, not final             │ NextLevelButDead     │
/// │ some player alive, no Minotaur alive     │ WinButDead           │
/// │ some player alive, Minotaur alive        │ Loose                │
/// │ nobody alive, no Minotaur, final level   │ KillMinotaurButDead  │
/// │ otherwise                                │ Loose                │
/// └─────────────────────────────────────────┴──────────────────────┘
///
/// Exited players still count as alive.

use crate::domain::entity::Fate;
use crate::sim::world::Census;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Ending {
    Loose,
    NextLevelAndAlive,
    NextLevelButDead,
    WinAndAlive,
    KillMinotaurButDead,
    WinButDead,
    GmWin,
    GmLoose,
}

/// Which big banner goes under the ending line.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Banner {
    GameOver,
    Congratulations,
    TryAgain,
}

impl Ending {
    /// Line shown above the banner. Some endings only get the banner.
    pub fn message(self) -> Option<&'static str> {
        match self {
            Ending::Loose => Some("It is a complete failure!"),
            Ending::NextLevelButDead => Some("At least, some teammates found a path to the next level!"),
            Ending::GmWin => Some("You defeat them all!"),
            Ending::GmLoose => Some("Some players escaped your evil plan!"),
            Ending::KillMinotaurButDead => Some("At least, the Minotaur is dead!"),
            Ending::WinButDead => Some("At least, the Minotaur is dead and some teammates survived!"),
            Ending::NextLevelAndAlive | Ending::WinAndAlive => None,
        }
    }

    pub fn banner(self) -> Banner {
        match self {
            Ending::Loose | Ending::GmLoose => Banner::GameOver,
            Ending::NextLevelAndAlive | Ending::WinAndAlive | Ending::GmWin => Banner::Congratulations,
            Ending::NextLevelButDead | Ending::KillMinotaurButDead | Ending::WinButDead => Banner::TryAgain,
        }
    }
}

/// The Game Master wins when no player is left alive.
pub fn gm_ending(census: &Census) -> Ending {
    if census.players_alive > 0 {
        Ending::GmLoose
    } else {
        Ending::GmWin
    }
}

pub fn player_ending(exited: bool, census: &Census, final_level: bool) -> Ending {
    if exited {
        if final_level {
            Ending::WinAndAlive
        } else {
            Ending::NextLevelAndAlive
        }
    } else if census.players_alive > 0 {
        if !final_level {
            Ending::NextLevelButDead
        } else if census.minotaurs_alive == 0 {
            Ending::WinButDead
        } else {
            Ending::Loose
        }
    } else if census.minotaurs_alive == 0 && final_level {
        Ending::KillMinotaurButDead
    } else {
        Ending::Loose
    }
}

/// Personal message for a character's fate. Fight deaths are told by
/// the fight itself.
pub fn fate_message(fate: Fate) -> Option<&'static str> {
    match fate {
        Fate::KilledByMinotaur | Fate::SlainByTheseus => None,
        Fate::StarveNoMinotaur => Some("You are exhausted...\n...You starve!"),
        Fate::StarveMinotaur => {
            Some("You are exhausted...\n...The Minotaur finds you unconscious and eats you!")
        }
        Fate::CheatMinotaur => Some(
            "You bumped into a wall (invalid move)...\n...The Minotaur finds you knocked-out and eats you!",
        ),
        Fate::CheatNoMinotaur => Some("You bumped into a wall (invalid move)...\n...You starve!"),
        Fate::Escape => Some("You found the way to the next level!"),
        Fate::Win => Some("No more Minotaur and you found the exit!"),
    }
}
