/// Characters: Theseus players and Minotaurs.
///
/// A character's role never changes. Its status moves from `Alive` to
/// `Dead` or `Exited` exactly once; both are terminal.

use std::fmt;

use super::ai::{Policy, Sensors};
use super::compass::{apply_move, direction_and_distance, Compass, Pos};
use super::map::{Map, Mask};
use super::rules::{is_valid_move, Openings};
use super::tile::Symbol;
use super::trail::Trail;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum Role {
    Theseus,
    Minotaur,
}

impl Role {
    pub fn symbol(self) -> Symbol {
        match self {
            Role::Theseus => Symbol::Player,
            Role::Minotaur => Symbol::Minotaur,
        }
    }

    pub fn opponent(self) -> Role {
        match self {
            Role::Theseus => Role::Minotaur,
            Role::Minotaur => Role::Theseus,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Theseus => f.write_str("Theseus"),
            Role::Minotaur => f.write_str("Minotaur"),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Status {
    Alive,
    Dead,
    Exited,
}

/// How a character's adventure ended. Set at most once.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Fate {
    KilledByMinotaur,
    SlainByTheseus,
    StarveMinotaur,
    StarveNoMinotaur,
    CheatMinotaur,
    CheatNoMinotaur,
    Escape,
    Win,
}

/// A move as proposed by a policy, before conflict resolution.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Proposal {
    pub dir: Compass,
    pub cheated: bool,
}

impl Proposal {
    pub const STAY: Proposal = Proposal { dir: Compass::Stay, cheated: false };
}

pub struct Character {
    pub id: usize,
    pub name: String,
    pub role: Role,
    pub status: Status,
    pub pos: Pos,
    pub health: f64,
    pub trail: Trail,
    /// What the grid held under this character.
    pub walk_on: Symbol,
    pub target_dir: Compass,
    pub target_dist: f32,
    pub fate: Option<Fate>,
    pub mask: Mask,
    policy: Box<dyn Policy>,
}

impl fmt::Debug for Character {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Character")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("status", &self.status)
            .field("pos", &self.pos)
            .field("health", &self.health)
            .field("policy", &self.policy.name())
            .finish()
    }
}

impl Character {
    pub fn new(
        id: usize,
        role: Role,
        pos: Pos,
        health: f64,
        policy: Box<dyn Policy>,
        map: &Map,
    ) -> Self {
        let mut mask = Mask::for_map(map);
        mask.reveal_around(pos);
        Character {
            id,
            name: role.to_string(),
            role,
            status: Status::Alive,
            pos,
            health,
            trail: Trail::new(),
            walk_on: Symbol::Path,
            target_dir: Compass::Stay,
            target_dist: 0.0,
            fate: None,
            mask,
            policy,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.status == Status::Alive
    }

    pub fn has_exited(&self) -> bool {
        self.status == Status::Exited
    }

    pub fn policy_name(&self) -> &str {
        self.policy.name()
    }

    /// Symbol this character paints on the grid.
    pub fn symbol(&self) -> Symbol {
        match self.status {
            Status::Alive => self.role.symbol(),
            Status::Dead => Symbol::Dead,
            Status::Exited => Symbol::Exit,
        }
    }

    /// Ask the policy for a move. Only the policy's answer is returned;
    /// nothing on the character or the grid changes.
    pub fn propose(&mut self, map: &Map) -> Proposal {
        if !self.is_alive() {
            return Proposal::STAY;
        }
        let openings = Openings::sense(map, self.pos);
        let sensors = Sensors {
            openings,
            target_dir: self.target_dir,
            target_dist: self.target_dist,
            trail: &self.trail,
        };
        let dir = self.policy.propose(&sensors);
        Proposal { dir, cheated: !is_valid_move(dir, openings) }
    }

    /// Walk one step (or stay). Returns true if the new cell is an exit.
    pub fn step(&mut self, map: &mut Map, dir: Compass) -> bool {
        map.set(self.pos, self.walk_on);
        self.pos = apply_move(self.pos, dir);

        let under = map.get(self.pos).unwrap_or(Symbol::Wall);
        let exited = under == Symbol::Exit;
        self.walk_on = under;
        map.set(self.pos, self.symbol());
        self.mask.reveal_around(self.pos);
        self.trail.push(dir);
        exited
    }

    /// Point the compass at `target`.
    pub fn aim(&mut self, target: Pos) {
        let (dir, dist) = direction_and_distance(self.pos, target);
        self.target_dir = dir;
        self.target_dist = dist;
    }

    /// Lose `amount` health, never going below zero.
    pub fn wear(&mut self, amount: f64) {
        self.health = (self.health - amount).max(0.0);
    }

    pub fn kill(&mut self, map: &mut Map) {
        assert!(self.is_alive(), "killing {} #{} which is not alive", self.role, self.id);
        self.status = Status::Dead;
        self.health = 0.0;
        map.set(self.pos, Symbol::Dead);
    }

    pub fn leave(&mut self, map: &mut Map) {
        assert!(
            self.is_alive() && self.role == Role::Theseus,
            "{} #{} cannot exit the dedalus",
            self.role,
            self.id
        );
        self.status = Status::Exited;
        map.set(self.pos, Symbol::Exit);
    }

    /// Set the ending tag unless one is already recorded.
    pub fn seal(&mut self, fate: Fate) {
        if self.fate.is_none() {
            self.fate = Some(fate);
        }
    }

    /// Give the cell back to whatever was under the character.
    pub fn teardown(&mut self, map: &mut Map) {
        map.set(self.pos, self.walk_on);
        self.trail.clear();
    }
}
