/// World: the complete state of a running game.
///
/// ## Setup
///
/// Exits, Minotaurs and players are found by a row-major scan of the
/// loaded map; that order is the setup order and the conflict priority
/// (players first, then Minotaurs).
///
///   - A level with at least one Minotaur is the final level.
///   - A final level without an exit gives an exit to every player
///     standing on row 0 or column 0.
///   - No player, or still no exit, is a setup error.
///
/// ## Census
///
/// `players_alive` counts exited players too. `players_on_board` drops
/// when a player dies or exits; the game ends when it reaches zero.

use tracing::info;

use crate::domain::ai::{policy_by_name, Policy};
use crate::domain::compass::{closest, Pos};
use crate::domain::entity::{Character, Fate, Role};
use crate::domain::map::Map;
use crate::domain::tile::Symbol;
use crate::error::SetupError;
use crate::sim::ending::{self, Ending};
use crate::sim::event::{GameEvent, Who};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Census {
    pub players_alive: usize,
    pub players_on_board: usize,
    pub minotaurs_alive: usize,
}

/// Engine inputs taken from configuration.
#[derive(Clone, Debug)]
pub struct Roster {
    pub player_health: f64,
    pub player_ai: String,
    pub minotaur_health: f64,
    pub minotaur_ai: String,
    pub max_moves: u32,
    pub seed: Option<u64>,
}

impl Default for Roster {
    fn default() -> Self {
        Roster {
            player_health: 100.0,
            player_ai: "random".to_string(),
            minotaur_health: 10.0,
            minotaur_ai: "random".to_string(),
            max_moves: 1000,
            seed: None,
        }
    }
}

pub struct World {
    pub name: String,
    pub map: Map,
    pub players: Vec<Character>,
    pub minotaurs: Vec<Character>,
    pub exits: Vec<Pos>,
    pub steps: u64,
    pub final_level: bool,
    pub census: Census,
    pub max_moves: u32,
}

// ── Construction ──

impl World {
    /// Build a game from a loaded map, with policies from the registry.
    pub fn setup(name: &str, map: Map, roster: &Roster) -> Result<World, SetupError> {
        let seed = roster.seed;
        let player_ai = roster.player_ai.clone();
        let minotaur_ai = roster.minotaur_ai.clone();
        Self::with_policies(name, map, roster, |role, ordinal| {
            let seed = seed.map(|s| s.wrapping_add(ordinal as u64));
            match role {
                Role::Theseus => policy_by_name(&player_ai, seed),
                Role::Minotaur => policy_by_name(&minotaur_ai, seed),
            }
        })
    }

    /// Build a game, asking `make_policy` for each character's AI.
    /// `ordinal` counts players first, then Minotaurs.
    pub fn with_policies<F>(
        name: &str,
        map: Map,
        roster: &Roster,
        mut make_policy: F,
    ) -> Result<World, SetupError>
    where
        F: FnMut(Role, usize) -> Result<Box<dyn Policy>, SetupError>,
    {
        let mut exits = map.positions_of(Symbol::Exit);
        let minotaur_pos = map.positions_of(Symbol::Minotaur);
        let player_pos = map.positions_of(Symbol::Player);
        let final_level = !minotaur_pos.is_empty();

        if player_pos.is_empty() {
            return Err(SetupError::NoPlayer);
        }
        if exits.is_empty() && !final_level {
            return Err(SetupError::NoExit);
        }

        let mut players = Vec::with_capacity(player_pos.len());
        for (i, pos) in player_pos.iter().enumerate() {
            let policy = make_policy(Role::Theseus, i)?;
            players.push(Character::new(i, Role::Theseus, *pos, roster.player_health, policy, &map));
        }
        let mut minotaurs = Vec::with_capacity(minotaur_pos.len());
        for (i, pos) in minotaur_pos.iter().enumerate() {
            let policy = make_policy(Role::Minotaur, players.len() + i)?;
            minotaurs.push(Character::new(i, Role::Minotaur, *pos, roster.minotaur_health, policy, &map));
        }

        if exits.is_empty() {
            for p in players.iter_mut().filter(|p| p.pos.x == 0 || p.pos.y == 0) {
                exits.push(p.pos);
                p.walk_on = Symbol::Exit;
            }
        }
        if exits.is_empty() {
            return Err(SetupError::NoExit);
        }

        let census = Census {
            players_alive: players.len(),
            players_on_board: players.len(),
            minotaurs_alive: minotaurs.len(),
        };

        let mut world = World {
            name: name.to_string(),
            map,
            players,
            minotaurs,
            exits,
            steps: 0,
            final_level,
            census,
            max_moves: roster.max_moves.max(1),
        };
        world.aim_all();

        info!(
            map = %world.name,
            players = world.players.len(),
            minotaurs = world.minotaurs.len(),
            exits = world.exits.len(),
            final_level = world.final_level,
            "game set up"
        );
        Ok(world)
    }

    fn aim_all(&mut self) {
        for i in 0..self.players.len() {
            let who = Who::theseus(i);
            let target = self.target_for(who).unwrap_or(self.players[i].pos);
            self.players[i].aim(target);
        }
        for i in 0..self.minotaurs.len() {
            let who = Who::minotaur(i);
            let target = self.target_for(who).unwrap_or(self.minotaurs[i].pos);
            self.minotaurs[i].aim(target);
        }
    }
}

// ── Queries ──

impl World {
    pub fn character(&self, who: Who) -> &Character {
        match who.role {
            Role::Theseus => &self.players[who.index],
            Role::Minotaur => &self.minotaurs[who.index],
        }
    }

    pub fn character_mut(&mut self, who: Who) -> &mut Character {
        match who.role {
            Role::Theseus => &mut self.players[who.index],
            Role::Minotaur => &mut self.minotaurs[who.index],
        }
    }

    /// A character together with the grid it walks on.
    pub fn split_mut(&mut self, who: Who) -> (&mut Character, &mut Map) {
        let c = match who.role {
            Role::Theseus => &mut self.players[who.index],
            Role::Minotaur => &mut self.minotaurs[who.index],
        };
        (c, &mut self.map)
    }

    /// Every character in priority order.
    pub fn everyone(&self) -> impl Iterator<Item = (Who, &Character)> + '_ {
        let players = self.players.iter().enumerate().map(|(i, c)| (Who::theseus(i), c));
        let minotaurs = self.minotaurs.iter().enumerate().map(|(i, c)| (Who::minotaur(i), c));
        players.chain(minotaurs)
    }

    pub fn any_minotaur_alive(&self) -> bool {
        self.census.minotaurs_alive > 0
    }

    pub fn is_over(&self) -> bool {
        self.census.players_on_board == 0
    }

    /// Where a character is heading.
    ///
    /// Players hunt the closest Minotaur on a final level while one is
    /// alive, otherwise they head for the closest exit. Minotaurs chase
    /// the closest living player. `None` when there is nothing to head for.
    pub fn target_for(&self, who: Who) -> Option<Pos> {
        let me = self.character(who);
        match who.role {
            Role::Theseus if self.final_level && self.any_minotaur_alive() => closest(
                me.pos,
                self.minotaurs.iter().filter(|m| m.is_alive()).map(|m| m.pos),
            ),
            Role::Theseus => closest(me.pos, self.exits.iter().copied()),
            Role::Minotaur => closest(
                me.pos,
                self.players.iter().filter(|p| p.is_alive()).map(|p| p.pos),
            ),
        }
    }

    pub fn gm_ending(&self) -> Ending {
        ending::gm_ending(&self.census)
    }

    pub fn player_ending(&self, index: usize) -> Ending {
        let exited = self.players[index].has_exited();
        ending::player_ending(exited, &self.census, self.final_level)
    }
}

// ── Terminal transitions ──

impl World {
    /// Kill a living character and update the census.
    pub fn kill(&mut self, who: Who, fate: Fate) -> GameEvent {
        let (c, map) = self.split_mut(who);
        c.kill(map);
        c.seal(fate);
        let pos = c.pos;
        match who.role {
            Role::Theseus => {
                self.census.players_alive -= 1;
                self.census.players_on_board -= 1;
            }
            Role::Minotaur => self.census.minotaurs_alive -= 1,
        }
        info!(?who, %pos, ?fate, "character died");
        GameEvent::Died { who, pos, fate }
    }

    /// A living player leaves the dedalus through an exit.
    pub fn exit(&mut self, who: Who, fate: Fate) -> GameEvent {
        let (c, map) = self.split_mut(who);
        c.leave(map);
        c.seal(fate);
        let pos = c.pos;
        self.census.players_on_board -= 1;
        info!(?who, %pos, ?fate, "player escaped");
        GameEvent::Exited { who, pos, fate }
    }

    /// Put back what every character was standing on.
    pub fn teardown(&mut self) {
        for c in self.players.iter_mut().chain(self.minotaurs.iter_mut()) {
            c.teardown(&mut self.map);
        }
    }
}
