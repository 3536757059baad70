/// The round function: advances the game by one round.
///
/// Processing order:
///   1. Fights (anyone already touching an opponent)
///   2. Move proposals (every policy, in parallel, joined before 3)
///   3. Conflict resolution (players first, then Minotaurs)
///   4. Move application, cheats, starvation, exits
///   5. Fights again
///
/// Only living characters propose, move and fight. Dead and exited
/// characters are carried along with a `Stay`.

use std::collections::HashSet;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::domain::compass::{apply_move, Compass, Pos};
use crate::domain::entity::{Fate, Proposal, Role};
use super::event::{FightOutcome, GameEvent, Who};
use super::world::World;

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

pub fn round(world: &mut World) -> Vec<GameEvent> {
    let mut events: Vec<GameEvent> = Vec::new();
    world.steps += 1;
    events.push(GameEvent::RoundStarted { step: world.steps });

    resolve_fights(world, &mut events);

    let mut plans = collect_plans(world);
    for (i, dir) in resolve_conflicts(&mut plans) {
        debug!(who = ?plans[i].who, %dir, "move refused");
        events.push(GameEvent::MoveRefused { who: plans[i].who, dir });
    }
    for plan in &plans {
        play_character(world, plan, &mut events);
    }

    resolve_fights(world, &mut events);
    events
}

// ══════════════════════════════════════════════════════════════
// Proposals
// ══════════════════════════════════════════════════════════════

/// One character's move for this round.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Plan {
    pub who: Who,
    pub from: Pos,
    pub dir: Compass,
    pub cheated: bool,
    /// Alive at proposal time. Inactive plans never reserve cells.
    pub active: bool,
}

/// Ask every policy for a move. Policies run concurrently; the
/// result keeps priority order.
pub fn collect_plans(world: &mut World) -> Vec<Plan> {
    let map = &world.map;
    let proposals: Vec<Proposal> = world
        .players
        .par_iter_mut()
        .chain(world.minotaurs.par_iter_mut())
        .map(|c| c.propose(map))
        .collect();

    world
        .everyone()
        .zip(proposals)
        .map(|((who, c), p)| {
            if c.is_alive() {
                debug!(?who, dir = %p.dir, cheated = p.cheated, "proposal");
            }
            Plan { who, from: c.pos, dir: p.dir, cheated: p.cheated, active: c.is_alive() }
        })
        .collect()
}

// ══════════════════════════════════════════════════════════════
// Conflict resolution
// ══════════════════════════════════════════════════════════════

/// Make every active plan end on its own cell.
///
/// Each pass reserves the cells of active stayers, then walks the movers
/// in priority order reserving their targets. The first mover whose
/// target is already taken is turned into a stayer and the pass starts
/// over. Every extra pass turns one more mover into a stayer, so
/// `plans.len() + 1` passes always reach the fixed point.
///
/// Returns the refused plans (index, original direction) in refusal order.
pub fn resolve_conflicts(plans: &mut [Plan]) -> Vec<(usize, Compass)> {
    let mut refused = Vec::new();

    for _pass in 0..=plans.len() {
        let mut taken: HashSet<Pos> = plans
            .iter()
            .filter(|p| p.active && p.dir == Compass::Stay)
            .map(|p| p.from)
            .collect();

        let mut conflict = None;
        for (i, plan) in plans.iter().enumerate() {
            if !plan.active || plan.dir == Compass::Stay {
                continue;
            }
            let next = apply_move(plan.from, plan.dir);
            if !taken.insert(next) {
                conflict = Some(i);
                break;
            }
        }

        match conflict {
            Some(i) => {
                refused.push((i, plans[i].dir));
                plans[i].dir = Compass::Stay;
            }
            None => break,
        }
    }

    refused
}

// ══════════════════════════════════════════════════════════════
// Move application
// ══════════════════════════════════════════════════════════════

fn play_character(world: &mut World, plan: &Plan, events: &mut Vec<GameEvent>) {
    let who = plan.who;
    if !plan.active || !world.character(who).is_alive() {
        return;
    }

    if plan.cheated {
        let fate = if world.any_minotaur_alive() { Fate::CheatMinotaur } else { Fate::CheatNoMinotaur };
        info!(?who, dir = %plan.dir, "cheat detected");
        events.push(GameEvent::Cheated { who, dir: plan.dir });
        events.push(world.kill(who, fate));
        return;
    }

    // The target is chosen from where the character stood, then aimed at from where it lands.
    let target = world.target_for(who);
    let (c, map) = world.split_mut(who);
    let exited = c.step(map, plan.dir);

    let wear = 100.0 / f64::from(world.max_moves);
    let c = world.character_mut(who);
    let target = target.unwrap_or(c.pos);
    c.aim(target);
    if who.role == Role::Theseus {
        c.wear(wear);
    }

    if c.health <= 0.0 {
        let fate = if world.any_minotaur_alive() { Fate::StarveMinotaur } else { Fate::StarveNoMinotaur };
        events.push(world.kill(who, fate));
        return;
    }

    if exited && who.role == Role::Theseus && !world.any_minotaur_alive() {
        let fate = if world.final_level { Fate::Win } else { Fate::Escape };
        events.push(world.exit(who, fate));
    }
}

// ══════════════════════════════════════════════════════════════
// Fights
// ══════════════════════════════════════════════════════════════

/// Two living opponents on the same or a cardinally adjacent cell.
pub fn should_fight(world: &World, a: Who, b: Who) -> bool {
    let ca = world.character(a);
    let cb = world.character(b);
    cb.role == ca.role.opponent() && ca.is_alive() && cb.is_alive() && ca.pos.touches(cb.pos)
}

/// Players against every Minotaur, then Minotaurs against every player.
fn resolve_fights(world: &mut World, events: &mut Vec<GameEvent>) {
    let players = world.players.len();
    let minotaurs = world.minotaurs.len();

    for p in 0..players {
        for m in 0..minotaurs {
            let (a, b) = (Who::theseus(p), Who::minotaur(m));
            if should_fight(world, a, b) {
                fight(world, a, b, events);
            }
        }
    }
    for m in 0..minotaurs {
        for p in 0..players {
            let (a, b) = (Who::minotaur(m), Who::theseus(p));
            if should_fight(world, a, b) {
                fight(world, a, b, events);
            }
        }
    }
}

/// Trade blows until someone drops to zero. Both may fall.
fn fight(world: &mut World, a: Who, b: Who, events: &mut Vec<GameEvent>) {
    info!(?a, ?b, "fight");
    events.push(GameEvent::FightStarted {
        a,
        b,
        health_a: world.character(a).health,
        health_b: world.character(b).health,
    });

    let mut tick = 0;
    loop {
        let ha = world.character(a).health;
        let hb = world.character(b).health;
        if ha <= 0.0 || hb <= 0.0 {
            break;
        }
        events.push(GameEvent::FightTick { a, b, tick, health_a: ha, health_b: hb });
        world.character_mut(a).health -= 1.0;
        world.character_mut(b).health -= 1.0;
        tick += 1;
    }

    let health_a = world.character(a).health;
    let health_b = world.character(b).health;
    let outcome = match (health_a <= 0.0, health_b <= 0.0) {
        (true, true) => FightOutcome::Draw,
        (true, false) => FightOutcome::Winner(b),
        _ => FightOutcome::Winner(a),
    };
    events.push(GameEvent::FightEnded { a, b, health_a, health_b, outcome });

    for who in [a, b] {
        if world.character(who).health <= 0.0 {
            let fate = match who.role {
                Role::Theseus => Fate::KilledByMinotaur,
                Role::Minotaur => Fate::SlainByTheseus,
            };
            events.push(world.kill(who, fate));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    use crate::domain::ai::{Policy, Sensors, Stationary};
    use crate::domain::entity::Status;
    use crate::domain::map::Map;
    use crate::domain::tile::Symbol;
    use crate::error::SetupError;
    use crate::sim::ending::Ending;
    use crate::sim::world::Roster;

    fn map_from(rows: &[&str]) -> Map {
        Map::parse(rows).unwrap()
    }

    /// Replays a fixed list of answers, then stays.
    struct Script(Vec<Compass>);

    impl Policy for Script {
        fn name(&self) -> &str {
            "script"
        }
        fn propose(&mut self, _s: &Sensors<'_>) -> Compass {
            if self.0.is_empty() {
                Compass::Stay
            } else {
                self.0.remove(0)
            }
        }
    }

    /// Walks east whenever it can.
    struct Eastward;

    impl Policy for Eastward {
        fn name(&self) -> &str {
            "eastward"
        }
        fn propose(&mut self, s: &Sensors<'_>) -> Compass {
            if s.openings.east {
                Compass::East
            } else {
                Compass::Stay
            }
        }
    }

    fn world_with<F>(rows: &[&str], roster: Roster, f: F) -> World
    where
        F: FnMut(Role, usize) -> Result<Box<dyn Policy>, SetupError>,
    {
        World::with_policies("test", map_from(rows), &roster, f).unwrap()
    }

    fn play_out(world: &mut World, cap: u64) -> Vec<GameEvent> {
        let mut all = Vec::new();
        while !world.is_over() && world.steps < cap {
            all.extend(round(world));
        }
        all
    }

    fn plan(who: Who, x: usize, y: usize, dir: Compass) -> Plan {
        Plan { who, from: Pos::new(x, y), dir, cheated: false, active: true }
    }

    #[test]
    fn earlier_player_wins_the_cell() {
        // A at (0,1) going East, B at (2,1) going West, both into (1,1)
        let mut plans = vec![
            plan(Who::theseus(0), 0, 1, Compass::East),
            plan(Who::theseus(1), 2, 1, Compass::West),
        ];
        let refused = resolve_conflicts(&mut plans);
        assert_eq!(refused, vec![(1, Compass::West)]);
        assert_eq!(plans[0].dir, Compass::East);
        assert_eq!(plans[1].dir, Compass::Stay);
    }

    #[test]
    fn refusal_cascades_backwards() {
        // C stays at (3,0). B wants (3,0), A wants B's cell (2,0).
        // B is refused, which then blocks A on the next pass.
        let mut plans = vec![
            plan(Who::theseus(0), 1, 0, Compass::East),
            plan(Who::theseus(1), 2, 0, Compass::East),
            plan(Who::minotaur(0), 3, 0, Compass::Stay),
        ];
        let refused = resolve_conflicts(&mut plans);
        assert_eq!(refused, vec![(1, Compass::East), (0, Compass::East)]);
        assert!(plans.iter().all(|p| p.dir == Compass::Stay));
    }

    #[test]
    fn inactive_plans_reserve_nothing() {
        let mut plans = vec![
            plan(Who::theseus(0), 0, 0, Compass::East),
            Plan { active: false, ..plan(Who::theseus(1), 1, 0, Compass::Stay) },
        ];
        assert!(resolve_conflicts(&mut plans).is_empty());
    }

    #[test]
    fn priority_conflict_in_a_round() {
        let mut w = world_with(
            &[
                "*****",
                "*@.@*",
                "**?**",
            ],
            Roster::default(),
            |_, i| {
                let dir = if i == 0 { Compass::East } else { Compass::West };
                Ok(Box::new(Script(vec![dir])))
            },
        );
        let events = round(&mut w);
        assert_eq!(w.players[0].pos, Pos::new(2, 1));
        assert_eq!(w.players[1].pos, Pos::new(3, 1));
        assert!(events.contains(&GameEvent::MoveRefused { who: Who::theseus(1), dir: Compass::West }));
        assert_eq!(w.map.get(Pos::new(1, 1)), Some(Symbol::Path));
    }

    #[test]
    fn cheater_dies_in_place_without_minotaur() {
        let mut w = world_with(&["*.*", "*@?", "***"], Roster::default(), |_, _| {
            Ok(Box::new(Script(vec![Compass::West])))
        });
        let events = round(&mut w);
        let p = &w.players[0];
        assert_eq!(p.status, Status::Dead);
        assert_eq!(p.fate, Some(Fate::CheatNoMinotaur));
        assert_eq!(p.pos, Pos::new(1, 1));
        assert!(p.trail.is_empty());
        assert!(events.contains(&GameEvent::Cheated { who: Who::theseus(0), dir: Compass::West }));
        assert!(w.is_over());
        assert_eq!(w.gm_ending(), Ending::GmWin);
    }

    #[test]
    fn cheat_with_minotaur_alive() {
        let mut w = world_with(
            &[
                "*?*****",
                "*@*..&*",
                "*.*****",
            ],
            Roster::default(),
            |role, _| match role {
                Role::Theseus => Ok(Box::new(Script(vec![Compass::East]))),
                Role::Minotaur => Ok(Box::new(Stationary)),
            },
        );
        round(&mut w);
        assert_eq!(w.players[0].fate, Some(Fate::CheatMinotaur));
        assert_eq!(w.players[0].pos, Pos::new(1, 1));
        assert_eq!(w.census.minotaurs_alive, 1);
    }

    #[test]
    fn starvation_on_round_four() {
        let roster = Roster { max_moves: 4, ..Roster::default() };
        let mut w = world_with(&["@.?"], roster, |_, _| Ok(Box::new(Stationary)));
        for expected in [75.0, 50.0, 25.0] {
            round(&mut w);
            assert!(w.players[0].is_alive());
            assert_eq!(w.players[0].health, expected);
        }
        let events = round(&mut w);
        assert_eq!(w.steps, 4);
        assert_eq!(w.players[0].status, Status::Dead);
        assert_eq!(w.players[0].fate, Some(Fate::StarveNoMinotaur));
        assert!(events.iter().any(|e| matches!(e, GameEvent::Died { fate: Fate::StarveNoMinotaur, .. })));
        assert!(w.is_over());
    }

    #[test]
    fn minotaurs_do_not_starve() {
        let roster = Roster { max_moves: 1, ..Roster::default() };
        let mut w = world_with(&["?@..&"], roster, |_, _| Ok(Box::new(Stationary)));
        round(&mut w);
        assert_eq!(w.players[0].fate, Some(Fate::StarveMinotaur));
        assert!(w.minotaurs[0].is_alive());
        assert_eq!(w.minotaurs[0].health, 10.0);
    }

    #[test]
    fn corridor_escape_in_three_rounds() {
        let mut w = world_with(&["@..?"], Roster::default(), |_, _| Ok(Box::new(Eastward)));
        play_out(&mut w, 50);
        assert_eq!(w.steps, 3);
        assert_eq!(w.players[0].status, Status::Exited);
        assert_eq!(w.players[0].fate, Some(Fate::Escape));
        assert_eq!(w.player_ending(0), Ending::NextLevelAndAlive);
        assert_eq!(w.gm_ending(), Ending::GmLoose);
        assert_eq!(w.map.get(Pos::new(3, 0)), Some(Symbol::Exit));
        assert_eq!(w.players[0].trail.len(), 3);
    }

    #[test]
    fn double_knockout() {
        let roster = Roster { player_health: 1.0, minotaur_health: 1.0, ..Roster::default() };
        let mut w = world_with(&["@&?"], roster, |_, _| Ok(Box::new(Stationary)));
        let events = round(&mut w);

        assert!(matches!(events[1], GameEvent::FightStarted { .. }));
        assert!(events.contains(&GameEvent::FightEnded {
            a: Who::theseus(0),
            b: Who::minotaur(0),
            health_a: 0.0,
            health_b: 0.0,
            outcome: FightOutcome::Draw,
        }));
        assert_eq!(w.players[0].status, Status::Dead);
        assert_eq!(w.minotaurs[0].status, Status::Dead);
        assert_eq!(w.players[0].fate, Some(Fate::KilledByMinotaur));
        assert!(w.is_over());
        assert_eq!(w.steps, 1);
        assert_eq!(w.gm_ending(), Ending::GmWin);
        assert_eq!(w.player_ending(0), Ending::KillMinotaurButDead);
    }

    #[test]
    fn stronger_side_wins_the_fight() {
        let roster = Roster { player_health: 100.0, minotaur_health: 3.0, ..Roster::default() };
        let mut w = world_with(&["@&?"], roster, |_, _| Ok(Box::new(Stationary)));
        let events = round(&mut w);
        let ticks = events.iter().filter(|e| matches!(e, GameEvent::FightTick { .. })).count();
        assert_eq!(ticks, 3);
        assert!(w.players[0].is_alive());
        assert_eq!(w.minotaurs[0].fate, Some(Fate::SlainByTheseus));
        assert_eq!(w.census.minotaurs_alive, 0);
        assert!(w.players[0].health < 97.0);
    }

    #[test]
    fn walking_into_reach_fights_the_same_round() {
        let mut w = world_with(&["@..&?"], Roster::default(), |role, _| match role {
            Role::Theseus => Ok(Box::new(Eastward)),
            Role::Minotaur => Ok(Box::new(Stationary)),
        });

        let first = round(&mut w);
        assert_eq!(w.players[0].pos, Pos::new(1, 0));
        assert!(!first.iter().any(|e| matches!(e, GameEvent::FightStarted { .. })));

        let second = round(&mut w);
        assert_eq!(w.players[0].pos, Pos::new(2, 0));
        let started = second
            .iter()
            .position(|e| matches!(e, GameEvent::FightStarted { a, .. } if *a == Who::theseus(0)))
            .expect("fight after the move");
        assert!(matches!(
            second[started],
            GameEvent::FightStarted { health_a, health_b, .. } if health_a < 100.0 && health_b == 10.0
        ));
        assert!(second[started..].contains(&GameEvent::Died {
            who: Who::minotaur(0),
            pos: Pos::new(3, 0),
            fate: Fate::SlainByTheseus,
        }));
        assert!(w.players[0].is_alive());
        assert_eq!(w.census.minotaurs_alive, 0);
    }

    #[test]
    fn target_is_chosen_before_the_move() {
        // From (3,0) the west Minotaur is nearer; after stepping east the other one is.
        let mut w = world_with(&["&..@...&"], Roster::default(), |role, _| match role {
            Role::Theseus => Ok(Box::new(Script(vec![Compass::East]))),
            Role::Minotaur => Ok(Box::new(Stationary)),
        });
        round(&mut w);
        let p = &w.players[0];
        assert_eq!(p.pos, Pos::new(4, 0));
        assert_eq!(p.target_dir, Compass::West);
        assert!((p.target_dist - 40.0).abs() < 1e-4);
    }

    #[test]
    fn exit_blocked_while_minotaur_lives() {
        // Player steps onto the exit but a Minotaur is alive far away.
        let mut w = world_with(
            &[
                "@?*****",
                "**....&",
            ],
            Roster::default(),
            |role, _| match role {
                Role::Theseus => Ok(Box::new(Script(vec![Compass::East]))),
                Role::Minotaur => Ok(Box::new(Stationary)),
            },
        );
        round(&mut w);
        assert!(w.players[0].is_alive());
        assert_eq!(w.players[0].pos, Pos::new(1, 0));
        assert_eq!(w.census.players_on_board, 1);
    }

    #[test]
    fn dead_and_exited_are_skipped() {
        let mut w = world_with(&["@?.@"], Roster::default(), |_, i| {
            Ok(Box::new(Script(vec![if i == 0 { Compass::East } else { Compass::West }; 3])))
        });
        round(&mut w);
        assert_eq!(w.players[0].status, Status::Exited);
        assert_eq!(w.players[1].pos, Pos::new(2, 0));
        round(&mut w);
        // the exited player stays put, the other one exits through the same door
        assert_eq!(w.players[0].pos, Pos::new(1, 0));
        assert_eq!(w.players[1].status, Status::Exited);
        assert!(w.is_over());
    }

    fn cell() -> impl Strategy<Value = (usize, usize)> {
        (0usize..6, 0usize..6)
    }

    proptest! {
        #[test]
        fn resolved_plans_never_collide(
            cells in prop::collection::hash_set(cell(), 1..12),
            dirs in prop::collection::vec(0u8..9, 12),
            alive in prop::collection::vec(any::<bool>(), 12),
        ) {
            let mut plans: Vec<Plan> = cells
                .into_iter()
                .enumerate()
                .map(|(i, (x, y))| Plan {
                    who: Who::theseus(i),
                    from: Pos::new(x + 1, y + 1),
                    dir: Compass::ALL[dirs[i] as usize],
                    cheated: false,
                    active: alive[i],
                })
                .collect();
            let refused = resolve_conflicts(&mut plans);
            prop_assert!(refused.len() <= plans.len());

            let mut seen = HashSet::new();
            for p in plans.iter().filter(|p| p.active) {
                prop_assert!(seen.insert(apply_move(p.from, p.dir)));
            }
        }
    }
}
