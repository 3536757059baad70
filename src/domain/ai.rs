/// AI policies: what a character decides to do each round.
///
/// A policy only sees its `Sensors`: the four legality flags, the
/// direction and distance of its current target, and its own trail.
/// It is untrusted: answering with a closed direction is legal to
/// return, the engine detects and punishes it.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::compass::Compass;
use super::rules::Openings;
use super::trail::Trail;
use crate::error::SetupError;

/// Everything a policy may look at.
// The built-in policies only read the openings.
#[allow(dead_code)]
#[derive(Clone, Copy, Debug)]
pub struct Sensors<'a> {
    pub openings: Openings,
    pub target_dir: Compass,
    pub target_dist: f32,
    pub trail: &'a Trail,
}

pub trait Policy: Send {
    fn name(&self) -> &str;

    /// Must answer `Stay` when no direction is open.
    fn propose(&mut self, sensors: &Sensors<'_>) -> Compass;
}

// ── Stationary ──

/// Never moves.
#[derive(Debug, Default)]
pub struct Stationary;

impl Policy for Stationary {
    fn name(&self) -> &str {
        "stationary"
    }

    fn propose(&mut self, _sensors: &Sensors<'_>) -> Compass {
        Compass::Stay
    }
}

// ── Random walk ──

/// Uniform pick among the open directions.
#[derive(Debug)]
pub struct RandomWalk {
    rng: StdRng,
}

impl RandomWalk {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        RandomWalk { rng }
    }
}

impl Policy for RandomWalk {
    fn name(&self) -> &str {
        "random"
    }

    fn propose(&mut self, sensors: &Sensors<'_>) -> Compass {
        if !sensors.openings.any() {
            return Compass::Stay;
        }
        let open: Vec<Compass> = sensors.openings.open().collect();
        open[self.rng.gen_range(0..open.len())]
    }
}

// ── Registry ──

pub const POLICY_NAMES: [&str; 2] = ["stationary", "random"];

/// Build a policy by name. `seed` makes random policies reproducible.
pub fn policy_by_name(name: &str, seed: Option<u64>) -> Result<Box<dyn Policy>, SetupError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "stationary" | "you shall not pass" => Ok(Box::new(Stationary)),
        "random" => Ok(Box::new(RandomWalk::new(seed))),
        _ => Err(SetupError::UnknownPolicy(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensors(openings: Openings, trail: &Trail) -> Sensors<'_> {
        Sensors { openings, target_dir: Compass::Stay, target_dist: 0.0, trail }
    }

    #[test]
    fn stationary_stays() {
        let trail = Trail::new();
        let all = Openings { north: true, east: true, south: true, west: true };
        assert_eq!(Stationary.propose(&sensors(all, &trail)), Compass::Stay);
    }

    #[test]
    fn random_stays_when_boxed_in() {
        let trail = Trail::new();
        let mut p = RandomWalk::new(Some(7));
        for _ in 0..20 {
            assert_eq!(p.propose(&sensors(Openings::default(), &trail)), Compass::Stay);
        }
    }

    #[test]
    fn random_only_picks_open_directions() {
        let trail = Trail::new();
        let o = Openings { north: false, east: true, south: false, west: true };
        let mut p = RandomWalk::new(Some(42));
        let mut seen_east = false;
        let mut seen_west = false;
        for _ in 0..200 {
            match p.propose(&sensors(o, &trail)) {
                Compass::East => seen_east = true,
                Compass::West => seen_west = true,
                other => panic!("closed direction proposed: {other:?}"),
            }
        }
        assert!(seen_east && seen_west);
    }

    #[test]
    fn same_seed_same_walk() {
        let trail = Trail::new();
        let o = Openings { north: true, east: true, south: true, west: true };
        let mut a = RandomWalk::new(Some(3));
        let mut b = RandomWalk::new(Some(3));
        for _ in 0..50 {
            assert_eq!(a.propose(&sensors(o, &trail)), b.propose(&sensors(o, &trail)));
        }
    }

    #[test]
    fn registry_names() {
        assert_eq!(policy_by_name("random", Some(1)).unwrap().name(), "random");
        assert_eq!(policy_by_name("stationary", None).unwrap().name(), "stationary");
        assert_eq!(policy_by_name("You shall not pass", None).unwrap().name(), "stationary");
        assert!(matches!(
            policy_by_name("minimax", None),
            Err(SetupError::UnknownPolicy(n)) if n == "minimax"
        ));
    }
}
