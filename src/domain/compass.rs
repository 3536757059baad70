/// Compass, grid positions and targeting.
///
/// Ordinals of `Compass` are fixed (N=0 .. NW=7, Stay=8). Only the four
/// cardinal points are ever used to move; diagonals exist for targeting.

use std::fmt;

/// Scale applied to euclidean distances before they are shown to players.
pub const DISTANCE_SCALE: f32 = 10.0;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Pos {
    pub x: usize,
    pub y: usize,
}

impl Pos {
    pub const fn new(x: usize, y: usize) -> Self {
        Pos { x, y }
    }

    pub fn manhattan(self, other: Pos) -> usize {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Same cell or one cardinal step away.
    pub fn touches(self, other: Pos) -> bool {
        self.manhattan(other) <= 1
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
#[repr(u8)]
pub enum Compass {
    North = 0,
    NorthEast = 1,
    East = 2,
    SouthEast = 3,
    South = 4,
    SouthWest = 5,
    West = 6,
    NorthWest = 7,
    #[default]
    Stay = 8,
}

impl Compass {
    /// The four directions a character can actually walk.
    pub const CARDINALS: [Compass; 4] = [Compass::North, Compass::East, Compass::South, Compass::West];

    pub const ALL: [Compass; 9] = [
        Compass::North,
        Compass::NorthEast,
        Compass::East,
        Compass::SouthEast,
        Compass::South,
        Compass::SouthWest,
        Compass::West,
        Compass::NorthWest,
        Compass::Stay,
    ];

    const ARROWS: [&'static str; 9] = ["↑", "↗", "→", "↘", "↓", "↙", "←", "↖", "•"];
    const LABELS: [&'static str; 9] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW", "Stay"];

    pub fn is_cardinal(self) -> bool {
        matches!(self, Compass::North | Compass::East | Compass::South | Compass::West)
    }

    /// Opposite direction. `Stay` is its own opposite.
    pub fn opposite(self) -> Compass {
        match self {
            Compass::Stay => Compass::Stay,
            other => Self::ALL[(other as usize + 4) % 8],
        }
    }

    pub fn arrow(self) -> &'static str {
        Self::ARROWS[self as usize]
    }

    pub fn label(self) -> &'static str {
        Self::LABELS[self as usize]
    }
}

impl fmt::Display for Compass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Direction of `target` seen from `source`, and the scaled distance.
///
/// Offsets on an axis (dx == 0 or dy == 0) give a pure cardinal point,
/// every other offset falls into one of the diagonal octants.
pub fn direction_and_distance(source: Pos, target: Pos) -> (Compass, f32) {
    let dx = source.x as i64 - target.x as i64;
    let dy = source.y as i64 - target.y as i64;

    let dir = match (dx.signum(), dy.signum()) {
        (0, 1) => Compass::North,
        (-1, 1) => Compass::NorthEast,
        (-1, 0) => Compass::East,
        (-1, -1) => Compass::SouthEast,
        (0, -1) => Compass::South,
        (1, -1) => Compass::SouthWest,
        (1, 0) => Compass::West,
        (1, 1) => Compass::NorthWest,
        _ => Compass::Stay,
    };

    let dist = ((dx * dx + dy * dy) as f64).sqrt() as f32 * DISTANCE_SCALE;
    (dir, dist)
}

/// Closest candidate to `source`. Ties keep the first candidate seen.
pub fn closest<I>(source: Pos, candidates: I) -> Option<Pos>
where
    I: IntoIterator<Item = Pos>,
{
    let mut best: Option<(Pos, f32)> = None;
    for cand in candidates {
        let (_, dist) = direction_and_distance(source, cand);
        match best {
            Some((_, best_dist)) if dist >= best_dist => {}
            _ => best = Some((cand, dist)),
        }
    }
    best.map(|(pos, _)| pos)
}

/// One cardinal step. Diagonals and `Stay` leave the position unchanged.
pub fn apply_move(pos: Pos, dir: Compass) -> Pos {
    match dir {
        Compass::North => Pos::new(pos.x, pos.y.saturating_sub(1)),
        Compass::East => Pos::new(pos.x + 1, pos.y),
        Compass::South => Pos::new(pos.x, pos.y + 1),
        Compass::West => Pos::new(pos.x.saturating_sub(1), pos.y),
        _ => pos,
    }
}
