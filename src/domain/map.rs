/// The dedalus grid and per-viewer visibility masks.
///
/// The grid stores the symbol currently visible in each cell. A character
/// walking onto a cell overwrites it; the previous symbol lives on the
/// character (`walk_on`) until it leaves.

use super::compass::{apply_move, Compass, Pos};
use super::tile::Symbol;
use crate::error::LoadError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Map {
    width: usize,
    height: usize,
    cells: Vec<Vec<Symbol>>,
}

impl Map {
    /// Parse rows of map glyphs. Rows must all have the same width.
    pub fn parse<S: AsRef<str>>(rows: &[S]) -> Result<Map, LoadError> {
        let first = rows.first().ok_or(LoadError::Empty)?;
        let width = first.as_ref().chars().count();
        if width == 0 {
            return Err(LoadError::Empty);
        }

        let mut cells = Vec::with_capacity(rows.len());
        for (row, line) in rows.iter().enumerate() {
            let line = line.as_ref();
            let found = line.chars().count();
            if found != width {
                return Err(LoadError::Ragged { row, expected: width, found });
            }
            let parsed = line
                .chars()
                .enumerate()
                .map(|(col, ch)| {
                    Symbol::from_char(ch).ok_or(LoadError::UnknownSymbol { row, col, symbol: ch })
                })
                .collect::<Result<Vec<_>, _>>()?;
            cells.push(parsed);
        }

        Ok(Map { width, height: cells.len(), cells })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn in_bounds(&self, pos: Pos) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    pub fn get(&self, pos: Pos) -> Option<Symbol> {
        self.cells.get(pos.y).and_then(|r| r.get(pos.x)).copied()
    }

    /// Out-of-bounds writes are ignored.
    pub fn set(&mut self, pos: Pos, sym: Symbol) {
        if let Some(cell) = self.cells.get_mut(pos.y).and_then(|r| r.get_mut(pos.x)) {
            *cell = sym;
        }
    }

    /// The cell one cardinal step away, if it is on the grid.
    pub fn neighbour(&self, pos: Pos, dir: Compass) -> Option<Pos> {
        let off_grid = match dir {
            Compass::North => pos.y == 0,
            Compass::West => pos.x == 0,
            Compass::East | Compass::South => false,
            _ => return None,
        };
        if off_grid {
            return None;
        }
        let next = apply_move(pos, dir);
        self.in_bounds(next).then_some(next)
    }

    /// Every cell holding `sym`, in row-major order.
    pub fn positions_of(&self, sym: Symbol) -> Vec<Pos> {
        let mut out = Vec::new();
        for (y, row) in self.cells.iter().enumerate() {
            for (x, cell) in row.iter().enumerate() {
                if *cell == sym {
                    out.push(Pos::new(x, y));
                }
            }
        }
        out
    }
}

impl std::fmt::Display for Map {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in &self.cells {
            let line: String = row.iter().map(|s| s.glyph()).collect();
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Cells revealed to one viewer. Grows monotonically.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mask {
    width: usize,
    height: usize,
    revealed: Vec<Vec<bool>>,
}

impl Mask {
    pub fn hidden(width: usize, height: usize) -> Self {
        Mask { width, height, revealed: vec![vec![false; width]; height] }
    }

    pub fn for_map(map: &Map) -> Self {
        Self::hidden(map.width(), map.height())
    }

    pub fn is_revealed(&self, pos: Pos) -> bool {
        self.revealed.get(pos.y).and_then(|r| r.get(pos.x)).copied().unwrap_or(false)
    }

    /// Reveal `pos` and its 8 neighbours, clamped to the grid.
    pub fn reveal_around(&mut self, pos: Pos) {
        if self.width == 0 || self.height == 0 {
            return;
        }
        let x0 = pos.x.saturating_sub(1);
        let y0 = pos.y.saturating_sub(1);
        let x1 = (pos.x + 1).min(self.width - 1);
        let y1 = (pos.y + 1).min(self.height - 1);
        for y in y0..=y1 {
            for x in x0..=x1 {
                self.revealed[y][x] = true;
            }
        }
    }

    #[cfg(test)]
    pub fn count(&self) -> usize {
        self.revealed.iter().flatten().filter(|r| **r).count()
    }
}
