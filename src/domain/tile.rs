/// Cell symbols and their map-file glyphs.
/// Properties are queried via methods, not stored as flags,
/// so symbol semantics are centralized here.

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Default)]
pub enum Symbol {
    #[default]
    Wall,
    Path,
    Exit,
    Player,
    Minotaur,
    Dead, // a body, can be walked over
}

impl Symbol {
    /// Map-file glyph table. Kept apart from the enum itself so the
    /// storage format is not tied to discriminant values.
    const GLYPHS: [(Symbol, char); 6] = [
        (Symbol::Wall, '*'),
        (Symbol::Path, '.'),
        (Symbol::Exit, '?'),
        (Symbol::Player, '@'),
        (Symbol::Minotaur, '&'),
        (Symbol::Dead, '+'),
    ];

    pub fn from_char(ch: char) -> Option<Symbol> {
        Self::GLYPHS.iter().find(|(_, g)| *g == ch).map(|(s, _)| *s)
    }

    pub fn glyph(self) -> char {
        Self::GLYPHS
            .iter()
            .find(|(s, _)| *s == self)
            .map(|(_, g)| *g)
            .unwrap_or('*')
    }

    /// Can a character step onto this cell?
    pub fn is_walkable(self) -> bool {
        matches!(self, Symbol::Path | Symbol::Exit | Symbol::Dead)
    }
}
