/// Presentation layer.
///
/// Two `Display` implementations:
///   - `TerminalRenderer`: the Game Master view on the alternate screen,
///     plus one view per player written to its own sink (another tty, a
///     file, or nowhere)
///   - `Headless`: no frames, rounds go to the log and endings are
///     printed as plain lines
///
/// How a terminal frame is drawn:
///   1. Compose the frame into the `front` buffer (a grid of Cell)
///   2. Compare each cell with the `back` buffer (previous frame)
///   3. Only emit terminal commands for cells that changed
///   4. All commands are batched with `queue!`, flushed once at the end
///   5. Swap front/back

use std::io::{self, BufWriter, Write};
use std::thread;
use std::time::Duration;

use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};
use tracing::{debug, info};

use crate::domain::compass::{Compass, Pos};
use crate::domain::entity::Role;
use crate::domain::map::{Map, Mask};
use crate::domain::tile::Symbol;
use crate::sim::ending::{fate_message, Banner, Ending};
use crate::sim::event::{FightOutcome, GameEvent, Who};
use crate::sim::world::World;

// ══════════════════════════════════════════════════════════════
// Display trait
// ══════════════════════════════════════════════════════════════

pub trait Display {
    /// First frame, before round 1.
    fn start(&mut self, world: &World) -> io::Result<()>;
    /// Animate one event of the round just played. Non-fight events are ignored.
    fn fight_event(&mut self, world: &World, event: &GameEvent) -> io::Result<()>;
    /// One frame per round: the GM view and every player view.
    fn refresh(&mut self, world: &World) -> io::Result<()>;
    /// Endings, once, after the last round.
    fn finish(&mut self, world: &World) -> io::Result<()>;
}

#[derive(Clone, Debug)]
pub struct ViewOptions {
    pub color: bool,
    pub game_info: bool,
    pub interactive: bool,
    pub delay_ms: u64,
}

// ── Palette ──

const PLAYER_COLOR: Color = Color::Red;
const EXIT_COLOR: Color = Color::Green;
const WALL_COLOR: Color = Color::Blue;
const PATH_COLOR: Color = Color::Yellow;
const MINOTAUR_COLOR: Color = Color::Magenta;
const TEXT_COLOR: Color = Color::Reset;
const INFO_COLOR: Color = Color::Magenta;
const ACCENT_COLOR: Color = Color::Cyan;
const MESSAGE_COLOR: Color = Color::Yellow;

fn symbol_color(sym: Symbol) -> Color {
    match sym {
        Symbol::Wall => WALL_COLOR,
        Symbol::Path => PATH_COLOR,
        Symbol::Exit => EXIT_COLOR,
        Symbol::Player => PLAYER_COLOR,
        Symbol::Minotaur => MINOTAUR_COLOR,
        Symbol::Dead => TEXT_COLOR,
    }
}

fn role_color(role: Role) -> Color {
    symbol_color(role.symbol())
}

// ── Artwork ──

const CREDITS: [&str; 6] = [
    r"______         _       _           ",
    r"|  _  \       | |     | |          ",
    r"| | | |___  __| | __ _| |_   _ ___ ",
    r"| | | / _ \/ _` |/ _` | | | | / __|",
    r"| |/ /  __/ (_| | (_| | | |_| \__ \",
    r"|___/ \___|\__,_|\__,_|_|\__,_|___/v2*3.14159265359...",
];

const GAME_OVER: [&str; 6] = [
    r" _____                        _____                ",
    r"|  __ \                      |  _  |               ",
    r"| |  \/ __ _ _ __ ___   ___  | | | |_   _____ _ __ ",
    r"| | __ / _` | '_ ` _ \ / _ \ | | | \ \ / / _ \ '__|",
    r"| |_\ \ (_| | | | | | |  __/ \ \_/ /\ V /  __/ |   ",
    r" \____/\__,_|_| |_| |_|\___|  \___/  \_/ \___|_|   ",
];

const TRY_AGAIN: [&str; 8] = [
    r" _______                               _        ",
    r"|__   __|             /\              (_)       ",
    r"   | |_ __ _   _     /  \   __ _  __ _ _ _ __   ",
    r"   | | '__| | | |   / /\ \ / _` |/ _` | | '_ \  ",
    r"   | | |  | |_| |  / ____ \ (_| | (_| | | | | | ",
    r"   |_|_|   \__, | /_/    \_\__, |\__,_|_|_| |_| ",
    r"            __/ |           __/ |               ",
    r"           |___/           |___/                ",
];

const CONGRATULATIONS: [&str; 8] = [
    r" _____                             _         _       _   _                 _ ",
    r"/  __ \                           | |       | |     | | (_)               | |",
    r"| /  \/ ___  _ __   __ _ _ __ __ _| |_ _   _| | __ _| |_ _  ___  _ __  ___| |",
    r"| |    / _ \| '_ \ / _` | '__/ _` | __| | | | |/ _` | __| |/ _ \| '_ \/ __| |",
    r"| \__/\ (_) | | | | (_| | | | (_| | |_| |_| | | (_| | |_| | (_) | | | \__ \_|",
    r" \____/\___/|_| |_|\__, |_|  \__,_|\__|\__,_|_|\__,_|\__|_|\___/|_| |_|___(_)",
    r"                    __/ |                                                    ",
    r"                   |___/                                                     ",
];

fn banner_art(banner: Banner) -> (&'static [&'static str], Color) {
    match banner {
        Banner::GameOver => (&GAME_OVER, MINOTAUR_COLOR),
        Banner::Congratulations => (&CONGRATULATIONS, EXIT_COLOR),
        Banner::TryAgain => (&TRY_AGAIN, WALL_COLOR),
    }
}

fn banner_title(banner: Banner) -> &'static str {
    match banner {
        Banner::GameOver => "Game Over",
        Banner::Congratulations => "Congratulations!",
        Banner::TryAgain => "Try again",
    }
}

// ══════════════════════════════════════════════════════════════
// Pure helpers
// ══════════════════════════════════════════════════════════════

/// Box-drawing glyph for a wall, picked from its wall neighbours.
/// Neighbours hidden by the mask do not count.
///
/// ┌──────────────┬───────┐
/// │ walls at     │ glyph │
/// ├──────────────┼───────┤
/// │ N E S W      │   ╬   │
/// │ N E S        │   ╠   │
/// │ N S W        │   ╣   │
/// │ N E W        │   ╩   │
/// │ E S W        │   ╦   │
/// │ E S / S W    │ ╔ / ╗ │
/// │ N E / N W    │ ╚ / ╝ │
/// │ N S / E W    │ ║ / ═ │
/// │ N / S        │ ╨ / ╥ │
/// │ E / W        │ ╞ / ╡ │
/// │ none         │   ╬   │
/// └──────────────┴───────┘
fn wall_glyph(map: &Map, mask: Option<&Mask>, pos: Pos) -> char {
    let wall = |dir: Compass| {
        map.neighbour(pos, dir)
            .filter(|p| mask.map_or(true, |m| m.is_revealed(*p)))
            .is_some_and(|p| map.get(p) == Some(Symbol::Wall))
    };
    let n = wall(Compass::North);
    let e = wall(Compass::East);
    let s = wall(Compass::South);
    let w = wall(Compass::West);

    match (n, e, s, w) {
        (true, true, true, true) => '╬',
        (true, true, true, false) => '╠',
        (true, false, true, true) => '╣',
        (true, true, false, true) => '╩',
        (false, true, true, true) => '╦',
        (false, true, true, false) => '╔',
        (false, false, true, true) => '╗',
        (true, true, false, false) => '╚',
        (true, false, false, true) => '╝',
        (true, false, true, false) => '║',
        (false, true, false, true) => '═',
        (true, false, false, false) => '╨',
        (false, false, true, false) => '╥',
        (false, true, false, false) => '╞',
        (false, false, false, true) => '╡',
        (false, false, false, false) => '╬',
    }
}

/// Health band name and colour. Bounds are strict.
fn health_category(health: f64) -> (&'static str, Color) {
    if health > 80.0 {
        ("excellent", Color::Green)
    } else if health > 60.0 {
        ("good", Color::Yellow)
    } else if health > 40.0 {
        ("average", Color::Magenta)
    } else if health > 20.0 {
        ("poor", Color::Blue)
    } else if health > 0.0 {
        ("danger", Color::Red)
    } else {
        ("dead", TEXT_COLOR)
    }
}

// ── Fight scene ──

const SCENE_LEN: usize = 14;
type Scene = [char; SCENE_LEN];

const CLASH_A: [char; 4] = ['|', '/', '-', '/'];
const CLASH_B: [char; 4] = ['\\', '-', '\\', '|'];

/// The two fighters walk in from both ends of the scene.
fn approach_frames(a: char, b: char) -> Vec<Scene> {
    let path = Symbol::Path.glyph();
    let mut scene = [path; SCENE_LEN];
    scene[0] = a;
    scene[SCENE_LEN - 1] = b;

    let mut frames = Vec::with_capacity(SCENE_LEN / 2);
    for i in 1..SCENE_LEN / 2 - 1 {
        scene[i - 1] = path;
        scene[i] = a;
        scene[SCENE_LEN - 1 - i] = b;
        scene[SCENE_LEN - i] = path;
        frames.push(scene);
    }
    frames
}

fn clash_frame(a: char, b: char, tick: usize) -> Scene {
    let mid = SCENE_LEN / 2;
    let mut scene = [Symbol::Path.glyph(); SCENE_LEN];
    scene[mid - 2] = a;
    scene[mid - 1] = CLASH_A[tick % CLASH_A.len()];
    scene[mid] = CLASH_B[tick % CLASH_B.len()];
    scene[mid + 1] = b;
    scene
}

/// Bodies for the fallen, arms up for the winner.
fn outcome_frame(a: char, b: char, a_down: bool, b_down: bool) -> Scene {
    let mid = SCENE_LEN / 2;
    let dead = Symbol::Dead.glyph();
    let mut scene = [Symbol::Path.glyph(); SCENE_LEN];
    match (a_down, b_down) {
        (true, true) => {
            scene[mid - 2] = dead;
            scene[mid + 1] = dead;
        }
        (true, false) => {
            scene[mid - 2] = dead;
            scene[mid] = '\\';
            scene[mid + 1] = b;
            scene[mid + 2] = '/';
        }
        _ => {
            scene[mid - 3] = '\\';
            scene[mid - 2] = a;
            scene[mid - 1] = '/';
            scene[mid + 1] = dead;
        }
    }
    scene
}

fn scene_color(ch: char) -> Color {
    Symbol::from_char(ch).map(symbol_color).unwrap_or(ACCENT_COLOR)
}

/// What a combatant reads once the fight is over.
fn fight_verdict(outcome: FightOutcome, me: Who) -> (&'static str, Color) {
    match outcome {
        FightOutcome::Draw => ("Double KO! You died but at least not alone... RIP!", MINOTAUR_COLOR),
        FightOutcome::Winner(w) if w == me => ("You have just defeated your opponent!", EXIT_COLOR),
        FightOutcome::Winner(_) => {
            ("Unfortunately, you were too weak to defeat your opponent... RIP!", MINOTAUR_COLOR)
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Frame composition
// ══════════════════════════════════════════════════════════════

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Cell {
    ch: char,
    fg: Color,
}

impl Cell {
    const BLANK: Cell = Cell { ch: ' ', fg: TEXT_COLOR };

    /// Sentinel used to invalidate the back buffer.
    /// Different from any real cell, so every position will be diff'd.
    const INVALID: Cell = Cell { ch: '\u{0}', fg: Color::Magenta };
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, cells: vec![Cell::BLANK; w * h] }
    }

    /// Returns true when the size changed.
    fn resize(&mut self, w: usize, h: usize) -> bool {
        if self.width == w && self.height == h {
            return false;
        }
        self.width = w;
        self.height = h;
        self.cells = vec![Cell::BLANK; w * h];
        true
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    /// Write a string at (x, y). Returns the column after the last char.
    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color) -> usize {
        let mut cx = x;
        for ch in s.chars() {
            if cx >= self.width {
                break;
            }
            self.set(cx, y, Cell { ch, fg });
            cx += 1;
        }
        cx
    }

    fn row(&self, y: usize) -> &[Cell] {
        &self.cells[y * self.width..(y + 1) * self.width]
    }

    /// Rows up to the last one holding something.
    fn used_rows(&self) -> usize {
        (0..self.height)
            .rev()
            .find(|&y| self.row(y).iter().any(|c| *c != Cell::BLANK))
            .map_or(0, |y| y + 1)
    }

    #[cfg(test)]
    fn row_text(&self, y: usize) -> String {
        self.row(y).iter().map(|c| c.ch).collect::<String>().trim_end().to_string()
    }
}

// ── Pen: writes a frame top to bottom ──

struct Pen<'a> {
    buf: &'a mut FrameBuffer,
    row: usize,
    color: bool,
}

impl<'a> Pen<'a> {
    fn new(buf: &'a mut FrameBuffer, color: bool) -> Self {
        Pen { buf, row: 0, color }
    }

    fn at(buf: &'a mut FrameBuffer, row: usize, color: bool) -> Self {
        Pen { buf, row, color }
    }

    fn tint(&self, fg: Color) -> Color {
        if self.color { fg } else { TEXT_COLOR }
    }

    /// One line per `\n`-separated part.
    fn line(&mut self, text: &str, fg: Color) {
        let fg = self.tint(fg);
        for part in text.split('\n') {
            self.buf.put_str(0, self.row, part, fg);
            self.row += 1;
        }
    }

    fn spans(&mut self, spans: &[(&str, Color)]) {
        let mut x = 0;
        for (text, fg) in spans {
            let fg = self.tint(*fg);
            x = self.buf.put_str(x, self.row, text, fg);
        }
        self.row += 1;
    }

    fn blank(&mut self) {
        self.row += 1;
    }

    /// Draw the grid. Hidden cells stay blank. Without colour the raw
    /// map glyphs are used.
    fn map(&mut self, map: &Map, mask: Option<&Mask>) {
        for y in 0..map.height() {
            for x in 0..map.width() {
                let pos = Pos::new(x, y);
                if mask.is_some_and(|m| !m.is_revealed(pos)) {
                    continue;
                }
                let Some(sym) = map.get(pos) else { continue };
                let cell = if !self.color {
                    Cell { ch: sym.glyph(), fg: TEXT_COLOR }
                } else if sym == Symbol::Wall {
                    Cell { ch: wall_glyph(map, mask, pos), fg: WALL_COLOR }
                } else {
                    Cell { ch: sym.glyph(), fg: symbol_color(sym) }
                };
                self.buf.set(x, self.row, cell);
            }
            self.row += 1;
        }
    }

    fn scene(&mut self, scene: &Scene) {
        for (x, &ch) in scene.iter().enumerate() {
            let fg = self.tint(scene_color(ch));
            self.buf.set(x, self.row, Cell { ch, fg });
        }
        self.row += 1;
    }

    fn health(&mut self, health: f64) {
        let (category, fg) = health_category(health);
        let value = format!("{:3.0}% ({category})", health.max(0.0));
        self.spans(&[("Health: ", TEXT_COLOR), (value.as_str(), fg)]);
    }

    fn ending(&mut self, ending: Ending) {
        if let Some(msg) = ending.message() {
            self.line(msg, MESSAGE_COLOR);
        }
        let (art, fg) = banner_art(ending.banner());
        for line in art {
            self.line(line, fg);
        }
    }
}

/// A fight frame being shown.
#[derive(Clone, Debug)]
struct FightView {
    a: Who,
    b: Who,
    health_a: f64,
    health_b: f64,
    scene: Scene,
    outcome: Option<FightOutcome>,
}

impl FightView {
    fn involves(&self, who: Who) -> bool {
        self.a == who || self.b == who
    }
}

/// Rows the GM frame needs with the full credits banner.
fn gm_rows(world: &World, opts: &ViewOptions) -> usize {
    let info = if opts.game_info { 5 } else { 1 };
    CREDITS.len() + info + 5 + world.map.height() + 5
}

/// Compose the Game Master frame. Returns the first free row.
fn compose_gm(
    buf: &mut FrameBuffer,
    world: &World,
    opts: &ViewOptions,
    fight: Option<&FightView>,
    prompt: Option<&str>,
) -> usize {
    buf.clear();
    let roomy = buf.height >= gm_rows(world, opts);
    let mut pen = Pen::new(buf, opts.color);

    if roomy {
        for line in CREDITS {
            pen.line(line, PLAYER_COLOR);
        }
    } else {
        pen.spans(&[("Dedalus", PLAYER_COLOR), (" v2*3.14159265359...", TEXT_COLOR)]);
    }
    if opts.game_info {
        pen.line(&format!("[Map: {}]", world.name), INFO_COLOR);
        pen.line(
            &format!("[Map: size is {} x {}]", world.map.width(), world.map.height()),
            INFO_COLOR,
        );
        pen.line(&format!("[Game settings: {} ms round delay]", opts.delay_ms), INFO_COLOR);
        pen.blank();
        pen.line("Let's play Game Master!", TEXT_COLOR);
    } else {
        pen.spans(&[("Let's play ", TEXT_COLOR), ("Game Master", ACCENT_COLOR)]);
    }
    pen.blank();

    let c = &world.census;
    pen.line(&format!("Round:                                    {}.", world.steps), TEXT_COLOR);
    pen.line(&format!("Number of player alive:                   {}.", c.players_alive), TEXT_COLOR);
    pen.line(&format!("Number of player still in the dedalus:    {}.", c.players_on_board), TEXT_COLOR);
    pen.line(&format!("Number of minotaurs still in the dedalus: {}.", c.minotaurs_alive), TEXT_COLOR);
    pen.map(&world.map, None);
    pen.blank();

    if let Some(f) = fight {
        let (a, b) = (world.character(f.a), world.character(f.b));
        let left = format!("{} {:.0}", a.name, f.health_a.max(0.0));
        let right = format!("{} {:.0}", b.name, f.health_b.max(0.0));
        pen.spans(&[
            (left.as_str(), role_color(a.role)),
            (" vs ", MESSAGE_COLOR),
            (right.as_str(), role_color(b.role)),
        ]);
        pen.scene(&f.scene);
        match f.outcome {
            Some(FightOutcome::Draw) => pen.line("Double KO!", MESSAGE_COLOR),
            Some(FightOutcome::Winner(w)) => {
                let name = &world.character(w).name;
                pen.line(&format!("{name} wins the fight!"), MESSAGE_COLOR);
            }
            None => {}
        }
    } else if let Some(p) = prompt {
        pen.line(p, TEXT_COLOR);
    }
    pen.row
}

/// Rows a player frame can take, endings included.
fn player_rows(world: &World) -> usize {
    CREDITS.len() + 7 + 4 + world.map.height() + 4 + CONGRATULATIONS.len() + 2
}

/// Compose one player's frame. Returns the first free row.
fn compose_player(
    buf: &mut FrameBuffer,
    world: &World,
    index: usize,
    opts: &ViewOptions,
    fight: Option<&FightView>,
) -> usize {
    buf.clear();
    let me = Who::theseus(index);
    let player = &world.players[index];
    let fight = fight.filter(|f| f.involves(me));
    let mut pen = Pen::new(buf, opts.color);

    for line in CREDITS {
        pen.line(line, PLAYER_COLOR);
    }
    if opts.game_info {
        pen.line(&format!("[Map: {}]", world.name), INFO_COLOR);
        pen.line(
            &format!("[Map: size is {} x {}]", world.map.width(), world.map.height()),
            INFO_COLOR,
        );
        pen.line(&format!("[Map: Player @ at: {}]", player.pos), INFO_COLOR);
        pen.line(&format!("[Game settings: {} steps max]", world.max_moves), INFO_COLOR);
        pen.line(&format!("[Game settings: {} ms round delay]", opts.delay_ms), INFO_COLOR);
        pen.blank();
        pen.line(&format!("Let's play {}!", player.policy_name()), TEXT_COLOR);
    } else {
        pen.spans(&[
            ("Artificial Intelligence by ", TEXT_COLOR),
            (player.policy_name(), ACCENT_COLOR),
        ]);
    }
    pen.blank();

    let target = format!(
        "Your target is ({} {}) at {:.0} m",
        player.target_dir.arrow(),
        player.target_dir.label(),
        player.target_dist
    );
    pen.line(&target, TEXT_COLOR);
    let health = match fight {
        Some(f) if f.a == me => f.health_a,
        Some(f) => f.health_b,
        None => player.health,
    };
    pen.health(health);
    if opts.game_info {
        let mut ariadne = String::from("@");
        for dir in player.trail.iter() {
            ariadne.push('-');
            ariadne.push_str(dir.label());
        }
        pen.line(&format!("Ariadne's string ({}): {ariadne}", player.trail.len()), INFO_COLOR);
    }
    pen.map(&world.map, Some(&player.mask));
    pen.blank();

    if let Some(f) = fight {
        let opponent = if f.a == me { f.b } else { f.a };
        let facing = format!(
            "You are facing {}! May enough force be with you...",
            world.character(opponent).name
        );
        pen.line(&facing, MESSAGE_COLOR);
        pen.scene(&f.scene);
        if let Some(outcome) = f.outcome {
            let (text, fg) = fight_verdict(outcome, me);
            pen.line(text, fg);
        }
    } else if let Some(msg) = player.fate.and_then(fate_message) {
        pen.line(msg, MESSAGE_COLOR);
    }
    pen.row
}

/// Write a frame as plain lines, no cursor addressing, trailing blanks trimmed.
fn dump<W: Write>(buf: &FrameBuffer, out: &mut W) -> io::Result<()> {
    for y in 0..buf.used_rows() {
        let row = buf.row(y);
        let end = row.iter().rposition(|c| *c != Cell::BLANK).map_or(0, |i| i + 1);
        let mut fg = TEXT_COLOR;
        for cell in &row[..end] {
            if cell.fg != fg {
                queue!(out, SetForegroundColor(cell.fg))?;
                fg = cell.fg;
            }
            queue!(out, Print(cell.ch))?;
        }
        queue!(out, ResetColor, Print("\r\n"))?;
    }
    out.flush()
}

// ══════════════════════════════════════════════════════════════
// Terminal renderer
// ══════════════════════════════════════════════════════════════

/// One output with its own pair of buffers.
struct Screen {
    writer: Box<dyn Write + Send>,
    front: FrameBuffer,
    back: FrameBuffer,
}

impl Screen {
    fn new(writer: Box<dyn Write + Send>, w: usize, h: usize) -> Self {
        let mut screen = Screen { writer, front: FrameBuffer::new(w, h), back: FrameBuffer::new(w, h) };
        screen.invalidate();
        screen
    }

    fn invalidate(&mut self) {
        self.back.cells.fill(Cell::INVALID);
    }

    /// Returns true when the size changed; the next frame is then a full repaint.
    fn resize(&mut self, w: usize, h: usize) -> bool {
        let changed = self.front.resize(w, h);
        self.back.resize(w, h);
        if changed {
            self.invalidate();
        }
        changed
    }

    fn present(&mut self) -> io::Result<()> {
        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = TEXT_COLOR;
        // Where the terminal cursor sits after the last Print.
        let mut cursor: Option<(usize, usize)> = None;

        queue!(self.writer, ResetColor)?;
        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) {
                    continue;
                }
                if cursor != Some((x, y)) {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                queue!(self.writer, Print(cell.ch))?;
                cursor = Some((x + 1, y));
            }
        }
        queue!(self.writer, ResetColor)?;
        self.writer.flush()
    }

    /// Leave the cursor under the last frame.
    fn park(&mut self, row: usize) -> io::Result<()> {
        queue!(self.writer, MoveTo(0, row as u16), ResetColor, cursor::Show)?;
        self.writer.flush()
    }
}

pub struct TerminalRenderer {
    opts: ViewOptions,
    gm: Screen,
    players: Vec<Option<Screen>>,
    fight: Option<FightView>,
    /// Raw mode and alternate screen are on.
    active: bool,
}

impl TerminalRenderer {
    /// `sinks` feed the players' views in setup order. Players without a
    /// sink get no view.
    pub fn new(opts: ViewOptions, sinks: Vec<Box<dyn Write + Send>>, world: &World) -> Self {
        let width = world.map.width().max(CONGRATULATIONS[0].len());
        let height = player_rows(world);
        let mut sinks = sinks.into_iter();
        let players = world
            .players
            .iter()
            .map(|_| sinks.next().map(|sink| Screen::new(sink, width, height)))
            .collect();
        let stdout: Box<dyn Write + Send> = Box::new(BufWriter::with_capacity(16384, io::stdout()));

        TerminalRenderer { opts, gm: Screen::new(stdout, 0, 0), players, fight: None, active: false }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        self.active = true;
        execute!(self.gm.writer, terminal::EnterAlternateScreen, cursor::Hide, Clear(ClearType::All))?;
        for screen in self.players.iter_mut().flatten() {
            execute!(screen.writer, Clear(ClearType::All), cursor::Hide)?;
        }
        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        execute!(self.gm.writer, ResetColor, cursor::Show, terminal::LeaveAlternateScreen)?;
        terminal::disable_raw_mode()
    }

    fn draw(&mut self, world: &World) -> io::Result<()> {
        self.draw_gm(world)?;
        for i in 0..self.players.len() {
            self.draw_player(world, i)?;
        }
        Ok(())
    }

    fn draw_gm(&mut self, world: &World) -> io::Result<()> {
        // Detect terminal resize
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if self.gm.resize(tw as usize, th as usize) {
            queue!(self.gm.writer, Clear(ClearType::All))?;
        }

        let prompt = if self.opts.interactive {
            "Press any key for the next round, q to quit."
        } else {
            "Press q to quit."
        };
        compose_gm(&mut self.gm.front, world, &self.opts, self.fight.as_ref(), Some(prompt));
        self.gm.present()
    }

    fn draw_player(&mut self, world: &World, index: usize) -> io::Result<()> {
        if let Some(screen) = self.players[index].as_mut() {
            compose_player(&mut screen.front, world, index, &self.opts, self.fight.as_ref());
            screen.present()?;
        }
        Ok(())
    }

    /// Show the current fight frame to the GM and the combatants, then pause.
    fn stage(&mut self, world: &World, view: FightView) -> io::Result<()> {
        let (a, b) = (view.a, view.b);
        self.fight = Some(view);
        self.draw_gm(world)?;
        for who in [a, b] {
            if who.role == Role::Theseus {
                self.draw_player(world, who.index)?;
            }
        }
        thread::sleep(Duration::from_millis(self.opts.delay_ms));
        Ok(())
    }
}

impl Display for TerminalRenderer {
    fn start(&mut self, world: &World) -> io::Result<()> {
        self.init()?;
        self.draw(world)
    }

    fn fight_event(&mut self, world: &World, event: &GameEvent) -> io::Result<()> {
        let glyph = |who: Who| world.character(who).role.symbol().glyph();
        match *event {
            GameEvent::FightStarted { a, b, health_a, health_b } => {
                for scene in approach_frames(glyph(a), glyph(b)) {
                    self.stage(world, FightView { a, b, health_a, health_b, scene, outcome: None })?;
                }
            }
            GameEvent::FightTick { a, b, tick, health_a, health_b } => {
                let scene = clash_frame(glyph(a), glyph(b), tick);
                self.stage(world, FightView { a, b, health_a, health_b, scene, outcome: None })?;
            }
            GameEvent::FightEnded { a, b, health_a, health_b, outcome } => {
                let scene = outcome_frame(glyph(a), glyph(b), health_a <= 0.0, health_b <= 0.0);
                let view = FightView { a, b, health_a, health_b, scene, outcome: Some(outcome) };
                self.stage(world, view)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn refresh(&mut self, world: &World) -> io::Result<()> {
        self.fight = None;
        self.draw(world)
    }

    fn finish(&mut self, world: &World) -> io::Result<()> {
        self.fight = None;

        for (i, slot) in self.players.iter_mut().enumerate() {
            if let Some(screen) = slot.as_mut() {
                let row = compose_player(&mut screen.front, world, i, &self.opts, None);
                let mut pen = Pen::at(&mut screen.front, row, self.opts.color);
                pen.ending(world.player_ending(i));
                let end = pen.row;
                screen.present()?;
                screen.park(end)?;
            }
        }

        // The GM ending is printed on the normal screen so it stays visible.
        self.cleanup()?;
        let mut buf = FrameBuffer::new(
            world.map.width().max(CONGRATULATIONS[0].len()),
            gm_rows(world, &self.opts) + CONGRATULATIONS.len() + 2,
        );
        let row = compose_gm(&mut buf, world, &self.opts, None, None);
        let mut pen = Pen::at(&mut buf, row, self.opts.color);
        pen.ending(world.gm_ending());
        dump(&buf, &mut self.gm.writer)
    }
}

impl Drop for TerminalRenderer {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

// ══════════════════════════════════════════════════════════════
// Headless renderer
// ══════════════════════════════════════════════════════════════

/// No terminal UI. Endings are written as plain text to `out`.
pub struct Headless<W: Write> {
    out: W,
}

impl<W: Write> Headless<W> {
    pub fn new(out: W) -> Self {
        Headless { out }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Display for Headless<W> {
    fn start(&mut self, world: &World) -> io::Result<()> {
        info!(
            map = %world.name,
            players = world.players.len(),
            minotaurs = world.minotaurs.len(),
            "game started"
        );
        Ok(())
    }

    fn fight_event(&mut self, world: &World, event: &GameEvent) -> io::Result<()> {
        if let GameEvent::FightEnded { a, b, outcome, .. } = *event {
            let winner = match outcome {
                FightOutcome::Draw => "nobody",
                FightOutcome::Winner(w) => world.character(w).name.as_str(),
            };
            info!(?a, ?b, winner, "fight over");
        }
        Ok(())
    }

    fn refresh(&mut self, world: &World) -> io::Result<()> {
        let c = &world.census;
        debug!(
            step = world.steps,
            alive = c.players_alive,
            on_board = c.players_on_board,
            minotaurs = c.minotaurs_alive,
            "round"
        );
        Ok(())
    }

    fn finish(&mut self, world: &World) -> io::Result<()> {
        writeln!(self.out, "Dedalus {}: {} rounds", world.name, world.steps)?;
        for (i, player) in world.players.iter().enumerate() {
            if let Some(msg) = player.fate.and_then(fate_message) {
                writeln!(self.out, "{} {}: {}", player.name, i + 1, msg.replace('\n', " "))?;
            }
            let ending = world.player_ending(i);
            writeln!(self.out, "{} {}: {}", player.name, i + 1, describe(ending))?;
        }
        writeln!(self.out, "Game Master: {}", describe(world.gm_ending()))?;
        self.out.flush()
    }
}

fn describe(ending: Ending) -> String {
    let title = banner_title(ending.banner());
    match ending.message() {
        Some(msg) => format!("{msg} {title}"),
        None => title.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ai::Stationary;
    use crate::sim::step::round;
    use crate::sim::world::Roster;

    fn map_from(rows: &[&str]) -> Map {
        Map::parse(rows).unwrap()
    }

    fn still(rows: &[&str]) -> World {
        World::with_policies("test", map_from(rows), &Roster::default(), |_, _| Ok(Box::new(Stationary)))
            .unwrap()
    }

    fn opts(color: bool) -> ViewOptions {
        ViewOptions { color, game_info: false, interactive: false, delay_ms: 0 }
    }

    fn text(scene: &Scene) -> String {
        scene.iter().collect()
    }

    #[test]
    fn wall_glyph_follows_neighbours() {
        let map = map_from(&["***", "*.*", "***"]);
        assert_eq!(wall_glyph(&map, None, Pos::new(0, 0)), '╔');
        assert_eq!(wall_glyph(&map, None, Pos::new(1, 0)), '═');
        assert_eq!(wall_glyph(&map, None, Pos::new(2, 2)), '╝');
        assert_eq!(wall_glyph(&map, None, Pos::new(0, 1)), '║');
    }

    #[test]
    fn hidden_walls_do_not_connect() {
        let map = map_from(&["***", "*.*", "***"]);
        let mut mask = Mask::for_map(&map);
        mask.reveal_around(Pos::new(0, 0));
        // (1,0) and (0,1) are revealed, so the corner still connects.
        assert_eq!(wall_glyph(&map, Some(&mask), Pos::new(0, 0)), '╔');
        // (2,0) is still hidden.
        assert_eq!(wall_glyph(&map, Some(&mask), Pos::new(1, 0)), '╡');
    }

    #[test]
    fn health_bands() {
        assert_eq!(health_category(100.0).0, "excellent");
        assert_eq!(health_category(80.0).0, "good");
        assert_eq!(health_category(60.5).0, "good");
        assert_eq!(health_category(41.0).0, "average");
        assert_eq!(health_category(21.0).0, "poor");
        assert_eq!(health_category(0.5).0, "danger");
        assert_eq!(health_category(0.0).0, "dead");
        assert_eq!(health_category(-3.0).0, "dead");
    }

    #[test]
    fn fighters_walk_to_the_middle() {
        let frames = approach_frames('@', '&');
        assert_eq!(frames.len(), 5);
        assert_eq!(text(&frames[0]), ".@..........&.");
        assert_eq!(text(&frames[4]), ".....@..&.....");
    }

    #[test]
    fn clash_cycles_every_four_ticks() {
        assert_eq!(text(&clash_frame('@', '&', 0)), ".....@|\\&.....");
        assert_eq!(text(&clash_frame('@', '&', 1)), ".....@/-&.....");
        assert_eq!(clash_frame('@', '&', 2), clash_frame('@', '&', 6));
    }

    #[test]
    fn outcome_frames() {
        assert_eq!(text(&outcome_frame('@', '&', true, true)), ".....+..+.....");
        assert_eq!(text(&outcome_frame('@', '&', true, false)), ".....+.\\&/....");
        assert_eq!(text(&outcome_frame('@', '&', false, true)), "....\\@/.+.....");
    }

    #[test]
    fn verdict_depends_on_the_reader() {
        let me = Who::theseus(0);
        let foe = Who::minotaur(0);
        assert!(fight_verdict(FightOutcome::Winner(me), me).0.contains("defeated"));
        assert!(fight_verdict(FightOutcome::Winner(foe), me).0.contains("too weak"));
        assert!(fight_verdict(FightOutcome::Draw, me).0.contains("Double KO"));
    }

    #[test]
    fn gm_frame_shows_counters_and_map() {
        let world = still(&["*****", "*@.?*", "*****"]);
        let mut buf = FrameBuffer::new(80, 60);
        compose_gm(&mut buf, &world, &opts(false), None, Some("Press q to quit."));

        let rows: Vec<String> = (0..buf.used_rows()).map(|y| buf.row_text(y)).collect();
        assert_eq!(rows[0], CREDITS[0].trim_end());
        assert!(rows.iter().any(|r| r == "Number of player alive:                   1."));
        assert!(rows.iter().any(|r| r == "Number of minotaurs still in the dedalus: 0."));
        assert!(rows.iter().any(|r| r == "*@.?*"));
        assert_eq!(rows.last().map(String::as_str), Some("Press q to quit."));
    }

    #[test]
    fn small_terminal_gets_a_one_line_title() {
        let world = still(&["*****", "*@.?*", "*****"]);
        let mut buf = FrameBuffer::new(80, 12);
        compose_gm(&mut buf, &world, &opts(false), None, None);
        assert!(buf.row_text(0).starts_with("Dedalus"));
    }

    #[test]
    fn coloured_walls_use_box_drawing() {
        let world = still(&["*****", "*@.?*", "*****"]);
        let mut buf = FrameBuffer::new(80, 60);
        compose_gm(&mut buf, &world, &opts(true), None, None);
        let rows: Vec<String> = (0..buf.used_rows()).map(|y| buf.row_text(y)).collect();
        assert!(rows.iter().any(|r| r == "╔═══╗"));
        assert!(rows.iter().any(|r| r == "║@.?║"));
    }

    #[test]
    fn player_frame_is_masked() {
        let world = still(&["*******", "*@...?*", "*******"]);
        let mut buf = FrameBuffer::new(80, player_rows(&world));
        compose_player(&mut buf, &world, 0, &opts(false), None);

        let rows: Vec<String> = (0..buf.used_rows()).map(|y| buf.row_text(y)).collect();
        assert!(rows.iter().any(|r| r == "Artificial Intelligence by stationary"));
        assert!(rows.iter().any(|r| r == "Health: 100% (excellent)"));
        assert!(rows.iter().any(|r| r.starts_with("Your target is (→ E) at")));
        // Only the 3x3 block around the start is known.
        assert!(rows.iter().any(|r| r == "*@."));
        assert!(!rows.iter().any(|r| r.contains('?')));
    }

    #[test]
    fn info_view_shows_the_trail() {
        let mut world = still(&["*******", "*@...?*", "*******"]);
        world.players[0].step(&mut world.map, Compass::East);
        world.players[0].step(&mut world.map, Compass::East);
        let info = ViewOptions { game_info: true, ..opts(false) };
        let mut buf = FrameBuffer::new(80, player_rows(&world));
        compose_player(&mut buf, &world, 0, &info, None);

        let rows: Vec<String> = (0..buf.used_rows()).map(|y| buf.row_text(y)).collect();
        assert!(rows.iter().any(|r| r == "[Map: Player @ at: (3,1)]"));
        assert!(rows.iter().any(|r| r == "Ariadne's string (2): @-E-E"));
        assert!(rows.iter().any(|r| r == "Let's play stationary!"));
    }

    #[test]
    fn player_frame_shows_their_fight() {
        let world = still(&["******", "*@&.?*", "******"]);
        let view = FightView {
            a: Who::theseus(0),
            b: Who::minotaur(0),
            health_a: 42.0,
            health_b: 3.0,
            scene: clash_frame('@', '&', 0),
            outcome: None,
        };
        let mut buf = FrameBuffer::new(80, player_rows(&world));
        compose_player(&mut buf, &world, 0, &opts(false), Some(&view));

        let rows: Vec<String> = (0..buf.used_rows()).map(|y| buf.row_text(y)).collect();
        assert!(rows.iter().any(|r| r == "Health:  42% (average)"));
        assert!(rows.iter().any(|r| r == "You are facing Minotaur! May enough force be with you..."));
        assert!(rows.iter().any(|r| *r == text(&view.scene)));
    }

    #[test]
    fn dump_trims_trailing_blanks() {
        let mut buf = FrameBuffer::new(10, 4);
        buf.put_str(0, 0, "ab", TEXT_COLOR);
        buf.put_str(0, 1, "c", TEXT_COLOR);
        let mut out = Vec::new();
        dump(&buf, &mut out).unwrap();
        let s = String::from_utf8(out).unwrap();
        assert!(s.contains("ab"));
        assert_eq!(s.matches("\r\n").count(), 2);
    }

    #[test]
    fn headless_prints_endings() {
        let mut world = still(&["****", "*@?*", "****"]);
        world.players[0].step(&mut world.map, Compass::East);
        let event = world.exit(Who::theseus(0), crate::domain::entity::Fate::Escape);
        assert!(matches!(event, GameEvent::Exited { .. }));

        let mut display = Headless::new(Vec::new());
        display.start(&world).unwrap();
        display.refresh(&world).unwrap();
        display.finish(&world).unwrap();

        let out = String::from_utf8(display.into_inner()).unwrap();
        assert!(out.starts_with("Dedalus test: 0 rounds"));
        assert!(out.contains("Theseus 1: You found the way to the next level!"));
        assert!(out.contains("Theseus 1: Congratulations!"));
        assert!(out.contains("Game Master: Some players escaped your evil plan! Game Over"));
    }

    #[test]
    fn headless_logs_fights_without_output() {
        let mut world = still(&["*****", "*@&?*", "*****"]);
        let events = round(&mut world);
        let mut display = Headless::new(Vec::new());
        for e in &events {
            display.fight_event(&world, e).unwrap();
        }
        assert!(display.into_inner().is_empty());
    }
}
