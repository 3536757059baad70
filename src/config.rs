/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD), or from
/// an explicit path. Falls back to the built-in defaults if the file is
/// missing or incomplete. Command-line flags are applied on top in
/// `main`.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::SetupError;
use crate::sim::world::Roster;

// ── Public Config Struct ──

#[derive(Clone, Debug, PartialEq)]
pub struct GameConfig {
    pub rules: RulesConfig,
    pub display: DisplayConfig,
    pub maps_dir: PathBuf,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RulesConfig {
    pub max_moves: u32,
    pub player_health: u32,
    pub minotaur_health: u32,
    pub player_ai: String,
    pub minotaur_ai: String,
    pub seed: Option<u64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DisplayConfig {
    pub delay_ms: u64,
    pub interactive: bool,
    pub game_info: bool,
    pub color: bool,
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    rules: TomlRules,
    #[serde(default)]
    display: TomlDisplay,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlRules {
    #[serde(default = "default_max_moves")]
    max_moves: u32,
    #[serde(default = "default_player_health")]
    player_health: u32,
    #[serde(default = "default_minotaur_health")]
    minotaur_health: u32,
    #[serde(default = "default_ai")]
    player_ai: String,
    #[serde(default = "default_ai")]
    minotaur_ai: String,
    #[serde(default)]
    seed: Option<u64>,
}

#[derive(Deserialize, Debug)]
struct TomlDisplay {
    #[serde(default = "default_delay")]
    delay_ms: u64,
    #[serde(default = "default_true")]
    interactive: bool,
    #[serde(default)]
    game_info: bool,
    #[serde(default = "default_true")]
    color: bool,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_maps_dir")]
    maps_dir: String,
}

// ── Defaults ──

fn default_max_moves() -> u32 { 1000 }
fn default_player_health() -> u32 { 100 }
fn default_minotaur_health() -> u32 { 10 }
fn default_ai() -> String { "random".into() }
fn default_delay() -> u64 { 100 }   // ms between rounds in automatic mode
fn default_true() -> bool { true }
fn default_maps_dir() -> String { "maps".into() }

impl Default for TomlRules {
    fn default() -> Self {
        TomlRules {
            max_moves: default_max_moves(),
            player_health: default_player_health(),
            minotaur_health: default_minotaur_health(),
            player_ai: default_ai(),
            minotaur_ai: default_ai(),
            seed: None,
        }
    }
}

impl Default for TomlDisplay {
    fn default() -> Self {
        TomlDisplay {
            delay_ms: default_delay(),
            interactive: true,
            game_info: false,
            color: true,
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral { maps_dir: default_maps_dir() }
    }
}

impl From<TomlConfig> for GameConfig {
    fn from(t: TomlConfig) -> Self {
        GameConfig {
            rules: RulesConfig {
                max_moves: t.rules.max_moves.max(1),
                player_health: t.rules.player_health,
                minotaur_health: t.rules.minotaur_health,
                player_ai: t.rules.player_ai,
                minotaur_ai: t.rules.minotaur_ai,
                seed: t.rules.seed,
            },
            display: DisplayConfig {
                delay_ms: t.display.delay_ms,
                interactive: t.display.interactive,
                game_info: t.display.game_info,
                color: t.display.color,
            },
            maps_dir: PathBuf::from(t.general.maps_dir),
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        TomlConfig::default().into()
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        load_toml(&candidate_dirs()).into()
    }

    /// Load an explicitly requested file. Failing to read or parse it is fatal.
    pub fn load_from(path: &Path) -> Result<Self, SetupError> {
        let text = std::fs::read_to_string(path).map_err(|e| SetupError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::parse(&text).map_err(|e| SetupError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str::<TomlConfig>(text).map(Into::into)
    }

    /// Engine inputs.
    pub fn roster(&self) -> Roster {
        Roster {
            player_health: f64::from(self.rules.player_health),
            player_ai: self.rules.player_ai.clone(),
            minotaur_health: f64::from(self.rules.minotaur_health),
            minotaur_ai: self.rules.minotaur_ai.clone(),
            max_moves: self.rules.max_moves,
            seed: self.rules.seed,
        }
    }
}

/// Candidate directories to search: exe dir + CWD (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    // Resolve symlinks so an installed link still finds files next to
    // the real binary.
    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(text) => match toml::from_str::<TomlConfig>(&text) {
                    Ok(cfg) => return cfg,
                    Err(e) => {
                        warn!(path = %path.display(), "config.toml parse error, using defaults: {e}");
                        return TomlConfig::default();
                    }
                },
                Err(e) => {
                    warn!(path = %path.display(), "could not read config: {e}");
                }
            }
        }
    }
    TomlConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_the_classic_game() {
        let c = GameConfig::default();
        assert_eq!(c.rules.max_moves, 1000);
        assert_eq!(c.rules.player_health, 100);
        assert_eq!(c.rules.minotaur_health, 10);
        assert_eq!(c.rules.player_ai, "random");
        assert_eq!(c.display.delay_ms, 100);
        assert!(c.display.interactive);
        assert!(!c.display.game_info);
        assert_eq!(c.maps_dir, PathBuf::from("maps"));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let c = GameConfig::parse(
            r#"
            [rules]
            max_moves = 50
            minotaur_ai = "stationary"

            [display]
            interactive = false
            "#,
        )
        .unwrap();
        assert_eq!(c.rules.max_moves, 50);
        assert_eq!(c.rules.minotaur_ai, "stationary");
        assert_eq!(c.rules.player_ai, "random");
        assert!(!c.display.interactive);
        assert!(c.display.color);
    }

    #[test]
    fn zero_max_moves_is_raised_to_one() {
        let c = GameConfig::parse("[rules]\nmax_moves = 0\n").unwrap();
        assert_eq!(c.rules.max_moves, 1);
    }

    #[test]
    fn explicit_file_errors_are_fatal() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[rules").unwrap();
        assert!(matches!(GameConfig::load_from(f.path()), Err(SetupError::Config { .. })));

        let dir = tempfile::tempdir().unwrap();
        assert!(GameConfig::load_from(&dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn explicit_file_loads() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[rules]\nseed = 9\nplayer_health = 40").unwrap();
        let c = GameConfig::load_from(f.path()).unwrap();
        assert_eq!(c.rules.seed, Some(9));
        let r = c.roster();
        assert_eq!(r.player_health, 40.0);
        assert_eq!(r.seed, Some(9));
    }
}
