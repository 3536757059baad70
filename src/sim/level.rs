/// Map file loader.
///
/// ## Lookup (first hit wins):
///   1. The argument as a path
///   2. `<maps_dir>/<name>` and `<maps_dir>/<name>.txt`, with `maps_dir`
///      taken relative to the executable's directory, then the CWD
///
/// ## Format:
///   One row per line, all rows the same width. Trailing whitespace and
///   blank lines are ignored.
///
/// ## Legend:
///   '*' = Wall        '.' = Path        '?' = Exit
///   '@' = Theseus     '&' = Minotaur    '+' = Body

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::domain::map::Map;
use crate::error::LoadError;

// ══════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════

pub fn parse_map(content: &str) -> Result<Map, LoadError> {
    let rows: Vec<&str> = content
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .collect();
    Map::parse(&rows)
}

pub fn load_map(path: &Path) -> Result<Map, LoadError> {
    let content = std::fs::read_to_string(path)
        .map_err(|source| LoadError::Io { path: path.to_path_buf(), source })?;
    let map = parse_map(&content)?;
    debug!(path = %path.display(), width = map.width(), height = map.height(), "map loaded");
    Ok(map)
}

/// Turn a MAP argument into a file path. Falls back to the argument
/// itself so a missing file is reported under the name the user gave.
pub fn resolve_map_path(arg: &str, maps_dir: &Path) -> PathBuf {
    let direct = PathBuf::from(arg);
    if direct.is_file() {
        return direct;
    }
    if direct.components().count() == 1 {
        for base in search_dirs() {
            let dir = base.join(maps_dir);
            for candidate in [dir.join(arg), dir.join(format!("{arg}.txt"))] {
                if candidate.is_file() {
                    return candidate;
                }
            }
        }
    }
    direct
}

/// Display name for a map: its file stem.
pub fn level_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// `.txt` maps in a directory, sorted by name.
pub fn list_maps(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return vec![],
    };
    let mut maps: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|e| e == "txt"))
        .collect();
    maps.sort();
    maps
}

// ══════════════════════════════════════════════════════════════
// Search dirs
// ══════════════════════════════════════════════════════════════

/// Exe dir (symlinks resolved), then CWD.
fn search_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

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
