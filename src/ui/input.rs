/// Keyboard pacing for the Game Master loop.
///
/// Interactive mode blocks on a key between rounds; automatic mode
/// sleeps the round delay while watching for an abort key.
/// Abort keys: `q`, `Esc`, `Ctrl-C`. The terminal is in raw mode while
/// the UI runs, so Ctrl-C arrives as a key event, not a signal.

use std::io;
use std::time::{Duration, Instant};

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// What the player asked for between two rounds.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Signal {
    Continue,
    Quit,
}

/// Block until a key is pressed.
pub fn wait_key() -> io::Result<Signal> {
    loop {
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Release {
                continue;
            }
            return Ok(if is_quit(&key) { Signal::Quit } else { Signal::Continue });
        }
    }
}

/// Wait `timeout`, returning early with `Quit` if an abort key arrives.
/// Other keys are swallowed.
pub fn poll_quit(timeout: Duration) -> io::Result<Signal> {
    let deadline = Instant::now() + timeout;
    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() || !poll(left)? {
            return Ok(Signal::Continue);
        }
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Release && is_quit(&key) {
                return Ok(Signal::Quit);
            }
        }
    }
}

fn is_quit(key: &KeyEvent) -> bool {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => true,
        KeyCode::Char('c') | KeyCode::Char('C') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn abort_keys() {
        assert!(is_quit(&key(KeyCode::Char('q'), KeyModifiers::NONE)));
        assert!(is_quit(&key(KeyCode::Esc, KeyModifiers::NONE)));
        assert!(is_quit(&key(KeyCode::Char('c'), KeyModifiers::CONTROL)));
    }

    #[test]
    fn other_keys_continue() {
        assert!(!is_quit(&key(KeyCode::Char('c'), KeyModifiers::NONE)));
        assert!(!is_quit(&key(KeyCode::Enter, KeyModifiers::NONE)));
        assert!(!is_quit(&key(KeyCode::Char(' '), KeyModifiers::NONE)));
    }
}
