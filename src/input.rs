//! Key bindings: normal and vim-style, plus the classic a/d/w/s layout.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Action from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    MoveLeft,
    MoveRight,
    Rotate,
    SoftDrop,
    Reset,
    Pause,
    Quit,
    None,
}

/// Map key event to game action. Supports normal (arrows), vim (hjkl) and
/// the classic a/d/w/s/z layout.
pub fn key_to_action(key: KeyEvent) -> Action {
    let KeyEvent { code, modifiers, .. } = key;
    let no_mod = modifiers.is_empty() || modifiers == KeyModifiers::SHIFT;
    if !no_mod {
        return Action::None;
    }
    match code {
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Char('p') => Action::Pause,
        KeyCode::Char('r') => Action::Reset,
        KeyCode::Left | KeyCode::Char('h') | KeyCode::Char('a') => Action::MoveLeft,
        KeyCode::Right | KeyCode::Char('l') | KeyCode::Char('d') => Action::MoveRight,
        KeyCode::Up | KeyCode::Char('k') | KeyCode::Char('w') | KeyCode::Char('z') => Action::Rotate,
        KeyCode::Down | KeyCode::Char('j') | KeyCode::Char('s') => Action::SoftDrop,
        _ => Action::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_normal_bindings() {
        assert_eq!(key_to_action(press(KeyCode::Left)), Action::MoveLeft);
        assert_eq!(key_to_action(press(KeyCode::Up)), Action::Rotate);
        assert_eq!(key_to_action(press(KeyCode::Down)), Action::SoftDrop);
        assert_eq!(key_to_action(press(KeyCode::Char('r'))), Action::Reset);
        assert_eq!(key_to_action(press(KeyCode::Esc)), Action::Quit);
    }

    #[test]
    fn test_classic_bindings() {
        assert_eq!(key_to_action(press(KeyCode::Char('a'))), Action::MoveLeft);
        assert_eq!(key_to_action(press(KeyCode::Char('d'))), Action::MoveRight);
        assert_eq!(key_to_action(press(KeyCode::Char('z'))), Action::Rotate);
        assert_eq!(key_to_action(press(KeyCode::Char('s'))), Action::SoftDrop);
    }

    #[test]
    fn test_modified_keys_do_nothing() {
        let key = KeyEvent::new(KeyCode::Char('a'), KeyModifiers::CONTROL);
        assert_eq!(key_to_action(key), Action::None);
    }
}
