use crate::application::{App, AppMode};
use crate::infrastructure::FileRepository;
use crossterm::event::{KeyCode, KeyModifiers};
use tracing::debug;

pub struct InputHandler;

impl InputHandler {
    pub fn handle_key_event(app: &mut App, key: KeyCode, modifiers: KeyModifiers) {
        match app.mode {
            AppMode::Editing => Self::handle_editing_mode(app, key, modifiers),
            AppMode::Help => Self::handle_help_mode(app, key),
            AppMode::SaveAs => Self::handle_filename_input_mode(app, key, "save"),
            AppMode::LoadFile => Self::handle_filename_input_mode(app, key, "load"),
        }
    }

    fn handle_editing_mode(app: &mut App, key: KeyCode, modifiers: KeyModifiers) {
        if modifiers.contains(KeyModifiers::CONTROL) {
            match key {
                KeyCode::Char('s') => app.start_save_as(),
                KeyCode::Char('o') => app.start_load_file(),
                KeyCode::Char('y') => Self::copy_result(app),
                KeyCode::Home => {
                    app.cursor_row = 0;
                    app.cursor_col = 0;
                    app.ensure_cursor_visible();
                }
                KeyCode::End => {
                    app.cursor_row = app.lines.len() - 1;
                    app.move_end();
                    app.ensure_cursor_visible();
                }
                _ => {}
            }
            return;
        }

        match key {
            KeyCode::F(1) => app.show_help(),
            KeyCode::Char(c) => app.insert_char(c),
            KeyCode::Tab => {
                for _ in 0..4 {
                    app.insert_char(' ');
                }
            }
            KeyCode::Enter => app.insert_newline(),
            KeyCode::Backspace => app.backspace(),
            KeyCode::Delete => app.delete(),
            KeyCode::Left => app.move_left(),
            KeyCode::Right => app.move_right(),
            KeyCode::Up => app.move_up(),
            KeyCode::Down => app.move_down(),
            KeyCode::Home => app.move_home(),
            KeyCode::End => app.move_end(),
            KeyCode::PageUp => app.page_up(),
            KeyCode::PageDown => app.page_down(),
            _ => {}
        }
    }

    fn copy_result(app: &mut App) {
        let Some(text) = app.copy_text() else {
            app.status_message = Some("Nothing to copy on this line".to_string());
            return;
        };

        let copied = arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(text.clone()));
        app.status_message = Some(match copied {
            Ok(()) => format!("Copied {}", text),
            Err(e) => {
                debug!(error = %e, "Clipboard unavailable");
                format!("Copy failed: {}", e)
            }
        });
    }

    fn handle_help_mode(app: &mut App, key: KeyCode) {
        match key {
            KeyCode::Esc | KeyCode::F(1) | KeyCode::Char('q') => {
                app.close_help();
            }
            KeyCode::Up | KeyCode::Char('k') => {
                app.help_scroll = app.help_scroll.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                app.help_scroll += 1;
            }
            KeyCode::PageUp => {
                app.help_scroll = app.help_scroll.saturating_sub(5);
            }
            KeyCode::PageDown => {
                app.help_scroll += 5;
            }
            KeyCode::Home => {
                app.help_scroll = 0;
            }
            _ => {}
        }
    }

    fn handle_filename_input_mode(app: &mut App, key: KeyCode, mode: &str) {
        match key {
            KeyCode::Enter => match mode {
                "save" => {
                    let filename = app.get_filename();
                    let result = FileRepository::save_document(&app.content(), &filename);
                    app.set_save_result(result);
                }
                "load" => {
                    let filename = app.get_filename();
                    let result = FileRepository::load_document(&filename);
                    app.set_load_result(result);
                }
                _ => {}
            },
            KeyCode::Esc => {
                app.cancel_filename_input();
            }
            KeyCode::Backspace => {
                app.filename_backspace();
            }
            KeyCode::Left => {
                app.filename_cursor = app.filename_cursor.saturating_sub(1);
            }
            KeyCode::Right => {
                if app.filename_cursor < app.filename_input.chars().count() {
                    app.filename_cursor += 1;
                }
            }
            KeyCode::Home => {
                app.filename_cursor = 0;
            }
            KeyCode::End => {
                app.filename_cursor = app.filename_input.chars().count();
            }
            KeyCode::Char(c) => {
                app.filename_insert(c);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Engine, EngineConfig, Formatter};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn create_test_app() -> App {
        let engine = Arc::new(Engine::standard(EngineConfig::default()).unwrap());
        App::new(engine, Formatter::default())
    }

    fn press(app: &mut App, key: KeyCode) {
        InputHandler::handle_key_event(app, key, KeyModifiers::NONE);
    }

    fn type_str(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn test_typing_lines() {
        let mut app = create_test_app();
        type_str(&mut app, "6 * 7");
        press(&mut app, KeyCode::Enter);
        type_str(&mut app, "last / 2");

        assert_eq!(app.lines, vec!["6 * 7", "last / 2"]);
        assert_eq!(app.formatted_result(0).as_deref(), Some("42"));
        assert_eq!(app.formatted_result(1).as_deref(), Some("21"));
    }

    #[test]
    fn test_help_toggle() {
        let mut app = create_test_app();
        press(&mut app, KeyCode::F(1));
        assert_eq!(app.mode, AppMode::Help);

        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::PageDown);
        assert_eq!(app.help_scroll, 6);

        // typing in help mode does not edit the document
        press(&mut app, KeyCode::Char('q'));
        assert_eq!(app.mode, AppMode::Editing);
        assert_eq!(app.lines, vec![""]);
    }

    #[test]
    fn test_save_and_load_key_bindings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.math");
        let filename = path.to_str().unwrap().to_string();

        let mut app = create_test_app();
        type_str(&mut app, "x = 5");
        InputHandler::handle_key_event(&mut app, KeyCode::Char('s'), KeyModifiers::CONTROL);
        assert_eq!(app.mode, AppMode::SaveAs);

        app.filename_input.clear();
        app.filename_cursor = 0;
        type_str(&mut app, &filename);
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.mode, AppMode::Editing);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "x = 5\n");

        let mut other = create_test_app();
        InputHandler::handle_key_event(&mut other, KeyCode::Char('o'), KeyModifiers::CONTROL);
        assert_eq!(other.mode, AppMode::LoadFile);
        other.filename_input = filename.clone();
        press(&mut other, KeyCode::Enter);
        assert_eq!(other.lines, vec!["x = 5"]);
        assert_eq!(other.filename.as_deref(), Some(filename.as_str()));
    }

    #[test]
    fn test_escape_cancels_filename_prompt() {
        let mut app = create_test_app();
        InputHandler::handle_key_event(&mut app, KeyCode::Char('o'), KeyModifiers::CONTROL);
        press(&mut app, KeyCode::Backspace);
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.mode, AppMode::Editing);
        assert!(app.filename_input.is_empty());
    }

    #[test]
    fn test_copy_without_result() {
        let mut app = create_test_app();
        type_str(&mut app, "# just a note");
        InputHandler::handle_key_event(&mut app, KeyCode::Char('y'), KeyModifiers::CONTROL);
        assert_eq!(app.status_message.as_deref(), Some("Nothing to copy on this line"));
    }

    #[test]
    fn test_control_keys_do_not_insert() {
        let mut app = create_test_app();
        InputHandler::handle_key_event(&mut app, KeyCode::Char('x'), KeyModifiers::CONTROL);
        assert_eq!(app.lines, vec![""]);
        assert!(!app.dirty);
    }
}
