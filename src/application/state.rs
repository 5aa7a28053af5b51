//! Application state management for the terminal notepad.
//!
//! This module contains the main application state and mode management
//! for the terminal user interface.

use std::sync::Arc;

use crate::domain::{CurrencyStatus, Engine, Formatter, Value};

use super::document::{MathDocument, ResultSet};

pub const DEFAULT_FILENAME: &str = "notes.math";

/// Represents the current mode of the application.
///
/// The application can be in different modes that determine how user input
/// is interpreted and what UI elements are displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// Typing into the document
    Editing,
    /// Help screen is displayed
    Help,
    /// Save dialog is open
    SaveAs,
    /// Load dialog is open
    LoadFile,
}

/// Main application state containing the document text and UI state.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use mathpad::application::App;
/// use mathpad::domain::{Engine, EngineConfig, Formatter};
///
/// let engine = Arc::new(Engine::standard(EngineConfig::default()).unwrap());
/// let mut app = App::new(engine, Formatter::default());
/// app.set_content("2 + 2");
/// assert_eq!(app.formatted_result(0).as_deref(), Some("4"));
/// ```
#[derive(Debug)]
pub struct App {
    /// Lines of the document; never empty
    pub lines: Vec<String>,
    /// Line holding the cursor (zero-based)
    pub cursor_row: usize,
    /// Cursor column in characters
    pub cursor_col: usize,
    /// First line visible in the viewport
    pub scroll_row: usize,
    /// Current application mode
    pub mode: AppMode,
    /// Current filename (if file has been saved/loaded)
    pub filename: Option<String>,
    /// Scroll position in help text
    pub help_scroll: usize,
    /// Temporary status message to display
    pub status_message: Option<String>,
    /// Input buffer for filename entry
    pub filename_input: String,
    /// Cursor position within the filename input
    pub filename_cursor: usize,
    /// Viewport height in lines (for scrolling calculations)
    pub viewport_rows: usize,
    /// Unsaved changes exist
    pub dirty: bool,
    document: MathDocument,
    formatter: Formatter,
    evaluated_with: CurrencyStatus,
}

impl App {
    pub fn new(engine: Arc<Engine>, formatter: Formatter) -> Self {
        Self::with_document(MathDocument::new(engine), formatter)
    }

    pub fn with_document(document: MathDocument, formatter: Formatter) -> Self {
        let evaluated_with = document.engine().currency_status();
        Self {
            lines: vec![String::new()],
            cursor_row: 0,
            cursor_col: 0,
            scroll_row: 0,
            mode: AppMode::Editing,
            filename: None,
            help_scroll: 0,
            status_message: None,
            filename_input: String::new(),
            filename_cursor: 0,
            viewport_rows: 20,
            dirty: false,
            document,
            formatter,
            evaluated_with,
        }
    }

    /// Replaces the whole document and re-evaluates it.
    pub fn set_content(&mut self, text: &str) {
        self.lines = text.lines().map(str::to_string).collect();
        if self.lines.is_empty() {
            self.lines.push(String::new());
        }
        self.cursor_row = 0;
        self.cursor_col = 0;
        self.scroll_row = 0;
        self.dirty = false;
        self.recalculate();
    }

    pub fn content(&self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }

    /// Runs a full evaluation pass over the current lines.
    pub fn recalculate(&mut self) {
        self.evaluated_with = self.document.engine().currency_status();
        self.document.evaluate(&self.lines);
    }

    /// Re-evaluates if currency rates arrived since the last pass. Returns
    /// whether a pass ran.
    pub fn refresh(&mut self) -> bool {
        if self.document.engine().currency_status() == self.evaluated_with {
            return false;
        }
        self.recalculate();
        true
    }

    pub fn results(&self) -> &ResultSet {
        self.document.results()
    }

    pub fn result(&self, line: usize) -> Option<&Value> {
        self.document.results().get(&line)
    }

    pub fn formatted_result(&self, line: usize) -> Option<String> {
        self.result(line).map(|value| self.formatter.format(value))
    }

    pub fn currency_status(&self) -> CurrencyStatus {
        self.document.engine().currency_status()
    }

    /// Text placed on the clipboard: the current line's result, if any.
    pub fn copy_text(&self) -> Option<String> {
        self.formatted_result(self.cursor_row)
    }

    pub fn current_line(&self) -> &str {
        &self.lines[self.cursor_row]
    }

    fn byte_index(&self, col: usize) -> usize {
        let line = self.current_line();
        line.char_indices()
            .nth(col)
            .map(|(index, _)| index)
            .unwrap_or(line.len())
    }

    fn line_chars(&self) -> usize {
        self.current_line().chars().count()
    }

    fn edited(&mut self) {
        self.dirty = true;
        self.status_message = None;
        self.recalculate();
    }

    pub fn insert_char(&mut self, c: char) {
        let index = self.byte_index(self.cursor_col);
        self.lines[self.cursor_row].insert(index, c);
        self.cursor_col += 1;
        self.edited();
    }

    /// Splits the current line at the cursor.
    pub fn insert_newline(&mut self) {
        let index = self.byte_index(self.cursor_col);
        let rest = self.lines[self.cursor_row].split_off(index);
        self.lines.insert(self.cursor_row + 1, rest);
        self.cursor_row += 1;
        self.cursor_col = 0;
        self.ensure_cursor_visible();
        self.edited();
    }

    /// Deletes the character before the cursor, joining lines at column 0.
    pub fn backspace(&mut self) {
        if self.cursor_col > 0 {
            let index = self.byte_index(self.cursor_col - 1);
            self.lines[self.cursor_row].remove(index);
            self.cursor_col -= 1;
        } else if self.cursor_row > 0 {
            let line = self.lines.remove(self.cursor_row);
            self.cursor_row -= 1;
            self.cursor_col = self.line_chars();
            self.lines[self.cursor_row].push_str(&line);
            self.ensure_cursor_visible();
        } else {
            return;
        }
        self.edited();
    }

    /// Deletes the character under the cursor, joining lines at the end.
    pub fn delete(&mut self) {
        if self.cursor_col < self.line_chars() {
            let index = self.byte_index(self.cursor_col);
            self.lines[self.cursor_row].remove(index);
        } else if self.cursor_row + 1 < self.lines.len() {
            let next = self.lines.remove(self.cursor_row + 1);
            self.lines[self.cursor_row].push_str(&next);
        } else {
            return;
        }
        self.edited();
    }

    pub fn move_left(&mut self) {
        if self.cursor_col > 0 {
            self.cursor_col -= 1;
        } else if self.cursor_row > 0 {
            self.cursor_row -= 1;
            self.cursor_col = self.line_chars();
        }
        self.ensure_cursor_visible();
    }

    pub fn move_right(&mut self) {
        if self.cursor_col < self.line_chars() {
            self.cursor_col += 1;
        } else if self.cursor_row + 1 < self.lines.len() {
            self.cursor_row += 1;
            self.cursor_col = 0;
        }
        self.ensure_cursor_visible();
    }

    pub fn move_up(&mut self) {
        if self.cursor_row > 0 {
            self.cursor_row -= 1;
            self.cursor_col = self.cursor_col.min(self.line_chars());
        }
        self.ensure_cursor_visible();
    }

    pub fn move_down(&mut self) {
        if self.cursor_row + 1 < self.lines.len() {
            self.cursor_row += 1;
            self.cursor_col = self.cursor_col.min(self.line_chars());
        }
        self.ensure_cursor_visible();
    }

    pub fn move_home(&mut self) {
        self.cursor_col = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor_col = self.line_chars();
    }

    pub fn page_up(&mut self) {
        for _ in 0..self.viewport_rows.max(1) {
            self.move_up();
        }
    }

    pub fn page_down(&mut self) {
        for _ in 0..self.viewport_rows.max(1) {
            self.move_down();
        }
    }

    /// Adjusts scroll position so the cursor line is visible.
    pub fn ensure_cursor_visible(&mut self) {
        let rows = self.viewport_rows.max(1);
        if self.cursor_row < self.scroll_row {
            self.scroll_row = self.cursor_row;
        } else if self.cursor_row >= self.scroll_row + rows {
            self.scroll_row = self.cursor_row + 1 - rows;
        }
    }

    pub fn show_help(&mut self) {
        self.mode = AppMode::Help;
        self.help_scroll = 0;
    }

    pub fn close_help(&mut self) {
        self.mode = AppMode::Editing;
    }

    /// Switches to save-as mode to prompt for a filename.
    ///
    /// Initializes the filename input with the current filename or default.
    pub fn start_save_as(&mut self) {
        self.mode = AppMode::SaveAs;
        self.filename_input = self.filename.clone().unwrap_or_else(|| DEFAULT_FILENAME.to_string());
        self.filename_cursor = self.filename_input.chars().count();
        self.status_message = None;
    }

    /// Switches to load-file mode to prompt for a filename.
    ///
    /// Initializes the filename input with the current filename or default.
    pub fn start_load_file(&mut self) {
        self.mode = AppMode::LoadFile;
        self.filename_input = self.filename.clone().unwrap_or_else(|| DEFAULT_FILENAME.to_string());
        self.filename_cursor = self.filename_input.chars().count();
        self.status_message = None;
    }

    /// Cancels filename input and returns to editing.
    pub fn cancel_filename_input(&mut self) {
        self.mode = AppMode::Editing;
        self.filename_input.clear();
        self.filename_cursor = 0;
    }

    pub fn filename_insert(&mut self, c: char) {
        let index = self
            .filename_input
            .char_indices()
            .nth(self.filename_cursor)
            .map(|(index, _)| index)
            .unwrap_or(self.filename_input.len());
        self.filename_input.insert(index, c);
        self.filename_cursor += 1;
    }

    pub fn filename_backspace(&mut self) {
        if self.filename_cursor == 0 {
            return;
        }
        self.filename_cursor -= 1;
        if let Some((index, _)) = self.filename_input.char_indices().nth(self.filename_cursor) {
            self.filename_input.remove(index);
        }
    }

    /// Processes the result of a save operation.
    ///
    /// # Arguments
    ///
    /// * `result` - Result of the save operation (filename or error message)
    pub fn set_save_result(&mut self, result: Result<String, String>) {
        match result {
            Ok(filename) => {
                self.status_message = Some(format!("Saved to {}", filename));
                self.filename = Some(filename);
                self.dirty = false;
            }
            Err(error) => {
                self.status_message = Some(format!("Save failed: {}", error));
            }
        }

        self.mode = AppMode::Editing;
        self.filename_input.clear();
        self.filename_cursor = 0;
    }

    /// Processes the result of a load operation.
    ///
    /// # Arguments
    ///
    /// * `result` - Result of the load operation (text and filename, or error)
    pub fn set_load_result(&mut self, result: Result<(String, String), String>) {
        match result {
            Ok((text, filename)) => {
                self.set_content(&text);
                self.status_message = Some(format!("Loaded from {}", filename));
                self.filename = Some(filename);
            }
            Err(error) => {
                self.status_message = Some(format!("Load failed: {}", error));
            }
        }

        self.mode = AppMode::Editing;
        self.filename_input.clear();
        self.filename_cursor = 0;
    }

    /// Gets the filename to use for saving or loading.
    ///
    /// Returns the filename input if not empty, otherwise the default filename.
    pub fn get_filename(&self) -> String {
        if self.filename_input.is_empty() {
            DEFAULT_FILENAME.to_string()
        } else {
            self.filename_input.clone()
        }
    }
}
