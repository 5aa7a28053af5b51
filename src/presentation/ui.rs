use crate::application::{App, AppMode};
use crate::domain::CurrencyStatus;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

/// Width of the gutter holding line numbers.
const GUTTER: u16 = 5;

pub fn render_ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.area());

    render_header(f, app, chunks[0]);
    render_document(f, app, chunks[1]);
    render_status_bar(f, app, chunks[2]);

    if matches!(app.mode, AppMode::Help) {
        render_help_popup(f, app.help_scroll);
    }
}

fn currency_label(status: CurrencyStatus) -> (&'static str, Color) {
    match status {
        CurrencyStatus::Uninitialized => ("currencies off", Color::DarkGray),
        CurrencyStatus::Loading => ("loading currencies…", Color::Yellow),
        CurrencyStatus::Ready => ("currencies ready", Color::Green),
        CurrencyStatus::Failed => ("currencies unavailable", Color::Red),
    }
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let (label, color) = currency_label(app.currency_status());
    let header = Line::from(vec![
        Span::styled(
            format!(
                "mathpad - Math Notepad | Ln {}, Col {} | ",
                app.cursor_row + 1,
                app.cursor_col + 1
            ),
            Style::default().fg(Color::Cyan),
        ),
        Span::styled(label, Style::default().fg(color)),
    ]);
    f.render_widget(Paragraph::new(header), area);
}

fn render_document(f: &mut Frame, app: &mut App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(
        app.filename
            .as_deref()
            .map(|name| if app.dirty { format!("{} *", name) } else { name.to_string() })
            .unwrap_or_else(|| "untitled".to_string()),
    );
    let inner = block.inner(area);
    f.render_widget(block, area);

    app.viewport_rows = inner.height.max(1) as usize;
    app.ensure_cursor_visible();

    let text_width = app
        .lines
        .iter()
        .skip(app.scroll_row)
        .take(app.viewport_rows)
        .map(|line| line.chars().count())
        .max()
        .unwrap_or(0) as u16;
    // Results line up in one column to the right of the longest visible line.
    let result_col = (GUTTER + text_width + 2).min(inner.width.saturating_sub(12));

    let end = (app.scroll_row + app.viewport_rows).min(app.lines.len());
    let mut rows = Vec::with_capacity(end - app.scroll_row);
    for index in app.scroll_row..end {
        let text = &app.lines[index];
        let number_style = if index == app.cursor_row {
            Style::default().fg(Color::Black).bg(Color::LightBlue)
        } else {
            Style::default().fg(Color::Yellow)
        };

        let mut spans = vec![
            Span::styled(format!("{:>4} ", index + 1), number_style),
            Span::raw(text.clone()),
        ];
        if let Some(result) = app.formatted_result(index) {
            let used = GUTTER as usize + text.chars().count();
            let pad = (result_col as usize).saturating_sub(used).max(1);
            spans.push(Span::raw(" ".repeat(pad)));
            spans.push(Span::styled(
                format!("= {}", result),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            ));
        }
        rows.push(Line::from(spans));
    }

    f.render_widget(Paragraph::new(rows), inner);

    if app.mode == AppMode::Editing {
        let x = inner.x + GUTTER + app.cursor_col as u16;
        let y = inner.y + (app.cursor_row - app.scroll_row) as u16;
        if x < inner.x + inner.width && y < inner.y + inner.height {
            f.set_cursor_position(Position { x, y });
        }
    }
}

fn render_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let input_text = match app.mode {
        AppMode::Editing => {
            if let Some(ref status) = app.status_message {
                status.clone()
            } else {
                let filename = app.filename.as_deref().unwrap_or("unsaved");
                format!(
                    "File: {} | Ctrl+S: save | Ctrl+O: load | Ctrl+Y: copy result | F1: help | Ctrl+Q: quit",
                    filename
                )
            }
        }
        AppMode::Help => "↑↓/jk: scroll | PgUp/PgDn: fast scroll | Home: top | Esc/q: close help".to_string(),
        AppMode::SaveAs => format!("Save as: {} (Enter to save, Esc to cancel)", app.filename_input),
        AppMode::LoadFile => format!("Load file: {} (Enter to load, Esc to cancel)", app.filename_input),
    };

    let input = Paragraph::new(input_text)
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .style(match app.mode {
            AppMode::Editing => Style::default(),
            AppMode::Help => Style::default().fg(Color::Cyan),
            AppMode::SaveAs | AppMode::LoadFile => Style::default().fg(Color::Yellow),
        });
    f.render_widget(input, area);
}

fn render_help_popup(f: &mut Frame, scroll: usize) {
    let area = f.area();
    let popup_area = Rect {
        x: area.width / 10,
        y: area.height / 10,
        width: area.width * 4 / 5,
        height: area.height * 4 / 5,
    };

    f.render_widget(Clear, popup_area);

    let help_lines: Vec<&str> = HELP_TEXT.lines().collect();
    let visible_height = popup_area.height.saturating_sub(2) as usize;

    let start_line = scroll.min(help_lines.len().saturating_sub(visible_height));
    let end_line = (start_line + visible_height).min(help_lines.len());

    let visible_text = help_lines[start_line..end_line].join("\n");

    let help_widget = Paragraph::new(visible_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("mathpad Help (Line {}/{})", start_line + 1, help_lines.len()))
                .style(Style::default().fg(Color::Cyan)),
        )
        .style(Style::default().fg(Color::White));

    f.render_widget(help_widget, popup_area);
}

const HELP_TEXT: &str = r#"MATHPAD REFERENCE

=== BASIC CONCEPTS ===
• Every line is evaluated on its own; its result is shown to the right
• Lines that do not evaluate simply show nothing
• Variables assigned on one line are visible on the lines below
• last        The result of the previous line
• # comment   Everything after # is ignored
• x = 5;      A trailing ; hides the result

=== OPERATORS ===
+ - * / %       Arithmetic (% is the remainder)
^ or **         Power                       2^10 → 1,024
< <= > >= == != Comparisons, 1 for true and 0 for false
2 pi, 3(4 + 1)  Implicit multiplication binds tighter than * and /

=== UNITS ===
5 km to mi                  Conversion with "to" or "in"
100 km / 2 h to m / s       Compound units
3 m * 2 m                   → 6 m^2
Prefixes work on SI units:  km, mg, ms, kWh, GB

=== DATES ===
today, now                  The current date and time
today + 3 days              Dates move by durations
now - today                 Difference of dates in seconds

=== CURRENCIES ===
10 USD to EUR               Available once exchange rates have loaded
                            (see the header for their status)

=== FUNCTIONS ===
sqrt cbrt abs round floor ceil exp log log10 log2
sin cos tan asin acos atan min max sum mean pow
f(x) = x^2 + 1              Define your own

=== KEYS ===
Ctrl+S / Ctrl+O             Save / load a text file
Ctrl+Y                      Copy the current line's result
F1                          Show this help
Ctrl+Q                      Quit"#;
