use ratatui::{
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
    Frame,
};

use super::theme::Theme;

pub struct StatusBarState {
    pub is_searching: bool,
    pub status_message: Option<(String, bool)>, // (message, is_error)
}

fn key_hint<'a>(key: &'a str, action: &'a str) -> [Span<'a>; 2] {
    [
        Span::styled(key, Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(action),
    ]
}

pub fn render_status_bar(
    f: &mut Frame,
    state: &StatusBarState,
    area: ratatui::layout::Rect,
    theme: &Theme,
) {
    let status_bar = if let Some((ref msg, is_error)) = state.status_message {
        let color = if is_error { theme.error } else { theme.warning };
        Paragraph::new(Line::from(vec![
            Span::styled(
                if is_error { "ERROR" } else { "INFO" },
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ),
            Span::raw(": "),
            Span::styled(msg.as_str(), Style::default().fg(color)),
        ]))
    } else if state.is_searching {
        let mut spans = vec![
            Span::styled(
                "SEARCH",
                Style::default().fg(theme.warning).add_modifier(Modifier::BOLD),
            ),
            Span::raw(" | "),
        ];
        spans.extend(key_hint("Enter", ": keep filter | "));
        spans.extend(key_hint("Esc", ": clear"));
        Paragraph::new(Line::from(spans))
    } else {
        let mut spans = vec![
            Span::styled(
                "NORMAL",
                Style::default().fg(theme.success).add_modifier(Modifier::BOLD),
            ),
            Span::raw(" | "),
        ];
        spans.extend(key_hint("j/k", ": move | "));
        spans.extend(key_hint("1-5", ": vote | "));
        spans.extend(key_hint("/", ": search | "));
        spans.extend(key_hint("s", ": sort | "));
        spans.extend(key_hint("x", ": closed | "));
        spans.extend(key_hint("n", ": new | "));
        spans.extend(key_hint("q", ": quit"));
        Paragraph::new(Line::from(spans))
    };

    let status_bar = status_bar.block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded),
    );
    f.render_widget(status_bar, area);
}
