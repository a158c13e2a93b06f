use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::app::DialogMode;
use livepoll::model::{MAX_OPTIONS, MIN_OPTIONS};

use super::theme::Theme;

pub struct DialogRenderState<'a> {
    pub mode: &'a DialogMode,
    pub input_text: &'a str,
}

pub fn render_dialog(f: &mut Frame, state: &DialogRenderState, area: Rect, theme: &Theme) {
    match state.mode {
        DialogMode::None => {}
        DialogMode::CreateQuestion => {
            render_text_input_dialog(f, "New Poll", "Question:", state.input_text, area, theme);
        }
        DialogMode::CreateOption { question, options } => {
            let prompt = if options.len() < MIN_OPTIONS {
                format!("Option {} of {}:", options.len() + 1, MAX_OPTIONS)
            } else {
                format!(
                    "Option {} of {} (empty to finish):",
                    options.len() + 1,
                    MAX_OPTIONS
                )
            };
            render_text_input_dialog(
                f,
                &format!("New Poll: {}", truncate_str(question, 30)),
                &prompt,
                state.input_text,
                area,
                theme,
            );
        }
        DialogMode::CreateExpiry { question, .. } => {
            render_text_input_dialog(
                f,
                &format!("New Poll: {}", truncate_str(question, 30)),
                "Closes in hours (0 = never):",
                state.input_text,
                area,
                theme,
            );
        }
        DialogMode::EditQuestion { .. } => {
            render_text_input_dialog(f, "Edit Poll", "Question:", state.input_text, area, theme);
        }
        DialogMode::EditLabel { labels, index, .. } => {
            render_text_input_dialog(
                f,
                "Edit Poll",
                &format!("Option {} of {}:", index + 1, labels.len()),
                state.input_text,
                area,
                theme,
            );
        }
        DialogMode::ConfirmDelete { question, .. } => {
            render_confirm_dialog(
                f,
                "Delete Poll",
                &format!("Delete '{}' for everyone?", truncate_str(question, 40)),
                area,
                theme,
            );
        }
    }
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

fn render_text_input_dialog(
    f: &mut Frame,
    title: &str,
    prompt: &str,
    input: &str,
    area: Rect,
    theme: &Theme,
) {
    let popup_area = centered(area, 56, 7);
    f.render_widget(Clear, popup_area);

    let block = Block::default()
        .title(format!(" {} ", title))
        .title_alignment(Alignment::Center)
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.primary));
    let inner = block.inner(popup_area);
    f.render_widget(block, popup_area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(2),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(inner);

    f.render_widget(
        Paragraph::new(prompt).style(Style::default().fg(theme.text)),
        chunks[0],
    );

    let input_field = Paragraph::new(format!("{}_", input))
        .style(Style::default().fg(theme.warning).add_modifier(Modifier::BOLD))
        .block(
            Block::default()
                .borders(Borders::BOTTOM)
                .border_style(Style::default().fg(theme.border_normal)),
        );
    f.render_widget(input_field, chunks[1]);

    let help_text = Paragraph::new("Enter: next | Esc: cancel")
        .style(Style::default().fg(theme.text_muted))
        .alignment(Alignment::Center);
    f.render_widget(help_text, chunks[3]);
}

fn render_confirm_dialog(f: &mut Frame, title: &str, message: &str, area: Rect, theme: &Theme) {
    let popup_area = centered(area, 56, 7);
    f.render_widget(Clear, popup_area);

    let block = Block::default()
        .title(format!(" {} ", title))
        .title_alignment(Alignment::Center)
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.error));
    let inner = block.inner(popup_area);
    f.render_widget(block, popup_area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(2), Constraint::Length(1)])
        .split(inner);

    let msg = Paragraph::new(message)
        .style(Style::default().fg(theme.text))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    f.render_widget(msg, chunks[0]);

    let help_text = Paragraph::new("y/Enter: delete | n/Esc: keep")
        .style(Style::default().fg(theme.text_muted))
        .alignment(Alignment::Center);
    f.render_widget(help_text, chunks[1]);
}

fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate_str("short", 10), "short");
        assert_eq!(truncate_str("ünïcödé question", 8), "ünïcö...");
    }
}
