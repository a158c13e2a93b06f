use chrono::{DateTime, Utc};
use ratatui::{
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use livepoll::board::SortOrder;
use livepoll::clock::evaluate;
use livepoll::model::Poll;

use super::theme::Theme;

pub struct PollListState<'a> {
    pub polls: &'a [&'a Poll],
    pub selected: usize,
    pub sort: SortOrder,
    pub show_expired: bool,
    pub query: &'a str,
    pub now: DateTime<Utc>,
}

pub fn render_poll_list(f: &mut Frame, state: &PollListState, area: Rect, theme: &Theme) {
    let title = format!(
        "Polls ({}) [sort: {}{}{}]",
        state.polls.len(),
        state.sort.label(),
        if state.show_expired { " | closed shown" } else { "" },
        if state.query.is_empty() {
            String::new()
        } else {
            format!(" | /{}", state.query)
        },
    );
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(theme.border_style(true));

    if state.polls.is_empty() {
        let msg = if state.query.is_empty() {
            "No polls yet\n\nPress 'n' to create one"
        } else {
            "No polls match your search"
        };
        let empty = Paragraph::new(msg)
            .style(Style::default().fg(theme.text_muted))
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(empty, area);
        return;
    }

    let items: Vec<ListItem> = state
        .polls
        .iter()
        .map(|poll| {
            let status = evaluate(poll.expires_at, state.now);
            let status_style = if status.is_expired() {
                Style::default().fg(theme.error)
            } else {
                Style::default().fg(theme.text_muted)
            };
            ListItem::new(Line::from(vec![
                Span::styled(poll.question.clone(), Style::default().fg(theme.text)),
                Span::raw("  "),
                Span::styled(
                    format!("{} votes", poll.total_votes()),
                    Style::default().fg(theme.primary).add_modifier(Modifier::DIM),
                ),
                Span::raw("  "),
                Span::styled(status.to_string(), status_style),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(theme.highlight_style())
        .highlight_symbol("> ");

    f.render_stateful_widget(
        list,
        area,
        &mut ListState::default().with_selected(Some(state.selected)),
    );
}
