use ratatui::{
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Wrap},
    Frame,
};

use livepoll::clock::ExpiryStatus;
use livepoll::model::Poll;
use livepoll::vote::VotePhase;
use livepoll::PollCard;

use super::theme::Theme;

pub struct PollCardState<'a> {
    pub card: Option<&'a PollCard>,
    /// Shown while the card is still opening
    pub fallback: Option<&'a Poll>,
    /// Options with an active "+1" cue
    pub celebrating: Vec<usize>,
}

const BAR_WIDTH: usize = 24;

pub fn render_poll_card(f: &mut Frame, state: &PollCardState, area: Rect, theme: &Theme) {
    let poll = match (state.card, state.fallback) {
        (Some(card), _) => card.poll(),
        (None, Some(poll)) => poll,
        (None, None) => {
            let empty = Paragraph::new("Select a poll")
                .style(Style::default().fg(theme.text_muted))
                .alignment(Alignment::Center)
                .block(card_block("Poll", theme));
            f.render_widget(empty, area);
            return;
        }
    };

    let mut lines = vec![
        Line::from(Span::styled(
            poll.question.clone(),
            Style::default().fg(theme.text).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];

    let shares = poll.percentages();
    for (i, option) in poll.options.iter().enumerate() {
        let share = shares.get(i).copied().unwrap_or(0) as usize;
        let filled = share * BAR_WIDTH / 100;
        let color = theme.option_color(&option.color);

        let mut spans = vec![
            Span::styled(format!("[{}] ", i + 1), Style::default().fg(theme.text_muted)),
            Span::styled(format!("{:<20} ", option.label), Style::default().fg(theme.text)),
            Span::styled("█".repeat(filled), Style::default().fg(color)),
            Span::styled("░".repeat(BAR_WIDTH - filled), Style::default().fg(theme.border_normal)),
            Span::raw(format!(" {:>3}% ({})", share, option.votes)),
        ];
        if state.celebrating.contains(&i) {
            spans.push(Span::styled(
                " +1",
                Style::default().fg(theme.success).add_modifier(Modifier::BOLD),
            ));
        }
        lines.push(Line::from(spans));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(format!("{} votes total", poll.total_votes())));

    if let Some(card) = state.card {
        lines.push(status_line(card, theme));
        if let Some(line) = phase_line(card, theme) {
            lines.push(line);
        }
    }

    let title = match state.card {
        Some(card) if card.owns() => "Poll (yours) [e: edit | d: delete]",
        _ => "Poll",
    };
    let card_view = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(card_block(title, theme));
    f.render_widget(card_view, area);
}

fn card_block<'a>(title: &'a str, theme: &Theme) -> Block<'a> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(theme.border_style(false))
}

fn status_line<'a>(card: &PollCard, theme: &Theme) -> Line<'a> {
    let status = card.status();
    let status_style = match status {
        ExpiryStatus::Closed => Style::default().fg(theme.error),
        ExpiryStatus::Open { .. } => Style::default().fg(theme.success),
    };
    let live = if card.is_live() {
        Span::styled(" · live", Style::default().fg(theme.text_muted))
    } else {
        Span::styled(" · offline", Style::default().fg(theme.warning))
    };
    Line::from(vec![Span::styled(status.to_string(), status_style), live])
}

fn phase_line<'a>(card: &PollCard, theme: &Theme) -> Option<Line<'a>> {
    if card.has_voted() {
        return Some(Line::from(Span::styled(
            "Thanks for voting!",
            Style::default().fg(theme.success),
        )));
    }
    match card.phase() {
        VotePhase::Voting { option, .. } => Some(Line::from(Span::styled(
            format!("Counting your vote for option {}...", option + 1),
            Style::default().fg(theme.text_muted),
        ))),
        VotePhase::RolledBack { error, .. } => Some(Line::from(Span::styled(
            format!("Vote failed: {}. Try again.", error),
            Style::default().fg(theme.error),
        ))),
        VotePhase::Idle | VotePhase::Confirmed { .. } => {
            if card.status().is_expired() {
                None
            } else {
                Some(Line::from(Span::styled(
                    "Press 1-5 to vote",
                    Style::default().fg(theme.text_muted),
                )))
            }
        }
    }
}
