mod app;
mod handlers;
mod ui;

use std::fs::{self, OpenOptions};
use std::sync::Mutex;
use std::{io, time::Duration};

use anyhow::{Context, Result};
use chrono::Utc;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Modifier, Style},
    widgets::{Block, BorderType, Borders, Paragraph, Wrap},
    Frame, Terminal,
};
use tracing_subscriber::EnvFilter;

use app::{App, LaunchOptions};
use handlers::{handle_key_event, KeyAction};
use livepoll::config::BackendKind;
use ui::{
    render_dialog, render_poll_card, render_poll_list, render_status_bar, DialogRenderState,
    PollCardState, PollListState, StatusBarState, Theme,
};

const USAGE: &str = "usage: livepoll [--ephemeral] [--backend memory|rest]";

fn parse_args() -> Result<LaunchOptions> {
    let mut options = LaunchOptions::default();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--ephemeral" => options.ephemeral = true,
            "--backend" => {
                let kind = args.next().context(USAGE)?;
                options.backend = Some(kind.parse::<BackendKind>()?);
            }
            "-h" | "--help" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument '{}'\n{}", other, USAGE),
        }
    }
    Ok(options)
}

/// The terminal belongs to the UI, so logs go to a file.
fn init_logging() -> Result<()> {
    let dir = dirs::data_dir()
        .context("Failed to get data directory")?
        .join("livepoll");
    fs::create_dir_all(&dir).context("Failed to create data directory")?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("livepoll.log"))
        .context("Failed to open log file")?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("livepoll=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let options = parse_args()?;
    if let Err(e) = init_logging() {
        eprintln!("Logging disabled: {:#}", e);
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = match App::new(options).await {
        Ok(app) => app,
        Err(e) => {
            disable_raw_mode()?;
            execute!(io::stdout(), LeaveAlternateScreen)?;
            eprintln!("Failed to initialize app: {:#}", e);
            return Err(e);
        }
    };

    let res = run_app(&mut terminal, &mut app).await;
    app.shutdown();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("{:?}", err);
    }

    Ok(())
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> Result<()>
where
    <B as ratatui::backend::Backend>::Error: Send + Sync + 'static,
{
    let theme = Theme::from_preset(&app.config.ui.theme).unwrap_or_default();
    let tick = Duration::from_millis(app.config.ui.status_interval_ms.max(16));

    loop {
        app.poll_sync().await;
        app.clear_expired_status();

        terminal.draw(|f| render_ui(f, app, &theme))?;

        // Yield so spawned store calls and feeds make progress on this thread.
        if event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                match handle_key_event(app, key).await {
                    KeyAction::Quit => return Ok(()),
                    KeyAction::Continue => {}
                }
            }
        } else {
            tokio::time::sleep(tick).await;
        }
    }
}

fn render_ui(f: &mut Frame, app: &App, theme: &Theme) {
    let mut constraints = vec![Constraint::Length(3)];
    if app.show_debug {
        constraints.push(Constraint::Percentage(60));
        constraints.push(Constraint::Min(6));
    } else {
        constraints.push(Constraint::Min(10));
    }
    constraints.push(Constraint::Length(3));

    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints(constraints)
        .split(f.area());

    let mut chunk_index = 0;

    let header = Paragraph::new(format!(
        "livepoll - {} backend",
        app.session.store().backend_name()
    ))
    .style(Style::default().fg(theme.primary).add_modifier(Modifier::BOLD))
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded),
    );
    f.render_widget(header, main_chunks[chunk_index]);
    chunk_index += 1;

    let content = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(main_chunks[chunk_index]);
    chunk_index += 1;

    let polls = app.visible_polls();
    let list_state = PollListState {
        polls: &polls,
        selected: app.list.selected,
        sort: app.sort,
        show_expired: app.show_expired,
        query: &app.search.query,
        now: Utc::now(),
    };
    render_poll_list(f, &list_state, content[0], theme);

    let selected = polls.get(app.list.selected).copied();
    let card = selected.and_then(|p| app.cards.get(&p.id));
    let celebrating = selected
        .map(|p| {
            (0..p.options.len())
                .filter(|&i| app.is_celebrating(&p.id, i))
                .collect()
        })
        .unwrap_or_default();
    let card_state = PollCardState {
        card,
        fallback: selected,
        celebrating,
    };
    render_poll_card(f, &card_state, content[1], theme);

    if app.show_debug {
        let debug_text: String = app
            .debug_log
            .iter()
            .rev()
            .take(10)
            .rev()
            .cloned()
            .collect::<Vec<_>>()
            .join("\n");
        let debug_panel = Paragraph::new(debug_text)
            .style(Style::default().fg(theme.text_muted))
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Debug Log [D: hide]")
                    .border_style(theme.border_style(false)),
            );
        f.render_widget(debug_panel, main_chunks[chunk_index]);
        chunk_index += 1;
    }

    let status_state = StatusBarState {
        is_searching: app.search.is_active,
        status_message: app
            .status_message
            .as_ref()
            .map(|m| (m.message.clone(), m.is_error)),
    };
    render_status_bar(f, &status_state, main_chunks[chunk_index], theme);

    if app.is_dialog_open() {
        let area = f.area();
        let dialog_state = DialogRenderState {
            mode: &app.dialog.mode,
            input_text: &app.dialog.input_text,
        };
        render_dialog(f, &dialog_state, area, theme);
    }
}
