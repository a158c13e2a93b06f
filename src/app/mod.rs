pub mod state;
mod polls;
mod sync;
mod voting;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::mpsc;

use livepoll::board::{PollBoard, SortOrder};
use livepoll::config::{BackendKind, Config};
use livepoll::ledger::VoteLedger;
use livepoll::model::{Poll, PollId};
use livepoll::store::{MemoryStore, PollStore, RestStore, Subscription};
use livepoll::{PollCard, PollSession, SessionSettings, VoteReport};

pub use state::{ActiveCelebration, DialogMode, DialogState, ListState, SearchState, StatusMessage};

const DEBUG_LOG_LIMIT: usize = 100;

/// Startup switches from the command line
#[derive(Debug, Default, Clone)]
pub struct LaunchOptions {
    /// In-memory store and ledger; nothing touches disk or network
    pub ephemeral: bool,
    pub backend: Option<BackendKind>,
}

pub struct App {
    pub session: PollSession,
    pub config: Config,

    // List
    pub board: PollBoard,
    pub board_feed: Option<Subscription>,
    pub list: ListState,
    pub search: SearchState,
    pub sort: SortOrder,
    pub show_expired: bool,

    // Open cards, keyed by poll. Only polls currently listed have one.
    pub cards: HashMap<PollId, PollCard>,
    pub celebrations: Vec<ActiveCelebration>,
    /// Earliest time to retry cards whose feed ended
    pub next_feed_retry: Instant,

    // Vote results from spawned store calls
    pub vote_tx: mpsc::UnboundedSender<VoteReport>,
    pub vote_rx: mpsc::UnboundedReceiver<VoteReport>,

    pub dialog: DialogState,
    pub debug_log: VecDeque<String>,
    pub show_debug: bool,
    pub status_message: Option<StatusMessage>,
}

impl App {
    pub async fn new(options: LaunchOptions) -> Result<Self> {
        let mut debug_log = VecDeque::new();
        debug_log.push_back("Starting livepoll...".to_string());

        let mut config = if options.ephemeral {
            Config::default()
        } else {
            match Config::load() {
                Ok(cfg) => {
                    debug_log.push_back("Configuration loaded".to_string());
                    cfg
                }
                Err(e) => {
                    debug_log.push_back(format!("Failed to load config: {}, using defaults", e));
                    Config::default()
                }
            }
        };
        if let Some(kind) = options.backend {
            config.backend.kind = kind;
        }

        let store: Arc<dyn PollStore> = match config.backend.kind {
            BackendKind::Memory => Arc::new(MemoryStore::new()),
            BackendKind::Rest => Arc::new(RestStore::new(&config.backend)?),
        };
        debug_log.push_back(format!("Backend: {}", store.backend_name()));

        let ledger = if options.ephemeral {
            VoteLedger::in_memory()
        } else {
            let path = config.ledger_path()?;
            debug_log.push_back(format!("Ledger: {}", path.display()));
            VoteLedger::open(&path).context("Failed to open vote ledger")?
        };

        let session = PollSession::new(store, Arc::new(ledger), SessionSettings::from(&config));

        let board = session.load_board().await?;
        debug_log.push_back(format!("Loaded {} polls", board.len()));

        let board_feed = match session.watch_board().await {
            Ok(feed) => Some(feed),
            Err(e) => {
                debug_log.push_back(format!("List updates unavailable: {}", e));
                None
            }
        };

        let (vote_tx, vote_rx) = mpsc::unbounded_channel();

        let mut app = Self {
            session,
            sort: config.ui.default_sort,
            show_expired: config.ui.show_expired,
            config,
            board,
            board_feed,
            list: ListState::default(),
            search: SearchState::default(),
            cards: HashMap::new(),
            celebrations: Vec::new(),
            next_feed_retry: Instant::now(),
            vote_tx,
            vote_rx,
            dialog: DialogState::default(),
            debug_log,
            show_debug: false,
            status_message: None,
        };
        app.sync_visible_cards().await;
        Ok(app)
    }

    pub fn add_debug(&mut self, msg: String) {
        tracing::debug!(target: "livepoll::ui", "{}", msg);
        self.debug_log.push_back(msg);
        while self.debug_log.len() > DEBUG_LOG_LIMIT {
            self.debug_log.pop_front();
        }
    }

    pub fn set_status_error(&mut self, msg: String) {
        self.status_message = Some(StatusMessage {
            message: msg.clone(),
            is_error: true,
            timestamp: Instant::now(),
        });
        self.add_debug(msg);
    }

    pub fn set_status_info(&mut self, msg: String) {
        self.status_message = Some(StatusMessage {
            message: msg,
            is_error: false,
            timestamp: Instant::now(),
        });
    }

    pub fn clear_expired_status(&mut self) {
        if let Some(ref msg) = self.status_message {
            if msg.timestamp.elapsed() > Duration::from_secs(5) {
                self.status_message = None;
            }
        }
    }

    /// Polls currently listed, in display order.
    pub fn visible_polls(&self) -> Vec<&Poll> {
        self.board
            .visible(&self.search.query, self.sort, self.show_expired, Utc::now())
    }

    pub fn selected_id(&self) -> Option<PollId> {
        self.visible_polls()
            .get(self.list.selected)
            .map(|p| p.id.clone())
    }

    pub fn selected_card(&self) -> Option<&PollCard> {
        let id = self.selected_id()?;
        self.cards.get(&id)
    }

    pub fn move_selection(&mut self, delta: isize) {
        let len = self.visible_polls().len();
        if len == 0 {
            self.list.selected = 0;
            return;
        }
        let next = self.list.selected as isize + delta;
        self.list.selected = next.clamp(0, len as isize - 1) as usize;
    }

    fn clamp_selection(&mut self) {
        let len = self.visible_polls().len();
        if self.list.selected >= len {
            self.list.selected = len.saturating_sub(1);
        }
    }

    pub async fn cycle_sort(&mut self) {
        self.sort = self.sort.next();
        self.list.selected = 0;
        self.set_status_info(format!("Sorted by {}", self.sort.label()));
        self.sync_visible_cards().await;
    }

    pub async fn toggle_expired(&mut self) {
        self.show_expired = !self.show_expired;
        self.clamp_selection();
        self.set_status_info(if self.show_expired {
            "Showing closed polls".to_string()
        } else {
            "Hiding closed polls".to_string()
        });
        self.sync_visible_cards().await;
    }

    pub async fn apply_search(&mut self) {
        self.list.selected = 0;
        self.sync_visible_cards().await;
    }

    /// Whether a "+1" cue is active for this option.
    pub fn is_celebrating(&self, poll_id: &PollId, option: usize) -> bool {
        self.celebrations
            .iter()
            .any(|c| &c.poll_id == poll_id && c.option == option)
    }

    pub fn celebrate(&mut self, poll_id: &PollId, option: usize) {
        let until = Instant::now() + Duration::from_millis(self.config.polls.celebration_ms);
        self.celebrations.push(ActiveCelebration {
            poll_id: poll_id.clone(),
            option,
            until,
        });
    }

    pub fn open_delete_dialog(&mut self) {
        let Some(card) = self.selected_card() else {
            return;
        };
        if !card.owns() {
            self.set_status_error("Only the poll's creator can delete it".to_string());
            return;
        }
        let poll_id = card.id().clone();
        let question = card.poll().question.clone();
        self.dialog.mode = DialogMode::ConfirmDelete { poll_id, question };
    }

    pub fn open_create_dialog(&mut self) {
        self.dialog.mode = DialogMode::CreateQuestion;
        self.dialog.input_text.clear();
    }

    pub fn open_edit_dialog(&mut self) {
        let Some(card) = self.selected_card() else {
            return;
        };
        if !card.owns() {
            self.set_status_error("Only the poll's creator can edit it".to_string());
            return;
        }
        let poll_id = card.id().clone();
        self.dialog.input_text = card.poll().question.clone();
        self.dialog.mode = DialogMode::EditQuestion { poll_id };
    }

    pub fn close_dialog(&mut self) {
        self.dialog.mode = DialogMode::None;
        self.dialog.input_text.clear();
    }

    pub fn is_dialog_open(&self) -> bool {
        self.dialog.mode != DialogMode::None
    }

    /// Release every card before exit.
    pub fn shutdown(&mut self) {
        for card in self.cards.values_mut() {
            card.close();
        }
        self.cards.clear();
        if let Some(mut feed) = self.board_feed.take() {
            feed.close();
        }
    }
}
