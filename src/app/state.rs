use std::time::Instant;

use livepoll::model::PollId;

/// Poll list selection and scroll position
#[derive(Default)]
pub struct ListState {
    pub selected: usize,
}

/// Search input state
#[derive(Default)]
pub struct SearchState {
    pub query: String,
    pub is_active: bool,
}

/// Stepped prompts for create/edit, plus the delete confirmation
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DialogMode {
    #[default]
    None,
    CreateQuestion,
    CreateOption {
        question: String,
        options: Vec<String>,
    },
    CreateExpiry {
        question: String,
        options: Vec<String>,
    },
    EditQuestion {
        poll_id: PollId,
    },
    EditLabel {
        poll_id: PollId,
        question: String,
        labels: Vec<String>,
        index: usize,
    },
    ConfirmDelete {
        poll_id: PollId,
        question: String,
    },
}

#[derive(Default)]
pub struct DialogState {
    pub mode: DialogMode,
    pub input_text: String,
}

pub struct StatusMessage {
    pub message: String,
    pub is_error: bool,
    pub timestamp: Instant,
}

/// A "+1" cue on screen
#[derive(Debug, Clone)]
pub struct ActiveCelebration {
    pub poll_id: PollId,
    pub option: usize,
    pub until: Instant,
}
