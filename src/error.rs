use thiserror::Error;

use crate::model::PollId;

/// Malformed user input, caught before any state change.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("question must not be empty")]
    EmptyQuestion,

    #[error("option {} must have a label", .index + 1)]
    EmptyOptionLabel { index: usize },

    #[error("a poll needs 2 to 5 options, got {count}")]
    OptionCount { count: usize },

    #[error("expiry must be in the future")]
    ExpiryInPast,

    #[error("expiry is too far in the future")]
    ExpiryOutOfRange,

    #[error("edit must keep all {expected} options, got {got} labels")]
    LabelCountChanged { expected: usize, got: usize },
}

/// Why a vote was refused locally, without contacting the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteBlock {
    AlreadyVoted,
    Expired,
    InFlight,
}

impl std::fmt::Display for VoteBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoteBlock::AlreadyVoted => write!(f, "already voted on this poll"),
            VoteBlock::Expired => write!(f, "poll is closed"),
            VoteBlock::InFlight => write!(f, "a vote is already being sent"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Vote,
    Edit,
    Delete,
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MutationKind::Create => write!(f, "create"),
            MutationKind::Vote => write!(f, "vote"),
            MutationKind::Edit => write!(f, "edit"),
            MutationKind::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    #[error("invalid poll: {0}")]
    Validation(#[from] ValidationError),

    #[error("{action} failed: {reason}")]
    MutationRejected { action: MutationKind, reason: String },

    #[error("option index {index} out of range for {len} options")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("live updates unavailable: {0}")]
    SubscriptionFailure(String),

    #[error("vote not accepted: {0}")]
    VoteNotAllowed(VoteBlock),

    #[error("poll {0} not found")]
    NotFound(PollId),
}

impl PollError {
    pub fn rejected(action: MutationKind, err: &anyhow::Error) -> Self {
        PollError::MutationRejected {
            action,
            reason: format!("{err:#}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            ValidationError::EmptyOptionLabel { index: 0 }.to_string(),
            "option 1 must have a label"
        );
        assert_eq!(
            PollError::VoteNotAllowed(VoteBlock::Expired).to_string(),
            "vote not accepted: poll is closed"
        );
        let err = PollError::rejected(MutationKind::Vote, &anyhow::anyhow!("timeout"));
        assert_eq!(err.to_string(), "vote failed: timeout");
    }

    #[test]
    fn test_validation_converts() {
        let err: PollError = ValidationError::EmptyQuestion.into();
        assert!(matches!(err, PollError::Validation(ValidationError::EmptyQuestion)));
    }
}
