//! Real-time poll client core.
//!
//! Keeps a rendered poll consistent with a remote store while the local
//! user votes optimistically and other clients change the same rows.

pub mod board;
pub mod card;
pub mod clock;
pub mod config;
pub mod error;
pub mod ledger;
pub mod model;
pub mod reconcile;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod vote;

pub use card::{CardUpdate, PollCard, VoteOutcome};
pub use error::{PollError, ValidationError, VoteBlock};
pub use model::{Poll, PollDraft, PollEdit, PollId};
pub use session::{PollSession, SessionSettings, VoteReport};
