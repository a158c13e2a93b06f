//! Current in-memory copy of one rendered poll.
//!
//! The store only mutates; it never talks to the network or to local
//! storage. Remote values overwrite it wholesale, optimistic votes bump a
//! single counter in place.

use crate::error::PollError;
use crate::model::Poll;

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    current: Poll,
}

impl SnapshotStore {
    pub fn new(poll: Poll) -> Self {
        Self { current: poll }
    }

    pub fn current(&self) -> &Poll {
        &self.current
    }

    /// Unconditional overwrite with an authoritative value.
    pub fn replace(&mut self, poll: Poll) {
        self.current = poll;
    }

    /// Add one vote to `option_index` and return the new snapshot.
    pub fn apply_local_vote(&mut self, option_index: usize) -> Result<&Poll, PollError> {
        let len = self.current.options.len();
        let option = self
            .current
            .options
            .get_mut(option_index)
            .ok_or(PollError::IndexOutOfRange { index: option_index, len })?;
        option.votes += 1;
        Ok(&self.current)
    }
}
