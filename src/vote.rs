//! Optimistic vote state machine.
//!
//! ```text
//! Idle ──begin──▶ Voting ──confirm──▶ Confirmed   (terminal, voting disabled)
//!                   │
//!                   └──roll_back──▶ RolledBack ──begin──▶ Voting ...
//! ```
//!
//! `begin` bumps the snapshot and registers the expected echo in one
//! synchronous step, before the caller issues the remote increment.

use tracing::{debug, warn};

use crate::error::{PollError, VoteBlock};
use crate::model::{Poll, PollId};
use crate::reconcile::{Celebration, Reconciler};
use crate::snapshot::SnapshotStore;

#[derive(Debug, Clone, PartialEq)]
pub enum VotePhase {
    Idle,
    Voting {
        option: usize,
        /// Snapshot as it was right before the optimistic apply.
        captured: Poll,
        /// Reconciler generation at capture time.
        generation: u64,
    },
    Confirmed {
        option: usize,
    },
    RolledBack {
        option: usize,
        error: PollError,
    },
}

/// Handle for one in-flight remote increment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteTicket {
    pub poll_id: PollId,
    pub option: usize,
}

#[derive(Debug, Clone)]
pub struct VotePipeline {
    phase: VotePhase,
    has_voted: bool,
}

impl VotePipeline {
    /// `has_voted` comes from the local ledger.
    pub fn new(has_voted: bool) -> Self {
        Self {
            phase: VotePhase::Idle,
            has_voted,
        }
    }

    pub fn phase(&self) -> &VotePhase {
        &self.phase
    }

    pub fn has_voted(&self) -> bool {
        self.has_voted
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self.phase, VotePhase::Voting { .. })
    }

    /// Whether a vote would be accepted right now.
    pub fn check(&self, expired: bool) -> Result<(), VoteBlock> {
        if self.has_voted || matches!(self.phase, VotePhase::Confirmed { .. }) {
            return Err(VoteBlock::AlreadyVoted);
        }
        if self.is_in_flight() {
            return Err(VoteBlock::InFlight);
        }
        if expired {
            return Err(VoteBlock::Expired);
        }
        Ok(())
    }

    pub fn begin(
        &mut self,
        option: usize,
        expired: bool,
        snapshot: &mut SnapshotStore,
        reconciler: &mut Reconciler,
    ) -> Result<(VoteTicket, Celebration), PollError> {
        self.check(expired).map_err(PollError::VoteNotAllowed)?;

        let captured = snapshot.current().clone();
        let poll_id = captured.id.clone();
        snapshot.apply_local_vote(option)?;
        reconciler.expect(option);

        debug!(poll = %poll_id, option, "optimistic vote applied");
        self.phase = VotePhase::Voting {
            option,
            captured,
            generation: reconciler.generation(),
        };
        Ok((VoteTicket { poll_id, option }, Celebration::local(option)))
    }

    /// The store accepted the increment. Returns the voted option, or None
    /// if no vote was in flight.
    pub fn confirm(&mut self) -> Option<usize> {
        match self.phase {
            VotePhase::Voting { option, .. } => {
                self.phase = VotePhase::Confirmed { option };
                self.has_voted = true;
                Some(option)
            }
            _ => None,
        }
    }

    /// The store refused the increment: restore the pre-vote value and
    /// re-enable voting. Returns false if no vote was in flight.
    pub fn roll_back(
        &mut self,
        error: PollError,
        snapshot: &mut SnapshotStore,
        reconciler: &mut Reconciler,
    ) -> bool {
        let (option, captured, generation) =
            match std::mem::replace(&mut self.phase, VotePhase::Idle) {
                VotePhase::Voting {
                    option,
                    captured,
                    generation,
                } => (option, captured, generation),
                other => {
                    self.phase = other;
                    return false;
                }
            };

        if !reconciler.withdraw(option) {
            warn!(poll = %captured.id, option, "echo already arrived for a vote reported as failed");
        }

        if reconciler.generation() == generation {
            snapshot.replace(captured);
        } else {
            // Remote values arrived meanwhile; the captured copy is stale.
            snapshot.replace(reconciler.baseline().clone());
        }

        self.phase = VotePhase::RolledBack { option, error };
        true
    }
}
