//! Merges remote poll values into a card's snapshot.
//!
//! The reconciler keeps its own baseline (the last remote value) instead of
//! diffing against the snapshot, because the snapshot may already carry an
//! optimistic vote from this device. Each optimistic vote registers one
//! expected confirmation on its option; a remote increase first pays off
//! those expectations and only the remainder counts as someone else's vote.

use tracing::debug;

use crate::model::Poll;
use crate::snapshot::SnapshotStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CelebrationSource {
    /// Fired by this device's optimistic vote.
    Local,
    /// Fired by a remote increase nobody here was expecting.
    Remote,
}

/// Transient "option just got votes" signal that drives the +1 cue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Celebration {
    pub option: usize,
    pub gained: u64,
    pub source: CelebrationSource,
}

impl Celebration {
    pub fn local(option: usize) -> Self {
        Self {
            option,
            gained: 1,
            source: CelebrationSource::Local,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    baseline: Poll,
    expected: Vec<u32>,
    generation: u64,
}

impl Reconciler {
    pub fn new(initial: &Poll) -> Self {
        Self {
            baseline: initial.clone(),
            expected: vec![0; initial.options.len()],
            generation: 0,
        }
    }

    /// Last value received from the store.
    pub fn baseline(&self) -> &Poll {
        &self.baseline
    }

    /// Bumped on every merged remote value.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn outstanding(&self, option: usize) -> u32 {
        self.expected.get(option).copied().unwrap_or(0)
    }

    /// Register an optimistic vote whose echo should be absorbed silently.
    /// Must run in the same turn as the optimistic apply.
    pub fn expect(&mut self, option: usize) {
        if let Some(slot) = self.expected.get_mut(option) {
            *slot += 1;
        }
    }

    /// Undo one expectation after a rolled-back vote. Returns false if the
    /// echo already arrived and consumed it.
    pub fn withdraw(&mut self, option: usize) -> bool {
        match self.expected.get_mut(option) {
            Some(slot) if *slot > 0 => {
                *slot -= 1;
                true
            }
            _ => false,
        }
    }

    /// Merge `incoming` into `snapshot`, returning a signal for every option
    /// that gained votes beyond what this device was waiting on.
    ///
    /// The snapshot ends up as `incoming` plus whatever optimistic votes are
    /// still unconfirmed.
    pub fn reconcile(&mut self, snapshot: &mut SnapshotStore, incoming: Poll) -> Vec<Celebration> {
        if incoming.options.len() != self.expected.len() {
            debug!(
                poll = %incoming.id,
                from = self.expected.len(),
                to = incoming.options.len(),
                "option count changed remotely, dropping expectations"
            );
            self.expected = vec![0; incoming.options.len()];
        }

        let mut celebrations = Vec::new();
        for (index, option) in incoming.options.iter().enumerate() {
            let previous = self
                .baseline
                .options
                .get(index)
                .map(|o| o.votes)
                .unwrap_or(0);

            if option.votes < previous {
                debug!(poll = %incoming.id, index, previous, now = option.votes, "remote correction");
                continue;
            }

            let gained = option.votes - previous;
            if gained == 0 {
                continue;
            }

            let absorbed = gained.min(self.expected[index] as u64);
            self.expected[index] -= absorbed as u32;
            let unexpected = gained - absorbed;

            if absorbed > 0 {
                debug!(poll = %incoming.id, index, absorbed, "echo confirmed optimistic vote");
            }
            if unexpected > 0 {
                celebrations.push(Celebration {
                    option: index,
                    gained: unexpected,
                    source: CelebrationSource::Remote,
                });
            }
        }

        let mut display = incoming.clone();
        for (option, &pending) in display.options.iter_mut().zip(&self.expected) {
            option.votes += pending as u64;
        }

        self.baseline = incoming;
        self.generation += 1;
        snapshot.replace(display);
        celebrations
    }
}
