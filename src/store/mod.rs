//! Backing-store abstraction.
//!
//! - [`MemoryStore`]: in-process rows with a broadcast change feed (demo mode, tests)
//! - [`RestStore`]: PostgREST-style HTTP API, change feed by polling
//!
//! The session holds an `Arc<dyn PollStore>` and every remote mutation goes
//! through it. Atomicity of `increment_vote` is the backend's job.

pub mod memory;
pub mod rest;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::model::{Poll, PollDraft, PollEdit, PollId};

pub use memory::MemoryStore;
pub use rest::RestStore;

/// One row-level change on the `polls` table.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Inserted(Poll),
    Updated { poll: Poll, previous: Option<Poll> },
    Deleted(PollId),
}

impl ChangeEvent {
    pub fn poll_id(&self) -> &PollId {
        match self {
            ChangeEvent::Inserted(poll) | ChangeEvent::Updated { poll, .. } => &poll.id,
            ChangeEvent::Deleted(id) => id,
        }
    }
}

/// Which rows a subscription receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeFilter {
    All,
    Row(PollId),
}

impl ChangeFilter {
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        match self {
            ChangeFilter::All => true,
            ChangeFilter::Row(id) => event.poll_id() == id,
        }
    }
}

/// Result of draining a subscription without waiting.
#[derive(Debug, Default)]
pub struct Drained {
    pub events: Vec<ChangeEvent>,
    /// False once the feed has ended (transport dropped or closed).
    pub live: bool,
}

/// Handle on a change feed. Dropping it releases the feed.
pub struct Subscription {
    filter: ChangeFilter,
    events: mpsc::UnboundedReceiver<ChangeEvent>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(
        filter: ChangeFilter,
        events: mpsc::UnboundedReceiver<ChangeEvent>,
        task: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            filter,
            events,
            task,
        }
    }

    pub fn filter(&self) -> &ChangeFilter {
        &self.filter
    }

    /// Wait for the next event. None once the feed has ended.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    /// Take everything delivered so far, in transport order.
    pub fn drain(&mut self) -> Drained {
        let mut drained = Drained {
            events: Vec::new(),
            live: true,
        };
        loop {
            match self.events.try_recv() {
                Ok(event) => drained.events.push(event),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    drained.live = false;
                    break;
                }
            }
        }
        drained
    }

    /// Stop the feed. Safe to call repeatedly and while mutations are in
    /// flight; those are not cancelled.
    pub fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.events.close();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("filter", &self.filter)
            .field("open", &self.task.is_some())
            .finish()
    }
}

/// Remote poll storage and its change feed.
#[async_trait]
pub trait PollStore: Send + Sync {
    /// Human-readable backend name (e.g., "memory", "rest").
    fn backend_name(&self) -> &str;

    /// All polls, newest first.
    async fn list_polls(&self) -> Result<Vec<Poll>>;

    async fn fetch_poll(&self, id: &PollId) -> Result<Option<Poll>>;

    /// Insert a validated draft. The store assigns id and creation time and
    /// zeroes every counter.
    async fn create_poll(&self, draft: &PollDraft) -> Result<Poll>;

    /// Atomic server-side `votes += 1` on the option at `option_index`.
    async fn increment_vote(&self, id: &PollId, option_index: usize) -> Result<()>;

    /// Label-only edit; votes and colors are preserved by the store.
    async fn update_poll(&self, id: &PollId, edit: &PollEdit) -> Result<()>;

    async fn delete_poll(&self, id: &PollId) -> Result<()>;

    /// Open a change feed. Delivery is at-least-once and in order per row.
    async fn subscribe(&self, filter: ChangeFilter) -> Result<Subscription>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::poll_with_votes;

    #[test]
    fn test_filter_matches_row() {
        let filter = ChangeFilter::Row(PollId::from("a"));
        assert!(filter.matches(&ChangeEvent::Deleted(PollId::from("a"))));
        assert!(!filter.matches(&ChangeEvent::Inserted(poll_with_votes("b", &[0, 0]))));
        assert!(ChangeFilter::All.matches(&ChangeEvent::Deleted(PollId::from("z"))));
    }

    #[tokio::test]
    async fn test_subscription_drain_and_close() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut sub = Subscription::new(ChangeFilter::All, rx, None);

        tx.send(ChangeEvent::Deleted(PollId::from("a"))).unwrap();
        tx.send(ChangeEvent::Deleted(PollId::from("b"))).unwrap();
        let drained = sub.drain();
        assert!(drained.live);
        assert_eq!(drained.events.len(), 2);
        assert_eq!(drained.events[1].poll_id().as_str(), "b");

        sub.close();
        sub.close();
        assert!(tx.send(ChangeEvent::Deleted(PollId::from("c"))).is_err());
        assert!(!sub.drain().live);
    }

    #[tokio::test]
    async fn test_drain_reports_ended_feed() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut sub = Subscription::new(ChangeFilter::All, rx, None);
        tx.send(ChangeEvent::Deleted(PollId::from("a"))).unwrap();
        drop(tx);
        let drained = sub.drain();
        assert_eq!(drained.events.len(), 1);
        assert!(!drained.live);
    }
}
