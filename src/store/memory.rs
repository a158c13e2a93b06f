//! In-process backing store.
//!
//! Rows live behind a mutex, so `increment_vote` is a true atomic
//! read-modify-write. Every mutation is published on a broadcast channel
//! and fanned out to subscribers, the originator included. Used for the
//! offline demo mode and throughout the tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{broadcast, mpsc};

use super::{ChangeEvent, ChangeFilter, PollStore, Subscription};
use crate::model::{Poll, PollDraft, PollEdit, PollId};

const FEED_CAPACITY: usize = 256;

pub struct MemoryStore {
    rows: Mutex<Vec<Poll>>,
    feed: broadcast::Sender<ChangeEvent>,
    fail_next: AtomicUsize,
    refuse_subscriptions: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            rows: Mutex::new(Vec::new()),
            feed,
            fail_next: AtomicUsize::new(0),
            refuse_subscriptions: AtomicUsize::new(0),
        }
    }

    /// Seed rows directly, without publishing events.
    pub fn with_polls(polls: Vec<Poll>) -> Self {
        let store = Self::new();
        if let Ok(mut rows) = store.rows.lock() {
            *rows = polls;
        }
        store
    }

    /// Make the next `n` mutations fail as if the server refused them.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` subscribe calls fail.
    pub fn refuse_subscriptions(&self, n: usize) {
        self.refuse_subscriptions.store(n, Ordering::SeqCst);
    }

    /// Publish an event as if another client changed the row. The row
    /// itself is updated to match.
    pub fn inject(&self, event: ChangeEvent) -> Result<()> {
        {
            let mut rows = self.lock_rows()?;
            match &event {
                ChangeEvent::Inserted(poll) | ChangeEvent::Updated { poll, .. } => {
                    match rows.iter_mut().find(|p| p.id == poll.id) {
                        Some(row) => *row = poll.clone(),
                        None => rows.insert(0, poll.clone()),
                    }
                }
                ChangeEvent::Deleted(id) => rows.retain(|p| &p.id != id),
            }
            self.publish(event);
        }
        Ok(())
    }

    fn lock_rows(&self) -> Result<std::sync::MutexGuard<'_, Vec<Poll>>> {
        self.rows
            .lock()
            .map_err(|e| anyhow::anyhow!("lock poisoned: {e}"))
    }

    fn check_failure(&self, action: &str) -> Result<()> {
        let injected = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            anyhow::bail!("{action} refused by server");
        }
        Ok(())
    }

    /// Callers hold the rows lock, so events for a row leave in the order
    /// the row changed.
    fn publish(&self, event: ChangeEvent) {
        // No receivers is fine: nobody is watching.
        let _ = self.feed.send(event);
    }
}

#[async_trait]
impl PollStore for MemoryStore {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn list_polls(&self) -> Result<Vec<Poll>> {
        let mut polls = self.lock_rows()?.clone();
        polls.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(polls)
    }

    async fn fetch_poll(&self, id: &PollId) -> Result<Option<Poll>> {
        Ok(self.lock_rows()?.iter().find(|p| &p.id == id).cloned())
    }

    async fn create_poll(&self, draft: &PollDraft) -> Result<Poll> {
        self.check_failure("create")?;
        let poll = Poll {
            id: PollId::generate(),
            question: draft.question.trim().to_string(),
            options: draft.initial_options(),
            created_at: Utc::now(),
            expires_at: draft.expires_at,
        };
        let mut rows = self.lock_rows()?;
        rows.insert(0, poll.clone());
        self.publish(ChangeEvent::Inserted(poll.clone()));
        Ok(poll)
    }

    async fn increment_vote(&self, id: &PollId, option_index: usize) -> Result<()> {
        self.check_failure("vote")?;
        let mut rows = self.lock_rows()?;
        let row = rows
            .iter_mut()
            .find(|p| &p.id == id)
            .with_context(|| format!("poll {id} not found"))?;
        let previous = row.clone();
        let option = row
            .options
            .get_mut(option_index)
            .with_context(|| format!("option {option_index} out of range"))?;
        option.votes += 1;
        let poll = row.clone();
        self.publish(ChangeEvent::Updated {
            poll,
            previous: Some(previous),
        });
        Ok(())
    }

    async fn update_poll(&self, id: &PollId, edit: &PollEdit) -> Result<()> {
        self.check_failure("edit")?;
        let mut rows = self.lock_rows()?;
        let row = rows
            .iter_mut()
            .find(|p| &p.id == id)
            .with_context(|| format!("poll {id} not found"))?;
        let previous = row.clone();
        *row = row.with_edit(edit);
        let poll = row.clone();
        self.publish(ChangeEvent::Updated {
            poll,
            previous: Some(previous),
        });
        Ok(())
    }

    async fn delete_poll(&self, id: &PollId) -> Result<()> {
        self.check_failure("delete")?;
        let mut rows = self.lock_rows()?;
        let before = rows.len();
        rows.retain(|p| &p.id != id);
        if rows.len() == before {
            anyhow::bail!("poll {id} not found");
        }
        self.publish(ChangeEvent::Deleted(id.clone()));
        Ok(())
    }

    async fn subscribe(&self, filter: ChangeFilter) -> Result<Subscription> {
        let refused = self
            .refuse_subscriptions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            anyhow::bail!("realtime channel unavailable");
        }

        let mut feed = self.feed.subscribe();
        let (tx, rx) = mpsc::unbounded_channel();
        let task_filter = filter.clone();
        let task = tokio::spawn(async move {
            loop {
                match feed.recv().await {
                    Ok(event) => {
                        if task_filter.matches(&event) && tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        // Dropping the feed tells the card it is no longer live.
                        tracing::warn!("change feed lagged by {} events, closing", missed);
                        break;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Ok(Subscription::new(filter, rx, Some(task)))
    }
}
