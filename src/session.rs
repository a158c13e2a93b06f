//! Explicit context object tying the store, the ledger and the settings
//! together. Everything the client does against the remote store goes
//! through a `PollSession`; nothing here is global.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::Result;
use chrono::{Duration, Utc};
use futures_util::future::join_all;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::board::PollBoard;
use crate::card::{CardUpdate, PollCard, VoteOutcome};
use crate::clock::ExpiryTicker;
use crate::config::Config;
use crate::error::{MutationKind, PollError, ValidationError};
use crate::ledger::VoteLedger;
use crate::model::{Poll, PollDraft, PollEdit, PollId};
use crate::reconcile::Celebration;
use crate::store::{ChangeEvent, ChangeFilter, PollStore, Subscription};
use crate::vote::VoteTicket;

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub clock_tick: StdDuration,
    pub default_expiry: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            clock_tick: StdDuration::from_secs(60),
            default_expiry: Duration::hours(24),
        }
    }
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            clock_tick: StdDuration::from_secs(config.polls.clock_tick_secs.max(1)),
            default_expiry: Duration::hours(i64::from(config.polls.default_expiry_hours)),
        }
    }
}

/// Store answer for a vote issued with [`PollSession::dispatch_vote`].
#[derive(Debug)]
pub struct VoteReport {
    pub ticket: VoteTicket,
    pub result: Result<(), PollError>,
}

#[derive(Clone)]
pub struct PollSession {
    store: Arc<dyn PollStore>,
    ledger: Arc<VoteLedger>,
    settings: SessionSettings,
}

impl PollSession {
    pub fn new(store: Arc<dyn PollStore>, ledger: Arc<VoteLedger>, settings: SessionSettings) -> Self {
        Self {
            store,
            ledger,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn PollStore> {
        &self.store
    }

    pub fn ledger(&self) -> &VoteLedger {
        &self.ledger
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Initial list fetch.
    pub async fn load_board(&self) -> Result<PollBoard> {
        let polls = self.store.list_polls().await?;
        info!(count = polls.len(), backend = self.store.backend_name(), "loaded polls");
        Ok(PollBoard::new(polls))
    }

    /// List-level change feed for the board.
    pub async fn watch_board(&self) -> Result<Subscription, PollError> {
        self.store
            .subscribe(ChangeFilter::All)
            .await
            .map_err(|e| PollError::SubscriptionFailure(format!("{e:#}")))
    }

    /// Start tracking a poll that just became visible.
    ///
    /// `poll` may be an old copy (the board does not follow vote counts), so
    /// the row is fetched again once the feed is in place. A refused
    /// subscription leaves the card usable without live updates.
    pub async fn open(&self, poll: Poll) -> PollCard {
        let has_voted = self.ledger.has_voted(&poll.id);
        let owns = self.ledger.owns(&poll.id);
        let filter = ChangeFilter::Row(poll.id.clone());
        let mut card = PollCard::new(poll, has_voted, owns, Utc::now());

        let subscription = match self.store.subscribe(filter).await {
            Ok(subscription) => Some(subscription),
            Err(e) => {
                warn!(poll = %card.id(), "subscribe failed, showing static poll: {:#}", e);
                None
            }
        };
        card.attach(subscription, Some(ExpiryTicker::spawn(self.settings.clock_tick)));
        self.catch_up(&mut card).await;
        card
    }

    pub async fn open_all(&self, polls: Vec<Poll>) -> Vec<PollCard> {
        join_all(polls.into_iter().map(|poll| self.open(poll))).await
    }

    /// Try to restore live updates on a card whose feed ended, then fetch
    /// whatever changed while it was offline.
    pub async fn resubscribe(&self, card: &mut PollCard) -> Result<CardUpdate, PollError> {
        if card.is_live() || card.is_deleted() {
            return Ok(CardUpdate::default());
        }
        let subscription = self
            .store
            .subscribe(ChangeFilter::Row(card.id().clone()))
            .await
            .map_err(|e| PollError::SubscriptionFailure(format!("{e:#}")))?;
        card.set_subscription(subscription);
        Ok(self.catch_up(card).await)
    }

    /// Merge the store's current row into the card. Must run after the
    /// card's feed is attached so nothing falls between the two.
    pub async fn catch_up(&self, card: &mut PollCard) -> CardUpdate {
        let event = match self.store.fetch_poll(card.id()).await {
            Ok(Some(poll)) => ChangeEvent::Updated {
                poll,
                previous: None,
            },
            Ok(None) => ChangeEvent::Deleted(card.id().clone()),
            Err(e) => {
                warn!(poll = %card.id(), "could not refresh poll: {:#}", e);
                return CardUpdate::default();
            }
        };
        card.apply_change(event, Utc::now())
    }

    /// A draft carrying the default expiry.
    pub fn draft(
        &self,
        question: impl Into<String>,
        options: Vec<String>,
    ) -> Result<PollDraft, ValidationError> {
        PollDraft::new(question, options).expires_in(self.settings.default_expiry)
    }

    pub async fn create_poll(&self, draft: &PollDraft) -> Result<Poll, PollError> {
        draft.validate(Utc::now())?;
        let poll = self
            .store
            .create_poll(draft)
            .await
            .map_err(|e| PollError::rejected(MutationKind::Create, &e))?;
        if let Err(e) = self.ledger.record_created(&poll.id) {
            warn!(poll = %poll.id, "created poll but could not record ownership: {:#}", e);
        }
        info!(poll = %poll.id, options = poll.options.len(), "poll created");
        Ok(poll)
    }

    /// Label edit. Ownership is a client affordance; the store decides
    /// whether to accept.
    pub async fn edit_poll(&self, current: &Poll, edit: &PollEdit) -> Result<(), PollError> {
        if edit.is_empty() {
            return Ok(());
        }
        edit.validate(current)?;
        self.store
            .update_poll(&current.id, edit)
            .await
            .map_err(|e| PollError::rejected(MutationKind::Edit, &e))?;
        info!(poll = %current.id, "poll edited");
        Ok(())
    }

    pub async fn delete_poll(&self, id: &PollId) -> Result<(), PollError> {
        self.store
            .delete_poll(id)
            .await
            .map_err(|e| PollError::rejected(MutationKind::Delete, &e))?;
        info!(poll = %id, "poll deleted");
        Ok(())
    }

    /// Vote and wait for the store's answer.
    pub async fn cast_vote(&self, card: &mut PollCard, option: usize) -> Result<VoteOutcome, PollError> {
        let (ticket, _) = card.begin_vote(option, Utc::now())?;
        let result = self.increment(&ticket).await;
        Ok(card.complete_vote(&ticket, result, &self.ledger))
    }

    /// Vote without blocking the caller. The optimistic update is applied
    /// now; the store's answer arrives later on `reports` and must be handed
    /// to [`PollSession::settle`].
    pub fn dispatch_vote(
        &self,
        card: &mut PollCard,
        option: usize,
        reports: mpsc::UnboundedSender<VoteReport>,
    ) -> Result<Celebration, PollError> {
        let (ticket, celebration) = card.begin_vote(option, Utc::now())?;
        let session = self.clone();
        tokio::spawn(async move {
            let result = session.increment(&ticket).await;
            // Receiver gone means the UI shut down; nothing left to settle.
            let _ = reports.send(VoteReport { ticket, result });
        });
        Ok(celebration)
    }

    pub fn settle(&self, card: &mut PollCard, report: VoteReport) -> VoteOutcome {
        card.complete_vote(&report.ticket, report.result, &self.ledger)
    }

    async fn increment(&self, ticket: &VoteTicket) -> Result<(), PollError> {
        self.store
            .increment_vote(&ticket.poll_id, ticket.option)
            .await
            .map_err(|e| PollError::rejected(MutationKind::Vote, &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VoteBlock;
    use crate::store::MemoryStore;

    fn session_with(store: Arc<MemoryStore>) -> PollSession {
        PollSession::new(store, Arc::new(VoteLedger::in_memory()), SessionSettings::default())
    }

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_create_records_ownership_and_default_expiry() {
        let store = Arc::new(MemoryStore::new());
        let session = session_with(store.clone());

        let draft = session.draft("Lunch?", labels(&["Soup", "Salad"])).unwrap();
        assert!(draft.expires_at.is_some());
        let poll = session.create_poll(&draft).await.unwrap();

        assert!(session.ledger().owns(&poll.id));
        assert_eq!(poll.votes(), vec![0, 0]);
        assert!(store.fetch_poll(&poll.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_invalid_create_never_reaches_store() {
        let store = Arc::new(MemoryStore::new());
        let session = session_with(store.clone());

        let err = session
            .create_poll(&PollDraft::new("", labels(&["a", "b"])))
            .await
            .unwrap_err();
        assert_eq!(err, PollError::Validation(ValidationError::EmptyQuestion));
        assert!(store.list_polls().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_create_does_not_record_ownership() {
        let store = Arc::new(MemoryStore::new());
        let session = session_with(store.clone());
        store.fail_next(1);

        let err = session
            .create_poll(&PollDraft::new("Q", labels(&["a", "b"])))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PollError::MutationRejected {
                action: MutationKind::Create,
                ..
            }
        ));
        assert!(session.ledger().created_polls().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cast_vote_confirms_and_blocks_repeat() {
        let store = Arc::new(MemoryStore::new());
        let session = session_with(store.clone());
        let poll = session
            .create_poll(&PollDraft::new("Q", labels(&["a", "b"])))
            .await
            .unwrap();
        let mut card = session.open(poll.clone()).await;

        let outcome = session.cast_vote(&mut card, 1).await.unwrap();
        assert_eq!(outcome, VoteOutcome::Confirmed { option: 1 });
        assert!(session.ledger().has_voted(&poll.id));

        let err = session.cast_vote(&mut card, 0).await.unwrap_err();
        assert_eq!(err, PollError::VoteNotAllowed(VoteBlock::AlreadyVoted));
        let stored = store.fetch_poll(&poll.id).await.unwrap().unwrap();
        assert_eq!(stored.votes(), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_edit_validates_label_count() {
        let store = Arc::new(MemoryStore::new());
        let session = session_with(store);
        let poll = session
            .create_poll(&PollDraft::new("Q", labels(&["a", "b"])))
            .await
            .unwrap();

        let edit = PollEdit {
            question: None,
            option_labels: Some(labels(&["a", "b", "c"])),
        };
        let err = session.edit_poll(&poll, &edit).await.unwrap_err();
        assert!(matches!(
            err,
            PollError::Validation(ValidationError::LabelCountChanged { .. })
        ));
    }

    #[tokio::test]
    async fn test_open_degrades_without_subscription() {
        let store = Arc::new(MemoryStore::new());
        let session = session_with(store.clone());
        let poll = session
            .create_poll(&PollDraft::new("Q", labels(&["a", "b"])))
            .await
            .unwrap();

        store.refuse_subscriptions(1);
        let mut card = session.open(poll).await;
        assert!(!card.is_live());
        assert!(card.owns());

        session.resubscribe(&mut card).await.unwrap();
        assert!(card.is_live());
    }

    #[tokio::test]
    async fn test_delete_unknown_poll_is_rejected() {
        let session = session_with(Arc::new(MemoryStore::new()));
        let err = session.delete_poll(&PollId::from("missing")).await.unwrap_err();
        assert!(matches!(
            err,
            PollError::MutationRejected {
                action: MutationKind::Delete,
                ..
            }
        ));
    }
}
