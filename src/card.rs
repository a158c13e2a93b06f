//! Everything the client tracks for one rendered poll.
//!
//! A card owns the snapshot, the reconciler and the vote pipeline for its
//! poll, plus the two resources tied to its render lifetime: the row change
//! subscription and the expiry ticker. Dropping or closing the card releases
//! both; a vote still in flight simply finds nothing to reconcile with.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::clock::{ExpiryClock, ExpiryStatus, ExpiryTicker};
use crate::error::{PollError, VoteBlock};
use crate::ledger::VoteLedger;
use crate::model::{Poll, PollId};
use crate::reconcile::{Celebration, Reconciler};
use crate::snapshot::SnapshotStore;
use crate::store::{ChangeEvent, Subscription};
use crate::vote::{VotePhase, VotePipeline, VoteTicket};

/// What changed on a card after applying remote input.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CardUpdate {
    pub celebrations: Vec<Celebration>,
    pub deleted: bool,
    pub status_changed: bool,
    /// Set when the change feed ended during this update.
    pub lost_feed: bool,
}

impl CardUpdate {
    fn merge(&mut self, other: CardUpdate) {
        self.celebrations.extend(other.celebrations);
        self.deleted |= other.deleted;
        self.status_changed |= other.status_changed;
        self.lost_feed |= other.lost_feed;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VoteOutcome {
    Confirmed { option: usize },
    RolledBack { option: usize, error: PollError },
    /// The result belongs to no vote this card is waiting on.
    Stale,
}

pub struct PollCard {
    snapshot: SnapshotStore,
    reconciler: Reconciler,
    pipeline: VotePipeline,
    clock: ExpiryClock,
    owns: bool,
    deleted: bool,
    subscription: Option<Subscription>,
    ticker: Option<ExpiryTicker>,
}

impl PollCard {
    /// A card with no live resources attached yet.
    pub fn new(poll: Poll, has_voted: bool, owns: bool, now: DateTime<Utc>) -> Self {
        Self {
            clock: ExpiryClock::new(poll.expires_at, now),
            reconciler: Reconciler::new(&poll),
            snapshot: SnapshotStore::new(poll),
            pipeline: VotePipeline::new(has_voted),
            owns,
            deleted: false,
            subscription: None,
            ticker: None,
        }
    }

    pub fn attach(&mut self, subscription: Option<Subscription>, ticker: Option<ExpiryTicker>) {
        self.subscription = subscription;
        self.ticker = ticker;
    }

    pub fn set_subscription(&mut self, subscription: Subscription) {
        self.subscription = Some(subscription);
    }

    pub fn id(&self) -> &PollId {
        &self.snapshot.current().id
    }

    pub fn poll(&self) -> &Poll {
        self.snapshot.current()
    }

    pub fn status(&self) -> ExpiryStatus {
        self.clock.status()
    }

    pub fn phase(&self) -> &VotePhase {
        self.pipeline.phase()
    }

    pub fn has_voted(&self) -> bool {
        self.pipeline.has_voted()
    }

    pub fn owns(&self) -> bool {
        self.owns
    }

    pub fn mark_owned(&mut self) {
        self.owns = true;
    }

    pub fn is_live(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn can_vote(&self) -> Result<(), VoteBlock> {
        self.pipeline.check(self.clock.is_expired())
    }

    /// Optimistically count a vote for `option`. The caller must then issue
    /// the remote increment described by the returned ticket.
    pub fn begin_vote(
        &mut self,
        option: usize,
        now: DateTime<Utc>,
    ) -> Result<(VoteTicket, Celebration), PollError> {
        if self.deleted {
            return Err(PollError::NotFound(self.id().clone()));
        }
        self.clock.refresh(now);
        self.pipeline.begin(
            option,
            self.clock.is_expired(),
            &mut self.snapshot,
            &mut self.reconciler,
        )
    }

    /// Settle a vote with the store's answer.
    pub fn complete_vote(
        &mut self,
        ticket: &VoteTicket,
        result: Result<(), PollError>,
        ledger: &VoteLedger,
    ) -> VoteOutcome {
        if &ticket.poll_id != self.id() {
            return VoteOutcome::Stale;
        }
        match result {
            Ok(()) => match self.pipeline.confirm() {
                Some(option) => {
                    if let Err(e) = ledger.record_vote(&ticket.poll_id) {
                        warn!("Vote confirmed but not recorded locally: {:#}", e);
                    }
                    info!(poll = %ticket.poll_id, option, "vote confirmed");
                    VoteOutcome::Confirmed { option }
                }
                None => VoteOutcome::Stale,
            },
            Err(error) => {
                let option = ticket.option;
                if self
                    .pipeline
                    .roll_back(error.clone(), &mut self.snapshot, &mut self.reconciler)
                {
                    warn!(poll = %ticket.poll_id, option, "vote rolled back: {}", error);
                    VoteOutcome::RolledBack { option, error }
                } else {
                    VoteOutcome::Stale
                }
            }
        }
    }

    /// Merge one change notification.
    pub fn apply_change(&mut self, event: ChangeEvent, now: DateTime<Utc>) -> CardUpdate {
        let mut update = CardUpdate::default();
        if event.poll_id() != self.id() {
            return update;
        }
        match event {
            ChangeEvent::Inserted(poll) | ChangeEvent::Updated { poll, .. } => {
                if self.deleted {
                    return update;
                }
                let expires_at = poll.expires_at;
                update.celebrations = self.reconciler.reconcile(&mut self.snapshot, poll);
                update.status_changed = self.clock.retarget(expires_at, now);
            }
            ChangeEvent::Deleted(_) => {
                debug!(poll = %self.id(), "poll deleted remotely");
                self.deleted = true;
                update.deleted = true;
                self.close();
            }
        }
        update
    }

    /// Drain the change feed and the expiry ticker.
    pub fn pump(&mut self, now: DateTime<Utc>) -> CardUpdate {
        let mut update = CardUpdate::default();

        if let Some(ref mut subscription) = self.subscription {
            let drained = subscription.drain();
            if !drained.live {
                warn!(poll = %self.id(), "change feed ended, continuing without live updates");
                self.subscription = None;
                update.lost_feed = true;
            }
            for event in drained.events {
                let applied = self.apply_change(event, now);
                update.merge(applied);
            }
        }

        if let Some(ref mut ticker) = self.ticker {
            if ticker.drain() > 0 && self.clock.refresh(now) {
                update.status_changed = true;
            }
        }
        update
    }

    /// Release the subscription and the ticker. Idempotent.
    pub fn close(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.close();
        }
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
        }
    }
}

impl Drop for PollCard {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MutationKind;
    use crate::model::fixtures::poll_with_votes;
    use crate::reconcile::CelebrationSource;
    use chrono::Duration;

    fn card(votes: &[u64]) -> PollCard {
        PollCard::new(poll_with_votes("p", votes), false, false, Utc::now())
    }

    fn updated(votes: &[u64]) -> ChangeEvent {
        ChangeEvent::Updated {
            poll: poll_with_votes("p", votes),
            previous: None,
        }
    }

    #[test]
    fn test_vote_echo_confirm_sequence() {
        let ledger = VoteLedger::in_memory();
        let mut card = card(&[5, 2]);

        let (ticket, local) = card.begin_vote(0, Utc::now()).unwrap();
        assert_eq!(local.source, CelebrationSource::Local);
        assert_eq!(card.poll().votes(), vec![6, 2]);

        // Echo lands before the RPC returns.
        let update = card.apply_change(updated(&[6, 2]), Utc::now());
        assert!(update.celebrations.is_empty());
        assert_eq!(card.poll().votes(), vec![6, 2]);
        assert!(!card.has_voted());

        let outcome = card.complete_vote(&ticket, Ok(()), &ledger);
        assert_eq!(outcome, VoteOutcome::Confirmed { option: 0 });
        assert!(card.has_voted());
        assert!(ledger.has_voted(card.id()));
        assert_eq!(card.can_vote(), Err(VoteBlock::AlreadyVoted));
    }

    #[test]
    fn test_failed_vote_rolls_back() {
        let ledger = VoteLedger::in_memory();
        let mut card = card(&[1, 1]);
        let (ticket, _) = card.begin_vote(1, Utc::now()).unwrap();

        let error = PollError::MutationRejected {
            action: MutationKind::Vote,
            reason: "timeout".to_string(),
        };
        let outcome = card.complete_vote(&ticket, Err(error), &ledger);

        assert!(matches!(outcome, VoteOutcome::RolledBack { option: 1, .. }));
        assert_eq!(card.poll().votes(), vec![1, 1]);
        assert!(!ledger.has_voted(card.id()));
        assert_eq!(card.can_vote(), Ok(()));
    }

    #[test]
    fn test_expired_card_blocks_votes() {
        let now = Utc::now();
        let mut poll = poll_with_votes("p", &[0, 0]);
        poll.expires_at = Some(now - Duration::minutes(5));
        let mut card = PollCard::new(poll, false, false, now);

        assert!(card.status().is_expired());
        let err = card.begin_vote(0, now).unwrap_err();
        assert_eq!(err, PollError::VoteNotAllowed(VoteBlock::Expired));
        assert_eq!(card.poll().votes(), vec![0, 0]);
    }

    #[test]
    fn test_poll_expiring_while_open_blocks_votes() {
        let now = Utc::now();
        let mut poll = poll_with_votes("p", &[0, 0]);
        poll.expires_at = Some(now + Duration::minutes(1));
        let mut card = PollCard::new(poll, false, false, now);

        assert!(card.begin_vote(0, now + Duration::minutes(2)).is_err());
    }

    #[test]
    fn test_remote_expiry_edit_retargets_clock() {
        let now = Utc::now();
        let mut card = card(&[0, 0]);
        let mut poll = poll_with_votes("p", &[0, 0]);
        poll.expires_at = Some(now - Duration::seconds(1));

        let update = card.apply_change(
            ChangeEvent::Updated {
                poll,
                previous: None,
            },
            now,
        );
        assert!(update.status_changed);
        assert!(card.status().is_expired());
    }

    #[test]
    fn test_delete_marks_card() {
        let mut card = card(&[0, 0]);
        let update = card.apply_change(ChangeEvent::Deleted(PollId::from("p")), Utc::now());
        assert!(update.deleted);
        assert!(card.is_deleted());
        assert!(matches!(card.begin_vote(0, Utc::now()), Err(PollError::NotFound(_))));
    }

    #[test]
    fn test_events_for_other_polls_are_ignored() {
        let mut card = card(&[0, 0]);
        let update = card.apply_change(
            ChangeEvent::Updated {
                poll: poll_with_votes("other", &[9, 9]),
                previous: None,
            },
            Utc::now(),
        );
        assert_eq!(update, CardUpdate::default());
        assert_eq!(card.poll().votes(), vec![0, 0]);
    }

    #[test]
    fn test_stale_completion() {
        let ledger = VoteLedger::in_memory();
        let mut card = card(&[0, 0]);
        let ticket = VoteTicket {
            poll_id: PollId::from("p"),
            option: 0,
        };
        assert_eq!(card.complete_vote(&ticket, Ok(()), &ledger), VoteOutcome::Stale);
        assert!(!ledger.has_voted(card.id()));
    }

    #[tokio::test]
    async fn test_pump_reports_lost_feed() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let mut card = card(&[0, 0]);
        card.set_subscription(Subscription::new(
            crate::store::ChangeFilter::Row(PollId::from("p")),
            rx,
            None,
        ));
        tx.send(updated(&[0, 1])).unwrap();
        drop(tx);

        let update = card.pump(Utc::now());
        assert_eq!(update.celebrations.len(), 1);
        assert!(update.lost_feed);
        assert!(!card.is_live());
        assert_eq!(card.poll().votes(), vec![0, 1]);
    }
}
