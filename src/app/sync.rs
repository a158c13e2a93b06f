//! Remote change handling.
//!
//! The list feed keeps the board current; each open card drains its own
//! row feed. `poll_sync` runs every loop tick; it only waits on the store
//! when a card has to be opened or its feed restored.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use chrono::Utc;

use super::App;
use livepoll::board::BoardChange;
use livepoll::card::{CardUpdate, VoteOutcome};
use livepoll::model::PollId;
use livepoll::reconcile::CelebrationSource;
use livepoll::store::ChangeEvent;

/// Minimum gap between attempts to restore dropped card feeds.
const FEED_RETRY: Duration = Duration::from_secs(5);

impl App {
    /// Open cards for newly listed polls and release the rest.
    pub async fn sync_visible_cards(&mut self) {
        let visible: Vec<_> = self.visible_polls().into_iter().cloned().collect();
        let wanted: HashSet<PollId> = visible.iter().map(|p| p.id.clone()).collect();

        let stale: Vec<PollId> = self
            .cards
            .keys()
            .filter(|id| !wanted.contains(*id))
            .cloned()
            .collect();
        for id in stale {
            if let Some(mut card) = self.cards.remove(&id) {
                card.close();
            }
        }

        let fresh: Vec<_> = visible
            .into_iter()
            .filter(|p| !self.cards.contains_key(&p.id))
            .collect();
        if fresh.is_empty() {
            return;
        }
        let mut gone = false;
        for card in self.session.open_all(fresh).await {
            if card.is_deleted() {
                self.board.apply(ChangeEvent::Deleted(card.id().clone()));
                gone = true;
                continue;
            }
            if !card.is_live() {
                self.add_debug(format!("Poll {} opened without live updates", card.id()));
            }
            self.board.refresh(card.poll());
            self.cards.insert(card.id().clone(), card);
        }
        if gone {
            self.clamp_selection();
        }
    }

    pub async fn poll_sync(&mut self) {
        self.drain_board_feed().await;
        self.pump_cards();
        self.restore_feeds().await;
        self.settle_votes();
        let now = Instant::now();
        self.celebrations.retain(|c| c.until > now);
    }

    async fn drain_board_feed(&mut self) {
        let drained = match self.board_feed.as_mut() {
            Some(feed) => feed.drain(),
            None => return,
        };
        if !drained.live {
            self.board_feed = None;
            self.add_debug("List feed ended, new polls will not appear until restart".to_string());
        }

        let mut membership_changed = false;
        for event in drained.events {
            if let ChangeEvent::Deleted(ref id) = event {
                if let Some(mut card) = self.cards.remove(id) {
                    card.close();
                }
            }
            match self.board.apply(event) {
                BoardChange::Added | BoardChange::Removed => membership_changed = true,
                BoardChange::Replaced | BoardChange::Unchanged => {}
            }
        }
        if membership_changed {
            self.clamp_selection();
            self.sync_visible_cards().await;
        }
    }

    fn pump_cards(&mut self) {
        let now = Utc::now();
        let updates: Vec<_> = self
            .cards
            .iter_mut()
            .map(|(id, card)| (id.clone(), card.pump(now)))
            .collect();
        self.absorb_card_updates(updates);
    }

    /// Resubscribe listed cards whose feed ended, catching up on what they
    /// missed.
    async fn restore_feeds(&mut self) {
        if Instant::now() < self.next_feed_retry {
            return;
        }
        let session = self.session.clone();
        let mut updates = Vec::new();
        let mut notes = Vec::new();
        let mut failed = false;

        for (id, card) in self.cards.iter_mut() {
            if card.is_live() || card.is_deleted() {
                continue;
            }
            match session.resubscribe(card).await {
                Ok(update) => {
                    notes.push(format!("Live updates restored for poll {}", id));
                    updates.push((id.clone(), update));
                }
                Err(e) => {
                    notes.push(format!("Poll {} still offline: {}", id, e));
                    failed = true;
                }
            }
        }

        if failed {
            self.next_feed_retry = Instant::now() + FEED_RETRY;
        }
        for note in notes {
            self.add_debug(note);
        }
        self.absorb_card_updates(updates);
    }

    fn absorb_card_updates(&mut self, updates: Vec<(PollId, CardUpdate)>) {
        for (id, update) in updates {
            for celebration in &update.celebrations {
                if celebration.source == CelebrationSource::Remote {
                    self.celebrate(&id, celebration.option);
                }
            }
            if update.lost_feed {
                self.add_debug(format!("Live updates lost for poll {}", id));
            }
            if update.deleted {
                self.cards.remove(&id);
                self.board.apply(ChangeEvent::Deleted(id));
                self.clamp_selection();
            } else if let Some(card) = self.cards.get(&id) {
                self.board.refresh(card.poll());
            }
        }
    }

    fn settle_votes(&mut self) {
        while let Ok(report) = self.vote_rx.try_recv() {
            let poll_id = report.ticket.poll_id.clone();
            let Some(card) = self.cards.get_mut(&poll_id) else {
                // Card went away while the vote was in flight. Keep the
                // ledger honest; there is nothing left to reconcile.
                if report.result.is_ok() {
                    if let Err(e) = self.session.ledger().record_vote(&poll_id) {
                        tracing::warn!("Could not record vote for {}: {:#}", poll_id, e);
                    }
                }
                continue;
            };

            let outcome = self.session.settle(card, report);
            let poll = card.poll().clone();
            self.board.refresh(&poll);
            match outcome {
                VoteOutcome::Confirmed { .. } => {
                    self.set_status_info("Thanks for voting!".to_string());
                }
                VoteOutcome::RolledBack { error, .. } => {
                    self.set_status_error(format!("Vote failed: {}", error));
                }
                VoteOutcome::Stale => {}
            }
        }
    }
}
