//! List-level view of every poll.
//!
//! The board only tracks what the list shows: which polls exist and their
//! labels. Vote counts inside an entry may lag; the per-card reconciler owns
//! those.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{Poll, PollId};
use crate::store::ChangeEvent;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Newest,
    Popular,
    Expiring,
}

impl SortOrder {
    pub fn next(self) -> Self {
        match self {
            SortOrder::Newest => SortOrder::Popular,
            SortOrder::Popular => SortOrder::Expiring,
            SortOrder::Expiring => SortOrder::Newest,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortOrder::Newest => "newest",
            SortOrder::Popular => "popular",
            SortOrder::Expiring => "expiring",
        }
    }
}

/// What a list-level event did to the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardChange {
    Added,
    Replaced,
    Removed,
    Unchanged,
}

#[derive(Debug, Default)]
pub struct PollBoard {
    polls: Vec<Poll>,
}

impl PollBoard {
    /// Build from an initial fetch. Rows are kept newest first.
    pub fn new(mut polls: Vec<Poll>) -> Self {
        polls.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Self { polls }
    }

    pub fn len(&self) -> usize {
        self.polls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polls.is_empty()
    }

    pub fn get(&self, id: &PollId) -> Option<&Poll> {
        self.polls.iter().find(|p| &p.id == id)
    }

    pub fn polls(&self) -> &[Poll] {
        &self.polls
    }

    pub fn apply(&mut self, event: ChangeEvent) -> BoardChange {
        match event {
            ChangeEvent::Inserted(poll) => {
                if self.get(&poll.id).is_some() {
                    return BoardChange::Unchanged;
                }
                debug!(poll = %poll.id, "poll added to board");
                self.polls.insert(0, poll);
                BoardChange::Added
            }
            ChangeEvent::Updated { poll, .. } => {
                match self.polls.iter_mut().find(|p| p.id == poll.id) {
                    Some(entry) if presentation_changed(entry, &poll) => {
                        *entry = poll;
                        BoardChange::Replaced
                    }
                    Some(_) => BoardChange::Unchanged,
                    // An update for a row we never saw is treated as an insert.
                    None => {
                        self.polls.insert(0, poll);
                        BoardChange::Added
                    }
                }
            }
            ChangeEvent::Deleted(id) => {
                let before = self.polls.len();
                self.polls.retain(|p| p.id != id);
                if self.polls.len() < before {
                    debug!(poll = %id, "poll removed from board");
                    BoardChange::Removed
                } else {
                    BoardChange::Unchanged
                }
            }
        }
    }

    /// Overwrite an entry with a fresher copy, e.g. from an open card.
    pub fn refresh(&mut self, poll: &Poll) {
        if let Some(entry) = self.polls.iter_mut().find(|p| p.id == poll.id) {
            *entry = poll.clone();
        }
    }

    /// Entries matching `query`, filtered and ordered for display.
    pub fn visible(
        &self,
        query: &str,
        sort: SortOrder,
        show_expired: bool,
        now: DateTime<Utc>,
    ) -> Vec<&Poll> {
        let needle = query.trim().to_lowercase();
        let mut rows: Vec<&Poll> = self
            .polls
            .iter()
            .filter(|p| show_expired || !p.is_expired_at(now))
            .filter(|p| {
                needle.is_empty()
                    || p.question.to_lowercase().contains(&needle)
                    || p.id.as_str().to_lowercase().contains(&needle)
            })
            .collect();

        match sort {
            SortOrder::Newest => rows.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            SortOrder::Popular => rows.sort_by(|a, b| b.total_votes().cmp(&a.total_votes())),
            SortOrder::Expiring => rows.sort_by(|a, b| match (a.expires_at, b.expires_at) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => b.created_at.cmp(&a.created_at),
            }),
        }
        rows
    }
}

fn presentation_changed(old: &Poll, new: &Poll) -> bool {
    old.question != new.question
        || old.expires_at != new.expires_at
        || old.options.len() != new.options.len()
        || old
            .options
            .iter()
            .zip(&new.options)
            .any(|(a, b)| a.label != b.label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::poll_with_votes;
    use chrono::Duration;

    fn poll_at(id: &str, votes: &[u64], age_mins: i64) -> Poll {
        let mut poll = poll_with_votes(id, votes);
        poll.created_at = Utc::now() - Duration::minutes(age_mins);
        poll
    }

    fn ids(rows: &[&Poll]) -> Vec<String> {
        rows.iter().map(|p| p.id.to_string()).collect()
    }

    #[test]
    fn test_initial_order_is_newest_first() {
        let board = PollBoard::new(vec![poll_at("old", &[0, 0], 30), poll_at("new", &[0, 0], 1)]);
        assert_eq!(board.polls()[0].id.as_str(), "new");
    }

    #[test]
    fn test_insert_prepends_once() {
        let mut board = PollBoard::new(vec![poll_at("a", &[0, 0], 5)]);
        let b = poll_at("b", &[0, 0], 0);

        assert_eq!(board.apply(ChangeEvent::Inserted(b.clone())), BoardChange::Added);
        assert_eq!(board.apply(ChangeEvent::Inserted(b)), BoardChange::Unchanged);
        assert_eq!(board.len(), 2);
        assert_eq!(board.polls()[0].id.as_str(), "b");
    }

    #[test]
    fn test_vote_only_update_leaves_entry() {
        let a = poll_at("a", &[0, 0], 5);
        let mut board = PollBoard::new(vec![a.clone()]);
        let mut voted = a.clone();
        voted.options[0].votes = 4;

        let change = board.apply(ChangeEvent::Updated {
            poll: voted,
            previous: Some(a),
        });
        assert_eq!(change, BoardChange::Unchanged);
        assert_eq!(board.polls()[0].total_votes(), 0);
    }

    #[test]
    fn test_label_update_replaces_entry() {
        let a = poll_at("a", &[0, 0], 5);
        let mut board = PollBoard::new(vec![a.clone()]);
        let mut edited = a.clone();
        edited.options[1].label = "Renamed".to_string();

        let change = board.apply(ChangeEvent::Updated {
            poll: edited,
            previous: Some(a),
        });
        assert_eq!(change, BoardChange::Replaced);
        assert_eq!(board.polls()[0].options[1].label, "Renamed");
    }

    #[test]
    fn test_delete_removes_entry() {
        let mut board = PollBoard::new(vec![poll_at("a", &[0, 0], 5)]);
        assert_eq!(board.apply(ChangeEvent::Deleted(PollId::from("a"))), BoardChange::Removed);
        assert!(board.is_empty());
        assert_eq!(board.apply(ChangeEvent::Deleted(PollId::from("a"))), BoardChange::Unchanged);
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let mut a = poll_at("abc-1", &[0, 0], 5);
        a.question = "Best Pizza topping?".to_string();
        let mut b = poll_at("xyz-2", &[0, 0], 3);
        b.question = "Tabs or spaces?".to_string();
        let board = PollBoard::new(vec![a, b]);
        let now = Utc::now();

        assert_eq!(ids(&board.visible("PIZZA", SortOrder::Newest, false, now)), vec!["abc-1"]);
        assert_eq!(ids(&board.visible("xyz", SortOrder::Newest, false, now)), vec!["xyz-2"]);
        assert_eq!(board.visible("", SortOrder::Newest, false, now).len(), 2);
    }

    #[test]
    fn test_expired_hidden_unless_requested() {
        let now = Utc::now();
        let mut closed = poll_at("closed", &[0, 0], 60);
        closed.expires_at = Some(now - Duration::minutes(1));
        let board = PollBoard::new(vec![closed, poll_at("open", &[0, 0], 1)]);

        assert_eq!(ids(&board.visible("", SortOrder::Newest, false, now)), vec!["open"]);
        assert_eq!(board.visible("", SortOrder::Newest, true, now).len(), 2);
    }

    #[test]
    fn test_sort_orders() {
        let now = Utc::now();
        let mut soon = poll_at("soon", &[1, 0], 10);
        soon.expires_at = Some(now + Duration::minutes(5));
        let mut later = poll_at("later", &[3, 3], 20);
        later.expires_at = Some(now + Duration::hours(5));
        let never = poll_at("never", &[2, 0], 1);
        let board = PollBoard::new(vec![soon, later, never]);

        assert_eq!(
            ids(&board.visible("", SortOrder::Newest, false, now)),
            vec!["never", "soon", "later"]
        );
        assert_eq!(
            ids(&board.visible("", SortOrder::Popular, false, now)),
            vec!["later", "never", "soon"]
        );
        assert_eq!(
            ids(&board.visible("", SortOrder::Expiring, false, now)),
            vec!["soon", "later", "never"]
        );
    }

    #[test]
    fn test_sort_cycle_and_serde_names() {
        assert_eq!(SortOrder::Expiring.next(), SortOrder::Newest);
        assert_eq!(serde_json::to_string(&SortOrder::Popular).unwrap(), "\"popular\"");
    }
}
