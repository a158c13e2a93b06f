//! Poll data model shared by the core, the store backends and the UI.
//!
//! The row shape matches the `polls` table of the backing store:
//!
//! ```text
//! id          uuid primary key
//! question    text not null
//! options     jsonb  -- [{ "label": .., "votes": .., "color": .. }, ..]
//! created_at  timestamptz not null
//! expires_at  timestamptz null
//! ```

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 5;

/// Presentation tags handed out to options in creation order.
const COLOR_ROTATION: [&str; MAX_OPTIONS] = [
    "bg-red-500",
    "bg-blue-500",
    "bg-green-500",
    "bg-yellow-500",
    "bg-purple-500",
];

/// Opaque poll identifier (a UUID string on every backend we talk to).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PollId(String);

impl PollId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PollId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PollId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Color tag of an option. Never interpreted by the sync core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColorTag(String);

impl ColorTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Tag for the option at `position` in a freshly created poll.
    pub fn for_position(position: usize) -> Self {
        Self(COLOR_ROTATION[position % COLOR_ROTATION.len()].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub label: String,
    pub votes: u64,
    pub color: ColorTag,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub id: PollId,
    pub question: String,
    pub options: Vec<PollOption>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Poll {
    pub fn total_votes(&self) -> u64 {
        self.options.iter().map(|o| o.votes).sum()
    }

    pub fn votes(&self) -> Vec<u64> {
        self.options.iter().map(|o| o.votes).collect()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }

    /// Whole-number share of each option, summing to 100.
    ///
    /// With no votes the split is even. Rounding drift goes to the largest
    /// share so the bar always fills exactly and an option with no votes
    /// never shows a share.
    pub fn percentages(&self) -> Vec<u8> {
        let n = self.options.len();
        if n == 0 {
            return Vec::new();
        }
        let total = self.total_votes();
        let mut shares: Vec<u8> = if total == 0 {
            vec![(100 / n) as u8; n]
        } else {
            self.options
                .iter()
                .map(|o| ((o.votes as f64 / total as f64) * 100.0).round() as u8)
                .collect()
        };
        let sum: i32 = shares.iter().map(|&s| i32::from(s)).sum();
        // Ties go to the later option.
        let largest = (0..n).max_by_key(|&i| shares[i]).unwrap_or(n - 1);
        shares[largest] = (i32::from(shares[largest]) + 100 - sum).clamp(0, 100) as u8;
        shares
    }

    /// Label-only edit. Votes, colors and positions stay as they are.
    pub fn with_edit(&self, edit: &PollEdit) -> Poll {
        let mut poll = self.clone();
        if let Some(ref question) = edit.question {
            poll.question = question.trim().to_string();
        }
        if let Some(ref labels) = edit.option_labels {
            for (option, label) in poll.options.iter_mut().zip(labels) {
                option.label = label.trim().to_string();
            }
        }
        poll
    }
}

/// User input for a new poll, validated before any store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollDraft {
    pub question: String,
    pub options: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl PollDraft {
    pub fn new(question: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            question: question.into(),
            options,
            expires_at: None,
        }
    }

    /// Expire `duration` from now. Fails if that lies past the calendar
    /// range instead of overflowing.
    pub fn expires_in(mut self, duration: Duration) -> Result<Self, ValidationError> {
        let at = Utc::now()
            .checked_add_signed(duration)
            .ok_or(ValidationError::ExpiryOutOfRange)?;
        self.expires_at = Some(at);
        Ok(self)
    }

    pub fn expires_in_hours(self, hours: i64) -> Result<Self, ValidationError> {
        let duration = Duration::try_hours(hours).ok_or(ValidationError::ExpiryOutOfRange)?;
        self.expires_in(duration)
    }

    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), ValidationError> {
        validate_question(&self.question)?;
        validate_labels(&self.options)?;
        if let Some(at) = self.expires_at {
            if at <= now {
                return Err(ValidationError::ExpiryInPast);
            }
        }
        Ok(())
    }

    /// Options as inserted: zero votes, colors in rotation order.
    pub fn initial_options(&self) -> Vec<PollOption> {
        self.options
            .iter()
            .enumerate()
            .map(|(i, label)| PollOption {
                label: label.trim().to_string(),
                votes: 0,
                color: ColorTag::for_position(i),
            })
            .collect()
    }
}

/// Owner edit: new question text and/or new labels by position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollEdit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option_labels: Option<Vec<String>>,
}

impl PollEdit {
    pub fn validate(&self, current: &Poll) -> Result<(), ValidationError> {
        if let Some(ref question) = self.question {
            validate_question(question)?;
        }
        if let Some(ref labels) = self.option_labels {
            if labels.len() != current.options.len() {
                return Err(ValidationError::LabelCountChanged {
                    expected: current.options.len(),
                    got: labels.len(),
                });
            }
            validate_labels(labels)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.question.is_none() && self.option_labels.is_none()
    }
}

fn validate_question(question: &str) -> Result<(), ValidationError> {
    if question.trim().is_empty() {
        return Err(ValidationError::EmptyQuestion);
    }
    Ok(())
}

fn validate_labels(labels: &[String]) -> Result<(), ValidationError> {
    if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&labels.len()) {
        return Err(ValidationError::OptionCount { count: labels.len() });
    }
    if let Some(index) = labels.iter().position(|l| l.trim().is_empty()) {
        return Err(ValidationError::EmptyOptionLabel { index });
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn poll_with_votes(id: &str, votes: &[u64]) -> Poll {
        Poll {
            id: PollId::from(id),
            question: "Mushroom or bamboo?".to_string(),
            options: votes
                .iter()
                .enumerate()
                .map(|(i, &v)| PollOption {
                    label: format!("Option {}", i + 1),
                    votes: v,
                    color: ColorTag::for_position(i),
                })
                .collect(),
            created_at: Utc::now(),
            expires_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::poll_with_votes;
    use super::*;

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_color_rotation() {
        let draft = PollDraft::new("Q", labels(&["a", "b", "c", "d", "e"]));
        let colors: Vec<String> = draft
            .initial_options()
            .iter()
            .map(|o| o.color.as_str().to_string())
            .collect();
        assert_eq!(
            colors,
            vec!["bg-red-500", "bg-blue-500", "bg-green-500", "bg-yellow-500", "bg-purple-500"]
        );
    }

    #[test]
    fn test_initial_options_are_zeroed_and_trimmed() {
        let draft = PollDraft::new("Q", labels(&["  cats ", "dogs"]));
        let options = draft.initial_options();
        assert_eq!(options[0].label, "cats");
        assert!(options.iter().all(|o| o.votes == 0));
    }

    #[test]
    fn test_draft_validation() {
        let now = Utc::now();
        assert_eq!(
            PollDraft::new("  ", labels(&["a", "b"])).validate(now),
            Err(ValidationError::EmptyQuestion)
        );
        assert_eq!(
            PollDraft::new("Q", labels(&["a"])).validate(now),
            Err(ValidationError::OptionCount { count: 1 })
        );
        assert_eq!(
            PollDraft::new("Q", labels(&["a", "b", "c", "d", "e", "f"])).validate(now),
            Err(ValidationError::OptionCount { count: 6 })
        );
        assert_eq!(
            PollDraft::new("Q", labels(&["a", " "])).validate(now),
            Err(ValidationError::EmptyOptionLabel { index: 1 })
        );
        let mut past = PollDraft::new("Q", labels(&["a", "b"]));
        past.expires_at = Some(now - Duration::minutes(1));
        assert_eq!(past.validate(now), Err(ValidationError::ExpiryInPast));
        assert!(PollDraft::new("Q", labels(&["a", "b"])).validate(now).is_ok());
    }

    #[test]
    fn test_expiry_beyond_calendar_is_rejected() {
        let draft = PollDraft::new("Q", labels(&["a", "b"]));
        assert_eq!(
            draft.clone().expires_in_hours(10_000_000_000).unwrap_err(),
            ValidationError::ExpiryOutOfRange
        );
        assert_eq!(
            draft.clone().expires_in_hours(i64::MAX).unwrap_err(),
            ValidationError::ExpiryOutOfRange
        );
        let ok = draft.expires_in_hours(48).unwrap();
        assert!(ok.validate(Utc::now()).is_ok());
    }

    #[test]
    fn test_edit_preserves_votes_colors_and_order() {
        let poll = poll_with_votes("p1", &[3, 7, 1]);
        let edit = PollEdit {
            question: Some("New question".to_string()),
            option_labels: Some(labels(&["x", "y", "z"])),
        };
        assert!(edit.validate(&poll).is_ok());
        let edited = poll.with_edit(&edit);

        assert_eq!(edited.question, "New question");
        assert_eq!(edited.votes(), vec![3, 7, 1]);
        for (before, after) in poll.options.iter().zip(&edited.options) {
            assert_eq!(before.color, after.color);
        }
        let new_labels: Vec<&str> = edited.options.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(new_labels, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_edit_cannot_change_option_count() {
        let poll = poll_with_votes("p1", &[0, 0]);
        let edit = PollEdit {
            question: None,
            option_labels: Some(labels(&["a", "b", "c"])),
        };
        assert_eq!(
            edit.validate(&poll),
            Err(ValidationError::LabelCountChanged { expected: 2, got: 3 })
        );
    }

    #[test]
    fn test_percentages() {
        assert_eq!(poll_with_votes("p", &[0, 0]).percentages(), vec![50, 50]);
        assert_eq!(poll_with_votes("p", &[0, 0, 0]).percentages(), vec![33, 33, 34]);
        assert_eq!(poll_with_votes("p", &[1, 2]).percentages(), vec![33, 67]);
        assert_eq!(poll_with_votes("p", &[1, 1, 1]).percentages(), vec![33, 33, 34]);
        assert_eq!(poll_with_votes("p", &[5, 0]).percentages(), vec![100, 0]);
        assert_eq!(
            poll_with_votes("p", &[1, 1, 1, 0, 0]).percentages(),
            vec![33, 33, 34, 0, 0]
        );
        assert_eq!(poll_with_votes("p", &[3, 3, 2]).percentages(), vec![38, 37, 25]);
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let mut poll = poll_with_votes("p", &[0, 0]);
        assert!(!poll.is_expired_at(now));
        poll.expires_at = Some(now - Duration::seconds(1));
        assert!(poll.is_expired_at(now));
        poll.expires_at = Some(now + Duration::hours(1));
        assert!(!poll.is_expired_at(now));
    }

    #[test]
    fn test_row_json_shape() {
        let json = r#"{
            "id": "6f1c",
            "question": "Tea or coffee?",
            "options": [
                {"label": "Tea", "votes": 4, "color": "bg-red-500"},
                {"label": "Coffee", "votes": 9, "color": "bg-blue-500"}
            ],
            "created_at": "2026-01-02T03:04:05Z",
            "expires_at": null
        }"#;
        let poll: Poll = serde_json::from_str(json).unwrap();
        assert_eq!(poll.id.as_str(), "6f1c");
        assert_eq!(poll.total_votes(), 13);
        assert!(poll.expires_at.is_none());
        assert_eq!(poll.options[1].color.as_str(), "bg-blue-500");
    }
}
