//! PostgREST backing store over HTTP.
//!
//! ```text
//! GET    /rest/v1/polls?select=*&order=created_at.desc
//! GET    /rest/v1/polls?id=eq.{id}&select=*
//! POST   /rest/v1/polls                 (Prefer: return=representation)
//! POST   /rest/v1/rpc/increment_vote    { poll_id, option_index }
//! POST   /rest/v1/rpc/edit_poll         { poll_id, new_question, new_labels }
//! DELETE /rest/v1/polls?id=eq.{id}
//! ```
//!
//! The increment and edit go through server-side functions so counters are
//! never read-modified-written by clients. There is no push channel here:
//! `subscribe` polls the rows on an interval and diffs successive results
//! into change events.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Serialize;
use tokio::sync::mpsc;

use super::{ChangeEvent, ChangeFilter, PollStore, Subscription};
use crate::config::BackendConfig;
use crate::model::{Poll, PollDraft, PollEdit, PollId, PollOption};

/// Consecutive failed polls before the feed is declared dead.
const MAX_POLL_FAILURES: u32 = 3;

#[derive(Serialize)]
struct NewPollRow<'a> {
    question: &'a str,
    options: Vec<PollOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Serialize)]
struct IncrementArgs<'a> {
    poll_id: &'a str,
    option_index: usize,
}

#[derive(Serialize)]
struct EditArgs<'a> {
    poll_id: &'a str,
    new_question: Option<&'a str>,
    new_labels: Option<&'a [String]>,
}

struct RestApi {
    http: reqwest::Client,
    base: String,
}

impl RestApi {
    fn table_url(&self) -> String {
        format!("{}/rest/v1/polls", self.base)
    }

    fn rpc_url(&self, function: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.base, function)
    }

    async fn list(&self) -> Result<Vec<Poll>> {
        let resp = self
            .http
            .get(self.table_url())
            .query(&[("select", "*"), ("order", "created_at.desc")])
            .send()
            .await
            .context("failed to reach poll store")?
            .error_for_status()?;
        resp.json().await.context("failed to decode poll list")
    }

    async fn fetch(&self, id: &PollId) -> Result<Option<Poll>> {
        let filter = format!("eq.{id}");
        let resp = self
            .http
            .get(self.table_url())
            .query(&[("id", filter.as_str()), ("select", "*")])
            .send()
            .await
            .context("failed to reach poll store")?
            .error_for_status()?;
        let rows: Vec<Poll> = resp.json().await.context("failed to decode poll")?;
        Ok(rows.into_iter().next())
    }

    async fn rows(&self, filter: &ChangeFilter) -> Result<Vec<Poll>> {
        match filter {
            ChangeFilter::All => self.list().await,
            ChangeFilter::Row(id) => Ok(self.fetch(id).await?.into_iter().collect()),
        }
    }

    async fn rpc<T: Serialize + ?Sized>(&self, function: &str, args: &T) -> Result<()> {
        self.http
            .post(self.rpc_url(function))
            .json(args)
            .send()
            .await
            .with_context(|| format!("failed to call {function}"))?
            .error_for_status()
            .with_context(|| format!("{function} rejected"))?;
        Ok(())
    }
}

pub struct RestStore {
    api: Arc<RestApi>,
    poll_interval: Duration,
}

impl RestStore {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .context("backend.url is required for the rest backend")?;

        let mut headers = HeaderMap::new();
        if let Some(ref key) = config.api_key {
            headers.insert("apikey", HeaderValue::from_str(key).context("invalid api key")?);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {key}")).context("invalid api key")?,
            );
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            api: Arc::new(RestApi {
                http,
                base: url.trim_end_matches('/').to_string(),
            }),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(100)),
        })
    }
}

/// Turn two successive row sets into the events that explain the change.
pub fn diff_rows(previous: &[Poll], next: &[Poll]) -> Vec<ChangeEvent> {
    let before: HashMap<&PollId, &Poll> = previous.iter().map(|p| (&p.id, p)).collect();
    let mut events = Vec::new();

    for poll in next {
        match before.get(&poll.id) {
            None => events.push(ChangeEvent::Inserted(poll.clone())),
            Some(&old) if old != poll => events.push(ChangeEvent::Updated {
                poll: poll.clone(),
                previous: Some(old.clone()),
            }),
            Some(_) => {}
        }
    }

    for poll in previous {
        if !next.iter().any(|p| p.id == poll.id) {
            events.push(ChangeEvent::Deleted(poll.id.clone()));
        }
    }
    events
}

#[async_trait]
impl PollStore for RestStore {
    fn backend_name(&self) -> &str {
        "rest"
    }

    async fn list_polls(&self) -> Result<Vec<Poll>> {
        self.api.list().await
    }

    async fn fetch_poll(&self, id: &PollId) -> Result<Option<Poll>> {
        self.api.fetch(id).await
    }

    async fn create_poll(&self, draft: &PollDraft) -> Result<Poll> {
        let row = NewPollRow {
            question: draft.question.trim(),
            options: draft.initial_options(),
            expires_at: draft.expires_at,
        };
        let resp = self
            .api
            .http
            .post(self.api.table_url())
            .header("Prefer", "return=representation")
            .json(&[row])
            .send()
            .await
            .context("failed to reach poll store")?
            .error_for_status()
            .context("create rejected")?;
        let mut rows: Vec<Poll> = resp.json().await.context("failed to decode created poll")?;
        rows.pop().context("store returned no row for the created poll")
    }

    async fn increment_vote(&self, id: &PollId, option_index: usize) -> Result<()> {
        self.api
            .rpc(
                "increment_vote",
                &IncrementArgs {
                    poll_id: id.as_str(),
                    option_index,
                },
            )
            .await
    }

    async fn update_poll(&self, id: &PollId, edit: &PollEdit) -> Result<()> {
        self.api
            .rpc(
                "edit_poll",
                &EditArgs {
                    poll_id: id.as_str(),
                    new_question: edit.question.as_deref(),
                    new_labels: edit.option_labels.as_deref(),
                },
            )
            .await
    }

    async fn delete_poll(&self, id: &PollId) -> Result<()> {
        let filter = format!("eq.{id}");
        self.api
            .http
            .delete(self.api.table_url())
            .query(&[("id", filter.as_str())])
            .send()
            .await
            .context("failed to reach poll store")?
            .error_for_status()
            .context("delete rejected")?;
        Ok(())
    }

    async fn subscribe(&self, filter: ChangeFilter) -> Result<Subscription> {
        let initial = self
            .api
            .rows(&filter)
            .await
            .context("could not establish change feed")?;

        let (tx, rx) = mpsc::unbounded_channel();
        let api = self.api.clone();
        let period = self.poll_interval;
        let task_filter = filter.clone();

        let task = tokio::spawn(async move {
            let mut known = initial;
            let mut failures = 0u32;
            let mut interval = tokio::time::interval(period);
            interval.tick().await;

            loop {
                interval.tick().await;
                if tx.is_closed() {
                    break;
                }
                match api.rows(&task_filter).await {
                    Ok(rows) => {
                        failures = 0;
                        for event in diff_rows(&known, &rows) {
                            if tx.send(event).is_err() {
                                return;
                            }
                        }
                        known = rows;
                    }
                    Err(e) => {
                        failures += 1;
                        tracing::warn!("change poll failed ({}/{}): {:#}", failures, MAX_POLL_FAILURES, e);
                        if failures >= MAX_POLL_FAILURES {
                            break;
                        }
                    }
                }
            }
        });

        Ok(Subscription::new(filter, rx, Some(task)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::poll_with_votes;

    #[test]
    fn test_diff_detects_insert_update_delete() {
        let a = poll_with_votes("a", &[0, 0]);
        let b = poll_with_votes("b", &[1, 1]);
        let c = poll_with_votes("c", &[0, 0]);
        let mut b2 = b.clone();
        b2.options[0].votes = 2;

        let events = diff_rows(&[a.clone(), b.clone()], &[c.clone(), b2.clone()]);
        assert_eq!(
            events,
            vec![
                ChangeEvent::Inserted(c),
                ChangeEvent::Updated {
                    poll: b2,
                    previous: Some(b)
                },
                ChangeEvent::Deleted(a.id),
            ]
        );
    }

    #[test]
    fn test_diff_of_identical_rows_is_empty() {
        let a = poll_with_votes("a", &[3, 4]);
        assert!(diff_rows(&[a.clone()], &[a]).is_empty());
    }

    #[test]
    fn test_new_requires_url() {
        let config = BackendConfig::default();
        assert!(RestStore::new(&config).is_err());

        let config = BackendConfig {
            url: Some("https://example.supabase.co/".to_string()),
            api_key: Some("anon".to_string()),
            ..BackendConfig::default()
        };
        let store = RestStore::new(&config).unwrap();
        assert_eq!(store.api.table_url(), "https://example.supabase.co/rest/v1/polls");
        assert_eq!(
            store.api.rpc_url("increment_vote"),
            "https://example.supabase.co/rest/v1/rpc/increment_vote"
        );
    }

    #[test]
    fn test_rpc_payload_shape() {
        let args = IncrementArgs {
            poll_id: "abc",
            option_index: 2,
        };
        assert_eq!(
            serde_json::to_value(&args).unwrap(),
            serde_json::json!({ "poll_id": "abc", "option_index": 2 })
        );
    }
}
