//! Open/closed status and countdown text derived from `expires_at`.

use std::fmt;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Countdown bucket, coarsest non-zero unit first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remaining {
    Days(i64),
    HoursMinutes { hours: i64, minutes: i64 },
    Minutes(i64),
    /// Still open, but less than a minute left.
    Imminent,
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("{n} {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

impl fmt::Display for Remaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Remaining::Days(d) => write!(f, "{}", plural(d, "day")),
            Remaining::HoursMinutes { hours, minutes: 0 } => write!(f, "{}", plural(hours, "hour")),
            Remaining::HoursMinutes { hours, minutes } => {
                write!(f, "{} {}", plural(hours, "hour"), plural(minutes, "minute"))
            }
            Remaining::Minutes(m) => write!(f, "{}", plural(m, "minute")),
            Remaining::Imminent => write!(f, "closing soon"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryStatus {
    /// `remaining` is None for polls without an expiry.
    Open { remaining: Option<Remaining> },
    Closed,
}

impl ExpiryStatus {
    pub fn is_expired(&self) -> bool {
        matches!(self, ExpiryStatus::Closed)
    }
}

impl fmt::Display for ExpiryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpiryStatus::Open { remaining: None } => write!(f, "Open"),
            ExpiryStatus::Open {
                remaining: Some(Remaining::Imminent),
            } => write!(f, "Open · closing soon"),
            ExpiryStatus::Open {
                remaining: Some(r),
            } => write!(f, "Open · {r} left"),
            ExpiryStatus::Closed => write!(f, "Closed"),
        }
    }
}

pub fn evaluate(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> ExpiryStatus {
    let Some(at) = expires_at else {
        return ExpiryStatus::Open { remaining: None };
    };

    let secs = (at - now).num_seconds();
    if at <= now {
        return ExpiryStatus::Closed;
    }

    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;

    let remaining = if days > 0 {
        Remaining::Days(days)
    } else if hours > 0 {
        Remaining::HoursMinutes { hours, minutes }
    } else if minutes > 0 {
        Remaining::Minutes(minutes)
    } else {
        Remaining::Imminent
    };
    ExpiryStatus::Open {
        remaining: Some(remaining),
    }
}

/// Cached status for one poll, recomputed on ticks and snapshot changes.
#[derive(Debug, Clone)]
pub struct ExpiryClock {
    expires_at: Option<DateTime<Utc>>,
    status: ExpiryStatus,
}

impl ExpiryClock {
    pub fn new(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        Self {
            expires_at,
            status: evaluate(expires_at, now),
        }
    }

    pub fn status(&self) -> ExpiryStatus {
        self.status
    }

    pub fn is_expired(&self) -> bool {
        self.status.is_expired()
    }

    /// Recompute; returns true if the displayed status changed.
    pub fn refresh(&mut self, now: DateTime<Utc>) -> bool {
        let next = evaluate(self.expires_at, now);
        let changed = next != self.status;
        self.status = next;
        changed
    }

    /// The expiry itself may be edited remotely.
    pub fn retarget(&mut self, expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        self.expires_at = expires_at;
        self.refresh(now)
    }
}

/// Periodic wake-up owned by one rendered poll. Aborted on drop.
pub struct ExpiryTicker {
    handle: JoinHandle<()>,
    ticks: mpsc::UnboundedReceiver<()>,
}

impl ExpiryTicker {
    /// Must be called from within a tokio runtime.
    pub fn spawn(period: StdDuration) -> Self {
        let (tx, ticks) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // First tick completes immediately; the caller already evaluated.
            interval.tick().await;
            loop {
                interval.tick().await;
                if tx.send(()).is_err() {
                    break;
                }
            }
        });
        Self { handle, ticks }
    }

    /// Number of ticks since the last call.
    pub fn drain(&mut self) -> usize {
        let mut count = 0;
        while self.ticks.try_recv().is_ok() {
            count += 1;
        }
        count
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }
}

impl Drop for ExpiryTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(now: DateTime<Utc>, secs: i64) -> Option<DateTime<Utc>> {
        Some(now + Duration::seconds(secs))
    }

    #[test]
    fn test_never_expires() {
        let status = evaluate(None, Utc::now());
        assert_eq!(status, ExpiryStatus::Open { remaining: None });
        assert_eq!(status.to_string(), "Open");
    }

    #[test]
    fn test_ninety_minutes() {
        let now = Utc::now();
        let status = evaluate(at(now, 90 * 60), now);
        assert_eq!(
            status,
            ExpiryStatus::Open {
                remaining: Some(Remaining::HoursMinutes { hours: 1, minutes: 30 })
            }
        );
        assert!(!status.is_expired());
        assert_eq!(status.to_string(), "Open · 1 hour 30 minutes left");
    }

    #[test]
    fn test_buckets() {
        let now = Utc::now();
        let bucket = |secs| match evaluate(at(now, secs), now) {
            ExpiryStatus::Open { remaining: Some(r) } => r.to_string(),
            other => other.to_string(),
        };
        assert_eq!(bucket(3 * 86_400 + 5_000), "3 days");
        assert_eq!(bucket(86_400), "1 day");
        assert_eq!(bucket(2 * 3_600), "2 hours");
        assert_eq!(bucket(45 * 60 + 10), "45 minutes");
        assert_eq!(bucket(61), "1 minute");
        assert_eq!(bucket(30), "closing soon");
    }

    #[test]
    fn test_past_and_exact_expiry_are_closed() {
        let now = Utc::now();
        assert_eq!(evaluate(at(now, -60), now), ExpiryStatus::Closed);
        assert_eq!(evaluate(at(now, 0), now), ExpiryStatus::Closed);
        assert_eq!(ExpiryStatus::Closed.to_string(), "Closed");
    }

    #[test]
    fn test_clock_refresh_reports_changes() {
        let now = Utc::now();
        let mut clock = ExpiryClock::new(at(now, 120), now);
        assert!(!clock.refresh(now));
        assert!(clock.refresh(now + Duration::seconds(90)));
        assert!(clock.refresh(now + Duration::seconds(121)));
        assert!(clock.is_expired());
        assert!(clock.retarget(None, now + Duration::seconds(121)));
        assert!(!clock.is_expired());
    }

    #[tokio::test]
    async fn test_ticker_fires_and_cancels() {
        let mut ticker = ExpiryTicker::spawn(StdDuration::from_millis(10));
        tokio::time::sleep(StdDuration::from_millis(60)).await;
        assert!(ticker.drain() >= 1);

        ticker.cancel();
        tokio::time::sleep(StdDuration::from_millis(20)).await;
        ticker.drain();
        tokio::time::sleep(StdDuration::from_millis(40)).await;
        assert_eq!(ticker.drain(), 0);
    }
}
