// src/cooldown.rs
//! Per-server vote cooldown.
//!
//! State is never held in memory: every answer is recomputed from the stored
//! vote timestamp and the caller's `now`, so restarts lose nothing and expiry
//! needs no reset.
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::storage::kv::{KeyValueStore, KvError};

pub const COOLDOWN_MS: u64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteState {
    Eligible,
    Cooling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CooldownStatus {
    pub state: VoteState,
    pub remaining_ms: u64,
}

impl CooldownStatus {
    pub fn eligible() -> Self {
        Self {
            state: VoteState::Eligible,
            remaining_ms: 0,
        }
    }

    pub fn countdown(&self) -> String {
        format_countdown(self.remaining_ms)
    }

    /// How far through the cooldown window the voter is, 0 when eligible.
    pub fn progress_percent(&self) -> f64 {
        match self.state {
            VoteState::Eligible => 0.0,
            VoteState::Cooling => {
                (COOLDOWN_MS - self.remaining_ms.min(COOLDOWN_MS)) as f64 / COOLDOWN_MS as f64
                    * 100.0
            }
        }
    }
}

/// Stored under `vote_<server id>`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VoteRecord {
    pub timestamp: u64,
}

#[derive(Debug, Error)]
pub enum VoteError {
    #[error("already voted, {remaining_ms} ms of cooldown left")]
    AlreadyCooling { remaining_ms: u64 },
    #[error(transparent)]
    Store(#[from] KvError),
}

/// Receives accepted votes, e.g. to bump the listed vote total.
pub trait VoteListener {
    fn vote_recorded(&self, server_id: &str);
}

pub fn vote_key(server_id: &str) -> String {
    format!("vote_{}", server_id)
}

/// `HH:MM:SS`, truncating partial seconds.
pub fn format_countdown(remaining_ms: u64) -> String {
    let total_secs = remaining_ms / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

pub struct VoteTracker<S> {
    store: S,
}

impl<S: KeyValueStore> VoteTracker<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn check_state(&self, server_id: &str, now: u64) -> CooldownStatus {
        let Some(value) = self.store.get(&vote_key(server_id)) else {
            return CooldownStatus::eligible();
        };

        let record: VoteRecord = match serde_json::from_value(value) {
            Ok(record) => record,
            Err(e) => {
                warn!("Ignoring unreadable vote state for {}: {}", server_id, e);
                return CooldownStatus::eligible();
            }
        };

        let elapsed = now.saturating_sub(record.timestamp);
        let remaining_ms = COOLDOWN_MS.saturating_sub(elapsed);
        if remaining_ms > 0 {
            CooldownStatus {
                state: VoteState::Cooling,
                remaining_ms,
            }
        } else {
            CooldownStatus::eligible()
        }
    }

    pub fn record_vote(
        &self,
        server_id: &str,
        now: u64,
        listener: &dyn VoteListener,
    ) -> Result<CooldownStatus, VoteError> {
        let current = self.check_state(server_id, now);
        if current.state == VoteState::Cooling {
            return Err(VoteError::AlreadyCooling {
                remaining_ms: current.remaining_ms,
            });
        }

        let record = serde_json::to_value(VoteRecord { timestamp: now }).map_err(KvError::from)?;
        self.store.set(&vote_key(server_id), record)?;
        debug!("Recorded vote for {} at {}", server_id, now);

        listener.vote_recorded(server_id);

        Ok(CooldownStatus {
            state: VoteState::Cooling,
            remaining_ms: COOLDOWN_MS,
        })
    }
}

/// Re-evaluates a cooldown on a fixed period and hands each status to the
/// owner. Stops after reporting `Eligible`, or when dropped.
pub struct CountdownTicker {
    handle: JoinHandle<()>,
    rx: mpsc::Receiver<CooldownStatus>,
}

impl CountdownTicker {
    pub fn spawn<F>(period: Duration, mut poll: F) -> Self
    where
        F: FnMut() -> CooldownStatus + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(1);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let status = poll();
                if tx.send(status).await.is_err() {
                    break;
                }
                if status.state == VoteState::Eligible {
                    break;
                }
            }
        });
        Self { handle, rx }
    }

    pub async fn next(&mut self) -> Option<CooldownStatus> {
        self.rx.recv().await
    }
}

impl Drop for CountdownTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::kv::{FileKvStore, MemoryKvStore};
    use serde_json::json;
    use std::cell::RefCell;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    #[derive(Default)]
    struct Counter {
        seen: RefCell<Vec<String>>,
    }

    impl VoteListener for Counter {
        fn vote_recorded(&self, server_id: &str) {
            self.seen.borrow_mut().push(server_id.to_string());
        }
    }

    fn tracker() -> VoteTracker<MemoryKvStore> {
        VoteTracker::new(MemoryKvStore::new())
    }

    #[test]
    fn unknown_server_is_eligible() {
        assert_eq!(tracker().check_state("nope", 123), CooldownStatus::eligible());
    }

    #[test]
    fn vote_then_check_is_full_cooldown() {
        let t = tracker();
        let counter = Counter::default();
        let status = t.record_vote("srv1", 1_000, &counter).unwrap();
        assert_eq!(status.remaining_ms, COOLDOWN_MS);
        assert_eq!(
            t.check_state("srv1", 1_000),
            CooldownStatus {
                state: VoteState::Cooling,
                remaining_ms: COOLDOWN_MS,
            }
        );
        assert_eq!(*counter.seen.borrow(), vec!["srv1".to_string()]);
    }

    #[test]
    fn expiry_boundaries() {
        let t = tracker();
        t.record_vote("srv1", 5_000, &Counter::default()).unwrap();

        let before = t.check_state("srv1", 5_000 + COOLDOWN_MS - 1);
        assert_eq!(before.state, VoteState::Cooling);
        assert_eq!(before.remaining_ms, 1);

        assert_eq!(t.check_state("srv1", 5_000 + COOLDOWN_MS), CooldownStatus::eligible());
    }

    #[test]
    fn second_vote_is_rejected_and_keeps_first_timestamp() {
        let t = tracker();
        let counter = Counter::default();
        t.record_vote("srv1", 1_000, &counter).unwrap();

        let err = t.record_vote("srv1", 2_000, &counter).unwrap_err();
        assert!(matches!(
            err,
            VoteError::AlreadyCooling { remaining_ms } if remaining_ms == COOLDOWN_MS - 1_000
        ));

        assert_eq!(t.store.get("vote_srv1"), Some(json!({ "timestamp": 1000 })));
        assert_eq!(counter.seen.borrow().len(), 1);
    }

    #[test]
    fn can_vote_again_after_cooldown() {
        let t = tracker();
        let counter = Counter::default();
        t.record_vote("srv1", 0, &counter).unwrap();
        t.record_vote("srv1", COOLDOWN_MS, &counter).unwrap();
        assert_eq!(counter.seen.borrow().len(), 2);
    }

    #[test]
    fn servers_cool_down_independently() {
        let t = tracker();
        t.record_vote("a", 0, &Counter::default()).unwrap();
        assert_eq!(t.check_state("b", 10).state, VoteState::Eligible);
    }

    #[test]
    fn countdown_decreases_monotonically() {
        let t = tracker();
        t.record_vote("srv1", 0, &Counter::default()).unwrap();
        let mut last = u64::MAX;
        for now in (0..=COOLDOWN_MS).step_by(3_600_000) {
            let remaining = t.check_state("srv1", now).remaining_ms;
            assert!(remaining < last || remaining == 0);
            last = remaining;
        }
        assert_eq!(last, 0);
    }

    #[test]
    fn unreadable_state_is_treated_as_no_vote() {
        let store = MemoryKvStore::new();
        store.set("vote_srv1", json!("garbage")).unwrap();
        let t = VoteTracker::new(store);
        assert_eq!(t.check_state("srv1", 10), CooldownStatus::eligible());
    }

    #[test]
    fn formats_countdown_without_rounding_up() {
        assert_eq!(format_countdown(COOLDOWN_MS), "24:00:00");
        assert_eq!(format_countdown(3_661_999), "01:01:01");
        assert_eq!(format_countdown(999), "00:00:00");
        assert_eq!(format_countdown(0), "00:00:00");
    }

    #[test]
    fn progress_tracks_elapsed_share() {
        let half = CooldownStatus {
            state: VoteState::Cooling,
            remaining_ms: COOLDOWN_MS / 2,
        };
        assert_eq!(half.progress_percent(), 50.0);
        assert_eq!(CooldownStatus::eligible().progress_percent(), 0.0);
    }

    #[test]
    fn failed_store_write_does_not_start_cooldown() {
        let dir = std::env::temp_dir().join(format!("rustlist-missing-{}", uuid::Uuid::new_v4()));
        let t = VoteTracker::new(FileKvStore::open(dir.join("votes.json")).unwrap());
        let counter = Counter::default();

        assert!(matches!(t.record_vote("srv1", 1_000, &counter), Err(VoteError::Store(_))));
        assert!(counter.seen.borrow().is_empty());
        assert_eq!(t.check_state("srv1", 2_000), CooldownStatus::eligible());
        assert!(matches!(t.record_vote("srv1", 2_000, &counter), Err(VoteError::Store(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_stops_after_eligible() {
        let mut remaining = 3u64;
        let mut ticker = CountdownTicker::spawn(Duration::from_secs(1), move || {
            remaining = remaining.saturating_sub(1);
            if remaining == 0 {
                CooldownStatus::eligible()
            } else {
                CooldownStatus {
                    state: VoteState::Cooling,
                    remaining_ms: remaining * 1000,
                }
            }
        });

        let started = Instant::now();
        let mut seen = Vec::new();
        while let Some(status) = ticker.next().await {
            seen.push(status.remaining_ms);
        }
        assert_eq!(seen, vec![2000, 1000, 0]);
        // first tick fires immediately
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_ticker_cancels_it() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counted = ticks.clone();
        let mut ticker = CountdownTicker::spawn(Duration::from_secs(1), move || {
            counted.fetch_add(1, Ordering::SeqCst);
            CooldownStatus {
                state: VoteState::Cooling,
                remaining_ms: COOLDOWN_MS,
            }
        });
        ticker.next().await;
        ticker.next().await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);

        drop(ticker);
        tokio::time::advance(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }
}
