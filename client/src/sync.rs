/// Voting State Synchronizer
///
/// Polls contract state into an in-memory snapshot that is replaced wholesale
/// on every successful refresh. Concurrent refreshes may interleave; each one
/// is tagged with a generation at start, and a completed read publishes only
/// if no newer read has already landed, so the visible snapshot is always one
/// complete, self-consistent read.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::contract::ContractAccessor;
use crate::errors::VoteResult;
use crate::session::SessionManager;

/// One contract candidate. Identity is the zero-based position in the
/// contract's candidate array and never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub id: u64,
    pub name: String,
    pub vote_count: u64,
}

/// Immutable view of on-chain voting state.
///
/// `has_voted` is meaningless (always false) while no account is connected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VotingSnapshot {
    pub candidates: Vec<Candidate>,
    pub has_voted: bool,
    pub refreshed_at: DateTime<Utc>,
    generation: u64,
}

impl VotingSnapshot {
    fn empty() -> Self {
        Self {
            candidates: Vec::new(),
            has_voted: false,
            refreshed_at: Utc::now(),
            generation: 0,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn total_votes(&self) -> u64 {
        self.candidates.iter().map(|c| c.vote_count).sum()
    }

    /// Percentage share of the total for one candidate; `None` for an unknown
    /// id, `0.0` when no votes have been cast yet.
    pub fn share_percent(&self, candidate_id: u64) -> Option<f64> {
        let candidate = self.candidates.iter().find(|c| c.id == candidate_id)?;
        let total = self.total_votes();
        if total == 0 {
            return Some(0.0);
        }
        Some(candidate.vote_count as f64 / total as f64 * 100.0)
    }

    /// The current leader, ties resolved by first position.
    pub fn leader(&self) -> Option<&Candidate> {
        self.candidates.iter().max_by(|a, b| {
            a.vote_count
                .cmp(&b.vote_count)
                .then(b.id.cmp(&a.id))
        })
    }
}

/// Generation-ordered snapshot slot.
struct SnapshotCell {
    inner: RwLock<VotingSnapshot>,
}

impl SnapshotCell {
    fn new() -> Self {
        Self {
            inner: RwLock::new(VotingSnapshot::empty()),
        }
    }

    fn read(&self) -> VotingSnapshot {
        self.inner.read().clone()
    }

    /// Publish a completed snapshot; returns false when a newer generation
    /// already landed and this result is discarded.
    fn publish(&self, snapshot: VotingSnapshot) -> bool {
        let mut guard = self.inner.write();
        if snapshot.generation <= guard.generation {
            return false;
        }
        *guard = snapshot;
        true
    }

    fn mark_voted(&self) {
        self.inner.write().has_voted = true;
    }
}

/// Owns the published snapshot and the polling lifecycle.
pub struct VoteSynchronizer {
    accessor: ContractAccessor,
    session: SessionManager,
    cell: SnapshotCell,
    next_generation: AtomicU64,
    last_error: RwLock<Option<String>>,
}

impl VoteSynchronizer {
    pub fn new(accessor: ContractAccessor, session: SessionManager) -> Self {
        Self {
            accessor,
            session,
            cell: SnapshotCell::new(),
            next_generation: AtomicU64::new(0),
            last_error: RwLock::new(None),
        }
    }

    /// The currently published snapshot.
    pub fn snapshot(&self) -> VotingSnapshot {
        self.cell.read()
    }

    /// Last surfaced refresh failure, present only while a session is active.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Re-read contract state and atomically replace the published snapshot.
    ///
    /// Reads the voted flag for the current account (false when anonymous),
    /// then the candidate list. A partial failure publishes nothing; the
    /// previous snapshot stays visible.
    pub async fn refresh(&self) -> VoteResult<VotingSnapshot> {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;

        match self.read_snapshot(generation).await {
            Ok(snapshot) => {
                if !self.cell.publish(snapshot.clone()) {
                    debug!(generation, "stale refresh result discarded");
                }
                *self.last_error.write() = None;
                Ok(snapshot)
            }
            Err(err) => {
                // Retain the previous snapshot; surface only when a user is
                // connected, anonymous visitors just keep the stale view.
                if self.session.is_active() {
                    *self.last_error.write() = Some(err.to_string());
                }
                warn!(error = %err, "snapshot refresh failed; previous snapshot retained");
                Err(err)
            }
        }
    }

    async fn read_snapshot(&self, generation: u64) -> VoteResult<VotingSnapshot> {
        let reader = self.accessor.reader()?;
        let has_voted = match self.session.account() {
            Some(account) => reader.has_voted(&account).await?,
            None => false,
        };
        let raw = reader.get_candidates().await?;
        let candidates = raw
            .into_iter()
            .enumerate()
            .map(|(index, (name, vote_count))| Candidate {
                id: index as u64,
                name,
                vote_count,
            })
            .collect();
        Ok(VotingSnapshot {
            candidates,
            has_voted,
            refreshed_at: Utc::now(),
            generation,
        })
    }

    /// Record a confirmed vote locally, ahead of the follow-up refresh.
    pub fn mark_voted(&self) {
        self.cell.mark_voted();
    }

    /// Start the poll loop: one immediate refresh, then one per period until
    /// the returned handle is shut down.
    pub fn spawn_poller(self: &Arc<Self>, period: Duration) -> PollerHandle {
        let sync = Arc::clone(self);
        let shutdown = Arc::new(Notify::new());
        let stop = Arc::clone(&shutdown);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // Poll errors are already logged and retained in
                        // last_error by refresh itself.
                        let _ = sync.refresh().await;
                    }
                    _ = stop.notified() => break,
                }
            }
        });
        PollerHandle { shutdown, task }
    }
}

/// Cancellation handle for the poll loop.
pub struct PollerHandle {
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Stop polling and wait for the loop to exit. In-flight reads finish on
    /// their own; stale results are discarded by generation ordering.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        let _ = self.task.await;
    }
}
