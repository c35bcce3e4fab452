//! Persistence Scheduler
//!
//! Decides when the local snapshot is sent to the server. Bursts of edits
//! are coalesced by a trailing debounce; a snapshot identical to the last
//! one the server acknowledged is never sent again.
//!
//! The scheduler does no I/O. The engine asks it what to do and reports
//! back when a save finishes.

use std::time::Duration;

use tokio::time::Instant;

use crate::model::Snapshot;

/// Default quiet period before a save is sent
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Where the scheduler stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Nothing pending
    Idle,
    /// A save will be sent at `deadline` unless re-armed
    Debouncing { deadline: Instant },
    /// A save request is in flight; `resave` is set when edits arrived
    /// after it was sent
    Saving { resave: bool },
}

/// Outcome of [`PersistenceScheduler::begin_save`]
#[derive(Debug)]
pub enum SaveDecision {
    /// The snapshot matches what the server already has
    Skip,
    /// A save is in flight; another one will follow it
    Busy,
    /// Send this snapshot
    Send(PendingSave),
}

/// A save about to go out
#[derive(Debug)]
pub struct PendingSave {
    pub snapshot: Snapshot,
    pub fingerprint: u32,
}

/// Serialized snapshot plus its checksum
#[derive(Debug, Clone, PartialEq, Eq)]
struct Baseline {
    fingerprint: u32,
    body: String,
}

impl Baseline {
    fn of(snapshot: &Snapshot) -> Result<Self, serde_json::Error> {
        let body = snapshot.to_canonical_json()?;
        Ok(Self {
            fingerprint: crc32fast::hash(body.as_bytes()),
            body,
        })
    }

    fn matches(&self, other: &Baseline) -> bool {
        self.fingerprint == other.fingerprint && self.body == other.body
    }
}

/// Trailing-debounce save scheduler with content deduplication
#[derive(Debug)]
pub struct PersistenceScheduler {
    debounce: Duration,
    phase: SyncPhase,
    /// Last snapshot the server acknowledged or delivered
    baseline: Option<Baseline>,
    in_flight: Option<Baseline>,
}

impl PersistenceScheduler {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            phase: SyncPhase::Idle,
            baseline: None,
            in_flight: None,
        }
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Pending debounce deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        match self.phase {
            SyncPhase::Debouncing { deadline } => Some(deadline),
            _ => None,
        }
    }

    pub fn is_saving(&self) -> bool {
        matches!(self.phase, SyncPhase::Saving { .. })
    }

    /// A save is scheduled or in flight
    pub fn is_busy(&self) -> bool {
        self.phase != SyncPhase::Idle
    }

    /// Arm (or re-arm) the debounce timer. While a save is in flight the
    /// request is remembered and honored once that save completes.
    pub fn schedule(&mut self, now: Instant) {
        self.phase = match self.phase {
            SyncPhase::Saving { .. } => SyncPhase::Saving { resave: true },
            _ => SyncPhase::Debouncing {
                deadline: now + self.debounce,
            },
        };
    }

    /// Drop a pending debounce without sending
    pub fn cancel(&mut self) {
        match self.phase {
            SyncPhase::Debouncing { .. } => self.phase = SyncPhase::Idle,
            SyncPhase::Saving { .. } => self.phase = SyncPhase::Saving { resave: false },
            SyncPhase::Idle => {}
        }
    }

    /// Start a save of `snapshot` unless the server already has it.
    /// `force` sends even an unchanged snapshot.
    pub fn begin_save(
        &mut self,
        snapshot: &Snapshot,
        force: bool,
    ) -> Result<SaveDecision, serde_json::Error> {
        if self.is_saving() {
            self.phase = SyncPhase::Saving { resave: true };
            return Ok(SaveDecision::Busy);
        }

        let candidate = Baseline::of(snapshot)?;
        let unchanged = self
            .baseline
            .as_ref()
            .is_some_and(|baseline| baseline.matches(&candidate));

        if unchanged && !force {
            self.phase = SyncPhase::Idle;
            return Ok(SaveDecision::Skip);
        }

        let fingerprint = candidate.fingerprint;
        self.in_flight = Some(candidate);
        self.phase = SyncPhase::Saving { resave: false };
        Ok(SaveDecision::Send(PendingSave {
            snapshot: snapshot.clone(),
            fingerprint,
        }))
    }

    /// Record the end of the in-flight save. On success the sent snapshot
    /// becomes the baseline. Edits made during the save re-arm the debounce.
    pub fn finish_save(&mut self, success: bool, now: Instant) -> SyncPhase {
        let sent = self.in_flight.take();
        if success {
            self.baseline = sent;
        }

        self.phase = match self.phase {
            SyncPhase::Saving { resave: true } => SyncPhase::Debouncing {
                deadline: now + self.debounce,
            },
            SyncPhase::Saving { resave: false } => SyncPhase::Idle,
            other => other,
        };
        self.phase
    }

    /// Treat `snapshot` as what the server holds (after a fetch)
    pub fn set_baseline(&mut self, snapshot: &Snapshot) -> Result<(), serde_json::Error> {
        self.baseline = Some(Baseline::of(snapshot)?);
        Ok(())
    }

    /// Forget the baseline and any pending debounce (identity change). An
    /// in-flight save still has to report back through `finish_save`.
    pub fn reset(&mut self) {
        self.baseline = None;
        self.cancel();
    }

    /// Checksum of the acknowledged baseline
    pub fn baseline_fingerprint(&self) -> Option<u32> {
        self.baseline.as_ref().map(|b| b.fingerprint)
    }
}

impl Default for PersistenceScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}
