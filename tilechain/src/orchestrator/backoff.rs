//! Per-tile exponential backoff after full-chain failures.
//!
//! # State Machine
//!
//! ```text
//! Clear ──[chain exhausted]──► Delayed(1, now + schedule[0])
//! Delayed(n) ──[chain exhausted]──► Delayed(n + 1, now + schedule[min(n, len - 1)])
//! any ──[success]──► Clear
//! Delayed(n) ──[idle past retention]──► Clear
//! ```
//!
//! Past the end of the schedule the last duration is reused, so the delay
//! saturates instead of growing without bound.
//!
//! # Retention
//!
//! An entry whose deadline passed more than the schedule's retention period
//! ago (its longest duration, at least [`MIN_RETENTION`]) is forgotten, and
//! the tile starts over at the first duration. Such entries are swept from
//! [`BackoffRegistry::record_failure`] at most once per retention period, or
//! on demand with [`BackoffRegistry::prune`].

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use super::types::OrchestratorError;
use crate::coord::TileKey;

/// Default backoff schedule in milliseconds.
pub const DEFAULT_BACKOFF_SCHEDULE_MS: [u64; 5] = [5_000, 15_000, 60_000, 120_000, 300_000];

/// Lower bound on how long an idle entry is remembered.
pub const MIN_RETENTION: Duration = Duration::from_secs(1);

/// Ordered, non-empty list of backoff durations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackoffSchedule {
    durations: Vec<Duration>,
}

impl BackoffSchedule {
    /// Creates a schedule. Fails if `durations` is empty.
    pub fn new(durations: Vec<Duration>) -> Result<Self, OrchestratorError> {
        if durations.is_empty() {
            return Err(OrchestratorError::EmptyBackoffSchedule);
        }
        Ok(Self { durations })
    }

    /// Creates a schedule from millisecond values.
    pub fn from_millis(millis: &[u64]) -> Result<Self, OrchestratorError> {
        Self::new(millis.iter().copied().map(Duration::from_millis).collect())
    }

    /// Delay applied after the `attempts`-th consecutive failure (1-based).
    ///
    /// Saturates at the last entry once `attempts` exceeds the schedule.
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let index = (attempts.saturating_sub(1) as usize).min(self.durations.len() - 1);
        self.durations[index]
    }

    /// The configured durations.
    pub fn durations(&self) -> &[Duration] {
        &self.durations
    }

    /// Longest configured duration.
    pub fn longest(&self) -> Duration {
        self.durations.iter().max().copied().unwrap_or_default()
    }

    /// How long past its deadline an idle entry is remembered.
    pub fn retention(&self) -> Duration {
        self.longest().max(MIN_RETENTION)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.durations.len()
    }

    /// Always false; a schedule cannot be empty.
    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self {
            durations: DEFAULT_BACKOFF_SCHEDULE_MS
                .iter()
                .copied()
                .map(Duration::from_millis)
                .collect(),
        }
    }
}

/// Backoff state of a single tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffEntry {
    attempts: u32,
    delay: Duration,
    next_eligible: Instant,
}

impl BackoffEntry {
    /// Consecutive full-chain failures.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay computed for the latest failure.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Earliest instant a new fetch may be dispatched.
    pub fn next_eligible(&self) -> Instant {
        self.next_eligible
    }

    /// Time left until the tile becomes eligible again.
    pub fn remaining_at(&self, now: Instant) -> Duration {
        self.next_eligible.saturating_duration_since(now)
    }

    fn is_retained_at(&self, now: Instant, retention: Duration) -> bool {
        now.saturating_duration_since(self.next_eligible) < retention
    }
}

struct BackoffState {
    entries: HashMap<TileKey, BackoffEntry>,
    last_sweep: Instant,
}

impl BackoffState {
    fn prune(&mut self, now: Instant, retention: Duration) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.is_retained_at(now, retention));
        self.last_sweep = now;
        before - self.entries.len()
    }
}

/// Tracks backoff deadlines for tiles whose chain walk failed.
///
/// A tile without an entry is always eligible. Entries are created or
/// advanced by [`record_failure`](Self::record_failure), removed by
/// [`clear`](Self::clear) when a fetch succeeds, and swept once they have
/// been idle past their deadline for the schedule's retention period.
pub struct BackoffRegistry {
    schedule: RwLock<BackoffSchedule>,
    state: Mutex<BackoffState>,
}

impl BackoffRegistry {
    /// Creates an empty registry with the given schedule.
    pub fn new(schedule: BackoffSchedule) -> Self {
        Self {
            schedule: RwLock::new(schedule),
            state: Mutex::new(BackoffState {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    /// Whether a fetch for `key` must be deferred right now.
    pub fn should_wait(&self, key: TileKey) -> bool {
        self.should_wait_at(key, Instant::now())
    }

    /// Whether a fetch for `key` must be deferred at `now`.
    pub fn should_wait_at(&self, key: TileKey, now: Instant) -> bool {
        self.state
            .lock()
            .entries
            .get(&key)
            .is_some_and(|entry| now < entry.next_eligible)
    }

    /// Records a full-chain failure and returns the updated entry.
    pub fn record_failure(&self, key: TileKey) -> BackoffEntry {
        self.record_failure_at(key, Instant::now())
    }

    /// Records a full-chain failure observed at `now`.
    pub fn record_failure_at(&self, key: TileKey, now: Instant) -> BackoffEntry {
        let schedule = self.schedule.read();
        let retention = schedule.retention();
        let mut state = self.state.lock();
        if now.saturating_duration_since(state.last_sweep) >= retention {
            state.prune(now, retention);
        }
        let attempts = state
            .entries
            .get(&key)
            .filter(|entry| entry.is_retained_at(now, retention))
            .map_or(1, |entry| entry.attempts.saturating_add(1));
        let delay = schedule.delay_for(attempts);
        let entry = BackoffEntry {
            attempts,
            delay,
            next_eligible: now + delay,
        };
        state.entries.insert(key, entry);
        entry
    }

    /// Forgets entries idle past their deadline for the retention period.
    /// Returns how many were dropped.
    pub fn prune(&self) -> usize {
        self.prune_at(Instant::now())
    }

    /// Like [`prune`](Self::prune), evaluated at `now`.
    pub fn prune_at(&self, now: Instant) -> usize {
        let retention = self.schedule.read().retention();
        self.state.lock().prune(now, retention)
    }

    /// Drops the entry for `key`. Returns true if one existed.
    pub fn clear(&self, key: TileKey) -> bool {
        self.state.lock().entries.remove(&key).is_some()
    }

    /// Current entry for `key`, if any.
    pub fn entry(&self, key: TileKey) -> Option<BackoffEntry> {
        self.state.lock().entries.get(&key).copied()
    }

    /// Replaces the schedule. Existing deadlines are kept; the new schedule
    /// applies from each tile's next failure.
    pub fn set_schedule(&self, schedule: BackoffSchedule) {
        *self.schedule.write() = schedule;
    }

    /// The active schedule.
    pub fn schedule(&self) -> BackoffSchedule {
        self.schedule.read().clone()
    }

    /// Number of tiles with a backoff entry.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Whether no tile is backed off.
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }
}

impl Default for BackoffRegistry {
    fn default() -> Self {
        Self::new(BackoffSchedule::default())
    }
}
