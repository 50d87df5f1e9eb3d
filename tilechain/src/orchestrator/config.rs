//! Orchestrator configuration.

use std::fmt;
use std::str::FromStr;

use super::backoff::BackoffSchedule;

/// Default capacity of the tile event broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// When stale cache hits are returned without dispatching a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DegradedMode {
    /// Stale hits always trigger a refresh.
    #[default]
    Never,
    /// Stale hits are accepted as final while the network is unavailable.
    WhenOffline,
    /// Stale hits are always accepted as final.
    Always,
}

impl DegradedMode {
    /// Whether stale data is accepted given the current connectivity.
    pub fn accepts_stale(&self, network_available: bool) -> bool {
        match self {
            DegradedMode::Never => false,
            DegradedMode::WhenOffline => !network_available,
            DegradedMode::Always => true,
        }
    }
}

impl fmt::Display for DegradedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradedMode::Never => write!(f, "never"),
            DegradedMode::WhenOffline => write!(f, "when_offline"),
            DegradedMode::Always => write!(f, "always"),
        }
    }
}

impl FromStr for DegradedMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "never" => Ok(DegradedMode::Never),
            "when_offline" | "offline" => Ok(DegradedMode::WhenOffline),
            "always" => Ok(DegradedMode::Always),
            other => Err(format!("unknown degraded mode '{}'", other)),
        }
    }
}

/// Configuration for [`TileOrchestrator`](super::TileOrchestrator).
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Backoff applied after full-chain failures.
    pub backoff_schedule: BackoffSchedule,
    /// Stale-hit policy.
    pub degraded_mode: DegradedMode,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            backoff_schedule: BackoffSchedule::default(),
            degraded_mode: DegradedMode::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl OrchestratorConfig {
    /// Sets the backoff schedule.
    pub fn with_backoff_schedule(mut self, schedule: BackoffSchedule) -> Self {
        self.backoff_schedule = schedule;
        self
    }

    /// Sets the degraded mode.
    pub fn with_degraded_mode(mut self, mode: DegradedMode) -> Self {
        self.degraded_mode = mode;
        self
    }

    /// Sets the event channel capacity (minimum 1).
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_stale() {
        assert!(!DegradedMode::Never.accepts_stale(false));
        assert!(DegradedMode::WhenOffline.accepts_stale(false));
        assert!(!DegradedMode::WhenOffline.accepts_stale(true));
        assert!(DegradedMode::Always.accepts_stale(true));
    }

    #[test]
    fn test_degraded_mode_parse_roundtrip() {
        for mode in [
            DegradedMode::Never,
            DegradedMode::WhenOffline,
            DegradedMode::Always,
        ] {
            assert_eq!(mode.to_string().parse::<DegradedMode>(), Ok(mode));
        }
        assert!("sometimes".parse::<DegradedMode>().is_err());
    }

    #[test]
    fn test_event_capacity_minimum() {
        let config = OrchestratorConfig::default().with_event_capacity(0);
        assert_eq!(config.event_capacity, 1);
    }
}
