//! Per-provider availability state (circuit breaker).
//!
//! ```text
//! Closed ──failure × threshold──▶ Open{until} ──cooldown elapsed──▶ HalfOpen
//!   ▲                                 ▲                               │
//!   └────────────success──────────────┼───────────────────────────────┤
//!                                     └───────────failure─────────────┘
//! ```
//!
//! A half-open provider gets exactly one attempt: success closes the
//! circuit, failure reopens it for another full cooldown.

use std::time::Duration;

use tokio::time::Instant;

/// Circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Provider is attempted normally.
    Closed,
    /// Provider is skipped until the deadline.
    Open { until: Instant },
    /// Cooldown elapsed; the next attempt decides.
    HalfOpen,
}

/// Availability bookkeeping for one provider. Owned by the orchestrator.
#[derive(Debug, Clone)]
pub struct ProviderState {
    state: CircuitState,
    consecutive_failures: u32,
    failure_threshold: u32,
    cooldown: Duration,
    last_failure: Option<Instant>,
    last_error: Option<String>,
}

impl ProviderState {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            failure_threshold: failure_threshold.max(1),
            cooldown,
            last_failure: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    /// `false` while the circuit is open.
    pub fn is_available(&self) -> bool {
        !matches!(self.state, CircuitState::Open { .. })
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_failure(&self) -> Option<Instant> {
        self.last_failure
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Decide whether the provider may be attempted at `now`.
    ///
    /// An open circuit whose cooldown has elapsed moves to half-open and is
    /// admitted.
    pub fn admit(&mut self, now: Instant) -> bool {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open { until } if now >= until => {
                self.state = CircuitState::HalfOpen;
                true
            }
            CircuitState::Open { .. } => false,
        }
    }

    /// Time left in cooldown, if open.
    pub fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        match self.state {
            CircuitState::Open { until } => Some(until.saturating_duration_since(now)),
            _ => None,
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.last_error = None;
        self.state = CircuitState::Closed;
    }

    pub fn record_failure(&mut self, now: Instant, reason: impl Into<String>) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure = Some(now);
        self.last_error = Some(reason.into());

        let trip = match self.state {
            CircuitState::Closed => self.consecutive_failures >= self.failure_threshold,
            CircuitState::HalfOpen => true,
            CircuitState::Open { .. } => false,
        };
        if trip {
            self.state = CircuitState::Open {
                until: now + self.cooldown,
            };
        }
    }
}
