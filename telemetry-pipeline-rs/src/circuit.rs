//! # Oracle Circuit
//!
//! Shared cool-down gate in front of the reasoning oracle. A rate limit
//! opens the circuit for the configured cool-down; once it lapses exactly
//! one caller is let through as a probe while everyone else stays blocked.
//! The probe's outcome decides whether the circuit closes or reopens.

use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation
    Closed,
    /// Blocking all calls until the deadline
    Open { until: Instant },
    /// One probe call is in flight
    Probing { since: Instant },
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open { .. } => write!(f, "open"),
            CircuitState::Probing { .. } => write!(f, "probing"),
        }
    }
}

#[derive(Debug)]
pub struct OracleCircuit {
    state: Mutex<CircuitState>,
    cooldown: Duration,
}

impl OracleCircuit {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            state: Mutex::new(CircuitState::Closed),
            cooldown,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn state(&self) -> CircuitState {
        *self.lock()
    }

    pub fn is_open(&self) -> bool {
        !matches!(self.state(), CircuitState::Closed)
    }

    /// Ask permission to call the oracle.
    ///
    /// Returns `false` while the circuit is open or another caller holds
    /// the probe. A probe that never reports back is replaced after one
    /// cool-down.
    pub fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut state = self.lock();

        match *state {
            CircuitState::Closed => true,
            CircuitState::Open { until } if now < until => false,
            CircuitState::Open { .. } => {
                info!("Oracle cool-down elapsed, admitting probe call");
                *state = CircuitState::Probing { since: now };
                true
            }
            CircuitState::Probing { since } if now.duration_since(since) >= self.cooldown => {
                warn!("Oracle probe went unanswered, admitting another");
                *state = CircuitState::Probing { since: now };
                true
            }
            CircuitState::Probing { .. } => false,
        }
    }

    /// Open the circuit after a rate limit
    pub fn trip(&self) {
        let until = Instant::now() + self.cooldown;
        let mut state = self.lock();
        warn!(
            "Oracle rate limited, circuit {} -> open for {:?}",
            *state, self.cooldown
        );
        *state = CircuitState::Open { until };
    }

    pub fn record_success(&self) {
        self.settle("success");
    }

    /// A failure that was not a rate limit
    pub fn record_failure(&self) {
        self.settle("failure");
    }

    // A concluded probe closes the circuit; an open circuit stays open
    // until its deadline.
    fn settle(&self, outcome: &str) {
        let mut state = self.lock();
        if let CircuitState::Probing { .. } = *state {
            info!("Oracle probe ended in {}, circuit closed", outcome);
            *state = CircuitState::Closed;
        } else {
            debug!("Oracle call ended in {} with circuit {}", outcome, *state);
        }
    }

    fn lock(&self) -> MutexGuard<'_, CircuitState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
