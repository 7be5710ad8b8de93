//! Circuit breaker guarding calls to a downstream store (spec §4.2, C3).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::domain::errors::{Severity, Store, TripleDbError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::seconds(60),
        }
    }
}

#[derive(Debug, Clone)]
struct Circuit {
    state: CircuitState,
    failure_count: u32,
    last_failure_at: Option<DateTime<Utc>>,
}

impl Circuit {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_at: None,
        }
    }
}

/// Result of asking the breaker whether a call is currently allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitCheck {
    Allowed,
    /// Allowed as the single half-open trial call.
    Trial,
    Blocked,
}

/// One breaker per store, each an independent closed/open/half-open
/// state machine (spec §4.2).
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    circuits: RwLock<HashMap<Store, Circuit>>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            circuits: RwLock::new(HashMap::new()),
        })
    }

    /// Check whether a call to `store` is currently allowed, transitioning
    /// `Open` -> `HalfOpen` if the recovery timeout has elapsed.
    pub async fn check(&self, store: Store) -> CircuitCheck {
        let mut circuits = self.circuits.write().await;
        let circuit = circuits.entry(store).or_insert_with(Circuit::new);

        match circuit.state {
            CircuitState::Closed => CircuitCheck::Allowed,
            CircuitState::HalfOpen => CircuitCheck::Trial,
            CircuitState::Open => {
                let elapsed = circuit
                    .last_failure_at
                    .map(|t| Utc::now() - t)
                    .unwrap_or(Duration::zero());
                if elapsed > self.config.recovery_timeout {
                    circuit.state = CircuitState::HalfOpen;
                    CircuitCheck::Trial
                } else {
                    CircuitCheck::Blocked
                }
            }
        }
    }

    pub async fn record_success(&self, store: Store) {
        let mut circuits = self.circuits.write().await;
        let circuit = circuits.entry(store).or_insert_with(Circuit::new);
        circuit.state = CircuitState::Closed;
        circuit.failure_count = 0;
    }

    pub async fn record_failure(&self, store: Store) {
        let mut circuits = self.circuits.write().await;
        let circuit = circuits.entry(store).or_insert_with(Circuit::new);
        circuit.failure_count += 1;
        circuit.last_failure_at = Some(Utc::now());
        if circuit.failure_count >= self.config.failure_threshold {
            circuit.state = CircuitState::Open;
        }
    }

    pub async fn state(&self, store: Store) -> CircuitState {
        self.circuits.read().await.get(&store).map(|c| c.state).unwrap_or(CircuitState::Closed)
    }

    /// Run `f` through the breaker for `store`: fails fast with
    /// `ConnectionFailed(high)` while open, otherwise runs `f` and
    /// records success/failure (spec §4.2, §4.10).
    pub async fn guard<F, T, Fut>(&self, store: Store, f: F) -> Result<T, TripleDbError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, TripleDbError>>,
    {
        match self.check(store).await {
            CircuitCheck::Blocked => Err(TripleDbError::ConnectionFailed {
                store,
                message: "circuit open".to_string(),
            }),
            CircuitCheck::Allowed | CircuitCheck::Trial => match f().await {
                Ok(value) => {
                    self.record_success(store).await;
                    Ok(value)
                }
                Err(error) => {
                    self.record_failure(store).await;
                    Err(error)
                }
            },
        }
    }
}

/// Severity a circuit-open rejection should carry (spec §4.2: "rejects
/// with `TripleDbError(high)`").
pub fn open_circuit_severity() -> Severity {
    Severity::High
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_after_threshold_failures() {
        let registry = CircuitBreakerRegistry::new(CircuitBreakerConfig {
            failure_threshold: 3,
            recovery_timeout: Duration::seconds(60),
        });

        for _ in 0..3 {
            registry.record_failure(Store::Vector).await;
        }

        assert_eq!(registry.state(Store::Vector).await, CircuitState::Open);
        assert_eq!(registry.check(Store::Vector).await, CircuitCheck::Blocked);
    }

    #[tokio::test]
    async fn closed_circuit_allows_calls() {
        let registry = CircuitBreakerRegistry::new(CircuitBreakerConfig::default());
        assert_eq!(registry.check(Store::Graph).await, CircuitCheck::Allowed);
    }

    #[tokio::test]
    async fn half_open_trial_closes_on_success() {
        let registry = CircuitBreakerRegistry::new(CircuitBreakerConfig {
            failure_threshold: 1,
            recovery_timeout: Duration::seconds(0),
        });
        registry.record_failure(Store::Vector).await;
        assert_eq!(registry.check(Store::Vector).await, CircuitCheck::Trial);
        registry.record_success(Store::Vector).await;
        assert_eq!(registry.state(Store::Vector).await, CircuitState::Closed);
    }
}
