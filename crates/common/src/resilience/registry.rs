//! Registry of named circuit breaker instances.
//!
//! Each logical operation category (for example `network_recovery`) shares a
//! single breaker and its failure statistics; the registry owns the
//! name-to-instance mapping and never mutates breaker state directly.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use super::circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, ConfigResult,
};

/// Lazily populated map of named circuit breakers.
#[derive(Debug, Default)]
pub struct CircuitBreakerRegistry {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the breaker registered under `name`, creating it with `config` if
    /// absent. Idempotent by name: the first caller's configuration wins and
    /// later configs for the same name are ignored.
    pub fn get_or_create(
        &self,
        name: &str,
        config: CircuitBreakerConfig,
    ) -> ConfigResult<Arc<CircuitBreaker>> {
        if let Some(existing) = self.read().get(name) {
            return Ok(Arc::clone(existing));
        }

        let mut breakers = self.write();
        // Racing creators: re-check under the write lock.
        if let Some(existing) = breakers.get(name) {
            return Ok(Arc::clone(existing));
        }
        let breaker = Arc::new(CircuitBreaker::new(name, config)?);
        debug!("created circuit breaker '{name}'");
        breakers.insert(name.to_string(), Arc::clone(&breaker));
        Ok(breaker)
    }

    /// Get an existing breaker without creating one.
    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.read().get(name).cloned()
    }

    /// Metrics snapshots for every registered breaker.
    pub fn all_metrics(&self) -> Vec<CircuitBreakerMetrics> {
        self.read().values().map(|breaker| breaker.metrics()).collect()
    }

    /// Reset every registered breaker to closed.
    pub fn reset_all(&self) {
        for breaker in self.read().values() {
            breaker.reset();
        }
    }

    /// Remove a breaker from the registry, returning it if present.
    pub fn remove(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.write().remove(name)
    }

    /// Drop every registered breaker.
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Number of registered breakers.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the registry has no breakers.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Registered breaker names, unordered.
    pub fn names(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<CircuitBreaker>>> {
        match self.breakers.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("circuit breaker registry lock poisoned");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<CircuitBreaker>>> {
        match self.breakers.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("circuit breaker registry lock poisoned");
                poisoned.into_inner()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::circuit_breaker::CircuitState;
    use std::time::Duration;

    fn config(failure_threshold: u32) -> CircuitBreakerConfig {
        CircuitBreakerConfig { failure_threshold, ..Default::default() }
    }

    #[test]
    fn test_get_or_create_is_idempotent_and_first_config_wins() {
        let registry = CircuitBreakerRegistry::new();

        let first = registry.get_or_create("network_recovery", config(6)).expect("valid");
        let second = registry.get_or_create("network_recovery", config(99)).expect("valid");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
        // The second config was ignored: 6 failures still open the breaker.
        for _ in 0..6 {
            first.record_failure();
        }
        assert_eq!(first.state(), CircuitState::Open);
    }

    #[test]
    fn test_separate_names_have_independent_state() {
        let registry = CircuitBreakerRegistry::new();
        let network = registry.get_or_create("network_recovery", config(1)).expect("valid");
        let audio = registry.get_or_create("audio_context_recovery", config(1)).expect("valid");

        network.record_failure();
        assert_eq!(network.state(), CircuitState::Open);
        assert_eq!(audio.state(), CircuitState::Closed);
    }

    #[test]
    fn test_all_metrics_covers_every_breaker() {
        let registry = CircuitBreakerRegistry::new();
        registry.get_or_create("a", config(2)).expect("valid");
        registry.get_or_create("b", config(2)).expect("valid");

        let metrics = registry.all_metrics();
        assert_eq!(metrics.len(), 2);
        let mut names: Vec<_> = metrics.iter().map(|m| m.name.clone()).collect();
        names.sort();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_reset_all_closes_open_breakers() {
        let registry = CircuitBreakerRegistry::new();
        let breaker = registry.get_or_create("flaky", config(1)).expect("valid");
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);

        registry.reset_all();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_remove_and_clear() {
        let registry = CircuitBreakerRegistry::new();
        registry.get_or_create("a", config(2)).expect("valid");
        registry.get_or_create("b", config(2)).expect("valid");

        assert!(registry.remove("a").is_some());
        assert!(registry.remove("a").is_none());
        assert_eq!(registry.len(), 1);

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let registry = CircuitBreakerRegistry::new();
        let bad = CircuitBreakerConfig {
            failure_threshold: 0,
            recovery_timeout: Duration::from_secs(1),
            ..Default::default()
        };
        assert!(registry.get_or_create("bad", bad).is_err());
        assert!(registry.is_empty());
    }
}
