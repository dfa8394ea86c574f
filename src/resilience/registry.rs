//! Breaker registry.
//!
//! Owns one [`CircuitBreaker`] per dependency key. Breakers are created on
//! first reference with the configured default (or the key's override) and
//! live until [`clear`](BreakerRegistry::clear).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use dashmap::DashMap;

use crate::config::BreakerConfig;
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerSnapshot};
use crate::resilience::clock::Clock;

#[derive(Debug)]
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    default_config: BreakerConfig,
    overrides: HashMap<String, BreakerConfig>,
    clock: Arc<dyn Clock>,
}

impl BreakerRegistry {
    pub fn new(
        default_config: BreakerConfig,
        overrides: HashMap<String, BreakerConfig>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            breakers: DashMap::new(),
            default_config,
            overrides,
            clock,
        }
    }

    /// Configuration a new breaker for `key` would get.
    pub fn config_for(&self, key: &str) -> BreakerConfig {
        self.overrides.get(key).copied().unwrap_or(self.default_config)
    }

    /// Existing breaker for `key`, or a fresh one. Racing callers get the same instance.
    pub fn get_or_create(&self, key: &str) -> Arc<CircuitBreaker> {
        self.get_or_create_with(key, self.config_for(key))
    }

    /// Like [`get_or_create`](Self::get_or_create) with explicit thresholds.
    /// `config` is ignored if the breaker already exists.
    pub fn get_or_create_with(&self, key: &str, config: BreakerConfig) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(key) {
            return existing.value().clone();
        }
        self.breakers
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(key, config, self.clock.clone())))
            .value()
            .clone()
    }

    pub fn get(&self, key: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(key).map(|r| r.value().clone())
    }

    pub fn snapshot(&self) -> BTreeMap<String, CircuitBreakerSnapshot> {
        self.breakers
            .iter()
            .map(|r| (r.key().clone(), r.value().snapshot()))
            .collect()
    }

    /// Force every registered breaker to Closed.
    ///
    /// Each breaker is reset atomically, but the sweep is not one snapshot:
    /// a call settling on one key may land before or after the sweep reaches it.
    pub fn reset_all(&self) -> usize {
        let mut count = 0;
        for entry in self.breakers.iter() {
            entry.value().reset();
            count += 1;
        }
        count
    }

    /// Force one breaker to Closed. Returns `false` for an unknown key.
    pub fn reset(&self, key: &str) -> bool {
        match self.breakers.get(key) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// Forget every breaker.
    pub fn clear(&self) {
        self.breakers.clear();
    }
}
