//! Core attempt limiter implementation.

use serde::Serialize;
use tracing::{debug, trace, warn};

use super::clock::{Clock, SystemClock};
use super::key::LimiterKey;
use super::record::AttemptRecord;
use crate::error::{BloomError, Result};
use crate::store::KeyValueStore;

/// Default number of attempts allowed per window.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
/// Default window length in milliseconds.
pub const DEFAULT_WINDOW_MS: u64 = 60_000;

/// Limits applied by one limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitConfig {
    /// Attempts allowed before checks report `limited`
    pub max_attempts: u32,
    /// Window length in milliseconds
    pub window_ms: u64,
}

impl LimitConfig {
    /// Create a limit, rejecting zero attempts or an empty window.
    pub fn new(max_attempts: u32, window_ms: u64) -> Result<Self> {
        let config = Self {
            max_attempts,
            window_ms,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that both values are positive and the window fits in epoch millis.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(BloomError::Config("max_attempts must be positive".into()));
        }
        if self.window_ms == 0 {
            return Err(BloomError::Config("window_ms must be positive".into()));
        }
        if i64::try_from(self.window_ms).is_err() {
            return Err(BloomError::Config(format!(
                "window_ms must not exceed {}",
                i64::MAX
            )));
        }
        Ok(())
    }
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            window_ms: DEFAULT_WINDOW_MS,
        }
    }
}

/// Result of a limiter check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutcome {
    /// The caller must not perform the gated action
    pub limited: bool,
    /// Attempts left before checks start reporting `limited`
    pub remaining_attempts: u32,
    /// Epoch milliseconds at which the window (and any block) clears
    pub reset_time: i64,
}

impl CheckOutcome {
    /// Milliseconds from `now_ms` until the window clears, zero if it already has.
    pub fn retry_after(&self, now_ms: i64) -> u64 {
        self.reset_time.saturating_sub(now_ms).max(0) as u64
    }
}

/// Counts attempts at a named action within a fixed window.
///
/// State lives in the injected [`KeyValueStore`] under a namespaced key, so
/// it survives restarts when the store is durable. `check` reads, computes
/// and writes back without any locking: two concurrent checks for the same
/// key may both observe the same count.
pub struct AttemptLimiter<S, C = SystemClock> {
    key: LimiterKey,
    store_key: String,
    config: LimitConfig,
    store: S,
    clock: C,
}

impl<S: KeyValueStore> AttemptLimiter<S, SystemClock> {
    /// Create a limiter with the default limits (5 attempts per minute).
    pub fn new(name: &str, store: S) -> Self {
        Self::with_config(name, LimitConfig::default(), store)
    }

    /// Create a limiter with explicit limits.
    pub fn with_config(name: &str, config: LimitConfig, store: S) -> Self {
        Self::with_clock(name, config, store, SystemClock)
    }
}

impl<S: KeyValueStore, C: Clock> AttemptLimiter<S, C> {
    /// Create a limiter reading time from `clock`.
    pub fn with_clock(name: &str, config: LimitConfig, store: S, clock: C) -> Self {
        let key = LimiterKey::new(name);
        Self {
            store_key: key.to_store_key(),
            key,
            config,
            store,
            clock,
        }
    }

    /// The key this limiter owns.
    pub fn key(&self) -> &LimiterKey {
        &self.key
    }

    /// The limits this limiter applies.
    pub fn config(&self) -> LimitConfig {
        self.config
    }

    /// Record an attempt and report whether it must be blocked.
    ///
    /// Never fails: if the store cannot be read or written, or holds a
    /// record that does not decode, the check is allowed with the full
    /// attempt budget and a window starting now.
    pub async fn check(&self) -> CheckOutcome {
        let now = self.clock.now_ms();
        match self.check_at(now).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    key = %self.key,
                    error = %e,
                    "Attempt limiter storage failed, allowing attempt"
                );
                self.fail_open(now)
            }
        }
    }

    /// Record an attempt, surfacing storage errors instead of failing open.
    pub async fn try_check(&self) -> Result<CheckOutcome> {
        self.check_at(self.clock.now_ms()).await
    }

    /// Forget every attempt recorded for this key.
    pub async fn reset(&self) -> Result<()> {
        debug!(key = %self.key, "Resetting attempt limiter");
        self.store.delete(&self.store_key).await?;
        Ok(())
    }

    /// Report the live window without recording an attempt.
    ///
    /// Returns `None` when no window is in effect. `limited` tells whether
    /// the next `check` would be blocked.
    pub async fn status(&self) -> Result<Option<CheckOutcome>> {
        let now = self.clock.now_ms();
        let record = match self.load().await? {
            Some(record) if !record.is_expired(now) => record,
            _ => return Ok(None),
        };

        Ok(Some(CheckOutcome {
            limited: record.attempts >= self.config.max_attempts,
            remaining_attempts: self.config.max_attempts.saturating_sub(record.attempts),
            reset_time: record.reset_time,
        }))
    }

    async fn check_at(&self, now: i64) -> Result<CheckOutcome> {
        trace!(key = %self.key, now = now, "Checking attempt limit");

        let current = match self.load().await? {
            Some(record) if !record.is_expired(now) => record,
            _ => {
                let record = AttemptRecord::first(now, self.config.window_ms);
                debug!(
                    key = %self.key,
                    reset_time = record.reset_time,
                    "Opening new attempt window"
                );
                self.store.set(&self.store_key, record.encode()?).await?;
                return Ok(self.outcome(record.attempts, record.reset_time));
            }
        };

        let next = current.next_attempt();
        let outcome = self.outcome(next.attempts, next.reset_time);

        // Once over the limit the stored count stays where it last landed.
        if outcome.limited {
            debug!(
                key = %self.key,
                attempts = next.attempts,
                limit = self.config.max_attempts,
                "Attempt limit exceeded"
            );
        } else {
            self.store.set(&self.store_key, next.encode()?).await?;
        }

        Ok(outcome)
    }

    async fn load(&self) -> Result<Option<AttemptRecord>> {
        match self.store.get(&self.store_key).await? {
            Some(raw) => Ok(Some(AttemptRecord::decode(&raw)?)),
            None => Ok(None),
        }
    }

    fn outcome(&self, attempts: u32, reset_time: i64) -> CheckOutcome {
        CheckOutcome {
            limited: attempts > self.config.max_attempts,
            remaining_attempts: self.config.max_attempts.saturating_sub(attempts),
            reset_time,
        }
    }

    fn fail_open(&self, now: i64) -> CheckOutcome {
        CheckOutcome {
            limited: false,
            remaining_attempts: self.config.max_attempts,
            reset_time: AttemptRecord::first(now, self.config.window_ms).reset_time,
        }
    }
}
