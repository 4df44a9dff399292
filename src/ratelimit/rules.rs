//! Named limiters for the application's gated actions.
//!
//! Sign-in and password reset each get their own limiter with its own key,
//! so their counters never interfere. The set is built once at start-up and
//! handed to the flows that need it.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::clock::{Clock, SystemClock};
use super::limiter::{AttemptLimiter, LimitConfig};
use crate::error::{BloomError, Result};
use crate::store::KeyValueStore;

/// Attempt limit as written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitRule {
    /// Attempts allowed per window
    pub max_attempts: u32,
    /// Window length in milliseconds
    pub window_ms: u64,
}

impl From<LimitRule> for LimitConfig {
    fn from(rule: LimitRule) -> Self {
        LimitConfig {
            max_attempts: rule.max_attempts,
            window_ms: rule.window_ms,
        }
    }
}

/// Limits for every named limiter.
///
/// Each field of a rule may be given on its own; whatever is left out keeps
/// that limiter's default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PartialLimitersConfig")]
pub struct LimitersConfig {
    /// Sign-in attempts
    pub auth: LimitRule,

    /// Password-reset requests
    pub password_reset: LimitRule,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PartialLimitersConfig {
    auth: PartialLimitRule,
    password_reset: PartialLimitRule,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PartialLimitRule {
    max_attempts: Option<u32>,
    window_ms: Option<u64>,
}

impl PartialLimitRule {
    fn or(self, default: LimitRule) -> LimitRule {
        LimitRule {
            max_attempts: self.max_attempts.unwrap_or(default.max_attempts),
            window_ms: self.window_ms.unwrap_or(default.window_ms),
        }
    }
}

impl From<PartialLimitersConfig> for LimitersConfig {
    fn from(partial: PartialLimitersConfig) -> Self {
        Self {
            auth: partial.auth.or(default_auth_rule()),
            password_reset: partial.password_reset.or(default_password_reset_rule()),
        }
    }
}

impl Default for LimitersConfig {
    fn default() -> Self {
        Self {
            auth: default_auth_rule(),
            password_reset: default_password_reset_rule(),
        }
    }
}

fn default_auth_rule() -> LimitRule {
    LimitRule {
        max_attempts: 5,
        window_ms: 5 * 60 * 1000,
    }
}

fn default_password_reset_rule() -> LimitRule {
    LimitRule {
        max_attempts: 3,
        window_ms: 10 * 60 * 1000,
    }
}

impl LimitersConfig {
    /// Reject any rule with zero attempts or an empty window.
    pub fn validate(&self) -> Result<()> {
        for name in LimiterName::ALL {
            LimitConfig::from(self.rule(name))
                .validate()
                .map_err(|e| BloomError::Config(format!("limiters.{}: {}", name, e)))?;
        }
        Ok(())
    }

    /// The rule for a named limiter.
    pub fn rule(&self, name: LimiterName) -> LimitRule {
        match name {
            LimiterName::Auth => self.auth,
            LimiterName::PasswordReset => self.password_reset,
        }
    }
}

/// The gated actions that carry a limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimiterName {
    Auth,
    PasswordReset,
}

impl LimiterName {
    pub const ALL: [LimiterName; 2] = [LimiterName::Auth, LimiterName::PasswordReset];

    /// The action name used to build the limiter's store key.
    pub fn as_str(&self) -> &'static str {
        match self {
            LimiterName::Auth => "auth",
            LimiterName::PasswordReset => "password_reset",
        }
    }
}

impl fmt::Display for LimiterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The application's limiters, sharing one store and one clock.
pub struct Limiters<S, C = SystemClock> {
    auth: AttemptLimiter<S, C>,
    password_reset: AttemptLimiter<S, C>,
}

impl<S: KeyValueStore + Clone> Limiters<S, SystemClock> {
    /// Build both limiters against the system clock.
    pub fn new(config: &LimitersConfig, store: S) -> Result<Self> {
        Self::with_clock(config, store, SystemClock)
    }
}

impl<S: KeyValueStore + Clone, C: Clock + Clone> Limiters<S, C> {
    /// Build both limiters reading time from `clock`.
    pub fn with_clock(config: &LimitersConfig, store: S, clock: C) -> Result<Self> {
        config.validate()?;
        let build = |name: LimiterName| {
            AttemptLimiter::with_clock(
                name.as_str(),
                config.rule(name).into(),
                store.clone(),
                clock.clone(),
            )
        };

        Ok(Self {
            auth: build(LimiterName::Auth),
            password_reset: build(LimiterName::PasswordReset),
        })
    }
}

impl<S: KeyValueStore, C: Clock> Limiters<S, C> {
    /// Limiter for sign-in attempts.
    pub fn auth(&self) -> &AttemptLimiter<S, C> {
        &self.auth
    }

    /// Limiter for password-reset requests.
    pub fn password_reset(&self) -> &AttemptLimiter<S, C> {
        &self.password_reset
    }

    /// Look a limiter up by name.
    pub fn get(&self, name: LimiterName) -> &AttemptLimiter<S, C> {
        match name {
            LimiterName::Auth => &self.auth,
            LimiterName::PasswordReset => &self.password_reset,
        }
    }

    /// Clear every limiter, e.g. when the user signs out.
    pub async fn reset_all(&self) -> Result<()> {
        for name in LimiterName::ALL {
            self.get(name).reset().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::clock::ManualClock;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn create_test_limiters() -> Limiters<Arc<MemoryStore>, Arc<ManualClock>> {
        Limiters::with_clock(
            &LimitersConfig::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap()
    }

    #[test]
    fn test_default_rules() {
        let config = LimitersConfig::default();
        assert_eq!(config.auth.max_attempts, 5);
        assert_eq!(config.auth.window_ms, 300_000);
        assert_eq!(config.password_reset.max_attempts, 3);
        assert_eq!(config.password_reset.window_ms, 600_000);
    }

    #[test]
    fn test_partial_rule_keeps_limiter_defaults() {
        let config: LimitersConfig = serde_yaml::from_str(
            r#"
auth:
  max_attempts: 10
password_reset:
  window_ms: 1000
"#,
        )
        .unwrap();

        assert_eq!(config.auth.max_attempts, 10);
        assert_eq!(config.auth.window_ms, 300_000);
        assert_eq!(config.password_reset.max_attempts, 3);
        assert_eq!(config.password_reset.window_ms, 1_000);
    }

    #[test]
    fn test_empty_config_is_default() {
        let config: LimitersConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, LimitersConfig::default());
    }

    #[test]
    fn test_invalid_rule_rejected() {
        let mut config = LimitersConfig::default();
        config.password_reset.max_attempts = 0;

        let result = Limiters::new(&config, Arc::new(MemoryStore::new()));
        assert!(matches!(result, Err(BloomError::Config(msg)) if msg.contains("password_reset")));
    }

    #[tokio::test]
    async fn test_limiters_are_independently_keyed() {
        let limiters = create_test_limiters();

        for _ in 0..3 {
            assert!(!limiters.password_reset().check().await.limited);
        }
        assert!(limiters.password_reset().check().await.limited);

        let outcome = limiters.auth().check().await;
        assert!(!outcome.limited);
        assert_eq!(outcome.remaining_attempts, 4);
        assert_eq!(outcome.reset_time, 300_000);
    }

    #[tokio::test]
    async fn test_reset_all() {
        let limiters = create_test_limiters();
        limiters.auth().check().await;
        limiters.password_reset().check().await;

        limiters.reset_all().await.unwrap();

        assert_eq!(limiters.auth().status().await.unwrap(), None);
        assert_eq!(limiters.password_reset().status().await.unwrap(), None);
    }

    #[test]
    fn test_get_by_name() {
        let limiters = create_test_limiters();
        assert_eq!(
            limiters.get(LimiterName::PasswordReset).key().to_store_key(),
            "rate_limit_password_reset"
        );
        assert_eq!(limiters.get(LimiterName::Auth).config().max_attempts, 5);
    }
}
