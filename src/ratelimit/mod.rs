//! Attempt limiting logic and state management.

mod clock;
mod key;
mod limiter;
mod record;
mod rules;

pub use clock::{Clock, ManualClock, SystemClock};
pub use key::{LimiterKey, KEY_PREFIX};
pub use limiter::{
    AttemptLimiter, CheckOutcome, LimitConfig, DEFAULT_MAX_ATTEMPTS, DEFAULT_WINDOW_MS,
};
pub use record::AttemptRecord;
pub use rules::{LimitRule, LimiterName, Limiters, LimitersConfig};
