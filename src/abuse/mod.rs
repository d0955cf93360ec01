//! Abuse deterrence: login lockout policy and request rate limiting.
//!
//! The two mechanisms are independent and composable. A caller can be
//! rate-limited while unlocked and vice versa. Rate limiting is an abuse
//! deterrent, not a security boundary; slight over/under-count under race is
//! acceptable. Lockout counters, by contrast, are incremented atomically in
//! the store.

pub mod lockout;
pub mod rate_limit;

pub use lockout::LockoutPolicy;
pub use rate_limit::{
    EndpointClass, FixedWindowLimiter, NoopRateLimiter, RateDecision, RateLimiter, WindowConfig,
};
