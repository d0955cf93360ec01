//! Rate limiting primitives.
//!
//! Fixed-window counters keyed by (caller, endpoint class). Login and refresh
//! are higher-value targets than general API traffic, so they default to
//! tighter windows. The `RateLimiter` trait keeps the seam open for an
//! external store; the in-process implementation is enough for a single node.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
const DEFAULT_LOGIN_LIMIT: u32 = 10;
const DEFAULT_REFRESH_LIMIT: u32 = 30;
const DEFAULT_API_LIMIT: u32 = 120;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EndpointClass {
    Login,
    Refresh,
    Api,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    /// Advisory delay so well-behaved clients back off.
    Limited { retry_after_seconds: u64 },
}

pub trait RateLimiter: Send + Sync {
    fn check(&self, key: &str, class: EndpointClass) -> RateDecision;
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check(&self, _key: &str, _class: EndpointClass) -> RateDecision {
        RateDecision::Allowed
    }
}

#[derive(Clone, Copy, Debug)]
pub struct WindowConfig {
    pub limit: u32,
    pub window: Duration,
}

impl WindowConfig {
    #[must_use]
    pub const fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }
}

struct WindowState {
    count: u32,
    started: Instant,
}

pub struct FixedWindowLimiter {
    login: WindowConfig,
    refresh: WindowConfig,
    api: WindowConfig,
    windows: Mutex<HashMap<(EndpointClass, String), WindowState>>,
}

impl FixedWindowLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            login: WindowConfig::new(DEFAULT_LOGIN_LIMIT, DEFAULT_WINDOW),
            refresh: WindowConfig::new(DEFAULT_REFRESH_LIMIT, DEFAULT_WINDOW),
            api: WindowConfig::new(DEFAULT_API_LIMIT, DEFAULT_WINDOW),
            windows: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_login(mut self, config: WindowConfig) -> Self {
        self.login = config;
        self
    }

    #[must_use]
    pub fn with_refresh(mut self, config: WindowConfig) -> Self {
        self.refresh = config;
        self
    }

    #[must_use]
    pub fn with_api(mut self, config: WindowConfig) -> Self {
        self.api = config;
        self
    }

    const fn config(&self, class: EndpointClass) -> WindowConfig {
        match class {
            EndpointClass::Login => self.login,
            EndpointClass::Refresh => self.refresh,
            EndpointClass::Api => self.api,
        }
    }
}

impl Default for FixedWindowLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter for FixedWindowLimiter {
    fn check(&self, key: &str, class: EndpointClass) -> RateDecision {
        let config = self.config(class);
        let now = Instant::now();

        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            // Counters are advisory; a poisoned map just starts over.
            Err(poisoned) => poisoned.into_inner(),
        };

        // Drop rolled-over windows so the map does not grow unbounded.
        windows.retain(|(class, _), state| {
            now.duration_since(state.started) < self.config(*class).window
        });

        let state = windows
            .entry((class, key.to_string()))
            .or_insert(WindowState {
                count: 0,
                started: now,
            });

        if state.count >= config.limit {
            let elapsed = now.duration_since(state.started);
            let remaining = config.window.saturating_sub(elapsed);
            return RateDecision::Limited {
                retry_after_seconds: remaining.as_secs().max(1),
            };
        }

        state.count += 1;
        RateDecision::Allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(limit: u32) -> FixedWindowLimiter {
        FixedWindowLimiter::new()
            .with_login(WindowConfig::new(limit, Duration::from_secs(60)))
            .with_refresh(WindowConfig::new(limit, Duration::from_secs(60)))
            .with_api(WindowConfig::new(limit, Duration::from_secs(60)))
    }

    #[test]
    fn noop_always_allows() {
        let noop = NoopRateLimiter;
        for _ in 0..100 {
            assert_eq!(noop.check("1.2.3.4", EndpointClass::Login), RateDecision::Allowed);
        }
    }

    #[test]
    fn limit_is_enforced_within_the_window() {
        let limiter = limiter(3);
        for _ in 0..3 {
            assert_eq!(
                limiter.check("1.2.3.4", EndpointClass::Login),
                RateDecision::Allowed
            );
        }
        match limiter.check("1.2.3.4", EndpointClass::Login) {
            RateDecision::Limited {
                retry_after_seconds,
            } => {
                assert!(retry_after_seconds >= 1);
                assert!(retry_after_seconds <= 60);
            }
            RateDecision::Allowed => panic!("fourth call must be limited"),
        }
    }

    #[test]
    fn keys_are_counted_independently() {
        let limiter = limiter(1);
        assert_eq!(
            limiter.check("1.2.3.4", EndpointClass::Login),
            RateDecision::Allowed
        );
        assert_eq!(
            limiter.check("5.6.7.8", EndpointClass::Login),
            RateDecision::Allowed
        );
        assert!(matches!(
            limiter.check("1.2.3.4", EndpointClass::Login),
            RateDecision::Limited { .. }
        ));
    }

    #[test]
    fn classes_are_counted_independently() {
        let limiter = limiter(1);
        assert_eq!(
            limiter.check("1.2.3.4", EndpointClass::Login),
            RateDecision::Allowed
        );
        assert_eq!(
            limiter.check("1.2.3.4", EndpointClass::Refresh),
            RateDecision::Allowed
        );
        assert_eq!(
            limiter.check("1.2.3.4", EndpointClass::Api),
            RateDecision::Allowed
        );
    }

    #[test]
    fn window_rollover_resets_the_counter() {
        let limiter = FixedWindowLimiter::new()
            .with_login(WindowConfig::new(1, Duration::from_millis(20)));
        assert_eq!(
            limiter.check("1.2.3.4", EndpointClass::Login),
            RateDecision::Allowed
        );
        assert!(matches!(
            limiter.check("1.2.3.4", EndpointClass::Login),
            RateDecision::Limited { .. }
        ));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(
            limiter.check("1.2.3.4", EndpointClass::Login),
            RateDecision::Allowed
        );
    }

    #[test]
    fn default_windows_are_tighter_for_login_than_api() {
        let limiter = FixedWindowLimiter::new();
        assert!(limiter.login.limit < limiter.api.limit);
        assert!(limiter.refresh.limit < limiter.api.limit);
    }
}
