//! Gateway middleware.

use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::num::NonZeroU32;

/// Per-username limiter for login attempts.
pub struct LoginRateLimiter {
    limiter: RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>,
}

impl LoginRateLimiter {
    /// Create a limiter allowing `attempts_per_minute` per username.
    #[must_use]
    pub fn new(attempts_per_minute: u32) -> Self {
        let quota =
            Quota::per_minute(NonZeroU32::new(attempts_per_minute).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: RateLimiter::keyed(quota),
        }
    }

    /// Record an attempt; returns whether it is allowed.
    ///
    /// `username` must already be normalised, otherwise spelling variants of
    /// one account get separate budgets.
    #[must_use]
    pub fn check(&self, username: &str) -> bool {
        self.limiter.check_key(&username.to_string()).is_ok()
    }

    /// Drop usernames whose budget has fully refilled.
    pub fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Number of usernames currently tracked.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.limiter.len()
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new(10)
    }
}

impl std::fmt::Debug for LoginRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRateLimiter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_per_username() {
        let limiter = LoginRateLimiter::new(2);
        assert!(limiter.check("root"));
        assert!(limiter.check("root"));
        assert!(!limiter.check("root"));

        // Other usernames have their own budget
        assert!(limiter.check("alice"));
    }

    #[test]
    fn test_prune_keeps_exhausted_keys() {
        let limiter = LoginRateLimiter::new(1);
        assert!(limiter.check("root"));
        assert!(!limiter.check("root"));
        assert_eq!(limiter.tracked(), 1);

        // A key still inside its window survives pruning
        limiter.prune();
        assert_eq!(limiter.tracked(), 1);
        assert!(!limiter.check("root"));
    }
}
