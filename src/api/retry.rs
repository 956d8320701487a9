use std::time::Duration;

/// Number of retries applied to a request by default
pub const DEFAULT_RETRIES: u32 = 5;

/// Status code Airtable uses to signal the per-base QPS limit
pub const TOO_MANY_REQUESTS: u16 = 429;

/// How a request reacts to throttling responses.
///
/// With the defaults a request that keeps getting HTTP 429 is sent once and
/// then retried five more times before the error surfaces.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryStrategy {
    /// Retries allowed after the first attempt
    pub total: u32,
    /// Statuses that trigger a retry
    pub status_forcelist: Vec<u16>,
    pub backoff_factor: Duration,
    pub backoff_max: Duration,
    /// Prefer the server's `Retry-After` over computed backoff
    pub respect_retry_after: bool,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self {
            total: DEFAULT_RETRIES,
            status_forcelist: vec![TOO_MANY_REQUESTS],
            backoff_factor: Duration::from_millis(100),
            backoff_max: Duration::from_secs(120),
            respect_retry_after: true,
        }
    }
}

impl RetryStrategy {
    pub fn new(total: u32) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// A strategy that never retries
    pub fn none() -> Self {
        Self::new(0)
    }

    pub fn with_backoff_factor(mut self, factor: Duration) -> Self {
        self.backoff_factor = factor;
        self
    }

    pub fn with_backoff_max(mut self, max: Duration) -> Self {
        self.backoff_max = max;
        self
    }

    pub fn with_status_forcelist(mut self, statuses: Vec<u16>) -> Self {
        self.status_forcelist = statuses;
        self
    }

    pub fn is_retryable(&self, status: u16) -> bool {
        self.status_forcelist.contains(&status)
    }

    /// Whether another attempt is allowed after `retries_used` retries
    pub fn can_retry(&self, retries_used: u32) -> bool {
        retries_used < self.total
    }

    /// Delay before retry number `retry` (1-based).
    ///
    /// The first retry goes out immediately, later ones back off
    /// exponentially. A server-provided `Retry-After` wins when honoured.
    pub fn backoff(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        if self.respect_retry_after {
            if let Some(wait) = retry_after {
                return wait.min(self.backoff_max);
            }
        }
        if retry <= 1 {
            return Duration::ZERO;
        }
        let exponent = (retry - 1).min(31);
        self.backoff_factor
            .saturating_mul(1u32 << exponent)
            .min(self.backoff_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_retry_429_five_times() {
        let strategy = RetryStrategy::default();
        assert_eq!(strategy.total, 5);
        assert!(strategy.is_retryable(429));
        assert!(!strategy.is_retryable(500));
        assert!(strategy.can_retry(4));
        assert!(!strategy.can_retry(5));
    }

    #[test]
    fn test_none_never_retries() {
        assert!(!RetryStrategy::none().can_retry(0));
    }

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let strategy = RetryStrategy::default()
            .with_backoff_factor(Duration::from_millis(100))
            .with_backoff_max(Duration::from_secs(1));
        assert_eq!(strategy.backoff(1, None), Duration::ZERO);
        assert_eq!(strategy.backoff(2, None), Duration::from_millis(200));
        assert_eq!(strategy.backoff(3, None), Duration::from_millis(400));
        assert_eq!(strategy.backoff(4, None), Duration::from_millis(800));
        assert_eq!(strategy.backoff(5, None), Duration::from_secs(1));
        assert_eq!(strategy.backoff(40, None), Duration::from_secs(1));
    }

    #[test]
    fn test_retry_after_takes_precedence() {
        let strategy = RetryStrategy::default();
        assert_eq!(
            strategy.backoff(1, Some(Duration::from_secs(30))),
            Duration::from_secs(30)
        );
        assert_eq!(
            strategy.backoff(1, Some(Duration::from_secs(600))),
            Duration::from_secs(120)
        );

        let mut ignoring = RetryStrategy::default();
        ignoring.respect_retry_after = false;
        assert_eq!(ignoring.backoff(1, Some(Duration::from_secs(30))), Duration::ZERO);
    }
}
