use std::time::Duration;

/// Trait for defining reconnection strategies
///
/// The strategy only answers "how long until attempt N, if at all"; the
/// retry counter itself lives in the supervisor, which resets it on every
/// successful open and on manual retry.
pub trait ReconnectionStrategy: Send + Sync {
    /// Get the delay before the next reconnection attempt
    ///
    /// # Arguments
    /// * `attempt` - Number of consecutive failures already retried (0-indexed)
    ///
    /// # Returns
    /// * `Some(duration)` - Wait this long before reconnecting
    /// * `None` - Retry ceiling reached, stop reconnecting
    fn next_delay(&self, attempt: usize) -> Option<Duration>;

    /// Maximum number of automatic attempts (None = unlimited)
    fn max_attempts(&self) -> Option<usize>;
}

/// Exponential backoff reconnection strategy
///
/// Delays between reconnection attempts grow exponentially:
/// initial_delay * 2^attempt, capped at max_delay. With a 1s initial delay,
/// a 16s cap and a ceiling of 5 this yields 1s, 2s, 4s, 8s, 16s.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<usize>,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff strategy
    ///
    /// # Arguments
    /// * `initial_delay` - The initial delay before first reconnect
    /// * `max_delay` - The maximum delay between reconnects
    /// * `max_attempts` - Maximum number of attempts (None = unlimited)
    pub fn new(initial_delay: Duration, max_delay: Duration, max_attempts: Option<usize>) -> Self {
        Self {
            initial_delay,
            max_delay,
            max_attempts,
        }
    }

    /// The market feed policy: 1s doubling to 16s, five attempts
    pub fn feed_default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(16), Some(5))
    }

    fn should_reconnect(&self, attempt: usize) -> bool {
        self.max_attempts.map_or(true, |max| attempt < max)
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        if !self.should_reconnect(attempt) {
            return None;
        }

        let initial = self.initial_delay.as_millis() as u64;
        let factor = 1u64.checked_shl(attempt.min(63) as u32).unwrap_or(u64::MAX);
        let delay = initial.saturating_mul(factor);
        let delay = Duration::from_millis(delay.min(self.max_delay.as_millis() as u64));
        Some(delay)
    }

    fn max_attempts(&self) -> Option<usize> {
        self.max_attempts
    }
}
