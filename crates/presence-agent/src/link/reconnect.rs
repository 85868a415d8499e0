//! Exponential backoff between connection attempts

use std::time::Duration;

use presence_core::config::BackoffConfig;

/// Exponential backoff with jitter for reconnection attempts
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Delay handed out by the next call
    current: Duration,
    /// Where `reset` returns to
    initial: Duration,
    /// Maximum delay before jitter
    max: Duration,
    /// Multiplier
    multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    jitter: f64,
}

impl ExponentialBackoff {
    /// Create a new backoff from configuration
    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(config.initial, config.max, config.multiplier, config.jitter)
    }

    /// Create a new backoff with custom parameters
    pub fn new(initial: Duration, max: Duration, multiplier: f64, jitter: f64) -> Self {
        Self {
            current: initial,
            initial,
            max,
            multiplier,
            jitter,
        }
    }

    /// Get the next delay and advance the backoff
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;

        let next = self.current.as_secs_f64() * self.multiplier;
        self.current = Duration::try_from_secs_f64(next)
            .map_or(self.max, |next| std::cmp::min(next, self.max));

        // Jitter only ever lengthens the wait
        let jitter_amount = delay.as_secs_f64() * self.jitter * rand::random::<f64>();
        delay.saturating_add(Duration::try_from_secs_f64(jitter_amount).unwrap_or_default())
    }

    /// Start over from the initial delay, after a connection that worked
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_increases() {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_secs(1),
            Duration::from_secs(60),
            2.0,
            0.0, // No jitter for deterministic test
        );

        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(), Duration::from_secs(4));
    }

    #[test]
    fn test_backoff_max() {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_secs(30), Duration::from_secs(60), 2.0, 0.0);

        assert_eq!(backoff.next_delay(), Duration::from_secs(30));
        assert_eq!(backoff.next_delay(), Duration::from_secs(60)); // Capped at max
        assert_eq!(backoff.next_delay(), Duration::from_secs(60));
    }

    #[test]
    fn test_reset_returns_to_initial() {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(60), 2.0, 0.0);
        backoff.next_delay();
        backoff.next_delay();
        backoff.next_delay();

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_jitter_stays_within_factor() {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_secs(4), Duration::from_secs(60), 1.0, 0.25);
        for _ in 0..50 {
            let delay = backoff.next_delay();
            assert!(delay >= Duration::from_secs(4));
            assert!(delay <= Duration::from_secs(5));
        }
    }

    #[test]
    fn test_unrepresentable_growth_caps_at_max() {
        for multiplier in [f64::NAN, f64::INFINITY, 1e300] {
            let mut backoff = ExponentialBackoff::new(
                Duration::from_secs(1),
                Duration::from_secs(60),
                multiplier,
                0.0,
            );
            assert_eq!(backoff.next_delay(), Duration::from_secs(1));
            assert_eq!(backoff.next_delay(), Duration::from_secs(60));
            assert_eq!(backoff.next_delay(), Duration::from_secs(60));
        }
    }

    #[test]
    fn test_jitter_saturates_at_huge_delay() {
        let mut backoff = ExponentialBackoff::new(Duration::MAX, Duration::MAX, 1.0, 1.0);
        assert!(backoff.next_delay() >= Duration::MAX - Duration::from_secs(1));
    }

    #[test]
    fn test_from_config_defaults() {
        let mut backoff = ExponentialBackoff::from_config(&BackoffConfig {
            jitter: 0.0,
            ..Default::default()
        });
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
    }
}
