//! Backoff for transient party service failures.
//!
//! Revision conflicts (409) are resolved by the patch loop one layer up and
//! never retried here.

use crate::client::config::ClientConfig;
use std::time::Duration;

/// Statuses that are worth another attempt.
const TRANSIENT_STATUS: [u16; 6] = [408, 425, 429, 502, 503, 504];

/// Attempt budget and delay bounds for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    /// The doubled delay stops growing here.
    pub max_backoff: Duration,
}

impl RetryConfig {
    #[must_use]
    pub fn from_client(config: &ClientConfig) -> Self {
        let base = Duration::from_millis(config.retry_delay_ms);
        Self {
            max_retries: config.max_retries,
            initial_backoff: base,
            max_backoff: base * 4,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from_client(&ClientConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry(Duration),
    DontRetry,
}

/// Attempts made so far for one request.
#[derive(Debug, Clone)]
pub struct RetryState {
    pub attempts: u32,
    backoff: Duration,
    config: RetryConfig,
}

impl RetryState {
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self {
            attempts: 0,
            backoff: config.initial_backoff,
            config,
        }
    }

    /// A response came back with a failing `status`. A `Retry-After` from
    /// the service replaces the computed delay.
    pub fn on_status(&mut self, status: u16, retry_after: Option<Duration>) -> RetryDecision {
        if !TRANSIENT_STATUS.contains(&status) {
            return RetryDecision::DontRetry;
        }
        self.next(retry_after)
    }

    /// The request failed before any status was received.
    pub fn on_transport_error(&mut self, retryable: bool) -> RetryDecision {
        if !retryable {
            return RetryDecision::DontRetry;
        }
        self.next(None)
    }

    fn next(&mut self, retry_after: Option<Duration>) -> RetryDecision {
        if self.attempts >= self.config.max_retries {
            return RetryDecision::DontRetry;
        }
        self.attempts += 1;
        let wait = retry_after.unwrap_or(self.backoff);
        self.backoff = (self.backoff * 2).min(self.config.max_backoff);
        RetryDecision::Retry(wait)
    }
}

/// `Retry-After` in whole seconds. HTTP dates are not sent by the service.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_retries: u32) -> RetryConfig {
        RetryConfig::from_client(&ClientConfig {
            max_retries,
            retry_delay_ms: 100,
            ..Default::default()
        })
    }

    #[test]
    fn test_budget_is_spent_then_exhausted() {
        let mut state = RetryState::new(config(1));
        assert_eq!(
            state.on_transport_error(true),
            RetryDecision::Retry(Duration::from_millis(100))
        );
        assert_eq!(state.on_transport_error(true), RetryDecision::DontRetry);
        assert_eq!(state.attempts, 1);
    }

    #[test]
    fn test_conflicts_and_hard_errors_are_not_retried() {
        let mut state = RetryState::new(config(3));
        assert_eq!(state.on_status(409, None), RetryDecision::DontRetry);
        assert_eq!(state.on_status(404, None), RetryDecision::DontRetry);
        assert_eq!(state.on_transport_error(false), RetryDecision::DontRetry);
        assert_eq!(state.attempts, 0);
    }

    #[test]
    fn test_retry_after_replaces_backoff() {
        let mut state = RetryState::new(config(3));
        assert_eq!(
            state.on_status(429, Some(Duration::from_secs(7))),
            RetryDecision::Retry(Duration::from_secs(7))
        );
    }

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let mut state = RetryState::new(config(5));
        let waits: Vec<_> = (0..4)
            .map(|_| match state.on_status(503, None) {
                RetryDecision::Retry(d) => d.as_millis(),
                RetryDecision::DontRetry => 0,
            })
            .collect();
        assert_eq!(waits, vec![100, 200, 400, 400]);
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after(" 5"), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after("soon"), None);
    }
}
