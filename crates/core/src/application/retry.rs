// Bounded retry with fixed delay and per-attempt timeout
use crate::application::processor::ShutdownToken;
use crate::port::ProviderError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Retry decision after a transient attempt
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after the given delay
    Retry(Duration),
    /// Attempt budget exhausted
    GiveUp,
}

/// Retry policy: fixed delay between attempts, each attempt bounded by a timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration, attempt_timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            attempt_timeout,
        }
    }

    /// Decide what to do after `attempts_made` transient attempts
    pub fn decide(&self, attempts_made: u32) -> RetryDecision {
        if attempts_made >= self.max_attempts {
            RetryDecision::GiveUp
        } else {
            RetryDecision::Retry(self.delay)
        }
    }
}

/// Result of a single attempt that did not error
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt<T> {
    Ready(T),
    /// Transient "not yet" (e.g. provider still pending)
    NotReady(String),
}

/// Errors that know whether another attempt may help
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for ProviderError {
    fn is_retryable(&self) -> bool {
        ProviderError::is_retryable(self)
    }
}

/// Final outcome of [`execute`]
#[derive(Debug, PartialEq)]
pub enum RetryOutcome<T, E> {
    Succeeded { value: T, attempts: u32 },
    /// Non-retryable error; no further attempts were made
    Terminal { error: E, attempts: u32 },
    Exhausted { attempts: u32, last_reason: String },
    /// A stop was requested while waiting between attempts
    Interrupted { attempts: u32 },
}

/// Run `op` until it is ready, fails terminally, or the policy gives up.
///
/// `op` receives the 1-based attempt number. An attempt exceeding
/// `attempt_timeout` counts as transient.
pub async fn execute<T, E, F, Fut>(policy: &RetryPolicy, label: &str, op: F) -> RetryOutcome<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Attempt<T>, E>>,
{
    attempt_loop(policy, label, None, op).await
}

/// Like [`execute`], but a stop on `shutdown` ends the loop between attempts
/// with [`RetryOutcome::Interrupted`]. An attempt already running is never
/// cut short.
pub async fn execute_until<T, E, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    shutdown: &ShutdownToken,
    op: F,
) -> RetryOutcome<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Attempt<T>, E>>,
{
    attempt_loop(policy, label, Some(shutdown.clone()), op).await
}

async fn attempt_loop<T, E, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut shutdown: Option<ShutdownToken>,
    mut op: F,
) -> RetryOutcome<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Attempt<T>, E>>,
{
    let mut attempts = 0;
    loop {
        attempts += 1;

        let reason = match tokio::time::timeout(policy.attempt_timeout, op(attempts)).await {
            Ok(Ok(Attempt::Ready(value))) => {
                debug!(label = %label, attempts = %attempts, "Attempt succeeded");
                return RetryOutcome::Succeeded { value, attempts };
            }
            Ok(Ok(Attempt::NotReady(reason))) => reason,
            Ok(Err(error)) if error.is_retryable() => error.to_string(),
            Ok(Err(error)) => {
                warn!(
                    label = %label,
                    attempts = %attempts,
                    error = %error,
                    "Non-retryable error, giving up"
                );
                return RetryOutcome::Terminal { error, attempts };
            }
            Err(_) => format!(
                "attempt timed out after {}ms",
                policy.attempt_timeout.as_millis()
            ),
        };

        match policy.decide(attempts) {
            RetryDecision::Retry(delay) => {
                debug!(
                    label = %label,
                    attempt = %attempts,
                    max_attempts = %policy.max_attempts,
                    reason = %reason,
                    "Transient attempt, retrying"
                );
                let slept = match shutdown.as_mut() {
                    Some(token) => !token.is_shutdown() && token.sleep(delay).await,
                    None => {
                        tokio::time::sleep(delay).await;
                        true
                    }
                };
                if !slept {
                    info!(label = %label, attempts = %attempts, "Stop requested, no further attempts");
                    return RetryOutcome::Interrupted { attempts };
                }
            }
            RetryDecision::GiveUp => {
                warn!(
                    label = %label,
                    attempts = %attempts,
                    reason = %reason,
                    "Retry budget exhausted"
                );
                return RetryOutcome::Exhausted {
                    attempts,
                    last_reason: reason,
                };
            }
        }
    }
}
