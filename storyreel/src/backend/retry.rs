use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::error::{BackendError, BackendErrorKind};

/// How a failed attempt is handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryClass {
    /// Surface immediately.
    Fatal,
    /// Back off on the rate-limit base delay.
    RateLimited,
    /// Back off on the transient base delay.
    Transient,
}

impl RetryClass {
    /// Classify a backend error.
    pub fn of(err: &BackendError) -> Self {
        match err.kind {
            BackendErrorKind::Auth | BackendErrorKind::NotFound => Self::Fatal,
            BackendErrorKind::RateLimited => Self::RateLimited,
            BackendErrorKind::Transient | BackendErrorKind::InvalidResponse => Self::Transient,
        }
    }
}

/// Bounded linear-backoff retry policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay unit after a rate-limit failure, in milliseconds.
    pub rate_limit_base_ms: u64,
    /// Delay unit after any other retryable failure, in milliseconds.
    pub transient_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_base_ms: 5_000,
            transient_base_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt after `attempt` (1-based) failed with `class`.
    pub fn delay_after(&self, class: RetryClass, attempt: u32) -> Option<Duration> {
        let base = match class {
            RetryClass::Fatal => return None,
            RetryClass::RateLimited => self.rate_limit_base_ms,
            RetryClass::Transient => self.transient_base_ms,
        };
        Some(Duration::from_millis(base.saturating_mul(u64::from(attempt))))
    }
}

/// Callback invoked when a call fails because the credential must be re-selected.
pub type CredentialPrompt = Arc<dyn Fn(&BackendError) + Send + Sync>;

/// Runs backend calls under a [`RetryPolicy`].
#[derive(Clone, Default)]
pub struct Retrier {
    policy: RetryPolicy,
    on_credential_error: Option<CredentialPrompt>,
}

impl std::fmt::Debug for Retrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retrier")
            .field("policy", &self.policy)
            .field("credential_prompt", &self.on_credential_error.is_some())
            .finish()
    }
}

impl Retrier {
    /// Create a retrier with `policy`.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            on_credential_error: None,
        }
    }

    /// Install the credential re-selection hook.
    pub fn with_credential_prompt(mut self, prompt: CredentialPrompt) -> Self {
        self.on_credential_error = Some(prompt);
        self
    }

    /// Active policy.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run `op` until it succeeds, fails fatally, or attempts are exhausted.
    ///
    /// The last error is returned on exhaustion.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, BackendError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1u32;
        loop {
            let err = match op().await {
                Ok(v) => return Ok(v),
                Err(e) => e,
            };

            let class = RetryClass::of(&err);
            if class == RetryClass::Fatal {
                tracing::error!(call = what, error = %err, "backend call failed; credential required");
                if let Some(prompt) = &self.on_credential_error {
                    prompt(&err);
                }
                return Err(err);
            }
            if attempt >= max_attempts {
                tracing::error!(call = what, attempts = attempt, error = %err, "backend call failed; retries exhausted");
                return Err(err);
            }

            let delay = self.policy.delay_after(class, attempt).unwrap_or_default();
            tracing::warn!(
                call = what,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "backend call failed; retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Run `op` under `policy` without a credential hook.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, what: &str, op: F) -> Result<T, BackendError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    Retrier::new(policy).run(what, op).await
}

#[cfg(test)]
#[path = "../../tests/unit/backend/retry.rs"]
mod tests;
