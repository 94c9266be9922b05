//! Startup retry for the participant join race.
//!
//! The bridge may be launched before the human has finished joining the
//! room. Only `TransportErrorKind::ParticipantNotFound` is retried, a fixed
//! number of times with a fixed delay. Every other error is returned from
//! the first attempt.

use crate::config::RetryConfig;
use crate::error::VoiceError;
use std::future::Future;
use std::time::Duration;

/// Progress of one supervised startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    pub attempt: u32,
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryState {
    pub fn new(policy: &RetryConfig) -> Self {
        Self {
            attempt: 0,
            max_attempts: policy.max_attempts.max(1),
            delay: policy.delay(),
        }
    }

    pub fn exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

#[derive(Debug, Clone)]
pub struct StartupSupervisor {
    policy: RetryConfig,
}

impl StartupSupervisor {
    pub fn new(policy: RetryConfig) -> Self {
        Self { policy }
    }

    /// Calls `start` with the 1-based attempt number until it succeeds,
    /// fails with a non-retryable error, or the attempts run out.
    ///
    /// Running out yields `VoiceError::ParticipantNeverJoined`.
    pub async fn run<T, F, Fut>(&self, mut start: F) -> Result<T, VoiceError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, VoiceError>>,
    {
        let mut state = RetryState::new(&self.policy);
        loop {
            state.attempt += 1;
            let err = match start(state.attempt).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !err.is_retryable() {
                return Err(err);
            }
            if state.exhausted() {
                tracing::error!(
                    attempts = state.attempt,
                    error = %err,
                    "participant never joined, giving up"
                );
                return Err(VoiceError::ParticipantNeverJoined {
                    attempts: state.attempt,
                });
            }

            tracing::warn!(
                attempt = state.attempt,
                max_attempts = state.max_attempts,
                delay_ms = state.delay.as_millis() as u64,
                error = %err,
                "participant not in room yet, retrying"
            );
            tokio::time::sleep(state.delay).await;
        }
    }
}
