use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::time::sleep;

use crate::{
    domain::{BotIdentity, MessageRef},
    errors::{ApiError, Error},
    messaging::{port::BotApi, types::SendMessage},
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Retries after the original attempt.
    pub max_retries: u32,
    /// Upper bound on the sum of all waits for a single call.
    pub max_total_delay: Duration,
    /// First backoff for network errors; doubles on each retry.
    pub network_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            max_total_delay: Duration::from_secs(40),
            network_backoff: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based), or `None` if `err` is permanent.
    fn delay_for(&self, err: &ApiError, retry: u32) -> Option<Duration> {
        match err {
            ApiError::RetryAfter(d) => Some(*d),
            ApiError::Network(_) => Some(self.network_backoff.saturating_mul(1 << retry.min(16))),
            ApiError::Rejected(_) => None,
        }
    }
}

/// `BotApi` decorator that retries transient failures within a bounded budget.
pub struct RetryingApi {
    inner: Arc<dyn BotApi>,
    policy: RetryPolicy,
}

impl RetryingApi {
    pub fn new(inner: Arc<dyn BotApi>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    async fn with_retry<T, F, Fut>(&self, call: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retries = 0u32;
        let mut waited = Duration::ZERO;
        loop {
            let err = match op().await {
                Ok(v) => return Ok(v),
                Err(Error::Api(e)) => e,
                Err(other) => return Err(other),
            };

            if retries >= self.policy.max_retries {
                return Err(err.into());
            }
            let Some(delay) = self.policy.delay_for(&err, retries) else {
                return Err(err.into());
            };
            if waited + delay > self.policy.max_total_delay {
                tracing::debug!(call, ?delay, ?waited, "retry budget exhausted");
                return Err(err.into());
            }

            retries += 1;
            waited += delay;
            tracing::debug!(call, retry = retries, ?delay, error = %err, "retrying api call");
            sleep(delay).await;
        }
    }
}

#[async_trait]
impl BotApi for RetryingApi {
    async fn get_me(&self) -> Result<BotIdentity> {
        self.with_retry("getMe", || self.inner.get_me()).await
    }

    async fn delete_webhook(&self, drop_pending_updates: bool) -> Result<()> {
        self.with_retry("deleteWebhook", || {
            self.inner.delete_webhook(drop_pending_updates)
        })
        .await
    }

    async fn send_message(&self, msg: SendMessage) -> Result<MessageRef> {
        self.with_retry("sendMessage", || self.inner.send_message(msg.clone()))
            .await
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.with_retry("answerCallbackQuery", || {
            self.inner.answer_callback_query(callback_id, text)
        })
        .await
    }
}
