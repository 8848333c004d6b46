use std::sync::Arc;

use crate::messaging::{
    port::BotApi,
    retry::{RetryPolicy, RetryingApi},
    throttled::{ThrottleConfig, ThrottledApi},
};

#[derive(Clone, Copy, Debug, Default)]
pub struct OutboundConfig {
    pub throttle: ThrottleConfig,
    pub retry: RetryPolicy,
}

/// Wrap a raw Bot API client with the outbound stages.
///
/// The throttler is installed first and retry around it, so every attempt,
/// retries included, takes a throttle slot.
pub fn wrap(raw: Arc<dyn BotApi>, cfg: OutboundConfig) -> Arc<dyn BotApi> {
    let throttled: Arc<dyn BotApi> = Arc::new(ThrottledApi::new(raw, cfg.throttle));
    Arc::new(RetryingApi::new(throttled, cfg.retry))
}
