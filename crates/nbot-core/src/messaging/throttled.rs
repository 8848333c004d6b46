use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{BotIdentity, ChatId, MessageRef},
    messaging::{port::BotApi, types::SendMessage},
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* Bot API calls (global flood control).
    pub global_min_interval: Duration,
    /// Minimum spacing between calls per chat (Telegram 1 msg/sec style limits).
    pub per_chat_min_interval: Duration,
    /// How often idle per-chat limiters are dropped.
    pub sweep_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40), // ~25/sec
            per_chat_min_interval: Duration::from_millis(1050), // ~0.95/sec
            sweep_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            next: now,
        }
    }

    /// Reserve the next slot and return the wait duration required before executing.
    fn reserve(&mut self, now: Instant) -> Duration {
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }

    /// A limiter whose next slot has passed behaves exactly like a fresh one.
    fn is_idle(&self, now: Instant) -> bool {
        self.next <= now
    }
}

#[derive(Debug)]
struct ChatLimiters {
    interval: Duration,
    sweep_interval: Duration,
    by_chat: HashMap<ChatId, IntervalLimiter>,
    last_sweep: Instant,
}

impl ChatLimiters {
    fn reserve(&mut self, chat_id: ChatId, now: Instant) -> Duration {
        self.sweep(now);
        let interval = self.interval;
        self.by_chat
            .entry(chat_id)
            .or_insert_with(|| IntervalLimiter::new(interval, now))
            .reserve(now)
    }

    fn sweep(&mut self, now: Instant) {
        if now.duration_since(self.last_sweep) < self.sweep_interval {
            return;
        }
        let before = self.by_chat.len();
        self.by_chat.retain(|_, l| !l.is_idle(now));
        self.last_sweep = now;

        let evicted = before - self.by_chat.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.by_chat.len(), "chat throttles swept");
        }
    }
}

/// `BotApi` decorator that spaces outgoing calls.
///
/// Callers see plain pass-through semantics plus latency. Per-chat limiters are
/// created lazily and dropped by a periodic sweep once idle; calls not bound to
/// a chat only take a global slot.
pub struct ThrottledApi {
    inner: Arc<dyn BotApi>,
    global: Mutex<IntervalLimiter>,
    per_chat: Mutex<ChatLimiters>,
}

impl ThrottledApi {
    pub fn new(inner: Arc<dyn BotApi>, cfg: ThrottleConfig) -> Self {
        let now = Instant::now();
        Self {
            inner,
            global: Mutex::new(IntervalLimiter::new(cfg.global_min_interval, now)),
            per_chat: Mutex::new(ChatLimiters {
                interval: cfg.per_chat_min_interval,
                sweep_interval: cfg.sweep_interval,
                by_chat: HashMap::new(),
                last_sweep: now,
            }),
        }
    }

    async fn throttle_chat(&self, chat_id: ChatId) {
        let now = Instant::now();
        let global_wait = { self.global.lock().await.reserve(now) };
        let chat_wait = { self.per_chat.lock().await.reserve(chat_id, now) };

        let wait = global_wait.max(chat_wait);
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }

    async fn throttle_global(&self) {
        let wait = { self.global.lock().await.reserve(Instant::now()) };
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }
}

#[async_trait]
impl BotApi for ThrottledApi {
    async fn get_me(&self) -> Result<BotIdentity> {
        self.throttle_global().await;
        self.inner.get_me().await
    }

    async fn delete_webhook(&self, drop_pending_updates: bool) -> Result<()> {
        self.throttle_global().await;
        self.inner.delete_webhook(drop_pending_updates).await
    }

    async fn send_message(&self, msg: SendMessage) -> Result<MessageRef> {
        self.throttle_chat(msg.chat_id).await;
        self.inner.send_message(msg).await
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        // No chat_id available here; apply global throttling only.
        self.throttle_global().await;
        self.inner.answer_callback_query(callback_id, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::testing::FakeApi;

    async fn tracked_chats(api: &ThrottledApi) -> usize {
        api.per_chat.lock().await.by_chat.len()
    }

    #[tokio::test(start_paused = true)]
    async fn spaces_calls_to_the_same_chat() {
        let fake = Arc::new(FakeApi::default());
        let api = ThrottledApi::new(fake.clone(), ThrottleConfig::default());

        let start = Instant::now();
        for _ in 0..3 {
            api.send_message(SendMessage::text(ChatId(7), "hi"))
                .await
                .unwrap();
        }

        assert_eq!(fake.sent().len(), 3);
        assert!(start.elapsed() >= Duration::from_millis(2100));
    }

    #[tokio::test(start_paused = true)]
    async fn different_chats_only_share_the_global_slot() {
        let fake = Arc::new(FakeApi::default());
        let api = ThrottledApi::new(fake.clone(), ThrottleConfig::default());

        let start = Instant::now();
        api.send_message(SendMessage::text(ChatId(1), "a"))
            .await
            .unwrap();
        api.send_message(SendMessage::text(ChatId(2), "b"))
            .await
            .unwrap();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(40));
        assert!(elapsed < Duration::from_millis(1050));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_chat_limiters_are_swept() {
        let fake = Arc::new(FakeApi::default());
        let api = ThrottledApi::new(fake.clone(), ThrottleConfig::default());

        for chat in 1..=3 {
            api.send_message(SendMessage::text(ChatId(chat), "hi"))
                .await
                .unwrap();
        }
        assert_eq!(tracked_chats(&api).await, 3);

        tokio::time::advance(Duration::from_secs(61)).await;
        api.send_message(SendMessage::text(ChatId(9), "later"))
            .await
            .unwrap();

        assert_eq!(tracked_chats(&api).await, 1);
        assert_eq!(fake.sent().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeping_keeps_spacing_for_busy_chats() {
        let fake = Arc::new(FakeApi::default());
        let api = ThrottledApi::new(
            fake.clone(),
            ThrottleConfig {
                sweep_interval: Duration::ZERO,
                ..ThrottleConfig::default()
            },
        );

        let start = Instant::now();
        for _ in 0..2 {
            api.send_message(SendMessage::text(ChatId(7), "hi"))
                .await
                .unwrap();
        }

        assert!(start.elapsed() >= Duration::from_millis(1050));
    }
}
