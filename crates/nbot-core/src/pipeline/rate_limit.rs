use std::{
    collections::HashMap,
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;

use crate::{
    domain::{ChatId, UserId},
    logging::ScopedLogger,
    messaging::{
        port::BotApi,
        types::{InboundUpdate, SendMessage},
    },
    pipeline::inbound::{InboundStage, StageOutcome},
    Result,
};

pub const DEFAULT_NOTICE: &str = "Slow down! You are sending commands too fast.";

/// Bucket for admission decisions: one per (sender, chat) pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    pub user: Option<UserId>,
    pub chat: Option<ChatId>,
}

impl RateLimitKey {
    pub fn of(update: &InboundUpdate) -> Self {
        Self {
            user: update.user_id(),
            chat: update.chat_id(),
        }
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.user {
            Some(u) => write!(f, "{u}")?,
            None => f.write_str("-")?,
        }
        f.write_str(":")?;
        match self.chat {
            Some(c) => write!(f, "{c}"),
            None => f.write_str("-"),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RateLimitConfig {
    /// Updates admitted per window.
    pub limit: u32,
    /// Window length.
    pub time_frame: Duration,
    /// How often expired windows are evicted.
    pub sweep_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 5,
            time_frame: Duration::from_millis(2000),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// `count` is the number of updates admitted in the current window, this one included.
    Admitted { count: u32 },
    Rejected,
}

#[derive(Clone, Copy, Debug)]
struct Window {
    start: Instant,
    count: u32,
}

/// Fixed-window counter per key.
///
/// A window restarts once more than `time_frame` has elapsed since it opened.
/// Rejections do not advance the count.
#[derive(Debug)]
pub struct WindowRateLimiter {
    cfg: RateLimitConfig,
    windows: HashMap<RateLimitKey, Window>,
    last_sweep: Option<Instant>,
}

impl WindowRateLimiter {
    pub fn new(cfg: RateLimitConfig) -> Self {
        Self {
            cfg,
            windows: HashMap::new(),
            last_sweep: None,
        }
    }

    pub fn check(&mut self, key: RateLimitKey) -> Admission {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&mut self, key: RateLimitKey, now: Instant) -> Admission {
        self.sweep_at(now);

        let window = self.windows.entry(key).or_insert(Window {
            start: now,
            count: 0,
        });

        if now.duration_since(window.start) > self.cfg.time_frame {
            window.start = now;
            window.count = 0;
        }

        if window.count >= self.cfg.limit {
            return Admission::Rejected;
        }
        window.count += 1;
        Admission::Admitted {
            count: window.count,
        }
    }

    /// Number of tracked windows.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    fn sweep_at(&mut self, now: Instant) {
        let due = match self.last_sweep {
            None => {
                self.last_sweep = Some(now);
                false
            }
            Some(last) => now.duration_since(last) >= self.cfg.sweep_interval,
        };
        if !due {
            return;
        }

        let time_frame = self.cfg.time_frame;
        let before = self.windows.len();
        self.windows.retain(|_, w| now.duration_since(w.start) <= time_frame);
        self.last_sweep = Some(now);

        let evicted = before - self.windows.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.windows.len(), "rate limit windows swept");
        }
    }
}

/// Inbound stage enforcing [`WindowRateLimiter`] and notifying rejected senders.
pub struct RateLimitStage {
    limiter: Mutex<WindowRateLimiter>,
    api: Arc<dyn BotApi>,
    log: ScopedLogger,
    notice: String,
}

impl RateLimitStage {
    pub fn new(
        cfg: RateLimitConfig,
        api: Arc<dyn BotApi>,
        log: ScopedLogger,
        notice: impl Into<String>,
    ) -> Self {
        Self {
            limiter: Mutex::new(WindowRateLimiter::new(cfg)),
            api,
            log,
            notice: notice.into(),
        }
    }

    async fn notify(&self, update: &InboundUpdate) -> Result<()> {
        if let Some(cb) = &update.callback {
            return self
                .api
                .answer_callback_query(&cb.id, Some(&self.notice))
                .await;
        }
        let Some(chat_id) = update.chat_id() else {
            return Ok(());
        };
        let notice = SendMessage::text(chat_id, self.notice.clone()).reply_to(update.message_id);
        self.api.send_message(notice).await.map(|_| ())
    }
}

#[async_trait]
impl InboundStage for RateLimitStage {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    async fn process(&self, update: &InboundUpdate) -> Result<StageOutcome> {
        let key = RateLimitKey::of(update);
        let admission = { self.limiter.lock().await.check(key) };

        if let Admission::Admitted { .. } = admission {
            return Ok(StageOutcome::Continue);
        }

        let sender = update.sender.as_ref();
        self.log.warn(
            "rate limit exceeded",
            Some(json!({
                "key": key.to_string(),
                "user_id": sender.map(|s| s.id.0),
                "username": sender.and_then(|s| s.username.clone()),
                "chat_id": update.chat_id().map(|c| c.0),
                "update_id": update.update_id,
            })),
        );

        if let Err(e) = self.notify(update).await {
            self.log.warn(
                "rate limit notice failed",
                Some(json!({ "key": key.to_string(), "error": e.to_string() })),
            );
        }

        Ok(StageOutcome::Drop)
    }
}
