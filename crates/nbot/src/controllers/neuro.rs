use std::sync::Arc;

use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use nbot_core::{
    controller::{BotContext, Controller},
    logging::ScopedLogger,
    ports::TextModel,
    router::HandlerContext,
    services::{Cache, LocaleStore},
    Result,
};

const TAG: &str = "neuro";

/// `/neuro <prompt>` and `#neuro` messages, answered by the text model.
pub struct NeuroController {
    model: Option<Arc<dyn TextModel>>,
    cache: Arc<dyn Cache>,
    locale: Arc<LocaleStore>,
    log: ScopedLogger,
}

impl NeuroController {
    pub fn new(
        model: Option<Arc<dyn TextModel>>,
        cache: Arc<dyn Cache>,
        locale: Arc<LocaleStore>,
        log: ScopedLogger,
    ) -> Self {
        Self {
            model,
            cache,
            locale,
            log,
        }
    }
}

#[derive(Clone)]
struct Responder {
    model: Option<Arc<dyn TextModel>>,
    cache: Arc<dyn Cache>,
    locale: Arc<LocaleStore>,
    log: ScopedLogger,
}

impl Responder {
    async fn answer(&self, cx: &HandlerContext, prompt: &str) -> Result<()> {
        let lang = self.locale.default_locale();
        let Some(model) = &self.model else {
            cx.reply(self.locale.t(lang, "neuro.disabled")).await?;
            return Ok(());
        };
        if prompt.is_empty() {
            cx.reply(self.locale.t(lang, "neuro.usage")).await?;
            return Ok(());
        }

        let key = cache_key(prompt);
        if let Some(Value::String(cached)) = self.cache.get(&key) {
            self.log.debug("answer served from cache", Some(json!({ "key": key })));
            cx.reply(cached).await?;
            return Ok(());
        }

        let answer = model.complete(prompt).await?;
        self.cache.set(&key, Value::String(answer.clone()));
        self.log.info(
            "model answered",
            Some(json!({
                "model": model.name(),
                "chat_id": cx.update.chat_id().map(|c| c.0),
                "prompt_chars": prompt.chars().count(),
                "answer_chars": answer.chars().count(),
            })),
        );
        cx.reply(answer).await?;
        Ok(())
    }
}

/// `neuro:` + hex SHA-256 of the prompt.
pub fn cache_key(prompt: &str) -> String {
    let mut h = Sha256::new();
    h.update(prompt.as_bytes());
    let hex: String = h.finalize().iter().map(|b| format!("{b:02x}")).collect();
    format!("{TAG}:{hex}")
}

/// Message text with every `#neuro` (any case) removed.
fn strip_tag(text: &str) -> String {
    let is_tag = |word: &str| {
        word.strip_prefix('#')
            .map(|t| t.trim_end_matches(|c: char| c.is_ascii_punctuation()))
            .is_some_and(|t| t.eq_ignore_ascii_case(TAG))
    };
    text.split_whitespace()
        .filter(|w| !is_tag(*w))
        .collect::<Vec<_>>()
        .join(" ")
}

impl Controller for NeuroController {
    fn name(&self) -> &str {
        "neuro"
    }

    fn register(&self, bot: &mut BotContext) -> Result<()> {
        let responder = Responder {
            model: self.model.clone(),
            cache: self.cache.clone(),
            locale: self.locale.clone(),
            log: self.log.clone(),
        };

        let r = responder.clone();
        bot.command(TAG, move |cx: HandlerContext| {
            let r = r.clone();
            async move {
                let prompt = cx.args().to_string();
                r.answer(&cx, &prompt).await
            }
        });

        let r = responder;
        bot.hashtag(TAG, move |cx: HandlerContext| {
            let r = r.clone();
            async move {
                // `/neuro ... #neuro` is already handled by the command route.
                if cx.command.as_ref().is_some_and(|c| c.name == TAG) {
                    return Ok(());
                }
                let prompt = strip_tag(cx.update.text.as_deref().unwrap_or(""));
                r.answer(&cx, &prompt).await
            }
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use nbot_core::{
        errors::Error,
        services::{CacheConfig, MemoryCache},
    };

    use super::*;
    use crate::controllers::testing::{locale, logger, message, router, RecordingApi};

    #[derive(Default)]
    struct EchoModel {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl TextModel for EchoModel {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::External("model down".to_string()));
            }
            Ok(format!("echo: {prompt}"))
        }
    }

    fn controller(model: Option<Arc<EchoModel>>) -> NeuroController {
        NeuroController::new(
            model.map(|m| m as Arc<dyn TextModel>),
            Arc::new(MemoryCache::new(
                CacheConfig::default(),
                logger().with_scope("cache"),
            )),
            locale(),
            logger().with_scope("neuro"),
        )
    }

    #[test]
    fn cache_key_is_stable_hex_sha256() {
        assert_eq!(
            cache_key("abc"),
            "neuro:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn strips_the_tag() {
        assert_eq!(strip_tag("#Neuro tell me a joke"), "tell me a joke");
        assert_eq!(strip_tag("why is the sky blue? #neuro!"), "why is the sky blue?");
        assert_eq!(strip_tag("#neurosis is a word"), "#neurosis is a word");
    }

    #[tokio::test]
    async fn command_answers_and_caches() {
        let model = Arc::new(EchoModel::default());
        let api = Arc::new(RecordingApi::default());
        let (r, _) = router(&controller(Some(model.clone())), api.clone());

        r.dispatch(message(5, "/neuro hello")).await;
        r.dispatch(message(5, "/neuro hello")).await;

        assert_eq!(api.texts(), vec!["echo: hello", "echo: hello"]);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn hashtag_asks_once_even_with_the_command() {
        let model = Arc::new(EchoModel::default());
        let api = Arc::new(RecordingApi::default());
        let (r, _) = router(&controller(Some(model.clone())), api.clone());

        r.dispatch(message(5, "tell me a joke #neuro")).await;
        r.dispatch(message(5, "/neuro hi #neuro")).await;

        assert_eq!(api.texts(), vec!["echo: tell me a joke", "echo: hi #neuro"]);
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn disabled_without_a_model() {
        let api = Arc::new(RecordingApi::default());
        let (r, _) = router(&controller(None), api.clone());

        r.dispatch(message(5, "/neuro hello")).await;

        assert_eq!(
            api.texts(),
            vec!["The neural network is turned off on this bot."]
        );
    }

    #[tokio::test]
    async fn empty_prompt_gets_usage() {
        let model = Arc::new(EchoModel::default());
        let api = Arc::new(RecordingApi::default());
        let (r, _) = router(&controller(Some(model.clone())), api.clone());

        r.dispatch(message(5, "/neuro")).await;

        assert_eq!(api.texts(), vec!["Ask me something: /neuro <question>"]);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn model_failures_reach_the_backstop() {
        let model = Arc::new(EchoModel {
            fail: true,
            ..Default::default()
        });
        let api = Arc::new(RecordingApi::default());
        let (r, backstop) = router(&controller(Some(model)), api.clone());

        r.dispatch(message(5, "/neuro hello")).await;

        assert!(api.sent().is_empty());
        assert_eq!(backstop.reported(), 1);
    }
}
