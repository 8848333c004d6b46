use std::sync::Arc;

use rand::{seq::SliceRandom, Rng};

use nbot_core::{
    controller::{BotContext, Controller},
    domain::ChatId,
    messaging::types::{InlineKeyboard, SendMessage},
    router::HandlerContext,
    services::LocaleStore,
    Result,
};

const CALLBACK_PREFIX: &str = "random:";
const DEFAULT_MAX: i64 = 100;

/// `/random`, the reroll button and `/choose`.
pub struct RandomController {
    locale: Arc<LocaleStore>,
}

impl RandomController {
    pub fn new(locale: Arc<LocaleStore>) -> Self {
        Self { locale }
    }
}

/// `""` → 1..=100, `"n"` → 1..=n, `"a b"` → a..=b (either order).
pub fn parse_range(args: &str) -> Option<(i64, i64)> {
    let nums: Vec<i64> = args
        .split_whitespace()
        .map(str::parse)
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    match nums.as_slice() {
        [] => Some((1, DEFAULT_MAX)),
        [max] if *max >= 1 => Some((1, *max)),
        [a, b] => Some(((*a).min(*b), (*a).max(*b))),
        _ => None,
    }
}

/// `a | b | c` → options, trimmed and non-empty. Needs at least two.
pub fn parse_options(args: &str) -> Option<Vec<&str>> {
    let options: Vec<&str> = args
        .split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    (options.len() >= 2).then_some(options)
}

fn callback_range(data: &str) -> Option<(i64, i64)> {
    let (min, max) = data.strip_prefix(CALLBACK_PREFIX)?.split_once(':')?;
    let (min, max) = (min.parse().ok()?, max.parse().ok()?);
    (min <= max).then_some((min, max))
}

fn roll(min: i64, max: i64) -> i64 {
    rand::thread_rng().gen_range(min..=max)
}

fn roll_message(locale: &LocaleStore, min: i64, max: i64) -> impl FnOnce(ChatId) -> SendMessage {
    let lang = locale.default_locale();
    let text = locale.t_with(
        lang,
        "random.result",
        &[
            ("value", &roll(min, max).to_string()),
            ("min", &min.to_string()),
            ("max", &max.to_string()),
        ],
    );
    let keyboard = InlineKeyboard::single(
        locale.t(lang, "random.reroll"),
        format!("{CALLBACK_PREFIX}{min}:{max}"),
    );
    move |chat_id| SendMessage::text(chat_id, text).keyboard(keyboard)
}

impl Controller for RandomController {
    fn name(&self) -> &str {
        "random"
    }

    fn register(&self, bot: &mut BotContext) -> Result<()> {
        let locale = self.locale.clone();
        bot.command("random", move |cx: HandlerContext| {
            let locale = locale.clone();
            async move {
                match parse_range(cx.args()) {
                    Some((min, max)) => cx.send(roll_message(&locale, min, max)).await?,
                    None => {
                        cx.reply(locale.t(locale.default_locale(), "random.usage"))
                            .await?
                    }
                };
                Ok(())
            }
        });

        let locale = self.locale.clone();
        bot.callback(CALLBACK_PREFIX, move |cx: HandlerContext| {
            let locale = locale.clone();
            async move {
                let Some(cb) = cx.update.callback.clone() else {
                    return Ok(());
                };
                cx.api.answer_callback_query(&cb.id, None).await?;
                if let Some((min, max)) = cb.data.as_deref().and_then(callback_range) {
                    cx.send(roll_message(&locale, min, max)).await?;
                }
                Ok(())
            }
        });

        let locale = self.locale.clone();
        bot.command("choose", move |cx: HandlerContext| {
            let locale = locale.clone();
            async move {
                let lang = locale.default_locale();
                let text = match parse_options(cx.args()) {
                    Some(options) => {
                        let choice = options
                            .choose(&mut rand::thread_rng())
                            .copied()
                            .unwrap_or_default();
                        locale.t_with(lang, "choose.result", &[("choice", choice)])
                    }
                    None => locale.t(lang, "choose.usage"),
                };
                cx.reply(text).await?;
                Ok(())
            }
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::testing::{callback, locale, message, router, RecordingApi};

    fn rolled_value(text: &str) -> i64 {
        text.trim_start_matches("🎲 ")
            .split_whitespace()
            .next()
            .unwrap()
            .parse()
            .unwrap()
    }

    #[test]
    fn parses_ranges() {
        assert_eq!(parse_range(""), Some((1, 100)));
        assert_eq!(parse_range("6"), Some((1, 6)));
        assert_eq!(parse_range("10 3"), Some((3, 10)));
        assert_eq!(parse_range("-5 5"), Some((-5, 5)));
        assert_eq!(parse_range("0"), None);
        assert_eq!(parse_range("1 2 3"), None);
        assert_eq!(parse_range("six"), None);
    }

    #[test]
    fn parses_options() {
        assert_eq!(parse_options("tea | coffee"), Some(vec!["tea", "coffee"]));
        assert_eq!(parse_options(" a || b |"), Some(vec!["a", "b"]));
        assert_eq!(parse_options("only"), None);
        assert_eq!(parse_options(""), None);
    }

    #[test]
    fn parses_callback_data() {
        assert_eq!(callback_range("random:1:6"), Some((1, 6)));
        assert_eq!(callback_range("random:-3:-1"), Some((-3, -1)));
        assert_eq!(callback_range("random:6:1"), None);
        assert_eq!(callback_range("random:x"), None);
    }

    #[tokio::test]
    async fn random_rolls_within_range_with_reroll_button() {
        let api = Arc::new(RecordingApi::default());
        let (r, _) = router(&RandomController::new(locale()), api.clone());

        for _ in 0..20 {
            r.dispatch(message(5, "/random 3 4")).await;
        }

        assert_eq!(api.sent().len(), 20);
        for msg in api.sent() {
            assert!((3..=4).contains(&rolled_value(&msg.text)));
            let keyboard = msg.keyboard.unwrap();
            assert_eq!(keyboard.buttons[0].callback_data, "random:3:4");
        }
    }

    #[tokio::test]
    async fn bad_arguments_get_usage() {
        let api = Arc::new(RecordingApi::default());
        let (r, _) = router(&RandomController::new(locale()), api.clone());

        r.dispatch(message(5, "/random lots")).await;
        r.dispatch(message(5, "/choose just-one")).await;

        assert_eq!(
            api.texts(),
            vec![
                "Usage: /random [max] or /random <min> <max>",
                "Usage: /choose option 1 | option 2 | ...",
            ]
        );
    }

    #[tokio::test]
    async fn reroll_answers_the_callback_and_rolls_again() {
        let api = Arc::new(RecordingApi::default());
        let (r, backstop) = router(&RandomController::new(locale()), api.clone());

        r.dispatch(callback(5, "random:2:2")).await;

        assert_eq!(api.answers(), vec![("cb1".to_string(), None)]);
        let sent = api.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(rolled_value(&sent[0].text), 2);
        assert_eq!(backstop.reported(), 0);
    }

    #[tokio::test]
    async fn choose_picks_one_of_the_options() {
        let api = Arc::new(RecordingApi::default());
        let (r, _) = router(&RandomController::new(locale()), api.clone());

        r.dispatch(message(5, "/choose tea | coffee")).await;

        let text = &api.texts()[0];
        assert!(text == "I choose: tea" || text == "I choose: coffee", "{text}");
    }
}
