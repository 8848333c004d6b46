//! Telegram adapter (teloxide).
//!
//! Implements the `nbot-core` `BotApi` port over the Telegram Bot API and
//! feeds long-polled updates into the core router.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup},
    RequestError,
};

pub mod convert;
pub mod transport;

pub use transport::TelegramTransport;

use nbot_core::{
    domain::{BotIdentity, ChatId, MessageId, MessageRef, UserId},
    errors::{ApiError, Error},
    messaging::{
        port::BotApi,
        types::{InlineKeyboard, SendMessage},
    },
    Result,
};

/// Raw Bot API client. No throttling or retries here; the core's outbound
/// pipeline wraps it.
#[derive(Clone)]
pub struct TelegramApi {
    bot: Bot,
}

impl TelegramApi {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn markup(keyboard: InlineKeyboard) -> InlineKeyboardMarkup {
        let row: Vec<InlineKeyboardButton> = keyboard
            .buttons
            .into_iter()
            .map(|b| InlineKeyboardButton::callback(b.label, b.callback_data))
            .collect();
        InlineKeyboardMarkup::new([row])
    }
}

/// 429 and transport failures are transient; everything else the API said no to.
pub fn map_err(e: RequestError) -> Error {
    let api = match e {
        RequestError::RetryAfter(d) => ApiError::RetryAfter(d),
        RequestError::Network(e) => ApiError::Network(e.to_string()),
        RequestError::Io(e) => ApiError::Network(e.to_string()),
        other => ApiError::Rejected(other.to_string()),
    };
    Error::Api(api)
}

#[async_trait]
impl BotApi for TelegramApi {
    async fn get_me(&self) -> Result<BotIdentity> {
        let me = self.bot.get_me().await.map_err(map_err)?;
        Ok(BotIdentity {
            id: UserId(me.user.id.0 as i64),
            username: me.username().to_string(),
            is_bot: me.user.is_bot,
        })
    }

    async fn delete_webhook(&self, drop_pending_updates: bool) -> Result<()> {
        self.bot
            .delete_webhook()
            .drop_pending_updates(drop_pending_updates)
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn send_message(&self, msg: SendMessage) -> Result<MessageRef> {
        let mut req = self
            .bot
            .send_message(Self::tg_chat(msg.chat_id), msg.text);
        if let Some(reply_to) = msg.reply_to {
            req = req
                .reply_to_message_id(Self::tg_msg_id(reply_to))
                .allow_sending_without_reply(true);
        }
        if let Some(keyboard) = msg.keyboard {
            req = req.reply_markup(Self::markup(keyboard));
        }

        let sent = req.await.map_err(map_err)?;
        Ok(MessageRef {
            chat_id: msg.chat_id,
            message_id: MessageId(sent.id.0),
        })
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        let mut req = self.bot.answer_callback_query(callback_id.to_string());
        if let Some(t) = text {
            req = req.text(t.to_string());
        }
        req.await.map_err(map_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use nbot_core::messaging::types::InlineButton;

    #[test]
    fn retry_after_is_transient() {
        let err = map_err(RequestError::RetryAfter(Duration::from_secs(3)));
        assert_eq!(
            err.to_string(),
            Error::Api(ApiError::RetryAfter(Duration::from_secs(3))).to_string()
        );
        assert!(matches!(err, Error::Api(ref a) if a.is_transient()));
    }

    #[test]
    fn io_errors_are_transient() {
        let err = map_err(RequestError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        )));
        assert!(matches!(err, Error::Api(ApiError::Network(_))));
    }

    #[test]
    fn migrations_are_rejections() {
        let err = map_err(RequestError::MigrateToChatId(-100));
        assert!(matches!(err, Error::Api(ApiError::Rejected(_))));
    }

    #[test]
    fn keyboard_is_a_single_row() {
        let mut keyboard = InlineKeyboard::single("again", "random:1:6");
        keyboard.buttons.push(InlineButton {
            label: "bigger".to_string(),
            callback_data: "random:1:100".to_string(),
        });

        let markup = TelegramApi::markup(keyboard);

        assert_eq!(markup.inline_keyboard.len(), 1);
        let labels: Vec<&str> = markup.inline_keyboard[0]
            .iter()
            .map(|b| b.text.as_str())
            .collect();
        assert_eq!(labels, vec!["again", "bigger"]);
    }
}
