use crate::domain::{ChatId, MessageId, UserId};

/// Platform-neutral view of one inbound update.
///
/// Telegram-specific parsing lives in the Telegram adapter; the core only needs
/// the bits the pipeline and the router look at.
#[derive(Clone, Debug, Default)]
pub struct InboundUpdate {
    pub update_id: u32,
    pub chat: Option<ChatInfo>,
    pub sender: Option<Sender>,
    pub message_id: Option<MessageId>,
    /// Message text, or the caption for media messages.
    pub text: Option<String>,
    /// Text of the message this one replies to.
    pub reply_to_text: Option<String>,
    pub callback: Option<CallbackData>,
    /// Hashtags without the leading `#`, lower-cased.
    pub hashtags: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatInfo {
    pub id: ChatId,
    pub kind: ChatKind,
    pub title: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

impl ChatKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Group => "group",
            Self::Supergroup => "supergroup",
            Self::Channel => "channel",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sender {
    pub id: UserId,
    pub username: Option<String>,
    pub is_bot: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackData {
    pub id: String,
    pub data: Option<String>,
}

impl InboundUpdate {
    pub fn chat_id(&self) -> Option<ChatId> {
        self.chat.as_ref().map(|c| c.id)
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.sender.as_ref().map(|s| s.id)
    }

    pub fn callback_data(&self) -> Option<&str> {
        self.callback.as_ref().and_then(|c| c.data.as_deref())
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        if self.callback.is_some() {
            "callback_query"
        } else if self.message_id.is_some() {
            "message"
        } else {
            "other"
        }
    }
}

/// Outgoing text message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendMessage {
    pub chat_id: ChatId,
    pub text: String,
    pub reply_to: Option<MessageId>,
    pub keyboard: Option<InlineKeyboard>,
}

impl SendMessage {
    pub fn text(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            reply_to: None,
            keyboard: None,
        }
    }

    pub fn reply_to(mut self, message_id: Option<MessageId>) -> Self {
        self.reply_to = message_id;
        self
    }

    pub fn keyboard(mut self, keyboard: InlineKeyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// Inline keyboard. Buttons are laid out left to right on a single row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub buttons: Vec<InlineButton>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub callback_data: String,
}

impl InlineKeyboard {
    pub fn single(label: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            buttons: vec![InlineButton {
                label: label.into(),
                callback_data: callback_data.into(),
            }],
        }
    }
}
