//! teloxide `Update` → core `InboundUpdate`.

use teloxide::types::{
    CallbackQuery, Chat, Message, MessageEntityKind, MessageEntityRef, Update, UpdateKind, User,
};

use nbot_core::{
    domain::{ChatId, MessageId, UserId},
    messaging::types::{CallbackData, ChatInfo, ChatKind, InboundUpdate, Sender},
};

pub fn inbound_update(update: &Update) -> InboundUpdate {
    let update_id = u32::try_from(update.id).unwrap_or_default();
    match &update.kind {
        UpdateKind::Message(msg) => from_message(update_id, msg),
        UpdateKind::CallbackQuery(q) => from_callback(update_id, q),
        _ => InboundUpdate {
            update_id,
            ..Default::default()
        },
    }
}

fn from_message(update_id: u32, msg: &Message) -> InboundUpdate {
    let text = msg.text().or_else(|| msg.caption());
    InboundUpdate {
        update_id,
        chat: Some(chat_info(&msg.chat)),
        sender: msg.from().map(sender),
        message_id: Some(MessageId(msg.id.0)),
        text: text.map(str::to_string),
        reply_to_text: msg
            .reply_to_message()
            .and_then(|r| r.text().or_else(|| r.caption()))
            .map(str::to_string),
        callback: None,
        hashtags: hashtags(msg),
    }
}

fn from_callback(update_id: u32, q: &CallbackQuery) -> InboundUpdate {
    InboundUpdate {
        update_id,
        chat: q.message.as_ref().map(|m| chat_info(&m.chat)),
        sender: Some(sender(&q.from)),
        message_id: q.message.as_ref().map(|m| MessageId(m.id.0)),
        text: None,
        reply_to_text: None,
        callback: Some(CallbackData {
            id: q.id.clone(),
            data: q.data.clone(),
        }),
        hashtags: Vec::new(),
    }
}

fn chat_info(chat: &Chat) -> ChatInfo {
    let kind = if chat.is_private() {
        ChatKind::Private
    } else if chat.is_channel() {
        ChatKind::Channel
    } else if chat.is_supergroup() {
        ChatKind::Supergroup
    } else {
        ChatKind::Group
    };
    ChatInfo {
        id: ChatId(chat.id.0),
        kind,
        title: chat.title().map(str::to_string),
    }
}

fn sender(user: &User) -> Sender {
    Sender {
        id: UserId(user.id.0 as i64),
        username: user.username.clone(),
        is_bot: user.is_bot,
    }
}

/// Lower-cased hashtag entities of the text or caption, without the `#`, deduped.
fn hashtags(msg: &Message) -> Vec<String> {
    let entities: Vec<MessageEntityRef<'_>> = msg
        .parse_entities()
        .or_else(|| msg.parse_caption_entities())
        .unwrap_or_default();
    let mut out: Vec<String> = Vec::new();
    for entity in &entities {
        if !matches!(entity.kind(), MessageEntityKind::Hashtag) {
            continue;
        }
        let tag = entity.text().trim_start_matches('#').to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}
