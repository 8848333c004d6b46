use std::sync::Arc;

use serde_json::json;

use nbot_core::{
    controller::{BotContext, Controller},
    logging::ScopedLogger,
    router::HandlerContext,
    services::{LocaleStore, PersistenceClient},
    Result,
};

pub const COLLECTION: &str = "chats";

/// Remembers every chat the bot sees and greets on `/start`.
pub struct ChatsController {
    db: Arc<PersistenceClient>,
    locale: Arc<LocaleStore>,
    log: ScopedLogger,
}

impl ChatsController {
    pub fn new(db: Arc<PersistenceClient>, locale: Arc<LocaleStore>, log: ScopedLogger) -> Self {
        Self { db, locale, log }
    }
}

impl Controller for ChatsController {
    fn name(&self) -> &str {
        "chats"
    }

    fn register(&self, bot: &mut BotContext) -> Result<()> {
        let db = self.db.clone();
        let log = self.log.clone();
        bot.on_update(move |cx: HandlerContext| {
            let db = db.clone();
            let log = log.clone();
            async move {
                // Best-effort; never blocks the routes after this one.
                if let Err(e) = record_chat(&db, &cx).await {
                    log.warn(
                        "failed to record chat",
                        Some(json!({
                            "chat_id": cx.update.chat_id().map(|c| c.0),
                            "error": e.to_string(),
                        })),
                    );
                }
                Ok(())
            }
        });

        let locale = self.locale.clone();
        bot.command("start", move |cx: HandlerContext| {
            let greeting = locale.t(locale.default_locale(), "start.greeting");
            async move {
                cx.reply(greeting).await?;
                Ok(())
            }
        });

        Ok(())
    }
}

async fn record_chat(db: &PersistenceClient, cx: &HandlerContext) -> Result<()> {
    let Some(chat) = &cx.update.chat else {
        return Ok(());
    };
    db.put(
        COLLECTION,
        &chat.id.to_string(),
        json!({
            "id": chat.id.0,
            "kind": chat.kind.as_str(),
            "title": chat.title,
            "last_seen": chrono::Utc::now().to_rfc3339(),
        }),
    )
    .await
}
