use async_trait::async_trait;

use crate::{
    domain::{BotIdentity, MessageRef},
    messaging::types::SendMessage,
    Result,
};

/// Outbound Bot API port.
///
/// Telegram implements it in `nbot-telegram`; the outbound pipeline stacks
/// decorators implementing the same trait on top.
#[async_trait]
pub trait BotApi: Send + Sync {
    async fn get_me(&self) -> Result<BotIdentity>;

    /// Remove any webhook so long polling can start.
    async fn delete_webhook(&self, drop_pending_updates: bool) -> Result<()>;

    async fn send_message(&self, msg: SendMessage) -> Result<MessageRef>;

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()>;
}

