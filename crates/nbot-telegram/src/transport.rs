use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use teloxide::{dispatching::Dispatcher, dptree, error_handlers::LoggingErrorHandler, prelude::*};
use tokio_util::sync::CancellationToken;

use nbot_core::{
    lifecycle::{RunHandle, Transport},
    messaging::port::BotApi,
    router::Router,
    Result,
};

use crate::{convert, TelegramApi};

/// Long-polling transport. Every update goes to the core router; teloxide
/// keeps updates of one chat sequential and different chats concurrent.
pub struct TelegramTransport {
    bot: Bot,
    api: Arc<TelegramApi>,
}

impl TelegramTransport {
    pub fn new(token: &str) -> Self {
        let bot = Bot::new(token);
        Self {
            api: Arc::new(TelegramApi::new(bot.clone())),
            bot,
        }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    fn api(&self) -> Arc<dyn BotApi> {
        self.api.clone()
    }

    async fn start(&self, router: Arc<Router>) -> Result<RunHandle> {
        let handler = dptree::entry().endpoint(|update: Update, router: Arc<Router>| async move {
            router.dispatch(convert::inbound_update(&update)).await;
            respond(())
        });

        let mut dispatcher = Dispatcher::builder(self.bot.clone(), handler)
            .dependencies(dptree::deps![router])
            .default_handler(|_| async {})
            .error_handler(LoggingErrorHandler::with_custom_text(
                "error in the update listener",
            ))
            .build();

        let shutdown = dispatcher.shutdown_token();
        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        tokio::spawn(async move {
            stop.cancelled().await;
            // Shutdown is refused until the dispatcher has actually started polling.
            for _ in 0..50 {
                match shutdown.shutdown() {
                    Ok(done) => {
                        done.await;
                        tracing::info!("update loop stopped");
                        return;
                    }
                    Err(_) => tokio::time::sleep(Duration::from_millis(100)).await,
                }
            }
            tracing::warn!("update loop did not accept shutdown");
        });

        tracing::info!("starting long polling");
        Ok(RunHandle::spawn(cancel, async move {
            dispatcher.dispatch().await;
        }))
    }
}
