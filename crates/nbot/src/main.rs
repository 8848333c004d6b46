use std::sync::Arc;

use anyhow::Context;

use nbot_core::{config::Config, lifecycle::Orchestrator, logging::Logger};
use nbot_telegram::TelegramTransport;

mod app;
mod controllers;
mod locales;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Arc::new(Config::load().context("loading configuration")?);
    nbot_core::logging::init("nbot", cfg.mode)?;

    let logger = Logger::new(cfg.mode);
    let log = logger.with_scope("main");
    log.info(
        "starting",
        Some(serde_json::json!({
            "mode": format!("{:?}", cfg.mode),
            "locale": cfg.default_locale,
            "neuro": cfg.openai_api_key.is_some(),
        })),
    );

    let container = app::build_container(cfg.clone(), &logger)
        .await
        .context("building the dependency container")?;
    let pipeline = app::pipeline_config(&container)?;
    let transport = Arc::new(TelegramTransport::new(&cfg.bot_token));

    let mut bot = Orchestrator::new(container, transport, app::CONTROLLERS, &logger)
        .with_pipeline_config(pipeline);
    bot.register().await.context("registering controllers")?;
    let handle = bot.run().await.context("starting the update loop")?;

    let stop = handle.cancellation_token();
    let shutdown_log = log.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown_log.info("shutdown requested", None);
            stop.cancel();
        }
    });

    handle.wait().await;
    log.info("stopped", None);
    Ok(())
}
