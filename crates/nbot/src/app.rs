//! Container wiring: config → services → controllers.

use std::sync::Arc;

use nbot_core::{
    config::Config,
    container::{names, Container, Registration},
    controller::Controller,
    lifecycle::PipelineConfig,
    logging::Logger,
    ports::TextModel,
    services::{Cache, CacheConfig, LocaleStore, MemoryCache, PersistenceClient, QueryLogPolicy},
    Result,
};
use nbot_openai::{OpenAiClient, OpenAiConfig};

use crate::{
    controllers::{ChatsController, NeuroController, RandomController},
    locales,
};

/// Controllers in registration order.
pub const CONTROLLERS: [&str; 3] = ["chats", "neuro", "random"];

pub async fn build_container(cfg: Arc<Config>, logger: &Logger) -> Result<Container> {
    let locale = Arc::new(LocaleStore::load(&cfg.default_locale, locales::table())?);
    let db = Arc::new(
        PersistenceClient::connect(
            &cfg.database_url,
            QueryLogPolicy::for_mode(logger.mode()),
            logger.with_scope("db"),
        )
        .await?,
    );

    let mut c = Container::new();
    c.register([
        (names::CONFIG, Registration::value(cfg)),
        (names::LOGGER, Registration::value(logger.clone())),
        (names::LOCALE, Registration::value(locale)),
        (names::PERSISTENCE, Registration::value(db)),
        (
            names::CACHE,
            Registration::singleton(&[names::CONFIG, names::LOGGER], |d| {
                let cfg = d.get::<Arc<Config>>(names::CONFIG)?;
                let logger = d.get::<Logger>(names::LOGGER)?;
                let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new(
                    CacheConfig {
                        default_ttl: cfg.cache_ttl,
                        max_entries: cfg.cache_max_entries,
                    },
                    logger.with_scope("cache"),
                ));
                Ok(cache)
            }),
        ),
        (
            names::TEXT_MODEL,
            Registration::singleton(&[names::CONFIG], |d| {
                let cfg = d.get::<Arc<Config>>(names::CONFIG)?;
                let Some(key) = cfg.openai_api_key.clone() else {
                    return Ok(None::<Arc<dyn TextModel>>);
                };
                let client = OpenAiClient::new(OpenAiConfig {
                    model: cfg.openai_model.clone(),
                    base_url: cfg.openai_base_url.clone(),
                    ..OpenAiConfig::new(key)
                })?;
                Ok(Some(Arc::new(client) as Arc<dyn TextModel>))
            }),
        ),
    ]);

    c.register([
        (
            "chats",
            Registration::singleton(&[names::PERSISTENCE, names::LOCALE, names::LOGGER], |d| {
                let controller: Arc<dyn Controller> = Arc::new(ChatsController::new(
                    d.get(names::PERSISTENCE)?,
                    d.get(names::LOCALE)?,
                    d.get::<Logger>(names::LOGGER)?.with_scope("chats"),
                ));
                Ok(controller)
            }),
        ),
        (
            "neuro",
            Registration::singleton(
                &[names::TEXT_MODEL, names::CACHE, names::LOCALE, names::LOGGER],
                |d| {
                    let controller: Arc<dyn Controller> = Arc::new(NeuroController::new(
                        d.get(names::TEXT_MODEL)?,
                        d.get(names::CACHE)?,
                        d.get(names::LOCALE)?,
                        d.get::<Logger>(names::LOGGER)?.with_scope("neuro"),
                    ));
                    Ok(controller)
                },
            ),
        ),
        (
            "random",
            Registration::singleton(&[names::LOCALE], |d| {
                let controller: Arc<dyn Controller> =
                    Arc::new(RandomController::new(d.get(names::LOCALE)?));
                Ok(controller)
            }),
        ),
    ]);

    Ok(c)
}

/// Pipeline defaults with the rate-limit notice in the configured locale.
pub fn pipeline_config(container: &Container) -> Result<PipelineConfig> {
    let locale: Arc<LocaleStore> = container.resolve(names::LOCALE)?;
    Ok(PipelineConfig {
        rate_limit_notice: locale.t(locale.default_locale(), "ratelimit.notice"),
        ..PipelineConfig::default()
    })
}
