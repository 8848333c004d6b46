//! Root orchestrator: container → pipelines → controllers → update loop.

use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use serde_json::json;
use tokio::{sync::OnceCell, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    backstop::ErrorBackstop,
    container::{names, Container, Registration},
    controller::{BotContext, Controller},
    domain::BotIdentity,
    errors::Error,
    logging::{Logger, ScopedLogger},
    messaging::port::BotApi,
    pipeline::{
        admission::DEFAULT_COMMAND_PREFIX, outbound, rate_limit::DEFAULT_NOTICE, AdmissionFilter,
        InboundPipeline, InboundStage, OutboundConfig, RateLimitConfig, RateLimitStage,
    },
    router::Router,
    Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Unregistered,
    Registered,
    Running,
    Failed,
}

/// Source of updates and the raw Bot API client (Telegram long polling in production).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Raw client; the orchestrator wraps it with the outbound pipeline.
    fn api(&self) -> Arc<dyn BotApi>;

    /// Start feeding updates into `router`. Must not block until the loop ends.
    async fn start(&self, router: Arc<Router>) -> Result<RunHandle>;
}

/// Handle on a running update loop.
pub struct RunHandle {
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RunHandle {
    /// Spawn `run` as the update loop. `run` should return once `cancel` fires.
    pub fn spawn<F>(cancel: CancellationToken, run: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let task = tokio::spawn(async move {
            run.await;
            flag.store(false, Ordering::SeqCst);
        });
        Self {
            running,
            cancel,
            task,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Ask the loop to stop; use [`wait`](Self::wait) to join it.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn wait(self) {
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "update loop task failed");
        }
    }
}

/// Pipeline knobs. Defaults match production behavior.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub command_prefix: char,
    pub rate_limit: RateLimitConfig,
    pub rate_limit_notice: String,
    pub outbound: OutboundConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            command_prefix: DEFAULT_COMMAND_PREFIX,
            rate_limit: RateLimitConfig::default(),
            rate_limit_notice: DEFAULT_NOTICE.to_string(),
            outbound: OutboundConfig::default(),
        }
    }
}

pub struct Orchestrator {
    container: Container,
    transport: Arc<dyn Transport>,
    controllers: Vec<String>,
    pipeline_cfg: PipelineConfig,
    state: LifecycleState,
    api: Option<Arc<dyn BotApi>>,
    router: Option<Arc<Router>>,
    identity: OnceCell<BotIdentity>,
    backstop: Arc<ErrorBackstop>,
    logger: Logger,
    log: ScopedLogger,
}

impl Orchestrator {
    /// `controllers` are container names, registered in the given order.
    pub fn new<N: Into<String>>(
        container: Container,
        transport: Arc<dyn Transport>,
        controllers: impl IntoIterator<Item = N>,
        logger: &Logger,
    ) -> Self {
        Self {
            container,
            transport,
            controllers: controllers.into_iter().map(Into::into).collect(),
            pipeline_cfg: PipelineConfig::default(),
            state: LifecycleState::Unregistered,
            api: None,
            router: None,
            identity: OnceCell::new(),
            backstop: Arc::new(ErrorBackstop::new(logger.with_scope("errors"))),
            logger: logger.clone(),
            log: logger.with_scope("bot"),
        }
    }

    pub fn with_pipeline_config(mut self, cfg: PipelineConfig) -> Self {
        self.pipeline_cfg = cfg;
        self
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn router(&self) -> Option<&Arc<Router>> {
        self.router.as_ref()
    }

    pub fn backstop(&self) -> &Arc<ErrorBackstop> {
        &self.backstop
    }

    /// Wire pipelines and register every controller, in declared order.
    pub async fn register(&mut self) -> Result<()> {
        if self.state != LifecycleState::Unregistered {
            return Err(Error::Lifecycle(format!(
                "register() called in state {:?}",
                self.state
            )));
        }

        match self.try_register().await {
            Ok(router) => {
                self.log.success(
                    "controllers registered",
                    Some(json!({
                        "controllers": self.controllers,
                        "routes": router.routes().len(),
                        "stages": router.pipeline().stage_names(),
                    })),
                );
                self.router = Some(router);
                self.state = LifecycleState::Registered;
                Ok(())
            }
            Err(e) => {
                self.log.error(
                    "registration failed",
                    Some(json!({ "error": e.to_string() })),
                );
                self.state = LifecycleState::Failed;
                Err(e)
            }
        }
    }

    async fn try_register(&mut self) -> Result<Arc<Router>> {
        let cfg = self.pipeline_cfg.clone();

        let api = outbound::wrap(self.transport.api(), cfg.outbound);
        self.container
            .register([(names::API, Registration::value(api.clone()))]);
        self.api = Some(api.clone());

        let pipeline = InboundPipeline::new(vec![
            Arc::new(AdmissionFilter::new(cfg.command_prefix)) as Arc<dyn InboundStage>,
            Arc::new(RateLimitStage::new(
                cfg.rate_limit,
                api.clone(),
                self.logger.with_scope("ratelimit"),
                cfg.rate_limit_notice,
            )),
        ]);

        // Updates that piled up while we were offline are dropped.
        if let Err(e) = api.delete_webhook(true).await {
            self.log.warn(
                "webhook cleanup failed, continuing",
                Some(json!({ "error": e.to_string() })),
            );
        }

        let mut bot = BotContext::new(api.clone());
        for name in &self.controllers {
            let controller: Arc<dyn Controller> =
                self.container
                    .resolve(name)
                    .map_err(|e| Error::Controller {
                        controller: name.clone(),
                        reason: e.to_string(),
                    })?;

            let before = bot.routes().len();
            bot.set_owner(controller.name());
            controller
                .register(&mut bot)
                .map_err(|e| Error::Controller {
                    controller: name.clone(),
                    reason: e.to_string(),
                })?;

            self.log.info(
                "controller registered",
                Some(json!({ "controller": name, "routes": bot.routes().len() - before })),
            );
        }

        Ok(Arc::new(Router::new(
            pipeline,
            bot.into_routes(),
            api,
            self.backstop.clone(),
            cfg.command_prefix,
        )))
    }

    /// Start the update loop and fetch the bot identity.
    pub async fn run(&mut self) -> Result<RunHandle> {
        if self.state != LifecycleState::Registered {
            return Err(Error::Lifecycle(format!(
                "run() called in state {:?}",
                self.state
            )));
        }
        let router = self
            .router
            .clone()
            .ok_or_else(|| Error::Lifecycle("router missing after register()".to_string()))?;

        let handle = match self.transport.start(router.clone()).await {
            Ok(h) => h,
            Err(e) => {
                self.state = LifecycleState::Failed;
                return Err(e);
            }
        };

        if handle.is_running() {
            self.log.success("update loop is running", None);
        } else {
            self.log.error("update loop reports it is not running", None);
        }

        match self.identity().await {
            Ok(me) => {
                self.log.info(
                    "bot identity",
                    Some(json!({ "id": me.id.0, "username": me.username, "is_bot": me.is_bot })),
                );
                router.set_username(&me.username);
                self.state = LifecycleState::Running;
                Ok(handle)
            }
            Err(e) => {
                self.log.error(
                    "identity lookup failed, stopping",
                    Some(json!({ "error": e.to_string() })),
                );
                handle.stop();
                self.state = LifecycleState::Failed;
                Err(e)
            }
        }
    }

    /// Bot identity; fetched once, concurrent callers share the lookup.
    pub async fn identity(&self) -> Result<BotIdentity> {
        let api = self
            .api
            .clone()
            .ok_or_else(|| Error::Lifecycle("identity requested before register()".to_string()))?;
        self.identity
            .get_or_try_init(|| async move { api.get_me().await })
            .await
            .cloned()
    }
}
