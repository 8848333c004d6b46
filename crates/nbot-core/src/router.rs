//! Routes delivered updates to controller handlers.

use std::{future::Future, sync::Arc};

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::{
    backstop::ErrorBackstop,
    domain::MessageRef,
    errors::Error,
    messaging::{
        port::BotApi,
        types::{InboundUpdate, SendMessage},
    },
    pipeline::{Disposition, InboundPipeline},
    Result,
};

/// A parsed `/command@bot args` invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandInvocation {
    pub name: String,
    pub args: String,
}

/// Everything a handler gets for one update.
#[derive(Clone)]
pub struct HandlerContext {
    pub update: Arc<InboundUpdate>,
    pub api: Arc<dyn BotApi>,
    pub command: Option<CommandInvocation>,
}

impl HandlerContext {
    /// Command arguments, or an empty string for non-command updates.
    pub fn args(&self) -> &str {
        self.command.as_ref().map(|c| c.args.as_str()).unwrap_or("")
    }

    /// Send `text` to the update's chat, replying to its message when there is one.
    pub async fn reply(&self, text: impl Into<String>) -> Result<MessageRef> {
        self.send(|chat_id| SendMessage::text(chat_id, text)).await
    }

    /// Like [`reply`](Self::reply) but lets the caller shape the message.
    pub async fn send(
        &self,
        build: impl FnOnce(crate::domain::ChatId) -> SendMessage,
    ) -> Result<MessageRef> {
        let chat_id = self
            .update
            .chat_id()
            .ok_or_else(|| Error::External("update has no chat to reply to".to_string()))?;
        let msg = build(chat_id).reply_to(self.update.message_id);
        self.api.send_message(msg).await
    }
}

#[async_trait]
pub trait UpdateHandler: Send + Sync {
    async fn handle(&self, cx: HandlerContext) -> Result<()>;
}

#[async_trait]
impl<F, Fut> UpdateHandler for F
where
    F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn handle(&self, cx: HandlerContext) -> Result<()> {
        (self)(cx).await
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteFilter {
    Command(String),
    /// Callback data starting with the given prefix.
    Callback(String),
    Hashtag(String),
    Any,
}

#[derive(Clone)]
pub struct Route {
    pub owner: String,
    pub filter: RouteFilter,
    pub handler: Arc<dyn UpdateHandler>,
}

impl Route {
    fn matches(&self, update: &InboundUpdate, command: Option<&CommandInvocation>) -> bool {
        match &self.filter {
            RouteFilter::Command(name) => command.is_some_and(|c| &c.name == name),
            RouteFilter::Callback(prefix) => update
                .callback_data()
                .is_some_and(|d| d.starts_with(prefix.as_str())),
            RouteFilter::Hashtag(tag) => update.hashtags.iter().any(|t| t == tag),
            RouteFilter::Any => true,
        }
    }
}

/// Parse `/name@bot rest` into a command. Names are lower-cased.
///
/// Once `username` is known, a command addressed to another bot is not a
/// command for us. Without it every `@bot` suffix is accepted.
pub fn parse_command(
    text: Option<&str>,
    prefix: char,
    username: Option<&str>,
) -> Option<CommandInvocation> {
    let rest = text?.strip_prefix(prefix)?;
    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((h, a)) => (h, a.trim()),
        None => (rest, ""),
    };
    let (name, target) = match head.split_once('@') {
        Some((name, target)) => (name, Some(target)),
        None => (head, None),
    };
    if let (Some(target), Some(me)) = (target, username) {
        if !target.eq_ignore_ascii_case(me) {
            return None;
        }
    }
    let name = name.to_lowercase();
    if name.is_empty() {
        return None;
    }
    Some(CommandInvocation {
        name,
        args: args.to_string(),
    })
}

/// Frozen routing table plus the inbound pipeline in front of it.
pub struct Router {
    pipeline: InboundPipeline,
    routes: Vec<Route>,
    api: Arc<dyn BotApi>,
    backstop: Arc<ErrorBackstop>,
    prefix: char,
    username: OnceCell<String>,
}

impl Router {
    pub fn new(
        pipeline: InboundPipeline,
        routes: Vec<Route>,
        api: Arc<dyn BotApi>,
        backstop: Arc<ErrorBackstop>,
        prefix: char,
    ) -> Self {
        Self {
            pipeline,
            routes,
            api,
            backstop,
            prefix,
            username: OnceCell::new(),
        }
    }

    /// The bot's own username, used to ignore `/cmd@other_bot`. First call wins.
    pub fn set_username(&self, username: &str) {
        if self.username.set(username.to_string()).is_err() {
            tracing::debug!("router username already set");
        }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn pipeline(&self) -> &InboundPipeline {
        &self.pipeline
    }

    /// Run the pipeline, then every matching route in registration order.
    ///
    /// Never fails: errors and panics go to the backstop. A failing handler
    /// stops the remaining routes for this update.
    pub async fn dispatch(&self, update: InboundUpdate) {
        match self.pipeline.run(&update).await {
            Ok(Disposition::Deliver) => {}
            Ok(Disposition::Dropped) => return,
            Err(e) => {
                self.backstop.report("inbound pipeline", &e, &update);
                return;
            }
        }

        let update = Arc::new(update);
        let command = parse_command(
            update.text.as_deref(),
            self.prefix,
            self.username.get().map(String::as_str),
        );

        for route in &self.routes {
            if !route.matches(&update, command.as_ref()) {
                continue;
            }

            let cx = HandlerContext {
                update: update.clone(),
                api: self.api.clone(),
                command: command.clone(),
            };
            let handler = route.handler.clone();
            let outcome = tokio::spawn(async move { handler.handle(cx).await }).await;

            let err = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(join) => Error::External(format!("handler panicked: {join}")),
            };
            self.backstop
                .report(&format!("handler of `{}`", route.owner), &err, &update);
            return;
        }
    }
}
