//! Feature controller contract and the context controllers register into.

use std::sync::Arc;

use crate::{
    messaging::port::BotApi,
    router::{Route, RouteFilter, UpdateHandler},
    Result,
};

/// A feature module. Built by a container factory from its declared
/// dependencies, then asked once to attach its handlers.
pub trait Controller: Send + Sync {
    fn name(&self) -> &str;

    fn register(&self, bot: &mut BotContext) -> Result<()>;
}

/// Registration-time handle on the bot: the outbound API plus route builders.
///
/// Routes are recorded in registration order and frozen into the router once
/// every controller has registered.
pub struct BotContext {
    api: Arc<dyn BotApi>,
    owner: String,
    routes: Vec<Route>,
}

impl BotContext {
    pub fn new(api: Arc<dyn BotApi>) -> Self {
        Self {
            api,
            owner: String::new(),
            routes: Vec::new(),
        }
    }

    pub(crate) fn set_owner(&mut self, owner: &str) {
        self.owner = owner.to_string();
    }

    pub fn api(&self) -> Arc<dyn BotApi> {
        self.api.clone()
    }

    /// `/name` commands (case-insensitive, `@bot` suffix ignored).
    pub fn command(&mut self, name: &str, handler: impl UpdateHandler + 'static) -> &mut Self {
        self.push(RouteFilter::Command(name.to_lowercase()), handler)
    }

    /// Callback queries whose data starts with `prefix`.
    pub fn callback(&mut self, prefix: &str, handler: impl UpdateHandler + 'static) -> &mut Self {
        self.push(RouteFilter::Callback(prefix.to_string()), handler)
    }

    /// Messages carrying `#tag`.
    pub fn hashtag(&mut self, tag: &str, handler: impl UpdateHandler + 'static) -> &mut Self {
        let tag = tag.trim_start_matches('#').to_lowercase();
        self.push(RouteFilter::Hashtag(tag), handler)
    }

    /// Every delivered update.
    pub fn on_update(&mut self, handler: impl UpdateHandler + 'static) -> &mut Self {
        self.push(RouteFilter::Any, handler)
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub(crate) fn into_routes(self) -> Vec<Route> {
        self.routes
    }

    fn push(&mut self, filter: RouteFilter, handler: impl UpdateHandler + 'static) -> &mut Self {
        self.routes.push(Route {
            owner: self.owner.clone(),
            filter,
            handler: Arc::new(handler),
        });
        self
    }
}
