//! Logging setup and the scoped logger handed to controllers and services.

use std::sync::Arc;

use serde_json::Value;
use tracing_subscriber::{fmt, EnvFilter};

use crate::{domain::RunMode, errors::Error, Result};

/// Initialize the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise verbosity follows the run mode.
pub fn init(service_name: &str, mode: RunMode) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(service_name, mode)));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(!mode.is_production())
        .try_init()
        .map_err(|e| Error::External(format!("logging init failed: {e}")))
}

fn default_directives(service_name: &str, mode: RunMode) -> String {
    let ours = match mode {
        RunMode::Production => "info",
        RunMode::Development => "debug",
    };
    format!(
        "warn,{service_name}={ours},nbot_core={ours},nbot_telegram={ours},nbot_openai={ours}"
    )
}

/// Root logger. Cheap to clone; hands out scoped children.
#[derive(Clone, Debug)]
pub struct Logger {
    mode: RunMode,
}

impl Logger {
    pub fn new(mode: RunMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn with_scope(&self, name: impl Into<String>) -> ScopedLogger {
        ScopedLogger {
            scope: Arc::from(name.into()),
        }
    }
}

/// Logger bound to a scope name. Every record carries `scope` and, when given,
/// a JSON `context` field.
#[derive(Clone, Debug)]
pub struct ScopedLogger {
    scope: Arc<str>,
}

macro_rules! emit {
    ($level:ident, $scope:expr, $message:expr, $context:expr $(, $extra:ident = $value:expr)?) => {
        match $context {
            Some(ctx) => tracing::$level!(
                scope = %$scope,
                context = %ctx,
                $($extra = $value,)?
                "{}",
                $message
            ),
            None => tracing::$level!(scope = %$scope, $($extra = $value,)? "{}", $message),
        }
    };
}

impl ScopedLogger {
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn debug(&self, message: &str, context: Option<Value>) {
        emit!(debug, self.scope, message, context);
    }

    pub fn info(&self, message: &str, context: Option<Value>) {
        emit!(info, self.scope, message, context);
    }

    pub fn warn(&self, message: &str, context: Option<Value>) {
        emit!(warn, self.scope, message, context);
    }

    pub fn error(&self, message: &str, context: Option<Value>) {
        emit!(error, self.scope, message, context);
    }

    /// Positive outcome worth highlighting (startup done, loop healthy...).
    pub fn success(&self, message: &str, context: Option<Value>) {
        emit!(info, self.scope, message, context, outcome = "success");
    }
}

/// Captures this thread's tracing output for assertions.
#[cfg(test)]
pub(crate) mod capture {
    use std::{
        io,
        sync::{Arc, Mutex},
    };

    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    pub struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        pub fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    /// Active until the guard drops.
    pub fn start() -> (tracing::subscriber::DefaultGuard, Captured) {
        let out = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(out.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        (tracing::subscriber::set_default(subscriber), out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_is_quieter_than_development() {
        let prod = default_directives("nbot", RunMode::Production);
        let dev = default_directives("nbot", RunMode::Development);
        assert!(prod.contains("nbot_core=info"));
        assert!(dev.contains("nbot_core=debug"));
        assert!(prod.starts_with("warn,"));
    }

    #[test]
    fn scoped_logger_keeps_its_name() {
        let log = Logger::new(RunMode::Development).with_scope("random");
        assert_eq!(log.scope(), "random");
        // Emitting without a subscriber must not panic.
        log.success("ready", Some(serde_json::json!({ "routes": 2 })));
        log.warn("no context", None);
    }

    #[test]
    fn records_carry_scope_and_context() {
        let (_guard, out) = capture::start();

        let log = Logger::new(RunMode::Development).with_scope("random");
        log.error("roll failed", Some(serde_json::json!({ "chat_id": 5 })));

        let text = out.text();
        assert!(text.contains("ERROR"), "{text}");
        assert!(text.contains("scope=random"), "{text}");
        assert!(text.contains("roll failed"), "{text}");
        assert!(text.contains(r#"{"chat_id":5}"#), "{text}");
    }
}
