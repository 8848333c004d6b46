use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::json;

use crate::{errors::Error, logging::ScopedLogger, messaging::types::InboundUpdate};

/// Last line of defence for update processing.
///
/// Anything a stage or handler did not recover from ends up here: it is logged
/// with the update's context and swallowed so the loop keeps going.
#[derive(Debug)]
pub struct ErrorBackstop {
    log: ScopedLogger,
    reported: AtomicU64,
}

impl ErrorBackstop {
    pub fn new(log: ScopedLogger) -> Self {
        Self {
            log,
            reported: AtomicU64::new(0),
        }
    }

    pub fn report(&self, origin: &str, err: &Error, update: &InboundUpdate) {
        self.reported.fetch_add(1, Ordering::Relaxed);
        self.log.error(
            &format!("unhandled error in {origin}: {err}"),
            Some(json!({
                "origin": origin,
                "update_id": update.update_id,
                "update_kind": update.kind(),
                "chat_id": update.chat_id().map(|c| c.0),
                "user_id": update.user_id().map(|u| u.0),
                "error": format!("{err:?}"),
            })),
        );
    }

    /// Errors reported since startup.
    pub fn reported(&self) -> u64 {
        self.reported.load(Ordering::Relaxed)
    }
}
