use async_trait::async_trait;

use crate::{
    messaging::types::InboundUpdate,
    pipeline::inbound::{InboundStage, StageOutcome},
    Result,
};

pub const DEFAULT_COMMAND_PREFIX: char = '/';

/// Decides which updates count toward rate limiting.
///
/// Eligible: command text, a reply to a command, callback data, or a hashtag.
/// Everything else bypasses the rest of the pipeline and is still delivered.
#[derive(Clone, Copy, Debug)]
pub struct AdmissionFilter {
    prefix: char,
}

impl Default for AdmissionFilter {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_PREFIX)
    }
}

impl AdmissionFilter {
    pub fn new(prefix: char) -> Self {
        Self { prefix }
    }

    pub fn is_eligible(&self, update: &InboundUpdate) -> bool {
        let starts_with_prefix =
            |text: &Option<String>| text.as_deref().is_some_and(|t| t.starts_with(self.prefix));

        starts_with_prefix(&update.text)
            || starts_with_prefix(&update.reply_to_text)
            || update.callback_data().is_some()
            || !update.hashtags.is_empty()
    }
}

#[async_trait]
impl InboundStage for AdmissionFilter {
    fn name(&self) -> &'static str {
        "admission"
    }

    async fn process(&self, update: &InboundUpdate) -> Result<StageOutcome> {
        if self.is_eligible(update) {
            Ok(StageOutcome::Continue)
        } else {
            Ok(StageOutcome::Bypass)
        }
    }
}
