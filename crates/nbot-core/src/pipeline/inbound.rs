use std::sync::Arc;

use async_trait::async_trait;

use crate::{messaging::types::InboundUpdate, Result};

/// What a stage decided about an update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageOutcome {
    /// Hand the update to the next stage.
    Continue,
    /// Skip the remaining stages and deliver the update.
    Bypass,
    /// Stop here; handlers never see the update.
    Drop,
}

/// Final verdict of the inbound pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    Deliver,
    Dropped,
}

#[async_trait]
pub trait InboundStage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn process(&self, update: &InboundUpdate) -> Result<StageOutcome>;
}

/// Ordered chain of inbound stages. The order is fixed at construction.
#[derive(Clone)]
pub struct InboundPipeline {
    stages: Arc<[Arc<dyn InboundStage>]>,
}

impl InboundPipeline {
    pub fn new(stages: Vec<Arc<dyn InboundStage>>) -> Self {
        Self {
            stages: stages.into(),
        }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub async fn run(&self, update: &InboundUpdate) -> Result<Disposition> {
        for stage in self.stages.iter() {
            match stage.process(update).await? {
                StageOutcome::Continue => continue,
                StageOutcome::Bypass => {
                    tracing::trace!(stage = stage.name(), update_id = update.update_id, "bypass");
                    return Ok(Disposition::Deliver);
                }
                StageOutcome::Drop => {
                    tracing::debug!(stage = stage.name(), update_id = update.update_id, "dropped");
                    return Ok(Disposition::Dropped);
                }
            }
        }
        Ok(Disposition::Deliver)
    }
}
