use async_trait::async_trait;

use crate::Result;

/// Hexagonal port for a text completion backend (OpenAI, local models, ...).
#[async_trait]
pub trait TextModel: Send + Sync {
    /// Short backend/model label for logs.
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String>;
}
