//! Command dispatch seam

use async_trait::async_trait;

use crate::Result;
use crate::backend::BackendClient;

/// Sends a command to the assistant and returns its response text
///
/// Implementations reject blank text with [`crate::Error::EmptyCommand`] and
/// report every other failure as a single [`crate::Error::Dispatch`]. No
/// retries.
#[async_trait]
pub trait CommandDispatcher: Send + Sync {
    async fn dispatch(&self, text: &str) -> Result<String>;
}

#[async_trait]
impl CommandDispatcher for BackendClient {
    async fn dispatch(&self, text: &str) -> Result<String> {
        self.send_command(text).await
    }
}
