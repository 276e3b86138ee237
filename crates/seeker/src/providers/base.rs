use anyhow::Result;
use async_trait::async_trait;

use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::stream::FragmentStream;

/// Base trait for AI providers (OpenAI and compatible endpoints)
#[async_trait]
pub trait Provider: Send + Sync {
    /// Start streaming the next assistant response.
    ///
    /// Text arrives incrementally; a tool call is only yielded once its name and
    /// arguments are complete. An error here, or inside the stream, means the
    /// provider could not be reached or the response was cut off.
    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<FragmentStream>;
}
