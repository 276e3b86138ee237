use async_trait::async_trait;
use serde_json::Value;

use crate::errors::ToolResult;
use crate::models::tool::Tool;

pub mod extract;
pub mod registry;
pub mod validation;
pub mod web_search;

pub use extract::ExtractContentTool;
pub use registry::ToolRegistry;
pub use web_search::WebSearchTool;

/// Core trait that defines a capability the model can invoke by name
///
/// Any handler satisfying this contract is interchangeable from the agent's point of view.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Get the name the model uses to call this tool
    fn name(&self) -> &str;

    /// Get the tool description shown to the model
    fn description(&self) -> &str;

    /// Get the JSON Schema of the arguments
    fn parameters(&self) -> Value;

    /// Run the tool with arguments that already passed schema validation,
    /// returning the result as text for the model
    async fn execute(&self, arguments: Value) -> ToolResult<String>;

    /// Search queries carried by a call, recorded in the conversation's search context
    fn search_queries(&self, _arguments: &Value) -> Vec<String> {
        Vec::new()
    }

    /// The definition sent to the model
    fn definition(&self) -> Tool {
        Tool::new(self.name(), self.description(), self.parameters())
    }
}
