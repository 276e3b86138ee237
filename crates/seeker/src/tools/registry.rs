use std::collections::HashMap;
use std::sync::Arc;

use super::validation::validate_arguments;
use super::ToolHandler;
use crate::errors::{AgentError, AgentResult, ToolError, ToolResult};
use crate::models::tool::{Tool, ToolCall};

/// Tools available to the agent, resolved by name
///
/// Built once at startup. Lookup of a name the model invented is a protocol violation,
/// while bad arguments and execution failures are reported back to the model.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool, rejecting a second tool with the same name
    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) -> AgentResult<()> {
        let name = handler.name().to_string();
        if self.handlers.contains_key(&name) {
            return Err(AgentError::Internal(format!(
                "tool '{name}' is already registered"
            )));
        }
        self.order.push(name.clone());
        self.handlers.insert(name, handler);
        Ok(())
    }

    /// Builder-style `register` for startup wiring
    pub fn with_tool(mut self, handler: Arc<dyn ToolHandler>) -> AgentResult<Self> {
        self.register(handler)?;
        Ok(self)
    }

    /// Tool definitions in registration order
    pub fn definitions(&self) -> Vec<Tool> {
        self.order
            .iter()
            .filter_map(|name| self.handlers.get(name))
            .map(|handler| handler.definition())
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolHandler>> {
        self.handlers.get(name)
    }

    /// Resolve the handler for a call, failing if the model named a tool that does not exist
    fn resolve(&self, call: &ToolCall) -> AgentResult<&Arc<dyn ToolHandler>> {
        self.get(&call.name).ok_or_else(|| {
            AgentError::ProtocolViolation(format!(
                "model called unknown tool '{}' (call id {})",
                call.name, call.id
            ))
        })
    }

    /// Validate then execute a call. Arguments that fail validation never reach the tool.
    ///
    /// `on_validated` receives the call's search queries once the arguments pass, before
    /// the tool runs, so they are seen even when execution then fails.
    pub async fn invoke<F>(
        &self,
        call: &ToolCall,
        on_validated: F,
    ) -> AgentResult<ToolResult<String>>
    where
        F: FnOnce(Vec<String>),
    {
        let handler = self.resolve(call)?;
        if let Err(e) = validate_arguments(&call.arguments, &handler.parameters()) {
            return Ok(Err(ToolError::InvalidArguments(e)));
        }
        on_validated(handler.search_queries(&call.arguments));
        Ok(handler.execute(call.arguments.clone()).await)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
