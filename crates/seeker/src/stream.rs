//! Demultiplexing of a model response stream into text and tool calls
//!
//! Draining is split from execution: the collector only records what the model said,
//! so every call requested in a turn is known before any tool runs.
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::errors::{AgentError, AgentResult};
use crate::models::message::Message;
use crate::models::tool::ToolCall;

/// One incremental unit of a model response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFragment {
    /// A text delta, to be concatenated with the ones before it
    Text(String),
    /// A structurally complete tool call
    ToolCall(ToolCall),
}

impl StreamFragment {
    pub fn text<S: Into<String>>(text: S) -> Self {
        StreamFragment::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            StreamFragment::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_tool_call(&self) -> Option<&ToolCall> {
        match self {
            StreamFragment::ToolCall(call) => Some(call),
            _ => None,
        }
    }
}

pub type FragmentStream = BoxStream<'static, anyhow::Result<StreamFragment>>;

/// Everything the model produced in one response
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedTurn {
    /// The assistant message to append: the full text plus every call in order
    pub message: Message,
    /// Calls awaiting execution, in the order they were received
    pub tool_calls: Vec<ToolCall>,
    /// The raw fragments in arrival order, for replay
    pub fragments: Vec<StreamFragment>,
}

impl CollectedTurn {
    /// A turn without tool calls delivers the final answer
    pub fn is_terminal(&self) -> bool {
        self.tool_calls.is_empty()
    }
}

/// Accumulates fragments from a single response without side effects
#[derive(Debug, Default)]
pub struct StreamCollector {
    content: String,
    tool_calls: Vec<ToolCall>,
    fragments: Vec<StreamFragment>,
    seen_ids: HashSet<String>,
}

impl StreamCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fragment, returning the text to surface right away if it is a text delta.
    /// Tool calls are captured but never executed here.
    pub fn push(&mut self, fragment: StreamFragment) -> AgentResult<Option<String>> {
        let surfaced = match &fragment {
            StreamFragment::Text(text) => {
                self.content.push_str(text);
                Some(text.clone())
            }
            StreamFragment::ToolCall(call) => {
                if !self.seen_ids.insert(call.id.clone()) {
                    return Err(AgentError::ProtocolViolation(format!(
                        "duplicate tool call id '{}' in one assistant message",
                        call.id
                    )));
                }
                self.tool_calls.push(call.clone());
                None
            }
        };
        self.fragments.push(fragment);
        Ok(surfaced)
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn finish(self) -> CollectedTurn {
        let mut message = Message::assistant().with_text(&self.content);
        for call in &self.tool_calls {
            message = message.with_tool_call(call.clone());
        }
        CollectedTurn {
            message,
            tool_calls: self.tool_calls,
            fragments: self.fragments,
        }
    }
}

/// Pull the next fragment, mapping transport failures and idle timeouts to provider errors
pub(crate) async fn next_fragment(
    stream: &mut FragmentStream,
    idle_timeout: Option<Duration>,
) -> AgentResult<Option<StreamFragment>> {
    let next = match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, stream.next())
            .await
            .map_err(|_| {
                AgentError::Provider(format!(
                    "no response from the model for {}s",
                    limit.as_secs_f32()
                ))
            })?,
        None => stream.next().await,
    };
    next.transpose()
        .map_err(|e| AgentError::Provider(e.to_string()))
}
