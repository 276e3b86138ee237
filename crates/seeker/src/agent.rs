use futures::stream::BoxStream;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;

use crate::clock::{Clock, SystemClock};
use crate::errors::{AgentError, AgentResult};
use crate::models::message::Message;
use crate::models::tool::{Tool, ToolCall};
use crate::prompt_template::{render_system_prompt, SystemPromptContext};
use crate::providers::base::Provider;
use crate::search_context::SearchContext;
use crate::store::MessageStore;
use crate::stream::{next_fragment, FragmentStream, StreamCollector, StreamFragment};
use crate::tools::ToolRegistry;

pub const DEFAULT_MAX_ROUNDS: usize = 10;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model requests allowed in one turn, `None` for no limit
    pub max_rounds: Option<usize>,
    /// Longest wait for the next fragment of a model response
    pub stream_timeout: Option<Duration>,
    /// Replaces the built-in system preamble template
    pub system_template: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_rounds: Some(DEFAULT_MAX_ROUNDS),
            stream_timeout: Some(Duration::from_secs(120)),
            system_template: None,
        }
    }
}

/// What a turn reports to its caller, in order
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// A text delta from the model, as it arrives
    Text(String),
    /// The model requested a tool call
    ToolCall(ToolCall),
    /// A tool call was dispatched and its result appended
    ToolResult {
        id: String,
        name: String,
        output: String,
        is_error: bool,
    },
    /// The model answered without requesting tools; `rounds` counts the model requests made
    TurnComplete { rounds: usize },
}

/// Agent integrates a language model with the tools it can call
///
/// Owns the conversation: the message store and the search context survive between
/// turns and are never shared with another agent.
pub struct Agent {
    provider: Box<dyn Provider>,
    registry: ToolRegistry,
    store: MessageStore,
    search_context: SearchContext,
    clock: Box<dyn Clock>,
    config: AgentConfig,
}

impl Agent {
    pub fn new(provider: Box<dyn Provider>, registry: ToolRegistry) -> Self {
        Self {
            provider,
            registry,
            store: MessageStore::new(),
            search_context: SearchContext::new(),
            clock: Box::new(SystemClock),
            config: AgentConfig::default(),
        }
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn search_context(&self) -> &SearchContext {
        &self.search_context
    }

    pub fn tools(&self) -> Vec<Tool> {
        self.registry.definitions()
    }

    fn system_prompt(&self, tools: &[Tool]) -> AgentResult<String> {
        let context = SystemPromptContext {
            date: self.clock.today().format("%Y-%m-%d").to_string(),
            search_history: self.search_context.queries(),
            tools,
        };
        render_system_prompt(self.config.system_template.as_ref(), &context)
            .map_err(|e| AgentError::Internal(format!("failed to render system prompt: {e}")))
    }

    /// Resolve, validate and execute one call, returning the result text and whether it failed.
    ///
    /// Queries are added to the search context once the arguments validate, whether or not
    /// the tool then succeeds.
    async fn dispatch(&mut self, call: &ToolCall) -> AgentResult<(String, bool)> {
        let search_context = &mut self.search_context;
        let result = self
            .registry
            .invoke(call, |queries| {
                for query in queries {
                    search_context.record(query);
                }
            })
            .await?;

        Ok(match result {
            Ok(output) => (output, false),
            Err(e) => {
                tracing::warn!(tool = call.name.as_str(), id = call.id.as_str(), error = %e, "tool call failed");
                (format!("Error: {e}"), true)
            }
        })
    }

    /// Answer the calls left unanswered when a turn stops mid-dispatch, so every call in the
    /// store keeps a result and the conversation can continue
    fn close_pending(&mut self, pending: &[ToolCall], error: &AgentError) {
        for call in pending {
            self.store
                .append(Message::tool_result(call.id.clone(), format!("Error: {error}")));
        }
    }

    /// Run one turn: send `input` (when non-empty) and keep dispatching tools until the
    /// model answers without requesting any.
    ///
    /// Text is surfaced as it streams. Tool failures are reported to the model and the turn
    /// goes on; provider failures, protocol violations, cancellation and the round limit end
    /// it with an error. Whatever was appended before the error stays in the store.
    pub fn reply<'a>(
        &'a mut self,
        input: &str,
        mut cancel: watch::Receiver<bool>,
    ) -> BoxStream<'a, AgentResult<AgentEvent>> {
        let input = input.to_string();

        Box::pin(async_stream::try_stream! {
            if !input.is_empty() {
                self.store.append(Message::user().with_text(&input));
            }

            let tools = self.registry.definitions();
            let mut rounds = 0;

            loop {
                let is_cancelled = *cancel.borrow();
                if is_cancelled {
                    Err::<(), _>(AgentError::Cancelled)?;
                }
                if let Some(max) = self.config.max_rounds {
                    if rounds >= max {
                        Err::<(), _>(AgentError::MaxRoundsExceeded(max))?;
                    }
                }
                rounds += 1;

                let system = self.system_prompt(&tools)?;
                tracing::debug!(round = rounds, messages = self.store.len(), "requesting model response");

                let mut stream = self
                    .provider
                    .stream(&system, self.store.as_slice(), &tools)
                    .await
                    .map_err(|e| AgentError::Provider(e.to_string()))?;

                let mut collector = StreamCollector::new();
                while let Some(fragment) =
                    next_or_cancelled(&mut stream, self.config.stream_timeout, &mut cancel).await?
                {
                    let call = fragment.as_tool_call().cloned();
                    if let Some(text) = collector.push(fragment)? {
                        yield AgentEvent::Text(text);
                    }
                    if let Some(call) = call {
                        yield AgentEvent::ToolCall(call);
                    }
                }

                let turn = collector.finish();
                let terminal = turn.is_terminal();
                self.store.append(turn.message);

                if terminal {
                    tracing::debug!(rounds, "turn complete");
                    yield AgentEvent::TurnComplete { rounds };
                    break;
                }

                for (i, call) in turn.tool_calls.iter().enumerate() {
                    let is_cancelled = *cancel.borrow();
                    let outcome = if is_cancelled {
                        Err(AgentError::Cancelled)
                    } else {
                        self.dispatch(call).await
                    };

                    if let Err(e) = &outcome {
                        self.close_pending(&turn.tool_calls[i..], e);
                    }
                    let (output, is_error) = outcome?;

                    self.store.append(Message::tool_result(call.id.clone(), output.clone()));
                    yield AgentEvent::ToolResult {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        output,
                        is_error,
                    };
                }
            }
        })
    }
}

/// Next fragment of the response, or `Cancelled` as soon as cancellation is requested
async fn next_or_cancelled(
    stream: &mut FragmentStream,
    idle_timeout: Option<Duration>,
    cancel: &mut watch::Receiver<bool>,
) -> AgentResult<Option<StreamFragment>> {
    tokio::select! {
        biased;
        _ = cancelled(cancel) => Err(AgentError::Cancelled),
        next = next_fragment(stream, idle_timeout) => next,
    }
}

async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    // A dropped sender can never cancel
    let closed = cancel.wait_for(|cancelled| *cancelled).await.is_err();
    if closed {
        futures::future::pending::<()>().await;
    }
}
