use anyhow::Result;
use futures::StreamExt;
use seeker::agent::{Agent, AgentEvent};
use seeker::errors::AgentResult;
use tokio::sync::watch;

use crate::prompt::{InputType, Prompt};

/// Reads questions from a prompt and answers each one before reading the next
///
/// The agent keeps its history and searches for the whole session.
pub struct Session<'a> {
    agent: Agent,
    prompt: Box<dyn Prompt + 'a>,
}

impl<'a> Session<'a> {
    pub fn new(agent: Agent, prompt: Box<impl Prompt + 'a>) -> Self {
        Session { agent, prompt }
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub async fn start(&mut self) -> Result<()> {
        loop {
            let input = self.prompt.get_input()?;
            match input.input_type {
                InputType::Message => {
                    if let Some(content) = &input.content {
                        if let Err(e) = self.process(content).await {
                            self.prompt.render_error(&e.to_string());
                        }
                        self.prompt.end_turn();
                    }
                }
                InputType::Help => self.prompt.render_help(),
                InputType::Exit => break,
                InputType::AskAgain => continue,
            }
        }
        self.prompt.close();
        Ok(())
    }

    /// Answer a single question and return
    pub async fn headless_start(&mut self, question: &str) -> Result<()> {
        let result = self.process(question).await;
        self.prompt.end_turn();
        Ok(result?)
    }

    /// Drive one turn to completion, cancelling it on Ctrl+C
    async fn process(&mut self, input: &str) -> AgentResult<()> {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let mut stream = self.agent.reply(input, cancel_rx);
        let mut interrupted = false;

        loop {
            tokio::select! {
                event = stream.next() => match event {
                    Some(Ok(event)) => render_event(self.prompt.as_mut(), event),
                    Some(Err(e)) => return Err(e),
                    None => return Ok(()),
                },
                _ = tokio::signal::ctrl_c(), if !interrupted => {
                    interrupted = true;
                    tracing::debug!("interrupt received, cancelling turn");
                    let _ = cancel_tx.send(true);
                }
            }
        }
    }
}

fn render_event(prompt: &mut dyn Prompt, event: AgentEvent) {
    match event {
        AgentEvent::Text(text) => prompt.render_text(&text),
        AgentEvent::ToolCall(call) => prompt.render_tool_call(&call),
        AgentEvent::ToolResult {
            name,
            output,
            is_error,
            ..
        } => prompt.render_tool_result(&name, &output, is_error),
        AgentEvent::TurnComplete { rounds } => {
            tracing::debug!(rounds, "answer delivered");
        }
    }
}
