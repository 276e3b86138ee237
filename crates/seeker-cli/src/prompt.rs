use anyhow::Result;
use seeker::models::tool::ToolCall;

pub mod rustyline;

/// The terminal side of a session: reads input and renders what the agent reports
pub trait Prompt {
    fn get_input(&mut self) -> Result<Input>;
    fn render_text(&mut self, text: &str);
    fn render_tool_call(&mut self, call: &ToolCall);
    fn render_tool_result(&mut self, name: &str, output: &str, is_error: bool);
    fn render_error(&mut self, message: &str);
    fn render_help(&mut self);
    /// Called once a turn has finished, successfully or not
    fn end_turn(&mut self);
    fn close(&self) {}
}

#[derive(Debug, PartialEq)]
pub struct Input {
    pub input_type: InputType,
    pub content: Option<String>, // Only set for messages
}

#[derive(Debug, PartialEq)]
pub enum InputType {
    AskAgain, // Nothing to send, read again
    Message,  // User sent a message
    Help,     // User asked for the command list
    Exit,     // User wants to exit the session
}

impl Input {
    pub fn exit() -> Self {
        Self {
            input_type: InputType::Exit,
            content: None,
        }
    }

    fn control(input_type: InputType) -> Self {
        Self {
            input_type,
            content: None,
        }
    }
}

pub const HELP: &str = "Commands:
/exit, /quit - End the session (Ctrl+D works too)
/help, /? - Display this help message
Ctrl+C - Cancel the current answer";

/// Interpret one line typed by the user
pub fn parse_input(line: &str) -> Input {
    let text = line.trim();
    if text.is_empty() {
        Input::control(InputType::AskAgain)
    } else if text.eq_ignore_ascii_case("/exit") || text.eq_ignore_ascii_case("/quit") {
        Input::exit()
    } else if text.eq_ignore_ascii_case("/help") || text == "/?" {
        Input::control(InputType::Help)
    } else {
        Input {
            input_type: InputType::Message,
            content: Some(text.to_string()),
        }
    }
}
