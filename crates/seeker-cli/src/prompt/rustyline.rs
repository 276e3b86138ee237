use std::io::{self, Write};

use anyhow::Result;
use console::style;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use seeker::models::tool::ToolCall;
use serde_json::Value;

use super::{parse_input, Input, Prompt, HELP};

const PROMPT: &str = "\x1b[1m\x1b[38;5;30m(?)> \x1b[0m";
const MAX_STRING_LENGTH: usize = 60;
const MAX_RESULT_LINES: usize = 3;

pub struct RustylinePrompt {
    editor: DefaultEditor,
}

impl RustylinePrompt {
    pub fn new() -> Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
        })
    }
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

/// One-line summary of call arguments
fn format_arguments(arguments: &Value) -> String {
    match arguments {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| match value {
                Value::String(s) => format!("{}: {}", key, truncate(s, MAX_STRING_LENGTH)),
                other => format!("{}: {}", key, other),
            })
            .collect::<Vec<_>>()
            .join(", "),
        Value::String(raw) => truncate(raw, MAX_STRING_LENGTH),
        other => other.to_string(),
    }
}

fn flush() {
    let _ = io::stdout().flush();
}

impl Prompt for RustylinePrompt {
    fn get_input(&mut self) -> Result<Input> {
        let line = match self.editor.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => return Ok(Input::exit()),
            Err(e) => {
                eprintln!("Input error: {}", e);
                return Ok(Input::exit());
            }
        };
        if !line.trim().is_empty() {
            let _ = self.editor.add_history_entry(line.trim());
        }
        Ok(parse_input(&line))
    }

    fn render_text(&mut self, text: &str) {
        print!("{}", text);
        flush();
    }

    fn render_tool_call(&mut self, call: &ToolCall) {
        println!(
            "\n{} {}",
            style(format!("─── {}", call.name)).magenta().dim(),
            style(format_arguments(&call.arguments)).dim()
        );
    }

    fn render_tool_result(&mut self, name: &str, output: &str, is_error: bool) {
        if is_error {
            println!("{}", style(format!("{}: {}", name, truncate(output, 200))).yellow());
            return;
        }
        let lines: Vec<&str> = output.lines().filter(|l| !l.trim().is_empty()).collect();
        for line in lines.iter().take(MAX_RESULT_LINES) {
            println!("{}", style(truncate(line.trim(), 100)).dim());
        }
        if lines.len() > MAX_RESULT_LINES {
            println!(
                "{}",
                style(format!("({} more lines)", lines.len() - MAX_RESULT_LINES)).dim()
            );
        }
        println!();
    }

    fn render_error(&mut self, message: &str) {
        println!();
        eprintln!("{} {}", style("Error:").red().bold(), message);
    }

    fn render_help(&mut self) {
        println!("{}", HELP);
    }

    fn end_turn(&mut self) {
        println!();
        flush();
    }

    fn close(&self) {
        println!("{}", style("Goodbye.").dim());
    }
}
