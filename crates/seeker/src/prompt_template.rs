use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tera::{Context, Error as TeraError, Tera};

use crate::models::tool::Tool;

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");

/// Values available to the system preamble template
#[derive(Debug, Serialize)]
pub struct SystemPromptContext<'a> {
    pub date: String,
    pub search_history: &'a [String],
    pub tools: &'a [Tool],
}

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    let rendered = tera.render("inline_template", &context)?;
    Ok(rendered)
}

pub fn load_prompt_file<T: Serialize>(
    template_file: impl Into<PathBuf>,
    context_data: &T,
) -> Result<String, TeraError> {
    let template_content = fs::read_to_string(template_file.into())
        .map_err(|e| TeraError::chain("Failed to read template file", e))?;
    load_prompt(&template_content, context_data)
}

/// Render the system preamble, from `template_file` when given or the built-in template
pub fn render_system_prompt(
    template_file: Option<&PathBuf>,
    context: &SystemPromptContext<'_>,
) -> Result<String, TeraError> {
    match template_file {
        Some(path) => load_prompt_file(path, context),
        None => load_prompt(SYSTEM_TEMPLATE, context),
    }
}
