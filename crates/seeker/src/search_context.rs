use serde::Serialize;

/// Queries searched so far in the conversation, oldest first
///
/// Rendered into the system prompt so the model can relate a new query to earlier ones.
/// The list only grows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SearchContext {
    queries: Vec<String>,
}

impl SearchContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record<S: Into<String>>(&mut self, query: S) {
        self.queries.push(query.into());
    }

    pub fn queries(&self) -> &[String] {
        &self.queries
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}
