use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::providers::base::Provider;
use crate::stream::{FragmentStream, StreamFragment};

/// One scripted response: fragments to stream, optionally ending in a mid-stream failure
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub fragments: Vec<StreamFragment>,
    pub fail_after: Option<String>,
}

impl From<Vec<StreamFragment>> for MockResponse {
    fn from(fragments: Vec<StreamFragment>) -> Self {
        Self {
            fragments,
            fail_after: None,
        }
    }
}

/// What the agent sent on one request
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub tools: Vec<Tool>,
}

/// A mock provider that streams pre-configured responses for testing
#[derive(Clone, Default)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<MockResponse>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new<R: Into<MockResponse>>(responses: Vec<R>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into_iter().map(Into::into).collect())),
            requests: Arc::default(),
        }
    }

    /// Every request received so far, oldest first
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<FragmentStream> {
        self.requests.lock().unwrap().push(RecordedRequest {
            system: system.to_string(),
            messages: messages.to_vec(),
            tools: tools.to_vec(),
        });

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(anyhow!("mock provider has no responses left"));
        }
        let response = responses.remove(0);

        let mut items: Vec<Result<StreamFragment>> =
            response.fragments.into_iter().map(Ok).collect();
        if let Some(reason) = response.fail_after {
            items.push(Err(anyhow!(reason)));
        }
        Ok(Box::pin(futures::stream::iter(items)))
    }
}
