use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

use super::base::Provider;
use super::configs::OpenAiProviderConfig;
use super::utils::{
    check_openai_context_length_error, messages_to_openai_spec, parse_sse_data,
    tools_to_openai_spec, ChatCompletionChunk, ToolCallAccumulator,
};
use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::stream::{FragmentStream, StreamFragment};

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client, config })
    }

    fn build_payload(&self, system: &str, messages: &[Message], tools: &[Tool]) -> Result<Value> {
        let system_message = json!({
            "role": "system",
            "content": system
        });

        let mut messages_array = vec![system_message];
        messages_array.extend(messages_to_openai_spec(messages));

        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_array,
            "stream": true,
        });

        if !tools.is_empty() {
            payload["tools"] = json!(tools_to_openai_spec(tools)?);
        }
        if let Some(temp) = self.config.temperature {
            payload["temperature"] = json!(temp);
        }
        if let Some(tokens) = self.config.max_tokens {
            payload["max_tokens"] = json!(tokens);
        }
        Ok(payload)
    }

    async fn post(&self, payload: &Value) -> Result<reqwest::Response> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(anyhow!("Server error: {}", status))
            }
            status => {
                let body: Value = response.json().await.unwrap_or(Value::Null);
                if let Some(err) = body
                    .get("error")
                    .and_then(check_openai_context_length_error)
                {
                    return Err(err.into());
                }
                Err(anyhow!("Request failed: {}\nResponse: {}", status, body))
            }
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<FragmentStream> {
        let payload = self.build_payload(system, messages, tools)?;
        tracing::debug!(
            model = self.config.model.as_str(),
            messages = messages.len(),
            tools = tools.len(),
            "requesting chat completion stream"
        );
        let response = self.post(&payload).await?;
        let mut bytes = response.bytes_stream();

        Ok(Box::pin(async_stream::try_stream! {
            // Raw bytes, since a chunk can end inside a multi-byte character
            let mut buffer: Vec<u8> = Vec::new();
            let mut pending_calls = ToolCallAccumulator::new();

            'read: while let Some(chunk) = bytes.next().await {
                let chunk = chunk?;
                buffer.extend_from_slice(&chunk);

                while let Some(line_end) = buffer.iter().position(|b| *b == b'\n') {
                    let raw: Vec<u8> = buffer.drain(..=line_end).collect();
                    let line = String::from_utf8(raw)
                        .map_err(|e| anyhow!("Stream line is not valid UTF-8: {}", e))?;
                    let line = line.trim();

                    let Some(data) = parse_sse_data(line) else {
                        continue;
                    };
                    if data == "[DONE]" {
                        break 'read;
                    }

                    let chunk: ChatCompletionChunk = serde_json::from_str(data)
                        .map_err(|e| anyhow!("Malformed stream chunk: {}: {}", e, data))?;
                    if let Some(error) = chunk.error {
                        Err::<(), _>(anyhow!("OpenAI API error: {}", error))?;
                    }

                    for choice in chunk.choices {
                        if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                            yield StreamFragment::Text(text);
                        }
                        for delta in choice.delta.tool_calls {
                            pending_calls.push(delta);
                        }
                        if choice.finish_reason.is_some() {
                            for call in pending_calls.drain() {
                                yield StreamFragment::ToolCall(call);
                            }
                        }
                    }
                }
            }

            for call in pending_calls.drain() {
                yield StreamFragment::ToolCall(call);
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tool::ToolCall;
    use futures::TryStreamExt;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sse(events: &[Value]) -> String {
        let mut body = String::new();
        for event in events {
            body.push_str(&format!("data: {}\n\n", event));
        }
        body.push_str("data: [DONE]\n\n");
        body
    }

    async fn setup_mock_server(status: u16, body: String) -> (MockServer, OpenAiProvider) {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test_api_key"))
            .and(body_partial_json(json!({"stream": true, "model": "gpt-4o-mini"})))
            .respond_with(
                ResponseTemplate::new(status)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&mock_server)
            .await;

        let config = OpenAiProviderConfig {
            host: mock_server.uri(),
            api_key: "test_api_key".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: Some(0.7),
            max_tokens: None,
        };

        let provider = OpenAiProvider::new(config).unwrap();
        (mock_server, provider)
    }

    #[tokio::test]
    async fn test_stream_text() -> Result<()> {
        let body = sse(&[
            json!({"choices": [{"index": 0, "delta": {"role": "assistant", "content": ""}}]}),
            json!({"choices": [{"index": 0, "delta": {"content": "Par"}}]}),
            json!({"choices": [{"index": 0, "delta": {"content": "is."}}]}),
            json!({"choices": [{"index": 0, "delta": {}, "finish_reason": "stop"}]}),
        ]);
        let (_server, provider) = setup_mock_server(200, body).await;

        let messages = vec![Message::user().with_text("What is the capital of France?")];
        let fragments: Vec<StreamFragment> = provider
            .stream("You are a helpful assistant.", &messages, &[])
            .await?
            .try_collect()
            .await?;

        assert_eq!(
            fragments,
            vec![StreamFragment::text("Par"), StreamFragment::text("is.")]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_stream_tool_call() -> Result<()> {
        let body = sse(&[
            json!({"choices": [{"index": 0, "delta": {"tool_calls": [
                {"index": 0, "id": "call_123", "type": "function",
                 "function": {"name": "web_search", "arguments": ""}}
            ]}}]}),
            json!({"choices": [{"index": 0, "delta": {"tool_calls": [
                {"index": 0, "function": {"arguments": "{\"query\":"}}
            ]}}]}),
            json!({"choices": [{"index": 0, "delta": {"tool_calls": [
                {"index": 0, "function": {"arguments": "\"Eiffel Tower height\"}"}}
            ]}}]}),
            json!({"choices": [{"index": 0, "delta": {}, "finish_reason": "tool_calls"}]}),
        ]);
        let (_server, provider) = setup_mock_server(200, body).await;

        let tool = Tool::new(
            "web_search",
            "Search the web",
            json!({
                "type": "object",
                "properties": {"query": {"type": "string"}},
                "required": ["query"]
            }),
        );
        let messages = vec![Message::user().with_text("How tall is the Eiffel Tower?")];
        let fragments: Vec<StreamFragment> = provider
            .stream("You are a helpful assistant.", &messages, &[tool])
            .await?
            .try_collect()
            .await?;

        assert_eq!(
            fragments,
            vec![StreamFragment::ToolCall(ToolCall::new(
                "call_123",
                "web_search",
                json!({"query": "Eiffel Tower height"})
            ))]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_stream_flushes_calls_without_finish_reason() -> Result<()> {
        let body = sse(&[json!({"choices": [{"index": 0, "delta": {"tool_calls": [
            {"index": 0, "id": "call_1", "function": {"name": "web_search", "arguments": "{}"}}
        ]}}]})]);
        let (_server, provider) = setup_mock_server(200, body).await;

        let fragments: Vec<StreamFragment> = provider
            .stream("system", &[Message::user().with_text("hi")], &[])
            .await?
            .try_collect()
            .await?;

        assert_eq!(fragments.len(), 1);
        assert!(fragments[0].as_tool_call().is_some());
        Ok(())
    }

    /// Serve one request with a chunked SSE body, cut at `split` bytes into two chunks
    /// sent with a pause between them
    async fn serve_split_body(body: Vec<u8>, split: usize) -> Result<String> {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await?;

            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await?;
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_lowercase();
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let length = text
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= head_end + 4 + length || n == 0 {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }

            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n",
                )
                .await?;
            for part in [&body[..split], &body[split..]] {
                socket
                    .write_all(format!("{:x}\r\n", part.len()).as_bytes())
                    .await?;
                socket.write_all(part).await?;
                socket.write_all(b"\r\n").await?;
                socket.flush().await?;
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            socket.write_all(b"0\r\n\r\n").await?;
            socket.flush().await?;
            Ok::<_, std::io::Error>(())
        });

        Ok(format!("http://{}", addr))
    }

    #[tokio::test]
    async fn test_stream_text_split_inside_character() -> Result<()> {
        let body = sse(&[json!({"choices": [{"index": 0, "delta": {"content": "Zürich"}}]})]);
        let split = body.find('ü').unwrap() + 1;
        let host = serve_split_body(body.into_bytes(), split).await?;

        let provider = OpenAiProvider::new(OpenAiProviderConfig {
            host,
            api_key: "test_api_key".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: None,
            max_tokens: None,
        })?;
        let fragments: Vec<StreamFragment> = provider
            .stream("system", &[Message::user().with_text("Where is ETH?")], &[])
            .await?
            .try_collect()
            .await?;

        assert_eq!(fragments, vec![StreamFragment::text("Zürich")]);
        Ok(())
    }

    #[tokio::test]
    async fn test_stream_server_error() {
        let (_server, provider) = setup_mock_server(500, String::new()).await;

        let result = provider
            .stream("system", &[Message::user().with_text("hi")], &[])
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_stream_error_event() -> Result<()> {
        let body = sse(&[json!({"error": {"message": "overloaded"}})]);
        let (_server, provider) = setup_mock_server(200, body).await;

        let result: Result<Vec<StreamFragment>> = provider
            .stream("system", &[Message::user().with_text("hi")], &[])
            .await?
            .try_collect()
            .await;
        assert!(result.unwrap_err().to_string().contains("overloaded"));
        Ok(())
    }
}
