use async_trait::async_trait;
use reqwest::Client;
use scraper::node::Node;
use scraper::{ElementRef, Html};
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

use super::ToolHandler;
use crate::errors::{ToolError, ToolResult};

pub const DEFAULT_MAX_CHARS: usize = 8_000;
pub(crate) const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) seeker/1.0";

// Never rendered as page text
const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "head", "svg", "template"];
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "hr", "h1", "h2", "h3", "h4", "h5", "h6", "li", "ul", "ol", "tr", "table",
    "section", "article", "header", "footer", "nav", "main", "aside", "blockquote", "pre",
];

/// Collapse runs of whitespace, including non-breaking spaces, into single spaces
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text of an element and its descendants on one line
pub(crate) fn element_text(element: ElementRef) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

fn collect_text(element: ElementRef, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if HIDDEN_TAGS.contains(&name) {
                    continue;
                }
                let block = BLOCK_TAGS.contains(&name);
                if block {
                    out.push('\n');
                }
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, out);
                }
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

/// Convert an HTML page into readable plain text, one block per line
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut text = String::new();
    collect_text(document.root_element(), &mut text);

    text.lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}\n[content truncated]", &text[..end]),
        None => text.to_string(),
    }
}

/// Fetches a web page and returns its readable text
pub struct ExtractContentTool {
    client: Client,
    max_chars: usize,
}

impl Default for ExtractContentTool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHARS, Duration::from_secs(20))
    }
}

impl ExtractContentTool {
    pub fn new(max_chars: usize, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self { client, max_chars }
    }

    fn parse_url(arguments: &Value) -> ToolResult<Url> {
        let raw = arguments
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("url parameter required".into()))?;
        let url = Url::parse(raw)
            .map_err(|e| ToolError::InvalidArguments(format!("invalid url '{raw}': {e}")))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(ToolError::InvalidArguments(format!(
                "unsupported url scheme '{scheme}', expected http or https"
            ))),
        }
    }
}

#[async_trait]
impl ToolHandler for ExtractContentTool {
    fn name(&self) -> &str {
        "extract_content"
    }

    fn description(&self) -> &str {
        "Fetch a web page and return its main text content. Use it on the most relevant \
         links returned by web_search to read the details behind a result."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The absolute http(s) URL of the page to read."
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, arguments: Value) -> ToolResult<String> {
        let url = Self::parse_url(&arguments)?;
        tracing::debug!(url = url.as_str(), "extracting page content");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ToolError::ExecutionError(format!("failed to fetch {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::ExecutionError(format!(
                "fetching {url} returned status {status}"
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| ToolError::ExecutionError(format!("failed to read {url}: {e}")))?;

        let text = html_to_text(&html);
        if text.is_empty() {
            return Ok(format!("The page at {url} has no readable text."));
        }
        Ok(truncate_chars(&text, self.max_chars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head><title>Eiffel Tower</title><style>body { color: red; }</style></head>
  <body>
    <!-- navigation -->
    <nav><a href="/">Home</a></nav>
    <h1>Eiffel   Tower</h1>
    <p>The tower is <b>330&nbsp;metres</b> tall &amp; was built in 1889.</p>
    <script>var tracking = "<p>not content</p>";</script>
    <p>Fran&#231;ais &#x263A; &lt;tag&gt;</p>
  </body>
</html>"#;

    #[test]
    fn test_html_to_text() {
        let text = html_to_text(PAGE);
        assert_eq!(
            text,
            "Home\nEiffel Tower\nThe tower is 330 metres tall & was built in 1889.\nFrançais ☺ <tag>"
        );
    }

    #[test]
    fn test_html_to_text_skips_hidden_blocks() {
        let html = "<body><noscript>enable js</noscript><div>Visible<template>no</template></div>\
                    <svg><text>icon</text></svg><pre>a\u{a0}\u{a0}b</pre></body>";
        assert_eq!(html_to_text(html), "Visible\na b");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  Rust \u{a0}&\n\t Cargo "), "Rust & Cargo");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("héllo", 10), "héllo");
        assert_eq!(truncate_chars("héllo", 2), "hé\n[content truncated]");
    }

    #[tokio::test]
    async fn test_extract_page() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/eiffel"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let tool = ExtractContentTool::default();
        let text = tool
            .execute(json!({"url": format!("{}/eiffel", server.uri())}))
            .await?;
        assert!(text.contains("330 metres tall"));
        assert!(!text.contains("tracking"));
        Ok(())
    }

    #[tokio::test]
    async fn test_extract_truncates() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>abcdefghij</p>"))
            .mount(&server)
            .await;

        let tool = ExtractContentTool::new(4, Duration::from_secs(5));
        let text = tool.execute(json!({"url": server.uri()})).await?;
        assert_eq!(text, "abcd\n[content truncated]");
        Ok(())
    }

    #[tokio::test]
    async fn test_extract_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let tool = ExtractContentTool::default();
        let err = tool
            .execute(json!({"url": format!("{}/missing", server.uri())}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionError(msg) if msg.contains("404")));
    }

    #[tokio::test]
    async fn test_extract_rejects_non_http_url() {
        let tool = ExtractContentTool::default();
        let err = tool
            .execute(json!({"url": "file:///etc/passwd"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
