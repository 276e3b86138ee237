use async_trait::async_trait;
use lazy_static::lazy_static;
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

use super::extract::{element_text, USER_AGENT};
use super::ToolHandler;
use crate::errors::{ToolError, ToolResult};

pub const DUCKDUCKGO_HTML_URL: &str = "https://html.duckduckgo.com/html/";
pub const DEFAULT_MAX_RESULTS: usize = 5;
const MAX_RESULTS_LIMIT: usize = 10;

lazy_static! {
    static ref RESULT: Selector = Selector::parse(".result").unwrap();
    static ref RESULT_LINK: Selector = Selector::parse("a.result__a").unwrap();
    static ref RESULT_SNIPPET: Selector = Selector::parse(".result__snippet").unwrap();
}

/// A single search hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Resolve a DuckDuckGo result link to the page it points at
///
/// Result links go through a `/l/?uddg=<target>` redirect, sometimes protocol relative.
fn resolve_link(href: &str) -> Option<String> {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    let url = Url::parse(&absolute).ok()?;
    if let Some((_, target)) = url.query_pairs().find(|(key, _)| key == "uddg") {
        return Some(target.into_owned());
    }
    match url.scheme() {
        "http" | "https" => Some(url.to_string()),
        _ => None,
    }
}

/// Parse the results page of the DuckDuckGo HTML endpoint
pub fn parse_results(html: &str, limit: usize) -> Vec<SearchResult> {
    let document = Html::parse_document(html);

    document
        .select(&RESULT)
        .filter_map(|result| {
            let link = result.select(&RESULT_LINK).next()?;
            let url = link.value().attr("href").and_then(resolve_link)?;
            let snippet = result
                .select(&RESULT_SNIPPET)
                .next()
                .map(element_text)
                .unwrap_or_default();
            Some(SearchResult {
                title: element_text(link),
                url,
                snippet,
            })
        })
        .take(limit)
        .collect()
}

fn format_results(query: &str, results: &[SearchResult]) -> String {
    if results.is_empty() {
        return format!("No results found for '{query}'.");
    }
    let mut output = format!("Search results for '{query}':\n");
    for (i, result) in results.iter().enumerate() {
        output.push_str(&format!("\n{}. {}\n   {}\n", i + 1, result.title, result.url));
        if !result.snippet.is_empty() {
            output.push_str(&format!("   {}\n", result.snippet));
        }
    }
    output
}

/// Web search backed by the DuckDuckGo HTML endpoint
pub struct WebSearchTool {
    client: Client,
    endpoint: String,
    max_results: usize,
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new(DUCKDUCKGO_HTML_URL, DEFAULT_MAX_RESULTS, Duration::from_secs(20))
    }
}

impl WebSearchTool {
    pub fn new(endpoint: impl Into<String>, max_results: usize, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
            max_results: max_results.clamp(1, MAX_RESULTS_LIMIT),
        }
    }

    pub async fn search(&self, query: &str, limit: usize) -> ToolResult<Vec<SearchResult>> {
        let response = self
            .client
            .post(&self.endpoint)
            .form(&[("q", query), ("kl", "wt-wt")])
            .send()
            .await
            .map_err(|e| ToolError::ExecutionError(format!("search request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::ExecutionError(format!(
                "search endpoint returned status {status}"
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| ToolError::ExecutionError(format!("failed to read search results: {e}")))?;
        Ok(parse_results(&html, limit))
    }
}

#[async_trait]
impl ToolHandler for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web and return a numbered list of results with title, URL and snippet. \
         Use it for anything that depends on current or factual information."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query."
                },
                "max_results": {
                    "type": "integer",
                    "description": format!("How many results to return, at most {MAX_RESULTS_LIMIT}.")
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: Value) -> ToolResult<String> {
        let query = arguments
            .get("query")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("query must be a non-empty string".into()))?;
        let limit = arguments
            .get("max_results")
            .and_then(|v| v.as_u64())
            .map_or(self.max_results, |n| (n as usize).clamp(1, MAX_RESULTS_LIMIT));

        tracing::debug!(query, limit, "searching the web");
        let results = self.search(query, limit).await?;
        Ok(format_results(query, &results))
    }

    fn search_queries(&self, arguments: &Value) -> Vec<String> {
        arguments
            .get("query")
            .and_then(|v| v.as_str())
            .map(|q| vec![q.to_string()])
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RESULTS_PAGE: &str = r#"
<div class="results">
  <div class="result results_links results_links_deep web-result">
    <h2 class="result__title">
      <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fen.wikipedia.org%2Fwiki%2FEiffel_Tower&amp;rut=abc">Eiffel <b>Tower</b> - Wikipedia</a>
    </h2>
    <a class="result__snippet" href="//duckduckgo.com/l/?uddg=x">The tower is <b>330</b> metres (1,083 ft) tall.</a>
  </div>
  <div class="result results_links web-result">
    <h2 class="result__title">
      <a rel="nofollow" class="result__a" href="https://www.toureiffel.paris/en">Official website</a>
    </h2>
  </div>
  <div class="result results_links web-result">
    <a rel="nofollow" class="result__a" href="https://example.com/third">Third &amp; last</a>
    <a class="result__snippet">Third snippet</a>
  </div>
</div>"#;

    #[test]
    fn test_parse_results() {
        let results = parse_results(RESULTS_PAGE, 10);
        assert_eq!(
            results,
            vec![
                SearchResult {
                    title: "Eiffel Tower - Wikipedia".to_string(),
                    url: "https://en.wikipedia.org/wiki/Eiffel_Tower".to_string(),
                    snippet: "The tower is 330 metres (1,083 ft) tall.".to_string(),
                },
                SearchResult {
                    title: "Official website".to_string(),
                    url: "https://www.toureiffel.paris/en".to_string(),
                    snippet: String::new(),
                },
                SearchResult {
                    title: "Third & last".to_string(),
                    url: "https://example.com/third".to_string(),
                    snippet: "Third snippet".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_parse_results_skips_results_without_link() {
        let html = r#"<div class="result"><a class="result__snippet">orphan</a></div>
            <div class="result"><a class="result__a" href="javascript:void(0)">bad</a></div>
            <div class="result"><a class="result__a" href="http://example.org/">Kept</a></div>"#;
        let results = parse_results(html, 5);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "http://example.org/");
        assert_eq!(results[0].title, "Kept");
    }

    #[test]
    fn test_parse_results_respects_limit() {
        assert_eq!(parse_results(RESULTS_PAGE, 1).len(), 1);
        assert!(parse_results("<html>nothing here</html>", 5).is_empty());
    }

    #[test]
    fn test_format_results() {
        let results = parse_results(RESULTS_PAGE, 2);
        let text = format_results("eiffel tower height", &results);
        assert!(text.starts_with("Search results for 'eiffel tower height':"));
        assert!(text.contains("1. Eiffel Tower - Wikipedia\n   https://en.wikipedia.org/wiki/Eiffel_Tower"));
        assert!(text.contains("2. Official website"));
        assert_eq!(format_results("nothing", &[]), "No results found for 'nothing'.");
    }

    #[test]
    fn test_search_queries() {
        let tool = WebSearchTool::default();
        assert_eq!(tool.search_queries(&json!({"query": "q1"})), vec!["q1"]);
        assert!(tool.search_queries(&json!({})).is_empty());
    }

    #[tokio::test]
    async fn test_execute_against_endpoint() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/html/"))
            .and(body_string_contains("q=eiffel+tower+height"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RESULTS_PAGE))
            .expect(1)
            .mount(&server)
            .await;

        let tool = WebSearchTool::new(
            format!("{}/html/", server.uri()),
            DEFAULT_MAX_RESULTS,
            Duration::from_secs(5),
        );
        let output = tool
            .execute(json!({"query": "eiffel tower height", "max_results": 1}))
            .await?;
        assert!(output.contains("Eiffel Tower - Wikipedia"));
        assert!(!output.contains("Official website"));
        Ok(())
    }

    #[tokio::test]
    async fn test_execute_endpoint_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let tool = WebSearchTool::new(server.uri(), DEFAULT_MAX_RESULTS, Duration::from_secs(5));
        let err = tool.execute(json!({"query": "rust"})).await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionError(msg) if msg.contains("503")));
    }

    #[tokio::test]
    async fn test_execute_blank_query() {
        let tool = WebSearchTool::default();
        let err = tool.execute(json!({"query": "   "})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
