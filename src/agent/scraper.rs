//! Content retrieval: turns a query into raw records.

use crate::config::ScraperConfig;
use crate::error::ScrapeError;
use crate::models::{Query, RawRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Fetches content for a single query.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Fetch records for `query`. No results is `Ok(vec![])`, not an error.
    async fn scrape(&self, query: &Query) -> Result<Vec<RawRecord>, ScrapeError>;

    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Longest one `scrape` call may take when each attempt is allowed
    /// `attempt_timeout`. Backends that retry internally widen it to cover
    /// every attempt and the backoff between them.
    fn call_budget(&self, attempt_timeout: Duration) -> Duration {
        attempt_timeout
    }
}

/// Tavily search API request body.
#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    search_depth: &'static str,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    include_domains: &'a [String],
}

/// Tavily search API response body.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    url: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: String,
}

/// Scraper backed by the Tavily web search API.
pub struct TavilyScraper {
    http_client: reqwest::Client,
    api_url: String,
    api_key: String,
    max_results: usize,
    include_domains: Vec<String>,
    retries: usize,
    timeout_seconds: u64,
    backoff: Duration,
}

impl TavilyScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self, ScrapeError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ScrapeError::Unreachable("no search API key configured".to_string()))?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ScrapeError::Unreachable(e.to_string()))?;

        Ok(Self {
            http_client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key,
            max_results: config.max_results,
            include_domains: config.include_domains.clone(),
            retries: config.retries,
            timeout_seconds: config.timeout_seconds,
            backoff: Duration::from_secs(1),
        })
    }

    async fn search_once(&self, query: &Query) -> Result<Vec<RawRecord>, ScrapeError> {
        let url = format!("{}/search", self.api_url);
        let request = SearchRequest {
            api_key: &self.api_key,
            query: &query.text,
            max_results: self.max_results,
            search_depth: "basic",
            include_domains: &self.include_domains,
        };

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ScrapeError::Timeout(self.timeout_seconds)
                } else {
                    ScrapeError::Unreachable(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ScrapeError::Malformed(e.to_string()))?;

        if !status.is_success() {
            return Err(ScrapeError::Api {
                status: status.as_u16(),
                body,
            });
        }

        parse_search_response(query, &body)
    }
}

#[async_trait]
impl Scraper for TavilyScraper {
    async fn scrape(&self, query: &Query) -> Result<Vec<RawRecord>, ScrapeError> {
        let mut backoff = self.backoff;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.search_once(query).await {
                Ok(records) => {
                    debug!("Query '{}' returned {} records", query, records.len());
                    return Ok(records);
                }
                Err(e) if e.is_transient() && attempt <= self.retries => {
                    warn!(
                        "Search attempt {} for '{}' failed: {}. Retrying in {:?}",
                        attempt, query, e, backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn name(&self) -> &str {
        "tavily"
    }

    fn call_budget(&self, attempt_timeout: Duration) -> Duration {
        let attempts = self.retries as u32 + 1;
        let backoff: Duration = (0..self.retries as u32)
            .map(|i| self.backoff * 2u32.saturating_pow(i))
            .sum();
        attempt_timeout * attempts + backoff
    }
}

/// Convert a search API body into records. Results without content are skipped.
fn parse_search_response(query: &Query, body: &str) -> Result<Vec<RawRecord>, ScrapeError> {
    let parsed: SearchResponse =
        serde_json::from_str(body).map_err(|e| ScrapeError::Malformed(e.to_string()))?;

    Ok(parsed
        .results
        .into_iter()
        .filter(|r| !r.content.trim().is_empty())
        .map(|r| {
            let record = RawRecord::new(query, r.url, r.content.trim());
            match r.title.filter(|t| !t.trim().is_empty()) {
                Some(title) => record.with_title(title),
                None => record,
            }
        })
        .collect())
}

/// Deterministic sample content for development without credentials.
#[derive(Debug, Clone)]
pub struct OfflineScraper {
    max_results: usize,
}

impl OfflineScraper {
    pub fn new(config: &ScraperConfig) -> Self {
        Self {
            max_results: config.max_results,
        }
    }
}

#[async_trait]
impl Scraper for OfflineScraper {
    async fn scrape(&self, query: &Query) -> Result<Vec<RawRecord>, ScrapeError> {
        let samples = [
            format!("I hate waiting on hold when dealing with {}", query.text),
            format!("The chatbot is useless for {}", query.text),
            format!("{} made my workflow easier", query.text),
        ];

        Ok(samples
            .into_iter()
            .take(self.max_results)
            .enumerate()
            .map(|(i, body)| {
                RawRecord::new(query, format!("offline://sample/{}/{}", query.priority, i), body)
            })
            .collect())
    }

    fn name(&self) -> &str {
        "offline"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_response() {
        let query = Query::new("earbuds battery complaints", 0);
        let body = r#"{
            "query": "earbuds battery complaints",
            "results": [
                {"url": "https://reddit.com/r/earbuds/1", "title": "Battery rant", "content": "Battery dies in an hour.", "score": 0.9},
                {"url": "https://example.com/empty", "title": "", "content": "   "},
                {"url": "https://forum.example/2", "content": "Case won't charge"}
            ]
        }"#;

        let records = parse_search_response(&query, body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].source, "https://reddit.com/r/earbuds/1");
        assert_eq!(records[0].title.as_deref(), Some("Battery rant"));
        assert_eq!(records[0].query, "earbuds battery complaints");
        assert_eq!(records[1].title, None);
    }

    #[test]
    fn test_parse_malformed_response() {
        let query = Query::new("q", 0);
        let err = parse_search_response(&query, "<html>502</html>").unwrap_err();
        assert!(matches!(err, ScrapeError::Malformed(_)));

        let err = parse_search_response(&query, r#"{"answer": null}"#).unwrap_err();
        assert!(matches!(err, ScrapeError::Malformed(_)));
    }

    #[test]
    fn test_request_omits_empty_domains() {
        let request = SearchRequest {
            api_key: "k",
            query: "q",
            max_results: 5,
            search_depth: "basic",
            include_domains: &[],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("include_domains").is_none());
        assert_eq!(json["max_results"], 5);
    }

    #[test]
    fn test_tavily_requires_api_key() {
        let config = ScraperConfig::default();
        assert!(TavilyScraper::new(&config).is_err());
    }

    #[tokio::test]
    async fn test_tavily_unreachable_without_retries() {
        let config = ScraperConfig {
            api_url: "http://127.0.0.1:9".to_string(),
            api_key: Some("tvly-test".to_string()),
            retries: 0,
            timeout_seconds: 2,
            ..ScraperConfig::default()
        };
        let scraper = TavilyScraper::new(&config).unwrap();
        let err = scraper.scrape(&Query::new("q", 0)).await.unwrap_err();
        assert!(matches!(
            err,
            ScrapeError::Unreachable(_) | ScrapeError::Timeout(_)
        ));
    }

    #[test]
    fn test_call_budget_covers_retries() {
        let config = ScraperConfig {
            api_key: Some("tvly-test".to_string()),
            retries: 3,
            ..ScraperConfig::default()
        };
        let scraper = TavilyScraper::new(&config).unwrap();
        // 4 attempts of 10s plus 1s + 2s + 4s of backoff
        assert_eq!(
            scraper.call_budget(Duration::from_secs(10)),
            Duration::from_secs(47)
        );

        let offline = OfflineScraper::new(&config);
        assert_eq!(
            offline.call_budget(Duration::from_secs(10)),
            Duration::from_secs(10)
        );
    }

    #[tokio::test]
    async fn test_tavily_retries_after_attempt_timeout() {
        let config = ScraperConfig {
            api_url: test_support::stalling_search_server().await,
            api_key: Some("tvly-test".to_string()),
            retries: 3,
            timeout_seconds: 1,
            ..ScraperConfig::default()
        };
        let scraper = TavilyScraper::new(&config).unwrap();

        let records = scraper.scrape(&Query::new("earbuds complaints", 0)).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source, "https://forum.example/1");
    }

    #[tokio::test]
    async fn test_offline_scraper_is_deterministic() {
        let scraper = OfflineScraper::new(&ScraperConfig::default());
        let query = Query::new("customer service", 1);

        let first = scraper.scrape(&query).await.unwrap();
        let second = scraper.scrape(&query).await.unwrap();

        assert_eq!(first.len(), 3);
        assert_eq!(first[0].body, "I hate waiting on hold when dealing with customer service");
        assert_eq!(first[2].source, "offline://sample/1/2");
        let bodies = |rs: &[RawRecord]| rs.iter().map(|r| r.body.clone()).collect::<Vec<_>>();
        assert_eq!(bodies(&first), bodies(&second));
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// Starts a search API on a local port that never answers its first
    /// connection and answers the second with one result. Returns the base URL.
    pub(crate) async fn stalling_search_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (_stalled, _) = listener.accept().await.unwrap();
            let (mut stream, _) = listener.accept().await.unwrap();
            read_request(&mut stream).await;

            let body = r#"{"results": [{"url": "https://forum.example/1", "title": "Hinge", "content": "The case hinge snapped after a week"}]}"#;
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            let _ = stream.shutdown().await;
        });

        format!("http://{}", addr)
    }

    /// Read one HTTP request (headers plus `Content-Length` body).
    async fn read_request(stream: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);

            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let headers = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let body_len = headers
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + body_len {
                    return;
                }
            }
        }
    }
}
