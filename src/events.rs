//! Request and response payloads exchanged with the real-time transport.
//!
//! The transport delivers `rss:fetch` requests and relays the returned
//! [`FeedEvent`] to the requesting client as `rss:data` or `rss:error`.
use serde::{Deserialize, Serialize};

use crate::feed::{FeedError, UnifiedItem};
use crate::service::IngestionService;

pub const FETCH_EVENT: &str = "rss:fetch";
pub const DATA_EVENT: &str = "rss:data";
pub const ERROR_EVENT: &str = "rss:error";

/// Inbound `rss:fetch` payload.
///
/// `url` is kept loosely typed: a missing or non-string value is treated as
/// an empty URL rather than a malformed request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FetchRequest {
    #[serde(default)]
    url: serde_json::Value,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: serde_json::Value::String(url.into()),
        }
    }

    /// Builds a request from any JSON payload. Payloads that are not objects,
    /// or objects of the wrong shape, become a request without a URL.
    pub fn from_payload(payload: serde_json::Value) -> Self {
        if payload.is_object() {
            serde_json::from_value(payload).unwrap_or_default()
        } else {
            Self::default()
        }
    }

    pub fn url(&self) -> &str {
        self.url.as_str().unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemsPayload {
    pub items: Vec<UnifiedItem>,
}

/// Outbound event, serialized as `{"event": "...", "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload")]
pub enum FeedEvent {
    #[serde(rename = "rss:data")]
    Data { url: String, data: ItemsPayload },
    #[serde(rename = "rss:error")]
    Error {
        /// Omitted when the request itself carried no usable URL
        #[serde(skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        error: String,
    },
}

impl FeedEvent {
    pub fn name(&self) -> &'static str {
        match self {
            FeedEvent::Data { .. } => DATA_EVENT,
            FeedEvent::Error { .. } => ERROR_EVENT,
        }
    }
}

/// Serves one `rss:fetch` request, always producing exactly one event.
pub async fn handle_fetch_request(service: &IngestionService, request: &FetchRequest) -> FeedEvent {
    let url = request.url().trim();
    if url.is_empty() {
        return FeedEvent::Error {
            url: None,
            error: FeedError::InvalidInput.to_string(),
        };
    }

    match service.fetch_one(url).await {
        Ok(items) => FeedEvent::Data {
            url: url.to_string(),
            data: ItemsPayload {
                items: items.to_vec(),
            },
        },
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Feed fetch failed");
            FeedEvent::Error {
                url: Some(url.to_string()),
                error: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use crate::feed::{FeedFetcher, FetchOptions};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service() -> IngestionService {
        let fetcher = FeedFetcher::new(FetchOptions::default(), None).unwrap();
        IngestionService::new(fetcher, Arc::new(CacheStore::default()))
    }

    #[test]
    fn test_request_url_lenient() {
        let r: FetchRequest = serde_json::from_str(r#"{"url": " https://a/feed "}"#).unwrap();
        assert_eq!(r.url(), " https://a/feed ");
        let r: FetchRequest = serde_json::from_str(r#"{"url": 42}"#).unwrap();
        assert_eq!(r.url(), "");
        let r: FetchRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(r.url(), "");
    }

    #[test]
    fn test_non_object_payload_has_no_url() {
        for payload in [json!("abc"), json!(["https://a/feed"]), json!(null), json!(7)] {
            assert_eq!(FetchRequest::from_payload(payload).url(), "");
        }
        let r = FetchRequest::from_payload(json!({"url": "https://a/feed", "extra": true}));
        assert_eq!(r.url(), "https://a/feed");
    }

    #[tokio::test]
    async fn test_non_object_payload_yields_required_error() {
        let request = FetchRequest::from_payload(json!("abc"));
        let event = handle_fetch_request(&service(), &request).await;
        assert_eq!(
            event,
            FeedEvent::Error {
                url: None,
                error: "url is required".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_blank_request_error_has_no_url() {
        let event = handle_fetch_request(&service(), &FetchRequest::new("   ")).await;
        assert_eq!(event.name(), ERROR_EVENT);
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"event": "rss:error", "payload": {"error": "url is required"}})
        );
    }

    #[tokio::test]
    async fn test_data_event_shape() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<rss><channel><item><title>T</title><link>L</link><pubDate>P</pubDate><description>D</description></item></channel></rss>"#,
            ))
            .mount(&mock_server)
            .await;

        let url = format!("{}/feed", mock_server.uri());
        let event = handle_fetch_request(&service(), &FetchRequest::new(url.clone())).await;
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "event": "rss:data",
                "payload": {
                    "url": url,
                    "data": {"items": [
                        {"title": "T", "link": "L", "pubDate": "P", "contentSnippet": "D"}
                    ]}
                }
            })
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_error_event_carries_url() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let url = format!("{}/feed", mock_server.uri());
        let event = handle_fetch_request(&service(), &FetchRequest::new(url.clone())).await;
        assert_eq!(
            event,
            FeedEvent::Error {
                url: Some(url),
                error: "HTTP status 404".to_string(),
            }
        );
    }
}
