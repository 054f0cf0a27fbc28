//! HTTP client for the user search API and avatar downloads

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;

use super::types::{Entity, SearchResponse};
use crate::config::Config;
use crate::error::{ConfigError, FetchError};

/// The remote capability both controllers consume.
///
/// Implementations are stateless from the caller's point of view and may be
/// invoked concurrently.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// One GET against the search endpoint, returning hits in relevance order.
    async fn search_entities(&self, query: &str) -> Result<Vec<Entity>, FetchError>;

    /// One GET against `uri`; only a 2xx response yields bytes.
    async fn fetch_bytes(&self, uri: &str) -> Result<Vec<u8>, FetchError>;
}

/// reqwest-backed [`RemoteClient`]
pub struct HttpClient {
    client: Client,
    search_url: String,
}

impl HttpClient {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| ConfigError::Invalid {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            search_url: config.search_url(),
        })
    }

    async fn get_success(&self, request: reqwest::RequestBuilder) -> Result<Vec<u8>, FetchError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl RemoteClient for HttpClient {
    async fn search_entities(&self, query: &str) -> Result<Vec<Entity>, FetchError> {
        let request = self
            .client
            .get(&self.search_url)
            .query(&[("q", query)])
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/vnd.github+json");

        let body = self.get_success(request).await?;
        let response: SearchResponse = serde_json::from_slice(&body)?;
        if response.incomplete_results {
            tracing::debug!("Search for {:?} returned incomplete results", query);
        }
        Ok(response.items)
    }

    async fn fetch_bytes(&self, uri: &str) -> Result<Vec<u8>, FetchError> {
        self.get_success(self.client.get(uri)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::types::EntityId;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answers exactly one request and hands back its request head.
    async fn serve_once(status: &'static str, body: Vec<u8>) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }

            let reply = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                body.len()
            );
            stream.write_all(reply.as_bytes()).await.unwrap();
            stream.write_all(&body).await.unwrap();
            stream.shutdown().await.ok();
            String::from_utf8_lossy(&head).to_string()
        });

        (base, handle)
    }

    fn client_for(base: &str) -> HttpClient {
        let config = Config {
            api_base: base.to_string(),
            timeout_ms: 2_000,
            ..Config::default()
        };
        HttpClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_search_sends_query_and_decodes_items() {
        let body = br#"{"total_count":2,"incomplete_results":false,"items":[
            {"login":"karthik","id":1,"avatar_url":"https://a/1"},
            {"login":"karthik2","id":2,"avatar_url":"https://a/2"}]}"#;
        let (base, server) = serve_once("200 OK", body.to_vec()).await;

        let items = client_for(&base).search_entities("karthik s").await.unwrap();
        let ids: Vec<EntityId> = items.iter().map(|e| e.id).collect();
        assert_eq!(ids, [EntityId(1), EntityId(2)]);

        let head = server.await.unwrap().to_lowercase();
        assert!(head.starts_with("get /search/users?q=karthik+s http/1.1"), "{}", head);
        assert!(head.contains("user-agent: usersearch/"));
        assert!(head.contains("content-type: application/json"));
    }

    #[tokio::test]
    async fn test_search_bad_payload_is_decode_error() {
        let (base, _server) = serve_once("200 OK", b"<html>rate limited</html>".to_vec()).await;
        let err = client_for(&base).search_entities("x").await.unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_search_error_status() {
        let (base, _server) = serve_once("403 Forbidden", b"{}".to_vec()).await;
        let err = client_for(&base).search_entities("x").await.unwrap_err();
        assert_eq!(err, FetchError::HttpStatus(403));
    }

    #[tokio::test]
    async fn test_fetch_bytes() {
        let (base, server) = serve_once("200 OK", vec![1, 2, 3]).await;
        let client = client_for("http://unused.invalid");

        let bytes = client.fetch_bytes(&format!("{}/u/1?v=4", base)).await.unwrap();
        assert_eq!(bytes, [1, 2, 3]);
        assert!(server.await.unwrap().starts_with("GET /u/1?v=4 "));
    }

    #[tokio::test]
    async fn test_fetch_bytes_not_found() {
        let (base, _server) = serve_once("404 Not Found", Vec::new()).await;
        let err = client_for(&base).fetch_bytes(&format!("{}/missing", base)).await.unwrap_err();
        assert_eq!(err, FetchError::HttpStatus(404));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let err = client_for(&base).fetch_bytes(&format!("{}/a.png", base)).await.unwrap_err();
        assert!(matches!(err, FetchError::Network(_)), "{:?}", err);
    }
}
