//! Fetch collaborator for thread listing documents.
//!
//! [`ThreadFetcher`] is the seam between ingestion and the live content API:
//! production uses the reqwest-backed [`HttpThreadFetcher`], tests inject a
//! stub serving canned documents.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::SourceConfig;
use crate::error::ArchiveError;

/// Addresses one thread listing document: a root page, or a continuation
/// page rooted at an anchor comment.
#[derive(Debug, Clone)]
pub struct ThreadRequest {
    pub sub: String,
    pub thread_id: String,
    /// External id of the comment the requested page continues from.
    pub anchor: Option<String>,
}

impl ThreadRequest {
    pub fn root(sub: &str, thread_id: &str) -> Self {
        Self {
            sub: sub.to_string(),
            thread_id: thread_id.to_string(),
            anchor: None,
        }
    }

    pub fn continuation(sub: &str, thread_id: &str, anchor: &str) -> Self {
        Self {
            sub: sub.to_string(),
            thread_id: thread_id.to_string(),
            anchor: Some(anchor.to_string()),
        }
    }
}

#[async_trait]
pub trait ThreadFetcher: Send + Sync {
    /// Fetch the raw listing document for `request`.
    async fn fetch(&self, request: &ThreadRequest) -> Result<Vec<u8>, ArchiveError>;
}

/// HTTP fetcher against the live content API. Carries its own fixed timeout,
/// independent of any transaction awaiting the result.
pub struct HttpThreadFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpThreadFetcher {
    pub fn new(source: &SourceConfig) -> Result<Self, ArchiveError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(source.timeout_secs))
            .user_agent(source.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            base_url: source.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, request: &ThreadRequest) -> String {
        match &request.anchor {
            Some(anchor) => format!(
                "{}/r/{}/comments/{}/comment/{}.json",
                self.base_url, request.sub, request.thread_id, anchor
            ),
            None => format!(
                "{}/r/{}/comments/{}.json",
                self.base_url, request.sub, request.thread_id
            ),
        }
    }
}

#[async_trait]
impl ThreadFetcher for HttpThreadFetcher {
    async fn fetch(&self, request: &ThreadRequest) -> Result<Vec<u8>, ArchiveError> {
        let response = self.client.get(self.url_for(request)).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ArchiveError::UpstreamStatus(status.as_u16()));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher() -> HttpThreadFetcher {
        HttpThreadFetcher::new(&SourceConfig {
            base_url: "https://example.com/".to_string(),
            user_agent: "test-agent".to_string(),
            timeout_secs: 1,
        })
        .unwrap()
    }

    #[test]
    fn test_root_url() {
        let url = fetcher().url_for(&ThreadRequest::root("rust", "abc123"));
        assert_eq!(url, "https://example.com/r/rust/comments/abc123.json");
    }

    #[test]
    fn test_continuation_url() {
        let url = fetcher().url_for(&ThreadRequest::continuation("rust", "abc123", "c9"));
        assert_eq!(
            url,
            "https://example.com/r/rust/comments/abc123/comment/c9.json"
        );
    }
}
