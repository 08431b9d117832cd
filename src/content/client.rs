//! Content-store API client.
//!
//! Fetches projects and compensators from a Strapi-style REST API. The base
//! URL and credentials come from an explicit [`ContentStoreConfig`]; nothing
//! is read from the environment here.

use crate::content::records::{CompensatorRecord, Envelope, ProjectRecord};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Page size used when listing projects for a compensator.
const PROJECTS_PAGE_SIZE: usize = 100;

/// Connection settings for the content store.
#[derive(Debug, Clone)]
pub struct ContentStoreConfig {
    /// Backend root, e.g. `https://cms.example.org`. `/api` is appended.
    pub base_url: String,
    pub timeout_seconds: u64,
    /// Extra attempts after a connect/timeout/5xx failure.
    pub retries: usize,
    /// Optional API token sent as a bearer token.
    pub api_token: Option<String>,
}

impl Default for ContentStoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:1337".to_string(),
            timeout_seconds: 30,
            retries: 2,
            api_token: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ContentStoreError {
    #[error("Failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Cannot connect to content store at {url}")]
    Connect {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {url} timed out after {seconds}s")]
    Timeout { url: String, seconds: u64 },

    #[error("Content store error {status} for {url}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("Request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to parse response from {url}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ContentStoreError {
    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ContentStoreError::Connect { .. } | ContentStoreError::Timeout { .. } => true,
            ContentStoreError::Status { status, .. } => status.is_server_error(),
            _ => false,
        }
    }

    fn is_not_found(&self) -> bool {
        matches!(self, ContentStoreError::Status { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}

/// Client for the content-store REST API.
pub struct ContentStoreClient {
    config: ContentStoreConfig,
    http_client: reqwest::Client,
}

impl ContentStoreClient {
    /// Create a client for the given content store.
    pub fn new(config: ContentStoreConfig) -> Result<Self, ContentStoreError> {
        info!("Content store: {}", config.base_url);

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(ContentStoreError::Client)?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Full URL for an API path such as `/projects`.
    pub fn endpoint(&self, path: &str) -> String {
        api_url(&self.config.base_url, path)
    }

    /// Fetch a published project with its contributions populated.
    pub async fn fetch_project(
        &self,
        document_id: &str,
    ) -> Result<Option<ProjectRecord>, ContentStoreError> {
        let envelope: Envelope<Vec<ProjectRecord>> =
            self.get("/projects", &project_query(document_id)).await?;

        Ok(envelope.data.and_then(|projects| projects.into_iter().next()))
    }

    /// Fetch a compensator with its contribution entries populated.
    ///
    /// Returns `None` when the content store has no such compensator.
    pub async fn fetch_compensator(
        &self,
        document_id: &str,
    ) -> Result<Option<CompensatorRecord>, ContentStoreError> {
        let path = format!("/compensators/{}", document_id);

        match self.get::<Envelope<CompensatorRecord>>(&path, &compensator_query()).await {
            Ok(envelope) => Ok(envelope.data),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fetch the projects that carry any of the given contribution entries.
    pub async fn fetch_projects_for_contributions(
        &self,
        contribution_ids: &[String],
    ) -> Result<Vec<ProjectRecord>, ContentStoreError> {
        if contribution_ids.is_empty() {
            return Ok(Vec::new());
        }

        let envelope: Envelope<Vec<ProjectRecord>> = self
            .get("/projects", &contribution_projects_query(contribution_ids))
            .await?;

        Ok(envelope.data.unwrap_or_default())
    }

    /// GET an API path, retrying transient failures.
    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T, ContentStoreError> {
        let url = self.endpoint(path);
        let mut attempt = 0;

        loop {
            match self.get_once(&url, query).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.config.retries => {
                    attempt += 1;
                    warn!("{} (attempt {}/{}), retrying", e, attempt, self.config.retries + 1);
                    tokio::time::sleep(Duration::from_millis(500 * attempt as u64)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<T, ContentStoreError> {
        debug!("GET {} ({} query params)", url, query.len());

        let mut request = self.http_client.get(url).query(query);
        if let Some(ref token) = self.config.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ContentStoreError::Timeout {
                    url: url.to_string(),
                    seconds: self.config.timeout_seconds,
                }
            } else if e.is_connect() {
                ContentStoreError::Connect {
                    url: url.to_string(),
                    source: e,
                }
            } else {
                ContentStoreError::Request {
                    url: url.to_string(),
                    source: e,
                }
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ContentStoreError::Status {
                url: url.to_string(),
                status,
                body,
            });
        }

        response.json().await.map_err(|e| ContentStoreError::Decode {
            url: url.to_string(),
            source: e,
        })
    }
}

/// Join a backend root and an API path.
pub fn api_url(base_url: &str, path: &str) -> String {
    format!("{}/api{}", base_url.trim_end_matches('/'), path)
}

fn param(key: &str, value: impl Into<String>) -> (String, String) {
    (key.to_string(), value.into())
}

/// Query for a single published project with everything the report needs.
pub fn project_query(document_id: &str) -> Vec<(String, String)> {
    vec![
        param("filters[documentId][$eq]", document_id),
        param("filters[publishedAt][$notNull]", "true"),
        param("populate[0]", "projectCompensators"),
        param("populate[1]", "projectCompensators.compensator"),
        param("populate[2]", "country"),
        param("populate[3]", "basin"),
    ]
}

/// Query for a compensator's contribution entries.
pub fn compensator_query() -> Vec<(String, String)> {
    vec![param("populate[0]", "projectCompensations")]
}

/// Query for projects linked to any of the given contribution entries.
pub fn contribution_projects_query(contribution_ids: &[String]) -> Vec<(String, String)> {
    vec![
        param(
            "filters[projectCompensators][documentId][$in]",
            contribution_ids.join(","),
        ),
        param("populate[0]", "projectCompensators"),
        param("pagination[pageSize]", PROJECTS_PAGE_SIZE.to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url() {
        assert_eq!(
            api_url("https://cms.example.org/", "/projects"),
            "https://cms.example.org/api/projects"
        );
        assert_eq!(
            api_url("http://localhost:1337", "/compensators/abc"),
            "http://localhost:1337/api/compensators/abc"
        );
    }

    #[test]
    fn test_project_query() {
        let query = project_query("p1");

        assert!(query.contains(&param("filters[documentId][$eq]", "p1")));
        assert!(query.contains(&param("populate[1]", "projectCompensators.compensator")));
    }

    #[test]
    fn test_contribution_projects_query() {
        let ids = vec!["pc1".to_string(), "pc2".to_string()];
        let query = contribution_projects_query(&ids);

        assert_eq!(query[0].1, "pc1,pc2");
        assert!(query.contains(&param("pagination[pageSize]", "100")));
    }

    #[test]
    fn test_retryable_errors() {
        let status = |code: u16| ContentStoreError::Status {
            url: "u".to_string(),
            status: StatusCode::from_u16(code).unwrap(),
            body: String::new(),
        };

        assert!(status(503).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(status(404).is_not_found());
        assert!(ContentStoreError::Timeout {
            url: "u".to_string(),
            seconds: 1
        }
        .is_retryable());
    }

    #[test]
    fn test_client_endpoint() {
        let client = ContentStoreClient::new(ContentStoreConfig::default()).unwrap();
        assert_eq!(client.endpoint("/projects"), "http://localhost:1337/api/projects");
    }
}
