//! Supabase REST project source.
//!
//! Searches go through the `pv_map_search` remote procedure; single projects
//! are read from the `pv_projects` table. Both calls authenticate with the
//! project's anonymous key.

use async_trait::async_trait;
use pvmap_core::config::{LayeredConfig, RemoteConfig};
use pvmap_core::error::{PvMapError, Result};
use pvmap_core::models::{ProjectDetail, ProjectId, ProjectRecord, SearchRequest};
use pvmap_core::ports::ProjectSource;
use reqwest::{RequestBuilder, Response, StatusCode, Url};

/// Name of the remote search procedure
pub const SEARCH_PROCEDURE: &str = "pv_map_search";

/// Table holding the full project rows
pub const PROJECT_TABLE: &str = "pv_projects";

/// Supabase implementation of ProjectSource
pub struct SupabaseSource {
    /// Project URL without trailing slash (e.g., "https://xyz.supabase.co")
    base_url: String,

    /// Anonymous API key sent as `apikey` and bearer token
    anon_key: String,

    /// HTTP client carrying the request timeout
    client: reqwest::Client,
}

impl SupabaseSource {
    pub fn new(remote: RemoteConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(remote.timeout).build().map_err(|e| {
            PvMapError::ConfigInvalid {
                key: "request_timeout_secs".to_string(),
                reason: format!("Failed to build HTTP client: {}", e),
            }
        })?;

        Ok(Self {
            base_url: remote.endpoint_url.trim_end_matches('/').to_string(),
            anon_key: remote.anon_key,
            client,
        })
    }

    /// Create from layered configuration; fails when URL or key is missing
    pub fn from_config(config: &LayeredConfig) -> Result<Self> {
        Self::new(config.require_remote()?)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn search_url(&self) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, SEARCH_PROCEDURE)
    }

    fn project_url(&self, id: &ProjectId) -> Result<Url> {
        Url::parse_with_params(
            &format!("{}/rest/v1/{}", self.base_url, PROJECT_TABLE),
            &[("id", format!("eq.{}", id)), ("select", "*".to_string())],
        )
        .map_err(|e| PvMapError::ConfigInvalid {
            key: "endpoint_url".to_string(),
            reason: format!("'{}' is not a valid URL: {}", self.base_url, e),
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("apikey", &self.anon_key).bearer_auth(&self.anon_key)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self.authorize(request).send().await.map_err(|e| {
            let reason = if e.is_timeout() {
                format!("Request to {} timed out", self.base_url)
            } else {
                format!("Failed to connect to {}: {}", self.base_url, e)
            };
            PvMapError::QueryFailed { reason }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(%status, error = %e, "Failed to read error response body");
                String::new()
            }
        };
        Err(classify_failure(status, &body))
    }
}

/// Map a non-success HTTP status to the error taxonomy
fn classify_failure(status: StatusCode, body: &str) -> PvMapError {
    let detail = if body.trim().is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, body.trim())
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            PvMapError::Unauthorized { reason: detail }
        }
        _ => PvMapError::QueryFailed { reason: format!("Remote API error ({})", detail) },
    }
}

#[async_trait]
impl ProjectSource for SupabaseSource {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<ProjectRecord>> {
        let response = self.send(self.client.post(self.search_url()).json(request)).await?;

        // the procedure answers `null` instead of `[]` when nothing matches
        let records: Option<Vec<ProjectRecord>> = response.json().await.map_err(|e| {
            PvMapError::Serialization(format!("Failed to parse search response: {}", e))
        })?;
        let records = records.unwrap_or_default();

        tracing::debug!(count = records.len(), "Remote search returned");
        Ok(records)
    }

    async fn get_project(&self, id: &ProjectId) -> Result<Option<ProjectDetail>> {
        let url = self.project_url(id)?;
        let response = self.send(self.client.get(url)).await?;

        let mut rows: Vec<ProjectDetail> = response.json().await.map_err(|e| {
            PvMapError::Serialization(format!("Failed to parse project {}: {}", id, e))
        })?;

        if rows.len() > 1 {
            tracing::warn!(%id, rows = rows.len(), "Project id matched several rows, using the first");
        }
        Ok(if rows.is_empty() { None } else { Some(rows.swap_remove(0)) })
    }
}
