//! Port trait definitions
//!
//! Fetch adapters implement these traits; the query coordinator only sees the
//! port.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ProjectDetail, ProjectId, ProjectRecord, SearchRequest};

/// Port for the remote project search
#[async_trait]
pub trait ProjectSource: Send + Sync {
    /// Return every project matching the request.
    ///
    /// An empty vector is a valid result. Transport, authorization and server
    /// failures are reported as errors.
    async fn search(&self, request: &SearchRequest) -> Result<Vec<ProjectRecord>>;

    /// Fetch the full detail view of a single project
    async fn get_project(&self, id: &ProjectId) -> Result<Option<ProjectDetail>>;
}
