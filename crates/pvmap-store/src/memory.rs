//! In-memory project source.
//!
//! Evaluates search requests locally with the same predicate the remote
//! procedure applies. Used for offline data files and in tests.

use async_trait::async_trait;
use pvmap_core::error::{PvMapError, Result};
use pvmap_core::models::{ProjectDetail, ProjectId, ProjectRecord, SearchRequest};
use pvmap_core::ports::ProjectSource;
use std::path::Path;
use std::sync::Arc;

/// In-memory implementation of ProjectSource
#[derive(Debug, Clone)]
pub struct MemoryProjectSource {
    projects: Arc<Vec<ProjectDetail>>,
}

impl MemoryProjectSource {
    pub fn from_details(projects: Vec<ProjectDetail>) -> Self {
        Self { projects: Arc::new(projects) }
    }

    pub fn from_records(records: Vec<ProjectRecord>) -> Self {
        Self::from_details(records.into_iter().map(ProjectDetail::from).collect())
    }

    /// Load projects from a JSON array of project objects.
    ///
    /// Each object carries the search fields and optionally the detail fields
    /// (address, award data).
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let projects: Vec<ProjectDetail> = serde_json::from_str(&content).map_err(|e| {
            PvMapError::Serialization(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        tracing::debug!(path = %path.display(), count = projects.len(), "Loaded project data");
        Ok(Self::from_details(projects))
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

#[async_trait]
impl ProjectSource for MemoryProjectSource {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<ProjectRecord>> {
        let results: Vec<ProjectRecord> = self
            .projects
            .iter()
            .map(|detail| &detail.record)
            .filter(|record| request.matches(record))
            .cloned()
            .collect();

        tracing::debug!(total = self.projects.len(), matched = results.len(), "Evaluated search locally");
        Ok(results)
    }

    async fn get_project(&self, id: &ProjectId) -> Result<Option<ProjectDetail>> {
        Ok(self.projects.iter().find(|detail| &detail.record.id == id).cloned())
    }
}
