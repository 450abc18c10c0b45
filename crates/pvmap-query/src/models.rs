use pvmap_core::models::{FilterState, SearchRequest, Viewport};
use pvmap_geo::{project, resolve_click, ClickTarget, ClusterIndex, RenderItem};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Issuance sequence number of a remote search.
///
/// Tokens increase strictly with every issued query; only a completion
/// carrying the latest token is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct QueryToken(pub u64);

impl fmt::Display for QueryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A search handed to the project source
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedQuery {
    pub token: QueryToken,
    pub request: SearchRequest,
}

/// Outcome of feeding a finished search back into the state
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// The result replaced the displayed project set
    Applied { token: QueryToken, count: usize },
    /// A newer query was issued meanwhile; the result was dropped
    Superseded { token: QueryToken },
    /// The latest query failed; the previous project set stays displayed
    Failed { token: QueryToken, reason: String },
}

/// Events produced by the map
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    /// The map settled after a pan or zoom
    ViewportIdle(Viewport),
    /// The user committed a new filter
    FilterChanged(FilterState),
}

/// Snapshot of everything the map needs to draw
#[derive(Debug, Clone)]
pub struct MapView {
    pub filter: FilterState,
    pub viewport: Option<Viewport>,
    /// Index over the applied project set
    pub index: Arc<ClusterIndex>,
    /// Query whose result is held by `index`
    pub applied: Option<QueryToken>,
    /// Most recently issued query
    pub latest_issued: Option<QueryToken>,
    /// A debounce window is open
    pub pending: bool,
    pub loading: bool,
    pub last_error: Option<String>,
    /// Map events processed so far, accepted or not
    pub events_seen: u64,
}

impl MapView {
    /// Render items for the current viewport; empty until the map reported bounds
    pub fn render_items(&self) -> Vec<RenderItem<'_>> {
        match &self.viewport {
            Some(viewport) => project(&self.index, viewport),
            None => Vec::new(),
        }
    }

    pub fn resolve_click(&self, item: &RenderItem<'_>) -> Option<ClickTarget> {
        resolve_click(&self.index, item)
    }

    /// Number of projects in the applied result set
    pub fn project_count(&self) -> usize {
        self.index.len()
    }
}
