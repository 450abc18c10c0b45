//! Query coordination state.
//!
//! `QueryState` owns the filter, the last reported viewport, the debounce
//! deadline and the applied cluster index. It never performs I/O or reads
//! the clock itself: callers pass `now` in and drive issued queries to
//! completion, which keeps every transition testable without a runtime.

use pvmap_core::models::{FilterState, ProjectRecord, Viewport};
use pvmap_core::Result;
use pvmap_geo::{ClusterIndex, ClusterOptions};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::models::{Completion, IssuedQuery, MapView, QueryToken};

#[derive(Debug)]
pub struct QueryState {
    filter: FilterState,
    viewport: Option<Viewport>,
    quiet_window: Duration,
    deadline: Option<Instant>,
    last_token: u64,
    latest_issued: Option<QueryToken>,
    applied: Option<QueryToken>,
    options: ClusterOptions,
    index: Arc<ClusterIndex>,
    loading: bool,
    last_error: Option<String>,
    events_seen: u64,
}

impl QueryState {
    pub fn new(filter: FilterState, options: ClusterOptions, quiet_window: Duration) -> Self {
        Self {
            filter,
            viewport: None,
            quiet_window,
            deadline: None,
            last_token: 0,
            latest_issued: None,
            applied: None,
            options,
            index: Arc::new(ClusterIndex::empty(options)),
            loading: false,
            last_error: None,
            events_seen: 0,
        }
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn viewport(&self) -> Option<&Viewport> {
        self.viewport.as_ref()
    }

    /// When the pending debounce window closes, if one is open
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn index(&self) -> Arc<ClusterIndex> {
        Arc::clone(&self.index)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn latest_issued(&self) -> Option<QueryToken> {
        self.latest_issued
    }

    /// Record the map's bounds after it settled and restart the debounce window.
    ///
    /// Malformed bounds are dropped with a warning and leave the state as it
    /// was. Returns whether the viewport was accepted.
    pub fn viewport_idle(&mut self, viewport: Viewport, now: Instant) -> bool {
        self.events_seen += 1;
        if let Err(e) = viewport.bbox.validate() {
            tracing::warn!(error = %e, "Ignoring malformed viewport");
            return false;
        }

        self.viewport = Some(viewport);
        self.schedule(now);
        true
    }

    /// Commit a new filter. Unchanged filters do not schedule a query.
    pub fn set_filter(&mut self, filter: FilterState, now: Instant) -> bool {
        self.events_seen += 1;
        if filter == self.filter {
            return false;
        }

        self.filter = filter;
        self.schedule(now);
        true
    }

    fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.quiet_window);
    }

    /// Issue the pending query once the debounce window has closed.
    ///
    /// Nothing is issued before the map has reported a viewport; the pending
    /// window is simply discarded and the first idle event reopens it.
    pub fn poll(&mut self, now: Instant) -> Option<IssuedQuery> {
        let deadline = self.deadline?;
        if now < deadline {
            return None;
        }
        self.deadline = None;

        let Some(viewport) = self.viewport else {
            tracing::debug!("Debounce elapsed before the first viewport, nothing to query");
            return None;
        };

        self.last_token += 1;
        let token = QueryToken(self.last_token);
        self.latest_issued = Some(token);
        self.loading = true;

        let request = self.filter.to_request(&viewport.bbox);
        tracing::info!(%token, zoom = viewport.zoom, "Issuing project search");

        Some(IssuedQuery { token, request })
    }

    /// Feed a finished search back in.
    ///
    /// Only the latest-issued token may touch the displayed state; anything
    /// older is discarded whether it succeeded or failed.
    pub fn complete(&mut self, token: QueryToken, result: Result<Vec<ProjectRecord>>) -> Completion {
        if Some(token) != self.latest_issued {
            tracing::debug!(%token, latest = ?self.latest_issued, "Discarding superseded result");
            return Completion::Superseded { token };
        }

        self.loading = false;
        match result {
            Ok(records) => {
                let count = records.len();
                self.index = Arc::new(ClusterIndex::build(records, self.options));
                self.applied = Some(token);
                self.last_error = None;
                tracing::info!(%token, count, "Applied project search result");
                Completion::Applied { token, count }
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(%token, error = %reason, "Project search failed, keeping previous results");
                self.last_error = Some(reason.clone());
                Completion::Failed { token, reason }
            }
        }
    }

    /// Snapshot for rendering
    pub fn view(&self) -> MapView {
        MapView {
            filter: self.filter.clone(),
            viewport: self.viewport,
            index: self.index(),
            applied: self.applied,
            latest_issued: self.latest_issued,
            pending: self.deadline.is_some(),
            loading: self.loading,
            last_error: self.last_error.clone(),
            events_seen: self.events_seen,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pvmap_core::models::{BoundingBox, ProjectStatus, StatusSelection};
    use pvmap_core::PvMapError;

    const QUIET: Duration = Duration::from_millis(400);

    fn state() -> QueryState {
        QueryState::new(FilterState::default(), ClusterOptions::default(), QUIET)
    }

    fn germany() -> Viewport {
        Viewport::new(BoundingBox::GERMANY, 6)
    }

    fn record(id: &str) -> ProjectRecord {
        ProjectRecord::new(id, 50_000.0, ProjectStatus::Operating, 10.0, 51.0)
    }

    #[test]
    fn test_debounce_window_restarts() {
        let mut state = state();
        let t0 = Instant::now();

        state.viewport_idle(germany(), t0);
        state.viewport_idle(germany(), t0 + Duration::from_millis(300));

        assert!(state.poll(t0 + Duration::from_millis(500)).is_none());
        let issued = state.poll(t0 + Duration::from_millis(700)).unwrap();
        assert_eq!(issued.token, QueryToken(1));
        assert!(state.poll(t0 + Duration::from_secs(5)).is_none());
    }

    #[test]
    fn test_no_query_without_viewport() {
        let mut state = state();
        let t0 = Instant::now();

        let filter = FilterState::default().with_statuses(StatusSelection::none());
        assert!(state.set_filter(filter, t0));
        assert!(state.poll(t0 + QUIET).is_none());
        assert!(state.deadline().is_none());
        assert!(state.latest_issued().is_none());
    }

    #[test]
    fn test_unchanged_filter_is_ignored() {
        let mut state = state();
        assert!(!state.set_filter(FilterState::default(), Instant::now()));
        assert!(state.deadline().is_none());
    }

    #[test]
    fn test_malformed_viewport_is_ignored() {
        let mut state = state();
        let bad = Viewport {
            bbox: BoundingBox { west: 10.0, south: 50.0, east: 9.0, north: f64::NAN },
            zoom: 6,
        };

        assert!(!state.viewport_idle(bad, Instant::now()));
        assert!(state.viewport().is_none());
        assert!(state.deadline().is_none());
    }

    #[test]
    fn test_tokens_increase() {
        let mut state = state();
        let t0 = Instant::now();

        state.viewport_idle(germany(), t0);
        let first = state.poll(t0 + QUIET).unwrap();
        state.viewport_idle(germany(), t0 + QUIET);
        let second = state.poll(t0 + QUIET * 2).unwrap();

        assert!(second.token > first.token);
        assert_eq!(state.latest_issued(), Some(second.token));
    }

    #[test]
    fn test_stale_result_is_discarded() {
        let mut state = state();
        let t0 = Instant::now();

        state.viewport_idle(germany(), t0);
        let first = state.poll(t0 + QUIET).unwrap();
        state.viewport_idle(germany(), t0 + QUIET);
        let second = state.poll(t0 + QUIET * 2).unwrap();

        assert_eq!(
            state.complete(second.token, Ok(vec![record("new")])),
            Completion::Applied { token: second.token, count: 1 }
        );
        assert_eq!(
            state.complete(first.token, Ok(vec![record("old-1"), record("old-2")])),
            Completion::Superseded { token: first.token }
        );

        let view = state.view();
        assert_eq!(view.applied, Some(second.token));
        assert_eq!(view.project_count(), 1);
        assert!(view.index.points().iter().all(|p| p.id.as_str() == "new"));
    }

    #[test]
    fn test_loading_waits_for_latest() {
        let mut state = state();
        let t0 = Instant::now();

        state.viewport_idle(germany(), t0);
        let first = state.poll(t0 + QUIET).unwrap();
        state.viewport_idle(germany(), t0 + QUIET);
        let second = state.poll(t0 + QUIET * 2).unwrap();

        state.complete(first.token, Ok(vec![]));
        assert!(state.is_loading());
        state.complete(second.token, Ok(vec![]));
        assert!(!state.is_loading());
    }

    #[test]
    fn test_failure_keeps_previous_index() {
        let mut state = state();
        let t0 = Instant::now();

        state.viewport_idle(germany(), t0);
        let first = state.poll(t0 + QUIET).unwrap();
        state.complete(first.token, Ok(vec![record("a"), record("b")]));
        let before = state.index();

        state.viewport_idle(germany(), t0 + QUIET);
        let second = state.poll(t0 + QUIET * 2).unwrap();
        let outcome = state.complete(
            second.token,
            Err(PvMapError::QueryFailed { reason: "timeout".to_string() }),
        );

        assert!(matches!(outcome, Completion::Failed { .. }));
        assert!(Arc::ptr_eq(&before, &state.index()));
        assert!(!state.is_loading());
        assert!(state.last_error().unwrap().contains("timeout"));

        state.viewport_idle(germany(), t0 + QUIET * 2);
        let third = state.poll(t0 + QUIET * 3).unwrap();
        state.complete(third.token, Ok(vec![]));
        assert!(state.last_error().is_none());
    }

    #[test]
    fn test_superseded_failure_is_silent() {
        let mut state = state();
        let t0 = Instant::now();

        state.viewport_idle(germany(), t0);
        let first = state.poll(t0 + QUIET).unwrap();
        state.viewport_idle(germany(), t0 + QUIET);
        state.poll(t0 + QUIET * 2).unwrap();

        let outcome =
            state.complete(first.token, Err(PvMapError::QueryFailed { reason: "boom".into() }));
        assert_eq!(outcome, Completion::Superseded { token: first.token });
        assert!(state.last_error().is_none());
    }

    #[test]
    fn test_request_uses_viewport_bounds() {
        let mut state = state();
        let t0 = Instant::now();
        let viewport = Viewport::new(BoundingBox::new(9.0, 50.0, 10.0, 51.0).unwrap(), 9);

        state.viewport_idle(viewport, t0);
        let issued = state.poll(t0 + QUIET).unwrap();
        assert_eq!(issued.request.bbox, [9.0, 50.0, 10.0, 51.0]);
    }
}
