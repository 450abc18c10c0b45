//! Coordinator tests on a paused clock

use async_trait::async_trait;
use pvmap_core::models::{
    BoundingBox, CapacityRange, FilterState, ProjectDetail, ProjectId, ProjectRecord,
    ProjectStatus, SearchRequest, StatusSelection, Viewport,
};
use pvmap_core::ports::ProjectSource;
use pvmap_core::{PvMapError, Result};
use pvmap_geo::ClusterOptions;
use pvmap_query::{CoordinatorHandle, QueryCoordinator, QueryToken};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

const QUIET: Duration = Duration::from_millis(400);

struct Scripted {
    delay: Duration,
    result: Result<Vec<ProjectRecord>>,
}

#[derive(Default)]
struct ScriptedSource {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<SearchRequest>>,
}

impl ScriptedSource {
    fn new() -> Self {
        Self::default()
    }

    fn then(self, delay_ms: u64, result: Result<Vec<ProjectRecord>>) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted { delay: Duration::from_millis(delay_ms), result });
        self
    }

    fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProjectSource for ScriptedSource {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<ProjectRecord>> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Scripted { delay, result }) => {
                sleep(delay).await;
                result
            }
            None => Ok(Vec::new()),
        }
    }

    async fn get_project(&self, _id: &ProjectId) -> Result<Option<ProjectDetail>> {
        Ok(None)
    }
}

fn record(id: &str) -> ProjectRecord {
    ProjectRecord::new(id, 50_000.0, ProjectStatus::Operating, 10.0, 51.0)
}

fn germany() -> Viewport {
    Viewport::new(BoundingBox::GERMANY, 6)
}

fn start(source: &Arc<ScriptedSource>) -> CoordinatorHandle {
    QueryCoordinator::spawn(
        Arc::clone(source) as Arc<dyn ProjectSource>,
        FilterState::default(),
        ClusterOptions::default(),
        QUIET,
    )
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_events_issues_one_query() {
    let source = Arc::new(ScriptedSource::new().then(50, Ok(vec![record("a")])));
    let mut handle = start(&source);

    for _ in 0..5 {
        handle.viewport_idle(germany()).unwrap();
        sleep(Duration::from_millis(100)).await;
    }

    let view = handle.settled().await.unwrap();
    assert_eq!(source.requests().len(), 1);
    assert_eq!(view.applied, Some(QueryToken(1)));
    assert_eq!(view.project_count(), 1);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(source.requests().len(), 1);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_filter_toggles_collapse_into_one_query() {
    let source = Arc::new(
        ScriptedSource::new()
            .then(10, Ok(vec![record("a")]))
            .then(10, Ok(vec![record("b"), record("c")])),
    );
    let mut handle = start(&source);

    handle.viewport_idle(germany()).unwrap();
    handle.settled().await.unwrap();
    assert_eq!(source.requests().len(), 1);

    let toggles = [
        StatusSelection::none(),
        StatusSelection::only([ProjectStatus::Operating]),
        StatusSelection::none(),
        StatusSelection::only([ProjectStatus::Operating, ProjectStatus::Planned]),
    ];
    for statuses in toggles {
        handle.set_filter(FilterState::default().with_statuses(statuses)).unwrap();
        sleep(Duration::from_millis(150)).await;
    }

    let view = handle.settled().await.unwrap();
    let requests = source.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(
        requests[1].statuses,
        vec![ProjectStatus::Operating, ProjectStatus::Planned]
    );
    assert_eq!(view.applied, Some(QueryToken(2)));
    assert_eq!(view.project_count(), 2);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_no_query_before_first_viewport() {
    let source = Arc::new(ScriptedSource::new());
    let handle = start(&source);

    handle
        .set_filter(FilterState::default().with_statuses(StatusSelection::none()))
        .unwrap();
    sleep(Duration::from_secs(2)).await;

    assert!(source.requests().is_empty());
    let view = handle.view();
    assert!(view.latest_issued.is_none());
    assert!(view.render_items().is_empty());
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_slow_older_result_is_discarded() {
    let source = Arc::new(
        ScriptedSource::new()
            .then(1_000, Ok(vec![record("old-1"), record("old-2")]))
            .then(10, Ok(vec![record("new")])),
    );
    let mut handle = start(&source);

    handle.viewport_idle(germany()).unwrap();
    sleep(Duration::from_millis(500)).await;
    let operating_only =
        FilterState::default().with_statuses(StatusSelection::only([ProjectStatus::Operating]));
    handle.set_filter(operating_only).unwrap();

    let view = handle.wait_for(|v| v.applied == Some(QueryToken(2))).await.unwrap();
    assert_eq!(view.project_count(), 1);

    // the first search resolves after the second one
    sleep(Duration::from_secs(2)).await;
    let view = handle.view();
    assert_eq!(source.requests().len(), 2);
    assert_eq!(view.applied, Some(QueryToken(2)));
    assert!(view.index.points().iter().all(|p| p.id.as_str() == "new"));
    assert!(!view.loading);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_failure_keeps_previous_projects() {
    let source = Arc::new(
        ScriptedSource::new()
            .then(20, Ok(vec![record("a"), record("b")]))
            .then(20, Err(PvMapError::QueryFailed { reason: "HTTP 500".to_string() })),
    );
    let mut handle = start(&source);

    handle.viewport_idle(germany()).unwrap();
    let first = handle.settled().await.unwrap();
    assert_eq!(first.project_count(), 2);

    handle.viewport_idle(Viewport::new(BoundingBox::GERMANY, 7)).unwrap();
    let view = handle.wait_for(|v| v.last_error.is_some()).await.unwrap();

    assert_eq!(view.project_count(), 2);
    assert!(Arc::ptr_eq(&first.index, &view.index));
    assert_eq!(view.applied, Some(QueryToken(1)));
    assert!(!view.loading);
    assert!(view.last_error.unwrap().contains("HTTP 500"));
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_germany_with_no_results() {
    let source = Arc::new(ScriptedSource::new().then(30, Ok(Vec::new())));
    let filter = FilterState::default()
        .with_capacity(CapacityRange::new(10_000.0, 500_000.0).unwrap())
        .with_statuses(StatusSelection::only([ProjectStatus::Operating]));
    let mut handle = QueryCoordinator::spawn(
        Arc::clone(&source) as Arc<dyn ProjectSource>,
        filter,
        ClusterOptions::default(),
        QUIET,
    );

    handle.viewport_idle(germany()).unwrap();
    let view = handle.settled().await.unwrap();

    let requests = source.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        serde_json::to_value(&requests[0]).unwrap(),
        json!({
            "min_kwp": 10000.0,
            "max_kwp": 500000.0,
            "statuses": ["operating"],
            "eegs": null,
            "completed_after": null,
            "completed_before": null,
            "bbox": [5.87, 47.27, 15.04, 55.06],
        })
    );
    assert!(view.render_items().is_empty());
    assert!(view.last_error.is_none());
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_malformed_viewport_does_not_query() {
    let source = Arc::new(ScriptedSource::new());
    let handle = start(&source);

    let inverted = Viewport {
        bbox: BoundingBox { west: 15.0, south: 47.0, east: 5.0, north: 55.0 },
        zoom: 6,
    };
    handle.viewport_idle(inverted).unwrap();
    sleep(Duration::from_secs(2)).await;

    assert!(source.requests().is_empty());
    assert!(handle.view().viewport.is_none());
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_empty_status_selection_is_sent_literally() {
    let source = Arc::new(ScriptedSource::new());
    let mut handle = start(&source);

    handle.viewport_idle(germany()).unwrap();
    handle
        .set_filter(FilterState::default().with_statuses(StatusSelection::none()))
        .unwrap();
    let view = handle.settled().await.unwrap();

    let requests = source.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].statuses.is_empty());
    assert_eq!(serde_json::to_value(&requests[0]).unwrap()["statuses"], json!([]));
    assert_eq!(view.project_count(), 0);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_view_channel() {
    let source = Arc::new(ScriptedSource::new());
    let handle = start(&source);
    let receiver = handle.subscribe();
    handle.shutdown().await;

    assert!(receiver.has_changed().is_err());
}
