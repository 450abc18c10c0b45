//! Async driver around [`QueryState`].
//!
//! A single task owns the state and multiplexes three sources of work: map
//! events from the handle, the debounce timer and in-flight searches. Every
//! transition is published as a fresh [`MapView`] on a watch channel.

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use pvmap_core::models::{FilterState, ProjectRecord, Viewport};
use pvmap_core::ports::ProjectSource;
use pvmap_core::{PvMapError, Result};
use pvmap_geo::ClusterOptions;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::models::{IssuedQuery, MapEvent, MapView, QueryToken};
use crate::state::QueryState;

type Fetch = BoxFuture<'static, (QueryToken, Result<Vec<ProjectRecord>>)>;

pub struct QueryCoordinator {
    source: Arc<dyn ProjectSource>,
    state: QueryState,
    events: mpsc::UnboundedReceiver<MapEvent>,
    view: watch::Sender<MapView>,
}

impl QueryCoordinator {
    /// Create a coordinator and the handle that feeds it.
    ///
    /// The coordinator does nothing until [`QueryCoordinator::run`] is polled;
    /// use [`QueryCoordinator::spawn`] to run it on the current runtime.
    pub fn new(
        source: Arc<dyn ProjectSource>,
        filter: FilterState,
        options: ClusterOptions,
        quiet_window: Duration,
    ) -> (Self, CoordinatorHandle) {
        let state = QueryState::new(filter, options, quiet_window);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(state.view());

        let coordinator = Self { source, state, events: event_rx, view: view_tx };
        let handle = CoordinatorHandle {
            events: event_tx,
            sent: AtomicU64::new(0),
            view: view_rx,
            task: None,
        };
        (coordinator, handle)
    }

    /// Spawn the coordinator task on the current tokio runtime
    pub fn spawn(
        source: Arc<dyn ProjectSource>,
        filter: FilterState,
        options: ClusterOptions,
        quiet_window: Duration,
    ) -> CoordinatorHandle {
        let (coordinator, mut handle) = Self::new(source, filter, options, quiet_window);
        handle.task = Some(tokio::spawn(coordinator.run()));
        handle
    }

    /// Process events until every handle has been dropped.
    ///
    /// Searches still in flight at that point are abandoned.
    pub async fn run(mut self) {
        let mut in_flight: FuturesUnordered<Fetch> = FuturesUnordered::new();

        loop {
            let deadline = self.state.deadline();

            tokio::select! {
                event = self.events.recv() => match event {
                    Some(MapEvent::ViewportIdle(viewport)) => {
                        self.state.viewport_idle(viewport, Instant::now());
                    }
                    Some(MapEvent::FilterChanged(filter)) => {
                        self.state.set_filter(filter, Instant::now());
                    }
                    None => break,
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if let Some(query) = self.state.poll(Instant::now()) {
                        in_flight.push(self.fetch(query));
                    }
                }
                Some((token, result)) = in_flight.next(), if !in_flight.is_empty() => {
                    self.state.complete(token, result);
                }
            }

            self.view.send_replace(self.state.view());
        }

        tracing::debug!(abandoned = in_flight.len(), "Query coordinator stopped");
    }

    fn fetch(&self, query: IssuedQuery) -> Fetch {
        let source = Arc::clone(&self.source);
        async move {
            let result = source.search(&query.request).await;
            (query.token, result)
        }
        .boxed()
    }
}

/// Sending side of a running coordinator
pub struct CoordinatorHandle {
    events: mpsc::UnboundedSender<MapEvent>,
    sent: AtomicU64,
    view: watch::Receiver<MapView>,
    task: Option<JoinHandle<()>>,
}

impl CoordinatorHandle {
    /// Report that the map settled on a new viewport
    pub fn viewport_idle(&self, viewport: Viewport) -> Result<()> {
        self.send(MapEvent::ViewportIdle(viewport))
    }

    /// Commit a new filter
    pub fn set_filter(&self, filter: FilterState) -> Result<()> {
        self.send(MapEvent::FilterChanged(filter))
    }

    pub fn send(&self, event: MapEvent) -> Result<()> {
        self.events.send(event).map_err(|_| PvMapError::CoordinatorStopped)?;
        self.sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Latest published snapshot
    pub fn view(&self) -> MapView {
        self.view.borrow().clone()
    }

    /// Independent receiver for snapshot updates
    pub fn subscribe(&self) -> watch::Receiver<MapView> {
        self.view.clone()
    }

    /// Wait until a published snapshot satisfies `predicate`
    pub async fn wait_for(&mut self, predicate: impl FnMut(&MapView) -> bool) -> Result<MapView> {
        let view = self.view.wait_for(predicate).await.map_err(|_| PvMapError::CoordinatorStopped)?;
        Ok(view.clone())
    }

    /// Wait until every event sent so far has been processed, no debounce
    /// window is open and the latest query has been applied or has failed
    pub async fn settled(&mut self) -> Result<MapView> {
        let sent = self.sent.load(Ordering::Relaxed);
        self.wait_for(|view| view.events_seen >= sent && !view.pending && !view.loading)
            .await
    }

    /// Stop the coordinator and wait for its task to finish
    pub async fn shutdown(self) {
        let Self { events, task, .. } = self;
        drop(events);
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Query coordinator task ended abnormally");
            }
        }
    }
}
