//! PV Map Query - Viewport-driven query coordination
//!
//! This crate turns viewport and filter changes into debounced remote
//! searches, applies only the latest-issued result, and keeps the cluster
//! index in step with the applied project set.

pub mod coordinator;
pub mod models;
pub mod state;

pub use coordinator::{CoordinatorHandle, QueryCoordinator};
pub use models::{Completion, IssuedQuery, MapEvent, MapView, QueryToken};
pub use state::QueryState;
