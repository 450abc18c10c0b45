//! PV Map Geo - Hierarchical point clustering and render projection
//!
//! This crate builds the zoom-level cluster hierarchy over fetched projects
//! and turns it into render items for a viewport.

pub mod index;
pub mod projection;
pub mod render;

pub use index::{ClusterId, ClusterIndex, ClusterItem, ClusterOptions, RenderItem};
pub use render::{project, resolve_click, to_feature_collection, ClickTarget};
