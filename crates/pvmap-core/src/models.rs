pub mod filter;
pub mod project;
pub mod request;
pub mod viewport;

pub use filter::{AwardSelection, CapacityRange, DateWindow, FilterState, StatusSelection};
pub use project::{AwardBucket, ProjectDetail, ProjectId, ProjectRecord, ProjectStatus};
pub use request::SearchRequest;
pub use viewport::{BoundingBox, Viewport};
