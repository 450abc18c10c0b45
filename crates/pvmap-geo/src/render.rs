//! Render projection: turns the cluster index and a viewport into drawable items

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use pvmap_core::models::{ProjectId, Viewport};
use serde::Serialize;
use serde_json::json;

use crate::index::{ClusterIndex, RenderItem};

/// What the map should do after an item was clicked
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClickTarget {
    /// Fly to the cluster centroid at the zoom where it splits
    ZoomTo { lon: f64, lat: f64, zoom: u8 },
    /// Show the details of a single project
    ShowProject { id: ProjectId },
}

/// Render items for the viewport.
///
/// Pure function of its inputs; callers re-run it whenever the viewport, the
/// zoom or the index changes.
pub fn project<'a>(index: &'a ClusterIndex, viewport: &Viewport) -> Vec<RenderItem<'a>> {
    let items = index.query(&viewport.bbox, viewport.zoom);
    tracing::debug!(
        zoom = viewport.zoom,
        points = index.len(),
        items = items.len(),
        "Projected render items"
    );
    items
}

/// Resolve a click on a render item.
///
/// Returns `None` only for clusters that do not belong to `index`, which
/// happens when a stale item is clicked after the index was replaced.
pub fn resolve_click(index: &ClusterIndex, item: &RenderItem<'_>) -> Option<ClickTarget> {
    match item {
        RenderItem::Cluster(cluster) => {
            let zoom = index.expansion_zoom(cluster.id)?;
            Some(ClickTarget::ZoomTo { lon: cluster.lon, lat: cluster.lat, zoom })
        }
        RenderItem::Leaf(project) => Some(ClickTarget::ShowProject { id: project.id.clone() }),
    }
}

/// Short label for a cluster marker, e.g. `950`, `1.5k`, `12k`
pub fn abbreviate_count(count: u32) -> String {
    if count >= 10_000 {
        format!("{}k", (count as f64 / 1000.0).round())
    } else if count >= 1000 {
        format!("{}k", (count as f64 / 100.0).round() / 10.0)
    } else {
        count.to_string()
    }
}

/// GeoJSON view of render items for map libraries that consume features
pub fn to_feature_collection(items: &[RenderItem<'_>]) -> FeatureCollection {
    let features = items
        .iter()
        .map(|item| {
            let (lon, lat) = item.position();
            let mut properties = JsonObject::new();
            match item {
                RenderItem::Cluster(cluster) => {
                    properties.insert("cluster".into(), json!(true));
                    properties.insert("cluster_id".into(), json!(cluster.id.to_string()));
                    properties.insert("point_count".into(), json!(cluster.count));
                    properties.insert(
                        "point_count_abbreviated".into(),
                        json!(abbreviate_count(cluster.count)),
                    );
                }
                RenderItem::Leaf(project) => {
                    properties.insert("cluster".into(), json!(false));
                    properties.insert("project_id".into(), json!(project.id.as_str()));
                    properties.insert("name".into(), json!(project.name));
                    properties.insert("capacity_kwp".into(), json!(project.capacity_kwp));
                    properties.insert("status".into(), json!(project.status.as_str()));
                }
            }

            Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::Point(vec![lon, lat]))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection { bbox: None, features, foreign_members: None }
}
