use pvmap_core::config::LayeredConfig;
use pvmap_core::models::{BoundingBox, ProjectId, ProjectRecord};
use pvmap_core::PvMapError;
use rstar::primitives::GeomWithData;
use rstar::{RTree, AABB};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::projection::{self, distance};

/// Fixed parameters of the cluster hierarchy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterOptions {
    /// Merge radius in screen pixels
    pub radius: f64,

    /// Tile extent in pixels used to scale the radius per zoom
    pub extent: f64,

    /// Lowest zoom level that is clustered
    pub min_zoom: u8,

    /// Highest zoom level that is clustered; above it every point is a leaf
    pub max_zoom: u8,

    /// Minimum number of points that form a cluster
    pub min_points: u32,

    /// Upper bound for expansion zooms handed to the map
    pub max_expansion_zoom: u8,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            radius: 60.0,
            extent: 512.0,
            min_zoom: 0,
            max_zoom: 16,
            min_points: 2,
            max_expansion_zoom: 18,
        }
    }
}

impl ClusterOptions {
    pub fn from_config(config: &LayeredConfig) -> Self {
        Self {
            radius: config.cluster_radius.value as f64,
            max_zoom: config.cluster_max_zoom.value,
            max_expansion_zoom: config.max_expansion_zoom.value,
            ..Self::default()
        }
    }

    /// Options clamped to bounds the hierarchy can honor.
    ///
    /// `max_zoom` stays below `max_expansion_zoom` and `min_zoom` at or below
    /// `max_zoom`. A non-finite or negative radius and a non-positive extent
    /// fall back to the defaults.
    pub fn normalized(self) -> Self {
        let defaults = Self::default();
        let max_zoom = self.max_zoom.min(self.max_expansion_zoom.saturating_sub(1));

        Self {
            radius: if self.radius.is_finite() && self.radius >= 0.0 {
                self.radius
            } else {
                defaults.radius
            },
            extent: if self.extent.is_finite() && self.extent > 0.0 {
                self.extent
            } else {
                defaults.extent
            },
            min_zoom: self.min_zoom.min(max_zoom),
            max_zoom,
            ..self
        }
    }

    /// Merge radius in projected units at `zoom`
    pub fn radius_at(&self, zoom: u8) -> f64 {
        self.radius / projection::pixels_per_unit(zoom, self.extent)
    }
}

/// Opaque cluster identifier, valid only for the index that produced it.
///
/// Rendered as `zoom/index`: the zoom at which the cluster was formed and its
/// position within that level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "String")]
pub struct ClusterId {
    zoom: u8,
    index: u32,
}

impl ClusterId {
    /// Zoom level at which the cluster was formed
    pub fn zoom(&self) -> u8 {
        self.zoom
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.zoom, self.index)
    }
}

impl From<ClusterId> for String {
    fn from(id: ClusterId) -> Self {
        id.to_string()
    }
}

impl FromStr for ClusterId {
    type Err = PvMapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PvMapError::Serialization(format!("Invalid cluster id '{}'", s));
        let (zoom, index) = s.split_once('/').ok_or_else(invalid)?;
        Ok(Self {
            zoom: zoom.trim().parse().map_err(|_| invalid())?,
            index: index.trim().parse().map_err(|_| invalid())?,
        })
    }
}

/// Aggregate of several nearby projects at one zoom level
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClusterItem {
    pub id: ClusterId,
    /// Centroid longitude
    pub lon: f64,
    /// Centroid latitude
    pub lat: f64,
    /// Number of projects contained
    pub count: u32,
}

/// One drawable element of the map
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderItem<'a> {
    Cluster(ClusterItem),
    Leaf(&'a ProjectRecord),
}

impl RenderItem<'_> {
    /// Number of projects represented
    pub fn count(&self) -> u32 {
        match self {
            RenderItem::Cluster(c) => c.count,
            RenderItem::Leaf(_) => 1,
        }
    }

    /// Coordinate the item is drawn at
    pub fn position(&self) -> (f64, f64) {
        match self {
            RenderItem::Cluster(c) => (c.lon, c.lat),
            RenderItem::Leaf(p) => (p.lon, p.lat),
        }
    }

    pub fn is_cluster(&self) -> bool {
        matches!(self, RenderItem::Cluster(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum NodeKind {
    /// Index into the point list
    Leaf(usize),
    Cluster(ClusterId),
}

#[derive(Debug, Clone)]
struct Node {
    /// Projected position; the count-weighted centroid for clusters
    pos: [f64; 2],
    count: u32,
    /// Upper bound of the projected distance from `pos` to any contained point
    reach: f64,
    kind: NodeKind,
    /// Node indices one level up; only set on the level where the cluster formed
    children: Vec<u32>,
}

impl Node {
    fn leaf(point: usize, pos: [f64; 2]) -> Self {
        Self { pos, count: 1, reach: 0.0, kind: NodeKind::Leaf(point), children: Vec::new() }
    }

    /// Copy of the node for the next lower zoom, keeping its identity
    fn carried(&self) -> Self {
        Self {
            pos: self.pos,
            count: self.count,
            reach: self.reach,
            kind: self.kind,
            children: Vec::new(),
        }
    }
}

/// All nodes visible at one zoom level
#[derive(Debug)]
struct Level {
    nodes: Vec<Node>,
    tree: RTree<GeomWithData<[f64; 2], u32>>,
}

impl Level {
    fn new(nodes: Vec<Node>) -> Self {
        let entries = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| GeomWithData::new(node.pos, i as u32))
            .collect();
        Self { nodes, tree: RTree::bulk_load(entries) }
    }
}

/// Hierarchical cluster index over one fetched project set.
///
/// Built once per result set and only read afterwards. Level `max_zoom + 1`
/// holds every point as a leaf; each lower level merges nodes of the level
/// above that lie within the zoom's pixel radius of a seed node.
#[derive(Debug)]
pub struct ClusterIndex {
    options: ClusterOptions,
    points: Vec<ProjectRecord>,
    by_id: HashMap<ProjectId, usize>,
    /// `levels[i]` holds zoom `min_zoom + i`
    levels: Vec<Level>,
}

impl ClusterIndex {
    /// Index without points; every query answers with an empty sequence
    pub fn empty(options: ClusterOptions) -> Self {
        Self::build(Vec::new(), options)
    }

    /// Build the full hierarchy for `points`
    pub fn build(points: Vec<ProjectRecord>, options: ClusterOptions) -> Self {
        let requested = options;
        let options = requested.normalized();
        if options != requested {
            tracing::warn!(?requested, ?options, "Adjusted unsupported cluster options");
        }

        let mut leaves = Vec::with_capacity(points.len());
        let mut by_id = HashMap::with_capacity(points.len());
        let mut skipped = 0usize;

        for (i, point) in points.iter().enumerate() {
            if !point.has_valid_location() {
                skipped += 1;
                continue;
            }
            by_id.entry(point.id.clone()).or_insert(i);
            leaves.push(Node::leaf(i, projection::project(point.lon, point.lat)));
        }

        if skipped > 0 {
            tracing::debug!(skipped, "Skipped projects without a valid location");
        }

        let mut current = Level::new(leaves);
        let mut levels = Vec::with_capacity((options.max_zoom - options.min_zoom) as usize + 2);
        for zoom in (options.min_zoom..=options.max_zoom).rev() {
            let next = cluster_level(&current, zoom, &options);
            levels.push(current);
            current = next;
        }
        levels.push(current);
        levels.reverse();

        tracing::debug!(
            points = points.len(),
            levels = levels.len(),
            top_level_nodes = levels.first().map(|l| l.nodes.len()).unwrap_or(0),
            "Built cluster index"
        );

        Self { options, points, by_id, levels }
    }

    /// All projects of the result set, including ones skipped for invalid coordinates
    pub fn points(&self) -> &[ProjectRecord] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Look up a project by identifier
    pub fn get(&self, id: &ProjectId) -> Option<&ProjectRecord> {
        self.by_id.get(id).map(|&i| &self.points[i])
    }

    fn level(&self, zoom: u8) -> Option<&Level> {
        let top = self.options.max_zoom + 1;
        let zoom = zoom.clamp(self.options.min_zoom, top);
        self.levels.get((zoom - self.options.min_zoom) as usize)
    }

    /// Render items inside `bbox` at `zoom`, ordered by their position in the level
    pub fn query(&self, bbox: &BoundingBox, zoom: u8) -> Vec<RenderItem<'_>> {
        let Some(level) = self.level(zoom) else {
            return Vec::new();
        };

        let envelope = AABB::from_corners(
            projection::project(bbox.west, bbox.north),
            projection::project(bbox.east, bbox.south),
        );

        let mut hits: Vec<u32> = level.tree.locate_in_envelope(&envelope).map(|e| e.data).collect();
        hits.sort_unstable();

        hits.into_iter().map(|i| self.render_item(&level.nodes[i as usize])).collect()
    }

    fn render_item(&self, node: &Node) -> RenderItem<'_> {
        match node.kind {
            NodeKind::Leaf(point) => RenderItem::Leaf(&self.points[point]),
            NodeKind::Cluster(id) => {
                let (lon, lat) = projection::unproject(node.pos);
                RenderItem::Cluster(ClusterItem { id, lon, lat, count: node.count })
            }
        }
    }

    /// The node where the cluster was formed, if `id` belongs to this index
    fn origin(&self, id: ClusterId) -> Option<&Node> {
        if id.zoom < self.options.min_zoom {
            return None;
        }
        let node = self
            .levels
            .get((id.zoom - self.options.min_zoom) as usize)?
            .nodes
            .get(id.index as usize)?;
        match node.kind {
            NodeKind::Cluster(own) if own == id && !node.children.is_empty() => Some(node),
            _ => None,
        }
    }

    /// Zoom at which the cluster splits into its children.
    ///
    /// A cluster keeps its identity at every zoom below the one it was formed
    /// at, so it first splits one level above its formation zoom. The result
    /// never exceeds `max_expansion_zoom`. Returns `None` for ids that do not
    /// belong to this index.
    pub fn expansion_zoom(&self, id: ClusterId) -> Option<u8> {
        self.origin(id)?;
        Some(id.zoom.saturating_add(1).min(self.options.max_expansion_zoom))
    }

    /// Direct children of a cluster, as seen one zoom above its formation zoom
    pub fn children(&self, id: ClusterId) -> Option<Vec<RenderItem<'_>>> {
        let origin = self.origin(id)?;
        let above = self.levels.get((id.zoom - self.options.min_zoom) as usize + 1)?;
        Some(origin.children.iter().map(|&i| self.render_item(&above.nodes[i as usize])).collect())
    }

    /// Projects contained in a cluster, paginated
    pub fn leaves(&self, id: ClusterId, limit: usize, offset: usize) -> Option<Vec<&ProjectRecord>> {
        self.origin(id)?;
        let mut out = Vec::new();
        let mut skipped = 0;
        self.collect_leaves(id, limit, offset, &mut skipped, &mut out);
        Some(out)
    }

    fn collect_leaves<'a>(
        &'a self,
        id: ClusterId,
        limit: usize,
        offset: usize,
        skipped: &mut usize,
        out: &mut Vec<&'a ProjectRecord>,
    ) {
        let Some(origin) = self.origin(id) else {
            return;
        };
        let Some(above) = self.levels.get((id.zoom - self.options.min_zoom) as usize + 1) else {
            return;
        };

        for &child in &origin.children {
            if out.len() >= limit {
                return;
            }
            let node = &above.nodes[child as usize];
            match node.kind {
                NodeKind::Cluster(child_id) => {
                    if *skipped + (node.count as usize) <= offset {
                        *skipped += node.count as usize;
                    } else {
                        self.collect_leaves(child_id, limit, offset, skipped, out);
                    }
                }
                NodeKind::Leaf(point) => {
                    if *skipped < offset {
                        *skipped += 1;
                    } else {
                        out.push(&self.points[point]);
                    }
                }
            }
        }
    }
}

/// Merge the nodes of the level above into the level for `zoom`
fn cluster_level(above: &Level, zoom: u8, options: &ClusterOptions) -> Level {
    let radius = options.radius_at(zoom);
    let mut claimed = vec![false; above.nodes.len()];
    let mut nodes: Vec<Node> = Vec::with_capacity(above.nodes.len());

    for (i, seed) in above.nodes.iter().enumerate() {
        if claimed[i] {
            continue;
        }
        claimed[i] = true;

        let mut neighbors: Vec<u32> = above
            .tree
            .locate_within_distance(seed.pos, radius * radius)
            .map(|e| e.data)
            .filter(|&j| !claimed[j as usize])
            .collect();
        neighbors.sort_unstable();

        let (centroid, reach, members) = tighten(above, seed, neighbors, radius);
        if members.is_empty() {
            nodes.push(seed.carried());
            continue;
        }

        let count = seed.count + members.iter().map(|&j| above.nodes[j as usize].count).sum::<u32>();
        if count < options.min_points {
            nodes.push(seed.carried());
            for j in members {
                claimed[j as usize] = true;
                nodes.push(above.nodes[j as usize].carried());
            }
            continue;
        }

        for &j in &members {
            claimed[j as usize] = true;
        }
        let id = ClusterId { zoom, index: nodes.len() as u32 };
        let mut children = Vec::with_capacity(members.len() + 1);
        children.push(i as u32);
        children.extend(members);
        nodes.push(Node { pos: centroid, count, reach, kind: NodeKind::Cluster(id), children });
    }

    Level::new(nodes)
}

/// Drop the farthest candidates until every contained point lies within
/// `radius` of the weighted centroid. Returns centroid, reach and the kept
/// candidates.
fn tighten(
    above: &Level,
    seed: &Node,
    mut members: Vec<u32>,
    radius: f64,
) -> ([f64; 2], f64, Vec<u32>) {
    loop {
        let mut weight = seed.count as f64;
        let mut wx = seed.pos[0] * weight;
        let mut wy = seed.pos[1] * weight;
        for &j in &members {
            let node = &above.nodes[j as usize];
            let w = node.count as f64;
            wx += node.pos[0] * w;
            wy += node.pos[1] * w;
            weight += w;
        }
        let centroid = [wx / weight, wy / weight];

        let seed_reach = distance(centroid, seed.pos) + seed.reach;
        let farthest = members
            .iter()
            .enumerate()
            .map(|(k, &j)| {
                let node = &above.nodes[j as usize];
                (k, distance(centroid, node.pos) + node.reach)
            })
            .max_by(|a, b| a.1.total_cmp(&b.1));

        let Some((worst, worst_reach)) = farthest else {
            return (seed.pos, seed.reach, members);
        };

        let reach = seed_reach.max(worst_reach);
        if reach <= radius {
            return (centroid, reach, members);
        }
        members.remove(worst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pvmap_core::models::ProjectStatus;

    fn point(id: &str, lon: f64, lat: f64) -> ProjectRecord {
        ProjectRecord::new(id, 50_000.0, ProjectStatus::Operating, lon, lat)
    }

    fn world() -> BoundingBox {
        BoundingBox::new(-180.0, -85.0, 180.0, 85.0).unwrap()
    }

    #[test]
    fn test_empty_index() {
        let index = ClusterIndex::empty(ClusterOptions::default());
        assert!(index.is_empty());
        for zoom in [0, 6, 16, 18, 24] {
            assert!(index.query(&world(), zoom).is_empty());
        }
    }

    #[test]
    fn test_single_point_is_always_a_leaf() {
        let index = ClusterIndex::build(vec![point("a", 10.0, 51.0)], ClusterOptions::default());
        for zoom in [0, 5, 17] {
            let items = index.query(&world(), zoom);
            assert_eq!(items.len(), 1);
            assert!(matches!(items[0], RenderItem::Leaf(p) if p.id.as_str() == "a"));
        }
    }

    #[test]
    fn test_close_points_cluster_at_low_zoom() {
        let index = ClusterIndex::build(
            vec![point("a", 10.0, 51.0), point("b", 10.0001, 51.0)],
            ClusterOptions::default(),
        );

        let items = index.query(&world(), 3);
        assert_eq!(items.len(), 1);
        let RenderItem::Cluster(cluster) = items[0] else {
            panic!("expected a cluster");
        };
        assert_eq!(cluster.count, 2);
        assert!((cluster.lon - 10.00005).abs() < 1e-6);

        let items = index.query(&world(), 18);
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| !i.is_cluster()));
    }

    #[test]
    fn test_distant_points_stay_apart() {
        let index = ClusterIndex::build(
            vec![point("berlin", 13.4, 52.52), point("munich", 11.58, 48.14)],
            ClusterOptions::default(),
        );
        assert_eq!(index.query(&world(), 8).len(), 2);
        assert_eq!(index.query(&world(), 0).len(), 1);
    }

    #[test]
    fn test_bbox_filters_items() {
        let index = ClusterIndex::build(
            vec![point("berlin", 13.4, 52.52), point("paris", 2.35, 48.85)],
            ClusterOptions::default(),
        );
        let items = index.query(&BoundingBox::GERMANY, 10);
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], RenderItem::Leaf(p) if p.id.as_str() == "berlin"));
    }

    #[test]
    fn test_invalid_points_are_skipped() {
        let index = ClusterIndex::build(
            vec![point("ok", 10.0, 51.0), point("bad", f64::NAN, 51.0)],
            ClusterOptions::default(),
        );
        assert_eq!(index.len(), 2);
        assert_eq!(index.query(&world(), 17).len(), 1);
        assert!(index.get(&ProjectId::new("bad")).is_none());
        assert!(index.get(&ProjectId::new("ok")).is_some());
    }

    #[test]
    fn test_expansion_zoom_splits_cluster() {
        let index = ClusterIndex::build(
            vec![point("a", 10.0, 51.0), point("b", 10.01, 51.0), point("c", 10.02, 51.0)],
            ClusterOptions::default(),
        );

        let items = index.query(&world(), 4);
        let RenderItem::Cluster(cluster) = items[0] else {
            panic!("expected a cluster");
        };
        assert_eq!(cluster.count, 3);

        let zoom = index.expansion_zoom(cluster.id).unwrap();
        assert!(zoom > 4 && zoom <= 18);

        let expanded = index.query(&world(), zoom);
        assert!(expanded.len() > 1);
        assert!(!expanded.contains(&RenderItem::Cluster(cluster)));
    }

    #[test]
    fn test_expansion_zoom_is_clamped() {
        let options = ClusterOptions { max_zoom: 20, max_expansion_zoom: 18, ..Default::default() };
        let index = ClusterIndex::build(
            vec![point("a", 10.0, 51.0), point("b", 10.0, 51.0)],
            options,
        );
        let items = index.query(&world(), 0);
        let RenderItem::Cluster(cluster) = items[0] else {
            panic!("expected a cluster");
        };
        assert_eq!(cluster.id.zoom(), 17);

        let target = index.expansion_zoom(cluster.id).unwrap();
        assert_eq!(target, 18);
        let expanded = index.query(&world(), target);
        assert_eq!(expanded.len(), 2);
        assert!(expanded.iter().all(|item| !item.is_cluster()));
    }

    #[test]
    fn test_normalized_options() {
        let options = ClusterOptions {
            radius: f64::NAN,
            extent: 0.0,
            min_zoom: 30,
            max_zoom: 255,
            ..Default::default()
        }
        .normalized();

        assert_eq!(options.max_zoom, 17);
        assert_eq!(options.min_zoom, 17);
        assert_eq!(options.radius, 60.0);
        assert_eq!(options.extent, 512.0);
        assert_eq!(ClusterOptions::default().normalized(), ClusterOptions::default());
    }

    #[test]
    fn test_highest_max_zoom_does_not_overflow() {
        let options = ClusterOptions { max_zoom: 255, max_expansion_zoom: 255, ..Default::default() };
        let index = ClusterIndex::build(vec![point("a", 10.0, 51.0), point("b", 10.1, 51.0)], options);

        assert_eq!(index.query(&world(), 255).len(), 2);
        assert_eq!(index.query(&world(), 0).len(), 1);
    }

    #[test]
    fn test_children_and_leaves() {
        let points: Vec<_> = (0..5).map(|i| point(&format!("p{}", i), 10.0 + i as f64 * 1e-4, 51.0)).collect();
        let index = ClusterIndex::build(points, ClusterOptions::default());

        let items = index.query(&world(), 0);
        assert_eq!(items.len(), 1);
        let RenderItem::Cluster(cluster) = items[0] else {
            panic!("expected a cluster");
        };

        let children = index.children(cluster.id).unwrap();
        assert!(children.len() >= 2);
        assert_eq!(children.iter().map(|c| c.count()).sum::<u32>(), 5);

        let all = index.leaves(cluster.id, usize::MAX, 0).unwrap();
        assert_eq!(all.len(), 5);

        let page = index.leaves(cluster.id, 2, 2).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, all[2].id);
        assert_eq!(page[1].id, all[3].id);
    }

    #[test]
    fn test_unknown_cluster_id() {
        let index = ClusterIndex::build(vec![point("a", 10.0, 51.0)], ClusterOptions::default());
        let id: ClusterId = "3/0".parse().unwrap();
        assert_eq!(index.expansion_zoom(id), None);
        assert!(index.children(id).is_none());
        assert!(index.leaves(id, 10, 0).is_none());
    }

    #[test]
    fn test_cluster_id_format() {
        let id: ClusterId = "12/345".parse().unwrap();
        assert_eq!(id.zoom(), 12);
        assert_eq!(id.to_string(), "12/345");
        assert!("12".parse::<ClusterId>().is_err());
        assert!("a/b".parse::<ClusterId>().is_err());
        assert_eq!(serde_json::to_value(id).unwrap(), serde_json::json!("12/345"));
    }
}
