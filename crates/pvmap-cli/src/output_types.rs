use pvmap_core::models::{ProjectRecord, SearchRequest, Viewport};
use pvmap_geo::{ClickTarget, ClusterIndex, RenderItem};
use serde::Serialize;
use tabled::Tabled;

/// A render item together with what clicking it does
#[derive(Debug, Serialize)]
pub struct ItemOutput<'a> {
    #[serde(flatten)]
    pub item: RenderItem<'a>,
    pub click: Option<ClickTarget>,
}

impl<'a> ItemOutput<'a> {
    pub fn collect(index: &'a ClusterIndex, items: &[RenderItem<'a>]) -> Vec<Self> {
        items
            .iter()
            .map(|item| ItemOutput { item: *item, click: pvmap_geo::resolve_click(index, item) })
            .collect()
    }
}

/// Output for search command
#[derive(Debug, Serialize)]
pub struct SearchOutput<'a> {
    pub request: &'a SearchRequest,
    pub viewport: Viewport,
    pub project_count: usize,
    pub items: Vec<ItemOutput<'a>>,
}

/// Output for expand command
#[derive(Debug, Serialize)]
pub struct ExpandOutput<'a> {
    pub cluster_id: String,
    pub expansion_zoom: u8,
    pub children: Vec<ItemOutput<'a>>,
    pub leaves: Vec<&'a ProjectRecord>,
}

/// Table row for a render item
#[derive(Debug, Serialize, Tabled)]
pub struct ItemRow {
    #[tabled(rename = "Kind")]
    pub kind: &'static str,
    #[tabled(rename = "Id")]
    pub id: String,
    #[tabled(rename = "Projects")]
    pub count: u32,
    #[tabled(rename = "Position")]
    pub position: String,
    #[tabled(rename = "On click")]
    pub click: String,
}

impl From<&ItemOutput<'_>> for ItemRow {
    fn from(output: &ItemOutput<'_>) -> Self {
        let (lon, lat) = output.item.position();
        let (kind, id) = match &output.item {
            RenderItem::Cluster(cluster) => ("cluster", cluster.id.to_string()),
            RenderItem::Leaf(project) => ("project", project.id.to_string()),
        };
        let click = match &output.click {
            Some(ClickTarget::ZoomTo { zoom, .. }) => format!("zoom to {}", zoom),
            Some(ClickTarget::ShowProject { id }) => format!("pvmap project {}", id),
            None => "-".to_string(),
        };

        Self {
            kind,
            id,
            count: output.item.count(),
            position: format!("{:.4}, {:.4}", lon, lat),
            click,
        }
    }
}

/// Table row for a single project
#[derive(Debug, Serialize, Tabled)]
pub struct ProjectRow {
    #[tabled(rename = "Id")]
    pub id: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "kWp")]
    pub capacity_kwp: String,
    #[tabled(rename = "Status")]
    pub status: &'static str,
    #[tabled(rename = "Commissioning")]
    pub commissioning: String,
}

impl From<&ProjectRecord> for ProjectRow {
    fn from(record: &ProjectRecord) -> Self {
        Self {
            id: record.id.to_string(),
            name: record.name.clone(),
            capacity_kwp: format!("{:.1}", record.capacity_kwp),
            status: record.status.as_str(),
            commissioning: record
                .commissioning_date()
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// Table row for a configuration value
#[derive(Debug, Serialize, Tabled)]
pub struct ConfigRow {
    #[tabled(rename = "Key")]
    pub key: String,
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Source")]
    pub source: String,
}
