use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pvmap_core::models::{
    AwardBucket, AwardSelection, BoundingBox, CapacityRange, DateWindow, FilterState,
    ProjectStatus, StatusSelection, Viewport,
};
use std::path::PathBuf;

/// PV Map - Explore PV and grid projects on a clustered map
#[derive(Parser, Debug)]
#[command(name = "pvmap")]
#[command(about = "Explore PV and grid projects on a clustered map", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Output results in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Read projects from a local JSON file instead of the remote API
    #[arg(long, global = true, value_name = "FILE")]
    pub data: Option<PathBuf>,

    /// Configuration file (defaults to ./pvmap.toml when present)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Remote project URL (overrides SUPABASE_URL)
    #[arg(long, global = true, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Cluster radius in pixels
    #[arg(long, global = true)]
    pub cluster_radius: Option<u32>,

    /// Highest zoom that still forms clusters
    #[arg(long, global = true)]
    pub cluster_max_zoom: Option<u8>,

    /// Quiet window before a query is issued, in milliseconds
    #[arg(long, global = true)]
    pub debounce_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search a region and show the clustered map items
    Search(SearchArgs),

    /// Show where a cluster splits and what it contains
    Expand(ExpandArgs),

    /// Show the details of a single project
    Project(ProjectArgs),

    /// Drive the live query coordinator with commands read from stdin
    Explore(ExploreArgs),

    /// Show the effective configuration and where each value comes from
    Config,
}

/// Visible map region
#[derive(Args, Debug, Clone)]
pub struct ViewportArgs {
    /// Bounding box as west,south,east,north in degrees (defaults to Germany)
    #[arg(long, value_name = "W,S,E,N", allow_hyphen_values = true)]
    pub bbox: Option<String>,

    /// Map zoom; fractional zooms are rounded like a map idle event
    #[arg(long, default_value_t = 6.0)]
    pub zoom: f64,
}

impl ViewportArgs {
    pub fn to_viewport(&self) -> Result<Viewport> {
        let bbox = match &self.bbox {
            Some(raw) => parse_bbox(raw)?,
            None => BoundingBox::GERMANY,
        };
        Ok(Viewport::from_map_idle(bbox, self.zoom)?)
    }
}

/// Parse `west,south,east,north`
pub fn parse_bbox(raw: &str) -> Result<BoundingBox> {
    let coords = raw
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("Bounding box '{}' must contain four numbers", raw))?;

    let coords: [f64; 4] = coords
        .try_into()
        .map_err(|_| anyhow::anyhow!("Bounding box '{}' must contain four numbers", raw))?;

    Ok(BoundingBox::from_array(coords)?)
}

/// Filter panel settings
#[derive(Args, Debug, Clone)]
pub struct FilterArgs {
    /// Minimum capacity in kWp
    #[arg(long, default_value_t = CapacityRange::SLIDER_MIN_KWP)]
    pub min_kwp: f64,

    /// Maximum capacity in kWp
    #[arg(long, default_value_t = CapacityRange::SLIDER_MAX_KWP)]
    pub max_kwp: f64,

    /// Statuses to include (operating, connected, planned); all when omitted
    #[arg(long, value_delimiter = ',')]
    pub status: Vec<ProjectStatus>,

    /// Deselect every status, which matches no project
    #[arg(long, conflicts_with = "status")]
    pub no_status: bool,

    /// Award buckets to include (eeg_awarded, merchant_likely); unfiltered when omitted
    #[arg(long, value_delimiter = ',')]
    pub eeg: Vec<AwardBucket>,

    /// Earliest commissioning date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub completed_after: Option<String>,

    /// Latest commissioning date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub completed_before: Option<String>,
}

impl FilterArgs {
    pub fn to_filter(&self) -> Result<FilterState> {
        let statuses = if self.no_status {
            StatusSelection::none()
        } else if self.status.is_empty() {
            StatusSelection::all()
        } else {
            StatusSelection::only(self.status.iter().copied())
        };

        let completion = DateWindow::from_inputs(
            self.completed_after.as_deref().unwrap_or(""),
            self.completed_before.as_deref().unwrap_or(""),
        )?;

        Ok(FilterState::default()
            .with_capacity(CapacityRange::new(self.min_kwp, self.max_kwp)?)
            .with_statuses(statuses)
            .with_award_buckets(AwardSelection::only(self.eeg.iter().copied()))
            .with_completion(completion))
    }
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    #[command(flatten)]
    pub viewport: ViewportArgs,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Print the render items as a GeoJSON FeatureCollection
    #[arg(long)]
    pub geojson: bool,
}

#[derive(Args, Debug)]
pub struct ExpandArgs {
    /// Cluster id as printed by `search` (zoom/index)
    pub cluster: String,

    #[command(flatten)]
    pub viewport: ViewportArgs,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Maximum number of contained projects to list
    #[arg(long, default_value_t = 20)]
    pub limit: usize,

    /// Number of contained projects to skip
    #[arg(long, default_value_t = 0)]
    pub offset: usize,
}

#[derive(Args, Debug)]
pub struct ProjectArgs {
    /// Project identifier
    pub id: String,
}

#[derive(Args, Debug)]
pub struct ExploreArgs {
    /// Initial filter; change it later with `status`, `capacity`, `eeg` and `dates` lines
    #[command(flatten)]
    pub filter: FilterArgs,
}
