//! Expand command: what a cluster click reveals

use crate::cli::ExpandArgs;
use crate::context::AppContext;
use crate::errors;
use crate::output::OutputWriter;
use crate::output_types::{ExpandOutput, ItemOutput, ItemRow, ProjectRow};
use anyhow::Result;
use pvmap_geo::ClusterId;

use super::search::fetch_index;

pub async fn execute(args: ExpandArgs, ctx: &AppContext, output: &OutputWriter) -> Result<()> {
    let id: ClusterId = args
        .cluster
        .parse()
        .map_err(|_| errors::cluster_not_found(&args.cluster))?;
    let viewport = args.viewport.to_viewport()?;
    let filter = args.filter.to_filter()?;

    let (_, index) = fetch_index(ctx, &viewport, &filter, output).await?;

    let expansion_zoom =
        index.expansion_zoom(id).ok_or_else(|| errors::cluster_not_found(&args.cluster))?;
    let children = index.children(id).unwrap_or_default();
    let leaves = index.leaves(id, args.limit, args.offset).unwrap_or_default();
    let children = ItemOutput::collect(&index, &children);

    if output.is_json() {
        return output.result(ExpandOutput {
            cluster_id: id.to_string(),
            expansion_zoom,
            children,
            leaves,
        });
    }

    output.section(format!("Cluster {}", id));
    output.kv("Splits at zoom", expansion_zoom);
    output.kv("Children", children.len());

    output.section("Children");
    let rows: Vec<ItemRow> = children.iter().map(ItemRow::from).collect();
    output.table(&rows)?;

    output.section("Projects");
    let rows: Vec<ProjectRow> = leaves.iter().map(|p| ProjectRow::from(*p)).collect();
    output.table(&rows)
}
