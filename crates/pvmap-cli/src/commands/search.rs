//! Search command: one query, clustered for a single viewport

use crate::cli::SearchArgs;
use crate::context::AppContext;
use crate::errors;
use crate::output::OutputWriter;
use crate::output_types::{ItemOutput, ItemRow, SearchOutput};
use crate::progress::{create_spinner, finish_error, finish_success};
use anyhow::Result;
use pvmap_core::models::{FilterState, SearchRequest, Viewport};
use pvmap_geo::{project, to_feature_collection, ClusterIndex};

pub async fn execute(args: SearchArgs, ctx: &AppContext, output: &OutputWriter) -> Result<()> {
    let viewport = args.viewport.to_viewport()?;
    let filter = args.filter.to_filter()?;

    let (request, index) = fetch_index(ctx, &viewport, &filter, output).await?;
    let items = project(&index, &viewport);

    if args.geojson {
        return output.data(&to_feature_collection(&items));
    }

    let outputs = ItemOutput::collect(&index, &items);
    if output.is_json() {
        return output.result(SearchOutput {
            request: &request,
            viewport,
            project_count: index.len(),
            items: outputs,
        });
    }

    output.section("Search");
    let [west, south, east, north] = request.bbox;
    output.kv("Region", format!("{:.3}, {:.3} .. {:.3}, {:.3}", west, south, east, north));
    output.kv("Zoom", viewport.zoom);
    output.kv("Capacity", format!("{} - {} kWp", request.min_capacity, request.max_capacity));
    output.kv(
        "Statuses",
        if request.statuses.is_empty() {
            "(none)".to_string()
        } else {
            request.statuses.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
        },
    );

    output.section("Map");
    let clusters = items.iter().filter(|i| i.is_cluster()).count();
    output.info(format!(
        "{} projects drawn as {} clusters and {} single markers",
        index.len(),
        clusters,
        items.len() - clusters
    ));
    let rows: Vec<ItemRow> = outputs.iter().map(ItemRow::from).collect();
    output.table(&rows)
}

/// Run the search for a viewport and index the result
pub(super) async fn fetch_index(
    ctx: &AppContext,
    viewport: &Viewport,
    filter: &FilterState,
    output: &OutputWriter,
) -> Result<(SearchRequest, ClusterIndex)> {
    let source = ctx.source()?;
    let request = filter.to_request(&viewport.bbox);

    let spinner = create_spinner("Searching projects...", output.is_json());
    let records = match source.search(&request).await {
        Ok(records) => {
            finish_success(&spinner, &format!("Found {} projects", records.len()));
            records
        }
        Err(e) => {
            finish_error(&spinner, "Search failed");
            return Err(errors::from_source_error(e));
        }
    };

    Ok((request, ClusterIndex::build(records, ctx.options)))
}
