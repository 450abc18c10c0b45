//! Explore command: a scripted map session.
//!
//! Each stdin line is one interaction:
//!
//! ```text
//! view 5.87,47.27,15.04,55.06 6.3   # map settled on a region at a zoom
//! status operating,planned          # also: all, none
//! capacity 10000 500000
//! eeg merchant_likely               # also: all
//! dates 2019-01-01 -                # '-' leaves a bound open
//! wait                              # block until the latest query settled
//! ```
//!
//! Events go through the same coordinator a map frontend uses, so bursts are
//! debounced and stale results are dropped.

use crate::cli::{parse_bbox, ExploreArgs};
use crate::context::AppContext;
use crate::output::OutputWriter;
use crate::output_types::{ItemOutput, ItemRow};
use anyhow::{bail, Context, Result};
use pvmap_core::models::{
    AwardBucket, AwardSelection, CapacityRange, DateWindow, FilterState, ProjectStatus,
    StatusSelection, Viewport,
};
use pvmap_query::{MapView, QueryCoordinator, QueryToken};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

/// One parsed stdin line
#[derive(Debug, Clone, PartialEq)]
enum Interaction {
    View(Viewport),
    Statuses(StatusSelection),
    Capacity(CapacityRange),
    AwardBuckets(AwardSelection),
    Dates(DateWindow),
    Wait,
}

fn parse_line(line: &str) -> Result<Option<Interaction>> {
    let line = line.split('#').next().unwrap_or("").trim();
    if line.is_empty() {
        return Ok(None);
    }

    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or("");
    let args: Vec<&str> = parts.collect();

    let interaction = match (command, args.as_slice()) {
        ("view", [bbox, zoom]) => {
            let zoom: f64 = zoom.parse().with_context(|| format!("Invalid zoom '{}'", zoom))?;
            Interaction::View(Viewport::from_map_idle(parse_bbox(bbox)?, zoom)?)
        }
        ("status", ["all"]) => Interaction::Statuses(StatusSelection::all()),
        ("status", ["none"]) => Interaction::Statuses(StatusSelection::none()),
        ("status", [list]) => Interaction::Statuses(StatusSelection::only(
            list.split(',').map(str::parse::<ProjectStatus>).collect::<Result<Vec<_>, _>>()?,
        )),
        ("capacity", [min, max]) => Interaction::Capacity(CapacityRange::new(
            min.parse().with_context(|| format!("Invalid capacity '{}'", min))?,
            max.parse().with_context(|| format!("Invalid capacity '{}'", max))?,
        )?),
        ("eeg", ["all"]) => Interaction::AwardBuckets(AwardSelection::unfiltered()),
        ("eeg", [list]) => Interaction::AwardBuckets(AwardSelection::only(
            list.split(',').map(str::parse::<AwardBucket>).collect::<Result<Vec<_>, _>>()?,
        )),
        ("dates", [after, before]) => {
            let after = if *after == "-" { "" } else { *after };
            let before = if *before == "-" { "" } else { *before };
            Interaction::Dates(DateWindow::from_inputs(after, before)?)
        }
        ("wait", []) => Interaction::Wait,
        _ => bail!("Unrecognized line '{}'", line),
    };

    Ok(Some(interaction))
}

/// One line of progress output
#[derive(Debug, Serialize)]
struct ViewSummary {
    applied: Option<QueryToken>,
    latest_issued: Option<QueryToken>,
    zoom: Option<u8>,
    project_count: usize,
    clusters: usize,
    markers: usize,
    last_error: Option<String>,
}

impl From<&MapView> for ViewSummary {
    fn from(view: &MapView) -> Self {
        let items = view.render_items();
        let clusters = items.iter().filter(|i| i.is_cluster()).count();
        Self {
            applied: view.applied,
            latest_issued: view.latest_issued,
            zoom: view.viewport.map(|v| v.zoom),
            project_count: view.project_count(),
            clusters,
            markers: items.len() - clusters,
            last_error: view.last_error.clone(),
        }
    }
}

fn report(view: &MapView, output: &OutputWriter) {
    let summary = ViewSummary::from(view);
    if output.is_json() {
        if let Err(e) = output.data(&summary) {
            tracing::warn!(error = %e, "Failed to print view summary");
        }
        return;
    }

    let applied = summary.applied.map(|t| t.to_string()).unwrap_or_else(|| "-".to_string());
    output.info(format!(
        "query {} applied: {} projects as {} clusters and {} markers at zoom {}",
        applied,
        summary.project_count,
        summary.clusters,
        summary.markers,
        summary.zoom.map(|z| z.to_string()).unwrap_or_else(|| "-".to_string()),
    ));
}

/// Print a line whenever a result is applied or a query fails
async fn watch_views(mut views: watch::Receiver<MapView>, output: OutputWriter) {
    let mut last_applied = None;
    let mut last_error = None;

    while views.changed().await.is_ok() {
        let view = views.borrow_and_update().clone();

        if view.applied != last_applied {
            last_applied = view.applied;
            report(&view, &output);
        }
        if view.last_error != last_error {
            if let Some(error) = &view.last_error {
                output.warning(format!("query failed, keeping previous results: {}", error));
            }
            last_error = view.last_error.clone();
        }
    }
}

pub async fn execute(args: ExploreArgs, ctx: &AppContext, output: &OutputWriter) -> Result<()> {
    let mut filter: FilterState = args.filter.to_filter()?;
    let source = ctx.source()?;

    let mut handle =
        QueryCoordinator::spawn(source, filter.clone(), ctx.options, ctx.config.debounce());
    let watcher = tokio::spawn(watch_views(handle.subscribe(), *output));

    if !output.is_json() {
        output.info(format!(
            "Reading map interactions from stdin (debounce {} ms)",
            ctx.config.debounce_ms.value
        ));
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_no = 0usize;
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        line_no += 1;
        let interaction = match parse_line(&line) {
            Ok(Some(interaction)) => interaction,
            Ok(None) => continue,
            Err(e) => {
                output.warning(format!("line {}: {:#}", line_no, e));
                continue;
            }
        };

        match interaction {
            Interaction::View(viewport) => handle.viewport_idle(viewport)?,
            Interaction::Wait => {
                handle.settled().await?;
            }
            change => {
                filter = match change {
                    Interaction::Statuses(statuses) => filter.with_statuses(statuses),
                    Interaction::Capacity(capacity) => filter.with_capacity(capacity),
                    Interaction::AwardBuckets(buckets) => filter.with_award_buckets(buckets),
                    Interaction::Dates(window) => filter.with_completion(window),
                    Interaction::View(_) | Interaction::Wait => filter,
                };
                handle.set_filter(filter.clone())?;
            }
        }
    }

    let view = handle.settled().await?;
    handle.shutdown().await;
    if let Err(e) = watcher.await {
        tracing::debug!(error = %e, "View watcher ended abnormally");
    }

    if view.viewport.is_none() {
        output.warning("No `view` line was read, nothing was queried");
        return Ok(());
    }

    let items = view.render_items();
    let outputs = ItemOutput::collect(&view.index, &items);
    if output.is_json() {
        return output.result(&outputs);
    }

    output.section("Final map");
    report(&view, output);
    let rows: Vec<ItemRow> = outputs.iter().map(ItemRow::from).collect();
    output.table(&rows)
}
