//! Project command: the detail view of a single marker

use crate::cli::ProjectArgs;
use crate::context::AppContext;
use crate::errors;
use crate::output::OutputWriter;
use crate::progress::{create_spinner, finish_error, finish_success};
use anyhow::Result;
use pvmap_core::models::ProjectId;

pub async fn execute(args: ProjectArgs, ctx: &AppContext, output: &OutputWriter) -> Result<()> {
    let source = ctx.source()?;
    let id = ProjectId::new(args.id.trim());

    let spinner = create_spinner("Loading project...", output.is_json());
    let detail = match source.get_project(&id).await {
        Ok(Some(detail)) => {
            finish_success(&spinner, "Loaded project");
            detail
        }
        Ok(None) => {
            finish_error(&spinner, "Not found");
            return Err(errors::project_not_found(id.as_str()).into());
        }
        Err(e) => {
            finish_error(&spinner, "Lookup failed");
            return Err(errors::from_source_error(e));
        }
    };

    if output.is_json() {
        return output.result(&detail);
    }

    let record = &detail.record;
    output.section(if record.name.is_empty() { record.id.as_str() } else { record.name.as_str() });
    output.kv("Id", &record.id);
    output.kv("Status", record.status);
    output.kv("Capacity", format!("{:.1} kWp", record.capacity_kwp));
    if let Some(date) = record.completion_date {
        output.kv("Completed", date);
    }
    if let Some(date) = record.planned_date {
        output.kv("Planned", date);
    }
    output.kv("Location", format!("{:.5}, {:.5}", record.lon, record.lat));

    let address = [
        &detail.address_line,
        &detail.postal_code,
        &detail.city,
        &detail.state,
        &detail.country,
    ]
    .into_iter()
    .flatten()
    .map(String::as_str)
    .collect::<Vec<_>>();
    if !address.is_empty() {
        output.kv("Address", address.join(", "));
    }

    if record.operator.is_some() || record.grid_operator.is_some() {
        output.section("Operators");
        if let Some(operator) = &record.operator {
            output.kv("Operator", operator);
        }
        if let Some(grid_operator) = &record.grid_operator {
            output.kv("Grid operator", grid_operator);
        }
    }

    if record.award_bucket.is_some() || detail.eeg_award_id.is_some() {
        output.section("EEG");
        if let Some(bucket) = record.award_bucket {
            output.kv("Bucket", bucket.label());
        }
        if let Some(award_id) = &detail.eeg_award_id {
            output.kv("Award", award_id);
        }
        if let Some(round) = &detail.eeg_auction_round {
            output.kv("Auction round", round);
        }
        if let Some(price) = detail.eeg_reference_price_ct_per_kwh {
            output.kv("Reference price", format!("{:.2} ct/kWh", price));
        }
    }

    let contact = [&record.contact_name, &record.contact_email, &record.contact_phone]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .collect::<Vec<_>>();
    if !contact.is_empty() {
        output.section("Contact");
        output.info(contact.join(" · "));
    }

    Ok(())
}
