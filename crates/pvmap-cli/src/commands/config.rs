//! Config command: effective settings and their origin

use crate::context::AppContext;
use crate::output::OutputWriter;
use crate::output_types::ConfigRow;
use anyhow::Result;

pub fn execute(ctx: &AppContext, output: &OutputWriter) -> Result<()> {
    let mut rows: Vec<ConfigRow> = ctx
        .config
        .to_inspection_map()
        .into_iter()
        .map(|(key, (value, source))| ConfigRow { key, value, source: format!("{:?}", source) })
        .collect();
    rows.sort_by(|a, b| a.key.cmp(&b.key));

    if output.is_json() {
        return output.result(&rows);
    }

    output.section("Configuration");
    output.table(&rows)?;

    match ctx.data_file() {
        Some(path) => output.info(format!("Projects are read from {}", path.display())),
        None => match ctx.config.require_remote() {
            Ok(remote) => output.success(format!("Remote API configured at {}", remote.endpoint_url)),
            Err(e) => output.warning(format!("{}; set it or pass --data <file>", e)),
        },
    }
    Ok(())
}
