mod bootstrap;
mod report;

use anyhow::{Context, Result};
use pulse_core::settings::Settings;
use pulse_core::time_utils::StudioClock;
use pulse_data::analysis::analyze_studio;
use pulse_data::reader::load_records;

fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level)?;

    tracing::info!("Studio Pulse v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Granularity: {}, Group by: {}, Timezone: {}",
        settings.granularity,
        settings.group_by,
        settings.timezone
    );

    let clock = StudioClock::new(&settings.timezone);
    let config = settings
        .engine_config(clock.today())
        .context("invalid report configuration")?;

    let data_path = settings
        .data_path
        .clone()
        .or_else(bootstrap::discover_data_path)
        .context("no data directory found; pass --data-path or create ./data")?;
    tracing::info!("Loading exports from {}", data_path.display());

    let loaded = load_records(&data_path)?;
    let studio_report = analyze_studio(&loaded.records, &config);

    match settings.output.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&studio_report)?),
        _ => print!("{}", report::render_report(&studio_report, &settings.currency)),
    }

    Ok(())
}
