mod bootstrap;

use anyhow::{Context, Result};
use clap::Parser;

use adstats_core::settings::Settings;
use adstats_data::pipeline::{run_loaded, BatchConfig};
use adstats_data::reader::{load_page_map, load_raw_ads};
use adstats_data::writer::write_reports;

fn main() -> Result<()> {
    let settings = Settings::parse();

    bootstrap::setup_logging(&settings.log_level)?;
    let base = bootstrap::ensure_directories()?;

    tracing::info!("adstats v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::debug!("Base directory: {}", base.display());

    let context = settings.record_context();
    tracing::info!(
        "As of {}, epoch {}, {} parties",
        context.as_of,
        context.indexer.epoch(),
        settings.parties.len()
    );

    let pages_path = settings.pages_path();
    let pages = load_page_map(&pages_path)
        .with_context(|| format!("loading page map from {}", pages_path.display()))?;

    let input_path = settings.input_path();
    let loaded = load_raw_ads(&input_path)
        .with_context(|| format!("loading ads from {}", input_path.display()))?;
    tracing::info!(
        "Read {} raw ads from {} ({} undecodable)",
        loaded.ads.len(),
        input_path.display(),
        loaded.undecodable
    );

    let config = BatchConfig {
        context: &context,
        pages: &pages,
        parties: &settings.parties,
        keep_stored_ads: settings.stored_ads,
    };
    let outcome = run_loaded(&loaded, &config);

    let output_path = settings.output_path();
    write_reports(&outcome, &output_path, &context.indexer, context.as_of)
        .with_context(|| format!("writing reports to {}", output_path.display()))?;

    if let Some(ad) = outcome.statistics.most_expensive() {
        tracing::info!(
            "Most expensive ad: {} ({}), {:.2} EUR per day",
            ad.id,
            ad,
            ad.spending_per_day
        );
    }

    Ok(())
}
