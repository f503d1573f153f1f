// Entry point and high-level pipeline.
//
// - Fetch the agricultural cost table and the global crop price table into
//   the workspace (skipped when already present).
// - Load and normalize both tables.
// - Derive a price adjustment ratio per region and extrapolate prices for
//   every crop the global table knows.
// - Write the adjusted price table, a JSON summary and a console preview.
mod adjust;
mod config;
mod fetch;
mod loader;
mod log;
mod output;
mod types;
mod util;

use ::log::info;
use adjust::{adjust_prices, PriceAdjustment, DEFAULT_REGION_OVERRIDES};
use anyhow::{Context, Result};
use config::{Config, DOWNLOAD_WORKERS};
use fetch::{fetch_all, http_client, Download};
use std::path::PathBuf;
use types::{AdjustmentPreviewRow, AdjustmentSummary};

/// Number of regions shown in the console preview.
const PREVIEW_ROWS: usize = 5;

/// Local paths of the two source tables, once fetched.
struct SourceTables {
    ag_cost: PathBuf,
    crop_global_cost: PathBuf,
}

/// Create the workspace and make sure both source tables are in it.
fn handle_fetch(config: &Config) -> Result<SourceTables> {
    std::fs::create_dir_all(&config.workspace_dir).with_context(|| {
        format!(
            "Could not create workspace {}",
            config.workspace_dir.display()
        )
    })?;

    let crop_global_cost = Download::into_dir(&config.crop_global_cost_url, &config.workspace_dir)?;
    let ag_cost = Download::into_dir(&config.ag_cost_url, &config.workspace_dir)?;

    let client = http_client()?;
    fetch_all(
        &client,
        &[crop_global_cost.clone(), ag_cost.clone()],
        DOWNLOAD_WORKERS,
    )?;

    Ok(SourceTables {
        ag_cost: ag_cost.target,
        crop_global_cost: crop_global_cost.target,
    })
}

/// Load both tables and compute adjusted prices for every region.
fn handle_adjust(sources: &SourceTables) -> Result<PriceAdjustment> {
    let cost_tables = loader::load_cost_tables(&sources.ag_cost)?;
    let global_prices = loader::load_global_prices(&sources.crop_global_cost)?;

    Ok(adjust_prices(
        &cost_tables.regions,
        &cost_tables.price_per_ton,
        &global_prices,
        &DEFAULT_REGION_OVERRIDES,
    ))
}

/// Write the price table and summary, then print a preview of the ratios.
fn handle_write(config: &Config, adjustment: &PriceAdjustment) -> Result<()> {
    let table_path = config.adjusted_price_table_path();
    output::write_price_table_file(&table_path, &adjustment.prices)?;
    info!(
        "Adjusted prices for {} regions and {} crops written to {}",
        util::format_int(adjustment.adjustments.len()),
        util::format_int(adjustment.prices.crops().len()),
        table_path.display()
    );

    let summary = AdjustmentSummary {
        total_regions: adjustment.adjustments.len(),
        total_crops: adjustment.prices.crops().len(),
        regions_without_ratio: adjustment
            .adjustments
            .iter()
            .filter(|a| a.ratio.is_none())
            .count(),
        regions: adjustment.adjustments.clone(),
    };
    let summary_path = config.adjustment_summary_path();
    output::write_json(&summary_path, &summary)?;
    info!("Adjustment summary written to {}", summary_path.display());

    let preview: Vec<AdjustmentPreviewRow> = adjustment
        .adjustments
        .iter()
        .map(|a| AdjustmentPreviewRow {
            region: a.region.clone(),
            group_id: a.group_id,
            source_group_id: a.source_group_id,
            matched_crops: a.matched_crops,
            ratio: a.ratio.map_or_else(|| "n/a".to_string(), |r| format!("{r:.4}")),
        })
        .collect();
    println!("Regional price adjustment ratios (first {PREVIEW_ROWS}):\n");
    output::preview_table_rows(&preview, PREVIEW_ROWS);
    Ok(())
}

fn main() -> Result<()> {
    log::init()?;
    let config = Config::from_env();

    let sources = handle_fetch(&config)?;
    let adjustment = handle_adjust(&sources)?;
    handle_write(&config, &adjustment)
}
