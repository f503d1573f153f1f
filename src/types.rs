use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tabled::Tabled;

/// One row of the aggregated agricultural cost table, exactly as read.
#[derive(Debug, Deserialize)]
pub struct RawCostRow {
    #[serde(rename = "group")]
    pub group: Option<String>,
    #[serde(rename = "group_name")]
    pub group_name: Option<String>,
    #[serde(rename = "item")]
    pub item: Option<String>,
    #[serde(rename = "avgPP")]
    pub avg_pp: Option<String>,
    #[serde(rename = "avg_N")]
    pub avg_n: Option<String>,
    #[serde(rename = "avg_P")]
    pub avg_p: Option<String>,
    #[serde(rename = "avg_K")]
    pub avg_k: Option<String>,
    #[serde(rename = "laborcost")]
    pub labor_cost: Option<String>,
    #[serde(rename = "actual_mach")]
    pub actual_mach: Option<String>,
    #[serde(rename = "actual_seed")]
    pub actual_seed: Option<String>,
}

/// Columns the cost table must carry.
pub const COST_COLUMNS: [&str; 10] = [
    "group",
    "group_name",
    "item",
    "avgPP",
    "avg_N",
    "avg_P",
    "avg_K",
    "laborcost",
    "actual_mach",
    "actual_seed",
];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegionRecord {
    pub group_id: u32,
    pub group_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CropGlobalRecord {
    pub crop_name: String,
    pub monfreda_id: String,
    pub avg_global_price: f64,
}

/// Global prices keyed by lower-cased crop name. Sorted so every consumer
/// walks crops in the same order.
pub type GlobalPriceLookup = BTreeMap<String, CropGlobalRecord>;

/// Observed local price per ton (`avgPP`) for a crop within a region.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionCropPrice {
    pub group_id: u32,
    pub group_name: String,
    pub item: String,
    pub avg_pp: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FertRate {
    pub group_id: u32,
    pub item: String,
    pub avg_n: f64,
    pub avg_p: f64,
    pub avg_k: f64,
}

/// A single per-hectare cost (labor, machinery or seed) for a crop in a region.
#[derive(Debug, Clone, PartialEq)]
pub struct PerHaCost {
    pub group_id: u32,
    pub item: String,
    pub cost: f64,
}

/// Everything derived from the cost table.
#[derive(Debug, Clone, Default)]
pub struct CostTables {
    pub regions: Vec<RegionRecord>,
    pub price_per_ton: Vec<RegionCropPrice>,
    pub fert_rates: Vec<FertRate>,
    pub labor_per_ha: Vec<PerHaCost>,
    pub machinery_per_ha: Vec<PerHaCost>,
    pub seed_per_ha: Vec<PerHaCost>,
}

/// How the price adjustment went for one region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionAdjustment {
    pub region: String,
    pub group_id: u32,
    /// Group whose local prices were used (differs from `group_id` when overridden).
    pub source_group_id: u32,
    /// `None` when no crop is shared between the local and global tables.
    pub ratio: Option<f64>,
    pub matched_crops: usize,
    pub observed_crops: usize,
    pub extrapolated_crops: usize,
}

#[derive(Debug, Serialize)]
pub struct AdjustmentSummary {
    pub total_regions: usize,
    pub total_crops: usize,
    pub regions_without_ratio: usize,
    pub regions: Vec<RegionAdjustment>,
}

#[derive(Debug, Tabled, Clone)]
pub struct AdjustmentPreviewRow {
    #[tabled(rename = "Region")]
    pub region: String,
    #[tabled(rename = "Group")]
    pub group_id: u32,
    #[tabled(rename = "PriceSource")]
    pub source_group_id: u32,
    #[tabled(rename = "MatchedCrops")]
    pub matched_crops: usize,
    #[tabled(rename = "Ratio")]
    pub ratio: String,
}
