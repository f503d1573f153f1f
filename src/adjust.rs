// Region price adjustment.
//
// For each region a scalar ratio between locally observed and global prices
// is derived from the crops both tables know about. Crops the region has a
// local price for keep it; every other crop gets the global price scaled by
// the ratio.
use crate::types::{GlobalPriceLookup, RegionAdjustment, RegionCropPrice, RegionRecord};
use crate::util::mean;
use log::{debug, warn};
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashMap};

/// Name of the synthetic region holding unscaled global prices.
pub const GLOBAL_REGION: &str = "Global";

pub const CHINA_GROUP_ID: u32 = 9999;
pub const EASTERN_ASIA_GROUP_ID: u32 = 5302;

/// Ratio applied when a region shares no crops with the global table.
const FALLBACK_RATIO: f64 = 1.0;

/// Regions without local price observations of their own, mapped to the
/// region whose observations stand in for them. Only the data source
/// changes; output stays labelled with the original region's name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionOverrides(HashMap<u32, u32>);

/// China has no local prices, so Eastern Asia's are used.
pub static DEFAULT_REGION_OVERRIDES: Lazy<RegionOverrides> =
    Lazy::new(|| RegionOverrides::from([(CHINA_GROUP_ID, EASTERN_ASIA_GROUP_ID)]));

impl RegionOverrides {
    /// The group whose local prices should be used for `group_id`
    pub fn source_for(&self, group_id: u32) -> u32 {
        self.0.get(&group_id).copied().unwrap_or(group_id)
    }
}

impl<const N: usize> From<[(u32, u32); N]> for RegionOverrides {
    fn from(pairs: [(u32, u32); N]) -> Self {
        Self(HashMap::from(pairs))
    }
}

/// Region name → crop name → price.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdjustedPriceMap(BTreeMap<String, BTreeMap<String, f64>>);

impl AdjustedPriceMap {
    pub fn get(&self, region: &str, crop: &str) -> Option<f64> {
        self.region(region)?.get(crop).copied()
    }

    pub fn region(&self, region: &str) -> Option<&BTreeMap<String, f64>> {
        self.0.get(region)
    }

    /// Column order for output: `Global` first, then every other region
    /// alphabetically.
    pub fn column_order(&self) -> Vec<&str> {
        self.0
            .contains_key(GLOBAL_REGION)
            .then_some(GLOBAL_REGION)
            .into_iter()
            .chain(
                self.0
                    .keys()
                    .map(String::as_str)
                    .filter(|r| *r != GLOBAL_REGION),
            )
            .collect()
    }

    /// Crop names, sorted.
    pub fn crops(&self) -> Vec<&str> {
        let mut crops: Vec<&str> = self
            .0
            .values()
            .flat_map(|prices| prices.keys().map(String::as_str))
            .collect();
        crops.sort_unstable();
        crops.dedup();
        crops
    }

    fn insert_region(&mut self, region: String, prices: BTreeMap<String, f64>) {
        self.0.insert(region, prices);
    }
}

/// Result of the price adjustment: the price table plus a record of how each
/// region was handled.
#[derive(Debug, Clone)]
pub struct PriceAdjustment {
    pub prices: AdjustedPriceMap,
    pub adjustments: Vec<RegionAdjustment>,
}

/// Local price per lower-cased crop name for every group. Repeated
/// observations of a crop are averaged.
fn local_prices_by_group(local: &[RegionCropPrice]) -> HashMap<u32, BTreeMap<String, f64>> {
    let mut observations: HashMap<u32, BTreeMap<String, Vec<f64>>> = HashMap::new();
    for row in local {
        observations
            .entry(row.group_id)
            .or_default()
            .entry(row.item.to_lowercase())
            .or_default()
            .push(row.avg_pp);
    }

    observations
        .into_iter()
        .map(|(group_id, crops)| {
            let crops = crops
                .into_iter()
                .filter_map(|(crop, prices)| mean(&prices).map(|p| (crop, p)))
                .collect();
            (group_id, crops)
        })
        .collect()
}

/// Ratio of mean local price to mean global price over `matched` crops.
///
/// `None` if nothing matched or the global mean is zero.
fn adjustment_ratio(
    matched: &[&String],
    local: &BTreeMap<String, f64>,
    global: &GlobalPriceLookup,
) -> Option<f64> {
    let local_prices: Vec<f64> = matched.iter().map(|c| local[c.as_str()]).collect();
    let global_prices: Vec<f64> = matched
        .iter()
        .map(|c| global[c.as_str()].avg_global_price)
        .collect();
    let ratio = mean(&local_prices)? / mean(&global_prices)?;
    ratio.is_finite().then_some(ratio)
}

/// Compute the adjusted price of every global crop in every region, plus the
/// synthetic `Global` region holding the unscaled global prices.
pub fn adjust_prices(
    regions: &[RegionRecord],
    local: &[RegionCropPrice],
    global: &GlobalPriceLookup,
    overrides: &RegionOverrides,
) -> PriceAdjustment {
    let local_by_group = local_prices_by_group(local);
    let no_local = BTreeMap::new();

    let mut prices = AdjustedPriceMap::default();
    let mut adjustments = Vec::with_capacity(regions.len());
    for region in regions {
        let source_group_id = overrides.source_for(region.group_id);
        let region_local = local_by_group.get(&source_group_id).unwrap_or(&no_local);

        let matched: Vec<&String> = region_local
            .keys()
            .filter(|crop| global.contains_key(*crop))
            .collect();
        let ratio = adjustment_ratio(&matched, region_local, global);
        match ratio {
            Some(ratio) => debug!(
                "Region '{}' (group {}): ratio {:.4} from {} shared crops",
                region.group_name,
                source_group_id,
                ratio,
                matched.len()
            ),
            None => warn!(
                "Region '{}' (group {}) shares no priced crops with the global table; \
                 using unscaled global prices",
                region.group_name, source_group_id
            ),
        }
        let effective_ratio = ratio.unwrap_or(FALLBACK_RATIO);

        let region_prices: BTreeMap<String, f64> = global
            .iter()
            .map(|(crop, record)| {
                let price = region_local
                    .get(crop)
                    .copied()
                    .unwrap_or(record.avg_global_price * effective_ratio);
                (crop.clone(), price)
            })
            .collect();

        adjustments.push(RegionAdjustment {
            region: region.group_name.clone(),
            group_id: region.group_id,
            source_group_id,
            ratio,
            matched_crops: matched.len(),
            observed_crops: region_local.len(),
            extrapolated_crops: global.len() - matched.len(),
        });
        prices.insert_region(region.group_name.clone(), region_prices);
    }

    prices.insert_region(
        GLOBAL_REGION.to_string(),
        global
            .iter()
            .map(|(crop, record)| (crop.clone(), record.avg_global_price))
            .collect(),
    );

    PriceAdjustment {
        prices,
        adjustments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CropGlobalRecord;
    use float_cmp::assert_approx_eq;
    use rstest::{fixture, rstest};

    fn global_lookup(prices: &[(&str, f64)]) -> GlobalPriceLookup {
        prices
            .iter()
            .map(|(crop, price)| {
                (
                    crop.to_string(),
                    CropGlobalRecord {
                        crop_name: crop.to_string(),
                        monfreda_id: crop.to_string(),
                        avg_global_price: *price,
                    },
                )
            })
            .collect()
    }

    fn region(group_id: u32, name: &str) -> RegionRecord {
        RegionRecord {
            group_id,
            group_name: name.to_string(),
        }
    }

    fn local(group_id: u32, name: &str, item: &str, avg_pp: f64) -> RegionCropPrice {
        RegionCropPrice {
            group_id,
            group_name: name.to_string(),
            item: item.to_string(),
            avg_pp,
        }
    }

    #[fixture]
    fn global() -> GlobalPriceLookup {
        global_lookup(&[("wheat", 200.0), ("rice", 300.0), ("maize", 100.0)])
    }

    #[rstest]
    fn test_worked_example() {
        let global = global_lookup(&[("wheat", 200.0), ("rice", 300.0)]);
        let result = adjust_prices(
            &[region(1, "Europe")],
            &[local(1, "Europe", "Wheat", 250.0)],
            &global,
            &DEFAULT_REGION_OVERRIDES,
        );

        assert_approx_eq!(f64, result.adjustments[0].ratio.unwrap(), 1.25);
        assert_approx_eq!(f64, result.prices.get("Europe", "rice").unwrap(), 375.0);
        assert_approx_eq!(f64, result.prices.get("Europe", "wheat").unwrap(), 250.0);
        assert_approx_eq!(f64, result.prices.get("Global", "wheat").unwrap(), 200.0);
        assert_approx_eq!(f64, result.prices.get("Global", "rice").unwrap(), 300.0);
    }

    #[rstest]
    fn test_every_region_has_every_crop(global: GlobalPriceLookup) {
        let regions = [region(1, "Europe"), region(2, "Africa"), region(3, "Oceania")];
        let local_rows = [
            local(1, "Europe", "wheat", 220.0),
            local(2, "Africa", "cassava", 80.0),
            local(2, "Africa", "maize", 90.0),
        ];
        let result = adjust_prices(&regions, &local_rows, &global, &DEFAULT_REGION_OVERRIDES);

        assert_eq!(result.prices.column_order().len(), regions.len() + 1);
        for name in ["Europe", "Africa", "Oceania", GLOBAL_REGION] {
            let crops: Vec<&String> = result.prices.region(name).unwrap().keys().collect();
            let expected: Vec<&String> = global.keys().collect();
            assert_eq!(crops, expected, "{name}");
        }
    }

    #[rstest]
    fn test_local_prices_unscaled_and_others_scaled(global: GlobalPriceLookup) {
        let local_rows = [
            local(1, "Europe", "wheat", 220.0),
            local(1, "Europe", "rice", 390.0),
        ];
        let result = adjust_prices(
            &[region(1, "Europe")],
            &local_rows,
            &global,
            &DEFAULT_REGION_OVERRIDES,
        );

        // (220 + 390) / 2 = 305; (200 + 300) / 2 = 250
        let ratio = 305.0 / 250.0;
        assert_approx_eq!(f64, result.adjustments[0].ratio.unwrap(), ratio);
        assert_eq!(result.prices.get("Europe", "wheat"), Some(220.0));
        assert_eq!(result.prices.get("Europe", "rice"), Some(390.0));
        assert_approx_eq!(
            f64,
            result.prices.get("Europe", "maize").unwrap(),
            100.0 * ratio
        );
        assert_eq!(result.adjustments[0].matched_crops, 2);
        assert_eq!(result.adjustments[0].extrapolated_crops, 1);
    }

    #[rstest]
    fn test_global_region_is_unscaled(global: GlobalPriceLookup) {
        let result = adjust_prices(
            &[region(1, "Europe")],
            &[local(1, "Europe", "wheat", 1000.0)],
            &global,
            &DEFAULT_REGION_OVERRIDES,
        );
        for (crop, record) in &global {
            assert_eq!(
                result.prices.get(GLOBAL_REGION, crop),
                Some(record.avg_global_price)
            );
        }
    }

    #[rstest]
    fn test_china_uses_eastern_asia_prices(global: GlobalPriceLookup) {
        let regions = [
            region(EASTERN_ASIA_GROUP_ID, "Eastern Asia"),
            region(CHINA_GROUP_ID, "China"),
        ];
        let local_rows = [
            local(EASTERN_ASIA_GROUP_ID, "Eastern Asia", "wheat", 180.0),
            local(EASTERN_ASIA_GROUP_ID, "Eastern Asia", "rice", 330.0),
        ];
        let result = adjust_prices(&regions, &local_rows, &global, &DEFAULT_REGION_OVERRIDES);

        let china = &result.adjustments[1];
        assert_eq!(china.region, "China");
        assert_eq!(china.group_id, CHINA_GROUP_ID);
        assert_eq!(china.source_group_id, EASTERN_ASIA_GROUP_ID);
        assert_eq!(china.ratio, result.adjustments[0].ratio);
        assert_eq!(
            result.prices.region("China"),
            result.prices.region("Eastern Asia")
        );
    }

    #[rstest]
    fn test_no_overrides_leaves_china_without_ratio(global: GlobalPriceLookup) {
        let result = adjust_prices(
            &[region(CHINA_GROUP_ID, "China")],
            &[local(EASTERN_ASIA_GROUP_ID, "Eastern Asia", "wheat", 180.0)],
            &global,
            &RegionOverrides::default(),
        );
        assert_eq!(result.adjustments[0].ratio, None);
    }

    #[rstest]
    fn test_empty_intersection_falls_back_to_global_prices(global: GlobalPriceLookup) {
        let result = adjust_prices(
            &[region(7, "Antarctica")],
            &[local(7, "Antarctica", "krill", 50.0)],
            &global,
            &DEFAULT_REGION_OVERRIDES,
        );

        let adjustment = &result.adjustments[0];
        assert_eq!(adjustment.ratio, None);
        assert_eq!(adjustment.matched_crops, 0);
        assert_eq!(adjustment.observed_crops, 1);
        for (crop, record) in &global {
            let price = result.prices.get("Antarctica", crop).unwrap();
            assert!(price.is_finite());
            assert_eq!(price, record.avg_global_price);
        }
    }

    #[rstest]
    fn test_crop_names_match_case_insensitively(global: GlobalPriceLookup) {
        let result = adjust_prices(
            &[region(1, "Europe")],
            &[local(1, "Europe", "WHEAT", 400.0)],
            &global,
            &DEFAULT_REGION_OVERRIDES,
        );
        assert_approx_eq!(f64, result.adjustments[0].ratio.unwrap(), 2.0);
        assert_eq!(result.prices.get("Europe", "wheat"), Some(400.0));
        assert_approx_eq!(f64, result.prices.get("Europe", "rice").unwrap(), 600.0);
    }

    #[rstest]
    fn test_repeated_observations_are_averaged(global: GlobalPriceLookup) {
        let result = adjust_prices(
            &[region(1, "Europe")],
            &[
                local(1, "Europe", "wheat", 100.0),
                local(1, "Europe", "Wheat", 300.0),
            ],
            &global,
            &DEFAULT_REGION_OVERRIDES,
        );
        assert_approx_eq!(f64, result.prices.get("Europe", "wheat").unwrap(), 200.0);
        assert_approx_eq!(f64, result.adjustments[0].ratio.unwrap(), 1.0);
    }

    #[test]
    fn test_region_overrides() {
        assert_eq!(
            DEFAULT_REGION_OVERRIDES.source_for(CHINA_GROUP_ID),
            EASTERN_ASIA_GROUP_ID
        );
        assert_eq!(DEFAULT_REGION_OVERRIDES.source_for(42), 42);

        let overrides = RegionOverrides::from([(1, 2), (3, 4)]);
        assert_eq!(overrides.source_for(3), 4);
        assert_eq!(overrides.source_for(CHINA_GROUP_ID), CHINA_GROUP_ID);
    }

    #[test]
    fn test_column_order() {
        let global = global_lookup(&[("wheat", 1.0)]);
        let regions = [region(1, "Zambia"), region(2, "Africa"), region(3, "Global South")];
        let result = adjust_prices(&regions, &[], &global, &DEFAULT_REGION_OVERRIDES);
        assert_eq!(
            result.prices.column_order(),
            vec!["Global", "Africa", "Global South", "Zambia"]
        );
        assert_eq!(result.prices.crops(), vec!["wheat"]);
    }
}
