// Loading and normalizing the two source tables.
use crate::types::{
    CostTables, CropGlobalRecord, FertRate, GlobalPriceLookup, PerHaCost, RawCostRow,
    RegionCropPrice, RegionRecord, COST_COLUMNS,
};
use crate::util::{format_int, non_empty, parse_f64_safe, parse_group_id};
use anyhow::{bail, ensure, Context, Result};
use csv::ReaderBuilder;
use log::{debug, info};
use std::collections::HashSet;
use std::hash::Hash;
use std::path::Path;

/// Keep the first row for every distinct key, preserving input order.
fn dedup_by_key<T, K, F>(rows: Vec<T>, key: F) -> Vec<T>
where
    K: Hash + Eq,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::new();
    rows.into_iter().filter(|r| seen.insert(key(r))).collect()
}

/// Read the aggregated agricultural cost table and split it into the region
/// table, local prices and the per-hectare cost sub-tables.
///
/// The file carries a second header row (units) directly under the real
/// header; it is skipped. Rows missing any value a sub-table needs are left
/// out of that sub-table only.
pub fn load_cost_tables(path: &Path) -> Result<CostTables> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_path(path)
        .with_context(|| format!("Could not open cost table {}", path.display()))?;

    let headers = rdr.headers()?.clone();
    for column in COST_COLUMNS {
        ensure!(
            headers.iter().any(|h| h == column),
            "Cost table {} is missing column '{column}'",
            path.display()
        );
    }

    let mut tables = CostTables::default();
    let mut total_rows = 0usize;
    for (idx, result) in rdr.deserialize::<RawCostRow>().enumerate().skip(1) {
        // +2: one for the header, one for zero-based indexing
        let row = result
            .with_context(|| format!("Malformed row {} in {}", idx + 2, path.display()))?;
        total_rows += 1;

        let Some(group_id) = parse_group_id(row.group.as_deref()) else {
            continue;
        };
        let group_name = non_empty(row.group_name.as_deref());
        let item = non_empty(row.item.as_deref());

        if let Some(group_name) = &group_name {
            tables.regions.push(RegionRecord {
                group_id,
                group_name: group_name.clone(),
            });
        }

        let Some(item) = item else {
            continue;
        };

        if let (Some(group_name), Some(avg_pp)) =
            (&group_name, parse_f64_safe(row.avg_pp.as_deref()))
        {
            tables.price_per_ton.push(RegionCropPrice {
                group_id,
                group_name: group_name.clone(),
                item: item.clone(),
                avg_pp,
            });
        }

        if let (Some(avg_n), Some(avg_p), Some(avg_k)) = (
            parse_f64_safe(row.avg_n.as_deref()),
            parse_f64_safe(row.avg_p.as_deref()),
            parse_f64_safe(row.avg_k.as_deref()),
        ) {
            tables.fert_rates.push(FertRate {
                group_id,
                item: item.clone(),
                avg_n,
                avg_p,
                avg_k,
            });
        }

        let per_ha = |value: Option<&str>| {
            parse_f64_safe(value).map(|cost| PerHaCost {
                group_id,
                item: item.clone(),
                cost,
            })
        };
        tables.labor_per_ha.extend(per_ha(row.labor_cost.as_deref()));
        tables.machinery_per_ha.extend(per_ha(row.actual_mach.as_deref()));
        tables.seed_per_ha.extend(per_ha(row.actual_seed.as_deref()));
    }

    tables.regions = dedup_by_key(tables.regions, RegionRecord::clone);
    tables.fert_rates = dedup_by_key(tables.fert_rates, |r| {
        (
            r.group_id,
            r.item.clone(),
            r.avg_n.to_bits(),
            r.avg_p.to_bits(),
            r.avg_k.to_bits(),
        )
    });
    let per_ha_key = |r: &PerHaCost| (r.group_id, r.item.clone(), r.cost.to_bits());
    tables.labor_per_ha = dedup_by_key(tables.labor_per_ha, per_ha_key);
    tables.machinery_per_ha = dedup_by_key(tables.machinery_per_ha, per_ha_key);
    tables.seed_per_ha = dedup_by_key(tables.seed_per_ha, per_ha_key);

    info!(
        "Loaded cost table ({} rows, {} regions, {} local prices)",
        format_int(total_rows),
        format_int(tables.regions.len()),
        format_int(tables.price_per_ton.len())
    );
    debug!(
        "Cost sub-tables: {} fertilizer rates, {} labor, {} machinery, {} seed",
        tables.fert_rates.len(),
        tables.labor_per_ha.len(),
        tables.machinery_per_ha.len(),
        tables.seed_per_ha.len()
    );

    Ok(tables)
}

/// Read the global crop price table into a lookup keyed by lower-cased crop
/// name.
///
/// Wholly empty rows and columns are dropped first; the first three
/// remaining columns are then taken as crop name, Monfreda id and average
/// global price.
pub fn load_global_prices(path: &Path) -> Result<GlobalPriceLookup> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Could not open global price table {}", path.display()))?;

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.with_context(|| format!("Malformed row in {}", path.display()))?;
        if record.iter().any(|field| !field.trim().is_empty()) {
            rows.push(record);
        }
    }

    let width = rows.iter().map(csv::StringRecord::len).max().unwrap_or(0);
    let columns: Vec<usize> = (0..width)
        .filter(|&col| {
            rows.iter()
                .any(|r| r.get(col).is_some_and(|f| !f.trim().is_empty()))
        })
        .collect();
    let [name_col, id_col, price_col] = match columns.as_slice() {
        [a, b, c, ..] => [*a, *b, *c],
        _ => bail!(
            "Global price table {} needs at least 3 non-empty columns, found {}",
            path.display(),
            columns.len()
        ),
    };

    let mut lookup = GlobalPriceLookup::new();
    for record in &rows {
        let line = record.position().map_or(0, csv::Position::line);
        let Some(crop_name) = non_empty(record.get(name_col)) else {
            bail!("Missing crop name on line {line} of {}", path.display());
        };
        let monfreda_id = non_empty(record.get(id_col)).unwrap_or_default();
        let Some(avg_global_price) = parse_f64_safe(record.get(price_col)) else {
            bail!(
                "Invalid global price {:?} for '{crop_name}' on line {line} of {}",
                record.get(price_col).unwrap_or_default(),
                path.display()
            );
        };

        let key = crop_name.to_lowercase();
        lookup.insert(
            key.clone(),
            CropGlobalRecord {
                crop_name: key,
                monfreda_id,
                avg_global_price,
            },
        );
    }

    info!(
        "Loaded global price table ({} crops)",
        format_int(lookup.len())
    );
    Ok(lookup)
}
