use crate::adjust::AdjustedPriceMap;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

/// Quote a cell the CSV way, doubling embedded quotes.
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Region names go into the header bare unless they would break the row.
fn header_cell(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        quoted(s)
    } else {
        s.to_string()
    }
}

/// Write the adjusted price table in the legacy layout downstream consumers
/// read:
///
/// ```text
/// ,Global,<region>,<region>,...
/// "<crop>",<price>,<price>,...,
/// ```
///
/// Regions are sorted with `Global` first, crops are sorted, prices have two
/// decimal places and every data cell (the last one included) is followed by
/// a comma.
pub fn write_price_table<W: Write>(out: &mut W, prices: &AdjustedPriceMap) -> Result<()> {
    let columns = prices.column_order();

    let header: Vec<String> = std::iter::once(String::new())
        .chain(columns.iter().map(|c| header_cell(c)))
        .collect();
    writeln!(out, "{}", header.join(","))?;

    for crop in prices.crops() {
        write!(out, "{},", quoted(crop))?;
        for region in &columns {
            let price = prices.get(region, crop).unwrap_or(f64::NAN);
            write!(out, "{price:.2},")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

pub fn write_price_table_file(path: &Path, prices: &AdjustedPriceMap) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Could not create output file {}", path.display()))?;
    let mut wtr = BufWriter::new(file);
    write_price_table(&mut wtr, prices)
        .with_context(|| format!("Could not write price table to {}", path.display()))?;
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s).with_context(|| format!("Could not write {}", path.display()))?;
    Ok(())
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{table_str}\n");
}
