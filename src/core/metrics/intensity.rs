use crate::core::error::{InteropError, Result, ValidationContext};
use crate::core::model::{
    Cycle, Grouped2, Lane, SectionTable, median, push_grouped, trunc_int,
};
use serde::Serialize;
use std::collections::BTreeMap;

pub const MAX_INTENSITY_PREFIX: &str = "MaxIntensity_";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LineSeries {
    pub label: String,
    pub data: Vec<i64>,
    pub color: &'static str,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IntensityChart {
    pub chart_data: BTreeMap<Lane, Vec<LineSeries>>,
    pub labels: Vec<Cycle>,
}

/// Per-lane, per-cycle medians of `column`, in ascending lane then cycle order.
pub fn cycle_medians(
    table: &SectionTable,
    column: usize,
) -> Result<BTreeMap<Lane, BTreeMap<Cycle, f64>>> {
    let lane_idx = table.column("Lane")?;
    let cycle_idx = table.column("Cycle")?;
    let mut groups: Grouped2<f64> = Grouped2::new();
    for row in &table.rows {
        let lane = table.parse_u32(row, lane_idx)?;
        let cycle = table.parse_u32(row, cycle_idx)?;
        let value = table.parse_f64(row, column)?;
        push_grouped(&mut groups, lane, cycle, value);
    }
    Ok(groups
        .into_iter()
        .map(|(lane, cycles)| {
            let medians = cycles
                .into_iter()
                .map(|(cycle, values)| (cycle, median(&values)))
                .collect();
            (lane, medians)
        })
        .collect())
}

/// Line series of median max-intensity per cycle, one per intensity column per
/// lane. Column `i` takes `colors[i]`; columns beyond the palette are dropped.
pub fn intensity_by_cycle(
    extraction: &SectionTable,
    colors: &[&'static str],
) -> Result<IntensityChart> {
    build(extraction, colors).validation("failed to build intensity data")
}

fn build(extraction: &SectionTable, colors: &[&'static str]) -> Result<IntensityChart> {
    let columns = extraction.columns_with_prefix(MAX_INTENSITY_PREFIX);
    if columns.is_empty() {
        return Err(InteropError::MissingColumn {
            table: extraction.name.clone(),
            column: format!("{}*", MAX_INTENSITY_PREFIX),
        });
    }

    let mut per_column = Vec::with_capacity(columns.len());
    for &(idx, name) in columns.iter().take(colors.len()) {
        per_column.push((name, cycle_medians(extraction, idx)?));
    }

    let mut chart_data: BTreeMap<Lane, Vec<LineSeries>> = BTreeMap::new();
    for ((name, medians), color) in per_column.iter().zip(colors.iter()) {
        for (lane, cycles) in medians {
            chart_data.entry(*lane).or_default().push(LineSeries {
                label: name.to_string(),
                data: cycles.values().map(|&v| trunc_int(v)).collect(),
                color: *color,
            });
        }
    }
    // Every column shares the same lane/cycle grouping; labels follow the last lane.
    let labels: Vec<Cycle> = per_column
        .first()
        .and_then(|(_, medians)| medians.values().next_back())
        .map(|cycles| cycles.keys().copied().collect())
        .unwrap_or_default();
    Ok(IntensityChart { chart_data, labels })
}
