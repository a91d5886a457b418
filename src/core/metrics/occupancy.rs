use crate::core::error::{Result, ValidationContext};
use crate::core::io::InputText;
use crate::core::model::{
    Grouped2, Lane, OCCUPANCY_COLORS, SectionTable, lane_color, mean, push_grouped,
};
use memchr::memchr_iter;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Column layout of `interop_imaging_table` output. The file has no usable
/// header; fields are matched by position.
pub const IMAGING_COLUMNS: [&str; 49] = [
    "Lane",
    "Tile",
    "Cycle",
    "Read",
    "Cycle Within Read",
    "Density(k/mm2)",
    "Density Pf(k/mm2)",
    "Cluster Count (k)",
    "Cluster Count Pf (k)",
    "% Pass Filter",
    "% Aligned",
    "Legacy Phasing Rate",
    "Legacy Prephasing Rate",
    "Error Rate",
    "%>= Q20",
    "%>= Q30",
    "P90_RED",
    "P90_GREEN",
    "% No Calls",
    "% Base_A",
    "% Base_C",
    "% Base_G",
    "% Base_T",
    "Fwhm_RED",
    "Fwhm_GREEN",
    "Corrected_A",
    "Corrected_C",
    "Corrected_G",
    "Corrected_T",
    "Called_A",
    "Called_C",
    "Called_G",
    "Called_T",
    "Signal To Noise",
    "Phasing Weight",
    "Prephasing Weight",
    "Phasing Slope",
    "Phasing Offset",
    "Prephasing Slope",
    "Prephasing Offset",
    "Minimum Contrast_RED",
    "Minimum Contrast_GREEN",
    "Maximum Contrast_RED",
    "Maximum Contrast_GREEN",
    "Surface",
    "Swath",
    "Tile Number",
    "Cluster Count Occupied (k)",
    "% Occupied",
];

const PREAMBLE_LINES: usize = 3;

/// One scatter series: mean % occupied (x) against mean % pass filter (y)
/// per tile of a lane. Tiles with no numeric value serialize as `null`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OccupancySeries {
    pub x: Vec<Option<f64>>,
    pub y: Vec<Option<f64>>,
    pub lane_id: Lane,
    pub color: &'static str,
}

pub fn occupied_pass_filter(path: &Path) -> Result<Vec<OccupancySeries>> {
    let input = InputText::open(path).validation("failed to read imaging table")?;
    parse_imaging_table(input.bytes())
        .and_then(|table| occupancy_by_tile(&table))
        .validation("failed to build occupancy data")
}

/// Loads the imaging CSV into a table named `ImagingTable`, skipping the
/// preamble. Rows may be shorter or longer than the column list.
pub fn parse_imaging_table(bytes: &[u8]) -> Result<SectionTable> {
    let start = memchr_iter(b'\n', bytes)
        .nth(PREAMBLE_LINES - 1)
        .map_or(bytes.len(), |pos| pos + 1);

    let mut table = SectionTable::new(
        "ImagingTable",
        IMAGING_COLUMNS.iter().map(|c| c.to_string()).collect(),
    );
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(&bytes[start..]);
    for record in reader.records() {
        let record = record?;
        table.rows.push(record.iter().map(str::to_string).collect());
    }
    debug!(rows = table.len(), "parsed imaging table");
    Ok(table)
}

fn metric(table: &SectionTable, row: &[String], idx: usize) -> Result<f64> {
    match table.cell(row, idx).map(str::trim) {
        None | Some("") => Ok(f64::NAN),
        Some(_) => table.parse_f64(row, idx),
    }
}

fn occupancy_by_tile(table: &SectionTable) -> Result<Vec<OccupancySeries>> {
    let lane_idx = table.column("Lane")?;
    let tile_idx = table.column("Tile")?;
    let occupied_idx = table.column("% Occupied")?;
    let pf_idx = table.column("% Pass Filter")?;

    let mut groups: Grouped2<(f64, f64)> = Grouped2::new();
    for row in &table.rows {
        let keyed = [lane_idx, tile_idx]
            .iter()
            .all(|&i| table.cell(row, i).is_some_and(|v| !v.trim().is_empty()));
        if !keyed {
            continue;
        }
        let lane = table.parse_u32(row, lane_idx)?;
        let tile = table.parse_u32(row, tile_idx)?;
        let occupied = metric(table, row, occupied_idx)?;
        let pf = metric(table, row, pf_idx)?;
        push_grouped(&mut groups, lane, tile, (occupied, pf));
    }

    let finite = |v: f64| (!v.is_nan()).then_some(v);
    Ok(groups
        .into_iter()
        .map(|(lane_id, tiles)| {
            let (x, y) = tiles
                .values()
                .map(|pairs| {
                    let occ: Vec<f64> = pairs.iter().map(|p| p.0).collect();
                    let pf: Vec<f64> = pairs.iter().map(|p| p.1).collect();
                    (finite(mean(&occ)), finite(mean(&pf)))
                })
                .unzip();
            OccupancySeries {
                x,
                y,
                lane_id,
                color: lane_color(&OCCUPANCY_COLORS, lane_id),
            }
        })
        .collect())
}
