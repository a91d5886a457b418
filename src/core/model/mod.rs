use crate::core::error::{InteropError, Result};
use std::collections::BTreeMap;

pub type Lane = u32;
pub type Cycle = u32;
pub type Tile = u32;

/// Physical surface boundary: tiles below this number sit on the top surface.
pub const SURFACE_TILE_SPLIT: Tile = 2200;

pub const DASHBOARD_COLORS: [&str; 8] = [
    "rgb(255, 99, 132, 0.8)",
    "rgb(255, 159, 64, 0.8)",
    "rgb(255, 205, 86, 0.8)",
    "rgb(75, 192, 192, 0.8)",
    "rgb(54, 162, 235, 0.8)",
    "rgb(153, 102, 255, 0.8)",
    "rgb(63, 245, 57, 0.8)",
    "rgb(159, 20, 193, 0.8)",
];

pub const OCCUPANCY_COLORS: [&str; 8] = [
    "rgb(255, 99, 132)",
    "rgb(255, 159, 64)",
    "rgb(255, 205, 86)",
    "rgb(75, 192, 192)",
    "rgb(54, 162, 235)",
    "rgb(153, 102, 255)",
    "rgb(63, 245, 57)",
    "rgb(159, 20, 193)",
];

/// Spectral, reversed. Used by the standalone plot report.
pub const PLOT_COLORS: [&str; 8] = [
    "#3288bd", "#66c2a5", "#abdda4", "#e6f598", "#fee08b", "#fdae61", "#f46d43", "#d53e4f",
];

/// Lanes are 1-based; lane 0 wraps to the last palette entry.
pub fn lane_color(palette: &[&'static str], lane: Lane) -> &'static str {
    let idx = (lane as i64 - 1).rem_euclid(palette.len() as i64) as usize;
    palette[idx]
}

/// One section of an interop dump. Rows are paired positionally with `headers`;
/// a row shorter than the header is missing its trailing columns.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SectionTable {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SectionTable {
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| InteropError::MissingColumn {
                table: self.name.clone(),
                column: name.to_string(),
            })
    }

    pub fn columns_with_prefix(&self, prefix: &str) -> Vec<(usize, &str)> {
        self.headers
            .iter()
            .enumerate()
            .filter(|(_, h)| h.starts_with(prefix))
            .map(|(i, h)| (i, h.as_str()))
            .collect()
    }

    pub fn cell<'a>(&self, row: &'a [String], idx: usize) -> Option<&'a str> {
        row.get(idx).map(String::as_str)
    }

    /// True when the row carries a value for every header column.
    pub fn is_complete(&self, row: &[String]) -> bool {
        row.len() >= self.headers.len()
    }

    pub fn parse_u32(&self, row: &[String], idx: usize) -> Result<u32> {
        let raw = self.cell(row, idx).unwrap_or("");
        raw.trim().parse::<u32>().map_err(|_| self.cast_error(idx, raw, "integer"))
    }

    pub fn parse_i64(&self, row: &[String], idx: usize) -> Result<i64> {
        let raw = self.cell(row, idx).unwrap_or("");
        raw.trim().parse::<i64>().map_err(|_| self.cast_error(idx, raw, "integer"))
    }

    pub fn parse_f64(&self, row: &[String], idx: usize) -> Result<f64> {
        let raw = self.cell(row, idx).unwrap_or("");
        raw.trim().parse::<f64>().map_err(|_| self.cast_error(idx, raw, "float"))
    }

    fn cast_error(&self, idx: usize, raw: &str, kind: &'static str) -> InteropError {
        InteropError::Cast {
            table: self.name.clone(),
            column: self.headers.get(idx).cloned().unwrap_or_default(),
            value: raw.to_string(),
            kind,
        }
    }
}

/// One sequencing read from RunInfo.xml. Covers 1-based cycles
/// `start_cycle + 1 ..= start_cycle + cycles`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReadDescriptor {
    pub read_id: u32,
    pub cycles: u32,
    pub start_cycle: u32,
    pub index_read: bool,
}

impl ReadDescriptor {
    pub fn first_cycle(&self) -> Cycle {
        self.start_cycle.saturating_add(1)
    }

    pub fn last_cycle(&self) -> Cycle {
        self.start_cycle.saturating_add(self.cycles)
    }

    pub fn contains(&self, cycle: Cycle) -> bool {
        cycle > self.start_cycle && cycle <= self.last_cycle()
    }

    pub fn index_flag(&self) -> &'static str {
        if self.index_read { "Y" } else { "N" }
    }
}

/// Groups values by two ascending keys.
pub type Grouped2<V> = BTreeMap<u32, BTreeMap<u32, Vec<V>>>;

pub fn push_grouped<V>(groups: &mut Grouped2<V>, outer: u32, inner: u32, value: V) {
    groups
        .entry(outer)
        .or_default()
        .entry(inner)
        .or_default()
        .push(value);
}

/// Median ignoring NaN; NaN when nothing is left.
pub fn median(values: &[f64]) -> f64 {
    let mut v: Vec<f64> = values.iter().copied().filter(|x| !x.is_nan()).collect();
    if v.is_empty() {
        return f64::NAN;
    }
    v.sort_by(|a, b| a.total_cmp(b));
    let mid = v.len() / 2;
    if v.len() % 2 == 0 {
        (v[mid - 1] + v[mid]) / 2.0
    } else {
        v[mid]
    }
}

/// Mean ignoring NaN; NaN when nothing is left.
pub fn mean(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut n = 0usize;
    for &x in values {
        if !x.is_nan() {
            sum += x;
            n += 1;
        }
    }
    if n == 0 { f64::NAN } else { sum / n as f64 }
}

/// Truncates toward zero; NaN becomes 0.
pub fn trunc_int(v: f64) -> i64 {
    if v.is_nan() { 0 } else { v.trunc() as i64 }
}
