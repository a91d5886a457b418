//! Per-lane, per-read run summary: yield and Q30 from `Q2030`, cluster counts
//! from `Tile`, first-cycle intensity from `Extraction` and error-cycle counts
//! from `Error`, joined on `(lane, read)`.

use crate::core::dump::DumpTables;
use crate::core::error::{Result, ValidationContext};
use crate::core::model::{Lane, ReadDescriptor, SectionTable, mean, trunc_int};
use crate::core::runinfo::RunInfo;
use std::collections::{BTreeMap, BTreeSet};

pub const SUMMARY_COLUMNS: [&str; 13] = [
    "lane_id",
    "read_id",
    "q30_pct",
    "yield",
    "density",
    "read_count",
    "read_count_pf",
    "cluster_pf",
    "cycles",
    "start_cycle",
    "index_read",
    "intensity_c1",
    "error_cycles",
];

/// Filled in for any join that found no matching `(lane, read)` row.
pub const MISSING: &str = "0";

type ReadKey = (Lane, u32);

#[derive(Clone, Debug, PartialEq)]
pub struct ClusterStats {
    pub density: String,
    pub read_count: String,
    pub read_count_pf: String,
    pub cluster_pf: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct YieldStats {
    pub lane_id: Lane,
    pub read_id: u32,
    pub q30_pct: String,
    pub yield_gb: String,
}

/// Rendered summary: titleized headers and one row of display strings per
/// lane and read.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SummaryTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SummaryTable {
    pub fn column(&self, title: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == title)
    }
}

/// `q30_pct` -> `Q30 pct`, `lane_id` -> `Lane id`.
pub fn titleize(name: &str) -> String {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let mut out: String = first.to_uppercase().collect();
    out.push_str(&chars.as_str().to_lowercase());
    out.replace('_', " ")
}

fn missing(n: usize) -> impl Iterator<Item = String> {
    std::iter::repeat_n(MISSING.to_string(), n)
}

fn fmt2(v: f64) -> String {
    format!("{:.2}", v)
}

fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 { 0.0 } else { num / den }
}

pub fn summary_stats(dump: &DumpTables, run_info: &RunInfo) -> Result<SummaryTable> {
    build(dump, run_info).validation("failed to get summary stats")
}

fn build(dump: &DumpTables, run_info: &RunInfo) -> Result<SummaryTable> {
    let clusters = cluster_stats(dump.tile()?).validation("failed to extract data from Tile table")?;
    let yields =
        yield_stats(dump.q2030()?, run_info).validation("failed to extract data from Q2030 table")?;
    let intensity = first_cycle_intensity(dump.extraction()?, run_info)
        .validation("failed to get data from Extraction table")?;
    let errors =
        error_cycles(dump.error()?, run_info).validation("failed to get data from Error table")?;

    let mut rows = Vec::with_capacity(yields.len());
    for y in yields {
        let key = (y.lane_id, y.read_id);
        let mut row = vec![
            y.lane_id.to_string(),
            y.read_id.to_string(),
            y.q30_pct,
            y.yield_gb,
        ];
        match clusters.get(&key) {
            Some(c) => row.extend([
                c.density.clone(),
                c.read_count.clone(),
                c.read_count_pf.clone(),
                c.cluster_pf.clone(),
            ]),
            None => row.extend(missing(4)),
        }
        match run_info.read(y.read_id) {
            Some(r) => row.extend([
                r.cycles.to_string(),
                r.start_cycle.to_string(),
                r.index_flag().to_string(),
            ]),
            None => row.extend(missing(3)),
        }
        row.push(intensity.get(&key).cloned().unwrap_or_else(|| MISSING.to_string()));
        row.push(
            errors
                .get(&key)
                .map_or_else(|| MISSING.to_string(), |n| n.to_string()),
        );
        rows.push(row);
    }

    Ok(SummaryTable {
        columns: SUMMARY_COLUMNS.iter().map(|c| titleize(c)).collect(),
        rows,
    })
}

/// Cluster totals per `(lane, read)` from the Tile table.
pub fn cluster_stats(tile: &SectionTable) -> Result<BTreeMap<ReadKey, ClusterStats>> {
    let read_idx = tile.column("Read")?;
    let lane_idx = tile.column("Lane")?;
    let cc_idx = tile.column("ClusterCount")?;
    let cc_pf_idx = tile.column("ClusterCountPF")?;
    let density_idx = tile.column("Density")?;

    #[derive(Default)]
    struct Acc {
        clusters: f64,
        clusters_pf: f64,
        density: Vec<f64>,
    }

    let mut groups: BTreeMap<ReadKey, Acc> = BTreeMap::new();
    for row in &tile.rows {
        let read = tile.parse_u32(row, read_idx)?;
        let lane = tile.parse_u32(row, lane_idx)?;
        let acc = groups.entry((lane, read)).or_default();
        acc.clusters += tile.parse_f64(row, cc_idx)?;
        acc.clusters_pf += tile.parse_f64(row, cc_pf_idx)?;
        acc.density.push(tile.parse_f64(row, density_idx)?);
    }

    Ok(groups
        .into_iter()
        .map(|(key, acc)| {
            let read_count = trunc_int(acc.clusters) as f64 / 1e6;
            let read_count_pf = trunc_int(acc.clusters_pf) as f64 / 1e6;
            let density = trunc_int(mean(&acc.density)) as f64 / 1000.0;
            let stats = ClusterStats {
                density: fmt2(density),
                read_count: fmt2(read_count),
                read_count_pf: fmt2(read_count_pf),
                cluster_pf: fmt2(ratio(acc.clusters_pf, acc.clusters)),
            };
            (key, stats)
        })
        .collect())
}

/// Q30 percentage and yield per lane and read. Rows come out lanes ascending,
/// then reads in run-info order.
pub fn yield_stats(q2030: &SectionTable, run_info: &RunInfo) -> Result<Vec<YieldStats>> {
    let lane_idx = q2030.column("Lane")?;
    let cycle_idx = q2030.column("Cycle")?;
    let q30_idx = q2030.column("Q30")?;
    let total_idx = q2030.column("Total")?;

    let mut lanes: BTreeMap<Lane, Vec<(u32, i64, i64)>> = BTreeMap::new();
    for row in &q2030.rows {
        let lane = q2030.parse_u32(row, lane_idx)?;
        let cycle = q2030.parse_u32(row, cycle_idx)?;
        let q30 = q2030.parse_i64(row, q30_idx)?;
        let total = q2030.parse_i64(row, total_idx)?;
        lanes.entry(lane).or_default().push((cycle, q30, total));
    }

    let mut out = Vec::with_capacity(lanes.len() * run_info.reads.len());
    for (lane, entries) in &lanes {
        for read in &run_info.reads {
            let (q30, total) = entries
                .iter()
                .filter(|(cycle, _, _)| read.contains(*cycle))
                .fold((0i64, 0i64), |(q, t), &(_, q30, total)| (q + q30, t + total));
            out.push(YieldStats {
                lane_id: *lane,
                read_id: read.read_id,
                q30_pct: fmt2(ratio(q30 as f64, total as f64) * 100.0),
                yield_gb: fmt2(total as f64 / 1e9),
            });
        }
    }
    Ok(out)
}

/// Mean `MaxIntensity_A` on each read's first cycle. Lanes without a row on
/// that cycle are left out of the result.
pub fn first_cycle_intensity(
    extraction: &SectionTable,
    run_info: &RunInfo,
) -> Result<BTreeMap<ReadKey, String>> {
    let lane_idx = extraction.column("Lane")?;
    let cycle_idx = extraction.column("Cycle")?;
    let a_idx = extraction.column("MaxIntensity_A")?;

    let mut by_lane_cycle: BTreeMap<(Lane, u32), Vec<f64>> = BTreeMap::new();
    for row in &extraction.rows {
        let lane = extraction.parse_u32(row, lane_idx)?;
        let cycle = extraction.parse_u32(row, cycle_idx)?;
        let value = extraction.parse_i64(row, a_idx)?;
        by_lane_cycle.entry((lane, cycle)).or_default().push(value as f64);
    }

    let lanes: BTreeSet<Lane> = by_lane_cycle.keys().map(|(l, _)| *l).collect();
    let mut out = BTreeMap::new();
    for lane in lanes {
        for read in &run_info.reads {
            if let Some(values) = by_lane_cycle.get(&(lane, read.first_cycle())) {
                out.insert((lane, read.read_id), fmt2(mean(values)));
            }
        }
    }
    Ok(out)
}

/// Distinct cycles with an error-rate entry inside each read, per lane.
pub fn error_cycles(error: &SectionTable, run_info: &RunInfo) -> Result<BTreeMap<ReadKey, usize>> {
    let lane_idx = error.column("Lane")?;
    let cycle_idx = error.column("Cycle")?;

    let mut cycles: BTreeMap<Lane, BTreeSet<u32>> = BTreeMap::new();
    for row in &error.rows {
        let lane = error.parse_u32(row, lane_idx)?;
        let cycle = error.parse_u32(row, cycle_idx)?;
        cycles.entry(lane).or_default().insert(cycle);
    }

    let count = |set: &BTreeSet<u32>, read: &ReadDescriptor| {
        set.iter().filter(|&&c| read.contains(c)).count()
    };
    Ok(cycles
        .iter()
        .flat_map(|(lane, set)| {
            run_info
                .reads
                .iter()
                .map(move |read| ((*lane, read.read_id), count(set, read)))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dump::parse_dump;
    use crate::core::error::InteropError;
    use crate::core::fixtures;
    use crate::core::runinfo::parse_run_info;

    fn inputs() -> (DumpTables, RunInfo) {
        let dump = fixtures::dump();
        let tables = parse_dump(dump.lines().map(str::as_bytes)).unwrap();
        let info = parse_run_info(fixtures::RUN_INFO.lines().map(str::as_bytes)).unwrap();
        (tables, info)
    }

    fn table(name: &str, headers: &[&str], rows: &[&[&str]]) -> SectionTable {
        let mut t = SectionTable::new(name, headers.iter().map(|s| s.to_string()).collect());
        for r in rows {
            t.rows.push(r.iter().map(|s| s.to_string()).collect());
        }
        t
    }

    #[test]
    fn titleized_columns() {
        assert_eq!(titleize("q30_pct"), "Q30 pct");
        assert_eq!(titleize("lane_id"), "Lane id");
        assert_eq!(titleize("intensity_c1"), "Intensity c1");
        assert_eq!(titleize("yield"), "Yield");
    }

    #[test]
    fn fixture_summary_rows() {
        let (tables, info) = inputs();
        let summary = summary_stats(&tables, &info).unwrap();
        assert_eq!(summary.columns.len(), SUMMARY_COLUMNS.len());
        assert_eq!(summary.columns[0], "Lane id");
        assert_eq!(summary.rows.len(), 2);

        let r1 = &summary.rows[0];
        // lane, read, q30, yield, density, reads, reads pf, cluster pf
        assert_eq!(&r1[..8], &["1", "1", "91.00", "0.00", "260.00", "4.20", "3.80", "0.90"]);
        // cycles, start, index, intensity, error cycles
        assert_eq!(&r1[8..], &["1", "0", "N", "1005.00", "1"]);

        let r2 = &summary.rows[1];
        assert_eq!(r2[2], "79.00");
        assert_eq!(r2[10], "Y");
        assert_eq!(r2[11], "902.50");
        assert_eq!(r2[12], "1");
    }

    #[test]
    fn read_ranges_include_the_last_cycle() {
        let info = parse_run_info(
            r#"<Read Number="1" NumCycles="2" IsIndexedRead="N" />
               <Read Number="2" NumCycles="1" IsIndexedRead="Y" />"#
                .lines()
                .map(str::as_bytes),
        )
        .unwrap();
        let q2030 = table(
            "Q2030",
            &["Lane", "Cycle", "Q30", "Total"],
            &[
                &["1", "1", "50", "100"],
                &["1", "2", "100", "100"],
                &["1", "3", "0", "100"],
            ],
        );
        let y = yield_stats(&q2030, &info).unwrap();
        assert_eq!(y[0].q30_pct, "75.00");
        assert_eq!(y[1].q30_pct, "0.00");

        let err = table(
            "Error",
            &["Lane", "Cycle"],
            &[&["1", "1"], &["1", "2"], &["1", "2"], &["1", "3"]],
        );
        let counts = error_cycles(&err, &info).unwrap();
        assert_eq!(counts[&(1, 1)], 2);
        assert_eq!(counts[&(1, 2)], 1);
    }

    #[test]
    fn zero_totals_do_not_divide() {
        let info = parse_run_info(
            r#"<Read Number="1" NumCycles="1" IsIndexedRead="N" />"#.lines().map(str::as_bytes),
        )
        .unwrap();
        let q2030 = table("Q2030", &["Lane", "Cycle", "Q30", "Total"], &[&["1", "1", "0", "0"]]);
        assert_eq!(yield_stats(&q2030, &info).unwrap()[0].q30_pct, "0.00");

        let tile = table(
            "Tile",
            &["Lane", "Read", "ClusterCount", "ClusterCountPF", "Density"],
            &[&["1", "1", "0", "0", "0"]],
        );
        assert_eq!(cluster_stats(&tile).unwrap()[&(1, 1)].cluster_pf, "0.00");
    }

    #[test]
    fn unmatched_joins_are_filled() {
        let (_, info) = inputs();
        let dump = fixtures::dump_replacing(
            "Tile",
            "# Tile,1\nLane,Tile,Read,ClusterCount,ClusterCountPF,Density,DensityPF\n\
             2,1101,1,10,10,10,10\n",
        );
        let only_lane2 = parse_dump(dump.lines().map(str::as_bytes)).unwrap();
        let summary = summary_stats(&only_lane2, &info).unwrap();
        assert_eq!(&summary.rows[0][4..8], &["0", "0", "0", "0"]);

        let extraction = table(
            "Extraction",
            &["Lane", "Cycle", "MaxIntensity_A"],
            &[&["1", "2", "700"]],
        );
        let intensity = first_cycle_intensity(&extraction, &info).unwrap();
        assert!(!intensity.contains_key(&(1, 1)));
        assert_eq!(intensity[&(1, 2)], "700.00");
    }

    #[test]
    fn float_intensity_is_a_cast_error() {
        let (_, info) = inputs();
        let extraction = table(
            "Extraction",
            &["Lane", "Cycle", "MaxIntensity_A"],
            &[&["1", "1", "700.5"]],
        );
        let err = first_cycle_intensity(&extraction, &info).unwrap_err();
        assert!(matches!(err, InteropError::Cast { .. }));
    }
}
