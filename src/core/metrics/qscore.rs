use crate::core::error::{Result, ValidationContext};
use crate::core::model::{Cycle, Grouped2, Lane, SectionTable, lane_color, mean, push_grouped, trunc_int};
use serde::Serialize;
use std::collections::BTreeMap;

pub const BIN_PREFIX: &str = "Bin_";

/// Lane labels kept by the bin histogram; anything else (e.g. summary rows) is dropped.
pub const QBIN_LANES: [&str; 9] = ["0", "1", "2", "3", "4", "5", "6", "7", "8"];

/// Median scores above this are instrument sentinels and count as zero.
pub const MAX_MEDIAN_QSCORE: i64 = 50;

/// Height added above the tallest last-bin mean for the Q30 band.
pub const Q30_BAND_OFFSET: i64 = 10_000;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BinSeries {
    pub label: String,
    pub data: Vec<i64>,
    #[serde(rename = "backgroundColor")]
    pub background_color: &'static str,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QScoreBins {
    pub data: Vec<BinSeries>,
    pub labels: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CycleSeries {
    pub lane_id: Lane,
    pub labels: Vec<Cycle>,
    pub data: Vec<i64>,
    #[serde(rename = "backgroundColor")]
    pub background_color: &'static str,
}

/// Per-lane means of every `Bin_*` column, keyed by lane, in bin column order.
pub fn bin_means(q_by_lane: &SectionTable) -> Result<(Vec<String>, BTreeMap<Lane, Vec<f64>>)> {
    let lane_idx = q_by_lane.column("Lane")?;
    let bins = q_by_lane.columns_with_prefix(BIN_PREFIX);
    let labels = bins.iter().map(|(_, name)| name.to_string()).collect();

    let mut sums: BTreeMap<Lane, (Vec<f64>, usize)> = BTreeMap::new();
    for row in &q_by_lane.rows {
        let lane_raw = q_by_lane.cell(row, lane_idx).unwrap_or("").trim();
        if !QBIN_LANES.contains(&lane_raw) {
            continue;
        }
        let lane = q_by_lane.parse_u32(row, lane_idx)?;
        let entry = sums
            .entry(lane)
            .or_insert_with(|| (vec![0.0; bins.len()], 0));
        for (slot, &(idx, _)) in bins.iter().enumerate() {
            // Missing values count as zero.
            let present = q_by_lane
                .cell(row, idx)
                .is_some_and(|v| !v.trim().is_empty());
            if present {
                entry.0[slot] += q_by_lane.parse_i64(row, idx)? as f64;
            }
        }
        entry.1 += 1;
    }
    let means = sums
        .into_iter()
        .map(|(lane, (totals, n))| (lane, totals.into_iter().map(|t| t / n as f64).collect()))
        .collect();
    Ok((labels, means))
}

pub fn qscore_bins(q_by_lane: &SectionTable, colors: &[&'static str]) -> Result<QScoreBins> {
    let (labels, means) = bin_means(q_by_lane).validation("failed to build qscore bin data")?;
    let data = means
        .into_iter()
        .map(|(lane, values)| BinSeries {
            label: format!("Lane {}", lane),
            data: values.into_iter().map(trunc_int).collect(),
            background_color: lane_color(colors, lane),
        })
        .collect();
    Ok(QScoreBins { data, labels })
}

/// Height of the Q30 band: the tallest lane mean of the last bin, plus an offset.
pub fn q30_line(means: &BTreeMap<Lane, Vec<f64>>) -> i64 {
    let tallest = means
        .values()
        .filter_map(|v| v.last().copied())
        .fold(f64::NEG_INFINITY, f64::max);
    if tallest.is_finite() {
        trunc_int(tallest) + Q30_BAND_OFFSET
    } else {
        Q30_BAND_OFFSET
    }
}

/// Per-lane, per-cycle mean of MedianQScore after zeroing sentinel values.
pub fn cycle_means(q2030: &SectionTable) -> Result<BTreeMap<Lane, BTreeMap<Cycle, f64>>> {
    let lane_idx = q2030.column("Lane")?;
    let cycle_idx = q2030.column("Cycle")?;
    let tile_idx = q2030.column("Tile")?;
    let score_idx = q2030.column("MedianQScore")?;

    let mut groups: Grouped2<f64> = Grouped2::new();
    for row in &q2030.rows {
        let lane = q2030.parse_u32(row, lane_idx)?;
        let cycle = q2030.parse_u32(row, cycle_idx)?;
        q2030.parse_u32(row, tile_idx)?;
        let mut score = q2030.parse_i64(row, score_idx)?;
        if score > MAX_MEDIAN_QSCORE {
            score = 0;
        }
        push_grouped(&mut groups, lane, cycle, score as f64);
    }
    Ok(groups
        .into_iter()
        .map(|(lane, cycles)| {
            let means = cycles.into_iter().map(|(c, v)| (c, mean(&v))).collect();
            (lane, means)
        })
        .collect())
}

pub fn qscore_by_cycle(q2030: &SectionTable, colors: &[&'static str]) -> Result<Vec<CycleSeries>> {
    let means = cycle_means(q2030).validation("failed to build qscore by cycle data")?;
    Ok(means
        .into_iter()
        .map(|(lane, cycles)| CycleSeries {
            lane_id: lane,
            labels: cycles.keys().copied().collect(),
            data: cycles.values().map(|&v| trunc_int(v)).collect(),
            background_color: lane_color(colors, lane),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dump::parse_dump;
    use crate::core::error::InteropError;
    use crate::core::fixtures;
    use crate::core::model::DASHBOARD_COLORS;

    fn table(name: &str, headers: &[&str], rows: &[&[&str]]) -> SectionTable {
        let mut t = SectionTable::new(name, headers.iter().map(|s| s.to_string()).collect());
        for r in rows {
            t.rows.push(r.iter().map(|s| s.to_string()).collect());
        }
        t
    }

    #[test]
    fn sentinel_scores_clamped_before_mean() {
        let t = table(
            "Q2030",
            &["Lane", "Tile", "Cycle", "MedianQScore"],
            &[
                &["1", "1101", "4", "10"],
                &["1", "1102", "4", "60"],
                &["1", "1103", "4", "20"],
                &["1", "1101", "5", "50"],
            ],
        );
        let series = qscore_by_cycle(&t, &DASHBOARD_COLORS).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].labels, vec![4, 5]);
        assert_eq!(series[0].data, vec![10, 50]);
    }

    #[test]
    fn fixture_qscore_by_cycle() {
        let text = fixtures::dump();
        let tables = parse_dump(text.lines().map(str::as_bytes)).unwrap();
        let series = qscore_by_cycle(tables.q2030().unwrap(), &DASHBOARD_COLORS).unwrap();
        // cycle 1: mean(36, 38); cycle 2: mean(30, 60 -> 0)
        assert_eq!(series[0].data, vec![37, 15]);
        let json = serde_json::to_string(&series).unwrap();
        assert!(json.contains(r#""backgroundColor":"rgb(255, 99, 132, 0.8)""#));
    }

    #[test]
    fn float_median_score_is_a_cast_error() {
        let t = table(
            "Q2030",
            &["Lane", "Tile", "Cycle", "MedianQScore"],
            &[&["1", "1101", "1", "30.5"]],
        );
        let err = qscore_by_cycle(&t, &DASHBOARD_COLORS).unwrap_err();
        assert!(matches!(err.root(), InteropError::Cast { .. }));
    }

    #[test]
    fn bins_restricted_to_known_lanes() {
        let t = table(
            "QByLane",
            &["Lane", "Bin_1", "Bin_2", "Bin_3"],
            &[
                &["1", "10", "20", "31"],
                &["1", "20", "", "30"],
                &["2", "5", "5", "5"],
                &["Total", "1000", "1000", "1000"],
                &["12", "1", "1", "1"],
            ],
        );
        let bins = qscore_bins(&t, &DASHBOARD_COLORS).unwrap();
        assert_eq!(bins.labels, vec!["Bin_1", "Bin_2", "Bin_3"]);
        assert_eq!(bins.data.len(), 2);
        assert_eq!(bins.data[0].label, "Lane 1");
        assert_eq!(bins.data[0].data, vec![15, 10, 30]);
        assert_eq!(bins.data[1].background_color, DASHBOARD_COLORS[1]);

        let (_, means) = bin_means(&t).unwrap();
        assert_eq!(q30_line(&means), 30 + Q30_BAND_OFFSET);
    }

    #[test]
    fn fixture_bins() {
        let text = fixtures::dump();
        let tables = parse_dump(text.lines().map(str::as_bytes)).unwrap();
        let bins = qscore_bins(tables.q_by_lane().unwrap(), &DASHBOARD_COLORS).unwrap();
        assert_eq!(bins.labels.len(), 7);
        assert_eq!(bins.data[0].data, vec![2, 3, 4, 5, 6, 7, 8]);
    }
}
