use crate::core::error::{Result, ValidationContext};
use crate::core::model::{Lane, SectionTable, lane_color};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClusterCountBox {
    #[serde(rename = "ClusterCount")]
    pub cluster_count: Vec<f64>,
    #[serde(rename = "ClusterCountPF")]
    pub cluster_count_pf: Vec<f64>,
    pub lane_id: Lane,
    pub color: &'static str,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DensityBox {
    #[serde(rename = "Density")]
    pub density: Vec<f64>,
    #[serde(rename = "DensityPF")]
    pub density_pf: Vec<f64>,
    pub lane_id: Lane,
    pub color: &'static str,
}

#[derive(Default)]
struct LaneValues {
    cluster_count: Vec<f64>,
    cluster_count_pf: Vec<f64>,
    density: Vec<f64>,
    density_pf: Vec<f64>,
}

/// Raw per-lane value arrays for box plots. Rows missing any column are dropped.
pub fn cluster_and_density(
    tile: &SectionTable,
    colors: &[&'static str],
) -> Result<(Vec<ClusterCountBox>, Vec<DensityBox>)> {
    build(tile, colors).validation("failed to build cluster count and density data")
}

fn build(
    table: &SectionTable,
    colors: &[&'static str],
) -> Result<(Vec<ClusterCountBox>, Vec<DensityBox>)> {
    let lane_idx = table.column("Lane")?;
    let cc_idx = table.column("ClusterCount")?;
    let cc_pf_idx = table.column("ClusterCountPF")?;
    let density_idx = table.column("Density")?;
    let density_pf_idx = table.column("DensityPF")?;

    let mut lanes: BTreeMap<Lane, LaneValues> = BTreeMap::new();
    for row in table.rows.iter().filter(|r| table.is_complete(r)) {
        let lane = table.parse_u32(row, lane_idx)?;
        let values = lanes.entry(lane).or_default();
        values.cluster_count.push(table.parse_f64(row, cc_idx)?);
        values.cluster_count_pf.push(table.parse_f64(row, cc_pf_idx)?);
        values.density.push(table.parse_f64(row, density_idx)?);
        values.density_pf.push(table.parse_f64(row, density_pf_idx)?);
    }

    let mut clusters = Vec::with_capacity(lanes.len());
    let mut densities = Vec::with_capacity(lanes.len());
    for (lane_id, v) in lanes {
        let color = lane_color(colors, lane_id);
        clusters.push(ClusterCountBox {
            cluster_count: v.cluster_count,
            cluster_count_pf: v.cluster_count_pf,
            lane_id,
            color,
        });
        densities.push(DensityBox {
            density: v.density,
            density_pf: v.density_pf,
            lane_id,
            color,
        });
    }
    Ok((clusters, densities))
}
