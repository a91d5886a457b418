use crate::core::error::{Result, ValidationContext};
use crate::core::model::{Grouped2, SURFACE_TILE_SPLIT, SectionTable, Tile, median, push_grouped};
use serde::Serialize;
use std::collections::BTreeSet;

/// Heatmap grid: `z[lane][tile]`, `null` where a lane has no such tile.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Surface {
    pub z: Vec<Vec<Option<f64>>>,
    pub x: Vec<String>,
    pub y: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FlowcellSurfaces {
    pub surface1: Surface,
    pub surface2: Surface,
}

pub fn surface_medians(tile: &SectionTable) -> Result<FlowcellSurfaces> {
    build(tile).validation("failed to build flowcell surface data")
}

fn build(table: &SectionTable) -> Result<FlowcellSurfaces> {
    let lane_idx = table.column("Lane")?;
    let tile_idx = table.column("Tile")?;
    let pf_idx = table.column("ClusterCountPF")?;

    let mut groups: Grouped2<f64> = Grouped2::new();
    for row in &table.rows {
        if table.cell(row, lane_idx).unwrap_or("").is_empty() {
            continue;
        }
        let lane = table.parse_u32(row, lane_idx)?;
        let tile = table.parse_u32(row, tile_idx)?;
        let pf = table.parse_f64(row, pf_idx)?;
        push_grouped(&mut groups, lane, tile, pf);
    }

    let lanes: Vec<String> = groups.keys().map(|l| format!("Lane {}", l)).collect();
    let grid = |on_surface: fn(Tile) -> bool| -> Surface {
        let tiles: BTreeSet<Tile> = groups
            .values()
            .flat_map(|t| t.keys().copied())
            .filter(|&t| on_surface(t))
            .collect();
        let z = groups
            .values()
            .map(|by_tile| {
                tiles
                    .iter()
                    .map(|t| by_tile.get(t).map(|v| median(v)))
                    .collect()
            })
            .collect();
        Surface {
            z,
            x: tiles.iter().map(|t| format!("Tile {}", t)).collect(),
            y: lanes.clone(),
        }
    };

    Ok(FlowcellSurfaces {
        surface1: grid(|t| t < SURFACE_TILE_SPLIT),
        surface2: grid(|t| t >= SURFACE_TILE_SPLIT),
    })
}
