//! Synthetic inputs shared by unit tests: one lane, two cycles, one tile on
//! each surface, and a two-read run.

use crate::core::metrics::occupancy::IMAGING_COLUMNS;

const SECTIONS: [(&str, &str); 7] = [
    (
        "Tile",
        "# Tile,2\n\
         # Column Count: 7\n\
         Lane,Tile,Read,ClusterCount,ClusterCountPF,Density,DensityPF\n\
         1,1101,1,2000000,1800000,250000,220000\n\
         1,2201,1,2200000,2000000,270000,240000\n\
         1,1101,2,2000000,1700000,250000,210000\n\
         1,2201,2,2200000,1900000,270000,230000\n",
    ),
    (
        "Q2030",
        "# Q2030,1\n\
         Lane,Tile,Cycle,Q20,Q30,Total,MedianQScore\n\
         1,1101,1,950,900,1000,36\n\
         1,2201,1,960,920,1000,38\n\
         1,1101,2,900,800,1000,30\n\
         1,2201,2,880,780,1000,60\n",
    ),
    (
        "Extraction",
        "# Extraction,2\n\
         # Channel Count: 4\n\
         Lane,Tile,Cycle,TimeStamp,MaxIntensity_A,MaxIntensity_C,MaxIntensity_G,MaxIntensity_T\n\
         1,1101,1,0,1000,1100,1200,1300\n\
         1,2201,1,0,1010,1110,1210,1310\n\
         1,1101,2,0,900,1000,1100,1200\n\
         1,2201,2,0,905,1005,1105,1205\n",
    ),
    (
        "Error",
        "# Error,3\n\
         Lane,Tile,Cycle,ErrorRate\n\
         1,1101,1,0.2\n\
         1,1101,2,0.3\n\
         1,2201,2,0.4\n",
    ),
    (
        "EmpiricalPhasing",
        "# EmpiricalPhasing,1\n\
         Lane,Tile,Cycle,Phasing,Prephasing\n\
         1,1101,1,0.1,0.05\n",
    ),
    (
        "CorrectedInt",
        "# CorrectedInt,3\n\
         Lane,Tile,Cycle,AverageCycleIntensity,CalledIntensity_A,CalledIntensity_C,CalledIntensity_G,CalledIntensity_T\n\
         1,1101,1,500,400,410,420,430\n\
         1,2201,1,520,420,430,440,450\n\
         1,1101,2,480,380,390,400,410\n",
    ),
    (
        "QByLane",
        "# Bin Count: 7\n\
         # QByLane,1\n\
         Lane,Tile,Cycle,Bin_1,Bin_2,Bin_3,Bin_4,Bin_5,Bin_6,Bin_7\n\
         1,1101,2,1,2,3,4,5,6,7\n\
         1,2201,2,3,4,5,6,7,8,9\n",
    ),
];

pub const RUN_INFO: &str = r#"<?xml version="1.0"?>
<RunInfo xmlns:xsd="http://www.w3.org/2001/XMLSchema" Version="2">
  <Run Id="200101_A00001_0001_AHXXXXXXXX" Number="1">
    <Flowcell>HXXXXXXXX</Flowcell>
    <Reads>
      <Read Number="1" NumCycles="1" IsIndexedRead="N" />
      <Read Number="2" NumCycles="1" IsIndexedRead="Y" />
    </Reads>
  </Run>
</RunInfo>
"#;

pub fn dump() -> String {
    let mut s = String::from("# Version: v1.1.1\n");
    for (_, block) in SECTIONS {
        s.push_str(block);
    }
    s
}

/// The fixture dump with one section's block swapped for `block`.
pub fn dump_replacing(key: &str, block: &str) -> String {
    let mut s = String::from("# Version: v1.1.1\n");
    for (name, stock) in SECTIONS {
        s.push_str(if name == key { block } else { stock });
    }
    s
}

pub fn dump_without(key: &str) -> String {
    dump_replacing(key, "")
}

/// Imaging table text: three preamble lines, then one 49-field row per entry
/// of `(lane, tile, % occupied, % pass filter)`.
pub fn imaging_table(rows: &[(u32, u32, &str, &str)]) -> String {
    let occupied = IMAGING_COLUMNS.len() - 1;
    let mut s = String::from("# Version: v1.1.1\n# Imaging Table\nLane,Tile,...\n");
    for &(lane, tile, occ, pf) in rows {
        let mut fields = vec!["0".to_string(); IMAGING_COLUMNS.len()];
        fields[0] = lane.to_string();
        fields[1] = tile.to_string();
        fields[9] = pf.to_string();
        fields[occupied] = occ.to_string();
        s.push_str(&fields.join(","));
        s.push('\n');
    }
    s
}

/// Writes an executable shell script into `dir` and returns its path.
#[cfg(unix)]
pub fn stub_executable(dir: &std::path::Path, name: &str, body: &str) -> String {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.to_string_lossy().into_owned()
}
