use crate::core::dump::{DumpTables, read_dump};
use crate::core::error::{InteropError, Result, ValidationContext};
use crate::core::external;
use crate::core::metrics::{distribution, intensity, occupancy, qscore, summary, surface};
use crate::core::model::DASHBOARD_COLORS;
use crate::core::runinfo::{RunInfo, read_run_info};
use crate::report;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing::{debug, info};

pub const RUN_INFO_FILE: &str = "RunInfo.xml";

/// Dashboard record for one run. Every chart field holds a JSON document
/// encoded as a string; `occupied_pass_filter` is empty without an imaging table.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReportPayload {
    pub run_name: String,
    pub table_data: String,
    pub flowcell_data: String,
    pub intensity_data: String,
    pub cluster_count_data: String,
    pub density_data: String,
    pub qscore_bins_data: String,
    // Key spelling is what the dashboard reads.
    #[serde(rename = "qsocre_cycles_data")]
    pub qscore_cycles_data: String,
    pub occupied_pass_filter: String,
}

pub struct RunConfig {
    pub run_id: String,
    pub run_path: PathBuf,
    pub output_dir: PathBuf,
    pub generate_imaging: bool,
    pub dumptext_exe: String,
    pub imaging_exe: String,
}

pub struct JsonConfig {
    pub run_id: String,
    pub dump: PathBuf,
    pub run_info: PathBuf,
    pub imaging: Option<PathBuf>,
    pub output_dir: PathBuf,
}

pub fn build_payload(
    run_name: &str,
    dump_path: &Path,
    run_info_path: &Path,
    imaging: Option<&Path>,
) -> Result<ReportPayload> {
    let t_dump = Instant::now();
    let dump = read_dump(dump_path)?;
    log_stage("engine.read_dump", t_dump);
    let t_info = Instant::now();
    let run_info = read_run_info(run_info_path)?;
    log_stage("engine.read_run_info", t_info);
    assemble(run_name, &dump, &run_info, imaging)
}

/// Runs every aggregator over parsed inputs. The first failure aborts the
/// whole payload.
pub fn assemble(
    run_name: &str,
    dump: &DumpTables,
    run_info: &RunInfo,
    imaging: Option<&Path>,
) -> Result<ReportPayload> {
    let t = Instant::now();
    let colors = &DASHBOARD_COLORS[..];

    let intensity = intensity::intensity_by_cycle(dump.extraction()?, colors)?;
    let table = summary::summary_stats(dump, run_info)?;
    let surfaces = surface::surface_medians(dump.tile()?)?;
    let (clusters, densities) = distribution::cluster_and_density(dump.tile()?, colors)?;
    let bins = qscore::qscore_bins(dump.q_by_lane()?, colors)?;
    let cycles = qscore::qscore_by_cycle(dump.q2030()?, colors)?;
    let occupied_pass_filter = match imaging {
        Some(path) => serde_json::to_string(&occupancy::occupied_pass_filter(path)?)?,
        None => String::new(),
    };

    let payload = ReportPayload {
        run_name: run_name.to_string(),
        table_data: report::html::summary_table_html(&table),
        flowcell_data: serde_json::to_string(&surfaces)?,
        intensity_data: serde_json::to_string(&intensity)?,
        cluster_count_data: serde_json::to_string(&clusters)?,
        density_data: serde_json::to_string(&densities)?,
        qscore_bins_data: serde_json::to_string(&bins)?,
        qscore_cycles_data: serde_json::to_string(&cycles)?,
        occupied_pass_filter,
    };
    log_stage("engine.assemble", t);
    Ok(payload)
}

/// Generates the dumps for a run folder with the external tools, then writes
/// `<output_dir>/<run_id>.json`. Intermediates live in a scratch directory
/// removed on return.
pub fn run(cfg: RunConfig) -> Result<PathBuf> {
    if !cfg.run_path.exists() {
        return Err(InteropError::MissingFile(cfg.run_path.clone()));
    }
    let final_path = json_path(&cfg.output_dir, &cfg.run_id);
    if final_path.exists() {
        return Err(InteropError::OutputExists(final_path));
    }

    let scratch = TempDir::new().map_err(|e| InteropError::io(std::env::temp_dir(), e))?;
    let dump_path = scratch.path().join(format!("{}.csv", cfg.run_id));
    let t_dump = Instant::now();
    external::run_to_file(&cfg.dumptext_exe, &cfg.run_path, &dump_path)?;
    log_stage("engine.dumptext", t_dump);

    let imaging_path = if cfg.generate_imaging {
        let path = scratch.path().join(format!("{}_imaging.csv", cfg.run_id));
        let t_imaging = Instant::now();
        external::run_to_file(&cfg.imaging_exe, &cfg.run_path, &path)?;
        log_stage("engine.imaging_table", t_imaging);
        Some(path)
    } else {
        None
    };

    fs::create_dir_all(&cfg.output_dir).map_err(|e| InteropError::io(&cfg.output_dir, e))?;
    let payload = build_payload(
        &cfg.run_id,
        &dump_path,
        &cfg.run_path.join(RUN_INFO_FILE),
        imaging_path.as_deref(),
    )?;
    write_payload(&payload, scratch.path(), &final_path)?;
    Ok(final_path)
}

/// Builds the JSON record from dumps generated earlier.
pub fn run_from_dumps(cfg: JsonConfig) -> Result<PathBuf> {
    let final_path = json_path(&cfg.output_dir, &cfg.run_id);
    if final_path.exists() {
        return Err(InteropError::OutputExists(final_path));
    }
    let payload = build_payload(&cfg.run_id, &cfg.dump, &cfg.run_info, cfg.imaging.as_deref())?;
    fs::create_dir_all(&cfg.output_dir).map_err(|e| InteropError::io(&cfg.output_dir, e))?;
    let scratch = TempDir::new().map_err(|e| InteropError::io(std::env::temp_dir(), e))?;
    write_payload(&payload, scratch.path(), &final_path)?;
    Ok(final_path)
}

pub fn json_path(output_dir: &Path, run_id: &str) -> PathBuf {
    output_dir.join(format!("{}.json", run_id))
}

fn write_payload(payload: &ReportPayload, scratch: &Path, final_path: &Path) -> Result<()> {
    let tmp = scratch.join(
        final_path
            .file_name()
            .map_or_else(|| "payload.json".into(), |n| n.to_os_string()),
    );
    report::json::write_json(payload, &tmp, final_path).validation("failed to write report json")?;
    info!(output = %final_path.display(), "wrote report json");
    Ok(())
}

fn log_stage(name: &str, t: Instant) {
    debug!(stage = name, time = %fmt_dur(t.elapsed()), "stage done");
}

pub fn fmt_dur(d: Duration) -> String {
    if d.as_secs_f64() < 1.0 {
        format!("{}ms", d.as_millis())
    } else {
        format!("{:.3}s", d.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixtures;
    use tempfile::TempDir;

    fn write_inputs(dir: &Path) -> (PathBuf, PathBuf) {
        let dump = dir.join("run.csv");
        let info = dir.join(RUN_INFO_FILE);
        fs::write(&dump, fixtures::dump()).unwrap();
        fs::write(&info, fixtures::RUN_INFO).unwrap();
        (dump, info)
    }

    #[test]
    fn payload_without_imaging() {
        let dir = TempDir::new().unwrap();
        let (dump, info) = write_inputs(dir.path());
        let payload = build_payload("run1", &dump, &info, None).unwrap();
        assert_eq!(payload.run_name, "run1");
        assert!(payload.table_data.starts_with("<table"));
        assert!(!payload.flowcell_data.is_empty());
        assert!(payload.intensity_data.contains(r#""labels":[1,2]"#));
        assert_eq!(payload.occupied_pass_filter, "");

        let value = serde_json::to_value(&payload).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        for key in [
            "run_name",
            "table_data",
            "flowcell_data",
            "intensity_data",
            "cluster_count_data",
            "density_data",
            "qscore_bins_data",
            "qsocre_cycles_data",
            "occupied_pass_filter",
        ] {
            assert!(keys.contains(&key), "missing {key}");
        }
        let flowcell: serde_json::Value = serde_json::from_str(&payload.flowcell_data).unwrap();
        assert_eq!(flowcell["surface1"]["x"][0], "Tile 1101");
        assert_eq!(flowcell["surface2"]["x"][0], "Tile 2201");
    }

    #[test]
    fn payload_with_imaging() {
        let dir = TempDir::new().unwrap();
        let (dump, info) = write_inputs(dir.path());
        let imaging = dir.path().join("imaging.csv");
        fs::write(&imaging, fixtures::imaging_table(&[(1, 1101, "80", "70")])).unwrap();
        let payload = build_payload("run1", &dump, &info, Some(&imaging)).unwrap();
        let occ: serde_json::Value = serde_json::from_str(&payload.occupied_pass_filter).unwrap();
        assert_eq!(occ[0]["lane_id"], 1);
        assert_eq!(occ[0]["color"], "rgb(255, 99, 132)");
    }

    #[test]
    fn any_aggregator_failure_fails_payload() {
        let dir = TempDir::new().unwrap();
        let (dump, info) = write_inputs(dir.path());
        fs::write(
            &dump,
            fixtures::dump_replacing(
                "Q2030",
                "# Q2030,1\nLane,Tile,Cycle,Q20,Q30,Total,MedianQScore\n1,1101,1,9,9,10,3x\n",
            ),
        )
        .unwrap();
        let err = build_payload("run1", &dump, &info, None).unwrap_err();
        assert!(matches!(err.root(), InteropError::Cast { .. }));
    }

    #[test]
    fn json_from_dumps_refuses_existing_output() {
        let dir = TempDir::new().unwrap();
        let (dump, info) = write_inputs(dir.path());
        let out = dir.path().join("out");
        let cfg = || JsonConfig {
            run_id: "run1".into(),
            dump: dump.clone(),
            run_info: info.clone(),
            imaging: None,
            output_dir: out.clone(),
        };
        let written = run_from_dumps(cfg()).unwrap();
        assert_eq!(written, out.join("run1.json"));
        let record: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&written).unwrap()).unwrap();
        assert_eq!(record["run_name"], "run1");

        let err = run_from_dumps(cfg()).unwrap_err();
        assert!(matches!(err, InteropError::OutputExists(_)));
    }

    #[test]
    fn missing_run_path_fails_first() {
        let dir = TempDir::new().unwrap();
        let err = run(RunConfig {
            run_id: "r".into(),
            run_path: dir.path().join("absent"),
            output_dir: dir.path().join("out"),
            generate_imaging: false,
            dumptext_exe: "interop_dumptext".into(),
            imaging_exe: "interop_imaging_table".into(),
        })
        .unwrap_err();
        assert!(matches!(err, InteropError::MissingFile(_)));
    }

    #[cfg(unix)]
    mod orchestration {
        use super::*;
        use crate::core::fixtures::stub_executable;

        fn run_folder(dir: &Path) -> PathBuf {
            let run_path = dir.join("200101_A00001_0001_AHXXXXXXXX");
            fs::create_dir_all(&run_path).unwrap();
            fs::write(run_path.join(RUN_INFO_FILE), fixtures::RUN_INFO).unwrap();
            fs::write(dir.join("dump.txt"), fixtures::dump()).unwrap();
            fs::write(
                dir.join("imaging.txt"),
                fixtures::imaging_table(&[(1, 1101, "80", "70"), (1, 2201, "85", "75")]),
            )
            .unwrap();
            run_path
        }

        fn config(dir: &Path, run_path: PathBuf, generate_imaging: bool) -> RunConfig {
            let dumptext = stub_executable(
                dir,
                "interop_dumptext",
                &format!("cat {}", dir.join("dump.txt").display()),
            );
            let imaging = stub_executable(
                dir,
                "interop_imaging_table",
                &format!("cat {}", dir.join("imaging.txt").display()),
            );
            RunConfig {
                run_id: "run1".into(),
                run_path,
                output_dir: dir.join("out"),
                generate_imaging,
                dumptext_exe: dumptext,
                imaging_exe: imaging,
            }
        }

        #[test]
        fn end_to_end_with_stub_tools() {
            let dir = TempDir::new().unwrap();
            let run_path = run_folder(dir.path());
            let written = run(config(dir.path(), run_path, false)).unwrap();
            let record: serde_json::Value =
                serde_json::from_str(&fs::read_to_string(&written).unwrap()).unwrap();
            assert!(!record["table_data"].as_str().unwrap().is_empty());
            assert!(!record["flowcell_data"].as_str().unwrap().is_empty());
            assert!(!record["intensity_data"].as_str().unwrap().is_empty());
            assert_eq!(record["occupied_pass_filter"], "");
        }

        #[test]
        fn imaging_table_is_generated_on_request() {
            let dir = TempDir::new().unwrap();
            let run_path = run_folder(dir.path());
            let written = run(config(dir.path(), run_path, true)).unwrap();
            let record: serde_json::Value =
                serde_json::from_str(&fs::read_to_string(&written).unwrap()).unwrap();
            let occ: serde_json::Value =
                serde_json::from_str(record["occupied_pass_filter"].as_str().unwrap()).unwrap();
            assert_eq!(occ[0]["x"], serde_json::json!([80.0, 85.0]));
        }

        #[test]
        fn existing_output_is_not_touched() {
            let dir = TempDir::new().unwrap();
            let run_path = run_folder(dir.path());
            let out = dir.path().join("out");
            fs::create_dir_all(&out).unwrap();
            fs::write(out.join("run1.json"), "old").unwrap();
            let err = run(config(dir.path(), run_path, false)).unwrap_err();
            assert!(matches!(err, InteropError::OutputExists(_)));
            assert_eq!(fs::read_to_string(out.join("run1.json")).unwrap(), "old");
        }

        #[test]
        fn failing_tool_aborts_before_output() {
            let dir = TempDir::new().unwrap();
            let run_path = run_folder(dir.path());
            let mut cfg = config(dir.path(), run_path, false);
            cfg.dumptext_exe = stub_executable(dir.path(), "bad_dump", "exit 1");
            let err = run(cfg).unwrap_err();
            assert!(matches!(err, InteropError::CommandFailed { .. }));
            assert!(!dir.path().join("out").join("run1.json").exists());
        }
    }
}
