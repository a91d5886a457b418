use crate::cli::args::{Cli, Commands, JsonArgs, PlotArgs, RunArgs};
use crate::core::dump::read_dump;
use crate::core::engine::{self, JsonConfig, RunConfig, fmt_dur};
use crate::core::runinfo::read_run_info;
use crate::report;
use anyhow::{Context, Result, bail};
use clap::Parser;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub fn entry() -> ExitCode {
    init_logging();
    let cli = Cli::parse();
    let res = match cli.command {
        Commands::Run(args) => run(args),
        Commands::Json(args) => json(args),
        Commands::Plot(args) => plot(args),
    };
    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run(args: RunArgs) -> Result<()> {
    let t0 = Instant::now();
    stage("preflight", || {
        if args.run_id.trim().is_empty() {
            bail!("--run-id must not be empty");
        }
        if !args.run_path.exists() {
            bail!("run path {} not found", args.run_path.display());
        }
        Ok(())
    })?;

    let config = RunConfig {
        run_id: args.run_id.clone(),
        run_path: args.run_path.clone(),
        output_dir: args.output_dir.clone(),
        generate_imaging: args.generate_imaging,
        dumptext_exe: args.interop_dumptext_exe.clone(),
        imaging_exe: args.interop_imaging_table_exe.clone(),
    };

    let t_engine = Instant::now();
    let written = engine::run(config)
        .with_context(|| format!("failed to build dashboard data for run {}", args.run_id))?;
    stage_done("engine", t_engine);
    info!(output = %written.display(), total = %fmt_dur(t0.elapsed()), "done");
    Ok(())
}

fn json(args: JsonArgs) -> Result<()> {
    let t0 = Instant::now();
    stage("preflight", || {
        for p in [&args.dump, &args.run_info]
            .into_iter()
            .chain(args.imaging.as_ref())
        {
            if !p.is_file() {
                bail!("input file not found: {}", p.display());
            }
        }
        Ok(())
    })?;

    let config = JsonConfig {
        run_id: args.run_id.clone(),
        dump: args.dump,
        run_info: args.run_info,
        imaging: args.imaging,
        output_dir: args.out,
    };
    let written = engine::run_from_dumps(config)
        .with_context(|| format!("failed to build dashboard data for run {}", args.run_id))?;
    info!(output = %written.display(), total = %fmt_dur(t0.elapsed()), "done");
    Ok(())
}

fn plot(args: PlotArgs) -> Result<()> {
    let t0 = Instant::now();
    let t_read = Instant::now();
    let dump = read_dump(&args.dump)?;
    let run_info = read_run_info(&args.run_info)?;
    stage_done("read", t_read);

    let title = args
        .dump
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .context("failed to determine run name from dump file")?;

    let t_html = Instant::now();
    report::html::write_plot_report(&args.out, &title, &dump, &run_info)
        .with_context(|| format!("failed to get report and plots for {}", args.dump.display()))?;
    stage_done("html", t_html);
    info!(output = %args.out.display(), total = %fmt_dur(t0.elapsed()), "done");
    Ok(())
}

fn stage<F>(name: &str, f: F) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    let t = Instant::now();
    let res = f();
    stage_done(name, t);
    res
}

fn stage_done(name: &str, t: Instant) {
    info!(stage = name, time = %fmt_dur(t.elapsed()), "stage done");
}
