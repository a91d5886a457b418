use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "kira-interop",
    version,
    about = "Dashboard data from Illumina InterOp dumps"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Dump a run folder with the InterOp tools and write `<run_id>.json`.
    Run(RunArgs),
    /// Write `<run_id>.json` from dumps generated earlier.
    Json(JsonArgs),
    /// Write a standalone HTML report with summary table and charts.
    Plot(PlotArgs),
}

#[derive(Args)]
pub struct RunArgs {
    #[arg(short = 'i', long)]
    pub run_id: String,

    #[arg(short = 'r', long)]
    pub run_path: PathBuf,

    #[arg(short = 'o', long)]
    pub output_dir: PathBuf,

    /// Also run the imaging table tool and include occupancy data.
    #[arg(short = 'm', long, default_value_t = false)]
    pub generate_imaging: bool,

    #[arg(short = 'd', long, default_value = "interop_dumptext")]
    pub interop_dumptext_exe: String,

    #[arg(short = 't', long, default_value = "interop_imaging_table")]
    pub interop_imaging_table_exe: String,
}

#[derive(Args)]
pub struct JsonArgs {
    #[arg(long)]
    pub run_id: String,

    #[arg(long)]
    pub dump: PathBuf,

    #[arg(long)]
    pub run_info: PathBuf,

    #[arg(long)]
    pub imaging: Option<PathBuf>,

    #[arg(long)]
    pub out: PathBuf,
}

#[derive(Args)]
pub struct PlotArgs {
    #[arg(long)]
    pub dump: PathBuf,

    #[arg(long)]
    pub run_info: PathBuf,

    #[arg(long)]
    pub out: PathBuf,
}
