use crate::core::error::{InteropError, Result};
use std::fs::File;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Runs `exe <run_path>` and captures its stdout into `out`. The executable is
/// resolved through `PATH` unless it is given as a path.
pub fn run_to_file(exe: &str, run_path: &Path, out: &Path) -> Result<()> {
    let stdout = File::create(out).map_err(|e| InteropError::io(out, e))?;
    let command = format!("{} {}", exe, run_path.display());
    info!(%command, output = %out.display(), "running external tool");

    let status = Command::new(exe)
        .arg(run_path)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .status()
        .map_err(|e| InteropError::io(exe, e))?;
    if !status.success() {
        return Err(InteropError::CommandFailed { command, status });
    }
    debug!(%command, "external tool finished");
    Ok(())
}
