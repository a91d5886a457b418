use crate::core::error::{InteropError, Result, ValidationContext};
use crate::core::io::InputText;
use crate::core::model::ReadDescriptor;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

static READ_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^<Read Number="(\d+)" NumCycles="(\d+)" IsIndexedRead="(Y|N)"[^>]*/>"#)
        .expect("valid read tag pattern")
});

/// Per-read cycle layout of a run, in the order the reads appear in RunInfo.xml.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunInfo {
    pub reads: Vec<ReadDescriptor>,
}

impl RunInfo {
    pub fn total_cycles(&self) -> u32 {
        self.reads.iter().map(|r| r.cycles).sum()
    }

    pub fn read(&self, read_id: u32) -> Option<&ReadDescriptor> {
        self.reads.iter().find(|r| r.read_id == read_id)
    }
}

pub fn read_run_info(path: &Path) -> Result<RunInfo> {
    let input = InputText::open(path).validation("failed to read RunInfo.xml for sequencing run")?;
    parse_run_info(input.lines()).validation("failed to read RunInfo.xml for sequencing run")
}

/// Lines that start with `<Read Number` but do not match the tag pattern are
/// skipped. Read numbers are not checked against encounter order.
pub fn parse_run_info<'a, I>(lines: I) -> Result<RunInfo>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut reads = Vec::new();
    let mut start_cycle = 0u32;
    for raw in lines {
        let text = String::from_utf8_lossy(raw);
        let line = text.trim();
        if !line.starts_with("<Read Number") {
            continue;
        }
        let Some(caps) = READ_TAG.captures(line) else {
            debug!(line, "skipping unmatched read tag");
            continue;
        };
        let (Ok(read_id), Ok(cycles)) = (caps[1].parse::<u32>(), caps[2].parse::<u32>()) else {
            debug!(line, "skipping read tag with out-of-range numbers");
            continue;
        };
        let Some(next_start) = start_cycle.checked_add(cycles) else {
            return Err(InteropError::EmptyData(format!(
                "total cycle count of run configuration overflows at read {read_id}"
            )));
        };
        reads.push(ReadDescriptor {
            read_id,
            cycles,
            start_cycle,
            index_read: &caps[3] == "Y",
        });
        start_cycle = next_start;
    }
    if reads.is_empty() {
        return Err(InteropError::EmptyData(
            "no <Read> entries found in run configuration".to_string(),
        ));
    }
    let info = RunInfo { reads };
    debug!(reads = info.reads.len(), total_cycles = info.total_cycles(), "parsed run configuration");
    Ok(info)
}
