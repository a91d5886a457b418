use crate::core::error::{InteropError, Result, ValidationContext};
use crate::core::io::InputText;
use crate::core::model::SectionTable;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

pub const REQUIRED_SECTIONS: [&str; 7] = [
    "CorrectedInt",
    "Tile",
    "Q2030",
    "Extraction",
    "Error",
    "EmpiricalPhasing",
    "QByLane",
];

const METADATA_MARKERS: [&str; 4] = ["Version", "Column Count", "Bin Count", "Channel Count"];

/// All sections of an `interop_dumptext` export, keyed by section name.
#[derive(Debug, Default)]
pub struct DumpTables {
    sections: BTreeMap<String, SectionTable>,
}

impl DumpTables {
    pub fn section(&self, name: &str) -> Result<&SectionTable> {
        self.sections
            .get(name)
            .ok_or_else(|| InteropError::MissingSection(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    pub fn tile(&self) -> Result<&SectionTable> {
        self.section("Tile")
    }

    pub fn q2030(&self) -> Result<&SectionTable> {
        self.section("Q2030")
    }

    pub fn extraction(&self) -> Result<&SectionTable> {
        self.section("Extraction")
    }

    pub fn error(&self) -> Result<&SectionTable> {
        self.section("Error")
    }

    pub fn corrected_int(&self) -> Result<&SectionTable> {
        self.section("CorrectedInt")
    }

    pub fn q_by_lane(&self) -> Result<&SectionTable> {
        self.section("QByLane")
    }
}

pub fn read_dump(path: &Path) -> Result<DumpTables> {
    let input = InputText::open(path).validation("failed to extract data from interop dump")?;
    debug!(path = %path.display(), kind = ?input.kind(), "reading interop dump");
    parse_dump(input.lines()).validation("failed to extract data from interop dump")
}

/// Splits dump lines into sections. `#` lines either carry metadata or open a
/// new section; inside a section the line holding a `Lane` field is the header.
pub fn parse_dump<'a, I>(lines: I) -> Result<DumpTables>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut tables = DumpTables::default();
    let mut current: Option<String> = None;
    let mut header: Option<Vec<String>> = None;

    for raw in lines {
        let text = String::from_utf8_lossy(raw);
        let line = text.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('#') {
            let marker = line.trim_start_matches(['#', ' ']);
            if METADATA_MARKERS.iter().any(|m| marker.starts_with(m)) {
                continue;
            }
            let name = marker.split(',').next().unwrap_or("").trim().to_string();
            current = Some(name);
            header = None;
            continue;
        }
        let Some(name) = current.as_ref() else {
            continue;
        };
        let fields: Vec<String> = line.split(',').map(str::to_string).collect();
        if fields.iter().any(|f| f == "Lane") {
            header = Some(fields);
            continue;
        }
        let Some(cols) = header.as_ref() else {
            continue;
        };
        let table = tables
            .sections
            .entry(name.clone())
            .or_insert_with(|| SectionTable::new(name.clone(), cols.clone()));
        push_row(table, cols, fields);
    }

    for key in REQUIRED_SECTIONS {
        match tables.sections.get(key) {
            Some(t) if !t.is_empty() => {}
            _ => return Err(InteropError::MissingSection(key.to_string())),
        }
    }
    for (name, table) in &tables.sections {
        debug!(section = %name, rows = table.len(), columns = table.headers.len(), "parsed dump section");
    }
    debug!(sections = ?tables.names().collect::<Vec<_>>(), "parsed interop dump");
    Ok(tables)
}

/// Stores `fields` in the table's column order. A section that reappears
/// under a different header is remapped by column name; unseen columns are
/// appended and left empty in earlier rows.
fn push_row(table: &mut SectionTable, cols: &[String], fields: Vec<String>) {
    if table.headers == cols {
        table.rows.push(fields);
        return;
    }
    let slots: Vec<usize> = cols
        .iter()
        .map(|col| match table.headers.iter().position(|h| h == col) {
            Some(i) => i,
            None => {
                table.headers.push(col.clone());
                table.headers.len() - 1
            }
        })
        .collect();
    let width = table.headers.len();
    for row in &mut table.rows {
        if row.len() < width {
            row.resize(width, String::new());
        }
    }
    let mut row = vec![String::new(); width];
    for (slot, value) in slots.into_iter().zip(fields) {
        row[slot] = value;
    }
    table.rows.push(row);
}
