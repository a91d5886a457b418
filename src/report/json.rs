use crate::core::error::{InteropError, Result};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Serializes `value` to `tmp_path`, then copies it to `final_path`. An
/// existing `final_path` is never replaced; the check runs before the write
/// and again before the copy.
pub fn write_json<T: Serialize>(value: &T, tmp_path: &Path, final_path: &Path) -> Result<()> {
    if final_path.exists() {
        return Err(InteropError::OutputExists(final_path.to_path_buf()));
    }

    let result = write_tmp(value, tmp_path).and_then(|_| {
        if final_path.exists() {
            return Err(InteropError::OutputExists(final_path.to_path_buf()));
        }
        fs::copy(tmp_path, final_path).map_err(|e| InteropError::io(final_path, e))?;
        Ok(())
    });
    if result.is_err() {
        let _ = fs::remove_file(tmp_path);
    }
    result
}

fn write_tmp<T: Serialize>(value: &T, tmp_path: &Path) -> Result<()> {
    let file = File::create(tmp_path).map_err(|e| InteropError::io(tmp_path, e))?;
    let mut w = BufWriter::new(file);
    serde_json::to_writer(&mut w, value)?;
    w.flush().map_err(|e| InteropError::io(tmp_path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn copies_into_place() {
        let dir = TempDir::new().unwrap();
        let tmp = dir.path().join("tmp.json");
        let out = dir.path().join("run.json");
        let mut value = BTreeMap::new();
        value.insert("run_name", "r1");
        write_json(&value, &tmp, &out).unwrap();
        assert_eq!(fs::read_to_string(&out).unwrap(), r#"{"run_name":"r1"}"#);
    }

    #[test]
    fn refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let tmp = dir.path().join("tmp.json");
        let out = dir.path().join("run.json");
        fs::write(&out, "keep").unwrap();
        let err = write_json(&"x", &tmp, &out).unwrap_err();
        assert!(matches!(err, InteropError::OutputExists(p) if p == out));
        assert_eq!(fs::read_to_string(&out).unwrap(), "keep");
        assert!(!tmp.exists());
    }
}
