use crate::core::error::{InteropError, Result};
use flate2::read::MultiGzDecoder;
use memmap2::Mmap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

pub struct MmapSource {
    mmap: Mmap,
}

impl MmapSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| InteropError::io(path, e))?;
        // SAFETY: read-only file mapping.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| InteropError::io(path, e))?;
        Ok(Self { mmap })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.mmap
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InputKind {
    Plain,
    Gzip,
}

enum TextData {
    Mapped(MmapSource),
    Owned(Vec<u8>),
}

/// A whole text input held in memory, either mapped or decompressed.
pub struct InputText {
    kind: InputKind,
    data: TextData,
}

impl InputText {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(InteropError::MissingFile(path.to_path_buf()));
        }
        let kind = detect_input_kind(path)?;
        let data = match kind {
            InputKind::Plain => {
                let len = path
                    .metadata()
                    .map_err(|e| InteropError::io(path, e))?
                    .len();
                // Zero-length files cannot be mapped on every platform.
                if len == 0 {
                    TextData::Owned(Vec::new())
                } else {
                    TextData::Mapped(MmapSource::open(path)?)
                }
            }
            InputKind::Gzip => {
                let file = File::open(path).map_err(|e| InteropError::io(path, e))?;
                let mut decoder = MultiGzDecoder::new(BufReader::new(file));
                let mut buf = Vec::new();
                decoder
                    .read_to_end(&mut buf)
                    .map_err(|e| InteropError::io(path, e))?;
                TextData::Owned(buf)
            }
        };
        Ok(Self { kind, data })
    }

    pub fn kind(&self) -> InputKind {
        self.kind
    }

    pub fn bytes(&self) -> &[u8] {
        match &self.data {
            TextData::Mapped(m) => m.bytes(),
            TextData::Owned(v) => v.as_slice(),
        }
    }

    pub fn lines(&self) -> Lines<'_> {
        Lines {
            buf: self.bytes(),
            pos: 0,
        }
    }
}

/// Line iterator over a byte buffer; terminators (`\n`, `\r\n`) are stripped.
pub struct Lines<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for Lines<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        if self.pos >= self.buf.len() {
            return None;
        }
        let rest = &self.buf[self.pos..];
        let (mut line, advance) = match memchr::memchr(b'\n', rest) {
            Some(i) => (&rest[..i], i + 1),
            None => (rest, rest.len()),
        };
        self.pos += advance;
        if let [head @ .., b'\r'] = line {
            line = head;
        }
        Some(line)
    }
}

pub fn detect_input_kind(path: &Path) -> Result<InputKind> {
    if let Some(ext) = path.extension().and_then(|s| s.to_str()) {
        let ext = ext.to_ascii_lowercase();
        if ext == "gz" {
            return Ok(InputKind::Gzip);
        }
    }
    let mut file = File::open(path).map_err(|e| InteropError::io(path, e))?;
    let mut magic = [0u8; 2];
    let n = file
        .read(&mut magic)
        .map_err(|e| InteropError::io(path, e))?;
    if n == 2 && magic == [0x1f, 0x8b] {
        Ok(InputKind::Gzip)
    } else {
        Ok(InputKind::Plain)
    }
}
