//! Input discovery and record splitting.
//!
//! An input path is either a single file or a directory walked recursively.
//! Each file is streamed through a [`RecordReader`], which yields one
//! [`Record`] per blank-line-delimited block.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use hours_core::error::{HoursError, Result};
use hours_core::models::Record;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

// ── Public API ────────────────────────────────────────────────────────────────

/// Resolve `input` into the list of files to read, sorted by path.
///
/// A file path is returned as-is. A directory is walked recursively; entries
/// whose name starts with `_` or `.` are skipped, so bookkeeping files such
/// as `_SUCCESS` from an earlier run are never read as records.
pub fn find_input_files(input: &Path) -> Result<Vec<PathBuf>> {
    if !input.exists() {
        return Err(HoursError::InputNotFound(input.to_path_buf()));
    }
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }

    let mut files: Vec<PathBuf> = Vec::new();
    let walker = WalkDir::new(input)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(input).to_path_buf();
            HoursError::FileRead {
                path,
                source: e.into(),
            }
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    files.sort();
    if files.is_empty() {
        warn!("No input files found in {}", input.display());
    } else {
        debug!("Found {} input files under {}", files.len(), input.display());
    }
    Ok(files)
}

/// Open `path` for streaming record reads.
pub fn open_records(path: &Path) -> Result<RecordReader<BufReader<File>>> {
    let file = File::open(path).map_err(|source| HoursError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(RecordReader::new(BufReader::new(file)))
}

/// Split an in-memory string into records.
pub fn records_from_str(text: &str) -> Vec<Record> {
    RecordReader::new(text.as_bytes())
        .collect::<io::Result<Vec<_>>>()
        .unwrap_or_default()
}

// ── RecordReader ──────────────────────────────────────────────────────────────

/// Streams records out of a buffered reader.
///
/// Lines accumulate until an empty line closes the record. Runs of empty
/// lines produce no empty records. `\r\n` endings are accepted and invalid
/// UTF-8 is replaced rather than rejected.
pub struct RecordReader<R> {
    inner: R,
    buf: Vec<u8>,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
        }
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = io::Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut lines: Vec<String> = Vec::new();

        loop {
            self.buf.clear();
            match self.inner.read_until(b'\n', &mut self.buf) {
                Ok(0) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&self.buf);
                    let line = strip_line_ending(&text);
                    if line.is_empty() {
                        if lines.is_empty() {
                            continue;
                        }
                        break;
                    }
                    lines.push(line.to_string());
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Some(Err(e)),
            }
        }

        if lines.is_empty() {
            None
        } else {
            Some(Ok(Record::new(lines)))
        }
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn strip_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('_') || name.starts_with('.'))
        .unwrap_or(false)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
