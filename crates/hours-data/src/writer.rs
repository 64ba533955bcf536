//! Histogram serialization and output commit.
//!
//! A directory target receives `part-r-00000` and an empty `_SUCCESS`
//! marker. Both are written into a staging directory beside the target and
//! renamed into place only once complete, so a failed run leaves no output.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use hours_core::error::{HoursError, Result};
use hours_core::models::{Histogram, OutputFormat};
use serde::Serialize;
use tracing::debug;

/// Name of the histogram file inside an output directory.
pub const PART_FILE: &str = "part-r-00000";

/// Empty marker written once the output directory is complete.
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// Serialize `histogram` to `sink` in `format`.
pub fn write_histogram<W: Write>(
    histogram: &Histogram,
    format: OutputFormat,
    sink: &mut W,
) -> io::Result<()> {
    match format {
        OutputFormat::Tsv => {
            for (hour, count) in histogram.iter() {
                writeln!(sink, "{hour}\t{count}")?;
            }
        }
        OutputFormat::Json => {
            serde_json::to_writer(&mut *sink, histogram).map_err(io::Error::other)?;
            writeln!(sink)?;
        }
    }
    sink.flush()
}

// ── Staged output ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StagedKind {
    Dir,
    File,
}

/// Output written beside its final location and moved into place by
/// [`StagedOutput::commit`]. Dropping it uncommitted removes the staged copy.
#[derive(Debug)]
#[must_use = "staged output is discarded unless committed"]
pub struct StagedOutput {
    staged: PathBuf,
    target: PathBuf,
    kind: StagedKind,
    committed: bool,
}

impl StagedOutput {
    /// Final location the output is committed to.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Rename the staged copy onto its target, replacing what is there.
    pub fn commit(mut self) -> Result<()> {
        match self.kind {
            StagedKind::Dir => replace_dir(&self.staged, &self.target)?,
            StagedKind::File => {
                fs::rename(&self.staged, &self.target).map_err(|e| output_err(&self.target, e))?
            }
        }
        self.committed = true;
        debug!("Committed {}", self.target.display());
        Ok(())
    }
}

impl Drop for StagedOutput {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let _ = match self.kind {
            StagedKind::Dir => fs::remove_dir_all(&self.staged),
            StagedKind::File => fs::remove_file(&self.staged),
        };
    }
}

/// Stage `histogram` as an output directory for `dir` without touching
/// `dir` itself.
///
/// Fails with [`HoursError::OutputExists`] when `dir` is already present and
/// `overwrite` is `false`.
pub fn stage_output_dir(
    dir: &Path,
    histogram: &Histogram,
    format: OutputFormat,
    overwrite: bool,
) -> Result<StagedOutput> {
    if dir.exists() && !overwrite {
        return Err(HoursError::OutputExists(dir.to_path_buf()));
    }

    let staging = staging_path(dir)?;
    if staging.exists() {
        fs::remove_dir_all(&staging).map_err(|e| output_err(&staging, e))?;
    }

    if let Err(e) = fill_staging(&staging, histogram, format) {
        let _ = fs::remove_dir_all(&staging);
        return Err(e);
    }

    Ok(StagedOutput {
        staged: staging,
        target: dir.to_path_buf(),
        kind: StagedKind::Dir,
        committed: false,
    })
}

/// Stage `value` as pretty JSON in a temp file next to `path`.
pub fn stage_json_file<T: Serialize>(path: &Path, value: &T) -> Result<StagedOutput> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| output_err(parent, e))?;
    }

    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|e| output_err(&tmp, e))?;

    Ok(StagedOutput {
        staged: tmp,
        target: path.to_path_buf(),
        kind: StagedKind::File,
        committed: false,
    })
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn output_err(path: &Path, source: io::Error) -> HoursError {
    HoursError::OutputWrite {
        path: path.to_path_buf(),
        source,
    }
}

/// Sibling of `dir` used while the output is being written.
fn staging_path(dir: &Path) -> Result<PathBuf> {
    let name = dir.file_name().ok_or_else(|| {
        HoursError::Config(format!("output path {} has no file name", dir.display()))
    })?;
    let parent = dir
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| output_err(parent, e))?;

    let mut staging_name = std::ffi::OsString::from(".");
    staging_name.push(name);
    staging_name.push(format!(".tmp-{}", std::process::id()));
    Ok(parent.join(staging_name))
}

fn fill_staging(staging: &Path, histogram: &Histogram, format: OutputFormat) -> Result<()> {
    fs::create_dir(staging).map_err(|e| output_err(staging, e))?;

    let part = staging.join(PART_FILE);
    let file = fs::File::create(&part).map_err(|e| output_err(&part, e))?;
    let mut sink = io::BufWriter::new(file);
    write_histogram(histogram, format, &mut sink).map_err(|e| output_err(&part, e))?;
    sink.into_inner()
        .map_err(|e| output_err(&part, e.into_error()))?
        .sync_all()
        .map_err(|e| output_err(&part, e))?;

    let marker = staging.join(SUCCESS_MARKER);
    fs::File::create(&marker).map_err(|e| output_err(&marker, e))?;
    debug!("Staged output in {}", staging.display());
    Ok(())
}

fn replace_dir(staging: &Path, dir: &Path) -> Result<()> {
    if dir.is_dir() {
        fs::remove_dir_all(dir).map_err(|e| output_err(dir, e))?;
    } else if dir.exists() {
        fs::remove_file(dir).map_err(|e| output_err(dir, e))?;
    }
    fs::rename(staging, dir).map_err(|e| output_err(dir, e))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
