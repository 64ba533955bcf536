//! End-to-end job pipeline.
//!
//! Discovers input files, aggregates them into an hour histogram, commits
//! the output and returns a [`RunSummary`] describing the run.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;
use hours_core::error::{HoursError, Result};
use hours_core::models::Histogram;
use hours_core::settings::{JobConfig, OutputTarget, STDOUT_OUTPUT};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregator::HourAggregator;
use crate::reader::find_input_files;
use crate::writer::{stage_json_file, stage_output_dir, write_histogram};

// ── Public types ──────────────────────────────────────────────────────────────

/// Metadata describing one completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// ISO-8601 timestamp when the run finished.
    pub generated_at: String,
    pub input: PathBuf,
    pub filter_by_keyword: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    pub files_read: usize,
    pub records_read: u64,
    pub records_emitted: u64,
    pub records_malformed: u64,
    /// Number of distinct hour buckets in the output.
    pub hours_observed: usize,
    /// Wall-clock seconds spent reading and aggregating input.
    pub aggregate_time_seconds: f64,
}

/// The histogram produced by [`run_job`] together with its summary.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub histogram: Histogram,
    pub summary: RunSummary,
}

// ── Public function ───────────────────────────────────────────────────────────

/// Run a full job.
///
/// 1. Refuse an existing output directory unless overwriting.
/// 2. Resolve the input path into files.
/// 3. Aggregate every file on the current rayon pool.
/// 4. Stage the run summary and the histogram output.
/// 5. Commit the summary, then the output.
///
/// Any unreadable input or unwritable output aborts the run without
/// leaving a completed output directory behind.
pub fn run_job(job: &JobConfig) -> Result<JobOutcome> {
    // ── Step 1: Check output ──────────────────────────────────────────────────
    if let OutputTarget::Directory(dir) = &job.output {
        if dir.exists() && !job.overwrite {
            return Err(HoursError::OutputExists(dir.clone()));
        }
    }

    // ── Step 2: Discover input ────────────────────────────────────────────────
    let files = find_input_files(&job.input)?;
    info!(
        "Aggregating {} file(s) from {} ({})",
        files.len(),
        job.input.display(),
        describe_mode(job)
    );

    // ── Step 3: Aggregate ─────────────────────────────────────────────────────
    let aggregate_start = Instant::now();
    let aggregator = HourAggregator::new(job.aggregator.clone());
    let aggregation = aggregator.aggregate_files(&files)?;
    let aggregate_time = aggregate_start.elapsed().as_secs_f64();

    let stats = aggregation.stats;
    let summary = RunSummary {
        generated_at: Utc::now().to_rfc3339(),
        input: job.input.clone(),
        filter_by_keyword: job.aggregator.filter_by_keyword,
        keyword: job
            .aggregator
            .filter_by_keyword
            .then(|| job.aggregator.keyword.clone()),
        files_read: files.len(),
        records_read: stats.records_read,
        records_emitted: stats.records_emitted,
        records_malformed: stats.records_malformed,
        hours_observed: aggregation.histogram.len(),
        aggregate_time_seconds: aggregate_time,
    };

    // ── Step 4: Stage ─────────────────────────────────────────────────────────
    let staged_summary = job
        .summary
        .as_deref()
        .map(|path| stage_json_file(path, &summary))
        .transpose()?;

    let staged_output = match &job.output {
        OutputTarget::Stdout => None,
        OutputTarget::Directory(dir) => Some(stage_output_dir(
            dir,
            &aggregation.histogram,
            job.format,
            job.overwrite,
        )?),
    };

    // ── Step 5: Commit ────────────────────────────────────────────────────────
    let summary_path = match staged_summary {
        Some(staged) => {
            let path = staged.target().to_path_buf();
            staged.commit()?;
            Some(path)
        }
        None => None,
    };

    let committed = match staged_output {
        Some(staged) => {
            let dir = staged.target().to_path_buf();
            staged.commit().map(|()| {
                info!("Wrote {} hour buckets to {}", aggregation.histogram.len(), dir.display());
            })
        }
        None => {
            let mut lock = io::stdout().lock();
            write_histogram(&aggregation.histogram, job.format, &mut lock).map_err(|source| {
                HoursError::OutputWrite {
                    path: PathBuf::from(STDOUT_OUTPUT),
                    source,
                }
            })
        }
    };
    if let Err(e) = committed {
        if let Some(path) = &summary_path {
            let _ = fs::remove_file(path);
        }
        return Err(e);
    }

    if let Some(path) = &summary_path {
        info!("Summary written to {}", path.display());
    }
    info!(
        "Run complete: {} records read, {} counted, {} malformed, {} hour buckets",
        summary.records_read, summary.records_emitted, summary.records_malformed, summary.hours_observed
    );

    Ok(JobOutcome {
        histogram: aggregation.histogram,
        summary,
    })
}

fn describe_mode(job: &JobConfig) -> String {
    if job.aggregator.filter_by_keyword {
        format!("keyword filter {:?}", job.aggregator.keyword)
    } else {
        "all records".to_string()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{PART_FILE, SUCCESS_MARKER};
    use hours_core::models::{AggregatorConfig, OutputFormat};
    use std::path::Path;
    use tempfile::TempDir;

    fn job(input: &Path, output: &Path, aggregator: AggregatorConfig) -> JobConfig {
        JobConfig {
            input: input.to_path_buf(),
            output: OutputTarget::Directory(output.to_path_buf()),
            aggregator,
            format: OutputFormat::Tsv,
            threads: None,
            overwrite: false,
            summary: None,
        }
    }

    fn write_input(tmp: &TempDir) -> PathBuf {
        let input = tmp.path().join("input");
        fs::create_dir_all(&input).unwrap();
        fs::write(
            input.join("day-1.txt"),
            "T 2020-01-01 09:15:00\nU http://twitter.com/a\nW hello sleep world\n\n\
             T 2020-01-01 09:20:00\nW good morning\n\n",
        )
        .unwrap();
        fs::write(
            input.join("day-2.txt"),
            "T 2020-01-02 10:00:00\nW need sleep now\n\nT bad\nW sleep\n\n",
        )
        .unwrap();
        input
    }

    #[test]
    fn test_run_job_filtered_end_to_end() {
        let tmp = TempDir::new().expect("tempdir");
        let input = write_input(&tmp);
        let output = tmp.path().join("output");

        let outcome = run_job(&job(&input, &output, AggregatorConfig::with_keyword("sleep"))).unwrap();

        assert_eq!(fs::read_to_string(output.join(PART_FILE)).unwrap(), "09\t1\n10\t1\n");
        assert!(output.join(SUCCESS_MARKER).exists());
        assert_eq!(outcome.summary.files_read, 2);
        assert_eq!(outcome.summary.records_read, 4);
        assert_eq!(outcome.summary.records_emitted, 2);
        assert_eq!(outcome.summary.records_malformed, 1);
        assert_eq!(outcome.summary.keyword.as_deref(), Some("sleep"));
    }

    #[test]
    fn test_run_job_unfiltered_end_to_end() {
        let tmp = TempDir::new().expect("tempdir");
        let input = write_input(&tmp);
        let output = tmp.path().join("output");

        let outcome = run_job(&job(&input, &output, AggregatorConfig::unfiltered())).unwrap();

        assert_eq!(fs::read_to_string(output.join(PART_FILE)).unwrap(), "09\t2\n10\t1\n");
        assert_eq!(outcome.histogram.total(), 3);
        assert!(outcome.summary.keyword.is_none());
    }

    #[test]
    fn test_run_job_reads_previous_output_dir_as_input() {
        let tmp = TempDir::new().expect("tempdir");
        let input = write_input(&tmp);
        fs::write(input.join("_SUCCESS"), "").unwrap();
        let output = tmp.path().join("output");

        let outcome = run_job(&job(&input, &output, AggregatorConfig::unfiltered())).unwrap();
        assert_eq!(outcome.summary.files_read, 2);
    }

    #[test]
    fn test_run_job_empty_input_succeeds() {
        let tmp = TempDir::new().expect("tempdir");
        let input = tmp.path().join("empty.txt");
        fs::write(&input, "").unwrap();
        let output = tmp.path().join("output");

        let outcome = run_job(&job(&input, &output, AggregatorConfig::unfiltered())).unwrap();

        assert!(outcome.histogram.is_empty());
        assert_eq!(fs::read_to_string(output.join(PART_FILE)).unwrap(), "");
        assert!(output.join(SUCCESS_MARKER).exists());
    }

    #[test]
    fn test_run_job_missing_input_writes_nothing() {
        let tmp = TempDir::new().expect("tempdir");
        let output = tmp.path().join("output");

        let err = run_job(&job(
            &tmp.path().join("absent"),
            &output,
            AggregatorConfig::unfiltered(),
        ))
        .unwrap_err();

        assert!(matches!(err, HoursError::InputNotFound(_)));
        assert!(!output.exists());
    }

    #[test]
    fn test_run_job_writes_summary() {
        let tmp = TempDir::new().expect("tempdir");
        let input = write_input(&tmp);
        let summary_path = tmp.path().join("summary.json");
        let mut config = job(&input, &tmp.path().join("output"), AggregatorConfig::unfiltered());
        config.summary = Some(summary_path.clone());

        run_job(&config).unwrap();

        let summary: RunSummary =
            serde_json::from_str(&fs::read_to_string(&summary_path).unwrap()).unwrap();
        assert_eq!(summary.records_read, 4);
        assert_eq!(summary.records_emitted, 3);
        assert_eq!(summary.hours_observed, 2);
        assert!(!summary.filter_by_keyword);
    }

    #[test]
    fn test_run_job_existing_output_rejected_before_reading_input() {
        let tmp = TempDir::new().expect("tempdir");
        let output = tmp.path().join("output");
        fs::create_dir_all(&output).unwrap();

        let err = run_job(&job(
            &tmp.path().join("absent"),
            &output,
            AggregatorConfig::unfiltered(),
        ))
        .unwrap_err();

        assert!(matches!(err, HoursError::OutputExists(_)));
    }

    #[test]
    fn test_run_job_unwritable_summary_leaves_no_output() {
        let tmp = TempDir::new().expect("tempdir");
        let input = write_input(&tmp);
        let blocker = tmp.path().join("plain.txt");
        fs::write(&blocker, "not a dir").unwrap();
        let output = tmp.path().join("output");
        let mut config = job(&input, &output, AggregatorConfig::unfiltered());
        config.summary = Some(blocker.join("summary.json"));

        let err = run_job(&config).unwrap_err();

        assert!(matches!(err, HoursError::OutputWrite { .. }));
        assert!(!output.exists(), "no output may be committed when the summary fails");
        let names: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().all(|n| !n.starts_with(".output")), "staging left behind: {names:?}");
    }
}
