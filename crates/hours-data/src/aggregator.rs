//! Hour-bucket aggregation over parsed records.
//!
//! Each record is mapped to at most one `(hour, 1)` emission and emissions
//! are summed per hour. Partial results merge by key-wise summation, so
//! records and files can be aggregated on a rayon pool in any order.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use hours_core::error::{HoursError, Result};
use hours_core::models::{AggregatorConfig, Histogram, HourBucket, Record};
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::parser::parse_record;
use crate::reader::{open_records, RecordReader};

/// Records buffered from one reader before a batch is fanned out.
pub const RECORD_BATCH_SIZE: usize = 4096;

// ── AggregationStats ──────────────────────────────────────────────────────────

/// Record counters accumulated alongside the histogram.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregationStats {
    pub records_read: u64,
    pub records_emitted: u64,
    /// Records holding a timestamp line that yielded no hour.
    pub records_malformed: u64,
}

impl AggregationStats {
    fn merge(self, other: AggregationStats) -> AggregationStats {
        AggregationStats {
            records_read: self.records_read + other.records_read,
            records_emitted: self.records_emitted + other.records_emitted,
            records_malformed: self.records_malformed + other.records_malformed,
        }
    }
}

// ── Aggregation ───────────────────────────────────────────────────────────────

/// A (possibly partial) histogram with its counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    pub histogram: Histogram,
    pub stats: AggregationStats,
}

impl Aggregation {
    /// Combine two partial aggregations.
    pub fn merge(self, other: Aggregation) -> Aggregation {
        Aggregation {
            histogram: self.histogram.merge(other.histogram),
            stats: self.stats.merge(other.stats),
        }
    }
}

// ── HourAggregator ────────────────────────────────────────────────────────────

/// Builds hour histograms under one [`AggregatorConfig`].
#[derive(Debug, Clone)]
pub struct HourAggregator {
    config: AggregatorConfig,
}

impl HourAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self { config }
    }

    /// The hour `record` contributes to, if it contributes at all.
    pub fn emit(&self, record: &Record) -> Option<HourBucket> {
        parse_record(record, &self.config)
            .emitted_hour(self.config.filter_by_keyword)
            .cloned()
    }

    /// Fold one record into `acc`.
    pub fn accumulate(&self, mut acc: Aggregation, record: &Record) -> Aggregation {
        let parsed = parse_record(record, &self.config);
        acc.stats.records_read += 1;
        if parsed.malformed_timestamp {
            acc.stats.records_malformed += 1;
        }

        match parsed.emitted_hour(self.config.filter_by_keyword) {
            Some(hour) => {
                acc.histogram.increment(hour.clone());
                acc.stats.records_emitted += 1;
            }
            None if parsed.malformed_timestamp => {
                debug!("Skipping record with malformed timestamp line");
            }
            None => {}
        }
        acc
    }

    /// Aggregate records sequentially on the calling thread.
    pub fn aggregate<'a, I>(&self, records: I) -> Aggregation
    where
        I: IntoIterator<Item = &'a Record>,
    {
        records
            .into_iter()
            .fold(Aggregation::default(), |acc, record| {
                self.accumulate(acc, record)
            })
    }

    /// Aggregate an in-memory slice on the current rayon pool.
    pub fn aggregate_parallel(&self, records: &[Record]) -> Aggregation {
        records
            .par_iter()
            .fold(Aggregation::default, |acc, record| {
                self.accumulate(acc, record)
            })
            .reduce(Aggregation::default, Aggregation::merge)
    }

    /// Stream records from `reader` into a fresh aggregation, fanning each
    /// batch of [`RECORD_BATCH_SIZE`] records out over the rayon pool.
    pub fn aggregate_reader<R: BufRead>(
        &self,
        reader: RecordReader<R>,
    ) -> std::io::Result<Aggregation> {
        self.aggregate_reader_in_batches(reader, RECORD_BATCH_SIZE)
    }

    fn aggregate_reader_in_batches<R: BufRead>(
        &self,
        reader: RecordReader<R>,
        batch_size: usize,
    ) -> std::io::Result<Aggregation> {
        let batch_size = batch_size.max(1);
        let mut acc = Aggregation::default();
        let mut batch: Vec<Record> = Vec::with_capacity(batch_size);

        for record in reader {
            batch.push(record?);
            if batch.len() == batch_size {
                acc = acc.merge(self.aggregate_parallel(&batch));
                batch.clear();
            }
        }
        if !batch.is_empty() {
            acc = acc.merge(self.aggregate_parallel(&batch));
        }
        Ok(acc)
    }

    /// Aggregate one file.
    pub fn aggregate_file(&self, path: &Path) -> Result<Aggregation> {
        let reader = open_records(path)?;
        let acc = self
            .aggregate_reader(reader)
            .map_err(|source| HoursError::FileRead {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(
            "File {}: {} records read, {} emitted, {} malformed",
            path.display(),
            acc.stats.records_read,
            acc.stats.records_emitted,
            acc.stats.records_malformed,
        );
        Ok(acc)
    }

    /// Aggregate every file on the current rayon pool and merge the partials.
    ///
    /// The first file that cannot be read fails the whole call.
    pub fn aggregate_files(&self, files: &[PathBuf]) -> Result<Aggregation> {
        files
            .par_iter()
            .map(|path| self.aggregate_file(path))
            .try_reduce(Aggregation::default, |a, b| Ok(a.merge(b)))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
