use std::ffi::OsString;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, FromArgMatches, Parser};
use serde::Deserialize;
use tracing::warn;

use crate::error::{HoursError, Result};
use crate::models::{
    is_token_separator, AggregatorConfig, OutputFormat, DEFAULT_CONTENT_MARKER,
    DEFAULT_TIMESTAMP_MARKER,
};

/// Output path that selects stdout instead of a directory.
pub const STDOUT_OUTPUT: &str = "-";

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Count blank-line-delimited tweet records per hour of day
#[derive(Parser, Debug, Clone)]
#[command(
    name = "tweet-hours",
    about = "Count blank-line-delimited tweet records per hour of day",
    version
)]
pub struct Settings {
    /// Input file, or a directory of record files
    #[arg(long, short)]
    pub input: Option<PathBuf>,

    /// Output directory, or `-` for stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Count only records whose content line holds --keyword
    #[arg(long, overrides_with = "no_filter")]
    pub filter: bool,

    /// Count every record, even when the job file enables filtering
    #[arg(long = "no-filter", overrides_with = "filter")]
    pub no_filter: bool,

    /// Keyword matched against whole content tokens (case-sensitive)
    #[arg(long)]
    pub keyword: Option<String>,

    /// First character of timestamp lines
    #[arg(long, default_value_t = DEFAULT_TIMESTAMP_MARKER)]
    pub timestamp_marker: char,

    /// First character of content lines
    #[arg(long, default_value_t = DEFAULT_CONTENT_MARKER)]
    pub content_marker: char,

    /// Output format
    #[arg(long, default_value = "tsv", value_parser = ["tsv", "json"])]
    pub format: String,

    /// Worker threads (defaults to one per core)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Replace an existing output directory
    #[arg(long)]
    pub overwrite: bool,

    /// Write a JSON run summary to this path
    #[arg(long)]
    pub summary: Option<PathBuf>,

    /// JSON job file; command-line flags take precedence over it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

// ── JobFile ────────────────────────────────────────────────────────────────────

/// Job parameters read from a `--config` JSON file.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct JobFile {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub filter_by_keyword: Option<bool>,
    pub keyword: Option<String>,
    pub timestamp_marker: Option<char>,
    pub content_marker: Option<char>,
    pub format: Option<String>,
    pub threads: Option<usize>,
    pub overwrite: Option<bool>,
}

impl JobFile {
    /// Load a job file. Unlike optional state files, a named job file that
    /// cannot be read or parsed is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| HoursError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

// ── JobConfig ──────────────────────────────────────────────────────────────────

/// Where the finished histogram goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    Directory(PathBuf),
}

/// Validated, fully-resolved job parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct JobConfig {
    pub input: PathBuf,
    pub output: OutputTarget,
    pub aggregator: AggregatorConfig,
    pub format: OutputFormat,
    pub threads: Option<usize>,
    pub overwrite: bool,
    pub summary: Option<PathBuf>,
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse process arguments and merge in the `--config` job file, if any.
    pub fn load() -> Result<Self> {
        Self::load_from_args(std::env::args_os())
    }

    /// Same as [`Settings::load`] with an explicit argument list.
    pub fn load_from_args<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Settings::command().get_matches_from(args);
        let mut settings = Settings::from_arg_matches(&matches).map_err(|e| {
            HoursError::Config(format!("invalid command line: {e}"))
        })?;

        if let Some(path) = settings.config.clone() {
            let file = JobFile::load_from(&path)?;
            settings.merge_job_file(file, &matches);
        }

        if settings.no_filter {
            settings.filter = false;
        }
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }

        Ok(settings)
    }

    /// Fill every field not given explicitly on the command line from `file`.
    fn merge_job_file(&mut self, file: JobFile, matches: &clap::ArgMatches) {
        // NOTE: clap stores the arg id using the *field name* (underscores).
        if !is_arg_explicitly_set(matches, "input") && file.input.is_some() {
            self.input = file.input;
        }
        if !is_arg_explicitly_set(matches, "output") && file.output.is_some() {
            self.output = file.output;
        }
        let filter_on_cli =
            is_arg_explicitly_set(matches, "filter") || is_arg_explicitly_set(matches, "no_filter");
        if !filter_on_cli {
            if let Some(v) = file.filter_by_keyword {
                self.filter = v;
            }
        }
        if !is_arg_explicitly_set(matches, "keyword") && file.keyword.is_some() {
            self.keyword = file.keyword;
        }
        if !is_arg_explicitly_set(matches, "timestamp_marker") {
            if let Some(v) = file.timestamp_marker {
                self.timestamp_marker = v;
            }
        }
        if !is_arg_explicitly_set(matches, "content_marker") {
            if let Some(v) = file.content_marker {
                self.content_marker = v;
            }
        }
        if !is_arg_explicitly_set(matches, "format") {
            if let Some(v) = file.format {
                self.format = v;
            }
        }
        if !is_arg_explicitly_set(matches, "threads") && file.threads.is_some() {
            self.threads = file.threads;
        }
        if !is_arg_explicitly_set(matches, "overwrite") {
            if let Some(v) = file.overwrite {
                self.overwrite = v;
            }
        }
    }

    /// Validate the settings and resolve them into a [`JobConfig`].
    pub fn job_config(&self) -> Result<JobConfig> {
        let input = self
            .input
            .clone()
            .ok_or_else(|| HoursError::Config("an input path is required".to_string()))?;
        let output = match &self.output {
            Some(p) if p.as_os_str() == STDOUT_OUTPUT => OutputTarget::Stdout,
            Some(p) => OutputTarget::Directory(p.clone()),
            None => return Err(HoursError::Config("an output path is required".to_string())),
        };

        let keyword = self.keyword.clone().unwrap_or_default();
        if self.filter {
            if keyword.is_empty() {
                return Err(HoursError::Config(
                    "keyword filtering is enabled but no keyword was given".to_string(),
                ));
            }
            if keyword.chars().any(is_token_separator) {
                return Err(HoursError::Config(format!(
                    "keyword {keyword:?} contains whitespace and can never match a token"
                )));
            }
        } else if !keyword.is_empty() {
            warn!("Keyword {:?} ignored: filtering is not enabled", keyword);
        }

        if self.timestamp_marker == self.content_marker {
            return Err(HoursError::Config(format!(
                "timestamp and content markers must differ (both are {:?})",
                self.timestamp_marker
            )));
        }
        if self.threads == Some(0) {
            return Err(HoursError::Config("threads must be at least 1".to_string()));
        }

        Ok(JobConfig {
            input,
            output,
            aggregator: AggregatorConfig {
                filter_by_keyword: self.filter,
                keyword,
                timestamp_marker: self.timestamp_marker,
                content_marker: self.content_marker,
            },
            format: self.format.parse()?,
            threads: self.threads,
            overwrite: self.overwrite,
            summary: self.summary.clone(),
        })
    }
}

// ── Helper: check if an arg was explicitly set on the command line ─────────────

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
