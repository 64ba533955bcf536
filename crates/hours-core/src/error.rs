use std::path::PathBuf;
use thiserror::Error;

/// All errors produced while running an hour-histogram job.
#[derive(Error, Debug)]
pub enum HoursError {
    /// The configured input path does not exist.
    #[error("Input path not found: {0}")]
    InputNotFound(PathBuf),

    /// An input file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The output destination could not be created or written.
    #[error("Failed to write output {path}: {source}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The output directory is already present and overwriting was not requested.
    #[error("Output path already exists: {0} (pass --overwrite to replace it)")]
    OutputExists(PathBuf),

    /// A JSON document (job file or output) could not be parsed or produced.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the hours crates.
pub type Result<T> = std::result::Result<T, HoursError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = HoursError::FileRead {
            path: PathBuf::from("/data/tweets.txt"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("/data/tweets.txt"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_error_display_input_not_found() {
        let err = HoursError::InputNotFound(PathBuf::from("/missing/dir"));
        assert_eq!(err.to_string(), "Input path not found: /missing/dir");
    }

    #[test]
    fn test_error_display_output_exists() {
        let err = HoursError::OutputExists(PathBuf::from("/out"));
        let msg = err.to_string();
        assert!(msg.starts_with("Output path already exists: /out"));
        assert!(msg.contains("--overwrite"));
    }

    #[test]
    fn test_error_display_config() {
        let err = HoursError::Config("keyword is required".to_string());
        assert_eq!(err.to_string(), "Configuration error: keyword is required");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: HoursError = io_err.into();
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid}").unwrap_err();
        let err: HoursError = json_err.into();
        assert!(err.to_string().contains("Failed to parse JSON"));
    }
}
