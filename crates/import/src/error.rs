use std::path::PathBuf;

use ledgerlift_core::FileFormat;
use thiserror::Error;

/// Conditions that abort a whole ingestion call. Row-level problems are
/// reported as [`crate::row::SkipReason`] warnings instead.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("File not found or not readable: {}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} file is empty")]
    Empty(FileFormat),
    #[error("CSV file contains no data rows")]
    NoDataRows,
    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error(
        "Could not auto-detect CSV columns. Found headers: {headers}. \
         Expected at least a date and description/payee column."
    )]
    UnmappedColumns { headers: String },
    #[error("Failed to parse OFX file: {0}")]
    Markup(String),
    #[error("OFX file does not contain bank or credit card statement data")]
    NoStatement,
    #[error("Could not detect file format for: {}. Supported formats: CSV, OFX, QFX.", .0.display())]
    UnsupportedFormat(PathBuf),
}

impl ImportError {
    /// Stable machine-readable code for callers that report errors as data.
    pub fn code(&self) -> &'static str {
        match self {
            ImportError::Unreadable { .. } => "FILE_NOT_FOUND",
            ImportError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            _ => "PARSE_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_problem() {
        assert_eq!(ImportError::Empty(FileFormat::Csv).to_string(), "CSV file is empty");
        assert_eq!(ImportError::Empty(FileFormat::Ofx).to_string(), "OFX file is empty");
        let err = ImportError::UnmappedColumns {
            headers: "foo, bar".to_string(),
        };
        assert!(err.to_string().contains("Found headers: foo, bar"));
    }

    #[test]
    fn codes_separate_io_from_parse_failures() {
        let unreadable = ImportError::Unreadable {
            path: PathBuf::from("/nope.csv"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert_eq!(unreadable.code(), "FILE_NOT_FOUND");
        assert!(unreadable.to_string().contains("not readable"));
        assert_eq!(ImportError::NoStatement.code(), "PARSE_ERROR");
        assert_eq!(
            ImportError::UnsupportedFormat(PathBuf::from("x.bin")).code(),
            "UNSUPPORTED_FORMAT"
        );
    }
}
