//! Error taxonomy for the conversion core.
//!
//! Every fallible core operation returns [`Result<T>`] over [`FastmigError`], a
//! closed enumeration carrying structured fields (column name, target type,
//! cause) so callers can branch on the kind of failure instead of parsing
//! message text:
//!
//! ```
//! use fastmig::error::FastmigError;
//!
//! fn describe(err: &FastmigError) -> &'static str {
//!     match err.innermost() {
//!         FastmigError::ColumnNotFound(_) => "pick another column",
//!         FastmigError::ConversionFailed { .. }
//!         | FastmigError::ConversionIntroducedNulls { .. } => "clean the data first",
//!         _ => "see details",
//!     }
//! }
//! ```
//!
//! The presentation layer is the only place errors become user-visible text.
//! UI layers that need `String` errors can rely on `From<FastmigError> for String`.

use std::fmt;
use std::path::PathBuf;

/// Main error type for fastmig operations.
#[derive(Debug)]
pub enum FastmigError {
    /// The named column does not exist in the table.
    ColumnNotFound(String),

    /// The requested target type token is not one the converter knows.
    UnsupportedTargetType(String),

    /// A conversion left at least one null value in the column.
    ConversionIntroducedNulls { column: String, target: String },

    /// A value could not be cast; the whole conversion is rejected.
    ConversionFailed {
        column: String,
        target: String,
        cause: String,
    },

    /// A macro was persisted with no recorded steps.
    EmptyMacro,

    /// Macro content did not deserialize to the expected shape.
    MalformedMacro(String),

    /// File extension is neither CSV nor Excel.
    UnsupportedFormat(String),

    /// Input file does not exist.
    FileNotFound(PathBuf),

    /// Lower-level failure while reading a table or macro.
    ReadFailure(String),

    /// Lower-level failure while writing a table or macro.
    WriteFailure(String),

    /// A pipeline step failed; `index` is zero-based.
    PipelineStepFailed {
        index: usize,
        source: Box<FastmigError>,
    },

    /// Two columns share a name.
    DuplicateColumn(String),

    /// Columns of a table have different lengths.
    RaggedColumns {
        column: String,
        expected: usize,
        found: usize,
    },

    /// The session has no active table.
    NoTableLoaded,

    /// `save` was called without a known destination.
    NoOutputPath,

    /// Settings file could not be written or parsed.
    Config(String),
}

impl FastmigError {
    /// Unwraps pipeline wrappers down to the error of the failing step.
    pub fn innermost(&self) -> &Self {
        match self {
            Self::PipelineStepFailed { source, .. } => source.innermost(),
            other => other,
        }
    }

    pub(crate) fn conversion_failed(
        column: &str,
        target: impl fmt::Display,
        cause: impl Into<String>,
    ) -> Self {
        Self::ConversionFailed {
            column: column.to_owned(),
            target: target.to_string(),
            cause: cause.into(),
        }
    }
}

impl fmt::Display for FastmigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ColumnNotFound(name) => write!(f, "Column '{name}' not found"),
            Self::UnsupportedTargetType(target) => {
                write!(f, "Unsupported target type: {target}")
            }
            Self::ConversionIntroducedNulls { column, target } => write!(
                f,
                "Some values in column '{column}' could not be converted to {target} and were left null"
            ),
            Self::ConversionFailed {
                column,
                target,
                cause,
            } => write!(f, "Error converting column '{column}' to {target}: {cause}"),
            Self::EmptyMacro => write!(f, "No actions recorded"),
            Self::MalformedMacro(msg) => write!(f, "Malformed macro: {msg}"),
            Self::UnsupportedFormat(ext) => write!(f, "Unsupported file format: '{ext}'"),
            Self::FileNotFound(path) => write!(f, "File not found: {}", path.display()),
            Self::ReadFailure(msg) => write!(f, "An error occurred while reading: {msg}"),
            Self::WriteFailure(msg) => write!(f, "An error occurred while writing: {msg}"),
            Self::PipelineStepFailed { index, source } => {
                write!(f, "Step {} failed: {source}", index + 1)
            }
            Self::DuplicateColumn(name) => write!(f, "Duplicate column name '{name}'"),
            Self::RaggedColumns {
                column,
                expected,
                found,
            } => write!(
                f,
                "Column '{column}' has {found} rows, expected {expected}"
            ),
            Self::NoTableLoaded => write!(f, "No table loaded"),
            Self::NoOutputPath => write!(f, "No output path; use save-as"),
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for FastmigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::PipelineStepFailed { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

// UI layers want plain strings for dialogs
impl From<FastmigError> for String {
    fn from(err: FastmigError) -> Self {
        err.to_string()
    }
}

/// Result type alias for fastmig operations.
pub type Result<T> = std::result::Result<T, FastmigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FastmigError::ConversionIntroducedNulls {
            column: "age".to_owned(),
            target: "integer".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "Some values in column 'age' could not be converted to integer and were left null"
        );
    }

    #[test]
    fn test_error_conversion_to_string() {
        let err = FastmigError::EmptyMacro;
        let s: String = err.into();
        assert_eq!(s, "No actions recorded");
    }

    #[test]
    fn test_innermost_unwraps_nested_steps() {
        let err = FastmigError::PipelineStepFailed {
            index: 2,
            source: Box::new(FastmigError::ColumnNotFound("score".to_owned())),
        };
        assert!(matches!(err.innermost(), FastmigError::ColumnNotFound(name) if name == "score"));
        assert!(err.to_string().starts_with("Step 3 failed"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
