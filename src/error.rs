//! Unified error handling for the fit-course library.
//!
//! Decoding errors are fatal for the whole file: later records depend on
//! earlier definitions, so there is no meaningful partial result. Encoder
//! errors (unknown message or field names, too many message kinds) are
//! programmer errors and surface immediately.

use thiserror::Error;

/// Unified error type for FIT encoding/decoding and configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitCourseError {
    /// Header length byte is neither 12 nor 14, or the buffer is too small
    #[error("Invalid FIT header: {message}")]
    InvalidHeader { message: String },

    /// The 4 magic bytes are not ".FIT"
    #[error("Not a FIT file (wrong magic 0x{found:08x})")]
    BadMagic { found: u32 },

    /// The buffer ended before the declared data length
    #[error("FIT file is incomplete (needed {needed} bytes at offset {offset}, have {available})")]
    TruncatedFile {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Bytes remain after the declared data length and trailer
    #[error("Chained FIT files are not supported ({remaining} trailing bytes)")]
    ChainedFileUnsupported { remaining: usize },

    /// Compressed timestamp headers and similar protocol details
    #[error("FIT feature not supported: {feature}")]
    UnsupportedFeature { feature: String },

    /// Definition record with a non-zero reserved byte
    #[error("Invalid definition record at offset {offset}")]
    InvalidDefinition { offset: usize },

    /// Data record referencing a local message slot with no definition
    #[error("Data record for undefined local message {local_num} at offset {offset}")]
    UnknownLocalMessage { local_num: u8, offset: usize },

    /// A field of interest has an unexpected base type or size
    #[error(
        "Field {message}.{field} not in expected format (expected base type 0x{expected_base_type:02x} size {expected_size}, found 0x{found_base_type:02x} size {found_size})"
    )]
    FieldTypeMismatch {
        message: &'static str,
        field: &'static str,
        expected_base_type: u8,
        expected_size: u8,
        found_base_type: u8,
        found_size: u8,
    },

    /// file_id.type is neither course nor activity
    #[error("Only FIT course and activity files are supported (found type {found})")]
    UnsupportedFileType { found: String },

    /// Message kind not present in the profile
    #[error("Unknown FIT message '{name}'")]
    UnknownMessage { name: String },

    /// Value bag contains keys that are not fields of the message
    #[error("Unknown field(s) {fields:?} for message '{message}'")]
    UnknownField {
        message: &'static str,
        fields: Vec<String>,
    },

    /// More than 16 distinct message kinds written to one file
    #[error("Too many message kinds for one FIT file (local message {local_num} exceeds 15)")]
    TooManyMessageKinds { local_num: usize },

    /// Enum symbol without a wire value
    #[error("Unknown symbol '{symbol}' for {type_name}")]
    UnknownEnumSymbol {
        type_name: &'static str,
        symbol: String,
    },

    /// Mapped value does not fit the wire integer, or has the wrong shape
    #[error("Value {value} out of range for {type_name}")]
    ValueOutOfRange {
        type_name: &'static str,
        value: String,
    },

    /// A course file needs at least one point
    #[error("Route '{name}' has no points")]
    EmptyRoute { name: String },

    /// Configuration could not be parsed
    #[error("Configuration error: {message}")]
    InvalidConfig { message: String },
}

/// Result type alias for fit-course operations.
pub type Result<T> = std::result::Result<T, FitCourseError>;

/// Extension trait for converting Option to FitCourseError.
pub trait OptionExt<T> {
    /// Convert Option to Result with a truncated file error.
    fn ok_or_truncated(self, offset: usize, needed: usize, available: usize) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_truncated(self, offset: usize, needed: usize, available: usize) -> Result<T> {
        self.ok_or(FitCourseError::TruncatedFile {
            offset,
            needed,
            available,
        })
    }
}

impl From<serde_json::Error> for FitCourseError {
    fn from(err: serde_json::Error) -> Self {
        FitCourseError::InvalidConfig {
            message: err.to_string(),
        }
    }
}
