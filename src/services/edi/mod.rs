//! ANSI X12 codec for the warehouse transaction sets 940, 943, 944, 945 and 947.
//!
//! - [`segment`]: delimiters and the segment type
//! - [`envelope`]: ISA/GS/ST envelope parsing, validation and writing
//! - [`document`]: typed warehouse documents mapped to and from segments
//! - [`ack`]: 997 functional acknowledgements

pub mod ack;
pub mod document;
pub mod envelope;
pub mod segment;

pub use ack::generate_997;
pub use document::{Party, TransactionSetCode, WarehouseDocument, WarehouseLine, extract_documents};
pub use envelope::{EnvelopeParams, Interchange, UsageIndicator, parse_interchange};

/// Everything that can go wrong while reading or writing X12.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EdiError {
    #[error("interchange must start with an ISA segment")]
    MissingIsa,

    #[error("ISA header is truncated")]
    TruncatedHeader,

    #[error("invalid segment id '{0}'")]
    InvalidSegmentId(String),

    #[error("unexpected segment {found}, expected {expected}")]
    UnexpectedSegment {
        expected: &'static str,
        found: String,
    },

    #[error("{0} envelope is not closed")]
    Unterminated(&'static str),

    #[error("{segment}{position:02} is required")]
    MissingElement { segment: String, position: usize },

    #[error("{0} segment is required")]
    MissingSegment(&'static str),

    #[error("{trailer} control number {found} does not match {expected}")]
    ControlNumberMismatch {
        trailer: &'static str,
        expected: String,
        found: String,
    },

    #[error("{trailer} declares {declared} but {actual} were found")]
    CountMismatch {
        trailer: &'static str,
        declared: String,
        actual: usize,
    },

    #[error("unsupported transaction set {0}")]
    UnsupportedTransactionSet(String),

    #[error("invalid number '{value}' in {segment}")]
    InvalidNumber { segment: String, value: String },

    #[error("invalid date '{0}'")]
    InvalidDate(String),

    #[error("value '{0}' contains a delimiter")]
    DelimiterInValue(String),

    #[error("{0}")]
    InvalidDocument(String),
}
