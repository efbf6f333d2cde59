//! Crate-wide error type.
//!
//! All subsystems (codec bridge, XML event stream, validator, relational
//! store, rich resolver, sub-region extractor) report into this single
//! enum. Every error is unrecoverable at the point of detection; callers
//! are expected to propagate, not retry.
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed XML{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    MalformedXml { message: String, line: Option<u64> },

    #[error("unexpected character data inside <{parent}>{}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    UnexpectedText { parent: String, line: Option<u64> },

    #[error("unexpected child <{child}> inside <{parent}>{}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    UnexpectedChild {
        parent: String,
        child: String,
        line: Option<u64>,
    },

    #[error("expected top-level <osm> element, found <{found}>{}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    TopLevelExpected { found: String, line: Option<u64> },

    #[error("attribute '{name}' has invalid value '{value}'")]
    BadAttribute { name: String, value: String },

    #[error("unknown attribute '{name}' on <{element}>")]
    UnknownAttribute { element: String, name: String },

    #[error("element <{element}> id={id} is not visible")]
    NonVisibleElement { element: &'static str, id: i64 },

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    #[error("inconsistent reference: {message}")]
    InconsistentReference { message: String },

    #[error("relation {0} contains itself, directly or transitively")]
    CyclicRelation(i64),

    #[error("tag search predicate must not be empty")]
    EmptyPredicate,

    #[error("centroid of an empty collection is undefined")]
    UndefinedCentroid,

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("destination store '{0}' already exists")]
    DestinationExists(PathBuf),

    #[error("unrecognized compression suffix for path '{0}'")]
    UnknownCompression(PathBuf),

    #[error("index blob has unsupported format version {found} (expected {expected})")]
    UnsupportedIndexVersion { found: u8, expected: u8 },

    #[error("corrupt index blob: {0}")]
    CorruptIndex(String),
}

impl From<quick_xml::Error> for Error {
    fn from(cause: quick_xml::Error) -> Self {
        Error::MalformedXml {
            message: cause.to_string(),
            line: None,
        }
    }
}
