//! Error types for index construction, index reads and node streams.

use std::fmt;

/// Error type for stream-index operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    // Build errors
    /// The arena buffer could not be reserved.
    OutOfMemory { requested: usize },
    /// Index options failed validation.
    InvalidOptions(String),
    /// The walker stack grew past `max_nesting` frames.
    NestingTooDeep { max: usize },
    /// A hash key found no free slot after a full probe cycle.
    HashTableFull { slots: u32 },
    /// A hash key is longer than the 24-bit size field can describe.
    KeyTooLong { len: usize },
    /// The iterator reported an event sequence the walker cannot index.
    MalformedStream(&'static str),

    // Index read errors
    /// Record kind bits hold a value outside Empty/Scalar/Array/Hash.
    InvalidKind(u8),
    /// A record offset points past the used part of the arena.
    RecordOutOfBounds { offset: u32, used: usize },
    /// Expected one kind but found another.
    UnexpectedKind {
        expected: &'static str,
        found: &'static str,
    },
    /// Array index out of bounds.
    IndexOutOfBounds { index: u32, length: u32 },
    /// A serialized index blob is inconsistent with its footer.
    InvalidIndex(&'static str),

    // Stream errors
    /// Blob does not carry the expected magic bytes.
    InvalidMagic,
    /// Blob is too small to contain its header or footer.
    DocumentTooSmall,
    /// Address is beyond the stream bounds.
    AddressOutOfBounds { addr: u32, len: usize },
    /// Value data is truncated (not enough bytes).
    TruncatedValue,
    /// Invalid length encoding in a str/bin value.
    InvalidLengthEncoding,
    /// Text value contains invalid UTF-8.
    InvalidUtf8,
    /// Stepped past the last node of the current level.
    UnexpectedEof,

    // JSON errors
    /// Failed to parse JSON input.
    JsonParse(String),
    /// Failed to serialize JSON output.
    JsonSerialize(String),
    /// Float is NaN or infinite and has no JSON form.
    NonFiniteFloat(f64),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::OutOfMemory { requested } => {
                write!(f, "out of memory: cannot reserve {requested} bytes for index arena")
            }
            Error::InvalidOptions(msg) => write!(f, "invalid index options: {msg}"),
            Error::NestingTooDeep { max } => write!(f, "nesting deeper than {max} levels"),
            Error::HashTableFull { slots } => {
                write!(f, "no free slot for hash key in table of {slots} slots")
            }
            Error::KeyTooLong { len } => write!(f, "hash key of {len} bytes is too long"),
            Error::MalformedStream(msg) => write!(f, "malformed stream: {msg}"),
            Error::InvalidKind(k) => write!(f, "invalid record kind: {k}"),
            Error::RecordOutOfBounds { offset, used } => {
                write!(f, "record offset {offset:#x} out of bounds (used={used})")
            }
            Error::UnexpectedKind { expected, found } => {
                write!(f, "expected {expected}, found {found}")
            }
            Error::IndexOutOfBounds { index, length } => {
                write!(f, "index {index} out of bounds (length={length})")
            }
            Error::InvalidIndex(msg) => write!(f, "invalid index blob: {msg}"),
            Error::InvalidMagic => write!(f, "invalid magic bytes"),
            Error::DocumentTooSmall => write!(f, "blob too small for header or footer"),
            Error::AddressOutOfBounds { addr, len } => {
                write!(f, "address {addr:#x} out of bounds (len={len})")
            }
            Error::TruncatedValue => write!(f, "truncated value data"),
            Error::InvalidLengthEncoding => write!(f, "invalid length encoding"),
            Error::InvalidUtf8 => write!(f, "invalid UTF-8 in str value"),
            Error::UnexpectedEof => write!(f, "unexpected end of stream"),
            Error::JsonParse(msg) => write!(f, "JSON parse error: {msg}"),
            Error::JsonSerialize(msg) => write!(f, "JSON serialize error: {msg}"),
            Error::NonFiniteFloat(v) => write!(f, "non-finite float cannot be written as JSON: {v}"),
        }
    }
}

impl std::error::Error for Error {}

/// Result type alias for stream-index operations.
pub type Result<T> = std::result::Result<T, Error>;
