use std::fmt;
use thiserror::Error;

/// Error type for every SysEx, memory-image and container operation
///
/// Fatal variants abort a conversion because the output would be malformed.
/// Recoverable variants only reduce coverage of the input: the stream drivers
/// log them and move on to the next message or chunk.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JdError {
    // ========== I/O ERRORS (1000-1099) ==========
    /// File not found at the specified path
    #[error("File not found: {path}")]
    FileNotFound {
        path: String,
        io_kind: Option<std::io::ErrorKind>,
    },

    /// Error reading file contents
    #[error("Failed to read file {path}: {reason}")]
    FileReadError { path: String, reason: String },

    /// Permission denied when accessing file
    #[error("Permission denied accessing file: {path}")]
    PermissionDenied { path: String },

    // ========== FORMAT ERRORS (2000-2099) ==========
    /// Leading bytes match none of the known stream or container signatures
    #[error("Unrecognized input format: {details}")]
    UnknownFormat { details: String },

    /// Magic bytes of a container or chunk do not match
    #[error("Invalid magic bytes: expected '{expected}', found '{found}' at offset {offset}")]
    InvalidMagicBytes {
        expected: String,
        found: String,
        offset: usize,
    },

    /// A fixed header field holds an unexpected value
    #[error("Corrupted {structure} header: {reason}")]
    CorruptedHeader { structure: String, reason: String },

    /// A chunk-table entry or chunk body is structurally invalid
    #[error("Invalid '{tag}' chunk: {reason}")]
    InvalidChunk { tag: String, reason: String },

    /// Input ends before a structure it declares
    #[error("Truncated {structure}: expected {expected} bytes, only {actual} available")]
    TruncatedFile {
        structure: String,
        expected: usize,
        actual: usize,
    },

    /// Container patches belong to a different synthesizer model
    #[error("Patch {index} appears to be for a different synth model")]
    WrongModel { index: usize },

    /// The backup writer needs an existing, valid backup file to rewrite
    #[error("A valid backup container is required as template: {reason}")]
    MissingTemplate { reason: String },

    /// zlib stream could not be inflated or deflated
    #[error("Compression failure in {stage}: {details}")]
    DecompressionFailed { stage: String, details: String },

    /// Input held neither usable SysEx data nor container records
    #[error("Input did not contain any JD-800 or JD-990 data")]
    NoPatchData,

    /// Bank position is neither a bank letter nor a patch number
    #[error("Invalid patch position '{input}': expected a bank (A-D) or patch number (e.g. B42)")]
    InvalidPosition { input: String },

    // ========== SYSEX FRAMING ERRORS (3000-3099) ==========
    /// Data Set message checksum does not sum to zero
    #[error("Invalid SysEx checksum at address 0x{address:06X}: residue 0x{residue:02X}")]
    ChecksumMismatch { address: u32, residue: u8 },

    /// Message is not a Roland JD Data Set message
    #[error("Ignoring SysEx message: {reason}")]
    ForeignMessage { reason: String },

    /// Message is too short to carry the address field
    #[error("SysEx message too short: {length} bytes, at least {minimum} required")]
    MessageTooShort { length: usize, minimum: usize },

    /// Outgoing address does not fit the dialect's base-128 digits
    #[error("Address 0x{address:08X} cannot be encoded in {digits} base-128 digits")]
    InvalidAddress { address: u32, digits: usize },

    /// Dialect has no SysEx representation
    #[error("Dialect {dialect} has no SysEx encoding")]
    UnsupportedDialect { dialect: String },

    // ========== MEMORY IMAGE ERRORS (4000-4099) ==========
    /// Write exceeds the modeled address space
    #[error("Address 0x{address:08X} + {length} bytes exceeds address space of {capacity} bytes")]
    AddressOutOfBounds {
        address: u32,
        length: usize,
        capacity: usize,
    },

    /// Stream mixes two device dialects
    #[error("Input mixes {found} with {established} dumps; only {established} dumps are processed")]
    DialectMismatch { established: String, found: String },

    /// Record does not have the fixed length of its dialect
    #[error("Invalid {dialect} record length: expected {expected}, got {actual}")]
    InvalidRecordLength {
        dialect: String,
        expected: usize,
        actual: usize,
    },

    // ========== CONTAINER INTEGRITY ERRORS (5000-5099) ==========
    /// CRC32 of a compressed chunk does not match its sub-header
    #[error("Compressed data CRC32 mismatch: stored 0x{stored:08X}, computed 0x{computed:08X}")]
    ContainerCrcMismatch { stored: u32, computed: u32 },

    /// Advisory per-record CRC32 mismatch
    #[error("CRC32 mismatch for patch {index}: stored 0x{stored:08X}, computed 0x{computed:08X}")]
    RecordCrcMismatch {
        index: usize,
        stored: u32,
        computed: u32,
    },

    /// Template chunk references bytes past the end of the file
    #[error("Dropping '{tag}' chunk: offset {offset} + size {size} exceeds file size {file_size}")]
    TruncatedChunk {
        tag: String,
        offset: u32,
        size: u32,
        file_size: usize,
    },

    // ========== RESOURCE ERRORS (6000-6099) ==========
    /// Data size exceeds configured limits
    #[error("Data size exceeds limit for {field}: {size} (limit: {limit})")]
    DataSizeExceedsLimit {
        field: String,
        size: usize,
        limit: usize,
    },

    /// Integer overflow in offset calculations
    #[error("Integer overflow in {operation}: {details}")]
    IntegerOverflow { operation: String, details: String },
}

impl JdError {
    /// Get the error code for machine-readable processing
    pub fn code(&self) -> u16 {
        match self {
            // I/O Errors (1000-1099)
            Self::FileNotFound { .. } => 1001,
            Self::FileReadError { .. } => 1002,
            Self::PermissionDenied { .. } => 1003,

            // Format Errors (2000-2099)
            Self::UnknownFormat { .. } => 2001,
            Self::InvalidMagicBytes { .. } => 2002,
            Self::CorruptedHeader { .. } => 2003,
            Self::InvalidChunk { .. } => 2004,
            Self::TruncatedFile { .. } => 2005,
            Self::WrongModel { .. } => 2006,
            Self::MissingTemplate { .. } => 2007,
            Self::DecompressionFailed { .. } => 2008,
            Self::NoPatchData => 2009,
            Self::InvalidPosition { .. } => 2010,

            // SysEx Framing Errors (3000-3099)
            Self::ChecksumMismatch { .. } => 3001,
            Self::ForeignMessage { .. } => 3002,
            Self::MessageTooShort { .. } => 3003,
            Self::InvalidAddress { .. } => 3004,
            Self::UnsupportedDialect { .. } => 3005,

            // Memory Image Errors (4000-4099)
            Self::AddressOutOfBounds { .. } => 4001,
            Self::DialectMismatch { .. } => 4002,
            Self::InvalidRecordLength { .. } => 4003,

            // Container Integrity Errors (5000-5099)
            Self::ContainerCrcMismatch { .. } => 5001,
            Self::RecordCrcMismatch { .. } => 5002,
            Self::TruncatedChunk { .. } => 5003,

            // Resource Errors (6000-6099)
            Self::DataSizeExceedsLimit { .. } => 6001,
            Self::IntegerOverflow { .. } => 6002,
        }
    }

    /// Get the error category for grouping related errors
    pub fn category(&self) -> ErrorCategory {
        match self.code() {
            1000..=1099 => ErrorCategory::IO,
            2000..=2099 => ErrorCategory::Format,
            3000..=3099 => ErrorCategory::SysExFraming,
            4000..=4099 => ErrorCategory::MemoryImage,
            5000..=5099 => ErrorCategory::ContainerIntegrity,
            6000..=6099 => ErrorCategory::Resource,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Check if the error is recoverable (processing continues with the next item)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ForeignMessage { .. }
                | Self::MessageTooShort { .. }
                | Self::AddressOutOfBounds { .. }
                | Self::DialectMismatch { .. }
                | Self::RecordCrcMismatch { .. }
                | Self::TruncatedChunk { .. }
        )
    }

    /// Process exit code for a front end reporting this error
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::IO | ErrorCategory::Format => 2,
            ErrorCategory::SysExFraming => 3,
            ErrorCategory::ContainerIntegrity => 4,
            ErrorCategory::MemoryImage | ErrorCategory::Resource | ErrorCategory::Unknown => 5,
        }
    }

    /// Get suggested action for handling this error
    pub fn suggested_action(&self) -> &'static str {
        match self {
            Self::FileNotFound { .. } => "Check file path and ensure file exists",
            Self::PermissionDenied { .. } => "Check file permissions and user access rights",
            Self::UnknownFormat { .. } => "Provide a SYX, MID, BIN, SVZ or SVD file",
            Self::ChecksumMismatch { .. } => "The SysEx dump is corrupted; capture it again",
            Self::ContainerCrcMismatch { .. } => "The container is corrupted; export it again",
            Self::MissingTemplate { .. } => {
                "Use an existing backup file written by the device as output"
            },
            Self::WrongModel { .. } => "Only JD-800 patches can be converted",
            _ => "Check file integrity",
        }
    }
}

/// Error categories for grouping related error types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    IO,
    Format,
    SysExFraming,
    MemoryImage,
    ContainerIntegrity,
    Resource,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IO => write!(f, "I/O"),
            Self::Format => write!(f, "Format"),
            Self::SysExFraming => write!(f, "SysEx Framing"),
            Self::MemoryImage => write!(f, "Memory Image"),
            Self::ContainerIntegrity => write!(f, "Container Integrity"),
            Self::Resource => write!(f, "Resource"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Result type alias for archive operations
pub type JdResult<T> = Result<T, JdError>;

/// Map an I/O error on `path` to the matching variant
pub(crate) fn io_error(path: &str, err: std::io::Error) -> JdError {
    match err.kind() {
        std::io::ErrorKind::NotFound => JdError::FileNotFound {
            path: path.to_string(),
            io_kind: Some(err.kind()),
        },
        std::io::ErrorKind::PermissionDenied => JdError::PermissionDenied {
            path: path.to_string(),
        },
        _ => JdError::FileReadError {
            path: path.to_string(),
            reason: err.to_string(),
        },
    }
}
