// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core error types for bagview.
//!
//! Errors are grouped the way they propagate:
//! - open errors (missing file, permissions, empty file, mapping failure)
//!   surface from the open paths,
//! - structural errors (malformed records, out-of-range extents) fail the
//!   parse attempt that hit them,
//! - decompression errors are scoped to a single chunk,
//! - decode errors are scoped to a single message.

use std::fmt;

/// Errors produced while opening or reading a bag file.
#[derive(Debug, Clone)]
pub enum BagError {
    /// File does not exist
    NotFound {
        /// Path that was opened
        path: String,
    },

    /// File exists but is not readable
    PermissionDenied {
        /// Path that was opened
        path: String,
    },

    /// File is zero bytes long and cannot be mapped
    EmptyFile {
        /// Path that was opened
        path: String,
    },

    /// Other I/O failure (read error, mapping failure)
    Io {
        /// What was being done
        context: String,
        /// Error message
        message: String,
    },

    /// Structurally malformed record stream
    Parse {
        /// What was being parsed
        context: String,
        /// Error message
        message: String,
    },

    /// Read past the end of the source or a decompressed extent
    OutOfBounds {
        /// Offset the read started at
        offset: u64,
        /// Bytes requested
        requested: u64,
        /// Bytes available
        available: u64,
    },

    /// A record of the wrong kind at a position where the format fixes it
    UnexpectedOp {
        /// Expected op code
        expected: u8,
        /// Op code found, if any was present
        found: Option<u8>,
        /// Absolute offset of the record
        pos: u64,
    },

    /// Bag format version this reader does not understand
    UnsupportedVersion {
        /// Version string from the magic line
        version: String,
    },

    /// Chunk failed to decompress
    Decompression {
        /// Absolute offset of the chunk record
        chunk_pos: u64,
        /// Error message
        message: String,
    },

    /// Chunk uses a compression kind this reader does not support
    UnsupportedCompression {
        /// Compression tag from the chunk header
        kind: String,
        /// Absolute offset of the chunk record
        chunk_pos: u64,
    },

    /// Decoder digest does not match the message's declared digest
    DigestMismatch {
        /// Digest declared by the connection
        declared: String,
        /// Digest offered by the decoder
        offered: String,
    },

    /// Caller-supplied decoder failed on a message payload
    Decode {
        /// What was being decoded
        context: String,
        /// Error message
        message: String,
    },
}

impl BagError {
    /// Create a parse error.
    pub fn parse(context: impl Into<String>, message: impl Into<String>) -> Self {
        BagError::Parse {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create a generic I/O error.
    pub fn io(context: impl Into<String>, message: impl Into<String>) -> Self {
        BagError::Io {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create an out-of-bounds error.
    pub fn out_of_bounds(offset: u64, requested: u64, available: u64) -> Self {
        BagError::OutOfBounds {
            offset,
            requested,
            available,
        }
    }

    /// Create an unexpected-op error.
    pub fn unexpected_op(expected: u8, found: Option<u8>, pos: u64) -> Self {
        BagError::UnexpectedOp {
            expected,
            found,
            pos,
        }
    }

    /// Create a per-chunk decompression error.
    pub fn decompression(chunk_pos: u64, message: impl Into<String>) -> Self {
        BagError::Decompression {
            chunk_pos,
            message: message.into(),
        }
    }

    /// Create an unsupported-compression error.
    pub fn unsupported_compression(kind: impl Into<String>, chunk_pos: u64) -> Self {
        BagError::UnsupportedCompression {
            kind: kind.into(),
            chunk_pos,
        }
    }

    /// Create a digest-mismatch error.
    pub fn digest_mismatch(declared: impl Into<String>, offered: impl Into<String>) -> Self {
        BagError::DigestMismatch {
            declared: declared.into(),
            offered: offered.into(),
        }
    }

    /// Create a per-message decode error.
    pub fn decode(context: impl Into<String>, message: impl Into<String>) -> Self {
        BagError::Decode {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Categorize an I/O error raised while opening `path`.
    pub fn from_open(path: impl Into<String>, err: &std::io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            std::io::ErrorKind::NotFound => BagError::NotFound { path },
            std::io::ErrorKind::PermissionDenied => BagError::PermissionDenied { path },
            _ => BagError::Io {
                context: format!("open '{path}'"),
                message: err.to_string(),
            },
        }
    }
}

impl fmt::Display for BagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BagError::NotFound { path } => write!(f, "File not found: '{path}'"),
            BagError::PermissionDenied { path } => write!(f, "Permission denied: '{path}'"),
            BagError::EmptyFile { path } => write!(f, "File is empty: '{path}'"),
            BagError::Io { context, message } => write!(f, "I/O error in {context}: {message}"),
            BagError::Parse { context, message } => {
                write!(f, "Parse error in {context}: {message}")
            }
            BagError::OutOfBounds {
                offset,
                requested,
                available,
            } => write!(
                f,
                "Out of bounds: requested {requested} bytes at offset {offset}, but only {available} bytes available"
            ),
            BagError::UnexpectedOp {
                expected,
                found,
                pos,
            } => match found {
                Some(found) => write!(
                    f,
                    "Unexpected record at offset {pos}: expected op=0x{expected:02x}, found op=0x{found:02x}"
                ),
                None => write!(
                    f,
                    "Unexpected record at offset {pos}: expected op=0x{expected:02x}, found record without op field"
                ),
            },
            BagError::UnsupportedVersion { version } => {
                write!(f, "Unsupported bag version: '{version}'")
            }
            BagError::Decompression { chunk_pos, message } => {
                write!(
                    f,
                    "Failed to decompress chunk at offset {chunk_pos}: {message}"
                )
            }
            BagError::UnsupportedCompression { kind, chunk_pos } => {
                write!(
                    f,
                    "Unsupported compression '{kind}' for chunk at offset {chunk_pos}"
                )
            }
            BagError::DigestMismatch { declared, offered } => {
                write!(
                    f,
                    "Digest mismatch: message declares '{declared}', decoder offers '{offered}'"
                )
            }
            BagError::Decode { context, message } => {
                write!(f, "Decode error in {context}: {message}")
            }
        }
    }
}

impl std::error::Error for BagError {}

impl From<std::io::Error> for BagError {
    fn from(err: std::io::Error) -> Self {
        BagError::Io {
            context: "io".to_string(),
            message: err.to_string(),
        }
    }
}

/// Result type for bagview operations.
pub type Result<T> = std::result::Result<T, BagError>;
