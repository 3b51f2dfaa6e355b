//! Error types for MPQ reading

use std::io;
use thiserror::Error;

/// Errors produced while opening archives and reading files from them
#[derive(Error, Debug)]
pub enum Error {
    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Archive structures could not be parsed
    #[error("Invalid MPQ format: {0}")]
    InvalidFormat(String),

    /// Name lookup found no matching hash table entry
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// The handle does not refer to a usable file or archive
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    /// A caller-supplied argument is out of range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A decode buffer could not be allocated
    #[error("Out of memory: failed to allocate {requested} bytes")]
    OutOfMemory {
        /// Size of the failed allocation
        requested: usize,
    },

    /// The decryption key of an encrypted file could not be determined
    #[error("Unable to determine the decryption key")]
    UnknownFileKey,

    /// A sector failed its Adler-32 check
    #[error("Checksum mismatch in sector {sector}: expected 0x{expected:08X}, got 0x{actual:08X}")]
    ChecksumError {
        /// Index of the failing sector within the file
        sector: u32,
        /// Value stored in the checksum table
        expected: u32,
        /// Value computed over the sector
        actual: u32,
    },

    /// Decompression failed or the sector tables are inconsistent
    #[error("File is corrupt: {0}")]
    FileCorrupt(String),

    /// Output buffer too small for the requested information
    #[error("Insufficient buffer: {required} bytes required, {provided} provided")]
    InsufficientBuffer {
        /// Bytes needed to hold the value
        required: usize,
        /// Bytes the caller offered
        provided: usize,
    },
}

/// Result type alias for MPQ operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid format error
    pub fn invalid_format<S: Into<String>>(msg: S) -> Self {
        Error::InvalidFormat(msg.into())
    }

    /// Create a file corrupt error
    pub fn file_corrupt<S: Into<String>>(msg: S) -> Self {
        Error::FileCorrupt(msg.into())
    }

    /// Create an error for a failed codec; codec failures mean corrupt file data
    pub fn compression<S: Into<String>>(msg: S) -> Self {
        Error::FileCorrupt(msg.into())
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter<S: Into<String>>(msg: S) -> Self {
        Error::InvalidParameter(msg.into())
    }

    /// Create an invalid handle error
    pub fn invalid_handle<S: Into<String>>(msg: S) -> Self {
        Error::InvalidHandle(msg.into())
    }

    /// Whether the caller can retry the same call after adjusting its input
    ///
    /// `InsufficientBuffer` reports the size to retry with, and `UnknownFileKey`
    /// leaves the handle usable once a key is supplied with `MpqFile::set_key`.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::InsufficientBuffer { .. } | Error::UnknownFileKey
        )
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => e,
            Error::InvalidParameter(_) | Error::InsufficientBuffer { .. } => {
                io::Error::new(io::ErrorKind::InvalidInput, err)
            }
            Error::FileNotFound(_) => io::Error::new(io::ErrorKind::NotFound, err),
            Error::OutOfMemory { .. } => io::Error::new(io::ErrorKind::OutOfMemory, err),
            _ => io::Error::new(io::ErrorKind::InvalidData, err),
        }
    }
}

/// Allocate a zeroed buffer, reporting allocation failure instead of aborting
pub(crate) fn alloc_buffer(len: usize) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| Error::OutOfMemory { requested: len })?;
    buffer.resize(len, 0);
    Ok(buffer)
}
