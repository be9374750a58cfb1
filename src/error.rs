//! Unified error type for the quince library.
//!
//! All fallible operations in the crate surface this one error enum so that
//! callers of `open`/`save` see a consistent API regardless of which layer
//! (ZIP, XML, CFB, crypto) failed.
use thiserror::Error;

/// Main error type for quince operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The file to open does not exist
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// ZIP/CFB/XML structure invalid, declared length mismatch, or a
    /// required part is missing
    #[error("Corrupted file: {0}")]
    Corrupt(String),

    /// Verifier hash mismatch, or an encrypted file opened without a password
    #[error("Invalid password")]
    InvalidPassword,

    /// Non-Agile encryption, unexpected cipher/hash parameters, or
    /// non-OOXML input
    #[error("Unsupported format: {0}")]
    Unsupported(String),

    /// Out-of-range index, empty sheet name, or similar caller mistake
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// XML parsing error
    #[error("XML error: {0}")]
    Xml(String),

    /// ZIP archive error
    #[error("ZIP error: {0}")]
    Zip(String),

    /// AES/SHA/HMAC primitive failure
    #[error("Crypto error: {0}")]
    Crypto(String),
}

/// Result type for quince operations.
pub type Result<T> = std::result::Result<T, Error>;
