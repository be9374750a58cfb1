//! Agile-encryption support for password-protected workbooks.
//!
//! Encrypted `.xlsx` files are not ZIP archives; they are OLE/CFB compound
//! files wrapping two streams, `EncryptionInfo` (parameters and wrapped keys)
//! and `EncryptedPackage` (the AES-CBC encrypted ZIP). This module tree
//! implements the SHA-512 / AES-CBC Agile profile: key derivation, the block
//! cipher primitive, and the encryptor/decryptor driving both.

pub mod agile;
pub mod cipher;
pub mod key_derivation;

use crate::error::{Error, Result};

/// CFB magic bytes: `D0 CF 11 E0 A1 B1 1A E1`.
pub(crate) const CFB_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// ZIP local-file-header magic: `PK\x03\x04`.
pub(crate) const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// Container format of a workbook file, decided by its leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    /// Plain ZIP archive (unencrypted `.xlsx`)
    Zip,
    /// OLE/CFB compound file (encrypted `.xlsx`)
    Cfb,
}

/// Identify the container format by inspecting magic bytes.
pub fn detect_container_format(data: &[u8]) -> Result<ContainerFormat> {
    if data.len() >= 4 && data[..4] == ZIP_MAGIC {
        return Ok(ContainerFormat::Zip);
    }
    if data.len() >= 8 && data[..8] == CFB_MAGIC {
        return Ok(ContainerFormat::Cfb);
    }
    Err(Error::Corrupt(
        "file is neither a ZIP archive nor an OLE compound file".to_string(),
    ))
}

/// AES key width for Agile encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncryptionAlgorithm {
    Aes128,
    #[default]
    Aes256,
}

impl EncryptionAlgorithm {
    /// Key width in bits.
    pub fn key_bits(&self) -> u32 {
        match self {
            EncryptionAlgorithm::Aes128 => 128,
            EncryptionAlgorithm::Aes256 => 256,
        }
    }

    /// Key width in bytes.
    pub fn key_len(&self) -> usize {
        (self.key_bits() / 8) as usize
    }
}

/// Parameters for saving an encrypted workbook.
#[derive(Debug, Clone)]
pub struct EncryptionOptions {
    pub algorithm: EncryptionAlgorithm,
    pub password: String,
    /// Key-derivation iteration count; larger is slower to brute-force
    pub spin_count: u32,
}

impl EncryptionOptions {
    /// AES-256 with the standard 100,000 spin count.
    pub fn aes_256(password: impl Into<String>) -> Self {
        Self {
            algorithm: EncryptionAlgorithm::Aes256,
            password: password.into(),
            spin_count: 100_000,
        }
    }

    /// AES-128 with the standard 100,000 spin count.
    pub fn aes_128(password: impl Into<String>) -> Self {
        Self {
            algorithm: EncryptionAlgorithm::Aes128,
            password: password.into(),
            spin_count: 100_000,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.spin_count == 0 {
            return Err(Error::InvalidArgument(
                "spin count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Encode a password as UTF-16LE bytes for hashing.
pub(crate) fn password_to_utf16le(password: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(password.len() * 2);
    for ch in password.encode_utf16() {
        let bytes = ch.to_le_bytes();
        buf.push(bytes[0]);
        buf.push(bytes[1]);
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_zip() {
        assert_eq!(
            detect_container_format(b"PK\x03\x04rest").unwrap(),
            ContainerFormat::Zip
        );
    }

    #[test]
    fn test_detect_cfb() {
        let mut data = CFB_MAGIC.to_vec();
        data.extend_from_slice(&[0u8; 8]);
        assert_eq!(
            detect_container_format(&data).unwrap(),
            ContainerFormat::Cfb
        );
    }

    #[test]
    fn test_detect_unknown() {
        assert!(detect_container_format(b"not a workbook").is_err());
        assert!(detect_container_format(b"PK").is_err());
    }

    #[test]
    fn test_password_utf16le() {
        assert_eq!(password_to_utf16le("AB"), vec![0x41, 0x00, 0x42, 0x00]);
        // surrogate pair
        assert_eq!(password_to_utf16le("\u{1F600}").len(), 4);
    }

    #[test]
    fn test_options_validation() {
        let mut options = EncryptionOptions::aes_256("pw");
        assert_eq!(options.algorithm.key_len(), 32);
        assert_eq!(options.spin_count, 100_000);
        options.spin_count = 0;
        assert!(options.validate().is_err());
    }
}
