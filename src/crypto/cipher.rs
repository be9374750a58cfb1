//! AES-CBC primitive used by the Agile envelope and payload.
//!
//! Two padding disciplines are exposed. In-place variants require the buffer
//! to already be a 16-byte multiple and are used for the fixed-size crypto
//! envelopes and the payload segments; `encrypt_zero_padded` copies and
//! zero-pads arbitrary input to the next block boundary first. Empty input
//! encrypts and decrypts to empty output.

use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::{Aes128, Aes192, Aes256};

use crate::error::{Error, Result};

/// AES block size in bytes; CBC IVs have the same width.
pub const BLOCK_SIZE: usize = 16;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes192CbcEnc = cbc::Encryptor<Aes192>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type Aes192CbcDec = cbc::Decryptor<Aes192>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

fn check_block_aligned(len: usize) -> Result<()> {
    if len % BLOCK_SIZE != 0 {
        return Err(Error::Crypto(format!(
            "AES-CBC input length {len} is not a multiple of {BLOCK_SIZE}"
        )));
    }
    Ok(())
}

/// Encrypt `buf` in place with AES-CBC and no padding.
///
/// The key must be 16, 24, or 32 bytes; `buf` must be block-aligned.
pub fn encrypt_in_place(key: &[u8], iv: &[u8; BLOCK_SIZE], buf: &mut [u8]) -> Result<()> {
    if buf.is_empty() {
        return Ok(());
    }
    check_block_aligned(buf.len())?;

    let len = buf.len();
    match key.len() {
        16 => Aes128CbcEnc::new_from_slices(key, iv)
            .map_err(|e| Error::Crypto(format!("invalid AES-128 key/iv: {e}")))?
            .encrypt_padded_mut::<NoPadding>(buf, len)
            .map(|_| ())
            .map_err(|e| Error::Crypto(format!("AES encrypt failed: {e}"))),
        24 => Aes192CbcEnc::new_from_slices(key, iv)
            .map_err(|e| Error::Crypto(format!("invalid AES-192 key/iv: {e}")))?
            .encrypt_padded_mut::<NoPadding>(buf, len)
            .map(|_| ())
            .map_err(|e| Error::Crypto(format!("AES encrypt failed: {e}"))),
        32 => Aes256CbcEnc::new_from_slices(key, iv)
            .map_err(|e| Error::Crypto(format!("invalid AES-256 key/iv: {e}")))?
            .encrypt_padded_mut::<NoPadding>(buf, len)
            .map(|_| ())
            .map_err(|e| Error::Crypto(format!("AES encrypt failed: {e}"))),
        other => Err(Error::Crypto(format!("unsupported AES key length: {other}"))),
    }
}

/// Decrypt `buf` in place with AES-CBC and no padding.
pub fn decrypt_in_place(key: &[u8], iv: &[u8; BLOCK_SIZE], buf: &mut [u8]) -> Result<()> {
    if buf.is_empty() {
        return Ok(());
    }
    check_block_aligned(buf.len())?;

    match key.len() {
        16 => Aes128CbcDec::new_from_slices(key, iv)
            .map_err(|e| Error::Crypto(format!("invalid AES-128 key/iv: {e}")))?
            .decrypt_padded_mut::<NoPadding>(buf)
            .map(|_| ())
            .map_err(|e| Error::Crypto(format!("AES decrypt failed: {e}"))),
        24 => Aes192CbcDec::new_from_slices(key, iv)
            .map_err(|e| Error::Crypto(format!("invalid AES-192 key/iv: {e}")))?
            .decrypt_padded_mut::<NoPadding>(buf)
            .map(|_| ())
            .map_err(|e| Error::Crypto(format!("AES decrypt failed: {e}"))),
        32 => Aes256CbcDec::new_from_slices(key, iv)
            .map_err(|e| Error::Crypto(format!("invalid AES-256 key/iv: {e}")))?
            .decrypt_padded_mut::<NoPadding>(buf)
            .map(|_| ())
            .map_err(|e| Error::Crypto(format!("AES decrypt failed: {e}"))),
        other => Err(Error::Crypto(format!("unsupported AES key length: {other}"))),
    }
}

/// Encrypt arbitrary input, zero-padding a copy to the next block boundary.
pub fn encrypt_zero_padded(key: &[u8], iv: &[u8; BLOCK_SIZE], data: &[u8]) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let padded_len = data.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
    let mut buf = vec![0u8; padded_len];
    buf[..data.len()].copy_from_slice(data);
    encrypt_in_place(key, iv, &mut buf)?;
    Ok(buf)
}

/// Decrypt block-aligned input into a fresh buffer.
pub fn decrypt_to_vec(key: &[u8], iv: &[u8; BLOCK_SIZE], data: &[u8]) -> Result<Vec<u8>> {
    let mut buf = data.to_vec();
    decrypt_in_place(key, iv, &mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_all_key_sizes() {
        let iv = [0x24u8; BLOCK_SIZE];
        let plain = b"sixteen byte blk sixteen byte blk sixteen byte b".to_vec();
        assert_eq!(plain.len() % BLOCK_SIZE, 0);

        for key_len in [16usize, 24, 32] {
            let key = vec![0x5Au8; key_len];
            let mut buf = plain.clone();
            encrypt_in_place(&key, &iv, &mut buf).unwrap();
            assert_ne!(buf, plain);
            decrypt_in_place(&key, &iv, &mut buf).unwrap();
            assert_eq!(buf, plain);
        }
    }

    #[test]
    fn test_zero_padding() {
        let key = [1u8; 32];
        let iv = [2u8; BLOCK_SIZE];
        let data = b"short";

        let ct = encrypt_zero_padded(&key, &iv, data).unwrap();
        assert_eq!(ct.len(), BLOCK_SIZE);

        let pt = decrypt_to_vec(&key, &iv, &ct).unwrap();
        assert_eq!(&pt[..data.len()], data);
        assert!(pt[data.len()..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_empty_input() {
        let key = [1u8; 16];
        let iv = [2u8; BLOCK_SIZE];
        assert!(encrypt_zero_padded(&key, &iv, b"").unwrap().is_empty());
        let mut empty: [u8; 0] = [];
        encrypt_in_place(&key, &iv, &mut empty).unwrap();
        decrypt_in_place(&key, &iv, &mut empty).unwrap();
    }

    #[test]
    fn test_rejects_bad_lengths() {
        let iv = [0u8; BLOCK_SIZE];
        let mut unaligned = [0u8; 15];
        assert!(encrypt_in_place(&[1u8; 16], &iv, &mut unaligned).is_err());
        let mut aligned = [0u8; 16];
        assert!(encrypt_in_place(&[1u8; 20], &iv, &mut aligned).is_err());
    }

    #[test]
    fn test_iv_changes_ciphertext() {
        let key = [7u8; 16];
        let plain = [0u8; 32];
        let mut a = plain;
        let mut b = plain;
        encrypt_in_place(&key, &[0u8; 16], &mut a).unwrap();
        encrypt_in_place(&key, &[1u8; 16], &mut b).unwrap();
        assert_ne!(a, b);
    }
}
