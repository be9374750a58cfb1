//! Password key derivation for Agile encryption.
//!
//! The password is stretched once into an intermediate hash with
//! `spin_count` chained SHA-512 rounds; every purpose-specific key is then a
//! single further round over that hash and an 8-byte block-key constant.
//! Callers derive the intermediate hash once and reuse it, so adding a
//! purpose never repeats the expensive iteration.

use sha2::{Digest, Sha512};
use zeroize::Zeroize;

use super::password_to_utf16le;

/// Block key wrapping the payload key (`encryptedKeyValue`).
pub const BLOCK_KEY_ENCRYPTED_KEY: [u8; 8] = [0x14, 0x6e, 0x0b, 0xe7, 0xab, 0xac, 0xd0, 0xd6];

/// Block key for the verifier-hash input.
pub const BLOCK_KEY_VERIFIER_INPUT: [u8; 8] = [0xfe, 0xa7, 0xd2, 0x76, 0x3b, 0x4b, 0x9e, 0x79];

/// Block key for the verifier-hash value.
pub const BLOCK_KEY_VERIFIER_VALUE: [u8; 8] = [0xd7, 0xaa, 0x0f, 0x6d, 0x30, 0x61, 0x34, 0x4e];

/// Block key wrapping the data-integrity HMAC key.
pub const BLOCK_KEY_HMAC_KEY: [u8; 8] = [0x5f, 0xb2, 0xad, 0x01, 0x0c, 0xb9, 0xe1, 0xf6];

/// Block key wrapping the data-integrity HMAC value.
pub const BLOCK_KEY_HMAC_VALUE: [u8; 8] = [0xa0, 0x67, 0x7f, 0x02, 0xb2, 0x2c, 0x84, 0x33];

/// The spin-count-iterated password hash. Zeroized on drop.
pub struct IntermediateHash([u8; 64]);

impl Drop for IntermediateHash {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl IntermediateHash {
    /// Stretch `password` with `salt` over `spin_count` SHA-512 rounds.
    ///
    /// `H0 = SHA-512(salt || UTF-16LE(password))`, then
    /// `Hi = SHA-512(LE32(i-1) || H(i-1))` with the round index first.
    pub fn derive(password: &str, salt: &[u8], spin_count: u32) -> Self {
        let mut pw_bytes = password_to_utf16le(password);

        let mut sha = Sha512::new();
        sha.update(salt);
        sha.update(&pw_bytes);
        let mut hash: [u8; 64] = sha.finalize().into();
        pw_bytes.zeroize();

        for i in 0..spin_count {
            let mut sha = Sha512::new();
            sha.update(i.to_le_bytes());
            sha.update(hash);
            hash = sha.finalize().into();
        }

        Self(hash)
    }

    /// Derive a purpose-specific key: one more SHA-512 round over the
    /// intermediate hash and `block_key`, truncated to `key_len` bytes
    /// (padded with `0x36` in the degenerate case of a request longer than
    /// the digest).
    pub fn derive_key(&self, block_key: &[u8; 8], key_len: usize) -> Vec<u8> {
        let mut sha = Sha512::new();
        sha.update(self.0);
        sha.update(block_key);
        let digest = sha.finalize();

        let mut key = vec![0x36u8; key_len];
        let copy = key_len.min(digest.len());
        key[..copy].copy_from_slice(&digest[..copy]);
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let a = IntermediateHash::derive("pw", &[1, 2, 3], 100);
        let b = IntermediateHash::derive("pw", &[1, 2, 3], 100);
        assert_eq!(a.derive_key(&BLOCK_KEY_ENCRYPTED_KEY, 32), b.derive_key(&BLOCK_KEY_ENCRYPTED_KEY, 32));
    }

    #[test]
    fn test_spin_count_matters() {
        let a = IntermediateHash::derive("pw", &[1, 2, 3], 1);
        let b = IntermediateHash::derive("pw", &[1, 2, 3], 2);
        assert_ne!(a.derive_key(&BLOCK_KEY_ENCRYPTED_KEY, 32), b.derive_key(&BLOCK_KEY_ENCRYPTED_KEY, 32));
    }

    #[test]
    fn test_block_keys_disambiguate() {
        let hash = IntermediateHash::derive("pw", &[9; 16], 10);
        let a = hash.derive_key(&BLOCK_KEY_VERIFIER_INPUT, 16);
        let b = hash.derive_key(&BLOCK_KEY_VERIFIER_VALUE, 16);
        assert_ne!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_key_truncation_prefix() {
        let hash = IntermediateHash::derive("pw", &[9; 16], 10);
        let short = hash.derive_key(&BLOCK_KEY_ENCRYPTED_KEY, 16);
        let long = hash.derive_key(&BLOCK_KEY_ENCRYPTED_KEY, 32);
        assert_eq!(&long[..16], &short[..]);
    }
}
