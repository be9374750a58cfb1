//! Worksheet protection and its password hasher.
//!
//! The `sheetProtection` element stores no cleartext password; it carries a
//! salted, iterated SHA-512 hash. Hashing consumes the password once and the
//! UTF-16 buffer is zeroized immediately afterwards.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use rand::TryRngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::crypto::password_to_utf16le;
use crate::error::{Error, Result};

/// Iteration count applied by Excel's own protection hasher.
pub const DEFAULT_SPIN_COUNT: u32 = 100_000;

const SALT_LEN: usize = 16;

/// Which operations remain allowed on a protected sheet.
///
/// A flag set to `true` means the action stays permitted; the persisted
/// element uses the inverse convention, naming only the forbidden actions.
/// The legacy `objects`/`scenarios` locks are always written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectionOptions {
    pub select_locked_cells: bool,
    pub select_unlocked_cells: bool,
    pub format_cells: bool,
    pub format_columns: bool,
    pub format_rows: bool,
    pub insert_rows: bool,
    pub insert_columns: bool,
    pub delete_rows: bool,
    pub delete_columns: bool,
    pub sort: bool,
    pub auto_filter: bool,
    pub pivot_tables: bool,
}

impl Default for ProtectionOptions {
    /// Excel's defaults: selection stays possible, everything else is locked.
    fn default() -> Self {
        Self {
            select_locked_cells: true,
            select_unlocked_cells: true,
            format_cells: false,
            format_columns: false,
            format_rows: false,
            insert_rows: false,
            insert_columns: false,
            delete_rows: false,
            delete_columns: false,
            sort: false,
            auto_filter: false,
            pivot_tables: false,
        }
    }
}

/// The stored password hash of a protected sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash {
    /// Always `"SHA-512"`
    pub algorithm: String,
    /// Base64 of the 16-byte salt
    pub salt: String,
    /// Base64 of the final 64-byte hash
    pub hash: String,
    pub spin_count: u32,
}

/// Protection state attached to a sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetProtection {
    pub options: ProtectionOptions,
    pub password: Option<PasswordHash>,
}

impl SheetProtection {
    pub fn new(options: ProtectionOptions) -> Self {
        Self {
            options,
            password: None,
        }
    }

    /// Protect with a password, hashing it with the default spin count.
    pub fn with_password(options: ProtectionOptions, password: &str) -> Result<Self> {
        Ok(Self {
            options,
            password: Some(hash_password(password, DEFAULT_SPIN_COUNT)?),
        })
    }
}

fn iterate_hash(password: &str, salt: &[u8], spin_count: u32) -> [u8; 64] {
    let mut pw_bytes = password_to_utf16le(password);

    let mut sha = Sha512::new();
    sha.update(salt);
    sha.update(&pw_bytes);
    let mut hash: [u8; 64] = sha.finalize().into();
    pw_bytes.zeroize();

    // hi = SHA-512(h(i-1) || LE32(i-1)), hash before index
    for i in 0..spin_count {
        let mut sha = Sha512::new();
        sha.update(hash);
        sha.update(i.to_le_bytes());
        hash = sha.finalize().into();
    }

    hash
}

/// Hash a cleartext password with a fresh random salt.
pub fn hash_password(password: &str, spin_count: u32) -> Result<PasswordHash> {
    let mut salt = [0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|e| Error::Crypto(format!("failed to generate protection salt: {e}")))?;

    let hash = iterate_hash(password, &salt, spin_count);

    Ok(PasswordHash {
        algorithm: "SHA-512".to_string(),
        salt: BASE64_STANDARD.encode(salt),
        hash: BASE64_STANDARD.encode(hash),
        spin_count,
    })
}

/// Recompute the hash for `password` and compare it against `record` in
/// constant time.
pub fn verify_password(password: &str, record: &PasswordHash) -> Result<bool> {
    let salt = BASE64_STANDARD
        .decode(&record.salt)
        .map_err(|e| Error::Corrupt(format!("bad protection salt: {e}")))?;
    let expected = BASE64_STANDARD
        .decode(&record.hash)
        .map_err(|e| Error::Corrupt(format!("bad protection hash: {e}")))?;

    let actual = iterate_hash(password, &salt, record.spin_count);
    Ok(actual.ct_eq(expected.as_slice()).into())
}
