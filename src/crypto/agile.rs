//! Agile (ECMA-376) encryption and decryption of OOXML packages.
//!
//! The `EncryptionInfo` stream opens with an 8-byte version header
//! (major 4, minor 4, flags 0x40) followed by UTF-8 XML naming the
//! parameters and carrying five base64 blobs: the wrapped payload key, the
//! encrypted password verifier pair, and the wrapped HMAC key and value.
//! The `EncryptedPackage` stream is an 8-byte little-endian plaintext length
//! followed by the ZIP encrypted in 4096-byte AES-CBC segments, each with an
//! IV derived from the key-data salt and the segment index.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use hmac::{Hmac, Mac};
use rand::TryRngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use super::EncryptionOptions;
use super::cipher::{self, BLOCK_SIZE};
use super::key_derivation::{
    BLOCK_KEY_ENCRYPTED_KEY, BLOCK_KEY_HMAC_KEY, BLOCK_KEY_HMAC_VALUE, BLOCK_KEY_VERIFIER_INPUT,
    BLOCK_KEY_VERIFIER_VALUE, IntermediateHash,
};
use crate::error::{Error, Result};
use crate::xml::{XmlEvent, XmlReader};

type HmacSha512 = Hmac<Sha512>;

const VERSION_MAJOR: u16 = 4;
const VERSION_MINOR: u16 = 4;
const VERSION_FLAGS: u32 = 0x0000_0040;

const SALT_SIZE: usize = 16;
const HASH_SIZE: usize = 64;
const SEGMENT_SIZE: usize = 4096;

/// Parsed parameters and wrapped secrets from an `EncryptionInfo` stream.
#[derive(Debug)]
pub struct AgileEncryptionInfo {
    /// Salt for payload segment IVs (`keyData/@saltValue`)
    pub key_data_salt: Vec<u8>,
    /// Salt for password key derivation (`p:encryptedKey/@saltValue`)
    pub key_salt: Vec<u8>,
    pub spin_count: u32,
    pub key_bits: u32,
    pub encrypted_verifier_hash_input: Vec<u8>,
    pub encrypted_verifier_hash_value: Vec<u8>,
    pub encrypted_key_value: Vec<u8>,
    pub encrypted_hmac_key: Vec<u8>,
    pub encrypted_hmac_value: Vec<u8>,
}

/// Parse an `EncryptionInfo` stream, rejecting everything but the Agile
/// SHA-512 / AES-CBC profile.
pub fn parse_encryption_info(data: &[u8]) -> Result<AgileEncryptionInfo> {
    if data.len() < 8 {
        return Err(Error::Corrupt("EncryptionInfo stream is too short".to_string()));
    }

    let major = u16::from_le_bytes([data[0], data[1]]);
    let minor = u16::from_le_bytes([data[2], data[3]]);
    let flags = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    if (major, minor) != (VERSION_MAJOR, VERSION_MINOR) || flags != VERSION_FLAGS {
        return Err(Error::Unsupported(format!(
            "not Agile encryption: version {major}.{minor}, flags {flags:#x}"
        )));
    }

    let xml = std::str::from_utf8(&data[8..])
        .map_err(|e| Error::Corrupt(format!("EncryptionInfo XML is not UTF-8: {e}")))?;
    parse_encryption_xml(xml)
}

fn decode_b64(tag: &crate::xml::StartTag, attr: &str) -> Result<Vec<u8>> {
    let value = tag
        .attr(attr)
        .ok_or_else(|| Error::Corrupt(format!("EncryptionInfo missing attribute {attr}")))?;
    BASE64_STANDARD
        .decode(value)
        .map_err(|e| Error::Corrupt(format!("bad base64 in {attr}: {e}")))
}

fn require_u32(tag: &crate::xml::StartTag, attr: &str) -> Result<u32> {
    tag.attr(attr)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| Error::Corrupt(format!("EncryptionInfo missing attribute {attr}")))
}

fn check_cipher_params(tag: &crate::xml::StartTag) -> Result<()> {
    match tag.attr("cipherAlgorithm") {
        Some("AES") => {},
        other => {
            return Err(Error::Unsupported(format!(
                "cipher algorithm {:?}",
                other.unwrap_or("missing")
            )));
        },
    }
    match tag.attr("cipherChaining") {
        Some("ChainingModeCBC") => {},
        other => {
            return Err(Error::Unsupported(format!(
                "cipher chaining {:?}",
                other.unwrap_or("missing")
            )));
        },
    }
    match tag.attr("hashAlgorithm") {
        Some("SHA512") => {},
        other => {
            return Err(Error::Unsupported(format!(
                "hash algorithm {:?}",
                other.unwrap_or("missing")
            )));
        },
    }
    Ok(())
}

fn parse_encryption_xml(xml: &str) -> Result<AgileEncryptionInfo> {
    let mut key_data_salt = None;
    let mut key_salt = None;
    let mut spin_count = None;
    let mut key_bits = None;
    let mut verifier_hash_input = None;
    let mut verifier_hash_value = None;
    let mut key_value = None;
    let mut hmac_key = Vec::new();
    let mut hmac_value = Vec::new();

    let mut reader = XmlReader::new(xml);
    loop {
        match reader.next()? {
            XmlEvent::StartElement(tag) => match tag.name.as_str() {
                "keyData" => {
                    check_cipher_params(&tag)?;
                    if require_u32(&tag, "blockSize")? as usize != BLOCK_SIZE {
                        return Err(Error::Unsupported("block size must be 16".to_string()));
                    }
                    if require_u32(&tag, "hashSize")? as usize != HASH_SIZE {
                        return Err(Error::Unsupported("hash size must be 64".to_string()));
                    }
                    key_data_salt = Some(decode_b64(&tag, "saltValue")?);
                },
                "dataIntegrity" => {
                    hmac_key = decode_b64(&tag, "encryptedHmacKey")?;
                    hmac_value = decode_b64(&tag, "encryptedHmacValue")?;
                },
                "encryptedKey" => {
                    check_cipher_params(&tag)?;
                    let bits = require_u32(&tag, "keyBits")?;
                    if bits != 128 && bits != 256 {
                        return Err(Error::Unsupported(format!("key width {bits} bits")));
                    }
                    key_bits = Some(bits);
                    spin_count = Some(require_u32(&tag, "spinCount")?);
                    key_salt = Some(decode_b64(&tag, "saltValue")?);
                    verifier_hash_input = Some(decode_b64(&tag, "encryptedVerifierHashInput")?);
                    verifier_hash_value = Some(decode_b64(&tag, "encryptedVerifierHashValue")?);
                    key_value = Some(decode_b64(&tag, "encryptedKeyValue")?);
                },
                _ => {},
            },
            XmlEvent::EndDocument => break,
            _ => {},
        }
    }

    let info = AgileEncryptionInfo {
        key_data_salt: key_data_salt
            .ok_or_else(|| Error::Corrupt("EncryptionInfo missing keyData".to_string()))?,
        key_salt: key_salt
            .ok_or_else(|| Error::Corrupt("EncryptionInfo missing keyEncryptor".to_string()))?,
        spin_count: spin_count
            .ok_or_else(|| Error::Corrupt("EncryptionInfo missing spinCount".to_string()))?,
        key_bits: key_bits
            .ok_or_else(|| Error::Corrupt("EncryptionInfo missing keyBits".to_string()))?,
        encrypted_verifier_hash_input: verifier_hash_input
            .ok_or_else(|| Error::Corrupt("EncryptionInfo missing verifier input".to_string()))?,
        encrypted_verifier_hash_value: verifier_hash_value
            .ok_or_else(|| Error::Corrupt("EncryptionInfo missing verifier hash".to_string()))?,
        encrypted_key_value: key_value
            .ok_or_else(|| Error::Corrupt("EncryptionInfo missing key value".to_string()))?,
        encrypted_hmac_key: hmac_key,
        encrypted_hmac_value: hmac_value,
    };

    if info.key_salt.len() != SALT_SIZE || info.key_data_salt.len() != SALT_SIZE {
        return Err(Error::Unsupported("salt size must be 16".to_string()));
    }

    Ok(info)
}

fn salt_iv(salt: &[u8]) -> [u8; BLOCK_SIZE] {
    let mut iv = [0u8; BLOCK_SIZE];
    iv.copy_from_slice(&salt[..BLOCK_SIZE]);
    iv
}

/// IV for a purpose bound to the key-data salt: the first 16 bytes of
/// `SHA-512(salt || block_key)`.
fn derived_iv(salt: &[u8], block_key: &[u8]) -> [u8; BLOCK_SIZE] {
    let mut sha = Sha512::new();
    sha.update(salt);
    sha.update(block_key);
    let digest = sha.finalize();

    let mut iv = [0u8; BLOCK_SIZE];
    iv.copy_from_slice(&digest[..BLOCK_SIZE]);
    iv
}

/// Verify `password` against the stored verifier pair and unwrap the payload
/// key. The comparison is constant-time; a mismatch is `InvalidPassword`.
fn unwrap_payload_key(info: &AgileEncryptionInfo, password: &str) -> Result<Vec<u8>> {
    let key_len = (info.key_bits / 8) as usize;
    let iv = salt_iv(&info.key_salt);

    let hash = IntermediateHash::derive(password, &info.key_salt, info.spin_count);
    let mut key_verifier_input = hash.derive_key(&BLOCK_KEY_VERIFIER_INPUT, key_len);
    let mut key_verifier_value = hash.derive_key(&BLOCK_KEY_VERIFIER_VALUE, key_len);
    let mut key_encrypted_key = hash.derive_key(&BLOCK_KEY_ENCRYPTED_KEY, key_len);

    let mut verifier_input =
        cipher::decrypt_to_vec(&key_verifier_input, &iv, &info.encrypted_verifier_hash_input)?;
    let stored_hash =
        cipher::decrypt_to_vec(&key_verifier_value, &iv, &info.encrypted_verifier_hash_value)?;
    if verifier_input.len() < BLOCK_SIZE || stored_hash.len() < HASH_SIZE {
        return Err(Error::Corrupt("verifier blobs are too short".to_string()));
    }

    let mut sha = Sha512::new();
    sha.update(&verifier_input[..BLOCK_SIZE]);
    let verifier_hash = sha.finalize();

    let matches: bool = verifier_hash
        .as_slice()
        .ct_eq(&stored_hash[..HASH_SIZE])
        .into();

    verifier_input.zeroize();
    key_verifier_input.zeroize();
    key_verifier_value.zeroize();

    if !matches {
        key_encrypted_key.zeroize();
        return Err(Error::InvalidPassword);
    }

    let mut payload_key = cipher::decrypt_to_vec(&key_encrypted_key, &iv, &info.encrypted_key_value)?;
    key_encrypted_key.zeroize();
    if payload_key.len() < key_len {
        payload_key.zeroize();
        return Err(Error::Corrupt("wrapped payload key is too short".to_string()));
    }
    payload_key.truncate(key_len);

    Ok(payload_key)
}

/// Decrypt an `EncryptedPackage` stream, verifying the password first.
pub fn decrypt_package(
    info: &AgileEncryptionInfo,
    package: &[u8],
    password: &str,
) -> Result<Vec<u8>> {
    if package.len() < 8 {
        return Err(Error::Corrupt("EncryptedPackage stream is too short".to_string()));
    }

    let mut payload_key = unwrap_payload_key(info, password)?;

    let declared_len = u64::from_le_bytes(
        package[..8]
            .try_into()
            .expect("slice of checked length"),
    ) as usize;
    let body = &package[8..];

    let mut plain = Vec::with_capacity(body.len());
    let mut segment = vec![0u8; SEGMENT_SIZE];
    let mut offset = 0usize;
    let mut index: u32 = 0;

    while offset < body.len() {
        let chunk_len = (body.len() - offset).min(SEGMENT_SIZE);
        if chunk_len % BLOCK_SIZE != 0 {
            payload_key.zeroize();
            return Err(Error::Corrupt(
                "EncryptedPackage segment is not block-aligned".to_string(),
            ));
        }

        let buf = &mut segment[..chunk_len];
        buf.copy_from_slice(&body[offset..offset + chunk_len]);

        let iv = derived_iv(&info.key_data_salt, &index.to_le_bytes());
        if let Err(e) = cipher::decrypt_in_place(&payload_key, &iv, buf) {
            payload_key.zeroize();
            return Err(e);
        }
        plain.extend_from_slice(buf);

        offset += chunk_len;
        index += 1;
    }

    payload_key.zeroize();
    segment.zeroize();

    if declared_len > plain.len() {
        return Err(Error::Corrupt(format!(
            "EncryptedPackage declares {declared_len} bytes but holds {}",
            plain.len()
        )));
    }
    plain.truncate(declared_len);
    Ok(plain)
}

fn random_bytes(buf: &mut [u8], what: &str) -> Result<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| Error::Crypto(format!("failed to generate {what}: {e}")))
}

/// Encrypt a package, producing the `EncryptionInfo` and `EncryptedPackage`
/// stream bodies.
///
/// Fresh salts, payload key, verifier input, and HMAC key are drawn from the
/// OS random source per call; all secrets are zeroized before returning.
pub fn encrypt_package(plain: &[u8], options: &EncryptionOptions) -> Result<(Vec<u8>, Vec<u8>)> {
    options.validate()?;
    let key_len = options.algorithm.key_len();

    let mut key_data_salt = [0u8; SALT_SIZE];
    let mut key_salt = [0u8; SALT_SIZE];
    let mut payload_key = vec![0u8; key_len];
    let mut verifier_input = [0u8; BLOCK_SIZE];
    let mut hmac_key = [0u8; HASH_SIZE];
    random_bytes(&mut key_data_salt, "key data salt")?;
    random_bytes(&mut key_salt, "key encryptor salt")?;
    random_bytes(&mut payload_key, "payload key")?;
    random_bytes(&mut verifier_input, "password verifier")?;
    random_bytes(&mut hmac_key, "integrity key")?;

    // password-derived wrapping keys
    let hash = IntermediateHash::derive(&options.password, &key_salt, options.spin_count);
    let mut key_verifier_input = hash.derive_key(&BLOCK_KEY_VERIFIER_INPUT, key_len);
    let mut key_verifier_value = hash.derive_key(&BLOCK_KEY_VERIFIER_VALUE, key_len);
    let mut key_encrypted_key = hash.derive_key(&BLOCK_KEY_ENCRYPTED_KEY, key_len);
    drop(hash);

    let envelope_iv = salt_iv(&key_salt);

    let encrypted_verifier_input =
        cipher::encrypt_zero_padded(&key_verifier_input, &envelope_iv, &verifier_input)?;

    let mut sha = Sha512::new();
    sha.update(verifier_input);
    let verifier_hash = sha.finalize();
    let encrypted_verifier_hash =
        cipher::encrypt_zero_padded(&key_verifier_value, &envelope_iv, verifier_hash.as_slice())?;

    let encrypted_key_value =
        cipher::encrypt_zero_padded(&key_encrypted_key, &envelope_iv, &payload_key)?;

    key_verifier_input.zeroize();
    key_verifier_value.zeroize();
    key_encrypted_key.zeroize();
    verifier_input.zeroize();

    // segmented payload, one 4096-byte window at a time
    let mut package = Vec::with_capacity(8 + plain.len() + BLOCK_SIZE);
    package.extend_from_slice(&(plain.len() as u64).to_le_bytes());

    let mut segment = vec![0u8; SEGMENT_SIZE];
    let mut offset = 0usize;
    let mut index: u32 = 0;
    while offset < plain.len() {
        let chunk_len = (plain.len() - offset).min(SEGMENT_SIZE);
        let padded_len = chunk_len.div_ceil(BLOCK_SIZE) * BLOCK_SIZE;

        let buf = &mut segment[..padded_len];
        buf[..chunk_len].copy_from_slice(&plain[offset..offset + chunk_len]);
        buf[chunk_len..].fill(0);

        let iv = derived_iv(&key_data_salt, &index.to_le_bytes());
        if let Err(e) = cipher::encrypt_in_place(&payload_key, &iv, buf) {
            payload_key.zeroize();
            return Err(e);
        }
        package.extend_from_slice(buf);

        offset += chunk_len;
        index += 1;
    }
    segment.zeroize();

    // data integrity: HMAC-SHA-512 of the segment body, key and value
    // wrapped with the payload key
    let mut mac = HmacSha512::new_from_slice(&hmac_key)
        .map_err(|e| Error::Crypto(format!("failed to init HMAC-SHA-512: {e}")))?;
    mac.update(&package[8..]);
    let hmac_value = mac.finalize().into_bytes();

    let iv_hmac_key = derived_iv(&key_data_salt, &BLOCK_KEY_HMAC_KEY);
    let encrypted_hmac_key = cipher::encrypt_zero_padded(&payload_key, &iv_hmac_key, &hmac_key)?;
    let iv_hmac_value = derived_iv(&key_data_salt, &BLOCK_KEY_HMAC_VALUE);
    let encrypted_hmac_value =
        cipher::encrypt_zero_padded(&payload_key, &iv_hmac_value, hmac_value.as_slice())?;

    hmac_key.zeroize();
    payload_key.zeroize();

    let xml = build_encryption_info_xml(
        options.algorithm.key_bits(),
        options.spin_count,
        &key_data_salt,
        &key_salt,
        &encrypted_verifier_input,
        &encrypted_verifier_hash,
        &encrypted_key_value,
        &encrypted_hmac_key,
        &encrypted_hmac_value,
    );
    let xml_bytes = xml.into_bytes();

    let mut info = Vec::with_capacity(8 + xml_bytes.len());
    info.extend_from_slice(&VERSION_MAJOR.to_le_bytes());
    info.extend_from_slice(&VERSION_MINOR.to_le_bytes());
    info.extend_from_slice(&VERSION_FLAGS.to_le_bytes());
    info.extend_from_slice(&xml_bytes);

    Ok((info, package))
}

#[allow(clippy::too_many_arguments)]
fn build_encryption_info_xml(
    key_bits: u32,
    spin_count: u32,
    key_data_salt: &[u8],
    key_salt: &[u8],
    encrypted_verifier_input: &[u8],
    encrypted_verifier_hash: &[u8],
    encrypted_key_value: &[u8],
    encrypted_hmac_key: &[u8],
    encrypted_hmac_value: &[u8],
) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<encryption xmlns="http://schemas.microsoft.com/office/2006/encryption" xmlns:p="http://schemas.microsoft.com/office/2006/keyEncryptor/password"><keyData saltSize="{salt_sz}" blockSize="{blk_sz}" keyBits="{key_bits}" hashSize="{hash_sz}" cipherAlgorithm="AES" cipherChaining="ChainingModeCBC" hashAlgorithm="SHA512" saltValue="{key_data_salt}"/><dataIntegrity encryptedHmacKey="{hmac_key}" encryptedHmacValue="{hmac_value}"/><keyEncryptors><keyEncryptor uri="http://schemas.microsoft.com/office/2006/keyEncryptor/password"><p:encryptedKey spinCount="{spin}" saltSize="{salt_sz}" blockSize="{blk_sz}" keyBits="{key_bits}" hashSize="{hash_sz}" cipherAlgorithm="AES" cipherChaining="ChainingModeCBC" hashAlgorithm="SHA512" saltValue="{key_salt}" encryptedVerifierHashInput="{ver_input}" encryptedVerifierHashValue="{ver_hash}" encryptedKeyValue="{key_value}"/></keyEncryptor></keyEncryptors></encryption>"#,
        salt_sz = SALT_SIZE,
        blk_sz = BLOCK_SIZE,
        hash_sz = HASH_SIZE,
        spin = spin_count,
        key_data_salt = BASE64_STANDARD.encode(key_data_salt),
        key_salt = BASE64_STANDARD.encode(key_salt),
        ver_input = BASE64_STANDARD.encode(encrypted_verifier_input),
        ver_hash = BASE64_STANDARD.encode(encrypted_verifier_hash),
        key_value = BASE64_STANDARD.encode(encrypted_key_value),
        hmac_key = BASE64_STANDARD.encode(encrypted_hmac_key),
        hmac_value = BASE64_STANDARD.encode(encrypted_hmac_value),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_options(password: &str) -> EncryptionOptions {
        // small spin count keeps the unit tests fast
        let mut options = EncryptionOptions::aes_256(password);
        options.spin_count = 1_000;
        options
    }

    #[test]
    fn test_roundtrip_aes_256() {
        let plain = b"PK\x03\x04 pretend zip payload, long enough to be interesting".to_vec();
        let (info_bytes, package) = encrypt_package(&plain, &test_options("secret")).unwrap();

        let info = parse_encryption_info(&info_bytes).unwrap();
        assert_eq!(info.key_bits, 256);
        assert_eq!(info.spin_count, 1_000);

        let decrypted = decrypt_package(&info, &package, "secret").unwrap();
        assert_eq!(decrypted, plain);
    }

    #[test]
    fn test_roundtrip_aes_128() {
        let mut options = EncryptionOptions::aes_128("pw");
        options.spin_count = 500;
        let plain = vec![0xABu8; 10_000]; // spans multiple segments
        let (info_bytes, package) = encrypt_package(&plain, &options).unwrap();

        let info = parse_encryption_info(&info_bytes).unwrap();
        assert_eq!(info.key_bits, 128);
        assert_eq!(decrypt_package(&info, &package, "pw").unwrap(), plain);
    }

    #[test]
    fn test_wrong_password() {
        let (info_bytes, package) = encrypt_package(b"data data data", &test_options("right")).unwrap();
        let info = parse_encryption_info(&info_bytes).unwrap();
        assert!(matches!(
            decrypt_package(&info, &package, "wrong"),
            Err(Error::InvalidPassword)
        ));
    }

    #[test]
    fn test_segment_boundary_lengths() {
        for len in [SEGMENT_SIZE - 1, SEGMENT_SIZE, SEGMENT_SIZE + 1, 2 * SEGMENT_SIZE] {
            let plain = vec![7u8; len];
            let (info_bytes, package) = encrypt_package(&plain, &test_options("pw")).unwrap();
            let info = parse_encryption_info(&info_bytes).unwrap();
            assert_eq!(decrypt_package(&info, &package, "pw").unwrap(), plain, "len {len}");
        }
    }

    #[test]
    fn test_declared_length_prefix() {
        let plain = b"0123456789".to_vec();
        let (_, package) = encrypt_package(&plain, &test_options("pw")).unwrap();
        assert_eq!(u64::from_le_bytes(package[..8].try_into().unwrap()), 10);
        // ciphertext body padded to a block multiple
        assert_eq!((package.len() - 8) % BLOCK_SIZE, 0);
    }

    #[test]
    fn test_rejects_non_agile_header() {
        let mut data = vec![0x03, 0x00, 0x02, 0x00, 0x24, 0x00, 0x00, 0x00];
        data.extend_from_slice(b"<encryption/>");
        assert!(matches!(
            parse_encryption_info(&data),
            Err(Error::Unsupported(_))
        ));
    }

    #[test]
    fn test_salts_differ_between_calls() {
        let (a, _) = encrypt_package(b"x", &test_options("pw")).unwrap();
        let (b, _) = encrypt_package(b"x", &test_options("pw")).unwrap();
        assert_ne!(a, b);
    }
}
