//! Salted scrypt password hashes.
//!
//! Stored form is `hex(salt):hex(key)` with a 16-byte salt and a 64-byte derived key.
//! The KDF is seeded with the salt's hex text (not the raw bytes), matching
//! the records already in the user table.

use std::sync::OnceLock;

use rand::RngCore;
use rand::rngs::OsRng;
use scrypt::Params;
use subtle::ConstantTimeEq;

use crate::{Error, Result};

const SALT_LEN: usize = 16;
const KEY_LEN: usize = 64;

// N = 16384, r = 8, p = 1
const SCRYPT_LOG_N: u8 = 14;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;

/// Hash `password` with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let salt_hex = hex::encode(salt);

    let key = derive_key(password, &salt_hex)?;
    Ok(format!("{salt_hex}:{}", hex::encode(key)))
}

/// Check `password` against a stored `salt:hash` string.
///
/// Any malformed stored value is a mismatch, never an error.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Some((salt, hash)) = stored_hash.split_once(':') else {
        return false;
    };
    if salt.is_empty() || hash.is_empty() {
        return false;
    }

    let Ok(expected) = hex::decode(hash) else {
        return false;
    };
    let Ok(actual) = derive_key(password, salt) else {
        return false;
    };

    // Length is a property of the format, not of the secret.
    if expected.len() != actual.len() {
        return false;
    }
    expected.ct_eq(&actual).into()
}

/// A valid hash of an unguessable password, used to spend the same KDF time on
/// unknown accounts as on known ones.
pub(crate) fn decoy_hash() -> &'static str {
    static DECOY: OnceLock<String> = OnceLock::new();
    DECOY.get_or_init(|| {
        let mut filler = [0u8; 32];
        OsRng.fill_bytes(&mut filler);
        hash_password(&hex::encode(filler)).unwrap_or_default()
    })
}

fn derive_key(password: &str, salt: &str) -> Result<[u8; KEY_LEN]> {
    let params = Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, KEY_LEN)
        .map_err(|e| Error::Kdf(e.to_string()))?;
    let mut key = [0u8; KEY_LEN];
    scrypt::scrypt(password.as_bytes(), salt.as_bytes(), &params, &mut key)
        .map_err(|e| Error::Kdf(e.to_string()))?;
    Ok(key)
}
