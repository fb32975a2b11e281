use argon2::{Algorithm, Argon2, Params, Version};
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::envelope::{CryptoError, SecretKey};

pub const KDF_ARGON2ID: &str = "argon2id";

/// Parameters a collaborator needs to turn a password into the vault key.
/// The salt doubles as the server-side credential salt: when it changes the
/// password was changed on another device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub algorithm: String,
    pub salt: String,
    pub iterations: u32,
    pub memory_kb: u32,
    pub parallelism: u32,
}

impl KdfParams {
    #[must_use]
    pub fn argon2id(salt: impl Into<String>) -> Self {
        Self {
            algorithm: KDF_ARGON2ID.to_string(),
            salt: salt.into(),
            iterations: 3,
            memory_kb: 64 * 1024,
            parallelism: 1,
        }
    }
}

#[must_use]
pub fn random_kdf_salt() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

pub fn derive_key(password: &str, params: &KdfParams) -> Result<SecretKey, CryptoError> {
    if params.algorithm != KDF_ARGON2ID {
        return Err(CryptoError::KeyDerivationFailed(format!(
            "unsupported kdf algorithm: {}",
            params.algorithm
        )));
    }
    let salt = base64::engine::general_purpose::STANDARD
        .decode(&params.salt)
        .map_err(|_| CryptoError::KeyDerivationFailed("invalid kdf salt".to_string()))?;
    let argon_params = Params::new(
        params.memory_kb,
        params.iterations,
        params.parallelism,
        Some(32),
    )
    .map_err(|err| CryptoError::KeyDerivationFailed(err.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);
    let mut key = [0u8; 32];
    argon2
        .hash_password_into(password.as_bytes(), &salt, &mut key)
        .map_err(|err| CryptoError::KeyDerivationFailed(err.to_string()))?;
    Ok(SecretKey::from_bytes(key))
}
