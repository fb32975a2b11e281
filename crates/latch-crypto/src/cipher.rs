use crate::envelope::{open, seal, CryptoError, SecretKey};

const VAULT_CONTEXT: &[u8] = b"latch:vault:v1";

/// Opaque symmetric primitive the sync core encrypts whole vault images with.
pub trait VaultCipher: Send + Sync {
    fn encrypt(&self, plaintext: &[u8], key: &SecretKey) -> Result<Vec<u8>, CryptoError>;
    fn decrypt(&self, blob: &[u8], key: &SecretKey) -> Result<Vec<u8>, CryptoError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct XChaChaVaultCipher;

impl VaultCipher for XChaChaVaultCipher {
    fn encrypt(&self, plaintext: &[u8], key: &SecretKey) -> Result<Vec<u8>, CryptoError> {
        seal(key, plaintext, VAULT_CONTEXT)
    }

    fn decrypt(&self, blob: &[u8], key: &SecretKey) -> Result<Vec<u8>, CryptoError> {
        open(key, blob, VAULT_CONTEXT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vault_blob_is_bound_to_vault_context() {
        let key = SecretKey::generate();
        let cipher = XChaChaVaultCipher;
        let blob = cipher.encrypt(b"SQLite format 3\0", &key).expect("encrypt");
        assert!(open(&key, &blob, b"latch:other:v1").is_err());
        assert_eq!(
            cipher.decrypt(&blob, &key).expect("decrypt"),
            b"SQLite format 3\0"
        );
    }
}
