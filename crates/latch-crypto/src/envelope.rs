use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, Payload};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::instrument;
use zeroize::{Zeroize, ZeroizeOnDrop};

const ENVELOPE_MAGIC: [u8; 3] = *b"LCH";
const ENVELOPE_VERSION: u8 = 1;
const ALG_XCHACHA20POLY1305: u8 = 1;
const XCHACHA_NONCE_LEN: usize = 24;
const HEADER_LEN: usize = 3 + 1 + 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    InvalidEnvelope,
    UnsupportedVersion(u8),
    UnsupportedAlgorithm(u8),
    EncryptionFailed,
    DecryptionFailed,
    KeyDerivationFailed(String),
}

impl std::fmt::Display for CryptoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidEnvelope => write!(f, "invalid encrypted envelope"),
            Self::UnsupportedVersion(version) => {
                write!(f, "unsupported envelope version: {version}")
            }
            Self::UnsupportedAlgorithm(alg) => write!(f, "unsupported algorithm: {alg}"),
            Self::EncryptionFailed => write!(f, "encryption failed"),
            Self::DecryptionFailed => write!(f, "decryption failed"),
            Self::KeyDerivationFailed(reason) => write!(f, "key derivation failed: {reason}"),
        }
    }
}

impl std::error::Error for CryptoError {}

/// 256-bit symmetric key, wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; 32]);

impl SecretKey {
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Short non-reversible identifier, safe to log.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let hex = blake3::hash(&self.0).to_hex().to_string();
        hex.get(0..12).unwrap_or(&hex).to_string()
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretKey(REDACTED)")
    }
}

fn header() -> [u8; HEADER_LEN] {
    [
        ENVELOPE_MAGIC[0],
        ENVELOPE_MAGIC[1],
        ENVELOPE_MAGIC[2],
        ENVELOPE_VERSION,
        ALG_XCHACHA20POLY1305,
    ]
}

fn envelope_aad(header: &[u8], context: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(header.len() + context.len());
    out.extend_from_slice(header);
    out.extend_from_slice(context);
    out
}

/// Layout: `magic(3) | version(1) | alg(1) | nonce(24) | ciphertext`.
/// The header bytes are bound into the AEAD tag together with `context`.
#[instrument(
    level = "debug",
    skip(key, plaintext, context),
    fields(plaintext_len = plaintext.len())
)]
pub fn seal(key: &SecretKey, plaintext: &[u8], context: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let header = header();
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
    let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
    let aad = envelope_aad(&header, context);
    let ciphertext = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext,
                aad: &aad,
            },
        )
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut out = Vec::with_capacity(HEADER_LEN + XCHACHA_NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&header);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

#[instrument(level = "debug", skip(key, envelope, context), fields(envelope_len = envelope.len()))]
pub fn open(key: &SecretKey, envelope: &[u8], context: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if envelope.len() < HEADER_LEN + XCHACHA_NONCE_LEN {
        return Err(CryptoError::InvalidEnvelope);
    }
    if envelope[..3] != ENVELOPE_MAGIC {
        return Err(CryptoError::InvalidEnvelope);
    }
    if envelope[3] != ENVELOPE_VERSION {
        return Err(CryptoError::UnsupportedVersion(envelope[3]));
    }
    if envelope[4] != ALG_XCHACHA20POLY1305 {
        return Err(CryptoError::UnsupportedAlgorithm(envelope[4]));
    }
    let (header, rest) = envelope.split_at(HEADER_LEN);
    let (nonce_bytes, ciphertext) = rest.split_at(XCHACHA_NONCE_LEN);
    let aad = envelope_aad(header, context);
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
    cipher
        .decrypt(
            XNonce::from_slice(nonce_bytes),
            Payload {
                msg: ciphertext,
                aad: &aad,
            },
        )
        .map_err(|_| CryptoError::DecryptionFailed)
}
