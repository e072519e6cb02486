//! Sender-authenticated public-key encryption for shares
//!
//! X25519 static-static ECDH between the sender's secret key and the
//! recipient's public key, HKDF-SHA256 to derive the AEAD key, AES-256-GCM
//! for the ciphertext. Each call uses a fresh random nonce.
//!
//! Both sides derive the same key, so the recipient can only open an
//! envelope by naming the sender's public key, which is exactly the
//! authentication the recovery protocol needs: a guardian opens its share
//! against the *owner's* key, the recovering device opens shards against
//! each *guardian's* key.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

/// Nonce length for AES-256-GCM
const NONCE_LEN: usize = 12;

/// HKDF info string, versioned so a future scheme change cannot be
/// confused with this one.
const KEY_INFO: &[u8] = b"lifeline/sealed-share/v1";

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),
    #[error("Decryption failed: wrong key, corrupted data, or tampering")]
    DecryptionFailed,
    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),
    #[error("Invalid envelope format")]
    InvalidFormat,
}

/// A sealed message: `nonce || ciphertext+tag`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedEnvelope {
    /// Nonce used for AES-256-GCM
    nonce: [u8; NONCE_LEN],
    /// Ciphertext plus 16-byte authentication tag
    ciphertext: Vec<u8>,
}

impl SealedEnvelope {
    /// Serialize to bytes: nonce || ciphertext
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(NONCE_LEN + self.ciphertext.len());
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.ciphertext);
        bytes
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        // Minimum: nonce + at least 1 byte ciphertext + 16 byte tag
        if bytes.len() < NONCE_LEN + 17 {
            return Err(CryptoError::InvalidFormat);
        }

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&bytes[0..NONCE_LEN]);
        let ciphertext = bytes[NONCE_LEN..].to_vec();

        Ok(Self { nonce, ciphertext })
    }
}

/// Derive the shared AEAD key for the (sender, recipient) direction.
///
/// The HKDF salt binds both public keys in sender-then-recipient order, so
/// the key for A→B differs from B→A even though the raw ECDH secret is the
/// same.
fn derive_key(
    local_secret: &StaticSecret,
    remote_public: &PublicKey,
    sender_public: &PublicKey,
    recipient_public: &PublicKey,
) -> Result<Zeroizing<[u8; 32]>, CryptoError> {
    let shared = local_secret.diffie_hellman(remote_public);

    let mut salt = [0u8; 64];
    salt[..32].copy_from_slice(sender_public.as_bytes());
    salt[32..].copy_from_slice(recipient_public.as_bytes());

    let hkdf = Hkdf::<Sha256>::new(Some(&salt), shared.as_bytes());
    let mut key = Zeroizing::new([0u8; 32]);
    hkdf.expand(KEY_INFO, &mut *key)
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;

    Ok(key)
}

/// Seal `plaintext` to `recipient_public`, authenticated as the holder of
/// `sender_secret`.
pub fn seal(
    sender_secret: &StaticSecret,
    recipient_public: &PublicKey,
    plaintext: &[u8],
) -> Result<SealedEnvelope, CryptoError> {
    let sender_public = PublicKey::from(sender_secret);
    let key = derive_key(
        sender_secret,
        recipient_public,
        &sender_public,
        recipient_public,
    )?;

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&*key));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    Ok(SealedEnvelope { nonce, ciphertext })
}

/// Open an envelope sealed to us by the holder of `sender_public`.
///
/// Fails if the ciphertext was sealed to a different recipient, sealed by a
/// different sender, or modified in transit.
pub fn open(
    recipient_secret: &StaticSecret,
    sender_public: &PublicKey,
    envelope: &SealedEnvelope,
) -> Result<Vec<u8>, CryptoError> {
    let recipient_public = PublicKey::from(recipient_secret);
    let key = derive_key(
        recipient_secret,
        sender_public,
        sender_public,
        &recipient_public,
    )?;

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&*key));
    cipher
        .decrypt(
            Nonce::from_slice(&envelope.nonce),
            envelope.ciphertext.as_slice(),
        )
        .map_err(|_| CryptoError::DecryptionFailed)
}
