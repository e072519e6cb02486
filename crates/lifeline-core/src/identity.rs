//! Signing identity and encryption keypairs
//!
//! The signing keypair is Ed25519, derived deterministically from a 32-byte
//! seed: rebuilding the seed rebuilds the identity, which is the whole point
//! of the recovery protocol. The encryption keypair is X25519 and independent
//! of the seed.

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of a signing seed in bytes.
pub const SEED_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Seed must be {SEED_LEN} bytes, got {0}")]
    InvalidSeedLength(usize),
    #[error("Invalid key material: {0}")]
    InvalidKey(String),
}

/// The raw signing seed. Zeroized on drop, never printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Seed([u8; SEED_LEN]);

impl Seed {
    /// Generate a fresh random seed from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SEED_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdentityError> {
        let arr: [u8; SEED_LEN] = bytes
            .try_into()
            .map_err(|_| IdentityError::InvalidSeedLength(bytes.len()))?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; SEED_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never leak seed bytes through Debug output or logs.
        f.write_str("Seed(..)")
    }
}

/// An Ed25519 signing identity.
#[derive(Clone)]
pub struct Identity {
    signing: SigningKey,
}

impl Identity {
    /// Derive the identity from its seed. Deterministic: the same seed
    /// always yields the same keypair.
    pub fn from_seed(seed: &Seed) -> Self {
        Self {
            signing: SigningKey::from_bytes(seed.as_bytes()),
        }
    }

    /// Generate a brand new identity.
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    /// The seed this identity was derived from.
    pub fn seed(&self) -> Seed {
        Seed(self.signing.to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing.sign(message)
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("verifying_key", &self.verifying_key())
            .finish_non_exhaustive()
    }
}

/// An X25519 encryption keypair: either a participant's long-term pair
/// (public half published in the directory) or a recovery session's
/// ephemeral pair.
pub struct EncryptionKeys {
    secret: StaticSecret,
    public: PublicKey,
}

impl EncryptionKeys {
    /// Generate a fresh keypair.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        let secret = StaticSecret::from(bytes);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn public(&self) -> PublicKey {
        self.public
    }

    pub fn secret(&self) -> &StaticSecret {
        &self.secret
    }
}

impl std::fmt::Debug for EncryptionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKeys")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}
