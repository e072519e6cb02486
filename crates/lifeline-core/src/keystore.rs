//! Local keystore contract
//!
//! The recovery flows never own key material directly; they ask the
//! device's keystore for the current identity and encryption secret. How
//! those are persisted (OS keychain, encrypted file, hardware) is the
//! embedding application's concern.

use x25519_dalek::{PublicKey, StaticSecret};

use crate::identity::{EncryptionKeys, Identity};

/// Access to the device's long-term key material.
pub trait Keystore {
    /// The device's signing identity, if one is provisioned.
    fn identity(&self) -> Option<Identity>;

    /// The device's long-term X25519 encryption secret, if provisioned.
    fn encryption_secret(&self) -> Option<StaticSecret>;

    /// Public half of the encryption keypair.
    fn encryption_public(&self) -> Option<PublicKey> {
        self.encryption_secret().map(|s| PublicKey::from(&s))
    }
}

/// In-memory keystore for tests and ephemeral embedding.
pub struct MemoryKeystore {
    identity: Identity,
    encryption: EncryptionKeys,
}

impl MemoryKeystore {
    pub fn new(identity: Identity, encryption: EncryptionKeys) -> Self {
        Self {
            identity,
            encryption,
        }
    }

    /// Generate a keystore with a fresh identity and encryption pair.
    pub fn generate() -> Self {
        Self {
            identity: Identity::generate(),
            encryption: EncryptionKeys::generate(),
        }
    }
}

impl Keystore for MemoryKeystore {
    fn identity(&self) -> Option<Identity> {
        Some(self.identity.clone())
    }

    fn encryption_secret(&self) -> Option<StaticSecret> {
        Some(self.encryption.secret().clone())
    }
}
