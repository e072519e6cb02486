//! Lifeline Core
//!
//! Identity types and the sealing primitive shared by the recovery flows.
//!
//! # Key Roles
//!
//! Every participant holds two keypairs:
//! - **Signing** (Ed25519): the identity itself. Derived deterministically
//!   from a 32-byte seed, which is the value the recovery protocol protects.
//! - **Encryption** (X25519): used only to seal shares to other parties.
//!   Published in the directory; the recovering device additionally creates
//!   a short-lived ephemeral pair per recovery attempt.
//!
//! # Sealing
//!
//! [`sealed::seal`] is sender-authenticated public-key encryption:
//! static-static X25519 ECDH, HKDF-SHA256, AES-256-GCM with a fresh random
//! nonce. Opening with the wrong key pair, or opening tampered ciphertext,
//! fails; it never yields garbage plaintext.

pub mod identity;
pub mod keystore;
pub mod sealed;

pub use identity::{EncryptionKeys, Identity, IdentityError, Seed, SEED_LEN};
pub use keystore::{Keystore, MemoryKeystore};
pub use sealed::{open, seal, CryptoError, SealedEnvelope};

// Signature and key types are part of this crate's API surface.
pub use ed25519_dalek::{Signature, VerifyingKey};
pub use x25519_dalek::{PublicKey as EncryptionPublicKey, StaticSecret as EncryptionSecretKey};
