//! Lifeline Recovery Module
//!
//! Restores a signing identity on a new device by gathering seed shares
//! from trusted guardians. No central party, not even the store that
//! relays ciphertexts, ever sees the seed or any individual share in the
//! clear.
//!
//! # Three Flows
//!
//! ## Owner ([`owner::OwnerFlow`])
//! Splits the signing seed T-of-N, seals one share to each guardian's
//! encryption key, and uploads the sealed set to the recovery store.
//!
//! ## Recovering Device ([`session::RecoverySession`])
//! Generates an ephemeral keypair, opens a session, polls until enough
//! guardians have responded, then decrypts the re-sealed shards, combines
//! the shares, and rebuilds the identity.
//!
//! ## Guardian ([`guardian::GuardianFlow`])
//! Lists recovery requests naming it, opens its original share against the
//! owner's key, re-seals it to the session's ephemeral key, and submits.
//!
//! The store and directory are collaborator contracts ([`store::RecoveryStore`],
//! [`directory::Directory`]); [`memory`] has in-process implementations used
//! by the integration tests and suitable for embedding.

pub mod config;
pub mod directory;
pub mod guardian;
pub mod memory;
pub mod owner;
pub mod session;
pub mod store;
pub mod types;

// Re-exports
pub use config::PollConfig;
pub use directory::{Directory, DirectoryEntry, DirectoryError};
pub use guardian::GuardianFlow;
pub use owner::OwnerFlow;
pub use session::RecoverySession;
pub use store::{RecoveryStore, StoreError};
pub use types::{Handle, SessionId, SessionState};

use lifeline_core::{CryptoError, IdentityError};
use lifeline_shamir::ShamirError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("Invalid handle '{handle}': {reason}")]
    InvalidHandle { handle: String, reason: String },
    #[error("Guardian '{0}' not found in the directory")]
    GuardianNotFound(Handle),
    #[error("Guardian '{0}' listed more than once")]
    DuplicateGuardian(Handle),
    #[error("Too many guardians: {0} (maximum 255)")]
    TooManyGuardians(usize),
    #[error("No identity provisioned in the local keystore")]
    NoIdentity,
    #[error("No encryption key provisioned in the local keystore")]
    NoEncryptionKey,
    #[error("Shard from guardian '{0}' failed to decrypt")]
    ShardDecryption(Handle),
    #[error("Share sealed by owner '{0}' failed to decrypt")]
    ShareDecryption(Handle),
    #[error("Only {have} usable shards, need {needed}")]
    InsufficientShards { have: usize, needed: usize },
    #[error("Rebuilt key does not match the identity on record")]
    IdentityMismatch,
    #[error("Session is {0:?}; operation not allowed")]
    InvalidState(SessionState),
    #[error("Gave up waiting: {submitted}/{threshold} submissions after {attempts} polls")]
    Timeout {
        submitted: usize,
        threshold: u8,
        attempts: u32,
    },
    #[error(transparent)]
    Shamir(#[from] ShamirError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Wire encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}
