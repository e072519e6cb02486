//! Directory collaborator contract
//!
//! Maps a handle to the keys registered for it. The directory is trusted to
//! return correct keys; authenticating directory entries is outside this
//! core (it is the registry's job).

use lifeline_core::{EncryptionPublicKey, VerifyingKey};
use thiserror::Error;

use crate::types::Handle;

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("No entry for handle '{0}'")]
    NotFound(Handle),
    #[error("Directory unreachable: {0}")]
    Transport(String),
}

/// Keys registered for one handle.
#[derive(Debug, Clone, Copy)]
pub struct DirectoryEntry {
    /// Long-term Ed25519 key requests are verified against
    pub verifying_key: VerifyingKey,
    /// X25519 key shares are sealed to
    pub encryption_key: EncryptionPublicKey,
}

/// Handle resolution service.
#[allow(async_fn_in_trait)]
pub trait Directory {
    /// Resolve a handle to its registered keys. `NotFound` is a definitive
    /// miss; `Transport` is retryable.
    async fn resolve(&self, handle: &Handle) -> Result<DirectoryEntry, DirectoryError>;
}
