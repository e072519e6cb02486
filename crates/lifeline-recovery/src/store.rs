//! Recovery store collaborator contract
//!
//! The store persists owner configurations, brokers recovery sessions, and
//! relays sealed shards between guardians and the recovering device. It
//! only ever handles ciphertext.
//!
//! Every mutating call carries the caller's Ed25519 signature over the
//! matching canonical payload from [`crate::types`], timestamp included, so
//! the store can authenticate the caller and reject stale replays. How
//! strict the freshness window is (and when sessions expire) is store
//! policy, not protocol.

use lifeline_core::{SealedEnvelope, Signature};
use thiserror::Error;

use crate::types::{
    Handle, KeyBytes, OwnerConfiguration, PendingRequest, SessionId, SessionInfo,
    SubmissionStatus, SubmittedShard,
};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Unknown session '{0}'")]
    UnknownSession(SessionId),
    #[error("No recovery configuration for '{0}'")]
    NoConfiguration(Handle),
    #[error("Guardian '{0}' is not named in this session")]
    NotAGuardian(Handle),
    #[error("Request signature rejected")]
    SignatureRejected,
    #[error("Session has expired")]
    SessionExpired,
    #[error("Store unreachable: {0}")]
    Transport(String),
}

/// The session/shard persistence service.
#[allow(async_fn_in_trait)]
pub trait RecoveryStore {
    /// Open a recovery session for `owner`, registering the session's
    /// ephemeral public key. Returns the configured threshold and guardian
    /// list alongside the new session id.
    async fn create_session(
        &self,
        owner: &Handle,
        ephemeral_key: KeyBytes,
    ) -> Result<SessionInfo, StoreError>;

    /// Read-only submission progress. Safe to call on any timer.
    async fn get_status(&self, session: &SessionId) -> Result<SubmissionStatus, StoreError>;

    /// All shards submitted so far.
    async fn get_shards(&self, session: &SessionId) -> Result<Vec<SubmittedShard>, StoreError>;

    /// Upload an owner's recovery configuration. Replaces any previous
    /// configuration for the same owner.
    async fn put_configuration(
        &self,
        config: OwnerConfiguration,
        timestamp: u64,
        signature: Signature,
    ) -> Result<(), StoreError>;

    /// Erase the owner's configuration. Idempotent.
    async fn delete_configuration(
        &self,
        owner: &Handle,
        timestamp: u64,
        signature: Signature,
    ) -> Result<(), StoreError>;

    /// Sessions naming `guardian` that still await its shard.
    async fn list_pending_for_guardian(
        &self,
        guardian: &Handle,
        timestamp: u64,
        signature: Signature,
    ) -> Result<Vec<PendingRequest>, StoreError>;

    /// Submit (or idempotently resubmit) a guardian's re-sealed shard.
    async fn submit_shard(
        &self,
        session: &SessionId,
        guardian: &Handle,
        envelope: SealedEnvelope,
        guardian_encryption_key: KeyBytes,
        timestamp: u64,
        signature: Signature,
    ) -> Result<(), StoreError>;

    /// Best-effort completion notice from the recovering device.
    async fn mark_complete(&self, session: &SessionId) -> Result<(), StoreError>;
}
