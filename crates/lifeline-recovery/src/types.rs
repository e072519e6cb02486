//! Protocol types shared by the three flows and the collaborator contracts.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use lifeline_core::SealedEnvelope;
use serde::{Deserialize, Serialize};

use crate::RecoveryError;

/// Raw 32-byte key material as carried on the wire. Which curve it belongs
/// to depends on the field: verifying keys are Ed25519, encryption keys are
/// X25519.
pub type KeyBytes = [u8; 32];

/// A validated participant handle.
///
/// Same rules the key registry enforces: 3-20 characters, ASCII letters,
/// digits, or underscore, matched case-insensitively. Normalized to
/// lowercase on construction so two spellings of one handle cannot name
/// different guardians.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Handle(String);

impl Handle {
    pub fn new(raw: &str) -> Result<Self, RecoveryError> {
        let normalized = raw.to_lowercase();
        if normalized.len() < 3 || normalized.len() > 20 {
            return Err(RecoveryError::InvalidHandle {
                handle: raw.to_string(),
                reason: "must be 3-20 characters".into(),
            });
        }
        if !normalized
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(RecoveryError::InvalidHandle {
                handle: raw.to_string(),
                reason: "only letters, digits, and underscores allowed".into(),
            });
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Handle {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Handle::new(&value).map_err(|e| e.to_string())
    }
}

impl From<Handle> for String {
    fn from(handle: Handle) -> Self {
        handle.0
    }
}

/// Store-assigned session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client-side view of a recovery session's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Session opened, no submissions seen yet
    Initiated,
    /// At least one guardian has submitted
    Collecting,
    /// Submissions reached the threshold
    Ready,
    /// Seed reconstructed and verified (terminal)
    Completed,
    /// The store timed the session out (terminal)
    Expired,
    /// The user walked away; the server-side session may still be resumed
    /// by a fresh `initiate` (terminal for this object)
    Abandoned,
}

/// One guardian's sealed share inside an owner configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardianShare {
    pub guardian: Handle,
    /// Share sealed owner → guardian
    pub sealed_share: SealedEnvelope,
}

/// Everything the owner uploads when enabling recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerConfiguration {
    pub owner: Handle,
    pub threshold: u8,
    /// Owner's X25519 public key; guardians open their share against it
    pub owner_encryption_key: KeyBytes,
    pub shares: Vec<GuardianShare>,
    /// Unix timestamp of creation
    pub created_at: u64,
}

/// What `create_session` hands back to the recovering device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub threshold: u8,
    pub guardians: Vec<Handle>,
}

/// Read-only submission progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionStatus {
    pub submitted: usize,
    pub threshold: u8,
    pub ready: bool,
}

/// One guardian's re-sealed shard as stored for the recovering device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedShard {
    pub guardian: Handle,
    /// Share re-sealed guardian → session ephemeral key
    pub envelope: SealedEnvelope,
    /// The guardian's X25519 public key, needed to open the envelope
    pub guardian_encryption_key: KeyBytes,
}

/// A recovery request as seen by a guardian.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub session_id: SessionId,
    pub owner: Handle,
    /// Owner's X25519 public key the original share was sealed under
    pub owner_encryption_key: KeyBytes,
    /// This guardian's share, still sealed owner → guardian
    pub sealed_share: SealedEnvelope,
    /// The recovering session's ephemeral public key to re-seal to
    pub session_ephemeral_key: KeyBytes,
}

/// Current Unix time in seconds. Mutating store requests embed this so the
/// store can enforce freshness; the tolerance policy is the store's.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Canonical signing payloads
//
// Every mutating request is signed over a context tag, the timestamp, and
// the request fields, each length-prefixed so no two field sequences can
// collide. Flows and stores must build these bytes the same way; that is
// the whole contract.
// ---------------------------------------------------------------------------

const CONFIGURE_CONTEXT: &[u8] = b"lifeline/configure/v1";
const DISABLE_CONTEXT: &[u8] = b"lifeline/disable/v1";
const LIST_PENDING_CONTEXT: &[u8] = b"lifeline/list-pending/v1";
const SUBMIT_SHARD_CONTEXT: &[u8] = b"lifeline/submit-shard/v1";

fn assemble(context: &[u8], timestamp: u64, fields: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(
        context.len() + 8 + fields.iter().map(|f| f.len() + 4).sum::<usize>(),
    );
    out.extend_from_slice(context);
    out.extend_from_slice(&timestamp.to_be_bytes());
    for field in fields {
        out.extend_from_slice(&(field.len() as u32).to_be_bytes());
        out.extend_from_slice(field);
    }
    out
}

/// Bytes the owner signs when uploading a configuration.
pub fn configure_signing_bytes(config: &OwnerConfiguration, timestamp: u64) -> Vec<u8> {
    let mut fields: Vec<Vec<u8>> = vec![
        config.owner.as_str().into(),
        vec![config.threshold],
        config.owner_encryption_key.to_vec(),
    ];
    for share in &config.shares {
        fields.push(share.guardian.as_str().into());
        fields.push(share.sealed_share.to_bytes());
    }
    let refs: Vec<&[u8]> = fields.iter().map(Vec::as_slice).collect();
    assemble(CONFIGURE_CONTEXT, timestamp, &refs)
}

/// Bytes the owner signs when erasing its configuration.
pub fn disable_signing_bytes(owner: &Handle, timestamp: u64) -> Vec<u8> {
    assemble(DISABLE_CONTEXT, timestamp, &[owner.as_str().as_bytes()])
}

/// Bytes a guardian signs when listing its pending requests.
pub fn list_pending_signing_bytes(guardian: &Handle, timestamp: u64) -> Vec<u8> {
    assemble(
        LIST_PENDING_CONTEXT,
        timestamp,
        &[guardian.as_str().as_bytes()],
    )
}

/// Bytes a guardian signs when submitting a re-sealed shard.
pub fn submit_shard_signing_bytes(
    session: &SessionId,
    guardian: &Handle,
    envelope: &SealedEnvelope,
    guardian_encryption_key: &KeyBytes,
    timestamp: u64,
) -> Vec<u8> {
    let envelope_bytes = envelope.to_bytes();
    assemble(
        SUBMIT_SHARD_CONTEXT,
        timestamp,
        &[
            session.0.as_bytes(),
            guardian.as_str().as_bytes(),
            &envelope_bytes,
            guardian_encryption_key,
        ],
    )
}
