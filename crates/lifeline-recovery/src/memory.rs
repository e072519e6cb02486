//! In-process directory and store
//!
//! Reference implementations of the collaborator contracts, used by the
//! integration tests and suitable for embedding a whole protocol run in one
//! process. The store enforces the rules a production store would: mutating
//! requests must carry a valid signature from the caller's registered key,
//! shard resubmission is an idempotent overwrite, and expired or completed
//! sessions stop accepting traffic.
//!
//! Timestamps on signed requests are carried but not bounded here;
//! freshness policy belongs to a real deployment.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use ed25519_dalek::Verifier;
use lifeline_core::{
    EncryptionPublicKey, Keystore, SealedEnvelope, Signature, VerifyingKey,
};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::directory::{Directory, DirectoryEntry, DirectoryError};
use crate::store::{RecoveryStore, StoreError};
use crate::types::{
    configure_signing_bytes, disable_signing_bytes, list_pending_signing_bytes,
    submit_shard_signing_bytes, Handle, KeyBytes, OwnerConfiguration, PendingRequest, SessionId,
    SessionInfo, SubmissionStatus, SubmittedShard,
};
use crate::RecoveryError;

/// In-memory handle directory.
#[derive(Default)]
pub struct MemoryDirectory {
    entries: Mutex<HashMap<Handle, DirectoryEntry>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the keys for a handle.
    pub fn register(
        &self,
        handle: &Handle,
        verifying_key: VerifyingKey,
        encryption_key: EncryptionPublicKey,
    ) {
        self.lock().insert(
            handle.clone(),
            DirectoryEntry {
                verifying_key,
                encryption_key,
            },
        );
    }

    /// Register a handle straight from a keystore.
    pub fn register_keystore<K: Keystore>(
        &self,
        handle: &Handle,
        keystore: &K,
    ) -> Result<(), RecoveryError> {
        let identity = keystore.identity().ok_or(RecoveryError::NoIdentity)?;
        let encryption_key = keystore
            .encryption_public()
            .ok_or(RecoveryError::NoEncryptionKey)?;
        self.register(handle, identity.verifying_key(), encryption_key);
        Ok(())
    }

    fn entry(&self, handle: &Handle) -> Option<DirectoryEntry> {
        self.lock().get(handle).copied()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Handle, DirectoryEntry>> {
        self.entries.lock().expect("directory lock poisoned")
    }
}

impl Directory for MemoryDirectory {
    async fn resolve(&self, handle: &Handle) -> Result<DirectoryEntry, DirectoryError> {
        self.entry(handle)
            .ok_or_else(|| DirectoryError::NotFound(handle.clone()))
    }
}

/// One live session. Configuration data is snapshotted at creation so a
/// later `delete_configuration` cannot strand a recovery already underway.
struct StoredSession {
    owner: Handle,
    threshold: u8,
    ephemeral_key: KeyBytes,
    owner_encryption_key: KeyBytes,
    /// guardian -> owner-sealed share
    shares: HashMap<Handle, SealedEnvelope>,
    /// guardian -> re-sealed shard
    submitted: HashMap<Handle, SubmittedShard>,
    complete: bool,
    expired: bool,
}

#[derive(Default)]
struct StoreState {
    configurations: HashMap<Handle, OwnerConfiguration>,
    sessions: HashMap<SessionId, StoredSession>,
}

/// In-memory recovery store.
pub struct MemoryStore {
    directory: Arc<MemoryDirectory>,
    state: Mutex<StoreState>,
}

impl MemoryStore {
    /// The store authenticates callers against the same directory the
    /// participants use.
    pub fn new(directory: Arc<MemoryDirectory>) -> Self {
        Self {
            directory,
            state: Mutex::new(StoreState::default()),
        }
    }

    /// The stored configuration for an owner, if any. Test support.
    pub fn configuration(&self, owner: &Handle) -> Option<OwnerConfiguration> {
        self.lock().configurations.get(owner).cloned()
    }

    /// Force-expire a session, as a store's timeout sweep would.
    pub fn expire_session(&self, session: &SessionId) {
        if let Some(stored) = self.lock().sessions.get_mut(session) {
            stored.expired = true;
        }
    }

    fn verify(
        &self,
        signer: &Handle,
        message: &[u8],
        signature: &Signature,
    ) -> Result<(), StoreError> {
        let entry = self
            .directory
            .entry(signer)
            .ok_or(StoreError::SignatureRejected)?;
        entry
            .verifying_key
            .verify(message, signature)
            .map_err(|_| StoreError::SignatureRejected)
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().expect("store lock poisoned")
    }
}

impl RecoveryStore for MemoryStore {
    async fn create_session(
        &self,
        owner: &Handle,
        ephemeral_key: KeyBytes,
    ) -> Result<SessionInfo, StoreError> {
        let mut state = self.lock();
        let config = state
            .configurations
            .get(owner)
            .ok_or_else(|| StoreError::NoConfiguration(owner.clone()))?;

        let mut id_bytes = [0u8; 16];
        OsRng.fill_bytes(&mut id_bytes);
        let session_id = SessionId(hex::encode(id_bytes));

        let guardians: Vec<Handle> = config.shares.iter().map(|s| s.guardian.clone()).collect();
        let stored = StoredSession {
            owner: owner.clone(),
            threshold: config.threshold,
            ephemeral_key,
            owner_encryption_key: config.owner_encryption_key,
            shares: config
                .shares
                .iter()
                .map(|s| (s.guardian.clone(), s.sealed_share.clone()))
                .collect(),
            submitted: HashMap::new(),
            complete: false,
            expired: false,
        };
        let info = SessionInfo {
            session_id: session_id.clone(),
            threshold: stored.threshold,
            guardians,
        };
        state.sessions.insert(session_id, stored);

        Ok(info)
    }

    async fn get_status(&self, session: &SessionId) -> Result<SubmissionStatus, StoreError> {
        let state = self.lock();
        let stored = state
            .sessions
            .get(session)
            .ok_or_else(|| StoreError::UnknownSession(session.clone()))?;
        if stored.expired {
            return Err(StoreError::SessionExpired);
        }

        let submitted = stored.submitted.len();
        Ok(SubmissionStatus {
            submitted,
            threshold: stored.threshold,
            ready: submitted >= stored.threshold as usize,
        })
    }

    async fn get_shards(&self, session: &SessionId) -> Result<Vec<SubmittedShard>, StoreError> {
        let state = self.lock();
        let stored = state
            .sessions
            .get(session)
            .ok_or_else(|| StoreError::UnknownSession(session.clone()))?;
        if stored.expired {
            return Err(StoreError::SessionExpired);
        }

        Ok(stored.submitted.values().cloned().collect())
    }

    async fn put_configuration(
        &self,
        config: OwnerConfiguration,
        timestamp: u64,
        signature: Signature,
    ) -> Result<(), StoreError> {
        self.verify(
            &config.owner,
            &configure_signing_bytes(&config, timestamp),
            &signature,
        )?;

        self.lock()
            .configurations
            .insert(config.owner.clone(), config);
        Ok(())
    }

    async fn delete_configuration(
        &self,
        owner: &Handle,
        timestamp: u64,
        signature: Signature,
    ) -> Result<(), StoreError> {
        self.verify(owner, &disable_signing_bytes(owner, timestamp), &signature)?;

        // Idempotent: deleting a missing configuration is fine.
        self.lock().configurations.remove(owner);
        Ok(())
    }

    async fn list_pending_for_guardian(
        &self,
        guardian: &Handle,
        timestamp: u64,
        signature: Signature,
    ) -> Result<Vec<PendingRequest>, StoreError> {
        self.verify(
            guardian,
            &list_pending_signing_bytes(guardian, timestamp),
            &signature,
        )?;

        let state = self.lock();
        let pending = state
            .sessions
            .iter()
            .filter(|(_, s)| !s.complete && !s.expired)
            .filter(|(_, s)| !s.submitted.contains_key(guardian))
            .filter_map(|(id, s)| {
                s.shares.get(guardian).map(|sealed_share| PendingRequest {
                    session_id: id.clone(),
                    owner: s.owner.clone(),
                    owner_encryption_key: s.owner_encryption_key,
                    sealed_share: sealed_share.clone(),
                    session_ephemeral_key: s.ephemeral_key,
                })
            })
            .collect();

        Ok(pending)
    }

    async fn submit_shard(
        &self,
        session: &SessionId,
        guardian: &Handle,
        envelope: SealedEnvelope,
        guardian_encryption_key: KeyBytes,
        timestamp: u64,
        signature: Signature,
    ) -> Result<(), StoreError> {
        self.verify(
            guardian,
            &submit_shard_signing_bytes(
                session,
                guardian,
                &envelope,
                &guardian_encryption_key,
                timestamp,
            ),
            &signature,
        )?;

        let mut state = self.lock();
        let stored = state
            .sessions
            .get_mut(session)
            .ok_or_else(|| StoreError::UnknownSession(session.clone()))?;
        if stored.expired || stored.complete {
            return Err(StoreError::SessionExpired);
        }
        if !stored.shares.contains_key(guardian) {
            return Err(StoreError::NotAGuardian(guardian.clone()));
        }

        // Resubmission is an idempotent overwrite.
        stored.submitted.insert(
            guardian.clone(),
            SubmittedShard {
                guardian: guardian.clone(),
                envelope,
                guardian_encryption_key,
            },
        );
        Ok(())
    }

    async fn mark_complete(&self, session: &SessionId) -> Result<(), StoreError> {
        let mut state = self.lock();
        let stored = state
            .sessions
            .get_mut(session)
            .ok_or_else(|| StoreError::UnknownSession(session.clone()))?;
        stored.complete = true;
        Ok(())
    }
}
