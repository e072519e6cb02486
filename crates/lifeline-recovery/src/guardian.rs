//! Guardian-side flow
//!
//! A guardian never holds a share in the clear for longer than one
//! `approve` call: open the owner-sealed envelope, re-seal the same bytes
//! to the session's ephemeral key, submit, drop.

use lifeline_core::{sealed, EncryptionPublicKey, Keystore};
use lifeline_shamir::Share;
use zeroize::Zeroizing;

use crate::store::RecoveryStore;
use crate::types::{
    list_pending_signing_bytes, submit_shard_signing_bytes, unix_now, Handle, PendingRequest,
};
use crate::RecoveryError;

/// A guardian's view of the protocol.
pub struct GuardianFlow<'a, K, S> {
    handle: Handle,
    keystore: &'a K,
    store: &'a S,
}

impl<'a, K, S> GuardianFlow<'a, K, S>
where
    K: Keystore,
    S: RecoveryStore,
{
    pub fn new(handle: Handle, keystore: &'a K, store: &'a S) -> Self {
        Self {
            handle,
            keystore,
            store,
        }
    }

    /// Recovery sessions naming this guardian that still await its shard.
    pub async fn pending_requests(&self) -> Result<Vec<PendingRequest>, RecoveryError> {
        let identity = self.keystore.identity().ok_or(RecoveryError::NoIdentity)?;

        let timestamp = unix_now();
        let signature = identity.sign(&list_pending_signing_bytes(&self.handle, timestamp));
        let pending = self
            .store
            .list_pending_for_guardian(&self.handle, timestamp, signature)
            .await?;

        log::debug!(
            "guardian '{}' has {} pending recovery request(s)",
            self.handle,
            pending.len()
        );
        Ok(pending)
    }

    /// Approve one request: decrypt our original share, re-seal it to the
    /// session's ephemeral key, and submit.
    ///
    /// If the owner-sealed envelope does not authenticate (wrong key,
    /// corruption, tampering), this fails with `ShareDecryption` and the
    /// request stays pending, so it can be retried or reported.
    pub async fn approve(&self, request: &PendingRequest) -> Result<(), RecoveryError> {
        let identity = self.keystore.identity().ok_or(RecoveryError::NoIdentity)?;
        let encryption_secret = self
            .keystore
            .encryption_secret()
            .ok_or(RecoveryError::NoEncryptionKey)?;

        let owner_key = EncryptionPublicKey::from(request.owner_encryption_key);
        let plaintext = Zeroizing::new(
            sealed::open(&encryption_secret, &owner_key, &request.sealed_share)
                .map_err(|_| RecoveryError::ShareDecryption(request.owner.clone()))?,
        );

        // Parse before forwarding: a share that does not even deserialize
        // should fail here, on the guardian, not on the recovering device.
        let share: Share = serde_json::from_slice(&plaintext)?;
        log::debug!(
            "guardian '{}' approving session {} with share {}",
            self.handle,
            request.session_id,
            share.index
        );

        let session_key = EncryptionPublicKey::from(request.session_ephemeral_key);
        let envelope = sealed::seal(&encryption_secret, &session_key, &plaintext)?;

        let own_key = EncryptionPublicKey::from(&encryption_secret).to_bytes();
        let timestamp = unix_now();
        let signature = identity.sign(&submit_shard_signing_bytes(
            &request.session_id,
            &self.handle,
            &envelope,
            &own_key,
            timestamp,
        ));

        self.store
            .submit_shard(
                &request.session_id,
                &self.handle,
                envelope,
                own_key,
                timestamp,
                signature,
            )
            .await?;

        log::info!(
            "guardian '{}' submitted shard for session {}",
            self.handle,
            request.session_id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryDirectory, MemoryStore};
    use crate::owner::OwnerFlow;
    use crate::session::RecoverySession;
    use lifeline_core::MemoryKeystore;
    use std::sync::Arc;

    async fn configured_pair() -> (
        Arc<MemoryDirectory>,
        MemoryStore,
        Handle,
        MemoryKeystore,
        Vec<(Handle, MemoryKeystore)>,
    ) {
        let directory = Arc::new(MemoryDirectory::new());
        let store = MemoryStore::new(directory.clone());

        let owner = Handle::new("seedowner").unwrap();
        let owner_keys = MemoryKeystore::generate();
        directory.register_keystore(&owner, &owner_keys).unwrap();

        let mut guardians = Vec::new();
        for name in ["alice", "bob"] {
            let handle = Handle::new(name).unwrap();
            let keystore = MemoryKeystore::generate();
            directory.register_keystore(&handle, &keystore).unwrap();
            guardians.push((handle, keystore));
        }
        let handles: Vec<Handle> = guardians.iter().map(|(h, _)| h.clone()).collect();

        OwnerFlow::new(owner.clone(), &owner_keys, directory.as_ref(), &store)
            .configure(&handles, 2)
            .await
            .unwrap();

        (directory, store, owner, owner_keys, guardians)
    }

    #[tokio::test]
    async fn test_no_pending_before_any_session() {
        let (_directory, store, _owner, _owner_keys, guardians) = configured_pair().await;
        let (handle, keystore) = &guardians[0];

        let flow = GuardianFlow::new(handle.clone(), keystore, &store);
        assert!(flow.pending_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pending_appears_and_clears_on_approve() {
        let (directory, store, owner, _owner_keys, guardians) = configured_pair().await;
        let _session = RecoverySession::initiate(owner, directory.as_ref(), &store)
            .await
            .unwrap();

        let (handle, keystore) = &guardians[0];
        let flow = GuardianFlow::new(handle.clone(), keystore, &store);

        let pending = flow.pending_requests().await.unwrap();
        assert_eq!(pending.len(), 1);

        flow.approve(&pending[0]).await.unwrap();
        assert!(flow.pending_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_approve_rejects_foreign_share() {
        let (directory, store, owner, _owner_keys, guardians) = configured_pair().await;
        let _session = RecoverySession::initiate(owner, directory.as_ref(), &store)
            .await
            .unwrap();

        // Bob fetches his request but Alice tries to approve with it; her
        // secret key cannot open a share sealed to Bob.
        let (bob, bob_keys) = &guardians[1];
        let bob_pending = GuardianFlow::new(bob.clone(), bob_keys, &store)
            .pending_requests()
            .await
            .unwrap();

        let (alice, alice_keys) = &guardians[0];
        let alice_flow = GuardianFlow::new(alice.clone(), alice_keys, &store);
        let err = alice_flow.approve(&bob_pending[0]).await.unwrap_err();

        assert!(matches!(err, RecoveryError::ShareDecryption(_)));

        // Bob's request is untouched and still approvable.
        let still_pending = GuardianFlow::new(bob.clone(), bob_keys, &store)
            .pending_requests()
            .await
            .unwrap();
        assert_eq!(still_pending.len(), 1);
    }

    #[tokio::test]
    async fn test_approve_is_idempotent_on_resubmission() {
        let (directory, store, owner, _owner_keys, guardians) = configured_pair().await;
        let session = RecoverySession::initiate(owner, directory.as_ref(), &store)
            .await
            .unwrap();

        let (handle, keystore) = &guardians[0];
        let flow = GuardianFlow::new(handle.clone(), keystore, &store);
        let pending = flow.pending_requests().await.unwrap();

        flow.approve(&pending[0]).await.unwrap();
        // Same request approved twice: the store overwrites, count stays 1.
        flow.approve(&pending[0]).await.unwrap();

        let status = store.get_status(session.session_id()).await.unwrap();
        assert_eq!(status.submitted, 1);
    }
}
