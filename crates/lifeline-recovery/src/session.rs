//! Recovering-device session flow
//!
//! Drives a session from `initiate` through polling to `complete`. The
//! ephemeral secret key lives only inside this object and is never
//! serialized; dropping the session abandons the attempt with no side
//! effects beyond whatever the store already holds.
//!
//! `complete` owns the two guards the combiner cannot provide itself:
//! the usable-shard count is checked against the threshold before any
//! interpolation, and the rebuilt verifying key must match the owner's
//! directory entry before the seed is accepted.

use lifeline_core::{sealed, EncryptionKeys, EncryptionPublicKey, Identity, Seed};
use lifeline_shamir::{combine, Share};
use zeroize::Zeroizing;

use crate::config::PollConfig;
use crate::directory::Directory;
use crate::store::{RecoveryStore, StoreError};
use crate::types::{Handle, SessionId, SessionInfo, SessionState, SubmissionStatus};
use crate::RecoveryError;

/// A recovery attempt in progress on the new device.
pub struct RecoverySession<'a, D, S> {
    directory: &'a D,
    store: &'a S,
    owner: Handle,
    info: SessionInfo,
    ephemeral: EncryptionKeys,
    state: SessionState,
}

impl<'a, D, S> RecoverySession<'a, D, S>
where
    D: Directory,
    S: RecoveryStore,
{
    /// Open a session to recover `owner`'s identity. Generates the
    /// ephemeral keypair and registers its public half with the store.
    pub async fn initiate(
        owner: Handle,
        directory: &'a D,
        store: &'a S,
    ) -> Result<RecoverySession<'a, D, S>, RecoveryError> {
        let ephemeral = EncryptionKeys::generate();
        let info = store
            .create_session(&owner, ephemeral.public().to_bytes())
            .await?;

        log::info!(
            "recovery session {} opened for '{}': need {} of {} guardians",
            info.session_id,
            owner,
            info.threshold,
            info.guardians.len()
        );

        Ok(Self {
            directory,
            store,
            owner,
            info,
            ephemeral,
            state: SessionState::Initiated,
        })
    }

    pub fn session_id(&self) -> &SessionId {
        &self.info.session_id
    }

    pub fn threshold(&self) -> u8 {
        self.info.threshold
    }

    pub fn guardians(&self) -> &[Handle] {
        &self.info.guardians
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// One read-only status probe. Advances the client-side state to
    /// `Collecting`/`Ready` as submissions appear; never mutates the store.
    pub async fn poll_status(&mut self) -> Result<SubmissionStatus, RecoveryError> {
        self.ensure_active()?;

        let status = match self.store.get_status(&self.info.session_id).await {
            Err(StoreError::SessionExpired) => {
                self.state = SessionState::Expired;
                return Err(StoreError::SessionExpired.into());
            }
            other => other?,
        };

        if status.ready {
            self.state = SessionState::Ready;
        } else if status.submitted > 0 {
            self.state = SessionState::Collecting;
        }

        Ok(status)
    }

    /// Poll until the store reports the threshold reached, pacing probes
    /// per `poll`. Fails with `Timeout` once the attempt budget is spent;
    /// the session stays resumable.
    pub async fn await_ready(
        &mut self,
        poll: &PollConfig,
    ) -> Result<SubmissionStatus, RecoveryError> {
        let mut last = SubmissionStatus {
            submitted: 0,
            threshold: self.info.threshold,
            ready: false,
        };

        for attempt in 1..=poll.max_attempts {
            last = self.poll_status().await?;
            if last.ready {
                log::info!(
                    "session {} ready: {}/{} submissions",
                    self.info.session_id,
                    last.submitted,
                    last.threshold
                );
                return Ok(last);
            }

            log::debug!(
                "session {} poll {}/{}: {}/{} submissions",
                self.info.session_id,
                attempt,
                poll.max_attempts,
                last.submitted,
                last.threshold
            );

            if attempt < poll.max_attempts {
                tokio::time::sleep(poll.interval()).await;
            }
        }

        Err(RecoveryError::Timeout {
            submitted: last.submitted,
            threshold: last.threshold,
            attempts: poll.max_attempts,
        })
    }

    /// Fetch the submitted shards, rebuild the seed, and derive the
    /// identity.
    ///
    /// Any shard that fails to open fails the whole call with
    /// `ShardDecryption` naming the guardian; retry with
    /// [`complete_excluding`](Self::complete_excluding) to drop known-bad
    /// submissions, provided enough remain.
    pub async fn complete(&mut self) -> Result<Identity, RecoveryError> {
        self.complete_excluding(&[]).await
    }

    /// [`complete`](Self::complete), skipping shards from `excluded`
    /// guardians.
    pub async fn complete_excluding(
        &mut self,
        excluded: &[Handle],
    ) -> Result<Identity, RecoveryError> {
        self.ensure_active()?;

        let shards = self.store.get_shards(&self.info.session_id).await?;
        let threshold = self.info.threshold as usize;

        let mut shares: Vec<Share> = Vec::with_capacity(shards.len());
        for shard in shards.iter().filter(|s| !excluded.contains(&s.guardian)) {
            let guardian_key = EncryptionPublicKey::from(shard.guardian_encryption_key);
            let plaintext = Zeroizing::new(
                sealed::open(self.ephemeral.secret(), &guardian_key, &shard.envelope)
                    .map_err(|_| RecoveryError::ShardDecryption(shard.guardian.clone()))?,
            );
            shares.push(serde_json::from_slice(&plaintext)?);
        }

        // The combiner cannot tell an undersized set from a complete one;
        // this count check is the only thing standing between the caller
        // and a silently wrong seed.
        if shares.len() < threshold {
            return Err(RecoveryError::InsufficientShards {
                have: shares.len(),
                needed: threshold,
            });
        }

        let seed_bytes = Zeroizing::new(combine(&shares)?);
        let seed = Seed::from_bytes(&seed_bytes)?;
        let identity = Identity::from_seed(&seed);

        // Second guard: the rebuilt key must be the one the directory has
        // on record for the owner.
        let entry = self.directory.resolve(&self.owner).await?;
        if identity.verifying_key() != entry.verifying_key {
            return Err(RecoveryError::IdentityMismatch);
        }

        if let Err(e) = self.store.mark_complete(&self.info.session_id).await {
            // Local success stands; the store will expire the session.
            log::warn!(
                "session {} completed locally but store notification failed: {}",
                self.info.session_id,
                e
            );
        }

        self.state = SessionState::Completed;
        log::info!(
            "session {} completed: identity for '{}' recovered",
            self.info.session_id,
            self.owner
        );
        Ok(identity)
    }

    /// Walk away from the attempt. Purely local: the server-side session
    /// keeps collecting until it expires, and a later `initiate` starts
    /// over with a fresh ephemeral key.
    pub fn abandon(&mut self) {
        self.state = SessionState::Abandoned;
    }

    fn ensure_active(&self) -> Result<(), RecoveryError> {
        match self.state {
            SessionState::Completed
            | SessionState::Expired
            | SessionState::Abandoned => Err(RecoveryError::InvalidState(self.state)),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guardian::GuardianFlow;
    use crate::memory::{MemoryDirectory, MemoryStore};
    use crate::owner::OwnerFlow;
    use lifeline_core::{Keystore, MemoryKeystore};
    use std::sync::Arc;

    struct Fixture {
        directory: Arc<MemoryDirectory>,
        store: MemoryStore,
        owner: Handle,
        owner_keys: MemoryKeystore,
        guardians: Vec<(Handle, MemoryKeystore)>,
    }

    async fn fixture(guardian_names: &[&str], threshold: u8) -> Fixture {
        let directory = Arc::new(MemoryDirectory::new());
        let store = MemoryStore::new(directory.clone());

        let owner = Handle::new("seedowner").unwrap();
        let owner_keys = MemoryKeystore::generate();
        directory.register_keystore(&owner, &owner_keys).unwrap();

        let mut guardians = Vec::new();
        for name in guardian_names {
            let handle = Handle::new(name).unwrap();
            let keystore = MemoryKeystore::generate();
            directory.register_keystore(&handle, &keystore).unwrap();
            guardians.push((handle, keystore));
        }

        let handles: Vec<Handle> = guardians.iter().map(|(h, _)| h.clone()).collect();
        OwnerFlow::new(owner.clone(), &owner_keys, directory.as_ref(), &store)
            .configure(&handles, threshold)
            .await
            .unwrap();

        Fixture {
            directory,
            store,
            owner,
            owner_keys,
            guardians,
        }
    }

    async fn approve_as(fixture: &Fixture, index: usize) {
        let (handle, keystore) = &fixture.guardians[index];
        let flow = GuardianFlow::new(handle.clone(), keystore, &fixture.store);
        let pending = flow.pending_requests().await.unwrap();
        assert_eq!(pending.len(), 1, "guardian '{handle}' should see one request");
        flow.approve(&pending[0]).await.unwrap();
    }

    #[tokio::test]
    async fn test_initiate_reports_configuration() {
        let fx = fixture(&["alice", "bob", "carol"], 2).await;
        let session =
            RecoverySession::initiate(fx.owner.clone(), fx.directory.as_ref(), &fx.store)
                .await
                .unwrap();

        assert_eq!(session.threshold(), 2);
        assert_eq!(session.guardians().len(), 3);
        assert_eq!(session.state(), SessionState::Initiated);
    }

    #[tokio::test]
    async fn test_initiate_without_configuration_fails() {
        let directory = Arc::new(MemoryDirectory::new());
        let store = MemoryStore::new(directory.clone());
        let owner = Handle::new("nobody_home").unwrap();

        let result = RecoverySession::initiate(owner, directory.as_ref(), &store).await;
        assert!(matches!(
            result,
            Err(RecoveryError::Store(StoreError::NoConfiguration(_)))
        ));
    }

    #[tokio::test]
    async fn test_poll_tracks_submissions() {
        let fx = fixture(&["alice", "bob", "carol"], 2).await;
        let mut session =
            RecoverySession::initiate(fx.owner.clone(), fx.directory.as_ref(), &fx.store)
                .await
                .unwrap();

        let status = session.poll_status().await.unwrap();
        assert_eq!(status.submitted, 0);
        assert!(!status.ready);

        approve_as(&fx, 0).await;
        let status = session.poll_status().await.unwrap();
        assert_eq!(status.submitted, 1);
        assert_eq!(session.state(), SessionState::Collecting);

        approve_as(&fx, 1).await;
        let status = session.poll_status().await.unwrap();
        assert!(status.ready);
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_complete_rebuilds_identity() {
        let fx = fixture(&["alice", "bob", "carol"], 2).await;
        let mut session =
            RecoverySession::initiate(fx.owner.clone(), fx.directory.as_ref(), &fx.store)
                .await
                .unwrap();

        approve_as(&fx, 0).await;
        approve_as(&fx, 2).await;

        let identity = session.complete().await.unwrap();
        let original = fx.owner_keys.identity().unwrap();
        assert_eq!(identity.verifying_key(), original.verifying_key());
        assert_eq!(identity.seed(), original.seed());
        assert_eq!(session.state(), SessionState::Completed);
    }

    #[tokio::test]
    async fn test_complete_under_threshold_is_refused() {
        let fx = fixture(&["alice", "bob", "carol"], 2).await;
        let mut session =
            RecoverySession::initiate(fx.owner.clone(), fx.directory.as_ref(), &fx.store)
                .await
                .unwrap();

        approve_as(&fx, 1).await;

        let err = session.complete().await.unwrap_err();
        assert!(matches!(
            err,
            RecoveryError::InsufficientShards { have: 1, needed: 2 }
        ));
        // The failed attempt is not terminal; more approvals can land.
        approve_as(&fx, 0).await;
        session.complete().await.unwrap();
    }

    #[tokio::test]
    async fn test_completed_session_is_terminal() {
        let fx = fixture(&["alice", "bob", "carol"], 2).await;
        let mut session =
            RecoverySession::initiate(fx.owner.clone(), fx.directory.as_ref(), &fx.store)
                .await
                .unwrap();

        approve_as(&fx, 0).await;
        approve_as(&fx, 1).await;
        session.complete().await.unwrap();

        assert!(matches!(
            session.complete().await,
            Err(RecoveryError::InvalidState(SessionState::Completed))
        ));
        assert!(matches!(
            session.poll_status().await,
            Err(RecoveryError::InvalidState(SessionState::Completed))
        ));
    }

    #[tokio::test]
    async fn test_abandon_is_local_only() {
        let fx = fixture(&["alice", "bob", "carol"], 2).await;
        let mut session =
            RecoverySession::initiate(fx.owner.clone(), fx.directory.as_ref(), &fx.store)
                .await
                .unwrap();
        let id = session.session_id().clone();

        session.abandon();
        assert_eq!(session.state(), SessionState::Abandoned);
        assert!(session.poll_status().await.is_err());

        // The store still has the session; guardians can keep submitting.
        approve_as(&fx, 0).await;
        let status = fx.store.get_status(&id).await.unwrap();
        assert_eq!(status.submitted, 1);
    }

    #[tokio::test]
    async fn test_expired_session_surfaces_state() {
        let fx = fixture(&["alice", "bob", "carol"], 2).await;
        let mut session =
            RecoverySession::initiate(fx.owner.clone(), fx.directory.as_ref(), &fx.store)
                .await
                .unwrap();

        fx.store.expire_session(session.session_id());

        assert!(matches!(
            session.poll_status().await,
            Err(RecoveryError::Store(StoreError::SessionExpired))
        ));
        assert_eq!(session.state(), SessionState::Expired);
    }

    #[tokio::test]
    async fn test_await_ready_times_out_quietly_short_of_threshold() {
        let fx = fixture(&["alice", "bob", "carol"], 2).await;
        let mut session =
            RecoverySession::initiate(fx.owner.clone(), fx.directory.as_ref(), &fx.store)
                .await
                .unwrap();

        approve_as(&fx, 0).await;

        let poll = PollConfig {
            interval_secs: 0,
            max_attempts: 3,
        };
        let err = session.await_ready(&poll).await.unwrap_err();
        assert!(matches!(
            err,
            RecoveryError::Timeout {
                submitted: 1,
                threshold: 2,
                attempts: 3,
            }
        ));
    }

    #[tokio::test]
    async fn test_await_ready_returns_once_threshold_met() {
        let fx = fixture(&["alice", "bob"], 2).await;
        let mut session =
            RecoverySession::initiate(fx.owner.clone(), fx.directory.as_ref(), &fx.store)
                .await
                .unwrap();

        approve_as(&fx, 0).await;
        approve_as(&fx, 1).await;

        let poll = PollConfig {
            interval_secs: 0,
            max_attempts: 5,
        };
        let status = session.await_ready(&poll).await.unwrap();
        assert!(status.ready);
        assert_eq!(session.state(), SessionState::Ready);
    }
}
