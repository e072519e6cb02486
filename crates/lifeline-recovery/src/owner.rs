//! Owner-side recovery configuration
//!
//! Splits the signing seed across the chosen guardians and uploads the
//! sealed shares. Resolution happens for every guardian before anything is
//! sealed or uploaded, so a single unresolvable handle aborts the whole call
//! with nothing written.

use lifeline_core::{sealed, Keystore};
use lifeline_shamir::{audit_shares, split};

use crate::directory::{Directory, DirectoryEntry, DirectoryError};
use crate::store::RecoveryStore;
use crate::types::{
    configure_signing_bytes, disable_signing_bytes, unix_now, GuardianShare, Handle,
    OwnerConfiguration,
};
use crate::RecoveryError;

/// The identity owner's view of the protocol.
pub struct OwnerFlow<'a, K, D, S> {
    handle: Handle,
    keystore: &'a K,
    directory: &'a D,
    store: &'a S,
}

impl<'a, K, D, S> OwnerFlow<'a, K, D, S>
where
    K: Keystore,
    D: Directory,
    S: RecoveryStore,
{
    pub fn new(handle: Handle, keystore: &'a K, directory: &'a D, store: &'a S) -> Self {
        Self {
            handle,
            keystore,
            directory,
            store,
        }
    }

    /// Enable recovery: split the seed `threshold`-of-`guardians.len()`,
    /// seal one share per guardian, sign and upload the set.
    ///
    /// Directory misses are fatal and atomic: no partial configuration is
    /// ever uploaded. Store failures are retryable; the call can simply be
    /// repeated.
    pub async fn configure(
        &self,
        guardians: &[Handle],
        threshold: u8,
    ) -> Result<(), RecoveryError> {
        let share_count = u8::try_from(guardians.len())
            .map_err(|_| RecoveryError::TooManyGuardians(guardians.len()))?;

        if let Some(dup) = first_duplicate(guardians) {
            return Err(RecoveryError::DuplicateGuardian(dup.clone()));
        }

        let identity = self.keystore.identity().ok_or(RecoveryError::NoIdentity)?;
        let encryption_secret = self
            .keystore
            .encryption_secret()
            .ok_or(RecoveryError::NoEncryptionKey)?;

        // Resolve every guardian up front; only then touch the seed.
        let mut entries: Vec<(&Handle, DirectoryEntry)> = Vec::with_capacity(guardians.len());
        for guardian in guardians {
            let entry = self.directory.resolve(guardian).await.map_err(|e| match e {
                DirectoryError::NotFound(handle) => RecoveryError::GuardianNotFound(handle),
                other => RecoveryError::Directory(other),
            })?;
            entries.push((guardian, entry));
        }

        let seed = identity.seed();
        let shares = split(seed.as_bytes(), share_count, threshold)?;
        audit_shares(&shares, threshold as usize)?;

        let mut guardian_shares = Vec::with_capacity(shares.len());
        for (share, (guardian, entry)) in shares.iter().zip(&entries) {
            let plaintext = serde_json::to_vec(share)?;
            let envelope = sealed::seal(&encryption_secret, &entry.encryption_key, &plaintext)?;
            log::debug!("sealed share {} for guardian '{}'", share.index, guardian);
            guardian_shares.push(GuardianShare {
                guardian: (*guardian).clone(),
                sealed_share: envelope,
            });
        }

        let config = OwnerConfiguration {
            owner: self.handle.clone(),
            threshold,
            owner_encryption_key: lifeline_core::EncryptionPublicKey::from(&encryption_secret)
                .to_bytes(),
            shares: guardian_shares,
            created_at: unix_now(),
        };

        let timestamp = unix_now();
        let signature = identity.sign(&configure_signing_bytes(&config, timestamp));
        self.store
            .put_configuration(config, timestamp, signature)
            .await?;

        log::info!(
            "recovery configured for '{}': {}-of-{} guardians",
            self.handle,
            threshold,
            share_count
        );
        Ok(())
    }

    /// Disable recovery: instruct the store to erase all stored shares for
    /// this identity. Idempotent: disabling twice is not an error.
    pub async fn disable(&self) -> Result<(), RecoveryError> {
        let identity = self.keystore.identity().ok_or(RecoveryError::NoIdentity)?;

        let timestamp = unix_now();
        let signature = identity.sign(&disable_signing_bytes(&self.handle, timestamp));
        self.store
            .delete_configuration(&self.handle, timestamp, signature)
            .await?;

        log::info!("recovery disabled for '{}'", self.handle);
        Ok(())
    }
}

fn first_duplicate(guardians: &[Handle]) -> Option<&Handle> {
    for (i, guardian) in guardians.iter().enumerate() {
        if guardians[..i].contains(guardian) {
            return Some(guardian);
        }
    }
    None
}
