//! Mirrors the local ledger into the remote document store and restores
//! it back.
//!
//! The local store is the source of truth: every sync operation is
//! best-effort. A push that fails is logged and forgotten, never retried,
//! and never blocks or rolls back the local write it mirrors. When nobody
//! is signed in, every operation is a silent no-op.

use std::{path::Path, sync::Arc};

use serde::{Serialize, de::DeserializeOwned};

use crate::{
    Error,
    account::{Account, AccountId},
    payment::Payment,
    purchase::Purchase,
    remote::{BlobStore, DocumentStore, Identity},
    store::LedgerStore,
};

/// How many records each collection contributed during a restore.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    /// Accounts restored into the local store.
    pub accounts: usize,
    /// Purchases restored into the local store.
    pub purchases: usize,
    /// Payments restored into the local store.
    pub payments: usize,
}

/// Pushes ledger records to the remote document store under
/// `users/{uid}/...` and pulls them back on restore.
#[derive(Clone)]
pub struct SyncManager {
    store: LedgerStore,
    identity: Arc<dyn Identity>,
    documents: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
}

impl SyncManager {
    /// Create a sync manager over the given local store and remote
    /// collaborators.
    pub fn new(
        store: LedgerStore,
        identity: Arc<dyn Identity>,
        documents: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            store,
            identity,
            documents,
            blobs,
        }
    }

    fn user_id(&self) -> Option<String> {
        self.identity.current_user_id()
    }

    async fn push_document<T: Serialize>(&self, path: &str, record: &T) -> Result<(), Error> {
        self.documents
            .set_merged(path, serde_json::to_value(record)?)
            .await
    }

    /// Mirror an account to the remote store. Failures are logged and
    /// swallowed; signed out, this does nothing.
    pub async fn upload_account(&self, account: &Account) {
        let Some(user_id) = self.user_id() else {
            return;
        };

        let path = format!("users/{user_id}/accounts/{}", account.id);
        if let Err(error) = self.push_document(&path, account).await {
            tracing::warn!("could not push account {}: {error}", account.id);
        }
    }

    /// Mirror a purchase to the remote store. Failures are logged and
    /// swallowed; signed out, this does nothing.
    pub async fn upload_purchase(&self, purchase: &Purchase) {
        let Some(user_id) = self.user_id() else {
            return;
        };

        let path = format!("users/{user_id}/purchases/{}", purchase.id);
        if let Err(error) = self.push_document(&path, purchase).await {
            tracing::warn!("could not push purchase {}: {error}", purchase.id);
        }
    }

    /// Mirror a payment to the remote store. Failures are logged and
    /// swallowed; signed out, this does nothing.
    pub async fn upload_payment(&self, payment: &Payment) {
        let Some(user_id) = self.user_id() else {
            return;
        };

        let path = format!("users/{user_id}/payments/{}", payment.id);
        if let Err(error) = self.push_document(&path, payment).await {
            tracing::warn!("could not push payment {}: {error}", payment.id);
        }
    }

    /// Remove an account's remote document. Its purchase and payment
    /// documents stay behind; a later restore resurrects the history but
    /// not the account.
    pub async fn delete_remote_account(&self, account_id: AccountId) {
        let Some(user_id) = self.user_id() else {
            return;
        };

        let path = format!("users/{user_id}/accounts/{account_id}");
        if let Err(error) = self.documents.delete(&path).await {
            tracing::warn!("could not delete remote account {account_id}: {error}");
        }
    }

    /// Upload the image at `path` as the user's profile picture and record
    /// its URL on the remote user profile. Returns the URL, or `None` when
    /// signed out or on any failure.
    pub async fn upload_profile_image(&self, path: &Path) -> Option<String> {
        let user_id = self.user_id()?;

        match self.try_upload_profile_image(&user_id, path).await {
            Ok(url) => Some(url),
            Err(error) => {
                tracing::warn!("could not upload profile image: {error}");
                None
            }
        }
    }

    async fn try_upload_profile_image(&self, user_id: &str, path: &Path) -> Result<String, Error> {
        let bytes = tokio::fs::read(path).await?;
        let blob_path = format!("profiles/{user_id}.jpg");
        self.blobs.put(&blob_path, bytes).await?;
        let url = self.blobs.download_url(&blob_path).await?;

        let profile_path = format!("users/{user_id}");
        self.push_document(&profile_path, &serde_json::json!({ "profile_image_url": url }))
            .await?;

        Ok(url)
    }

    /// Pull every remote collection into the local store, overwriting
    /// local records that share an id with a remote one.
    ///
    /// Each collection and each record is restored independently: a
    /// malformed document or a failed fetch costs only the records it
    /// covers, never the whole restore.
    pub async fn restore_from_remote(&self) -> RestoreSummary {
        let Some(user_id) = self.user_id() else {
            return RestoreSummary::default();
        };

        RestoreSummary {
            accounts: self
                .restore_collection(
                    &format!("users/{user_id}/accounts"),
                    LedgerStore::restore_account,
                )
                .await,
            purchases: self
                .restore_collection(
                    &format!("users/{user_id}/purchases"),
                    LedgerStore::restore_purchase,
                )
                .await,
            payments: self
                .restore_collection(
                    &format!("users/{user_id}/payments"),
                    LedgerStore::restore_payment,
                )
                .await,
        }
    }

    async fn restore_collection<T: DeserializeOwned>(
        &self,
        collection: &str,
        restore: fn(&LedgerStore, &T) -> Result<(), Error>,
    ) -> usize {
        let documents = match self.documents.get_all(collection).await {
            Ok(documents) => documents,
            Err(error) => {
                tracing::warn!("could not fetch {collection}: {error}");
                return 0;
            }
        };

        let mut restored = 0;
        for document in documents {
            match serde_json::from_value::<T>(document) {
                Ok(record) => match restore(&self.store, &record) {
                    Ok(()) => restored += 1,
                    Err(error) => {
                        tracing::warn!("could not restore a record from {collection}: {error}");
                    }
                },
                Err(error) => {
                    tracing::warn!("skipping malformed document in {collection}: {error}");
                }
            }
        }

        restored
    }

    /// Delete the remote user document and the authentication identity.
    /// Returns whether both deletions succeeded; signed out, returns
    /// `false`.
    pub async fn delete_full_user_account(&self) -> bool {
        let Some(user_id) = self.user_id() else {
            return false;
        };

        if let Err(error) = self.documents.delete(&format!("users/{user_id}")).await {
            tracing::warn!("could not delete remote user document: {error}");
            return false;
        }

        if let Err(error) = self.identity.delete_current_user().await {
            tracing::warn!("could not delete authentication identity: {error}");
            return false;
        }

        true
    }
}
