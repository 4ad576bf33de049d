//! Interfaces to the remote collaborators: the authentication identity, the
//! per-user document store, and the blob store, plus HTTP implementations
//! of each.
//!
//! The sync layer only ever talks to these traits, so tests (and offline
//! builds) can swap in in-memory fakes, and the concrete backend stays a
//! deployment concern.

use async_trait::async_trait;
use serde_json::Value;

use crate::Error;

/// The authentication collaborator. Sync operations are scoped by the
/// current user id; `None` means nobody is signed in and sync must be a
/// silent no-op.
#[async_trait]
pub trait Identity: Send + Sync {
    /// The id of the currently authenticated user, if any.
    fn current_user_id(&self) -> Option<String>;

    /// Permanently delete the current authentication identity.
    async fn delete_current_user(&self) -> Result<(), Error>;
}

/// A hierarchical remote document store keyed by slash-separated paths,
/// e.g. `users/{uid}/accounts/{id}`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Upsert `document` at `path`, merging fields into any existing
    /// document rather than replacing it wholesale, so a narrower local
    /// write never destroys fields the remote document already has.
    async fn set_merged(&self, path: &str, document: Value) -> Result<(), Error>;

    /// Fetch every document directly under `collection`.
    async fn get_all(&self, collection: &str) -> Result<Vec<Value>, Error>;

    /// Delete the document at `path`.
    async fn delete(&self, path: &str) -> Result<(), Error>;
}

/// A remote blob store for binary content such as profile images.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` at `path`, overwriting any previous content.
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<(), Error>;

    /// The public access URL for the blob at `path`.
    async fn download_url(&self, path: &str) -> Result<String, Error>;
}

/// An [Identity] with a fixed, pre-configured user id. Used by the CLI,
/// where sign-in happens out of band.
pub struct StaticIdentity {
    user_id: Option<String>,
}

impl StaticIdentity {
    /// Create an identity that reports `user_id`; pass `None` for the
    /// signed-out state.
    pub fn new(user_id: Option<String>) -> Self {
        Self { user_id }
    }
}

#[async_trait]
impl Identity for StaticIdentity {
    fn current_user_id(&self) -> Option<String> {
        self.user_id.clone()
    }

    async fn delete_current_user(&self) -> Result<(), Error> {
        // Nothing to revoke for a pre-configured identity.
        Ok(())
    }
}

fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn require_success(response: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = response.status();
    if !status.is_success() {
        return Err(Error::Remote(format!(
            "{} returned {status}",
            response.url()
        )));
    }

    Ok(response)
}

/// A [DocumentStore] over a REST endpoint: `PATCH` merge-upserts a
/// document, `GET` on a collection returns a JSON array of its documents,
/// `DELETE` removes one.
pub struct HttpDocumentStore {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpDocumentStore {
    /// Create a client for the document endpoint at `base_url`, attaching
    /// `api_key` as a bearer token when given.
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.to_owned(),
            api_key,
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn set_merged(&self, path: &str, document: Value) -> Result<(), Error> {
        let url = join_url(&self.base_url, path);
        let response = self
            .authorize(self.client.patch(&url))
            .json(&document)
            .send()
            .await?;
        require_success(response)?;

        Ok(())
    }

    async fn get_all(&self, collection: &str) -> Result<Vec<Value>, Error> {
        let url = join_url(&self.base_url, collection);
        let response = self.authorize(self.client.get(&url)).send().await?;
        let documents = require_success(response)?.json().await?;

        Ok(documents)
    }

    async fn delete(&self, path: &str) -> Result<(), Error> {
        let url = join_url(&self.base_url, path);
        let response = self.authorize(self.client.delete(&url)).send().await?;
        require_success(response)?;

        Ok(())
    }
}

/// A [BlobStore] over a REST endpoint that serves uploaded blobs back at
/// the path they were stored under.
pub struct HttpBlobStore {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpBlobStore {
    /// Create a client for the blob endpoint at `base_url`.
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.to_owned(),
            api_key,
        }
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<(), Error> {
        let url = join_url(&self.base_url, path);
        let mut request = self.client.put(&url).body(bytes);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        require_success(request.send().await?)?;

        Ok(())
    }

    async fn download_url(&self, path: &str) -> Result<String, Error> {
        Ok(join_url(&self.base_url, path))
    }
}

#[cfg(test)]
mod url_tests {
    use super::join_url;

    #[test]
    fn join_handles_trailing_and_leading_slashes() {
        assert_eq!(
            join_url("https://example.com/api/", "/users/u1"),
            "https://example.com/api/users/u1"
        );
        assert_eq!(
            join_url("https://example.com/api", "users/u1"),
            "https://example.com/api/users/u1"
        );
    }
}
