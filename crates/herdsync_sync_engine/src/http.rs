//! HTTP transport implementation.
//!
//! Requests and responses are JSON bodies POSTed to `<base>/sync/apply`.
//! The actual HTTP client is abstracted via a trait to allow different
//! implementations (reqwest, hyper, an in-process loopback).

use crate::error::{SyncError, SyncResult};
use crate::transport::RemoteBackend;
use herdsync_protocol::{ApplyOutcome, ApplyRequest, APPLY_PATH};
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport.
pub trait HttpClient: Send + Sync {
    /// Sends a POST request and returns the response body.
    fn post(
        &self,
        url: &str,
        body: Vec<u8>,
    ) -> impl Future<Output = Result<Vec<u8>, String>> + Send;
}

/// HTTP-based remote backend.
pub struct HttpBackend<C: HttpClient> {
    base_url: String,
    client: C,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpBackend<C> {
    /// Creates a backend for the server at `base_url`.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            last_error: RwLock::new(None),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the last transport error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }
}

impl<C: HttpClient> RemoteBackend for HttpBackend<C> {
    async fn apply(&self, request: &ApplyRequest) -> SyncResult<ApplyOutcome> {
        let body = request
            .encode()
            .map_err(|e| SyncError::Protocol(format!("failed to encode request: {e}")))?;

        let url = format!("{}{}", self.base_url, APPLY_PATH);
        debug!(%url, seq = request.change.seq, "posting change");
        let response = match self.client.post(&url, body).await {
            Ok(response) => response,
            Err(e) => {
                *self.last_error.write() = Some(e.clone());
                return Err(SyncError::transport_retryable(e));
            }
        };
        *self.last_error.write() = None;

        ApplyOutcome::decode(&response)
            .map_err(|e| SyncError::Protocol(format!("failed to decode response: {e}")))
    }
}

impl<C: HttpClient> std::fmt::Debug for HttpBackend<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackend")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer {
    /// Handles a POST request and returns the response body.
    fn handle_post(&self, path: &str, body: &[u8]) -> Result<Vec<u8>, String>;
}

impl<S: LoopbackServer + ?Sized> LoopbackServer for Arc<S> {
    fn handle_post(&self, path: &str, body: &[u8]) -> Result<Vec<u8>, String> {
        (**self).handle_post(path, body)
    }
}

/// A loopback HTTP client that routes requests directly to a server in the
/// same process.
///
/// Useful for testing without actual network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer + Send + Sync> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }
}

impl<S: LoopbackServer + Send + Sync> HttpClient for LoopbackClient<S> {
    async fn post(&self, url: &str, body: Vec<u8>) -> Result<Vec<u8>, String> {
        let path = url.find("/sync/").map(|i| &url[i..]).unwrap_or(url);
        self.server.handle_post(path, &body)
    }
}
