//! Remote backend abstraction.

use crate::error::{SyncError, SyncResult};
use herdsync_protocol::{ApplyOutcome, ApplyRequest};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// The authoritative backend that pending changes are sent to.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, in-process, mock for testing).
pub trait RemoteBackend: Send + Sync {
    /// Asks the backend to apply one change.
    ///
    /// Conflicts and rejections are `Ok` outcomes; `Err` means the change
    /// may or may not have reached the backend.
    fn apply(
        &self,
        request: &ApplyRequest,
    ) -> impl Future<Output = SyncResult<ApplyOutcome>> + Send;
}

impl<B: RemoteBackend> RemoteBackend for Arc<B> {
    fn apply(
        &self,
        request: &ApplyRequest,
    ) -> impl Future<Output = SyncResult<ApplyOutcome>> + Send {
        (**self).apply(request)
    }
}

/// A scripted reply for [`MockBackend`].
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Return this outcome.
    Outcome(ApplyOutcome),
    /// Fail with a transport error.
    Fail {
        /// Error message.
        message: String,
        /// Whether the error is retryable.
        retryable: bool,
    },
    /// Wait, then return the outcome.
    Delay(Duration, ApplyOutcome),
}

/// A mock backend for testing.
///
/// Replies are consumed in order; once the script runs out every request is
/// acknowledged. Every request received is recorded.
#[derive(Debug, Default)]
pub struct MockBackend {
    script: Mutex<VecDeque<MockReply>>,
    received: Mutex<Vec<ApplyRequest>>,
}

impl MockBackend {
    /// Creates a mock that acknowledges everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply.
    pub fn push_reply(&self, reply: MockReply) {
        self.script.lock().push_back(reply);
    }

    /// Queues an outcome.
    pub fn push_outcome(&self, outcome: ApplyOutcome) {
        self.push_reply(MockReply::Outcome(outcome));
    }

    /// Queues a transport failure.
    pub fn push_failure(&self, message: impl Into<String>, retryable: bool) {
        self.push_reply(MockReply::Fail {
            message: message.into(),
            retryable,
        });
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<ApplyRequest> {
        self.received.lock().clone()
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.received.lock().len()
    }
}

impl RemoteBackend for MockBackend {
    async fn apply(&self, request: &ApplyRequest) -> SyncResult<ApplyOutcome> {
        self.received.lock().push(request.clone());
        let reply = self
            .script
            .lock()
            .pop_front()
            .unwrap_or(MockReply::Outcome(ApplyOutcome::Acknowledged));

        match reply {
            MockReply::Outcome(outcome) => Ok(outcome),
            MockReply::Fail { message, retryable } => Err(SyncError::Transport { message, retryable }),
            MockReply::Delay(delay, outcome) => {
                tokio::time::sleep(delay).await;
                Ok(outcome)
            }
        }
    }
}
