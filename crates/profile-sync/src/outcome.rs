//! Awaitable, cloneable result of a profile flush.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::{ProfileSyncError, Result};
use crate::types::AppUser;

/// What a flush resolves to. `None` means there was no remote user to sync.
pub type UpdateResult = Result<Option<AppUser>>;

/// Eventual result of an `update` or `immediate_update` call.
///
/// Every caller that joined the same debounce window holds a clone of the same
/// outcome and observes the same result. Dropping an outcome does not cancel
/// the flush.
#[derive(Clone)]
#[must_use = "an UpdateOutcome does nothing for the caller unless awaited"]
pub struct UpdateOutcome {
    inner: Shared<BoxFuture<'static, UpdateResult>>,
}

impl UpdateOutcome {
    /// Outcome that is already resolved.
    pub fn ready(result: UpdateResult) -> Self {
        let outcome = Self::from_future(futures::future::ready(result));
        // Drive the shared future once so `peek` sees the result.
        let _ = outcome.clone().now_or_never();
        outcome
    }

    /// Outcome resolved when the paired sender fires.
    pub(crate) fn from_receiver(receiver: oneshot::Receiver<UpdateResult>) -> Self {
        Self::from_future(async move {
            receiver.await.unwrap_or_else(|_| {
                Err(ProfileSyncError::interrupted(
                    "scheduled profile update was dropped",
                ))
            })
        })
    }

    /// Outcome resolved when a spawned flush task finishes.
    pub(crate) fn from_task(handle: JoinHandle<UpdateResult>) -> Self {
        Self::from_future(async move {
            handle
                .await
                .unwrap_or_else(|e| Err(ProfileSyncError::interrupted(e.to_string())))
        })
    }

    fn from_future(future: impl Future<Output = UpdateResult> + Send + 'static) -> Self {
        Self {
            inner: future.boxed().shared(),
        }
    }

    /// The result, if the outcome has already resolved.
    pub fn peek(&self) -> Option<&UpdateResult> {
        self.inner.peek()
    }

    /// True if both handles refer to the same pending flush.
    pub fn ptr_eq(&self, other: &UpdateOutcome) -> bool {
        self.inner.ptr_eq(&other.inner)
    }
}

impl Future for UpdateOutcome {
    type Output = UpdateResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx)
    }
}

impl std::fmt::Debug for UpdateOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateOutcome")
            .field("resolved", &self.peek().is_some())
            .finish()
    }
}
