//! Caller context for a notification.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{NotifyError, Result};
use crate::types::Labels;

/// Bounds how long a notifier waits on dispatch and carries batch metadata.
///
/// Cancelling the token or reaching the deadline aborts the wait. It does not
/// recall a command the bus may already have delivered.
#[derive(Debug, Clone, Default)]
pub struct NotifyContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
    group_labels: Labels,
}

impl NotifyContext {
    /// Creates a context with no deadline that is never cancelled unless
    /// [`NotifyContext::cancel`] is called.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `token` for cancellation.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Gives up waiting after `timeout` from now.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Gives up waiting at `deadline`.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets the labels the batch was grouped by.
    #[must_use]
    pub fn with_group_labels(mut self, labels: Labels) -> Self {
        self.group_labels = labels;
        self
    }

    /// Returns the labels the batch was grouped by.
    #[must_use]
    pub const fn group_labels(&self) -> &Labels {
        &self.group_labels
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancels the context.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns true if the context has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drives `fut` to completion unless the context is cancelled or its
    /// deadline passes first.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Cancelled` or `NotifyError::DeadlineExceeded`
    /// when the context ends first, otherwise whatever `fut` returns.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let deadline = async {
            match self.deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(NotifyError::Cancelled),
            () = deadline => Err(NotifyError::DeadlineExceeded),
            result = fut => result,
        }
    }
}
