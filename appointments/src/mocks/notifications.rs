//! Recording notification dispatcher.

use super::lock;
use crate::providers::{Notification, NotificationDispatcher, ProviderError};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct Recorder {
    delivered: Vec<Notification>,
    attempts: usize,
    failure: Option<ProviderError>,
    failures_left: Option<usize>,
    delay: Option<Duration>,
}

/// Dispatcher that keeps every accepted notification in memory.
///
/// Failures can be injected permanently ([`fail_with`](Self::fail_with)) or for
/// the next `n` attempts ([`fail_times`](Self::fail_times)).
#[derive(Debug, Clone, Default)]
pub struct RecordingDispatcher {
    inner: Arc<Mutex<Recorder>>,
}

impl RecordingDispatcher {
    /// Dispatcher that accepts everything
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every attempt with `failure`
    pub fn fail_with(&self, failure: ProviderError) {
        let mut state = lock(&self.inner);
        state.failure = Some(failure);
        state.failures_left = None;
    }

    /// Fail the next `times` attempts with `failure`, then accept
    pub fn fail_times(&self, times: usize, failure: ProviderError) {
        let mut state = lock(&self.inner);
        state.failure = Some(failure);
        state.failures_left = Some(times);
    }

    /// Delay every attempt
    pub fn set_delay(&self, delay: Option<Duration>) {
        lock(&self.inner).delay = delay;
    }

    /// Notifications accepted so far, in order
    #[must_use]
    pub fn delivered(&self) -> Vec<Notification> {
        lock(&self.inner).delivered.clone()
    }

    /// Attempts so far, failed ones included
    #[must_use]
    pub fn attempts(&self) -> usize {
        lock(&self.inner).attempts
    }
}

impl NotificationDispatcher for RecordingDispatcher {
    fn notify(
        &self,
        notification: &Notification,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send {
        let inner = Arc::clone(&self.inner);
        let notification = notification.clone();

        async move {
            let delay = {
                let mut state = lock(&inner);
                state.attempts += 1;
                state.delay
            };
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let mut state = lock(&inner);
            let failing = match state.failures_left {
                None => state.failure.clone(),
                Some(0) => None,
                Some(left) => {
                    state.failures_left = Some(left - 1);
                    state.failure.clone()
                },
            };

            match failing {
                Some(err) => Err(err),
                None => {
                    state.delivered.push(notification);
                    Ok(())
                },
            }
        }
    }
}
