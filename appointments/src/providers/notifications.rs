//! Best-effort notifications.
//!
//! [`NotificationDispatcher`] is the raw collaborator. [`Notifier`] wraps it
//! with a deadline and transient-failure retries and turns a notification into
//! a detached [`Effect`]. Delivery outcomes are logged and counted, never
//! returned to the operation that triggered them.

use super::ProviderError;
use crate::types::UserId;
use booking_core::effect::Effect;
use booking_runtime::deadline;
use booking_runtime::retry::{RetryPolicy, retry_with_predicate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Notification categories understood by the dispatcher
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    /// A requester asked for a meeting
    AppointmentRequest,
    /// The exhibitor accepted
    AppointmentConfirmed,
    /// Either party called it off
    AppointmentCancelled,
    /// The meeting moved to a new slot
    AppointmentRescheduled,
    /// The meeting took place
    AppointmentCompleted,
}

impl NotificationKind {
    /// Wire spelling
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AppointmentRequest => "APPOINTMENT_REQUEST",
            Self::AppointmentConfirmed => "APPOINTMENT_CONFIRMED",
            Self::AppointmentCancelled => "APPOINTMENT_CANCELLED",
            Self::AppointmentRescheduled => "APPOINTMENT_RESCHEDULED",
            Self::AppointmentCompleted => "APPOINTMENT_COMPLETED",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message for one user
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Recipient
    pub user_id: UserId,
    /// Category
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Short headline
    pub title: String,
    /// Body text
    pub message: String,
    /// Structured payload, e.g. the appointment id
    pub metadata: serde_json::Value,
}

/// Accepts notification requests.
pub trait NotificationDispatcher: Send + Sync {
    /// Hand a notification over for delivery.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the dispatcher refuses or cannot be reached.
    fn notify(
        &self,
        notification: &Notification,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send;
}

/// Delivery outcome, used for logging and the outcome metric label
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Accepted by the dispatcher
    Delivered,
    /// The dispatcher failed, after retries where applicable
    Failed,
    /// The overall deadline expired
    TimedOut,
}

impl Delivery {
    /// Metric label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }
}

/// Bounded, retrying front for a [`NotificationDispatcher`].
pub struct Notifier<N> {
    dispatcher: Arc<N>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl<N> Clone for Notifier<N> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
            retry: self.retry.clone(),
            timeout: self.timeout,
        }
    }
}

impl<N> fmt::Debug for Notifier<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl<N> Notifier<N>
where
    N: NotificationDispatcher + 'static,
{
    /// Wrap a dispatcher. `timeout` bounds the whole delivery, retries included.
    #[must_use]
    pub const fn new(dispatcher: Arc<N>, retry: RetryPolicy, timeout: Duration) -> Self {
        Self {
            dispatcher,
            retry,
            timeout,
        }
    }

    /// Describe delivery of `notification` as a detached effect.
    #[must_use]
    pub fn effect<A>(&self, notification: Notification) -> Effect<A>
    where
        A: Send + 'static,
    {
        let notifier = self.clone();
        Effect::fire_and_forget(async move {
            notifier.deliver(notification).await;
        })
    }

    /// Deliver now, swallowing any failure.
    pub async fn deliver(&self, notification: Notification) -> Delivery {
        let dispatcher = &*self.dispatcher;
        let message = &notification;
        let attempt = retry_with_predicate(
            &self.retry,
            move || dispatcher.notify(message),
            ProviderError::is_transient,
        );

        let outcome = match deadline(self.timeout, attempt).await {
            Ok(Ok(())) => {
                tracing::debug!(
                    user_id = %notification.user_id,
                    kind = %notification.kind,
                    "Notification delivered"
                );
                Delivery::Delivered
            },
            Ok(Err(error)) => {
                tracing::warn!(
                    user_id = %notification.user_id,
                    kind = %notification.kind,
                    %error,
                    "Notification failed, dropping"
                );
                Delivery::Failed
            },
            Err(elapsed) => {
                tracing::warn!(
                    user_id = %notification.user_id,
                    kind = %notification.kind,
                    error = %elapsed,
                    "Notification timed out, dropping"
                );
                Delivery::TimedOut
            },
        };

        crate::metrics::record_notification(outcome);
        outcome
    }
}
