//! Collaborator interfaces consumed by the appointment service.
//!
//! The service never talks to the identity service, the event registry, the
//! notification system or the database directly. Each is reached through a
//! trait defined here, with production adapters in [`http`] and
//! [`crate::stores`], and in-memory doubles in `crate::mocks`.
//!
//! Trait methods return `impl Future + Send` so the service can be shared
//! across tokio worker threads and notifications can be spawned detached.

pub mod events;
pub mod http;
pub mod identity;
pub mod notifications;
pub mod repository;

pub use events::{EventRegistry, EventSummary};
pub use identity::{IdentityLookup, UserProfile};
pub use notifications::{Delivery, Notification, NotificationDispatcher, NotificationKind, Notifier};
pub use repository::{AppointmentRepository, RepositoryError};

use thiserror::Error;

/// Failure reported by an external collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Could not reach the collaborator, or it failed on its side
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    /// The collaborator refused the request
    #[error("collaborator rejected request ({status}): {message}")]
    Rejected {
        /// HTTP status or equivalent code
        status: u16,
        /// Response detail
        message: String,
    },

    /// The collaborator answered with something we could not decode
    #[error("malformed collaborator response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Whether the same call may succeed if retried
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
