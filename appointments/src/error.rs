//! Error taxonomy for appointment operations.

use crate::providers::RepositoryError;
use crate::types::{AppointmentStatus, Role};
use std::fmt;
use thiserror::Error;

/// Kind of entity a lookup failed to find
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// Event registry entry
    Event,
    /// Identity lookup entry
    User,
    /// Stored appointment
    Appointment,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Event => "event",
            Self::User => "user",
            Self::Appointment => "appointment",
        })
    }
}

/// Collaborator a call was waiting on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    /// User directory
    IdentityLookup,
    /// Event directory
    EventRegistry,
    /// Notification delivery
    NotificationDispatcher,
    /// Appointment persistence
    Store,
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::IdentityLookup => "identity lookup",
            Self::EventRegistry => "event registry",
            Self::NotificationDispatcher => "notification dispatcher",
            Self::Store => "appointment store",
        })
    }
}

/// Errors surfaced by the appointment service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// Missing or malformed input
    #[error("{message}")]
    Validation {
        /// Human-readable summary
        message: String,
        /// Offending input fields, in canonical camelCase
        fields: Vec<String>,
    },

    /// A referenced entity does not exist
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What was looked up
        kind: ResourceKind,
        /// The id that was not found
        id: String,
        /// Which party the id belongs to, for user lookups
        role: Option<Role>,
    },

    /// The slot is already held by an active appointment
    #[error("{message}")]
    Conflict {
        /// Human-readable summary
        message: String,
    },

    /// The requested status change is not in the transition table
    #[error("cannot transition appointment from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: AppointmentStatus,
        /// Requested status
        to: AppointmentStatus,
    },

    /// The caller may not perform this operation
    #[error("user {user_id} may not modify this appointment")]
    Permission {
        /// The rejected caller
        user_id: String,
    },

    /// A collaborator did not answer in time
    #[error("{dependency} timed out")]
    DependencyTimeout {
        /// Which collaborator
        dependency: Dependency,
    },

    /// A collaborator answered with a failure
    #[error("{dependency} failed: {message}")]
    Dependency {
        /// Which collaborator
        dependency: Dependency,
        /// Failure detail
        message: String,
    },

    /// The store failed for a reason other than a conflict
    #[error("storage error: {message}")]
    Storage {
        /// Failure detail
        message: String,
    },
}

impl BookingError {
    /// Validation error naming the offending fields
    pub fn validation<F, S>(message: impl Into<String>, fields: F) -> Self
    where
        F: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Validation {
            message: message.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Missing event
    pub fn event_not_found(id: impl fmt::Display) -> Self {
        Self::NotFound {
            kind: ResourceKind::Event,
            id: id.to_string(),
            role: None,
        }
    }

    /// Missing requester or exhibitor
    pub fn user_not_found(id: impl fmt::Display, role: Role) -> Self {
        Self::NotFound {
            kind: ResourceKind::User,
            id: id.to_string(),
            role: Some(role),
        }
    }

    /// Missing appointment
    pub fn appointment_not_found(id: impl fmt::Display) -> Self {
        Self::NotFound {
            kind: ResourceKind::Appointment,
            id: id.to_string(),
            role: None,
        }
    }

    /// Slot already taken
    pub fn slot_taken(slot: impl fmt::Display) -> Self {
        Self::Conflict {
            message: format!("slot already booked: {slot}"),
        }
    }

    /// Stable machine-readable code
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { .. } => "CONFLICT",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Permission { .. } => "PERMISSION_DENIED",
            Self::DependencyTimeout { .. } => "DEPENDENCY_TIMEOUT",
            Self::Dependency { .. } => "DEPENDENCY_ERROR",
            Self::Storage { .. } => "STORAGE_ERROR",
        }
    }

    /// Input fields the error refers to
    #[must_use]
    pub fn fields(&self) -> Vec<String> {
        match self {
            Self::Validation { fields, .. } => fields.clone(),
            Self::NotFound {
                kind: ResourceKind::Event,
                ..
            } => vec!["eventId".to_string()],
            Self::NotFound {
                role: Some(Role::Requester),
                ..
            } => vec!["requesterId".to_string()],
            Self::NotFound {
                role: Some(Role::Exhibitor),
                ..
            } => vec!["exhibitorId".to_string()],
            Self::InvalidTransition { .. } => vec!["status".to_string()],
            Self::Conflict { .. } => vec!["requestedDate".to_string(), "requestedTime".to_string()],
            _ => Vec::new(),
        }
    }

    /// Whether retrying the same request later may succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::DependencyTimeout { .. } | Self::Dependency { .. })
    }
}

impl From<RepositoryError> for BookingError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::SlotTaken(slot) => Self::Conflict {
                message: format!("slot already booked: {slot}"),
            },
            RepositoryError::VersionMismatch { expected, actual } => Self::Conflict {
                message: format!(
                    "appointment was modified concurrently (expected version {expected}, found {actual})"
                ),
            },
            RepositoryError::NotFound(id) => Self::appointment_not_found(id),
            RepositoryError::Database(message) => Self::Storage { message },
        }
    }
}

/// Result alias for appointment operations
pub type Result<T> = std::result::Result<T, BookingError>;
