//! Appointment persistence contract.

use crate::types::{Appointment, AppointmentId, ListFilter, Slot};
use std::future::Future;
use thiserror::Error;

/// Errors raised by an [`AppointmentRepository`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// Another active appointment already occupies the slot
    #[error("slot already taken: {0}")]
    SlotTaken(String),

    /// The stored row changed since it was read
    #[error("version mismatch: expected {expected}, found {actual}")]
    VersionMismatch {
        /// Version the writer read
        expected: u64,
        /// Version currently stored
        actual: u64,
    },

    /// No row with that id
    #[error("appointment not found: {0}")]
    NotFound(AppointmentId),

    /// Anything else the backend reported
    #[error("database error: {0}")]
    Database(String),
}

/// Transactional storage for appointments.
///
/// Implementations must guarantee that at most one non-cancelled appointment
/// occupies any [`Slot`]. The guarantee has to hold under concurrent writers;
/// a pre-check followed by a write is not enough.
pub trait AppointmentRepository: Send + Sync {
    /// Store a new appointment.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::SlotTaken`] if an active appointment already
    /// holds the same occupied slot.
    fn insert(
        &self,
        appointment: &Appointment,
    ) -> impl Future<Output = Result<Appointment, RepositoryError>> + Send;

    /// Load one appointment.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Database`] on backend failure.
    fn get(
        &self,
        id: AppointmentId,
    ) -> impl Future<Output = Result<Option<Appointment>, RepositoryError>> + Send;

    /// Replace an appointment if its stored version is `expected_version`.
    ///
    /// The stored version is bumped by one and the stored row returned.
    ///
    /// # Errors
    ///
    /// - [`RepositoryError::VersionMismatch`] if another writer got there first
    /// - [`RepositoryError::SlotTaken`] if the new occupied slot is held
    /// - [`RepositoryError::NotFound`] if the row does not exist
    fn update(
        &self,
        appointment: &Appointment,
        expected_version: u64,
    ) -> impl Future<Output = Result<Appointment, RepositoryError>> + Send;

    /// Appointments matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Database`] on backend failure.
    fn list(
        &self,
        filter: &ListFilter,
    ) -> impl Future<Output = Result<Vec<Appointment>, RepositoryError>> + Send;

    /// The active appointment occupying `slot`, ignoring `exclude`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Database`] on backend failure.
    fn find_active_in_slot(
        &self,
        slot: &Slot,
        exclude: Option<AppointmentId>,
    ) -> impl Future<Output = Result<Option<Appointment>, RepositoryError>> + Send;

    /// Cheap liveness probe for readiness checks.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Database`] if the backend is unreachable.
    fn ping(&self) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}
