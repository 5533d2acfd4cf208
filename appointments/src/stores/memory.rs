//! In-memory appointment repository.
//!
//! A single mutex guards the whole table, so the slot-uniqueness check and the
//! write it protects happen atomically. Used by tests and by the server when
//! `STORAGE_BACKEND=memory`.

use crate::providers::{AppointmentRepository, RepositoryError};
use crate::types::{Appointment, AppointmentId, ListFilter, Slot};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Mutex-guarded map of appointments.
#[derive(Debug, Default)]
pub struct InMemoryAppointmentRepository {
    rows: Mutex<HashMap<AppointmentId, Appointment>>,
}

impl InMemoryAppointmentRepository {
    /// Empty repository
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored appointments, cancelled ones included
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows().len()
    }

    /// Whether nothing has been stored yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows().is_empty()
    }

    fn rows(&self) -> MutexGuard<'_, HashMap<AppointmentId, Appointment>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert_row(&self, appointment: &Appointment) -> Result<Appointment, RepositoryError> {
        let mut rows = self.rows();
        if rows.contains_key(&appointment.id) {
            return Err(RepositoryError::Database(format!(
                "duplicate appointment id {}",
                appointment.id
            )));
        }

        let slot = appointment.occupied_slot();
        if appointment.is_active() && holder(&rows, &slot, None).is_some() {
            return Err(RepositoryError::SlotTaken(slot.to_string()));
        }

        rows.insert(appointment.id, appointment.clone());
        Ok(appointment.clone())
    }

    fn update_row(&self, appointment: &Appointment, expected_version: u64) -> Result<Appointment, RepositoryError> {
        let mut rows = self.rows();
        let actual = rows
            .get(&appointment.id)
            .map(|stored| stored.version)
            .ok_or(RepositoryError::NotFound(appointment.id))?;

        if actual != expected_version {
            return Err(RepositoryError::VersionMismatch {
                expected: expected_version,
                actual,
            });
        }

        let slot = appointment.occupied_slot();
        if appointment.is_active() && holder(&rows, &slot, Some(appointment.id)).is_some() {
            return Err(RepositoryError::SlotTaken(slot.to_string()));
        }

        let mut stored = appointment.clone();
        stored.version = actual + 1;
        rows.insert(stored.id, stored.clone());
        Ok(stored)
    }
}

fn holder<'a>(
    rows: &'a HashMap<AppointmentId, Appointment>,
    slot: &Slot,
    exclude: Option<AppointmentId>,
) -> Option<&'a Appointment> {
    rows.values()
        .filter(|a| Some(a.id) != exclude)
        .find(|a| a.is_active() && a.occupied_slot() == *slot)
}

impl AppointmentRepository for InMemoryAppointmentRepository {
    fn insert(
        &self,
        appointment: &Appointment,
    ) -> impl Future<Output = Result<Appointment, RepositoryError>> + Send {
        let result = self.insert_row(appointment);
        async move { result }
    }

    fn get(
        &self,
        id: AppointmentId,
    ) -> impl Future<Output = Result<Option<Appointment>, RepositoryError>> + Send {
        let found = self.rows().get(&id).cloned();
        async move { Ok(found) }
    }

    fn update(
        &self,
        appointment: &Appointment,
        expected_version: u64,
    ) -> impl Future<Output = Result<Appointment, RepositoryError>> + Send {
        let result = self.update_row(appointment, expected_version);
        async move { result }
    }

    fn list(
        &self,
        filter: &ListFilter,
    ) -> impl Future<Output = Result<Vec<Appointment>, RepositoryError>> + Send {
        let mut matching: Vec<Appointment> = self
            .rows()
            .values()
            .filter(|a| match filter {
                ListFilter::Exhibitor(id) => a.exhibitor_id == *id,
                ListFilter::Requester(id) => a.requester_id == *id,
                ListFilter::Event(id) => a.event_id == *id,
            })
            .cloned()
            .collect();
        matching.sort_by_key(|a| Reverse((a.created_at, a.id)));
        async move { Ok(matching) }
    }

    fn find_active_in_slot(
        &self,
        slot: &Slot,
        exclude: Option<AppointmentId>,
    ) -> impl Future<Output = Result<Option<Appointment>, RepositoryError>> + Send {
        let found = holder(&self.rows(), slot, exclude).cloned();
        async move { Ok(found) }
    }

    fn ping(&self) -> impl Future<Output = Result<(), RepositoryError>> + Send {
        async { Ok(()) }
    }
}
