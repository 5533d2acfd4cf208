//! Slot conflict checking.
//!
//! [`SlotConflictChecker::ensure_free`] is a read-only pre-check that produces a
//! friendly `Conflict` before any write is attempted. It cannot close the race
//! between two concurrent bookings on its own: the repository's uniqueness
//! guarantee does that, and its `SlotTaken` maps to the same error.

use crate::error::{BookingError, Dependency, Result};
use crate::providers::AppointmentRepository;
use crate::types::{AppointmentId, Slot};
use booking_runtime::deadline;
use std::sync::Arc;
use std::time::Duration;

/// Checks whether a slot is held by an active appointment.
pub struct SlotConflictChecker<R> {
    repository: Arc<R>,
    timeout: Duration,
}

impl<R> Clone for SlotConflictChecker<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            timeout: self.timeout,
        }
    }
}

impl<R: AppointmentRepository> SlotConflictChecker<R> {
    /// Checker over `repository`, bounding each lookup by `timeout`
    #[must_use]
    pub const fn new(repository: Arc<R>, timeout: Duration) -> Self {
        Self {
            repository,
            timeout,
        }
    }

    /// Whether an active appointment other than `exclude` occupies `slot`.
    ///
    /// # Errors
    ///
    /// Returns `DependencyTimeout` or `Storage` if the repository cannot answer.
    pub async fn is_taken(&self, slot: &Slot, exclude: Option<AppointmentId>) -> Result<bool> {
        let holder = deadline(self.timeout, self.repository.find_active_in_slot(slot, exclude))
            .await
            .map_err(|_| BookingError::DependencyTimeout {
                dependency: Dependency::Store,
            })??;

        if let Some(holder) = &holder {
            tracing::debug!(%slot, holder = %holder.id, "Slot is taken");
        }
        Ok(holder.is_some())
    }

    /// Fail with `Conflict` if `slot` is taken by anyone but `exclude`.
    ///
    /// # Errors
    ///
    /// - `Conflict` when an active appointment holds the slot
    /// - `DependencyTimeout` or `Storage` if the repository cannot answer
    pub async fn ensure_free(&self, slot: &Slot, exclude: Option<AppointmentId>) -> Result<()> {
        if self.is_taken(slot, exclude).await? {
            crate::metrics::record_conflict("precheck");
            Err(BookingError::slot_taken(slot))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::stores::InMemoryAppointmentRepository;
    use crate::types::{Appointment, CreateAppointmentInput, RequesterSnapshot};
    use booking_testing::test_clock;
    use booking_core::environment::Clock;

    fn appointment(time: &str) -> Appointment {
        let draft = CreateAppointmentInput {
            event_id: Some("E1".into()),
            exhibitor_id: Some("X1".into()),
            requester_id: Some("R1".into()),
            title: Some("Intro".into()),
            requested_date: Some("2025-03-10".into()),
            requested_time: Some(time.into()),
            ..CreateAppointmentInput::default()
        }
        .into_draft()
        .unwrap();
        Appointment::from_draft(AppointmentId::new(), draft, RequesterSnapshot::default(), test_clock().now())
    }

    #[tokio::test]
    async fn test_taken_slot_conflicts_except_for_its_holder() {
        let repository = Arc::new(InMemoryAppointmentRepository::new());
        let existing = appointment("09:00");
        repository.insert(&existing).await.unwrap();

        let checker = SlotConflictChecker::new(Arc::clone(&repository), Duration::from_secs(1));
        let slot = existing.occupied_slot();

        let err = checker.ensure_free(&slot, None).await.unwrap_err();
        assert_eq!(err.code(), "CONFLICT");
        assert!(checker.ensure_free(&slot, Some(existing.id)).await.is_ok());

        let other = appointment("10:00").occupied_slot();
        assert!(checker.ensure_free(&other, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_appointment_frees_slot() {
        let repository = Arc::new(InMemoryAppointmentRepository::new());
        let mut existing = appointment("09:00");
        repository.insert(&existing).await.unwrap();
        existing.status = crate::types::AppointmentStatus::Cancelled;
        repository.update(&existing, 1).await.unwrap();

        let checker = SlotConflictChecker::new(repository, Duration::from_secs(1));
        assert!(!checker.is_taken(&existing.occupied_slot(), None).await.unwrap());
    }
}
