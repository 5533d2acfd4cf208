//! Shared harness for appointment service tests.
//!
//! Builds an [`AppointmentService`] over the in-memory doubles and keeps a
//! handle on each double so tests can inject failures and inspect what the
//! service did.

#![allow(dead_code)] // Each test binary uses a different subset
#![allow(clippy::panic)]

use appointments::config::Timeouts;
use appointments::mocks::{MockEventRegistry, MockIdentityLookup, RecordingDispatcher};
use appointments::stores::InMemoryAppointmentRepository;
use appointments::{
    Appointment, AppointmentId, AppointmentService, BookingError, CreateAppointmentInput,
    UpdateAppointmentInput, UserId,
};
use booking_runtime::retry::RetryPolicy;
use booking_core::environment::Clock;
use booking_testing::{SteppingClock, init_test_tracing, test_clock};
use std::sync::Arc;
use std::time::Duration;

/// The service wired to in-memory doubles
pub type TestService = AppointmentService<
    MockIdentityLookup,
    MockEventRegistry,
    RecordingDispatcher,
    InMemoryAppointmentRepository,
>;

/// Event every test books against
pub const EVENT: &str = "E1";
/// Exhibitor every test books with
pub const EXHIBITOR: &str = "X1";
/// Second exhibitor
pub const OTHER_EXHIBITOR: &str = "X2";
/// Default requester
pub const REQUESTER: &str = "R1";
/// Second requester
pub const OTHER_REQUESTER: &str = "R2";
/// Known user who is party to nothing
pub const STRANGER: &str = "U9";
/// Date used by the scenarios
pub const DATE: &str = "2025-03-10";

/// Service plus handles on its collaborators
pub struct Harness {
    pub service: TestService,
    pub identity: MockIdentityLookup,
    pub events: MockEventRegistry,
    pub notifications: RecordingDispatcher,
    pub repository: Arc<InMemoryAppointmentRepository>,
}

impl Harness {
    /// Harness with short deadlines suitable for tests
    pub fn new() -> Self {
        Self::with_timeouts(Timeouts::uniform(Duration::from_millis(250)))
    }

    /// Harness with explicit deadlines
    pub fn with_timeouts(timeouts: Timeouts) -> Self {
        init_test_tracing();

        let identity = MockIdentityLookup::new()
            .with_user(REQUESTER, "Rita", "Requester", "Acme")
            .with_user(OTHER_REQUESTER, "Rob", "Visitor", "Globex")
            .with_user(EXHIBITOR, "Xavier", "Exhibitor", "Booth Co")
            .with_user(OTHER_EXHIBITOR, "Xena", "Maker", "Stand Ltd")
            .with_user(STRANGER, "Uma", "Outsider", "Nowhere Inc");
        let events = MockEventRegistry::new().with_event(EVENT, "Spring Expo");
        let notifications = RecordingDispatcher::new();
        let repository = Arc::new(InMemoryAppointmentRepository::new());

        // Every booking gets a distinct, increasing creation time.
        let clock = SteppingClock::new(test_clock().now(), chrono::Duration::minutes(1));

        let service = AppointmentService::new(
            Arc::new(identity.clone()),
            Arc::new(events.clone()),
            Arc::new(notifications.clone()),
            Arc::clone(&repository),
            Arc::new(clock),
            timeouts,
            RetryPolicy::builder()
                .max_retries(2)
                .initial_delay(Duration::from_millis(5))
                .jitter(false)
                .build(),
        );

        Self {
            service,
            identity,
            events,
            notifications,
            repository,
        }
    }

    /// Book `requester` with the default exhibitor at `time` on [`DATE`].
    pub async fn book(&self, requester: &str, time: &str) -> Appointment {
        self.service
            .create_appointment(create_input(requester, EXHIBITOR, time))
            .await
            .unwrap_or_else(|err| panic!("booking {requester} at {time} failed: {err}"))
    }

    /// Apply `input` as `caller`.
    pub async fn update(
        &self,
        id: AppointmentId,
        caller: &str,
        input: UpdateAppointmentInput,
    ) -> Result<Appointment, BookingError> {
        self.service
            .update_appointment(id, &UserId::new(caller), input)
            .await
    }

    /// Stored copy of an appointment, read as the exhibitor.
    pub async fn stored(&self, id: AppointmentId) -> Appointment {
        self.service
            .get_appointment(id, &UserId::new(EXHIBITOR))
            .await
            .unwrap_or_else(|err| panic!("reading {id} failed: {err}"))
    }

    /// Wait for every notification effect to finish.
    pub async fn settle(&self) {
        self.service
            .runner()
            .settle(Duration::from_secs(5))
            .await
            .unwrap_or_else(|err| panic!("effects did not settle: {err}"));
    }
}

/// A complete create request on [`EVENT`] and [`DATE`]
pub fn create_input(requester: &str, exhibitor: &str, time: &str) -> CreateAppointmentInput {
    CreateAppointmentInput {
        event_id: Some(EVENT.into()),
        exhibitor_id: Some(exhibitor.into()),
        requester_id: Some(requester.into()),
        title: Some("Intro".into()),
        requested_date: Some(DATE.into()),
        requested_time: Some(time.into()),
        ..CreateAppointmentInput::default()
    }
}

/// Status-only update
pub fn status(status: &str) -> UpdateAppointmentInput {
    UpdateAppointmentInput {
        status: Some(status.into()),
        ..UpdateAppointmentInput::default()
    }
}

/// Cancellation with a reason
pub fn cancel(reason: &str) -> UpdateAppointmentInput {
    UpdateAppointmentInput {
        status: Some("CANCELLED".into()),
        cancellation_reason: Some(reason.into()),
        ..UpdateAppointmentInput::default()
    }
}

/// Move to a new time on [`DATE`]
pub fn reschedule(time: &str) -> UpdateAppointmentInput {
    UpdateAppointmentInput {
        status: Some("RESCHEDULED".into()),
        confirmed_date: Some(DATE.into()),
        confirmed_time: Some(time.into()),
        ..UpdateAppointmentInput::default()
    }
}
