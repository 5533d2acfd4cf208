//! Appointment service behavior against in-memory collaborators.
//!
//! Covers the booking scenarios end to end: referential validation, the
//! transition table, permission scoping, listing, slot re-checks on
//! reschedule, re-booking after cancellation, dependency deadlines and the
//! best-effort notification contract.
//!
//! Run with: `cargo test --test service_test`

#![allow(clippy::unwrap_used, clippy::panic)] // Test code can use unwrap/panic

mod common;

use appointments::config::Timeouts;
use appointments::error::{Dependency, ResourceKind};
use appointments::providers::{NotificationKind, ProviderError};
use appointments::{
    AppointmentStatus, BookingError, CreateAppointmentInput, ListFilter, Role, TimeOfDay,
    UpdateAppointmentInput, UserId,
};
use chrono::NaiveDate;
use common::{
    DATE, EVENT, EXHIBITOR, Harness, OTHER_REQUESTER, REQUESTER, STRANGER, cancel, create_input,
    reschedule, status,
};
use std::time::Duration;

use AppointmentStatus::{Cancelled, Completed, Confirmed, NoShow, Pending, Rescheduled};

/// Every edge of the lifecycle, as `(from, to)`
const ALLOWED: [(AppointmentStatus, AppointmentStatus); 8] = [
    (Pending, Confirmed),
    (Pending, Cancelled),
    (Pending, Rescheduled),
    (Confirmed, Cancelled),
    (Confirmed, Completed),
    (Confirmed, NoShow),
    (Rescheduled, Confirmed),
    (Rescheduled, Cancelled),
];

fn date(raw: &str) -> NaiveDate {
    raw.parse().unwrap()
}

fn time(hour: u32, minute: u32) -> TimeOfDay {
    TimeOfDay::from_hm(hour, minute).unwrap()
}

/// Book an appointment for [`REQUESTER`] and drive it into `target`.
async fn appointment_in<'a>(harness: &'a Harness, target: AppointmentStatus) -> appointments::Appointment {
    let booked = harness.book(REQUESTER, "09:00").await;
    let id = booked.id;

    let confirm = |h: &'a Harness| h.update(id, EXHIBITOR, status("CONFIRMED"));

    let result = match target {
        Pending => return booked,
        Confirmed => confirm(harness).await,
        Rescheduled => harness.update(id, REQUESTER, reschedule("11:00")).await,
        Cancelled => harness.update(id, REQUESTER, cancel("double booked")).await,
        Completed => {
            confirm(harness).await.unwrap();
            harness.update(id, EXHIBITOR, status("COMPLETED")).await
        },
        NoShow => {
            confirm(harness).await.unwrap();
            harness.update(id, EXHIBITOR, status("NO_SHOW")).await
        },
    };

    let appointment = result.unwrap();
    assert_eq!(appointment.status, target);
    appointment
}

/// Update that requests `to`, with whatever extra fields that target needs.
fn request_for(to: AppointmentStatus) -> UpdateAppointmentInput {
    match to {
        Rescheduled => reschedule("15:00"),
        Cancelled => cancel("changed plans"),
        other => status(other.as_str()),
    }
}

// ============================================================================
// Create
// ============================================================================

#[tokio::test]
async fn test_happy_path_request_then_confirm() {
    let harness = Harness::new();

    let created = harness.book(REQUESTER, "09:00").await;
    assert_eq!(created.status, Pending);
    assert_eq!(created.event_id.as_str(), EVENT);
    assert_eq!(created.requested_date, date(DATE));
    assert_eq!(created.requested_time, time(9, 0));
    assert_eq!(created.duration, 60);
    assert_eq!(created.requester.name.as_deref(), Some("Rita Requester"));
    assert_eq!(created.requester.company.as_deref(), Some("Acme"));
    assert_eq!(created.version, 1);

    harness.settle().await;
    let sent = harness.notifications.delivered();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, NotificationKind::AppointmentRequest);
    assert_eq!(sent[0].user_id.as_str(), EXHIBITOR);

    let confirmed = harness
        .update(created.id, EXHIBITOR, status("CONFIRMED"))
        .await
        .unwrap();
    assert_eq!(confirmed.status, Confirmed);
    assert_eq!(confirmed.confirmed_date, Some(date(DATE)));
    assert_eq!(confirmed.confirmed_time, Some(time(9, 0)));
    assert_eq!(confirmed.version, 2);

    harness.settle().await;
    let sent = harness.notifications.delivered();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].kind, NotificationKind::AppointmentConfirmed);
    assert_eq!(sent[1].user_id.as_str(), REQUESTER);
    assert_eq!(sent[1].metadata["appointmentId"], created.id.to_string());
}

#[tokio::test]
async fn test_missing_fields_are_named_and_nothing_is_stored() {
    let harness = Harness::new();

    let err = harness
        .service
        .create_appointment(CreateAppointmentInput {
            event_id: Some(EVENT.into()),
            exhibitor_id: Some(EXHIBITOR.into()),
            ..CreateAppointmentInput::default()
        })
        .await
        .unwrap_err();

    assert_eq!(err.code(), "VALIDATION_ERROR");
    assert_eq!(
        err.fields(),
        vec!["requesterId", "title", "requestedDate", "requestedTime"]
    );
    assert!(harness.repository.is_empty());
    assert_eq!(harness.events.calls(), 0, "validation runs before any lookup");
}

#[tokio::test]
async fn test_impossible_calendar_date_is_rejected() {
    let harness = Harness::new();
    let mut input = create_input(REQUESTER, EXHIBITOR, "09:00");
    input.requested_date = Some("2025-02-30".into());

    let err = harness.service.create_appointment(input).await.unwrap_err();

    assert_eq!(err.fields(), vec!["requestedDate"]);
    assert!(harness.repository.is_empty());
}

#[tokio::test]
async fn test_unknown_event_is_not_found() {
    let harness = Harness::new();
    let mut input = create_input(REQUESTER, EXHIBITOR, "09:00");
    input.event_id = Some("E404".into());

    let err = harness.service.create_appointment(input).await.unwrap_err();

    assert!(matches!(
        err,
        BookingError::NotFound {
            kind: ResourceKind::Event,
            ..
        }
    ));
    assert!(harness.repository.is_empty());
}

#[tokio::test]
async fn test_unknown_exhibitor_is_not_found_and_creates_nothing() {
    let harness = Harness::new();

    let err = harness
        .service
        .create_appointment(create_input(REQUESTER, "X404", "09:00"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        BookingError::NotFound {
            kind: ResourceKind::User,
            id: "X404".into(),
            role: Some(Role::Exhibitor),
        }
    );
    assert_eq!(err.fields(), vec!["exhibitorId"]);
    assert!(harness.repository.is_empty());
}

#[tokio::test]
async fn test_unknown_requester_is_reported_before_exhibitor() {
    let harness = Harness::new();

    let err = harness
        .service
        .create_appointment(create_input("R404", "X404", "09:00"))
        .await
        .unwrap_err();

    assert_eq!(err.fields(), vec!["requesterId"]);
}

#[tokio::test]
async fn test_second_booking_of_same_slot_conflicts() {
    let harness = Harness::new();
    harness.book(REQUESTER, "09:00").await;
    harness.settle().await;

    let err = harness
        .service
        .create_appointment(create_input(OTHER_REQUESTER, EXHIBITOR, "09:00"))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "CONFLICT");
    assert_eq!(harness.repository.len(), 1);

    harness.settle().await;
    assert_eq!(harness.notifications.delivered().len(), 1, "a refused booking notifies nobody");
}

#[tokio::test]
async fn test_time_format_does_not_defeat_slot_uniqueness() {
    let harness = Harness::new();
    harness.book(REQUESTER, "09:00").await;

    let err = harness
        .service
        .create_appointment(create_input(OTHER_REQUESTER, EXHIBITOR, "09:00:00"))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "CONFLICT");
}

// ============================================================================
// Transitions
// ============================================================================

#[tokio::test]
async fn test_every_status_pair_follows_the_transition_table() {
    for &from in AppointmentStatus::ALL {
        for &to in AppointmentStatus::ALL {
            let harness = Harness::new();
            let before = appointment_in(&harness, from).await;

            let result = harness.update(before.id, EXHIBITOR, request_for(to)).await;

            if ALLOWED.contains(&(from, to)) {
                let after = result.unwrap_or_else(|err| panic!("{from} -> {to} failed: {err}"));
                assert_eq!(after.status, to, "{from} -> {to}");
                assert_eq!(after.version, before.version + 1);
            } else {
                assert_eq!(
                    result.unwrap_err(),
                    BookingError::InvalidTransition { from, to },
                    "{from} -> {to}"
                );
                assert_eq!(harness.stored(before.id).await, before, "{from} -> {to} changed the record");
            }
        }
    }
}

#[tokio::test]
async fn test_stranger_is_refused_for_every_status() {
    for &from in AppointmentStatus::ALL {
        let harness = Harness::new();
        let before = appointment_in(&harness, from).await;

        for &to in AppointmentStatus::ALL {
            let err = harness
                .update(before.id, STRANGER, request_for(to))
                .await
                .unwrap_err();
            assert_eq!(
                err,
                BookingError::Permission {
                    user_id: STRANGER.into()
                },
                "{from} -> {to}"
            );
        }

        let err = harness
            .update(
                before.id,
                STRANGER,
                UpdateAppointmentInput {
                    notes: Some("sneaky".into()),
                    ..UpdateAppointmentInput::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PERMISSION_DENIED");
        assert_eq!(harness.stored(before.id).await, before);
    }
}

#[tokio::test]
async fn test_exhibitor_only_transitions_refuse_the_requester() {
    let harness = Harness::new();
    let pending = harness.book(REQUESTER, "09:00").await;

    let err = harness
        .update(pending.id, REQUESTER, status("CONFIRMED"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "PERMISSION_DENIED");

    harness
        .update(pending.id, EXHIBITOR, status("CONFIRMED"))
        .await
        .unwrap();

    for target in ["COMPLETED", "NO_SHOW"] {
        let err = harness
            .update(pending.id, REQUESTER, status(target))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "PERMISSION_DENIED", "{target}");
    }
}

#[tokio::test]
async fn test_cancellation_records_who_when_and_why() {
    let harness = Harness::new();
    let booked = harness.book(REQUESTER, "09:00").await;

    let err = harness
        .update(booked.id, REQUESTER, status("CANCELLED"))
        .await
        .unwrap_err();
    assert_eq!(err.fields(), vec!["cancellationReason"]);

    let cancelled = harness
        .update(booked.id, REQUESTER, cancel("flight moved"))
        .await
        .unwrap();

    assert_eq!(cancelled.status, Cancelled);
    assert_eq!(cancelled.cancelled_by, Some(UserId::new(REQUESTER)));
    assert!(cancelled.cancelled_at.is_some());
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("flight moved"));

    harness.settle().await;
    let last = harness.notifications.delivered().pop().unwrap();
    assert_eq!(last.kind, NotificationKind::AppointmentCancelled);
    assert_eq!(last.user_id.as_str(), EXHIBITOR);
}

#[tokio::test]
async fn test_completion_records_outcome() {
    let harness = Harness::new();
    let booked = harness.book(REQUESTER, "09:00").await;
    harness
        .update(booked.id, EXHIBITOR, status("CONFIRMED"))
        .await
        .unwrap();

    let completed = harness
        .update(
            booked.id,
            EXHIBITOR,
            UpdateAppointmentInput {
                status: Some("COMPLETED".into()),
                outcome: Some("Signed a pilot".into()),
                ..UpdateAppointmentInput::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(completed.status, Completed);
    assert_eq!(completed.outcome.as_deref(), Some("Signed a pilot"));
}

#[tokio::test]
async fn test_empty_update_is_a_validation_error() {
    let harness = Harness::new();
    let booked = harness.book(REQUESTER, "09:00").await;

    let err = harness
        .update(booked.id, REQUESTER, UpdateAppointmentInput::default())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_unknown_appointment_is_not_found() {
    let harness = Harness::new();

    let err = harness
        .update(appointments::AppointmentId::new(), EXHIBITOR, status("CONFIRMED"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BookingError::NotFound {
            kind: ResourceKind::Appointment,
            ..
        }
    ));
}

#[tokio::test]
async fn test_lifecycle_field_rules_apply_after_load_and_permission() {
    let harness = Harness::new();
    let booked = harness.book(REQUESTER, "09:00").await;

    let err = harness
        .update(
            booked.id,
            STRANGER,
            UpdateAppointmentInput {
                status: Some("COMPLETED".into()),
                cancellation_reason: Some("x".into()),
                ..UpdateAppointmentInput::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "PERMISSION_DENIED");

    let err = harness
        .update(
            appointments::AppointmentId::new(),
            STRANGER,
            UpdateAppointmentInput {
                confirmed_date: Some("2025-03-11".into()),
                ..UpdateAppointmentInput::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");

    let err = harness
        .update(
            booked.id,
            EXHIBITOR,
            UpdateAppointmentInput {
                confirmed_date: Some("2025-03-11".into()),
                ..UpdateAppointmentInput::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.fields(), vec!["confirmedDate"]);
    assert_eq!(harness.stored(booked.id).await, booked);
}

// ============================================================================
// Slot re-checks
// ============================================================================

#[tokio::test]
async fn test_reschedule_into_taken_slot_conflicts_and_changes_nothing() {
    let harness = Harness::new();
    let a1 = harness.book(REQUESTER, "09:00").await;
    let a2 = harness.book(OTHER_REQUESTER, "10:00").await;
    harness
        .update(a2.id, EXHIBITOR, status("CONFIRMED"))
        .await
        .unwrap();

    let err = harness
        .update(a1.id, REQUESTER, reschedule("10:00"))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "CONFLICT");
    let stored = harness.stored(a1.id).await;
    assert_eq!(stored, a1);
    assert_eq!(stored.status, Pending);
    assert_eq!(stored.occupied_slot().time, time(9, 0));
}

#[tokio::test]
async fn test_reschedule_frees_the_original_slot() {
    let harness = Harness::new();
    let a1 = harness.book(REQUESTER, "09:00").await;

    let moved = harness
        .update(a1.id, EXHIBITOR, reschedule("11:30"))
        .await
        .unwrap();
    assert_eq!(moved.status, Rescheduled);
    assert_eq!(moved.confirmed_time, Some(time(11, 30)));

    harness.book(OTHER_REQUESTER, "09:00").await;

    let err = harness
        .service
        .create_appointment(create_input(OTHER_REQUESTER, EXHIBITOR, "11:30"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "CONFLICT");
}

#[tokio::test]
async fn test_confirming_a_reschedule_keeps_the_new_slot() {
    let harness = Harness::new();
    let a1 = harness.book(REQUESTER, "09:00").await;
    harness
        .update(a1.id, REQUESTER, reschedule("14:00"))
        .await
        .unwrap();

    let confirmed = harness
        .update(a1.id, EXHIBITOR, status("CONFIRMED"))
        .await
        .unwrap();

    assert_eq!(confirmed.confirmed_time, Some(time(14, 0)));
    assert_eq!(confirmed.requested_time, time(9, 0));
}

#[tokio::test]
async fn test_cancellation_then_rebooking_same_slot() {
    let harness = Harness::new();
    let a1 = harness.book(REQUESTER, "09:00").await;
    harness
        .update(a1.id, REQUESTER, cancel("cannot make it"))
        .await
        .unwrap();

    let rebooked = harness.book(OTHER_REQUESTER, "09:00").await;

    assert_eq!(rebooked.status, Pending);
    assert_eq!(harness.repository.len(), 2);
    assert_eq!(harness.stored(a1.id).await.status, Cancelled);
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn test_listing_is_newest_first_and_idempotent() {
    let harness = Harness::new();
    let first = harness.book(REQUESTER, "09:00").await;
    let second = harness.book(OTHER_REQUESTER, "10:00").await;
    let third = harness.book(REQUESTER, "11:00").await;

    let filter = ListFilter::Exhibitor(UserId::new(EXHIBITOR));
    let once = harness.service.list_appointments(&filter).await.unwrap();
    let twice = harness.service.list_appointments(&filter).await.unwrap();

    assert_eq!(once, twice);
    let ids: Vec<_> = once.iter().map(|view| view.appointment.id).collect();
    assert_eq!(ids, vec![third.id, second.id, first.id]);
}

#[tokio::test]
async fn test_listing_attaches_counterpart_profiles() {
    let harness = Harness::new();
    harness.book(REQUESTER, "09:00").await;
    harness.book(OTHER_REQUESTER, "10:00").await;
    harness.book(REQUESTER, "11:00").await;
    let lookups_before = harness.identity.calls();

    let exhibitor_view = harness
        .service
        .list_appointments(&ListFilter::Exhibitor(UserId::new(EXHIBITOR)))
        .await
        .unwrap();
    assert_eq!(
        harness.identity.calls() - lookups_before,
        2,
        "one lookup per distinct requester"
    );
    for view in &exhibitor_view {
        let profile = view.requester_profile.as_ref().unwrap();
        assert_eq!(profile.id, view.appointment.requester_id);
        assert!(view.exhibitor_profile.is_none());
    }

    let requester_view = harness
        .service
        .list_appointments(&ListFilter::Requester(UserId::new(REQUESTER)))
        .await
        .unwrap();
    assert_eq!(requester_view.len(), 2);
    let profile = requester_view[0].exhibitor_profile.as_ref().unwrap();
    assert_eq!(profile.name, "Xavier Exhibitor");
    assert_eq!(profile.company.as_deref(), Some("Booth Co"));
    assert!(requester_view[0].requester_profile.is_none());

    let event_view = harness
        .service
        .list_appointments(&ListFilter::Event(appointments::EventId::new(EVENT)))
        .await
        .unwrap();
    assert_eq!(event_view.len(), 3);
    assert!(
        event_view
            .iter()
            .all(|view| view.requester_profile.is_some() && view.exhibitor_profile.is_some())
    );
}

#[tokio::test]
async fn test_listing_without_matches_is_empty() {
    let harness = Harness::new();
    harness.book(REQUESTER, "09:00").await;

    let views = harness
        .service
        .list_appointments(&ListFilter::Exhibitor(UserId::new("X-nobody")))
        .await
        .unwrap();

    assert!(views.is_empty());
}

#[tokio::test]
async fn test_listing_survives_a_vanished_counterpart() {
    use appointments::providers::AppointmentRepository;
    use appointments::{Appointment, AppointmentId, RequesterSnapshot};

    let harness = Harness::new();
    let draft = create_input("R-gone", EXHIBITOR, "16:00").into_draft().unwrap();
    let orphan = Appointment::from_draft(
        AppointmentId::new(),
        draft,
        RequesterSnapshot::default(),
        chrono::Utc::now(),
    );
    harness.repository.insert(&orphan).await.unwrap();

    let views = harness
        .service
        .list_appointments(&ListFilter::Exhibitor(UserId::new(EXHIBITOR)))
        .await
        .unwrap();

    assert_eq!(views.len(), 1);
    assert!(views[0].requester_profile.is_none());
}

// ============================================================================
// Dependencies
// ============================================================================

#[tokio::test]
async fn test_slow_identity_lookup_times_out() {
    let harness = Harness::with_timeouts(Timeouts {
        identity: Duration::from_millis(50),
        ..Timeouts::uniform(Duration::from_millis(500))
    });
    harness.identity.set_delay(Some(Duration::from_millis(400)));

    let err = harness
        .service
        .create_appointment(create_input(REQUESTER, EXHIBITOR, "09:00"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        BookingError::DependencyTimeout {
            dependency: Dependency::IdentityLookup
        }
    );
    assert!(err.is_retryable());
    assert!(harness.repository.is_empty());
}

#[tokio::test]
async fn test_slow_event_registry_times_out() {
    let harness = Harness::with_timeouts(Timeouts {
        event_registry: Duration::from_millis(50),
        ..Timeouts::uniform(Duration::from_millis(500))
    });
    harness.events.set_delay(Some(Duration::from_millis(400)));

    let err = harness
        .service
        .create_appointment(create_input(REQUESTER, EXHIBITOR, "09:00"))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "DEPENDENCY_TIMEOUT");
    assert_eq!(harness.identity.calls(), 0);
}

#[tokio::test]
async fn test_failing_event_registry_is_a_dependency_error() {
    let harness = Harness::new();
    harness
        .events
        .set_failure(Some(ProviderError::Unavailable("registry down".into())));

    let err = harness
        .service
        .create_appointment(create_input(REQUESTER, EXHIBITOR, "09:00"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BookingError::Dependency {
            dependency: Dependency::EventRegistry,
            ..
        }
    ));
    assert!(harness.repository.is_empty());
}

#[tokio::test]
async fn test_notification_failure_never_fails_the_booking() {
    let harness = Harness::new();
    harness
        .notifications
        .fail_with(ProviderError::Unavailable("smtp relay down".into()));

    let created = harness.book(REQUESTER, "09:00").await;
    let confirmed = harness
        .update(created.id, EXHIBITOR, status("CONFIRMED"))
        .await
        .unwrap();
    harness.settle().await;

    assert_eq!(confirmed.status, Confirmed);
    assert!(harness.notifications.delivered().is_empty());
    assert_eq!(harness.notifications.attempts(), 6, "two notifications, three attempts each");
}

#[tokio::test]
async fn test_transient_notification_failure_is_retried() {
    let harness = Harness::new();
    harness
        .notifications
        .fail_times(1, ProviderError::Unavailable("busy".into()));

    harness.book(REQUESTER, "09:00").await;
    harness.settle().await;

    assert_eq!(harness.notifications.delivered().len(), 1);
    assert_eq!(harness.notifications.attempts(), 2);
}

#[tokio::test]
async fn test_rejected_notification_is_not_retried() {
    let harness = Harness::new();
    harness.notifications.fail_with(ProviderError::Rejected {
        status: 400,
        message: "unknown user".into(),
    });

    harness.book(REQUESTER, "09:00").await;
    harness.settle().await;

    assert_eq!(harness.notifications.attempts(), 1);
}

#[tokio::test]
async fn test_hung_notification_does_not_block_the_caller() {
    let harness = Harness::with_timeouts(Timeouts {
        notification: Duration::from_millis(50),
        ..Timeouts::uniform(Duration::from_millis(250))
    });
    harness.notifications.set_delay(Some(Duration::from_secs(10)));

    let started = std::time::Instant::now();
    harness.book(REQUESTER, "09:00").await;
    assert!(started.elapsed() < Duration::from_secs(1));

    harness.settle().await;
    assert!(harness.notifications.delivered().is_empty());
    assert_eq!(harness.repository.len(), 1);
}
