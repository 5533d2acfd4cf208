//! Business metrics for appointment booking.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `appointments_created_total` - Appointments successfully booked
//! - `appointments_conflicts_total{stage}` - Bookings refused because the slot
//!   was taken (`precheck` or `store`)
//! - `appointments_transitions_total{to}` - Status transitions by target status
//! - `appointments_rejected_total{code}` - Operations refused, by error code
//! - `appointment_notifications_total{outcome}` - Notification deliveries by
//!   outcome (`delivered`, `failed`, `timed_out`)
//!
//! ## Histograms
//! - `appointment_operation_duration_seconds{operation}` - Service call latency

use crate::providers::Delivery;
use crate::types::AppointmentStatus;
use metrics::{describe_counter, describe_histogram};

/// Register metric descriptions.
///
/// Call once at startup, after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "appointments_created_total",
        "Total number of appointments booked"
    );
    describe_counter!(
        "appointments_conflicts_total",
        "Bookings refused because the slot was already taken"
    );
    describe_counter!(
        "appointments_transitions_total",
        "Appointment status transitions by target status"
    );
    describe_counter!(
        "appointments_rejected_total",
        "Appointment operations refused, by error code"
    );
    describe_counter!(
        "appointment_notifications_total",
        "Notification deliveries by outcome"
    );
    describe_histogram!(
        "appointment_operation_duration_seconds",
        "Time spent in appointment service operations"
    );

    tracing::info!("Appointment metrics registered");
}

/// Record a booked appointment.
pub fn record_created() {
    metrics::counter!("appointments_created_total").increment(1);
}

/// Record a slot conflict detected at `stage`.
pub fn record_conflict(stage: &'static str) {
    metrics::counter!("appointments_conflicts_total", "stage" => stage).increment(1);
    tracing::debug!(stage, "Recorded slot conflict");
}

/// Record a status transition.
pub fn record_transition(to: AppointmentStatus) {
    metrics::counter!("appointments_transitions_total", "to" => to.as_str()).increment(1);
}

/// Record a refused operation.
pub fn record_rejected(code: &'static str) {
    metrics::counter!("appointments_rejected_total", "code" => code).increment(1);
}

/// Record a notification outcome.
pub fn record_notification(outcome: Delivery) {
    metrics::counter!("appointment_notifications_total", "outcome" => outcome.as_str()).increment(1);
}

/// Record how long an operation took.
pub fn record_duration(operation: &'static str, seconds: f64) {
    metrics::histogram!("appointment_operation_duration_seconds", "operation" => operation).record(seconds);
}
