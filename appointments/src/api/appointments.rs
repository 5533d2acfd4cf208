//! Appointment API endpoints.
//!
//! - GET /api/appointments?exhibitorId=|requesterId=|eventId= - Dashboard listing
//! - POST /api/appointments - Request an appointment
//! - GET /api/appointments/:id - One appointment (parties only)
//! - PUT /api/appointments/:id - Change status, notes or outcome (parties only)

use super::caller::Caller;
use super::error::ApiError;
use crate::error::BookingError;
use crate::providers::{AppointmentRepository, EventRegistry, IdentityLookup, NotificationDispatcher};
use crate::server::state::AppState;
use crate::types::{
    Appointment, AppointmentId, AppointmentView, CreateAppointmentInput, ListFilter,
    UpdateAppointmentInput,
};
use axum::{
    Json,
    extract::{Path, Query, State, rejection::{JsonRejection, QueryRejection}},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing appointments. Exactly one must be set.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAppointmentsQuery {
    /// Appointments requested of this exhibitor
    pub exhibitor_id: Option<String>,
    /// Appointments this user requested
    pub requester_id: Option<String>,
    /// Appointments at this event
    pub event_id: Option<String>,
}

/// Response for listing appointments.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListAppointmentsResponse {
    /// Newest first
    pub appointments: Vec<AppointmentView>,
}

/// Response after requesting an appointment.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateAppointmentResponse {
    /// Always `true`; failures use the error body
    pub success: bool,
    /// The stored appointment
    pub appointment: Appointment,
}

// ============================================================================
// Handlers
// ============================================================================

/// List appointments for one dashboard view.
///
/// # Example
///
/// ```bash
/// curl "http://localhost:8080/api/appointments?exhibitorId=X1"
/// ```
pub async fn list_appointments<I, E, N, R>(
    State(state): State<AppState<I, E, N, R>>,
    query: Result<Query<ListAppointmentsQuery>, QueryRejection>,
) -> Result<Json<ListAppointmentsResponse>, ApiError>
where
    I: IdentityLookup + 'static,
    E: EventRegistry + 'static,
    N: NotificationDispatcher + 'static,
    R: AppointmentRepository + 'static,
{
    let Query(query) = query?;
    let filter = ListFilter::from_selectors(query.exhibitor_id, query.requester_id, query.event_id)?;
    let appointments = state.service.list_appointments(&filter).await?;

    Ok(Json(ListAppointmentsResponse { appointments }))
}

/// Request an appointment.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/api/appointments \
///   -H "Content-Type: application/json" \
///   -d '{
///     "eventId": "E1",
///     "exhibitorId": "X1",
///     "requesterId": "R1",
///     "title": "Intro",
///     "requestedDate": "2025-03-10",
///     "requestedTime": "09:00"
///   }'
/// ```
pub async fn create_appointment<I, E, N, R>(
    State(state): State<AppState<I, E, N, R>>,
    body: Result<Json<CreateAppointmentInput>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateAppointmentResponse>), ApiError>
where
    I: IdentityLookup + 'static,
    E: EventRegistry + 'static,
    N: NotificationDispatcher + 'static,
    R: AppointmentRepository + 'static,
{
    let Json(input) = body?;
    let appointment = state.service.create_appointment(input).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateAppointmentResponse {
            success: true,
            appointment,
        }),
    ))
}

/// Fetch one appointment as one of its parties.
///
/// # Example
///
/// ```bash
/// curl http://localhost:8080/api/appointments/550e8400-e29b-41d4-a716-446655440000 \
///   -H "X-User-Id: X1"
/// ```
pub async fn get_appointment<I, E, N, R>(
    State(state): State<AppState<I, E, N, R>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, ApiError>
where
    I: IdentityLookup + 'static,
    E: EventRegistry + 'static,
    N: NotificationDispatcher + 'static,
    R: AppointmentRepository + 'static,
{
    let id = parse_id(&id)?;
    let appointment = state.service.get_appointment(id, &caller).await?;

    Ok(Json(appointment))
}

/// Update an appointment as one of its parties.
///
/// # Example
///
/// ```bash
/// curl -X PUT http://localhost:8080/api/appointments/550e8400-e29b-41d4-a716-446655440000 \
///   -H "X-User-Id: X1" \
///   -H "Content-Type: application/json" \
///   -d '{"status": "CONFIRMED"}'
/// ```
pub async fn update_appointment<I, E, N, R>(
    State(state): State<AppState<I, E, N, R>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    body: Result<Json<UpdateAppointmentInput>, JsonRejection>,
) -> Result<Json<Appointment>, ApiError>
where
    I: IdentityLookup + 'static,
    E: EventRegistry + 'static,
    N: NotificationDispatcher + 'static,
    R: AppointmentRepository + 'static,
{
    let id = parse_id(&id)?;
    let Json(input) = body?;
    let appointment = state.service.update_appointment(id, &caller, input).await?;

    Ok(Json(appointment))
}

/// Ids that are not UUIDs cannot name a stored appointment.
fn parse_id(raw: &str) -> Result<AppointmentId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::from(BookingError::appointment_not_found(raw)))
}
