//! Router configuration for the appointment service.

use super::health::{health_check, readiness_check};
use super::state::AppState;
use crate::api::appointments;
use crate::providers::{AppointmentRepository, EventRegistry, IdentityLookup, NotificationDispatcher};
use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// - `GET /health`, `GET /ready`
/// - `GET|POST /api/appointments`
/// - `GET|PUT /api/appointments/:id`
pub fn build_router<I, E, N, R>(state: AppState<I, E, N, R>) -> Router
where
    I: IdentityLookup + 'static,
    E: EventRegistry + 'static,
    N: NotificationDispatcher + 'static,
    R: AppointmentRepository + 'static,
{
    let api_routes = Router::new()
        .route(
            "/appointments",
            get(appointments::list_appointments::<I, E, N, R>)
                .post(appointments::create_appointment::<I, E, N, R>),
        )
        .route(
            "/appointments/:id",
            get(appointments::get_appointment::<I, E, N, R>)
                .put(appointments::update_appointment::<I, E, N, R>),
        );

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check::<I, E, N, R>))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
