//! Health check endpoints.

use super::state::AppState;
use crate::providers::{AppointmentRepository, EventRegistry, IdentityLookup, NotificationDispatcher};
use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
}

/// Liveness check. Does not touch dependencies.
///
/// # Example
///
/// ```bash
/// curl http://localhost:8080/health
/// # {"status":"ok","version":"0.1.0"}
/// ```
pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Readiness check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessResponse {
    /// Overall readiness status
    pub ready: bool,
    /// Appointment store answered within its deadline
    pub store: bool,
    /// Notification effects still running
    pub pending_notifications: usize,
}

/// Readiness check.
///
/// Returns 503 when the appointment store does not answer within its deadline.
///
/// # Example
///
/// ```bash
/// curl http://localhost:8080/ready
/// # {"ready":true,"store":true,"pending_notifications":0}
/// ```
pub async fn readiness_check<I, E, N, R>(
    State(state): State<AppState<I, E, N, R>>,
) -> (StatusCode, Json<ReadinessResponse>)
where
    I: IdentityLookup + 'static,
    E: EventRegistry + 'static,
    N: NotificationDispatcher + 'static,
    R: AppointmentRepository + 'static,
{
    let store = match state.service.ready().await {
        Ok(()) => true,
        Err(error) => {
            tracing::warn!(%error, "Readiness check failed");
            false
        },
    };
    let status = if store {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            ready: store,
            store,
            pending_notifications: state.service.runner().pending_effects(),
        }),
    )
}
