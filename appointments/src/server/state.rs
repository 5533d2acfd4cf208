//! Application state for the appointment HTTP server.

use crate::service::AppointmentService;

/// Application state shared across all HTTP handlers.
///
/// Cloned per request; the service inside is a bundle of `Arc`s.
pub struct AppState<I, E, N, R> {
    /// Appointment operations
    pub service: AppointmentService<I, E, N, R>,
}

impl<I, E, N, R> AppState<I, E, N, R> {
    /// Create a new application state.
    #[must_use]
    pub const fn new(service: AppointmentService<I, E, N, R>) -> Self {
        Self { service }
    }
}

impl<I, E, N, R> Clone for AppState<I, E, N, R> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
        }
    }
}
