//! HTTP API for appointments.
//!
//! - Appointments: list, create, fetch and update
//! - Caller: the `X-User-Id` extractor
//! - Error: rendering of domain errors as JSON responses

pub mod appointments;
pub mod caller;
pub mod error;

pub use appointments::{create_appointment, get_appointment, list_appointments, update_appointment};
pub use caller::{Caller, USER_ID_HEADER};
pub use error::{ApiError, ErrorBody};
