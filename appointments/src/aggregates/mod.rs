//! Aggregate reducers for appointment booking.
//!
//! - Appointment: lifecycle state machine, transition permissions and the
//!   notifications each transition triggers

pub mod appointment;

pub use appointment::{
    AppointmentAction, AppointmentEnvironment, AppointmentReducer, AppointmentState,
    commands_for_update,
};
