//! Appointment repository implementations.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::InMemoryAppointmentRepository;
#[cfg(feature = "postgres")]
pub use postgres::PostgresAppointmentRepository;
