//! Exhibitor appointment booking.
//!
//! Visitors request short meetings with exhibitors at an event; exhibitors
//! accept, move or decline them. This crate is the booking core behind the
//! visitor, exhibitor and admin dashboards:
//!
//! - **Slot uniqueness**: at most one non-cancelled appointment per
//!   `(event, exhibitor, date, time)`, even under concurrent requests
//! - **Lifecycle state machine**: one transition table decides who may move
//!   an appointment where
//! - **Best-effort notifications**: the counterpart is told about every
//!   booking and transition, without ever failing the operation
//!
//! # Architecture
//!
//! ```text
//!         HTTP (axum)                       api / server
//!              │
//!              ▼
//!   ┌────────────────────┐   validate → resolve → reduce → persist → notify
//!   │ AppointmentService │
//!   └────────────────────┘
//!     │       │       │
//!     │       │       └──────────────┐
//!     ▼       ▼                      ▼
//! Identity  Event     ┌──────────────────────┐     ┌──────────────┐
//! Lookup    Registry  │ AppointmentReducer   │────▶│ EffectRunner │──▶ Notification
//!                     │ (state machine)      │     └──────────────┘    Dispatcher
//!                     └──────────────────────┘
//!                                │
//!                                ▼
//!                     ┌──────────────────────┐
//!                     │ AppointmentRepository│  partial unique index on the
//!                     │ (memory / postgres)  │  occupied slot, version CAS
//!                     └──────────────────────┘
//! ```
//!
//! # Lifecycle
//!
//! ```text
//! PENDING ──▶ CONFIRMED ──▶ COMPLETED
//!    │  ▲         │  └────▶ NO_SHOW
//!    │  │         ▼
//!    │  │     CANCELLED ◀── (PENDING, RESCHEDULED)
//!    ▼  │
//! RESCHEDULED
//! ```
//!
//! See [`aggregates::appointment`] for the reducer and its tests, and
//! [`service::AppointmentService`] for the public operations.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aggregates;
pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;
pub mod providers;
pub mod server;
pub mod service;
pub mod slots;
pub mod stores;
pub mod types;

pub use aggregates::{AppointmentAction, AppointmentReducer, AppointmentState};
pub use config::Config;
pub use error::{BookingError, Result};
pub use service::AppointmentService;
pub use types::*;
