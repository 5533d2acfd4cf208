//! # Booking Testing
//!
//! Testing utilities for booking reducers and services.
//!
//! This crate provides:
//! - Deterministic clocks ([`FixedClock`], [`SteppingClock`])
//! - A Given-When-Then harness for reducers ([`ReducerTest`])
//! - Assertion helpers for effect lists
//! - One-shot tracing setup for tests that want log output
//!
//! ## Example
//!
//! ```ignore
//! use booking_testing::{ReducerTest, test_clock};
//!
//! ReducerTest::new(AppointmentReducer::new())
//!     .with_env(AppointmentEnvironment::new(Arc::new(test_clock())))
//!     .given_state(AppointmentState::default())
//!     .when_action(AppointmentAction::Request { .. })
//!     .then_state(|state| assert!(state.appointment.is_some()))
//!     .run();
//! ```

use booking_core::environment::Clock;
use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;
use std::sync::Once;


pub use reducer_test::{ReducerTest, assertions};

/// Mock implementations of environment traits
pub mod mocks {
    use super::{Clock, DateTime, Duration, Mutex, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use booking_testing::mocks::FixedClock;
    /// use booking_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that advances by a fixed step on every read.
    ///
    /// Useful where ordering by creation time matters and every record needs a
    /// distinct timestamp.
    #[derive(Debug)]
    pub struct SteppingClock {
        next: Mutex<DateTime<Utc>>,
        step: Duration,
    }

    impl SteppingClock {
        /// Start at `start` and advance by `step` after each read.
        #[must_use]
        pub const fn new(start: DateTime<Utc>, step: Duration) -> Self {
            Self {
                next: Mutex::new(start),
                step,
            }
        }
    }

    impl Clock for SteppingClock {
        fn now(&self) -> DateTime<Utc> {
            let mut next = self
                .next
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let now = *next;
            *next = now + self.step;
            now
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(DateTime::<Utc>::UNIX_EPOCH + Duration::days(20_089))
    }
}

static TRACING: Once = Once::new();

/// Install a test-friendly `tracing` subscriber once per process.
///
/// Honors `RUST_LOG`; output is captured by the test harness.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

// Re-export commonly used items
pub use mocks::{FixedClock, SteppingClock, test_clock};
