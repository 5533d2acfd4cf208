//! # Booking Core
//!
//! Core traits and types for the exhibitor booking subsystem.
//!
//! Business rules are written as reducers: pure functions that take the current
//! state and an action, mutate the state in place and hand back a list of effect
//! *descriptions*. Nothing in this crate performs I/O. Effects are executed by the
//! runtime crate after the caller has decided to commit the new state.
//!
//! ## Core Concepts
//!
//! - **State**: the domain state a reducer works on (e.g. one appointment)
//! - **Action**: commands (requests to change state) and events (facts)
//! - **Reducer**: `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: a side effect to run later, such as a notification
//! - **Environment**: injected dependencies (clock, collaborators)
//!
//! ## Example
//!
//! ```ignore
//! use booking_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
//!
//! impl Reducer for AppointmentReducer {
//!     type State = AppointmentState;
//!     type Action = AppointmentAction;
//!     type Environment = AppointmentEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut AppointmentState,
//!         action: AppointmentAction,
//!         env: &AppointmentEnvironment,
//!     ) -> SmallVec<[Effect<AppointmentAction>; 4]> {
//!         smallvec![Effect::None]
//!     }
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{smallvec, SmallVec};

/// Reducer module - the core trait for business logic.
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`.
/// They are deterministic given the environment, which makes them testable without
/// any runtime.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// Implementations validate the action, update `state` in place and return
        /// the effects to run once the new state has been accepted. Most actions
        /// produce at most a handful of effects, hence the inline capacity.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - side effect descriptions.
///
/// Effects are values, not execution. A reducer builds them; the runtime decides
/// when (and whether) they run.
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;

    /// Boxed future carried by [`Effect::Future`].
    pub type EffectFuture<Action> = Pin<Box<dyn Future<Output = Option<Action>> + Send>>;

    /// Effect type - describes a side effect to be executed
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type an effect may produce as feedback
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects concurrently
        Parallel(Vec<Effect<Action>>),

        /// Run effects one after another
        Sequential(Vec<Effect<Action>>),

        /// Arbitrary async computation
        ///
        /// Resolves to `Option<Action>`. The runner does not route actions back
        /// into a reducer; a `Some` is logged and dropped.
        Future(EffectFuture<Action>),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Self::None => write!(f, "Effect::None"),
                Self::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Self::Sequential(effects) => {
                    f.debug_tuple("Effect::Sequential").field(effects).finish()
                },
                Self::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Wrap an async block that produces no feedback action.
        #[must_use]
        pub fn fire_and_forget<F>(fut: F) -> Self
        where
            F: Future<Output = ()> + Send + 'static,
        {
            Self::Future(Box::pin(async move {
                fut.await;
                None
            }))
        }

        /// Combine effects to run in parallel
        #[must_use]
        pub const fn merge(effects: Vec<Self>) -> Self {
            Self::Parallel(effects)
        }

        /// Chain effects to run sequentially
        #[must_use]
        pub const fn chain(effects: Vec<Self>) -> Self {
            Self::Sequential(effects)
        }

        /// Whether running this effect would do nothing at all.
        #[must_use]
        pub fn is_noop(&self) -> bool {
            match self {
                Self::None => true,
                Self::Parallel(effects) | Self::Sequential(effects) => {
                    effects.iter().all(Self::is_noop)
                },
                Self::Future(_) => false,
            }
        }

        /// Number of `Future` leaves contained in this effect tree.
        #[must_use]
        pub fn future_count(&self) -> usize {
            match self {
                Self::None => 0,
                Self::Parallel(effects) | Self::Sequential(effects) => {
                    effects.iter().map(Self::future_count).sum()
                },
                Self::Future(_) => 1,
            }
        }
    }
}

/// Environment module - dependency injection traits.
///
/// Every dependency a reducer needs is abstracted behind a trait and injected via
/// the reducer's `Environment`.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// Production code uses [`SystemClock`]; tests use a fixed or stepping clock so
    /// timestamps (and therefore `createdAt` ordering) are deterministic.
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time from the operating system.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::effect::Effect;
    use super::environment::{Clock, SystemClock};

    #[test]
    fn test_noop_detection() {
        let effect: Effect<()> = Effect::merge(vec![Effect::None, Effect::chain(vec![])]);
        assert!(effect.is_noop());
        assert_eq!(effect.future_count(), 0);
    }

    #[test]
    fn test_future_count_walks_nested_effects() {
        let effect: Effect<()> = Effect::merge(vec![
            Effect::fire_and_forget(async {}),
            Effect::chain(vec![Effect::None, Effect::fire_and_forget(async {})]),
        ]);
        assert!(!effect.is_noop());
        assert_eq!(effect.future_count(), 2);
    }

    #[test]
    fn test_debug_hides_future_body() {
        let effect: Effect<()> = Effect::fire_and_forget(async {});
        assert_eq!(format!("{effect:?}"), "Effect::Future(<future>)");
    }

    #[tokio::test]
    async fn test_fire_and_forget_produces_no_action() {
        let effect: Effect<u8> = Effect::fire_and_forget(async {});
        let Effect::Future(fut) = effect else {
            unreachable!("fire_and_forget always builds a future effect");
        };
        assert_eq!(fut.await, None);
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }
}
