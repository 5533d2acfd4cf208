//! Appointment service: the public operations.
//!
//! Each operation follows the same shape:
//! 1. Validate the raw input into domain types
//! 2. Resolve references through the collaborators, each under its own deadline
//! 3. Run the state machine on a candidate copy of the appointment
//! 4. Persist the candidate (the repository enforces slot uniqueness)
//! 5. Hand the reducer's notification effects to the runtime
//!
//! Nothing is written when any step before 4 fails, and nothing is notified
//! unless the write succeeded.

use crate::aggregates::{
    AppointmentAction, AppointmentEnvironment, AppointmentReducer, AppointmentState,
    commands_for_update,
};
use crate::config::Timeouts;
use crate::error::{BookingError, Dependency, Result};
use crate::providers::{
    AppointmentRepository, EventRegistry, EventSummary, IdentityLookup, NotificationDispatcher,
    Notifier, ProviderError, RepositoryError, UserProfile,
};
use crate::slots::SlotConflictChecker;
use crate::types::{
    Appointment, AppointmentChanges, AppointmentId, AppointmentView, CreateAppointmentInput,
    EventId, ListFilter, ParticipantSummary, Role, UpdateAppointmentInput, UserId,
};
use booking_core::effect::Effect;
use booking_core::environment::Clock;
use booking_core::reducer::Reducer;
use booking_runtime::retry::RetryPolicy;
use booking_runtime::{EffectRunner, deadline};
use futures::future::join_all;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Attempts at a versioned update before a concurrent writer wins
const UPDATE_ATTEMPTS: usize = 2;

/// Outcome of one optimistic update attempt
enum Attempt {
    Done(Appointment),
    Stale { expected: u64, actual: u64 },
}

/// Appointment booking operations over injected collaborators.
///
/// Generic over the identity lookup `I`, event registry `E`, notification
/// dispatcher `N` and repository `R` so tests can run it against in-memory
/// doubles and production against HTTP adapters and `PostgreSQL`.
pub struct AppointmentService<I, E, N, R> {
    identity: Arc<I>,
    events: Arc<E>,
    repository: Arc<R>,
    slots: SlotConflictChecker<R>,
    reducer: AppointmentReducer<N>,
    env: AppointmentEnvironment<N>,
    runner: EffectRunner<AppointmentAction>,
    timeouts: Timeouts,
}

impl<I, E, N, R> Clone for AppointmentService<I, E, N, R> {
    fn clone(&self) -> Self {
        Self {
            identity: Arc::clone(&self.identity),
            events: Arc::clone(&self.events),
            repository: Arc::clone(&self.repository),
            slots: self.slots.clone(),
            reducer: self.reducer.clone(),
            env: self.env.clone(),
            runner: self.runner.clone(),
            timeouts: self.timeouts,
        }
    }
}

impl<I, E, N, R> AppointmentService<I, E, N, R>
where
    I: IdentityLookup,
    E: EventRegistry,
    N: NotificationDispatcher + 'static,
    R: AppointmentRepository,
{
    /// Wire the service to its collaborators.
    ///
    /// `retry` governs notification delivery only; every other call fails
    /// fast and leaves retrying to the caller.
    #[must_use]
    pub fn new(
        identity: Arc<I>,
        events: Arc<E>,
        notifications: Arc<N>,
        repository: Arc<R>,
        clock: Arc<dyn Clock>,
        timeouts: Timeouts,
        retry: RetryPolicy,
    ) -> Self {
        let notifier = Notifier::new(notifications, retry, timeouts.notification);
        Self {
            identity,
            events,
            slots: SlotConflictChecker::new(Arc::clone(&repository), timeouts.store),
            repository,
            reducer: AppointmentReducer::new(),
            env: AppointmentEnvironment::new(clock, notifier),
            runner: EffectRunner::new(),
            timeouts,
        }
    }

    /// Runner executing notification effects, for draining at shutdown
    #[must_use]
    pub const fn runner(&self) -> &EffectRunner<AppointmentAction> {
        &self.runner
    }

    /// Configured deadlines
    #[must_use]
    pub const fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Appointments matching `filter`, newest first, with counterpart display
    /// fields attached.
    ///
    /// # Errors
    ///
    /// - `DependencyTimeout` / `Dependency` if the store or identity lookup
    ///   cannot answer
    /// - `Storage` on repository failure
    #[tracing::instrument(skip_all, fields(operation = "list", ?filter))]
    pub async fn list_appointments(&self, filter: &ListFilter) -> Result<Vec<AppointmentView>> {
        let started = Instant::now();
        let result = self.list_inner(filter).await;
        observe("list", started, &result);
        result
    }

    async fn list_inner(&self, filter: &ListFilter) -> Result<Vec<AppointmentView>> {
        let appointments = self.store(self.repository.list(filter)).await??;

        let (want_requester, want_exhibitor) = match filter {
            ListFilter::Exhibitor(_) => (true, false),
            ListFilter::Requester(_) => (false, true),
            ListFilter::Event(_) => (true, true),
        };

        let mut wanted = BTreeSet::new();
        for appointment in &appointments {
            if want_requester {
                wanted.insert(appointment.requester_id.clone());
            }
            if want_exhibitor {
                wanted.insert(appointment.exhibitor_id.clone());
            }
        }

        let lookups = join_all(wanted.into_iter().map(|id| async move {
            let profile = self.lookup_user(&id).await;
            (id, profile)
        }))
        .await;

        let mut profiles: HashMap<UserId, ParticipantSummary> = HashMap::new();
        for (id, profile) in lookups {
            match profile? {
                Some(profile) => {
                    profiles.insert(id, profile.summary());
                },
                None => tracing::debug!(user_id = %id, "Counterpart not found, listing without profile"),
            }
        }

        let views: Vec<AppointmentView> = appointments
            .into_iter()
            .map(|appointment| AppointmentView {
                requester_profile: want_requester
                    .then(|| profiles.get(&appointment.requester_id).cloned())
                    .flatten(),
                exhibitor_profile: want_exhibitor
                    .then(|| profiles.get(&appointment.exhibitor_id).cloned())
                    .flatten(),
                appointment,
            })
            .collect();

        tracing::debug!(?filter, count = views.len(), "Listed appointments");
        Ok(views)
    }

    /// Book a new appointment in `PENDING` and notify the exhibitor.
    ///
    /// # Errors
    ///
    /// - `Validation` for missing or malformed fields
    /// - `NotFound` for an unknown event, requester or exhibitor
    /// - `Conflict` if an active appointment already holds the slot
    /// - `DependencyTimeout` / `Dependency` / `Storage` if a collaborator fails
    #[tracing::instrument(skip_all, fields(operation = "create"))]
    pub async fn create_appointment(&self, input: CreateAppointmentInput) -> Result<Appointment> {
        let started = Instant::now();
        let result = self.create_inner(input).await;
        observe("create", started, &result);
        result
    }

    async fn create_inner(&self, input: CreateAppointmentInput) -> Result<Appointment> {
        let draft = input.into_draft()?;

        let event = self
            .lookup_event(&draft.event_id)
            .await?
            .ok_or_else(|| BookingError::event_not_found(&draft.event_id))?;

        let requester = self
            .lookup_user(&draft.requester_id)
            .await?
            .ok_or_else(|| BookingError::user_not_found(&draft.requester_id, Role::Requester))?;

        if self.lookup_user(&draft.exhibitor_id).await?.is_none() {
            return Err(BookingError::user_not_found(&draft.exhibitor_id, Role::Exhibitor));
        }

        let slot = draft.slot();
        self.slots.ensure_free(&slot, None).await?;

        let mut state = AppointmentState::new();
        let effects = self.reducer.reduce(
            &mut state,
            AppointmentAction::Request {
                id: AppointmentId::new(),
                draft,
                requester: requester.snapshot(),
            },
            &self.env,
        );
        if let Some(error) = state.last_error.take() {
            return Err(error);
        }
        let Some(candidate) = state.appointment else {
            return Err(BookingError::Storage {
                message: "booking produced no appointment".to_string(),
            });
        };

        let stored = match self.store(self.repository.insert(&candidate)).await? {
            Ok(stored) => stored,
            Err(RepositoryError::SlotTaken(_)) => {
                crate::metrics::record_conflict("store");
                return Err(BookingError::slot_taken(&slot));
            },
            Err(err) => return Err(err.into()),
        };

        self.runner.run(effects);
        crate::metrics::record_created();
        tracing::info!(
            appointment_id = %stored.id,
            event = %event.title,
            %slot,
            "Appointment requested"
        );

        Ok(stored)
    }

    /// Apply a status change and/or detail edits on behalf of `caller`.
    ///
    /// A concurrent write to the same appointment causes one full replay
    /// (reload, permission, state machine, slot check); a second collision is
    /// reported as `Conflict`.
    ///
    /// # Errors
    ///
    /// - `Validation` for malformed or empty updates
    /// - `NotFound` if the appointment does not exist
    /// - `Permission` if `caller` is not a party, or not the party the
    ///   transition requires
    /// - `InvalidTransition` for a move the lifecycle does not allow
    /// - `Conflict` if the new slot is held or a concurrent writer won twice
    /// - `DependencyTimeout` / `Storage` if the store fails
    #[tracing::instrument(skip_all, fields(operation = "update", appointment_id = %id, caller = %caller))]
    pub async fn update_appointment(
        &self,
        id: AppointmentId,
        caller: &UserId,
        input: UpdateAppointmentInput,
    ) -> Result<Appointment> {
        let started = Instant::now();
        let result = self.update_inner(id, caller, input).await;
        observe("update", started, &result);
        result
    }

    async fn update_inner(
        &self,
        id: AppointmentId,
        caller: &UserId,
        input: UpdateAppointmentInput,
    ) -> Result<Appointment> {
        let changes = input.into_changes()?;

        for attempt in 1..=UPDATE_ATTEMPTS {
            match self.attempt_update(id, caller, changes.clone()).await? {
                Attempt::Done(appointment) => return Ok(appointment),
                Attempt::Stale { expected, actual } => {
                    tracing::warn!(attempt, expected, actual, "Appointment changed underneath update");
                },
            }
        }

        Err(BookingError::Conflict {
            message: format!("appointment {id} was modified concurrently, try again"),
        })
    }

    async fn attempt_update(
        &self,
        id: AppointmentId,
        caller: &UserId,
        changes: AppointmentChanges,
    ) -> Result<Attempt> {
        let current = self.load_for(id, caller).await?;
        let commands = commands_for_update(current.status, caller, changes)?;

        let mut state = AppointmentState::from_appointment(current.clone());
        let mut effects: Vec<Effect<AppointmentAction>> = Vec::new();
        for command in commands {
            effects.extend(self.reducer.reduce(&mut state, command, &self.env));
            if let Some(error) = state.last_error.take() {
                return Err(error);
            }
        }
        let Some(candidate) = state.appointment else {
            return Err(BookingError::appointment_not_found(id));
        };

        let slot = candidate.occupied_slot();
        if candidate.is_active() && slot != current.occupied_slot() {
            self.slots.ensure_free(&slot, Some(id)).await?;
        }

        let stored = match self
            .store(self.repository.update(&candidate, current.version))
            .await?
        {
            Ok(stored) => stored,
            Err(RepositoryError::VersionMismatch { expected, actual }) => {
                return Ok(Attempt::Stale { expected, actual });
            },
            Err(RepositoryError::SlotTaken(_)) => {
                crate::metrics::record_conflict("store");
                return Err(BookingError::slot_taken(&slot));
            },
            Err(err) => return Err(err.into()),
        };

        self.runner.run(effects);
        if stored.status != current.status {
            crate::metrics::record_transition(stored.status);
            tracing::info!(
                from = %current.status,
                to = %stored.status,
                version = stored.version,
                "Appointment transitioned"
            );
        } else {
            tracing::info!(version = stored.version, "Appointment details updated");
        }

        Ok(Attempt::Done(stored))
    }

    /// One appointment, visible only to its two parties.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the appointment does not exist
    /// - `Permission` if `caller` is neither requester nor exhibitor
    /// - `DependencyTimeout` / `Storage` if the store fails
    #[tracing::instrument(skip_all, fields(operation = "get", appointment_id = %id, caller = %caller))]
    pub async fn get_appointment(&self, id: AppointmentId, caller: &UserId) -> Result<Appointment> {
        self.load_for(id, caller).await
    }

    /// Check that the repository answers within its deadline.
    ///
    /// # Errors
    ///
    /// Returns `DependencyTimeout` or `Storage` when it does not.
    pub async fn ready(&self) -> Result<()> {
        Ok(self.store(self.repository.ping()).await??)
    }

    async fn load_for(&self, id: AppointmentId, caller: &UserId) -> Result<Appointment> {
        let appointment = self
            .store(self.repository.get(id))
            .await??
            .ok_or_else(|| BookingError::appointment_not_found(id))?;

        if appointment.role_of(caller).is_none() {
            tracing::debug!(%caller, "Caller is not a party to the appointment");
            return Err(BookingError::Permission {
                user_id: caller.to_string(),
            });
        }
        Ok(appointment)
    }

    async fn lookup_user(&self, id: &UserId) -> Result<Option<UserProfile>> {
        within(
            Dependency::IdentityLookup,
            self.timeouts.identity,
            self.identity.get_user(id),
        )
        .await
    }

    async fn lookup_event(&self, id: &EventId) -> Result<Option<EventSummary>> {
        within(
            Dependency::EventRegistry,
            self.timeouts.event_registry,
            self.events.get_event(id),
        )
        .await
    }

    /// Run a repository call under the store deadline. The inner result is
    /// left for the caller so specific repository errors can be matched.
    async fn store<T, F>(&self, call: F) -> Result<std::result::Result<T, RepositoryError>>
    where
        F: Future<Output = std::result::Result<T, RepositoryError>>,
    {
        deadline(self.timeouts.store, call)
            .await
            .map_err(|_| BookingError::DependencyTimeout {
                dependency: Dependency::Store,
            })
    }
}

/// Bound a collaborator call by `limit`.
async fn within<T, F>(dependency: Dependency, limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, ProviderError>>,
{
    match deadline(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            tracing::warn!(%dependency, error = %err, "Collaborator call failed");
            Err(BookingError::Dependency {
                dependency,
                message: err.to_string(),
            })
        },
        Err(_) => {
            tracing::warn!(%dependency, ?limit, "Collaborator call timed out");
            Err(BookingError::DependencyTimeout { dependency })
        },
    }
}

fn observe<T>(operation: &'static str, started: Instant, result: &Result<T>) {
    crate::metrics::record_duration(operation, started.elapsed().as_secs_f64());
    if let Err(error) = result {
        crate::metrics::record_rejected(error.code());
        tracing::debug!(operation, code = error.code(), %error, "Operation refused");
    }
}
