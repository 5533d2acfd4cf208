//! Appointment aggregate: the lifecycle state machine.
//!
//! The reducer owns every rule about *who* may move an appointment *where*.
//! It never touches storage. The service loads an appointment into an
//! [`AppointmentState`], feeds commands through [`AppointmentReducer`], and
//! persists the result only if no command was rejected. A rejected command
//! leaves the appointment exactly as it was and records the reason in
//! [`AppointmentState::last_error`].
//!
//! Successful transitions return a notification effect addressed to the
//! counterpart of the actor. Effects are descriptions only; the service hands
//! them to the runtime once the write has been committed.

use crate::error::BookingError;
use crate::providers::{Notification, NotificationDispatcher, NotificationKind, Notifier};
use crate::types::{
    Appointment, AppointmentChanges, AppointmentDraft, AppointmentId, AppointmentStatus,
    RequesterSnapshot, Role, TimeOfDay, UserId,
};
use booking_core::{SmallVec, effect::Effect, environment::Clock, reducer::Reducer, smallvec};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;
use std::marker::PhantomData;
use std::sync::Arc;

// ============================================================================
// Actions (Commands + Events)
// ============================================================================

/// Actions for the appointment aggregate
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AppointmentAction {
    // Commands
    /// Book a new appointment from a validated draft
    Request {
        /// Id for the new appointment
        id: AppointmentId,
        /// Validated request fields
        draft: AppointmentDraft,
        /// Requester contact details at booking time
        requester: RequesterSnapshot,
    },

    /// Accept the appointment, optionally at a different date/time
    Confirm {
        /// Caller
        actor: UserId,
        /// Agreed date, defaults to the occupied slot's date
        date: Option<NaiveDate>,
        /// Agreed time, defaults to the occupied slot's time
        time: Option<TimeOfDay>,
    },

    /// Move the appointment to a new slot
    Reschedule {
        /// Caller
        actor: UserId,
        /// New date
        date: Option<NaiveDate>,
        /// New time
        time: Option<TimeOfDay>,
    },

    /// Call the appointment off
    Cancel {
        /// Caller
        actor: UserId,
        /// Required explanation
        reason: Option<String>,
    },

    /// Record that the meeting took place
    Complete {
        /// Caller
        actor: UserId,
        /// What came out of it
        outcome: Option<String>,
    },

    /// Record that the requester did not show up
    MarkNoShow {
        /// Caller
        actor: UserId,
    },

    /// Edit notes or the recorded outcome without changing status
    AmendDetails {
        /// Caller
        actor: UserId,
        /// Replacement notes; an empty string clears them
        notes: Option<String>,
        /// Replacement outcome
        outcome: Option<String>,
    },

    // Events
    /// An appointment was booked
    Requested {
        /// The new appointment
        appointment: Box<Appointment>,
    },

    /// The exhibitor accepted
    Confirmed {
        /// Who confirmed
        by: UserId,
        /// Agreed date
        date: NaiveDate,
        /// Agreed time
        time: TimeOfDay,
        /// When
        at: DateTime<Utc>,
    },

    /// The appointment moved
    Rescheduled {
        /// Who moved it
        by: UserId,
        /// New date
        date: NaiveDate,
        /// New time
        time: TimeOfDay,
        /// When
        at: DateTime<Utc>,
    },

    /// The appointment was called off
    Cancelled {
        /// Who cancelled
        by: UserId,
        /// Why
        reason: String,
        /// When
        at: DateTime<Utc>,
    },

    /// The meeting took place
    Completed {
        /// Who recorded it
        by: UserId,
        /// Result, if given
        outcome: Option<String>,
        /// When
        at: DateTime<Utc>,
    },

    /// The requester did not attend
    MarkedNoShow {
        /// Who recorded it
        by: UserId,
        /// When
        at: DateTime<Utc>,
    },

    /// Notes or outcome changed
    DetailsAmended {
        /// Who changed them
        by: UserId,
        /// New notes, when changed
        notes: Option<String>,
        /// New outcome, when changed
        outcome: Option<String>,
        /// When
        at: DateTime<Utc>,
    },

    /// A command was refused; nothing changed
    Rejected {
        /// Why
        error: BookingError,
    },
}

impl AppointmentAction {
    /// Whether this is a command (a request to change state)
    #[must_use]
    pub const fn is_command(&self) -> bool {
        matches!(
            self,
            Self::Request { .. }
                | Self::Confirm { .. }
                | Self::Reschedule { .. }
                | Self::Cancel { .. }
                | Self::Complete { .. }
                | Self::MarkNoShow { .. }
                | Self::AmendDetails { .. }
        )
    }

    /// Whether this is an event (a fact that already happened)
    #[must_use]
    pub const fn is_event(&self) -> bool {
        !self.is_command()
    }

    /// Stable name for logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Request { .. } => "Request",
            Self::Confirm { .. } => "Confirm",
            Self::Reschedule { .. } => "Reschedule",
            Self::Cancel { .. } => "Cancel",
            Self::Complete { .. } => "Complete",
            Self::MarkNoShow { .. } => "MarkNoShow",
            Self::AmendDetails { .. } => "AmendDetails",
            Self::Requested { .. } => "Requested",
            Self::Confirmed { .. } => "Confirmed",
            Self::Rescheduled { .. } => "Rescheduled",
            Self::Cancelled { .. } => "Cancelled",
            Self::Completed { .. } => "Completed",
            Self::MarkedNoShow { .. } => "MarkedNoShow",
            Self::DetailsAmended { .. } => "DetailsAmended",
            Self::Rejected { .. } => "Rejected",
        }
    }
}

/// Translate an update request into the commands that carry it out.
///
/// The status command (if any) comes first, followed by a detail amendment for
/// notes and, unless it travels with the completion, the outcome.
///
/// # Errors
///
/// - [`BookingError::Validation`] when a field arrives without the status
///   that uses it
/// - [`BookingError::InvalidTransition`] when the target status is `PENDING`,
///   which no transition leads to
pub fn commands_for_update(
    current: AppointmentStatus,
    actor: &UserId,
    changes: AppointmentChanges,
) -> Result<Vec<AppointmentAction>, BookingError> {
    changes.ensure_fields_fit_status()?;

    let mut commands = Vec::with_capacity(2);
    let mut outcome = changes.outcome;

    if let Some(status) = changes.status {
        let actor = actor.clone();
        let command = match status {
            AppointmentStatus::Pending => {
                return Err(BookingError::InvalidTransition {
                    from: current,
                    to: status,
                });
            },
            AppointmentStatus::Confirmed => AppointmentAction::Confirm {
                actor,
                date: changes.confirmed_date,
                time: changes.confirmed_time,
            },
            AppointmentStatus::Rescheduled => AppointmentAction::Reschedule {
                actor,
                date: changes.confirmed_date,
                time: changes.confirmed_time,
            },
            AppointmentStatus::Cancelled => AppointmentAction::Cancel {
                actor,
                reason: changes.cancellation_reason,
            },
            AppointmentStatus::Completed => AppointmentAction::Complete {
                actor,
                outcome: outcome.take(),
            },
            AppointmentStatus::NoShow => AppointmentAction::MarkNoShow { actor },
        };
        commands.push(command);
    }

    if changes.notes.is_some() || outcome.is_some() {
        commands.push(AppointmentAction::AmendDetails {
            actor: actor.clone(),
            notes: changes.notes,
            outcome,
        });
    }

    Ok(commands)
}

// ============================================================================
// State
// ============================================================================

/// State for one appointment
#[derive(Clone, Debug, Default)]
pub struct AppointmentState {
    /// The appointment, once requested or loaded
    pub appointment: Option<Appointment>,
    /// Why the most recent command was rejected
    pub last_error: Option<BookingError>,
    /// Events applied since the state was created, oldest first
    pub history: Vec<AppointmentAction>,
}

impl AppointmentState {
    /// State with no appointment yet
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// State wrapping a stored appointment
    #[must_use]
    pub fn from_appointment(appointment: Appointment) -> Self {
        Self {
            appointment: Some(appointment),
            ..Self::default()
        }
    }

    /// Current status, if an appointment is loaded
    #[must_use]
    pub fn status(&self) -> Option<AppointmentStatus> {
        self.appointment.as_ref().map(|a| a.status)
    }

    /// Whether any command was rejected
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        self.last_error.is_some()
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for the appointment aggregate
pub struct AppointmentEnvironment<N> {
    /// Clock for timestamps
    pub clock: Arc<dyn Clock>,
    /// Best-effort notification front
    pub notifier: Notifier<N>,
}

impl<N> AppointmentEnvironment<N> {
    /// Creates a new `AppointmentEnvironment`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, notifier: Notifier<N>) -> Self {
        Self { clock, notifier }
    }
}

impl<N> Clone for AppointmentEnvironment<N> {
    fn clone(&self) -> Self {
        Self {
            clock: Arc::clone(&self.clock),
            notifier: self.notifier.clone(),
        }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the appointment aggregate
pub struct AppointmentReducer<N> {
    _dispatcher: PhantomData<fn() -> N>,
}

impl<N> AppointmentReducer<N> {
    /// Creates a new `AppointmentReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _dispatcher: PhantomData,
        }
    }
}

impl<N> Default for AppointmentReducer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> Clone for AppointmentReducer<N> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<N> std::fmt::Debug for AppointmentReducer<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AppointmentReducer")
    }
}

/// Resolve the caller's role and check the transition table.
///
/// Strangers get `Permission`, then an edge missing from the table gets
/// `InvalidTransition`, then a party the edge does not admit gets `Permission`.
fn authorize(
    appointment: &Appointment,
    actor: &UserId,
    to: AppointmentStatus,
) -> Result<Role, BookingError> {
    let role = participant(appointment, actor)?;
    let rule = appointment
        .status
        .transition_to(to)
        .ok_or(BookingError::InvalidTransition {
            from: appointment.status,
            to,
        })?;

    if rule.permits(role) {
        Ok(role)
    } else {
        Err(BookingError::Permission {
            user_id: actor.to_string(),
        })
    }
}

fn participant(appointment: &Appointment, actor: &UserId) -> Result<Role, BookingError> {
    appointment.role_of(actor).ok_or_else(|| BookingError::Permission {
        user_id: actor.to_string(),
    })
}

impl<N> AppointmentReducer<N> {
    /// Validate a command against the current state and produce the event.
    #[allow(clippy::too_many_lines)]
    fn decide(
        state: &AppointmentState,
        command: AppointmentAction,
        now: DateTime<Utc>,
    ) -> Result<AppointmentAction, BookingError> {
        if let AppointmentAction::Request {
            id,
            draft,
            requester,
        } = command
        {
            if state.appointment.is_some() {
                return Err(BookingError::Conflict {
                    message: format!("appointment {id} already exists"),
                });
            }
            return Ok(AppointmentAction::Requested {
                appointment: Box::new(Appointment::from_draft(id, draft, requester, now)),
            });
        }

        let Some(appointment) = state.appointment.as_ref() else {
            return Err(BookingError::validation(
                "no appointment loaded",
                Vec::<String>::new(),
            ));
        };

        match command {
            AppointmentAction::Confirm { actor, date, time } => {
                authorize(appointment, &actor, AppointmentStatus::Confirmed)?;
                let slot = appointment.occupied_slot();
                Ok(AppointmentAction::Confirmed {
                    by: actor,
                    date: date.unwrap_or(slot.date),
                    time: time.unwrap_or(slot.time),
                    at: now,
                })
            },

            AppointmentAction::Reschedule { actor, date, time } => {
                authorize(appointment, &actor, AppointmentStatus::Rescheduled)?;
                match (date, time) {
                    (Some(date), Some(time)) => Ok(AppointmentAction::Rescheduled {
                        by: actor,
                        date,
                        time,
                        at: now,
                    }),
                    (date, time) => {
                        let mut fields = Vec::new();
                        if date.is_none() {
                            fields.push("confirmedDate");
                        }
                        if time.is_none() {
                            fields.push("confirmedTime");
                        }
                        Err(BookingError::validation(
                            "rescheduling requires a new date and time",
                            fields,
                        ))
                    },
                }
            },

            AppointmentAction::Cancel { actor, reason } => {
                authorize(appointment, &actor, AppointmentStatus::Cancelled)?;
                let reason = reason
                    .map(|r| r.trim().to_string())
                    .filter(|r| !r.is_empty())
                    .ok_or_else(|| {
                        BookingError::validation(
                            "cancellationReason is required to cancel",
                            ["cancellationReason"],
                        )
                    })?;
                Ok(AppointmentAction::Cancelled {
                    by: actor,
                    reason,
                    at: now,
                })
            },

            AppointmentAction::Complete { actor, outcome } => {
                authorize(appointment, &actor, AppointmentStatus::Completed)?;
                Ok(AppointmentAction::Completed {
                    by: actor,
                    outcome,
                    at: now,
                })
            },

            AppointmentAction::MarkNoShow { actor } => {
                authorize(appointment, &actor, AppointmentStatus::NoShow)?;
                Ok(AppointmentAction::MarkedNoShow { by: actor, at: now })
            },

            AppointmentAction::AmendDetails {
                actor,
                notes,
                outcome,
            } => {
                participant(appointment, &actor)?;
                if notes.is_none() && outcome.is_none() {
                    return Err(BookingError::validation(
                        "nothing to amend",
                        ["notes", "outcome"],
                    ));
                }
                if outcome.is_some() && appointment.status != AppointmentStatus::Completed {
                    return Err(BookingError::validation(
                        "outcome can only be recorded on a COMPLETED appointment",
                        ["outcome"],
                    ));
                }
                Ok(AppointmentAction::DetailsAmended {
                    by: actor,
                    notes,
                    outcome,
                    at: now,
                })
            },

            event => Ok(event),
        }
    }

    /// Applies an event to state
    fn apply_event(state: &mut AppointmentState, event: &AppointmentAction) {
        if let AppointmentAction::Rejected { error } = event {
            state.last_error = Some(error.clone());
            return;
        }

        if let AppointmentAction::Requested { appointment } = event {
            state.appointment = Some(appointment.as_ref().clone());
        } else if let Some(appointment) = state.appointment.as_mut() {
            match event {
                AppointmentAction::Confirmed { date, time, at, .. } => {
                    appointment.status = AppointmentStatus::Confirmed;
                    appointment.confirmed_date = Some(*date);
                    appointment.confirmed_time = Some(*time);
                    appointment.updated_at = *at;
                },
                AppointmentAction::Rescheduled { date, time, at, .. } => {
                    appointment.status = AppointmentStatus::Rescheduled;
                    appointment.confirmed_date = Some(*date);
                    appointment.confirmed_time = Some(*time);
                    appointment.updated_at = *at;
                },
                AppointmentAction::Cancelled { by, reason, at } => {
                    appointment.status = AppointmentStatus::Cancelled;
                    appointment.cancelled_by = Some(by.clone());
                    appointment.cancelled_at = Some(*at);
                    appointment.cancellation_reason = Some(reason.clone());
                    appointment.updated_at = *at;
                },
                AppointmentAction::Completed { outcome, at, .. } => {
                    appointment.status = AppointmentStatus::Completed;
                    if outcome.is_some() {
                        appointment.outcome.clone_from(outcome);
                    }
                    appointment.updated_at = *at;
                },
                AppointmentAction::MarkedNoShow { at, .. } => {
                    appointment.status = AppointmentStatus::NoShow;
                    appointment.updated_at = *at;
                },
                AppointmentAction::DetailsAmended {
                    notes, outcome, at, ..
                } => {
                    if let Some(notes) = notes {
                        appointment.notes = Some(notes.clone()).filter(|n| !n.is_empty());
                    }
                    if outcome.is_some() {
                        appointment.outcome.clone_from(outcome);
                    }
                    appointment.updated_at = *at;
                },
                // Commands don't modify state
                _ => return,
            }
        }

        state.last_error = None;
        state.history.push(event.clone());
    }
}

/// The notification an event should trigger, if any.
pub(crate) fn notification_for(appointment: &Appointment, event: &AppointmentAction) -> Option<Notification> {
    let counterpart = |by: &UserId| {
        appointment
            .role_of(by)
            .map_or_else(|| appointment.requester_id.clone(), |role| appointment.counterpart_of(role).clone())
    };
    let slot = appointment.occupied_slot();
    let title = &appointment.title;

    let (user_id, kind, headline, message) = match event {
        AppointmentAction::Requested { .. } => (
            appointment.exhibitor_id.clone(),
            NotificationKind::AppointmentRequest,
            "New appointment request",
            format!(
                "{} requested \"{title}\" on {} at {}",
                appointment
                    .requester
                    .name
                    .as_deref()
                    .unwrap_or(appointment.requester_id.as_str()),
                slot.date,
                slot.time
            ),
        ),
        AppointmentAction::Confirmed { by, date, time, .. } => (
            counterpart(by),
            NotificationKind::AppointmentConfirmed,
            "Appointment confirmed",
            format!("\"{title}\" is confirmed for {date} at {time}"),
        ),
        AppointmentAction::Rescheduled { by, date, time, .. } => (
            counterpart(by),
            NotificationKind::AppointmentRescheduled,
            "Appointment rescheduled",
            format!("\"{title}\" moved to {date} at {time}"),
        ),
        AppointmentAction::Cancelled { by, reason, .. } => (
            counterpart(by),
            NotificationKind::AppointmentCancelled,
            "Appointment cancelled",
            format!("\"{title}\" on {} was cancelled: {reason}", slot.date),
        ),
        AppointmentAction::Completed { by, .. } => (
            counterpart(by),
            NotificationKind::AppointmentCompleted,
            "Appointment completed",
            format!("\"{title}\" was marked as completed"),
        ),
        _ => return None,
    };

    Some(Notification {
        user_id,
        kind,
        title: headline.to_string(),
        message,
        metadata: json!({
            "appointmentId": appointment.id,
            "eventId": appointment.event_id,
            "status": appointment.status,
            "date": slot.date,
            "time": slot.time,
        }),
    })
}

impl<N> Reducer for AppointmentReducer<N>
where
    N: NotificationDispatcher + 'static,
{
    type State = AppointmentState;
    type Action = AppointmentAction;
    type Environment = AppointmentEnvironment<N>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let name = action.name();
        let event = match Self::decide(state, action, env.clock.now()) {
            Ok(event) => event,
            Err(error) => {
                tracing::debug!(command = name, %error, "Command rejected");
                AppointmentAction::Rejected { error }
            },
        };

        Self::apply_event(state, &event);

        let notification = state
            .appointment
            .as_ref()
            .filter(|_| !matches!(event, AppointmentAction::Rejected { .. }))
            .and_then(|appointment| notification_for(appointment, &event));

        match notification {
            Some(notification) => smallvec![env.notifier.effect(notification)],
            None => SmallVec::new(),
        }
    }
}
