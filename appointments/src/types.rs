//! Domain types for exhibitor appointment booking.
//!
//! Identifiers, the closed status/type enums, the transition table, slots and
//! the appointment record itself. Raw request shapes (`*Input`) live at the
//! bottom together with the validation that turns them into domain values.

use crate::error::{BookingError, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an appointment
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppointmentId(Uuid);

impl AppointmentId {
    /// Creates a new random `AppointmentId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `AppointmentId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AppointmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AppointmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AppointmentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Opaque identifier owned by the identity service
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap a raw user id. Surrounding whitespace is dropped.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self(id.trim().to_string())
    }

    /// The raw id
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Empty ids never reference a user
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier owned by the event registry
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Wrap a raw event id. Surrounding whitespace is dropped.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self(id.trim().to_string())
    }

    /// The raw id
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Empty ids never reference an event
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Enums
// ============================================================================

/// Error returned when a string does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    /// Which enum was being parsed
    pub kind: &'static str,
    /// The rejected input
    pub value: String,
}

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Canonical wire spelling
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            /// Every variant, in declaration order
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                let wanted = s.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| UnknownVariant {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }
    };
}

/// Lifecycle status of an appointment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    /// Requested, awaiting the exhibitor
    Pending,
    /// Accepted by the exhibitor
    Confirmed,
    /// Moved to a new slot, awaiting confirmation
    Rescheduled,
    /// Meeting took place
    Completed,
    /// Called off by either party
    Cancelled,
    /// Requester did not attend
    NoShow,
}

string_enum!(AppointmentStatus, "status", {
    Pending => "PENDING",
    Confirmed => "CONFIRMED",
    Rescheduled => "RESCHEDULED",
    Completed => "COMPLETED",
    Cancelled => "CANCELLED",
    NoShow => "NO_SHOW",
});

/// Which party is acting on an appointment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// The party that asked for the meeting
    Requester,
    /// The party being asked
    Exhibitor,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Requester => "requester",
            Self::Exhibitor => "exhibitor",
        })
    }
}

/// Who may invoke a given transition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionRule {
    /// Only the exhibitor
    ExhibitorOnly,
    /// Requester or exhibitor
    EitherParty,
}

impl TransitionRule {
    /// Whether `role` may perform a transition governed by this rule
    #[must_use]
    pub const fn permits(self, role: Role) -> bool {
        match self {
            Self::ExhibitorOnly => matches!(role, Role::Exhibitor),
            Self::EitherParty => true,
        }
    }
}

impl AppointmentStatus {
    /// The transition table. `None` means the edge does not exist.
    #[must_use]
    pub const fn transition_to(self, to: Self) -> Option<TransitionRule> {
        use AppointmentStatus::{Cancelled, Completed, Confirmed, NoShow, Pending, Rescheduled};
        match (self, to) {
            (Pending | Rescheduled, Confirmed) => Some(TransitionRule::ExhibitorOnly),
            (Pending | Rescheduled | Confirmed, Cancelled) | (Pending, Rescheduled) => {
                Some(TransitionRule::EitherParty)
            },
            (Confirmed, Completed | NoShow) => Some(TransitionRule::ExhibitorOnly),
            _ => None,
        }
    }

    /// Whether the table has an edge from `self` to `to`
    #[must_use]
    pub const fn allows(self, to: Self) -> bool {
        self.transition_to(to).is_some()
    }

    /// No outgoing transitions
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed | Self::NoShow)
    }

    /// Counts towards slot occupancy
    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

/// What the meeting is about
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentType {
    /// Advice session
    Consultation,
    /// Product demonstration
    Demo,
    /// Commercial negotiation
    Negotiation,
    /// Partnership discussion
    Partnership,
    /// Anything else
    #[default]
    General,
}

string_enum!(AppointmentType, "appointment type", {
    Consultation => "CONSULTATION",
    Demo => "DEMO",
    Negotiation => "NEGOTIATION",
    Partnership => "PARTNERSHIP",
    General => "GENERAL",
});

/// How the parties meet
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeetingType {
    /// At the booth
    #[default]
    InPerson,
    /// Video call
    Video,
    /// Phone call
    Phone,
}

string_enum!(MeetingType, "meeting type", {
    InPerson => "IN_PERSON",
    Video => "VIDEO",
    Phone => "PHONE",
});

/// Request priority
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    /// Low
    Low,
    /// Medium
    #[default]
    Medium,
    /// High
    High,
    /// Urgent
    Urgent,
}

string_enum!(Priority, "priority", {
    Low => "LOW",
    Medium => "MEDIUM",
    High => "HIGH",
    Urgent => "URGENT",
});

// ============================================================================
// Scheduling
// ============================================================================

/// Venue-local time of day with minute precision.
///
/// Accepts `H:MM`, `HH:MM` and `HH:MM:SS`; seconds are dropped. Always renders
/// as `HH:MM`, so two spellings of the same minute compare equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    /// Build from hour and minute
    #[must_use]
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    /// Truncate a `NaiveTime` to the minute
    #[must_use]
    pub fn from_naive(time: NaiveTime) -> Self {
        Self(time.with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(time))
    }

    /// The inner time
    #[must_use]
    pub const fn as_naive(&self) -> NaiveTime {
        self.0
    }
}

impl FromStr for TimeOfDay {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        NaiveTime::parse_from_str(s, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
            .map(Self::from_naive)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// The tuple that must be unique among active appointments.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Slot {
    /// Owning event
    pub event_id: EventId,
    /// Exhibitor whose calendar is booked
    pub exhibitor_id: UserId,
    /// Calendar date
    pub date: NaiveDate,
    /// Time of day
    pub time: TimeOfDay,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} {} {}",
            self.event_id, self.exhibitor_id, self.date, self.time
        )
    }
}

// ============================================================================
// Appointment
// ============================================================================

/// Requester contact details as of booking time
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequesterSnapshot {
    /// Display name
    #[serde(rename = "requesterName")]
    pub name: Option<String>,
    /// Email
    #[serde(rename = "requesterEmail")]
    pub email: Option<String>,
    /// Phone
    #[serde(rename = "requesterPhone")]
    pub phone: Option<String>,
    /// Company
    #[serde(rename = "requesterCompany")]
    pub company: Option<String>,
    /// Job title
    #[serde(rename = "requesterTitle")]
    pub title: Option<String>,
}

/// A meeting between a requester and an exhibitor at an event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    /// Appointment id
    pub id: AppointmentId,
    /// Owning event
    pub event_id: EventId,
    /// The party being requested
    pub exhibitor_id: UserId,
    /// The party requesting
    pub requester_id: UserId,
    /// Short title
    pub title: String,
    /// Longer description
    pub description: Option<String>,
    /// What the meeting is about
    #[serde(rename = "type")]
    pub appointment_type: AppointmentType,
    /// Length in minutes
    pub duration: u32,
    /// How the parties meet
    pub meeting_type: MeetingType,
    /// Where
    pub location: Option<String>,
    /// Why
    pub purpose: Option<String>,
    /// Ordered talking points
    pub agenda: Vec<String>,
    /// Free-form notes, editable by both parties
    pub notes: Option<String>,
    /// Lifecycle status
    pub status: AppointmentStatus,
    /// Request priority
    pub priority: Priority,
    /// Originally requested date
    pub requested_date: NaiveDate,
    /// Originally requested time
    pub requested_time: TimeOfDay,
    /// Date agreed on confirmation or reschedule
    pub confirmed_date: Option<NaiveDate>,
    /// Time agreed on confirmation or reschedule
    pub confirmed_time: Option<TimeOfDay>,
    /// Who cancelled
    pub cancelled_by: Option<UserId>,
    /// When it was cancelled
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Why it was cancelled
    pub cancellation_reason: Option<String>,
    /// Result recorded on completion
    pub outcome: Option<String>,
    /// Requester contact details at creation
    #[serde(flatten)]
    pub requester: RequesterSnapshot,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency counter, bumped by every persisted write
    pub version: u64,
}

impl Appointment {
    /// Build a fresh `PENDING` appointment from a validated draft.
    #[must_use]
    pub fn from_draft(
        id: AppointmentId,
        draft: AppointmentDraft,
        requester: RequesterSnapshot,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            event_id: draft.event_id,
            exhibitor_id: draft.exhibitor_id,
            requester_id: draft.requester_id,
            title: draft.title,
            description: draft.description,
            appointment_type: draft.appointment_type,
            duration: draft.duration,
            meeting_type: draft.meeting_type,
            location: draft.location,
            purpose: draft.purpose,
            agenda: draft.agenda,
            notes: draft.notes,
            status: AppointmentStatus::Pending,
            priority: draft.priority,
            requested_date: draft.requested_date,
            requested_time: draft.requested_time,
            confirmed_date: None,
            confirmed_time: None,
            cancelled_by: None,
            cancelled_at: None,
            cancellation_reason: None,
            outcome: None,
            requester,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    /// The slot this appointment holds: confirmed date/time when set,
    /// requested date/time otherwise.
    #[must_use]
    pub fn occupied_slot(&self) -> Slot {
        Slot {
            event_id: self.event_id.clone(),
            exhibitor_id: self.exhibitor_id.clone(),
            date: self.confirmed_date.unwrap_or(self.requested_date),
            time: self.confirmed_time.unwrap_or(self.requested_time),
        }
    }

    /// Role of `user` on this appointment, if any
    #[must_use]
    pub fn role_of(&self, user: &UserId) -> Option<Role> {
        if *user == self.exhibitor_id {
            Some(Role::Exhibitor)
        } else if *user == self.requester_id {
            Some(Role::Requester)
        } else {
            None
        }
    }

    /// The other party from `role`'s point of view
    #[must_use]
    pub const fn counterpart_of(&self, role: Role) -> &UserId {
        match role {
            Role::Requester => &self.exhibitor_id,
            Role::Exhibitor => &self.requester_id,
        }
    }

    /// Counts towards slot occupancy
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Validated fields for a new appointment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppointmentDraft {
    /// Owning event
    pub event_id: EventId,
    /// The party being requested
    pub exhibitor_id: UserId,
    /// The party requesting
    pub requester_id: UserId,
    /// Short title
    pub title: String,
    /// Longer description
    pub description: Option<String>,
    /// What the meeting is about
    pub appointment_type: AppointmentType,
    /// Length in minutes
    pub duration: u32,
    /// How the parties meet
    pub meeting_type: MeetingType,
    /// Where
    pub location: Option<String>,
    /// Why
    pub purpose: Option<String>,
    /// Ordered talking points
    pub agenda: Vec<String>,
    /// Notes
    pub notes: Option<String>,
    /// Request priority
    pub priority: Priority,
    /// Requested date
    pub requested_date: NaiveDate,
    /// Requested time
    pub requested_time: TimeOfDay,
}

impl AppointmentDraft {
    /// The slot this draft would occupy
    #[must_use]
    pub fn slot(&self) -> Slot {
        Slot {
            event_id: self.event_id.clone(),
            exhibitor_id: self.exhibitor_id.clone(),
            date: self.requested_date,
            time: self.requested_time,
        }
    }
}

/// Display fields for the other party on an appointment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSummary {
    /// User id
    pub id: UserId,
    /// Full name
    pub name: String,
    /// Email
    pub email: Option<String>,
    /// Company
    pub company: Option<String>,
    /// Job title
    pub job_title: Option<String>,
}

/// An appointment plus counterpart display fields, as returned by listings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentView {
    /// The stored appointment
    #[serde(flatten)]
    pub appointment: Appointment,
    /// Requester display fields, when attached
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requester_profile: Option<ParticipantSummary>,
    /// Exhibitor display fields, when attached
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exhibitor_profile: Option<ParticipantSummary>,
}

/// Which dashboard view a listing serves. Exactly one selector applies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListFilter {
    /// Appointments requested of an exhibitor
    Exhibitor(UserId),
    /// Appointments a requester asked for
    Requester(UserId),
    /// Every appointment at an event
    Event(EventId),
}

impl ListFilter {
    /// Build a filter from the three optional selectors.
    ///
    /// # Errors
    ///
    /// Returns a validation error unless exactly one selector is non-blank.
    pub fn from_selectors(
        exhibitor_id: Option<String>,
        requester_id: Option<String>,
        event_id: Option<String>,
    ) -> Result<Self> {
        let exhibitor = exhibitor_id.map(UserId::new).filter(|id| !id.is_blank());
        let requester = requester_id.map(UserId::new).filter(|id| !id.is_blank());
        let event = event_id.map(EventId::new).filter(|id| !id.is_blank());

        match (exhibitor, requester, event) {
            (Some(id), None, None) => Ok(Self::Exhibitor(id)),
            (None, Some(id), None) => Ok(Self::Requester(id)),
            (None, None, Some(id)) => Ok(Self::Event(id)),
            _ => Err(BookingError::validation(
                "exactly one of exhibitorId, requesterId or eventId is required",
                ["exhibitorId", "requesterId", "eventId"],
            )),
        }
    }
}

// ============================================================================
// Inputs
// ============================================================================

/// Raw create request, before validation.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentInput {
    /// Owning event
    pub event_id: Option<String>,
    /// The party being requested
    pub exhibitor_id: Option<String>,
    /// The party requesting
    pub requester_id: Option<String>,
    /// Short title
    pub title: Option<String>,
    /// `YYYY-MM-DD`
    pub requested_date: Option<String>,
    /// `HH:MM`
    pub requested_time: Option<String>,
    /// Longer description
    pub description: Option<String>,
    /// Appointment type, defaults to GENERAL
    #[serde(rename = "type")]
    pub appointment_type: Option<String>,
    /// Minutes, defaults to 60
    pub duration: Option<u32>,
    /// Defaults to `IN_PERSON`
    pub meeting_type: Option<String>,
    /// Where
    pub location: Option<String>,
    /// Why
    pub purpose: Option<String>,
    /// Ordered talking points
    pub agenda: Option<Vec<String>>,
    /// Notes
    pub notes: Option<String>,
    /// Defaults to MEDIUM
    pub priority: Option<String>,
}

/// Longest meeting that can be requested, in minutes
pub const MAX_DURATION_MINUTES: u32 = 8 * 60;

/// Default meeting length in minutes
pub const DEFAULT_DURATION_MINUTES: u32 = 60;

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_optional<T: FromStr>(
    value: Option<String>,
    field: &'static str,
    invalid: &mut Vec<&'static str>,
) -> Option<T> {
    let raw = present(value)?;
    raw.parse().map_or_else(
        |_| {
            invalid.push(field);
            None
        },
        Some,
    )
}

impl CreateAppointmentInput {
    /// Validate into a draft, naming every missing or malformed field.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Validation`] listing the offending fields.
    pub fn into_draft(self) -> Result<AppointmentDraft> {
        let mut missing = Vec::new();
        let mut invalid = Vec::new();

        let event_id = present(self.event_id);
        let exhibitor_id = present(self.exhibitor_id);
        let requester_id = present(self.requester_id);
        let title = present(self.title);
        let requested_date_raw = present(self.requested_date);
        let requested_time_raw = present(self.requested_time);

        for (field, value) in [
            ("eventId", event_id.is_some()),
            ("exhibitorId", exhibitor_id.is_some()),
            ("requesterId", requester_id.is_some()),
            ("title", title.is_some()),
            ("requestedDate", requested_date_raw.is_some()),
            ("requestedTime", requested_time_raw.is_some()),
        ] {
            if !value {
                missing.push(field);
            }
        }

        let requested_date = parse_optional::<NaiveDate>(requested_date_raw, "requestedDate", &mut invalid);
        let requested_time = parse_optional::<TimeOfDay>(requested_time_raw, "requestedTime", &mut invalid);
        let appointment_type =
            parse_optional::<AppointmentType>(self.appointment_type, "type", &mut invalid).unwrap_or_default();
        let meeting_type =
            parse_optional::<MeetingType>(self.meeting_type, "meetingType", &mut invalid).unwrap_or_default();
        let priority = parse_optional::<Priority>(self.priority, "priority", &mut invalid).unwrap_or_default();

        let duration = self.duration.unwrap_or(DEFAULT_DURATION_MINUTES);
        if duration == 0 || duration > MAX_DURATION_MINUTES {
            invalid.push("duration");
        }

        if let (Some(exhibitor), Some(requester)) = (&exhibitor_id, &requester_id) {
            if exhibitor == requester {
                invalid.push("exhibitorId");
            }
        }

        if !missing.is_empty() {
            let mut fields = missing;
            fields.extend(invalid);
            return Err(BookingError::validation(
                format!("missing required fields: {}", fields.join(", ")),
                fields,
            ));
        }

        if !invalid.is_empty() {
            return Err(BookingError::validation(
                format!("invalid fields: {}", invalid.join(", ")),
                invalid,
            ));
        }

        match (event_id, exhibitor_id, requester_id, title, requested_date, requested_time) {
            (Some(event_id), Some(exhibitor_id), Some(requester_id), Some(title), Some(date), Some(time)) => {
                Ok(AppointmentDraft {
                    event_id: EventId::new(event_id),
                    exhibitor_id: UserId::new(exhibitor_id),
                    requester_id: UserId::new(requester_id),
                    title,
                    description: present(self.description),
                    appointment_type,
                    duration,
                    meeting_type,
                    location: present(self.location),
                    purpose: present(self.purpose),
                    agenda: self
                        .agenda
                        .unwrap_or_default()
                        .into_iter()
                        .map(|item| item.trim().to_string())
                        .filter(|item| !item.is_empty())
                        .collect(),
                    notes: present(self.notes),
                    priority,
                    requested_date: date,
                    requested_time: time,
                })
            },
            _ => Err(BookingError::validation("incomplete appointment request", Vec::<String>::new())),
        }
    }
}

/// Raw update request, before validation.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAppointmentInput {
    /// Target status
    pub status: Option<String>,
    /// Replacement notes
    pub notes: Option<String>,
    /// Agreed date, `YYYY-MM-DD`
    pub confirmed_date: Option<String>,
    /// Agreed time, `HH:MM`
    pub confirmed_time: Option<String>,
    /// Result of the meeting
    pub outcome: Option<String>,
    /// Required when cancelling
    pub cancellation_reason: Option<String>,
}

/// Validated update request
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppointmentChanges {
    /// Target status
    pub status: Option<AppointmentStatus>,
    /// Replacement notes
    pub notes: Option<String>,
    /// Agreed date
    pub confirmed_date: Option<NaiveDate>,
    /// Agreed time
    pub confirmed_time: Option<TimeOfDay>,
    /// Result of the meeting
    pub outcome: Option<String>,
    /// Why it is being cancelled
    pub cancellation_reason: Option<String>,
}

impl UpdateAppointmentInput {
    /// Parse and sanity-check the requested changes.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Validation`] when nothing is requested or a value
    /// does not parse.
    pub fn into_changes(self) -> Result<AppointmentChanges> {
        let mut invalid = Vec::new();

        let status = parse_optional::<AppointmentStatus>(self.status, "status", &mut invalid);
        let confirmed_date = parse_optional::<NaiveDate>(self.confirmed_date, "confirmedDate", &mut invalid);
        let confirmed_time = parse_optional::<TimeOfDay>(self.confirmed_time, "confirmedTime", &mut invalid);

        if !invalid.is_empty() {
            return Err(BookingError::validation(
                format!("invalid fields: {}", invalid.join(", ")),
                invalid,
            ));
        }

        let changes = AppointmentChanges {
            status,
            notes: self.notes.map(|n| n.trim().to_string()),
            confirmed_date,
            confirmed_time,
            outcome: present(self.outcome),
            cancellation_reason: present(self.cancellation_reason),
        };

        if changes == AppointmentChanges::default() {
            return Err(BookingError::validation(
                "no changes requested",
                ["status", "notes", "confirmedDate", "confirmedTime", "outcome", "cancellationReason"],
            ));
        }

        Ok(changes)
    }
}

impl AppointmentChanges {
    /// Check that the fields travel with a status that uses them.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Validation`] when scheduling fields arrive
    /// without `CONFIRMED`/`RESCHEDULED`, or a cancellation reason without
    /// `CANCELLED`.
    pub fn ensure_fields_fit_status(&self) -> Result<()> {
        let schedules = matches!(
            self.status,
            Some(AppointmentStatus::Confirmed | AppointmentStatus::Rescheduled)
        );
        if !schedules && (self.confirmed_date.is_some() || self.confirmed_time.is_some()) {
            let mut fields = Vec::new();
            if self.confirmed_date.is_some() {
                fields.push("confirmedDate");
            }
            if self.confirmed_time.is_some() {
                fields.push("confirmedTime");
            }
            return Err(BookingError::validation(
                "confirmedDate/confirmedTime require status CONFIRMED or RESCHEDULED",
                fields,
            ));
        }

        if self.cancellation_reason.is_some() && self.status != Some(AppointmentStatus::Cancelled) {
            return Err(BookingError::validation(
                "cancellationReason requires status CANCELLED",
                ["cancellationReason"],
            ));
        }

        Ok(())
    }
}
