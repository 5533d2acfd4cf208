//! `PostgreSQL` appointment repository.
//!
//! Slot uniqueness is enforced by the partial unique index
//! `appointments_active_slot_key` over `(event_id, exhibitor_id, slot_date,
//! slot_time) WHERE status <> 'CANCELLED'`. A violation surfaces as
//! [`RepositoryError::SlotTaken`], so concurrent bookings of the same slot are
//! settled by the database rather than by the pre-check.
//!
//! # Example
//!
//! ```no_run
//! use appointments::stores::postgres::PostgresAppointmentRepository;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let repo = PostgresAppointmentRepository::connect(
//!     "postgres://localhost/appointments",
//!     10,
//!     Duration::from_secs(5),
//! )
//! .await?;
//! repo.migrate().await?;
//! # Ok(())
//! # }
//! ```

use crate::providers::{AppointmentRepository, RepositoryError};
use crate::types::{
    Appointment, AppointmentId, EventId, ListFilter, RequesterSnapshot, Slot, TimeOfDay, UserId,
};
use chrono::{DateTime, NaiveTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

const COLUMNS: &str = "id, event_id, exhibitor_id, requester_id, title, description, \
    appointment_type, duration, meeting_type, location, purpose, agenda, notes, status, \
    priority, requested_date, requested_time, confirmed_date, confirmed_time, cancelled_by, \
    cancelled_at, cancellation_reason, outcome, requester_name, requester_email, \
    requester_phone, requester_company, requester_title, created_at, updated_at, version";

/// `PostgreSQL` appointment repository.
#[derive(Clone, Debug)]
pub struct PostgresAppointmentRepository {
    pool: PgPool,
}

impl PostgresAppointmentRepository {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Database`] if no connection can be established.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await
            .map_err(|e| RepositoryError::Database(format!("failed to connect: {e}")))?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    ///
    /// # Errors
    ///
    /// Returns error if migrations fail.
    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(format!("migration failed: {e}")))
    }

    /// The underlying pool
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn current_version(&self, id: AppointmentId) -> Result<Option<u64>, RepositoryError> {
        let version: Option<i64> = sqlx::query_scalar("SELECT version FROM appointments WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| database("failed to read version", &e))?;
        version.map(to_version).transpose()
    }
}

fn database(context: &str, error: &sqlx::Error) -> RepositoryError {
    RepositoryError::Database(format!("{context}: {error}"))
}

fn write_error(context: &str, error: &sqlx::Error, slot: &Slot) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = error {
        if db_err.is_unique_violation() {
            return RepositoryError::SlotTaken(slot.to_string());
        }
    }
    database(context, error)
}

fn to_version(raw: i64) -> Result<u64, RepositoryError> {
    u64::try_from(raw).map_err(|_| RepositoryError::Database(format!("negative version {raw}")))
}

fn from_version(version: u64) -> Result<i64, RepositoryError> {
    i64::try_from(version).map_err(|_| RepositoryError::Database(format!("version {version} out of range")))
}

fn parse_column<T: FromStr>(row: &PgRow, column: &str) -> Result<T, RepositoryError>
where
    T::Err: std::fmt::Display,
{
    let raw: String = row
        .try_get(column)
        .map_err(|e| database(column, &e))?;
    raw.parse()
        .map_err(|e| RepositoryError::Database(format!("invalid {column} '{raw}': {e}")))
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column).map_err(|e| database(column, &e))
}

fn from_row(row: &PgRow) -> Result<Appointment, RepositoryError> {
    let duration: i32 = get(row, "duration")?;
    let requested_time: NaiveTime = get(row, "requested_time")?;
    let confirmed_time: Option<NaiveTime> = get(row, "confirmed_time")?;
    let cancelled_by: Option<String> = get(row, "cancelled_by")?;

    Ok(Appointment {
        id: AppointmentId::from_uuid(get::<Uuid>(row, "id")?),
        event_id: EventId::new(get::<String>(row, "event_id")?),
        exhibitor_id: UserId::new(get::<String>(row, "exhibitor_id")?),
        requester_id: UserId::new(get::<String>(row, "requester_id")?),
        title: get(row, "title")?,
        description: get(row, "description")?,
        appointment_type: parse_column(row, "appointment_type")?,
        duration: u32::try_from(duration)
            .map_err(|_| RepositoryError::Database(format!("invalid duration {duration}")))?,
        meeting_type: parse_column(row, "meeting_type")?,
        location: get(row, "location")?,
        purpose: get(row, "purpose")?,
        agenda: get(row, "agenda")?,
        notes: get(row, "notes")?,
        status: parse_column(row, "status")?,
        priority: parse_column(row, "priority")?,
        requested_date: get(row, "requested_date")?,
        requested_time: TimeOfDay::from_naive(requested_time),
        confirmed_date: get(row, "confirmed_date")?,
        confirmed_time: confirmed_time.map(TimeOfDay::from_naive),
        cancelled_by: cancelled_by.map(UserId::new),
        cancelled_at: get(row, "cancelled_at")?,
        cancellation_reason: get(row, "cancellation_reason")?,
        outcome: get(row, "outcome")?,
        requester: RequesterSnapshot {
            name: get(row, "requester_name")?,
            email: get(row, "requester_email")?,
            phone: get(row, "requester_phone")?,
            company: get(row, "requester_company")?,
            title: get(row, "requester_title")?,
        },
        created_at: get::<DateTime<Utc>>(row, "created_at")?,
        updated_at: get::<DateTime<Utc>>(row, "updated_at")?,
        version: to_version(get(row, "version")?)?,
    })
}

impl AppointmentRepository for PostgresAppointmentRepository {
    async fn insert(&self, appointment: &Appointment) -> Result<Appointment, RepositoryError> {
        let slot = appointment.occupied_slot();
        let duration = i32::try_from(appointment.duration)
            .map_err(|_| RepositoryError::Database(format!("duration {} out of range", appointment.duration)))?;

        let query = format!(
            r"
            INSERT INTO appointments ({COLUMNS}, slot_date, slot_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30,
                    $31, $32, $33)
            RETURNING {COLUMNS}
            "
        );

        let row = sqlx::query(&query)
            .bind(appointment.id.as_uuid())
            .bind(appointment.event_id.as_str())
            .bind(appointment.exhibitor_id.as_str())
            .bind(appointment.requester_id.as_str())
            .bind(&appointment.title)
            .bind(&appointment.description)
            .bind(appointment.appointment_type.as_str())
            .bind(duration)
            .bind(appointment.meeting_type.as_str())
            .bind(&appointment.location)
            .bind(&appointment.purpose)
            .bind(&appointment.agenda)
            .bind(&appointment.notes)
            .bind(appointment.status.as_str())
            .bind(appointment.priority.as_str())
            .bind(appointment.requested_date)
            .bind(appointment.requested_time.as_naive())
            .bind(appointment.confirmed_date)
            .bind(appointment.confirmed_time.map(|t| t.as_naive()))
            .bind(appointment.cancelled_by.as_ref().map(UserId::as_str))
            .bind(appointment.cancelled_at)
            .bind(&appointment.cancellation_reason)
            .bind(&appointment.outcome)
            .bind(&appointment.requester.name)
            .bind(&appointment.requester.email)
            .bind(&appointment.requester.phone)
            .bind(&appointment.requester.company)
            .bind(&appointment.requester.title)
            .bind(appointment.created_at)
            .bind(appointment.updated_at)
            .bind(from_version(appointment.version)?)
            .bind(slot.date)
            .bind(slot.time.as_naive())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| write_error("failed to insert appointment", &e, &slot))?;

        from_row(&row)
    }

    async fn get(&self, id: AppointmentId) -> Result<Option<Appointment>, RepositoryError> {
        let query = format!("SELECT {COLUMNS} FROM appointments WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| database("failed to load appointment", &e))?;

        row.as_ref().map(from_row).transpose()
    }

    async fn update(
        &self,
        appointment: &Appointment,
        expected_version: u64,
    ) -> Result<Appointment, RepositoryError> {
        let slot = appointment.occupied_slot();
        let query = format!(
            r"
            UPDATE appointments
            SET status = $3,
                notes = $4,
                confirmed_date = $5,
                confirmed_time = $6,
                cancelled_by = $7,
                cancelled_at = $8,
                cancellation_reason = $9,
                outcome = $10,
                updated_at = $11,
                slot_date = $12,
                slot_time = $13,
                version = version + 1
            WHERE id = $1 AND version = $2
            RETURNING {COLUMNS}
            "
        );

        let row = sqlx::query(&query)
            .bind(appointment.id.as_uuid())
            .bind(from_version(expected_version)?)
            .bind(appointment.status.as_str())
            .bind(&appointment.notes)
            .bind(appointment.confirmed_date)
            .bind(appointment.confirmed_time.map(|t| t.as_naive()))
            .bind(appointment.cancelled_by.as_ref().map(UserId::as_str))
            .bind(appointment.cancelled_at)
            .bind(&appointment.cancellation_reason)
            .bind(&appointment.outcome)
            .bind(appointment.updated_at)
            .bind(slot.date)
            .bind(slot.time.as_naive())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| write_error("failed to update appointment", &e, &slot))?;

        match row {
            Some(row) => from_row(&row),
            None => match self.current_version(appointment.id).await? {
                Some(actual) => Err(RepositoryError::VersionMismatch {
                    expected: expected_version,
                    actual,
                }),
                None => Err(RepositoryError::NotFound(appointment.id)),
            },
        }
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<Appointment>, RepositoryError> {
        let (column, value) = match filter {
            ListFilter::Exhibitor(id) => ("exhibitor_id", id.as_str()),
            ListFilter::Requester(id) => ("requester_id", id.as_str()),
            ListFilter::Event(id) => ("event_id", id.as_str()),
        };
        let query = format!(
            "SELECT {COLUMNS} FROM appointments WHERE {column} = $1 ORDER BY created_at DESC, id DESC"
        );

        let rows = sqlx::query(&query)
            .bind(value)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| database("failed to list appointments", &e))?;

        rows.iter().map(from_row).collect()
    }

    async fn find_active_in_slot(
        &self,
        slot: &Slot,
        exclude: Option<AppointmentId>,
    ) -> Result<Option<Appointment>, RepositoryError> {
        let query = format!(
            r"
            SELECT {COLUMNS} FROM appointments
            WHERE event_id = $1
              AND exhibitor_id = $2
              AND slot_date = $3
              AND slot_time = $4
              AND status <> 'CANCELLED'
              AND ($5::uuid IS NULL OR id <> $5)
            LIMIT 1
            "
        );

        let row = sqlx::query(&query)
            .bind(slot.event_id.as_str())
            .bind(slot.exhibitor_id.as_str())
            .bind(slot.date)
            .bind(slot.time.as_naive())
            .bind(exclude.map(|id| *id.as_uuid()))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| database("failed to check slot", &e))?;

        row.as_ref().map(from_row).transpose()
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| database("ping failed", &e))
    }
}
