//! Reservation model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;
use uuid::Uuid;

/// Reservation lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Active,
    Returned,
    Cancelled,
    /// Legacy stored value. Overdue is computed at read time and never written.
    Overdue,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Active => "ACTIVE",
            ReservationStatus::Returned => "RETURNED",
            ReservationStatus::Cancelled => "CANCELLED",
            ReservationStatus::Overdue => "OVERDUE",
        }
    }

    /// Whether the reservation still holds a copy of its book
    pub fn is_open(&self) -> bool {
        matches!(self, ReservationStatus::Active | ReservationStatus::Overdue)
    }
}

impl std::str::FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(ReservationStatus::Active),
            "RETURNED" => Ok(ReservationStatus::Returned),
            "CANCELLED" => Ok(ReservationStatus::Cancelled),
            "OVERDUE" => Ok(ReservationStatus::Overdue),
            _ => Err(format!("Invalid reservation status: {}", s)),
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// SQLx conversion for ReservationStatus (stored as text)
impl sqlx::Type<Postgres> for ReservationStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for ReservationStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for ReservationStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        let s: String = self.as_str().to_string();
        <String as Encode<Postgres>>::encode(s, buf)
    }
}

/// Reservation record from the ledger
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Reservation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub reservation_date: DateTime<Utc>,
    pub expected_return_date: DateTime<Utc>,
    pub actual_return_date: Option<DateTime<Utc>>,
    pub status: ReservationStatus,
    // Display cache copied from the user and book, may be stale
    pub user_username: Option<String>,
    pub user_first_name: Option<String>,
    pub user_last_name: Option<String>,
    pub book_title: Option<String>,
    pub book_author: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// Open and past its expected return date
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status.is_open() && now > self.expected_return_date
    }

    pub fn with_overdue_flag(self, now: DateTime<Utc>) -> ReservationDetails {
        ReservationDetails {
            is_overdue: self.is_overdue(now),
            reservation: self,
        }
    }
}

/// Reservation as returned by the API, with the computed overdue flag
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReservationDetails {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub is_overdue: bool,
}

/// Denormalized display fields captured from the user and the book
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayFields {
    pub user_username: Option<String>,
    pub user_first_name: Option<String>,
    pub user_last_name: Option<String>,
    pub book_title: Option<String>,
    pub book_author: Option<String>,
}

/// Reservation ready to be inserted in the ledger
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub reservation_date: DateTime<Utc>,
    pub expected_return_date: DateTime<Utc>,
    pub display: DisplayFields,
}

/// Create reservation request
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReservation {
    pub user_id: Uuid,
    pub book_id: Uuid,
}

/// Update reservation request. Status changes go through return/cancel.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateReservation {
    /// New expected return date (open reservations only)
    pub expected_return_date: Option<DateTime<Utc>>,
}

/// Ledger lookup criteria; unset fields match everything
#[derive(Debug, Clone, Default)]
pub struct ReservationFilter {
    pub user_id: Option<Uuid>,
    pub book_id: Option<Uuid>,
    pub status: Option<ReservationStatus>,
    /// Only open reservations whose expected return date is before this instant
    pub overdue_at: Option<DateTime<Utc>>,
}

impl ReservationFilter {
    pub fn matches(&self, r: &Reservation) -> bool {
        self.user_id.map_or(true, |id| r.user_id == id)
            && self.book_id.map_or(true, |id| r.book_id == id)
            && self.status.map_or(true, |s| r.status == s)
            && self.overdue_at.map_or(true, |t| r.is_overdue(t))
    }
}

/// Active and overdue counts
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReservationSummary {
    pub active: i64,
    pub overdue: i64,
}
