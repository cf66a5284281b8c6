use async_trait::async_trait;
use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::*;

use super::EngineError;

/// Read side of the club schedule collaborator.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn schedule_for_club(&self, club_id: Ulid) -> Result<Option<Schedule>, EngineError>;
}

/// Read side of the court collaborator.
#[async_trait]
pub trait CourtRegistry: Send + Sync {
    /// Active courts of a club, in registry order.
    async fn active_courts(&self, club_id: Ulid) -> Result<Vec<Court>, EngineError>;

    async fn court(&self, court_id: Ulid) -> Result<Option<Court>, EngineError>;
}

/// Booking persistence.
///
/// Every implementation must enforce a unique key over `(court_id, span.start)`
/// for bookings that occupy their court, and report a violation as
/// [`LedgerError::DuplicateKey`] without writing anything. That key is the only
/// guard required to hold under concurrent inserts: two bookings with different
/// but overlapping starts can both pass a prior [`find_conflict`] unless the
/// implementation also rejects range overlap ([`LedgerError::Overlap`]).
///
/// [`find_conflict`]: BookingLedger::find_conflict
#[async_trait]
pub trait BookingLedger: Send + Sync {
    /// At most one booking on `court_id` overlapping `span`, ignoring the
    /// given statuses.
    async fn find_conflict(
        &self,
        court_id: Ulid,
        span: Span,
        excluded: &[BookingStatus],
    ) -> Result<Option<Booking>, LedgerError>;

    /// Every booking on any of `court_ids` intersecting the UTC day of `date`,
    /// in one pass.
    async fn find_for_courts_on_date(
        &self,
        court_ids: &[Ulid],
        date: NaiveDate,
    ) -> Result<Vec<Booking>, LedgerError>;

    async fn insert(&self, booking: Booking) -> Result<(), LedgerError>;

    async fn get(&self, id: Ulid) -> Result<Option<Booking>, LedgerError>;

    /// Apply `patch` atomically and return the stored result. Moving a booking
    /// back into a court-occupying status is subject to the same key check as
    /// an insert.
    async fn update(&self, id: Ulid, patch: &BookingPatch) -> Result<Booking, LedgerError>;

    /// Hard delete.
    async fn remove(&self, id: Ulid) -> Result<Booking, LedgerError>;

    /// Matching bookings ordered by start time.
    async fn list(&self, filter: &BookingFilter) -> Result<Vec<Booking>, LedgerError>;
}

#[derive(Debug)]
pub enum LedgerError {
    /// Another occupying booking already starts at this instant on the court.
    DuplicateKey { existing: Ulid, span: Span },
    /// Another occupying booking overlaps the interval.
    Overlap { existing: Ulid, span: Span },
    NotFound(Ulid),
    Storage(String),
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::DuplicateKey { existing, span } => write!(
                f,
                "duplicate key (court, start_time): booking {existing} already starts at {}",
                span.start
            ),
            LedgerError::Overlap { existing, span } => write!(
                f,
                "exclusion violation: booking {existing} occupies [{}, {})",
                span.start, span.end
            ),
            LedgerError::NotFound(id) => write!(f, "booking not found: {id}"),
            LedgerError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<LedgerError> for EngineError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::DuplicateKey { existing, span } | LedgerError::Overlap { existing, span } => {
                EngineError::Conflict {
                    booking_id: existing,
                    span,
                }
            }
            LedgerError::NotFound(id) => EngineError::not_found("booking", id),
            LedgerError::Storage(e) => EngineError::WalError(e),
        }
    }
}

impl LedgerError {
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, LedgerError::DuplicateKey { .. } | LedgerError::Overlap { .. })
    }
}
