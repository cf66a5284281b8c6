use ulid::Ulid;

use crate::calendar::format_timestamp;
use crate::model::Span;

#[derive(Debug)]
pub enum EngineError {
    /// Malformed input: dates, times, ids, or values out of their domain.
    Validation(String),
    NotFound {
        entity: &'static str,
        id: String,
    },
    /// The requested interval overlaps an existing booking on the same court.
    Conflict {
        booking_id: Ulid,
        span: Span,
    },
    LimitExceeded(&'static str),
    WalError(String),
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        EngineError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(msg) => write!(f, "invalid input: {msg}"),
            EngineError::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            EngineError::Conflict { booking_id, span } => write!(
                f,
                "court is already booked from {} to {} (booking {booking_id})",
                format_timestamp(span.start),
                format_timestamp(span.end)
            ),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
