use crate::limits::*;
use crate::model::*;

use super::EngineError;

/// Statuses that never hold a court, so never conflict.
pub(crate) const NON_BLOCKING: [BookingStatus; 1] = [BookingStatus::CancelledByAdmin];

pub(crate) fn validate_span(span: &Span) -> Result<(), EngineError> {
    if span.start < MIN_VALID_TIMESTAMP_MS || span.end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    Ok(())
}

pub(crate) fn validate_actor(user_id: &str) -> Result<(), EngineError> {
    if user_id.trim().is_empty() {
        return Err(EngineError::Validation("an authenticated actor id is required".into()));
    }
    if user_id.len() > MAX_ACTOR_ID_LEN {
        return Err(EngineError::LimitExceeded("actor id too long"));
    }
    Ok(())
}

pub(crate) fn validate_participants(participants: &[String]) -> Result<(), EngineError> {
    // +1 for the booker, who is always added.
    if participants.len() + 1 > MAX_PARTICIPANTS {
        return Err(EngineError::LimitExceeded("too many participants"));
    }
    if participants.iter().any(|p| p.len() > MAX_ACTOR_ID_LEN) {
        return Err(EngineError::LimitExceeded("participant id too long"));
    }
    Ok(())
}

/// First booking overlapping `span` whose status is not excluded.
pub(crate) fn first_conflict<'a>(
    mut bookings: impl Iterator<Item = &'a Booking>,
    span: &Span,
    excluded: &[BookingStatus],
) -> Option<&'a Booking> {
    bookings.find(|b| !excluded.contains(&b.status) && b.span.overlaps(span))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn booking(start: Ms, end: Ms, status: BookingStatus) -> Booking {
        Booking {
            id: Ulid::new(),
            club_id: Ulid::new(),
            court_id: Ulid::new(),
            user_id: "u".into(),
            span: Span::new(start, end),
            status,
            participants: vec!["u".into()],
            match_type: MatchType::Double,
            game_type: GameType::Open,
            is_private: false,
            needs_players: false,
        }
    }

    #[test]
    fn conflict_uses_half_open_overlap() {
        let existing = [booking(100, 200, BookingStatus::Confirmed)];
        assert!(first_conflict(existing.iter(), &Span::new(150, 250), &NON_BLOCKING).is_some());
        assert!(first_conflict(existing.iter(), &Span::new(50, 101), &NON_BLOCKING).is_some());
        assert!(first_conflict(existing.iter(), &Span::new(200, 300), &NON_BLOCKING).is_none());
        assert!(first_conflict(existing.iter(), &Span::new(0, 100), &NON_BLOCKING).is_none());
    }

    #[test]
    fn excluded_statuses_are_skipped() {
        let existing = [
            booking(100, 200, BookingStatus::CancelledByAdmin),
            booking(100, 200, BookingStatus::CancelledByUser),
        ];
        let hit = first_conflict(existing.iter(), &Span::new(100, 200), &NON_BLOCKING).unwrap();
        assert_eq!(hit.status, BookingStatus::CancelledByUser);
        assert!(first_conflict(existing[..1].iter(), &Span::new(100, 200), &NON_BLOCKING).is_none());
    }

    #[test]
    fn span_range_limits() {
        assert!(validate_span(&Span::new(MIN_VALID_TIMESTAMP_MS, MIN_VALID_TIMESTAMP_MS + 1)).is_ok());
        assert!(matches!(
            validate_span(&Span::new(0, 1)),
            Err(EngineError::LimitExceeded(_))
        ));
        assert!(matches!(
            validate_span(&Span::new(MAX_VALID_TIMESTAMP_MS, MAX_VALID_TIMESTAMP_MS + 1)),
            Err(EngineError::LimitExceeded(_))
        ));
    }

    #[test]
    fn actor_and_participant_limits() {
        assert!(validate_actor("auth0|123").is_ok());
        assert!(matches!(validate_actor("  "), Err(EngineError::Validation(_))));
        assert!(matches!(
            validate_actor(&"x".repeat(MAX_ACTOR_ID_LEN + 1)),
            Err(EngineError::LimitExceeded(_))
        ));
        let many: Vec<String> = (0..MAX_PARTICIPANTS).map(|i| format!("p{i}")).collect();
        assert!(validate_participants(&many[..MAX_PARTICIPANTS - 1]).is_ok());
        assert!(validate_participants(&many).is_err());
    }
}
