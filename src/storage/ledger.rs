use ulid::Ulid;

use crate::engine::LedgerError;
use crate::model::*;

/// All bookings of one court, kept sorted by `(span.start, id)`.
#[derive(Debug, Default)]
pub struct CourtBookings {
    bookings: Vec<Booking>,
}

impl CourtBookings {
    pub fn len(&self) -> usize {
        self.bookings.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Booking> {
        self.bookings.iter()
    }

    pub fn get(&self, id: Ulid) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }

    /// Bookings whose span overlaps `span`, in start order.
    pub fn overlapping<'a>(&'a self, span: &'a Span) -> impl Iterator<Item = &'a Booking> + 'a {
        let upper = self.bookings.partition_point(|b| b.span.start < span.end);
        self.bookings[..upper]
            .iter()
            .filter(move |b| b.span.end > span.start)
    }

    /// The key and exclusion check for `candidate` entering an occupying
    /// status. Bookings that do not occupy the court, and `candidate` itself,
    /// are ignored.
    pub fn check_occupancy(&self, candidate: &Booking) -> Result<(), LedgerError> {
        if !candidate.status.blocks_court() {
            return Ok(());
        }
        let mut overlap = None;
        for other in self.overlapping(&candidate.span) {
            if other.id == candidate.id || !other.status.blocks_court() {
                continue;
            }
            if other.span.start == candidate.span.start {
                return Err(LedgerError::DuplicateKey {
                    existing: other.id,
                    span: other.span,
                });
            }
            overlap.get_or_insert(other);
        }
        match overlap {
            Some(other) => Err(LedgerError::Overlap {
                existing: other.id,
                span: other.span,
            }),
            None => Ok(()),
        }
    }

    pub fn insert(&mut self, booking: Booking) {
        let key = (booking.span.start, booking.id);
        let at = self.bookings.partition_point(|b| (b.span.start, b.id) < key);
        self.bookings.insert(at, booking);
    }

    /// Replace a booking whose start time has not changed.
    pub fn replace(&mut self, booking: Booking) -> Option<Booking> {
        let slot = self.bookings.iter_mut().find(|b| b.id == booking.id)?;
        Some(std::mem::replace(slot, booking))
    }

    pub fn remove(&mut self, id: Ulid) -> Option<Booking> {
        let at = self.bookings.iter().position(|b| b.id == id)?;
        Some(self.bookings.remove(at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking(start: Ms, end: Ms, status: BookingStatus) -> Booking {
        Booking {
            id: Ulid::new(),
            club_id: Ulid::nil(),
            court_id: Ulid::nil(),
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
    fn insert_keeps_start_order() {
        let mut court = CourtBookings::default();
        court.insert(booking(300, 400, BookingStatus::Confirmed));
        court.insert(booking(100, 200, BookingStatus::Confirmed));
        court.insert(booking(200, 300, BookingStatus::Confirmed));
        let starts: Vec<Ms> = court.iter().map(|b| b.span.start).collect();
        assert_eq!(starts, vec![100, 200, 300]);
    }

    #[test]
    fn overlapping_finds_long_earlier_bookings() {
        let mut court = CourtBookings::default();
        court.insert(booking(0, 1_000, BookingStatus::Confirmed));
        court.insert(booking(500, 600, BookingStatus::Confirmed));
        court.insert(booking(1_000, 1_100, BookingStatus::Confirmed));
        let query = Span::new(700, 1_000);
        let hits: Vec<Ms> = court.overlapping(&query).map(|b| b.span.start).collect();
        assert_eq!(hits, vec![0]);
    }

    #[test]
    fn same_start_is_a_duplicate_key() {
        let mut court = CourtBookings::default();
        let existing = booking(100, 200, BookingStatus::PendingPayment);
        court.insert(existing.clone());
        let err = court
            .check_occupancy(&booking(100, 190, BookingStatus::Confirmed))
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateKey { existing: id, .. } if id == existing.id));
    }

    #[test]
    fn partial_overlap_is_an_exclusion_violation() {
        let mut court = CourtBookings::default();
        court.insert(booking(100, 200, BookingStatus::Confirmed));
        let err = court
            .check_occupancy(&booking(150, 250, BookingStatus::Confirmed))
            .unwrap_err();
        assert!(matches!(err, LedgerError::Overlap { .. }));
        assert!(court.check_occupancy(&booking(200, 300, BookingStatus::Confirmed)).is_ok());
    }

    #[test]
    fn admin_cancelled_never_collides() {
        let mut court = CourtBookings::default();
        court.insert(booking(100, 200, BookingStatus::CancelledByAdmin));
        assert!(court.check_occupancy(&booking(100, 200, BookingStatus::Confirmed)).is_ok());
        court.insert(booking(100, 200, BookingStatus::Confirmed));
        // An admin-cancelled candidate does not occupy anything either.
        assert!(court.check_occupancy(&booking(100, 200, BookingStatus::CancelledByAdmin)).is_ok());
    }

    #[test]
    fn candidate_does_not_collide_with_itself() {
        let mut court = CourtBookings::default();
        let mut b = booking(100, 200, BookingStatus::CancelledByAdmin);
        court.insert(b.clone());
        b.status = BookingStatus::Confirmed;
        assert!(court.check_occupancy(&b).is_ok());
        assert!(court.replace(b.clone()).is_some());
        assert_eq!(court.get(b.id).unwrap().status, BookingStatus::Confirmed);
        assert_eq!(court.remove(b.id), Some(b));
        assert_eq!(court.len(), 0);
    }
}
