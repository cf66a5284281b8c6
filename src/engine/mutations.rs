use tracing::{debug, info};
use ulid::Ulid;

use crate::calendar;
use crate::model::*;
use crate::observability::{BOOKINGS_CREATED_TOTAL, BOOKING_CONFLICTS_TOTAL};

use super::conflict::{validate_actor, validate_participants, validate_span, NON_BLOCKING};
use super::{Engine, EngineError, OpeningWindow};

impl Engine {
    /// Validate and commit a new booking.
    ///
    /// The overlap lookup is only a pre-check; the ledger's key constraint is
    /// what decides between two racing requests, and its violation surfaces
    /// as the same [`EngineError::Conflict`].
    pub async fn create_booking(&self, request: NewBooking) -> Result<Booking, EngineError> {
        let start = calendar::parse_timestamp(&request.start_time).ok_or_else(|| {
            EngineError::Validation(format!("invalid start time: {:?}", request.start_time))
        })?;
        validate_actor(&request.user_id)?;
        validate_participants(&request.participants)?;

        let court = self
            .courts
            .court(request.court_id)
            .await?
            .filter(|c| c.club_id == request.club_id)
            .ok_or_else(|| EngineError::not_found("court", request.court_id))?;
        if !court.is_active {
            return Err(EngineError::Validation(format!(
                "court {} is not accepting bookings",
                court.id
            )));
        }

        let schedule = self
            .schedules
            .schedule_for_club(request.club_id)
            .await?
            .ok_or_else(|| EngineError::not_found("schedule", request.club_id))?;
        let date = calendar::date_of(start)
            .ok_or(EngineError::LimitExceeded("timestamp out of range"))?;
        let weekday = calendar::weekday(date);
        let window = OpeningWindow::for_date(date, &schedule.weekly_hours).ok_or_else(|| {
            EngineError::not_found("schedule", format!("{} (weekday {weekday})", request.club_id))
        })?;

        let span = Span::new(start, start + window.slot);
        validate_span(&span)?;

        if let Some(existing) = self.ledger.find_conflict(court.id, span, &NON_BLOCKING).await? {
            metrics::counter!(BOOKING_CONFLICTS_TOTAL, "stage" => "precheck").increment(1);
            return Err(EngineError::Conflict {
                booking_id: existing.id,
                span: existing.span,
            });
        }

        let booking = Booking {
            id: Ulid::new(),
            club_id: request.club_id,
            court_id: court.id,
            participants: participant_set(&request.user_id, &request.participants),
            user_id: request.user_id,
            span,
            status: request.status.unwrap_or(BookingStatus::PendingPayment),
            match_type: request.match_type.unwrap_or(MatchType::Double),
            game_type: request.game_type.unwrap_or(GameType::Open),
            is_private: request.is_private,
            needs_players: request.needs_players,
        };

        if let Err(e) = self.ledger.insert(booking.clone()).await {
            if e.is_constraint_violation() {
                metrics::counter!(BOOKING_CONFLICTS_TOTAL, "stage" => "constraint").increment(1);
            }
            return Err(e.into());
        }

        metrics::counter!(BOOKINGS_CREATED_TOTAL).increment(1);
        info!(
            "booking {} created on court {} at {}",
            booking.id,
            booking.court_id,
            calendar::format_timestamp(booking.span.start)
        );
        self.notify.send(booking.court_id, &Event::BookingCreated { booking: booking.clone() });
        Ok(booking)
    }

    /// Change status or match details of a booking. Club, court and times are
    /// fixed once created.
    pub async fn update_booking(&self, id: Ulid, patch: BookingPatch) -> Result<Booking, EngineError> {
        if let Some(participants) = &patch.participants {
            validate_participants(participants)?;
        }
        let current = self
            .ledger
            .get(id)
            .await?
            .ok_or_else(|| EngineError::not_found("booking", id))?;
        if patch.is_empty() {
            debug!("empty patch for booking {id}");
            return Ok(current);
        }

        let reoccupies = patch
            .status
            .is_some_and(|s| s.blocks_court() && !current.status.blocks_court());
        if reoccupies
            && let Some(existing) = self
                .ledger
                .find_conflict(current.court_id, current.span, &NON_BLOCKING)
                .await?
            && existing.id != id
        {
            metrics::counter!(BOOKING_CONFLICTS_TOTAL, "stage" => "precheck").increment(1);
            return Err(EngineError::Conflict {
                booking_id: existing.id,
                span: existing.span,
            });
        }

        let updated = self.ledger.update(id, &patch).await?;
        if updated.status != current.status {
            info!(
                "booking {id} status {} -> {}",
                current.status.as_str(),
                updated.status.as_str()
            );
        }
        self.notify.send(updated.court_id, &Event::BookingUpdated { booking: updated.clone() });
        Ok(updated)
    }

    /// Hard delete.
    pub async fn remove_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        let removed = self.ledger.remove(id).await?;
        info!("booking {id} removed from court {}", removed.court_id);
        self.notify.send(
            removed.court_id,
            &Event::BookingRemoved {
                id,
                court_id: removed.court_id,
            },
        );
        Ok(removed)
    }
}
