use chrono::NaiveDate;
use tracing::{debug, warn};
use ulid::Ulid;

use crate::calendar;
use crate::limits::*;
use crate::model::*;

use super::availability::{available_slots, OpeningWindow};
use super::{Engine, EngineError};

impl Engine {
    /// Free slots of every active court of a club on one UTC day.
    ///
    /// A missing schedule, a closed or incomplete weekday, or a club without
    /// active courts all yield an empty court list rather than an error. Only
    /// a malformed date is rejected.
    pub async fn get_availability(&self, club_id: Ulid, date: &str) -> Result<ClubAvailability, EngineError> {
        let day = calendar::parse_date(date)
            .ok_or_else(|| EngineError::Validation(format!("date must be YYYY-MM-DD, got {date:?}")))?;

        let Some(schedule) = self.schedules.schedule_for_club(club_id).await? else {
            warn!("availability for club {club_id} on {date}: no schedule");
            return Ok(ClubAvailability::empty(club_id, date));
        };
        if OpeningWindow::for_date(day, &schedule.weekly_hours).is_none() {
            warn!(
                "availability for club {club_id} on {date}: weekday {} closed or incomplete",
                calendar::weekday(day)
            );
            return Ok(ClubAvailability::empty(club_id, date));
        }

        let courts = self.courts.active_courts(club_id).await?;
        if courts.is_empty() {
            warn!("availability for club {club_id} on {date}: no active courts");
            return Ok(ClubAvailability::empty(club_id, date));
        }

        let court_ids: Vec<Ulid> = courts.iter().map(|c| c.id).collect();
        let bookings = self.list_bookings_for_courts(&court_ids, day).await?;
        debug!(
            "availability for club {club_id} on {date}: {} courts, {} bookings",
            courts.len(),
            bookings.len()
        );

        let courts = courts
            .into_iter()
            .map(|court| {
                let own: Vec<Booking> = bookings
                    .iter()
                    .filter(|b| b.court_id == court.id)
                    .cloned()
                    .collect();
                CourtAvailability {
                    available_slots: available_slots(day, &schedule.weekly_hours, &own),
                    court_id: court.id,
                    court_name: court.name,
                    court_type: court.court_type,
                }
            })
            .collect();

        Ok(ClubAvailability {
            club_id,
            date: date.to_string(),
            courts,
        })
    }

    /// Every booking on any of `court_ids` intersecting the UTC day, fetched
    /// in a single ledger call.
    pub async fn list_bookings_for_courts(
        &self,
        court_ids: &[Ulid],
        date: NaiveDate,
    ) -> Result<Vec<Booking>, EngineError> {
        if court_ids.len() > MAX_IN_CLAUSE_IDS {
            return Err(EngineError::LimitExceeded("too many court IDs"));
        }
        if court_ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.ledger.find_for_courts_on_date(court_ids, date).await?)
    }

    pub async fn get_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        self.ledger
            .get(id)
            .await?
            .ok_or_else(|| EngineError::not_found("booking", id))
    }

    pub async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>, EngineError> {
        if let Some(user_id) = &filter.user_id
            && user_id.len() > MAX_ACTOR_ID_LEN
        {
            return Err(EngineError::LimitExceeded("actor id too long"));
        }
        Ok(self.ledger.list(filter).await?)
    }
}
