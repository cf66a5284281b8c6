//! Durable implementation of the schedule, court and booking collaborators.
//!
//! State lives in memory and every change is journaled before it is applied.
//! Bookings are sharded per court behind a `tokio::sync::RwLock`; the
//! occupancy check, the journal append and the apply all happen under the
//! court's write lock, so the key and exclusion constraints hold under
//! concurrent inserts.

mod catalog;
mod journal;
mod ledger;

pub use journal::JournalStats;
pub use ledger::CourtBookings;

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock};
use tracing::info;
use ulid::Ulid;

use crate::calendar;
use crate::engine::{first_conflict, BookingLedger, CourtRegistry, EngineError, LedgerError, ScheduleStore};
use crate::limits::*;
use crate::model::*;
use crate::wal::Wal;

use catalog::{validate_court, validate_daily_hours, validate_weekly_hours, Catalog};
use journal::Journal;

pub type SharedCourtBookings = Arc<RwLock<CourtBookings>>;

pub struct Store {
    catalog: Catalog,
    bookings: DashMap<Ulid, SharedCourtBookings>,
    /// Booking id → court id.
    booking_court: DashMap<Ulid, Ulid>,
    journal: Journal,
    /// Serializes schedule and court writes.
    catalog_lock: Mutex<()>,
    /// Shared by every journaled write, exclusive for compaction, so no append
    /// can fall between taking a snapshot and swapping it in.
    gate: RwLock<()>,
}

impl Store {
    /// Replay the log at `path` and start its writer task.
    pub fn open(path: &Path) -> io::Result<Self> {
        let events = Wal::replay(path)?;
        let replayed = events.len();

        let catalog = Catalog::default();
        let mut courts: HashMap<Ulid, CourtBookings> = HashMap::new();
        let booking_court = DashMap::new();
        for event in &events {
            match event {
                Event::BookingCreated { booking } => {
                    booking_court.insert(booking.id, booking.court_id);
                    courts.entry(booking.court_id).or_default().insert(booking.clone());
                }
                Event::BookingUpdated { booking } => {
                    if let Some(court) = courts.get_mut(&booking.court_id) {
                        court.replace(booking.clone());
                    }
                }
                Event::BookingRemoved { id, court_id } => {
                    if let Some(court) = courts.get_mut(court_id) {
                        court.remove(*id);
                    }
                    booking_court.remove(id);
                }
                other => catalog.apply(other),
            }
        }

        let bookings = DashMap::new();
        for (court_id, court) in courts {
            bookings.insert(court_id, Arc::new(RwLock::new(court)));
        }
        if replayed > 0 {
            info!("{}: replayed {replayed} records", path.display());
        }

        Ok(Self {
            catalog,
            bookings,
            booking_court,
            journal: Journal::open(path)?,
            catalog_lock: Mutex::new(()),
            gate: RwLock::new(()),
        })
    }

    fn court_bookings(&self, court_id: Ulid) -> Option<SharedCourtBookings> {
        self.bookings.get(&court_id).map(|e| e.value().clone())
    }

    fn court_bookings_or_create(&self, court_id: Ulid) -> SharedCourtBookings {
        self.bookings.entry(court_id).or_default().value().clone()
    }

    async fn journal(&self, event: Event) -> Result<(), LedgerError> {
        self.journal
            .append(event)
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))
    }

    /// Journal and apply a catalog event. Caller holds `catalog_lock`.
    async fn commit_catalog(&self, event: Event) -> Result<(), EngineError> {
        let _gate = self.gate.read().await;
        self.journal
            .append(event.clone())
            .await
            .map_err(|e| EngineError::WalError(e.to_string()))?;
        self.catalog.apply(&event);
        Ok(())
    }

    // ── Schedules ────────────────────────────────────────────────

    /// Every day open 14:00–23:00 with 90-minute slots. Fails if the club
    /// already has a schedule.
    pub async fn create_default_schedule(&self, club_id: Ulid) -> Result<Schedule, EngineError> {
        let _lock = self.catalog_lock.lock().await;
        if self.catalog.schedule(club_id).is_some() {
            return Err(EngineError::Validation(format!("club {club_id} already has a schedule")));
        }
        let schedule = Schedule::default_for(club_id);
        self.commit_catalog(Event::ScheduleSet {
            schedule: schedule.clone(),
        })
        .await?;
        info!("default schedule created for club {club_id}");
        Ok(schedule)
    }

    pub async fn put_schedule(&self, club_id: Ulid, weekly_hours: Vec<DailyHours>) -> Result<Schedule, EngineError> {
        let schedule = Schedule {
            club_id,
            weekly_hours: validate_weekly_hours(weekly_hours)?,
        };
        let _lock = self.catalog_lock.lock().await;
        self.commit_catalog(Event::ScheduleSet {
            schedule: schedule.clone(),
        })
        .await?;
        Ok(schedule)
    }

    /// Replace one weekday of an existing schedule.
    pub async fn set_daily_hours(&self, club_id: Ulid, hours: DailyHours) -> Result<Schedule, EngineError> {
        validate_daily_hours(&hours)?;
        let _lock = self.catalog_lock.lock().await;
        let mut schedule = self
            .catalog
            .schedule(club_id)
            .ok_or_else(|| EngineError::not_found("schedule", club_id))?;
        match schedule
            .weekly_hours
            .iter_mut()
            .find(|h| h.day_of_week == hours.day_of_week)
        {
            Some(slot) => *slot = hours,
            None => {
                schedule.weekly_hours.push(hours);
                schedule.weekly_hours.sort_by_key(|h| h.day_of_week);
            }
        }
        self.commit_catalog(Event::ScheduleSet {
            schedule: schedule.clone(),
        })
        .await?;
        Ok(schedule)
    }

    pub async fn remove_schedule(&self, club_id: Ulid) -> Result<(), EngineError> {
        let _lock = self.catalog_lock.lock().await;
        if self.catalog.schedule(club_id).is_none() {
            return Err(EngineError::not_found("schedule", club_id));
        }
        self.commit_catalog(Event::ScheduleRemoved { club_id }).await
    }

    // ── Courts ───────────────────────────────────────────────────

    /// Insert a court, or replace it in place keeping its registry position.
    pub async fn save_court(&self, court: Court) -> Result<Court, EngineError> {
        validate_court(&court)?;
        let _lock = self.catalog_lock.lock().await;
        match self.catalog.court(court.id) {
            Some(existing) if existing.club_id != court.club_id => {
                return Err(EngineError::Validation(format!(
                    "court {} belongs to club {}",
                    court.id, existing.club_id
                )));
            }
            Some(_) => {}
            None => {
                if self.catalog.court_count(court.club_id) >= MAX_COURTS_PER_CLUB {
                    return Err(EngineError::LimitExceeded("too many courts in club"));
                }
            }
        }
        self.commit_catalog(Event::CourtSaved { court: court.clone() }).await?;
        Ok(court)
    }

    /// Remove a court from its club's registry. Its bookings are kept.
    pub async fn remove_court(&self, court_id: Ulid) -> Result<Court, EngineError> {
        let _lock = self.catalog_lock.lock().await;
        let court = self
            .catalog
            .court(court_id)
            .ok_or_else(|| EngineError::not_found("court", court_id))?;
        self.commit_catalog(Event::CourtRemoved {
            id: court.id,
            club_id: court.club_id,
        })
        .await?;
        Ok(court)
    }

    /// Every court of a club, active or not, in registry order.
    pub fn list_courts(&self, club_id: Ulid) -> Vec<Court> {
        self.catalog.courts_of(club_id)
    }

    // ── Maintenance ──────────────────────────────────────────────

    /// Rewrite the log as the minimal set of records for the current state.
    /// Returns the number of records written.
    pub async fn compact(&self) -> Result<usize, EngineError> {
        let _gate = self.gate.write().await;
        let mut snapshot = self.catalog.snapshot();
        let courts: Vec<SharedCourtBookings> = self.bookings.iter().map(|e| e.value().clone()).collect();
        for court in courts {
            let guard = court.read().await;
            snapshot.extend(guard.iter().map(|b| Event::BookingCreated { booking: b.clone() }));
        }
        let written = snapshot.len();
        self.journal
            .compact(snapshot)
            .await
            .map_err(|e| EngineError::WalError(e.to_string()))?;
        Ok(written)
    }

    pub async fn journal_stats(&self) -> JournalStats {
        self.journal.stats().await
    }
}

#[async_trait]
impl ScheduleStore for Store {
    async fn schedule_for_club(&self, club_id: Ulid) -> Result<Option<Schedule>, EngineError> {
        Ok(self.catalog.schedule(club_id))
    }
}

#[async_trait]
impl CourtRegistry for Store {
    async fn active_courts(&self, club_id: Ulid) -> Result<Vec<Court>, EngineError> {
        let mut courts = self.catalog.courts_of(club_id);
        courts.retain(|c| c.is_active);
        Ok(courts)
    }

    async fn court(&self, court_id: Ulid) -> Result<Option<Court>, EngineError> {
        Ok(self.catalog.court(court_id))
    }
}

#[async_trait]
impl BookingLedger for Store {
    async fn find_conflict(
        &self,
        court_id: Ulid,
        span: Span,
        excluded: &[BookingStatus],
    ) -> Result<Option<Booking>, LedgerError> {
        let Some(court) = self.court_bookings(court_id) else {
            return Ok(None);
        };
        let guard = court.read().await;
        Ok(first_conflict(guard.overlapping(&span), &span, excluded).cloned())
    }

    async fn find_for_courts_on_date(
        &self,
        court_ids: &[Ulid],
        date: NaiveDate,
    ) -> Result<Vec<Booking>, LedgerError> {
        let day = calendar::day_span(date);
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for &court_id in court_ids {
            if !seen.insert(court_id) {
                continue;
            }
            if let Some(court) = self.court_bookings(court_id) {
                let guard = court.read().await;
                found.extend(guard.overlapping(&day).cloned());
            }
        }
        Ok(found)
    }

    async fn insert(&self, booking: Booking) -> Result<(), LedgerError> {
        let _gate = self.gate.read().await;
        let court = self.court_bookings_or_create(booking.court_id);
        let mut guard = court.write().await;
        guard.check_occupancy(&booking)?;
        self.journal(Event::BookingCreated {
            booking: booking.clone(),
        })
        .await?;
        self.booking_court.insert(booking.id, booking.court_id);
        guard.insert(booking);
        Ok(())
    }

    async fn get(&self, id: Ulid) -> Result<Option<Booking>, LedgerError> {
        let Some(court_id) = self.booking_court.get(&id).map(|e| *e.value()) else {
            return Ok(None);
        };
        let Some(court) = self.court_bookings(court_id) else {
            return Ok(None);
        };
        let guard = court.read().await;
        Ok(guard.get(id).cloned())
    }

    async fn update(&self, id: Ulid, patch: &BookingPatch) -> Result<Booking, LedgerError> {
        let _gate = self.gate.read().await;
        let court_id = self
            .booking_court
            .get(&id)
            .map(|e| *e.value())
            .ok_or(LedgerError::NotFound(id))?;
        let court = self.court_bookings(court_id).ok_or(LedgerError::NotFound(id))?;
        let mut guard = court.write().await;
        let current = guard.get(id).ok_or(LedgerError::NotFound(id))?;

        let mut next = current.clone();
        next.apply_patch(patch);
        if next.status.blocks_court() && !current.status.blocks_court() {
            guard.check_occupancy(&next)?;
        }
        self.journal(Event::BookingUpdated { booking: next.clone() }).await?;
        guard.replace(next.clone());
        Ok(next)
    }

    async fn remove(&self, id: Ulid) -> Result<Booking, LedgerError> {
        let _gate = self.gate.read().await;
        let court_id = self
            .booking_court
            .get(&id)
            .map(|e| *e.value())
            .ok_or(LedgerError::NotFound(id))?;
        let court = self.court_bookings(court_id).ok_or(LedgerError::NotFound(id))?;
        let mut guard = court.write().await;
        if guard.get(id).is_none() {
            return Err(LedgerError::NotFound(id));
        }
        self.journal(Event::BookingRemoved { id, court_id }).await?;
        self.booking_court.remove(&id);
        guard.remove(id).ok_or(LedgerError::NotFound(id))
    }

    async fn list(&self, filter: &BookingFilter) -> Result<Vec<Booking>, LedgerError> {
        let courts: Vec<SharedCourtBookings> = match filter.court_id {
            Some(court_id) => self.court_bookings(court_id).into_iter().collect(),
            None => self.bookings.iter().map(|e| e.value().clone()).collect(),
        };
        let day = filter.date.map(calendar::day_span);

        let mut found = Vec::new();
        for court in courts {
            let guard = court.read().await;
            found.extend(
                guard
                    .iter()
                    .filter(|b| filter.club_id.is_none_or(|club| b.club_id == club))
                    .filter(|b| filter.user_id.as_deref().is_none_or(|user| b.user_id == user))
                    .filter(|b| day.is_none_or(|d| d.contains_instant(b.span.start)))
                    .cloned(),
            );
        }
        found.sort_by_key(|b| (b.span.start, b.id));
        Ok(found)
    }
}
