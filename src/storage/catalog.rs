use dashmap::DashMap;
use ulid::Ulid;

use crate::calendar;
use crate::engine::EngineError;
use crate::limits::*;
use crate::model::*;

/// Club schedules and court registries, rebuilt from the log.
#[derive(Default)]
pub struct Catalog {
    schedules: DashMap<Ulid, Schedule>,
    /// Club → courts in registry (insertion) order.
    courts: DashMap<Ulid, Vec<Court>>,
    court_club: DashMap<Ulid, Ulid>,
}

impl Catalog {
    pub fn schedule(&self, club_id: Ulid) -> Option<Schedule> {
        self.schedules.get(&club_id).map(|s| s.value().clone())
    }

    pub fn court(&self, court_id: Ulid) -> Option<Court> {
        let club_id = *self.court_club.get(&court_id)?;
        self.courts
            .get(&club_id)?
            .iter()
            .find(|c| c.id == court_id)
            .cloned()
    }

    pub fn courts_of(&self, club_id: Ulid) -> Vec<Court> {
        self.courts
            .get(&club_id)
            .map(|c| c.value().clone())
            .unwrap_or_default()
    }

    pub fn court_count(&self, club_id: Ulid) -> usize {
        self.courts.get(&club_id).map_or(0, |c| c.len())
    }

    /// Apply a schedule or court event. Booking events are ignored.
    pub fn apply(&self, event: &Event) {
        match event {
            Event::ScheduleSet { schedule } => {
                self.schedules.insert(schedule.club_id, schedule.clone());
            }
            Event::ScheduleRemoved { club_id } => {
                self.schedules.remove(club_id);
            }
            Event::CourtSaved { court } => {
                let mut courts = self.courts.entry(court.club_id).or_default();
                match courts.iter_mut().find(|c| c.id == court.id) {
                    Some(existing) => *existing = court.clone(),
                    None => courts.push(court.clone()),
                }
                drop(courts);
                self.court_club.insert(court.id, court.club_id);
            }
            Event::CourtRemoved { id, club_id } => {
                if let Some(mut courts) = self.courts.get_mut(club_id) {
                    courts.retain(|c| c.id != *id);
                }
                self.court_club.remove(id);
            }
            Event::BookingCreated { .. } | Event::BookingUpdated { .. } | Event::BookingRemoved { .. } => {}
        }
    }

    /// Events recreating the current catalog.
    pub fn snapshot(&self) -> Vec<Event> {
        let mut events: Vec<Event> = self
            .schedules
            .iter()
            .map(|s| Event::ScheduleSet {
                schedule: s.value().clone(),
            })
            .collect();
        for club in self.courts.iter() {
            events.extend(club.value().iter().map(|court| Event::CourtSaved {
                court: court.clone(),
            }));
        }
        events
    }
}

// ── Validation ───────────────────────────────────────────────────

pub(crate) fn validate_daily_hours(hours: &DailyHours) -> Result<(), EngineError> {
    if hours.day_of_week > 6 {
        return Err(EngineError::Validation(format!(
            "day_of_week must be 0-6, got {}",
            hours.day_of_week
        )));
    }
    let parse = |field: &str, value: &Option<String>| -> Result<Option<u32>, EngineError> {
        value
            .as_deref()
            .map(|v| {
                calendar::parse_hhmm(v)
                    .ok_or_else(|| EngineError::Validation(format!("{field} must be HH:MM, got {v:?}")))
            })
            .transpose()
    };
    let open = parse("open_time", &hours.open_time)?;
    let close = parse("close_time", &hours.close_time)?;
    if let (Some(open), Some(close)) = (open, close)
        && close <= open
    {
        return Err(EngineError::Validation(format!(
            "close_time must be after open_time on day {}",
            hours.day_of_week
        )));
    }
    if let Some(slot) = hours.slot_duration_minutes
        && !(MIN_SLOT_MINUTES..=MAX_SLOT_MINUTES).contains(&slot)
    {
        return Err(EngineError::Validation(format!(
            "slot_duration_minutes must be between {MIN_SLOT_MINUTES} and {MAX_SLOT_MINUTES}, got {slot}"
        )));
    }
    Ok(())
}

/// Exactly one entry per weekday. Returns the entries ordered by day.
pub(crate) fn validate_weekly_hours(mut weekly_hours: Vec<DailyHours>) -> Result<Vec<DailyHours>, EngineError> {
    if weekly_hours.len() != 7 {
        return Err(EngineError::Validation(format!(
            "a schedule needs 7 daily entries, got {}",
            weekly_hours.len()
        )));
    }
    for hours in &weekly_hours {
        validate_daily_hours(hours)?;
    }
    weekly_hours.sort_by_key(|h| h.day_of_week);
    if weekly_hours.iter().enumerate().any(|(i, h)| usize::from(h.day_of_week) != i) {
        return Err(EngineError::Validation("day_of_week values must be unique".into()));
    }
    Ok(weekly_hours)
}

pub(crate) fn validate_court(court: &Court) -> Result<(), EngineError> {
    if court.name.trim().is_empty() {
        return Err(EngineError::Validation("court name must not be empty".into()));
    }
    if court.name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("court name too long"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn court(club_id: Ulid, name: &str) -> Court {
        Court {
            id: Ulid::new(),
            club_id,
            name: name.into(),
            court_type: CourtType::OutdoorWall,
            is_active: true,
        }
    }

    #[test]
    fn courts_keep_registry_order_across_replacement() {
        let catalog = Catalog::default();
        let club = Ulid::new();
        let (a, b, c) = (court(club, "A"), court(club, "B"), court(club, "C"));
        for x in [&a, &b, &c] {
            catalog.apply(&Event::CourtSaved { court: x.clone() });
        }
        let mut renamed = b.clone();
        renamed.name = "B2".into();
        renamed.is_active = false;
        catalog.apply(&Event::CourtSaved { court: renamed.clone() });

        let names: Vec<String> = catalog.courts_of(club).into_iter().map(|c| c.name).collect();
        assert_eq!(names, ["A", "B2", "C"]);
        assert_eq!(catalog.court(b.id), Some(renamed));

        catalog.apply(&Event::CourtRemoved { id: a.id, club_id: club });
        assert!(catalog.court(a.id).is_none());
        assert_eq!(catalog.court_count(club), 2);
    }

    #[test]
    fn snapshot_rebuilds_the_same_catalog() {
        let catalog = Catalog::default();
        let club = Ulid::new();
        catalog.apply(&Event::ScheduleSet {
            schedule: Schedule::default_for(club),
        });
        catalog.apply(&Event::CourtSaved { court: court(club, "1") });
        catalog.apply(&Event::CourtSaved { court: court(club, "2") });

        let rebuilt = Catalog::default();
        for e in catalog.snapshot() {
            rebuilt.apply(&e);
        }
        assert_eq!(rebuilt.schedule(club), catalog.schedule(club));
        assert_eq!(rebuilt.courts_of(club), catalog.courts_of(club));
    }

    #[test]
    fn daily_hours_validation() {
        assert!(validate_daily_hours(&DailyHours::open(0, "08:00", "22:00", 60)).is_ok());
        assert!(validate_daily_hours(&DailyHours::closed(6)).is_ok());
        assert!(validate_daily_hours(&DailyHours::open(7, "08:00", "22:00", 60)).is_err());
        assert!(validate_daily_hours(&DailyHours::open(1, "8am", "22:00", 60)).is_err());
        assert!(validate_daily_hours(&DailyHours::open(1, "22:00", "08:00", 60)).is_err());
        assert!(validate_daily_hours(&DailyHours::open(1, "08:00", "22:00", 10)).is_err());
        // Incomplete open days are storable; availability treats them as closed.
        let mut partial = DailyHours::open(2, "08:00", "22:00", 60);
        partial.slot_duration_minutes = None;
        assert!(validate_daily_hours(&partial).is_ok());
    }

    #[test]
    fn weekly_hours_need_each_day_once() {
        let week: Vec<DailyHours> = (0..7).rev().map(DailyHours::closed).collect();
        let sorted = validate_weekly_hours(week).unwrap();
        assert!(sorted.iter().enumerate().all(|(i, h)| usize::from(h.day_of_week) == i));

        let mut dup: Vec<DailyHours> = (0..7).map(DailyHours::closed).collect();
        dup[6].day_of_week = 0;
        assert!(validate_weekly_hours(dup).is_err());
        assert!(validate_weekly_hours((0..6).map(DailyHours::closed).collect()).is_err());
    }
}
