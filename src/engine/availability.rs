use chrono::NaiveDate;

use crate::calendar::{self, MINUTE_MS};
use crate::model::*;

// ── Slot Algorithm ────────────────────────────────────────────────

/// Opening hours of one weekday resolved onto a concrete UTC day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpeningWindow {
    pub open: Ms,
    pub close: Ms,
    pub slot: Ms,
}

impl OpeningWindow {
    /// `None` when the day is closed or any of open time, close time and slot
    /// duration is missing or unusable.
    pub fn resolve(date: NaiveDate, hours: &DailyHours) -> Option<Self> {
        if !hours.is_open {
            return None;
        }
        let open = calendar::parse_hhmm(hours.open_time.as_deref()?)?;
        let close = calendar::parse_hhmm(hours.close_time.as_deref()?)?;
        let slot = hours.slot_duration_minutes.filter(|m| *m > 0)?;
        Some(Self {
            open: calendar::at_minutes(date, open),
            close: calendar::at_minutes(date, close),
            slot: Ms::from(slot) * MINUTE_MS,
        })
    }

    /// Pick the weekly entry for the weekday of `date` and resolve it.
    pub fn for_date(date: NaiveDate, weekly_hours: &[DailyHours]) -> Option<Self> {
        let weekday = calendar::weekday(date);
        let hours = weekly_hours.iter().find(|h| h.day_of_week == weekday)?;
        Self::resolve(date, hours)
    }
}

/// Start instants of every whole slot inside `window` that no `blocked` span
/// overlaps. A trailing slot that would run past closing time is never emitted.
pub fn free_slot_starts(window: &OpeningWindow, blocked: &[Span]) -> Vec<Ms> {
    let mut starts = Vec::new();
    let mut cursor = window.open;
    while cursor < window.close {
        let slot = Span::new(cursor, cursor + window.slot);
        if slot.end > window.close {
            break;
        }
        if !blocked.iter().any(|b| b.overlaps(&slot)) {
            starts.push(cursor);
        }
        cursor = slot.end;
    }
    starts
}

/// Free slot start times (`HH:MM`, ascending) for one court on one UTC day.
///
/// `bookings` are the court's bookings intersecting that day. Admin-cancelled
/// bookings do not block; every other status does.
pub fn available_slots(date: NaiveDate, weekly_hours: &[DailyHours], bookings: &[Booking]) -> Vec<String> {
    let Some(window) = OpeningWindow::for_date(date, weekly_hours) else {
        return Vec::new();
    };
    let blocked: Vec<Span> = bookings
        .iter()
        .filter(|b| b.status.blocks_court())
        .map(|b| b.span)
        .collect();
    free_slot_starts(&window, &blocked)
        .into_iter()
        .map(calendar::format_hhmm)
        .collect()
}
