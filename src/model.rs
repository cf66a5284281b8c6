use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds, always UTC.
pub type Ms = i64;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    /// `startA < endB AND endA > startB`. Touching intervals do not overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }
}

// ── Bookings ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    PendingPayment,
    Confirmed,
    CancelledByUser,
    CancelledByAdmin,
    Completed,
    NoShow,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 6] = [
        BookingStatus::PendingPayment,
        BookingStatus::Confirmed,
        BookingStatus::CancelledByUser,
        BookingStatus::CancelledByAdmin,
        BookingStatus::Completed,
        BookingStatus::NoShow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::PendingPayment => "pending_payment",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::CancelledByUser => "cancelled_by_user",
            BookingStatus::CancelledByAdmin => "cancelled_by_admin",
            BookingStatus::Completed => "completed",
            BookingStatus::NoShow => "no_show",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(name))
    }

    /// Whether a booking in this status occupies its court.
    ///
    /// Only admin cancellation frees the interval; a user cancellation keeps
    /// blocking until an admin acts on it.
    pub fn blocks_court(&self) -> bool {
        !matches!(self, BookingStatus::CancelledByAdmin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchType {
    Single,
    Double,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Single => "single",
            MatchType::Double => "double",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [MatchType::Single, MatchType::Double]
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameType {
    Male,
    Female,
    Mixed,
    Open,
}

impl GameType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameType::Male => "male",
            GameType::Female => "female",
            GameType::Mixed => "mixed",
            GameType::Open => "open",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [GameType::Male, GameType::Female, GameType::Mixed, GameType::Open]
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(name))
    }
}

/// A committed reservation of one court. `span.end` is always derived from
/// the club's slot duration, never supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub club_id: Ulid,
    pub court_id: Ulid,
    /// Actor id as supplied by the authentication layer.
    pub user_id: String,
    pub span: Span,
    pub status: BookingStatus,
    /// Participating actor ids; the booker is always first.
    pub participants: Vec<String>,
    pub match_type: MatchType,
    pub game_type: GameType,
    pub is_private: bool,
    pub needs_players: bool,
}

impl Booking {
    /// Apply a patch in place. The booker stays in the participant set even
    /// when the patch replaces it.
    pub fn apply_patch(&mut self, patch: &BookingPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(match_type) = patch.match_type {
            self.match_type = match_type;
        }
        if let Some(game_type) = patch.game_type {
            self.game_type = game_type;
        }
        if let Some(is_private) = patch.is_private {
            self.is_private = is_private;
        }
        if let Some(needs_players) = patch.needs_players {
            self.needs_players = needs_players;
        }
        if let Some(participants) = &patch.participants {
            self.participants = participant_set(&self.user_id, participants);
        }
    }
}

/// Booker first, then the extras in order, without duplicates or blanks.
pub fn participant_set(booker: &str, extras: &[String]) -> Vec<String> {
    let mut set = vec![booker.to_string()];
    for p in extras {
        let p = p.trim();
        if !p.is_empty() && !set.iter().any(|s| s == p) {
            set.push(p.to_string());
        }
    }
    set
}

/// Input to booking creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub club_id: Ulid,
    pub court_id: Ulid,
    pub user_id: String,
    /// RFC 3339, or a naive `YYYY-MM-DDTHH:MM[:SS]` read as UTC.
    pub start_time: String,
    pub status: Option<BookingStatus>,
    pub match_type: Option<MatchType>,
    pub game_type: Option<GameType>,
    pub is_private: bool,
    pub needs_players: bool,
    pub participants: Vec<String>,
}

impl NewBooking {
    pub fn new(club_id: Ulid, court_id: Ulid, user_id: impl Into<String>, start_time: impl Into<String>) -> Self {
        Self {
            club_id,
            court_id,
            user_id: user_id.into(),
            start_time: start_time.into(),
            status: None,
            match_type: None,
            game_type: None,
            is_private: false,
            needs_players: false,
            participants: Vec::new(),
        }
    }

    pub fn with_status(mut self, status: BookingStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Mutable booking fields. Club, court and start time are fixed at creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingPatch {
    pub status: Option<BookingStatus>,
    pub match_type: Option<MatchType>,
    pub game_type: Option<GameType>,
    pub is_private: Option<bool>,
    pub needs_players: Option<bool>,
    pub participants: Option<Vec<String>>,
}

impl BookingPatch {
    pub fn status(status: BookingStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingFilter {
    pub club_id: Option<Ulid>,
    pub court_id: Option<Ulid>,
    pub user_id: Option<String>,
    /// Bookings starting within this UTC day.
    pub date: Option<chrono::NaiveDate>,
}

// ── Clubs: schedules and courts ──────────────────────────────────

/// Operating hours of one weekday. Times are `HH:MM` on the UTC day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyHours {
    /// 0 = Sunday … 6 = Saturday.
    pub day_of_week: u8,
    pub is_open: bool,
    pub open_time: Option<String>,
    pub close_time: Option<String>,
    pub slot_duration_minutes: Option<u32>,
}

impl DailyHours {
    pub fn open(day_of_week: u8, open_time: &str, close_time: &str, slot_duration_minutes: u32) -> Self {
        Self {
            day_of_week,
            is_open: true,
            open_time: Some(open_time.to_string()),
            close_time: Some(close_time.to_string()),
            slot_duration_minutes: Some(slot_duration_minutes),
        }
    }

    pub fn closed(day_of_week: u8) -> Self {
        Self {
            day_of_week,
            is_open: false,
            open_time: None,
            close_time: None,
            slot_duration_minutes: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub club_id: Ulid,
    /// Exactly seven entries, ordered by `day_of_week`.
    pub weekly_hours: Vec<DailyHours>,
}

impl Schedule {
    /// Every day open 14:00–23:00 with 90-minute slots.
    pub fn default_for(club_id: Ulid) -> Self {
        Self {
            club_id,
            weekly_hours: (0..7).map(|d| DailyHours::open(d, "14:00", "23:00", 90)).collect(),
        }
    }

    pub fn day(&self, day_of_week: u8) -> Option<&DailyHours> {
        self.weekly_hours.iter().find(|h| h.day_of_week == day_of_week)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CourtType {
    IndoorGlass,
    IndoorWall,
    OutdoorGlass,
    OutdoorWall,
    SingleIndoor,
    SingleOutdoor,
}

impl CourtType {
    pub const ALL: [CourtType; 6] = [
        CourtType::IndoorGlass,
        CourtType::IndoorWall,
        CourtType::OutdoorGlass,
        CourtType::OutdoorWall,
        CourtType::SingleIndoor,
        CourtType::SingleOutdoor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CourtType::IndoorGlass => "indoor_glass",
            CourtType::IndoorWall => "indoor_wall",
            CourtType::OutdoorGlass => "outdoor_glass",
            CourtType::OutdoorWall => "outdoor_wall",
            CourtType::SingleIndoor => "single_indoor",
            CourtType::SingleOutdoor => "single_outdoor",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Court {
    pub id: Ulid,
    pub club_id: Ulid,
    pub name: String,
    pub court_type: CourtType,
    /// Inactive courts are neither listed in availability nor bookable.
    pub is_active: bool,
}

/// WAL record payload. Flat: one variant per state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ScheduleSet {
        schedule: Schedule,
    },
    ScheduleRemoved {
        club_id: Ulid,
    },
    CourtSaved {
        court: Court,
    },
    CourtRemoved {
        id: Ulid,
        club_id: Ulid,
    },
    BookingCreated {
        booking: Booking,
    },
    BookingUpdated {
        booking: Booking,
    },
    BookingRemoved {
        id: Ulid,
        court_id: Ulid,
    },
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourtAvailability {
    pub court_id: Ulid,
    pub court_name: String,
    pub court_type: CourtType,
    /// Slot start times as `HH:MM`, ascending.
    pub available_slots: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClubAvailability {
    pub club_id: Ulid,
    pub date: String,
    pub courts: Vec<CourtAvailability>,
}

impl ClubAvailability {
    pub fn empty(club_id: Ulid, date: &str) -> Self {
        Self {
            club_id,
            date: date.to_string(),
            courts: Vec::new(),
        }
    }
}
