mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;
mod store;

pub use availability::{available_slots, free_slot_starts, OpeningWindow};
pub use error::EngineError;
pub use store::{BookingLedger, CourtRegistry, LedgerError, ScheduleStore};

pub(crate) use conflict::first_conflict;

use std::sync::Arc;

use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::*;
use crate::notify::NotifyHub;
use crate::storage::Store;

/// The booking core: guarded booking creation, availability, and booking
/// maintenance over injected collaborators.
///
/// The engine holds no state of its own beyond the handles; every check that
/// must survive concurrency lives in the [`BookingLedger`].
pub struct Engine {
    pub(super) schedules: Arc<dyn ScheduleStore>,
    pub(super) courts: Arc<dyn CourtRegistry>,
    pub(super) ledger: Arc<dyn BookingLedger>,
    pub notify: Arc<NotifyHub>,
}

impl Engine {
    pub fn new(
        schedules: Arc<dyn ScheduleStore>,
        courts: Arc<dyn CourtRegistry>,
        ledger: Arc<dyn BookingLedger>,
        notify: Arc<NotifyHub>,
    ) -> Self {
        Self {
            schedules,
            courts,
            ledger,
            notify,
        }
    }

    /// An engine whose three collaborators are all the durable store.
    pub fn with_store(store: Arc<Store>, notify: Arc<NotifyHub>) -> Self {
        Self::new(store.clone(), store.clone(), store, notify)
    }

    /// Booking changes on one court, as they commit.
    pub fn subscribe(&self, court_id: Ulid) -> broadcast::Receiver<Event> {
        self.notify.subscribe(court_id)
    }
}
