use crate::model::Ms;

pub const MAX_TENANTS: usize = 1024;
pub const MAX_TENANT_NAME_LEN: usize = 256;

pub const MAX_COURTS_PER_CLUB: usize = 256;
pub const MAX_NAME_LEN: usize = 256;
pub const MAX_ACTOR_ID_LEN: usize = 256;
pub const MAX_PARTICIPANTS: usize = 16;

/// Largest court set accepted by a single batched ledger query.
pub const MAX_IN_CLAUSE_IDS: usize = 1024;

pub const MIN_SLOT_MINUTES: u32 = 15;
pub const MAX_SLOT_MINUTES: u32 = 24 * 60;

/// 2000-01-01T00:00:00Z
pub const MIN_VALID_TIMESTAMP_MS: Ms = 946_684_800_000;
/// 2100-01-01T00:00:00Z
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000;
