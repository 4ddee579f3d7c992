//! Hard limits. Checked at the engine boundary before any mutation.

pub const MAX_NAME_LEN: usize = 128;
pub const MAX_LABEL_LEN: usize = 256;
pub const MAX_TECHNICIANS_PER_DAY: usize = 256;
pub const MAX_SERVICES: usize = 512;
pub const MAX_GROUP_SIZE: u32 = 20;
/// Longest single service, extension or add-on: a full day.
pub const MAX_SERVICE_MINUTES: u32 = 24 * 60;
pub const MAX_BOOKINGS_PER_DAY: usize = 10_000;
pub const MAX_RESERVATIONS_PER_DAY: usize = 1_000;
pub const MAX_PRICE: f64 = 1_000_000.0;

pub const MAX_DAY_KEY_LEN: usize = 64;
pub const MAX_DAYS_LOADED: usize = 64;
