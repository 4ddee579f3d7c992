use std::collections::HashMap;

use crate::model::*;

use super::store::DayStore;

/// Re-derive every booking's status from its window. Returns whether anything changed.
pub(crate) fn refresh_status(store: &mut DayStore, now: Timestamp) -> bool {
    let mut changed = false;
    for booking in &mut store.bookings {
        let status = BookingStatus::at(&booking.window(), now);
        if booking.status != status {
            booking.status = status;
            changed = true;
        }
    }
    changed
}

/// Rebuild each technician's served count and `next_free` from the surviving bookings.
///
/// `next_free` becomes the latest of check-in, the last surviving booking end, and `now`.
pub(crate) fn recompute(store: &mut DayStore, now: Timestamp) {
    let mut per_tech: HashMap<&str, (u32, Option<Timestamp>)> = HashMap::new();
    for b in &store.bookings {
        let entry = per_tech.entry(b.technician.as_str()).or_insert((0, None));
        entry.0 += 1;
        entry.1 = entry.1.max(Some(b.end));
    }

    for tech in store.technicians.values_mut() {
        let (served, latest_end) = per_tech.get(tech.name.as_str()).copied().unwrap_or((0, None));
        tech.served_count = served;
        tech.next_free = latest_end.unwrap_or(tech.check_in).max(tech.check_in).max(now);
    }
}
