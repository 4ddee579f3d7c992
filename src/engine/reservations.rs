use tracing::{debug, warn};

use crate::model::*;

use super::assignment::assign;
use super::store::DayStore;

/// Fulfill every pending reservation whose start has arrived, earliest first.
///
/// Each due reservation is assigned with its technician preferred and its start
/// as the arrival. A reservation whose service left the catalog stays pending;
/// one whose technician left the roster falls back to plain rotation. Anything
/// that cannot be bound right now stays pending for the next pass.
pub(crate) fn apply_due(store: &mut DayStore, now: Timestamp) -> Vec<(Reservation, Booking)> {
    let mut due: Vec<usize> = store
        .reservations
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_pending() && r.start <= now)
        .map(|(i, _)| i)
        .collect();
    due.sort_by_key(|&i| (store.reservations[i].start, store.reservations[i].id));

    let mut fulfilled = Vec::new();
    for idx in due {
        let reservation = store.reservations[idx].clone();
        let Some(service) = store.service(&reservation.service).cloned() else {
            warn!(
                "reservation {} names unknown service {:?}, left pending",
                reservation.id, reservation.service
            );
            continue;
        };
        if store.technician(&reservation.technician).is_none() {
            warn!(
                "reservation {}: {} is not on the roster, assigning by rotation",
                reservation.id, reservation.technician
            );
        }
        match assign(store, &service, reservation.start, Some(&reservation.technician), now) {
            Ok(booking) => {
                store.reservations[idx].status = ReservationStatus::Done;
                fulfilled.push((store.reservations[idx].clone(), booking));
            }
            Err(reason) => debug!("reservation {} not yet bound: {reason}", reservation.id),
        }
    }
    store.reservations.sort_by_key(|r| (r.start, r.id));
    fulfilled
}
