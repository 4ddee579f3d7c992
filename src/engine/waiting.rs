use tracing::debug;

use crate::model::*;
use crate::observability;

use super::assignment::assign;
use super::store::DayStore;

/// Register a group of identical walk-ins. Units are bound one at a time; at the
/// first unit nobody can take, that unit and everyone behind it go into a single
/// new waiting batch.
pub(crate) fn register(
    store: &mut DayStore,
    service: &Service,
    arrival: Timestamp,
    count: u32,
    now: Timestamp,
) -> Registration {
    let mut registration = Registration::default();
    for placed in 0..count {
        match assign(store, service, arrival, None, now) {
            Ok(booking) => registration.assigned.push(booking),
            Err(reason) => {
                debug!("{} of {count} for {} waiting: {reason}", count - placed, service.name);
                metrics::counter!(observability::UNASSIGNED_TOTAL, "reason" => reason.id()).increment(1);
                let batch = WaitingBatch {
                    id: store.next_customer_id(),
                    service: service.clone(),
                    arrival,
                    count: count - placed,
                };
                store.waiting.push(batch.clone());
                registration.waiting = Some(batch);
                break;
            }
        }
    }
    registration
}

/// Retry every waiting batch, oldest arrival first.
///
/// Within a batch units are bound one by one and the first failure stops that
/// batch; later batches still get their turn. A batch leaves the queue only when
/// its count reaches zero, and survivors keep their relative order.
pub(crate) fn flush(store: &mut DayStore, now: Timestamp) -> FlushReport {
    let mut batches = std::mem::take(&mut store.waiting);
    batches.sort_by_key(|w| w.arrival);

    let mut report = FlushReport::default();
    let mut survivors = Vec::with_capacity(batches.len());
    for batch in batches {
        let mut placed = 0;
        while placed < batch.count {
            match assign(store, &batch.service, batch.arrival, None, now) {
                Ok(booking) => {
                    report.assigned.push(booking);
                    placed += 1;
                }
                Err(_) => break,
            }
        }
        if placed < batch.count {
            survivors.push(WaitingBatch {
                count: batch.count - placed,
                ..batch
            });
        }
    }
    report.still_waiting = survivors.iter().map(|w| w.count).sum();
    store.waiting = survivors;
    report
}
