use std::collections::BTreeMap;

use crate::model::*;
use crate::snapshot::Snapshot;

use super::assignment;
use super::rotation::rotation_order;
use super::store::DayStore;
use super::{Engine, EngineError};

/// Per-technician money over bookings that have started. Realized is what was
/// recorded, or the list price when nothing was.
pub(crate) fn takings(store: &DayStore) -> Vec<Takings> {
    let mut per_tech: BTreeMap<&str, Takings> = BTreeMap::new();
    for b in store.bookings.iter().filter(|b| b.status != BookingStatus::Queued) {
        let t = per_tech.entry(b.technician.as_str()).or_insert_with(|| Takings {
            technician: b.technician.clone(),
            ..Takings::default()
        });
        let paid = b.payment.total();
        t.realized += if paid > 0.0 { paid } else { b.price };
        t.cash += b.payment.cash;
        t.transfer += b.payment.transfer;
        t.eftpos += b.payment.eftpos;
        t.voucher += b.payment.voucher;
    }
    per_tech
        .into_values()
        .map(|mut t| {
            t.realized = round_cents(t.realized);
            t
        })
        .collect()
}

impl Engine {
    /// Roster in current fairness order.
    pub async fn rotation(&self) -> Vec<Technician> {
        let store = self.store.lock().await;
        rotation_order(store.technicians.values()).into_iter().cloned().collect()
    }

    /// Roster in check-in order.
    pub async fn technicians(&self) -> Vec<Technician> {
        let store = self.store.lock().await;
        let mut roster: Vec<Technician> = store.technicians.values().cloned().collect();
        roster.sort_by(|a, b| a.check_in.cmp(&b.check_in).then_with(|| a.name.cmp(&b.name)));
        roster
    }

    pub async fn services(&self) -> Vec<Service> {
        self.store.lock().await.catalog.clone()
    }

    pub async fn bookings(&self) -> Vec<Booking> {
        self.store.lock().await.bookings.clone()
    }

    pub async fn booking(&self, id: u64) -> Option<Booking> {
        self.store.lock().await.booking(id).cloned()
    }

    /// Backlog, oldest arrival first.
    pub async fn waiting(&self) -> Vec<WaitingBatch> {
        let mut batches = self.store.lock().await.waiting.clone();
        batches.sort_by_key(|w| w.arrival);
        batches
    }

    pub async fn reservations(&self) -> Vec<Reservation> {
        self.store.lock().await.reservations.clone()
    }

    /// Who could take `service` at `at` (default now), without binding anyone.
    pub async fn preview(&self, service: &str, at: Option<Timestamp>) -> Result<Vec<Candidate>, EngineError> {
        let at = at.unwrap_or_else(|| self.now());
        let store = self.store.lock().await;
        let service = store
            .service(service)
            .ok_or_else(|| EngineError::UnknownService(service.to_string()))?;
        Ok(assignment::preview(&store, service, at))
    }

    pub async fn takings(&self) -> Vec<Takings> {
        takings(&*self.store.lock().await)
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.store.lock().await.to_snapshot()
    }
}
