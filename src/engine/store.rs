use std::collections::HashMap;

use crate::model::*;
use crate::snapshot::Snapshot;

/// Everything one operating day owns. Callers hold the engine lock while touching it.
#[derive(Debug, Clone)]
pub struct DayStore {
    pub(super) technicians: HashMap<String, Technician>,
    pub(super) catalog: Vec<Service>,
    /// Insertion order; customer ids ascend along it.
    pub(super) bookings: Vec<Booking>,
    pub(super) waiting: Vec<WaitingBatch>,
    pub(super) reservations: Vec<Reservation>,
    pub(super) customer_seq: u64,
}

impl DayStore {
    pub fn new(catalog: Vec<Service>) -> Self {
        Self {
            technicians: HashMap::new(),
            catalog,
            bookings: Vec::new(),
            waiting: Vec::new(),
            reservations: Vec::new(),
            customer_seq: 1,
        }
    }

    /// Mint the next customer/batch id.
    pub fn next_customer_id(&mut self) -> u64 {
        let id = self.customer_seq;
        self.customer_seq += 1;
        id
    }

    // ── Roster ───────────────────────────────────────────────

    pub fn technician(&self, name: &str) -> Option<&Technician> {
        self.technicians.get(name)
    }

    pub fn technician_mut(&mut self, name: &str) -> Option<&mut Technician> {
        self.technicians.get_mut(name)
    }

    pub fn technician_count(&self) -> usize {
        self.technicians.len()
    }

    /// Create-or-update by name. An update moves `check_in` and the tier, and raises
    /// `next_free` to the new check-in only if it was earlier.
    pub fn upsert_technician(&mut self, name: &str, check_in: Timestamp, tier: SkillTier) -> &Technician {
        let tech = self
            .technicians
            .entry(name.to_string())
            .and_modify(|t| {
                t.check_in = check_in;
                t.tier = tier;
                if t.next_free < check_in {
                    t.next_free = check_in;
                }
            })
            .or_insert_with(|| Technician::new(name, check_in, tier));
        &*tech
    }

    pub fn remove_technician(&mut self, name: &str) -> Option<Technician> {
        self.technicians.remove(name)
    }

    // ── Catalog ──────────────────────────────────────────────

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.catalog.iter().find(|s| s.name == name)
    }

    /// Replace in place when the name exists, otherwise append (catalog order is display order).
    pub fn upsert_service(&mut self, service: Service) {
        match self.catalog.iter_mut().find(|s| s.name == service.name) {
            Some(existing) => *existing = service,
            None => self.catalog.push(service),
        }
    }

    pub fn remove_service(&mut self, name: &str) -> bool {
        let before = self.catalog.len();
        self.catalog.retain(|s| s.name != name);
        self.catalog.len() != before
    }

    // ── Bookings / backlog / reservations ────────────────────

    pub fn booking(&self, id: u64) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }

    pub fn booking_mut(&mut self, id: u64) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == id)
    }

    pub fn remove_booking(&mut self, id: u64) -> Option<Booking> {
        let pos = self.bookings.iter().position(|b| b.id == id)?;
        Some(self.bookings.remove(pos))
    }

    pub fn remove_waiting(&mut self, id: u64) -> Option<WaitingBatch> {
        let pos = self.waiting.iter().position(|w| w.id == id)?;
        Some(self.waiting.remove(pos))
    }

    pub fn remove_reservation(&mut self, id: u64) -> Option<Reservation> {
        let pos = self.reservations.iter().position(|r| r.id == id)?;
        Some(self.reservations.remove(pos))
    }

    pub fn next_reservation_id(&self) -> u64 {
        self.reservations.iter().map(|r| r.id).max().unwrap_or(0) + 1
    }

    pub fn waiting_customers(&self) -> u32 {
        self.waiting.iter().map(|w| w.count).sum()
    }

    pub fn pending_reservations(&self) -> usize {
        self.reservations.iter().filter(|r| r.is_pending()).count()
    }

    /// Drop all day state except the catalog.
    pub fn reset(&mut self) {
        self.technicians.clear();
        self.bookings.clear();
        self.waiting.clear();
        self.reservations.clear();
        self.customer_seq = 1;
    }

    // ── Snapshot conversion ──────────────────────────────────

    pub fn to_snapshot(&self) -> Snapshot {
        let mut employees: Vec<Technician> = self.technicians.values().cloned().collect();
        employees.sort_by(|a, b| a.check_in.cmp(&b.check_in).then_with(|| a.name.cmp(&b.name)));
        Snapshot {
            employees,
            services: self.catalog.clone(),
            bookings: self.bookings.clone(),
            waiting: self.waiting.clone(),
            reservations: self.reservations.clone(),
            customer_sequence: self.customer_seq,
        }
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let technicians = snapshot
            .employees
            .into_iter()
            .map(|mut t| {
                if t.next_free < t.check_in {
                    t.next_free = t.check_in;
                }
                (t.name.clone(), t)
            })
            .collect();
        let waiting: Vec<WaitingBatch> = snapshot.waiting.into_iter().filter(|w| w.count > 0).collect();
        // Never hand out an id already in use, whatever the stored sequence says
        let issued = snapshot
            .bookings
            .iter()
            .map(|b| b.id)
            .chain(waiting.iter().map(|w| w.id))
            .max()
            .unwrap_or(0);
        Self {
            technicians,
            catalog: snapshot.services,
            bookings: snapshot.bookings,
            waiting,
            reservations: snapshot.reservations,
            customer_seq: snapshot.customer_sequence.max(issued + 1),
        }
    }
}
