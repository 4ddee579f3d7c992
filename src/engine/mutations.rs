use chrono::Duration;
use tracing::{debug, info, warn};

use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::conflict::{validate_minutes, validate_name, validate_price, validate_service};
use super::extension::{self, AddOnKind};
use super::{reservations, status, waiting};
use super::{Engine, EngineError, EntityRef};

fn count_assigned(source: &'static str, n: usize) {
    if n > 0 {
        metrics::counter!(observability::ASSIGNMENTS_TOTAL, "source" => source).increment(n as u64);
    }
}

fn assigned_events(bookings: &[Booking]) -> Vec<Event> {
    bookings
        .iter()
        .map(|b| Event::BookingAssigned { booking: b.clone() })
        .collect()
}

fn check_label(label: &str) -> Result<(), EngineError> {
    if label.len() > MAX_LABEL_LEN {
        return Err(EngineError::LimitExceeded("label too long"));
    }
    Ok(())
}

impl Engine {
    // ── Roster ───────────────────────────────────────────────

    /// Create or update a technician, then give the backlog a chance at them.
    pub async fn check_in(
        &self,
        name: &str,
        check_in: Option<Timestamp>,
        tier: SkillTier,
    ) -> Result<(Technician, FlushReport), EngineError> {
        validate_name(name)?;
        let now = self.now();
        let check_in = check_in.unwrap_or(now);

        let mut store = self.store.lock().await;
        if store.technician(name).is_none() && store.technician_count() >= MAX_TECHNICIANS_PER_DAY {
            return Err(EngineError::LimitExceeded("too many technicians"));
        }
        let technician = store.upsert_technician(name, check_in, tier).clone();
        let report = waiting::flush(&mut store, now);
        self.persist(store).await;

        info!("day {}: {name} checked in ({})", self.day(), tier.id());
        count_assigned("flush", report.assigned.len());
        let mut events = vec![Event::TechnicianCheckedIn {
            name: technician.name.clone(),
            check_in: technician.check_in,
            tier,
        }];
        events.extend(assigned_events(&report.assigned));
        self.publish(&events);
        Ok((technician, report))
    }

    /// Take a technician off the roster. Their bookings stay as history.
    pub async fn remove_technician(&self, name: &str) -> Result<Technician, EngineError> {
        let mut store = self.store.lock().await;
        let removed = store
            .remove_technician(name)
            .ok_or_else(|| EngineError::NotFound(EntityRef::Technician(name.to_string())))?;
        self.persist(store).await;

        info!("day {}: {name} left the roster", self.day());
        self.publish(&[Event::TechnicianRemoved { name: name.to_string() }]);
        self.notify.remove(name);
        Ok(removed)
    }

    // ── Catalog ──────────────────────────────────────────────

    pub async fn upsert_service(&self, service: Service) -> Result<(), EngineError> {
        validate_service(&service)?;
        let mut store = self.store.lock().await;
        if store.service(&service.name).is_none() && store.catalog.len() >= MAX_SERVICES {
            return Err(EngineError::LimitExceeded("too many services"));
        }
        store.upsert_service(service);
        self.persist(store).await;
        Ok(())
    }

    pub async fn remove_service(&self, name: &str) -> Result<(), EngineError> {
        let mut store = self.store.lock().await;
        if !store.remove_service(name) {
            return Err(EngineError::UnknownService(name.to_string()));
        }
        self.persist(store).await;
        Ok(())
    }

    // ── Walk-ins and backlog ─────────────────────────────────

    /// Register `count` identical walk-ins. The service is checked before anything moves.
    pub async fn register(
        &self,
        service: &str,
        arrival: Option<Timestamp>,
        count: u32,
    ) -> Result<Registration, EngineError> {
        if count == 0 {
            return Err(EngineError::InvalidInput("count must be at least 1"));
        }
        if count > MAX_GROUP_SIZE {
            return Err(EngineError::LimitExceeded("group too large"));
        }
        let now = self.now();
        let arrival = arrival.unwrap_or(now);

        let mut store = self.store.lock().await;
        let service = store
            .service(service)
            .cloned()
            .ok_or_else(|| EngineError::UnknownService(service.to_string()))?;
        if store.bookings.len() + count as usize > MAX_BOOKINGS_PER_DAY {
            return Err(EngineError::LimitExceeded("too many bookings today"));
        }
        let registration = waiting::register(&mut store, &service, arrival, count, now);
        self.persist(store).await;

        count_assigned("walk_in", registration.assigned.len());
        if let Some(batch) = &registration.waiting {
            info!(
                "day {}: {} x {} waiting (batch {})",
                self.day(),
                batch.count,
                service.name,
                batch.id
            );
        }
        self.publish(&assigned_events(&registration.assigned));
        Ok(registration)
    }

    pub async fn flush_waiting(&self) -> FlushReport {
        let now = self.now();
        let mut store = self.store.lock().await;
        let report = waiting::flush(&mut store, now);
        if !report.assigned.is_empty() {
            self.persist(store).await;
        } else {
            drop(store);
        }

        count_assigned("flush", report.assigned.len());
        self.publish(&assigned_events(&report.assigned));
        report
    }

    pub async fn delete_waiting(&self, id: u64) -> Result<WaitingBatch, EngineError> {
        let mut store = self.store.lock().await;
        let batch = store
            .remove_waiting(id)
            .ok_or(EngineError::NotFound(EntityRef::WaitingBatch(id)))?;
        self.persist(store).await;
        Ok(batch)
    }

    // ── Reservations ─────────────────────────────────────────

    pub async fn add_reservation(
        &self,
        customer: Option<String>,
        service: &str,
        technician: &str,
        start: Timestamp,
    ) -> Result<Reservation, EngineError> {
        if let Some(label) = &customer {
            check_label(label)?;
        }
        let mut store = self.store.lock().await;
        if store.reservations.len() >= MAX_RESERVATIONS_PER_DAY {
            return Err(EngineError::LimitExceeded("too many reservations today"));
        }
        if store.service(service).is_none() {
            return Err(EngineError::UnknownService(service.to_string()));
        }
        if store.technician(technician).is_none() {
            return Err(EngineError::NotFound(EntityRef::Technician(technician.to_string())));
        }
        let id = store.next_reservation_id();
        let reservation = Reservation {
            id,
            customer: customer
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| format!("reservation-{id}")),
            service: service.to_string(),
            technician: technician.to_string(),
            start,
            status: ReservationStatus::Pending,
        };
        store.reservations.push(reservation.clone());
        store.reservations.sort_by_key(|r| (r.start, r.id));
        self.persist(store).await;
        Ok(reservation)
    }

    pub async fn apply_due_reservations(&self) -> Vec<(Reservation, Booking)> {
        let now = self.now();
        let mut store = self.store.lock().await;
        let fulfilled = reservations::apply_due(&mut store, now);
        if !fulfilled.is_empty() {
            self.persist(store).await;
        } else {
            drop(store);
        }
        self.announce_fulfilled(&fulfilled);
        fulfilled
    }

    pub async fn delete_reservation(&self, id: u64) -> Result<Reservation, EngineError> {
        let mut store = self.store.lock().await;
        let reservation = store
            .remove_reservation(id)
            .ok_or(EngineError::NotFound(EntityRef::Reservation(id)))?;
        self.persist(store).await;
        Ok(reservation)
    }

    fn announce_fulfilled(&self, fulfilled: &[(Reservation, Booking)]) {
        count_assigned("reservation", fulfilled.len());
        let mut events = Vec::with_capacity(fulfilled.len() * 2);
        for (r, b) in fulfilled {
            info!(
                "day {}: reservation {} for {} bound to {} at {}",
                self.day(),
                r.id,
                r.customer,
                b.technician,
                b.start.to_rfc3339()
            );
            events.push(Event::BookingAssigned { booking: b.clone() });
            events.push(Event::ReservationFulfilled {
                reservation_id: r.id,
                booking_id: b.id,
                technician: b.technician.clone(),
            });
        }
        self.publish(&events);
    }

    // ── Extensions and add-ons ───────────────────────────────

    pub async fn extend(
        &self,
        booking_id: u64,
        minutes: u32,
        price: Option<f64>,
    ) -> Result<Booking, EngineError> {
        validate_minutes(minutes)?;
        if let Some(p) = price {
            validate_price(p)?;
        }
        let now = self.now();
        let mut store = self.store.lock().await;
        let booking = extension::extend(&mut store, booking_id, minutes, price, now)
            .inspect_err(|e| Self::count_conflict(e))?;
        self.persist(store).await;

        metrics::counter!(observability::EXTENSIONS_TOTAL, "kind" => "extend").increment(1);
        self.publish(&[Event::BookingChanged { booking: booking.clone() }]);
        Ok(booking)
    }

    pub async fn add_on(
        &self,
        booking_id: u64,
        kind: AddOnKind,
        price: Option<f64>,
    ) -> Result<Booking, EngineError> {
        if let AddOnKind::Time(m) = kind {
            validate_minutes(m)?;
        }
        if let Some(p) = price {
            validate_price(p)?;
        }
        let now = self.now();
        let mut store = self.store.lock().await;
        if store.bookings.len() >= MAX_BOOKINGS_PER_DAY {
            return Err(EngineError::LimitExceeded("too many bookings today"));
        }
        let booking = extension::add_on(&mut store, booking_id, kind, price, now)
            .inspect_err(|e| Self::count_conflict(e))?;
        self.persist(store).await;

        metrics::counter!(observability::EXTENSIONS_TOTAL, "kind" => "add_on").increment(1);
        count_assigned("add_on", 1);
        self.publish(&[Event::BookingAssigned { booking: booking.clone() }]);
        Ok(booking)
    }

    fn count_conflict(e: &EngineError) {
        if let EngineError::SchedulingConflict(c) = e {
            debug!("{c}");
            metrics::counter!(observability::CONFLICTS_TOTAL).increment(1);
        }
    }

    /// Replace a booking's payment record. Scheduling never reads it.
    pub async fn record_payment(&self, booking_id: u64, payment: Payment) -> Result<Booking, EngineError> {
        for amount in [payment.cash, payment.transfer, payment.eftpos, payment.voucher] {
            validate_price(amount)?;
        }
        check_label(&payment.note)?;
        let mut store = self.store.lock().await;
        let booking = store
            .booking_mut(booking_id)
            .ok_or(EngineError::NotFound(EntityRef::Booking(booking_id)))?;
        booking.payment = payment;
        let booking = booking.clone();
        self.persist(store).await;
        Ok(booking)
    }

    // ── Deletion and repair ──────────────────────────────────

    /// Remove a booking and rebuild every technician's rotation fields from what is left.
    pub async fn delete_booking(&self, id: u64) -> Result<Booking, EngineError> {
        let now = self.now();
        let mut store = self.store.lock().await;
        let removed = store
            .remove_booking(id)
            .ok_or(EngineError::NotFound(EntityRef::Booking(id)))?;
        status::recompute(&mut store, now);
        self.persist(store).await;

        self.publish(&[Event::BookingRemoved {
            id,
            technician: removed.technician.clone(),
        }]);
        Ok(removed)
    }

    /// Re-derive booking statuses; persists only when something moved.
    pub async fn refresh_status(&self) -> bool {
        let now = self.now();
        let mut store = self.store.lock().await;
        let changed = status::refresh_status(&mut store, now);
        if changed {
            self.persist(store).await;
        }
        changed
    }

    /// Clear the day (roster, bookings, backlog, reservations). The catalog stays.
    pub async fn reset_day(&self) {
        let mut store = self.store.lock().await;
        store.reset();
        self.persist(store).await;
        warn!("day {}: reset", self.day());
    }

    // ── Periodic pass ────────────────────────────────────────

    /// Refresh statuses, fulfil due reservations, retry the backlog, and retry a
    /// failed snapshot write. Items older than `stale_after` are reported, never dropped.
    pub async fn tick(&self, stale_after: Duration) -> TickReport {
        let now = self.now();
        let mut store = self.store.lock().await;
        let status_changed = status::refresh_status(&mut store, now);
        let fulfilled = reservations::apply_due(&mut store, now);
        let flushed = waiting::flush(&mut store, now).assigned;

        let mut stale = 0;
        for batch in store.waiting.iter().filter(|w| w.arrival + stale_after <= now) {
            warn!(
                "day {}: batch {} ({} x {}) waiting since {}",
                self.day(),
                batch.id,
                batch.count,
                batch.service.name,
                batch.arrival.to_rfc3339()
            );
            stale += 1;
        }
        for r in store
            .reservations
            .iter()
            .filter(|r| r.is_pending() && r.start + stale_after <= now)
        {
            warn!(
                "day {}: reservation {} for {} with {} still pending since {}",
                self.day(),
                r.id,
                r.customer,
                r.technician,
                r.start.to_rfc3339()
            );
            stale += 1;
        }
        if stale > 0 {
            metrics::counter!(observability::STALE_ITEMS_TOTAL).increment(stale as u64);
        }

        if status_changed || !fulfilled.is_empty() || !flushed.is_empty() || self.is_dirty() {
            self.persist(store).await;
        } else {
            drop(store);
        }

        self.announce_fulfilled(&fulfilled);
        count_assigned("flush", flushed.len());
        self.publish(&assigned_events(&flushed));
        TickReport {
            status_changed,
            fulfilled,
            flushed,
            stale,
        }
    }
}
