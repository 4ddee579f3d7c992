use crate::model::*;

use super::conflict::check_conflict_except;
use super::store::DayStore;
use super::{EngineError, EntityRef};

/// What an add-on appends after a booking.
#[derive(Debug, Clone, PartialEq)]
pub enum AddOnKind {
    /// A catalog service, at its own duration and price.
    Service(String),
    /// Bare extra time, priced at the original booking's per-minute rate.
    Time(u32),
}

/// Original per-minute rate times `extra`, rounded to cents.
fn prorate(booking: &Booking, extra: u32) -> f64 {
    round_cents(booking.price / f64::from(booking.minutes.max(1)) * f64::from(extra))
}

/// Lengthen a booking in place by `extra` minutes.
///
/// `[end, end + extra)` must be free of the technician's later commitments; on
/// conflict nothing changes. The technician's `next_free` is raised to the new end
/// if it was earlier.
pub(crate) fn extend(
    store: &mut DayStore,
    booking_id: u64,
    extra: u32,
    price_override: Option<f64>,
    now: Timestamp,
) -> Result<Booking, EngineError> {
    if extra == 0 {
        return Err(EngineError::InvalidInput("extension must be at least one minute"));
    }
    let original = store
        .booking(booking_id)
        .cloned()
        .ok_or(EngineError::NotFound(EntityRef::Booking(booking_id)))?;

    let window = Window::starting_at(original.end, extra);
    check_conflict_except(store, &original.technician, &window, Some(booking_id))
        .map_err(EngineError::SchedulingConflict)?;

    let price = price_override.unwrap_or_else(|| round_cents(original.price + prorate(&original, extra)));
    let booking = store
        .booking_mut(booking_id)
        .ok_or(EngineError::NotFound(EntityRef::Booking(booking_id)))?;
    booking.end = window.end;
    booking.minutes += extra;
    booking.price = price;
    booking.status = BookingStatus::at(&booking.window(), now);
    let extended = booking.clone();

    if let Some(tech) = store.technician_mut(&extended.technician) {
        if tech.next_free < extended.end {
            tech.next_free = extended.end;
        }
    }
    Ok(extended)
}

/// Append a new booking back-to-back with an existing one, same technician.
pub(crate) fn add_on(
    store: &mut DayStore,
    booking_id: u64,
    kind: AddOnKind,
    price_override: Option<f64>,
    now: Timestamp,
) -> Result<Booking, EngineError> {
    let original = store
        .booking(booking_id)
        .cloned()
        .ok_or(EngineError::NotFound(EntityRef::Booking(booking_id)))?;

    let (service, minutes, list_price, note) = match kind {
        AddOnKind::Service(name) => {
            let svc = store
                .service(&name)
                .ok_or_else(|| EngineError::UnknownService(name.clone()))?;
            (svc.name.clone(), svc.minutes, svc.price, "add-on")
        }
        AddOnKind::Time(m) => {
            if m == 0 {
                return Err(EngineError::InvalidInput("add-on must be at least one minute"));
            }
            (format!("Add-on (+{m} mins)"), m, prorate(&original, m), "extension")
        }
    };

    let window = Window::starting_at(original.end, minutes);
    check_conflict_except(store, &original.technician, &window, Some(booking_id))
        .map_err(EngineError::SchedulingConflict)?;

    let booking = Booking {
        id: store.next_customer_id(),
        service,
        minutes,
        technician: original.technician.clone(),
        start: window.start,
        end: window.end,
        price: price_override.unwrap_or(list_price),
        status: BookingStatus::at(&window, now),
        payment: Payment::with_note(note),
    };
    if let Some(tech) = store.technician_mut(&booking.technician) {
        if tech.next_free < booking.end {
            tech.next_free = booking.end;
        }
        tech.served_count += 1;
    }
    store.bookings.push(booking.clone());
    Ok(booking)
}
