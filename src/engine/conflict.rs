use crate::limits::*;
use crate::model::*;

use super::store::DayStore;
use super::EngineError;

/// What a candidate window ran into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Commitment {
    Reservation(u64),
    Booking(u64),
}

/// The first commitment a candidate window would run into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub technician: String,
    pub commitment: Commitment,
    pub starts_at: Timestamp,
}

impl std::fmt::Display for Conflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let what = match self.commitment {
            Commitment::Reservation(id) => format!("reservation {id}"),
            Commitment::Booking(id) => format!("booking {id}"),
        };
        write!(
            f,
            "{} has {what} starting at {}",
            self.technician,
            self.starts_at.to_rfc3339()
        )
    }
}

/// Check `window` against the technician's not-yet-started commitments.
///
/// Only commitments starting at or after `window.start` count. Among those the
/// earliest pending reservation and the earliest booking are each tested: the
/// window must finish by the commitment's start, and may not start together with it.
pub(crate) fn check_conflict(store: &DayStore, technician: &str, window: &Window) -> Result<(), Conflict> {
    check_conflict_except(store, technician, window, None)
}

/// As `check_conflict`, ignoring one booking (the one being lengthened).
pub(crate) fn check_conflict_except(
    store: &DayStore,
    technician: &str,
    window: &Window,
    except: Option<u64>,
) -> Result<(), Conflict> {
    let next_reservation = store
        .reservations
        .iter()
        .filter(|r| r.is_pending() && r.technician == technician && r.start >= window.start)
        .min_by_key(|r| r.start)
        .map(|r| (Commitment::Reservation(r.id), r.start));

    let next_booking = store
        .bookings
        .iter()
        .filter(|b| Some(b.id) != except && b.technician == technician && b.start >= window.start)
        .min_by_key(|b| b.start)
        .map(|b| (Commitment::Booking(b.id), b.start));

    for (commitment, starts_at) in next_reservation.into_iter().chain(next_booking) {
        if window.end > starts_at || window.start >= starts_at {
            return Err(Conflict {
                technician: technician.to_string(),
                commitment,
                starts_at,
            });
        }
    }
    Ok(())
}

/// Whether the technician holds a pending reservation starting exactly at `start`.
pub(crate) fn has_exact_reservation(store: &DayStore, technician: &str, start: Timestamp) -> bool {
    store
        .reservations
        .iter()
        .any(|r| r.is_pending() && r.technician == technician && r.start == start)
}

pub(crate) fn validate_name(name: &str) -> Result<(), EngineError> {
    if name.trim().is_empty() {
        return Err(EngineError::InvalidInput("name must not be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("name too long"));
    }
    Ok(())
}

pub(crate) fn validate_minutes(m: u32) -> Result<(), EngineError> {
    if m > MAX_SERVICE_MINUTES {
        return Err(EngineError::LimitExceeded("duration too long"));
    }
    Ok(())
}

pub(crate) fn validate_price(price: f64) -> Result<(), EngineError> {
    if !price.is_finite() || price < 0.0 {
        return Err(EngineError::InvalidInput("price must be a non-negative number"));
    }
    if price > MAX_PRICE {
        return Err(EngineError::LimitExceeded("price too large"));
    }
    Ok(())
}

pub(crate) fn validate_service(service: &Service) -> Result<(), EngineError> {
    validate_name(&service.name)?;
    validate_minutes(service.minutes)?;
    validate_price(service.price)
}
