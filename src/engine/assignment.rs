use tracing::debug;

use crate::model::*;

use super::capability::can_perform;
use super::conflict::{check_conflict, has_exact_reservation};
use super::rotation::{prefer, rotation_order};
use super::store::DayStore;

/// Why `assign` bound nobody. Routine, not a fault: the caller enqueues or retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unassigned {
    NoTechnicians,
    NoCapableTechnician,
    AllConflicted,
}

impl Unassigned {
    pub fn id(&self) -> &'static str {
        match self {
            Unassigned::NoTechnicians => "no_technicians",
            Unassigned::NoCapableTechnician => "no_capable_technician",
            Unassigned::AllConflicted => "all_conflicted",
        }
    }
}

impl std::fmt::Display for Unassigned {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unassigned::NoTechnicians => write!(f, "no technicians checked in"),
            Unassigned::NoCapableTechnician => write!(f, "no technician can perform this service"),
            Unassigned::AllConflicted => {
                write!(f, "every capable technician has a conflicting commitment")
            }
        }
    }
}

/// Bind one customer-unit to the first fairness-ranked technician who is both
/// capable and schedule-compatible.
///
/// A technician whose window collides with a later commitment is skipped, not
/// fatal: the walk continues down the rotation. The preferred technician is exempt
/// from the conflict veto when they hold a pending reservation starting exactly at
/// `arrival` (that reservation is the one being fulfilled).
///
/// On success the technician's `next_free` moves to the booking's end and their
/// served count goes up by one.
pub(crate) fn assign(
    store: &mut DayStore,
    service: &Service,
    arrival: Timestamp,
    preferred: Option<&str>,
    now: Timestamp,
) -> Result<Booking, Unassigned> {
    if store.technicians.is_empty() {
        return Err(Unassigned::NoTechnicians);
    }

    let (technician, window) = {
        let mut order = rotation_order(store.technicians.values());
        prefer(&mut order, preferred);
        let capable: Vec<&Technician> = order.into_iter().filter(|t| can_perform(t, service)).collect();
        if capable.is_empty() {
            return Err(Unassigned::NoCapableTechnician);
        }

        let mut chosen = None;
        for tech in capable {
            let window = Window::starting_at(arrival.max(tech.next_free), service.minutes);
            if let Err(conflict) = check_conflict(store, &tech.name, &window) {
                let exempt = preferred == Some(tech.name.as_str())
                    && has_exact_reservation(store, &tech.name, arrival);
                if !exempt {
                    debug!("skipping {} for {}: {conflict}", tech.name, service.name);
                    continue;
                }
            }
            chosen = Some((tech.name.clone(), window));
            break;
        }
        chosen.ok_or(Unassigned::AllConflicted)?
    };

    let booking = Booking {
        id: store.next_customer_id(),
        service: service.name.clone(),
        minutes: service.minutes,
        technician: technician.clone(),
        start: window.start,
        end: window.end,
        price: service.price,
        status: BookingStatus::at(&window, now),
        payment: Payment::default(),
    };
    if let Some(tech) = store.technician_mut(&technician) {
        tech.next_free = window.end;
        tech.served_count += 1;
    }
    store.bookings.push(booking.clone());
    Ok(booking)
}

/// Who could take `service` for a customer arriving at `at`, in rotation order,
/// then stably by prospective start. Read-only.
pub(crate) fn preview(store: &DayStore, service: &Service, at: Timestamp) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = rotation_order(store.technicians.values())
        .into_iter()
        .filter(|t| can_perform(t, service))
        .filter_map(|t| {
            let window = Window::starting_at(at.max(t.next_free), service.minutes);
            check_conflict(store, &t.name, &window).ok()?;
            Some(Candidate {
                technician: t.name.clone(),
                tier: t.tier,
                start: window.start,
                end: window.end,
                served_count: t.served_count,
            })
        })
        .collect();
    candidates.sort_by_key(|c| c.start);
    candidates
}
