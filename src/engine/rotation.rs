use std::cmp::Ordering;

use crate::model::Technician;

/// Fairness key: earliest free first, then earliest check-in, then fewest served,
/// then name so that no two technicians ever tie.
pub fn rotation_cmp(a: &Technician, b: &Technician) -> Ordering {
    a.next_free
        .cmp(&b.next_free)
        .then_with(|| a.check_in.cmp(&b.check_in))
        .then_with(|| a.served_count.cmp(&b.served_count))
        .then_with(|| a.name.cmp(&b.name))
}

/// Total fairness order over the roster. Recomputed on every call.
pub fn rotation_order<'a>(technicians: impl IntoIterator<Item = &'a Technician>) -> Vec<&'a Technician> {
    let mut order: Vec<&Technician> = technicians.into_iter().collect();
    order.sort_by(|a, b| rotation_cmp(a, b));
    order
}

/// Move `preferred` (if present) to the front; everyone else keeps their place.
pub fn prefer<'a>(order: &mut Vec<&'a Technician>, preferred: Option<&str>) {
    let Some(name) = preferred else { return };
    if let Some(pos) = order.iter().position(|t| t.name == name) {
        let chosen = order.remove(pos);
        order.insert(0, chosen);
    }
}
