use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Wall-clock instant. The engine works in UTC; display offsets belong to the host.
pub type Timestamp = DateTime<Utc>;

pub fn minutes(m: u32) -> Duration {
    Duration::minutes(i64::from(m))
}

/// Round a money amount to cents.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Half-open window `[start, end)`. Zero-length windows are legal (instant services).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl Window {
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        debug_assert!(start <= end, "Window start must not be after end");
        Self { start, end }
    }

    pub fn starting_at(start: Timestamp, length: u32) -> Self {
        Self::new(start, start + minutes(length))
    }

    pub fn contains_instant(&self, t: Timestamp) -> bool {
        self.start <= t && t < self.end
    }
}

/// Authorization level of a technician.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillTier {
    Full,
    JuniorBasic,
    JuniorIntermediate,
}

impl SkillTier {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::JuniorBasic => "junior_basic",
            Self::JuniorIntermediate => "junior_intermediate",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id.trim().to_lowercase().as_str() {
            "full" | "senior" => Some(Self::Full),
            "junior_basic" | "basic" => Some(Self::JuniorBasic),
            "junior_intermediate" | "intermediate" => Some(Self::JuniorIntermediate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Technician {
    pub name: String,
    pub check_in: Timestamp,
    /// Never earlier than `check_in`.
    pub next_free: Timestamp,
    pub served_count: u32,
    pub tier: SkillTier,
}

impl Technician {
    pub fn new(name: impl Into<String>, check_in: Timestamp, tier: SkillTier) -> Self {
        Self {
            name: name.into(),
            check_in,
            next_free: check_in,
            served_count: 0,
            tier,
        }
    }
}

/// A catalog entry. Capability tags are derived from `name`, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub minutes: u32,
    pub price: f64,
}

impl Service {
    pub fn new(name: impl Into<String>, minutes: u32, price: f64) -> Self {
        Self {
            name: name.into(),
            minutes,
            price,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Queued,
    Active,
    Completed,
}

impl BookingStatus {
    /// Status is a pure function of the window and the clock.
    pub fn at(window: &Window, now: Timestamp) -> Self {
        if window.contains_instant(now) {
            Self::Active
        } else if window.end <= now {
            Self::Completed
        } else {
            Self::Queued
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

/// Money collected for a booking. Scheduling never looks inside.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Payment {
    pub cash: f64,
    pub transfer: f64,
    pub eftpos: f64,
    pub voucher: f64,
    pub note: String,
}

impl Payment {
    pub fn with_note(note: impl Into<String>) -> Self {
        Self {
            note: note.into(),
            ..Self::default()
        }
    }

    pub fn total(&self) -> f64 {
        self.cash + self.transfer + self.eftpos + self.voucher
    }
}

/// One customer-unit bound to one technician over one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    /// Customer id minted from the day's sequence.
    pub id: u64,
    pub service: String,
    pub minutes: u32,
    pub technician: String,
    pub start: Timestamp,
    pub end: Timestamp,
    pub price: f64,
    pub status: BookingStatus,
    #[serde(default)]
    pub payment: Payment,
}

impl Booking {
    pub fn window(&self) -> Window {
        Window::new(self.start, self.end)
    }
}

/// Identical-service customer-units that could not be bound yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitingBatch {
    pub id: u64,
    pub service: Service,
    pub arrival: Timestamp,
    /// Always > 0; the batch is dropped when it would reach 0.
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Done,
}

/// A technician-specific commitment made ahead of arrival.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: u64,
    pub customer: String,
    pub service: String,
    pub technician: String,
    pub start: Timestamp,
    pub status: ReservationStatus,
}

impl Reservation {
    pub fn is_pending(&self) -> bool {
        self.status == ReservationStatus::Pending
    }
}

/// Fan-out record, broadcast per technician.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    TechnicianCheckedIn {
        name: String,
        check_in: Timestamp,
        tier: SkillTier,
    },
    TechnicianRemoved {
        name: String,
    },
    BookingAssigned {
        booking: Booking,
    },
    BookingChanged {
        booking: Booking,
    },
    BookingRemoved {
        id: u64,
        technician: String,
    },
    ReservationFulfilled {
        reservation_id: u64,
        booking_id: u64,
        technician: String,
    },
}

impl Event {
    /// The technician whose channel carries this event.
    pub fn technician(&self) -> &str {
        match self {
            Event::TechnicianCheckedIn { name, .. } | Event::TechnicianRemoved { name } => name,
            Event::BookingAssigned { booking } | Event::BookingChanged { booking } => {
                &booking.technician
            }
            Event::BookingRemoved { technician, .. }
            | Event::ReservationFulfilled { technician, .. } => technician,
        }
    }
}

// ── Query result types ───────────────────────────────────────────

/// A technician who could take a service right now, with the window they would get.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub technician: String,
    pub tier: SkillTier,
    pub start: Timestamp,
    pub end: Timestamp,
    pub served_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Takings {
    pub technician: String,
    pub realized: f64,
    pub cash: f64,
    pub transfer: f64,
    pub eftpos: f64,
    pub voucher: f64,
}

/// What a walk-in registration produced. Ids are enough to undo it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registration {
    pub assigned: Vec<Booking>,
    pub waiting: Option<WaitingBatch>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlushReport {
    pub assigned: Vec<Booking>,
    /// Customer-units still waiting after the flush.
    pub still_waiting: u32,
}

/// One periodic pass over a day.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub status_changed: bool,
    pub fulfilled: Vec<(Reservation, Booking)>,
    pub flushed: Vec<Booking>,
    /// Waiting batches and pending reservations past the stale threshold.
    pub stale: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2026, 10, 19, h, m, 0).unwrap()
    }

    #[test]
    fn window_basics() {
        let w = Window::starting_at(at(11, 32), 45);
        assert_eq!(w.end, at(12, 17));
        assert!(w.contains_instant(at(11, 32)));
        assert!(!w.contains_instant(at(12, 17))); // half-open
    }

    #[test]
    fn zero_length_window_contains_nothing() {
        let w = Window::starting_at(at(10, 0), 0);
        assert_eq!(w.start, w.end);
        assert!(!w.contains_instant(at(10, 0)));
    }

    #[test]
    fn status_boundaries() {
        let w = Window::new(at(10, 0), at(11, 0));
        assert_eq!(BookingStatus::at(&w, at(9, 59)), BookingStatus::Queued);
        assert_eq!(BookingStatus::at(&w, at(10, 0)), BookingStatus::Active);
        assert_eq!(BookingStatus::at(&w, at(10, 59)), BookingStatus::Active);
        assert_eq!(BookingStatus::at(&w, at(11, 0)), BookingStatus::Completed);
    }

    #[test]
    fn instant_window_completes_at_its_start() {
        let w = Window::starting_at(at(10, 0), 0);
        assert_eq!(BookingStatus::at(&w, at(10, 0)), BookingStatus::Completed);
        assert_eq!(BookingStatus::at(&w, at(9, 0)), BookingStatus::Queued);
    }

    #[test]
    fn skill_tier_ids() {
        for tier in [SkillTier::Full, SkillTier::JuniorBasic, SkillTier::JuniorIntermediate] {
            assert_eq!(SkillTier::from_id(tier.id()), Some(tier));
        }
        assert_eq!(SkillTier::from_id(" Intermediate "), Some(SkillTier::JuniorIntermediate));
        assert_eq!(SkillTier::from_id("apprentice"), None);
    }

    #[test]
    fn technician_serializes_camel_case() {
        let t = Technician::new("Pan", at(9, 0), SkillTier::JuniorBasic);
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["checkIn"], "2026-10-19T09:00:00Z");
        assert_eq!(json["nextFree"], "2026-10-19T09:00:00Z");
        assert_eq!(json["servedCount"], 0);
        assert_eq!(json["tier"], "junior_basic");
    }

    #[test]
    fn booking_without_payment_deserializes() {
        let json = r#"{
            "id": 3, "service": "NS (30 mins)", "minutes": 30, "technician": "Iris",
            "start": "2026-10-19T10:00:00+11:00", "end": "2026-10-19T10:30:00+11:00",
            "price": 50.0, "status": "queued"
        }"#;
        let b: Booking = serde_json::from_str(json).unwrap();
        assert_eq!(b.start, Utc.with_ymd_and_hms(2026, 10, 18, 23, 0, 0).unwrap());
        assert_eq!(b.payment, Payment::default());
        assert_eq!(b.end - b.start, minutes(30));
    }

    #[test]
    fn payment_total_and_rounding() {
        let p = Payment {
            cash: 20.0,
            eftpos: 30.5,
            ..Payment::default()
        };
        assert_eq!(p.total(), 50.5);
        assert_eq!(round_cents(75.0 + (75.0 / 45.0) * 15.0), 100.0);
        assert_eq!(round_cents(33.333_333), 33.33);
    }

    #[test]
    fn event_routes_to_technician() {
        let e = Event::BookingRemoved {
            id: 1,
            technician: "Ptr".into(),
        };
        assert_eq!(e.technician(), "Ptr");
    }
}
