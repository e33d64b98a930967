use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds, used for creation timestamps and stored day values.
pub type Ms = i64;

/// A calendar day. Never carries a time of day.
pub type Day = NaiveDate;

/// Store-assigned document id.
pub type DocId = Ulid;

/// Inclusive day range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DayRange {
    pub start: Day,
    pub end: Day,
}

impl DayRange {
    pub fn new(start: Day, end: Day) -> Self {
        debug_assert!(start <= end, "DayRange start must not be after end");
        Self { start, end }
    }

    pub fn contains(&self, day: Day) -> bool {
        self.start <= day && day <= self.end
    }

    pub fn overlaps(&self, other: &DayRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Common part of both ranges, if any.
    pub fn intersect(&self, other: &DayRange) -> Option<DayRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start <= end).then_some(DayRange { start, end })
    }

    /// Number of days covered, both ends included.
    pub fn nights(&self) -> u32 {
        ((self.end - self.start).num_days() + 1) as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReservationStatus {
    Reserved,
    Occupied,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Reserved => "reserved",
            ReservationStatus::Occupied => "occupied",
        }
    }

    /// Lenient parse of the stored value. Anything unknown is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "reserved" => Some(ReservationStatus::Reserved),
            "occupied" => Some(ReservationStatus::Occupied),
            _ => None,
        }
    }
}

/// Resolved status of one apartment on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellStatus {
    Free,
    Reserved,
    Occupied,
}

impl From<ReservationStatus> for CellStatus {
    fn from(status: ReservationStatus) -> Self {
        match status {
            ReservationStatus::Reserved => CellStatus::Reserved,
            ReservationStatus::Occupied => CellStatus::Occupied,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Apartment {
    pub id: DocId,
    pub name: String,
    /// Default nightly price. Informational only; revenue never falls back to it.
    pub price_per_day: Option<f64>,
    pub created_at: Ms,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reservation {
    pub id: DocId,
    pub apartment_id: DocId,
    pub range: DayRange,
    pub status: ReservationStatus,
    pub guest_name: String,
    pub phone: String,
    /// Identity document number.
    pub cin: String,
    pub price_per_day: Option<f64>,
    pub notes: String,
    pub created_at: Ms,
}

impl Reservation {
    pub fn covers(&self, day: Day) -> bool {
        self.range.contains(day)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expense {
    pub id: DocId,
    pub apartment_id: DocId,
    pub day: Day,
    pub amount: f64,
    pub note: String,
    pub created_at: Ms,
}

// ── Write-side inputs ────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApartmentDraft {
    pub name: String,
    pub price_per_day: Option<f64>,
}

/// Only `Some` fields are written. `price_per_day: Some(None)` clears the price.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApartmentPatch {
    pub name: Option<String>,
    pub price_per_day: Option<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReservationDraft {
    pub start: Day,
    pub end: Day,
    pub status: ReservationStatus,
    pub guest_name: String,
    pub phone: String,
    pub cin: String,
    pub price_per_day: Option<f64>,
    pub notes: String,
}

impl ReservationDraft {
    /// A blank single-day reservation, the starting point of a new booking.
    pub fn new(start: Day, end: Day, status: ReservationStatus) -> Self {
        Self {
            start,
            end,
            status,
            guest_name: String::new(),
            phone: String::new(),
            cin: String::new(),
            price_per_day: None,
            notes: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReservationPatch {
    pub start: Option<Day>,
    pub end: Option<Day>,
    pub status: Option<ReservationStatus>,
    pub guest_name: Option<String>,
    pub phone: Option<String>,
    pub cin: Option<String>,
    pub price_per_day: Option<Option<f64>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseDraft {
    pub day: Day,
    pub amount: f64,
    pub note: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpensePatch {
    pub day: Option<Day>,
    pub amount: Option<f64>,
    pub note: Option<String>,
}

// ── Derived values ───────────────────────────────────────────────

/// What the calendar shows for one apartment on one day. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayCell {
    pub status: CellStatus,
    pub label: String,
    /// Id of the governing reservation, `None` when the day is free.
    pub reservation: Option<DocId>,
}

impl DayCell {
    pub fn free() -> Self {
        Self {
            status: CellStatus::Free,
            label: String::new(),
            reservation: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MonthStats {
    pub reserved_days: u32,
    pub occupied_days: u32,
    /// `reserved_days + occupied_days`.
    pub nights_booked: u32,
    /// Sum of per-reservation nights inside the month. Overlapping
    /// reservations count once each, so this can exceed `nights_booked`.
    pub billed_nights: u32,
    pub revenue: f64,
    pub expenses: f64,
    pub net: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ProjectTotals {
    pub reserved: u32,
    pub occupied: u32,
    pub revenue: f64,
    pub expenses: f64,
    pub net: f64,
    pub occupancy_rate: f64,
}
