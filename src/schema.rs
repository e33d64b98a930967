use tracing::warn;

use crate::calendar::{day_from_ms, day_from_str, day_to_ms};
use crate::model::*;
use crate::store::{Document, FieldValue, Fields};

pub const NAME: &str = "name";
pub const PRICE_PER_DAY: &str = "pricePerDay";
pub const CREATED_AT: &str = "createdAt";
pub const START: &str = "start";
pub const END: &str = "end";
pub const STATUS: &str = "status";
pub const GUEST_NAME: &str = "guestName";
pub const PHONE: &str = "phone";
pub const CIN: &str = "cin";
pub const NOTES: &str = "notes";
pub const DATE: &str = "date";
pub const AMOUNT: &str = "amount";
pub const NOTE: &str = "note";

// ── Field readers ────────────────────────────────────────────────
//
// Reading never fails on a bad field. Text defaults to empty, numbers to none,
// an unknown status to reserved. A document with no usable day is skipped.

fn text(doc: &Document, key: &str) -> String {
    doc.get(key)
        .and_then(FieldValue::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}

fn number(doc: &Document, key: &str) -> Option<f64> {
    doc.get(key).and_then(FieldValue::as_f64)
}

fn day(doc: &Document, key: &str) -> Option<Day> {
    match doc.get(key)? {
        FieldValue::Number(ms) if ms.is_finite() => day_from_ms(*ms as Ms),
        FieldValue::Text(raw) => day_from_str(raw),
        _ => None,
    }
}

// ── Documents → records ──────────────────────────────────────────

pub fn apartment_from_doc(doc: &Document) -> Apartment {
    Apartment {
        id: doc.id,
        name: text(doc, NAME),
        price_per_day: number(doc, PRICE_PER_DAY),
        created_at: number(doc, CREATED_AT).map(|n| n as Ms).unwrap_or(0),
    }
}

pub fn reservation_from_doc(apartment_id: DocId, doc: &Document) -> Option<Reservation> {
    let (Some(start), Some(end)) = (day(doc, START), day(doc, END)) else {
        warn!("skipping reservation {} of {apartment_id}: missing start/end", doc.id);
        return None;
    };
    if end < start {
        warn!("skipping reservation {} of {apartment_id}: end {end} before start {start}", doc.id);
        return None;
    }
    let status = doc
        .get(STATUS)
        .and_then(FieldValue::as_str)
        .and_then(ReservationStatus::parse)
        .unwrap_or(ReservationStatus::Reserved);
    Some(Reservation {
        id: doc.id,
        apartment_id,
        range: DayRange::new(start, end),
        status,
        guest_name: text(doc, GUEST_NAME),
        phone: text(doc, PHONE),
        cin: text(doc, CIN),
        price_per_day: number(doc, PRICE_PER_DAY),
        notes: text(doc, NOTES),
        created_at: number(doc, CREATED_AT).map(|n| n as Ms).unwrap_or(0),
    })
}

pub fn expense_from_doc(apartment_id: DocId, doc: &Document) -> Option<Expense> {
    let Some(date) = day(doc, DATE) else {
        warn!("skipping expense {} of {apartment_id}: missing date", doc.id);
        return None;
    };
    Some(Expense {
        id: doc.id,
        apartment_id,
        day: date,
        amount: number(doc, AMOUNT).unwrap_or(0.0),
        note: text(doc, NOTE),
        created_at: number(doc, CREATED_AT).map(|n| n as Ms).unwrap_or(0),
    })
}

// ── Records → fields ─────────────────────────────────────────────

fn finite(n: Option<f64>) -> FieldValue {
    n.filter(|v| v.is_finite()).into()
}

fn day_value(d: Day) -> FieldValue {
    day_to_ms(d).into()
}

/// Identity numbers are stored trimmed and upper-cased.
pub fn normalize_cin(raw: &str) -> String {
    raw.trim().to_uppercase()
}

pub fn apartment_fields(draft: &ApartmentDraft, created_at: Ms) -> Fields {
    let mut f = Fields::new();
    f.insert(NAME.into(), draft.name.trim().into());
    f.insert(PRICE_PER_DAY.into(), finite(draft.price_per_day));
    f.insert(CREATED_AT.into(), created_at.into());
    f
}

pub fn apartment_patch_fields(patch: &ApartmentPatch) -> Fields {
    let mut f = Fields::new();
    if let Some(name) = &patch.name {
        f.insert(NAME.into(), name.trim().into());
    }
    if let Some(price) = patch.price_per_day {
        f.insert(PRICE_PER_DAY.into(), finite(price));
    }
    f
}

pub fn reservation_fields(draft: &ReservationDraft, created_at: Ms) -> Fields {
    let mut f = Fields::new();
    f.insert(START.into(), day_value(draft.start));
    f.insert(END.into(), day_value(draft.end));
    f.insert(STATUS.into(), draft.status.as_str().into());
    f.insert(GUEST_NAME.into(), draft.guest_name.trim().into());
    f.insert(PHONE.into(), draft.phone.trim().into());
    f.insert(CIN.into(), normalize_cin(&draft.cin).into());
    f.insert(PRICE_PER_DAY.into(), finite(draft.price_per_day));
    f.insert(NOTES.into(), draft.notes.trim().into());
    f.insert(CREATED_AT.into(), created_at.into());
    f
}

pub fn reservation_patch_fields(patch: &ReservationPatch) -> Fields {
    let mut f = Fields::new();
    if let Some(start) = patch.start {
        f.insert(START.into(), day_value(start));
    }
    if let Some(end) = patch.end {
        f.insert(END.into(), day_value(end));
    }
    if let Some(status) = patch.status {
        f.insert(STATUS.into(), status.as_str().into());
    }
    if let Some(v) = &patch.guest_name {
        f.insert(GUEST_NAME.into(), v.trim().into());
    }
    if let Some(v) = &patch.phone {
        f.insert(PHONE.into(), v.trim().into());
    }
    if let Some(v) = &patch.cin {
        f.insert(CIN.into(), normalize_cin(v).into());
    }
    if let Some(price) = patch.price_per_day {
        f.insert(PRICE_PER_DAY.into(), finite(price));
    }
    if let Some(v) = &patch.notes {
        f.insert(NOTES.into(), v.trim().into());
    }
    f
}

pub fn expense_fields(draft: &ExpenseDraft, created_at: Ms) -> Fields {
    let mut f = Fields::new();
    f.insert(DATE.into(), day_value(draft.day));
    f.insert(AMOUNT.into(), draft.amount.into());
    f.insert(NOTE.into(), draft.note.trim().into());
    f.insert(CREATED_AT.into(), created_at.into());
    f
}

pub fn expense_patch_fields(patch: &ExpensePatch) -> Fields {
    let mut f = Fields::new();
    if let Some(d) = patch.day {
        f.insert(DATE.into(), day_value(d));
    }
    if let Some(amount) = patch.amount {
        f.insert(AMOUNT.into(), amount.into());
    }
    if let Some(note) = &patch.note {
        f.insert(NOTE.into(), note.trim().into());
    }
    f
}
