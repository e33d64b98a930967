use crate::limits::*;
use crate::model::*;

use super::ValidationError;

fn check_len(value: &str, max: usize, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().len() > max {
        return Err(ValidationError::TooLong(field));
    }
    Ok(())
}

fn check_price(price: Option<f64>) -> Result<(), ValidationError> {
    match price {
        Some(p) if !p.is_finite() => Err(ValidationError::NonFinitePrice(p)),
        _ => Ok(()),
    }
}

pub(crate) fn validate_range(start: Day, end: Day) -> Result<(), ValidationError> {
    if end < start {
        return Err(ValidationError::EndBeforeStart { start, end });
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    check_len(name, MAX_NAME_LEN, "apartment name")
}

pub(crate) fn validate_apartment_draft(draft: &ApartmentDraft) -> Result<(), ValidationError> {
    validate_name(&draft.name)?;
    check_price(draft.price_per_day)
}

pub(crate) fn validate_apartment_patch(patch: &ApartmentPatch) -> Result<(), ValidationError> {
    if let Some(name) = &patch.name {
        validate_name(name)?;
    }
    check_price(patch.price_per_day.flatten())
}

fn validate_guest_fields(
    guest_name: Option<&str>,
    phone: Option<&str>,
    cin: Option<&str>,
    notes: Option<&str>,
) -> Result<(), ValidationError> {
    if let Some(v) = guest_name {
        check_len(v, MAX_SHORT_TEXT_LEN, "guest name")?;
    }
    if let Some(v) = phone {
        check_len(v, MAX_SHORT_TEXT_LEN, "phone")?;
    }
    if let Some(v) = cin {
        check_len(v, MAX_SHORT_TEXT_LEN, "identity number")?;
    }
    if let Some(v) = notes {
        check_len(v, MAX_NOTES_LEN, "notes")?;
    }
    Ok(())
}

pub(crate) fn validate_reservation_draft(draft: &ReservationDraft) -> Result<(), ValidationError> {
    validate_range(draft.start, draft.end)?;
    check_price(draft.price_per_day)?;
    validate_guest_fields(
        Some(&draft.guest_name),
        Some(&draft.phone),
        Some(&draft.cin),
        Some(&draft.notes),
    )
}

/// A patch may move one end only; the other comes from `current` when known.
pub(crate) fn validate_reservation_patch(
    patch: &ReservationPatch,
    current: Option<&Reservation>,
) -> Result<(), ValidationError> {
    let start = patch.start.or(current.map(|r| r.range.start));
    let end = patch.end.or(current.map(|r| r.range.end));
    if let (Some(start), Some(end)) = (start, end) {
        validate_range(start, end)?;
    }
    check_price(patch.price_per_day.flatten())?;
    validate_guest_fields(
        patch.guest_name.as_deref(),
        patch.phone.as_deref(),
        patch.cin.as_deref(),
        patch.notes.as_deref(),
    )
}

pub(crate) fn validate_expense_draft(draft: &ExpenseDraft) -> Result<(), ValidationError> {
    if !draft.amount.is_finite() {
        return Err(ValidationError::NonFiniteAmount(draft.amount));
    }
    check_len(&draft.note, MAX_NOTES_LEN, "note")
}

pub(crate) fn validate_expense_patch(patch: &ExpensePatch) -> Result<(), ValidationError> {
    if let Some(amount) = patch.amount
        && !amount.is_finite()
    {
        return Err(ValidationError::NonFiniteAmount(amount));
    }
    if let Some(note) = &patch.note {
        check_len(note, MAX_NOTES_LEN, "note")?;
    }
    Ok(())
}
