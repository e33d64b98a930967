use crate::locale::Lang;
use crate::model::*;

// ── Overlap Resolution ───────────────────────────────────────────

/// Pick the reservation that governs `day`.
///
/// First covering reservation wins, except that a later OCCUPIED one replaces a
/// candidate that is not OCCUPIED. Among equal statuses the slice order decides.
pub fn governing_reservation(reservations: &[Reservation], day: Day) -> Option<&Reservation> {
    let mut hit: Option<&Reservation> = None;
    for r in reservations.iter().filter(|r| r.covers(day)) {
        hit = match hit {
            None => Some(r),
            Some(current)
                if r.status == ReservationStatus::Occupied
                    && current.status != ReservationStatus::Occupied =>
            {
                Some(r)
            }
            keep => keep,
        };
    }
    hit
}

/// Status only, without building a label.
pub fn resolve_status(reservations: &[Reservation], day: Day) -> CellStatus {
    governing_reservation(reservations, day)
        .map(|r| CellStatus::from(r.status))
        .unwrap_or(CellStatus::Free)
}

pub fn resolve_cell(reservations: &[Reservation], day: Day, lang: Lang) -> DayCell {
    let Some(hit) = governing_reservation(reservations, day) else {
        return DayCell::free();
    };
    let label = if hit.guest_name.trim().is_empty() {
        lang.status_label(hit.status).to_string()
    } else {
        hit.guest_name.clone()
    };
    DayCell {
        status: hit.status.into(),
        label,
        reservation: Some(hit.id),
    }
}

/// Resolve one apartment across a run of days.
pub fn resolve_row(reservations: &[Reservation], days: &[Day], lang: Lang) -> Vec<DayCell> {
    days.iter()
        .map(|&day| resolve_cell(reservations, day, lang))
        .collect()
}
