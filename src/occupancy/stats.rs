use crate::calendar::{month_days, month_range};
use crate::model::*;

use super::resolve_status;

// ── Month Aggregation ────────────────────────────────────────────

/// Occupancy and money for one apartment in the month containing `month_anchor`.
///
/// Day counts use the same dominance rule as the cell resolver. Revenue is
/// per reservation: nights inside the month × the reservation's own price.
/// A reservation without a price earns nothing, even when the apartment has
/// a default price.
pub fn month_stats(reservations: &[Reservation], expenses: &[Expense], month_anchor: Day) -> MonthStats {
    let month = month_range(month_anchor);

    let mut stats = MonthStats::default();
    for day in month_days(month_anchor) {
        match resolve_status(reservations, day) {
            CellStatus::Reserved => stats.reserved_days += 1,
            CellStatus::Occupied => stats.occupied_days += 1,
            CellStatus::Free => {}
        }
    }
    stats.nights_booked = stats.reserved_days + stats.occupied_days;

    for r in reservations {
        let Some(overlap) = r.range.intersect(&month) else {
            continue;
        };
        let nights = overlap.nights();
        stats.billed_nights += nights;
        let price = r.price_per_day.filter(|p| p.is_finite()).unwrap_or(0.0);
        stats.revenue += nights as f64 * price;
    }

    stats.expenses = expenses
        .iter()
        .filter(|e| month.contains(e.day))
        .map(|e| if e.amount.is_finite() { e.amount } else { 0.0 })
        .sum();

    stats.net = stats.revenue - stats.expenses;
    stats
}

// ── Project Aggregation ──────────────────────────────────────────

/// Fold per-apartment month stats into project totals.
///
/// `occupancy_rate = (reserved + occupied) / (days_in_month × max(1, apartments))`.
pub fn project_totals<'a>(
    per_apartment: impl IntoIterator<Item = &'a MonthStats>,
    days_in_month: u32,
    apartment_count: usize,
) -> ProjectTotals {
    let mut totals = ProjectTotals::default();
    for s in per_apartment {
        totals.reserved += s.reserved_days;
        totals.occupied += s.occupied_days;
        totals.revenue += s.revenue;
        totals.expenses += s.expenses;
    }
    totals.net = totals.revenue - totals.expenses;

    let slots = days_in_month as f64 * apartment_count.max(1) as f64;
    totals.occupancy_rate = if slots > 0.0 {
        (totals.reserved + totals.occupied) as f64 / slots
    } else {
        0.0
    };
    totals
}
