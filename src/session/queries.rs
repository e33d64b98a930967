use std::sync::Arc;

use crate::calendar::days_in_month;
use crate::model::*;
use crate::occupancy;

use super::Session;

impl Session {
    /// Apartments sorted by name, then creation time.
    pub fn apartments(&self) -> Arc<Vec<Apartment>> {
        self.state.apartments()
    }

    pub fn apartment(&self, id: DocId) -> Option<Apartment> {
        self.state.apartments().iter().find(|a| a.id == id).cloned()
    }

    /// Reservations of one apartment sorted by start day. Empty for an
    /// apartment the session does not know.
    pub fn reservations(&self, apartment: DocId) -> Arc<Vec<Reservation>> {
        self.state.reservations(apartment)
    }

    pub fn reservation(&self, apartment: DocId, id: DocId) -> Option<Reservation> {
        self.state
            .reservations(apartment)
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    /// Expenses of one apartment sorted by day.
    pub fn expenses(&self, apartment: DocId) -> Arc<Vec<Expense>> {
        self.state.expenses(apartment)
    }

    // ── Derived views ────────────────────────────────────────────

    pub fn resolve_cell(&self, apartment: DocId, day: Day) -> DayCell {
        occupancy::resolve_cell(&self.state.reservations(apartment), day, self.lang)
    }

    pub fn resolve_row(&self, apartment: DocId, days: &[Day]) -> Vec<DayCell> {
        occupancy::resolve_row(&self.state.reservations(apartment), days, self.lang)
    }

    /// One resolved row per apartment, in list order.
    pub fn grid(&self, days: &[Day]) -> Vec<(Apartment, Vec<DayCell>)> {
        self.state
            .apartments()
            .iter()
            .map(|a| (a.clone(), self.resolve_row(a.id, days)))
            .collect()
    }

    pub fn month_stats(&self, apartment: DocId, month_anchor: Day) -> MonthStats {
        occupancy::month_stats(
            &self.state.reservations(apartment),
            &self.state.expenses(apartment),
            month_anchor,
        )
    }

    /// Month stats summed over every apartment in the session.
    pub fn project_totals(&self, month_anchor: Day) -> ProjectTotals {
        let apartments = self.state.apartments();
        let per_apartment: Vec<MonthStats> = apartments
            .iter()
            .map(|a| self.month_stats(a.id, month_anchor))
            .collect();
        occupancy::project_totals(&per_apartment, days_in_month(month_anchor), apartments.len())
    }
}
