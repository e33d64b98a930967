mod resolve;
mod stats;

pub use resolve::{governing_reservation, resolve_cell, resolve_row, resolve_status};
pub use stats::{month_stats, project_totals};
