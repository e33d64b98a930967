pub mod accounts;
pub mod calendar;
pub mod compactor;
pub mod config;
pub mod legacy;
pub mod limits;
pub mod locale;
pub mod migration;
pub mod model;
pub mod notify;
pub mod observability;
pub mod occupancy;
pub mod schema;
pub mod session;
pub mod store;
pub mod wal;
