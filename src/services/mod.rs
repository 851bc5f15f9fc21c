//! Business logic shared by the HTTP handlers and the scheduled jobs.
//!
//! Every function takes `&PulseDb` and runs synchronously; handlers call
//! them on the blocking pool through `AppState::with_db`.

pub mod datamind;
pub mod employees;
pub mod events;
pub mod imports;
pub mod metrics;
pub mod notifications;
pub mod posts;
pub mod recognition;
pub mod reports;
pub mod tasks;
