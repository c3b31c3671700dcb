pub mod config;
pub mod enums;
pub mod error;
pub mod db;
pub mod plans;
pub mod providers;
pub mod recurrence;
pub mod validation;
pub mod services;
pub mod api;
pub mod scheduler;

#[cfg(test)]
mod test_utils;

pub use config::Config;
pub use enums::{ Network, PurchaseType, ScheduleKind, ScheduleStatus, TxStatus, TxType };
pub use error::{ AppError, Result };
