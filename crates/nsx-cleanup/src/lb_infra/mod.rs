//! Load-balancer infra teardown

pub mod cleaner;
pub mod report;

pub use cleaner::LbInfraCleaner;
pub use report::{CleanupReport, FamilyCounts};
