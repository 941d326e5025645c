//! Scheduling and non-overlap control
//!
//! # Components
//!
//! - `RunGuard`: Refuses to start a job while the same job is running
//! - `Trigger`: Entry points for crawls and detection passes, each behind a guard
//! - `DailySchedule`: Runs crawl and detection once a day at a fixed UTC time

mod daily;
mod guard;
mod trigger;

pub use daily::DailySchedule;
pub use guard::{RunGuard, RunPermit};
pub use trigger::Trigger;
