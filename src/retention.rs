//! Capture retention.
//!
//! The [`retention_manager::RetentionManager`] deletes capture files whose age
//! exceeds the configured TTL, keeps the directory under its storage limit and
//! honours time-bounded holds placed on individual captures. The
//! [`sweeper`] drives it from a timer.

pub mod clock;
pub mod retention_manager;
pub mod sweeper;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use retention_manager::RetentionManager;
pub use sweeper::spawn_sweeper;
pub use types::{CaptureFile, RetentionHold, SweepReport};
