//! In-memory position storage
//!
//! This module handles:
//! - The concurrent position table and its dedup rule
//! - Injected time sources for stamping records
//! - Periodic eviction of drones that stopped reporting

mod clock;
mod sweeper;
mod table;

pub use clock::{Clock, ManualClock, SystemClock};
pub use sweeper::Sweeper;
pub use table::{InsertOutcome, PositionTable};
