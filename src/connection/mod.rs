pub mod manager;

pub use manager::{DroneLink, LinkConfig, LinkEvent};
