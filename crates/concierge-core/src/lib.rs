//! Shared foundations for the cottage concierge: configuration, the
//! top-level error type and the cottage domain model.

pub mod config;
pub mod cottage;
pub mod error;

pub use config::ConciergeConfig;
pub use cottage::{
    CapacityMap, CottageInfo, CottageRegistry, InventorySummary, OccupancyBand, BASE_CAPACITY,
    HARD_MAX_CAPACITY,
};
pub use error::{ConciergeError, Result};
