#![forbid(unsafe_code)]

//! Core domain model and business logic for the Focus Garden system.
//!
//! This crate provides:
//! - Domain types (species, ledgers, plants, sessions)
//! - Species catalog management
//! - Session lifecycle engine
//! - Persistence (in-memory and file-backed stores)
//! - Progression logic (growth stages, dew, streaks)

pub mod types;
pub mod error;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod progression;
pub mod ledger;
pub mod plant;
pub mod store;
pub mod engine;
pub mod overview;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::{build_default_catalog, get_default_catalog, Catalog, SpeciesCatalog};
pub use config::Config;
pub use ledger::{position, TilePosition};
pub use store::{FileStore, GardenStore, MemoryStore};
pub use engine::{Clock, GardenEngine, StartRequest, SystemClock};
pub use overview::{build_overview, GardenOverview};
pub use export::export_history;
