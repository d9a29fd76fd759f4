//! Core domain types for the Focus Garden system.
//!
//! This module defines the fundamental types used throughout the system:
//! - Species and their growth stages
//! - The per-user garden ledger and its in-flight session
//! - Planted tiles and their session history

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

// ============================================================================
// Species Types
// ============================================================================

/// Broad family a species belongs to
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SpeciesCategory {
    Tree,
    Flower,
    Shrub,
    Succulent,
}

/// Rarity tier, ordered from most to least common
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

/// Threshold a plant must meet to reach a growth stage
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GrowthStage {
    pub stage: u32,
    pub min_sessions: u32,
    pub min_total_minutes: u32,
}

/// Milestone a gardener must reach before a species is shown as unlocked
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UnlockRequirement {
    TotalMinutes { minutes: u64 },
    TotalSessions { sessions: u32 },
    LongestStreak { days: u32 },
}

/// A plantable species (e.g., "Pine Tree")
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Species {
    pub slug: String,
    pub name: String,
    pub category: SpeciesCategory,
    pub base_focus_minutes: u32,
    pub price: u64,
    pub rarity: Rarity,
    pub stages: Vec<GrowthStage>,
    #[serde(default)]
    pub unlock: Option<UnlockRequirement>,
}

// ============================================================================
// Ledger Types
// ============================================================================

/// The single focus session a user may have in flight
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ActiveSession {
    pub id: Uuid,
    pub species_slug: String,
    pub subject: String,
    pub target_minutes: u32,
    pub started_at: DateTime<Utc>,
    pub tile_index: u32,
    /// Set when the session grows an existing plant rather than a new tile
    #[serde(default)]
    pub waters_existing: bool,
}

/// Per-user garden state: currency, lifetime totals, streaks, grid and inventory
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GardenLedger {
    pub user_id: String,
    pub dew_balance: u64,
    pub total_focus_minutes: u64,
    pub total_sessions: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub grid_columns: u32,
    pub grid_rows: u32,
    pub next_tile_index: u32,
    pub inventory: BTreeMap<String, u32>,
    pub last_session_date: Option<NaiveDate>,
    pub active_session: Option<ActiveSession>,
    /// Optimistic-concurrency token; 0 means never committed
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Plant Types
// ============================================================================

/// Advisory health indicator for a plant
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlantHealth {
    Healthy,
    Thirsty,
    Wilted,
}

/// One completed focus session credited to a plant
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub subject: String,
    pub quality: u8,
}

/// A planted tile
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Plant {
    pub user_id: String,
    pub species_slug: String,
    pub tile_index: u32,
    pub planted_at: DateTime<Utc>,
    pub stage: u32,
    pub sessions: Vec<SessionRecord>,
    pub total_minutes: u64,
    pub dew_earned: u64,
    pub health: PlantHealth,
    pub last_cared_at: DateTime<Utc>,
}

/// Result of a successfully completed session
#[derive(Clone, Debug, Serialize)]
pub struct CompletedSession {
    pub plant: Plant,
    pub ledger: GardenLedger,
    pub dew_earned: u64,
}
