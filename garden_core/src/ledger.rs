//! Garden ledger: currency, inventory and grid bookkeeping.
//!
//! All dew and inventory mutations go through these methods so the
//! non-negative balance and quantity invariants hold in one place.

use crate::config::GardenConfig;
use crate::{Error, GardenLedger, Result, Species};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Row/column of a tile on the garden grid
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct TilePosition {
    pub row: u32,
    pub col: u32,
}

/// Map a tile index onto the grid
///
/// Not bounded by the grid's row count; indices past the nominal capacity
/// simply land on later rows.
pub fn position(tile_index: u32, columns: u32) -> TilePosition {
    let columns = columns.max(1);
    TilePosition {
        row: tile_index / columns,
        col: tile_index % columns,
    }
}

impl GardenLedger {
    /// Fresh ledger holding the configured starter kit
    pub fn new(user_id: &str, garden: &GardenConfig, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            dew_balance: garden.starting_dew,
            total_focus_minutes: 0,
            total_sessions: 0,
            current_streak: 0,
            longest_streak: 0,
            grid_columns: garden.grid_columns.max(1),
            grid_rows: garden.grid_rows.max(1),
            next_tile_index: 0,
            inventory: garden
                .starter_inventory
                .iter()
                .filter(|(_, qty)| **qty > 0)
                .map(|(slug, qty)| (slug.clone(), *qty))
                .collect(),
            last_session_date: None,
            active_session: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_in_session(&self) -> bool {
        self.active_session.is_some()
    }

    /// Owned quantity of a species
    pub fn quantity_of(&self, slug: &str) -> u32 {
        self.inventory.get(slug).copied().unwrap_or(0)
    }

    /// Take one unit of a species out of inventory for a session
    pub fn reserve(&mut self, slug: &str) -> Result<()> {
        match self.inventory.get_mut(slug) {
            Some(qty) if *qty > 0 => {
                *qty -= 1;
                Ok(())
            }
            _ => Err(Error::SpeciesUnavailable(slug.to_string())),
        }
    }

    /// Put one unit of a species back, creating the entry if needed
    pub fn restock(&mut self, slug: &str) {
        *self.inventory.entry(slug.to_string()).or_insert(0) += 1;
    }

    /// Buy one unit of a species with dew
    pub fn purchase(&mut self, species: &Species) -> Result<()> {
        if self.dew_balance < species.price {
            return Err(Error::InsufficientFunds {
                needed: species.price,
                available: self.dew_balance,
            });
        }
        self.dew_balance -= species.price;
        self.restock(&species.slug);
        Ok(())
    }

    /// Record a completed session's minutes and reward
    pub fn credit_session(&mut self, minutes: u32, dew: u64) {
        self.dew_balance += dew;
        self.total_focus_minutes += u64::from(minutes);
        self.total_sessions += 1;
    }

    /// Consume the next tile index, growing the grid when it fills up
    pub fn advance_tile(&mut self) {
        self.next_tile_index += 1;
        let needed_rows = self.next_tile_index.div_ceil(self.grid_columns.max(1));
        if needed_rows > self.grid_rows {
            tracing::info!(
                "Garden for {} grew from {} to {} rows",
                self.user_id,
                self.grid_rows,
                needed_rows
            );
            self.grid_rows = needed_rows;
        }
    }

    /// Grid capacity at the current size
    pub fn capacity(&self) -> u32 {
        self.grid_columns.saturating_mul(self.grid_rows)
    }
}
