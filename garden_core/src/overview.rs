//! Read-only garden overview.
//!
//! Combines the ledger, every plant and the catalog into one view for the
//! request layer. Nothing here writes to the store.

use crate::catalog::SpeciesCatalog;
use crate::engine::GardenEngine;
use crate::ledger::{position, TilePosition};
use crate::progression::is_unlocked;
use crate::store::GardenStore;
use crate::{
    ActiveSession, GardenLedger, Plant, PlantHealth, Rarity, Result, SpeciesCategory,
    UnlockRequirement,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Everything the client needs to draw a garden
#[derive(Clone, Debug, Serialize)]
pub struct GardenOverview {
    pub user_id: String,
    pub stats: GardenStats,
    pub plants: Vec<PlantView>,
    pub inventory: BTreeMap<String, u32>,
    pub active_session: Option<ActiveSession>,
    pub catalog: Vec<SpeciesView>,
}

/// Ledger aggregates
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct GardenStats {
    pub dew_balance: u64,
    pub total_focus_minutes: u64,
    pub total_sessions: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_session_date: Option<NaiveDate>,
    pub grid_columns: u32,
    pub grid_rows: u32,
    pub next_tile_index: u32,
}

/// A plant annotated with its species' display metadata
#[derive(Clone, Debug, Serialize)]
pub struct PlantView {
    pub tile_index: u32,
    pub position: TilePosition,
    pub species_slug: String,
    /// Falls back to the slug when the species left the catalog
    pub species_name: String,
    pub category: Option<SpeciesCategory>,
    pub rarity: Option<Rarity>,
    pub stage: u32,
    pub max_stage: u32,
    pub visual_key: String,
    pub health: PlantHealth,
    pub session_count: u32,
    pub total_minutes: u64,
    pub dew_earned: u64,
    pub planted_at: DateTime<Utc>,
    pub last_cared_at: DateTime<Utc>,
}

/// A catalog entry annotated for this gardener
#[derive(Clone, Debug, Serialize)]
pub struct SpeciesView {
    pub slug: String,
    pub name: String,
    pub category: SpeciesCategory,
    pub rarity: Rarity,
    pub price: u64,
    pub base_focus_minutes: u32,
    pub unlock: Option<UnlockRequirement>,
    pub unlocked: bool,
    pub owned: u32,
}

/// Assemble an overview from already-loaded state
pub fn build_overview<C: SpeciesCatalog + ?Sized>(
    ledger: &GardenLedger,
    plants: &[Plant],
    catalog: &C,
) -> GardenOverview {
    let plants = plants
        .iter()
        .map(|plant| {
            let species = catalog.species(&plant.species_slug);
            PlantView {
                tile_index: plant.tile_index,
                position: position(plant.tile_index, ledger.grid_columns),
                species_slug: plant.species_slug.clone(),
                species_name: species
                    .map(|s| s.name.clone())
                    .unwrap_or_else(|| plant.species_slug.clone()),
                category: species.map(|s| s.category.clone()),
                rarity: species.map(|s| s.rarity),
                stage: plant.stage,
                max_stage: species
                    .and_then(|s| s.stages.iter().map(|g| g.stage).max())
                    .unwrap_or(plant.stage),
                visual_key: plant.visual_key(),
                health: plant.health,
                session_count: plant.session_count(),
                total_minutes: plant.total_minutes,
                dew_earned: plant.dew_earned,
                planted_at: plant.planted_at,
                last_cared_at: plant.last_cared_at,
            }
        })
        .collect();

    let catalog = catalog
        .all_species()
        .into_iter()
        .map(|species| SpeciesView {
            slug: species.slug.clone(),
            name: species.name.clone(),
            category: species.category.clone(),
            rarity: species.rarity,
            price: species.price,
            base_focus_minutes: species.base_focus_minutes,
            unlock: species.unlock.clone(),
            unlocked: is_unlocked(species.unlock.as_ref(), ledger),
            owned: ledger.quantity_of(&species.slug),
        })
        .collect();

    GardenOverview {
        user_id: ledger.user_id.clone(),
        stats: GardenStats {
            dew_balance: ledger.dew_balance,
            total_focus_minutes: ledger.total_focus_minutes,
            total_sessions: ledger.total_sessions,
            current_streak: ledger.current_streak,
            longest_streak: ledger.longest_streak,
            last_session_date: ledger.last_session_date,
            grid_columns: ledger.grid_columns,
            grid_rows: ledger.grid_rows,
            next_tile_index: ledger.next_tile_index,
        },
        plants,
        inventory: ledger.inventory.clone(),
        active_session: ledger.active_session.clone(),
        catalog,
    }
}

impl<S: GardenStore, C: SpeciesCatalog> GardenEngine<S, C> {
    /// Current view of a user's garden
    ///
    /// A user with no stored garden sees the starter garden they would get,
    /// without it being created.
    pub fn overview(&self, user_id: &str) -> Result<GardenOverview> {
        let ledger = self.load_or_starter(user_id)?;
        let plants = self.store.list_plants(user_id)?;
        Ok(build_overview(&ledger, &plants, &self.catalog))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::{engine_with_clock, FixedClock};
    use crate::engine::StartRequest;
    use chrono::Duration;

    #[test]
    fn test_overview_of_new_user_is_starter_garden() {
        let engine = engine_with_clock(FixedClock::at(2026, 3, 2));
        let overview = engine.overview("ada").unwrap();

        assert_eq!(overview.stats.dew_balance, 0);
        assert_eq!(overview.inventory.get("pine-tree"), Some(&3));
        assert!(overview.plants.is_empty());
        assert!(overview.active_session.is_none());
        assert_eq!(overview.catalog.len(), 7);

        // Reading doesn't create the garden
        assert!(engine.store().load_ledger("ada").unwrap().is_none());
    }

    #[test]
    fn test_overview_of_new_user_logs_no_creation() {
        let engine = engine_with_clock(FixedClock::at(2026, 3, 2));

        let (overview, logged) = crate::logging::capture(|| engine.overview("ada"));
        assert!(overview.is_ok());
        assert!(!logged.contains("Creating garden"), "{}", logged);

        let (session, logged) = crate::logging::capture(|| {
            engine.start_session("ada", &StartRequest::new("pine-tree", "History", 25))
        });
        assert!(session.is_ok());
        assert!(logged.contains("Creating garden for ada"), "{}", logged);
    }

    #[test]
    fn test_overview_annotates_plants() {
        let clock = FixedClock::at(2026, 3, 2);
        let engine = engine_with_clock(clock.clone());

        for _ in 0..2 {
            let session = engine
                .start_session("ada", &StartRequest::new("pine-tree", "History", 25))
                .unwrap();
            clock.advance(Duration::minutes(30));
            engine.complete_session("ada", session.id, 30, 4).unwrap();
        }
        let active = engine
            .start_session("ada", &StartRequest::new("pine-tree", "History", 25))
            .unwrap();

        let overview = engine.overview("ada").unwrap();
        assert_eq!(overview.plants.len(), 2);
        assert_eq!(overview.stats.total_sessions, 2);
        assert_eq!(overview.stats.dew_balance, 12);
        assert_eq!(overview.inventory.get("pine-tree"), Some(&0));
        assert_eq!(overview.active_session.map(|s| s.id), Some(active.id));

        let second = &overview.plants[1];
        assert_eq!(second.tile_index, 1);
        assert_eq!(second.position, TilePosition { row: 0, col: 1 });
        assert_eq!(second.species_name, "Pine Tree");
        assert_eq!(second.rarity, Some(Rarity::Common));
        assert_eq!(second.visual_key, "pine-tree/stage-1");
        assert_eq!(second.max_stage, 4);
        assert_eq!(second.session_count, 1);
    }

    #[test]
    fn test_catalog_unlock_status() {
        let engine = engine_with_clock(FixedClock::at(2026, 3, 2));
        let mut ledger = GardenLedger::new("ada", &Default::default(), Utc::now());
        ledger.total_sessions = 5;
        engine.store().commit(&ledger, None).unwrap();

        let overview = engine.overview("ada").unwrap();
        let unlocked = |slug: &str| {
            overview
                .catalog
                .iter()
                .find(|s| s.slug == slug)
                .map(|s| s.unlocked)
                .unwrap()
        };
        assert!(unlocked("pine-tree"));
        assert!(unlocked("oak-tree"));
        assert!(!unlocked("lavender"));
        assert!(!unlocked("golden-bonsai"));
    }

    #[test]
    fn test_overview_survives_species_leaving_catalog() {
        let mut catalog = crate::catalog::build_default_catalog();
        let mut ledger = GardenLedger::new("ada", &Default::default(), Utc::now());
        ledger.grid_columns = 2;
        let plant = Plant::seed("ada", "moon-orchid", 3, Utc::now());

        catalog.species.remove("moon-orchid");
        let overview = build_overview(&ledger, &[plant], &catalog);
        let view = &overview.plants[0];
        assert_eq!(view.species_name, "moon-orchid");
        assert_eq!(view.category, None);
        assert_eq!(view.position, TilePosition { row: 1, col: 1 });
    }
}
