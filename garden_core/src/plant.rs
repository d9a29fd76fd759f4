//! Planted tiles and the session history that grows them.

use crate::progression::{self, FLOOR_STAGE};
use crate::{Plant, PlantHealth, SessionRecord, Species};
use chrono::{DateTime, Utc};

impl Plant {
    /// A seedling at the given tile, before any session is credited
    pub fn seed(user_id: &str, species_slug: &str, tile_index: u32, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            species_slug: species_slug.to_string(),
            tile_index,
            planted_at: now,
            stage: FLOOR_STAGE,
            sessions: Vec::new(),
            total_minutes: 0,
            dew_earned: 0,
            health: PlantHealth::Healthy,
            last_cared_at: now,
        }
    }

    pub fn session_count(&self) -> u32 {
        self.sessions.len() as u32
    }

    /// Credit a completed session and regrow against the species thresholds
    ///
    /// Returns the stage before the session so callers can report growth.
    pub fn record_session(&mut self, species: &Species, record: SessionRecord, dew: u64) -> u32 {
        let previous_stage = self.stage;
        let cared_at = record.completed_at;

        self.total_minutes += u64::from(record.duration_minutes);
        self.sessions.push(record);
        self.dew_earned += dew;
        self.health = PlantHealth::Healthy;
        self.last_cared_at = cared_at;
        self.stage = progression::advance_stage(
            self.stage,
            &species.stages,
            self.session_count(),
            self.total_minutes,
        );

        if self.stage > previous_stage {
            tracing::info!(
                "Plant at tile {} grew from stage {} to {}",
                self.tile_index,
                previous_stage,
                self.stage
            );
        }
        previous_stage
    }

    /// Asset key the client uses to draw this plant
    pub fn visual_key(&self) -> String {
        format!("{}/stage-{}", self.species_slug, self.stage)
    }
}
