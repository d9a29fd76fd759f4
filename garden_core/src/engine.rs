//! Session lifecycle engine.
//!
//! Drives a user's garden between two durable states:
//! - **Idle**: no active session on the ledger
//! - **InSession**: exactly one active session, holding a reserved species
//!   unit and tile
//!
//! Every mutating operation is one read-modify-write of the user's garden,
//! committed with the ledger's version token and retried from a fresh read
//! when another writer got there first.

use crate::catalog::SpeciesCatalog;
use crate::config::{Config, GardenConfig};
use crate::progression::{credited_minutes, dew_for_minutes, update_streak};
use crate::store::GardenStore;
use crate::{
    ActiveSession, CompletedSession, Error, GardenLedger, Plant, Result, SessionRecord,
};
use chrono::{DateTime, Local, NaiveDate, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Highest quality score a session can be rated
pub const MAX_QUALITY: u8 = 5;

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Calendar day used for streaks (server local date)
    fn today(&self) -> NaiveDate {
        self.now().with_timezone(&Local).date_naive()
    }
}

/// Wall-clock time
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Parameters for starting a focus session
#[derive(Clone, Debug)]
pub struct StartRequest {
    pub species_slug: String,
    pub subject: String,
    pub target_minutes: u32,
    /// Grow the plant already on this tile instead of planting a new one
    pub water_tile: Option<u32>,
}

impl StartRequest {
    pub fn new(species_slug: impl Into<String>, subject: impl Into<String>, target_minutes: u32) -> Self {
        Self {
            species_slug: species_slug.into(),
            subject: subject.into(),
            target_minutes,
            water_tile: None,
        }
    }

    pub fn watering(mut self, tile_index: u32) -> Self {
        self.water_tile = Some(tile_index);
        self
    }
}

/// The focus garden engine for all users of one store
pub struct GardenEngine<S, C> {
    pub(crate) store: S,
    pub(crate) catalog: C,
    pub(crate) garden: GardenConfig,
    pub(crate) clock: Arc<dyn Clock>,
    max_retries: u32,
}

impl<S: GardenStore, C: SpeciesCatalog> GardenEngine<S, C> {
    pub fn new(store: S, catalog: C, config: &Config) -> Self {
        Self {
            store,
            catalog,
            garden: config.garden.clone(),
            clock: Arc::new(SystemClock),
            max_retries: config.store.max_retries,
        }
    }

    /// Replace the clock (tests, replays)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Begin a focus session, reserving a species unit and a tile
    pub fn start_session(&self, user_id: &str, request: &StartRequest) -> Result<ActiveSession> {
        if request.target_minutes == 0 {
            return Err(Error::InvalidRequest(
                "target minutes must be greater than zero".into(),
            ));
        }

        self.with_retry("start", user_id, || {
            let now = self.clock.now();
            let mut ledger = self.load_or_create(user_id, now)?;

            if ledger.is_in_session() {
                return Err(Error::AlreadyInSession);
            }
            if self.catalog.species(&request.species_slug).is_none() {
                return Err(Error::SpeciesUnavailable(request.species_slug.clone()));
            }

            let (tile_index, waters_existing) = match request.water_tile {
                Some(tile) => {
                    let plant = self.store.load_plant(user_id, tile)?.ok_or_else(|| {
                        Error::InvalidRequest(format!("no plant on tile {}", tile))
                    })?;
                    if plant.species_slug != request.species_slug {
                        return Err(Error::SpeciesUnavailable(request.species_slug.clone()));
                    }
                    (tile, true)
                }
                None => {
                    ledger.reserve(&request.species_slug)?;
                    (ledger.next_tile_index, false)
                }
            };

            let session = ActiveSession {
                id: Uuid::new_v4(),
                species_slug: request.species_slug.clone(),
                subject: request.subject.clone(),
                target_minutes: request.target_minutes,
                started_at: now,
                tile_index,
                waters_existing,
            };
            ledger.active_session = Some(session.clone());
            ledger.updated_at = now;
            self.store.commit(&ledger, None)?;

            tracing::info!(
                "Started session {} for {}: {} on tile {} ({} min)",
                session.id,
                user_id,
                session.species_slug,
                session.tile_index,
                session.target_minutes
            );
            Ok(session)
        })
    }

    /// Finish the active session, growing its plant and paying out dew
    pub fn complete_session(
        &self,
        user_id: &str,
        session_id: Uuid,
        actual_minutes: u32,
        quality: u8,
    ) -> Result<CompletedSession> {
        if quality > MAX_QUALITY {
            return Err(Error::InvalidRequest(format!(
                "quality must be between 0 and {}",
                MAX_QUALITY
            )));
        }

        self.with_retry("complete", user_id, || {
            let now = self.clock.now();
            let mut ledger = self
                .store
                .load_ledger(user_id)?
                .ok_or(Error::SessionMismatch)?;

            let active = match &ledger.active_session {
                Some(active) if active.id == session_id => active.clone(),
                _ => return Err(Error::SessionMismatch),
            };
            let species = self
                .catalog
                .species(&active.species_slug)
                .ok_or_else(|| Error::UnknownSpecies(active.species_slug.clone()))?;

            let duration = credited_minutes(actual_minutes, active.target_minutes);
            let dew = dew_for_minutes(duration);

            let mut plant = match self.store.load_plant(user_id, active.tile_index)? {
                Some(plant) => plant,
                None => Plant::seed(user_id, &active.species_slug, active.tile_index, now),
            };
            plant.record_session(
                species,
                SessionRecord {
                    started_at: active.started_at,
                    completed_at: now,
                    duration_minutes: duration,
                    subject: active.subject.clone(),
                    quality,
                },
                dew,
            );

            ledger.credit_session(duration, dew);
            if !active.waters_existing {
                ledger.advance_tile();
            }
            update_streak(&mut ledger, self.clock.today());
            ledger.active_session = None;
            ledger.updated_at = now;
            ledger.version = self.store.commit(&ledger, Some(&plant))?;

            tracing::info!(
                "Completed session {} for {}: {} min, +{} dew, tile {} at stage {}",
                session_id,
                user_id,
                duration,
                dew,
                plant.tile_index,
                plant.stage
            );
            Ok(CompletedSession {
                plant,
                ledger,
                dew_earned: dew,
            })
        })
    }

    /// Abandon the active session, returning its reserved unit
    ///
    /// Succeeds without changes when no session is active. Returns the
    /// aborted session, if there was one.
    pub fn abort_session(&self, user_id: &str) -> Result<Option<ActiveSession>> {
        self.with_retry("abort", user_id, || {
            let Some(mut ledger) = self.store.load_ledger(user_id)? else {
                return Ok(None);
            };
            let Some(active) = ledger.active_session.take() else {
                tracing::debug!("Abort for {} with no active session", user_id);
                return Ok(None);
            };

            if !active.waters_existing {
                ledger.restock(&active.species_slug);
            }
            ledger.updated_at = self.clock.now();
            self.store.commit(&ledger, None)?;

            tracing::info!("Aborted session {} for {}", active.id, user_id);
            Ok(Some(active))
        })
    }

    /// Spend dew on one unit of a species
    pub fn purchase_species(&self, user_id: &str, species_slug: &str) -> Result<GardenLedger> {
        let species = self
            .catalog
            .species(species_slug)
            .ok_or_else(|| Error::UnknownSpecies(species_slug.to_string()))?;

        self.with_retry("purchase", user_id, || {
            let now = self.clock.now();
            let mut ledger = self.load_or_create(user_id, now)?;
            ledger.purchase(species)?;
            ledger.updated_at = now;
            ledger.version = self.store.commit(&ledger, None)?;

            tracing::info!(
                "{} bought {} for {} dew ({} left)",
                user_id,
                species_slug,
                species.price,
                ledger.dew_balance
            );
            Ok(ledger)
        })
    }

    /// Stored ledger, or a fresh starter ledger the caller is about to commit
    fn load_or_create(&self, user_id: &str, now: DateTime<Utc>) -> Result<GardenLedger> {
        match self.store.load_ledger(user_id)? {
            Some(ledger) => Ok(ledger),
            None => {
                tracing::info!("Creating garden for {}", user_id);
                Ok(GardenLedger::new(user_id, &self.garden, now))
            }
        }
    }

    /// Stored ledger, or the starter ledger a new user would get
    pub(crate) fn load_or_starter(&self, user_id: &str) -> Result<GardenLedger> {
        Ok(self
            .store
            .load_ledger(user_id)?
            .unwrap_or_else(|| GardenLedger::new(user_id, &self.garden, self.clock.now())))
    }

    /// Re-run an operation from a fresh read after losing a version race
    fn with_retry<T>(&self, op: &str, user_id: &str, mut attempt: impl FnMut() -> Result<T>) -> Result<T> {
        let mut retries = 0;
        loop {
            match attempt() {
                Err(Error::ConcurrentModification) if retries < self.max_retries => {
                    retries += 1;
                    tracing::debug!(
                        "{} for {} lost a write race, retry {}/{}",
                        op,
                        user_id,
                        retries,
                        self.max_retries
                    );
                }
                Err(Error::ConcurrentModification) => {
                    tracing::warn!(
                        "{} for {} gave up after {} retries",
                        op,
                        user_id,
                        retries
                    );
                    return Err(Error::ConcurrentModification);
                }
                other => return other,
            }
        }
    }
}
