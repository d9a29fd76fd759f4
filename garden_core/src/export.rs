//! CSV export of a garden's session history.
//!
//! One row per completed session across all plants, ordered by tile and
//! then by completion time. The file is written atomically so a crashed
//! export never leaves a half-written CSV behind.

use crate::catalog::SpeciesCatalog;
use crate::engine::GardenEngine;
use crate::store::GardenStore;
use crate::{Error, Plant, Result};
use std::path::Path;
use tempfile::NamedTempFile;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow<'a> {
    tile_index: u32,
    species_slug: &'a str,
    started_at: String,
    completed_at: String,
    duration_minutes: u32,
    subject: &'a str,
    quality: u8,
    plant_stage: u32,
}

/// Write every session of the given plants to `csv_path`
///
/// Replaces any existing file. Returns the number of rows written.
pub fn export_history(plants: &[Plant], csv_path: &Path) -> Result<usize> {
    let dir = match csv_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let temp = NamedTempFile::new_in(dir)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(temp.as_file());

    let mut plants: Vec<&Plant> = plants.iter().collect();
    plants.sort_by_key(|p| p.tile_index);

    let mut count = 0;
    for plant in plants {
        let mut sessions: Vec<_> = plant.sessions.iter().collect();
        sessions.sort_by_key(|s| s.completed_at);
        for session in sessions {
            writer.serialize(CsvRow {
                tile_index: plant.tile_index,
                species_slug: &plant.species_slug,
                started_at: session.started_at.to_rfc3339(),
                completed_at: session.completed_at.to_rfc3339(),
                duration_minutes: session.duration_minutes,
                subject: &session.subject,
                quality: session.quality,
                plant_stage: plant.stage,
            })?;
            count += 1;
        }
    }

    // Flush and sync to disk before swapping the file in
    writer.flush()?;
    drop(writer);
    temp.as_file().sync_all()?;
    temp.persist(csv_path).map_err(|e| Error::Io(e.error))?;

    tracing::info!("Exported {} sessions to {:?}", count, csv_path);
    Ok(count)
}

impl<S: GardenStore, C: SpeciesCatalog> GardenEngine<S, C> {
    /// Export a user's full session history as CSV
    pub fn export_history(&self, user_id: &str, csv_path: &Path) -> Result<usize> {
        let plants = self.store.list_plants(user_id)?;
        export_history(&plants, csv_path)
    }
}
