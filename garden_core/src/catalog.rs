//! Species catalog: the read-only reference data the engine plants from.
//!
//! A built-in catalog ships with the crate; deployments can supply their own
//! as a TOML file of `[[species]]` tables.

use crate::types::*;
use crate::{Error, Result};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Read access to species definitions keyed by slug
pub trait SpeciesCatalog: Send + Sync {
    fn species(&self, slug: &str) -> Option<&Species>;

    /// All species, sorted by price then slug
    fn all_species(&self) -> Vec<&Species>;
}

/// In-memory catalog of species definitions
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    pub species: HashMap<String, Species>,
}

impl SpeciesCatalog for Catalog {
    fn species(&self, slug: &str) -> Option<&Species> {
        self.species.get(slug)
    }

    fn all_species(&self) -> Vec<&Species> {
        let mut all: Vec<_> = self.species.values().collect();
        all.sort_by(|a, b| a.price.cmp(&b.price).then_with(|| a.slug.cmp(&b.slug)));
        all
    }
}

/// Cached default catalog - built once and reused across all operations
static DEFAULT_CATALOG: Lazy<Catalog> = Lazy::new(build_default_catalog);

/// Get a reference to the cached default catalog
pub fn get_default_catalog() -> &'static Catalog {
    &DEFAULT_CATALOG
}

fn stages(thresholds: &[(u32, u32)]) -> Vec<GrowthStage> {
    thresholds
        .iter()
        .enumerate()
        .map(|(i, &(min_sessions, min_total_minutes))| GrowthStage {
            stage: i as u32 + 1,
            min_sessions,
            min_total_minutes,
        })
        .collect()
}

/// Builds the default catalog with the built-in species
///
/// **Note**: For production use, prefer `get_default_catalog()` which returns a
/// cached reference.
pub fn build_default_catalog() -> Catalog {
    let species = vec![
        Species {
            slug: "pine-tree".into(),
            name: "Pine Tree".into(),
            category: SpeciesCategory::Tree,
            base_focus_minutes: 25,
            price: 10,
            rarity: Rarity::Common,
            stages: stages(&[(1, 20), (2, 50), (4, 120), (8, 300)]),
            unlock: None,
        },
        Species {
            slug: "sunflower".into(),
            name: "Sunflower".into(),
            category: SpeciesCategory::Flower,
            base_focus_minutes: 15,
            price: 15,
            rarity: Rarity::Common,
            stages: stages(&[(1, 10), (2, 30), (3, 60)]),
            unlock: None,
        },
        Species {
            slug: "barrel-cactus".into(),
            name: "Barrel Cactus".into(),
            category: SpeciesCategory::Succulent,
            base_focus_minutes: 20,
            price: 30,
            rarity: Rarity::Uncommon,
            stages: stages(&[(1, 15), (3, 60), (6, 180)]),
            unlock: None,
        },
        Species {
            slug: "oak-tree".into(),
            name: "Oak Tree".into(),
            category: SpeciesCategory::Tree,
            base_focus_minutes: 45,
            price: 60,
            rarity: Rarity::Uncommon,
            stages: stages(&[(1, 30), (3, 120), (6, 300), (12, 720)]),
            unlock: Some(UnlockRequirement::TotalSessions { sessions: 5 }),
        },
        Species {
            slug: "lavender".into(),
            name: "Lavender".into(),
            category: SpeciesCategory::Shrub,
            base_focus_minutes: 30,
            price: 90,
            rarity: Rarity::Rare,
            stages: stages(&[(1, 25), (3, 90), (5, 200)]),
            unlock: Some(UnlockRequirement::LongestStreak { days: 3 }),
        },
        Species {
            slug: "cherry-blossom".into(),
            name: "Cherry Blossom".into(),
            category: SpeciesCategory::Tree,
            base_focus_minutes: 50,
            price: 250,
            rarity: Rarity::Epic,
            stages: stages(&[(1, 40), (4, 180), (8, 480), (16, 1200)]),
            unlock: Some(UnlockRequirement::TotalMinutes { minutes: 600 }),
        },
        Species {
            slug: "golden-bonsai".into(),
            name: "Golden Bonsai".into(),
            category: SpeciesCategory::Tree,
            base_focus_minutes: 60,
            price: 500,
            rarity: Rarity::Legendary,
            stages: stages(&[(1, 50), (5, 300), (10, 900), (20, 2400), (40, 6000)]),
            unlock: Some(UnlockRequirement::LongestStreak { days: 7 }),
        },
    ];

    Catalog {
        species: species.into_iter().map(|s| (s.slug.clone(), s)).collect(),
    }
}

/// Catalog file format
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    species: Vec<Species>,
}

impl Catalog {
    /// Load a catalog from a TOML file and validate it
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let file: CatalogFile = toml::from_str(&contents)?;

        let mut species = HashMap::new();
        for s in file.species {
            if species.contains_key(&s.slug) {
                return Err(Error::CatalogValidation(format!(
                    "Duplicate species slug '{}'",
                    s.slug
                )));
            }
            species.insert(s.slug.clone(), s);
        }

        let catalog = Catalog { species };
        let errors = catalog.validate();
        if !errors.is_empty() {
            return Err(Error::CatalogValidation(errors.join("; ")));
        }

        tracing::info!("Loaded {} species from {:?}", catalog.species.len(), path);
        Ok(catalog)
    }

    /// Validate the catalog for consistency and completeness
    ///
    /// Returns a list of validation errors, or empty Vec if valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.species.is_empty() {
            errors.push("Catalog has no species".to_string());
        }

        for (slug, species) in &self.species {
            if slug.is_empty() || species.slug.is_empty() {
                errors.push("Species has empty slug".to_string());
            }
            if slug != &species.slug {
                errors.push(format!(
                    "Species key '{}' doesn't match species.slug '{}'",
                    slug, species.slug
                ));
            }
            if species.name.is_empty() {
                errors.push(format!("Species '{}' has empty name", slug));
            }
            if species.stages.is_empty() {
                errors.push(format!("Species '{}' has no growth stages", slug));
            }

            for pair in species.stages.windows(2) {
                let (prev, next) = (&pair[0], &pair[1]);
                if next.stage <= prev.stage {
                    errors.push(format!(
                        "Species '{}': stage {} listed after stage {}",
                        slug, next.stage, prev.stage
                    ));
                }
                if next.min_sessions <= prev.min_sessions {
                    errors.push(format!(
                        "Species '{}': stage {} min_sessions {} doesn't exceed stage {} ({})",
                        slug, next.stage, next.min_sessions, prev.stage, prev.min_sessions
                    ));
                }
                if next.min_total_minutes <= prev.min_total_minutes {
                    errors.push(format!(
                        "Species '{}': stage {} min_total_minutes {} doesn't exceed stage {} ({})",
                        slug, next.stage, next.min_total_minutes, prev.stage, prev.min_total_minutes
                    ));
                }
            }
        }

        errors
    }
}
