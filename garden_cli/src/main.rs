use clap::{Parser, Subcommand};
use garden_core::overview::GardenOverview;
use garden_core::*;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "garden")]
#[command(about = "Focus garden: grow plants from study sessions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Use a specific config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Gardener the command acts for
    #[arg(long, global = true, default_value = "local")]
    user: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the garden (default)
    Overview {
        /// Print the overview as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start a focus session
    Start {
        /// Species to plant (e.g. pine-tree)
        #[arg(long)]
        species: String,

        /// What you're studying
        #[arg(long, default_value = "General")]
        subject: String,

        /// Planned session length in minutes
        #[arg(long, default_value_t = 25)]
        minutes: u32,

        /// Grow the plant on this tile instead of planting a new one
        #[arg(long)]
        water: Option<u32>,
    },

    /// Complete the active focus session
    Complete {
        /// Session id printed by `start`
        #[arg(long)]
        session: String,

        /// Minutes actually focused
        #[arg(long, default_value_t = 0)]
        minutes: u32,

        /// Self-rated focus quality (0-5)
        #[arg(long, default_value_t = 3)]
        quality: u8,
    },

    /// Abandon the active focus session
    Abort,

    /// Buy a species with dew
    Buy {
        /// Species slug
        species: String,
    },

    /// List plantable species
    Catalog,

    /// Export session history to CSV
    Export {
        /// Output CSV path
        #[arg(long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    garden_core::logging::init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| config.data.data_dir.clone());
    tracing::debug!("Using data dir {:?} for user {}", data_dir, cli.user);

    let catalog = load_catalog(&config)?;
    let store = FileStore::new(&data_dir, config.store.lock_timeout());
    let engine = GardenEngine::new(store, catalog, &config);
    let user = cli.user.as_str();

    match cli.command {
        Some(Commands::Overview { json }) => cmd_overview(&engine, user, json),
        Some(Commands::Start {
            species,
            subject,
            minutes,
            water,
        }) => {
            let mut request = StartRequest::new(species, subject, minutes);
            if let Some(tile) = water {
                request = request.watering(tile);
            }
            cmd_start(&engine, user, &request)
        }
        Some(Commands::Complete {
            session,
            minutes,
            quality,
        }) => cmd_complete(&engine, user, &session, minutes, quality),
        Some(Commands::Abort) => cmd_abort(&engine, user),
        Some(Commands::Buy { species }) => cmd_buy(&engine, user, &species),
        Some(Commands::Catalog) => cmd_catalog(&engine, user),
        Some(Commands::Export { out }) => cmd_export(&engine, user, &out),
        None => {
            // Default to "overview" command
            cmd_overview(&engine, user, false)
        }
    }
}

type Engine = GardenEngine<FileStore, Catalog>;

fn load_catalog(config: &Config) -> Result<Catalog> {
    let catalog = match &config.garden.catalog_path {
        Some(path) => Catalog::load_from(path)?,
        None => build_default_catalog(),
    };

    let errors = catalog.validate();
    if !errors.is_empty() {
        eprintln!("Catalog validation errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        return Err(Error::CatalogValidation("Invalid catalog".into()));
    }
    Ok(catalog)
}

fn cmd_start(engine: &Engine, user: &str, request: &StartRequest) -> Result<()> {
    let session = engine.start_session(user, request)?;

    println!("✓ Session started");
    println!("  Session: {}", session.id);
    println!("  Species: {}", session.species_slug);
    println!("  Subject: {}", session.subject);
    println!("  Target:  {} min", session.target_minutes);
    if session.waters_existing {
        println!("  Watering tile {}", session.tile_index);
    } else {
        println!("  Tile:    {}", session.tile_index);
    }
    Ok(())
}

fn cmd_complete(engine: &Engine, user: &str, session: &str, minutes: u32, quality: u8) -> Result<()> {
    // An unparseable id can't match the active session
    let session_id = uuid::Uuid::parse_str(session.trim()).map_err(|_| Error::SessionMismatch)?;
    let done = engine.complete_session(user, session_id, minutes, quality)?;

    println!("✓ Session complete!");
    println!("  +{} dew (balance {})", done.dew_earned, done.ledger.dew_balance);
    println!(
        "  Tile {}: {} at stage {}",
        done.plant.tile_index, done.plant.species_slug, done.plant.stage
    );
    println!(
        "  Streak: {} day(s) (best {})",
        done.ledger.current_streak, done.ledger.longest_streak
    );
    Ok(())
}

fn cmd_abort(engine: &Engine, user: &str) -> Result<()> {
    match engine.abort_session(user)? {
        Some(session) => println!("✓ Aborted session {}", session.id),
        None => println!("No active session."),
    }
    Ok(())
}

fn cmd_buy(engine: &Engine, user: &str, species: &str) -> Result<()> {
    let ledger = engine.purchase_species(user, species)?;
    println!("✓ Bought {}", species);
    println!("  Owned: {}", ledger.quantity_of(species));
    println!("  Dew left: {}", ledger.dew_balance);
    Ok(())
}

fn cmd_catalog(engine: &Engine, user: &str) -> Result<()> {
    let overview = engine.overview(user)?;
    for species in &overview.catalog {
        let lock = if species.unlocked { " " } else { "🔒" };
        println!(
            "{} {:<16} {:<10} {:>4} dew  owned {}",
            lock,
            species.slug,
            format!("{:?}", species.rarity).to_lowercase(),
            species.price,
            species.owned
        );
    }
    Ok(())
}

fn cmd_export(engine: &Engine, user: &str, out: &std::path::Path) -> Result<()> {
    let count = engine.export_history(user, out)?;
    println!("✓ Exported {} sessions", count);
    println!("  CSV: {}", out.display());
    Ok(())
}

fn cmd_overview(engine: &Engine, user: &str, json: bool) -> Result<()> {
    let overview = engine.overview(user)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&overview)?);
        return Ok(());
    }

    display_overview(&overview);
    Ok(())
}

fn display_overview(overview: &GardenOverview) {
    let stats = &overview.stats;

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  FOCUS GARDEN: {}", overview.user_id);
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  Dew:      {}", stats.dew_balance);
    println!(
        "  Focus:    {} min over {} sessions",
        stats.total_focus_minutes, stats.total_sessions
    );
    println!(
        "  Streak:   {} day(s) (best {})",
        stats.current_streak, stats.longest_streak
    );
    println!();

    if overview.plants.is_empty() {
        println!("  No plants yet. Start a session to plant one.");
    } else {
        for plant in &overview.plants {
            println!(
                "  [{},{}] tile {:>3}  {:<16} stage {}/{}  {} min",
                plant.position.row,
                plant.position.col,
                plant.tile_index,
                plant.species_name,
                plant.stage,
                plant.max_stage,
                plant.total_minutes
            );
        }
    }

    println!();
    println!("  Inventory:");
    for (slug, qty) in &overview.inventory {
        println!("    {} × {}", qty, slug);
    }

    if let Some(ref session) = overview.active_session {
        println!();
        println!(
            "  ⏱ In session {} ({} on tile {}, {} min target)",
            session.id, session.species_slug, session.tile_index, session.target_minutes
        );
    }

    println!();
}
