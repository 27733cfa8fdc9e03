#![forbid(unsafe_code)]

mod backup;
mod constants;
mod document;
mod error;
mod store;
mod sync;

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::Level as TraceLevel;
use tracing_subscriber::FmtSubscriber;

use backup::BackupManager;
use store::{Database, ProfileStore, SettingsStore};
use sync::{SyncEngine, SyncReport};

#[derive(Parser)]
#[command(
    name = "mcp-profiles",
    version,
    about = "Versioned profiles for MCP server configurations"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List profiles, newest first
    List,

    /// Create a profile, seeded from the file at its config path
    Create {
        name: String,
        /// Live configuration file this profile controls (defaults to the
        /// currently active one)
        #[arg(long)]
        config_path: Option<PathBuf>,
        /// Directory for pre-overwrite backups
        #[arg(long)]
        backup_path: Option<PathBuf>,
        /// Companion client executable
        #[arg(long)]
        client_path: Option<PathBuf>,
    },

    /// Print a profile's latest stored configuration
    Show {
        /// Profile id or name
        profile: String,
    },

    /// List a profile's configuration versions
    History {
        /// Profile id or name
        profile: String,
    },

    /// Make a profile's configuration the live one
    Switch {
        /// Profile id or name
        profile: String,
    },

    /// Clone a profile at its current configuration
    Remix {
        /// Source profile id or name
        source: String,
        new_name: String,
    },

    /// Delete a profile and its history
    Delete {
        /// Profile id or name
        profile: String,
    },

    /// Update a profile's paths
    Edit {
        /// Profile id or name
        profile: String,
        #[arg(long)]
        config_path: Option<PathBuf>,
        #[arg(long)]
        backup_path: Option<PathBuf>,
        #[arg(long)]
        client_path: Option<PathBuf>,
    },

    /// Validate configuration text and save it to the live file
    Save {
        /// Read from this file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,
        /// Write here instead of the active config path
        #[arg(long)]
        target: Option<PathBuf>,
        /// Also record the text in this profile's history (id or name)
        #[arg(long)]
        profile: Option<String>,
    },

    /// Print or partially update the active path settings
    Settings {
        #[arg(long)]
        config_path: Option<PathBuf>,
        #[arg(long)]
        backup_path: Option<PathBuf>,
        #[arg(long, conflicts_with = "clear_client")]
        client_path: Option<PathBuf>,
        /// Clear the stored client path
        #[arg(long)]
        clear_client: bool,
    },
}

fn main() -> Result<()> {
    // Parse log level from environment variable
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "warn".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "info" => TraceLevel::INFO,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    let db = Database::open(&constants::database_path())
        .context("Failed to open profile database")?;
    let profiles = ProfileStore::new(db.clone());
    let settings = SettingsStore::new(db);

    let default_config = constants::default_client_config_path();
    let default_backup = constants::default_backup_dir();
    settings.ensure_defaults(&default_config, &default_backup)?;
    profiles.bootstrap(&default_config, &default_backup)?;

    let engine = SyncEngine::new(
        profiles,
        settings,
        BackupManager::new(default_backup),
    );

    match cli.command {
        Command::List => {
            for profile in engine.store().list_profiles()? {
                let client = profile
                    .client_path
                    .as_ref()
                    .map(|p| format!("  client: {}", p.display()))
                    .unwrap_or_default();
                println!(
                    "{:>4}  {:<20}  {}{}",
                    profile.id,
                    profile.name,
                    profile.config_path.display(),
                    client
                );
            }
        }

        Command::Create {
            name,
            config_path,
            backup_path,
            client_path,
        } => {
            let pointer = engine.settings().get()?;
            let config_path = config_path.unwrap_or(pointer.config_path);
            let backup_path = backup_path.unwrap_or(pointer.backup_path);
            let id = engine.create_profile(
                &name,
                &config_path,
                &backup_path,
                client_path.as_deref(),
            )?;
            println!("Created profile {id} ({name})");
        }

        Command::Show { profile } => {
            let id = resolve_profile(&engine, &profile)?;
            match engine.store().get_latest_configuration(id)? {
                Some(text) => println!("{text}"),
                None => bail!("profile {id} has no stored configuration"),
            }
        }

        Command::History { profile } => {
            let id = resolve_profile(&engine, &profile)?;
            let snapshots = engine.store().list_configurations(id)?;
            if snapshots.is_empty() {
                println!("No configuration versions for profile {id}");
            }
            for snapshot in snapshots {
                println!(
                    "{:>6}  {}  {} bytes",
                    snapshot.id,
                    snapshot.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
                    snapshot.size_bytes
                );
            }
        }

        Command::Switch { profile } => {
            let id = resolve_profile(&engine, &profile)?;
            let report = engine.switch_to_profile(id)?;
            print_report(&report);
            println!(
                "Switched to profile {id}: {} server(s) live",
                report.document.servers.len()
            );
        }

        Command::Remix { source, new_name } => {
            let source_id = resolve_profile(&engine, &source)?;
            let id = engine.remix_profile(source_id, &new_name)?;
            println!("Remixed profile {source_id} into {id} ({new_name})");
        }

        Command::Delete { profile } => {
            let id = resolve_profile(&engine, &profile)?;
            engine.store().delete_profile(id)?;
            println!("Deleted profile {id}");
        }

        Command::Edit {
            profile,
            config_path,
            backup_path,
            client_path,
        } => {
            let id = resolve_profile(&engine, &profile)?;
            let current = engine
                .store()
                .get_profile(id)?
                .with_context(|| format!("profile {id} disappeared"))?;
            engine.store().update_profile_paths(
                id,
                &config_path.unwrap_or(current.config_path),
                &backup_path.unwrap_or(current.backup_path),
                client_path.or(current.client_path).as_deref(),
            )?;
            println!("Updated profile {id}");
        }

        Command::Save {
            file,
            target,
            profile,
        } => {
            let text = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("Failed to read configuration from stdin")?;
                    buf
                }
            };
            let target = match target {
                Some(path) => path,
                None => engine.settings().get()?.config_path,
            };
            let profile_id = profile
                .map(|p| resolve_profile(&engine, &p))
                .transpose()?;

            let report = engine.save_raw(&text, &target, profile_id)?;
            print_report(&report);
            println!("Saved configuration to {}", target.display());
        }

        Command::Settings {
            config_path,
            backup_path,
            client_path,
            clear_client,
        } => {
            let client_update = if clear_client {
                Some(None)
            } else {
                client_path.as_deref().map(Some)
            };
            let pointer = if config_path.is_none() && backup_path.is_none() && client_update.is_none()
            {
                engine.settings().get()?
            } else {
                engine.settings().update(
                    config_path.as_deref(),
                    backup_path.as_deref(),
                    client_update,
                )?
            };
            println!("config_path: {}", pointer.config_path.display());
            println!("backup_path: {}", pointer.backup_path.display());
            match pointer.client_path {
                Some(path) => println!("client_path: {}", path.display()),
                None => println!("client_path: (unset)"),
            }
        }
    }

    Ok(())
}

/// Accept a numeric id or a profile name.
fn resolve_profile(engine: &SyncEngine, reference: &str) -> Result<i64> {
    if let Ok(id) = reference.parse::<i64>() {
        if engine.store().get_profile(id)?.is_some() {
            return Ok(id);
        }
    }
    match engine.store().find_by_name(reference)? {
        Some(profile) => Ok(profile.id),
        None => bail!("no profile with id or name '{reference}'"),
    }
}

fn print_report(report: &SyncReport) {
    if let Some(backup) = &report.backup {
        println!("Backed up previous configuration to {}", backup.display());
    }
    if report.merged_from_live {
        println!("Stored configuration was empty; kept the live server map");
    }
    if let Some(warning) = &report.history_warning {
        eprintln!("warning: {warning}");
    }
}
