//! Apply or inspect the registry's embedded PostgreSQL migrations.
//!
//! Before touching the database the workflow transition tables are checked,
//! so a build with an inconsistent table never migrates a live schema.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result, eyre};
use correspondence_registry::config::RegistrySettings;
use correspondence_registry::domain::verify_workflow_tables;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// `registry-migrate` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "registry-migrate",
    about = "Manage the correspondence registry database schema",
    version
)]
struct CliArgs {
    /// Database connection URL. Falls back to `REGISTRY_DATABASE_URL`.
    #[arg(long = "database-url", value_name = "url", global = true)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
enum Command {
    /// Apply every pending migration (the default).
    Up,
    /// List migrations that have not been applied.
    Status,
    /// Check the workflow transition tables without connecting.
    Verify,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    run(CliArgs::parse())
}

fn run(args: CliArgs) -> Result<()> {
    verify_workflow_tables().wrap_err("workflow transition tables are inconsistent")?;
    let command = args.command.unwrap_or(Command::Up);
    if command == Command::Verify {
        info!("workflow transition tables verified");
        return Ok(());
    }

    let url = resolve_database_url(args.database_url)?;
    let mut conn =
        PgConnection::establish(&url).wrap_err("failed to connect to the registry database")?;

    match command {
        Command::Status => {
            let pending = conn
                .pending_migrations(MIGRATIONS)
                .map_err(|err| eyre!("failed to list pending migrations: {err}"))?;
            for migration in &pending {
                info!(migration = %migration.name(), "pending migration");
            }
            info!(count = pending.len(), "migration status checked");
        }
        Command::Up | Command::Verify => {
            let applied = conn
                .run_pending_migrations(MIGRATIONS)
                .map_err(|err| eyre!("failed to apply migrations: {err}"))?;
            for version in &applied {
                info!(%version, "migration applied");
            }
            info!(count = applied.len(), "registry schema up to date");
        }
    }
    Ok(())
}

fn resolve_database_url(flag: Option<String>) -> Result<String> {
    if let Some(url) = flag.filter(|url| !url.trim().is_empty()) {
        return Ok(url);
    }
    let settings = RegistrySettings::load_from_iter([OsString::from("registry-migrate")])
        .map_err(|err| eyre!("failed to load registry settings: {err}"))?;
    settings
        .database_url()
        .map(str::to_owned)
        .wrap_err("no database URL given")
}
