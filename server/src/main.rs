//! clinic-admin server and maintenance commands.
//!
//! `clinic-admin serve` runs the HTTP API; the other subcommands prepare or repair the
//! database. Settings come from the environment (a `.env` file is loaded when present).

use anyhow::Context;
use axum::{extract::Request, ServiceExt};
use clap::{Parser, Subcommand};
use clinic_admin::auth::password::hash_password;
use clinic_admin::store::{NewUser, UserStore};
use clinic_admin::{apply_migrations, catalog, ensure_database_exists, AppState, MemoryStore, PgStore, Settings, Store};
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "clinic-admin")]
#[command(about = "Hospital administration REST backend")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Keep everything in process memory instead of PostgreSQL
        #[arg(long)]
        memory: bool,
    },
    /// Create the database if needed and apply the schema
    Migrate,
    /// Load the exam catalog from a JSON file
    SeedCatalog {
        #[arg(default_value = "data/exam_catalog.json")]
        file: PathBuf,
    },
    /// Fix mis-encoded characters in exam category and item names
    RepairCatalog,
    /// Create a user account
    CreateUser {
        username: String,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        email: Option<String>,
        /// Grant administrator rights
        #[arg(long)]
        staff: bool,
    },
}

async fn connect(settings: &Settings) -> anyhow::Result<PgStore> {
    ensure_database_exists(&settings.database_url).await?;
    let pool = PgPoolOptions::new()
        .max_connections(settings.db_max_connections)
        .connect(&settings.database_url)
        .await
        .context("connecting to DATABASE_URL")?;
    apply_migrations(&pool).await?;
    Ok(PgStore::new(pool))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

async fn serve(settings: Settings, memory: bool) -> anyhow::Result<()> {
    let store: Arc<dyn Store> = if memory {
        tracing::warn!("using the in-memory store; data is lost on exit");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(connect(&settings).await?)
    };
    let bind_addr = settings.bind_addr;
    let state = AppState::new(store, settings);
    let app = clinic_admin::service(state);

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("binding {}", bind_addr))?;
    tracing::info!("clinic-admin listening on http://{}", listener.local_addr()?);
    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("clinic_admin=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    match cli.command {
        Commands::Serve { memory } => serve(settings, memory).await?,
        Commands::Migrate => {
            connect(&settings).await?;
            println!("Schema is up to date.");
        }
        Commands::SeedCatalog { file } => {
            let raw = std::fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
            let entries = catalog::parse(&raw)?;
            let store = connect(&settings).await?;
            let counts = catalog::seed(&store, &entries).await?;
            println!("Loaded {} categories and {} exam items.", counts.categories, counts.items);
        }
        Commands::RepairCatalog => {
            let store = connect(&settings).await?;
            let counts = catalog::repair(&store).await?;
            println!("Repaired {} category names and {} item names.", counts.categories, counts.items);
        }
        Commands::CreateUser {
            username,
            password,
            email,
            staff,
        } => {
            let store = connect(&settings).await?;
            let password_hash = match password.as_deref().filter(|p| !p.is_empty()) {
                Some(p) => Some(hash_password(p)?),
                None => {
                    tracing::warn!(%username, "no password given; the account cannot log in");
                    None
                }
            };
            let user = NewUser {
                username,
                email: email.unwrap_or_default(),
                password_hash,
                is_staff: staff,
                is_active: true,
            };
            let record = store.create_user(&user, None, None).await?;
            println!("Created user {} (id {}).", record.user.username, record.user.id);
        }
    }
    Ok(())
}
