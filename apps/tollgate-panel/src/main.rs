mod cli;
mod config;
mod error;
mod handlers;
mod routes;
mod services;
mod state;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tollgate_db::repositories::payment_repo::PaymentRepository;
use tollgate_db::services::admin_service::AdminService;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::PanelConfig;
use crate::services::session_service::SessionService;
use crate::services::stripe::StripeVerifier;
use crate::services::webhook_service::WebhookService;
use crate::state::AppState;

#[derive(Parser)]
#[command(name = "tollgate-panel")]
#[command(about = "Payment webhook receiver and admin panel", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web server (default)
    Serve,
    /// Print a bcrypt hash for the admin password
    HashPassword {
        password: String,
    },
    /// Administrative overrides
    Admin {
        #[command(subcommand)]
        subcommand: AdminCommands,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// List all known users
    ListUsers,
    /// Grant the guide to a user regardless of payment
    MarkPaid { user_id: i64 },
    /// Delete a user and release their session
    DeleteUser { user_id: i64 },
    /// Bind a paid session to a user
    Bind { user_id: i64, session_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        println!("Warning: failed to load .env file: {}", e);
    }

    let cli = Cli::parse();

    if let Some(Commands::HashPassword { password }) = &cli.command {
        return cli::hash_password(password);
    }

    let file_appender = tracing_appender::rolling::never(".", "panel.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tollgate_panel=debug,tollgate_db=info,tower_http=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stdout))
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    match cli.command {
        None | Some(Commands::Serve) => {
            let config = PanelConfig::load()?;
            let pool = tollgate_db::connect(&config.database_url).await?;
            run_server(pool, config).await?
        }
        Some(Commands::Admin { subcommand }) => {
            let database_url = PanelConfig::load_database_url()?;
            let admin = AdminService::new(tollgate_db::connect(&database_url).await?);
            match subcommand {
                AdminCommands::ListUsers => cli::list_users(&admin).await?,
                AdminCommands::MarkPaid { user_id } => cli::mark_paid(&admin, user_id).await?,
                AdminCommands::DeleteUser { user_id } => cli::delete_user(&admin, user_id).await?,
                AdminCommands::Bind { user_id, session_id } => cli::bind(&admin, user_id, &session_id).await?,
            }
        }
        Some(Commands::HashPassword { .. }) => {}
    }

    Ok(())
}

async fn run_server(pool: tollgate_db::sqlx::SqlitePool, config: PanelConfig) -> Result<()> {
    if config.admin_password_hash.is_empty() {
        tracing::warn!("admin_password_hash is not set; admin login is disabled");
    }

    let verifier = StripeVerifier::new(config.stripe_webhook_secret.clone(), config.webhook_tolerance_secs);
    let state = AppState {
        admin: AdminService::new(pool.clone()),
        webhook: Arc::new(WebhookService::new(PaymentRepository::new(pool), verifier)),
        sessions: SessionService::new(config.session_ttl_hours),
        config: Arc::new(config),
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.listen_port));
    info!("Admin panel mounted at {}", state.admin_path());
    let app = routes::build_router(state);

    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
