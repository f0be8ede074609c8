use clap::{Parser, Subcommand};
use color_eyre::eyre::{WrapErr, eyre};
use migration::{Migrator, MigratorTrait};
use oauth2_server::api::{build_router, start_webserver};
use oauth2_server::config::{AppConfig, load_config};
use oauth2_server::model::NewClient;
use oauth2_server::oauth2::OAuth2Server;
use oauth2_server::oauth2::appauth::{DemoState, seed_demo};
use oauth2_server::store::{DbStorage, Storage};
use sea_orm::Database;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(version, about = "OAuth2 authorization server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Manage registered clients
    #[command(subcommand)]
    Client(ClientCommand),
    /// Manage resource owners
    #[command(subcommand)]
    User(UserCommand),
}

#[derive(Subcommand)]
enum ClientCommand {
    /// Register a client and print its credentials
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        redirect_uri: String,
        #[arg(long)]
        owner: String,
        /// Generated when omitted
        #[arg(long)]
        id: Option<String>,
        /// Generated when omitted, ignored for public clients
        #[arg(long)]
        secret: Option<String>,
        /// Register a client without a secret
        #[arg(long)]
        public: bool,
    },
    /// Delete a client with all its codes and tokens
    Remove {
        #[arg(long)]
        id: String,
    },
    /// Replace a client's secret
    RotateSecret {
        #[arg(long)]
        id: String,
    },
}

#[derive(Subcommand)]
enum UserCommand {
    Create {
        #[arg(long)]
        username: String,
        #[arg(long, env = "OAUTH2_USER_PASSWORD")]
        password: String,
    },
}

fn initialize_tracing() {
    let default_directives = "oauth2_server=info,sea_orm=info,tower_http=info";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_level(true))
        .init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    initialize_tracing();

    let cli = Cli::parse();
    let config = Arc::new(load_config().wrap_err("Failed to load configuration")?);

    let db = Arc::new(
        Database::connect(&config.database_url)
            .await
            .wrap_err("Failed to connect to database")?,
    );
    if config.run_migrations {
        Migrator::up(db.as_ref(), None)
            .await
            .wrap_err("Failed to run migrations")?;
    }
    let storage = DbStorage::new(db.clone());

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, db, storage).await,
        Command::Client(command) => manage_client(&storage, command).await,
        Command::User(UserCommand::Create { username, password }) => {
            let id = storage.create_user(&username, &password).await?;
            println!("user_id: {id}");
            Ok(())
        }
    }
}

async fn serve(
    config: Arc<AppConfig>,
    db: Arc<sea_orm::DatabaseConnection>,
    storage: DbStorage,
) -> color_eyre::eyre::Result<()> {
    let demo = if config.demo.enabled {
        let state = DemoState::new(&config).wrap_err("Invalid api_url")?;
        seed_demo(&storage, &state)
            .await
            .wrap_err("Failed to seed demo client")?;
        tracing::info!(client_id = %state.config.client_id, "Demo client enabled at /app");
        Some(state)
    } else {
        None
    };

    tracing::info!(
        access_token_lifetime = config.oauth2.access_token_lifetime,
        refresh_tokens = config.oauth2.issue_refresh_tokens,
        "OAuth2 configuration"
    );
    let server = OAuth2Server::with_database(config.oauth2.clone(), db);
    start_webserver(build_router(server, demo), &config.listen_addr).await
}

async fn manage_client(storage: &DbStorage, command: ClientCommand) -> color_eyre::eyre::Result<()> {
    match command {
        ClientCommand::Create {
            name,
            redirect_uri,
            owner,
            id,
            secret,
            public,
        } => {
            let client = storage
                .create_client(NewClient {
                    id,
                    secret,
                    name,
                    redirect_uri,
                    owner_id: owner,
                    public,
                })
                .await?;
            println!("client_id: {}", client.id);
            if let Some(secret) = client.secret {
                println!("client_secret: {secret}");
            }
        }
        ClientCommand::Remove { id } => {
            storage
                .remove_client(&id)
                .await
                .map_err(|e| eyre!("Failed to remove client {id}: {e}"))?;
            println!("removed: {id}");
        }
        ClientCommand::RotateSecret { id } => {
            let client = storage.rotate_client_secret(&id).await?;
            if let Some(secret) = client.secret {
                println!("client_secret: {secret}");
            }
        }
    }
    Ok(())
}
