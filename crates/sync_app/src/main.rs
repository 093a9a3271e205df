//! # sync_app
//!
//! Runs the sync engine against a REST backend.
//!
//! ## Commands
//!
//! - `run`: read JSON-encoded events from stdin, one per line, emit them into
//!   the coordinator, and print a collection snapshot to stdout after every
//!   outcome.
//! - `login`, `logout`, `user`: call the session endpoints and print the
//!   response envelope.
//!
//! Logs go to stderr; filter them with `RUST_LOG`.

mod intents;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use sync_engine::{Coordinator, SyncConfig};
use sync_net::config::{API_URL_ENV, COOKIE_ENV, DEFAULT_API_URL};
use sync_net::{ClientConfig, Envelope, RestClient};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sync-app", about = "Keep a local entity cache in sync with a REST backend")]
struct Args {
    /// Base URL of the REST API
    #[arg(long, env = API_URL_ENV, default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Cookie string the csrftoken is captured from (e.g. "csrftoken=abc; sessionid=xyz")
    #[arg(long, env = COOKIE_ENV)]
    cookie: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Drive the coordinator from JSON events on stdin
    Run {
        /// Collection kept in sync with the route
        #[arg(long, default_value = "issues")]
        collection: String,

        /// Route model that triggers a list refetch
        #[arg(long, default_value = "issue")]
        route_model: String,

        /// Quiet period before a field edit is patched, in milliseconds
        #[arg(long, default_value_t = 500)]
        debounce_ms: u64,

        /// How long to keep reporting outcomes after stdin closes, in milliseconds
        #[arg(long, default_value_t = 2000)]
        linger_ms: u64,
    },
    /// Log in and start a session
    Login {
        /// Username
        username: String,

        /// Password
        #[arg(long, env = "SYNC_PASSWORD")]
        password: String,
    },
    /// End the current session
    Logout,
    /// Show the current user
    User,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("sync_app=info".parse()?)
                .add_directive("sync_engine=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut client_config = ClientConfig::new(&args.api_url);
    if let Some(cookie) = &args.cookie {
        client_config = client_config.with_cookies(cookie);
    }
    let client = RestClient::new(&client_config)?;

    match args.command {
        Command::Run {
            collection,
            route_model,
            debounce_ms,
            linger_ms,
        } => {
            let config = SyncConfig::new(collection, route_model)
                .with_debounce(Duration::from_millis(debounce_ms));
            let coordinator = Coordinator::start(Arc::new(client), config)?;
            intents::run(&coordinator, Duration::from_millis(linger_ms)).await?;
            coordinator.shutdown();
        }
        Command::Login { username, password } => {
            print_envelope(&client.login(&username, &password).await)?;
        }
        Command::Logout => print_envelope(&client.logout().await)?,
        Command::User => print_envelope(&client.user().await)?,
    }

    info!("sync-app finished");
    Ok(())
}

fn print_envelope(envelope: &Envelope) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&envelope.to_json())?);
    if let Some(failure) = envelope.error() {
        bail!("request failed: {failure}");
    }
    Ok(())
}
