use anyhow::Result;
use carrier_vet::auth::{create_store, AuthRecord, AuthStore};
use carrier_vet::config::Config;
use carrier_vet::sync::{BackgroundRelay, JsonFilePageStorage, SyncCoordinator, SyncMessage};
use carrier_vet::ui::{UiRoot, View};
use carrier_vet::vetting::{SubmitOutcome, VettingClient, VettingPanel};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Carrier vetting from the terminal.
#[derive(Parser, Debug)]
#[command(name = "carrier-vet", version, about)]
struct Cli {
    /// Path to config.toml (defaults to the platform config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show whether a session is stored.
    Status,
    /// Look up a carrier by DOT number.
    Vet {
        /// USDOT number.
        dot: String,
    },
    /// Print the login page URL.
    Login,
    /// Clear the stored session.
    Logout,
    /// Mirror a page-storage file into the auth store until Ctrl-C.
    Sync {
        /// JSON object file standing in for the page's local storage.
        #[arg(long)]
        page_storage: PathBuf,
        /// Override sync.poll_interval_ms.
        #[arg(long)]
        interval_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load(cli.config.as_deref())?;
    let store = create_store(&config.storage)?;

    match cli.command {
        Commands::Status => status(store.as_ref()).await,
        Commands::Vet { dot } => vet(&config, store, &dot).await,
        Commands::Login => {
            println!("Sign in at {}", config.login.url);
            Ok(())
        }
        Commands::Logout => {
            BackgroundRelay::new(store)
                .apply(&SyncMessage::logout())
                .await?;
            println!("Logged out.");
            Ok(())
        }
        Commands::Sync {
            page_storage,
            interval_ms,
        } => {
            if let Some(ms) = interval_ms {
                config.sync.poll_interval_ms = ms;
                config.validate()?;
            }
            sync(&config, store, page_storage).await
        }
    }
}

async fn status(store: &dyn AuthStore) -> Result<()> {
    let record = AuthRecord::load(store).await?;
    if record.is_logged_in() {
        println!(
            "Logged in as {}",
            record.email.as_deref().unwrap_or("(unknown email)")
        );
    } else {
        println!("Logged out.");
    }
    Ok(())
}

async fn vet(config: &Config, store: Arc<dyn AuthStore>, dot: &str) -> Result<()> {
    let client = Arc::new(VettingClient::new(config.api.clone())?);
    let mut panel = VettingPanel::new(client, store);
    panel.set_dot_input(dot);

    match panel.submit().await {
        SubmitOutcome::Loaded => {
            if let Some(report) = panel.carrier_data() {
                println!("{}", serde_json::to_string_pretty(&report.body)?);
            }
            Ok(())
        }
        SubmitOutcome::Alerted => {
            anyhow::bail!(panel.alert().unwrap_or("Vetting failed.").to_string())
        }
    }
}

async fn sync(config: &Config, store: Arc<dyn AuthStore>, page_storage: PathBuf) -> Result<()> {
    let client = Arc::new(VettingClient::new(config.api.clone())?);
    let page = Arc::new(JsonFilePageStorage::new(page_storage));

    let roots: Vec<UiRoot> = ["popup", "panel"]
        .into_iter()
        .map(|name| {
            UiRoot::mount(
                name,
                Arc::clone(&store),
                Arc::clone(&client),
                config.login.url.clone(),
            )
        })
        .collect();

    let printers: Vec<_> = roots
        .iter()
        .map(|root| {
            let name = root.name().to_string();
            let login_url = root.login_url().to_string();
            let mut states = root.gate().watch();
            tokio::spawn(async move {
                loop {
                    let view = View::from(*states.borrow_and_update());
                    match view {
                        View::Login => println!("[{name}] view: login (sign in at {login_url})"),
                        other => println!("[{name}] view: {other}"),
                    }
                    if states.changed().await.is_err() {
                        break;
                    }
                }
            })
        })
        .collect();

    let coordinator = SyncCoordinator::start(Arc::clone(&store), page, &config.sync);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    coordinator.stop().await;
    for root in roots {
        root.unmount().await;
    }
    for printer in printers {
        if let Err(e) = printer.await {
            tracing::warn!("View printer ended abnormally: {e}");
        }
    }
    Ok(())
}
