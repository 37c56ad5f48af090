//! formpilot - AI-assisted form filling.
//!
//! `serve` runs the answer service; `fill` drives a headless browser
//! through one fill cycle against a stored profile; `detect` prints the
//! fields a page exposes; `profile` edits the stored profile and settings.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use formpilot::orchestrator;
use formpilot::server::{AnthropicGenerator, AppState, FillServer, ServerConfig};
use formpilot::store::ProfileStore;
use formpilot::{Browser, FillClient};

/// formpilot CLI.
#[derive(Parser)]
#[command(name = "formpilot")]
#[command(about = "AI-assisted form filling")]
#[command(version)]
struct Cli {
    /// Profile store path (defaults to the user config directory)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the answer service
    Serve {
        /// Server host
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Server port
        #[arg(long, default_value_t = 8080)]
        port: u16,

        /// Anthropic API key
        #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
        api_key: String,

        /// Model to use for answer generation
        #[arg(long)]
        model: Option<String>,

        /// Bearer secret callers must present; omit to disable the check
        #[arg(long, env = "FORMPILOT_SECRET", hide_env_values = true)]
        secret: Option<String>,
    },

    /// Fill the form on a page using the stored profile
    Fill {
        /// Page URL
        url: String,

        /// Answer service URL (overrides the stored setting)
        #[arg(long)]
        api_url: Option<String>,

        /// Run the browser with a visible window
        #[arg(long)]
        headed: bool,
    },

    /// Print the form fields detected on a page as JSON
    Detect {
        /// Page URL
        url: String,
    },

    /// Edit the stored profile and service settings
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Set a profile field
    Set { key: String, value: String },

    /// Append a writing sample
    Sample { text: String },

    /// Show the stored profile
    Show,

    /// Set the answer service URL and optional bearer key
    Service {
        api_url: String,
        #[arg(long)]
        api_key: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let store_path = match cli.store {
        Some(path) => path,
        None => ProfileStore::default_path()?,
    };

    match cli.command {
        Commands::Serve {
            host,
            port,
            api_key,
            model,
            secret,
        } => {
            let mut generator = AnthropicGenerator::new(api_key);
            if let Some(model) = model {
                generator = generator.model(model);
            }
            let state = Arc::new(AppState::new(Arc::new(generator), secret));
            let server = FillServer::new(ServerConfig { host, port }, state);
            server.run().await?;
        }

        Commands::Fill {
            url,
            api_url,
            headed,
        } => {
            let store = ProfileStore::load(&store_path)?;
            let api_url = api_url
                .or_else(|| {
                    (!store.settings.api_url.is_empty()).then(|| store.settings.api_url.clone())
                })
                .context("no answer service URL; set one with `profile service`")?;
            let client = FillClient::new(api_url, store.settings.api_key.clone());

            let browser = Browser::builder().headless(!headed).build().await?;
            let page = browser.new_page(&url).await?;
            page.wait_for_navigation().await?;

            let outcome = orchestrator::fill(&page, &client, &store.profile).await?;
            println!("{}", outcome.status_message());
        }

        Commands::Detect { url } => {
            let browser = Browser::builder().build().await?;
            let page = browser.new_page(&url).await?;
            page.wait_for_navigation().await?;

            let fields = page.detect_form_fields().await?;
            println!("{}", serde_json::to_string_pretty(&fields)?);
        }

        Commands::Profile { action } => match action {
            ProfileAction::Set { key, value } => {
                if key.is_empty() || value.is_empty() {
                    bail!("key and value must be non-empty");
                }
                let mut store = ProfileStore::load(&store_path)?;
                store.profile.set(key, value);
                store.save(&store_path)?;
                println!("Profile saved.");
            }
            ProfileAction::Sample { text } => {
                let mut store = ProfileStore::load(&store_path)?;
                store.profile.add_writing_sample(text);
                store.save(&store_path)?;
                println!("Writing sample saved.");
            }
            ProfileAction::Show => {
                let store = ProfileStore::load(&store_path)?;
                println!("{}", serde_json::to_string_pretty(&store.profile)?);
            }
            ProfileAction::Service { api_url, api_key } => {
                let mut store = ProfileStore::load(&store_path)?;
                store.settings.api_url = api_url;
                if api_key.is_some() {
                    store.settings.api_key = api_key;
                }
                store.save(&store_path)?;
                println!("Service settings saved.");
            }
        },
    }

    Ok(())
}
