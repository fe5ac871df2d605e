//! Fluente CLI - browse generated language-learning content from the terminal
//!
//! Every subcommand goes through the same cached, coalesced content library
//! the app uses, so repeated runs are served from the on-disk cache.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use fluente_core::config::loader::load_config;
use fluente_core::{Config, ContentGenerator, TutorBackend};

mod commands;
mod sink;

#[derive(Parser)]
#[command(name = "fluente")]
#[command(version, about = "Generated language-learning content with a local cache", long_about = None)]
struct Cli {
    /// Configuration file path (TOML or JSON)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Use the offline mock backends instead of Ollama
    #[arg(long)]
    mock: bool,

    /// Print content as JSON
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the conjugation table of a verb
    Conjugate {
        /// Infinitive, e.g. "falar"
        verb: String,

        /// Verbs that follow in your list; the next ones are warmed
        #[arg(long, value_delimiter = ',')]
        then: Vec<String>,
    },

    /// Show example sentences for a conjugated form
    Examples {
        /// Infinitive
        verb: String,
        /// Conjugated form, e.g. "falo"
        form: String,

        /// Ask for new sentences instead of the cached ones
        #[arg(long)]
        more: bool,
    },

    /// Show vocabulary for a category
    Vocab {
        /// Category, e.g. "Food"
        category: String,

        /// Words you already know; bypasses the cache
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,
    },

    /// Show a scripted scene
    Scene {
        /// Broad domain, e.g. "travel"
        domain: String,
        /// Subtopic, e.g. "hotel"
        subtopic: String,
        /// Communicative function, e.g. "asking for help"
        function: String,
    },

    /// Pre-generate conjugations for a list of verbs
    Warm {
        /// Verbs to warm
        #[arg(required = true)]
        verbs: Vec<String>,
    },

    /// Chat with the tutor
    Chat,

    /// Show cache statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    setup_logging(cli.debug)?;

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };

    let (generator, tutor) = backends(&config, cli.mock)?;
    let ctx = commands::Context::new(config, generator, tutor, cli.json)?;

    match cli.command {
        Commands::Conjugate { verb, then } => commands::conjugate(&ctx, &verb, then).await?,
        Commands::Examples { verb, form, more } => commands::examples(&ctx, &verb, &form, more).await?,
        Commands::Vocab { category, exclude } => commands::vocabulary(&ctx, &category, exclude).await?,
        Commands::Scene {
            domain,
            subtopic,
            function,
        } => commands::scene(&ctx, &domain, &subtopic, &function).await?,
        Commands::Warm { verbs } => commands::warm(&ctx, verbs).await,
        Commands::Chat => commands::chat(&ctx).await?,
        Commands::Stats => commands::stats(&ctx),
    }

    ctx.library.quiesce().await;
    Ok(())
}

type Backends = (Arc<dyn ContentGenerator>, Arc<dyn TutorBackend>);

fn backends(config: &Config, mock: bool) -> Result<Backends> {
    if mock {
        tracing::info!("Using mock backends");
        let generator: Arc<dyn ContentGenerator> = Arc::new(fluente_core::MockGenerator::new());
        let tutor: Arc<dyn TutorBackend> = Arc::new(fluente_core::MockTutor::new());
        return Ok((generator, tutor));
    }
    ollama_backends(config)
}

#[cfg(feature = "ureq")]
fn ollama_backends(config: &Config) -> Result<Backends> {
    let client = Arc::new(fluente_core::OllamaClient::new(config.ollama.clone()));
    tracing::info!(model = %config.ollama.model, "Using Ollama backend");
    let generator: Arc<dyn ContentGenerator> = client.clone();
    let tutor: Arc<dyn TutorBackend> = client;
    Ok((generator, tutor))
}

#[cfg(not(feature = "ureq"))]
fn ollama_backends(_config: &Config) -> Result<Backends> {
    Err(eyre!("Built without the `ureq` feature; run with --mock"))
}

/// Setup tracing/logging
fn setup_logging(debug: bool) -> Result<()> {
    use tracing_subscriber::EnvFilter;

    let filter = if debug {
        EnvFilter::new("fluente_cli=debug,fluente_core=debug")
    } else {
        EnvFilter::new("fluente_cli=info,fluente_core=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| eyre!("Failed to initialize logging: {e}"))?;

    Ok(())
}
