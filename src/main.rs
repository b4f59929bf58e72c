//! Worker CLI for the clip suggestion engine.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use sermonclip::config::Settings;
use sermonclip::embedding::RemoteEmbedding;
use sermonclip::llm::ChatCompletionsScorer;
use sermonclip::storage::{Database, SermonStore};
use sermonclip::suggestion::{semantic::SemanticClassifier, SuggestDeps, SuggestOptions};
use sermonclip::worker::{run_with_retries, TaskOutcome};

#[derive(Parser)]
#[command(name = "sermonclip", about = "Clip suggestion worker for sermon recordings")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create or update the database schema.
    Migrate,
    /// Produce clip suggestions for one sermon.
    Suggest {
        sermon_id: i64,
        /// Override the configured LLM default.
        #[arg(long)]
        use_llm: Option<bool>,
        /// Method label recorded on the generated clips.
        #[arg(long)]
        llm_method: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env();

    let db = Database::new(&settings.database_path).await?;
    db.migrate().await?;

    match cli.command {
        Command::Migrate => {
            println!("database ready at {}", settings.database_path);
            Ok(())
        }
        Command::Suggest {
            sermon_id,
            use_llm,
            llm_method,
        } => {
            let deps = build_deps(db, settings).await;
            let options = SuggestOptions {
                use_llm,
                llm_method,
            };

            match run_with_retries(&deps, sermon_id, options).await {
                TaskOutcome::Done(report) => {
                    println!("{}", report.to_json());
                    Ok(())
                }
                TaskOutcome::Fatal { message } => anyhow::bail!(message),
                TaskOutcome::Retry { .. } => unreachable!("driver resolves retries"),
            }
        }
    }
}

async fn build_deps(db: Database, settings: Settings) -> SuggestDeps {
    let scorer = if settings.llm_configured() {
        match ChatCompletionsScorer::new(
            settings.llm_api_key.clone().unwrap_or_default(),
            settings.llm_base_url.clone().unwrap_or_default(),
            settings.llm_model.clone().unwrap_or_default(),
            settings.llm_timeout(),
        ) {
            Ok(scorer) => Some(Arc::new(scorer) as Arc<dyn sermonclip::llm::ClipScorer>),
            Err(error) => {
                warn!(%error, "LLM scorer unavailable");
                None
            }
        }
    } else {
        None
    };

    // Reference vectors are fetched once per process and shared read-only.
    let classifier = if settings.embedding_configured() {
        let provider = RemoteEmbedding::new(
            settings.embedding_base_url.clone().unwrap_or_default(),
            settings.embedding_api_key.clone(),
            settings.embedding_model.clone().unwrap_or_default(),
            settings.embedding_dimension,
        );
        match provider {
            Ok(provider) => match SemanticClassifier::from_provider(&provider).await {
                Ok(classifier) => Some(Arc::new(classifier)),
                Err(error) => {
                    warn!(%error, "semantic classifier unavailable");
                    None
                }
            },
            Err(error) => {
                warn!(%error, "embedding provider unavailable");
                None
            }
        }
    } else {
        None
    };

    SuggestDeps {
        store: SermonStore::new(db),
        settings,
        scorer,
        classifier,
    }
}
