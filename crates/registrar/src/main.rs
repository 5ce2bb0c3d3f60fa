//! Registrar: command-line front end for the registration pipeline.
//!
//! ```text
//! registrar submit draft.json      # dry run against the sandbox ledger
//! registrar check draft.json       # validate and print the appendix plan
//! registrar show manifest          # print the stored draft
//! registrar discard tokenization   # delete the stored draft
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use registration_pipeline::{
    plan_appendices, validate_draft, AssetDraft, ContentAddressedUploader, DraftStore,
    FileDraftStore, PipelineConfig, PipelineKind, RegistrationPipeline, RegistrationPipelineApi,
    SandboxLedger,
};

/// Registrar: asset registration drafts and sandbox submissions
#[derive(Parser, Debug)]
#[command(name = "registrar", version)]
#[command(about = "Inspect, discard and dry-run asset registration drafts")]
struct Args {
    /// Draft directory (overrides RP_DRAFT_DIR)
    #[arg(long, global = true)]
    draft_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a draft through the pipeline against the sandbox ledger
    Submit {
        /// Draft JSON file
        draft: PathBuf,
    },
    /// Validate a draft and print the planned appendices
    Check {
        /// Draft JSON file
        draft: PathBuf,
    },
    /// Print the stored draft of a pipeline kind
    Show {
        /// `tokenization` or `manifest`
        kind: PipelineKind,
    },
    /// Delete the stored draft of a pipeline kind
    Discard {
        /// `tokenization` or `manifest`
        kind: PipelineKind,
    },
}

fn read_draft(path: &PathBuf) -> Result<AssetDraft> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parsing draft {}", path.display()))
}

async fn submit(config: PipelineConfig, path: &PathBuf) -> Result<()> {
    let draft = read_draft(path)?;
    let store = Arc::new(FileDraftStore::new(&config.draft_dir));
    let pipeline = RegistrationPipeline::new(
        config,
        Arc::new(SandboxLedger::new()),
        Arc::new(ContentAddressedUploader::new()),
        store,
    );

    let cancel = pipeline.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, cancelling");
            cancel.cancel();
        }
    });

    let result = pipeline.submit(draft).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    if let Some(error) = result.error {
        bail!("{}", error);
    }
    Ok(())
}

fn check(path: &PathBuf) -> Result<()> {
    let draft = read_draft(path)?;
    let validated = validate_draft(&draft)?;
    println!("{} registration for '{}' is valid", validated.kind(), validated.natural_key());

    let plan = plan_appendices(&draft).map_err(|issues| {
        let joined: Vec<_> = issues.iter().map(ToString::to_string).collect();
        anyhow::anyhow!("appendix fields invalid: {}", joined.join("; "))
    })?;
    for key in plan.keys() {
        println!("  attach  {}", key);
    }
    for skipped in &plan.skipped {
        println!("  skip    {} ({:?})", skipped.key, skipped.reason);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let mut config = PipelineConfig::from_env();
    if let Some(dir) = args.draft_dir {
        config.draft_dir = dir;
    }

    match args.command {
        Command::Submit { draft } => submit(config, &draft).await,
        Command::Check { draft } => check(&draft),
        Command::Show { kind } => {
            let store = FileDraftStore::new(&config.draft_dir);
            match store.load(kind) {
                Some(draft) => println!("{}", serde_json::to_string_pretty(&draft)?),
                None => println!("No {} draft in {}", kind, config.draft_dir.display()),
            }
            Ok(())
        }
        Command::Discard { kind } => {
            let store = FileDraftStore::new(&config.draft_dir);
            store
                .clear(kind)
                .with_context(|| format!("discarding {} draft", kind))?;
            println!("Discarded {} draft", kind);
            Ok(())
        }
    }
}
