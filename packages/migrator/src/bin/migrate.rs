//! CLI for migrating observation media out of Google Drive.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use amplify_client::{GraphQLClient, StorageClient};
use drive_client::DriveClient;
use migrator::migration::{
    EngineOptions, FileStatus, MigrationEngine, ProgressTracker,
};
use migrator::sources::DriveSource;
use migrator::targets::{AmplifyApi, AmplifyStorage};
use migrator::Config;

#[derive(Parser)]
#[command(name = "migrate")]
#[command(about = "Migrate observation media from Google Drive to object storage")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify every filename in a folder without migrating anything
    Scan { folder_id: String },

    /// Migrate every pending file in a folder
    Migrate {
        folder_id: String,
        /// Walk the full pipeline without downloading, uploading, or
        /// creating records
        #[arg(long)]
        dry_run: bool,
        /// Skip files whose media record already exists
        #[arg(long)]
        skip_existing: bool,
    },

    /// Retry pending, failed, and partial files from a previous run
    Resume {
        folder_id: String,
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        skip_existing: bool,
    },

    /// Print per-status counts for a folder
    Status { folder_id: String },

    /// Export records with a given status to a JSON file
    Export {
        folder_id: String,
        /// Status to export (e.g. needs_review, orphan, failed)
        #[arg(long)]
        status: String,
        #[arg(long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,migrator=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    match cli.command {
        Commands::Scan { folder_id } => cmd_scan(&config, &folder_id).await,
        Commands::Migrate {
            folder_id,
            dry_run,
            skip_existing,
        } => cmd_migrate(&config, &folder_id, dry_run, skip_existing).await,
        Commands::Resume {
            folder_id,
            dry_run,
            skip_existing,
        } => cmd_resume(&config, &folder_id, dry_run, skip_existing).await,
        Commands::Status { folder_id } => cmd_status(&config, &folder_id).await,
        Commands::Export {
            folder_id,
            status,
            output,
        } => cmd_export(&config, &folder_id, &status, &output).await,
    }
}

fn build_engine(config: &Config) -> Arc<MigrationEngine> {
    let source = DriveSource::new(DriveClient::new(config.google_access_token.clone()));
    let api = AmplifyApi::new(GraphQLClient::new(
        config.api_endpoint.clone(),
        config.cognito_id_token.clone(),
    ));
    let storage = AmplifyStorage::new(StorageClient::new(
        config.storage_bucket.clone(),
        config.aws_region.clone(),
        config.cognito_id_token.clone(),
    ));
    let tracker = Arc::new(Mutex::new(ProgressTracker::new(&config.progress_dir)));

    let mut engine = MigrationEngine::new(
        Arc::new(source),
        Arc::new(storage),
        Arc::new(api),
        tracker,
        EngineOptions::from_config(config),
    );
    engine.set_progress_callback(|filename, status| {
        tracing::info!(filename, status = %status, "File processed");
    });
    Arc::new(engine)
}

async fn cmd_scan(config: &Config, folder_id: &str) -> Result<()> {
    let engine = build_engine(config);
    let report = engine.scan(folder_id).await?;
    println!("Scanned {} files:", report.total());
    println!("  single:   {}", report.single);
    println!("  multiple: {}", report.multiple);
    println!("  range:    {}", report.range);
    println!("  invalid:  {}", report.invalid);
    Ok(())
}

async fn cmd_migrate(
    config: &Config,
    folder_id: &str,
    dry_run: bool,
    skip_existing: bool,
) -> Result<()> {
    let engine = build_engine(config);
    engine
        .migrate(folder_id, dry_run, skip_existing)
        .await
        .context("Migration failed")?;
    print_summary(&engine).await;
    Ok(())
}

async fn cmd_resume(
    config: &Config,
    folder_id: &str,
    dry_run: bool,
    skip_existing: bool,
) -> Result<()> {
    let engine = build_engine(config);
    engine
        .resume(folder_id, dry_run, skip_existing)
        .await
        .context("Resume failed")?;
    print_summary(&engine).await;
    Ok(())
}

async fn cmd_status(config: &Config, folder_id: &str) -> Result<()> {
    let mut tracker = ProgressTracker::new(&config.progress_dir);
    if !tracker.load(folder_id)? {
        bail!("No progress file found for folder {folder_id}");
    }
    let summary = tracker.get_summary();
    println!("Folder {folder_id}: {} files tracked", tracker.files().len());
    println!("  pending:      {}", summary.pending);
    println!("  downloaded:   {}", summary.downloaded);
    println!("  uploaded:     {}", summary.uploaded);
    println!("  completed:    {}", summary.completed);
    println!("  failed:       {}", summary.failed);
    println!("  orphan:       {}", summary.orphan);
    println!("  needs_review: {}", summary.needs_review);
    println!("  partial:      {}", summary.partial);
    Ok(())
}

async fn cmd_export(
    config: &Config,
    folder_id: &str,
    status: &str,
    output: &PathBuf,
) -> Result<()> {
    let status = parse_status(status)?;
    let mut tracker = ProgressTracker::new(&config.progress_dir);
    if !tracker.load(folder_id)? {
        bail!("No progress file found for folder {folder_id}");
    }
    let count = tracker.export_to_json(status, output)?;
    println!("Exported {count} {status} records to {}", output.display());
    Ok(())
}

async fn print_summary(engine: &Arc<MigrationEngine>) {
    let summary = engine.get_summary().await;
    println!("Done. {} files total:", summary.total);
    println!("  completed:    {}", summary.counts.completed);
    println!("  failed:       {}", summary.counts.failed);
    println!("  orphan:       {}", summary.counts.orphan);
    println!("  needs_review: {}", summary.counts.needs_review);
    println!("  partial:      {}", summary.counts.partial);
}

fn parse_status(raw: &str) -> Result<FileStatus> {
    match raw {
        "pending" => Ok(FileStatus::Pending),
        "downloaded" => Ok(FileStatus::Downloaded),
        "uploaded" => Ok(FileStatus::Uploaded),
        "completed" => Ok(FileStatus::Completed),
        "failed" => Ok(FileStatus::Failed),
        "orphan" => Ok(FileStatus::Orphan),
        "needs_review" => Ok(FileStatus::NeedsReview),
        "partial" => Ok(FileStatus::Partial),
        other => bail!("Unknown status: {other}"),
    }
}
