//! KB Uploadr - knowledge-base document uploader
//!
//! Bulk folder sync, presigned upload service and bucket maintenance.

use anyhow::Context;
use clap::{Parser, Subcommand};
use kb_uploadr::config::Config;
use kb_uploadr::extract::SampleLimits;
use kb_uploadr::maintenance::{AlwaysConfirm, Confirm, ConsolePrompt, Maintenance};
use kb_uploadr::s3::{ObjectStore, S3Client};
use kb_uploadr::server::Server;
use kb_uploadr::sync::SyncDriver;
use kb_uploadr::upload::push::PushClient;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// KB Uploadr - language-aware S3 uploads for knowledge-base documents
#[derive(Parser, Debug)]
#[command(name = "kb-uploadr")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "kb-uploadr.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload the configured category folders
    Sync,

    /// Run the presigned upload service
    Serve,

    /// List stored keys under a prefix
    List {
        #[arg(long)]
        prefix: String,
    },

    /// Delete everything under a prefix, or a single key
    Remove {
        #[arg(long)]
        prefix: Option<String>,

        #[arg(long)]
        key: Option<String>,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Upload files through a running upload service
    Push {
        /// Base URL of the upload service
        #[arg(long)]
        server: String,

        /// Category: personality, instructions, Tier1, Tier2
        #[arg(long = "type")]
        category: String,

        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    kb_uploadr::logging::init_subscriber(&args.log_level, args.json_logs)?;

    info!("Starting KB Uploadr v{}", kb_uploadr::VERSION);

    match args.command {
        Command::Push {
            server,
            category,
            files,
        } => {
            let report = PushClient::new(server).push_all(&files, &category).await;
            println!("{}", report);
            if !report.failed.is_empty() {
                anyhow::bail!("{} file(s) failed to upload", report.failed.len());
            }
        }
        Command::Sync => {
            let (config, store) = load(&args.config).await?;
            let driver = SyncDriver::new(
                &store,
                &config.sync,
                SampleLimits::from(&config.language),
            );
            let summary = driver.run().await?;
            println!("{}", summary);
        }
        Command::Serve => {
            let (config, store) = load(&args.config).await?;
            let store: Arc<dyn ObjectStore> = Arc::new(store);
            let server = Server::new(&config, store).await?;
            tokio::select! {
                result = server.run() => result?,
                _ = tokio::signal::ctrl_c() => info!("Shutting down server"),
            }
        }
        Command::List { prefix } => {
            let (_, store) = load(&args.config).await?;
            let keys = kb_uploadr::maintenance::list_by_prefix(&store, &prefix).await?;
            if keys.is_empty() {
                println!("No files found with prefix '{}'", prefix);
            }
            for key in keys {
                println!("{}", key);
            }
        }
        Command::Remove { prefix, key, yes } => {
            let (_, store) = load(&args.config).await?;
            let confirm: Box<dyn Confirm> = if yes {
                Box::new(AlwaysConfirm)
            } else {
                Box::new(ConsolePrompt)
            };
            let maintenance = Maintenance::new(&store, confirm.as_ref());
            let outcome = maintenance
                .remove(prefix.as_deref(), key.as_deref())
                .await?;
            println!("{}", outcome);
        }
    }

    Ok(())
}

/// Load configuration and connect the storage client. Either failing is fatal.
async fn load(path: &Path) -> anyhow::Result<(Config, S3Client)> {
    let config = Config::load(path)
        .with_context(|| format!("Failed to load configuration from {:?}", path))?;
    info!("Loaded configuration from {:?}", path);

    let store = S3Client::new(&config.storage)
        .await
        .context("Failed to initialize storage client")?;
    info!(
        bucket = %config.storage.bucket,
        region = %store.region(),
        "Storage client ready"
    );

    Ok((config, store))
}
