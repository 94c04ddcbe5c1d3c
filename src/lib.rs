//! KB Uploadr Library
//!
//! Routes knowledge-base documents into an S3 bucket by category, splitting
//! the tiered categories by detected language (Spanish or English).
//!
//! # Features
//!
//! - **Bulk sync**: uploads local category folders, skipping tier files whose
//!   name is already stored
//! - **Upload service**: hands out presigned PUT URLs for single files
//! - **Maintenance**: list and delete by prefix or key, behind confirmation
//! - **Storage seam**: [`s3::ObjectStore`] with an AWS SDK client and an
//!   in-memory store
//!
//! # Example
//!
//! ```no_run
//! use kb_uploadr::{config::Config, s3::S3Client, server::Server};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("kb-uploadr.yaml")?;
//!     let store = Arc::new(S3Client::new(&config.storage).await?);
//!     let server = Server::new(&config, store).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod extract;
pub mod language;
pub mod logging;
pub mod maintenance;
pub mod metrics;
pub mod router;
pub mod s3;
pub mod server;
pub mod sync;
pub mod upload;

// Re-export commonly used types
pub use config::Config;
pub use router::{Category, DestinationKey, LanguageLabel};
pub use server::Server;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
