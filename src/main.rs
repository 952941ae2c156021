// Entry point for the Google Docs content source.
//
// **Architecture Overview:**
// - `core/` = Conversion pipeline (host- and transport-agnostic)
// - `infra/` = Implementations of core ports (Google APIs, JSON store)
//
// This file's job is to:
// 1. Load configuration and fail fast if it is unusable
// 2. Wire the Google clients and the store (dependency injection)
// 3. Run one sourcing pass and report the result

// Each module declaration points at a descriptive root file so we don't
// end up with identical-looking mod.rs files at every level.
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use crate::core::source::{SourceConfig, SourceService};
use crate::infra::google::{GoogleDocsClient, GoogleDriveClient, ServiceAccountAuth};
use crate::infra::store::JsonContentStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let config = load_config().context("Failed to load source configuration")?;
    config.validate()?;

    let auth = Arc::new(
        ServiceAccountAuth::from_env()
            .await
            .context("Failed to load Google service account credentials")?,
    );
    let drive = GoogleDriveClient::new(Arc::clone(&auth));
    let docs = GoogleDocsClient::new(auth);
    let store = JsonContentStore::new(&config.output_dir);

    let service = SourceService::new(drive, docs, store, config);
    let nodes = service.run().await?;

    tracing::info!(count = nodes.len(), "Content sourcing run complete");
    Ok(())
}

/// Read the optional JSON config file, then apply environment overrides.
fn load_config() -> anyhow::Result<SourceConfig> {
    let path = std::env::var("GOOGLE_DOCS_SOURCE_CONFIG")
        .unwrap_or_else(|_| "source-config.json".to_string());

    let mut config = if Path::new(&path).exists() {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {path}"))?;
        serde_json::from_str(&text).with_context(|| format!("Invalid config file {path}"))?
    } else {
        SourceConfig::default()
    };

    if let Ok(folders) = std::env::var("GOOGLE_DRIVE_FOLDER_IDS") {
        config.folder_ids = folders
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
    }

    Ok(config)
}
