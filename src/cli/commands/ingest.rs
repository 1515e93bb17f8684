use anyhow::{Context, Result};

use crate::app::{ingestion_pipeline, open_store};
use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat, Secrets};
use crate::services::create_embedder;

/// Ingest the upload directory without starting the server.
///
/// Needs no completion key.
pub async fn handle_ingest(format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let secrets = Secrets::from_env(&config);
    let formatter = get_formatter(format);

    config.ensure_dirs()?;
    let store = open_store(&config, &secrets)
        .await
        .context("failed to open vector store")?;
    let embedder =
        create_embedder(&config.embedding, &secrets).context("failed to load embedding model")?;

    let pipeline = ingestion_pipeline(&config, embedder, store);
    let outcome = pipeline.run().await?;

    print!("{}", formatter.format_ingest(&outcome));
    Ok(())
}
