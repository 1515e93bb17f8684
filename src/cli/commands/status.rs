use anyhow::Result;

use crate::app::open_store;
use crate::cli::output::{StatusInfo, get_formatter};
use crate::models::{Config, OutputFormat, Secrets, VectorDriver};
use crate::sources::LocalSource;

pub async fn handle_status(format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let secrets = Secrets::from_env(&config);
    let formatter = get_formatter(format);

    let upload_files = LocalSource::new(
        config.storage.upload_dir.clone(),
        &config.storage.extensions,
    )
    .collect_files()
    .map(|files| files.len())
    .unwrap_or(0);

    let (vector_store_connected, documents, chunks) = match open_store(&config, &secrets).await {
        Ok(store) => {
            let connected = store.health_check().await.unwrap_or(false);
            if connected {
                (
                    true,
                    store.document_count().await.unwrap_or(0),
                    store.chunk_count().await.unwrap_or(0),
                )
            } else {
                (false, 0, 0)
            }
        }
        Err(e) => {
            tracing::debug!(error = %e, "vector store unavailable");
            (false, 0, 0)
        }
    };

    let vector_store_location = match config.vector_store.driver {
        VectorDriver::Sqlite => config.sqlite_path().display().to_string(),
        VectorDriver::Postgres => {
            if secrets.database_url.is_some() {
                format!("${}", config.vector_store.url_env)
            } else {
                "(no database URL)".to_string()
            }
        }
    };

    let status = StatusInfo {
        config_path: Config::config_path()
            .filter(|p| p.exists())
            .map(|p| p.display().to_string()),
        upload_dir: config.storage.upload_dir.display().to_string(),
        upload_files,
        vector_store_driver: config.vector_store.driver.to_string(),
        vector_store_location,
        vector_store_connected,
        documents,
        chunks,
        embedding_provider: config.embedding.provider.to_string(),
        embedding_model: config.embedding.model_id.clone(),
        completion_model: config.completion.model.clone(),
        completion_key_set: secrets.completion_api_key.is_some(),
    };

    print!("{}", formatter.format_status(&status));

    if !status.completion_key_set && format == OutputFormat::Text {
        eprintln!();
        eprintln!(
            "Hint: set {} to enable answering questions.",
            config.completion.api_key_env
        );
    }

    Ok(())
}
