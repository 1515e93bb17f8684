use anyhow::{Context, Result};

use crate::app::open_store;
use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat, Secrets};

pub async fn handle_documents(format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let secrets = Secrets::from_env(&config);
    let formatter = get_formatter(format);

    let store = open_store(&config, &secrets)
        .await
        .context("failed to open vector store")?;
    let documents = store.list_documents().await?;

    print!("{}", formatter.format_documents(&documents));
    Ok(())
}
