use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use crate::app::AppContext;
use crate::models::{Config, Secrets};
use crate::server;

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[arg(long, help = "Address to bind (default: server.host)")]
    pub host: Option<String>,

    #[arg(long, short = 'p', help = "Port to listen on (default: server.port)")]
    pub port: Option<u16>,
}

pub async fn handle_serve<F>(args: ServeArgs, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let mut config = Config::load()?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;

    let secrets = Secrets::from_env(&config);
    let ctx = AppContext::build(config, &secrets)
        .await
        .context("failed to start")?;

    server::serve(Arc::new(ctx), addr, shutdown).await
}
