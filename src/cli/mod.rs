//! CLI module for the RAG service.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Ask questions about your PDF and text documents.
#[derive(Debug, Parser)]
#[command(name = "ragchat")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(long, short = 'f', global = true, help = "Output format: text or json")]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the HTTP API
    Serve(commands::ServeArgs),

    /// Ingest new files from the upload directory
    Ingest,

    /// Ask a question, or start an interactive session without one
    Ask(commands::AskArgs),

    /// List ingested documents
    Documents,

    /// Show configuration, store and provider status
    Status,

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}
