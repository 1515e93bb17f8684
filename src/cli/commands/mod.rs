mod ask;
mod config;
mod documents;
mod ingest;
mod serve;
mod status;

pub use ask::AskArgs;
pub use config::ConfigCommand;
pub use serve::ServeArgs;

pub use ask::handle_ask;
pub use config::handle_config;
pub use documents::handle_documents;
pub use ingest::handle_ingest;
pub use serve::handle_serve;
pub use status::handle_status;
