//! Utility modules.

pub mod file;
pub mod text;

pub use file::{calculate_checksum, extension_of, file_name_of, sanitize_filename};
pub use text::{has_content, normalize_whitespace};
