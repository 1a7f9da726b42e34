//! Database access layer
//!
//! SQLite persistence for playback defaults and saved sections.

pub mod init;
pub mod sections;
pub mod settings;

pub use init::{create_schema, init_database, init_settings_defaults};
