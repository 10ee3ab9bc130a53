//! tds-servers - server configuration and connection state for TOTVS
//! development tools.
//!
//! This library owns `servers.json`: the list of application servers a
//! developer can connect to, the authorization tokens they need, and which
//! one is current. It provides the core of the `tds-servers` CLI.
//!
//! All components are single-threaded and share one [`Context`], which
//! carries the [`EventBus`] every change is published on.

pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod context;
pub mod events;
pub mod manager;
pub mod models;
pub mod resources;
pub mod watcher;

use std::path::PathBuf;

pub use client::{Credentials, LanguageClient, RemoteError, ServerInfo};
pub use config::ServerConfiguration;
pub use context::{Context, LoadGuard};
pub use events::{ChangeEvent, EventBus, EventGroup, EventName, ServerProperty, SubscriptionId};
pub use manager::{IncludeResolution, ManagerSettings, NewServer, ServerEntry, ServerManager};
pub use models::{ServerDefinition, ServerType};
pub use watcher::{FileChange, FileChangeKind, FileWatcher};

/// Library-level error type for tds-servers operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Settings error: {0}")]
    Kdl(#[from] kdl::KdlError),

    #[error("Invalid server configuration {}: {message}", path.display())]
    ConfigParse { path: PathBuf, message: String },

    #[error("A server named '{0}' already exists")]
    DuplicateName(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for tds-servers operations.
pub type Result<T> = std::result::Result<T, Error>;
