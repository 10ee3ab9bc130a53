//! Configuration for tds-servers.
//!
//! Two distinct files are involved:
//!
//! ## servers.json - Server definitions and credentials
//!
//! Located at:
//! - Workspace: `<workspace>/.vscode/servers.json`
//! - Global: `~/.totvsls/servers.json`
//!
//! JSON with comments tolerated on read. Unknown keys are preserved across
//! a load/save cycle. See [`schema`] for the layout and [`store`] for the
//! in-memory owner.
//!
//! ## config.kdl - User preferences
//!
//! Located at `~/.config/tds-servers/config.kdl` (or `$TDS_CONFIG_DIR`).
//!
//! Contains:
//! - `workspace-server-config` - use the workspace file instead of the global one
//! - `reconnect-last-server` - restore the last selected server on start
//! - `output-format` - "json" or "human"
//!
//! ## Precedence
//!
//! CLI flag > environment > config.kdl > defaults. Use the [`resolver`]
//! module for precedence resolution.

pub mod resolver;
pub mod schema;
pub mod settings;
pub mod store;

pub use resolver::{
    ConfigOverrides, Resolved, ResolvedSettings, ValueSource, WORKSPACE_SERVER_CONFIG_ENV,
    resolve_settings, server_config_file,
};
pub use schema::{CONFIG_VERSION, Permissions, ServerConfigFile};
pub use settings::{OutputFormat, UserSettings};
pub use store::ServerConfiguration;
