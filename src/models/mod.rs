//! Data models for server definitions and their credentials.

mod tokens;

pub use tokens::{CompileKey, PermissionLevel, RpoToken, SavedToken, SavedTokenData, TokenKind};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::client::RemoteError;

/// Builds newer than this use the RPO token scheme instead of the compile key.
///
/// The comparison is plain string ordering, not version-aware.
pub const SAFE_RPO_BUILD: &str = "7.00.191205P";

/// Returns true when `build` sorts strictly after [`SAFE_RPO_BUILD`].
pub fn is_safe_rpo_build(build: Option<&str>) -> bool {
    build.is_some_and(|b| b > SAFE_RPO_BUILD)
}

/// Kind of application server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerType {
    #[default]
    #[serde(rename = "totvs_server_protheus")]
    Protheus,
    #[serde(rename = "totvs_server_logix")]
    Logix,
}

impl ServerType {
    /// Parse from a short or full name, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "protheus" | "totvs_server_protheus" => Some(ServerType::Protheus),
            "logix" | "totvs_server_logix" => Some(ServerType::Logix),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServerType::Protheus => "totvs_server_protheus",
            ServerType::Logix => "totvs_server_logix",
        }
    }
}

impl std::fmt::Display for ServerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One configured application server, as stored in `servers.json`.
///
/// Keys this crate does not know about are kept in `extra` and written back
/// unchanged, so files shared with other tools survive a round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerDefinition {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub server_type: ServerType,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_version: Option<String>,
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default)]
    pub environments: Vec<String>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub smartclient_bin: String,
    #[serde(default)]
    pub patch_generate_dir: String,

    /// Error left by the last failed validation. Never persisted.
    #[serde(skip)]
    pub last_error: Option<RemoteError>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ServerDefinition {
    /// Create a definition with a freshly generated id.
    pub fn new(name: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), name, address, port)
    }

    pub fn with_id(
        id: impl Into<String>,
        name: impl Into<String>,
        address: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            server_type: ServerType::default(),
            address: address.into(),
            port,
            secure: false,
            build_version: None,
            includes: Vec::new(),
            environments: Vec::new(),
            username: String::new(),
            smartclient_bin: String::new(),
            patch_generate_dir: String::new(),
            last_error: None,
            extra: Map::new(),
        }
    }

    /// Whether this server authorizes with the RPO token scheme.
    pub fn is_safe_rpo(&self) -> bool {
        is_safe_rpo_build(self.build_version.as_deref())
    }

    /// The stored spelling of the environment matching `name` ignoring case.
    pub fn find_environment(&self, name: &str) -> Option<&str> {
        let lower = name.to_lowercase();
        self.environments
            .iter()
            .find(|existing| existing.to_lowercase() == lower)
            .map(String::as_str)
    }

    /// Add an environment unless one with the same name (ignoring case) exists.
    pub fn add_environment(&mut self, name: &str) -> bool {
        if self.find_environment(name).is_some() {
            return false;
        }
        self.environments.push(name.to_string());
        true
    }

    /// Remove the first environment matching `name` ignoring case.
    pub fn remove_environment(&mut self, name: &str) -> bool {
        let Some(stored) = self.find_environment(name).map(str::to_string) else {
            return false;
        };
        self.environments.retain(|existing| *existing != stored);
        true
    }

    /// `address:port` for display.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}
