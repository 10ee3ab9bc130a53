//! Authorization credentials kept in `servers.json`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which authorization scheme a token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Legacy compile key (`permissions.authorizationtoken`)
    CompileKey,
    /// RPO token (`rpoToken`)
    RpoToken,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::CompileKey => write!(f, "compileKey"),
            TokenKind::RpoToken => write!(f, "rpoToken"),
        }
    }
}

/// What a compile key allows, from its build type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionLevel {
    /// "0": compile functions and overwrite default TOTVS sources
    OverwriteDefault,
    /// "1": compile user functions only
    UserFunctionsOnly,
    /// "2": compile functions
    CompileFunctions,
}

impl PermissionLevel {
    pub fn from_build_type(build_type: &str) -> Option<Self> {
        match build_type {
            "0" => Some(PermissionLevel::OverwriteDefault),
            "1" => Some(PermissionLevel::UserFunctionsOnly),
            "2" => Some(PermissionLevel::CompileFunctions),
            _ => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PermissionLevel::OverwriteDefault => {
                "Allow compile functions and overwrite default TOTVS"
            }
            PermissionLevel::UserFunctionsOnly => "Allow only compile users functions",
            PermissionLevel::CompileFunctions => "Allow compile functions",
        }
    }
}

/// Legacy time-limited compile authorization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileKey {
    /// Key file the values were read from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued: Option<String>,
    /// Expiry date as `dd/mm/yyyy`
    #[serde(default)]
    pub expire: String,
    #[serde(default)]
    pub build_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_key: Option<String>,
    #[serde(default)]
    pub authorization_token: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CompileKey {
    /// Parse the `dd/mm/yyyy` expiry date.
    pub fn expiry_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.expire.trim(), "%d/%m/%Y").ok()
    }

    /// The key is usable through the whole expiry day.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        match self.expiry_date() {
            Some(expiry) => expiry < today,
            None => true,
        }
    }

    /// A key counts as logged in when it carries a token, a build type and
    /// an expiry date that has not passed.
    pub fn is_valid_on(&self, today: NaiveDate) -> bool {
        !self.authorization_token.is_empty()
            && !self.build_type.is_empty()
            && !self.is_expired(today)
    }

    pub fn permission_level(&self) -> Option<PermissionLevel> {
        PermissionLevel::from_build_type(&self.build_type)
    }

    /// One-line status such as "Logged in (Machine ID: X, expires 2030-12-31)".
    pub fn permission_summary(&self, today: NaiveDate) -> String {
        if self.authorization_token.is_empty() || self.build_type.is_empty() {
            return "NOT logged in".to_string();
        }
        let Some(expiry) = self.expiry_date() else {
            return "NOT logged in".to_string();
        };
        if expiry < today {
            return format!("Expired in {}", expiry);
        }

        let mut parts = Vec::new();
        if let Some(ref machine) = self.machine_id {
            parts.push(format!("Machine ID: {}", machine));
        } else if let Some(ref user) = self.user_id {
            parts.push(format!("User ID: {}", user));
        }
        parts.push(format!("expires {}", expiry));
        if let Some(level) = self.permission_level() {
            parts.push(level.description().to_string());
        }
        format!("Logged in ({})", parts.join(", "))
    }
}

/// Signed credential scoped to RPO operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RpoToken {
    #[serde(default)]
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RpoToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Default::default()
        }
    }
}

/// Session token issued for one server/environment pair.
///
/// Stored as `["<id>:<environment>", {"id": ..., "token": ...}]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedToken(pub String, pub SavedTokenData);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedTokenData {
    pub id: String,
    pub token: String,
}

impl SavedToken {
    pub fn new(server_id: &str, environment: &str, token: impl Into<String>) -> Self {
        SavedToken(
            Self::key(server_id, environment),
            SavedTokenData {
                id: server_id.to_string(),
                token: token.into(),
            },
        )
    }

    pub fn key(server_id: &str, environment: &str) -> String {
        format!("{}:{}", server_id, environment)
    }

    pub fn token(&self) -> &str {
        &self.1.token
    }
}
