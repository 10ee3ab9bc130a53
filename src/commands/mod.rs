//! Command implementations for the tds-servers CLI.
//!
//! Each command runs against an open [`ServerManager`] and returns a result
//! that can be printed as JSON or as human-readable text.

use chrono::Local;
use serde::Serialize;
use std::path::PathBuf;

use crate::config::ValueSource;
use crate::manager::{NewServer, ServerManager};
use crate::models::{CompileKey, PermissionLevel, RpoToken, ServerDefinition, ServerType, TokenKind};
use crate::resources;
use crate::{Error, Result};

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

fn find(manager: &ServerManager, name_or_id: &str) -> Result<ServerDefinition> {
    manager
        .find_server(name_or_id)
        .cloned()
        .ok_or_else(|| Error::NotFound(format!("server {}", name_or_id)))
}

// ==================== Servers ====================

/// Compact view of a server for listings.
#[derive(Debug, Serialize)]
pub struct ServerSummary {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub server_type: ServerType,
    pub address: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_version: Option<String>,
    pub secure: bool,
    pub safe_rpo: bool,
    pub connected: bool,
    pub environments: Vec<String>,
}

impl ServerSummary {
    fn new(server: &ServerDefinition, connected: bool) -> Self {
        Self {
            id: server.id.clone(),
            name: server.name.clone(),
            server_type: server.server_type,
            address: server.address.clone(),
            port: server.port,
            build_version: server.build_version.clone(),
            secure: server.secure,
            safe_rpo: server.is_safe_rpo(),
            connected,
            environments: server.environments.clone(),
        }
    }

    fn human_line(&self) -> String {
        let marker = if self.connected { "*" } else { " " };
        format!(
            "{} {} ({}) {}:{}{}",
            marker,
            self.name,
            self.id,
            self.address,
            self.port,
            self.build_version
                .as_deref()
                .map(|build| format!(" build {}", build))
                .unwrap_or_default()
        )
    }
}

#[derive(Serialize)]
pub struct ServerList {
    pub file: PathBuf,
    pub count: usize,
    pub servers: Vec<ServerSummary>,
}

impl Output for ServerList {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        if self.servers.is_empty() {
            return format!("No servers configured in {}", self.file.display());
        }
        let mut lines = vec![format!(
            "{} server(s) in {}:",
            self.count,
            self.file.display()
        )];
        lines.extend(self.servers.iter().map(ServerSummary::human_line));
        lines.join("\n")
    }
}

pub fn server_list(manager: &ServerManager) -> Result<ServerList> {
    let servers: Vec<ServerSummary> = manager
        .entries()
        .iter()
        .map(|entry| ServerSummary::new(entry.definition(), entry.is_connected()))
        .collect();
    Ok(ServerList {
        file: manager.file().to_path_buf(),
        count: servers.len(),
        servers,
    })
}

#[derive(Serialize)]
pub struct ServerShow {
    #[serde(flatten)]
    pub server: ServerDefinition,
    pub safe_rpo: bool,
    pub connected: bool,
}

impl Output for ServerShow {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        let server = &self.server;
        let mut lines = vec![
            format!("{} ({})", server.name, server.id),
            format!("  Type: {}", server.server_type),
            format!("  Address: {}", server.endpoint()),
            format!(
                "  Build: {}",
                server.build_version.as_deref().unwrap_or("unknown")
            ),
            format!("  Secure: {}", if server.secure { "yes" } else { "no" }),
            format!(
                "  Authorization: {}",
                if self.safe_rpo { "RPO token" } else { "compile key" }
            ),
        ];
        if !server.environments.is_empty() {
            lines.push(format!("  Environments: {}", server.environments.join(", ")));
        }
        if !server.includes.is_empty() {
            lines.push(format!("  Includes: {}", server.includes.join(", ")));
        }
        if !server.username.is_empty() {
            lines.push(format!("  Username: {}", server.username));
        }
        if !server.patch_generate_dir.is_empty() {
            lines.push(format!("  Patch directory: {}", server.patch_generate_dir));
        }
        if !server.smartclient_bin.is_empty() {
            lines.push(format!("  SmartClient: {}", server.smartclient_bin));
        }
        if self.connected {
            lines.push("  (current)".to_string());
        }
        lines.join("\n")
    }
}

pub fn server_show(manager: &ServerManager, name_or_id: &str) -> Result<ServerShow> {
    let server = find(manager, name_or_id)?;
    Ok(ServerShow {
        safe_rpo: server.is_safe_rpo(),
        connected: manager.is_connected(&server),
        server,
    })
}

/// Outcome of a command that touches a single server.
#[derive(Serialize)]
pub struct ServerAction {
    pub action: &'static str,
    pub id: String,
    pub name: String,
    pub changed: bool,
}

impl Output for ServerAction {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        if self.changed {
            format!("{} server {} ({})", self.action, self.name, self.id)
        } else {
            format!("Server {} ({}) unchanged", self.name, self.id)
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub fn server_add(
    manager: &mut ServerManager,
    name: &str,
    address: &str,
    port: u16,
    server_type: &str,
    build: Option<String>,
    secure: bool,
    includes: Vec<String>,
    id: Option<String>,
) -> Result<ServerAction> {
    let server_type = ServerType::parse(server_type).ok_or_else(|| {
        Error::InvalidInput(format!(
            "unknown server type '{}' (expected protheus or logix)",
            server_type
        ))
    })?;
    let server = manager.create_server(NewServer {
        id,
        name: name.to_string(),
        server_type,
        address: address.to_string(),
        port,
        build_version: build,
        secure,
        includes,
    })?;
    Ok(ServerAction {
        action: "Added",
        id: server.id,
        name: server.name,
        changed: true,
    })
}

pub fn server_remove(manager: &mut ServerManager, name_or_id: &str) -> Result<ServerAction> {
    let server = find(manager, name_or_id)?;
    let changed = manager.delete_server(&server.id)?;
    Ok(ServerAction {
        action: "Removed",
        id: server.id,
        name: server.name,
        changed,
    })
}

pub fn server_rename(
    manager: &mut ServerManager,
    name_or_id: &str,
    new_name: &str,
) -> Result<ServerAction> {
    let server = find(manager, name_or_id)?;
    let changed = server.name != new_name && manager.rename_server(&server.id, new_name)?;
    Ok(ServerAction {
        action: "Renamed",
        id: server.id,
        name: new_name.to_string(),
        changed,
    })
}

/// Result of `set`: which per-server paths were changed.
#[derive(Serialize)]
pub struct ServerPaths {
    pub id: String,
    pub name: String,
    pub patch_generate_dir: String,
    pub smartclient_bin: String,
    pub changed: bool,
}

impl Output for ServerPaths {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        if !self.changed {
            return format!("No changes for server {}", self.name);
        }
        let mut lines = vec![format!("Updated server {} ({})", self.name, self.id)];
        if !self.patch_generate_dir.is_empty() {
            lines.push(format!("  Patch directory: {}", self.patch_generate_dir));
        }
        if !self.smartclient_bin.is_empty() {
            lines.push(format!("  SmartClient: {}", self.smartclient_bin));
        }
        lines.join("\n")
    }
}

pub fn server_set(
    manager: &mut ServerManager,
    name_or_id: &str,
    patch_dir: Option<&str>,
    smartclient: Option<&str>,
) -> Result<ServerPaths> {
    let server = find(manager, name_or_id)?;
    let mut changed = false;
    if let Some(dir) = patch_dir {
        changed |= manager
            .configuration_mut()
            .update_patch_generate_dir(&server.id, dir)?
            .unwrap_or(false);
    }
    if let Some(path) = smartclient {
        changed |= manager
            .configuration_mut()
            .update_smartclient_bin(&server.id, path)?
            .unwrap_or(false);
    }
    let server = find(manager, &server.id)?;
    Ok(ServerPaths {
        id: server.id,
        name: server.name,
        patch_generate_dir: server.patch_generate_dir,
        smartclient_bin: server.smartclient_bin,
        changed,
    })
}

pub fn server_select(manager: &mut ServerManager, name_or_id: &str) -> Result<ServerAction> {
    let server = find(manager, name_or_id)?;
    let changed = manager.select_server(&server.id)?;
    Ok(ServerAction {
        action: "Selected",
        id: server.id,
        name: server.name,
        changed,
    })
}

#[derive(Serialize)]
pub struct CurrentServer {
    pub current: Option<ServerSummary>,
}

impl Output for CurrentServer {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        match self.current {
            Some(ref server) => server.human_line().trim_start().to_string(),
            None => "No current server".to_string(),
        }
    }
}

pub fn server_deselect(manager: &mut ServerManager) -> Result<CurrentServer> {
    manager.deselect_server()?;
    Ok(CurrentServer { current: None })
}

pub fn server_current(manager: &ServerManager) -> Result<CurrentServer> {
    Ok(CurrentServer {
        current: manager
            .current_server()
            .map(|server| ServerSummary::new(server, true)),
    })
}

// ==================== Environments ====================

#[derive(Serialize)]
pub struct EnvironmentResult {
    pub server: String,
    pub environments: Vec<String>,
    pub changed: bool,
}

impl Output for EnvironmentResult {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        let list = if self.environments.is_empty() {
            "(none)".to_string()
        } else {
            self.environments.join(", ")
        };
        let suffix = if self.changed { "" } else { " (unchanged)" };
        format!("{} environments: {}{}", self.server, list, suffix)
    }
}

pub fn env_add(
    manager: &mut ServerManager,
    name_or_id: &str,
    environment: &str,
) -> Result<EnvironmentResult> {
    if environment.trim().is_empty() {
        return Err(Error::InvalidInput("environment is required".to_string()));
    }
    let server = find(manager, name_or_id)?;
    let changed = manager
        .configuration_mut()
        .add_environment(&server.id, environment)?
        .unwrap_or(false);
    environment_result(manager, &server.id, changed)
}

pub fn env_remove(
    manager: &mut ServerManager,
    name_or_id: &str,
    environment: &str,
) -> Result<EnvironmentResult> {
    let server = find(manager, name_or_id)?;
    let Some(stored) = server.find_environment(environment).map(str::to_string) else {
        return environment_result(manager, &server.id, false);
    };
    let changed = manager
        .configuration_mut()
        .remove_environment(&server.id, &stored)?
        .unwrap_or(false);
    if changed {
        manager
            .configuration_mut()
            .remove_saved_token(&server.id, &stored)?;
    }
    environment_result(manager, &server.id, changed)
}

fn environment_result(manager: &ServerManager, id: &str, changed: bool) -> Result<EnvironmentResult> {
    let server = find(manager, id)?;
    Ok(EnvironmentResult {
        server: server.name,
        environments: server.environments,
        changed,
    })
}

// ==================== Includes ====================

#[derive(Serialize)]
pub struct IncludesResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    pub includes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Output for IncludesResult {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        let mut lines = Vec::new();
        match self.server {
            Some(ref server) => lines.push(format!("Include folders for {}:", server)),
            None => lines.push("Include folders:".to_string()),
        }
        lines.extend(self.includes.iter().map(|include| format!("  {}", include)));
        lines.extend(self.warnings.iter().map(|warning| format!("Warning: {}", warning)));
        lines.join("\n")
    }
}

pub fn includes_show(
    manager: &ServerManager,
    server: Option<&str>,
    absolute: bool,
) -> Result<IncludesResult> {
    let server = server.map(|name| find(manager, name)).transpose()?;
    let resolution = manager.includes(server.as_ref(), absolute);
    Ok(IncludesResult {
        server: server.map(|server| server.name),
        includes: resolution.includes,
        warnings: resolution.warnings,
    })
}

pub fn includes_set(
    manager: &mut ServerManager,
    paths: Vec<String>,
    server: Option<&str>,
) -> Result<IncludesResult> {
    match server {
        Some(name) => {
            let server = find(manager, name)?;
            manager
                .configuration_mut()
                .set_server_includes(&server.id, paths)?;
            let server = find(manager, &server.id)?;
            Ok(IncludesResult {
                server: Some(server.name),
                includes: server.includes,
                warnings: Vec::new(),
            })
        }
        None => {
            manager.configuration_mut().set_includes(paths)?;
            Ok(IncludesResult {
                server: None,
                includes: manager.configuration().includes().to_vec(),
                warnings: Vec::new(),
            })
        }
    }
}

// ==================== Authorization ====================

#[derive(Serialize)]
pub struct CompileKeyResult {
    pub present: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission: Option<&'static str>,
    pub expired: bool,
    pub status: String,
}

impl Output for CompileKeyResult {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        let mut lines = vec![format!("Compile key: {}", self.status)];
        if let Some(permission) = self.permission {
            lines.push(format!("  Permission: {}", permission));
        }
        lines.join("\n")
    }
}

fn compile_key_result(key: Option<&CompileKey>) -> CompileKeyResult {
    let today = Local::now().date_naive();
    match key {
        Some(key) => CompileKeyResult {
            present: true,
            machine_id: key.machine_id.clone(),
            user_id: key.user_id.clone(),
            expire: Some(key.expire.clone()),
            build_type: Some(key.build_type.clone()),
            permission: key.permission_level().map(|level| level.description()),
            expired: key.is_expired(today),
            status: key.permission_summary(today),
        },
        None => CompileKeyResult {
            present: false,
            machine_id: None,
            user_id: None,
            expire: None,
            build_type: None,
            permission: None,
            expired: false,
            status: "NOT logged in".to_string(),
        },
    }
}

pub fn key_show(manager: &ServerManager) -> Result<CompileKeyResult> {
    Ok(compile_key_result(manager.configuration().permissions_infos()))
}

pub fn key_set(
    manager: &mut ServerManager,
    token: &str,
    expire: &str,
    build_type: &str,
    machine_id: Option<String>,
    user_id: Option<String>,
) -> Result<CompileKeyResult> {
    if token.trim().is_empty() {
        return Err(Error::InvalidInput("token is required".to_string()));
    }
    if PermissionLevel::from_build_type(build_type).is_none() {
        return Err(Error::InvalidInput(format!(
            "build type must be 0, 1 or 2, got '{}'",
            build_type
        )));
    }
    let key = CompileKey {
        machine_id,
        user_id,
        issued: Some(Local::now().format("%d/%m/%Y").to_string()),
        expire: expire.to_string(),
        build_type: build_type.to_string(),
        authorization_token: token.to_string(),
        ..Default::default()
    };
    if key.expiry_date().is_none() {
        return Err(Error::InvalidInput(format!(
            "expiry date must be dd/mm/yyyy, got '{}'",
            expire
        )));
    }
    manager.configuration_mut().set_compile_key(key)?;
    key_show(manager)
}

pub fn key_clear(manager: &mut ServerManager) -> Result<CompileKeyResult> {
    manager.configuration_mut().delete_permissions_infos()?;
    key_show(manager)
}

#[derive(Serialize)]
pub struct RpoTokenResult {
    pub present: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Output for RpoTokenResult {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        match (self.present, &self.file) {
            (true, Some(file)) => format!("RPO token stored (from {})", file),
            (true, None) => "RPO token stored".to_string(),
            (false, _) => "No RPO token".to_string(),
        }
    }
}

pub fn rpo_set(manager: &mut ServerManager, token: &str, file: Option<String>) -> Result<RpoTokenResult> {
    if token.trim().is_empty() {
        return Err(Error::InvalidInput("token is required".to_string()));
    }
    let mut rpo = RpoToken::new(token.trim());
    rpo.file = file.clone();
    manager.configuration_mut().save_rpo_token_infos(Some(rpo))?;
    Ok(RpoTokenResult {
        present: true,
        file,
    })
}

pub fn rpo_clear(manager: &mut ServerManager) -> Result<RpoTokenResult> {
    manager.configuration_mut().save_rpo_token_infos(None)?;
    Ok(RpoTokenResult {
        present: false,
        file: None,
    })
}

#[derive(Serialize)]
pub struct TokenResult {
    pub server: String,
    pub kind: TokenKind,
    pub token: String,
}

impl Output for TokenResult {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        if self.token.is_empty() {
            format!("{}: no {} stored", self.server, self.kind)
        } else {
            format!("{} ({}): {}", self.server, self.kind, self.token)
        }
    }
}

pub fn server_token(manager: &ServerManager, name_or_id: &str) -> Result<TokenResult> {
    let server = find(manager, name_or_id)?;
    let entry = manager
        .entry(&server.id)
        .ok_or_else(|| Error::NotFound(format!("server {}", name_or_id)))?;
    let kind = if entry.is_safe_rpo() {
        TokenKind::RpoToken
    } else {
        TokenKind::CompileKey
    };
    Ok(TokenResult {
        server: server.name.clone(),
        kind,
        token: entry.authorization_token(),
    })
}

// ==================== Location ====================

#[derive(Serialize)]
pub struct LocationResult {
    pub file: PathBuf,
    pub workspace_server_config: bool,
    pub source: String,
}

impl Output for LocationResult {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        let mode = if self.workspace_server_config {
            "workspace"
        } else {
            "global"
        };
        format!("{} ({}, from {})", self.file.display(), mode, self.source)
    }
}

pub fn location_show(manager: &ServerManager, source: &ValueSource) -> Result<LocationResult> {
    Ok(LocationResult {
        file: manager.file().to_path_buf(),
        workspace_server_config: manager.settings().workspace_server_config,
        source: source.to_string(),
    })
}

pub fn location_toggle(manager: &mut ServerManager) -> Result<LocationResult> {
    let file = manager.toggle_workspace_server_config()?;
    Ok(LocationResult {
        file,
        workspace_server_config: manager.settings().workspace_server_config,
        source: ValueSource::Settings.to_string(),
    })
}

// ==================== Resources ====================

#[derive(Serialize)]
pub struct IgnoreEntry {
    pub path: String,
    pub ignored: bool,
    pub resource: bool,
}

#[derive(Serialize)]
pub struct IgnoreResult {
    pub paths: Vec<IgnoreEntry>,
}

impl Output for IgnoreResult {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        self.paths
            .iter()
            .map(|entry| {
                let status = if entry.ignored {
                    "ignored"
                } else if entry.resource {
                    "resource"
                } else {
                    "source"
                };
                format!("{}: {}", entry.path, status)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn ignore_check(manager: &ServerManager, paths: &[String]) -> Result<IgnoreResult> {
    Ok(IgnoreResult {
        paths: paths
            .iter()
            .map(|path| IgnoreEntry {
                path: path.clone(),
                ignored: manager.is_ignore_resource(path),
                resource: resources::is_resource(path),
            })
            .collect(),
    })
}

// ==================== Version ====================

#[derive(Serialize)]
pub struct VersionResult {
    pub version: &'static str,
    pub commit: &'static str,
    pub built: &'static str,
}

impl Output for VersionResult {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        format!(
            "tds-servers {} ({}, built {})",
            self.version, self.commit, self.built
        )
    }
}

pub fn version() -> VersionResult {
    VersionResult {
        version: env!("CARGO_PKG_VERSION"),
        commit: env!("TDS_GIT_COMMIT"),
        built: env!("TDS_BUILD_TIMESTAMP"),
    }
}
