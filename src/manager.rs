//! The single access point to "the" server configuration.
//!
//! [`ServerManager`] decides which `servers.json` is active (workspace or
//! home), keeps track of the current server, reloads when the file changes on
//! disk, and brokers calls to the external language client.

use std::fs;
use std::ops::Deref;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

use crate::client::{Credentials, LanguageClient, ServerInfo};
use crate::config::resolver::server_config_file;
use crate::config::{ServerConfiguration, UserSettings};
use crate::context::Context;
use crate::events::{ChangeEvent, ServerProperty};
use crate::models::{ServerDefinition, ServerType};
use crate::resources;
use crate::watcher::{FileChange, FileWatcher};
use crate::{Error, Result};

/// Quiet period after a file notification before reloading.
const DEBOUNCE_MS: u64 = 100;

/// Placeholder expanded to the workspace root in include paths.
pub const WORKSPACE_FOLDER_VAR: &str = "${workspaceFolder}";

/// Inputs the host provides when opening the manager.
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    pub workspace_root: PathBuf,
    pub home_dir: PathBuf,
    /// Use `<workspace>/.vscode/servers.json` instead of the home file
    pub workspace_server_config: bool,
    /// Restore the last selected server when opening
    pub reconnect_last_server: bool,
    /// Where the location toggle is persisted; `None` keeps it in memory
    pub settings_file: Option<PathBuf>,
}

/// Parameters for [`ServerManager::create_server`].
#[derive(Debug, Clone, Default)]
pub struct NewServer {
    /// Keep an existing id instead of generating one
    pub id: Option<String>,
    pub name: String,
    pub server_type: ServerType,
    pub address: String,
    pub port: u16,
    pub build_version: Option<String>,
    pub secure: bool,
    pub includes: Vec<String>,
}

/// Include folders after resolution, with anything worth telling the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludeResolution {
    pub includes: Vec<String>,
    pub warnings: Vec<String>,
}

/// A server seen together with the state that derives from it.
#[derive(Debug, Clone, Copy)]
pub struct ServerEntry<'a> {
    server: &'a ServerDefinition,
    configuration: &'a ServerConfiguration,
    current: Option<&'a str>,
}

impl<'a> ServerEntry<'a> {
    pub fn definition(&self) -> &'a ServerDefinition {
        self.server
    }

    /// True iff this is the manager's current server.
    pub fn is_connected(&self) -> bool {
        self.current == Some(self.server.id.as_str())
    }

    /// Token for this server's authorization scheme, or `""`.
    pub fn authorization_token(&self) -> String {
        self.configuration.authorization_token(self.server)
    }
}

impl Deref for ServerEntry<'_> {
    type Target = ServerDefinition;

    fn deref(&self) -> &ServerDefinition {
        self.server
    }
}

pub struct ServerManager {
    ctx: Rc<Context>,
    settings: ManagerSettings,
    configuration: ServerConfiguration,
    current_server: Option<String>,
    watcher: FileWatcher,
    changes_tx: Sender<FileChange>,
    changes_rx: Receiver<FileChange>,
}

impl ServerManager {
    /// Resolve and load the active configuration.
    pub fn open(ctx: Rc<Context>, settings: ManagerSettings) -> Result<Self> {
        let file = server_config_file(
            &settings.workspace_root,
            &settings.home_dir,
            settings.workspace_server_config,
        );
        let configuration = ServerConfiguration::load(Rc::clone(&ctx), &file)?;
        let (changes_tx, changes_rx) = mpsc::channel();

        let mut manager = Self {
            ctx,
            settings,
            configuration,
            current_server: None,
            watcher: FileWatcher::new(),
            changes_tx,
            changes_rx,
        };
        manager.announce_loaded();

        if manager.settings.reconnect_last_server {
            let last = manager
                .configuration
                .last_connected_server()
                .filter(|id| manager.configuration.server_by_id(id).is_some())
                .map(str::to_string);
            if let Some(id) = last {
                manager.set_current_server(Some(&id))?;
            }
        }

        Ok(manager)
    }

    pub fn context(&self) -> &Rc<Context> {
        &self.ctx
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    /// Path of the active `servers.json`.
    pub fn file(&self) -> &Path {
        self.configuration.file()
    }

    pub fn configuration(&self) -> &ServerConfiguration {
        &self.configuration
    }

    pub fn configuration_mut(&mut self) -> &mut ServerConfiguration {
        &mut self.configuration
    }

    pub fn servers(&self) -> &[ServerDefinition] {
        self.configuration.servers()
    }

    /// Look a server up by id first, then by name.
    pub fn find_server(&self, name_or_id: &str) -> Option<&ServerDefinition> {
        self.configuration
            .server_by_id(name_or_id)
            .or_else(|| self.configuration.server_by_name(name_or_id))
    }

    pub fn entry(&self, id: &str) -> Option<ServerEntry<'_>> {
        let server = self.configuration.server_by_id(id)?;
        Some(self.entry_for(server))
    }

    pub fn entries(&self) -> Vec<ServerEntry<'_>> {
        self.servers()
            .iter()
            .map(|server| self.entry_for(server))
            .collect()
    }

    fn entry_for<'a>(&'a self, server: &'a ServerDefinition) -> ServerEntry<'a> {
        ServerEntry {
            server,
            configuration: &self.configuration,
            current: self.current_server.as_deref(),
        }
    }

    /// Persist the active configuration.
    pub fn save(&mut self) -> Result<()> {
        self.configuration.save()
    }

    // ==================== Current server ====================

    pub fn current_server_id(&self) -> Option<&str> {
        self.current_server.as_deref()
    }

    pub fn current_server(&self) -> Option<&ServerDefinition> {
        self.configuration
            .server_by_id(self.current_server.as_deref()?)
    }

    pub fn is_connected(&self, server: &ServerDefinition) -> bool {
        self.current_server.as_deref() == Some(server.id.as_str())
    }

    /// Change the current server by id. Returns whether it changed.
    ///
    /// Setting the same value again publishes nothing.
    pub fn set_current_server(&mut self, id: Option<&str>) -> Result<bool> {
        if self.current_server.as_deref() == id {
            return Ok(false);
        }
        if let Some(id) = id {
            if self.configuration.server_by_id(id).is_none() {
                return Err(Error::NotFound(format!("server {}", id)));
            }
        }

        let old = std::mem::replace(&mut self.current_server, id.map(str::to_string));
        self.ctx.events().publish(ChangeEvent::CurrentServerChanged {
            old,
            new: self.current_server.clone(),
        });
        Ok(true)
    }

    /// Make `id` current and remember it as the last connected server.
    pub fn select_server(&mut self, id: &str) -> Result<bool> {
        let changed = self.set_current_server(Some(id))?;
        self.configuration.set_last_connected_server(Some(id))?;
        Ok(changed)
    }

    /// Clear the current server and forget the last connected one.
    pub fn deselect_server(&mut self) -> Result<bool> {
        let changed = self.set_current_server(None)?;
        self.configuration.set_last_connected_server(None)?;
        Ok(changed)
    }

    // ==================== Servers ====================

    /// Validate and add a new server definition.
    pub fn create_server(&mut self, new: NewServer) -> Result<ServerDefinition> {
        if new.name.trim().is_empty() || new.address.trim().is_empty() || new.port == 0 {
            return Err(Error::InvalidInput(
                "name, address and port are required".to_string(),
            ));
        }
        if self.configuration.server_by_name(&new.name).is_some() {
            return Err(Error::DuplicateName(new.name));
        }

        let mut server = match new.id {
            Some(id) if !id.is_empty() => ServerDefinition::with_id(id, new.name, new.address, new.port),
            _ => ServerDefinition::new(new.name, new.address, new.port),
        };
        server.server_type = new.server_type;
        server.build_version = new.build_version.filter(|build| !build.is_empty());
        server.secure = new.secure;
        server.includes = new
            .includes
            .into_iter()
            .filter(|include| !include.is_empty())
            .collect();

        if !self.configuration.add_server(server.clone())? {
            return Err(Error::DuplicateName(server.name));
        }
        Ok(server)
    }

    /// Remove a server, deselecting it first if it is current.
    pub fn delete_server(&mut self, id: &str) -> Result<bool> {
        if self.current_server.as_deref() == Some(id) {
            self.set_current_server(None)?;
        }
        self.configuration.delete_server(id)
    }

    pub fn rename_server(&mut self, id: &str, new_name: &str) -> Result<bool> {
        self.configuration.rename_server(id, new_name)
    }

    // ==================== Queries ====================

    /// Whether `server` uses the RPO token scheme.
    pub fn is_safe_rpo(&self, server: &ServerDefinition) -> bool {
        server.is_safe_rpo()
    }

    pub fn is_ignore_resource(&self, file: &str) -> bool {
        resources::is_ignore_resource(file)
    }

    /// Include folders for `server`, falling back to the global list.
    ///
    /// With `absolute`, `${workspaceFolder}` and `.`-relative entries are
    /// resolved against the workspace root and entries that are not
    /// directories are dropped with a warning.
    pub fn includes(&self, server: Option<&ServerDefinition>, absolute: bool) -> IncludeResolution {
        let source = match server {
            Some(server) if !server.includes.is_empty() => &server.includes,
            _ => &self.configuration.data().includes,
        };
        let configured: Vec<String> = source
            .iter()
            .filter(|include| !include.trim().is_empty())
            .cloned()
            .collect();

        let mut resolution = IncludeResolution::default();
        if configured.is_empty() {
            resolution
                .warnings
                .push("List of folders to search for definitions not configured.".to_string());
            return resolution;
        }
        if !absolute {
            resolution.includes = configured;
            return resolution;
        }

        let root = &self.settings.workspace_root;
        for include in configured {
            let path = if include.starts_with('.') {
                root.join(&include)
            } else {
                PathBuf::from(include.replace(WORKSPACE_FOLDER_VAR, &root.to_string_lossy()))
            };
            let path = normalize(&path);
            match fs::metadata(&path) {
                Ok(meta) if meta.is_dir() => {
                    resolution.includes.push(path.to_string_lossy().into_owned());
                }
                Ok(_) => resolution.warnings.push(format!(
                    "Review the folder list in order to search for settings (.ch). Not recognized as folder: {}",
                    path.display()
                )),
                Err(_) => resolution.warnings.push(format!(
                    "Review the folder list in order to search for settings (.ch). Invalid folder: {}",
                    path.display()
                )),
            }
        }
        for warning in &resolution.warnings {
            tracing::warn!("{}", warning);
        }
        resolution
    }

    // ==================== Location ====================

    /// Switch between the workspace and home `servers.json`.
    ///
    /// The other file is loaded first; if that fails nothing changes. Then
    /// the choice is persisted and the watch moves if one was active.
    /// Returns the new file path.
    pub fn toggle_workspace_server_config(&mut self) -> Result<PathBuf> {
        let enabled = !self.settings.workspace_server_config;
        let old_file = self.file().to_path_buf();
        let new_file = server_config_file(
            &self.settings.workspace_root,
            &self.settings.home_dir,
            enabled,
        );

        let Some(configuration) = self.read_configuration(&new_file)? else {
            return Err(Error::Other(
                "cannot switch location while a load is in progress".to_string(),
            ));
        };

        if let Some(ref settings_file) = self.settings.settings_file {
            let mut user = UserSettings::load(settings_file)?;
            user.workspace_server_config = Some(enabled);
            user.save(settings_file)?;
        }

        let was_watching = self.watcher.unwatch(&old_file);
        self.settings.workspace_server_config = enabled;
        self.install(configuration)?;
        if was_watching {
            self.start_watching()?;
        }

        tracing::info!(from = %old_file.display(), to = %new_file.display(), "server configuration moved");
        self.ctx.events().publish(ChangeEvent::LocationChanged {
            old: old_file,
            new: new_file.clone(),
        });
        self.announce_loaded();
        Ok(new_file)
    }

    // ==================== Reload ====================

    /// Re-read the active file from disk.
    ///
    /// Returns `Ok(false)` when another load is already in progress.
    pub fn reload(&mut self) -> Result<bool> {
        let file = self.file().to_path_buf();
        if !self.load_from(&file)? {
            return Ok(false);
        }
        self.announce_loaded();
        Ok(true)
    }

    fn load_from(&mut self, file: &Path) -> Result<bool> {
        let Some(configuration) = self.read_configuration(file)? else {
            return Ok(false);
        };
        self.install(configuration)?;
        Ok(true)
    }

    /// Parse `file` under the load guard. `None` if a load is already running.
    fn read_configuration(&self, file: &Path) -> Result<Option<ServerConfiguration>> {
        let Some(_guard) = self.ctx.begin_load() else {
            tracing::debug!(file = %file.display(), "load already in progress");
            return Ok(None);
        };
        ServerConfiguration::load(Rc::clone(&self.ctx), file).map(Some)
    }

    fn install(&mut self, configuration: ServerConfiguration) -> Result<()> {
        self.configuration = configuration;
        let current_gone = self
            .current_server
            .as_deref()
            .is_some_and(|id| self.configuration.server_by_id(id).is_none());
        if current_gone {
            self.set_current_server(None)?;
        }
        Ok(())
    }

    fn announce_loaded(&self) {
        self.ctx.events().publish(ChangeEvent::ServersLoaded {
            file: self.file().to_path_buf(),
            count: self.servers().len(),
        });
    }

    // ==================== Watching ====================

    /// Watch the active file. Changes queue up until
    /// [`process_file_changes`](Self::process_file_changes) or
    /// [`wait_for_file_change`](Self::wait_for_file_change) handles them.
    pub fn start_watching(&mut self) -> Result<()> {
        let tx = self.changes_tx.clone();
        let file = self.file().to_path_buf();
        self.watcher.watch(&file, move |change| {
            let _ = tx.send(change);
        })
    }

    pub fn stop_watching(&mut self) -> bool {
        let file = self.file().to_path_buf();
        self.watcher.unwatch(&file)
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_watching(self.file())
    }

    /// Handle queued file notifications without blocking.
    ///
    /// Returns whether the configuration was reloaded.
    pub fn process_file_changes(&mut self) -> Result<bool> {
        let changes = self.drain_changes();
        self.handle_file_changes(changes)
    }

    /// Block up to `timeout` for a file notification, then let the burst
    /// settle and handle everything queued.
    ///
    /// Returns whether the configuration was reloaded.
    pub fn wait_for_file_change(&mut self, timeout: Duration) -> Result<bool> {
        let first = match self.changes_rx.recv_timeout(timeout) {
            Ok(change) => change,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                return Ok(false);
            }
        };
        std::thread::sleep(Duration::from_millis(DEBOUNCE_MS));

        let mut changes = vec![first];
        changes.extend(self.drain_changes());
        self.handle_file_changes(changes)
    }

    /// Queue a notification as if the watcher had delivered it.
    pub fn notify_file_change(&self, change: FileChange) {
        let _ = self.changes_tx.send(change);
    }

    fn drain_changes(&self) -> Vec<FileChange> {
        let mut changes = Vec::new();
        loop {
            match self.changes_rx.try_recv() {
                Ok(change) => changes.push(change),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        changes
    }

    fn handle_file_changes(&mut self, changes: Vec<FileChange>) -> Result<bool> {
        let file = std::path::absolute(self.file())?;
        let relevant = changes.iter().filter(|change| change.path == file).count();
        if relevant == 0 {
            return Ok(false);
        }
        if self.ctx.is_loading() {
            tracing::debug!(file = %file.display(), "load in progress, change ignored");
            return Ok(false);
        }

        if file.exists() {
            let text = fs::read_to_string(&file)?;
            if self.configuration.is_own_write(&text) {
                tracing::debug!(file = %file.display(), "ignoring own write");
                return Ok(false);
            }
        }

        tracing::info!(file = %file.display(), notifications = relevant, "server configuration changed on disk");
        self.reload()
    }

    // ==================== Language client ====================

    /// Ask the client whether the server answers, recording its build or the
    /// error it reported.
    pub fn validate_server(
        &mut self,
        id: &str,
        client: &mut dyn LanguageClient,
    ) -> Result<ServerInfo> {
        let server = self
            .configuration
            .server_by_id(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("server {}", id)))?;

        match client.validate(&server) {
            Ok(info) => {
                self.configuration.set_last_error(id, None);
                self.configuration
                    .update_build_version(id, &info.build_version, info.secure)?;
                Ok(info)
            }
            Err(err) => {
                tracing::warn!(server = %server.name, error = %err, "server validation failed");
                self.configuration.set_last_error(id, Some(err.clone()));
                Err(Error::Remote(err))
            }
        }
    }

    /// Authenticate into `environment` and make the server current.
    ///
    /// Returns the session token issued by the client.
    pub fn connect(
        &mut self,
        id: &str,
        environment: &str,
        credentials: &Credentials,
        client: &mut dyn LanguageClient,
    ) -> Result<String> {
        if environment.trim().is_empty() {
            return Err(Error::InvalidInput("environment is required".to_string()));
        }
        let server = self
            .configuration
            .server_by_id(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("server {}", id)))?;

        let token = client
            .authenticate(&server, environment, credentials)
            .map_err(Error::Remote)?;

        self.configuration.add_environment(id, environment)?;
        let username = credentials.username.clone();
        self.configuration
            .update_server(id, ServerProperty::Username, |server| {
                if server.username == username {
                    return false;
                }
                server.username = username;
                true
            })?;
        self.configuration
            .save_connection_token(id, environment, &token)?;
        self.select_server(id)?;

        tracing::info!(server = %server.name, environment, "connected");
        Ok(token)
    }

    /// Close the current server's session. Returns false if none was current.
    pub fn disconnect(&mut self, client: &mut dyn LanguageClient) -> Result<bool> {
        let Some(server) = self.current_server().cloned() else {
            return Ok(false);
        };
        client.disconnect(&server).map_err(Error::Remote)?;
        self.set_current_server(None)?;
        if !self.settings.reconnect_last_server {
            self.configuration.set_last_connected_server(None)?;
        }
        tracing::info!(server = %server.name, "disconnected");
        Ok(true)
    }
}

impl std::fmt::Debug for ServerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerManager")
            .field("file", &self.file())
            .field("current_server", &self.current_server)
            .field("watcher", &self.watcher)
            .finish()
    }
}

/// Lexically resolve `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
