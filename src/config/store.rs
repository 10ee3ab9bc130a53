//! In-memory owner of one `servers.json`.
//!
//! Every mutating call writes the whole file back and then publishes a
//! [`ChangeEvent`]. There is no transaction across calls: each one is its own
//! commit, applied in call order.

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::client::RemoteError;
use crate::config::schema::{self, ServerConfigFile};
use crate::context::Context;
use crate::events::{ChangeEvent, ServerProperty};
use crate::models::{CompileKey, RpoToken, SavedToken, ServerDefinition, TokenKind};
use crate::{Error, Result};

#[derive(Debug)]
pub struct ServerConfiguration {
    ctx: Rc<Context>,
    file: PathBuf,
    data: ServerConfigFile,
    // Text of the last write, to recognise our own changes in the watcher
    last_written: Option<String>,
}

impl ServerConfiguration {
    /// Load `file`, writing a default document first if it does not exist.
    pub fn load(ctx: Rc<Context>, file: &Path) -> Result<Self> {
        let mut last_written = None;
        if !file.exists() {
            if let Some(parent) = file.parent() {
                fs::create_dir_all(parent)?;
            }
            let text = schema::to_json_text(&ServerConfigFile::default())?;
            fs::write(file, &text)?;
            tracing::info!(file = %file.display(), "created default server configuration");
            last_written = Some(text);
        }

        let text = fs::read_to_string(file)?;
        let (data, notes) = schema::parse(&text, file)?;
        for note in &notes {
            tracing::warn!(file = %file.display(), "{}", note);
        }
        tracing::info!(
            file = %file.display(),
            servers = data.configurations.len(),
            "loaded server configuration"
        );

        Ok(Self {
            ctx,
            file: file.to_path_buf(),
            data,
            last_written,
        })
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn data(&self) -> &ServerConfigFile {
        &self.data
    }

    /// True when `text` is exactly what this configuration last wrote.
    pub fn is_own_write(&self, text: &str) -> bool {
        self.last_written.as_deref() == Some(text)
    }

    /// Write the whole configuration to its file.
    ///
    /// Skipped while a reload holds the context's load guard.
    pub fn save(&mut self) -> Result<()> {
        if self.ctx.is_loading() {
            tracing::debug!(file = %self.file.display(), "load in progress, save skipped");
            return Ok(());
        }

        let text = schema::to_json_text(&self.data)?;
        if let Some(parent) = self.file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.file, &text)?;
        tracing::debug!(file = %self.file.display(), bytes = text.len(), "saved server configuration");
        self.last_written = Some(text);
        Ok(())
    }

    fn publish(&self, event: ChangeEvent) {
        self.ctx.events().publish(event);
    }

    // ==================== Servers ====================

    pub fn servers(&self) -> &[ServerDefinition] {
        &self.data.configurations
    }

    pub fn server_by_id(&self, id: &str) -> Option<&ServerDefinition> {
        self.data.configurations.iter().find(|s| s.id == id)
    }

    pub fn server_by_name(&self, name: &str) -> Option<&ServerDefinition> {
        self.data.configurations.iter().find(|s| s.name == name)
    }

    /// Append `server` unless another server already uses its name.
    ///
    /// Returns `Ok(false)` without touching anything on a duplicate name.
    pub fn add_server(&mut self, server: ServerDefinition) -> Result<bool> {
        if self.server_by_name(&server.name).is_some() {
            tracing::debug!(name = %server.name, "server name already exists");
            return Ok(false);
        }

        self.data.configurations.push(server.clone());
        self.save()?;
        self.publish(ChangeEvent::ServerAdded { server });
        Ok(true)
    }

    /// Remove the server with `id`. Returns whether one was found.
    pub fn delete_server(&mut self, id: &str) -> Result<bool> {
        let Some(index) = self.data.configurations.iter().position(|s| s.id == id) else {
            return Ok(false);
        };

        let server = self.data.configurations.remove(index);
        if self.data.last_connected_server == server.id {
            self.data.last_connected_server.clear();
        }
        self.data
            .saved_tokens
            .retain(|saved| saved.1.id != server.id);
        self.save()?;
        self.publish(ChangeEvent::ServerRemoved { server });
        Ok(true)
    }

    /// Rename the server with `id`. Returns whether one was found.
    ///
    /// Fails with [`Error::DuplicateName`] when another server already uses
    /// `new_name`.
    pub fn rename_server(&mut self, id: &str, new_name: &str) -> Result<bool> {
        if new_name.trim().is_empty() {
            return Err(Error::InvalidInput("server name cannot be empty".to_string()));
        }
        if self
            .data
            .configurations
            .iter()
            .any(|s| s.name == new_name && s.id != id)
        {
            return Err(Error::DuplicateName(new_name.to_string()));
        }
        let Some(server) = self.data.configurations.iter_mut().find(|s| s.id == id) else {
            return Ok(false);
        };

        let old = std::mem::replace(&mut server.name, new_name.to_string());
        self.save()?;
        self.publish(ChangeEvent::ServerRenamed {
            id: id.to_string(),
            old,
            new: new_name.to_string(),
        });
        Ok(true)
    }

    /// Apply `change` to the server with `id`, persist and announce it.
    ///
    /// `change` returns whether it modified anything; an unchanged server is
    /// neither saved nor announced. Returns `Ok(None)` when no server has
    /// `id`, otherwise `Ok(Some(changed))`.
    pub fn update_server<F>(
        &mut self,
        id: &str,
        property: ServerProperty,
        change: F,
    ) -> Result<Option<bool>>
    where
        F: FnOnce(&mut ServerDefinition) -> bool,
    {
        let Some(server) = self.data.configurations.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        if !change(&mut *server) {
            return Ok(Some(false));
        }

        let server = server.clone();
        self.save()?;
        self.publish(ChangeEvent::ServerChanged { server, property });
        Ok(Some(true))
    }

    pub fn add_environment(&mut self, id: &str, environment: &str) -> Result<Option<bool>> {
        self.update_server(id, ServerProperty::Environments, |server| {
            server.add_environment(environment)
        })
    }

    pub fn remove_environment(&mut self, id: &str, environment: &str) -> Result<Option<bool>> {
        self.update_server(id, ServerProperty::Environments, |server| {
            server.remove_environment(environment)
        })
    }

    /// Replace a server's own include folders. Empty entries are dropped.
    pub fn set_server_includes(&mut self, id: &str, includes: Vec<String>) -> Result<Option<bool>> {
        let includes = clean_includes(includes);
        self.update_server(id, ServerProperty::Includes, |server| {
            if server.includes == includes {
                return false;
            }
            server.includes = includes;
            true
        })
    }

    /// Record what a validation learned about a server.
    pub fn update_build_version(
        &mut self,
        id: &str,
        build_version: &str,
        secure: bool,
    ) -> Result<Option<bool>> {
        if build_version.is_empty() {
            return Err(Error::InvalidInput("build version cannot be empty".to_string()));
        }
        self.update_server(id, ServerProperty::BuildVersion, |server| {
            if server.build_version.as_deref() == Some(build_version) && server.secure == secure {
                return false;
            }
            server.build_version = Some(build_version.to_string());
            server.secure = secure;
            true
        })
    }

    pub fn update_patch_generate_dir(&mut self, id: &str, dir: &str) -> Result<Option<bool>> {
        if dir.is_empty() {
            return Err(Error::InvalidInput("patch directory cannot be empty".to_string()));
        }
        self.update_server(id, ServerProperty::PatchGenerateDir, |server| {
            if server.patch_generate_dir == dir {
                return false;
            }
            server.patch_generate_dir = dir.to_string();
            true
        })
    }

    /// Path of the SmartClient executable used to run programs on this server.
    pub fn update_smartclient_bin(&mut self, id: &str, path: &str) -> Result<Option<bool>> {
        if path.is_empty() {
            return Err(Error::InvalidInput("smart client path cannot be empty".to_string()));
        }
        self.update_server(id, ServerProperty::SmartclientBin, |server| {
            if server.smartclient_bin == path {
                return false;
            }
            server.smartclient_bin = path.to_string();
            true
        })
    }

    /// Remember the outcome of the last validation. Never persisted.
    pub fn set_last_error(&mut self, id: &str, error: Option<RemoteError>) -> bool {
        match self.data.configurations.iter_mut().find(|s| s.id == id) {
            Some(server) => {
                server.last_error = error;
                true
            }
            None => false,
        }
    }

    // ==================== Includes ====================

    /// Global include folders.
    pub fn includes(&self) -> &[String] {
        &self.data.includes
    }

    pub fn set_includes(&mut self, includes: Vec<String>) -> Result<()> {
        let includes = clean_includes(includes);
        if includes == self.data.includes {
            return Ok(());
        }
        let old = std::mem::replace(&mut self.data.includes, includes.clone());
        self.save()?;
        self.publish(ChangeEvent::IncludesChanged { old, new: includes });
        Ok(())
    }

    // ==================== Authorization ====================

    pub fn permissions_infos(&self) -> Option<&CompileKey> {
        self.data.permissions.authorizationtoken.as_ref()
    }

    /// Replace the compile key. `None` deletes it.
    pub fn save_permissions_infos(&mut self, infos: Option<CompileKey>) -> Result<()> {
        let old = std::mem::replace(&mut self.data.permissions.authorizationtoken, infos);
        self.save()?;
        self.publish(ChangeEvent::TokenChanged {
            kind: TokenKind::CompileKey,
            old: old.map(|key| key.authorization_token),
            new: self
                .permissions_infos()
                .map(|key| key.authorization_token.clone()),
        });
        Ok(())
    }

    pub fn set_compile_key(&mut self, key: CompileKey) -> Result<()> {
        self.save_permissions_infos(Some(key))
    }

    pub fn delete_permissions_infos(&mut self) -> Result<()> {
        self.save_permissions_infos(None)
    }

    pub fn rpo_token_infos(&self) -> Option<&RpoToken> {
        self.data.rpo_token.as_ref()
    }

    /// Replace the RPO token. `None` deletes it.
    pub fn save_rpo_token_infos(&mut self, infos: Option<RpoToken>) -> Result<()> {
        let old = std::mem::replace(&mut self.data.rpo_token, infos);
        self.save()?;
        self.publish(ChangeEvent::TokenChanged {
            kind: TokenKind::RpoToken,
            old: old.map(|token| token.token),
            new: self.rpo_token_infos().map(|token| token.token.clone()),
        });
        Ok(())
    }

    /// Token `server` must present: the RPO token for safe-RPO builds, the
    /// compile key otherwise. Empty when nothing has been stored yet.
    pub fn authorization_token(&self, server: &ServerDefinition) -> String {
        if server.is_safe_rpo() {
            self.rpo_token_infos()
                .map(|token| token.token.clone())
                .unwrap_or_default()
        } else {
            self.permissions_infos()
                .map(|key| key.authorization_token.clone())
                .unwrap_or_default()
        }
    }

    /// Drop whichever credential `server` would use.
    pub fn clear_authorization_token(&mut self, server: &ServerDefinition) -> Result<()> {
        if server.is_safe_rpo() {
            self.save_rpo_token_infos(None)
        } else {
            self.save_permissions_infos(None)
        }
    }

    // ==================== Sessions ====================

    pub fn saved_tokens(&self) -> &[SavedToken] {
        &self.data.saved_tokens
    }

    pub fn saved_token(&self, server_id: &str, environment: &str) -> Option<&str> {
        let key = SavedToken::key(server_id, environment);
        self.data
            .saved_tokens
            .iter()
            .find(|saved| saved.0 == key)
            .map(SavedToken::token)
    }

    /// Store the session token for a server/environment pair, replacing any
    /// previous one.
    pub fn save_connection_token(
        &mut self,
        server_id: &str,
        environment: &str,
        token: &str,
    ) -> Result<()> {
        let saved = SavedToken::new(server_id, environment, token);
        match self.data.saved_tokens.iter_mut().find(|s| s.0 == saved.0) {
            Some(existing) => *existing = saved,
            None => self.data.saved_tokens.push(saved),
        }
        self.save()
    }

    pub fn remove_saved_token(&mut self, server_id: &str, environment: &str) -> Result<bool> {
        let key = SavedToken::key(server_id, environment);
        let before = self.data.saved_tokens.len();
        self.data.saved_tokens.retain(|saved| saved.0 != key);
        if before == self.data.saved_tokens.len() {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// Id of the server selected last, if any.
    pub fn last_connected_server(&self) -> Option<&str> {
        let id = self.data.last_connected_server.as_str();
        (!id.is_empty()).then_some(id)
    }

    pub fn set_last_connected_server(&mut self, id: Option<&str>) -> Result<()> {
        let id = id.unwrap_or_default();
        if self.data.last_connected_server == id {
            return Ok(());
        }
        self.data.last_connected_server = id.to_string();
        self.save()
    }
}

fn clean_includes(includes: Vec<String>) -> Vec<String> {
    includes
        .into_iter()
        .map(|include| include.trim().to_string())
        .filter(|include| !include.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        ctx: Rc<Context>,
        file: PathBuf,
        events: Rc<RefCell<Vec<ChangeEvent>>>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let file = dir.path().join(".totvsls").join("servers.json");
            let ctx = Context::new();
            let events = Rc::new(RefCell::new(Vec::new()));
            let sink = Rc::clone(&events);
            ctx.events()
                .subscribe(move |event| sink.borrow_mut().push(event.clone()));
            Self {
                _dir: dir,
                ctx,
                file,
                events,
            }
        }

        fn load(&self) -> ServerConfiguration {
            ServerConfiguration::load(Rc::clone(&self.ctx), &self.file).unwrap()
        }

        fn event_count(&self) -> usize {
            self.events.borrow().len()
        }
    }

    #[test]
    fn test_load_creates_default_file() {
        let fx = Fixture::new();
        let config = fx.load();
        assert!(fx.file.exists());
        assert!(config.servers().is_empty());
        assert_eq!(config.includes(), &[String::new()]);
        assert!(config.is_own_write(&fs::read_to_string(&fx.file).unwrap()));
    }

    #[test]
    fn test_load_tolerates_comments() {
        let fx = Fixture::new();
        fs::create_dir_all(fx.file.parent().unwrap()).unwrap();
        fs::write(
            &fx.file,
            r#"{
                // servers shared by the team
                "version": "0.2.1",
                "configurations": [
                    { "id": "a1", "name": "dev", "address": "localhost", "port": 1234 } /* local */
                ]
            }"#,
        )
        .unwrap();
        let config = fx.load();
        assert_eq!(config.servers().len(), 1);
        assert!(config.saved_tokens().is_empty());
    }

    #[test]
    fn test_load_parse_error_is_surfaced() {
        let fx = Fixture::new();
        fs::create_dir_all(fx.file.parent().unwrap()).unwrap();
        fs::write(&fx.file, "{ not json").unwrap();
        let err = ServerConfiguration::load(Rc::clone(&fx.ctx), &fx.file).unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
    }

    #[test]
    fn test_add_servers_with_distinct_names() {
        let fx = Fixture::new();
        let mut config = fx.load();
        for n in 0..5 {
            let server = ServerDefinition::new(format!("srv-{}", n), "localhost", 1234);
            assert!(config.add_server(server).unwrap());
        }
        assert_eq!(config.servers().len(), 5);
        assert_eq!(fx.event_count(), 5);
    }

    #[test]
    fn test_add_duplicate_name_is_rejected() {
        let fx = Fixture::new();
        let mut config = fx.load();
        config
            .add_server(ServerDefinition::new("dev", "localhost", 1234))
            .unwrap();
        let before = fs::read_to_string(&fx.file).unwrap();

        // Different id, same name
        let duplicate = ServerDefinition::new("dev", "10.0.0.2", 4321);
        assert!(!config.add_server(duplicate).unwrap());
        assert_eq!(config.servers().len(), 1);
        assert_eq!(fx.event_count(), 1);
        assert_eq!(fs::read_to_string(&fx.file).unwrap(), before);
    }

    #[test]
    fn test_delete_twice() {
        let fx = Fixture::new();
        let mut config = fx.load();
        let server = ServerDefinition::new("dev", "localhost", 1234);
        let id = server.id.clone();
        config.add_server(server).unwrap();
        config
            .add_server(ServerDefinition::new("prod", "localhost", 1235))
            .unwrap();

        assert!(config.delete_server(&id).unwrap());
        assert_eq!(config.servers().len(), 1);
        assert!(!config.delete_server(&id).unwrap());
        assert_eq!(config.servers().len(), 1);
        assert!(matches!(
            fx.events.borrow().last(),
            Some(ChangeEvent::ServerRemoved { .. })
        ));
    }

    #[test]
    fn test_rename_persists() {
        let fx = Fixture::new();
        let mut config = fx.load();
        let server = ServerDefinition::new("dev", "localhost", 1234);
        let id = server.id.clone();
        config.add_server(server).unwrap();

        assert!(config.rename_server(&id, "development").unwrap());
        assert_eq!(config.server_by_id(&id).unwrap().name, "development");
        assert!(!config.rename_server("missing", "x").unwrap());

        let reloaded = fx.load();
        assert_eq!(reloaded.server_by_id(&id).unwrap().name, "development");
    }

    #[test]
    fn test_rename_onto_existing_name_fails() {
        let fx = Fixture::new();
        let mut config = fx.load();
        let server = ServerDefinition::new("dev", "localhost", 1234);
        let id = server.id.clone();
        config.add_server(server).unwrap();
        config
            .add_server(ServerDefinition::new("prod", "localhost", 1235))
            .unwrap();

        let err = config.rename_server(&id, "prod").unwrap_err();
        assert!(matches!(err, Error::DuplicateName(name) if name == "prod"));
        // Renaming to its own name is fine
        assert!(config.rename_server(&id, "dev").unwrap());
    }

    #[test]
    fn test_save_load_round_trip() {
        let fx = Fixture::new();
        let mut config = fx.load();
        let mut server = ServerDefinition::new("dev", "localhost", 1234);
        server.build_version = Some("7.00.210324P".to_string());
        server.includes = vec!["/opt/includes".to_string()];
        server.environments = vec!["P12".to_string()];
        server.last_error = Some(crate::client::RemoteError::new("unreachable"));
        let id = server.id.clone();
        config.add_server(server).unwrap();
        config.set_includes(vec!["/inc".to_string()]).unwrap();
        config
            .set_compile_key(CompileKey {
                authorization_token: "KEY".to_string(),
                expire: "01/01/2030".to_string(),
                build_type: "1".to_string(),
                ..Default::default()
            })
            .unwrap();
        config
            .save_rpo_token_infos(Some(RpoToken::new("RPO")))
            .unwrap();
        config.save_connection_token(&id, "P12", "sess").unwrap();

        let reloaded = fx.load();
        let mut expected = config.data().clone();
        expected.configurations[0].last_error = None;
        assert_eq!(reloaded.data(), &expected);
    }

    #[test]
    fn test_token_events_and_delete() {
        let fx = Fixture::new();
        let mut config = fx.load();
        config
            .save_rpo_token_infos(Some(RpoToken::new("first")))
            .unwrap();
        config.save_rpo_token_infos(None).unwrap();

        let events = fx.events.borrow();
        assert_eq!(
            events[1],
            ChangeEvent::TokenChanged {
                kind: TokenKind::RpoToken,
                old: Some("first".to_string()),
                new: None,
            }
        );
        assert!(config.rpo_token_infos().is_none());
    }

    #[test]
    fn test_authorization_token_follows_build() {
        let fx = Fixture::new();
        let mut config = fx.load();
        let mut legacy = ServerDefinition::new("legacy", "localhost", 1);
        legacy.build_version = Some("7.00.170117A".to_string());
        let mut safe = ServerDefinition::new("safe", "localhost", 2);
        safe.build_version = Some("7.00.191205Q".to_string());

        assert_eq!(config.authorization_token(&legacy), "");
        assert_eq!(config.authorization_token(&safe), "");

        config
            .set_compile_key(CompileKey {
                authorization_token: "LEGACY".to_string(),
                ..Default::default()
            })
            .unwrap();
        config
            .save_rpo_token_infos(Some(RpoToken::new("SAFE")))
            .unwrap();
        assert_eq!(config.authorization_token(&legacy), "LEGACY");
        assert_eq!(config.authorization_token(&safe), "SAFE");

        config.clear_authorization_token(&safe).unwrap();
        assert_eq!(config.authorization_token(&safe), "");
        assert_eq!(config.authorization_token(&legacy), "LEGACY");
    }

    #[test]
    fn test_save_skipped_while_loading() {
        let fx = Fixture::new();
        let mut config = fx.load();
        let before = fs::read_to_string(&fx.file).unwrap();
        {
            let _guard = fx.ctx.begin_load().unwrap();
            config
                .add_server(ServerDefinition::new("dev", "localhost", 1234))
                .unwrap();
            assert_eq!(fs::read_to_string(&fx.file).unwrap(), before);
        }
        config.save().unwrap();
        assert_ne!(fs::read_to_string(&fx.file).unwrap(), before);
    }

    #[test]
    fn test_environments_through_store() {
        let fx = Fixture::new();
        let mut config = fx.load();
        let server = ServerDefinition::new("dev", "localhost", 1234);
        let id = server.id.clone();
        config.add_server(server).unwrap();

        assert_eq!(config.add_environment(&id, "P12").unwrap(), Some(true));
        assert_eq!(config.add_environment(&id, "p12").unwrap(), Some(false));
        assert_eq!(config.add_environment("nope", "P12").unwrap(), None);
        assert_eq!(config.remove_environment(&id, "P12").unwrap(), Some(true));

        let changed = fx
            .events
            .borrow()
            .iter()
            .filter(|e| matches!(e, ChangeEvent::ServerChanged { .. }))
            .count();
        assert_eq!(changed, 2);
    }

    #[test]
    fn test_patch_dir_and_smartclient_updates() {
        let fx = Fixture::new();
        let mut config = fx.load();
        let server = ServerDefinition::new("dev", "localhost", 1234);
        let id = server.id.clone();
        config.add_server(server).unwrap();

        assert_eq!(config.update_patch_generate_dir(&id, "/tmp/patches").unwrap(), Some(true));
        assert_eq!(config.update_patch_generate_dir(&id, "/tmp/patches").unwrap(), Some(false));
        assert_eq!(config.update_smartclient_bin(&id, "/opt/sc/smartclient").unwrap(), Some(true));
        assert_eq!(config.update_smartclient_bin("nope", "/opt/sc/smartclient").unwrap(), None);
        assert!(matches!(
            config.update_patch_generate_dir(&id, ""),
            Err(Error::InvalidInput(_))
        ));

        let properties: Vec<ServerProperty> = fx
            .events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                ChangeEvent::ServerChanged { property, .. } => Some(*property),
                _ => None,
            })
            .collect();
        assert_eq!(
            properties,
            vec![ServerProperty::PatchGenerateDir, ServerProperty::SmartclientBin]
        );

        let reloaded = fx.load();
        let stored = reloaded.server_by_id(&id).unwrap();
        assert_eq!(stored.patch_generate_dir, "/tmp/patches");
        assert_eq!(stored.smartclient_bin, "/opt/sc/smartclient");
    }

    #[test]
    fn test_saved_tokens() {
        let fx = Fixture::new();
        let mut config = fx.load();
        config.save_connection_token("id1", "P12", "a").unwrap();
        config.save_connection_token("id1", "P12", "b").unwrap();
        config.save_connection_token("id1", "TEST", "c").unwrap();
        assert_eq!(config.saved_tokens().len(), 2);
        assert_eq!(config.saved_token("id1", "P12"), Some("b"));

        assert!(config.remove_saved_token("id1", "P12").unwrap());
        assert!(!config.remove_saved_token("id1", "P12").unwrap());
        assert_eq!(config.saved_token("id1", "P12"), None);
    }

    #[test]
    fn test_delete_clears_last_connected_and_sessions() {
        let fx = Fixture::new();
        let mut config = fx.load();
        let server = ServerDefinition::new("dev", "localhost", 1234);
        let id = server.id.clone();
        config.add_server(server).unwrap();
        config.set_last_connected_server(Some(&id)).unwrap();
        config.save_connection_token(&id, "P12", "t").unwrap();

        config.delete_server(&id).unwrap();
        assert_eq!(config.last_connected_server(), None);
        assert!(config.saved_tokens().is_empty());
    }

    #[test]
    fn test_set_includes_drops_blank_entries() {
        let fx = Fixture::new();
        let mut config = fx.load();
        config
            .set_includes(vec!["/a".to_string(), "  ".to_string(), "/b".to_string()])
            .unwrap();
        assert_eq!(config.includes(), &["/a".to_string(), "/b".to_string()]);
        let count = fx.event_count();
        config
            .set_includes(vec!["/a".to_string(), "/b".to_string()])
            .unwrap();
        assert_eq!(fx.event_count(), count);
    }
}
