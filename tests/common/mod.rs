//! Common test utilities for tds-servers integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't touch the
//! user's `~/.totvsls/servers.json` or `~/.config/tds-servers/`.

#![allow(dead_code)]

use assert_cmd::Command;
use std::path::{Path, PathBuf};
pub use tempfile::TempDir;

/// A test environment with isolated directories.
///
/// - `workspace_dir`: the workspace the command runs in
/// - `home_dir`: stands in for the home directory (via `TDS_HOME`)
/// - `config_dir`: holds `config.kdl` (via `TDS_CONFIG_DIR`)
///
/// The `tds()` method sets the env vars per invocation, keeping tests
/// parallel-safe.
pub struct TestEnv {
    pub workspace_dir: TempDir,
    pub home_dir: TempDir,
    pub config_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            workspace_dir: TempDir::new().unwrap(),
            home_dir: TempDir::new().unwrap(),
            config_dir: TempDir::new().unwrap(),
        }
    }

    /// Get a Command for the tds-servers binary with isolated directories.
    pub fn tds(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_tds-servers"));
        cmd.current_dir(self.workspace_dir.path());
        cmd.env("TDS_HOME", self.home_dir.path());
        cmd.env("TDS_CONFIG_DIR", self.config_dir.path());
        cmd.env_remove("TDS_WORKSPACE");
        cmd.env_remove("TDS_WORKSPACE_SERVER_CONFIG");
        cmd.env_remove("TDS_LOG");
        cmd
    }

    /// Run a command expected to succeed and parse its JSON output.
    pub fn json(&self, args: &[&str]) -> serde_json::Value {
        let output = self.tds().args(args).output().unwrap();
        assert!(
            output.status.success(),
            "command {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap()
    }

    /// Add a server and return its id.
    pub fn add_server(&self, name: &str, build: Option<&str>) -> String {
        let mut args = vec!["add", name, "--address", "localhost", "--port", "1234"];
        if let Some(build) = build {
            args.extend(["--build", build]);
        }
        let result = self.json(&args);
        result["id"].as_str().unwrap().to_string()
    }

    pub fn workspace_path(&self) -> &Path {
        self.workspace_dir.path()
    }

    /// The global servers.json.
    pub fn global_servers_file(&self) -> PathBuf {
        self.home_dir.path().join(".totvsls").join("servers.json")
    }

    /// The workspace servers.json.
    pub fn workspace_servers_file(&self) -> PathBuf {
        self.workspace_dir.path().join(".vscode").join("servers.json")
    }

    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.path().join("config.kdl")
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
