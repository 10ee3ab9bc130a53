//! User preferences stored in `config.kdl`.
//!
//! These settings belong to the user, not to a workspace:
//!
//! ```kdl
//! // tds-servers preferences
//! workspace-server-config #true
//! reconnect-last-server #false
//! output-format "human"
//! ```

use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use std::fs;
use std::path::Path;

use crate::Result;

/// Output format preference for CLI commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output (default, machine-readable)
    #[default]
    Json,
    /// Human-readable output
    Human,
}

impl OutputFormat {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "human" => Some(OutputFormat::Human),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Human => "human",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserSettings {
    /// Keep `servers.json` in the workspace instead of the home directory
    pub workspace_server_config: Option<bool>,

    /// Restore the last selected server on startup
    pub reconnect_last_server: Option<bool>,

    pub output_format: Option<OutputFormat>,
}

fn bool_node(doc: &KdlDocument, name: &str) -> Option<bool> {
    doc.get(name)?.entries().first()?.value().as_bool()
}

fn push_bool(doc: &mut KdlDocument, name: &str, value: bool) {
    let mut node = KdlNode::new(name);
    node.push(KdlEntry::new(KdlValue::Bool(value)));
    doc.nodes_mut().push(node);
}

impl UserSettings {
    pub fn from_kdl(doc: &KdlDocument) -> Self {
        let output_format = doc
            .get("output-format")
            .and_then(|node| node.entries().first())
            .and_then(|entry| entry.value().as_string())
            .and_then(OutputFormat::parse);

        Self {
            workspace_server_config: bool_node(doc, "workspace-server-config"),
            reconnect_last_server: bool_node(doc, "reconnect-last-server"),
            output_format,
        }
    }

    pub fn to_kdl(&self) -> KdlDocument {
        let mut doc = KdlDocument::new();

        if let Some(value) = self.workspace_server_config {
            push_bool(&mut doc, "workspace-server-config", value);
        }
        if let Some(value) = self.reconnect_last_server {
            push_bool(&mut doc, "reconnect-last-server", value);
        }
        if let Some(format) = self.output_format {
            let mut node = KdlNode::new("output-format");
            node.push(KdlEntry::new(KdlValue::String(format.as_str().to_string())));
            doc.nodes_mut().push(node);
        }

        doc
    }

    /// Read settings from `path`. A missing file means no preferences.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        let doc: KdlDocument = text.parse()?;
        Ok(Self::from_kdl(&doc))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_kdl().to_string())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::parse("HUMAN"), Some(OutputFormat::Human));
        assert_eq!(OutputFormat::parse("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("xml"), None);
    }

    #[test]
    fn test_from_kdl() {
        let doc: KdlDocument = r#"
            workspace-server-config #true
            output-format "human"
        "#
        .parse()
        .unwrap();
        let settings = UserSettings::from_kdl(&doc);
        assert_eq!(settings.workspace_server_config, Some(true));
        assert_eq!(settings.reconnect_last_server, None);
        assert_eq!(settings.output_format, Some(OutputFormat::Human));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.kdl");

        assert_eq!(UserSettings::load(&path).unwrap(), UserSettings::default());

        let settings = UserSettings {
            workspace_server_config: Some(false),
            reconnect_last_server: Some(true),
            output_format: None,
        };
        settings.save(&path).unwrap();
        assert_eq!(UserSettings::load(&path).unwrap(), settings);
    }
}
