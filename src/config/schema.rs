//! On-disk shape of `servers.json`.
//!
//! This module provides:
//! - the serde structs for the file
//! - default values for a freshly created file
//! - comment stripping for hand-edited files
//! - compatibility fixups for files written by older tool versions
//! - key sanitising applied before every write

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use std::path::Path;

use crate::models::{CompileKey, RpoToken, SavedToken, ServerDefinition};
use crate::{Error, Result};

/// File format version written by this crate.
pub const CONFIG_VERSION: &str = "0.2.1";

/// Keys starting with this prefix are internal and never persisted.
pub const INTERNAL_KEY_PREFIX: &str = "__";

/// Contents of one `servers.json`.
///
/// # JSON Schema
///
/// ```json
/// {
///     "version": "0.2.1",
///     "includes": [""],
///     "permissions": { "authorizationtoken": "" },
///     "configurations": [],
///     "savedTokens": [],
///     "lastConnectedServer": ""
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfigFile {
    #[serde(default = "default_version")]
    pub version: String,

    /// Include folders shared by servers that have none of their own
    #[serde(default = "default_includes")]
    pub includes: Vec<String>,

    #[serde(default)]
    pub permissions: Permissions,

    /// Server definitions
    #[serde(default)]
    pub configurations: Vec<ServerDefinition>,

    #[serde(default)]
    pub saved_tokens: Vec<SavedToken>,

    /// Id of the server selected last, or empty
    #[serde(default)]
    pub last_connected_server: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpo_token: Option<RpoToken>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smart_client_bin: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_version() -> String {
    CONFIG_VERSION.to_string()
}

fn default_includes() -> Vec<String> {
    vec![String::new()]
}

impl Default for ServerConfigFile {
    fn default() -> Self {
        Self {
            version: default_version(),
            includes: default_includes(),
            permissions: Permissions::default(),
            configurations: Vec::new(),
            saved_tokens: Vec::new(),
            last_connected_server: String::new(),
            rpo_token: None,
            smart_client_bin: None,
            extra: Map::new(),
        }
    }
}

/// The `permissions` block. An absent compile key is stored as `""`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default, with = "compile_key_or_empty")]
    pub authorizationtoken: Option<CompileKey>,
}

mod compile_key_or_empty {
    use super::*;
    use serde::de::Error as _;

    pub fn serialize<S: Serializer>(
        value: &Option<CompileKey>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        match value {
            Some(key) => key.serialize(serializer),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Option<CompileKey>, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null | Value::String(_) => Ok(None),
            value @ Value::Object(_) => serde_json::from_value(value)
                .map(Some)
                .map_err(D::Error::custom),
            other => Err(D::Error::custom(format!(
                "expected a compile key object, found {}",
                other
            ))),
        }
    }
}

/// Blank out `//` and `/* */` comments, leaving string literals alone.
///
/// Comment characters become spaces and newlines are kept, so parse errors
/// still point at the right line.
pub fn strip_json_comments(text: &str) -> String {
    #[derive(PartialEq)]
    enum State {
        Code,
        String,
        LineComment,
        BlockComment,
    }

    let mut out = String::with_capacity(text.len());
    let mut state = State::Code;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Code => match (c, chars.peek()) {
                ('"', _) => {
                    state = State::String;
                    out.push(c);
                }
                ('/', Some('/')) => {
                    chars.next();
                    state = State::LineComment;
                    out.push_str("  ");
                }
                ('/', Some('*')) => {
                    chars.next();
                    state = State::BlockComment;
                    out.push_str("  ");
                }
                _ => out.push(c),
            },
            State::String => {
                out.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == '"' {
                    state = State::Code;
                }
            }
            State::LineComment => {
                if c == '\n' {
                    state = State::Code;
                    out.push(c);
                } else if c == '\r' {
                    out.push(c);
                } else {
                    out.push(' ');
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Code;
                    out.push_str("  ");
                } else if c == '\n' || c == '\r' {
                    out.push(c);
                } else {
                    out.push(' ');
                }
            }
        }
    }

    out
}

/// Bring documents written by older versions up to the current shape.
///
/// Returns a note for every change made, for logging.
pub fn apply_compat_fixups(doc: &mut Map<String, Value>) -> Vec<String> {
    let mut notes = Vec::new();

    // lastConnectedServer used to hold the whole server object
    let last_connected = match doc.get("lastConnectedServer") {
        Some(Value::String(_)) | None => None,
        Some(Value::Object(server)) => {
            let id = server
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Some((id.clone(), format!("lastConnectedServer object collapsed to id '{}'", id)))
        }
        Some(other) => Some((String::new(), format!("lastConnectedServer {} reset", other))),
    };
    if let Some((id, note)) = last_connected {
        doc.insert("lastConnectedServer".to_string(), Value::String(id));
        notes.push(note);
    }

    // savedTokens must always exist and only hold well-formed pairs
    let saved_tokens = match doc.remove("savedTokens") {
        Some(Value::Array(mut entries)) => {
            let before = entries.len();
            entries.retain(|entry| serde_json::from_value::<SavedToken>(entry.clone()).is_ok());
            let dropped = before - entries.len();
            if dropped > 0 {
                notes.push(format!("dropped {} malformed savedTokens entries", dropped));
            }
            entries
        }
        Some(Value::Null) | None => Vec::new(),
        Some(_) => {
            notes.push("savedTokens was not a list, reset".to_string());
            Vec::new()
        }
    };
    doc.insert("savedTokens".to_string(), Value::Array(saved_tokens));

    if matches!(doc.get("permissions"), Some(Value::Null)) {
        doc.remove("permissions");
        notes.push("null permissions block removed".to_string());
    }

    for key in ["includes", "configurations"] {
        if matches!(doc.get(key), Some(Value::Null)) {
            doc.remove(key);
            notes.push(format!("null {} removed", key));
        }
    }

    notes
}

/// Parse `servers.json` text into a [`ServerConfigFile`].
///
/// Empty text yields the default configuration. Returns the compatibility
/// notes alongside the parsed file.
pub fn parse(text: &str, path: &Path) -> Result<(ServerConfigFile, Vec<String>)> {
    let stripped = strip_json_comments(text);
    if stripped.trim().is_empty() {
        return Ok((ServerConfigFile::default(), Vec::new()));
    }

    let parse_error = |message: String| Error::ConfigParse {
        path: path.to_path_buf(),
        message,
    };

    let value: Value = serde_json::from_str(&stripped).map_err(|e| parse_error(e.to_string()))?;
    let Value::Object(mut doc) = value else {
        return Err(parse_error("expected a JSON object at the top level".to_string()));
    };

    let notes = apply_compat_fixups(&mut doc);
    let config: ServerConfigFile =
        serde_json::from_value(Value::Object(doc)).map_err(|e| parse_error(e.to_string()))?;
    Ok((config, notes))
}

/// Drop internal keys and strip one leading underscore from the rest.
///
/// When both `_x` and `x` are present, `x` is kept and `_x` is dropped with a
/// warning.
pub fn sanitize_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let clashing: Vec<String> = map
                .keys()
                .filter_map(|key| key.strip_prefix('_'))
                .filter(|plain| map.contains_key(*plain))
                .map(str::to_string)
                .collect();

            let mut out = Map::new();
            for (key, value) in map {
                if key.starts_with(INTERNAL_KEY_PREFIX) {
                    continue;
                }
                let key = if let Some(plain) = key.strip_prefix('_') {
                    if clashing.iter().any(|c| c == plain) {
                        tracing::warn!(key = %key, "dropped key that clashes with '{}'", plain);
                        continue;
                    }
                    plain.to_string()
                } else {
                    key
                };
                out.insert(key, sanitize_keys(value));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_keys).collect()),
        other => other,
    }
}

/// Serialize to the tab-indented text written to disk.
pub fn to_json_text(config: &ServerConfigFile) -> Result<String> {
    let value = sanitize_keys(serde_json::to_value(config)?);

    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"\t"));
    value.serialize(&mut serializer)?;
    String::from_utf8(buf).map_err(|e| Error::Other(e.to_string()))
}
