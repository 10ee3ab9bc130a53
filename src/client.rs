//! Seam to the external language client.
//!
//! The application-server wire protocol (validation, authentication,
//! compilation, patches) lives in an external client library. This crate only
//! needs the handful of calls below and relays whatever error the client
//! reports without interpreting it.

use serde::{Deserialize, Serialize};

use crate::models::ServerDefinition;

/// Failure reported by the language client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct RemoteError {
    /// Error code returned by the server, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    /// Human readable message
    pub message: String,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: i64, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }
}

/// What a successful validation learns about a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub build_version: String,
    pub secure: bool,
}

/// Username and password used to authenticate into an environment.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Operations the configuration core delegates to the language client.
pub trait LanguageClient {
    /// Check that the server answers and report its build.
    fn validate(&mut self, server: &ServerDefinition) -> Result<ServerInfo, RemoteError>;

    /// Authenticate into `environment`, returning the session token.
    fn authenticate(
        &mut self,
        server: &ServerDefinition,
        environment: &str,
        credentials: &Credentials,
    ) -> Result<String, RemoteError>;

    /// Close the session held for `server`.
    fn disconnect(&mut self, server: &ServerDefinition) -> Result<(), RemoteError>;
}
