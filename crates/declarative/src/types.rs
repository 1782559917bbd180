//! Core types for remote actions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Remote API surface an action is sent to
///
/// Each surface has its own port and root path on the target system; the
/// transport maps a surface to a base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Api {
    /// Management API (databases, forests, servers, security)
    Manage,
    /// Admin API (timestamps, restart detection)
    Admin,
    /// Client REST API (documents)
    Client,
    /// Content-insertion API
    Xdbc,
}

impl Api {
    /// All API surfaces
    pub const ALL: [Api; 4] = [Api::Manage, Api::Admin, Api::Client, Api::Xdbc];

    /// Name used in configuration documents
    pub fn name(&self) -> &'static str {
        match self {
            Self::Manage => "manage",
            Self::Admin => "admin",
            Self::Client => "client",
            Self::Xdbc => "xdbc",
        }
    }

    /// Look up an API surface by its configuration name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|api| api.name() == name)
    }

    /// Default port of this surface
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Manage => 8002,
            Self::Admin => 8001,
            Self::Client | Self::Xdbc => 8000,
        }
    }

    /// Default root path of this surface
    pub fn default_root(&self) -> &'static str {
        match self {
            Self::Manage => "manage/v2",
            Self::Admin => "admin/v1",
            Self::Client => "v1",
            Self::Xdbc => "",
        }
    }
}

impl fmt::Display for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// HTTP verb of an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Get,
    Post,
    Put,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
            Self::Put => f.write_str("PUT"),
        }
    }
}

/// Request body sent with an action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum Body {
    Json(serde_json::Value),
    Text(String),
    Binary(Vec<u8>),
}

impl Body {
    /// MIME type announced for this body
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Json(_) => "application/json",
            Self::Text(_) => "text/plain",
            Self::Binary(_) => "application/octet-stream",
        }
    }

    /// Raw bytes to put on the wire
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Json(value) => value.to_string().into_bytes(),
            Self::Text(text) => text.clone().into_bytes(),
            Self::Binary(bytes) => bytes.clone(),
        }
    }

    /// Size in bytes, used for display only
    pub fn len(&self) -> usize {
        match self {
            Self::Json(value) => value.to_string().len(),
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Response returned by the transport
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Response {
    pub status: u16,
    /// Parsed JSON body, if the response carried one
    pub body: Option<serde_json::Value>,
}

impl Response {
    pub fn new(status: u16, body: Option<serde_json::Value>) -> Self {
        Self { status, body }
    }

    /// Response with a JSON body
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            body: Some(body),
        }
    }

    /// Response without a body
    pub fn empty(status: u16) -> Self {
        Self { status, body: None }
    }

    /// Check if the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if the status means the resource does not exist
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

/// Signal returned by a property update that triggered a server restart
///
/// The transport blocks on it until the remote system reports a startup
/// more recent than `last_startup`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartSignal {
    pub last_startup: String,
}

impl RestartSignal {
    /// Extract a restart signal from a property-update response
    ///
    /// The remote answers `202 Accepted` with
    /// `{"restart": {"last-startup": [{"value": "..."}]}}` when a restart is pending.
    pub fn from_response(response: &Response) -> Option<Self> {
        if response.status != 202 {
            return None;
        }
        let value = response
            .body
            .as_ref()?
            .pointer("/restart/last-startup/0/value")?
            .as_str()?;
        Some(Self {
            last_startup: value.to_string(),
        })
    }
}

/// Position of an action in its list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionState {
    Todo,
    Done,
    Error,
}

/// Counts reported after executing an action list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub done: usize,
    pub failed: usize,
    pub not_attempted: usize,
}

impl ExecuteSummary {
    /// Check if execution was fully successful
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.not_attempted == 0
    }

    /// Total number of actions in the list
    pub fn total(&self) -> usize {
        self.done + self.failed + self.not_attempted
    }
}
