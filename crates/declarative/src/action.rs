//! Remote actions
//!
//! An [`Action`] is one remote operation planned during reconciliation.
//! Each variant carries exactly what its execution needs, and serializes
//! to a self-describing record so a plan can be captured and replayed.

use crate::context::Transport;
use crate::error::{Error, Result};
use crate::types::{Api, Body, Response, RestartSignal, Verb};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;

/// Security and registry resources managed through the generic
/// create/update actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    MimeType,
    Role,
    User,
}

impl ResourceKind {
    /// Collection path segment on the management API
    pub fn segment(&self) -> &'static str {
        match self {
            Self::MimeType => "mimetypes",
            Self::Role => "roles",
            Self::User => "users",
        }
    }

    /// Human-readable kind name
    pub fn label(&self) -> &'static str {
        match self {
            Self::MimeType => "mime type",
            Self::Role => "role",
            Self::User => "user",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One planned remote operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Action {
    /// Retrieve the list of all forests
    ListForests,
    /// Retrieve a property document (absent when the remote answers 404)
    GetProperties { api: Api, url: String },
    CreateDatabase { name: String, body: Value },
    CreateForest { name: String, database: String },
    AttachForest { forest: String, database: String },
    DetachForest { forest: String, database: String },
    UpdateDatabaseProperty {
        database: String,
        property: String,
        body: Value,
    },
    CreateServer {
        name: String,
        group: String,
        body: Value,
    },
    /// Update a server property; may trigger a blocking restart wait
    UpdateServerProperty {
        server: String,
        group: String,
        property: String,
        body: Value,
    },
    CreateResource {
        kind: ResourceKind,
        name: String,
        body: Value,
    },
    UpdateResourceProperty {
        kind: ResourceKind,
        name: String,
        property: String,
        body: Value,
    },
    InsertDocument {
        uri: String,
        database: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        collections: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        permissions: Vec<Permission>,
        body: Body,
    },
}

/// A capability granted to a role on an inserted document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub role: String,
    pub capability: String,
}

impl Action {
    /// API surface targeted by this action
    pub fn api(&self) -> Api {
        match self {
            Self::GetProperties { api, .. } => *api,
            Self::InsertDocument { .. } => Api::Client,
            _ => Api::Manage,
        }
    }

    /// HTTP verb of this action
    pub fn verb(&self) -> Verb {
        match self {
            Self::ListForests | Self::GetProperties { .. } => Verb::Get,
            Self::CreateDatabase { .. }
            | Self::CreateForest { .. }
            | Self::AttachForest { .. }
            | Self::DetachForest { .. }
            | Self::CreateServer { .. }
            | Self::CreateResource { .. } => Verb::Post,
            Self::UpdateDatabaseProperty { .. }
            | Self::UpdateServerProperty { .. }
            | Self::UpdateResourceProperty { .. }
            | Self::InsertDocument { .. } => Verb::Put,
        }
    }

    /// URL relative to the API root
    pub fn url(&self) -> String {
        match self {
            Self::ListForests => "/forests".to_string(),
            Self::GetProperties { url, .. } => url.clone(),
            Self::CreateDatabase { .. } => "/databases".to_string(),
            Self::CreateForest { .. } => "/forests".to_string(),
            Self::AttachForest { forest, database } => format!(
                "/forests/{}?state=attach&database={}",
                encode(forest),
                encode(database)
            ),
            Self::DetachForest { forest, database } => format!(
                "/forests/{}?state=detach&database={}",
                encode(forest),
                encode(database)
            ),
            Self::UpdateDatabaseProperty { database, .. } => {
                format!("/databases/{}/properties", encode(database))
            }
            Self::CreateServer { group, .. } => format!("/servers?group-id={}", encode(group)),
            Self::UpdateServerProperty { server, group, .. } => format!(
                "/servers/{}/properties?group-id={}",
                encode(server),
                encode(group)
            ),
            Self::CreateResource { kind, .. } => format!("/{}", kind.segment()),
            Self::UpdateResourceProperty { kind, name, .. } => {
                format!("/{}/{}/properties", kind.segment(), encode(name))
            }
            Self::InsertDocument {
                uri,
                database,
                collections,
                permissions,
                ..
            } => {
                let mut url = format!("/documents?uri={}&database={}", encode(uri), encode(database));
                for collection in collections {
                    url.push_str("&collection=");
                    url.push_str(&encode(collection));
                }
                for permission in permissions {
                    url.push_str(&format!(
                        "&perm:{}={}",
                        encode(&permission.role),
                        encode(&permission.capability)
                    ));
                }
                url
            }
        }
    }

    /// Request body, if any
    pub fn body(&self) -> Option<Body> {
        match self {
            Self::ListForests
            | Self::GetProperties { .. }
            | Self::AttachForest { .. }
            | Self::DetachForest { .. } => None,
            Self::CreateForest { name, database } => Some(Body::Json(json!({
                "forest-name": name,
                "database": database,
            }))),
            Self::CreateDatabase { body, .. }
            | Self::UpdateDatabaseProperty { body, .. }
            | Self::CreateServer { body, .. }
            | Self::UpdateServerProperty { body, .. }
            | Self::CreateResource { body, .. }
            | Self::UpdateResourceProperty { body, .. } => Some(Body::Json(body.clone())),
            Self::InsertDocument { body, .. } => Some(body.clone()),
        }
    }

    /// Human-readable message describing the action
    pub fn message(&self) -> String {
        match self {
            Self::ListForests => "Retrieve forests".to_string(),
            Self::GetProperties { url, .. } => format!("Retrieve properties: {url}"),
            Self::CreateDatabase { name, .. } => format!("Create database: \t{name}"),
            Self::CreateForest { name, .. } => format!("Create forest: \t{name}"),
            Self::AttachForest { forest, database } => {
                format!("Attach forest:  \t{forest} to {database}")
            }
            Self::DetachForest { forest, database } => {
                format!("Detach forest:  \t{forest} from {database}")
            }
            Self::UpdateDatabaseProperty {
                database, property, ..
            } => format!("Update {property}:  \t{database}"),
            Self::CreateServer { name, .. } => format!("Create server: \t{name}"),
            Self::UpdateServerProperty {
                server, property, ..
            } => format!("Update {property}:  \t{server}"),
            Self::CreateResource { kind, name, .. } => format!("Create {kind}: \t{name}"),
            Self::UpdateResourceProperty {
                kind,
                name,
                property,
                ..
            } => format!("Update {kind} {property}:  \t{name}"),
            Self::InsertDocument { uri, .. } => format!("Insert document: \t{uri}"),
        }
    }

    /// Whether this action only reads remote state
    pub fn is_read(&self) -> bool {
        self.verb() == Verb::Get
    }

    /// Execute this action against the transport
    ///
    /// Any non-2xx status is an error. A server property update answered
    /// with a restart signal blocks until the restart has completed.
    pub fn execute(&self, transport: &dyn Transport) -> Result<Response> {
        let response = self.send(transport)?;
        if !response.is_success() {
            return Err(self.status_error(&response));
        }
        if let Self::UpdateServerProperty { server, .. } = self
            && let Some(signal) = RestartSignal::from_response(&response)
        {
            log::info!("{server}: waiting for restart (last startup {})", signal.last_startup);
            transport.restart(&signal)?;
        }
        Ok(response)
    }

    /// Execute a read action, mapping 404 to `None`
    pub fn fetch(&self, transport: &dyn Transport) -> Result<Option<Value>> {
        let response = self.send(transport)?;
        if response.is_not_found() {
            return Ok(None);
        }
        if !response.is_success() {
            return Err(self.status_error(&response));
        }
        Ok(Some(response.body.unwrap_or(Value::Null)))
    }

    fn send(&self, transport: &dyn Transport) -> Result<Response> {
        let url = self.url();
        let body = self.body();
        log::debug!("{} {} {}", self.verb(), self.api(), url);
        match self.verb() {
            Verb::Get => transport.get(self.api(), &url),
            Verb::Post => transport.post(self.api(), &url, body.as_ref()),
            Verb::Put => transport.put(self.api(), &url, body.as_ref()),
        }
    }

    fn status_error(&self, response: &Response) -> Error {
        let detail = response.body.as_ref().map(|body| {
            body.pointer("/errorResponse/message")
                .and_then(Value::as_str)
                .map_or_else(|| body.to_string(), str::to_string)
        });
        Error::Status {
            verb: self.verb(),
            url: self.url(),
            status: response.status,
            detail,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Bytes escaped in path segments and query values: all but unreserved ones
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Percent-encode a path segment or query value
pub fn encode(raw: &str) -> String {
    utf8_percent_encode(raw, COMPONENT).to_string()
}
