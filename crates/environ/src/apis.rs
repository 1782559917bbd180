//! Narrow facade for extension code
//!
//! Extensions get an [`Apis`] instead of the transport itself: raw calls
//! against one API surface, server-scoped property access, and the file
//! listing of a source set.

use crate::component::SourceSet;
use crate::environment::Environment;
use crate::error::{Error, Result};
use declarative::action::encode;
use declarative::{Api, Body, Response, Transport, Verb};
use serde_json::Value;

/// Lists and reads the files of a source set
///
/// Paths are relative to the source directory and use `/` separators.
pub trait FileLister {
    /// Files of the set after include/exclude/garbage filtering, sorted
    fn list(&self, source: &SourceSet) -> Result<Vec<String>>;

    /// Content of one listed file
    fn read(&self, source: &SourceSet, path: &str) -> Result<Body>;
}

/// Remote and file access handed to extension code
pub struct Apis<'e> {
    env: &'e Environment,
    transport: &'e dyn Transport,
    files: Option<&'e dyn FileLister>,
}

impl<'e> Apis<'e> {
    pub fn new(env: &'e Environment, transport: &'e dyn Transport) -> Self {
        Self {
            env,
            transport,
            files: None,
        }
    }

    /// Give access to source set files
    pub fn with_files(mut self, files: &'e dyn FileLister) -> Self {
        self.files = Some(files);
        self
    }

    pub fn env(&self) -> &'e Environment {
        self.env
    }

    /// Files of a named source set
    pub fn source(&self, name: &str) -> Result<Vec<String>> {
        let files = self.files.ok_or(Error::Contract("file listing"))?;
        let source = self.env.source(name).ok_or_else(|| Error::UnknownComponent {
            kind: "source",
            name: name.to_string(),
        })?;
        files.list(source)
    }

    /// GET a document, `None` when the remote answers 404
    pub fn get(&self, api: Api, url: &str) -> Result<Option<Value>> {
        let response = self.transport.get(api, url)?;
        if response.is_not_found() {
            return Ok(None);
        }
        Ok(checked(Verb::Get, url, response)?.body)
    }

    pub fn post(&self, api: Api, url: &str, body: Option<&Body>) -> Result<Option<Value>> {
        let response = self.transport.post(api, url, body)?;
        Ok(checked(Verb::Post, url, response)?.body)
    }

    pub fn put(&self, api: Api, url: &str, body: Option<&Body>) -> Result<Option<Value>> {
        let response = self.transport.put(api, url, body)?;
        Ok(checked(Verb::Put, url, response)?.body)
    }

    /// Management calls scoped to one server of the default group
    pub fn server(&self, name: &str) -> ServerApi<'_, 'e> {
        let group = self
            .env
            .server(name)
            .map_or(crate::component::server::DEFAULT_GROUP, |s| s.group.as_str());
        ServerApi {
            apis: self,
            name: name.to_string(),
            group: group.to_string(),
        }
    }
}

fn checked(verb: Verb, url: &str, response: Response) -> Result<Response> {
    if response.is_success() {
        return Ok(response);
    }
    Err(Error::Remote(declarative::Error::Status {
        verb,
        url: url.to_string(),
        status: response.status,
        detail: response.body.map(|b| b.to_string()),
    }))
}

/// Management API calls prefixed with `/servers/{name}`
pub struct ServerApi<'a, 'e> {
    apis: &'a Apis<'e>,
    name: String,
    group: String,
}

impl ServerApi<'_, '_> {
    fn url(&self, path: &str) -> String {
        format!(
            "/servers/{}{path}?group-id={}",
            encode(&self.name),
            encode(&self.group)
        )
    }

    pub fn get(&self, path: &str) -> Result<Option<Value>> {
        self.apis.get(Api::Manage, &self.url(path))
    }

    pub fn put(&self, path: &str, body: Value) -> Result<Option<Value>> {
        self.apis.put(Api::Manage, &self.url(path), Some(&Body::Json(body)))
    }

    /// Read the server properties, or replace them when `body` is given
    pub fn properties(&self, body: Option<Value>) -> Result<Option<Value>> {
        match body {
            None => self.get("/properties"),
            Some(body) => self.put("/properties", body),
        }
    }
}
