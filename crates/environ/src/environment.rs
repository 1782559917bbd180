//! Compiled environments
//!
//! Compilation loads the document graph, resolves parameters, substitutes
//! placeholders in every declaration, composes declarations across import
//! layers and instantiates components in dependency order. Nothing is sent
//! to the remote system.

use crate::component::{Database, DbRef, Resource, Server, SourceSet};
use crate::compose::{Declaration, compose, hoist_embedded};
use crate::document::ConfigDocument;
use crate::error::{Error, Result};
use crate::instantiate::{Components, DATABASE_REFS, Declarations, SERVER_REFS, instantiate};
use crate::loader::{DocumentLoader, LoadError};
use crate::params::{Namespace, Overrides, Params};
use declarative::Api;
use propschema::parse::{coerce_boolean, coerce_integer};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Host used when no `@host` parameter is set
pub const DEFAULT_HOST: &str = "localhost";

/// Where one API surface is reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    pub port: u16,
    /// Root path, without leading or trailing slash
    pub root: String,
    pub ssl: bool,
}

impl ApiSettings {
    fn default_for(api: Api) -> Self {
        Self {
            port: api.default_port(),
            root: api.default_root().to_string(),
            ssl: false,
        }
    }
}

/// Connection parameters of an environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub host: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

/// A fully resolved environment
#[derive(Debug, Clone)]
pub struct Environment {
    identity: String,
    params: Params,
    apis: HashMap<Api, ApiSettings>,
    components: Components,
}

/// Where documents of a load go, as requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadTarget<'a> {
    /// Database id or name
    Database(&'a str),
    /// Server id or name, standing for its content database
    Server(&'a str),
    /// Use the source's own target, or the first server
    Default,
}

impl Environment {
    /// Compile the environment rooted at `identity`
    pub fn compile(loader: &dyn DocumentLoader, identity: &str, overrides: &Overrides) -> Result<Self> {
        let root = ConfigDocument::load(loader, identity)?;
        Self::from_document(&root, overrides)
    }

    /// Compile the environment rooted at `identity` if it exists
    ///
    /// A missing root document means there is no environment; a missing
    /// import is still an error.
    pub fn probe(loader: &dyn DocumentLoader, identity: &str, overrides: &Overrides) -> Result<Option<Self>> {
        match ConfigDocument::load(loader, identity) {
            Ok(root) => Self::from_document(&root, overrides).map(Some),
            Err(Error::Load(LoadError::NotFound(missing))) if missing == identity => {
                log::info!("no environment at {identity}");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Compile an already loaded document graph
    pub fn from_document(root: &ConfigDocument, overrides: &Overrides) -> Result<Self> {
        let documents = root.flatten();
        let params = Params::resolve(overrides, &documents)?;

        let mut layers = Declarations::default();
        for document in &documents {
            let origin = document.identity();
            let section = |name: &str| -> Result<Vec<Map<String, Value>>> {
                document
                    .declarations(name)?
                    .iter()
                    .enumerate()
                    .map(|(i, raw)| params.substitute_map(raw, &context(name, i, raw, origin)))
                    .collect()
            };

            let declare = |kind: &'static str, raws: Vec<Map<String, Value>>| -> Result<Vec<Declaration>> {
                raws.into_iter()
                    .map(|raw| Declaration::new(kind, origin, raw))
                    .collect()
            };
            layers.databases.extend(declare("database", section("databases")?)?);
            layers.servers.extend(declare("server", section("servers")?)?);
            layers.sources.extend(declare("source", section("sources")?)?);
            layers.mime_types.extend(declare("mime type", section("mime-types")?)?);
            layers.roles.extend(declare("role", section("roles")?)?);
            layers.users.extend(declare("user", section("users")?)?);
        }

        // embedded databases come only from declarations that survived composition
        let mut databases = compose("database", layers.databases)?;
        let mut servers = compose("server", layers.servers)?;
        let owners = databases
            .iter_mut()
            .map(|decl| (decl, DATABASE_REFS))
            .chain(servers.iter_mut().map(|decl| (decl, SERVER_REFS)));
        let mut embedded = Vec::new();
        for (owner, keys) in owners {
            let mut hoisted = Vec::new();
            hoist_embedded(&owner.origin, &mut owner.raw, keys, &mut hoisted)?;
            for raw in hoisted {
                embedded.push(Declaration::new("database", &owner.origin, raw)?);
            }
        }
        databases.extend(embedded);

        let composed = Declarations {
            databases: compose("database", databases)?,
            servers,
            sources: compose("source", layers.sources)?,
            mime_types: compose("mime type", layers.mime_types)?,
            roles: compose("role", layers.roles)?,
            users: compose("user", layers.users)?,
        };
        let components = instantiate(composed)?;
        let apis = compose_apis(&documents, &params)?;

        log::info!(
            "compiled {}: {} databases, {} servers, {} sources",
            root.identity(),
            components.databases.len(),
            components.servers.len(),
            components.sources.len()
        );
        Ok(Self {
            identity: root.identity().to_string(),
            params,
            apis,
            components,
        })
    }

    /// Identity of the root document
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Value of `@{code}`
    pub fn code(&self) -> Option<&str> {
        self.params.get(Namespace::Identity, "code")
    }

    /// Value of `@{title}`
    pub fn title(&self) -> Option<&str> {
        self.params.get(Namespace::Identity, "title")
    }

    pub fn connection(&self) -> Connection {
        let get = |name| self.params.get(Namespace::Identity, name).map(str::to_string);
        Connection {
            host: get("host").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            user: get("user"),
            password: get("password"),
        }
    }

    /// Settings of an API surface
    pub fn api(&self, api: Api) -> ApiSettings {
        self.apis
            .get(&api)
            .cloned()
            .unwrap_or_else(|| ApiSettings::default_for(api))
    }

    /// Databases, in dependency order
    pub fn databases(&self) -> &[Database] {
        &self.components.databases
    }

    pub fn servers(&self) -> &[Server] {
        &self.components.servers
    }

    pub fn sources(&self) -> &[SourceSet] {
        &self.components.sources
    }

    pub fn mime_types(&self) -> &[Resource] {
        &self.components.mime_types
    }

    pub fn roles(&self) -> &[Resource] {
        &self.components.roles
    }

    pub fn users(&self) -> &[Resource] {
        &self.components.users
    }

    /// Find a database by id or name
    pub fn database(&self, key: &str) -> Option<&Database> {
        let databases = self.databases();
        databases
            .iter()
            .find(|d| d.id.as_deref() == Some(key))
            .or_else(|| databases.iter().find(|d| d.name == key))
    }

    /// Find a server by id or name
    pub fn server(&self, key: &str) -> Option<&Server> {
        let servers = self.servers();
        servers
            .iter()
            .find(|s| s.id.as_deref() == Some(key))
            .or_else(|| servers.iter().find(|s| s.name == key))
    }

    /// Find a source set by id or name
    pub fn source(&self, key: &str) -> Option<&SourceSet> {
        let sources = self.sources();
        sources
            .iter()
            .find(|s| s.id.as_deref() == Some(key))
            .or_else(|| sources.iter().find(|s| s.name == key))
    }

    /// Name of the database a reference designates
    ///
    /// `owner` is the name of the referencing database, used for
    /// self-references.
    pub fn reference_name<'a>(&'a self, target: &'a DbRef, owner: &'a str) -> &'a str {
        match target {
            DbRef::Managed(index) => &self.components.databases[*index].name,
            DbRef::System(system) => &system.name,
            DbRef::Myself => owner,
        }
    }

    /// Name of the database documents of `source` are loaded into
    pub fn load_target(&self, source: &SourceSet, requested: LoadTarget<'_>) -> Result<String> {
        let content_of = |key: &str| {
            self.server(key)
                .map(|server| server.content_name(self).to_string())
        };
        match requested {
            LoadTarget::Database(key) => Ok(self
                .database(key)
                .map_or_else(|| key.to_string(), |d| d.name.clone())),
            LoadTarget::Server(key) => content_of(key).ok_or_else(|| Error::UnknownComponent {
                kind: "server",
                name: key.to_string(),
            }),
            LoadTarget::Default => {
                if let Some(target) = source.target() {
                    return content_of(target)
                        .or_else(|| self.database(target).map(|d| d.name.clone()))
                        .ok_or_else(|| Error::UnknownComponent {
                            kind: "server or database",
                            name: target.to_string(),
                        });
                }
                self.servers()
                    .first()
                    .map(|server| server.content_name(self).to_string())
                    .ok_or_else(|| Error::NoTarget {
                        source_name: source.name.clone(),
                    })
            }
        }
    }
}

/// Diagnostic context of one declaration
fn context(section: &str, index: usize, raw: &Map<String, Value>, origin: &str) -> String {
    let label = raw
        .get("name")
        .or_else(|| raw.get("id"))
        .and_then(Value::as_str)
        .map_or_else(|| format!("#{}", index + 1), str::to_string);
    format!("{section} {label} in {origin}")
}

/// Compose API settings: per key, the highest-priority document wins
fn compose_apis(documents: &[&ConfigDocument], params: &Params) -> Result<HashMap<Api, ApiSettings>> {
    let mut declared: Vec<(String, Map<String, Value>)> = Vec::new();
    for document in documents {
        let apis = document.apis()?;
        for (name, settings) in &apis {
            if Api::from_name(name).is_none() {
                return Err(Error::UnknownKey {
                    identity: document.identity().to_string(),
                    key: format!("apis.{name}"),
                });
            }
            let Value::Object(settings) = settings else {
                return Err(Error::malformed(document.identity(), format!("apis.{name} must be an object")));
            };
            if let Some(key) = settings.keys().find(|k| !matches!(k.as_str(), "port" | "root" | "ssl")) {
                return Err(Error::UnknownKey {
                    identity: document.identity().to_string(),
                    key: format!("apis.{name}.{key}"),
                });
            }
            let settings = params.substitute_map(settings, &format!("apis.{name} in {}", document.identity()))?;
            declared.push((name.clone(), settings));
        }
    }

    let mut apis = HashMap::new();
    for api in Api::ALL {
        let mut settings = ApiSettings::default_for(api);
        let first = |key: &str| {
            declared
                .iter()
                .filter(|(name, _)| name == api.name())
                .find_map(|(_, s)| s.get(key))
        };
        let invalid = |key: &str| Error::malformed("apis", format!("{api}.{key} has an invalid value"));

        if let Some(port) = first("port") {
            settings.port = coerce_integer(port)
                .and_then(|p| u16::try_from(p).ok())
                .ok_or_else(|| invalid("port"))?;
        }
        if let Some(root) = first("root") {
            settings.root = root
                .as_str()
                .ok_or_else(|| invalid("root"))?
                .trim_matches('/')
                .to_string();
        }
        if let Some(ssl) = first("ssl") {
            settings.ssl = coerce_boolean(ssl).ok_or_else(|| invalid("ssl"))?;
        }
        apis.insert(api, settings);
    }
    Ok(apis)
}
