//! Dependency-ordered instantiation of composed declarations
//!
//! Databases are instantiated in passes: each pass takes every pending
//! declaration whose references are all satisfied (already instantiated,
//! self-references, system databases) and instantiates them together. The
//! loop stops when a pass makes no progress; anything left over is
//! reported, which surfaces both cycles and dangling references. Servers,
//! source sets and the other resources come after, against the completed
//! database arena.

use crate::component::database::numbered_forests;
use crate::component::resource::schema;
use crate::component::server::{DEFAULT_GROUP, is_filesystem};
use crate::component::source::DEFAULT_TEMPLATE;
use crate::component::{Database, DbRef, Resource, Server, SourceSet, SysDatabase};
use crate::compose::Declaration;
use crate::error::{Error, Result};
use declarative::ResourceKind;
use propschema::kinds;
use propschema::parse::coerce_integer;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// Highest forest count a database may declare
pub const MAX_FORESTS: i64 = 100;

/// Reference fields of a database declaration
pub const DATABASE_REFS: &[&str] = &["schema", "security", "triggers"];

/// Reference fields of a server declaration
pub const SERVER_REFS: &[&str] = &["content", "modules"];

/// Composed declarations, per kind, in priority order
#[derive(Debug, Clone, Default)]
pub struct Declarations {
    pub databases: Vec<Declaration>,
    pub servers: Vec<Declaration>,
    pub sources: Vec<Declaration>,
    pub mime_types: Vec<Declaration>,
    pub roles: Vec<Declaration>,
    pub users: Vec<Declaration>,
}

/// Instantiated components
#[derive(Debug, Clone, Default)]
pub struct Components {
    /// In dependency order: every database comes after those it references
    pub databases: Vec<Database>,
    pub servers: Vec<Server>,
    pub sources: Vec<SourceSet>,
    pub mime_types: Vec<Resource>,
    pub roles: Vec<Resource>,
    pub users: Vec<Resource>,
}

/// A database reference as declared
#[derive(Debug, Clone, PartialEq, Eq)]
enum RawRef {
    Id(String),
    Name(String),
    Sys(String),
    Myself,
}

impl fmt::Display for RawRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "idref {id}"),
            Self::Name(name) => write!(f, "nameref {name}"),
            Self::Sys(name) => write!(f, "sysref {name}"),
            Self::Myself => f.write_str("self"),
        }
    }
}

fn parse_ref(owner: &str, key: &'static str, value: &Value) -> Result<RawRef> {
    let invalid = |message: &str| Error::InvalidReference {
        owner: owner.to_string(),
        key,
        message: message.to_string(),
    };
    let Value::Object(map) = value else {
        return Err(invalid("must be an object"));
    };
    if map.len() != 1 {
        return Err(invalid("must hold exactly one of idref, nameref, sysref, self"));
    }
    let text = |v: &Value| v.as_str().map(str::to_string).ok_or_else(|| invalid("target must be a string"));
    match map.iter().next() {
        Some((k, v)) if k == "idref" => Ok(RawRef::Id(text(v)?)),
        Some((k, v)) if k == "nameref" => Ok(RawRef::Name(text(v)?)),
        Some((k, v)) if k == "sysref" => Ok(RawRef::Sys(text(v)?)),
        Some((k, Value::Bool(true))) if k == "self" => Ok(RawRef::Myself),
        _ => Err(invalid("must hold exactly one of idref, nameref, sysref, self")),
    }
}

/// A database declaration waiting for its references
struct Pending {
    decl: Declaration,
    refs: Vec<(&'static str, RawRef)>,
}

impl Pending {
    fn new(decl: Declaration) -> Result<Self> {
        let mut refs = Vec::new();
        for &key in DATABASE_REFS {
            if let Some(value) = decl.raw.get(key) {
                refs.push((key, parse_ref(&format!("database {}", decl.label()), key, value)?));
            }
        }
        Ok(Self { decl, refs })
    }

    /// Whether a reference designates the declaration itself
    fn is_self(&self, raw: &RawRef) -> bool {
        match raw {
            RawRef::Myself => true,
            RawRef::Id(id) => self.decl.id() == Some(id.as_str()),
            RawRef::Name(name) => self.decl.name() == Some(name.as_str()),
            RawRef::Sys(_) => false,
        }
    }
}

/// Database arena with its id and name indexes
#[derive(Default)]
struct Arena {
    databases: Vec<Database>,
    by_id: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl Arena {
    fn lookup(&self, raw: &RawRef) -> Option<DbRef> {
        match raw {
            RawRef::Id(id) => self.by_id.get(id).copied().map(DbRef::Managed),
            RawRef::Name(name) => self.by_name.get(name).copied().map(DbRef::Managed),
            RawRef::Sys(name) => Some(DbRef::System(SysDatabase { name: name.clone() })),
            RawRef::Myself => None,
        }
    }

    fn is_ready(&self, pending: &Pending) -> bool {
        pending
            .refs
            .iter()
            .all(|(_, raw)| pending.is_self(raw) || self.lookup(raw).is_some())
    }

    fn instantiate(&mut self, pending: Pending) -> Result<()> {
        let label = format!("database {}", pending.decl.label());
        let props = kinds::DATABASE
            .parse(&pending.decl.raw)
            .map_err(|e| Error::schema(&label, e))?;
        let name = props
            .string("name")
            .ok_or_else(|| Error::MissingIdentity {
                kind: "database",
                origin: pending.decl.origin.clone(),
            })?
            .to_string();
        let forests = forests(&name, pending.decl.raw.get("forests"))?;

        let mut database = Database {
            id: pending.decl.id().map(str::to_string),
            name,
            forests,
            schema: None,
            security: None,
            triggers: None,
            props,
        };
        for (key, raw) in &pending.refs {
            let target = if pending.is_self(raw) {
                Some(DbRef::Myself)
            } else {
                self.lookup(raw)
            };
            match *key {
                "schema" => database.schema = target,
                "security" => database.security = target,
                _ => database.triggers = target,
            }
        }

        log::debug!("instantiated {label}");
        let index = self.databases.len();
        if let Some(id) = &database.id {
            self.by_id.insert(id.clone(), index);
        }
        self.by_name.insert(database.name.clone(), index);
        self.databases.push(database);
        Ok(())
    }
}

/// Forest names from a `forests` value: a count or a list of names
fn forests(database: &str, value: Option<&Value>) -> Result<Vec<String>> {
    let invalid = || Error::InvalidForests {
        database: database.to_string(),
    };
    match value {
        None => Ok(numbered_forests(database, 1)),
        Some(Value::Array(names)) => names
            .iter()
            .map(|n| n.as_str().map(str::to_string).ok_or_else(invalid))
            .collect(),
        Some(other) => {
            let count = coerce_integer(other).ok_or_else(invalid)?;
            if !(0..=MAX_FORESTS).contains(&count) {
                return Err(Error::ForestCount {
                    database: database.to_string(),
                    count,
                });
            }
            Ok(numbered_forests(database, count as usize))
        }
    }
}

/// Turn composed declarations into components
pub fn instantiate(declarations: Declarations) -> Result<Components> {
    let arena = instantiate_databases(declarations.databases)?;

    let servers = declarations
        .servers
        .into_iter()
        .map(|decl| instantiate_server(&arena, decl))
        .collect::<Result<Vec<_>>>()?;

    Ok(Components {
        databases: arena.databases,
        servers,
        sources: instantiate_sources(declarations.sources)?,
        mime_types: instantiate_resources(ResourceKind::MimeType, declarations.mime_types)?,
        roles: instantiate_resources(ResourceKind::Role, declarations.roles)?,
        users: instantiate_resources(ResourceKind::User, declarations.users)?,
    })
}

fn instantiate_databases(declarations: Vec<Declaration>) -> Result<Arena> {
    let mut arena = Arena::default();
    let mut pending = declarations
        .into_iter()
        .map(Pending::new)
        .collect::<Result<Vec<_>>>()?;

    loop {
        let (ready, waiting): (Vec<Pending>, Vec<Pending>) =
            pending.into_iter().partition(|p| arena.is_ready(p));
        pending = waiting;
        if ready.is_empty() {
            break;
        }
        for candidate in ready {
            arena.instantiate(candidate)?;
        }
    }

    if !pending.is_empty() {
        let items = pending
            .iter()
            .map(|p| {
                let waiting: Vec<String> = p
                    .refs
                    .iter()
                    .filter(|(_, raw)| !p.is_self(raw) && arena.lookup(raw).is_none())
                    .map(|(key, raw)| format!("{key}: {raw}"))
                    .collect();
                format!("database {} ({})", p.decl.label(), waiting.join(", "))
            })
            .collect();
        return Err(Error::Unresolved { items });
    }

    Ok(arena)
}

fn instantiate_server(arena: &Arena, decl: Declaration) -> Result<Server> {
    let label = format!("server {}", decl.label());
    let props = kinds::SERVER
        .parse(&decl.raw)
        .map_err(|e| Error::schema(&label, e))?;

    let resolve = |key: &'static str| -> Result<Option<DbRef>> {
        let Some(value) = decl.raw.get(key) else {
            return Ok(None);
        };
        let raw = parse_ref(&label, key, value)?;
        if raw == RawRef::Myself {
            return Err(Error::InvalidReference {
                owner: label.clone(),
                key,
                message: "a server cannot reference itself".to_string(),
            });
        }
        arena.lookup(&raw).map(Some).ok_or_else(|| Error::InvalidReference {
            owner: label.clone(),
            key,
            message: format!("no database for {raw}"),
        })
    };
    let content = resolve("content")?.ok_or_else(|| Error::InvalidReference {
        owner: label.clone(),
        key: "content",
        message: "a content database is mandatory".to_string(),
    })?;
    let modules = if is_filesystem(decl.raw.get("modules")) {
        None
    } else {
        resolve("modules")?
    };

    let group = match decl.raw.get("group") {
        None => DEFAULT_GROUP.to_string(),
        Some(Value::String(group)) => group.clone(),
        Some(_) => return Err(Error::malformed(&decl.origin, format!("{label}: group must be a string"))),
    };
    let name = props.string("name").unwrap_or_default().to_string();

    log::debug!("instantiated {label}");
    Ok(Server {
        id: decl.id().map(str::to_string),
        name,
        group,
        content,
        modules,
        props,
    })
}

fn instantiate_sources(declarations: Vec<Declaration>) -> Result<Vec<SourceSet>> {
    let (templates, sets): (Vec<Declaration>, Vec<Declaration>) = declarations
        .into_iter()
        .partition(|d| d.name() == Some(DEFAULT_TEMPLATE));
    let template: Map<String, Value> = templates
        .into_iter()
        .next()
        .map(|t| t.raw)
        .unwrap_or_default();

    sets.into_iter()
        .map(|decl| {
            let mut raw = decl.raw.clone();
            for (key, value) in &template {
                if !matches!(key.as_str(), "id" | "name" | "compose") {
                    raw.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
            let props = kinds::SOURCE
                .parse(&raw)
                .map_err(|e| Error::schema(format!("source {}", decl.label()), e))?;
            Ok(SourceSet {
                id: decl.id().map(str::to_string),
                name: props.string("name").unwrap_or_default().to_string(),
                props,
            })
        })
        .collect()
}

fn instantiate_resources(kind: ResourceKind, declarations: Vec<Declaration>) -> Result<Vec<Resource>> {
    declarations
        .into_iter()
        .map(|decl| {
            let props = schema(kind)
                .parse(&decl.raw)
                .map_err(|e| Error::schema(format!("{kind} {}", decl.label()), e))?;
            Ok(Resource {
                kind,
                name: props.string("name").unwrap_or_default().to_string(),
                props,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decls(kind: &'static str, items: Value) -> Vec<Declaration> {
        let Value::Array(items) = items else {
            panic!("test fixture must be an array");
        };
        items
            .into_iter()
            .map(|item| {
                let Value::Object(raw) = item else {
                    panic!("declaration fixture must be an object");
                };
                Declaration::new(kind, "test.json", raw).unwrap()
            })
            .collect()
    }

    fn databases(items: Value) -> Result<Components> {
        instantiate(Declarations {
            databases: decls("database", items),
            ..Declarations::default()
        })
    }

    fn names(components: &Components) -> Vec<&str> {
        components.databases.iter().map(|d| d.name.as_str()).collect()
    }

    #[test]
    fn test_dependency_comes_first() {
        let components = databases(json!([
            {"id": "a", "name": "a", "schema": {"idref": "b"}},
            {"id": "b", "name": "b"},
        ]))
        .unwrap();
        assert_eq!(names(&components), ["b", "a"]);
        assert_eq!(components.databases[1].schema, Some(DbRef::Managed(0)));
    }

    #[test]
    fn test_self_reference_needs_nothing_else() {
        let components = databases(json!([
            {"name": "a", "schema": {"self": true}, "security": {"nameref": "a"}},
        ]))
        .unwrap();
        assert_eq!(components.databases[0].schema, Some(DbRef::Myself));
        assert_eq!(components.databases[0].security, Some(DbRef::Myself));
    }

    #[test]
    fn test_mutual_references_fail_naming_both() {
        let err = databases(json!([
            {"id": "a", "name": "a", "schema": {"idref": "b"}},
            {"id": "b", "name": "b", "schema": {"idref": "a"}},
        ]))
        .unwrap_err();
        let Error::Unresolved { items } = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(items.len(), 2);
        assert!(items[0].contains("database a") && items[0].contains("idref b"));
        assert!(items[1].contains("database b") && items[1].contains("idref a"));
    }

    #[test]
    fn test_resolve_what_you_can_then_report_leftovers() {
        let err = databases(json!([
            {"name": "ok", "schema": {"sysref": "Schemas"}},
            {"name": "partial", "schema": {"self": true}, "security": {"nameref": "missing"}},
        ]))
        .unwrap_err();
        let Error::Unresolved { items } = err else {
            panic!("expected unresolved");
        };
        assert_eq!(items, ["database partial (security: nameref missing)"]);
    }

    #[test]
    fn test_system_reference_is_a_stub() {
        let components = databases(json!([{"name": "a", "triggers": {"sysref": "Triggers"}}])).unwrap();
        assert_eq!(
            components.databases[0].triggers,
            Some(DbRef::System(SysDatabase { name: "Triggers".into() }))
        );
    }

    #[test]
    fn test_forests() {
        let components = databases(json!([
            {"name": "simple-ape-content", "forests": 2},
            {"name": "default"},
            {"name": "none", "forests": "0"},
            {"name": "named", "forests": ["f1", "f2"]},
        ]))
        .unwrap();
        assert_eq!(
            components.databases[0].forests,
            ["simple-ape-content-001", "simple-ape-content-002"]
        );
        assert_eq!(components.databases[1].forests, ["default-001"]);
        assert!(components.databases[2].forests.is_empty());
        assert_eq!(components.databases[3].forests, ["f1", "f2"]);
    }

    #[test]
    fn test_forest_bounds() {
        let err = databases(json!([{"name": "a", "forests": 101}])).unwrap_err();
        assert!(matches!(err, Error::ForestCount { count: 101, .. }));
        let err = databases(json!([{"name": "a", "forests": {"count": 1}}])).unwrap_err();
        assert!(matches!(err, Error::InvalidForests { .. }));
    }

    #[test]
    fn test_invalid_reference_shape() {
        let err = databases(json!([{"name": "a", "schema": {"idref": "b", "nameref": "c"}}])).unwrap_err();
        assert!(matches!(err, Error::InvalidReference { key: "schema", .. }));
    }

    #[test]
    fn test_servers_resolve_against_databases() {
        let components = instantiate(Declarations {
            databases: decls("database", json!([{"id": "content", "name": "app-content"}])),
            servers: decls(
                "server",
                json!([{
                    "name": "app",
                    "port": 7010,
                    "content": {"idref": "content"},
                    "modules": {"sysref": "Modules"},
                }]),
            ),
            ..Declarations::default()
        })
        .unwrap();
        let server = &components.servers[0];
        assert_eq!(server.content, DbRef::Managed(0));
        assert_eq!(server.modules, Some(DbRef::System(SysDatabase { name: "Modules".into() })));
        assert_eq!(server.group, "Default");
    }

    #[test]
    fn test_filesystem_modules() {
        for modules in [json!(0), json!("0"), json!("file-system"), Value::Null] {
            let components = instantiate(Declarations {
                databases: decls("database", json!([{"id": "content", "name": "app-content"}])),
                servers: decls(
                    "server",
                    json!([{"name": "app", "port": 7010, "content": {"idref": "content"}, "modules": modules}]),
                ),
                ..Declarations::default()
            })
            .unwrap();
            assert_eq!(components.servers[0].modules, None);
        }
    }

    #[test]
    fn test_server_needs_content() {
        let err = instantiate(Declarations {
            servers: decls("server", json!([{"name": "app", "port": 7010}])),
            ..Declarations::default()
        })
        .unwrap_err();
        assert!(matches!(err, Error::InvalidReference { key: "content", .. }));

        let err = instantiate(Declarations {
            servers: decls("server", json!([{"name": "app", "port": 7010, "content": {"idref": "x"}}])),
            ..Declarations::default()
        })
        .unwrap_err();
        assert!(err.to_string().contains("no database for idref x"));
    }

    #[test]
    fn test_default_source_is_a_template() {
        let components = instantiate(Declarations {
            sources: decls(
                "source",
                json!([
                    {"name": "@default", "garbage": ["*.bak"], "prefix": "/app/"},
                    {"name": "src", "prefix": "/lib/"},
                    {"name": "data"},
                ]),
            ),
            ..Declarations::default()
        })
        .unwrap();
        assert_eq!(components.sources.len(), 2);
        let src = &components.sources[0];
        assert_eq!(src.prefix(), "/lib/");
        assert_eq!(src.garbage(), ["*.bak"]);
        assert_eq!(src.dir(), "src");
        assert_eq!(components.sources[1].prefix(), "/app/");
    }
}
