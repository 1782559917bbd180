//! Configuration documents and their import graph

use crate::error::{Error, Result};
use crate::loader::DocumentLoader;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Supported document format
pub const FORMAT: &str = "0.1";

/// The single key every document root holds
pub const ROOT: &str = "mlproj";

/// Top-level keys recognized in a document
const KEYS: &[&str] = &[
    "format",
    "import",
    "code",
    "title",
    "desc",
    "connect",
    "params",
    "apis",
    "sources",
    "databases",
    "servers",
    "mime-types",
    "roles",
    "users",
];

/// Identity parameters declared at the document top level
pub const TOP_IDENTITY: &[&str] = &["code", "title", "desc"];

/// Identity parameters declared under `connect`
pub const CONNECT_IDENTITY: &[&str] = &["host", "user", "password"];

/// One parsed configuration unit with its imports, in priority order
#[derive(Debug, Clone)]
pub struct ConfigDocument {
    identity: String,
    raw: Map<String, Value>,
    imports: Vec<ConfigDocument>,
}

impl ConfigDocument {
    /// Load a document and, recursively, everything it imports
    pub fn load(loader: &dyn DocumentLoader, identity: &str) -> Result<Self> {
        let mut chain = Vec::new();
        Self::load_chain(loader, identity, &mut chain)
    }

    fn load_chain(loader: &dyn DocumentLoader, identity: &str, chain: &mut Vec<String>) -> Result<Self> {
        if chain.iter().any(|c| c == identity) {
            let mut cycle = chain.clone();
            cycle.push(identity.to_string());
            return Err(Error::ImportCycle {
                chain: cycle.join(" -> "),
            });
        }

        log::debug!("loading {identity}");
        let raw = unwrap_root(identity, loader.load(identity)?)?;
        check_format(identity, &raw)?;
        if let Some(key) = raw.keys().find(|k| !KEYS.contains(&k.as_str())) {
            return Err(Error::UnknownKey {
                identity: identity.to_string(),
                key: key.clone(),
            });
        }

        chain.push(identity.to_string());
        let mut imports = Vec::new();
        for reference in import_refs(identity, &raw)? {
            let target = loader.resolve_import(reference, identity);
            imports.push(Self::load_chain(loader, &target, chain)?);
        }
        chain.pop();

        Ok(Self {
            identity: identity.to_string(),
            raw,
            imports,
        })
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Content under the root key
    pub fn raw(&self) -> &Map<String, Value> {
        &self.raw
    }

    /// Directly imported documents, highest priority first
    pub fn imports(&self) -> &[ConfigDocument] {
        &self.imports
    }

    /// This document and all its imports, depth first, highest priority
    /// first; a document imported twice keeps its first position
    pub fn flatten(&self) -> Vec<&ConfigDocument> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        self.flatten_into(&mut seen, &mut out);
        out
    }

    fn flatten_into<'a>(&'a self, seen: &mut HashSet<&'a str>, out: &mut Vec<&'a ConfigDocument>) {
        if !seen.insert(self.identity.as_str()) {
            return;
        }
        out.push(self);
        for import in &self.imports {
            import.flatten_into(seen, out);
        }
    }

    /// Locally declared user parameters
    pub fn params(&self) -> Result<Map<String, Value>> {
        self.object("params")
    }

    /// Locally declared identity parameters
    pub fn identity_params(&self) -> Result<Map<String, Value>> {
        let mut params = Map::new();
        for key in TOP_IDENTITY {
            if let Some(value) = self.raw.get(*key) {
                params.insert((*key).to_string(), value.clone());
            }
        }
        let connect = self.object("connect")?;
        for (key, value) in connect {
            if !CONNECT_IDENTITY.contains(&key.as_str()) {
                return Err(Error::UnknownKey {
                    identity: self.identity.clone(),
                    key: format!("connect.{key}"),
                });
            }
            params.insert(key, value);
        }
        Ok(params)
    }

    /// API settings declared locally
    pub fn apis(&self) -> Result<Map<String, Value>> {
        self.object("apis")
    }

    /// Declarations of one section (`databases`, `servers`...)
    pub fn declarations(&self, section: &str) -> Result<Vec<Map<String, Value>>> {
        match self.raw.get(section) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::Object(map) => Ok(map.clone()),
                    _ => Err(Error::malformed(&self.identity, format!("{section} must hold objects"))),
                })
                .collect(),
            Some(_) => Err(Error::malformed(&self.identity, format!("{section} must be an array"))),
        }
    }

    fn object(&self, key: &str) -> Result<Map<String, Value>> {
        match self.raw.get(key) {
            None => Ok(Map::new()),
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(_) => Err(Error::malformed(&self.identity, format!("{key} must be an object"))),
        }
    }
}

fn unwrap_root(identity: &str, document: Value) -> Result<Map<String, Value>> {
    let Value::Object(mut root) = document else {
        return Err(Error::malformed(identity, "document must be an object"));
    };
    if root.len() != 1 || !root.contains_key(ROOT) {
        let keys: Vec<&str> = root.keys().map(String::as_str).collect();
        return Err(Error::malformed(
            identity,
            format!("root must hold exactly one key, {ROOT}, found [{}]", keys.join(", ")),
        ));
    }
    match root.remove(ROOT) {
        Some(Value::Object(content)) => Ok(content),
        _ => Err(Error::malformed(identity, format!("{ROOT} must be an object"))),
    }
}

fn check_format(identity: &str, raw: &Map<String, Value>) -> Result<()> {
    match raw.get("format") {
        Some(Value::String(format)) if format == FORMAT => Ok(()),
        Some(other) => Err(Error::UnsupportedFormat {
            identity: identity.to_string(),
            found: other.to_string(),
        }),
        None => Err(Error::UnsupportedFormat {
            identity: identity.to_string(),
            found: "nothing".to_string(),
        }),
    }
}

fn import_refs<'a>(identity: &str, raw: &'a Map<String, Value>) -> Result<Vec<&'a str>> {
    match raw.get("import") {
        None => Ok(Vec::new()),
        Some(Value::String(one)) => Ok(vec![one.as_str()]),
        Some(Value::Array(many)) => many
            .iter()
            .map(|item| {
                item.as_str()
                    .ok_or_else(|| Error::malformed(identity, "import must hold strings"))
            })
            .collect(),
        Some(_) => Err(Error::malformed(identity, "import must be a string or an array")),
    }
}
