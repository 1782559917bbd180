//! Import composition
//!
//! Declarations from every document are folded in priority order. The
//! first declaration of an identity (same `id` or same `name`) wins; a
//! later one either fills the properties it leaves unset (`merge`) or is
//! dropped (`hide`). Both must agree on the mode.

use crate::error::{Error, Result};
use serde_json::{Map, Value, json};

/// Keys of a database reference object
pub const REFERENCE_KEYS: &[&str] = &["idref", "nameref", "sysref", "self"];

/// How a declaration combines with lower-priority ones
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compose {
    Merge,
    Hide,
}

/// A raw component declaration, before instantiation
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    /// Document the declaration comes from
    pub origin: String,
    pub compose: Compose,
    pub raw: Map<String, Value>,
}

impl Declaration {
    /// Build a declaration, reading its compose mode
    pub fn new(kind: &'static str, origin: &str, raw: Map<String, Value>) -> Result<Self> {
        let mut decl = Self {
            origin: origin.to_string(),
            compose: Compose::Merge,
            raw,
        };
        if decl.id().is_none() && decl.name().is_none() {
            return Err(Error::MissingIdentity {
                kind,
                origin: origin.to_string(),
            });
        }
        decl.compose = match decl.raw.get("compose") {
            None => Compose::Merge,
            Some(Value::String(mode)) if mode == "merge" => Compose::Merge,
            Some(Value::String(mode)) if mode == "hide" => Compose::Hide,
            Some(other) => {
                return Err(Error::InvalidCompose {
                    kind,
                    identity: decl.label(),
                    value: other.as_str().map_or_else(|| other.to_string(), str::to_string),
                });
            }
        };
        Ok(decl)
    }

    pub fn id(&self) -> Option<&str> {
        self.raw.get("id").and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.raw.get("name").and_then(Value::as_str)
    }

    /// Identity for messages: `{id}`, `{name}` or `{id} ({name})`
    pub fn label(&self) -> String {
        match (self.id(), self.name()) {
            (Some(id), Some(name)) => format!("{id} ({name})"),
            (Some(id), None) => id.to_string(),
            (None, Some(name)) => name.to_string(),
            (None, None) => "<anonymous>".to_string(),
        }
    }

    fn same_identity(&self, other: &Self) -> bool {
        let same = |a: Option<&str>, b: Option<&str>| a.is_some() && a == b;
        same(self.id(), other.id()) || same(self.name(), other.name())
    }
}

/// Fold declarations given in priority order
pub fn compose(kind: &'static str, declarations: Vec<Declaration>) -> Result<Vec<Declaration>> {
    let mut out: Vec<Declaration> = Vec::new();

    for decl in declarations {
        let Some(existing) = out.iter_mut().find(|e| e.same_identity(&decl)) else {
            out.push(decl);
            continue;
        };
        if existing.compose != decl.compose {
            return Err(Error::ComposeMismatch {
                kind,
                identity: existing.label(),
                first: existing.origin.clone(),
                second: decl.origin,
            });
        }
        match existing.compose {
            Compose::Hide => {
                log::debug!("{kind} {}: hiding declaration from {}", existing.label(), decl.origin);
            }
            Compose::Merge => {
                log::debug!("{kind} {}: merging declaration from {}", existing.label(), decl.origin);
                for (key, value) in decl.raw {
                    existing.raw.entry(key).or_insert(value);
                }
            }
        }
    }

    Ok(out)
}

/// Check if a reference value embeds a full declaration
pub fn is_embedded(value: &Value) -> bool {
    match value {
        Value::Object(map) => !REFERENCE_KEYS.iter().any(|k| map.contains_key(*k)),
        _ => false,
    }
}

/// Move embedded database declarations out of reference fields
///
/// Each embedded declaration is appended to `databases` (recursively for
/// its own references) and replaced by an `idref`, or a `nameref` when it
/// has no id.
pub fn hoist_embedded(
    origin: &str,
    owner: &mut Map<String, Value>,
    keys: &[&'static str],
    databases: &mut Vec<Map<String, Value>>,
) -> Result<()> {
    for key in keys {
        let Some(value) = owner.get_mut(*key) else {
            continue;
        };
        if !is_embedded(value) {
            continue;
        }
        let Value::Object(mut embedded) = value.take() else {
            continue;
        };
        hoist_embedded(origin, &mut embedded, crate::instantiate::DATABASE_REFS, databases)?;

        let reference = if let Some(id) = embedded.get("id").and_then(Value::as_str) {
            json!({ "idref": id })
        } else if let Some(name) = embedded.get("name").and_then(Value::as_str) {
            json!({ "nameref": name })
        } else {
            return Err(Error::MissingIdentity {
                kind: "embedded database",
                origin: origin.to_string(),
            });
        };
        *value = reference;
        databases.push(embedded);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(origin: &str, raw: Value) -> Declaration {
        let Value::Object(raw) = raw else {
            panic!("test fixture must be an object");
        };
        Declaration::new("database", origin, raw).unwrap()
    }

    #[test]
    fn test_merge_fills_unset_properties() {
        let composed = compose(
            "database",
            vec![
                decl("dev", json!({"name": "db", "triple-index": true})),
                decl("base", json!({"name": "db", "triple-index": false, "language": "en"})),
            ],
        )
        .unwrap();
        assert_eq!(composed.len(), 1);
        assert_eq!(composed[0].raw["triple-index"], true);
        assert_eq!(composed[0].raw["language"], "en");
    }

    #[test]
    fn test_hide_discards_lower_layer() {
        let composed = compose(
            "database",
            vec![
                decl("dev", json!({"id": "content", "compose": "hide", "name": "db"})),
                decl("base", json!({"id": "content", "compose": "hide", "language": "en"})),
            ],
        )
        .unwrap();
        assert_eq!(composed.len(), 1);
        assert!(!composed[0].raw.contains_key("language"));
    }

    #[test]
    fn test_identity_by_id_or_name() {
        let composed = compose(
            "database",
            vec![
                decl("dev", json!({"id": "content"})),
                decl("base", json!({"id": "content", "name": "db"})),
                decl("base", json!({"name": "other"})),
            ],
        )
        .unwrap();
        assert_eq!(composed.len(), 2);
        assert_eq!(composed[0].name(), Some("db"));
    }

    #[test]
    fn test_compose_mismatch() {
        let err = compose(
            "server",
            vec![
                decl("dev", json!({"name": "app", "compose": "hide"})),
                decl("base", json!({"name": "app"})),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, Error::ComposeMismatch { ref first, ref second, .. } if first == "dev" && second == "base"));
    }

    #[test]
    fn test_invalid_compose_and_missing_identity() {
        let Value::Object(raw) = json!({"name": "x", "compose": "replace"}) else {
            unreachable!()
        };
        assert!(matches!(
            Declaration::new("database", "dev", raw),
            Err(Error::InvalidCompose { .. })
        ));
        assert!(matches!(
            Declaration::new("database", "dev", Map::new()),
            Err(Error::MissingIdentity { .. })
        ));
    }

    #[test]
    fn test_hoist_embedded_declarations() {
        let Value::Object(mut server) = json!({
            "name": "app",
            "content": {"name": "app-content", "schema": {"id": "schemas", "name": "app-schemas"}},
            "modules": {"sysref": "Modules"},
        }) else {
            unreachable!()
        };
        let mut databases = Vec::new();
        hoist_embedded("dev", &mut server, &["content", "modules"], &mut databases).unwrap();

        assert_eq!(server["content"], json!({"nameref": "app-content"}));
        assert_eq!(server["modules"], json!({"sysref": "Modules"}));
        assert_eq!(databases.len(), 2);
        assert_eq!(databases[0]["name"], "app-schemas");
        assert_eq!(databases[1]["schema"], json!({"idref": "schemas"}));
    }
}
