//! Minimal update computation
//!
//! Each diff unit of a desired [`ResultObject`] is rendered and compared with
//! the live properties fetched from the remote system. Only units that differ
//! produce a [`Change`].

use crate::error::{Error, Result};
use crate::parse::{coerce_boolean, coerce_integer};
use crate::result::ResultObject;
use serde_json::{Map, Value as Json};

/// One property update required to converge live state to desired state
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// Configuration key of the changed property
    pub key: &'static str,
    /// Name reported to the user
    pub property: String,
    /// Body to send, in wire form
    pub body: Map<String, Json>,
}

/// Compute the changes between desired and live state
///
/// Create-only properties are never compared. A frozen property that differs
/// fails the whole diff.
pub fn diff(desired: &ResultObject<'_>, actual: &Map<String, Json>) -> Result<Vec<Change>> {
    let mut changes = Vec::new();

    for unit in desired.units() {
        if unit.prop.create_only {
            continue;
        }
        let body = unit.render();
        let differs = body.iter().find(|(wire, value)| !same(value, actual.get(wire.as_str())));
        let Some((wire, value)) = differs else {
            continue;
        };

        if unit.prop.frozen {
            return Err(Error::Frozen {
                key: unit.prop.key.to_string(),
                desired: value.to_string(),
                actual: actual.get(wire.as_str()).map_or_else(|| "nothing".to_string(), Json::to_string),
            });
        }

        log::debug!("{} differs: desired {value}", wire);
        let property = if unit.prop.name.is_empty() {
            unit.prop.key.to_string()
        } else {
            unit.prop.name.to_string()
        };
        changes.push(Change {
            key: unit.prop.key,
            property,
            body,
        });
    }

    Ok(changes)
}

/// Compare a desired wire value with a live one
fn same(desired: &Json, actual: Option<&Json>) -> bool {
    let Some(actual) = actual else {
        return match desired {
            Json::Array(items) => items.is_empty(),
            Json::Null => true,
            _ => false,
        };
    };

    match (desired, actual) {
        (Json::Array(want), Json::Array(have)) => same_items(want, have),
        (Json::Object(want), Json::Object(have)) => want.iter().all(|(key, value)| same(value, have.get(key))),
        (Json::Bool(b), other) => coerce_boolean(other) == Some(*b),
        (Json::Number(n), other) => n.as_i64().is_some_and(|n| coerce_integer(other) == Some(n)),
        (Json::String(s), Json::Number(n)) => *s == n.to_string(),
        (Json::String(s), Json::Bool(b)) => *s == b.to_string(),
        (want, have) => want == have,
    }
}

/// Order-insensitive multiset comparison
fn same_items(want: &[Json], have: &[Json]) -> bool {
    if want.len() != have.len() {
        return false;
    }
    let mut used = vec![false; have.len()];
    for item in want {
        let found = have
            .iter()
            .enumerate()
            .position(|(i, candidate)| !used[i] && same(item, Some(candidate)));
        match found {
            Some(i) => used[i] = true,
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{Config, Property};
    use serde_json::json;

    fn map(value: Json) -> Map<String, Json> {
        match value {
            Json::Object(map) => map,
            _ => panic!("test fixture must be an object"),
        }
    }

    fn config() -> Config {
        let namespace = Config::new("namespace")
            .with(Property::atomic("prefix", "prefix"))
            .with(Property::atomic("uri", "namespace-uri"));
        Config::new("server")
            .with(Property::atomic("name", "server-name").mandatory().frozen())
            .with(Property::integer("port", "port"))
            .with(Property::atomic("root", "root"))
            .with(Property::boolean("globally", "rewrite-resolves-globally"))
            .with(Property::list("roles", "role"))
            .with(Property::atomic("password", "password").create_only())
            .with(Property::array("namespaces", "namespace", namespace))
            .with(Property::flattened(
                "output",
                Config::new("output").with(Property::atomic("indent", "output-indent")),
            ))
    }

    #[test]
    fn test_no_changes_when_equal() {
        let config = config();
        let desired = config
            .parse(&map(json!({"name": "app", "port": 8070, "root": "/", "globally": true})))
            .unwrap();
        let actual = map(json!({
            "server-name": "app",
            "port": "8070",
            "root": "/",
            "rewrite-resolves-globally": "true",
            "threads": 32,
        }));
        assert!(diff(&desired, &actual).unwrap().is_empty());
    }

    #[test]
    fn test_only_differing_properties() {
        let config = config();
        let desired = config
            .parse(&map(json!({"name": "app", "port": 8070, "root": "/app"})))
            .unwrap();
        let actual = map(json!({"server-name": "app", "port": 8070, "root": "/"}));
        let changes = diff(&desired, &actual).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].property, "root");
        assert_eq!(Json::Object(changes[0].body.clone()), json!({"root": "/app"}));
    }

    #[test]
    fn test_frozen_difference_is_an_error() {
        let config = config();
        let desired = config.parse(&map(json!({"name": "app"}))).unwrap();
        let err = diff(&desired, &map(json!({"server-name": "other"}))).unwrap_err();
        assert!(err.is_frozen());
    }

    #[test]
    fn test_create_only_is_never_compared() {
        let config = config();
        let desired = config.parse(&map(json!({"name": "app", "password": "secret"}))).unwrap();
        assert!(diff(&desired, &map(json!({"server-name": "app"}))).unwrap().is_empty());
    }

    #[test]
    fn test_lists_compare_as_sets() {
        let config = config();
        let desired = config.parse(&map(json!({"name": "app", "roles": "b, a"}))).unwrap();
        let same = map(json!({"server-name": "app", "role": ["a", "b"]}));
        assert!(diff(&desired, &same).unwrap().is_empty());
        let more = map(json!({"server-name": "app", "role": ["a", "b", "c"]}));
        assert_eq!(diff(&desired, &more).unwrap().len(), 1);
    }

    #[test]
    fn test_empty_list_matches_absent() {
        let config = config();
        let desired = config.parse(&map(json!({"name": "app", "namespaces": []}))).unwrap();
        assert!(diff(&desired, &map(json!({"server-name": "app"}))).unwrap().is_empty());
    }

    #[test]
    fn test_arrays_ignore_order() {
        let config = config();
        let desired = config
            .parse(&map(json!({"name": "app", "namespaces": [
                {"prefix": "a", "uri": "urn:a"},
                {"prefix": "b", "uri": "urn:b"},
            ]})))
            .unwrap();
        let actual = map(json!({"server-name": "app", "namespace": [
            {"prefix": "b", "namespace-uri": "urn:b"},
            {"prefix": "a", "namespace-uri": "urn:a"},
        ]}));
        assert!(diff(&desired, &actual).unwrap().is_empty());
    }

    #[test]
    fn test_flattened_units_are_separate() {
        let config = config();
        let desired = config
            .parse(&map(json!({"name": "app", "port": 1, "output": {"indent": "yes"}})))
            .unwrap();
        let actual = map(json!({"server-name": "app", "port": 1, "output-indent": "no"}));
        let changes = diff(&desired, &actual).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].property, "output-indent");
    }
}
