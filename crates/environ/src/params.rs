//! Parameter resolution and placeholder substitution
//!
//! Two namespaces exist: identity parameters (`@{code}`, `@{host}`...) and
//! user parameters (`${port}`). A value is looked up tier by tier:
//! explicit overrides, forced overrides, the documents in priority order,
//! then caller defaults. Values may themselves hold placeholders.

use crate::document::ConfigDocument;
use crate::error::{Error, Result};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::LazyLock;

/// Namespace of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    /// `@name`: code, title, desc, host, user, password
    Identity,
    /// `$name`: free substitution variables
    User,
}

impl Namespace {
    pub fn sigil(&self) -> char {
        match self {
            Self::Identity => '@',
            Self::User => '$',
        }
    }
}

/// A parameter name qualified by its namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamKey {
    pub namespace: Namespace,
    pub name: String,
}

impl ParamKey {
    pub fn new(namespace: Namespace, name: impl Into<String>) -> Self {
        Self {
            namespace,
            name: name.into(),
        }
    }

    /// Parse an override key: a leading `@` selects the identity namespace
    pub fn from_override(key: &str) -> Self {
        match key.strip_prefix('@') {
            Some(name) => Self::new(Namespace::Identity, name),
            None => Self::new(Namespace::User, key),
        }
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{{}}}", self.namespace.sigil(), self.name)
    }
}

/// Caller-supplied parameter tiers
///
/// Keys starting with `@` target identity parameters.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Highest priority, above anything declared in documents
    pub params: BTreeMap<String, String>,
    /// Below explicit params, still above documents
    pub forced: BTreeMap<String, String>,
    /// Used only when nothing else defines the parameter
    pub defaults: BTreeMap<String, String>,
}

/// One tier of raw parameter values
struct Layer {
    source: String,
    values: HashMap<ParamKey, String>,
}

impl Layer {
    fn from_overrides(source: &str, values: &BTreeMap<String, String>) -> Result<Self> {
        let values = values
            .iter()
            .map(|(key, value)| {
                let key = ParamKey::from_override(key);
                check_name(&key.name)?;
                Ok((key, value.clone()))
            })
            .collect::<Result<_>>()?;
        Ok(Self {
            source: source.to_string(),
            values,
        })
    }

    fn from_document(document: &ConfigDocument) -> Result<Self> {
        let mut values = HashMap::new();
        for (namespace, params) in [
            (Namespace::Identity, document.identity_params()?),
            (Namespace::User, document.params()?),
        ] {
            for (name, value) in params {
                check_name(&name)?;
                let value = scalar(&value).ok_or_else(|| {
                    Error::malformed(document.identity(), format!("parameter {name} must be a scalar"))
                })?;
                values.insert(ParamKey::new(namespace, name), value);
            }
        }
        Ok(Self {
            source: document.identity().to_string(),
            values,
        })
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Fully resolved parameters
#[derive(Debug, Clone, Default)]
pub struct Params {
    values: BTreeMap<ParamKey, String>,
}

impl Params {
    /// Resolve every parameter defined by any tier
    pub fn resolve(overrides: &Overrides, documents: &[&ConfigDocument]) -> Result<Self> {
        let mut layers = vec![
            Layer::from_overrides("command line", &overrides.params)?,
            Layer::from_overrides("forced", &overrides.forced)?,
        ];
        for document in documents {
            layers.push(Layer::from_document(document)?);
        }
        layers.push(Layer::from_overrides("defaults", &overrides.defaults)?);

        let mut keys: Vec<&ParamKey> = layers.iter().flat_map(|l| l.values.keys()).collect();
        keys.sort();
        keys.dedup();

        let mut resolver = Resolver {
            layers: &layers,
            done: HashMap::new(),
        };
        let mut values = BTreeMap::new();
        for key in keys {
            let value = resolver.resolve(key, &mut Vec::new())?;
            values.insert(key.clone(), value);
        }
        Ok(Self { values })
    }

    /// Value of a parameter
    pub fn get(&self, namespace: Namespace, name: &str) -> Option<&str> {
        self.values
            .get(&ParamKey::new(namespace, name))
            .map(String::as_str)
    }

    /// All resolved parameters, identity ones first
    pub fn iter(&self) -> impl Iterator<Item = (&ParamKey, &str)> {
        self.values.iter().map(|(k, v)| (k, v.as_str()))
    }

    /// Substitute placeholders in one string
    pub fn substitute_str(&self, text: &str, context: &str) -> Result<String> {
        substitute(text, |key| {
            self.values
                .get(key)
                .cloned()
                .ok_or_else(|| Error::UnresolvedParam {
                    reference: key.to_string(),
                    context: context.to_string(),
                })
        })
    }

    /// Substitute placeholders in every string of a JSON tree
    ///
    /// The input is left untouched; a new tree is returned.
    pub fn substitute(&self, value: &Value, context: &str) -> Result<Value> {
        Ok(match value {
            Value::String(s) => Value::String(self.substitute_str(s, context)?),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.substitute(item, context))
                    .collect::<Result<_>>()?,
            ),
            Value::Object(map) => Value::Object(self.substitute_map(map, context)?),
            other => other.clone(),
        })
    }

    /// Substitute placeholders in every value of an object
    pub fn substitute_map(&self, map: &Map<String, Value>, context: &str) -> Result<Map<String, Value>> {
        map.iter()
            .map(|(key, value)| Ok((key.clone(), self.substitute(value, context)?)))
            .collect()
    }
}

struct Resolver<'l> {
    layers: &'l [Layer],
    done: HashMap<ParamKey, String>,
}

impl Resolver<'_> {
    fn resolve(&mut self, key: &ParamKey, stack: &mut Vec<ParamKey>) -> Result<String> {
        if let Some(value) = self.done.get(key) {
            return Ok(value.clone());
        }
        if let Some(position) = stack.iter().position(|k| k == key) {
            if position + 1 == stack.len() {
                return Err(Error::SelfReference {
                    reference: key.to_string(),
                });
            }
            let chain: Vec<String> = stack[position..]
                .iter()
                .chain(std::iter::once(key))
                .map(ToString::to_string)
                .collect();
            return Err(Error::ParamCycle {
                chain: chain.join(" -> "),
            });
        }

        let layers = self.layers;
        let (source, raw) = layers
            .iter()
            .find_map(|layer| layer.values.get(key).map(|raw| (&layer.source, raw)))
            .ok_or_else(|| Error::UnresolvedParam {
                reference: key.to_string(),
                context: stack
                    .last()
                    .map_or_else(|| "parameters".to_string(), |k| format!("parameter {k}")),
            })?;
        log::trace!("{key} taken from {source}");

        stack.push(key.clone());
        let value = substitute(raw, |inner| self.resolve(inner, stack))?;
        stack.pop();

        self.done.insert(key.clone(), value.clone());
        Ok(value)
    }
}

/// `@{name}` or `${name}`, the name being checked separately
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([@$])\{([^}]*)\}").expect("placeholder pattern is valid"));

/// Alphanumeric words joined by single dashes
static NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9]+(-[a-zA-Z0-9]+)*$").expect("name pattern is valid"));

/// Check a parameter name: alphanumeric words joined by single dashes
pub fn is_valid_name(name: &str) -> bool {
    NAME.is_match(name)
}

fn check_name(name: &str) -> Result<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(Error::InvalidParamName {
            name: name.to_string(),
        })
    }
}

/// Replace every `@{name}` / `${name}` placeholder using `lookup`
///
/// Text without a closing brace is kept as is.
fn substitute(text: &str, mut lookup: impl FnMut(&ParamKey) -> Result<String>) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for captures in PLACEHOLDER.captures_iter(text) {
        let (Some(whole), Some(sigil), Some(name)) = (captures.get(0), captures.get(1), captures.get(2)) else {
            continue;
        };
        check_name(name.as_str())?;
        let namespace = if sigil.as_str() == "@" {
            Namespace::Identity
        } else {
            Namespace::User
        };
        out.push_str(&text[last..whole.start()]);
        out.push_str(&lookup(&ParamKey::new(namespace, name.as_str()))?);
        last = whole.end();
    }

    out.push_str(&text[last..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryLoader;
    use serde_json::json;

    fn load(documents: &[(&str, Value)]) -> ConfigDocument {
        let mut loader = MemoryLoader::new();
        for (identity, content) in documents {
            let mut content = content.clone();
            content["format"] = json!("0.1");
            loader.insert(identity, json!({ "mlproj": content }));
        }
        ConfigDocument::load(&loader, documents[0].0).unwrap()
    }

    fn resolve(root: &ConfigDocument, overrides: &Overrides) -> Result<Params> {
        Params::resolve(overrides, &root.flatten())
    }

    #[test]
    fn test_valid_names() {
        assert!(is_valid_name("port"));
        assert!(is_valid_name("app-port-2"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("-port"));
        assert!(!is_valid_name("port-"));
        assert!(!is_valid_name("a--b"));
        assert!(!is_valid_name("a_b"));
    }

    #[test]
    fn test_precedence() {
        let root = load(&[
            ("dev.json", json!({"import": "base.json", "params": {"a": "root"}})),
            ("base.json", json!({"params": {"a": "base", "b": "base", "c": "base"}})),
        ]);
        let overrides = Overrides {
            params: BTreeMap::from([("c".to_string(), "explicit".to_string())]),
            forced: BTreeMap::from([("c".to_string(), "forced".to_string())]),
            defaults: BTreeMap::from([
                ("a".to_string(), "default".to_string()),
                ("d".to_string(), "default".to_string()),
            ]),
        };
        let params = resolve(&root, &overrides).unwrap();
        assert_eq!(params.get(Namespace::User, "a"), Some("root"));
        assert_eq!(params.get(Namespace::User, "b"), Some("base"));
        assert_eq!(params.get(Namespace::User, "c"), Some("explicit"));
        assert_eq!(params.get(Namespace::User, "d"), Some("default"));
    }

    #[test]
    fn test_identity_override_with_at_prefix() {
        let root = load(&[("dev.json", json!({"code": "ape", "connect": {"host": "ml1"}}))]);
        let overrides = Overrides {
            forced: BTreeMap::from([("@host".to_string(), "ml2".to_string())]),
            ..Overrides::default()
        };
        let params = resolve(&root, &overrides).unwrap();
        assert_eq!(params.get(Namespace::Identity, "host"), Some("ml2"));
        assert_eq!(params.get(Namespace::Identity, "code"), Some("ape"));
        assert_eq!(params.get(Namespace::User, "host"), None);
    }

    #[test]
    fn test_values_reference_other_params() {
        let root = load(&[(
            "dev.json",
            json!({"code": "ape", "params": {"db": "@{code}-content", "port": 7010}}),
        )]);
        let params = resolve(&root, &Overrides::default()).unwrap();
        assert_eq!(params.get(Namespace::User, "db"), Some("ape-content"));
        assert_eq!(
            params.substitute_str("${db}:${port}", "test").unwrap(),
            "ape-content:7010"
        );
    }

    #[test]
    fn test_self_reference_rejected() {
        let root = load(&[("dev.json", json!({"params": {"port": "${port}"}}))]);
        let err = resolve(&root, &Overrides::default()).unwrap_err();
        assert!(matches!(err, Error::SelfReference { ref reference } if reference == "${port}"));
    }

    #[test]
    fn test_cycle_rejected() {
        let root = load(&[("dev.json", json!({"params": {"a": "${b}", "b": "${a}"}}))]);
        let err = resolve(&root, &Overrides::default()).unwrap_err();
        assert!(matches!(err, Error::ParamCycle { .. }));
    }

    #[test]
    fn test_unresolved_reference_named() {
        let params = Params::default();
        let err = params.substitute_str("@{nope}", "server app").unwrap_err();
        assert_eq!(err.to_string(), "unresolved parameter reference @{nope} in server app");
    }

    #[test]
    fn test_invalid_name_rejected_before_lookup() {
        let params = Params::default();
        let err = params.substitute_str("${bad_name}", "x").unwrap_err();
        assert!(matches!(err, Error::InvalidParamName { ref name } if name == "bad_name"));
    }

    #[test]
    fn test_declared_names_are_checked() {
        let root = load(&[("dev.json", json!({"params": {"bad_name": "x"}}))]);
        let err = resolve(&root, &Overrides::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidParamName { ref name } if name == "bad_name"));
    }

    #[test]
    fn test_override_names_are_checked() {
        let root = load(&[("dev.json", json!({}))]);
        for overrides in [
            Overrides {
                params: BTreeMap::from([("a b".to_string(), "x".to_string())]),
                ..Overrides::default()
            },
            Overrides {
                forced: BTreeMap::from([("@ho_st".to_string(), "x".to_string())]),
                ..Overrides::default()
            },
            Overrides {
                defaults: BTreeMap::from([("-port".to_string(), "x".to_string())]),
                ..Overrides::default()
            },
        ] {
            let err = resolve(&root, &overrides).unwrap_err();
            assert!(matches!(err, Error::InvalidParamName { .. }));
        }
    }

    #[test]
    fn test_placeholder_edges() {
        let root = load(&[("dev.json", json!({"params": {"x": "1"}}))]);
        let params = resolve(&root, &Overrides::default()).unwrap();
        assert_eq!(params.substitute_str("$${x}", "t").unwrap(), "$1");
        assert_eq!(params.substitute_str("${x}-${x}", "t").unwrap(), "1-1");
        assert_eq!(params.substitute_str("a ${ unclosed", "t").unwrap(), "a ${ unclosed");
    }

    #[test]
    fn test_substitution_is_pure() {
        let root = load(&[("dev.json", json!({"params": {"port": "7010"}}))]);
        let params = resolve(&root, &Overrides::default()).unwrap();
        let original = json!({"port": "${port}", "list": ["a@b", "$", {"x": "${port}"}]});
        let resolved = params.substitute(&original, "server").unwrap();
        assert_eq!(resolved, json!({"port": "7010", "list": ["a@b", "$", {"x": "7010"}]}));
        assert_eq!(original["port"], "${port}");
    }
}
