//! Parsing raw configuration into result trees
//!
//! Parsing runs in three steps: dispatch every present key to its
//! descriptor (unknown keys are errors), check mandatory keys, then fill
//! defaults in declaration order so computed defaults see earlier siblings.

use crate::error::{Error, Result};
use crate::property::{Config, DefaultValue, Kind, Property};
use crate::result::{PropResult, ResultObject, Value};
use serde_json::{Map, Value as Json};

impl Config {
    /// Parse one raw object
    ///
    /// A multiplexer given several values is rejected here; use
    /// [`Config::parse_items`] for array items.
    pub fn parse<'s>(&'s self, raw: &Map<String, Json>) -> Result<ResultObject<'s>> {
        let mut object = ResultObject::new(self);

        for (key, value) in raw {
            let prop = self.find(key).ok_or_else(|| Error::UnknownProperty {
                config: self.label.to_string(),
                key: key.clone(),
            })?;
            if prop.is_ignored() {
                continue;
            }
            let value = parse_value(prop, &prop.kind, value)?;
            object.push(PropResult { prop, value });
        }

        for prop in &self.props {
            if prop.mandatory && !raw.contains_key(prop.key) {
                return Err(Error::MissingProperty {
                    config: self.label.to_string(),
                    key: prop.key.to_string(),
                });
            }
        }

        for prop in &self.props {
            if prop.is_ignored() || object.is_set(prop.key) {
                continue;
            }
            let raw_default = match &prop.default {
                Some(DefaultValue::Fixed(value)) => Some(value.clone()),
                Some(DefaultValue::Computed(compute)) => compute(&object),
                None => None,
            };
            if let Some(raw_default) = raw_default {
                let value = parse_value(prop, &prop.kind, &raw_default)?;
                object.push(PropResult { prop, value });
            }
        }

        Ok(object)
    }

    /// Parse one raw array item, demultiplying it if its multiplexer
    /// property holds several values
    pub fn parse_items<'s>(&'s self, raw: &Map<String, Json>) -> Result<Vec<ResultObject<'s>>> {
        let Some(mux) = self.multiplexer() else {
            return Ok(vec![self.parse(raw)?]);
        };
        match raw.get(mux.key) {
            Some(Json::Array(values)) => values
                .iter()
                .map(|value| {
                    let mut item = raw.clone();
                    item.insert(mux.key.to_string(), value.clone());
                    self.parse(&item)
                })
                .collect(),
            _ => Ok(vec![self.parse(raw)?]),
        }
    }
}

fn parse_value<'s>(prop: &'s Property, kind: &'s Kind, raw: &Json) -> Result<Value<'s>> {
    let key = prop.key;
    match kind {
        Kind::Atomic => match raw {
            Json::String(s) => Ok(Value::Scalar(Json::String(s.clone()))),
            Json::Number(n) => Ok(Value::Scalar(Json::String(n.to_string()))),
            other => Err(Error::invalid_type(key, "a string", other)),
        },
        Kind::Enum(allowed) => {
            let Json::String(s) = raw else {
                return Err(Error::invalid_type(key, "a string", raw));
            };
            if !allowed.contains(&s.as_str()) {
                return Err(Error::InvalidEnum {
                    key: key.to_string(),
                    value: s.clone(),
                    allowed: allowed.join(", "),
                });
            }
            Ok(Value::Scalar(Json::String(s.clone())))
        }
        Kind::Integer => coerce_integer(raw)
            .map(|n| Value::Scalar(Json::from(n)))
            .ok_or_else(|| Error::invalid_type(key, "an integer", raw)),
        Kind::Boolean => coerce_boolean(raw)
            .map(|b| Value::Scalar(Json::Bool(b)))
            .ok_or_else(|| Error::invalid_type(key, "a boolean", raw)),
        Kind::List { delimiter } => match raw {
            Json::String(s) => Ok(Value::List(
                s.split(*delimiter)
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect(),
            )),
            Json::Array(items) => items
                .iter()
                .map(|item| match item {
                    Json::String(s) => Ok(s.clone()),
                    other => Err(Error::invalid_type(key, "a list of strings", other)),
                })
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            other => Err(Error::invalid_type(key, "a string or a list of strings", other)),
        },
        Kind::Object { config, .. } => {
            let Json::Object(map) = raw else {
                return Err(Error::invalid_type(key, "an object", raw));
            };
            Ok(Value::Object(config.parse(map)?))
        }
        Kind::Array(config) => {
            let mut parsed = Vec::new();
            for item in array_of_objects(key, raw)? {
                parsed.extend(config.parse_items(item)?);
            }
            Ok(Value::Array(parsed))
        }
        Kind::Union(variants) => {
            let mut parsed = Vec::new();
            for item in array_of_objects(key, raw)? {
                let variant = variants
                    .iter()
                    .find(|v| (v.matches)(item))
                    .ok_or_else(|| Error::NoVariant {
                        key: key.to_string(),
                        value: Json::Object(item.clone()).to_string(),
                    })?;
                for object in variant.config.parse_items(item)? {
                    parsed.push((variant.wire, object));
                }
            }
            Ok(Value::Union(parsed))
        }
        Kind::Multiplexer(inner) => {
            if raw.is_array() {
                return Err(Error::Multiplexed {
                    key: key.to_string(),
                });
            }
            parse_value(prop, inner, raw)
        }
        Kind::Ignore => Ok(Value::Scalar(raw.clone())),
    }
}

fn array_of_objects<'r>(key: &str, raw: &'r Json) -> Result<Vec<&'r Map<String, Json>>> {
    let Json::Array(items) = raw else {
        return Err(Error::invalid_type(key, "an array of objects", raw));
    };
    items
        .iter()
        .map(|item| match item {
            Json::Object(map) => Ok(map),
            other => Err(Error::invalid_type(key, "an array of objects", other)),
        })
        .collect()
}

/// Accept a native integer or a string of digits
pub fn coerce_integer(raw: &Json) -> Option<i64> {
    match raw {
        Json::Number(n) => n.as_i64(),
        Json::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => s.parse().ok(),
        _ => None,
    }
}

/// Accept a native boolean or the literal strings `"true"` / `"false"`
pub fn coerce_boolean(raw: &Json) -> Option<bool> {
    match raw {
        Json::Bool(b) => Some(*b),
        Json::String(s) if s == "true" => Some(true),
        Json::String(s) if s == "false" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::Variant;
    use serde_json::json;

    fn map(value: Json) -> Map<String, Json> {
        match value {
            Json::Object(map) => map,
            _ => panic!("test fixture must be an object"),
        }
    }

    fn sample() -> Config {
        Config::new("sample")
            .ignoring(&["id"])
            .with(Property::atomic("name", "sample-name").mandatory())
            .with(Property::integer("port", "port"))
            .with(Property::boolean("enabled", "enabled").default_value(true))
            .with(Property::enumeration("mode", "mode", &["fast", "strict"]))
            .with(Property::list("tags", "tag"))
            .with(
                Property::atomic("label", "label")
                    .computed(|obj| obj.string("name").map(|n| json!(format!("{n}-label")))),
            )
    }

    #[test]
    fn test_integer_coercion_from_digits() {
        let config = sample();
        let parsed = config.parse(&map(json!({"name": "a", "port": "7010"}))).unwrap();
        assert_eq!(parsed.integer("port"), Some(7010));
        let native = config.parse(&map(json!({"name": "a", "port": 8000}))).unwrap();
        assert_eq!(native.integer("port"), Some(8000));
    }

    #[test]
    fn test_integer_rejects_other_strings() {
        let err = sample()
            .parse(&map(json!({"name": "a", "port": "70x"})))
            .unwrap_err();
        assert!(err.to_string().contains("\"70x\""));
    }

    #[test]
    fn test_boolean_coercion() {
        let config = sample();
        let parsed = config.parse(&map(json!({"name": "a", "enabled": "false"}))).unwrap();
        assert_eq!(parsed.boolean("enabled"), Some(false));
        assert!(config.parse(&map(json!({"name": "a", "enabled": "yes"}))).is_err());
        assert!(config.parse(&map(json!({"name": "a", "enabled": 1}))).is_err());
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = sample().parse(&map(json!({"name": "a", "prot": 1}))).unwrap_err();
        assert!(matches!(err, Error::UnknownProperty { ref key, .. } if key == "prot"));
    }

    #[test]
    fn test_missing_mandatory() {
        let err = sample().parse(&map(json!({"port": 1}))).unwrap_err();
        assert!(matches!(err, Error::MissingProperty { ref key, .. } if key == "name"));
    }

    #[test]
    fn test_ignored_keys_are_accepted_but_not_kept() {
        let schema = sample();
        let parsed = schema.parse(&map(json!({"id": "x", "name": "a"}))).unwrap();
        assert!(!parsed.is_set("id"));
    }

    #[test]
    fn test_defaults_fixed_and_computed() {
        let schema = sample();
        let parsed = schema.parse(&map(json!({"name": "a"}))).unwrap();
        assert_eq!(parsed.boolean("enabled"), Some(true));
        assert_eq!(parsed.string("label"), Some("a-label"));
        assert!(!parsed.is_set("port"));
    }

    #[test]
    fn test_enum_closed_set() {
        let err = sample()
            .parse(&map(json!({"name": "a", "mode": "slow"})))
            .unwrap_err();
        assert!(err.to_string().contains("fast, strict"));
    }

    #[test]
    fn test_list_from_delimited_string_or_array() {
        let config = sample();
        let parsed = config.parse(&map(json!({"name": "a", "tags": "x, y,,z"}))).unwrap();
        assert_eq!(parsed.list("tags").unwrap(), ["x", "y", "z"]);
        let parsed = config.parse(&map(json!({"name": "a", "tags": ["x"]}))).unwrap();
        assert_eq!(parsed.list("tags").unwrap(), ["x"]);
    }

    #[test]
    fn test_multiplexer_demultiplies_array_items() {
        let item = Config::new("item")
            .with(Property::multiplexer("name", "localname", Kind::Atomic).mandatory())
            .with(Property::atomic("type", "scalar-type"));
        let holder = Config::new("holder").with(Property::array("items", "item", item));

        let parsed = holder
            .parse(&map(json!({"items": [{"name": ["a", "b"], "type": "string"}, {"name": "c"}]})))
            .unwrap();
        let rendered = Json::Object(parsed.render());
        assert_eq!(
            rendered,
            json!({"item": [
                {"localname": "a", "scalar-type": "string"},
                {"localname": "b", "scalar-type": "string"},
                {"localname": "c"},
            ]})
        );
    }

    #[test]
    fn test_multiplexer_outside_array_is_rejected() {
        let config = Config::new("c").with(Property::multiplexer("name", "n", Kind::Atomic));
        let err = config.parse(&map(json!({"name": ["a", "b"]}))).unwrap_err();
        assert!(matches!(err, Error::Multiplexed { .. }));
    }

    #[test]
    fn test_union_dispatches_on_predicate() {
        let by_path = Config::new("path").with(Property::atomic("path", "path-expression"));
        let by_name = Config::new("element").with(Property::atomic("name", "localname"));
        let config = Config::new("indexes").with(Property::union(
            "ranges",
            vec![
                Variant::new("range-path-index", |m| m.contains_key("path"), by_path),
                Variant::new("range-element-index", |m| m.contains_key("name"), by_name),
            ],
        ));
        let parsed = config
            .parse(&map(json!({"ranges": [{"name": "a"}, {"path": "/b"}]})))
            .unwrap();
        assert_eq!(
            Json::Object(parsed.render()),
            json!({
                "range-path-index": [{"path-expression": "/b"}],
                "range-element-index": [{"localname": "a"}],
            })
        );

        let err = config.parse(&map(json!({"ranges": [{"other": 1}]}))).unwrap_err();
        assert!(matches!(err, Error::NoVariant { .. }));
    }
}
