//! Parsed, validated property values and their wire rendering

use crate::property::{Config, Kind, Property};
use serde_json::{Map, Value as Json};

/// Parsed value of one property
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'s> {
    /// String, integer or boolean, already coerced
    Scalar(Json),
    List(Vec<String>),
    Object(ResultObject<'s>),
    Array(Vec<ResultObject<'s>>),
    /// Items of a multi-type array, each tagged with its wire key
    Union(Vec<(&'static str, ResultObject<'s>)>),
}

/// A property descriptor paired with its parsed value
#[derive(Debug, Clone)]
pub struct PropResult<'s> {
    pub prop: &'s Property,
    pub value: Value<'s>,
}

impl PartialEq for PropResult<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.prop, other.prop) && self.value == other.value
    }
}

impl PartialEq for ResultObject<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.config, other.config) && self.entries == other.entries
    }
}

impl PropResult<'_> {
    /// Render this value into a wire body
    pub fn render_into(&self, body: &mut Map<String, Json>) {
        match (&self.value, &self.prop.kind) {
            (Value::Object(object), Kind::Object { flatten: true, .. }) => {
                object.render_into(body);
            }
            (Value::Union(items), Kind::Union(variants)) => {
                for variant in variants {
                    let rendered: Vec<Json> = items
                        .iter()
                        .filter(|(wire, _)| *wire == variant.wire)
                        .map(|(_, item)| Json::Object(item.render()))
                        .collect();
                    body.insert(variant.wire.to_string(), Json::Array(rendered));
                }
            }
            (value, _) => {
                body.insert(self.prop.name.to_string(), render_value(value));
            }
        }
    }

    /// Render this value alone
    pub fn render(&self) -> Map<String, Json> {
        let mut body = Map::new();
        self.render_into(&mut body);
        body
    }
}

fn render_value(value: &Value<'_>) -> Json {
    match value {
        Value::Scalar(json) => json.clone(),
        Value::List(items) => Json::Array(items.iter().cloned().map(Json::String).collect()),
        Value::Object(object) => Json::Object(object.render()),
        Value::Array(items) => Json::Array(items.iter().map(|i| Json::Object(i.render())).collect()),
        Value::Union(items) => Json::Array(
            items
                .iter()
                .map(|(_, item)| Json::Object(item.render()))
                .collect(),
        ),
    }
}

/// Parsed object: the properties set on it, in parse order
#[derive(Debug, Clone)]
pub struct ResultObject<'s> {
    pub config: &'s Config,
    entries: Vec<PropResult<'s>>,
}

impl<'s> ResultObject<'s> {
    pub(crate) fn new(config: &'s Config) -> Self {
        Self {
            config,
            entries: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, result: PropResult<'s>) {
        self.entries.push(result);
    }

    /// Properties set on this object
    pub fn entries(&self) -> &[PropResult<'s>] {
        &self.entries
    }

    /// Look up a property by configuration key
    pub fn get(&self, key: &str) -> Option<&PropResult<'s>> {
        self.entries.iter().find(|e| e.prop.key == key)
    }

    /// Check if a property is set
    pub fn is_set(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Scalar value of a property
    pub fn scalar(&self, key: &str) -> Option<&Json> {
        match &self.get(key)?.value {
            Value::Scalar(json) => Some(json),
            _ => None,
        }
    }

    /// String value of a property
    pub fn string(&self, key: &str) -> Option<&str> {
        self.scalar(key)?.as_str()
    }

    /// Integer value of a property
    pub fn integer(&self, key: &str) -> Option<i64> {
        self.scalar(key)?.as_i64()
    }

    /// Boolean value of a property
    pub fn boolean(&self, key: &str) -> Option<bool> {
        self.scalar(key)?.as_bool()
    }

    /// List value of a property
    pub fn list(&self, key: &str) -> Option<&[String]> {
        match &self.get(key)?.value {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Nested object value of a property
    pub fn object(&self, key: &str) -> Option<&ResultObject<'s>> {
        match &self.get(key)?.value {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Render into the remote API's body shape
    pub fn render(&self) -> Map<String, Json> {
        let mut body = Map::new();
        self.render_into(&mut body);
        body
    }

    /// Render into an existing body
    pub fn render_into(&self, body: &mut Map<String, Json>) {
        for entry in &self.entries {
            entry.render_into(body);
        }
    }

    /// Leaf units compared one by one when diffing
    ///
    /// Flattened objects are opened up; every other entry is a unit.
    pub fn units(&self) -> Vec<&PropResult<'s>> {
        let mut units = Vec::new();
        for entry in &self.entries {
            match (&entry.value, &entry.prop.kind) {
                (Value::Object(object), Kind::Object { flatten: true, .. }) => {
                    units.extend(object.units());
                }
                _ => units.push(entry),
            }
        }
        units
    }
}
