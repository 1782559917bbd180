//! Property descriptors
//!
//! A [`Config`] describes every key recognized for one component kind as a
//! tree of typed [`Property`] descriptors.

use crate::result::ResultObject;
use serde_json::{Map, Value};

/// Default computed from already-parsed sibling values
pub type ComputeDefault = fn(&ResultObject<'_>) -> Option<Value>;

/// Predicate selecting a union variant from a raw array item
pub type Matches = fn(&Map<String, Value>) -> bool;

/// Default value of a property, given in raw (configuration) form
#[derive(Debug, Clone)]
pub enum DefaultValue {
    Fixed(Value),
    Computed(ComputeDefault),
}

/// Type of a property
#[derive(Debug, Clone)]
pub enum Kind {
    /// Scalar string (numbers are accepted and kept as text)
    Atomic,
    /// String from a closed value set
    Enum(&'static [&'static str]),
    /// Integer, or a string of digits
    Integer,
    /// Boolean, or the strings `"true"` / `"false"`
    Boolean,
    /// Array of strings, or a delimited string
    List { delimiter: char },
    /// Nested object; `flatten` renders its entries into the parent body
    Object { config: Config, flatten: bool },
    /// Homogeneous array of nested objects
    Array(Config),
    /// Array whose items dispatch to one of several configs
    Union(Vec<Variant>),
    /// Scalar-or-array field demultiplying its enclosing array item
    Multiplexer(Box<Kind>),
    /// Recognized key handled by bespoke code
    Ignore,
}

/// One alternative of a [`Kind::Union`]
#[derive(Debug, Clone)]
pub struct Variant {
    /// Wire key the items of this variant render under
    pub wire: &'static str,
    pub matches: Matches,
    pub config: Config,
}

impl Variant {
    pub fn new(wire: &'static str, matches: Matches, config: Config) -> Self {
        Self {
            wire,
            matches,
            config,
        }
    }
}

/// Descriptor of one configuration key
#[derive(Debug, Clone)]
pub struct Property {
    /// Key in configuration documents
    pub key: &'static str,
    /// Key in wire bodies (unused for flattened objects and unions)
    pub name: &'static str,
    pub kind: Kind,
    pub mandatory: bool,
    /// A live value differing from the desired one needs manual intervention
    pub frozen: bool,
    /// Sent on creation only, never compared
    pub create_only: bool,
    pub default: Option<DefaultValue>,
}

impl Property {
    pub fn new(key: &'static str, name: &'static str, kind: Kind) -> Self {
        Self {
            key,
            name,
            kind,
            mandatory: false,
            frozen: false,
            create_only: false,
            default: None,
        }
    }

    pub fn atomic(key: &'static str, name: &'static str) -> Self {
        Self::new(key, name, Kind::Atomic)
    }

    pub fn enumeration(key: &'static str, name: &'static str, values: &'static [&'static str]) -> Self {
        Self::new(key, name, Kind::Enum(values))
    }

    pub fn integer(key: &'static str, name: &'static str) -> Self {
        Self::new(key, name, Kind::Integer)
    }

    pub fn boolean(key: &'static str, name: &'static str) -> Self {
        Self::new(key, name, Kind::Boolean)
    }

    /// String list, comma-delimited when given as a string
    pub fn list(key: &'static str, name: &'static str) -> Self {
        Self::new(key, name, Kind::List { delimiter: ',' })
    }

    pub fn object(key: &'static str, name: &'static str, config: Config) -> Self {
        Self::new(
            key,
            name,
            Kind::Object {
                config,
                flatten: false,
            },
        )
    }

    /// Nested object rendered into the parent body
    pub fn flattened(key: &'static str, config: Config) -> Self {
        Self::new(
            key,
            "",
            Kind::Object {
                config,
                flatten: true,
            },
        )
    }

    pub fn array(key: &'static str, name: &'static str, config: Config) -> Self {
        Self::new(key, name, Kind::Array(config))
    }

    pub fn union(key: &'static str, variants: Vec<Variant>) -> Self {
        Self::new(key, "", Kind::Union(variants))
    }

    pub fn multiplexer(key: &'static str, name: &'static str, inner: Kind) -> Self {
        Self::new(key, name, Kind::Multiplexer(Box::new(inner)))
    }

    pub fn ignore(key: &'static str) -> Self {
        Self::new(key, "", Kind::Ignore)
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn frozen(mut self) -> Self {
        self.frozen = true;
        self
    }

    pub fn create_only(mut self) -> Self {
        self.create_only = true;
        self
    }

    pub fn delimiter(mut self, delimiter: char) -> Self {
        if let Kind::List { .. } = self.kind {
            self.kind = Kind::List { delimiter };
        }
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Fixed(value.into()));
        self
    }

    pub fn computed(mut self, compute: ComputeDefault) -> Self {
        self.default = Some(DefaultValue::Computed(compute));
        self
    }

    /// Check if this property is handled outside the schema
    pub fn is_ignored(&self) -> bool {
        matches!(self.kind, Kind::Ignore)
    }

    /// Check if this property demultiplies its enclosing array item
    pub fn is_multiplexer(&self) -> bool {
        matches!(self.kind, Kind::Multiplexer(_))
    }
}

/// Set of properties recognized for one kind of object
#[derive(Debug, Clone)]
pub struct Config {
    /// Name used in error messages
    pub label: &'static str,
    pub props: Vec<Property>,
}

impl Config {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            props: Vec::new(),
        }
    }

    /// Add a property
    pub fn with(mut self, prop: Property) -> Self {
        self.props.push(prop);
        self
    }

    /// Add keys handled by bespoke code
    pub fn ignoring(mut self, keys: &[&'static str]) -> Self {
        for key in keys {
            self.props.push(Property::ignore(key));
        }
        self
    }

    /// Find a property by configuration key
    pub fn find(&self, key: &str) -> Option<&Property> {
        self.props.iter().find(|p| p.key == key)
    }

    /// The multiplexer property of this config, if any
    pub fn multiplexer(&self) -> Option<&Property> {
        self.props.iter().find(|p| p.is_multiplexer())
    }
}
