//! Schemas of every managed component kind
//!
//! Keys marked ignored are recognized in configuration documents but handled
//! by the component code itself (identity, composition, references).

use crate::property::{Config, Kind, Property, Variant};
use serde_json::{Value, json};
use std::sync::LazyLock;

/// Database properties
pub static DATABASE: LazyLock<Config> = LazyLock::new(database);
/// Application server properties
pub static SERVER: LazyLock<Config> = LazyLock::new(server);
/// Source set properties
pub static SOURCE: LazyLock<Config> = LazyLock::new(source);
/// MIME type registration properties
pub static MIME: LazyLock<Config> = LazyLock::new(mime);
/// Security user properties
pub static USER: LazyLock<Config> = LazyLock::new(user);
/// Security role properties
pub static ROLE: LazyLock<Config> = LazyLock::new(role);

/// Default collation of string range indexes
pub const CODEPOINT_COLLATION: &str = "http://marklogic.com/collation/";

const STEMMING: &[&str] = &["off", "basic", "advanced", "decompounding"];
const LOCKING: &[&str] = &["strict", "fast", "off"];
const INVALID_VALUES: &[&str] = &["reject", "ignore"];
const SERVER_TYPES: &[&str] = &["http", "xdbc", "odbc", "webdav"];
const AUTHENTICATION: &[&str] = &["digest", "basic", "digestbasic", "application-level", "certificate"];
const SOURCE_TYPES: &[&str] = &["plain", "rest-src"];
const MIME_FORMATS: &[&str] = &["binary", "json", "text", "xml"];
const PRIVILEGE_KINDS: &[&str] = &["execute", "uri"];
const CAPABILITIES: &[&str] = &["read", "update", "insert", "execute", "node-update"];

fn collation(object: &crate::ResultObject<'_>) -> Option<Value> {
    let collation = if object.string("type") == Some("string") {
        CODEPOINT_COLLATION
    } else {
        ""
    };
    Some(json!(collation))
}

/// Properties shared by every range index kind
fn range_index(label: &'static str) -> Config {
    Config::new(label)
        .with(Property::atomic("type", "scalar-type").mandatory())
        .with(Property::boolean("positions", "range-value-positions").default_value(false))
        .with(Property::enumeration("invalid", "invalid-values", INVALID_VALUES).default_value("reject"))
}

fn ranges() -> Property {
    let element = range_index("element range index")
        .with(Property::multiplexer("name", "localname", Kind::Atomic).mandatory())
        .with(Property::atomic("namespace", "namespace-uri").default_value(""))
        .with(Property::atomic("collation", "collation").computed(collation));

    let attribute = range_index("attribute range index")
        .with(Property::multiplexer("name", "localname", Kind::Atomic).mandatory())
        .with(Property::atomic("namespace", "namespace-uri").default_value(""))
        .with(Property::atomic("parent", "parent-localname").mandatory())
        .with(Property::atomic("parent-namespace", "parent-namespace-uri").default_value(""))
        .with(Property::atomic("collation", "collation").computed(collation));

    let path = range_index("path range index")
        .with(Property::multiplexer("path", "path-expression", Kind::Atomic).mandatory())
        .with(Property::atomic("collation", "collation").computed(collation));

    // First matching predicate wins; element indexes match anything left
    Property::union(
        "ranges",
        vec![
            Variant::new("range-element-attribute-index", |m| m.contains_key("parent"), attribute),
            Variant::new("range-path-index", |m| m.contains_key("path"), path),
            Variant::new("range-element-index", |_| true, element),
        ],
    )
}

fn database() -> Config {
    let lexicons = Config::new("lexicons")
        .with(Property::boolean("uri", "uri-lexicon"))
        .with(Property::boolean("collection", "collection-lexicon"));
    let indexes = Config::new("indexes").with(ranges());

    Config::new("database")
        .ignoring(&["id", "compose", "forests", "schema", "security", "triggers"])
        .with(Property::atomic("name", "database-name").mandatory().frozen())
        .with(Property::flattened("lexicons", lexicons))
        .with(Property::flattened("indexes", indexes))
        .with(Property::boolean("triple-index", "triple-index"))
        .with(Property::enumeration("stemmed-searches", "stemmed-searches", STEMMING))
        .with(Property::boolean("word-searches", "word-searches"))
        .with(Property::boolean("fast-phrase-searches", "fast-phrase-searches"))
        .with(Property::boolean("rebalancer-enable", "rebalancer-enable"))
        .with(Property::atomic("language", "language"))
        .with(Property::enumeration("locking", "locking", LOCKING))
        .with(Property::enumeration("journaling", "journaling", LOCKING))
        .with(Property::integer("in-memory-limit", "in-memory-limit"))
}

fn server() -> Config {
    let output = Config::new("output")
        .with(Property::atomic("byte-order-mark", "output-byte-order-mark"))
        .with(Property::atomic("indent", "output-indent"))
        .with(Property::atomic("method", "output-method"))
        .with(Property::atomic("encoding", "output-encoding"));
    let namespace = Config::new("namespace")
        .with(Property::atomic("prefix", "prefix").mandatory())
        .with(Property::atomic("uri", "namespace-uri").mandatory());

    Config::new("server")
        .ignoring(&["id", "compose", "content", "modules", "group"])
        .with(Property::atomic("name", "server-name").mandatory().frozen())
        .with(
            Property::enumeration("type", "server-type", SERVER_TYPES)
                .frozen()
                .default_value("http"),
        )
        .with(Property::integer("port", "port").mandatory())
        .with(Property::atomic("root", "root").default_value("/"))
        .with(Property::atomic("rewriter", "url-rewriter"))
        .with(Property::atomic("handler", "error-handler"))
        .with(Property::boolean("rewrite-resolves-globally", "rewrite-resolves-globally"))
        .with(Property::enumeration("authentication", "authentication", AUTHENTICATION))
        .with(Property::atomic("default-user", "default-user"))
        .with(Property::flattened("output", output))
        .with(Property::array("namespaces", "namespace", namespace))
        .with(Property::integer("threads", "threads"))
}

fn source() -> Config {
    Config::new("source")
        .ignoring(&["id", "compose"])
        .with(Property::atomic("name", "name").mandatory())
        .with(Property::atomic("dir", "dir").computed(|object| object.string("name").map(|name| json!(name))))
        .with(Property::enumeration("type", "type", SOURCE_TYPES).default_value("plain"))
        .with(Property::list("include", "include"))
        .with(Property::list("exclude", "exclude"))
        .with(Property::list("garbage", "garbage").default_value(json!(["*~", ".*"])))
        .with(Property::list("collections", "collections"))
        .with(Property::atomic("prefix", "prefix"))
        .with(Property::atomic("target", "target"))
        .with(Property::array("permissions", "permission", permission()))
}

fn mime() -> Config {
    Config::new("mime type")
        .ignoring(&["id", "compose"])
        .with(Property::atomic("name", "name").mandatory().frozen())
        .with(Property::list("extensions", "extension").delimiter(' '))
        .with(Property::enumeration("format", "format", MIME_FORMATS).mandatory())
}

fn user() -> Config {
    Config::new("user")
        .ignoring(&["id", "compose"])
        .with(Property::atomic("name", "user-name").mandatory().frozen())
        .with(Property::atomic("password", "password").create_only())
        .with(Property::atomic("desc", "description"))
        .with(Property::list("roles", "role"))
}

fn role() -> Config {
    let privilege = Config::new("privilege")
        .with(Property::atomic("name", "privilege-name").mandatory())
        .with(Property::multiplexer("action", "action", Kind::Atomic).mandatory())
        .with(Property::enumeration("kind", "kind", PRIVILEGE_KINDS).default_value("execute"));

    Config::new("role")
        .ignoring(&["id", "compose"])
        .with(Property::atomic("name", "role-name").mandatory().frozen())
        .with(Property::atomic("desc", "description"))
        .with(Property::list("roles", "role"))
        .with(Property::array("privileges", "privilege", privilege))
        .with(Property::array("permissions", "permission", permission()))
}

/// One role and its capabilities, on a role or on loaded documents
fn permission() -> Config {
    Config::new("permission")
        .with(Property::atomic("role", "role-name").mandatory())
        .with(Property::multiplexer("capability", "capability", Kind::Enum(CAPABILITIES)).mandatory())
}
