//! # Propschema
//!
//! Typed property schemas for remote resource configuration.
//!
//! A [`Config`] declares every key recognized for one kind of component.
//! Parsing validates a raw JSON object against it (unknown keys and missing
//! mandatory keys are errors, scalars are coerced, defaults are filled) and
//! yields a [`ResultObject`]. The result renders into the body expected by the
//! remote management API, and [`diff`] compares it with a live body to find
//! the properties that need updating.
//!
//! ## Example
//!
//! ```
//! use propschema::{diff, kinds};
//! use serde_json::json;
//!
//! let raw = json!({"name": "app", "port": "7010"});
//! let server = kinds::SERVER.parse(raw.as_object().unwrap()).unwrap();
//! assert_eq!(server.integer("port"), Some(7010));
//!
//! let live = json!({"server-name": "app", "server-type": "http", "port": 7010, "root": "/app"});
//! let changes = diff(&server, live.as_object().unwrap()).unwrap();
//! assert_eq!(changes.len(), 1);
//! assert_eq!(changes[0].property, "root");
//! ```

pub mod diff;
pub mod error;
pub mod kinds;
pub mod parse;
pub mod property;
pub mod result;

pub use diff::{Change, diff};
pub use error::{Error, Result};
pub use property::{ComputeDefault, Config, DefaultValue, Kind, Matches, Property, Variant};
pub use result::{PropResult, ResultObject, Value};
