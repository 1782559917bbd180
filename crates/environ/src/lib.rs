//! # Environ
//!
//! Compiles layered environment documents into typed components and plans
//! their reconciliation with a remote system.
//!
//! ## Pipeline
//!
//! 1. **Load**: the root document and its imports, through a [`DocumentLoader`]
//! 2. **Resolve**: identity (`@{code}`) and user (`${port}`) parameters
//! 3. **Compose**: declarations sharing an id or name across layers merge
//!    or hide each other
//! 4. **Instantiate**: databases in dependency order, then servers, sources
//!    and resources
//! 5. **Plan**: each component reads its live state and queues actions
//!
//! ## Example
//!
//! ```
//! use declarative::{ActionList, MockTransport, NoReport};
//! use environ::{Environment, MemoryLoader, Overrides};
//! use serde_json::json;
//!
//! let loader = MemoryLoader::new().with("dev.json", json!({"mlproj": {
//!     "format": "0.1",
//!     "code": "ape",
//!     "databases": [{"id": "content", "name": "@{code}-content"}],
//!     "servers": [{"name": "@{code}", "port": 7010, "content": {"idref": "content"}}],
//! }}));
//! let env = Environment::compile(&loader, "dev.json", &Overrides::default()).unwrap();
//!
//! let mut actions = ActionList::new();
//! env.setup(&mut actions, &MockTransport::new(), &mut NoReport).unwrap();
//! assert_eq!(actions.len(), 3);
//! ```

pub mod apis;
pub mod component;
pub mod compose;
pub mod document;
pub mod environment;
pub mod error;
pub mod instantiate;
pub mod loader;
pub mod params;
pub mod plan;

pub use apis::{Apis, FileLister, ServerApi};
pub use component::{Database, DbRef, Resource, Server, SourceSet, SysDatabase};
pub use document::ConfigDocument;
pub use environment::{ApiSettings, Connection, Environment, LoadTarget};
pub use error::{Error, ErrorCategory, Result};
pub use loader::{DocumentLoader, LoadError, MemoryLoader};
pub use params::{Namespace, Overrides, ParamKey, Params};
pub use plan::Planner;
