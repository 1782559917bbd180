//! # Declarative
//!
//! The action model of a reconciliation engine.
//!
//! Planning compares desired state with state read from a remote system and
//! queues one [`Action`] per required create/update. The queue is then run
//! strictly in order against a [`Transport`]; the first failure stops it.
//!
//! ## Core Concepts
//!
//! - **Action**: one remote operation (create database, attach forest, update property...)
//! - **ActionList**: ordered queue with `todo`, `done` and `error` buckets
//! - **Transport**: capability issuing GET/POST/PUT calls and waiting for restarts
//! - **Reporter**: receives planning events and execution progress
//!
//! ## Example
//!
//! ```
//! use declarative::{Action, ActionList, MockTransport, NoReport};
//! use serde_json::json;
//!
//! let mut list = ActionList::new();
//! list.add(Action::CreateDatabase {
//!     name: "app-content".into(),
//!     body: json!({"database-name": "app-content"}),
//! });
//! list.add(Action::CreateForest {
//!     name: "app-content-001".into(),
//!     database: "app-content".into(),
//! });
//!
//! let transport = MockTransport::new();
//! let summary = list.execute(&transport, &mut NoReport);
//! assert_eq!(summary.done, 2);
//! println!("{}", list.summary());
//! ```
//!
//! Execution is single-threaded and synchronous: each action issues one
//! blocking call and waits for its response before the next one starts.

pub mod action;
pub mod context;
pub mod error;
pub mod executor;
pub mod mock;
pub mod types;

// Re-export main types at crate root
pub use action::{Action, Permission, ResourceKind};
pub use context::{NoReport, Reporter, Transport};
pub use error::{Error, Result};
pub use executor::{ActionList, Failure, Summary};
pub use mock::{MockTransport, RecordingReporter, Recorded};
pub use types::{ActionState, Api, Body, ExecuteSummary, Response, RestartSignal, Verb};
