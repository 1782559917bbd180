//! Capability traits passed into the core by the caller
//!
//! These traits allow the declarative crate to be used without
//! depending on a specific HTTP client or terminal renderer.

use crate::action::Action;
use crate::error::Result;
use crate::types::{Api, Body, Response, RestartSignal};

/// Transport to the remote system
///
/// Implementations own authentication, base URLs per [`Api`] surface,
/// and any timeout policy. A non-2xx status is returned as a normal
/// [`Response`]; only failures to complete the exchange are errors.
pub trait Transport {
    /// Issue a GET request
    fn get(&self, api: Api, url: &str) -> Result<Response>;

    /// Issue a POST request
    fn post(&self, api: Api, url: &str, body: Option<&Body>) -> Result<Response>;

    /// Issue a PUT request
    fn put(&self, api: Api, url: &str, body: Option<&Body>) -> Result<Response>;

    /// Block until the restart announced by `signal` has completed
    fn restart(&self, signal: &RestartSignal) -> Result<()>;
}

/// Sink for planning events and execution progress
///
/// Purely a projection: implementations never mutate core state.
pub trait Reporter {
    /// A component is being checked against the remote state
    fn check(&mut self, indent: usize, message: &str);

    /// Something will be created or attached
    fn add(&mut self, indent: usize, what: &str, name: &str);

    /// Something will be detached
    fn remove(&mut self, indent: usize, what: &str, name: &str);

    /// A non-fatal problem to show the user
    fn error(&mut self, message: &str);

    /// Called before an action is executed
    fn on_action_start(&mut self, _action: &Action) {}

    /// Called after an action has been executed
    fn on_action_complete(&mut self, _action: &Action, _success: bool) {}
}

/// Reporter that discards every event
pub struct NoReport;

impl Reporter for NoReport {
    fn check(&mut self, _indent: usize, _message: &str) {}
    fn add(&mut self, _indent: usize, _what: &str, _name: &str) {}
    fn remove(&mut self, _indent: usize, _what: &str, _name: &str) {}
    fn error(&mut self, _message: &str) {}
}
