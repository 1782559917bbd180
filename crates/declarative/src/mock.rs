//! In-memory transport for replaying plans without network access
//!
//! Responses are scripted per `(verb, api, url)`. Unscripted GETs answer
//! 404 (the remote has nothing) and unscripted writes answer 201, so a
//! fresh [`MockTransport`] behaves like an empty target system.
//!
//! ```
//! use declarative::{Action, Api, MockTransport, Response, Transport, Verb};
//!
//! let transport = MockTransport::new();
//! transport.respond(Verb::Get, Api::Manage, "/forests", Response::empty(200));
//!
//! let listed = Action::ListForests.fetch(&transport).unwrap();
//! assert!(listed.is_some());
//! assert_eq!(transport.requests().len(), 1);
//! ```

use crate::action::Action;
use crate::context::{Reporter, Transport};
use crate::error::{Error, Result};
use crate::types::{Api, Body, Response, RestartSignal, Verb};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

/// A request seen by the mock transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recorded {
    pub verb: Verb,
    pub api: Api,
    pub url: String,
    pub body: Option<Body>,
}

type Key = (Verb, Api, String);

/// Scripted transport recording every request
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: Mutex<HashMap<Key, VecDeque<Response>>>,
    requests: Mutex<Vec<Recorded>>,
    restarts: Mutex<Vec<RestartSignal>>,
    strict: bool,
}

impl MockTransport {
    /// Create a mock behaving like an empty target system
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that fails on any unscripted request
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    /// Script the next response for a request
    ///
    /// Several responses for the same request are returned in order;
    /// the last one is repeated.
    pub fn respond(&self, verb: Verb, api: Api, url: &str, response: Response) {
        let mut responses = self.responses.lock().unwrap_or_else(PoisonError::into_inner);
        responses
            .entry((verb, api, url.to_string()))
            .or_default()
            .push_back(response);
    }

    /// Requests received so far, in order
    pub fn requests(&self) -> Vec<Recorded> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Write requests received so far (reads filtered out)
    pub fn writes(&self) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.verb != Verb::Get)
            .collect()
    }

    /// Restart signals waited on so far
    pub fn restarts(&self) -> Vec<RestartSignal> {
        self.restarts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn handle(&self, verb: Verb, api: Api, url: &str, body: Option<&Body>) -> Result<Response> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Recorded {
                verb,
                api,
                url: url.to_string(),
                body: body.cloned(),
            });

        let mut responses = self.responses.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(queue) = responses.get_mut(&(verb, api, url.to_string())) {
            let response = if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            };
            if let Some(response) = response {
                return Ok(response);
            }
        }

        if self.strict {
            return Err(Error::Unscripted {
                verb,
                url: url.to_string(),
            });
        }
        Ok(match verb {
            Verb::Get => Response::empty(404),
            Verb::Post | Verb::Put => Response::empty(201),
        })
    }
}

impl Transport for MockTransport {
    fn get(&self, api: Api, url: &str) -> Result<Response> {
        self.handle(Verb::Get, api, url, None)
    }

    fn post(&self, api: Api, url: &str, body: Option<&Body>) -> Result<Response> {
        self.handle(Verb::Post, api, url, body)
    }

    fn put(&self, api: Api, url: &str, body: Option<&Body>) -> Result<Response> {
        self.handle(Verb::Put, api, url, body)
    }

    fn restart(&self, signal: &RestartSignal) -> Result<()> {
        self.restarts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(signal.clone());
        Ok(())
    }
}

/// Reporter keeping every event as a line of text
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub events: Vec<String>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for RecordingReporter {
    fn check(&mut self, _indent: usize, message: &str) {
        self.events.push(format!("check {message}"));
    }

    fn add(&mut self, _indent: usize, what: &str, name: &str) {
        self.events.push(format!("add {what} {name}"));
    }

    fn remove(&mut self, _indent: usize, what: &str, name: &str) {
        self.events.push(format!("remove {what} {name}"));
    }

    fn error(&mut self, message: &str) {
        self.events.push(format!("error {message}"));
    }

    fn on_action_start(&mut self, action: &Action) {
        self.events.push(format!("start {}", action.message()));
    }

    fn on_action_complete(&mut self, action: &Action, success: bool) {
        let state = if success { "done" } else { "failed" };
        self.events.push(format!("{state} {}", action.message()));
    }
}
