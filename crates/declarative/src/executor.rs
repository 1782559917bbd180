//! Execution engine - runs an action list sequentially, stopping at the first failure

use crate::action::Action;
use crate::context::{Reporter, Transport};
use crate::error::Result;
use crate::types::{ActionState, ExecuteSummary};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// The action that stopped a list, with its error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub action: Action,
    pub message: String,
    pub error: String,
}

/// Ordered queue of actions with its done and error buckets
///
/// Actions are appended to `todo` while planning. [`ActionList::execute`]
/// runs them in FIFO order; each success moves to `done`, the first failure
/// is recorded in `error` and leaves the rest of `todo` untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionList {
    todo: VecDeque<Action>,
    done: Vec<Action>,
    error: Option<Failure>,
}

impl ActionList {
    /// Create a new empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an action to the queue
    pub fn add(&mut self, action: Action) {
        log::info!("planned: {}", action.message());
        self.todo.push_back(action);
    }

    /// Actions not executed yet
    pub fn todo(&self) -> impl Iterator<Item = &Action> {
        self.todo.iter()
    }

    /// Actions executed successfully
    pub fn done(&self) -> &[Action] {
        &self.done
    }

    /// The failure that stopped execution, if any
    pub fn error(&self) -> Option<&Failure> {
        self.error.as_ref()
    }

    /// Total number of actions in all buckets
    pub fn len(&self) -> usize {
        self.todo.len() + self.done.len() + usize::from(self.error.is_some())
    }

    /// Check if no action was ever planned
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// State of the action at `index` in planning order
    pub fn state(&self, index: usize) -> Option<ActionState> {
        let failed = usize::from(self.error.is_some());
        if index < self.done.len() {
            Some(ActionState::Done)
        } else if index < self.done.len() + failed {
            Some(ActionState::Error)
        } else if index < self.len() {
            Some(ActionState::Todo)
        } else {
            None
        }
    }

    /// Execute the queued actions in order
    ///
    /// The first failing action halts the loop. The failure is kept in the
    /// error bucket instead of being returned, so the caller can still
    /// report what was done. A list that already failed is not resumed.
    pub fn execute(
        &mut self,
        transport: &dyn Transport,
        reporter: &mut dyn Reporter,
    ) -> ExecuteSummary {
        if self.error.is_none() {
            while let Some(action) = self.todo.pop_front() {
                reporter.on_action_start(&action);
                match action.execute(transport) {
                    Ok(_) => {
                        reporter.on_action_complete(&action, true);
                        self.done.push(action);
                    }
                    Err(err) => {
                        log::warn!("{} failed: {err}", action.message());
                        reporter.on_action_complete(&action, false);
                        self.error = Some(Failure {
                            message: action.message(),
                            error: err.to_string(),
                            action,
                        });
                        break;
                    }
                }
            }
        }
        self.counts()
    }

    /// Counts of the three buckets
    pub fn counts(&self) -> ExecuteSummary {
        ExecuteSummary {
            done: self.done.len(),
            failed: usize::from(self.error.is_some()),
            not_attempted: self.todo.len(),
        }
    }

    /// Three-section report: done, error, not done
    pub fn summary(&self) -> Summary<'_> {
        Summary { list: self }
    }

    /// Capture the list as a JSON record
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Restore a list captured with [`ActionList::to_json`]
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Extend<Action> for ActionList {
    fn extend<T: IntoIterator<Item = Action>>(&mut self, iter: T) {
        for action in iter {
            self.add(action);
        }
    }
}

/// Plain-text rendering of an [`ActionList`]
pub struct Summary<'a> {
    list: &'a ActionList,
}

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let list = self.list;
        if list.is_empty() {
            return writeln!(f, "Nothing to do.");
        }
        if !list.done.is_empty() {
            writeln!(f, "Done:")?;
            for action in &list.done {
                writeln!(f, "✓ {}", action.message())?;
            }
        }
        if let Some(failure) = &list.error {
            writeln!(f, "Error:")?;
            writeln!(f, "✘ {}", failure.message)?;
            writeln!(f, "  {}", failure.error)?;
        }
        if !list.todo.is_empty() {
            writeln!(f, "Not done:")?;
            for action in &list.todo {
                writeln!(f, "- {}", action.message())?;
            }
        }
        Ok(())
    }
}
