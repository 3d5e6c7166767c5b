// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Shared delivery outcome for dispatched messages.

use crate::message::MessageState;
use std::any::Any;
use std::sync::{Arc, Mutex};

struct ResultInner {
    state: MessageState,
    success: bool,
    report: String,
    response: Option<Box<dyn Any + Send + Sync>>,
}

/// The outcome of a message delivery.
///
/// A `MessageResult` is a cheaply cloneable handle onto shared state: the
/// handle returned by `post` and the one travelling with the queued copy
/// observe the same outcome. A failed result always carries a non-empty
/// report; the coordinator fills in a state-specific default when the
/// failure site supplies none.
#[derive(Clone)]
pub struct MessageResult {
    inner: Arc<Mutex<ResultInner>>,
}

impl MessageResult {
    /// Creates a fresh in-progress result.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ResultInner {
                state: MessageState::InProgress,
                success: false,
                report: String::new(),
                response: None,
            })),
        }
    }

    /// The state recorded at the last transition.
    #[must_use]
    pub fn state(&self) -> MessageState {
        self.lock().state
    }

    /// Whether delivery reached `Handled` or `Processed`.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.lock().success
    }

    /// Whether the result has left `InProgress`.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.lock().state != MessageState::InProgress
    }

    /// The human-readable report. Empty on success unless a handler wrote
    /// one; never empty on failure.
    #[must_use]
    pub fn report(&self) -> String {
        self.lock().report.clone()
    }

    /// Stores a typed response for the requester to pick up.
    pub fn respond<T: Any + Send + Sync>(&self, value: T) {
        self.lock().response = Some(Box::new(value));
    }

    /// Takes the typed response out of the slot, if present and a `T`.
    #[must_use]
    pub fn take_response<T: Any + Send + Sync>(&self) -> Option<T> {
        let mut inner = self.lock();
        if inner.response.as_ref().is_some_and(|r| r.is::<T>()) {
            let boxed = inner.response.take()?;
            return boxed.downcast::<T>().ok().map(|b| *b);
        }
        None
    }

    /// Resets the shared state back to in-progress, clearing any previous
    /// outcome and response.
    pub(crate) fn reset(&self) {
        let mut inner = self.lock();
        inner.state = MessageState::InProgress;
        inner.success = false;
        inner.report.clear();
        inner.response = None;
    }

    /// Marks the result successful with the given report (may be empty).
    pub(crate) fn flag_success(&self, state: MessageState, report: &str) {
        let mut inner = self.lock();
        inner.state = state;
        inner.success = true;
        if !report.is_empty() {
            inner.report = report.to_owned();
        }
    }

    /// Marks the result failed. Callers guarantee `report` is non-empty.
    pub(crate) fn flag_failure(&self, state: MessageState, report: &str) {
        let mut inner = self.lock();
        inner.state = state;
        inner.success = false;
        inner.report = report.to_owned();
    }

    /// Returns the current report without cloning the handle's lock twice.
    pub(crate) fn current_report(&self) -> String {
        self.lock().report.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ResultInner> {
        // A poisoned result lock means a callback panicked while holding it;
        // the stored outcome is still the best available answer.
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for MessageResult {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MessageResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("MessageResult")
            .field("state", &inner.state)
            .field("success", &inner.success)
            .field("report", &inner.report)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_in_progress() {
        let result = MessageResult::new();
        assert_eq!(result.state(), MessageState::InProgress);
        assert!(!result.succeeded());
        assert!(!result.is_ready());
        assert!(result.report().is_empty());
    }

    #[test]
    fn clones_observe_the_same_outcome() {
        let result = MessageResult::new();
        let observer = result.clone();

        result.flag_failure(MessageState::Failed, "it broke");
        assert_eq!(observer.state(), MessageState::Failed);
        assert_eq!(observer.report(), "it broke");
        assert!(!observer.succeeded());
    }

    #[test]
    fn response_round_trips_by_type() {
        let result = MessageResult::new();
        result.respond(String::from("pong"));

        assert_eq!(result.take_response::<u32>(), None, "wrong type stays put");
        assert_eq!(result.take_response::<String>().as_deref(), Some("pong"));
        assert_eq!(result.take_response::<String>(), None, "taken once");
    }

    #[test]
    fn reset_clears_everything() {
        let result = MessageResult::new();
        result.respond(1u8);
        result.flag_success(MessageState::Handled, "done");

        result.reset();
        assert_eq!(result.state(), MessageState::InProgress);
        assert!(result.report().is_empty());
        assert_eq!(result.take_response::<u8>(), None);
    }
}
