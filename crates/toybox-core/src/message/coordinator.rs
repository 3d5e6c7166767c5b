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

//! The in-process message coordinator.
//!
//! Handlers run inline on whichever thread calls [`send`] or [`process`];
//! the coordinator owns no worker threads. `post` may be called from any
//! thread — the deferred queue is a channel drained once per `process` pass.
//!
//! [`send`]: MessageCoordinator::send
//! [`process`]: MessageCoordinator::process

use crate::message::{Message, MessageHandler, MessageState};
use crate::time::Timer;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use uuid::Uuid;

const REPORT_FAILED: &str = "Message processing failed.";
const REPORT_TIMED_OUT: &str = "Message processing timed out.";
const REPORT_CANCELLED: &str = "Message was cancelled.";

/// A message parked in the deferred queue until its timer fires.
struct QueuedMessage {
    message: Message,
    timer: Timer,
    timeout_deadline: Option<Instant>,
}

struct CoordinatorInner {
    handlers: Mutex<Vec<(Uuid, MessageHandler)>>,
    queue_tx: flume::Sender<QueuedMessage>,
    queue_rx: flume::Receiver<QueuedMessage>,
}

/// Routes commands, events, and requests between the host and its plugins.
///
/// Cloning a coordinator yields another handle onto the same handler list and
/// deferred queue; the host and every plugin share one instance.
///
/// Dispatch is single-threaded cooperative: handlers are invoked in
/// registration order, a [`MessageState::Handled`] or
/// [`MessageState::Cancelled`] transition stops iteration, and timeout and
/// cancellation are sampled before and between handlers (a blocking handler
/// cannot be interrupted, but an overrun deadline is still reported as
/// [`MessageState::TimedOut`]).
#[derive(Clone)]
pub struct MessageCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl MessageCoordinator {
    /// Creates an empty coordinator.
    #[must_use]
    pub fn new() -> Self {
        let (queue_tx, queue_rx) = flume::unbounded();
        Self {
            inner: Arc::new(CoordinatorInner {
                handlers: Mutex::new(Vec::new()),
                queue_tx,
                queue_rx,
            }),
        }
    }

    /// Registers a handler and returns the token that removes it.
    ///
    /// Handlers are invoked in registration order.
    pub fn add_handler(&self, handler: impl Fn(&mut Message) + Send + Sync + 'static) -> Uuid {
        let id = Uuid::new_v4();
        self.lock_handlers().push((id, Arc::new(handler)));
        id
    }

    /// Removes a handler by token. Idempotent: unknown tokens are ignored.
    pub fn remove_handler(&self, token: Uuid) {
        self.lock_handlers().retain(|(id, _)| *id != token);
    }

    /// Drops every handler and every pending queue entry.
    pub fn clear(&self) {
        self.lock_handlers().clear();
        while self.inner.queue_rx.try_recv().is_ok() {}
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.lock_handlers().len()
    }

    /// Delivers a message synchronously, returning its shared result.
    ///
    /// Delayed delivery is not supported here: a message carrying either
    /// delay fails without invoking any handler. Handler panics are caught
    /// and surface as [`MessageState::Failed`] with the panic text as the
    /// report; they never propagate to the caller.
    pub fn send(&self, msg: &mut Message) -> crate::MessageResult {
        msg.state = MessageState::InProgress;
        msg.result.reset();

        if msg.has_delay() {
            self.apply_state(
                msg,
                MessageState::Failed,
                "send() does not support delayed delivery.",
            );
            return msg.result.clone();
        }

        if self.cancel_if_requested(msg) {
            return msg.result.clone();
        }

        self.dispatch(msg, None);
        msg.result.clone()
    }

    /// Queues a message for deferred delivery and returns its shared result.
    ///
    /// The returned handle becomes ready once a later [`process`] pass
    /// delivers (or cancels, times out, or fails) the message. Safe to call
    /// from any thread.
    ///
    /// [`process`]: MessageCoordinator::process
    pub fn post(&self, mut msg: Message) -> crate::MessageResult {
        if msg.delay_in_ticks > 0 && !msg.delay_in_seconds.is_zero() {
            self.apply_state(
                &mut msg,
                MessageState::Failed,
                "Message cannot specify both tick and time delays.",
            );
            return msg.result.clone();
        }

        let now = Instant::now();
        let timer = if msg.delay_in_ticks > 0 {
            Timer::for_ticks(msg.delay_in_ticks)
        } else if !msg.delay_in_seconds.is_zero() {
            Timer::for_delay(msg.delay_in_seconds, now)
        } else {
            Timer::ready()
        };
        let timeout_deadline = msg
            .timeout
            .filter(|timeout| !timeout.is_zero())
            .map(|timeout| now + timeout);

        let result = msg.result.clone();
        msg.state = MessageState::InProgress;
        let entry = QueuedMessage {
            message: msg,
            timer,
            timeout_deadline,
        };
        // The receiver lives inside `inner`, so the channel cannot be
        // disconnected while this handle exists.
        let _ = self.inner.queue_tx.send(entry);
        result
    }

    /// Drains the deferred queue once.
    ///
    /// Entries are visited in arrival order: cancelled entries finish
    /// `Cancelled`, entries past their timeout deadline finish `TimedOut`,
    /// entries whose timer has not fired are re-queued for the next pass,
    /// and everything else dispatches exactly like [`send`]. Messages posted
    /// while draining are not visited before the next call.
    ///
    /// [`send`]: MessageCoordinator::send
    pub fn process(&self) {
        let now = Instant::now();

        // Taking the whole backlog up front is what gives the one-pass
        // guarantee: anything posted from a handler below lands after this
        // snapshot and waits for the next call.
        let batch: Vec<QueuedMessage> = self.inner.queue_rx.try_iter().collect();

        for mut entry in batch {
            if self.cancel_if_requested(&mut entry.message) {
                continue;
            }

            if let Some(deadline) = entry.timeout_deadline {
                if now >= deadline {
                    self.apply_state(
                        &mut entry.message,
                        MessageState::TimedOut,
                        "Message timed out before delivery.",
                    );
                    continue;
                }
            }

            if entry.timer.tick() {
                let _ = self.inner.queue_tx.send(entry);
                continue;
            }

            if !entry.timer.is_time_up(now) {
                let _ = self.inner.queue_tx.send(entry);
                continue;
            }

            self.dispatch(&mut entry.message, entry.timeout_deadline);
        }
    }

    /// Runs the handler chain for one message.
    ///
    /// `preset_deadline` carries the timeout computed at post time; for
    /// `send` it is absent and derived from the message here.
    fn dispatch(&self, msg: &mut Message, preset_deadline: Option<Instant>) {
        let handlers = self.lock_handlers().clone();

        if self.cancel_if_requested(msg) {
            return;
        }

        let deadline = match preset_deadline {
            Some(deadline) => Some(deadline),
            None => match msg.timeout {
                Some(timeout) if timeout.is_zero() => {
                    self.apply_state(
                        msg,
                        MessageState::TimedOut,
                        "Message timed out before dispatch began.",
                    );
                    return;
                }
                Some(timeout) => Some(Instant::now() + timeout),
                None => None,
            },
        };

        if handlers.is_empty() {
            if msg.require_handling {
                self.apply_state(
                    msg,
                    MessageState::Failed,
                    "Message required handling but no handlers are registered.",
                );
            } else {
                self.apply_state(msg, MessageState::Processed, "");
            }
            return;
        }

        let mut previous_state = msg.state;
        let mut handler_ran = false;
        for (_, handler) in &handlers {
            if Self::past_deadline(deadline) {
                self.apply_state(msg, MessageState::TimedOut, "Message timed out during dispatch.");
                return;
            }

            handler_ran = true;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(msg)));
            if let Err(payload) = outcome {
                let reason = panic_report(&payload);
                self.apply_state(msg, MessageState::Failed, &reason);
                return;
            }

            if msg.state != previous_state {
                self.handle_state_change(msg, previous_state);
                previous_state = msg.state;
            }

            if msg.state == MessageState::Handled {
                break;
            }
            if msg.state == MessageState::Cancelled {
                return;
            }
            if self.cancel_if_requested(msg) {
                return;
            }
            if Self::past_deadline(deadline) {
                self.apply_state(msg, MessageState::TimedOut, "Message timed out during dispatch.");
                return;
            }
        }

        if msg.state == MessageState::InProgress {
            if Self::past_deadline(deadline) {
                self.apply_state(msg, MessageState::TimedOut, "Message timed out during dispatch.");
            } else if handler_ran {
                self.apply_state(
                    msg,
                    MessageState::Failed,
                    "Message handlers executed but did not advance the message state.",
                );
            } else {
                self.apply_state(msg, MessageState::Processed, "");
            }
        }
    }

    fn past_deadline(deadline: Option<Instant>) -> bool {
        deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Applies `state` to the message, updating the shared result and firing
    /// callbacks. A no-op when the message is already in `state` and no new
    /// reason is supplied.
    fn apply_state(&self, msg: &mut Message, state: MessageState, reason: &str) {
        if msg.state == state && reason.is_empty() {
            return;
        }

        let previous_state = msg.state;
        msg.state = state;
        Self::update_result_for_state(msg, state, reason);
        Self::dispatch_state_callbacks(msg, state, previous_state);
    }

    /// Bookkeeping for a transition performed by a handler.
    fn handle_state_change(&self, msg: &mut Message, previous_state: MessageState) {
        Self::update_result_for_state(msg, msg.state, "");
        Self::dispatch_state_callbacks(msg, msg.state, previous_state);
    }

    fn update_result_for_state(msg: &Message, state: MessageState, reason: &str) {
        match state {
            MessageState::Handled | MessageState::Processed => {
                msg.result.flag_success(state, reason);
            }
            MessageState::Cancelled | MessageState::Failed | MessageState::TimedOut => {
                let mut resolved = reason.to_owned();
                if resolved.is_empty() {
                    resolved = msg.result.current_report();
                }
                if resolved.is_empty() {
                    resolved = match state {
                        MessageState::Failed => REPORT_FAILED,
                        MessageState::TimedOut => REPORT_TIMED_OUT,
                        _ => REPORT_CANCELLED,
                    }
                    .to_owned();
                }
                msg.result.flag_failure(state, &resolved);

                if state == MessageState::Failed {
                    log::error!("Message {} failed: {resolved}", msg.id);
                } else if state == MessageState::TimedOut {
                    log::warn!("Message {} timed out: {resolved}", msg.id);
                }
            }
            MessageState::InProgress => {}
        }
    }

    /// Fires the callback matching a terminal transition, then `on_processed`
    /// exactly once when the message first leaves `InProgress`.
    fn dispatch_state_callbacks(msg: &Message, state: MessageState, previous_state: MessageState) {
        let callback = match state {
            MessageState::Handled => msg.callbacks.on_handled.as_ref(),
            MessageState::Cancelled => msg.callbacks.on_cancelled.as_ref(),
            MessageState::Failed => msg.callbacks.on_failure.as_ref(),
            MessageState::TimedOut => msg.callbacks.on_timeout.as_ref(),
            MessageState::Processed | MessageState::InProgress => None,
        };
        if let Some(callback) = callback {
            callback(msg);
        }

        if previous_state == MessageState::InProgress && state != MessageState::InProgress {
            if let Some(on_processed) = msg.callbacks.on_processed.as_ref() {
                on_processed(msg);
            }
        }
    }

    /// Resolves a pre-cancelled message. Returns whether it was cancelled.
    fn cancel_if_requested(&self, msg: &mut Message) -> bool {
        let cancelled = msg
            .cancellation
            .as_ref()
            .is_some_and(crate::CancellationToken::is_cancelled);
        if !cancelled {
            return false;
        }

        if msg.state != MessageState::Cancelled {
            self.apply_state(msg, MessageState::Cancelled, REPORT_CANCELLED);
        }
        true
    }

    fn lock_handlers(&self) -> std::sync::MutexGuard<'_, Vec<(Uuid, MessageHandler)>> {
        // Handlers run outside this lock, so a poisoned mutex can only come
        // from a panic inside the registry operations themselves.
        self.inner
            .handlers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for MessageCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MessageCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageCoordinator")
            .field("handlers", &self.handler_count())
            .field("pending", &self.inner.queue_rx.len())
            .finish()
    }
}

fn panic_report(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_owned()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        String::from("Handler panicked during message dispatch.")
    }
}
