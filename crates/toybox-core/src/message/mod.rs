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

//! Messages and the coordinator that routes them.
//!
//! A [`Message`] is a runtime-typed value delivered through the
//! [`MessageCoordinator`](coordinator::MessageCoordinator), either inline
//! (`send`) or deferred with an optional tick or time delay (`post` +
//! `process`). Handlers advance the message's [`MessageState`]; the
//! coordinator translates state transitions into the shared
//! [`MessageResult`](result::MessageResult) and fires the message's callbacks.

pub mod coordinator;
pub mod result;
pub mod scope;

use crate::sync::cancellation::CancellationToken;
use result::MessageResult;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Lifecycle of a message travelling through the coordinator.
///
/// Every delivery ends in exactly one of the five terminal states; a message
/// still `InProgress` after dispatch is resolved by the coordinator itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageState {
    /// Not yet resolved; the initial state.
    InProgress,
    /// A handler consumed the message. Stops further delivery.
    Handled,
    /// Delivery completed without a consuming handler.
    Processed,
    /// The bound cancellation token fired before or during delivery.
    Cancelled,
    /// The timeout deadline passed before or during delivery.
    TimedOut,
    /// Dispatch failed: bad configuration, a panicking handler, or handlers
    /// that ran without advancing the state.
    Failed,
}

/// Callback invoked on message lifecycle transitions.
pub type MessageCallback = Arc<dyn Fn(&Message) + Send + Sync>;

/// Handler registered with the coordinator.
pub type MessageHandler = Arc<dyn Fn(&mut Message) + Send + Sync>;

/// Optional per-message lifecycle callbacks.
///
/// The matching terminal callback fires exactly once per terminal transition,
/// and `on_processed` fires exactly once when the message leaves
/// [`MessageState::InProgress`].
#[derive(Clone, Default)]
pub struct MessageCallbacks {
    /// Fired when the message reaches [`MessageState::Handled`].
    pub on_handled: Option<MessageCallback>,
    /// Fired once when the message leaves [`MessageState::InProgress`].
    pub on_processed: Option<MessageCallback>,
    /// Fired when the message reaches [`MessageState::Failed`].
    pub on_failure: Option<MessageCallback>,
    /// Fired when the message reaches [`MessageState::Cancelled`].
    pub on_cancelled: Option<MessageCallback>,
    /// Fired when the message reaches [`MessageState::TimedOut`].
    pub on_timeout: Option<MessageCallback>,
}

/// A value routed through the coordinator.
///
/// The payload is runtime-typed: handlers inspect it with
/// [`payload_as`](Message::payload_as) or the [`on_message`] matcher and
/// advance [`state`](Message::state) to claim or reject it. Tick delays and
/// time delays are mutually exclusive; `send` accepts neither.
#[derive(Clone)]
pub struct Message {
    /// Stable identity, generated at construction.
    pub id: Uuid,
    /// Current lifecycle state. Handlers may advance this.
    pub state: MessageState,
    /// Runtime-typed payload shared between the caller and queued copies.
    pub payload: Arc<dyn Any + Send + Sync>,
    /// Shared outcome handle; cloning a message shares the same handle.
    pub result: MessageResult,
    /// Dispatch deadline. `None` is unbounded; `Some(Duration::ZERO)` times
    /// out before any handler runs.
    pub timeout: Option<Duration>,
    /// Deliver after this many `process()` passes. 0 means no tick delay.
    pub delay_in_ticks: u64,
    /// Deliver once this much time has elapsed. Zero means no time delay.
    pub delay_in_seconds: Duration,
    /// Optional cancellation observer checked before and between handlers.
    pub cancellation: Option<CancellationToken>,
    /// Lifecycle callbacks.
    pub callbacks: MessageCallbacks,
    /// When set, delivery with no registered handlers fails instead of
    /// ending `Processed`.
    pub require_handling: bool,
}

impl Message {
    /// Creates a message around the given payload.
    #[must_use]
    pub fn new(payload: impl Any + Send + Sync) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: MessageState::InProgress,
            payload: Arc::new(payload),
            result: MessageResult::new(),
            timeout: None,
            delay_in_ticks: 0,
            delay_in_seconds: Duration::ZERO,
            cancellation: None,
            callbacks: MessageCallbacks::default(),
            require_handling: false,
        }
    }

    /// Returns whether any delivery delay is requested.
    #[must_use]
    pub fn has_delay(&self) -> bool {
        self.delay_in_ticks > 0 || !self.delay_in_seconds.is_zero()
    }

    /// Returns whether the payload is a `T`.
    #[must_use]
    pub fn payload_is<T: Any>(&self) -> bool {
        self.payload.is::<T>()
    }

    /// Borrows the payload as a `T`, if it is one.
    #[must_use]
    pub fn payload_as<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    /// Sets the dispatch timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Defers delivery by a number of `process()` passes.
    #[must_use]
    pub fn with_delay_in_ticks(mut self, ticks: u64) -> Self {
        self.delay_in_ticks = ticks;
        self
    }

    /// Defers delivery until the given time has elapsed.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_in_seconds = delay;
        self
    }

    /// Binds a cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Requires at least one registered handler for delivery to succeed.
    #[must_use]
    pub fn with_required_handling(mut self) -> Self {
        self.require_handling = true;
        self
    }

    /// Registers the handled callback.
    #[must_use]
    pub fn on_handled(mut self, callback: impl Fn(&Message) + Send + Sync + 'static) -> Self {
        self.callbacks.on_handled = Some(Arc::new(callback));
        self
    }

    /// Registers the processed callback.
    #[must_use]
    pub fn on_processed(mut self, callback: impl Fn(&Message) + Send + Sync + 'static) -> Self {
        self.callbacks.on_processed = Some(Arc::new(callback));
        self
    }

    /// Registers the failure callback.
    #[must_use]
    pub fn on_failure(mut self, callback: impl Fn(&Message) + Send + Sync + 'static) -> Self {
        self.callbacks.on_failure = Some(Arc::new(callback));
        self
    }

    /// Registers the cancelled callback.
    #[must_use]
    pub fn on_cancelled(mut self, callback: impl Fn(&Message) + Send + Sync + 'static) -> Self {
        self.callbacks.on_cancelled = Some(Arc::new(callback));
        self
    }

    /// Registers the timeout callback.
    #[must_use]
    pub fn on_timeout(mut self, callback: impl Fn(&Message) + Send + Sync + 'static) -> Self {
        self.callbacks.on_timeout = Some(Arc::new(callback));
        self
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("timeout", &self.timeout)
            .field("delay_in_ticks", &self.delay_in_ticks)
            .field("delay_in_seconds", &self.delay_in_seconds)
            .field("require_handling", &self.require_handling)
            .finish_non_exhaustive()
    }
}

/// Invokes `action` only when the message payload is a `T`.
///
/// The payload type is inferred from the closure's first parameter, and the
/// return value says whether it matched, letting `receive_message`
/// implementations chain matchers:
///
/// ```
/// use toybox_core::{on_message, Message, MessageState};
///
/// struct Ping;
///
/// let mut msg = Message::new(Ping);
/// let matched = on_message(&mut msg, |_: &Ping, msg| {
///     msg.state = MessageState::Handled;
/// });
/// assert!(matched);
/// assert_eq!(msg.state, MessageState::Handled);
/// ```
pub fn on_message<T, F>(msg: &mut Message, action: F) -> bool
where
    T: Any + Send + Sync,
    F: FnOnce(&T, &mut Message),
{
    let payload = Arc::clone(&msg.payload);
    match payload.downcast_ref::<T>() {
        Some(typed) => {
            action(typed, msg);
            true
        }
        None => false,
    }
}

/// A message that expects a typed response.
///
/// Handlers answer by writing into the shared result's response slot via
/// [`MessageResult::respond`]; the caller reads it back with
/// [`take_response`](Request::take_response) after delivery.
pub struct Request<T> {
    /// The underlying message carrying the request payload.
    pub message: Message,
    _response: std::marker::PhantomData<T>,
}

impl<T: Any + Send + Sync> Request<T> {
    /// Creates a request around the given payload.
    #[must_use]
    pub fn new(payload: impl Any + Send + Sync) -> Self {
        Self {
            message: Message::new(payload),
            _response: std::marker::PhantomData,
        }
    }

    /// Takes the typed response out of the shared result, if a handler
    /// supplied one.
    #[must_use]
    pub fn take_response(&self) -> Option<T> {
        self.message.result.take_response::<T>()
    }
}
