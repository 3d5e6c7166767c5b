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

//! # Toybox Core
//!
//! Foundational crate for the Toybox runtime: the in-process message
//! coordinator, cancellation primitives, frame timing, the thread-local
//! dispatcher scope, and the generic graph utilities the plugin resolver
//! builds on.

#![warn(missing_docs)]

pub mod graph;
pub mod message;
pub mod sync;
pub mod time;
pub mod trace;

pub use message::coordinator::MessageCoordinator;
pub use message::result::MessageResult;
pub use message::scope::{current_dispatcher, DispatcherScope};
pub use message::{on_message, Message, MessageCallbacks, MessageState, Request};
pub use sync::cancellation::{CancellationSource, CancellationToken};
pub use time::{DeltaTime, DeltaTimer, Timer};
