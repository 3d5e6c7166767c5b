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

//! Messages published (and consumed) by the application host.

use toybox_core::DeltaTime;

/// Published once after plugins are loaded and attached.
#[derive(Debug, Clone)]
pub struct ApplicationInitializedEvent {
    /// The host application's name.
    pub description: String,
}

/// Sent at the top of every frame, before plugins are ticked.
#[derive(Debug, Clone, Copy)]
pub struct ApplicationUpdateBeginEvent {
    /// Time elapsed since the previous frame.
    pub dt: DeltaTime,
}

/// Posted at the end of every frame; delivered by the next frame's queue
/// drain.
#[derive(Debug, Clone, Copy)]
pub struct ApplicationUpdateEndEvent {
    /// Time elapsed since the previous frame.
    pub dt: DeltaTime,
}

/// Sent once when the host begins tearing down.
#[derive(Debug, Clone, Copy)]
pub struct ApplicationShutdownEvent;

/// Ask the host to leave its main loop. Consumed by the host's own handler.
#[derive(Debug, Clone, Copy)]
pub struct ExitApplicationRequest;
