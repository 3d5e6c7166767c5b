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

//! # Toybox Runtime
//!
//! The application host: it owns the message coordinator and the loaded
//! plugins, attaches them in dependency order, drives the per-frame
//! process/update loop, and tears everything down in reverse on shutdown.

#![warn(missing_docs)]

mod app;
pub mod messages;

pub use app::{AppDescription, Application};
