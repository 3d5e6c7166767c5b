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

//! # Toybox Plugins
//!
//! Everything needed to turn a directory of plugin manifests into a
//! dependency-ordered list of live plugin instances: manifest parsing,
//! request filtering and topological ordering, the process-wide static
//! plugin registry, shared-library handles, and the loader tying them
//! together.

#![warn(missing_docs)]

pub mod library;
pub mod loader;
pub mod manifest;
pub mod plugin;
pub mod registry;
pub mod resolver;

// Re-exported for the registration macros.
pub use inventory;

pub use library::{LibraryError, SharedLibrary};
pub use loader::{discover_manifests, load_plugins, resolve_library_path};
pub use manifest::{ManifestError, PluginCategory, PluginLinkage, PluginManifest};
pub use plugin::{
    LoadedPlugin, Plugin, PluginHost, PluginInstance, CREATE_SYMBOL_PREFIX, DESTROY_SYMBOL_PREFIX,
    PLUGIN_ABI_VERSION,
};
pub use registry::{PluginRegistry, StaticPluginFactory, StaticPluginRegistration};
pub use resolver::{resolve_load_order, ResolveError};
