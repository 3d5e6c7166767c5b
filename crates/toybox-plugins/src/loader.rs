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

//! Plugin discovery and loading.
//!
//! The loader walks a plugin root for manifests, filters them down to the
//! requested set (expanded to its dependency closure), resolves a load
//! order, and instantiates each plugin: static linkage through the
//! process-wide registry, dynamic linkage through the `create_<name>` /
//! `destroy_<name>` symbol pair of the plugin's shared library.
//!
//! Per-plugin problems (bad manifest, missing library, missing symbols,
//! ABI mismatch) skip that plugin with a log line; resolver failures are
//! fatal and load nothing.

use crate::library::SharedLibrary;
use crate::manifest::{PluginLinkage, PluginManifest};
use crate::plugin::{
    CreatePluginFn, DestroyPluginFn, LoadedPlugin, PluginInstance, CREATE_SYMBOL_PREFIX,
    DESTROY_SYMBOL_PREFIX, PLUGIN_ABI_VERSION,
};
use crate::registry::PluginRegistry;
use crate::resolver::{resolve_load_order, ResolveError};
use std::path::{Path, PathBuf};

/// Walks `root` recursively and parses every manifest found.
///
/// A file is a manifest when it is named `plugin.meta` (case-insensitive) or
/// carries the `.meta` extension. Parse failures are logged and skipped.
#[must_use]
pub fn discover_manifests(root: &Path) -> Vec<PluginManifest> {
    let mut discovered = Vec::new();
    if !root.exists() {
        log::warn!("Plugin directory '{}' does not exist", root.display());
        return discovered;
    }
    walk_for_manifests(root, &mut discovered);
    discovered
}

fn walk_for_manifests(directory: &Path, out: &mut Vec<PluginManifest>) {
    let entries = match std::fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(error) => {
            log::warn!(
                "Unable to enumerate plugin directory '{}': {error}",
                directory.display()
            );
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk_for_manifests(&path, out);
            continue;
        }
        if !is_manifest_file(&path) {
            continue;
        }
        match PluginManifest::parse_file(&path) {
            Ok(manifest) => out.push(manifest),
            Err(error) => {
                log::warn!("Plugin manifest skipped: {error}");
            }
        }
    }
}

fn is_manifest_file(path: &Path) -> bool {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    file_name == "plugin.meta" || path.extension().is_some_and(|e| e.eq_ignore_ascii_case("meta"))
}

/// Resolves the on-disk module path for a dynamic plugin.
///
/// A directory resolves to a file named after the plugin inside it; a path
/// without an extension gains the platform library extension and, on Unix,
/// the conventional `lib` prefix when missing.
#[must_use]
pub fn resolve_library_path(manifest: &PluginManifest) -> PathBuf {
    let mut module = if manifest.library_path.as_os_str().is_empty() {
        manifest.root_directory.clone()
    } else {
        manifest.library_path.clone()
    };

    if module.is_dir() {
        module = module.join(&manifest.name);
    }

    if module.extension().is_none() {
        module = platform_module_name(&module);
    }

    module
}

#[cfg(target_os = "windows")]
fn platform_module_name(module: &Path) -> PathBuf {
    let mut with_extension = module.as_os_str().to_owned();
    with_extension.push(".dll");
    PathBuf::from(with_extension)
}

#[cfg(not(target_os = "windows"))]
fn platform_module_name(module: &Path) -> PathBuf {
    let extension = if cfg!(target_os = "macos") {
        "dylib"
    } else {
        "so"
    };

    let file_name = module
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = if file_name.starts_with("lib") {
        format!("{file_name}.{extension}")
    } else {
        format!("lib{file_name}.{extension}")
    };

    match module.parent() {
        Some(parent) => parent.join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// Discovers, filters, orders, and instantiates the plugins under `root`.
///
/// An empty `requested` list loads everything discovered. The returned list
/// is in load order; callers attach in that order and detach in reverse.
/// Resolver failures (unresolved dependency, cycle) are returned as-is and
/// nothing loads.
pub fn load_plugins(
    root: &Path,
    requested: &[String],
) -> Result<Vec<LoadedPlugin>, ResolveError> {
    let discovered = discover_manifests(root);
    if discovered.is_empty() {
        return Ok(Vec::new());
    }

    let ordered = resolve_load_order(&discovered, requested)?;

    let mut loaded = Vec::with_capacity(ordered.len());
    for manifest in ordered {
        if let Some(plugin) = load_plugin(manifest) {
            loaded.push(plugin);
        }
    }
    Ok(loaded)
}

/// Instantiates a single plugin, or logs why it was skipped.
fn load_plugin(manifest: PluginManifest) -> Option<LoadedPlugin> {
    if manifest.abi_version != PLUGIN_ABI_VERSION {
        log::warn!(
            "Plugin '{}' targets ABI {} but the host speaks {}; skipping",
            manifest.name,
            manifest.abi_version,
            PLUGIN_ABI_VERSION
        );
        return None;
    }

    if manifest.linkage == PluginLinkage::Static {
        let Some(factory) = PluginRegistry::find(&manifest.name) else {
            log::warn!("Static plugin '{}' is not registered; skipping", manifest.name);
            return None;
        };
        let instance = PluginInstance::from_box(factory());
        return Some(LoadedPlugin::new(manifest, instance, None));
    }

    let module_path = resolve_library_path(&manifest);
    let library = match SharedLibrary::open(&module_path) {
        Ok(library) => library,
        Err(error) => {
            log::warn!("Plugin '{}' is unable to be loaded: {error}", manifest.name);
            return None;
        }
    };

    let create_symbol = format!("{CREATE_SYMBOL_PREFIX}{}", manifest.name);
    let create = match unsafe { library.get_fn::<CreatePluginFn>(&create_symbol) } {
        Ok(create) => create,
        Err(error) => {
            log::warn!("Entry point not found in plugin module: {error}");
            return None;
        }
    };

    let destroy_symbol = format!("{DESTROY_SYMBOL_PREFIX}{}", manifest.name);
    let destroy = match unsafe { library.get_fn::<DestroyPluginFn>(&destroy_symbol) } {
        Ok(destroy) => destroy,
        Err(error) => {
            log::warn!("Destroy entry point not found in plugin module: {error}");
            return None;
        }
    };

    let raw = unsafe { create() };
    if raw.is_null() {
        log::warn!("Plugin factory returned null for '{}'", manifest.name);
        return None;
    }

    let instance = unsafe { PluginInstance::from_raw(raw, destroy) };
    Some(LoadedPlugin::new(manifest, instance, Some(library)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_file_matching() {
        assert!(is_manifest_file(Path::new("plugins/a/plugin.meta")));
        assert!(is_manifest_file(Path::new("plugins/a/PLUGIN.META")));
        assert!(is_manifest_file(Path::new("plugins/a/renderer.meta")));
        assert!(!is_manifest_file(Path::new("plugins/a/plugin.json")));
        assert!(!is_manifest_file(Path::new("plugins/a/libplugin.so")));
    }

    #[test]
    fn library_path_gains_platform_extension() {
        let manifest = PluginManifest::parse(
            r#"{ "name": "demo", "version": "1.0", "module": "bin/demo" }"#,
            Path::new("plugins/demo/plugin.meta"),
        )
        .expect("test manifest should parse");

        let resolved = resolve_library_path(&manifest);
        let file_name = resolved
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        #[cfg(target_os = "windows")]
        assert_eq!(file_name, "demo.dll");
        #[cfg(target_os = "macos")]
        assert_eq!(file_name, "libdemo.dylib");
        #[cfg(all(unix, not(target_os = "macos")))]
        assert_eq!(file_name, "libdemo.so");
    }

    #[test]
    fn explicit_extension_is_left_alone() {
        let manifest = PluginManifest::parse(
            r#"{ "name": "demo", "version": "1.0", "module": "bin/libdemo.so" }"#,
            Path::new("plugins/demo/plugin.meta"),
        )
        .expect("test manifest should parse");

        let resolved = resolve_library_path(&manifest);
        assert!(resolved.ends_with("bin/libdemo.so"));
    }

    #[test]
    fn existing_lib_prefix_is_not_doubled() {
        let manifest = PluginManifest::parse(
            r#"{ "name": "demo", "version": "1.0", "module": "bin/libdemo" }"#,
            Path::new("plugins/demo/plugin.meta"),
        )
        .expect("test manifest should parse");

        let resolved = resolve_library_path(&manifest);
        let file_name = resolved
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        #[cfg(all(unix, not(target_os = "macos")))]
        assert_eq!(file_name, "libdemo.so");
        #[cfg(target_os = "windows")]
        assert_eq!(file_name, "libdemo.dll");
    }
}
