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

//! Plugin manifest documents.
//!
//! Every plugin ships a small JSON descriptor (`plugin.meta`) next to its
//! library declaring identity, dependencies, and linkage:
//!
//! ```json
//! { "name": "logging_core", "version": "1.0.0", "category": "logging",
//!   "priority": 0, "dependencies": [], "static": false,
//!   "module": "bin/logging" }
//! ```
//!
//! Parsing validates and resolves the document into a [`PluginManifest`];
//! [`PluginManifest::to_json`] serializes one back so that
//! parse → serialize → parse is field-equivalent.

use crate::plugin::PLUGIN_ABI_VERSION;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Coarse grouping used by the resolver to order otherwise-independent
/// plugins. Lower load rank loads earlier; loggers come first so every later
/// plugin can already log through the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginCategory {
    /// No particular grouping.
    #[default]
    Default,
    /// Log sinks and formatters.
    Logging,
    /// Input device providers.
    Input,
    /// Audio mixers and outputs.
    Audio,
    /// Physics integrations.
    Physics,
    /// Renderers and graphics adapters.
    Rendering,
    /// Game-specific logic.
    Gameplay,
}

impl PluginCategory {
    /// Rank used as the leading tie-breaker when resolving load order.
    #[must_use]
    pub fn load_rank(&self) -> u8 {
        match self {
            PluginCategory::Logging => 0,
            PluginCategory::Default => 1,
            PluginCategory::Input => 2,
            PluginCategory::Audio => 3,
            PluginCategory::Physics => 4,
            PluginCategory::Rendering => 5,
            PluginCategory::Gameplay => 6,
        }
    }
}

/// How a plugin's code reaches the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PluginLinkage {
    /// Loaded from a shared library next to the manifest.
    #[default]
    Dynamic,
    /// Compiled into the host and found through the static registry.
    Static,
}

/// A parsed and validated plugin descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginManifest {
    /// Unique (case-insensitive) plugin name.
    pub name: String,
    /// Display version string.
    pub version: String,
    /// Optional human-readable description.
    pub description: Option<String>,
    /// Resolver tie-break category.
    pub category: PluginCategory,
    /// Resolver tie-break priority within the category. Lower loads earlier.
    pub priority: u32,
    /// Static or dynamic linkage.
    pub linkage: PluginLinkage,
    /// Names of plugins that must load before this one, in declaration
    /// order, trimmed, with empty entries discarded.
    pub dependencies: Vec<String>,
    /// Where the manifest was read from.
    pub manifest_path: PathBuf,
    /// Directory containing the manifest.
    pub root_directory: PathBuf,
    /// Declared module path resolved against the root directory. Platform
    /// extension and prefix defaulting happens at load time.
    pub library_path: PathBuf,
    /// ABI revision the plugin was built against.
    pub abi_version: u32,
}

/// Why a manifest could not be parsed. Every variant names the offending
/// manifest path.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest file could not be read.
    #[error("unable to read plugin manifest '{}': {source}", .path.display())]
    Io {
        /// Offending manifest path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The manifest was not valid JSON or used an unknown enumeration value.
    #[error("malformed plugin manifest '{}': {source}", .path.display())]
    Malformed {
        /// Offending manifest path.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// The manifest parsed but violated a validation rule.
    #[error("invalid plugin manifest '{}': {reason}", .path.display())]
    Invalid {
        /// Offending manifest path.
        path: PathBuf,
        /// What was wrong.
        reason: String,
    },
}

/// On-disk shape of a manifest. Kept separate from [`PluginManifest`] so the
/// document can stay lenient about optional fields while the parsed form is
/// fully resolved.
#[derive(Serialize, Deserialize)]
struct ManifestDoc {
    name: String,
    version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default)]
    category: PluginCategory,
    #[serde(default)]
    priority: u32,
    #[serde(default, rename = "static")]
    static_linkage: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    module: Option<String>,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    abi_version: Option<u32>,
}

impl PluginManifest {
    /// Parses a manifest from raw JSON text. `manifest_path` is used for
    /// path resolution and error reporting.
    pub fn parse(text: &str, manifest_path: &Path) -> Result<Self, ManifestError> {
        let doc: ManifestDoc =
            serde_json::from_str(text).map_err(|source| ManifestError::Malformed {
                path: manifest_path.to_owned(),
                source,
            })?;
        Self::from_doc(doc, manifest_path)
    }

    /// Reads and parses a manifest file.
    pub fn parse_file(manifest_path: &Path) -> Result<Self, ManifestError> {
        let text = std::fs::read_to_string(manifest_path).map_err(|source| ManifestError::Io {
            path: manifest_path.to_owned(),
            source,
        })?;
        Self::parse(&text, manifest_path)
    }

    fn from_doc(doc: ManifestDoc, manifest_path: &Path) -> Result<Self, ManifestError> {
        let invalid = |reason: String| ManifestError::Invalid {
            path: manifest_path.to_owned(),
            reason,
        };

        let name = doc.name.trim().to_owned();
        if name.is_empty() {
            return Err(invalid(String::from("field 'name' must not be empty")));
        }
        let version = doc.version.trim().to_owned();
        if version.is_empty() {
            return Err(invalid(String::from("field 'version' must not be empty")));
        }

        let abi_version = doc.abi_version.unwrap_or(PLUGIN_ABI_VERSION);
        if abi_version == 0 {
            return Err(invalid(String::from("field 'abi_version' must be positive")));
        }

        let description = doc
            .description
            .map(|d| d.trim().to_owned())
            .filter(|d| !d.is_empty());

        // Dependencies keep declaration order; duplicates (case-insensitive)
        // and empty entries are discarded.
        let mut dependencies = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for entry in doc.dependencies {
            let trimmed = entry.trim().to_owned();
            if trimmed.is_empty() {
                continue;
            }
            if seen.insert(trimmed.to_lowercase()) {
                dependencies.push(trimmed);
            }
        }

        let root_directory = manifest_path.parent().unwrap_or(Path::new("")).to_owned();
        let library_path = match doc.module.map(|m| m.trim().to_owned()) {
            Some(module) if !module.is_empty() => {
                let module = PathBuf::from(module);
                if module.is_absolute() || root_directory.as_os_str().is_empty() {
                    module
                } else {
                    root_directory.join(module)
                }
            }
            _ => root_directory.clone(),
        };

        Ok(Self {
            name,
            version,
            description,
            category: doc.category,
            priority: doc.priority,
            linkage: if doc.static_linkage {
                PluginLinkage::Static
            } else {
                PluginLinkage::Dynamic
            },
            dependencies,
            manifest_path: manifest_path.to_owned(),
            root_directory,
            library_path,
            abi_version,
        })
    }

    /// Serializes the manifest back into its document form. Parsing the
    /// output against the same manifest path yields an equivalent manifest.
    #[must_use]
    pub fn to_json(&self) -> String {
        // Undo the root-directory join so a re-parse resolves to the same
        // library path.
        let module = if self.library_path == self.root_directory {
            None
        } else {
            let relative = self
                .library_path
                .strip_prefix(&self.root_directory)
                .unwrap_or(&self.library_path);
            Some(relative.to_string_lossy().into_owned())
        };

        let doc = ManifestDoc {
            name: self.name.clone(),
            version: self.version.clone(),
            description: self.description.clone(),
            category: self.category,
            priority: self.priority,
            static_linkage: self.linkage == PluginLinkage::Static,
            module,
            dependencies: self.dependencies.clone(),
            abi_version: Some(self.abi_version),
        };
        serde_json::to_string_pretty(&doc).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta_path() -> PathBuf {
        PathBuf::from("plugins/demo/plugin.meta")
    }

    #[test]
    fn parses_a_full_manifest() {
        let text = r#"{
            "name": "  logging_core ",
            "version": "1.0.0",
            "description": " Core log sink ",
            "category": "logging",
            "priority": 2,
            "static": false,
            "module": "bin/logging",
            "dependencies": ["", " other ", "OTHER", "third"],
            "abi_version": 1
        }"#;

        let manifest = PluginManifest::parse(text, &meta_path()).expect("manifest should parse");
        assert_eq!(manifest.name, "logging_core");
        assert_eq!(manifest.version, "1.0.0");
        assert_eq!(manifest.description.as_deref(), Some("Core log sink"));
        assert_eq!(manifest.category, PluginCategory::Logging);
        assert_eq!(manifest.priority, 2);
        assert_eq!(manifest.linkage, PluginLinkage::Dynamic);
        assert_eq!(manifest.dependencies, vec!["other", "third"]);
        assert_eq!(manifest.root_directory, PathBuf::from("plugins/demo"));
        assert_eq!(
            manifest.library_path,
            PathBuf::from("plugins/demo/bin/logging")
        );
        assert_eq!(manifest.abi_version, 1);
    }

    #[test]
    fn minimal_manifest_uses_defaults() {
        let text = r#"{ "name": "tiny", "version": "0.1" }"#;
        let manifest = PluginManifest::parse(text, &meta_path()).expect("manifest should parse");

        assert_eq!(manifest.category, PluginCategory::Default);
        assert_eq!(manifest.priority, 0);
        assert_eq!(manifest.linkage, PluginLinkage::Dynamic);
        assert!(manifest.dependencies.is_empty());
        assert_eq!(manifest.abi_version, PLUGIN_ABI_VERSION);
        assert_eq!(manifest.library_path, manifest.root_directory);
    }

    #[test]
    fn missing_name_is_rejected() {
        let text = r#"{ "version": "1.0" }"#;
        assert!(matches!(
            PluginManifest::parse(text, &meta_path()),
            Err(ManifestError::Malformed { .. })
        ));

        let text = r#"{ "name": "   ", "version": "1.0" }"#;
        assert!(matches!(
            PluginManifest::parse(text, &meta_path()),
            Err(ManifestError::Invalid { .. })
        ));
    }

    #[test]
    fn unknown_category_is_a_parse_failure() {
        let text = r#"{ "name": "x", "version": "1", "category": "weather" }"#;
        let error = PluginManifest::parse(text, &meta_path()).expect_err("must fail");
        assert!(matches!(error, ManifestError::Malformed { .. }));
        assert!(error.to_string().contains("plugin.meta"));
    }

    #[test]
    fn negative_priority_is_a_parse_failure() {
        let text = r#"{ "name": "x", "version": "1", "priority": -3 }"#;
        assert!(matches!(
            PluginManifest::parse(text, &meta_path()),
            Err(ManifestError::Malformed { .. })
        ));
    }

    #[test]
    fn zero_abi_version_is_rejected() {
        let text = r#"{ "name": "x", "version": "1", "abi_version": 0 }"#;
        assert!(matches!(
            PluginManifest::parse(text, &meta_path()),
            Err(ManifestError::Invalid { .. })
        ));
    }

    #[test]
    fn absolute_module_paths_are_kept() {
        #[cfg(unix)]
        let text = r#"{ "name": "x", "version": "1", "module": "/opt/toybox/x.so" }"#;
        #[cfg(windows)]
        let text = r#"{ "name": "x", "version": "1", "module": "C:\\toybox\\x.dll" }"#;

        let manifest = PluginManifest::parse(text, &meta_path()).expect("manifest should parse");
        assert!(manifest.library_path.is_absolute());
    }

    #[test]
    fn round_trips_through_json() {
        let text = r#"{
            "name": "renderer",
            "version": "2.3.1",
            "category": "rendering",
            "priority": 5,
            "static": true,
            "module": "bin/renderer",
            "dependencies": ["logging_core"]
        }"#;

        let first = PluginManifest::parse(text, &meta_path()).expect("first parse");
        let second =
            PluginManifest::parse(&first.to_json(), &meta_path()).expect("reparse of to_json");
        assert_eq!(first, second);
    }

    #[test]
    fn round_trips_without_a_module() {
        let text = r#"{ "name": "bare", "version": "1.0" }"#;
        let first = PluginManifest::parse(text, &meta_path()).expect("first parse");
        let second =
            PluginManifest::parse(&first.to_json(), &meta_path()).expect("reparse of to_json");
        assert_eq!(first, second);
    }
}
