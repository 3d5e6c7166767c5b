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

//! Dependency-ordered plugin load lists.
//!
//! Given a set of manifests and an optional request set, the resolver
//! selects the dependency closure of the request, then orders it so every
//! dependency appears strictly before its dependents. Ties among
//! independent plugins are broken by ascending (category rank, priority,
//! lowercased name), which keeps the output deterministic and loads loggers
//! first. The unload order is the reverse of the returned list.

use crate::manifest::PluginManifest;
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;
use toybox_core::graph::topological_sort_by_key;

/// Why a load order could not be produced. Either failure means nothing
/// loads.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// A dependency name did not resolve inside the load set.
    #[error("failed to resolve dependency '{dependency}' of plugin '{plugin}'")]
    UnresolvedDependency {
        /// The plugin declaring the dependency.
        plugin: String,
        /// The dependency token that did not resolve.
        dependency: String,
    },
    /// The dependency graph contains a cycle.
    #[error("plugin dependency graph contains a cycle")]
    Cycle,
}

/// Computes the dependency-ordered load list.
///
/// An empty `requested` set selects every manifest; otherwise the selection
/// is the BFS closure of the requested names over declared dependencies.
/// Names match case-insensitively. Identical inputs always produce the
/// identical ordering.
pub fn resolve_load_order(
    manifests: &[PluginManifest],
    requested: &[String],
) -> Result<Vec<PluginManifest>, ResolveError> {
    if manifests.is_empty() {
        return Ok(Vec::new());
    }

    let by_name: HashMap<String, usize> = manifests
        .iter()
        .enumerate()
        .map(|(index, manifest)| (manifest.name.to_lowercase(), index))
        .collect();

    let selected = select_closure(manifests, requested, &by_name);

    // Edges point from dependency to dependent so dependencies sort first.
    // A dependency naming the plugin itself is ignored rather than treated
    // as a one-node cycle.
    let mut edges = Vec::new();
    for &index in &selected {
        let manifest = &manifests[index];
        let mut unique = HashSet::new();
        for dependency in &manifest.dependencies {
            let needle = dependency.to_lowercase();
            let Some(&dep_index) = by_name.get(&needle) else {
                return Err(ResolveError::UnresolvedDependency {
                    plugin: manifest.name.clone(),
                    dependency: dependency.clone(),
                });
            };
            if dep_index != index && unique.insert(dep_index) {
                edges.push((dep_index, index));
            }
        }
    }

    let ordered = topological_sort_by_key(selected.iter().copied(), edges, |&index| {
        let manifest = &manifests[index];
        (
            manifest.category.load_rank(),
            manifest.priority,
            manifest.name.to_lowercase(),
        )
    })
    .map_err(|_| ResolveError::Cycle)?;

    Ok(ordered.into_iter().map(|index| manifests[index].clone()).collect())
}

/// Selects the indices participating in the load: everything when the
/// request set is empty, the request's dependency closure otherwise.
fn select_closure(
    manifests: &[PluginManifest],
    requested: &[String],
    by_name: &HashMap<String, usize>,
) -> Vec<usize> {
    if requested.is_empty() {
        return (0..manifests.len()).collect();
    }

    let mut selected = HashSet::new();
    let mut pending = VecDeque::new();
    for request in requested {
        let needle = request.trim().to_lowercase();
        if needle.is_empty() {
            continue;
        }
        match by_name.get(&needle) {
            Some(&index) => {
                if selected.insert(index) {
                    pending.push_back(index);
                }
            }
            None => {
                log::warn!("Requested plugin '{request}' was not discovered");
            }
        }
    }

    while let Some(index) = pending.pop_front() {
        for dependency in &manifests[index].dependencies {
            let needle = dependency.to_lowercase();
            // Unknown names are reported by the edge pass; the closure only
            // collects what it can see.
            if let Some(&dep_index) = by_name.get(&needle) {
                if selected.insert(dep_index) {
                    pending.push_back(dep_index);
                }
            }
        }
    }

    // Keep discovery order so the sort's tie-breaking is the only source of
    // ordering.
    let mut ordered: Vec<usize> = selected.into_iter().collect();
    ordered.sort_unstable();
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn manifest(name: &str, category: &str, deps: &[&str]) -> PluginManifest {
        let deps = deps
            .iter()
            .map(|d| format!("\"{d}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let text = format!(
            r#"{{ "name": "{name}", "version": "1.0", "category": "{category}",
                 "dependencies": [{deps}] }}"#
        );
        PluginManifest::parse(&text, Path::new("plugins/test/plugin.meta"))
            .expect("test manifest should parse")
    }

    fn names(order: &[PluginManifest]) -> Vec<&str> {
        order.iter().map(|m| m.name.as_str()).collect()
    }

    #[test]
    fn dependencies_load_first() {
        let manifests = vec![
            manifest("graphics", "default", &["metrics", "logger"]),
            manifest("renderer", "default", &["metrics"]),
            manifest("metrics", "default", &[]),
            manifest("logger", "logging", &[]),
        ];

        let order = resolve_load_order(&manifests, &[]).expect("order should resolve");
        let order = names(&order);

        let position =
            |name: &str| order.iter().position(|n| *n == name).expect("name in order");
        assert!(position("logger") < position("metrics"), "loggers lead");
        assert!(position("metrics") < position("renderer"));
        assert!(position("metrics") < position("graphics"));
        assert!(position("logger") < position("graphics"));
    }

    #[test]
    fn ordering_is_deterministic() {
        let manifests = vec![
            manifest("charlie", "default", &[]),
            manifest("alpha", "default", &[]),
            manifest("bravo", "default", &[]),
        ];

        let first = resolve_load_order(&manifests, &[]).expect("order should resolve");
        let second = resolve_load_order(&manifests, &[]).expect("order should resolve");
        assert_eq!(first, second);
        assert_eq!(names(&first), vec!["alpha", "bravo", "charlie"]);
    }

    #[test]
    fn request_set_expands_to_its_closure() {
        let manifests = vec![
            manifest("app", "gameplay", &["renderer"]),
            manifest("renderer", "rendering", &["logger"]),
            manifest("logger", "logging", &[]),
            manifest("unrelated", "default", &[]),
        ];

        let requested = vec![String::from("App")];
        let order = resolve_load_order(&manifests, &requested).expect("order should resolve");
        assert_eq!(names(&order), vec!["logger", "renderer", "app"]);
    }

    #[test]
    fn unknown_requests_select_nothing() {
        let manifests = vec![manifest("known", "default", &[])];
        let requested = vec![String::from("missing")];
        let order = resolve_load_order(&manifests, &requested).expect("resolve succeeds");
        assert!(order.is_empty());
    }

    #[test]
    fn dependency_matching_is_case_insensitive() {
        let manifests = vec![
            manifest("Consumer", "default", &["PROVIDER"]),
            manifest("provider", "default", &[]),
        ];

        let order = resolve_load_order(&manifests, &[]).expect("order should resolve");
        assert_eq!(names(&order), vec!["provider", "Consumer"]);
    }

    #[test]
    fn unresolved_dependency_is_fatal() {
        let manifests = vec![manifest("lonely", "default", &["ghost"])];
        let error = resolve_load_order(&manifests, &[]).expect_err("must fail");
        assert_eq!(
            error,
            ResolveError::UnresolvedDependency {
                plugin: String::from("lonely"),
                dependency: String::from("ghost"),
            }
        );
    }

    #[test]
    fn cycles_are_fatal() {
        let manifests = vec![
            manifest("a", "default", &["b"]),
            manifest("b", "default", &["a"]),
        ];
        let error = resolve_load_order(&manifests, &[]).expect_err("must fail");
        assert_eq!(error, ResolveError::Cycle);
    }

    #[test]
    fn self_dependencies_are_ignored() {
        let manifests = vec![manifest("selfish", "default", &["selfish"])];
        let order = resolve_load_order(&manifests, &[]).expect("order should resolve");
        assert_eq!(names(&order), vec!["selfish"]);
    }

    #[test]
    fn priority_breaks_ties_within_a_category() {
        let low = PluginManifest::parse(
            r#"{ "name": "late", "version": "1", "priority": 5 }"#,
            Path::new("plugins/a/plugin.meta"),
        )
        .expect("manifest");
        let high = PluginManifest::parse(
            r#"{ "name": "early", "version": "1", "priority": 1 }"#,
            Path::new("plugins/b/plugin.meta"),
        )
        .expect("manifest");

        let order = resolve_load_order(&[low, high], &[]).expect("order should resolve");
        assert_eq!(names(&order), vec!["early", "late"]);
    }
}
