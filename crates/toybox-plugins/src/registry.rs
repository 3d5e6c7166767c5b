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

//! Process-wide registry of statically linked plugins.
//!
//! Static plugins do not ship a shared library; they register a factory under
//! their (lowercased) name and the loader consults the registry instead of
//! opening a module. Registration normally happens at startup through
//! [`toybox_static_plugin!`](crate::toybox_static_plugin), which submits an
//! [`StaticPluginRegistration`] via `inventory`; runtime
//! [`register`](PluginRegistry::register) calls work the same way.

use crate::plugin::Plugin;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

/// Constructor for a statically linked plugin instance.
pub type StaticPluginFactory = fn() -> Box<dyn Plugin>;

/// A compile-time static plugin registration collected by `inventory`.
pub struct StaticPluginRegistration {
    /// Registered plugin name (matched case-insensitively).
    pub name: &'static str,
    /// Instance factory.
    pub factory: StaticPluginFactory,
}

inventory::collect!(StaticPluginRegistration);

fn table() -> &'static Mutex<HashMap<String, StaticPluginFactory>> {
    static TABLE: OnceLock<Mutex<HashMap<String, StaticPluginFactory>>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut seeded = HashMap::new();
        for registration in inventory::iter::<StaticPluginRegistration> {
            seeded.insert(registration.name.to_lowercase(), registration.factory);
        }
        Mutex::new(seeded)
    })
}

fn lock() -> std::sync::MutexGuard<'static, HashMap<String, StaticPluginFactory>> {
    table()
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Discovery surface for statically linked plugins.
pub struct PluginRegistry;

impl PluginRegistry {
    /// Registers (or replaces) a factory under `name`.
    pub fn register(name: &str, factory: StaticPluginFactory) {
        lock().insert(name.to_lowercase(), factory);
    }

    /// Removes the registration for `name`. Idempotent.
    pub fn unregister(name: &str) {
        lock().remove(&name.to_lowercase());
    }

    /// Looks up the factory registered under `name` (case-insensitive).
    #[must_use]
    pub fn find(name: &str) -> Option<StaticPluginFactory> {
        lock().get(&name.to_lowercase()).copied()
    }

    /// Lists all registered names, sorted for determinism.
    #[must_use]
    pub fn list() -> Vec<String> {
        let mut names: Vec<String> = lock().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toybox_core::{DeltaTime, Message};

    #[derive(Default)]
    struct Inert;

    impl Plugin for Inert {
        fn attach(&mut self, _host: &dyn crate::plugin::PluginHost) {}
        fn detach(&mut self) {}
        fn update(&mut self, _dt: DeltaTime) {}
        fn receive_message(&mut self, _msg: &mut Message) {}
    }

    fn inert_factory() -> Box<dyn Plugin> {
        Box::new(Inert)
    }

    #[test]
    fn register_find_unregister() {
        PluginRegistry::register("Registry.TestPlugin", inert_factory);
        assert!(
            PluginRegistry::find("registry.testplugin").is_some(),
            "lookup is case-insensitive"
        );
        assert!(PluginRegistry::list().contains(&String::from("registry.testplugin")));

        PluginRegistry::unregister("REGISTRY.TESTPLUGIN");
        assert!(PluginRegistry::find("Registry.TestPlugin").is_none());

        // Idempotent removal.
        PluginRegistry::unregister("Registry.TestPlugin");
    }

    #[test]
    fn find_unknown_returns_none() {
        assert!(PluginRegistry::find("registry.no-such-plugin").is_none());
    }

    crate::toybox_static_plugin!("registry.inventory-seeded", Inert);

    #[test]
    fn inventory_submissions_seed_the_table() {
        assert!(
            PluginRegistry::find("Registry.Inventory-Seeded").is_some(),
            "startup registrations must be visible through the registry"
        );
    }

    #[test]
    fn factories_construct_fresh_instances() {
        PluginRegistry::register("registry.fresh", inert_factory);
        let factory = PluginRegistry::find("registry.fresh").expect("just registered");
        let _instance = factory();
        PluginRegistry::unregister("registry.fresh");
    }
}
