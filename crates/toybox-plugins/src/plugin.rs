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

//! The plugin contract: lifecycle trait, host surface, ABI symbols, and the
//! host-owned record pairing an instance with its library handle.

use crate::library::SharedLibrary;
use crate::manifest::PluginManifest;
use toybox_core::{DeltaTime, Message, MessageCoordinator};
use std::sync::{Arc, Mutex, TryLockError};

/// ABI revision of the plugin contract. The loader skips plugins whose
/// manifest declares a different revision.
pub const PLUGIN_ABI_VERSION: u32 = 1;

/// Prefix of the exported factory symbol: `create_<name>`.
pub const CREATE_SYMBOL_PREFIX: &str = "create_";
/// Prefix of the exported destroy symbol: `destroy_<name>`.
pub const DESTROY_SYMBOL_PREFIX: &str = "destroy_";

/// Host surface handed to plugins on attach.
///
/// Implementations retain ownership of everything returned here; plugins
/// must not hold references past their own detach.
pub trait PluginHost {
    /// The host application's name.
    fn name(&self) -> &str;

    /// The host's message coordinator. Plugins register interest by sending
    /// and posting through it; their `receive_message` is already subscribed
    /// by the host.
    fn coordinator(&self) -> &MessageCoordinator;
}

/// A runtime-loadable unit of engine functionality.
///
/// All callbacks run on the host's main thread. `attach` is called exactly
/// once before any other method, `detach` exactly once after the last.
pub trait Plugin: Send {
    /// Wires the plugin to the host. Called once, in load order.
    fn attach(&mut self, host: &dyn PluginHost);

    /// Releases host references. Called once, in reverse load order.
    fn detach(&mut self);

    /// Per-frame tick.
    fn update(&mut self, dt: DeltaTime);

    /// Unified message entry point; the host subscribes this to its
    /// coordinator.
    fn receive_message(&mut self, msg: &mut Message);
}

/// Factory symbol exported by a dynamic plugin as `create_<name>`.
pub type CreatePluginFn = unsafe extern "C" fn() -> *mut dyn Plugin;

/// Destroy symbol exported by a dynamic plugin as `destroy_<name>`. Frees an
/// instance previously returned by the matching create symbol.
pub type DestroyPluginFn = unsafe extern "C" fn(*mut dyn Plugin);

/// Owns a plugin instance and knows how to dispose of it.
///
/// Instances created through a library's factory symbol are released through
/// the matching destroy symbol so allocation and deallocation stay on the
/// plugin's side of the ABI. Instances built in-process (static plugins) are
/// plain boxes.
pub struct PluginInstance {
    raw: *mut dyn Plugin,
    destroy: Option<DestroyPluginFn>,
}

// The raw pointer originates from a `Box<dyn Plugin>` (or the ABI-equivalent
// allocation inside the plugin library) and `Plugin` requires `Send`.
unsafe impl Send for PluginInstance {}

impl PluginInstance {
    /// Wraps an in-process instance; disposal is a normal drop.
    #[must_use]
    pub fn from_box(plugin: Box<dyn Plugin>) -> Self {
        Self {
            raw: Box::into_raw(plugin),
            destroy: None,
        }
    }

    /// Wraps an instance produced by a library factory symbol.
    ///
    /// # Safety
    ///
    /// `raw` must be non-null and come from the create symbol matching
    /// `destroy`, and the owning library must outlive this instance.
    #[must_use]
    pub unsafe fn from_raw(raw: *mut dyn Plugin, destroy: DestroyPluginFn) -> Self {
        Self {
            raw,
            destroy: Some(destroy),
        }
    }

    /// Mutable access to the plugin.
    pub fn get_mut(&mut self) -> &mut dyn Plugin {
        unsafe { &mut *self.raw }
    }
}

impl Drop for PluginInstance {
    fn drop(&mut self) {
        match self.destroy {
            Some(destroy) => unsafe { destroy(self.raw) },
            None => unsafe {
                drop(Box::from_raw(self.raw));
            },
        }
    }
}

/// Shared handle to a plugin instance.
///
/// The host ticks the plugin through one clone while the coordinator's
/// handler closure delivers messages through another.
pub type PluginCell = Arc<Mutex<PluginInstance>>;

/// A loaded plugin: its manifest, its live instance, and (for dynamic
/// linkage) the library it came from.
pub struct LoadedPlugin {
    manifest: PluginManifest,
    // Declaration order is destruction order: the instance must be destroyed
    // through its destroy symbol before the library handle is released.
    instance: PluginCell,
    library: Option<SharedLibrary>,
}

impl std::fmt::Debug for LoadedPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedPlugin")
            .field("manifest", &self.manifest)
            .field("has_library", &self.library.is_some())
            .finish()
    }
}

impl LoadedPlugin {
    /// Pairs a manifest with a live instance and its optional library.
    #[must_use]
    pub fn new(
        manifest: PluginManifest,
        instance: PluginInstance,
        library: Option<SharedLibrary>,
    ) -> Self {
        Self {
            manifest,
            instance: Arc::new(Mutex::new(instance)),
            library,
        }
    }

    /// The manifest this plugin was loaded from.
    #[must_use]
    pub fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    /// Whether a library handle is held (dynamic linkage).
    #[must_use]
    pub fn has_library(&self) -> bool {
        self.library.is_some()
    }

    /// A shared handle onto the instance, e.g. for a coordinator handler.
    #[must_use]
    pub fn instance(&self) -> PluginCell {
        Arc::clone(&self.instance)
    }

    /// Attaches the plugin to the host.
    pub fn attach(&self, host: &dyn PluginHost) {
        self.lock().get_mut().attach(host);
    }

    /// Detaches the plugin from the host.
    pub fn detach(&self) {
        self.lock().get_mut().detach();
    }

    /// Ticks the plugin.
    pub fn update(&self, dt: DeltaTime) {
        self.lock().get_mut().update(dt);
    }

    /// Delivers a message to the plugin, skipping it when the instance is
    /// already borrowed by the caller further up the stack (a plugin sending
    /// from inside its own `update` does not observe its own dispatch).
    pub fn deliver(cell: &PluginCell, name: &str, msg: &mut Message) {
        match cell.try_lock() {
            Ok(mut instance) => instance.get_mut().receive_message(msg),
            Err(TryLockError::WouldBlock) => {
                log::trace!("Plugin '{name}' is busy; skipping message {}", msg.id);
            }
            Err(TryLockError::Poisoned(poisoned)) => {
                poisoned.into_inner().get_mut().receive_message(msg);
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PluginInstance> {
        self.instance
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Exports the `create_<name>`/`destroy_<name>` symbol pair for a dynamic
/// plugin. The plugin type must implement [`Default`] and [`Plugin`].
///
/// ```ignore
/// toybox_plugin!(demo_renderer, DemoRenderer);
/// ```
#[macro_export]
macro_rules! toybox_plugin {
    ($name:ident, $ty:ty) => {
        #[allow(improper_ctypes_definitions)]
        #[export_name = concat!("create_", stringify!($name))]
        pub extern "C" fn __toybox_create_plugin() -> *mut dyn $crate::plugin::Plugin {
            let plugin: Box<dyn $crate::plugin::Plugin> = Box::new(<$ty>::default());
            Box::into_raw(plugin)
        }

        #[allow(improper_ctypes_definitions)]
        #[export_name = concat!("destroy_", stringify!($name))]
        pub extern "C" fn __toybox_destroy_plugin(plugin: *mut dyn $crate::plugin::Plugin) {
            if !plugin.is_null() {
                unsafe {
                    drop(Box::from_raw(plugin));
                }
            }
        }
    };
}

/// Registers a statically linked plugin with the process-wide registry at
/// startup. The plugin type must implement [`Default`] and [`Plugin`].
///
/// ```ignore
/// toybox_static_plugin!("demo_logger", DemoLogger);
/// ```
#[macro_export]
macro_rules! toybox_static_plugin {
    ($name:literal, $ty:ty) => {
        $crate::inventory::submit! {
            $crate::registry::StaticPluginRegistration {
                name: $name,
                factory: {
                    fn construct() -> Box<dyn $crate::plugin::Plugin> {
                        Box::new(<$ty>::default())
                    }
                    construct
                },
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use toybox_core::MessageState;

    #[derive(Default)]
    struct Probe {
        attached: bool,
    }

    impl Plugin for Probe {
        fn attach(&mut self, _host: &dyn PluginHost) {
            self.attached = true;
        }

        fn detach(&mut self) {
            assert!(self.attached, "detach must follow attach");
            self.attached = false;
        }

        fn update(&mut self, _dt: DeltaTime) {}

        fn receive_message(&mut self, msg: &mut Message) {
            msg.state = MessageState::Handled;
        }
    }

    struct TestHost {
        coordinator: MessageCoordinator,
    }

    impl PluginHost for TestHost {
        fn name(&self) -> &str {
            "test-host"
        }

        fn coordinator(&self) -> &MessageCoordinator {
            &self.coordinator
        }
    }

    fn manifest() -> PluginManifest {
        PluginManifest::parse(
            r#"{ "name": "probe", "version": "1.0", "static": true }"#,
            std::path::Path::new("probe/plugin.meta"),
        )
        .expect("test manifest should parse")
    }

    #[test]
    fn instance_lifecycle_through_a_loaded_plugin() {
        let host = TestHost {
            coordinator: MessageCoordinator::new(),
        };
        let loaded = LoadedPlugin::new(
            manifest(),
            PluginInstance::from_box(Box::new(Probe::default())),
            None,
        );

        loaded.attach(&host);
        loaded.update(DeltaTime::default());
        loaded.update(DeltaTime::default());

        let mut msg = Message::new(());
        LoadedPlugin::deliver(&loaded.instance(), "probe", &mut msg);
        assert_eq!(msg.state, MessageState::Handled);

        loaded.detach();
        assert!(!loaded.has_library());
    }

    // Expansion coverage for the export macro; the symbols are only ever
    // resolved out of a real cdylib.
    crate::toybox_plugin!(probe_plugin, Probe);

    #[test]
    fn exported_factory_and_destroyer_pair_up() {
        let raw = __toybox_create_plugin();
        assert!(!raw.is_null());
        __toybox_destroy_plugin(raw);
        __toybox_destroy_plugin(std::ptr::null_mut::<Probe>() as *mut dyn Plugin);
    }

    #[test]
    fn deliver_skips_a_busy_instance() {
        let loaded = LoadedPlugin::new(
            manifest(),
            PluginInstance::from_box(Box::new(Probe::default())),
            None,
        );

        let cell = loaded.instance();
        let _held = cell.lock().expect("test lock");

        let mut msg = Message::new(());
        LoadedPlugin::deliver(&loaded.instance(), "probe", &mut msg);
        assert_eq!(
            msg.state,
            MessageState::InProgress,
            "a busy plugin must not receive the message"
        );
    }
}
