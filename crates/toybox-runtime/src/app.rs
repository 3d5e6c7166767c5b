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

//! The application host.

use crate::messages::{
    ApplicationInitializedEvent, ApplicationShutdownEvent, ApplicationUpdateBeginEvent,
    ApplicationUpdateEndEvent, ExitApplicationRequest,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use toybox_core::{
    on_message, DeltaTimer, DispatcherScope, Message, MessageCoordinator, MessageState,
};
use toybox_plugins::{load_plugins, LoadedPlugin, PluginHost};

/// Static configuration of an application run, loadable from JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppDescription {
    /// Application name, surfaced to plugins through [`PluginHost::name`].
    pub name: String,
    /// Display version.
    #[serde(default)]
    pub version: String,
    /// Root directory scanned for plugin manifests. Empty disables loading.
    #[serde(default)]
    pub plugins_directory: PathBuf,
    /// Names of the plugins to load. Empty loads everything discovered.
    #[serde(default)]
    pub requested_plugins: Vec<String>,
}

impl AppDescription {
    /// Parses a description from a JSON document.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// The application host.
///
/// Owns the coordinator and the loaded plugins. Construction loads,
/// subscribes, and attaches every plugin and publishes
/// [`ApplicationInitializedEvent`]; dropping the host detaches everything in
/// reverse load order.
pub struct Application {
    description: AppDescription,
    coordinator: MessageCoordinator,
    loaded: Vec<LoadedPlugin>,
    should_exit: Arc<AtomicBool>,
}

impl PluginHost for Application {
    fn name(&self) -> &str {
        &self.description.name
    }

    fn coordinator(&self) -> &MessageCoordinator {
        &self.coordinator
    }
}

impl Application {
    /// Builds the host: registers the exit handler, loads and attaches
    /// plugins, and announces initialization.
    pub fn new(description: AppDescription) -> Result<Self> {
        let coordinator = MessageCoordinator::new();
        let should_exit = Arc::new(AtomicBool::new(false));

        let exit_flag = Arc::clone(&should_exit);
        coordinator.add_handler(move |msg| {
            on_message(msg, |_: &ExitApplicationRequest, msg| {
                exit_flag.store(true, Ordering::SeqCst);
                msg.state = MessageState::Handled;
            });
        });

        let mut app = Self {
            description,
            coordinator,
            loaded: Vec::new(),
            should_exit,
        };
        app.initialize();
        Ok(app)
    }

    fn initialize(&mut self) {
        let _scope = DispatcherScope::bind(&self.coordinator);

        if !self.description.plugins_directory.as_os_str().is_empty() {
            match load_plugins(
                &self.description.plugins_directory,
                &self.description.requested_plugins,
            ) {
                Ok(loaded) => self.loaded = loaded,
                Err(error) => {
                    // Unresolvable sets load nothing; the host still runs.
                    log::error!("Plugin resolution failed: {error}");
                }
            }
        }

        for plugin in &self.loaded {
            let cell = plugin.instance();
            let name = plugin.manifest().name.clone();
            self.coordinator
                .add_handler(move |msg| LoadedPlugin::deliver(&cell, &name, msg));
        }
        for plugin in &self.loaded {
            log::info!("Attaching plugin '{}'", plugin.manifest().name);
            plugin.attach(self);
        }

        let mut initialized = Message::new(ApplicationInitializedEvent {
            description: self.description.name.clone(),
        });
        self.coordinator.send(&mut initialized);
    }

    /// The configuration this host was built from.
    #[must_use]
    pub fn description(&self) -> &AppDescription {
        &self.description
    }

    /// Number of live plugins.
    #[must_use]
    pub fn plugin_count(&self) -> usize {
        self.loaded.len()
    }

    /// Whether an [`ExitApplicationRequest`] has been consumed.
    #[must_use]
    pub fn should_exit(&self) -> bool {
        self.should_exit.load(Ordering::SeqCst)
    }

    /// Sends an [`ExitApplicationRequest`] through the coordinator.
    pub fn request_exit(&self) {
        let mut msg = Message::new(ExitApplicationRequest);
        self.coordinator.send(&mut msg);
    }

    /// Runs the main loop until an exit request arrives.
    pub fn run(&mut self) -> Result<()> {
        let mut timer = DeltaTimer::new();
        while !self.should_exit() {
            self.update_frame(&mut timer);
        }
        Ok(())
    }

    /// Executes one frame: drain the deferred queue, measure `dt`, publish
    /// the frame events, and tick every plugin in load order.
    pub fn update_frame(&mut self, timer: &mut DeltaTimer) {
        let _scope = DispatcherScope::bind(&self.coordinator);

        self.coordinator.process();

        let dt = timer.tick();

        let mut begin = Message::new(ApplicationUpdateBeginEvent { dt });
        self.coordinator.send(&mut begin);

        for plugin in &self.loaded {
            plugin.update(dt);
        }

        self.coordinator
            .post(Message::new(ApplicationUpdateEndEvent { dt }));
    }

    fn shutdown(&mut self) {
        let _scope = DispatcherScope::bind(&self.coordinator);

        let mut shutdown = Message::new(ApplicationShutdownEvent);
        self.coordinator.send(&mut shutdown);

        for plugin in self.loaded.iter().rev() {
            log::info!("Detaching plugin '{}'", plugin.manifest().name);
            plugin.detach();
        }

        // Handler closures hold instance cells; drop them before the
        // instances so dynamic plugins are destroyed ahead of their
        // libraries being released.
        self.coordinator.clear();
        while let Some(plugin) = self.loaded.pop() {
            drop(plugin);
        }
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        self.shutdown();
    }
}
