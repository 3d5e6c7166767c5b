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

// Toybox Sandbox
// Minimal host run: a static logger plugin plus a gameplay plugin that
// counts frames and asks the host to exit.

use anyhow::Result;
use toybox_core::trace::LogCommand;
use toybox_core::{on_message, trace_info, DeltaTime, Message, MessageState};
use toybox_plugins::{toybox_static_plugin, Plugin, PluginHost, PluginRegistry};
use toybox_runtime::messages::{
    ApplicationInitializedEvent, ApplicationShutdownEvent, ApplicationUpdateBeginEvent,
    ApplicationUpdateEndEvent, ExitApplicationRequest,
};
use toybox_runtime::{AppDescription, Application};

/// Claims every `LogCommand` on the bus and forwards it to env_logger.
#[derive(Default)]
struct ConsoleLogger;

impl Plugin for ConsoleLogger {
    fn attach(&mut self, host: &dyn PluginHost) {
        log::info!("ConsoleLogger attached to '{}'", host.name());
    }

    fn detach(&mut self) {}

    fn update(&mut self, _dt: DeltaTime) {}

    fn receive_message(&mut self, msg: &mut Message) {
        on_message(msg, |cmd: &LogCommand, msg| {
            log::info!("[{}] {}", cmd.level.label(), cmd.text);
            msg.state = MessageState::Handled;
        });
    }
}

toybox_static_plugin!("sandbox_logger", ConsoleLogger);

/// Runs for a fixed number of frames, then requests exit.
#[derive(Default)]
struct FrameCounter {
    frames: u32,
}

const FRAME_BUDGET: u32 = 60;

impl Plugin for FrameCounter {
    fn attach(&mut self, host: &dyn PluginHost) {
        log::info!("FrameCounter attached to '{}'", host.name());
    }

    fn detach(&mut self) {
        log::info!("FrameCounter ran for {} frames", self.frames);
    }

    fn update(&mut self, dt: DeltaTime) {
        self.frames += 1;
        if self.frames == FRAME_BUDGET {
            trace_info!("Frame budget reached after {:.3}s frame", dt.as_secs_f64());
            if let Some(coordinator) = toybox_core::current_dispatcher() {
                coordinator.post(Message::new(ExitApplicationRequest));
            }
        }
    }

    fn receive_message(&mut self, msg: &mut Message) {
        // Frame and lifecycle events are observed, not consumed.
        let observed = msg.payload_is::<ApplicationInitializedEvent>()
            || msg.payload_is::<ApplicationUpdateBeginEvent>()
            || msg.payload_is::<ApplicationUpdateEndEvent>()
            || msg.payload_is::<ApplicationShutdownEvent>();
        if observed && msg.state == MessageState::InProgress {
            msg.state = MessageState::Processed;
        }
    }
}

toybox_static_plugin!("sandbox_frame_counter", FrameCounter);

fn main() -> Result<()> {
    env_logger::init();

    // The sandbox registers its plugins statically, so the manifest tree
    // only has to declare them.
    let plugins_root = stage_plugin_manifests()?;

    log::info!("Static plugins: {:?}", PluginRegistry::list());

    let mut app = Application::new(AppDescription {
        name: String::from("toybox-sandbox"),
        version: String::from("0.1.0"),
        plugins_directory: plugins_root.path().to_owned(),
        requested_plugins: Vec::new(),
    })?;

    app.run()
}

/// Writes the sandbox's manifests into a temporary plugin tree.
fn stage_plugin_manifests() -> Result<StagedTree> {
    let root = std::env::temp_dir().join("toybox-sandbox-plugins");
    let logger_dir = root.join("logger");
    let counter_dir = root.join("frame_counter");
    std::fs::create_dir_all(&logger_dir)?;
    std::fs::create_dir_all(&counter_dir)?;

    std::fs::write(
        logger_dir.join("plugin.meta"),
        r#"{ "name": "sandbox_logger", "version": "0.1.0",
             "category": "logging", "static": true }"#,
    )?;
    std::fs::write(
        counter_dir.join("plugin.meta"),
        r#"{ "name": "sandbox_frame_counter", "version": "0.1.0",
             "category": "gameplay", "static": true,
             "dependencies": ["sandbox_logger"] }"#,
    )?;

    Ok(StagedTree { root })
}

struct StagedTree {
    root: std::path::PathBuf,
}

impl StagedTree {
    fn path(&self) -> &std::path::Path {
        &self.root
    }
}

impl Drop for StagedTree {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}
