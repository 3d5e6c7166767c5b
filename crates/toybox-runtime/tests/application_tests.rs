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

//! Host lifecycle: exit handling, frame events, and the full
//! load → attach → update → detach path with a static plugin.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use tempfile::TempDir;
use toybox_core::{on_message, DeltaTime, DeltaTimer, Message, MessageState};
use toybox_plugins::{Plugin, PluginHost, PluginRegistry};
use toybox_runtime::messages::{
    ApplicationInitializedEvent, ApplicationUpdateBeginEvent, ApplicationUpdateEndEvent,
};
use toybox_runtime::{AppDescription, Application};

fn pluginless_description(name: &str) -> AppDescription {
    AppDescription {
        name: name.to_owned(),
        version: String::from("0.0.1"),
        plugins_directory: PathBuf::new(),
        requested_plugins: Vec::new(),
    }
}

#[test]
fn exit_request_flips_the_exit_flag() {
    let mut app =
        Application::new(pluginless_description("exit-test")).expect("host should build");
    assert!(!app.should_exit());

    app.request_exit();
    assert!(app.should_exit());

    // With the flag already set, run() returns without spinning.
    app.run().expect("run should return cleanly");
}

#[test]
fn frame_events_are_published_every_frame() {
    let mut app =
        Application::new(pluginless_description("frame-test")).expect("host should build");

    let begins = Arc::new(AtomicUsize::new(0));
    let ends = Arc::new(AtomicUsize::new(0));
    let begin_count = Arc::clone(&begins);
    let end_count = Arc::clone(&ends);
    app.coordinator().add_handler(move |msg| {
        if on_message(msg, |_: &ApplicationUpdateBeginEvent, msg| {
            begin_count.fetch_add(1, Ordering::SeqCst);
            msg.state = MessageState::Handled;
        }) {
            return;
        }
        on_message(msg, |_: &ApplicationUpdateEndEvent, msg| {
            end_count.fetch_add(1, Ordering::SeqCst);
            msg.state = MessageState::Handled;
        });
    });

    let mut timer = DeltaTimer::new();
    app.update_frame(&mut timer);
    assert_eq!(begins.load(Ordering::SeqCst), 1);
    assert_eq!(
        ends.load(Ordering::SeqCst),
        0,
        "the end event is posted, not sent, so it waits for the next drain"
    );

    app.update_frame(&mut timer);
    assert_eq!(begins.load(Ordering::SeqCst), 2);
    assert_eq!(ends.load(Ordering::SeqCst), 1);
}

// -- Full static-plugin lifecycle ------------------------------------------

fn journal() -> &'static Mutex<Vec<String>> {
    static JOURNAL: OnceLock<Mutex<Vec<String>>> = OnceLock::new();
    JOURNAL.get_or_init(|| Mutex::new(Vec::new()))
}

fn record(entry: impl Into<String>) {
    journal().lock().expect("journal poisoned").push(entry.into());
}

#[derive(Default)]
struct JournalingPlugin;

impl Plugin for JournalingPlugin {
    fn attach(&mut self, host: &dyn PluginHost) {
        record(format!("attach:{}", host.name()));
    }

    fn detach(&mut self) {
        record("detach");
    }

    fn update(&mut self, _dt: DeltaTime) {
        record("update");
    }

    fn receive_message(&mut self, msg: &mut Message) {
        if msg.payload_is::<ApplicationInitializedEvent>() {
            record("initialized");
        }
    }
}

fn journaling_factory() -> Box<dyn Plugin> {
    Box::new(JournalingPlugin)
}

#[test]
fn static_plugin_rides_the_whole_lifecycle() {
    PluginRegistry::register("app.journal", journaling_factory);

    let tree = TempDir::new().expect("tempdir");
    let plugin_dir = tree.path().join("journal");
    std::fs::create_dir_all(&plugin_dir).expect("create plugin dir");
    std::fs::write(
        plugin_dir.join("plugin.meta"),
        r#"{ "name": "app.journal", "version": "1.0", "static": true }"#,
    )
    .expect("write manifest");

    {
        let mut app = Application::new(AppDescription {
            name: String::from("journal-host"),
            version: String::new(),
            plugins_directory: tree.path().to_owned(),
            requested_plugins: Vec::new(),
        })
        .expect("host should build");

        assert_eq!(app.plugin_count(), 1);

        let mut timer = DeltaTimer::new();
        app.update_frame(&mut timer);
        app.update_frame(&mut timer);
    } // drop detaches

    let entries = journal().lock().expect("journal poisoned").clone();
    assert_eq!(
        entries,
        vec![
            String::from("attach:journal-host"),
            String::from("initialized"),
            String::from("update"),
            String::from("update"),
            String::from("detach"),
        ]
    );

    PluginRegistry::unregister("app.journal");
}
