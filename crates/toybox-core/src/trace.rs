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

//! Dispatcher-routed logging.
//!
//! [`trace`] wraps a [`LogCommand`] in a message and sends it through the
//! coordinator bound on the current thread, which lets a logger plugin claim
//! it. Without a bound dispatcher, or when no handler claims the command,
//! the line goes to standard output instead (with a one-time warning), and
//! the returned result is failed — callers still get a coherent outcome.

use crate::message::scope::current_dispatcher;
use crate::message::{Message, MessageState};
use crate::MessageResult;
use std::sync::atomic::{AtomicBool, Ordering};

/// Severity of a [`LogCommand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Verbose diagnostics.
    Trace,
    /// Informational messages.
    Info,
    /// Something unexpected but recoverable.
    Warning,
    /// Something went wrong.
    Error,
    /// The application cannot continue.
    Critical,
}

impl LogLevel {
    /// Short uppercase label used by the stdout fallback.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }
}

/// Payload carried by a trace message. Logger plugins match on this type and
/// mark the message handled.
#[derive(Debug, Clone)]
pub struct LogCommand {
    /// Severity.
    pub level: LogLevel,
    /// The formatted line.
    pub text: String,
    /// Source file of the call site.
    pub file: &'static str,
    /// Source line of the call site.
    pub line: u32,
}

static FALLBACK_WARNED: AtomicBool = AtomicBool::new(false);

fn fallback(level: LogLevel, file: &str, line: u32, text: &str) {
    if !FALLBACK_WARNED.swap(true, Ordering::SeqCst) {
        log::warn!("No log handlers; falling back to stdout");
    }
    println!("[{}] {file}:{line} - {text}", level.label());
}

/// Routes a log line through the current dispatcher.
///
/// Returns the delivery result of the underlying [`LogCommand`] message; a
/// failed result means the line went to the stdout fallback.
pub fn trace(level: LogLevel, text: impl Into<String>, file: &'static str, line: u32) -> MessageResult {
    let text = text.into();

    let Some(dispatcher) = current_dispatcher() else {
        fallback(level, file, line, &text);
        let result = MessageResult::new();
        result.flag_failure(
            MessageState::Failed,
            "No message dispatcher is bound on this thread.",
        );
        return result;
    };

    let mut msg = Message::new(LogCommand {
        level,
        text: text.clone(),
        file,
        line,
    });
    let result = dispatcher.send(&mut msg);
    if msg.state != MessageState::Handled {
        fallback(level, file, line, &text);
    }
    result
}

/// Logs an informational line through the current dispatcher.
#[macro_export]
macro_rules! trace_info {
    ($($arg:tt)*) => {
        let _ = $crate::trace::trace(
            $crate::trace::LogLevel::Info,
            format!($($arg)*),
            file!(),
            line!(),
        );
    };
}

/// Logs a warning line through the current dispatcher.
#[macro_export]
macro_rules! trace_warning {
    ($($arg:tt)*) => {
        let _ = $crate::trace::trace(
            $crate::trace::LogLevel::Warning,
            format!($($arg)*),
            file!(),
            line!(),
        );
    };
}

/// Logs an error line through the current dispatcher.
#[macro_export]
macro_rules! trace_error {
    ($($arg:tt)*) => {
        let _ = $crate::trace::trace(
            $crate::trace::LogLevel::Error,
            format!($($arg)*),
            file!(),
            line!(),
        );
    };
}
