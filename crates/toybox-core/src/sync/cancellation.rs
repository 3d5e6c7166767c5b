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

//! Cooperative cancellation for messages and timers.
//!
//! A [`CancellationSource`] owns a monotonic flag; any number of
//! [`CancellationToken`]s observe it. Once cancelled, a source stays
//! cancelled for the rest of its life.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Owner side of a cancellation flag.
///
/// Cloning a source yields another owner of the same flag; use
/// [`token`](CancellationSource::token) to hand out observe-only handles.
#[derive(Debug, Clone, Default)]
pub struct CancellationSource {
    cancelled: Arc<AtomicBool>,
}

impl CancellationSource {
    /// Creates a source in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips the flag. The transition is monotonic: there is no way back.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns whether the source has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns an observer handle bound to this source.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            cancelled: Arc::clone(&self.cancelled),
        }
    }
}

/// Observer side of a cancellation flag. Cheap to clone and safe to share
/// across threads.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Returns whether the owning source has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_observes_source() {
        let source = CancellationSource::new();
        let token = source.token();
        assert!(!token.is_cancelled());

        source.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancellation_is_monotonic() {
        let source = CancellationSource::new();
        source.cancel();
        source.cancel();
        assert!(source.is_cancelled());
        assert!(source.token().is_cancelled());
    }

    #[test]
    fn tokens_share_the_flag_across_threads() {
        let source = CancellationSource::new();
        let token = source.token();

        let handle = std::thread::spawn(move || {
            source.cancel();
        });
        handle.join().expect("cancel thread panicked");

        assert!(token.is_cancelled());
    }
}
