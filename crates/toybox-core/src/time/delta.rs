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

use std::time::{Duration, Instant};

/// Elapsed time between two consecutive frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeltaTime(Duration);

impl DeltaTime {
    /// Wraps a raw duration.
    #[must_use]
    pub fn new(duration: Duration) -> Self {
        Self(duration)
    }

    /// The underlying duration.
    #[must_use]
    pub fn as_duration(&self) -> Duration {
        self.0
    }

    /// Seconds as `f32`, the unit most per-frame game code wants.
    #[must_use]
    pub fn as_secs_f32(&self) -> f32 {
        self.0.as_secs_f32()
    }

    /// Seconds as `f64` for accumulation without drift.
    #[must_use]
    pub fn as_secs_f64(&self) -> f64 {
        self.0.as_secs_f64()
    }
}

impl From<Duration> for DeltaTime {
    fn from(duration: Duration) -> Self {
        Self(duration)
    }
}

/// Measures the time between successive [`tick`](DeltaTimer::tick) calls.
#[derive(Debug, Clone)]
pub struct DeltaTimer {
    last: Instant,
}

impl DeltaTimer {
    /// Creates a timer whose first tick measures from "now".
    #[must_use]
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    /// Returns the time elapsed since the previous tick (or construction)
    /// and restarts the measurement.
    pub fn tick(&mut self) -> DeltaTime {
        let now = Instant::now();
        let dt = now.duration_since(self.last);
        self.last = now;
        DeltaTime(dt)
    }
}

impl Default for DeltaTimer {
    fn default() -> Self {
        Self::new()
    }
}
