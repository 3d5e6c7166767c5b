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

use crate::sync::cancellation::{CancellationSource, CancellationToken};
use std::time::{Duration, Instant};

type TimerCallback = Box<dyn FnMut() + Send>;
type TickCallback = Box<dyn FnMut(u64) + Send>;

/// A one-shot timer counting either frame ticks or wall-free monotonic time.
///
/// A tick timer consumes one tick per [`tick`](Timer::tick) call and becomes
/// ready once its count reaches zero. A deadline timer becomes ready when
/// [`is_time_up`](Timer::is_time_up) is called with an instant at or past its
/// deadline; a zero-duration delay is ready immediately. Both variants fire
/// their expired callback at most once and stop reporting ready after
/// cancellation.
#[derive(Default)]
pub struct Timer {
    use_ticks: bool,
    remaining_ticks: u64,
    use_time: bool,
    ready_at: Option<Instant>,
    time_up_notified: bool,
    cancel_notified: bool,
    cancellation: CancellationSource,
    on_tick: Option<TickCallback>,
    on_expired: Option<TimerCallback>,
    on_cancelled: Option<TimerCallback>,
}

impl Timer {
    /// A timer with no delay at all: immediately ready.
    #[must_use]
    pub fn ready() -> Self {
        Self::default()
    }

    /// A timer that waits for `ticks` calls to [`tick`](Timer::tick).
    #[must_use]
    pub fn for_ticks(ticks: u64) -> Self {
        Self {
            use_ticks: ticks > 0,
            remaining_ticks: ticks,
            ..Self::default()
        }
    }

    /// A timer that becomes ready `delay` after `now`.
    #[must_use]
    pub fn for_delay(delay: Duration, now: Instant) -> Self {
        if delay.is_zero() {
            return Self::ready();
        }
        Self {
            use_time: true,
            ready_at: Some(now + delay),
            ..Self::default()
        }
    }

    /// Registers a callback invoked after each consumed tick with the
    /// remaining count.
    pub fn on_tick(&mut self, callback: impl FnMut(u64) + Send + 'static) {
        self.on_tick = Some(Box::new(callback));
    }

    /// Registers the expired callback, fired at most once.
    pub fn on_expired(&mut self, callback: impl FnMut() + Send + 'static) {
        self.on_expired = Some(Box::new(callback));
    }

    /// Registers the cancelled callback, fired at most once.
    pub fn on_cancelled(&mut self, callback: impl FnMut() + Send + 'static) {
        self.on_cancelled = Some(Box::new(callback));
    }

    /// Consumes one tick. Returns `true` while the timer is still counting
    /// ticks, i.e. the caller should keep waiting.
    pub fn tick(&mut self) -> bool {
        if self.cancellation.is_cancelled() {
            self.fire_cancelled();
            return false;
        }

        if !self.use_ticks || self.remaining_ticks == 0 {
            return false;
        }

        self.remaining_ticks -= 1;
        let remaining = self.remaining_ticks;
        if let Some(on_tick) = self.on_tick.as_mut() {
            on_tick(remaining);
        }
        if remaining == 0 {
            self.use_ticks = false;
        }
        true
    }

    /// Returns whether the timer is ready at `now`, firing the expired
    /// callback on the first ready observation.
    pub fn is_time_up(&mut self, now: Instant) -> bool {
        if self.cancellation.is_cancelled() {
            self.fire_cancelled();
            return false;
        }

        if self.use_ticks {
            return false;
        }

        if self.use_time {
            match self.ready_at {
                Some(ready_at) if now < ready_at => return false,
                _ => {}
            }
        }

        self.fire_expired();
        true
    }

    /// Cancels the timer; it will never report ready again.
    pub fn cancel(&mut self) {
        self.cancellation.cancel();
        self.fire_cancelled();
    }

    /// Observer token for the timer's cancellation flag.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.cancellation.token()
    }

    fn fire_expired(&mut self) {
        if self.time_up_notified {
            return;
        }
        self.time_up_notified = true;
        if let Some(on_expired) = self.on_expired.as_mut() {
            on_expired();
        }
    }

    fn fire_cancelled(&mut self) {
        if self.cancel_notified || !self.cancellation.is_cancelled() {
            return;
        }
        self.cancel_notified = true;
        if let Some(on_cancelled) = self.on_cancelled.as_mut() {
            on_cancelled();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn tick_timer_counts_down() {
        let mut timer = Timer::for_ticks(2);
        let now = Instant::now();

        assert!(timer.tick(), "first tick still counting");
        assert!(!timer.is_time_up(now));
        assert!(timer.tick(), "second tick consumes the last count");
        assert!(!timer.tick(), "no ticks left to consume");
        assert!(timer.is_time_up(now));
    }

    #[test]
    fn deadline_timer_respects_the_clock() {
        let now = Instant::now();
        let mut timer = Timer::for_delay(Duration::from_millis(50), now);

        assert!(!timer.is_time_up(now));
        assert!(timer.is_time_up(now + Duration::from_millis(50)));
    }

    #[test]
    fn zero_delay_is_ready_immediately() {
        let now = Instant::now();
        let mut timer = Timer::for_delay(Duration::ZERO, now);
        assert!(timer.is_time_up(now));
    }

    #[test]
    fn expired_fires_exactly_once() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);

        let now = Instant::now();
        let mut timer = Timer::for_delay(Duration::from_millis(1), now);
        timer.on_expired(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let later = now + Duration::from_millis(5);
        assert!(timer.is_time_up(later));
        assert!(timer.is_time_up(later));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancelled_timer_never_reports_ready() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);

        let mut timer = Timer::for_ticks(1);
        timer.on_cancelled(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        timer.cancel();
        assert!(!timer.tick());
        assert!(!timer.is_time_up(Instant::now()));
        assert_eq!(fired.load(Ordering::SeqCst), 1, "cancel callback fires once");
    }

    #[test]
    fn on_tick_reports_remaining_count() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let mut timer = Timer::for_ticks(3);
        timer.on_tick(move |remaining| {
            sink.lock().expect("tick sink poisoned").push(remaining);
        });

        while timer.tick() {}
        assert_eq!(*seen.lock().expect("tick sink poisoned"), vec![2, 1, 0]);
    }
}
