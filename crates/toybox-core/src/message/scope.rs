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

//! Thread-local binding of the active coordinator.
//!
//! Free-standing helpers (the [`trace`](crate::trace) facility in
//! particular) reach the coordinator through this slot instead of threading
//! a handle through every call site. The slot is per-thread; binding is
//! scoped and nests.

use crate::message::coordinator::MessageCoordinator;
use std::cell::RefCell;
use std::marker::PhantomData;

thread_local! {
    static CURRENT_DISPATCHER: RefCell<Option<MessageCoordinator>> = const { RefCell::new(None) };
}

/// Returns a handle to the coordinator bound on this thread, if any.
#[must_use]
pub fn current_dispatcher() -> Option<MessageCoordinator> {
    CURRENT_DISPATCHER.with(|slot| slot.borrow().clone())
}

fn swap_dispatcher(next: Option<MessageCoordinator>) -> Option<MessageCoordinator> {
    CURRENT_DISPATCHER.with(|slot| slot.replace(next))
}

/// RAII guard binding a coordinator as this thread's current dispatcher.
///
/// The previous binding is saved on construction and restored on drop, so
/// scopes nest correctly. The guard is deliberately not `Send`: it must be
/// dropped on the thread that created it.
pub struct DispatcherScope {
    previous: Option<MessageCoordinator>,
    _not_send: PhantomData<*const ()>,
}

impl DispatcherScope {
    /// Binds `coordinator` for the lifetime of the returned guard.
    #[must_use]
    pub fn bind(coordinator: &MessageCoordinator) -> Self {
        Self {
            previous: swap_dispatcher(Some(coordinator.clone())),
            _not_send: PhantomData,
        }
    }
}

impl Drop for DispatcherScope {
    fn drop(&mut self) {
        swap_dispatcher(self.previous.take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_is_empty_by_default() {
        assert!(current_dispatcher().is_none());
    }

    #[test]
    fn scope_binds_and_restores() {
        let coordinator = MessageCoordinator::new();
        {
            let _scope = DispatcherScope::bind(&coordinator);
            assert!(current_dispatcher().is_some());
        }
        assert!(current_dispatcher().is_none());
    }

    #[test]
    fn scopes_nest() {
        let outer = MessageCoordinator::new();
        let inner = MessageCoordinator::new();
        let outer_token = outer.add_handler(|_| {});

        let _outer_scope = DispatcherScope::bind(&outer);
        {
            let _inner_scope = DispatcherScope::bind(&inner);
            let bound = current_dispatcher().expect("inner scope should be bound");
            assert_eq!(bound.handler_count(), 0);
        }
        let bound = current_dispatcher().expect("outer scope should be restored");
        assert_eq!(bound.handler_count(), 1);
        outer.remove_handler(outer_token);
    }

    #[test]
    fn binding_is_per_thread() {
        let coordinator = MessageCoordinator::new();
        let _scope = DispatcherScope::bind(&coordinator);

        let seen_elsewhere = std::thread::spawn(|| current_dispatcher().is_some())
            .join()
            .expect("probe thread panicked");
        assert!(!seen_elsewhere, "other threads must not see this binding");
    }
}
