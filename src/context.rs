//! Process-wide context shared by the configuration components.
//!
//! Built once at startup and handed to every component that needs to publish
//! events or coordinate loads, instead of reaching for global state.

use std::cell::Cell;
use std::rc::Rc;

use crate::events::EventBus;

#[derive(Debug, Default)]
pub struct Context {
    events: EventBus,
    loading: Cell<bool>,
}

impl Context {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// True while a reload holds the [`LoadGuard`].
    pub fn is_loading(&self) -> bool {
        self.loading.get()
    }

    /// Mark a load as in progress.
    ///
    /// Returns `None` when another load already holds the guard. The flag is
    /// cleared when the guard is dropped, whatever path the load takes.
    pub fn begin_load(&self) -> Option<LoadGuard<'_>> {
        if self.loading.replace(true) {
            return None;
        }
        Some(LoadGuard {
            flag: &self.loading,
        })
    }
}

/// Scoped "load in progress" marker. See [`Context::begin_load`].
#[derive(Debug)]
pub struct LoadGuard<'a> {
    flag: &'a Cell<bool>,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}
