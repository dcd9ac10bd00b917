//! Unique component ids

use std::sync::atomic::{AtomicU64, Ordering};

/// Issues unique ids to operator components.
///
/// One registry is shared by every component of a run; ids are never
/// reused, even after the component that held one is dropped.
#[derive(Debug)]
pub struct ComponentRegistry {
    next: AtomicU64,
}

impl ComponentRegistry {
    /// First id handed out by a fresh registry
    pub const FIRST_ID: u64 = 1;

    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(Self::FIRST_ID),
        }
    }

    /// Take the next id
    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Record an id issued elsewhere (e.g. a restored component) so that
    /// later ids are strictly greater
    pub fn observe(&self, id: u64) {
        self.next.fetch_max(id.saturating_add(1), Ordering::Relaxed);
    }

    /// Id the next call to `next_id` will return
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
