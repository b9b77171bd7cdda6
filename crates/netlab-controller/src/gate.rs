//! Per-project critical sections.
//!
//! - `creation` serializes node creation so identity allocation (names,
//!   application ids) and backend provisioning never interleave
//! - `link_deletion` serializes the removal of a node's links
//! - `load` makes `open()` exclusive with itself
//!
//! The gates are async mutexes: they are held across backend calls.

use tokio::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct ProjectGates {
    creation: Mutex<()>,
    link_deletion: Mutex<()>,
    load: Mutex<()>,
}

impl ProjectGates {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn creation(&self) -> MutexGuard<'_, ()> {
        self.creation.lock().await
    }

    pub async fn link_deletion(&self) -> MutexGuard<'_, ()> {
        self.link_deletion.lock().await
    }

    pub async fn load(&self) -> MutexGuard<'_, ()> {
        self.load.lock().await
    }
}
