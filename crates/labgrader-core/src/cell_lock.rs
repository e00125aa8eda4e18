//! Optional per-cell mutual exclusion.
//!
//! The spreadsheet has no compare-and-swap, so two requests for the same
//! cell can both pass the "is it empty" check. Attaching a [`CellLocks`] to
//! a `Grader` or `Registrar` serializes requests that target the same cell
//! within this process. Without it, the read-then-write race is left as is.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

/// Identifies the cell a request will write.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellKey {
    pub spreadsheet_id: String,
    pub group: String,
    /// Lab + student for grades, student for registrations
    pub target: String,
}

impl CellKey {
    pub fn new(spreadsheet_id: &str, group: &str, target: &str) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.to_string(),
            group: group.to_string(),
            target: target.to_lowercase(),
        }
    }
}

/// Held for as long as the request owns its cell.
pub struct CellGuard {
    _guard: OwnedMutexGuard<()>,
}

/// Registry of per-cell async mutexes.
#[derive(Debug, Default)]
pub struct CellLocks {
    cells: Mutex<HashMap<CellKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl CellLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other request holds `key`, then hold it.
    pub async fn lock(&self, key: CellKey) -> CellGuard {
        let cell = {
            let mut cells = self.cells.lock().unwrap_or_else(|p| p.into_inner());
            // Drop entries nobody holds or waits on.
            cells.retain(|_, m| Arc::strong_count(m) > 1);
            cells.entry(key).or_default().clone()
        };
        CellGuard {
            _guard: cell.lock_owned().await,
        }
    }

    /// Number of cells currently held or awaited.
    pub fn active(&self) -> usize {
        let cells = self.cells.lock().unwrap_or_else(|p| p.into_inner());
        cells.values().filter(|m| Arc::strong_count(m) > 1).count()
    }
}
