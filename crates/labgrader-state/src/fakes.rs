//! In-memory fakes for collaborator traits (testing only)
//!
//! Provides `MemorySpreadsheet` and `MemorySourceHost` that satisfy the
//! trait contracts without any network access. Both record how often they
//! were called so tests can assert that a decision short-circuited.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::a1::A1Range;
use crate::error::GatewayError;
use crate::gateway_traits::*;

const SHEETS: &str = "memory-sheets";
const HOST: &str = "memory-host";

// ---------------------------------------------------------------------------
// MemorySpreadsheet
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct FakeSheet {
    title: String,
    /// (row, col) -> value
    cells: BTreeMap<(u32, u32), String>,
}

/// A single recorded `set_cell` call that went through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellWrite {
    pub spreadsheet_id: String,
    pub sheet: String,
    pub col: u32,
    pub row: u32,
    pub value: String,
}

/// In-memory spreadsheet backed by a `HashMap<spreadsheet_id, Vec<sheet>>`.
///
/// `set_cell` with `compare_existing` is atomic here (the whole store sits
/// behind one mutex), which is stronger than the real backend.
#[derive(Debug, Default)]
pub struct MemorySpreadsheet {
    spreadsheets: Mutex<HashMap<String, Vec<FakeSheet>>>,
    writes: Mutex<Vec<CellWrite>>,
    reads: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemorySpreadsheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty sheet (group) if it does not exist yet.
    pub fn add_sheet(&self, spreadsheet_id: &str, title: &str) {
        let mut books = self.spreadsheets.lock().unwrap();
        let sheets = books.entry(spreadsheet_id.to_string()).or_default();
        if !sheets.iter().any(|s| s.title == title) {
            sheets.push(FakeSheet {
                title: title.to_string(),
                cells: BTreeMap::new(),
            });
        }
    }

    /// Seed a cell without recording a write. Creates the sheet if needed.
    pub fn put(&self, spreadsheet_id: &str, sheet: &str, col: u32, row: u32, value: &str) {
        self.add_sheet(spreadsheet_id, sheet);
        let mut books = self.spreadsheets.lock().unwrap();
        if let Some(s) = books
            .get_mut(spreadsheet_id)
            .and_then(|sheets| sheets.iter_mut().find(|s| s.title == sheet))
        {
            if value.is_empty() {
                s.cells.remove(&(row, col));
            } else {
                s.cells.insert((row, col), value.to_string());
            }
        }
    }

    /// Current value of a cell, if any.
    pub fn cell(&self, spreadsheet_id: &str, sheet: &str, col: u32, row: u32) -> Option<String> {
        let books = self.spreadsheets.lock().unwrap();
        books
            .get(spreadsheet_id)
            .and_then(|sheets| sheets.iter().find(|s| s.title == sheet))
            .and_then(|s| s.cells.get(&(row, col)).cloned())
    }

    /// Every successful write, in order.
    pub fn writes(&self) -> Vec<CellWrite> {
        self.writes.lock().unwrap().clone()
    }

    /// Number of `get_range` calls served.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Make every subsequent call fail with a transport error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> GatewayResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(GatewayError::transport(SHEETS, "backend unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl Spreadsheet for MemorySpreadsheet {
    async fn list_groups(&self, spreadsheet_id: &str) -> GatewayResult<Vec<String>> {
        self.check_available()?;
        let books = self.spreadsheets.lock().unwrap();
        Ok(books
            .get(spreadsheet_id)
            .map(|sheets| sheets.iter().map(|s| s.title.clone()).collect())
            .unwrap_or_default())
    }

    async fn get_range(
        &self,
        spreadsheet_id: &str,
        range: &A1Range,
    ) -> GatewayResult<Vec<Vec<String>>> {
        self.check_available()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        let books = self.spreadsheets.lock().unwrap();
        let sheet = books
            .get(spreadsheet_id)
            .and_then(|sheets| sheets.iter().find(|s| s.title == range.sheet))
            .ok_or_else(|| GatewayError::SheetNotFound {
                sheet: range.sheet.clone(),
            })?;

        let mut rows: Vec<Vec<String>> = (range.start.row..=range.end.row)
            .map(|row| {
                let mut cells: Vec<String> = (range.start.col..=range.end.col)
                    .map(|col| sheet.cells.get(&(row, col)).cloned().unwrap_or_default())
                    .collect();
                while cells.last().is_some_and(|c| c.is_empty()) {
                    cells.pop();
                }
                cells
            })
            .collect();
        while rows.last().is_some_and(|r| r.is_empty()) {
            rows.pop();
        }
        Ok(rows)
    }

    async fn set_cell(
        &self,
        spreadsheet_id: &str,
        sheet: &str,
        col: u32,
        row: u32,
        value: &str,
        compare_existing: Option<&str>,
    ) -> GatewayResult<()> {
        self.check_available()?;
        let mut books = self.spreadsheets.lock().unwrap();
        let target = books
            .get_mut(spreadsheet_id)
            .and_then(|sheets| sheets.iter_mut().find(|s| s.title == sheet))
            .ok_or_else(|| GatewayError::SheetNotFound {
                sheet: sheet.to_string(),
            })?;

        let current = target.cells.get(&(row, col)).cloned().unwrap_or_default();
        if let Some(expected) = compare_existing {
            if current != expected {
                return Err(GatewayError::CompareFailed {
                    cell: A1Range::cell(sheet, col, row).to_string(),
                    expected: expected.to_string(),
                    found: current,
                });
            }
        }

        if value.is_empty() {
            target.cells.remove(&(row, col));
        } else {
            target.cells.insert((row, col), value.to_string());
        }
        self.writes.lock().unwrap().push(CellWrite {
            spreadsheet_id: spreadsheet_id.to_string(),
            sheet: sheet.to_string(),
            col,
            row,
            value: value.to_string(),
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemorySourceHost
// ---------------------------------------------------------------------------

/// In-memory source host: users, repositories, runs and log bundles.
#[derive(Debug, Default)]
pub struct MemorySourceHost {
    users: Mutex<HashSet<String>>,
    repos: Mutex<HashMap<String, RepoHandle>>,
    runs: Mutex<HashMap<String, Vec<WorkflowRun>>>,
    logs: Mutex<HashMap<LogLocator, String>>,
    next_run_id: AtomicU64,
    repo_lookups: AtomicUsize,
    run_listings: AtomicUsize,
    log_fetches: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemorySourceHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, handle: &str) {
        self.users.lock().unwrap().insert(handle.to_lowercase());
    }

    /// Register a repository whose default branch `main` points at `head_sha`.
    pub fn add_repo(&self, org: &str, name: &str, head_sha: &str) -> RepoHandle {
        let repo = RepoHandle {
            owner: org.to_string(),
            name: name.to_string(),
            default_branch: "main".to_string(),
            head_sha: head_sha.to_string(),
        };
        self.repos
            .lock()
            .unwrap()
            .insert(repo.full_name(), repo.clone());
        repo
    }

    /// Record a workflow run on `repo` with the given log text.
    pub fn add_run(
        &self,
        repo: &RepoHandle,
        name: &str,
        head_sha: &str,
        status: WorkflowStatus,
        completed_at: Option<DateTime<Utc>>,
        log_text: &str,
    ) -> LogLocator {
        let run_id = self.next_run_id.fetch_add(1, Ordering::SeqCst) + 1;
        let logs = LogLocator {
            owner: repo.owner.clone(),
            repo: repo.name.clone(),
            run_id,
        };
        self.logs
            .lock()
            .unwrap()
            .insert(logs.clone(), log_text.to_string());
        self.runs
            .lock()
            .unwrap()
            .entry(repo.full_name())
            .or_default()
            .push(WorkflowRun {
                name: name.to_string(),
                head_sha: head_sha.to_string(),
                status,
                completed_at,
                logs: logs.clone(),
            });
        logs
    }

    pub fn repo_lookup_count(&self) -> usize {
        self.repo_lookups.load(Ordering::SeqCst)
    }

    pub fn run_listing_count(&self) -> usize {
        self.run_listings.load(Ordering::SeqCst)
    }

    pub fn log_fetch_count(&self) -> usize {
        self.log_fetches.load(Ordering::SeqCst)
    }

    /// Make every subsequent call fail with a transport error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> GatewayResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(GatewayError::transport(HOST, "backend unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl SourceHost for MemorySourceHost {
    async fn user_exists(&self, handle: &str) -> GatewayResult<bool> {
        self.check_available()?;
        Ok(self.users.lock().unwrap().contains(&handle.to_lowercase()))
    }

    async fn get_repo(&self, org: &str, name: &str) -> GatewayResult<Option<RepoHandle>> {
        self.check_available()?;
        self.repo_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .repos
            .lock()
            .unwrap()
            .get(&format!("{}/{}", org, name))
            .cloned())
    }

    async fn list_workflow_runs(&self, repo: &RepoHandle) -> GatewayResult<Vec<WorkflowRun>> {
        self.check_available()?;
        self.run_listings.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .runs
            .lock()
            .unwrap()
            .get(&repo.full_name())
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_log_bundle(&self, locator: &LogLocator) -> GatewayResult<String> {
        self.check_available()?;
        self.log_fetches.fetch_add(1, Ordering::SeqCst);
        self.logs
            .lock()
            .unwrap()
            .get(locator)
            .cloned()
            .ok_or_else(|| GatewayError::protocol(HOST, format!("no log bundle for {}", locator)))
    }
}
