//! Collaborator trait definitions for labgrader
//!
//! These traits define the narrow interfaces the grading core consumes:
//! - `Spreadsheet`: the course roster and grade table
//! - `SourceHost`: student repositories, their CI runs and CI logs
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module; real HTTP adapters live in
//! `labgrader-gateway`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::a1::A1Range;
use crate::error::GatewayError;

/// Result type for collaborator operations
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Default number of roster rows scanned per group.
pub const DEFAULT_MAX_STUDENTS: u32 = 500;

// ---------------------------------------------------------------------------
// Spreadsheet: roster and grade table
// ---------------------------------------------------------------------------

/// Physical layout of a group sheet. Columns and rows are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SheetLayout {
    /// Column holding each student's raw task id
    pub taskid_column: u32,
    /// Column holding each student's full name
    pub student_name_column: u32,
    /// Column holding each student's GitHub handle
    pub github_column: u32,
    /// First column of the lab grade block
    pub first_lab_column: u32,
    /// Width of the lab grade block
    pub max_labs: u32,
    /// Row holding lab deadlines
    pub deadline_row: u32,
    /// Row holding lab short-names
    pub header_row: u32,
    /// First row holding a student
    pub first_student_row: u32,
    /// Number of rows scanned from `first_student_row` when looking up a
    /// student; anyone below is not found
    pub max_students: u32,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            taskid_column: 1,
            student_name_column: 2,
            github_column: 3,
            first_lab_column: 4,
            max_labs: 25,
            deadline_row: 1,
            header_row: 2,
            first_student_row: 3,
            max_students: DEFAULT_MAX_STUDENTS,
        }
    }
}

impl SheetLayout {
    /// Last column of the lab grade block.
    pub fn last_lab_column(&self) -> u32 {
        self.first_lab_column + self.max_labs.max(1) - 1
    }

    /// Last roster row considered.
    pub fn last_student_row(&self) -> u32 {
        self.first_student_row
            .saturating_add(self.max_students.max(1) - 1)
    }
}

/// Course roster spreadsheet.
///
/// Rows returned by `get_range` follow the Sheets API convention: trailing
/// empty cells and trailing empty rows are omitted, so callers must treat
/// a short row as empty cells.
#[async_trait]
pub trait Spreadsheet: Send + Sync {
    /// Sheet titles, one per student group.
    async fn list_groups(&self, spreadsheet_id: &str) -> GatewayResult<Vec<String>>;

    /// Raw cell values for a range, row-major.
    async fn get_range(
        &self,
        spreadsheet_id: &str,
        range: &A1Range,
    ) -> GatewayResult<Vec<Vec<String>>>;

    /// Write a single cell.
    ///
    /// With `compare_existing = Some(expected)` the write happens only if the
    /// cell currently holds `expected` (an absent value compares equal to
    /// `""`); otherwise `GatewayError::CompareFailed` is returned and the
    /// cell is left untouched. How atomic that comparison is depends on the
    /// backend.
    async fn set_cell(
        &self,
        spreadsheet_id: &str,
        sheet: &str,
        col: u32,
        row: u32,
        value: &str,
        compare_existing: Option<&str>,
    ) -> GatewayResult<()>;

    /// Student full names in roster order; index `i` is row
    /// `layout.first_student_row + i`.
    async fn list_students(
        &self,
        spreadsheet_id: &str,
        group: &str,
        layout: &SheetLayout,
    ) -> GatewayResult<Vec<String>> {
        let range = A1Range::column_span(
            group,
            layout.student_name_column,
            layout.first_student_row,
            layout.last_student_row(),
        );
        let rows = self.get_range(spreadsheet_id, &range).await?;
        Ok(rows
            .into_iter()
            .map(|row| row.into_iter().next().unwrap_or_default())
            .collect())
    }
}

// ---------------------------------------------------------------------------
// SourceHost: repositories and CI
// ---------------------------------------------------------------------------

/// A repository together with its default-branch head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoHandle {
    pub owner: String,
    pub name: String,
    pub default_branch: String,
    /// Commit currently referenced by the default branch
    pub head_sha: String,
}

impl RepoHandle {
    /// `owner/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Where to fetch the log bundle of one workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogLocator {
    pub owner: String,
    pub repo: String,
    pub run_id: u64,
}

impl std::fmt::Display for LogLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.run_id)
    }
}

/// Status of a workflow run as seen by the grader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Queued or in progress
    Pending,
    /// Finished successfully
    Completed,
    /// Finished unsuccessfully
    Failed,
    /// Anything else the host reports (cancelled, skipped, ...)
    Other(String),
}

/// One CI run of one workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRun {
    /// Workflow name
    pub name: String,
    /// Commit the run was triggered for
    pub head_sha: String,
    pub status: WorkflowStatus,
    /// When the run finished
    pub completed_at: Option<DateTime<Utc>>,
    pub logs: LogLocator,
}

/// Source-hosting service (GitHub).
#[async_trait]
pub trait SourceHost: Send + Sync {
    /// Whether a user account with this handle exists.
    async fn user_exists(&self, handle: &str) -> GatewayResult<bool>;

    /// Look up a repository; `Ok(None)` when it does not exist.
    async fn get_repo(&self, org: &str, name: &str) -> GatewayResult<Option<RepoHandle>>;

    /// Workflow runs on the repository's default branch. Implementations may
    /// pre-filter to the head commit; callers filter again regardless.
    async fn list_workflow_runs(&self, repo: &RepoHandle) -> GatewayResult<Vec<WorkflowRun>>;

    /// Full text of a run's log bundle.
    async fn fetch_log_bundle(&self, locator: &LogLocator) -> GatewayResult<String>;
}
