//! Student registration: binding a GitHub handle to a roster row.
//!
//! Writes are claim-once. A cell that is empty may be claimed; a cell that
//! already holds the same value is a harmless duplicate; a cell holding a
//! different value belongs to someone else.

use std::sync::Arc;

use labgrader_state::{A1Range, GatewayError, SourceHost, Spreadsheet};
use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::cell_lock::{CellKey, CellLocks};
use crate::domain::error::{GradeError, Result};
use crate::domain::lab::CourseDefinition;
use crate::obs;
use crate::roster::Roster;

/// Write `value` into one roster cell.
///
/// With `check_null` the write only happens into an empty cell: an equal
/// value is rejected as `DuplicateSameValue`, any other value as
/// `AlreadyClaimed`. Without it the cell is overwritten unconditionally.
pub async fn write_registration_cell(
    sheets: &dyn Spreadsheet,
    spreadsheet_id: &str,
    sheet: &str,
    col: u32,
    row: u32,
    value: &str,
    check_null: bool,
) -> Result<()> {
    if !check_null {
        sheets
            .set_cell(spreadsheet_id, sheet, col, row, value, None)
            .await?;
        return Ok(());
    }

    let range = A1Range::cell(sheet, col, row);
    let current = sheets
        .get_range(spreadsheet_id, &range)
        .await?
        .into_iter()
        .next()
        .and_then(|r| r.into_iter().next())
        .unwrap_or_default();
    if !current.trim().is_empty() {
        return Err(claim_conflict(current, value));
    }

    match sheets
        .set_cell(spreadsheet_id, sheet, col, row, value, Some(&current))
        .await
    {
        Ok(()) => Ok(()),
        Err(GatewayError::CompareFailed { found, .. }) => Err(claim_conflict(found, value)),
        Err(e) => Err(e.into()),
    }
}

fn claim_conflict(existing: String, value: &str) -> GradeError {
    if existing.trim() == value.trim() {
        GradeError::DuplicateSameValue {
            value: value.to_string(),
        }
    } else {
        GradeError::AlreadyClaimed { existing }
    }
}

/// A student asking to bind their GitHub handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationRequest {
    pub group: String,
    /// As written in the roster's name column
    pub full_name: String,
    pub github: String,
}

impl RegistrationRequest {
    pub fn new(group: &str, full_name: &str, github: &str) -> Self {
        Self {
            group: group.to_string(),
            full_name: full_name.to_string(),
            github: github.to_string(),
        }
    }
}

/// What a successful registration wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationReport {
    pub request_id: String,
    pub group: String,
    pub row: u32,
    pub cell: String,
    pub github: String,
}

/// Registers students of one course.
pub struct Registrar {
    sheets: Arc<dyn Spreadsheet>,
    host: Arc<dyn SourceHost>,
    course: Arc<CourseDefinition>,
    locks: Option<Arc<CellLocks>>,
}

impl Registrar {
    pub fn new(
        sheets: Arc<dyn Spreadsheet>,
        host: Arc<dyn SourceHost>,
        course: Arc<CourseDefinition>,
    ) -> Self {
        Self {
            sheets,
            host,
            course,
            locks: None,
        }
    }

    pub fn with_cell_locks(mut self, locks: Arc<CellLocks>) -> Self {
        self.locks = Some(locks);
        self
    }

    /// Bind `request.github` to the student row named `request.full_name`.
    pub async fn register(&self, request: &RegistrationRequest) -> Result<RegistrationReport> {
        let request_id = Uuid::new_v4().to_string();
        let span = obs::request_span(&request_id, "register");
        async {
            obs::emit_registration_started(&request_id, &request.group, &request.github);
            let result = self.run(&request_id, request).await;
            match &result {
                Ok(report) => {
                    obs::emit_registration_written(&request_id, &report.cell, &report.github)
                }
                Err(err) => obs::emit_registration_rejected(&request_id, err),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(&self, request_id: &str, request: &RegistrationRequest) -> Result<RegistrationReport> {
        let course = self.course.as_ref();
        let roster = Roster::new(self.sheets.as_ref(), course);

        roster.require_group(&request.group).await?;
        let row = roster
            .find_student_by_name(&request.group, &request.full_name)
            .await?;

        let github = request.github.trim();
        if !self.host.user_exists(github).await? {
            return Err(GradeError::UserNotFound(github.to_string()));
        }

        let _guard = match &self.locks {
            Some(locks) => {
                let key = CellKey::new(&course.spreadsheet_id, &request.group, &format!("row:{row}"));
                Some(locks.lock(key).await)
            }
            None => None,
        };

        let col = course.layout.github_column;
        write_registration_cell(
            self.sheets.as_ref(),
            &course.spreadsheet_id,
            &request.group,
            col,
            row,
            github,
            true,
        )
        .await?;

        Ok(RegistrationReport {
            request_id: request_id.to_string(),
            group: request.group.clone(),
            row,
            cell: A1Range::cell(&request.group, col, row).to_string(),
            github: github.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labgrader_state::MemorySpreadsheet;

    #[tokio::test]
    async fn test_claim_empty_cell() {
        let sheets = MemorySpreadsheet::new();
        sheets.add_sheet("s", "4232");
        write_registration_cell(&sheets, "s", "4232", 3, 5, "octocat", true)
            .await
            .unwrap();
        assert_eq!(sheets.cell("s", "4232", 3, 5).as_deref(), Some("octocat"));
    }

    #[tokio::test]
    async fn test_same_value_is_duplicate() {
        let sheets = MemorySpreadsheet::new();
        sheets.put("s", "4232", 3, 5, "octocat");
        let err = write_registration_cell(&sheets, "s", "4232", 3, 5, "octocat", true)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GradeError::DuplicateSameValue {
                value: "octocat".to_string()
            }
        );
        assert!(sheets.writes().is_empty());
    }

    #[tokio::test]
    async fn test_other_value_is_claimed() {
        let sheets = MemorySpreadsheet::new();
        sheets.put("s", "4232", 3, 5, "someone");
        let err = write_registration_cell(&sheets, "s", "4232", 3, 5, "octocat", true)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GradeError::AlreadyClaimed {
                existing: "someone".to_string()
            }
        );
        assert_eq!(sheets.cell("s", "4232", 3, 5).as_deref(), Some("someone"));
    }

    #[tokio::test]
    async fn test_unchecked_write_overwrites() {
        let sheets = MemorySpreadsheet::new();
        sheets.put("s", "4232", 3, 5, "someone");
        write_registration_cell(&sheets, "s", "4232", 3, 5, "octocat", false)
            .await
            .unwrap();
        assert_eq!(sheets.cell("s", "4232", 3, 5).as_deref(), Some("octocat"));
    }

    #[tokio::test]
    async fn test_backend_failure_is_transport() {
        let sheets = MemorySpreadsheet::new();
        sheets.add_sheet("s", "4232");
        sheets.set_unavailable(true);
        let err = write_registration_cell(&sheets, "s", "4232", 3, 5, "octocat", true)
            .await
            .unwrap_err();
        assert!(matches!(err, GradeError::Transport(_)));
    }
}
