//! Roster resolution.
//!
//! Reads a group sheet through the [`Spreadsheet`] collaborator and turns
//! the relevant cells into a [`SubmissionContext`]. Nothing is cached; every
//! request sees the sheet as it is now.
//!
//! Locating the grade cell and reading the rest of the row are separate
//! steps, so a decided cell is reported before anything else in the row is
//! parsed.

use chrono::{DateTime, Datelike, FixedOffset, Utc};
use labgrader_state::{A1Range, Spreadsheet};

use crate::deadline::parse_deadline;
use crate::domain::error::{GradeError, Result};
use crate::domain::lab::CourseDefinition;
use crate::domain::submission::{GradeRequest, SubmissionContext, SubmissionSlot};

/// Read-only view of one course's roster.
pub struct Roster<'a> {
    sheets: &'a dyn Spreadsheet,
    course: &'a CourseDefinition,
}

impl<'a> Roster<'a> {
    pub fn new(sheets: &'a dyn Spreadsheet, course: &'a CourseDefinition) -> Self {
        Self { sheets, course }
    }

    /// Group (sheet) names.
    pub async fn groups(&self) -> Result<Vec<String>> {
        Ok(self.sheets.list_groups(&self.course.spreadsheet_id).await?)
    }

    /// Fail with `GroupNotFound` unless `group` is a sheet of the roster.
    pub async fn require_group(&self, group: &str) -> Result<()> {
        if self.groups().await?.iter().any(|g| g == group) {
            Ok(())
        } else {
            Err(GradeError::GroupNotFound(group.to_string()))
        }
    }

    /// Lab short-names present in the group's header row, with their
    /// 1-based columns.
    pub async fn lab_columns(&self, group: &str) -> Result<Vec<(String, u32)>> {
        let layout = &self.course.layout;
        let range = A1Range::row_span(
            group,
            layout.header_row,
            layout.first_lab_column,
            layout.last_lab_column(),
        );
        let rows = self.sheets.get_range(&self.course.spreadsheet_id, &range).await?;
        let header = rows.into_iter().next().unwrap_or_default();

        Ok(header
            .into_iter()
            .zip(layout.first_lab_column..)
            .filter_map(|(name, col)| {
                let name = name.trim();
                (!name.is_empty()).then(|| (name.to_string(), col))
            })
            .collect())
    }

    /// Column of `lab` in the group sheet.
    pub async fn lab_column(&self, group: &str, lab: &str) -> Result<u32> {
        self.lab_columns(group)
            .await?
            .into_iter()
            .find(|(name, _)| name == lab)
            .map(|(_, col)| col)
            .ok_or_else(|| GradeError::LabNotOffered {
                lab: lab.to_string(),
                group: group.to_string(),
            })
    }

    /// Row of the student whose GitHub cell matches `github`
    /// (case-insensitive, as GitHub handles are).
    pub async fn find_student_by_github(&self, group: &str, github: &str) -> Result<u32> {
        let layout = &self.course.layout;
        let range = A1Range::column_span(
            group,
            layout.github_column,
            layout.first_student_row,
            layout.last_student_row(),
        );
        let rows = self.sheets.get_range(&self.course.spreadsheet_id, &range).await?;
        let wanted = github.trim().to_lowercase();

        rows.iter()
            .position(|row| {
                row.first()
                    .is_some_and(|cell| cell.trim().to_lowercase() == wanted)
            })
            .map(|i| layout.first_student_row + i as u32)
            .ok_or_else(|| GradeError::StudentNotFound {
                group: group.to_string(),
                student: github.to_string(),
            })
    }

    /// Row of the student with `full_name`. Whitespace runs and letter case
    /// are ignored.
    pub async fn find_student_by_name(&self, group: &str, full_name: &str) -> Result<u32> {
        let layout = &self.course.layout;
        let names = self
            .sheets
            .list_students(&self.course.spreadsheet_id, group, layout)
            .await?;
        let wanted = normalize_name(full_name);

        names
            .iter()
            .position(|name| !wanted.is_empty() && normalize_name(name) == wanted)
            .map(|i| layout.first_student_row + i as u32)
            .ok_or_else(|| GradeError::StudentNotFound {
                group: group.to_string(),
                student: full_name.to_string(),
            })
    }

    /// Value of one cell exactly as stored; `None` when empty.
    pub async fn cell(&self, group: &str, col: u32, row: u32) -> Result<Option<String>> {
        let range = A1Range::cell(group, col, row);
        let rows = self.sheets.get_range(&self.course.spreadsheet_id, &range).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|r| r.into_iter().next())
            .filter(|v| !v.is_empty()))
    }

    /// Find the student's grade cell for the requested lab. Reads only the
    /// group list, the lab header row and the GitHub column.
    pub async fn locate(&self, request: &GradeRequest) -> Result<SubmissionSlot> {
        self.require_group(&request.group).await?;
        if self.course.lab(&request.lab).is_none() {
            return Err(GradeError::LabNotOffered {
                lab: request.lab.clone(),
                group: request.group.clone(),
            });
        }

        let lab_column = self.lab_column(&request.group, &request.lab).await?;
        let row = self
            .find_student_by_github(&request.group, &request.github)
            .await?;

        Ok(SubmissionSlot {
            github: request.github.clone(),
            lab: request.lab.clone(),
            group: request.group.clone(),
            row,
            lab_column,
        })
    }

    /// Deadline of the lab in `lab_column`; `dd.mm` takes `current_year`.
    /// An unparseable cell is a configuration error.
    pub async fn deadline(
        &self,
        group: &str,
        lab: &str,
        lab_column: u32,
        current_year: i32,
    ) -> Result<Option<DateTime<FixedOffset>>> {
        let layout = &self.course.layout;
        match self.cell(group, lab_column, layout.deadline_row).await? {
            Some(raw) => parse_deadline(&raw, &self.course.timezone, current_year).map_err(|e| {
                GradeError::Configuration(format!("deadline of {lab} in group {group}: {e}"))
            }),
            None => Ok(None),
        }
    }

    /// Add the deadline and the raw task-id cell to a located slot.
    pub async fn resolve(
        &self,
        slot: SubmissionSlot,
        current_year: i32,
    ) -> Result<SubmissionContext> {
        let deadline = self
            .deadline(&slot.group, &slot.lab, slot.lab_column, current_year)
            .await?;
        let raw_task_id = self
            .cell(&slot.group, self.course.layout.taskid_column, slot.row)
            .await?;

        Ok(SubmissionContext {
            github: slot.github,
            lab: slot.lab,
            group: slot.group,
            row: slot.row,
            lab_column: slot.lab_column,
            deadline,
            raw_task_id,
        })
    }

    /// [`locate`](Self::locate) followed by [`resolve`](Self::resolve).
    pub async fn submission_context(
        &self,
        request: &GradeRequest,
        current_year: i32,
    ) -> Result<SubmissionContext> {
        let slot = self.locate(request).await?;
        self.resolve(slot, current_year).await
    }
}

/// Year used for deadlines written without one.
pub fn current_year() -> i32 {
    Utc::now().year()
}

fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
