//! Per-request submission context.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

/// A grading request as the student submits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradeRequest {
    pub group: String,
    pub lab: String,
    pub github: String,
}

impl GradeRequest {
    pub fn new(group: &str, lab: &str, github: &str) -> Self {
        Self {
            group: group.to_string(),
            lab: lab.to_string(),
            github: github.to_string(),
        }
    }
}

/// Where a student's grade cell for one lab lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionSlot {
    pub github: String,
    pub lab: String,
    pub group: String,
    /// 1-based roster row of the student
    pub row: u32,
    /// 1-based column of the lab's grade cells
    pub lab_column: u32,
}

/// Roster facts about one student and one lab, resolved fresh per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionContext {
    pub github: String,
    pub lab: String,
    pub group: String,
    /// 1-based roster row of the student
    pub row: u32,
    /// 1-based column of the lab's grade cells
    pub lab_column: u32,
    /// Lab deadline from the group sheet, if one is set
    pub deadline: Option<DateTime<FixedOffset>>,
    /// Raw value of the student's task-id cell
    pub raw_task_id: Option<String>,
}
