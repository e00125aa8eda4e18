//! Grading decision pipeline.
//!
//! A [`Grader`] turns a [`GradeRequest`] into exactly one of: a grade value
//! written into the student's cell, a poison marker written after a variant
//! mismatch, or a rejection that leaves the sheet untouched.
//!
//! Each request walks the stages in order and stops at the first failure:
//!
//! ```text
//! Pending -> CiEvaluated -> LogsExtracted -> VariantChecked -> PenaltyApplied -> Committed
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use labgrader_state::{A1Range, GatewayError, SourceHost, Spreadsheet};
use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::cell_lock::{CellKey, CellLocks};
use crate::ci_outcome::evaluate_workflow_outcome;
use crate::consistency::all_equal;
use crate::domain::error::{GradeError, Result, TamperField};
use crate::domain::grade::{CellState, GradeValue, Percent, POISON_MARKER};
use crate::domain::lab::CourseDefinition;
use crate::domain::submission::GradeRequest;
use crate::log_extract::extract_log_facts;
use crate::obs;
use crate::penalty::{calculate_penalty, lateness_days};
use crate::roster::{current_year, Roster};
use crate::variant::{validate_variant, VariantCheck};

/// Position of a request in the decision pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeStage {
    Pending,
    CiEvaluated,
    LogsExtracted,
    VariantChecked,
    PenaltyApplied,
    Committed,
}

impl GradeStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            GradeStage::Pending => "pending",
            GradeStage::CiEvaluated => "ci_evaluated",
            GradeStage::LogsExtracted => "logs_extracted",
            GradeStage::VariantChecked => "variant_checked",
            GradeStage::PenaltyApplied => "penalty_applied",
            GradeStage::Committed => "committed",
        }
    }
}

impl std::fmt::Display for GradeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What was written for a successful request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradeReport {
    pub request_id: String,
    pub group: String,
    pub lab: String,
    pub github: String,
    /// A1 address of the grade cell
    pub cell: String,
    /// Value written into the cell
    pub value: String,
    pub reduction_percent: Percent,
    /// Penalty shown in the cell
    pub penalty: u32,
    /// Penalty computed from the deadline, shown or not
    pub computed_penalty: u32,
    /// `None` when the lab has no deadline
    pub lateness_days: Option<i64>,
    /// Validated variant, or the one reported when checking is off
    pub task_variant: Option<u32>,
    pub completed_at: DateTime<Utc>,
}

/// Grades submissions for one course.
pub struct Grader {
    sheets: Arc<dyn Spreadsheet>,
    host: Arc<dyn SourceHost>,
    course: Arc<CourseDefinition>,
    locks: Option<Arc<CellLocks>>,
    year: Option<i32>,
}

impl Grader {
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
            year: None,
        }
    }

    /// Serialize requests for the same cell through `locks`.
    pub fn with_cell_locks(mut self, locks: Arc<CellLocks>) -> Self {
        self.locks = Some(locks);
        self
    }

    /// Year assumed for `dd.mm` deadlines; defaults to the current year.
    pub fn with_current_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn course(&self) -> &CourseDefinition {
        &self.course
    }

    /// Run one request through the pipeline.
    pub async fn grade(&self, request: &GradeRequest) -> Result<GradeReport> {
        let request_id = Uuid::new_v4().to_string();
        let span = obs::request_span(&request_id, "grade");
        self.grade_with_id(request_id, request).instrument(span).await
    }

    async fn grade_with_id(&self, request_id: String, request: &GradeRequest) -> Result<GradeReport> {
        obs::emit_grade_started(&request_id, &request.group, &request.lab, &request.github);

        let _guard = match &self.locks {
            Some(locks) => {
                let target = format!("{}:{}", request.lab, request.github);
                let key = CellKey::new(&self.course.spreadsheet_id, &request.group, &target);
                Some(locks.lock(key).await)
            }
            None => None,
        };

        let mut stage = GradeStage::Pending;
        let result = self.run(&request_id, request, &mut stage).await;
        match &result {
            Ok(report) => obs::emit_grade_committed(&request_id, &report.cell, &report.value),
            Err(err) => obs::emit_grade_rejected(&request_id, stage.as_str(), err),
        }
        result
    }

    async fn run(
        &self,
        request_id: &str,
        request: &GradeRequest,
        stage: &mut GradeStage,
    ) -> Result<GradeReport> {
        let course = self.course.as_ref();
        let roster = Roster::new(self.sheets.as_ref(), course);
        let year = self.year.unwrap_or_else(current_year);

        // The lab is known to exist once this succeeds.
        let slot = roster.locate(request).await?;
        let lab = course
            .lab(&request.lab)
            .ok_or_else(|| GradeError::LabNotOffered {
                lab: request.lab.clone(),
                group: request.group.clone(),
            })?;
        let cell = A1Range::cell(&slot.group, slot.lab_column, slot.row).to_string();

        // Decided cells are never touched again, whatever else the row holds.
        let existing = roster.cell(&slot.group, slot.lab_column, slot.row).await?;
        if let CellState::Graded(value) = CellState::classify(existing.as_deref()) {
            return Err(GradeError::AlreadyGraded { value });
        }
        let observed = existing.unwrap_or_default();
        let ctx = roster.resolve(slot, year).await?;

        let repo_name = lab.repo_name(&ctx.github);
        let repo = self
            .host
            .get_repo(&course.github_org, &repo_name)
            .await?
            .ok_or_else(|| GradeError::RepoNotFound {
                org: course.github_org.clone(),
                repo: repo_name.clone(),
            })?;
        let runs = self.host.list_workflow_runs(&repo).await?;
        let outcome = evaluate_workflow_outcome(&runs, &repo.head_sha, &lab.required_workflows)
            .map_err(|e| GradeError::CiNotGreen(e.to_string()))?;
        let completed_at = outcome
            .latest()
            .ok_or_else(|| GradeError::CiNotGreen("no completion time".to_string()))?;
        self.advance(request_id, stage, GradeStage::CiEvaluated);

        let lateness = ctx.deadline.map(|d| lateness_days(completed_at, d));
        let computed_penalty = lateness
            .map(|days| calculate_penalty(days, lab.penalty_max))
            .unwrap_or(0);
        let penalty = if lab.ignore_completion_date {
            0
        } else {
            computed_penalty
        };

        let mut task_ids = Vec::new();
        let mut reductions = Vec::new();
        for locator in &outcome.logs {
            let text = self.host.fetch_log_bundle(locator).await?;
            let facts = extract_log_facts(&text);
            if let Some(raw) = facts.malformed.first() {
                return Err(GradeError::MalformedLog(format!(
                    "unreadable grading reduction {raw:?}"
                )));
            }
            task_ids.extend(facts.task_ids);
            reductions.extend(facts.reductions);
        }
        if !all_equal(&task_ids) {
            return Err(tampered(TamperField::TaskId, &task_ids));
        }
        if !all_equal(&reductions) {
            return Err(tampered(TamperField::GradingReduction, &reductions));
        }
        self.advance(request_id, stage, GradeStage::LogsExtracted);

        let reported = task_ids.first().copied();
        let task_variant = if lab.checks_task_id() {
            let reported = reported.ok_or_else(|| {
                GradeError::MissingTaskId("no TASKID line in CI logs".to_string())
            })?;
            match validate_variant(lab, ctx.raw_task_id.as_deref(), reported)? {
                VariantCheck::Match { expected } => Some(expected),
                VariantCheck::Mismatch { expected, reported } => {
                    self.write_grade_cell(&ctx.group, ctx.lab_column, ctx.row, POISON_MARKER, &observed)
                        .await?;
                    obs::emit_grade_poisoned(request_id, &cell, expected, reported);
                    return Err(GradeError::WrongVariant { expected, reported });
                }
            }
        } else {
            reported
        };
        self.advance(request_id, stage, GradeStage::VariantChecked);

        let value = GradeValue {
            reduction_percent: reductions.first().copied().unwrap_or_default(),
            penalty,
        };
        obs::emit_penalty_computed(request_id, lateness, computed_penalty, !lab.ignore_completion_date);
        self.advance(request_id, stage, GradeStage::PenaltyApplied);

        let rendered = value.render();
        self.write_grade_cell(&ctx.group, ctx.lab_column, ctx.row, &rendered, &observed)
            .await?;
        self.advance(request_id, stage, GradeStage::Committed);

        Ok(GradeReport {
            request_id: request_id.to_string(),
            group: ctx.group,
            lab: ctx.lab,
            github: ctx.github,
            cell,
            value: rendered,
            reduction_percent: value.reduction_percent,
            penalty,
            computed_penalty,
            lateness_days: lateness,
            task_variant,
            completed_at,
        })
    }

    fn advance(&self, request_id: &str, stage: &mut GradeStage, next: GradeStage) {
        *stage = next;
        obs::emit_grade_stage(request_id, next.as_str());
    }

    /// Write into the grade cell only if it still holds what we read.
    async fn write_grade_cell(
        &self,
        group: &str,
        col: u32,
        row: u32,
        value: &str,
        observed: &str,
    ) -> Result<()> {
        let written = self
            .sheets
            .set_cell(&self.course.spreadsheet_id, group, col, row, value, Some(observed))
            .await;
        match written {
            Ok(()) => Ok(()),
            Err(GatewayError::CompareFailed { found, .. }) => {
                Err(GradeError::AlreadyGraded { value: found })
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn tampered<T: ToString>(field: TamperField, values: &[T]) -> GradeError {
    GradeError::SuspectedTamper {
        field,
        values: values.iter().map(ToString::to_string).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(GradeStage::Pending.to_string(), "pending");
        assert_eq!(GradeStage::PenaltyApplied.as_str(), "penalty_applied");
        assert_eq!(
            serde_json::to_string(&GradeStage::CiEvaluated).unwrap(),
            "\"ci_evaluated\""
        );
    }
}
