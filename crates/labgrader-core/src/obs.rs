//! Structured observability hooks for grading and registration requests.
//!
//! This module provides:
//! - Request-scoped tracing spans via [`request_span`]
//! - Emission functions for key lifecycle events: start, stage, reject, commit
//!
//! Events are emitted at `info!` level (configurable via `LABGRADER_LOG`).
//! Integrity rejections are raised to `warn!`, configuration defects to
//! `error!`. For JSON output pass `--json` to the CLI.

use tracing::{error, info, warn};

use crate::domain::error::{ErrorClass, GradeError};

/// Request-scoped span carrying `request_id` and `op`.
///
/// Attach it to the request future with `tracing::Instrument` so every
/// event below carries both fields:
///
/// ```ignore
/// async { /* ... */ }.instrument(request_span(&id, "grade")).await
/// ```
pub fn request_span(request_id: &str, op: &str) -> tracing::Span {
    tracing::info_span!("labgrader.request", request_id = %request_id, op = %op)
}

/// Emit event: grading request accepted for processing.
pub fn emit_grade_started(request_id: &str, group: &str, lab: &str, github: &str) {
    info!(
        event = "grade.started",
        request_id = %request_id,
        group = %group,
        lab = %lab,
        github = %github,
    );
}

/// Emit event: the decision pipeline reached a new state.
pub fn emit_grade_stage(request_id: &str, stage: &str) {
    info!(event = "grade.stage", request_id = %request_id, stage = %stage);
}

/// Emit event: the lateness penalty, including the one hidden from the cell.
pub fn emit_penalty_computed(request_id: &str, lateness_days: Option<i64>, penalty: u32, shown: bool) {
    info!(
        event = "grade.penalty",
        request_id = %request_id,
        lateness_days = ?lateness_days,
        penalty = penalty,
        shown = shown,
    );
}

/// Emit event: request rejected at `stage`.
pub fn emit_grade_rejected(request_id: &str, stage: &str, err: &GradeError) {
    log_rejection("grade.rejected", request_id, stage, err);
}

/// Emit event: grade written.
pub fn emit_grade_committed(request_id: &str, cell: &str, value: &str) {
    info!(event = "grade.committed", request_id = %request_id, cell = %cell, value = %value);
}

/// Emit event: poison marker written after a variant mismatch.
pub fn emit_grade_poisoned(request_id: &str, cell: &str, expected: u32, reported: u32) {
    warn!(
        event = "grade.poisoned",
        request_id = %request_id,
        cell = %cell,
        expected = expected,
        reported = reported,
    );
}

/// Emit event: registration request accepted for processing.
pub fn emit_registration_started(request_id: &str, group: &str, github: &str) {
    info!(event = "registration.started", request_id = %request_id, group = %group, github = %github);
}

/// Emit event: registration rejected.
pub fn emit_registration_rejected(request_id: &str, err: &GradeError) {
    log_rejection("registration.rejected", request_id, "registration", err);
}

/// Emit event: GitHub handle written into the roster.
pub fn emit_registration_written(request_id: &str, cell: &str, github: &str) {
    info!(event = "registration.written", request_id = %request_id, cell = %cell, github = %github);
}

fn log_rejection(event: &str, request_id: &str, stage: &str, err: &GradeError) {
    let kind = format!("{:?}", err.kind());
    match err.class() {
        ErrorClass::Configuration | ErrorClass::Transport => error!(
            event = %event,
            request_id = %request_id,
            stage = %stage,
            kind = %kind,
            error = %err,
        ),
        ErrorClass::Integrity => warn!(
            event = %event,
            request_id = %request_id,
            stage = %stage,
            kind = %kind,
            error = %err,
        ),
        _ => info!(
            event = %event,
            request_id = %request_id,
            stage = %stage,
            kind = %kind,
            error = %err,
        ),
    }
}
