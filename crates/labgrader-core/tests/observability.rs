//! Observability tests for grading and registration lifecycle tracing.
//!
//! These tests verify that structured tracing events are emitted for the
//! key lifecycle points: request start, stage transitions, rejection and
//! commit.

use std::sync::Arc;

use chrono::Utc;
use labgrader_core::{
    emit_grade_committed, emit_grade_poisoned, emit_grade_rejected, emit_grade_stage,
    emit_grade_started, emit_registration_rejected, request_span, CourseDefinition, GradeError,
    GradeRequest, Grader, LabDefinition, SheetLayout,
};
use labgrader_state::{MemorySourceHost, MemorySpreadsheet, WorkflowStatus};
use tracing_test::traced_test;

#[traced_test]
#[test]
fn test_emit_grade_started_logs_request() {
    emit_grade_started("req-123", "4232", "ЛР1", "octocat");
    assert!(logs_contain("grade.started"));
    assert!(logs_contain("octocat"));
}

#[traced_test]
#[test]
fn test_emit_grade_stage_logs_stage() {
    emit_grade_stage("req-456", "logs_extracted");
    assert!(logs_contain("logs_extracted"));
}

#[traced_test]
#[test]
fn test_rejection_carries_kind() {
    let err = GradeError::WrongVariant {
        expected: 0,
        reported: 5,
    };
    emit_grade_rejected("req-789", "logs_extracted", &err);
    assert!(logs_contain("grade.rejected"));
    assert!(logs_contain("WrongVariant"));
    assert!(logs_contain("WARN"));
}

#[traced_test]
#[test]
fn test_configuration_rejection_is_error_level() {
    let err = GradeError::Configuration("lab ЛР1 has no positive taskid-max".to_string());
    emit_registration_rejected("req-cfg", &err);
    assert!(logs_contain("registration.rejected"));
    assert!(logs_contain("ERROR"));
}

#[traced_test]
#[test]
fn test_commit_and_poison_events() {
    emit_grade_committed("req-1", "'4232'!D3", "v-1");
    emit_grade_poisoned("req-2", "'4232'!D4", 0, 5);
    assert!(logs_contain("grade.committed"));
    assert!(logs_contain("grade.poisoned"));
}

#[traced_test]
#[test]
fn test_request_span_enter() {
    let span = request_span("req-span", "grade");
    let _entered = span.enter();
    tracing::info!("inside");
    assert!(logs_contain("req-span"));
}

#[traced_test]
#[tokio::test]
async fn test_grader_emits_full_lifecycle() {
    let sheets = Arc::new(MemorySpreadsheet::new());
    sheets.put("s", "4232", 4, 2, "ЛР1");
    sheets.put("s", "4232", 3, 3, "octocat");
    let host = Arc::new(MemorySourceHost::new());
    let repo = host.add_repo("org", "os-task1-octocat", "abc123");
    host.add_run(
        &repo,
        "tests",
        "abc123",
        WorkflowStatus::Completed,
        Some(Utc::now()),
        "2024-05-10T12:00:01Z all good\n",
    );

    let course = CourseDefinition {
        name: "Operating Systems".to_string(),
        semester: "Spring 2024".to_string(),
        timezone: "UTC".to_string(),
        github_org: "org".to_string(),
        spreadsheet_id: "s".to_string(),
        layout: SheetLayout::default(),
        labs: vec![LabDefinition::new("ЛР1", "os-task1").with_ignore_task_id(true)],
    };
    let grader = Grader::new(sheets, host, Arc::new(course));

    let report = grader
        .grade(&GradeRequest::new("4232", "ЛР1", "octocat"))
        .await
        .unwrap();

    assert_eq!(report.value, "v");
    assert!(logs_contain("grade.started"));
    assert!(logs_contain("ci_evaluated"));
    assert!(logs_contain("penalty_applied"));
    assert!(logs_contain("grade.committed"));
    assert!(logs_contain(&report.request_id));
}
