//! Labgrader Core Library
//!
//! Decides whether a student's lab submission earns a grade, and which one.
//! A decision correlates three sources: the course roster spreadsheet, CI
//! runs on the student's fork, and the plain-text CI logs.

pub mod cell_lock;
pub mod ci_outcome;
pub mod consistency;
pub mod deadline;
pub mod domain;
pub mod engine;
pub mod log_extract;
pub mod obs;
pub mod penalty;
pub mod registration;
pub mod roster;
pub mod telemetry;
pub mod variant;

pub use domain::{
    CellState, CourseDefinition, ErrorClass, GradeError, GradeRequest, GradeValue,
    LabDefinition, Percent, RejectionKind, Result, SubmissionContext, SubmissionSlot,
    TamperField, POISON_MARKER, UNGRADED_MARKER,
};

pub use cell_lock::{CellGuard, CellKey, CellLocks};
pub use ci_outcome::{evaluate_workflow_outcome, CiOutcome, CiOutcomeError};
pub use consistency::all_equal;
pub use deadline::{parse_deadline, parse_utc_offset, DeadlineError};
pub use engine::{GradeReport, GradeStage, Grader};
pub use log_extract::{extract_log_facts, match_line, scan_log, LogFacts, LogLine, LogScan};
pub use penalty::{calculate_penalty, lateness_days};
pub use registration::{
    write_registration_cell, Registrar, RegistrationReport, RegistrationRequest,
};
pub use roster::Roster;
pub use variant::{expected_variant, validate_variant, VariantCheck};

pub use labgrader_state::{
    GatewayError, LogLocator, RepoHandle, SheetLayout, SourceHost, Spreadsheet, WorkflowRun,
    WorkflowStatus, DEFAULT_MAX_STUDENTS,
};

pub use obs::{
    emit_grade_committed, emit_grade_poisoned, emit_grade_rejected, emit_grade_stage,
    emit_grade_started, emit_penalty_computed, emit_registration_rejected,
    emit_registration_started, emit_registration_written, request_span,
};
pub use telemetry::{init_tracing, TelemetryError, TracingConfig, TracingGuard};

/// Labgrader version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
