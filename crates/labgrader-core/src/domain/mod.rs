//! Domain models for labgrader.
//!
//! Canonical definitions for the core entities:
//! - `LabDefinition` / `CourseDefinition`: resolved course configuration
//! - `SubmissionContext`: roster facts for one grading request
//! - `GradeValue`: the value written into a grade cell
//! - `GradeError`: the rejection taxonomy

pub mod error;
pub mod grade;
pub mod lab;
pub mod submission;

// Re-export main types and errors
pub use error::{ErrorClass, GradeError, RejectionKind, Result, TamperField};
pub use grade::{CellState, GradeValue, Percent, POISON_MARKER, UNGRADED_MARKER};
pub use lab::{CourseDefinition, LabDefinition};
pub use submission::{GradeRequest, SubmissionContext, SubmissionSlot};
