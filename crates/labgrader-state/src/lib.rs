//! Labgrader-State: collaborator contracts for the grading core
//!
//! This crate defines the narrow interfaces through which the grading
//! engine talks to the outside world. It does no I/O itself.
//!
//! ## Layer 0 - Collaborators
//!
//! Focus: typed ranges, typed CI records, one error taxonomy for transports.
//!
//! ## Key Components
//!
//! - `Spreadsheet`: roster and grade-table access
//! - `SourceHost`: repositories, workflow runs and log bundles
//! - `A1Range`: spreadsheet ranges in A1 notation
//! - `fakes`: in-memory implementations for tests

pub mod a1;
mod error;
pub mod fakes;
pub mod gateway_traits;

pub use a1::{column_index, column_letters, A1Range, CellRef};
pub use error::{A1Error, GatewayError};
pub use fakes::{CellWrite, MemorySourceHost, MemorySpreadsheet};
pub use gateway_traits::{
    GatewayResult, LogLocator, RepoHandle, SheetLayout, SourceHost, Spreadsheet, WorkflowRun,
    WorkflowStatus, DEFAULT_MAX_STUDENTS,
};
