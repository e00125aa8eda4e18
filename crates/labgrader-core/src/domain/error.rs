//! Domain-level error taxonomy for labgrader.
//!
//! Every rejection carries exactly one [`RejectionKind`]; kinds group into
//! an [`ErrorClass`] that tells the caller how to react (fix input, treat as
//! "nothing changed", retry later, escalate to a human, page an operator).

use labgrader_state::GatewayError;
use serde::Serialize;

/// Machine-readable reason attached to every rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    LabNotOffered,
    GroupNotFound,
    StudentNotFound,
    RepoNotFound,
    UserNotFound,
    AlreadyGraded,
    DuplicateSameValue,
    AlreadyClaimed,
    CiNotGreen,
    SuspectedTamper,
    WrongVariant,
    MissingTaskId,
    MalformedLog,
    Configuration,
    Transport,
}

/// How a caller should treat a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Bad request data; never retried
    ClientInput,
    /// Nothing changed; the cell already holds a decision
    Conflict,
    /// CI is not finished or not green yet; caller may retry later
    NotReady,
    /// Submission failed an integrity check
    Integrity,
    /// Course configuration defect; fatal for the request
    Configuration,
    /// A collaborator failed; propagated unchanged
    Transport,
}

impl RejectionKind {
    pub fn class(self) -> ErrorClass {
        match self {
            RejectionKind::LabNotOffered
            | RejectionKind::GroupNotFound
            | RejectionKind::StudentNotFound
            | RejectionKind::RepoNotFound
            | RejectionKind::UserNotFound => ErrorClass::ClientInput,
            RejectionKind::AlreadyGraded
            | RejectionKind::DuplicateSameValue
            | RejectionKind::AlreadyClaimed => ErrorClass::Conflict,
            RejectionKind::CiNotGreen => ErrorClass::NotReady,
            RejectionKind::SuspectedTamper
            | RejectionKind::WrongVariant
            | RejectionKind::MissingTaskId
            | RejectionKind::MalformedLog => ErrorClass::Integrity,
            RejectionKind::Configuration => ErrorClass::Configuration,
            RejectionKind::Transport => ErrorClass::Transport,
        }
    }
}

/// Which log field disagreed across bundles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TamperField {
    TaskId,
    GradingReduction,
}

impl std::fmt::Display for TamperField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TamperField::TaskId => write!(f, "TASKID"),
            TamperField::GradingReduction => write!(f, "grading reduction"),
        }
    }
}

/// Labgrader domain errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GradeError {
    #[error("lab {lab} is not offered to group {group}")]
    LabNotOffered { lab: String, group: String },

    #[error("group not found: {0}")]
    GroupNotFound(String),

    #[error("student {student} not found in group {group}")]
    StudentNotFound { group: String, student: String },

    #[error("repository {org}/{repo} not found")]
    RepoNotFound { org: String, repo: String },

    #[error("GitHub user not found: {0}")]
    UserNotFound(String),

    #[error("lab already graded: cell holds {value:?}")]
    AlreadyGraded { value: String },

    #[error("cell already holds the submitted value {value:?}")]
    DuplicateSameValue { value: String },

    #[error("cell already claimed with a different value {existing:?}")]
    AlreadyClaimed { existing: String },

    #[error("CI is not green: {0}")]
    CiNotGreen(String),

    #[error("suspected tampering: log bundles disagree on {field}: {}", values.join(", "))]
    SuspectedTamper { field: TamperField, values: Vec<String> },

    #[error("wrong TASKID: expected variant {expected}, logs report {reported}")]
    WrongVariant { expected: u32, reported: u32 },

    #[error("missing TASKID: {0}")]
    MissingTaskId(String),

    #[error("malformed CI log: {0}")]
    MalformedLog(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("transport error: {0}")]
    Transport(#[from] GatewayError),
}

impl GradeError {
    pub fn kind(&self) -> RejectionKind {
        match self {
            GradeError::LabNotOffered { .. } => RejectionKind::LabNotOffered,
            GradeError::GroupNotFound(_) => RejectionKind::GroupNotFound,
            GradeError::StudentNotFound { .. } => RejectionKind::StudentNotFound,
            GradeError::RepoNotFound { .. } => RejectionKind::RepoNotFound,
            GradeError::UserNotFound(_) => RejectionKind::UserNotFound,
            GradeError::AlreadyGraded { .. } => RejectionKind::AlreadyGraded,
            GradeError::DuplicateSameValue { .. } => RejectionKind::DuplicateSameValue,
            GradeError::AlreadyClaimed { .. } => RejectionKind::AlreadyClaimed,
            GradeError::CiNotGreen(_) => RejectionKind::CiNotGreen,
            GradeError::SuspectedTamper { .. } => RejectionKind::SuspectedTamper,
            GradeError::WrongVariant { .. } => RejectionKind::WrongVariant,
            GradeError::MissingTaskId(_) => RejectionKind::MissingTaskId,
            GradeError::MalformedLog(_) => RejectionKind::MalformedLog,
            GradeError::Configuration(_) => RejectionKind::Configuration,
            GradeError::Transport(_) => RejectionKind::Transport,
        }
    }

    pub fn class(&self) -> ErrorClass {
        self.kind().class()
    }
}

/// Result type for labgrader domain operations.
pub type Result<T> = std::result::Result<T, GradeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_error_display() {
        let err = GradeError::LabNotOffered {
            lab: "ЛР9".to_string(),
            group: "4232".to_string(),
        };
        assert!(err.to_string().contains("not offered"));

        let err = GradeError::AlreadyGraded {
            value: "v-1".to_string(),
        };
        assert!(err.to_string().contains("v-1"));
    }

    #[test]
    fn test_tamper_error_names_field() {
        let err = GradeError::SuspectedTamper {
            field: TamperField::TaskId,
            values: vec!["5".to_string(), "7".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("TASKID"));
        assert!(msg.contains("5, 7"));
    }

    #[test]
    fn test_kind_classes() {
        assert_eq!(RejectionKind::RepoNotFound.class(), ErrorClass::ClientInput);
        assert_eq!(RejectionKind::AlreadyClaimed.class(), ErrorClass::Conflict);
        assert_eq!(RejectionKind::CiNotGreen.class(), ErrorClass::NotReady);
        assert_eq!(RejectionKind::WrongVariant.class(), ErrorClass::Integrity);
        assert_eq!(RejectionKind::MalformedLog.class(), ErrorClass::Integrity);
        assert_eq!(
            RejectionKind::Configuration.class(),
            ErrorClass::Configuration
        );
    }

    #[test]
    fn test_transport_error_wraps_gateway() {
        let err: GradeError = GatewayError::transport("sheets", "timed out").into();
        assert_eq!(err.kind(), RejectionKind::Transport);
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&RejectionKind::SuspectedTamper).unwrap();
        assert_eq!(json, "\"suspected_tamper\"");
    }
}
