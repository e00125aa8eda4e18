//! Workflow outcome evaluation for the default-branch head.
//!
//! Reduces the workflow runs of a student repository to a [`CiOutcome`]:
//! the completion times and log locators of every run on the head commit.
//! Completion is all-or-nothing; a single pending or failed run on the head
//! commit fails the whole evaluation.

use chrono::{DateTime, Utc};
use labgrader_state::{LogLocator, WorkflowRun, WorkflowStatus};

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Every relevant run completed.
#[derive(Debug, Clone, PartialEq)]
pub struct CiOutcome {
    /// Completion time of each relevant run, in run order.
    pub completed_at: Vec<DateTime<Utc>>,
    /// Log bundle of each relevant run, in run order.
    pub logs: Vec<LogLocator>,
}

impl CiOutcome {
    /// The submission time used for lateness: the last completion.
    pub fn latest(&self) -> Option<DateTime<Utc>> {
        self.completed_at.iter().max().copied()
    }
}

/// Why the head commit is not green.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CiOutcomeError {
    #[error("no workflow runs for head commit {head_sha}")]
    NoRuns { head_sha: String },

    #[error("{} workflow run(s) not completed: [{}]", .runs.len(), .runs.join(", "))]
    PendingOrFailed { runs: Vec<String> },

    #[error("workflow run {run} completed without a completion time")]
    MissingCompletionTime { run: String },

    #[error("required workflow(s) did not run: [{}]", .names.join(", "))]
    MissingWorkflow { names: Vec<String> },
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

/// Evaluate the runs for `head_sha`.
///
/// Runs on other commits are ignored. `required` names workflows that must
/// be among the relevant runs; an empty slice requires nothing beyond at
/// least one run.
pub fn evaluate_workflow_outcome(
    runs: &[WorkflowRun],
    head_sha: &str,
    required: &[String],
) -> Result<CiOutcome, CiOutcomeError> {
    let relevant: Vec<&WorkflowRun> = runs.iter().filter(|r| r.head_sha == head_sha).collect();

    if relevant.is_empty() {
        return Err(CiOutcomeError::NoRuns {
            head_sha: head_sha.to_string(),
        });
    }

    let unfinished: Vec<String> = relevant
        .iter()
        .filter(|r| r.status != WorkflowStatus::Completed)
        .map(|r| format!("{} ({})", r.name, describe(&r.status)))
        .collect();
    if !unfinished.is_empty() {
        return Err(CiOutcomeError::PendingOrFailed { runs: unfinished });
    }

    let missing: Vec<String> = required
        .iter()
        .filter(|name| !relevant.iter().any(|r| &r.name == *name))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(CiOutcomeError::MissingWorkflow { names: missing });
    }

    let mut outcome = CiOutcome {
        completed_at: Vec::with_capacity(relevant.len()),
        logs: Vec::with_capacity(relevant.len()),
    };
    for run in relevant {
        let at = run
            .completed_at
            .ok_or_else(|| CiOutcomeError::MissingCompletionTime {
                run: run.name.clone(),
            })?;
        outcome.completed_at.push(at);
        outcome.logs.push(run.logs.clone());
    }
    Ok(outcome)
}

fn describe(status: &WorkflowStatus) -> &str {
    match status {
        WorkflowStatus::Pending => "pending",
        WorkflowStatus::Completed => "completed",
        WorkflowStatus::Failed => "failed",
        WorkflowStatus::Other(s) => s.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn run(id: u64, name: &str, sha: &str, status: WorkflowStatus, day: u32) -> WorkflowRun {
        WorkflowRun {
            name: name.to_string(),
            head_sha: sha.to_string(),
            status,
            completed_at: Some(Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap()),
            logs: LogLocator {
                owner: "org".to_string(),
                repo: "os-task1-octocat".to_string(),
                run_id: id,
            },
        }
    }

    #[test]
    fn test_all_completed_returns_times_and_logs() {
        let runs = vec![
            run(1, "build", "head", WorkflowStatus::Completed, 3),
            run(2, "grade", "head", WorkflowStatus::Completed, 10),
        ];
        let outcome = evaluate_workflow_outcome(&runs, "head", &[]).unwrap();

        assert_eq!(outcome.completed_at.len(), 2);
        assert_eq!(outcome.logs.len(), 2);
        assert_eq!(
            outcome.latest(),
            Some(Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_runs_on_other_commits_ignored() {
        let runs = vec![
            run(1, "grade", "old", WorkflowStatus::Failed, 1),
            run(2, "grade", "head", WorkflowStatus::Completed, 2),
        ];
        let outcome = evaluate_workflow_outcome(&runs, "head", &[]).unwrap();

        assert_eq!(outcome.logs.len(), 1);
        assert_eq!(outcome.logs[0].run_id, 2);
    }

    #[test]
    fn test_completed_and_failed_is_not_green() {
        let runs = vec![
            run(1, "build", "head", WorkflowStatus::Completed, 3),
            run(2, "grade", "head", WorkflowStatus::Failed, 3),
        ];
        let err = evaluate_workflow_outcome(&runs, "head", &[]).unwrap_err();

        match err {
            CiOutcomeError::PendingOrFailed { runs } => {
                assert_eq!(runs, vec!["grade (failed)".to_string()]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_pending_run_is_not_green() {
        let runs = vec![run(1, "grade", "head", WorkflowStatus::Pending, 3)];
        assert!(matches!(
            evaluate_workflow_outcome(&runs, "head", &[]),
            Err(CiOutcomeError::PendingOrFailed { .. })
        ));
    }

    #[test]
    fn test_cancelled_run_is_not_green() {
        let runs = vec![run(
            1,
            "grade",
            "head",
            WorkflowStatus::Other("cancelled".to_string()),
            3,
        )];
        let err = evaluate_workflow_outcome(&runs, "head", &[]).unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }

    #[test]
    fn test_no_relevant_runs() {
        let runs = vec![run(1, "grade", "old", WorkflowStatus::Completed, 3)];
        assert!(matches!(
            evaluate_workflow_outcome(&runs, "head", &[]),
            Err(CiOutcomeError::NoRuns { .. })
        ));
    }

    #[test]
    fn test_required_workflow_missing() {
        let runs = vec![run(1, "build", "head", WorkflowStatus::Completed, 3)];
        let required = vec!["build".to_string(), "grade".to_string()];
        let err = evaluate_workflow_outcome(&runs, "head", &required).unwrap_err();

        assert_eq!(
            err,
            CiOutcomeError::MissingWorkflow {
                names: vec!["grade".to_string()]
            }
        );
    }

    #[test]
    fn test_completed_without_time() {
        let mut r = run(1, "grade", "head", WorkflowStatus::Completed, 3);
        r.completed_at = None;
        assert!(matches!(
            evaluate_workflow_outcome(&[r], "head", &[]),
            Err(CiOutcomeError::MissingCompletionTime { .. })
        ));
    }
}
