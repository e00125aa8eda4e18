//! Course and lab definitions, resolved from course configuration.

use labgrader_state::SheetLayout;
use serde::{Deserialize, Serialize};

/// Immutable definition of one lab within a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabDefinition {
    /// Short name, unique per course; matches the lab header cell.
    pub short_name: String,

    /// Student repositories are named `{github_prefix}-{github}`.
    pub github_prefix: String,

    /// Cap on the lateness penalty.
    pub penalty_max: u32,

    /// Added to the roster task id before the modulus.
    pub taskid_shift: i64,

    /// Number of task variants. Required when task-id checking is on.
    pub taskid_max: Option<u32>,

    /// `Some(true)` disables task-id checking; absent means check.
    pub ignore_task_id: Option<bool>,

    /// Hide the lateness penalty from the grade cell.
    pub ignore_completion_date: bool,

    /// Workflows that must have run on the head commit.
    pub required_workflows: Vec<String>,
}

impl LabDefinition {
    pub fn new(short_name: &str, github_prefix: &str) -> Self {
        Self {
            short_name: short_name.to_string(),
            github_prefix: github_prefix.to_string(),
            penalty_max: 0,
            taskid_shift: 0,
            taskid_max: None,
            ignore_task_id: None,
            ignore_completion_date: false,
            required_workflows: Vec::new(),
        }
    }

    pub fn with_penalty_max(mut self, penalty_max: u32) -> Self {
        self.penalty_max = penalty_max;
        self
    }

    pub fn with_taskid(mut self, shift: i64, max: u32) -> Self {
        self.taskid_shift = shift;
        self.taskid_max = Some(max);
        self
    }

    pub fn with_ignore_task_id(mut self, ignore: bool) -> Self {
        self.ignore_task_id = Some(ignore);
        self
    }

    pub fn with_ignore_completion_date(mut self, ignore: bool) -> Self {
        self.ignore_completion_date = ignore;
        self
    }

    pub fn with_required_workflow(mut self, name: &str) -> Self {
        self.required_workflows.push(name.to_string());
        self
    }

    /// Whether the reported task variant must be validated.
    pub fn checks_task_id(&self) -> bool {
        !self.ignore_task_id.unwrap_or(false)
    }

    /// Expected repository name for a student.
    pub fn repo_name(&self, github: &str) -> String {
        format!("{}-{}", self.github_prefix, github)
    }
}

/// Everything the grading core needs to know about a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseDefinition {
    pub name: String,
    pub semester: String,
    /// Timezone deadlines are expressed in, e.g. `UTC+3`.
    pub timezone: String,
    /// GitHub organization hosting student forks.
    pub github_org: String,
    /// Roster spreadsheet id.
    pub spreadsheet_id: String,
    pub layout: SheetLayout,
    pub labs: Vec<LabDefinition>,
}

impl CourseDefinition {
    /// Look up a lab by short name.
    pub fn lab(&self, short_name: &str) -> Option<&LabDefinition> {
        self.labs.iter().find(|l| l.short_name == short_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checks_task_id_defaults_on() {
        let lab = LabDefinition::new("ЛР1", "os-task1");
        assert!(lab.checks_task_id());
        assert!(lab.clone().with_ignore_task_id(false).checks_task_id());
        assert!(!lab.with_ignore_task_id(true).checks_task_id());
    }

    #[test]
    fn test_repo_name() {
        let lab = LabDefinition::new("ЛР1", "os-task1");
        assert_eq!(lab.repo_name("octocat"), "os-task1-octocat");
    }

    #[test]
    fn test_course_lab_lookup() {
        let course = CourseDefinition {
            name: "Operating Systems".to_string(),
            semester: "Spring 2024".to_string(),
            timezone: "UTC+3".to_string(),
            github_org: "suai-os-2024".to_string(),
            spreadsheet_id: "sheet".to_string(),
            layout: SheetLayout::default(),
            labs: vec![LabDefinition::new("ЛР1", "os-task1")],
        };
        assert!(course.lab("ЛР1").is_some());
        assert!(course.lab("ЛР2").is_none());
    }
}
