//! Labgrader - grading decisions for student lab submissions
//!
//! The `labgrader` command checks a student's CI results and writes the
//! grade into the course roster spreadsheet.
//!
//! ## Commands
//!
//! - `courses`: List configured courses
//! - `groups`: List student groups of a course
//! - `labs`: List labs offered to a group
//! - `register`: Bind a GitHub handle to a roster row
//! - `grade`: Grade one or more submissions

mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use labgrader_core::{
    init_tracing, CellLocks, CourseDefinition, ErrorClass, GradeError, GradeReport, GradeRequest,
    Grader, RegistrationReport, RegistrationRequest, Registrar, RejectionKind, Roster, SourceHost,
    Spreadsheet, TracingConfig,
};
use labgrader_gateway::{GithubClient, SheetsClient};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, Level};

use crate::config::{list_courses, load_course, AppConfig, CourseSummary};

#[derive(Parser)]
#[command(name = "labgrader")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Grade student lab submissions from CI results", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Result format on stdout
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Application config file (YAML)
    #[arg(short, long, global = true, env = "LABGRADER_CONFIG")]
    config: Option<PathBuf>,

    /// Append INFO and above to this file (overrides `log-file`)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured courses
    Courses,

    /// List student groups of a course
    Groups {
        /// Course id (file name in the courses directory)
        course: String,
    },

    /// List labs offered to a group
    Labs {
        course: String,
        group: String,
    },

    /// Bind a GitHub handle to a student's roster row
    Register {
        course: String,
        group: String,

        /// Full name as written in the roster
        #[arg(short, long)]
        name: String,

        /// GitHub handle to bind
        #[arg(short, long)]
        github: String,
    },

    /// Grade submissions for a lab
    Grade {
        course: String,
        group: String,

        /// Lab short name
        lab: String,

        /// GitHub handles to grade
        #[arg(required = true)]
        github: Vec<String>,

        /// Serialize requests that target the same cell
        #[arg(long)]
        lock_cells: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config =
        AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(path) = cli.log_file.clone() {
        config.log_file = Some(path);
    }

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let mut tracing_config = TracingConfig::new(cli.json, level);
    if let Some(path) = &config.log_file {
        tracing_config = tracing_config.with_log_file(path);
    }
    let _log_guard = init_tracing(&tracing_config).context("Failed to open log file")?;
    debug!(courses_dir = %config.courses_dir.display(), "configuration loaded");

    let output = match cli.command {
        Commands::Courses => {
            let courses = list_courses(&config.courses_dir)?;
            render_courses(&courses, cli.output)?
        }
        Commands::Groups { course } => {
            let course = load_course(&config.courses_dir, &course)?;
            let (sheets, _) = connect(&config)?;
            let groups = cmd_groups(sheets.as_ref(), &course).await;
            render_listing(groups, cli.output)?
        }
        Commands::Labs { course, group } => {
            let course = load_course(&config.courses_dir, &course)?;
            let (sheets, _) = connect(&config)?;
            let labs = cmd_labs(sheets.as_ref(), &course, &group).await;
            render_listing(labs, cli.output)?
        }
        Commands::Register {
            course,
            group,
            name,
            github,
        } => {
            let course = load_course(&config.courses_dir, &course)?;
            let (sheets, host) = connect(&config)?;
            let registrar = Registrar::new(sheets, host, Arc::new(course));
            let request = RegistrationRequest::new(&group, &name, &github);
            let result = registrar.register(&request).await;
            render_registration(&github, result, cli.output)?
        }
        Commands::Grade {
            course,
            group,
            lab,
            github,
            lock_cells,
        } => {
            let course = load_course(&config.courses_dir, &course)?;
            let (sheets, host) = connect(&config)?;
            let mut grader = Grader::new(sheets, host, Arc::new(course));
            if lock_cells {
                grader = grader.with_cell_locks(Arc::new(CellLocks::new()));
            }
            let outcomes = cmd_grade(Arc::new(grader), &group, &lab, github).await?;
            render_grades(&outcomes, cli.output)?
        }
    };

    println!("{}", output.text);
    Ok(ExitCode::from(output.code))
}

/// Build the live spreadsheet and source-host adapters.
fn connect(config: &AppConfig) -> Result<(Arc<dyn Spreadsheet>, Arc<dyn SourceHost>)> {
    let sheets = SheetsClient::new(config.sheets_config()).context("Failed to create Sheets client")?;
    let github = GithubClient::new(config.github_config()).context("Failed to create GitHub client")?;
    Ok((Arc::new(sheets), Arc::new(github)))
}

// ---------------------------------------------------------------------------
// Exit codes
// ---------------------------------------------------------------------------

/// Process exit code for a rejection class.
fn exit_code(class: ErrorClass) -> u8 {
    match class {
        ErrorClass::ClientInput => 2,
        ErrorClass::Conflict => 3,
        ErrorClass::NotReady => 4,
        ErrorClass::Integrity => 5,
        ErrorClass::Configuration => 6,
        ErrorClass::Transport => 7,
    }
}

/// Rendered command result.
#[derive(Debug)]
struct Output {
    text: String,
    code: u8,
}

impl Output {
    fn ok(text: String) -> Self {
        Self { text, code: 0 }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_groups(sheets: &dyn Spreadsheet, course: &CourseDefinition) -> Result<Vec<String>, GradeError> {
    Roster::new(sheets, course).groups().await
}

async fn cmd_labs(
    sheets: &dyn Spreadsheet,
    course: &CourseDefinition,
    group: &str,
) -> Result<Vec<String>, GradeError> {
    let roster = Roster::new(sheets, course);
    roster.require_group(group).await?;
    let columns = roster.lab_columns(group).await?;
    Ok(columns
        .into_iter()
        .filter(|(name, _)| course.lab(name).is_some())
        .map(|(name, _)| name)
        .collect())
}

/// Outcome of grading one handle.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum GradeOutcome {
    Graded(GradeReport),
    Rejected(Rejection),
}

#[derive(Debug, Serialize)]
struct Rejection {
    #[serde(skip_serializing_if = "Option::is_none")]
    github: Option<String>,
    kind: RejectionKind,
    class: ErrorClass,
    message: String,
}

impl Rejection {
    fn new(github: Option<&str>, err: &GradeError) -> Self {
        Self {
            github: github.map(str::to_string),
            kind: err.kind(),
            class: err.class(),
            message: err.to_string(),
        }
    }
}

/// Grade every handle concurrently; outcomes keep the argument order.
async fn cmd_grade(
    grader: Arc<Grader>,
    group: &str,
    lab: &str,
    handles: Vec<String>,
) -> Result<Vec<GradeOutcome>> {
    let mut set = JoinSet::new();
    for (index, github) in handles.into_iter().enumerate() {
        let grader = Arc::clone(&grader);
        let request = GradeRequest::new(group, lab, &github);
        set.spawn(async move {
            let outcome = match grader.grade(&request).await {
                Ok(report) => GradeOutcome::Graded(report),
                Err(err) => GradeOutcome::Rejected(Rejection::new(Some(&github), &err)),
            };
            (index, outcome)
        });
    }

    let mut outcomes = Vec::with_capacity(set.len());
    while let Some(joined) = set.join_next().await {
        outcomes.push(joined.context("grading task panicked")?);
    }
    outcomes.sort_by_key(|(index, _)| *index);
    Ok(outcomes.into_iter().map(|(_, outcome)| outcome).collect())
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render_courses(courses: &[CourseSummary], format: OutputFormat) -> Result<Output> {
    let text = match format {
        OutputFormat::Json => serde_json::to_string_pretty(courses)?,
        OutputFormat::Text if courses.is_empty() => "No courses configured.".to_string(),
        OutputFormat::Text => courses
            .iter()
            .map(|c| format!("{}\t{}\t{}", c.id, c.name, c.semester))
            .collect::<Vec<_>>()
            .join("\n"),
    };
    Ok(Output::ok(text))
}

fn render_listing(items: Result<Vec<String>, GradeError>, format: OutputFormat) -> Result<Output> {
    match items {
        Ok(items) => {
            let text = match format {
                OutputFormat::Json => serde_json::to_string_pretty(&items)?,
                OutputFormat::Text => items.join("\n"),
            };
            Ok(Output::ok(text))
        }
        Err(err) => render_rejection(&Rejection::new(None, &err), format),
    }
}

fn render_rejection(rejection: &Rejection, format: OutputFormat) -> Result<Output> {
    let text = match format {
        OutputFormat::Json => serde_json::to_string_pretty(rejection)?,
        OutputFormat::Text => format!("error: {}", rejection.message),
    };
    Ok(Output {
        text,
        code: exit_code(rejection.class),
    })
}

fn render_registration(
    github: &str,
    result: Result<RegistrationReport, GradeError>,
    format: OutputFormat,
) -> Result<Output> {
    match result {
        Ok(report) => {
            let text = match format {
                OutputFormat::Json => serde_json::to_string_pretty(&report)?,
                OutputFormat::Text => format!(
                    "Registered {} in group {} ({})",
                    report.github, report.group, report.cell
                ),
            };
            Ok(Output::ok(text))
        }
        Err(err) => render_rejection(&Rejection::new(Some(github), &err), format),
    }
}

/// The exit code follows the first rejected handle.
fn render_grades(outcomes: &[GradeOutcome], format: OutputFormat) -> Result<Output> {
    let code = outcomes
        .iter()
        .find_map(|o| match o {
            GradeOutcome::Rejected(r) => Some(exit_code(r.class)),
            GradeOutcome::Graded(_) => None,
        })
        .unwrap_or(0);

    let text = match format {
        OutputFormat::Json => serde_json::to_string_pretty(outcomes)?,
        OutputFormat::Text => outcomes
            .iter()
            .map(|o| match o {
                GradeOutcome::Graded(r) => format!("{}: {} -> {}", r.github, r.value, r.cell),
                GradeOutcome::Rejected(r) => format!(
                    "{}: rejected ({:?}): {}",
                    r.github.as_deref().unwrap_or("-"),
                    r.kind,
                    r.message
                ),
            })
            .collect::<Vec<_>>()
            .join("\n"),
    };
    Ok(Output { text, code })
}

#[cfg(test)]
mod tests {
    use super::*;
    use labgrader_core::{LabDefinition, SheetLayout, WorkflowStatus};
    use labgrader_state::{MemorySourceHost, MemorySpreadsheet};

    const SHEET: &str = "roster";
    const ORG: &str = "suai-os-2024";
    const GROUP: &str = "4232";

    fn course() -> CourseDefinition {
        CourseDefinition {
            name: "Operating Systems".to_string(),
            semester: "Spring 2024".to_string(),
            timezone: "UTC".to_string(),
            github_org: ORG.to_string(),
            spreadsheet_id: SHEET.to_string(),
            layout: SheetLayout::default(),
            labs: vec![LabDefinition::new("ЛР1", "os-task1").with_ignore_task_id(true)],
        }
    }

    fn roster() -> Arc<MemorySpreadsheet> {
        let sheets = Arc::new(MemorySpreadsheet::new());
        sheets.put(SHEET, GROUP, 4, 2, "ЛР1");
        sheets.put(SHEET, GROUP, 5, 2, "ЛР9");
        sheets.put(SHEET, GROUP, 2, 3, "Ivanov Ivan");
        sheets.put(SHEET, GROUP, 3, 3, "octocat");
        sheets.put(SHEET, GROUP, 2, 4, "Petrov Petr");
        sheets.put(SHEET, GROUP, 3, 4, "hubot");
        sheets.add_sheet(SHEET, "4233");
        sheets
    }

    fn host() -> Arc<MemorySourceHost> {
        let host = Arc::new(MemorySourceHost::new());
        let repo = host.add_repo(ORG, "os-task1-octocat", "c0ffee");
        host.add_run(
            &repo,
            "tests",
            "c0ffee",
            WorkflowStatus::Completed,
            Some("2024-05-10T12:00:00Z".parse().unwrap()),
            "ok\n",
        );
        host
    }

    #[test]
    fn test_exit_codes_are_distinct() {
        let classes = [
            ErrorClass::ClientInput,
            ErrorClass::Conflict,
            ErrorClass::NotReady,
            ErrorClass::Integrity,
            ErrorClass::Configuration,
            ErrorClass::Transport,
        ];
        let mut codes: Vec<u8> = classes.iter().map(|c| exit_code(*c)).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), classes.len());
        assert!(!codes.contains(&0));
        assert!(!codes.contains(&1));
    }

    #[tokio::test]
    async fn test_groups_and_labs() {
        let sheets = roster();
        let course = course();

        let groups = cmd_groups(sheets.as_ref(), &course).await.unwrap();
        assert!(groups.contains(&GROUP.to_string()));
        assert!(groups.contains(&"4233".to_string()));

        // ЛР9 has a column but no configuration
        let labs = cmd_labs(sheets.as_ref(), &course, GROUP).await.unwrap();
        assert_eq!(labs, vec!["ЛР1".to_string()]);

        let err = cmd_labs(sheets.as_ref(), &course, "9999").await.unwrap_err();
        let output = render_listing(Err(err), OutputFormat::Text).unwrap();
        assert_eq!(output.code, exit_code(ErrorClass::ClientInput));
    }

    #[tokio::test]
    async fn test_grade_keeps_argument_order() {
        let sheets = roster();
        let grader = Grader::new(sheets.clone(), host(), Arc::new(course()))
            .with_current_year(2024)
            .with_cell_locks(Arc::new(CellLocks::new()));

        let outcomes = cmd_grade(
            Arc::new(grader),
            GROUP,
            "ЛР1",
            vec!["hubot".to_string(), "octocat".to_string()],
        )
        .await
        .unwrap();

        assert!(matches!(
            &outcomes[0],
            GradeOutcome::Rejected(r) if r.github.as_deref() == Some("hubot") && r.kind == RejectionKind::RepoNotFound
        ));
        assert!(matches!(
            &outcomes[1],
            GradeOutcome::Graded(r) if r.github == "octocat" && r.value == "v"
        ));
        assert_eq!(sheets.cell(SHEET, GROUP, 4, 3).as_deref(), Some("v"));

        let output = render_grades(&outcomes, OutputFormat::Text).unwrap();
        assert_eq!(output.code, exit_code(ErrorClass::ClientInput));
        assert!(output.text.contains("octocat: v -> '4232'!D3"));
    }

    #[tokio::test]
    async fn test_grade_json_output() {
        let grader = Grader::new(roster(), host(), Arc::new(course())).with_current_year(2024);
        let outcomes = cmd_grade(Arc::new(grader), GROUP, "ЛР1", vec!["octocat".to_string()])
            .await
            .unwrap();

        let output = render_grades(&outcomes, OutputFormat::Json).unwrap();
        assert_eq!(output.code, 0);
        let json: serde_json::Value = serde_json::from_str(&output.text).unwrap();
        assert_eq!(json[0]["status"], "graded");
        assert_eq!(json[0]["value"], "v");
        assert_eq!(json[0]["cell"], "'4232'!D3");
    }

    #[tokio::test]
    async fn test_register_conflict_exit_code() {
        let host = Arc::new(MemorySourceHost::new());
        host.add_user("hubot");
        let registrar = Registrar::new(roster(), host, Arc::new(course()));
        let result = registrar
            .register(&RegistrationRequest::new(GROUP, "Petrov Petr", "hubot"))
            .await;

        let output = render_registration("hubot", result, OutputFormat::Json).unwrap();
        assert_eq!(output.code, exit_code(ErrorClass::Conflict));
        let json: serde_json::Value = serde_json::from_str(&output.text).unwrap();
        assert_eq!(json["kind"], "duplicate_same_value");
        assert_eq!(json["class"], "conflict");
    }

    #[test]
    fn test_log_file_flag_is_global() {
        let cli = Cli::try_parse_from(["labgrader", "courses", "--log-file", "logs/grader.log"])
            .unwrap();
        assert_eq!(cli.log_file, Some(PathBuf::from("logs/grader.log")));

        let cli = Cli::try_parse_from(["labgrader", "courses"]).unwrap();
        assert_eq!(cli.log_file, None);
    }

    #[test]
    fn test_render_empty_courses() {
        let output = render_courses(&[], OutputFormat::Text).unwrap();
        assert_eq!(output.code, 0);
        assert_eq!(output.text, "No courses configured.");
    }
}
