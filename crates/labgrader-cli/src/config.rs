//! Application and course configuration.
//!
//! `AppConfig` comes from an optional YAML file, then environment
//! overrides:
//!
//! ```yaml
//! courses-dir: /etc/labgrader/courses
//! log-file: /var/log/labgrader/grader.log
//! github:
//!   token: ghp_xxx
//! ```
//!
//! Course files live in `courses_dir/*.yaml`:
//!
//! ```yaml
//! course:
//!   name: Operating Systems
//!   semester: Spring 2024
//!   timezone: UTC+3
//!   github:
//!     organization: suai-os-2024
//!   google:
//!     spreadsheet: 1BoVLNZpP6Zz
//!     github-column: 3
//!   labs:
//!     ЛР1:
//!       github-prefix: os-task1
//!       taskid-max: 20
//!       penalty-max: 8
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use labgrader_core::{parse_utc_offset, CourseDefinition, LabDefinition, SheetLayout};
use labgrader_gateway::{GithubConfig, SheetsConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

const DEFAULT_TIMEZONE: &str = "UTC+3";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("course not found: {0}")]
    CourseNotFound(String),

    #[error("invalid course {course}: {reason}")]
    Invalid { course: String, reason: String },
}

// ---------------------------------------------------------------------------
// AppConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ServiceSettings {
    /// API base URL override
    pub api_url: Option<String>,
    pub token: Option<String>,
}

/// Process-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AppConfig {
    pub courses_dir: PathBuf,
    /// Grade log appended at `INFO`; no file when unset
    pub log_file: Option<PathBuf>,
    pub github: ServiceSettings,
    pub google: ServiceSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            courses_dir: PathBuf::from("courses"),
            log_file: None,
            github: ServiceSettings::default(),
            google: ServiceSettings::default(),
        }
    }
}

impl AppConfig {
    /// Read `path` if given, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => read_yaml(path)?,
            None => AppConfig::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override from `LABGRADER_COURSES_DIR`, `LABGRADER_LOG_FILE`,
    /// `GITHUB_TOKEN` and `GOOGLE_ACCESS_TOKEN`; empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if let Some(dir) = get("LABGRADER_COURSES_DIR") {
            self.courses_dir = PathBuf::from(dir);
        }
        if let Some(file) = get("LABGRADER_LOG_FILE") {
            self.log_file = Some(PathBuf::from(file));
        }
        if let Some(token) = get("GITHUB_TOKEN") {
            self.github.token = Some(token);
        }
        if let Some(token) = get("GOOGLE_ACCESS_TOKEN") {
            self.google.token = Some(token);
        }
    }

    pub fn github_config(&self) -> GithubConfig {
        let base = match &self.github.api_url {
            Some(url) => GithubConfig::new(url),
            None => GithubConfig::from_env(),
        };
        match &self.github.token {
            Some(token) => base.with_token(token),
            None => base,
        }
    }

    pub fn sheets_config(&self) -> SheetsConfig {
        let base = match &self.google.api_url {
            Some(url) => SheetsConfig::new(url),
            None => SheetsConfig::from_env(),
        };
        match &self.google.token {
            Some(token) => base.with_access_token(token),
            None => base,
        }
    }
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&text).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Course files
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CourseFile {
    pub course: CourseSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CourseSection {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub semester: String,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub github: Option<GithubSection>,
    #[serde(default)]
    pub google: Option<GoogleSection>,
    #[serde(default)]
    pub labs: BTreeMap<String, LabSection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubSection {
    pub organization: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleSection {
    pub spreadsheet: String,
    #[serde(flatten)]
    pub layout: SheetLayout,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LabSection {
    pub github_prefix: String,
    /// Defaults to the map key
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub penalty_max: u32,
    #[serde(default)]
    pub taskid_shift: i64,
    #[serde(default)]
    pub taskid_max: Option<u32>,
    #[serde(default)]
    pub ignore_task_id: Option<bool>,
    #[serde(default)]
    pub ignore_completion_date: bool,
    #[serde(default)]
    pub required_workflows: Vec<String>,
}

impl CourseFile {
    /// Validate and convert into the core's definition. `id` names the
    /// course in error messages.
    pub fn into_definition(self, id: &str) -> Result<CourseDefinition, ConfigError> {
        let invalid = |reason: &str| ConfigError::Invalid {
            course: id.to_string(),
            reason: reason.to_string(),
        };
        let course = self.course;

        let github = course
            .github
            .ok_or_else(|| invalid("missing github.organization"))?;
        let google = course
            .google
            .ok_or_else(|| invalid("missing google.spreadsheet"))?;
        if github.organization.trim().is_empty() {
            return Err(invalid("empty github.organization"));
        }
        if google.spreadsheet.trim().is_empty() {
            return Err(invalid("empty google.spreadsheet"));
        }
        if google.layout.first_lab_column == 0 || google.layout.first_student_row == 0 {
            return Err(invalid("sheet columns and rows are 1-based"));
        }
        if google.layout.max_students == 0 {
            return Err(invalid("google.max-students must be positive"));
        }

        let timezone = course
            .timezone
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        parse_utc_offset(&timezone).map_err(|e| invalid(&e.to_string()))?;

        let labs = course
            .labs
            .into_iter()
            .map(|(key, lab)| {
                let short_name = lab.short_name.unwrap_or(key);
                LabDefinition {
                    short_name,
                    github_prefix: lab.github_prefix,
                    penalty_max: lab.penalty_max,
                    taskid_shift: lab.taskid_shift,
                    taskid_max: lab.taskid_max,
                    ignore_task_id: lab.ignore_task_id,
                    ignore_completion_date: lab.ignore_completion_date,
                    required_workflows: lab.required_workflows,
                }
            })
            .collect();

        Ok(CourseDefinition {
            name: course.name,
            semester: course.semester,
            timezone,
            github_org: github.organization,
            spreadsheet_id: google.spreadsheet,
            layout: google.layout,
            labs,
        })
    }
}

/// Catalogue entry for one course file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseSummary {
    /// File name, e.g. `os-2024.yaml`
    pub id: String,
    pub name: String,
    pub semester: String,
}

/// Summaries of every `*.yaml` course in `dir`, sorted by id.
///
/// A missing directory yields an empty list; files that fail to parse are
/// logged and skipped.
pub fn list_courses(dir: &Path) -> Result<Vec<CourseSummary>, ConfigError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let entries = std::fs::read_dir(dir).map_err(|source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut courses = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("yaml") {
            continue;
        }
        let id = entry.file_name().to_string_lossy().into_owned();
        match read_yaml::<CourseFile>(&path) {
            Ok(file) => courses.push(CourseSummary {
                id,
                name: file.course.name,
                semester: file.course.semester,
            }),
            Err(err) => warn!(file = %id, error = %err, "skipping unreadable course file"),
        }
    }
    courses.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(courses)
}

/// Load course `id` (with or without the `.yaml` suffix) from `dir`.
pub fn load_course(dir: &Path, id: &str) -> Result<CourseDefinition, ConfigError> {
    let file_name = if id.ends_with(".yaml") {
        id.to_string()
    } else {
        format!("{id}.yaml")
    };
    if file_name.contains('/') || file_name.contains('\\') {
        return Err(ConfigError::CourseNotFound(id.to_string()));
    }
    let path = dir.join(&file_name);
    if !path.is_file() {
        return Err(ConfigError::CourseNotFound(id.to_string()));
    }
    read_yaml::<CourseFile>(&path)?.into_definition(&file_name)
}
