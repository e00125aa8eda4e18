//! CI log extraction.
//!
//! Scans the plain-text log bundle of one workflow run for the two facts
//! the test harness prints, each on its own timestamped line:
//!
//! ```text
//! 2024-05-10T12:00:01.1234567Z TASKID is 7
//! 2024-05-10T12:00:09.7654321Z Grading reduced by 25%
//! ```
//!
//! Reductions may be fractional (`Grading reduced by 12.5%`). A reduction
//! line whose value does not parse is kept as [`LogLine::MalformedReduction`]
//! so the caller can reject it; silently dropping it would grade the
//! submission as if CI asked for no reduction.
//!
//! Extraction is per bundle; agreement across bundles is the engine's job.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::domain::grade::Percent;

const TIMESTAMP: &str = r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?\s+";

fn task_id_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"{TIMESTAMP}TASKID is (\d+)")).expect("TASKID pattern is valid")
    })
}

fn reduction_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"{TIMESTAMP}Grading reduced by\s*(\S*)"))
            .expect("reduction pattern is valid")
    })
}

/// One recognised log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogLine {
    TaskId(u32),
    Reduction(Percent),
    /// `Grading reduced by` followed by something other than `N%` / `N.M%`
    MalformedReduction(String),
}

/// Classify a single log line.
pub fn match_line(line: &str) -> Option<LogLine> {
    let line = line.trim_start_matches('\u{feff}');
    if let Some(caps) = task_id_pattern().captures(line) {
        return caps[1].parse().ok().map(LogLine::TaskId);
    }
    if let Some(caps) = reduction_pattern().captures(line) {
        let raw = &caps[1];
        let parsed = raw.strip_suffix('%').and_then(Percent::parse);
        return Some(match parsed {
            Some(pct) => LogLine::Reduction(pct),
            None => LogLine::MalformedReduction(raw.to_string()),
        });
    }
    None
}

/// Lazy scan over a log bundle. Clone it to restart from the same point.
#[derive(Debug, Clone)]
pub struct LogScan<'a> {
    lines: std::str::Lines<'a>,
}

impl<'a> Iterator for LogScan<'a> {
    type Item = LogLine;

    fn next(&mut self) -> Option<Self::Item> {
        self.lines.by_ref().find_map(match_line)
    }
}

/// Start a scan over `text`.
pub fn scan_log(text: &str) -> LogScan<'_> {
    LogScan {
        lines: text.lines(),
    }
}

/// Facts reported by one log bundle, in order of appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogFacts {
    pub task_ids: Vec<u32>,
    pub reductions: Vec<Percent>,
    /// Raw text of reduction lines that did not parse
    pub malformed: Vec<String>,
}

/// Collect every fact in `text`.
pub fn extract_log_facts(text: &str) -> LogFacts {
    let mut facts = LogFacts::default();
    for line in scan_log(text) {
        match line {
            LogLine::TaskId(id) => facts.task_ids.push(id),
            LogLine::Reduction(pct) => facts.reductions.push(pct),
            LogLine::MalformedReduction(raw) => facts.malformed.push(raw),
        }
    }
    facts
}
