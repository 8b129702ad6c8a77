//! Result Projector
//!
//! Turns captured output into the shape a profile promises. Projection
//! never fails: output that does not match the expected shape comes back
//! tagged so the caller still sees what the tool produced.

use super::executor::ExecutionResult;
use super::profile::OutputFormat;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// Projected tool output
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProjectedOutput {
    /// Stdout passed through unmodified
    Raw { text: String },
    /// Stdout parsed as JSON (a JSON-lines stream becomes an array)
    Json { value: serde_json::Value },
    /// Stdout was expected to be JSON but was not
    ParseFailure { raw: String, error: String },
    /// Trimmed, non-empty lines from the scratch file
    Lines { lines: Vec<String> },
    /// The scratch file the tool should have written is absent
    MissingOutput { reason: String },
}

impl ProjectedOutput {
    pub fn kind(&self) -> &'static str {
        match self {
            ProjectedOutput::Raw { .. } => "raw",
            ProjectedOutput::Json { .. } => "json",
            ProjectedOutput::ParseFailure { .. } => "parse_failure",
            ProjectedOutput::Lines { .. } => "lines",
            ProjectedOutput::MissingOutput { .. } => "missing_output",
        }
    }
}

/// Project an execution result according to `format`.
///
/// For `LinesFromFile` the scratch file is read and then deleted.
pub fn project(result: &ExecutionResult, format: OutputFormat, scratch: Option<&Path>) -> ProjectedOutput {
    match format {
        OutputFormat::Raw => ProjectedOutput::Raw {
            text: result.stdout.clone(),
        },
        OutputFormat::Json => parse_json(&result.stdout),
        OutputFormat::LinesFromFile => match scratch {
            Some(path) => read_lines(path),
            None => ProjectedOutput::MissingOutput {
                reason: "no scratch file was allocated".to_string(),
            },
        },
    }
}

fn parse_json(stdout: &str) -> ProjectedOutput {
    let error = match serde_json::from_str::<serde_json::Value>(stdout) {
        Ok(value) => return ProjectedOutput::Json { value },
        Err(e) => e.to_string(),
    };

    // Several scanners emit one JSON document per line
    let lines: Vec<&str> = stdout.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    if lines.len() > 1 {
        let parsed: Result<Vec<serde_json::Value>, _> =
            lines.iter().map(|line| serde_json::from_str(line)).collect();
        if let Ok(values) = parsed {
            return ProjectedOutput::Json {
                value: serde_json::Value::Array(values),
            };
        }
    }

    debug!("Tool output is not JSON: {}", error);
    ProjectedOutput::ParseFailure {
        raw: stdout.to_string(),
        error,
    }
}

fn read_lines(path: &Path) -> ProjectedOutput {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return ProjectedOutput::MissingOutput {
                reason: format!("tool did not write {}", path.display()),
            };
        }
        Err(e) => {
            warn!("Failed to read scratch file {:?}: {}", path, e);
            return ProjectedOutput::MissingOutput {
                reason: format!("could not read {}: {}", path.display(), e),
            };
        }
    };

    if let Err(e) = fs::remove_file(path) {
        warn!("Failed to remove scratch file {:?}: {}", path, e);
    }

    ProjectedOutput::Lines {
        lines: content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
    }
}
