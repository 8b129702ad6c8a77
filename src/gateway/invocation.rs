//! Tool Invocations
//!
//! A `ToolInvocation` is the fully resolved description of one process to
//! run. It is built from a profile plus validated input and is not modified
//! afterwards.

use super::profile::{ArgPart, ToolProfile, PROGRAM_PLACEHOLDER, TARGET_PLACEHOLDER};
use super::timeout::ExecutionTimeout;
use super::validator::{validate_shell_value, validate_target, ValidationError};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Shell used for audited pipelines
pub const PIPELINE_SHELL: &str = "/bin/sh";

/// How the process is started
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecSpec {
    /// Direct exec with a discrete argument vector
    Argv { program: PathBuf, args: Vec<String> },
    /// `sh -c <script>`; every interpolated value was validated.
    /// `program` is the tool the script runs, checked before the shell starts.
    Pipeline { program: PathBuf, script: String },
}

/// Resolved {program, args, working dir, timeout} for one execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    tool: String,
    spec: ExecSpec,
    working_dir: Option<PathBuf>,
    timeout: ExecutionTimeout,
}

impl ToolInvocation {
    /// Argument-vector invocation of an explicit program
    pub fn argv<I, S>(tool: &str, program: impl Into<PathBuf>, args: I, timeout: ExecutionTimeout) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tool: tool.to_string(),
            spec: ExecSpec::Argv {
                program: program.into(),
                args: args.into_iter().map(Into::into).collect(),
            },
            working_dir: None,
            timeout,
        }
    }

    /// Shell pipeline rendered from a template.
    ///
    /// `program` fills `{program}`. It and each `(placeholder, value)` pair
    /// are validated before substitution; a single failing value rejects
    /// the whole invocation.
    pub fn pipeline(
        tool: &str,
        template: &str,
        program: impl Into<PathBuf>,
        values: &[(&str, &str)],
        timeout: ExecutionTimeout,
    ) -> Result<Self, ValidationError> {
        let program = program.into();
        let program_text = program.to_string_lossy().into_owned();
        validate_shell_value(&program_text)?;

        let mut script = template.replace(PROGRAM_PLACEHOLDER, &program_text);
        for (placeholder, value) in values {
            validate_shell_value(value)?;
            script = script.replace(placeholder, value);
        }

        Ok(Self {
            tool: tool.to_string(),
            spec: ExecSpec::Pipeline { program, script },
            working_dir: None,
            timeout,
        })
    }

    /// Build the invocation a profile describes for a validated target.
    ///
    /// `options` must already be split by `validate_options`. The target is
    /// re-checked here so no caller can skip validation.
    pub fn from_profile(
        profile: &ToolProfile,
        target: &str,
        options: &[String],
        scratch: Option<&Path>,
    ) -> Result<Self, ValidationError> {
        validate_target(target)?;
        if !options.is_empty() && !profile.accepts_options() {
            return Err(ValidationError::OptionsNotAccepted(profile.id().to_string()));
        }

        let program = resolve_program(profile.program());

        if let Some(template) = profile.pipeline() {
            return Self::pipeline(
                profile.id(),
                template,
                program,
                &[(TARGET_PLACEHOLDER, target)],
                profile.timeout(),
            );
        }

        let mut args = Vec::with_capacity(profile.args().len() + options.len());
        for part in profile.args() {
            match part {
                ArgPart::Literal(value) => args.push(value.clone()),
                ArgPart::Target => args.push(target.to_string()),
                ArgPart::Options => args.extend(options.iter().cloned()),
                ArgPart::Scratch => {
                    // Profiles with {scratch} always get a path from the gateway
                    if let Some(path) = scratch {
                        args.push(path.to_string_lossy().into_owned());
                    }
                }
            }
        }

        Ok(Self::argv(profile.id(), program, args, profile.timeout()))
    }

    /// Run the process in `dir` instead of the gateway's working directory
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn spec(&self) -> &ExecSpec {
        &self.spec
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    pub fn timeout(&self) -> ExecutionTimeout {
        self.timeout
    }

    /// Short form for logs: the program and the argument count
    pub fn summary(&self) -> String {
        match &self.spec {
            ExecSpec::Argv { program, args } => {
                format!("{} ({} args)", program.display(), args.len())
            }
            ExecSpec::Pipeline { .. } => format!("{} -c <pipeline>", PIPELINE_SHELL),
        }
    }
}

/// Resolve a program name to an absolute path through PATH.
///
/// Names that cannot be resolved are returned unchanged; spawning them then
/// fails as a launch failure.
pub fn resolve_program(program: &str) -> PathBuf {
    let path = Path::new(program);
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match which::which(program) {
        Ok(resolved) => resolved,
        Err(e) => {
            debug!("Could not resolve {} on PATH: {}", program, e);
            path.to_path_buf()
        }
    }
}
