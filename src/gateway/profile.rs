//! Tool Profiles
//!
//! A profile fixes, per tool, the argument template, how its output is read
//! back, and how long it may run. Profiles are built once at startup and are
//! read-only afterwards.

use super::timeout::ExecutionTimeout;
use crate::config::ToolConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Placeholder replaced by the validated scan target.
pub const TARGET_PLACEHOLDER: &str = "{target}";
/// Placeholder replaced by zero or more validated option arguments.
pub const OPTIONS_PLACEHOLDER: &str = "{options}";
/// Placeholder replaced by the per-invocation scratch file path.
pub const SCRATCH_PLACEHOLDER: &str = "{scratch}";
/// Placeholder replaced by the resolved executable inside a pipeline.
pub const PROGRAM_PLACEHOLDER: &str = "{program}";

/// How a tool's output is turned into a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Captured stdout, unmodified
    Raw,
    /// Stdout parsed as JSON
    Json,
    /// Lines read from the scratch file the tool wrote
    LinesFromFile,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "raw" => Some(Self::Raw),
            "json" => Some(Self::Json),
            "lines-from-file" | "lines" => Some(Self::LinesFromFile),
            _ => None,
        }
    }
}

/// One element of an argument template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgPart {
    Literal(String),
    Target,
    Options,
    Scratch,
}

impl ArgPart {
    /// Parse a template element. Placeholders must stand alone.
    pub fn parse(tool: &str, raw: &str) -> Result<Self, ProfileError> {
        match raw {
            TARGET_PLACEHOLDER => Ok(Self::Target),
            OPTIONS_PLACEHOLDER => Ok(Self::Options),
            SCRATCH_PLACEHOLDER => Ok(Self::Scratch),
            _ if raw.contains('{') || raw.contains('}') => Err(ProfileError::UnknownPlaceholder {
                tool: tool.to_string(),
                arg: raw.to_string(),
            }),
            _ => Ok(Self::Literal(raw.to_string())),
        }
    }
}

/// Error types for profile construction
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    #[error("tool '{0}' has an empty program")]
    EmptyProgram(String),

    #[error("tool '{tool}' uses unknown placeholder in '{arg}'")]
    UnknownPlaceholder { tool: String, arg: String },

    #[error("tool '{0}' never references {{target}}")]
    MissingTarget(String),

    #[error("tool '{0}' reads lines from file but never references {{scratch}}")]
    MissingScratch(String),

    #[error("tool '{0}' uses {{options}} but does not accept options")]
    OptionsNotEnabled(String),

    #[error("tool '{0}' is not built in and has no program/args configured")]
    IncompleteDefinition(String),

    #[error("tool '{tool}' has unknown output format '{format}'")]
    UnknownFormat { tool: String, format: String },

    #[error("tool id '{0}' must be alphanumerics, '-' or '_'")]
    InvalidId(String),
}

/// Static per-tool configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ToolProfile {
    id: String,
    program: String,
    args: Vec<ArgPart>,
    pipeline: Option<String>,
    format: OutputFormat,
    timeout: ExecutionTimeout,
    accepts_options: bool,
}

impl ToolProfile {
    /// Create an argv profile from a template such as `["-u", "{target}"]`.
    pub fn new(
        id: &str,
        program: &str,
        args: &[&str],
        format: OutputFormat,
        timeout: ExecutionTimeout,
    ) -> Result<Self, ProfileError> {
        let args = args
            .iter()
            .map(|raw| ArgPart::parse(id, raw))
            .collect::<Result<Vec<_>, _>>()?;

        let profile = Self {
            id: id.to_string(),
            program: program.to_string(),
            args,
            pipeline: None,
            format,
            timeout,
            accepts_options: false,
        };
        profile.check()?;
        Ok(profile)
    }

    /// Allow a free-form option blob, expanded at `{options}`.
    ///
    /// Overrides loaded from config are checked for this pairing; built-in
    /// profiles set it explicitly.
    pub fn with_options(mut self) -> Self {
        self.accepts_options = true;
        self
    }

    /// Run through `sh -c` with an audited template instead of an argv.
    ///
    /// The template may reference `{target}` and `{program}` only; both
    /// values are validated before interpolation.
    pub fn with_pipeline(mut self, template: &str) -> Result<Self, ProfileError> {
        self.pipeline = Some(template.to_string());
        self.check()?;
        Ok(self)
    }

    fn check(&self) -> Result<(), ProfileError> {
        if !is_valid_id(&self.id) {
            return Err(ProfileError::InvalidId(self.id.clone()));
        }
        if self.program.trim().is_empty() {
            return Err(ProfileError::EmptyProgram(self.id.clone()));
        }

        if let Some(template) = &self.pipeline {
            let stripped = template
                .replace(TARGET_PLACEHOLDER, "")
                .replace(PROGRAM_PLACEHOLDER, "");
            if stripped.contains('{') || stripped.contains('}') {
                return Err(ProfileError::UnknownPlaceholder {
                    tool: self.id.clone(),
                    arg: template.clone(),
                });
            }
            if !template.contains(TARGET_PLACEHOLDER) {
                return Err(ProfileError::MissingTarget(self.id.clone()));
            }
            if self.format == OutputFormat::LinesFromFile {
                return Err(ProfileError::MissingScratch(self.id.clone()));
            }
            return Ok(());
        }

        if !self.args.contains(&ArgPart::Target) {
            return Err(ProfileError::MissingTarget(self.id.clone()));
        }
        if self.format == OutputFormat::LinesFromFile && !self.needs_scratch() {
            return Err(ProfileError::MissingScratch(self.id.clone()));
        }
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[ArgPart] {
        &self.args
    }

    pub fn pipeline(&self) -> Option<&str> {
        self.pipeline.as_deref()
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn timeout(&self) -> ExecutionTimeout {
        self.timeout
    }

    pub fn accepts_options(&self) -> bool {
        self.accepts_options
    }

    /// Whether each invocation needs its own scratch file
    pub fn needs_scratch(&self) -> bool {
        self.pipeline.is_none() && self.args.contains(&ArgPart::Scratch)
    }

    /// Apply a config override on top of this profile.
    fn apply(&self, overrides: &ToolConfig) -> Result<Self, ProfileError> {
        let mut profile = self.clone();

        if let Some(program) = &overrides.program {
            profile.program = program.clone();
        }
        if let Some(args) = &overrides.args {
            profile.args = args
                .iter()
                .map(|raw| ArgPart::parse(&profile.id, raw))
                .collect::<Result<Vec<_>, _>>()?;
        }
        if let Some(format) = &overrides.format {
            profile.format = OutputFormat::parse(format).ok_or_else(|| {
                ProfileError::UnknownFormat {
                    tool: profile.id.clone(),
                    format: format.clone(),
                }
            })?;
        }
        if let Some(secs) = overrides.timeout_secs {
            profile.timeout = ExecutionTimeout::from_secs(secs);
        }
        if let Some(accepts) = overrides.accepts_options {
            profile.accepts_options = accepts;
        }
        if let Some(pipeline) = &overrides.pipeline {
            profile.pipeline = Some(pipeline.clone());
        }

        profile.check()?;
        profile.check_options()?;
        Ok(profile)
    }

    fn check_options(&self) -> Result<(), ProfileError> {
        if self.args.contains(&ArgPart::Options) && !self.accepts_options {
            return Err(ProfileError::OptionsNotEnabled(self.id.clone()));
        }
        Ok(())
    }
}

/// Tool ids become scratch file name prefixes and URL path segments.
fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Lookup-only public view of a profile, used for listings
#[derive(Debug, Clone, Serialize)]
pub struct ProfileSummary {
    pub id: String,
    pub program: String,
    pub format: OutputFormat,
    pub timeout_secs: u64,
    pub accepts_options: bool,
    pub pipeline: bool,
}

impl From<&ToolProfile> for ProfileSummary {
    fn from(profile: &ToolProfile) -> Self {
        Self {
            id: profile.id.clone(),
            program: profile.program.clone(),
            format: profile.format,
            timeout_secs: profile.timeout.duration().as_secs(),
            accepts_options: profile.accepts_options,
            pipeline: profile.pipeline.is_some(),
        }
    }
}

/// Registry of all tool profiles, keyed by tool id
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, ToolProfile>,
}

impl ProfileRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in scanner profiles
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for profile in builtin_profiles() {
            registry.insert(profile);
        }
        registry
    }

    /// Built-in profiles with config overrides and additional tools applied
    pub fn with_overrides(tools: &HashMap<String, ToolConfig>) -> Result<Self, ProfileError> {
        let mut registry = Self::builtin();

        for (id, overrides) in tools {
            let profile = match registry.get(id) {
                Some(existing) => existing.apply(overrides)?,
                None => {
                    let program = match overrides.program.as_deref() {
                        Some(program) if overrides.args.is_some() || overrides.pipeline.is_some() => {
                            program
                        }
                        _ => return Err(ProfileError::IncompleteDefinition(id.clone())),
                    };
                    let base = ToolProfile {
                        id: id.clone(),
                        program: program.to_string(),
                        args: Vec::new(),
                        pipeline: None,
                        format: OutputFormat::Raw,
                        timeout: ExecutionTimeout::default(),
                        accepts_options: false,
                    };
                    base.apply(overrides)?
                }
            };
            registry.insert(profile);
        }

        Ok(registry)
    }

    /// Insert or replace a profile
    pub fn insert(&mut self, profile: ToolProfile) {
        self.profiles.insert(profile.id.clone(), profile);
    }

    pub fn get(&self, id: &str) -> Option<&ToolProfile> {
        self.profiles.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.profiles.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    pub fn summaries(&self) -> Vec<ProfileSummary> {
        self.profiles.values().map(ProfileSummary::from).collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

fn builtin_profiles() -> Vec<ToolProfile> {
    use OutputFormat::*;

    let secs = ExecutionTimeout::from_secs;
    let table: [(&str, &str, &[&str], OutputFormat, ExecutionTimeout); 12] = [
        ("nuclei", "nuclei", &["-u", "{target}"], Raw, secs(600)),
        ("nikto", "nikto", &["-h", "{target}"], Raw, secs(600)),
        ("dalfox", "dalfox", &["url", "{target}", "--format", "json"], Json, secs(300)),
        ("xsstrike", "xsstrike", &["-u", "{target}", "--crawl", "--skip"], Raw, secs(300)),
        ("nmap-quick", "nmap", &["-F", "{target}"], Raw, secs(300)),
        ("nmap-ports", "nmap", &["-p-", "{target}"], Raw, ExecutionTimeout::long()),
        ("nmap-os", "nmap", &["-O", "{target}"], Raw, secs(600)),
        ("nmap-custom", "nmap", &["{options}", "{target}"], Raw, ExecutionTimeout::long()),
        ("dig", "dig", &["{target}", "ANY", "+short"], Raw, ExecutionTimeout::short()),
        ("sublist3r", "sublist3r", &["-d", "{target}", "-o", "{scratch}"], LinesFromFile, secs(600)),
        (
            "amass",
            "amass",
            &["enum", "-passive", "-d", "{target}", "-o", "{scratch}"],
            LinesFromFile,
            secs(900),
        ),
        ("gau", "gau", &["--o", "{scratch}", "{target}"], LinesFromFile, secs(600)),
    ];

    let mut profiles = Vec::with_capacity(table.len() + 1);
    for (id, program, args, format, timeout) in table {
        match ToolProfile::new(id, program, args, format, timeout) {
            Ok(profile) if id == "nmap-custom" => profiles.push(profile.with_options()),
            Ok(profile) => profiles.push(profile),
            Err(e) => tracing::error!("Invalid built-in profile {}: {}", id, e),
        }
    }

    match ToolProfile::new("hakrawler", "hakrawler", &["{target}"], Raw, secs(300))
        .and_then(|p| p.with_pipeline("echo {target} | {program} -subs"))
    {
        Ok(profile) => profiles.push(profile),
        Err(e) => tracing::error!("Invalid built-in profile hakrawler: {}", e),
    }

    profiles
}
