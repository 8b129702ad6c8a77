//! Input Validation Module
//!
//! Every user-supplied string that can end up in a process argument list
//! passes through here first. The check is a strict allow-list: a string is
//! either accepted as-is or rejected. Nothing is stripped or escaped.

/// Characters that are rejected unconditionally, wherever the value is used.
pub const FORBIDDEN_CHARS: [char; 8] = [';', '&', '`', '$', '|', '>', '<', '\n'];

/// Error types for input validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is empty")]
    Empty(&'static str),

    #[error("{field} contains shell metacharacter {ch:?}")]
    ShellMetacharacter { field: &'static str, ch: char },

    #[error("{field} contains disallowed character {ch:?}")]
    DisallowedCharacter { field: &'static str, ch: char },

    #[error("target must be a single argument (contains whitespace)")]
    TargetWhitespace,

    #[error("target must not start with '-': '{0}'")]
    LeadingDash(String),

    #[error("tool '{0}' does not accept options")]
    OptionsNotAccepted(String),
}

/// Returns true for characters in the argument grammar.
///
/// Alphanumerics, `-`, `.`, `/`, `_`, `:` and, when `allow_whitespace` is
/// set, space and tab as argument separators.
fn is_allowed_char(ch: char, allow_whitespace: bool) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(ch, '-' | '.' | '/' | '_' | ':')
        || (allow_whitespace && matches!(ch, ' ' | '\t'))
}

fn check_grammar(
    input: &str,
    field: &'static str,
    allow_whitespace: bool,
) -> Result<(), ValidationError> {
    check_metacharacters(input, field)?;

    if let Some(ch) = input.chars().find(|&c| !is_allowed_char(c, allow_whitespace)) {
        return Err(ValidationError::DisallowedCharacter { field, ch });
    }

    Ok(())
}

fn check_metacharacters(input: &str, field: &'static str) -> Result<(), ValidationError> {
    match input.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        Some(ch) => Err(ValidationError::ShellMetacharacter { field, ch }),
        None => Ok(()),
    }
}

/// Boolean form of the grammar check for option blobs.
///
/// Accepts the empty string.
pub fn is_safe_argument(input: &str) -> bool {
    check_grammar(input, "argument", true).is_ok()
}

/// Validate a scan target (host, domain or URL).
///
/// A target becomes exactly one argv element, so whitespace is rejected
/// along with the metacharacters. A leading `-` is rejected so the target
/// can never be parsed as a flag by the tool.
pub fn validate_target(target: &str) -> Result<(), ValidationError> {
    if target.is_empty() {
        return Err(ValidationError::Empty("target"));
    }

    // Metacharacters first so the error names the dangerous character
    check_metacharacters(target, "target")?;
    if target.chars().any(|c| c == ' ' || c == '\t') {
        return Err(ValidationError::TargetWhitespace);
    }
    check_grammar(target, "target", false)?;

    if target.starts_with('-') {
        return Err(ValidationError::LeadingDash(target.to_string()));
    }

    Ok(())
}

/// Validate an option blob and split it into argv elements.
///
/// The empty string is legal and yields no arguments.
pub fn validate_options(options: &str) -> Result<Vec<String>, ValidationError> {
    check_grammar(options, "options", true)?;
    Ok(options.split_whitespace().map(str::to_string).collect())
}

/// Validate a value interpolated into an audited shell pipeline.
///
/// No whitespace, no exceptions.
pub fn validate_shell_value(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Empty("pipeline value"));
    }
    check_grammar(value, "pipeline value", false)
}
