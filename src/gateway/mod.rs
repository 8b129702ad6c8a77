//! Command Execution Gateway
//!
//! Turns a user-supplied scan target into an external tool invocation,
//! runs it under a time bound, and hands back a tagged result.
//!
//! # Security Features
//!
//! - **Allow-list Validation**: targets and option blobs are accepted or
//!   rejected as a whole, never cleaned up
//! - **Argument Vectors**: tools are exec'd directly; the few pipeline
//!   profiles that need a shell only interpolate validated values
//! - **Timeout Enforcement**: every invocation is bounded and its process
//!   group is killed on timeout or cancellation
//! - **Bounded Capture**: stdout and stderr are capped per stream
//! - **Scratch Hygiene**: per-invocation scratch files are always removed
//!
//! # Architecture
//!
//! - `validator.rs`: input allow-list
//! - `profile.rs`: per-tool argument templates, output formats, timeouts
//! - `invocation.rs`: resolved process description
//! - `executor.rs`: process execution and capture
//! - `projector.rs`: output shaping
//! - `scratch.rs`: unique scratch file lifetime
//! - `timeout.rs`: timeout presets
//!
//! # Example
//!
//! ```no_run
//! use recon_gateway::gateway::{Gateway, GatewayConfig, ProfileRegistry};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let gateway = Gateway::new(ProfileRegistry::builtin(), GatewayConfig::default());
//!
//!     let outcome = gateway.execute("nmap-custom", "10.0.0.1", Some("-sV -T4")).await?;
//!     println!("Status: {:?}", outcome.result.status);
//!     println!("Stdout: {}", outcome.result.stdout);
//!
//!     Ok(())
//! }
//! ```

mod error;
mod executor;
mod invocation;
mod profile;
mod projector;
mod scratch;
mod timeout;
mod validator;

pub use error::GatewayError;
pub use executor::{
    ExecutionResult, ExecutionStatus, Gateway, GatewayConfig, ScanOutcome, DEFAULT_MAX_OUTPUT_BYTES,
};
pub use invocation::{resolve_program, ExecSpec, ToolInvocation};
pub use profile::{ArgPart, OutputFormat, ProfileError, ProfileRegistry, ProfileSummary, ToolProfile};
pub use projector::{project, ProjectedOutput};
pub use scratch::ScratchFile;
pub use timeout::ExecutionTimeout;
pub use validator::{
    is_safe_argument, validate_options, validate_shell_value, validate_target, ValidationError,
    FORBIDDEN_CHARS,
};
