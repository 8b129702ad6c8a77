// Configuration File Support
//
// TOML configuration for the recon gateway with environment variable
// overrides. The default file lives in the XDG config directory:
// ~/.config/recon-gateway/config.toml

use crate::gateway::{GatewayConfig, OutputFormat, ProfileRegistry};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Execution gateway configuration
    pub gateway: GatewaySettings,

    /// HTTP server configuration
    pub server: ServerConfig,

    /// Notification sink configuration
    pub notify: NotifyConfig,

    /// Per-tool overrides and additional tools, keyed by tool id
    pub tools: HashMap<String, ToolConfig>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Execution gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GatewaySettings {
    /// Directory for per-invocation scratch files
    pub scratch_dir: PathBuf,

    /// Maximum captured bytes per output stream
    pub max_output_bytes: usize,

    /// Timeout for configured tools that do not set their own
    pub default_timeout_secs: u64,

    /// How long to wait for output pipes after a tool exits or is killed
    pub kill_grace_ms: u64,

    /// Working directory for tool processes
    pub working_dir: Option<PathBuf>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            scratch_dir: std::env::temp_dir().join("recon-gateway"),
            max_output_bytes: 4 * 1024 * 1024,
            default_timeout_secs: 300,
            kill_grace_ms: 2000,
            working_dir: None,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind
    pub bind: String,

    /// Port to listen on
    pub port: u16,

    /// Scans allowed to run at once; further requests get 429
    pub max_concurrent_scans: usize,

    /// Whether to serve /metrics
    pub metrics_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8000,
            max_concurrent_scans: 4,
            metrics_enabled: true,
        }
    }
}

/// Notification sink configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotifyConfig {
    /// Slack incoming webhook URL. Notifications are off when unset.
    pub slack_webhook_url: Option<String>,
}

/// Tool override or additional tool definition
///
/// Every field is optional; unset fields keep the built-in profile's value.
/// Tools that are not built in need `program` and either `args` or
/// `pipeline`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolConfig {
    /// Executable name or absolute path
    pub program: Option<String>,

    /// Argument template using {target}, {options}, {scratch}
    pub args: Option<Vec<String>>,

    /// Output format (raw, json, lines-from-file)
    pub format: Option<String>,

    /// Timeout in seconds
    pub timeout_secs: Option<u64>,

    /// Whether a free-form option blob is accepted
    pub accepts_options: Option<bool>,

    /// Shell pipeline template using {target} and {program}
    pub pipeline: Option<String>,
}

impl Config {
    /// Load configuration from the default XDG config directory
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    /// If the config file does not exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the resulting configuration is invalid.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?;
            tracing::info!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        let config = config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/recon-gateway/config.toml` on Linux
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "recon-gateway", "recon-gateway") {
            proj_dirs.config_dir().join("config.toml")
        } else {
            // Fallback if XDG dirs cannot be determined
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config").join("recon-gateway").join("config.toml")
        }
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - RECON_GATEWAY_LOG_LEVEL
    /// - RECON_GATEWAY_LOG_FORMAT
    /// - RECON_GATEWAY_SCRATCH_DIR
    /// - RECON_GATEWAY_MAX_OUTPUT_BYTES
    /// - RECON_GATEWAY_BIND
    /// - RECON_GATEWAY_PORT
    /// - RECON_GATEWAY_MAX_SCANS
    /// - RECON_GATEWAY_SLACK_WEBHOOK
    pub fn apply_env_overrides(self) -> Self {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    fn apply_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Logging overrides
        if let Some(level) = lookup("RECON_GATEWAY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("RECON_GATEWAY_LOG_FORMAT") {
            self.logging.format = format;
        }

        // Gateway overrides
        if let Some(dir) = lookup("RECON_GATEWAY_SCRATCH_DIR") {
            self.gateway.scratch_dir = PathBuf::from(dir);
        }
        if let Some(bytes) = lookup("RECON_GATEWAY_MAX_OUTPUT_BYTES") {
            if let Ok(bytes) = bytes.parse::<usize>() {
                if bytes > 0 {
                    self.gateway.max_output_bytes = bytes;
                }
            }
        }

        // Server overrides
        if let Some(bind) = lookup("RECON_GATEWAY_BIND") {
            self.server.bind = bind;
        }
        if let Some(port) = lookup("RECON_GATEWAY_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Some(scans) = lookup("RECON_GATEWAY_MAX_SCANS") {
            if let Ok(scans) = scans.parse::<usize>() {
                if scans > 0 {
                    self.server.max_concurrent_scans = scans;
                }
            }
        }

        // Notification overrides
        if let Some(url) = lookup("RECON_GATEWAY_SLACK_WEBHOOK") {
            self.notify.slack_webhook_url = if url.is_empty() { None } else { Some(url) };
        }

        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        // Validate logging level
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        // Validate logging format
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        // Validate gateway configuration
        if self.gateway.max_output_bytes == 0 {
            anyhow::bail!("Gateway max_output_bytes must be > 0");
        }
        if self.gateway.default_timeout_secs == 0 {
            anyhow::bail!("Gateway default_timeout_secs must be > 0");
        }

        // Validate server configuration
        if self.server.max_concurrent_scans == 0 {
            anyhow::bail!("Server max_concurrent_scans must be > 0");
        }

        if let Some(url) = &self.notify.slack_webhook_url {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                anyhow::bail!("Slack webhook URL must be http(s)");
            }
        }

        // Validate tool definitions
        for (name, tool) in &self.tools {
            if matches!(&tool.program, Some(program) if program.trim().is_empty()) {
                anyhow::bail!("Tool '{}' has empty program", name);
            }
            if let Some(format) = &tool.format {
                if OutputFormat::parse(format).is_none() {
                    anyhow::bail!(
                        "Tool '{}' has invalid format: {}. Must be one of: raw, json, lines-from-file",
                        name,
                        format
                    );
                }
            }
            if tool.timeout_secs == Some(0) {
                anyhow::bail!("Tool '{}' timeout_secs must be > 0", name);
            }
        }

        // Template and placeholder rules live with the profiles
        self.profile_registry()?;

        Ok(())
    }

    /// Build the tool profile registry: built-ins plus `[tools]` entries
    pub fn profile_registry(&self) -> Result<ProfileRegistry> {
        let tools = self.tools_with_default_timeout();
        ProfileRegistry::with_overrides(&tools).context("Invalid tool configuration")
    }

    /// New tools without an explicit timeout get the gateway default
    fn tools_with_default_timeout(&self) -> HashMap<String, ToolConfig> {
        let builtin = ProfileRegistry::builtin();
        self.tools
            .iter()
            .map(|(id, tool)| {
                let mut tool = tool.clone();
                if tool.timeout_secs.is_none() && !builtin.contains(id) {
                    tool.timeout_secs = Some(self.gateway.default_timeout_secs);
                }
                (id.clone(), tool)
            })
            .collect()
    }

    /// Gateway runtime configuration
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            scratch_dir: self.gateway.scratch_dir.clone(),
            max_output_bytes: self.gateway.max_output_bytes,
            kill_grace: Duration::from_millis(self.gateway.kill_grace_ms),
            working_dir: self.gateway.working_dir.clone(),
        }
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }
}
