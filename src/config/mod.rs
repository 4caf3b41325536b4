//! Configuration loading and management for A11y Guardian
//!
//! Architecture: Anti-Corruption Layer - Configuration translates external YAML formats
//! - Raw YAML structures are converted to clean domain objects
//! - Default configurations are embedded in the domain, not infrastructure
//! - Every load path ends in validate(), so a loaded config is always usable

use crate::analyzer::checks::Rule;
use crate::analyzer::engine::EngineKind;
use crate::domain::issues::{A11yError, A11yResult, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Supported configuration format versions
pub const SUPPORTED_VERSIONS: [&str; 1] = ["1.0"];

/// File names searched, in order, when no configuration path is given
pub const CONFIG_FILE_NAMES: [&str; 3] = [
    "a11y_guardian.yaml",
    "a11y_guardian.yml",
    ".a11y_guardian.yaml",
];

/// Desktop browser user agent sent with every page request
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Main configuration structure for A11y Guardian
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardianConfig {
    /// Configuration format version
    pub version: String,
    /// Which analyzer produces reports
    #[serde(default)]
    pub strategy: Strategy,
    /// Page retrieval settings
    #[serde(default)]
    pub fetch: FetchSettings,
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerSettings,
    /// Per-rule overrides keyed by rule code
    #[serde(default)]
    pub rules: BTreeMap<String, RuleOverride>,
    /// External engine, required when the strategy is `engine`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<EngineSettings>,
}

/// Analysis strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Built-in heuristic checks
    #[default]
    Heuristic,
    /// External accessibility engine
    Engine,
}

/// Page retrieval settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub user_agent: String,
    /// Whole-request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_ms: 30_000,
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Enable flag and severity override for one rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleOverride {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Severity override (uses the rule default if not specified)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

impl Default for RuleOverride {
    fn default() -> Self {
        Self {
            enabled: true,
            severity: None,
        }
    }
}

/// External engine invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Output format the engine produces
    pub kind: EngineKind,
    /// Program to run
    pub program: String,
    /// Arguments; `{url}` is replaced with the page URL
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_engine_timeout")]
    pub timeout_ms: u64,
}

impl GuardianConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> A11yResult<Self> {
        let contents = fs::read_to_string(&path).map_err(|e| {
            A11yError::config(format!(
                "Failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: Self = serde_yaml::from_str(&contents).map_err(|e| {
            A11yError::config(format!(
                "Failed to parse config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from string content
    pub fn load_from_str(content: &str) -> A11yResult<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| A11yError::config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Find a configuration file in `dir`
    pub fn discover_in(dir: &Path) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    /// Find a configuration file in the working directory
    pub fn discover() -> Option<PathBuf> {
        std::env::current_dir()
            .ok()
            .and_then(|dir| Self::discover_in(&dir))
    }

    /// Load `path` if given, else a discovered file, else the defaults
    pub fn resolve(path: Option<&Path>) -> A11yResult<Self> {
        match path.map(Path::to_path_buf).or_else(Self::discover) {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> A11yResult<()> {
        if !SUPPORTED_VERSIONS.contains(&self.version.as_str()) {
            return Err(A11yError::config(format!(
                "Unsupported configuration version: {}. Supported versions: {}",
                self.version,
                SUPPORTED_VERSIONS.join(", ")
            )));
        }

        if let Some(unknown) = self.rules.keys().find(|code| Rule::from_code(code).is_none()) {
            return Err(A11yError::config(format!(
                "Unknown rule '{}'. Available rules: {}",
                unknown,
                Rule::ALL.map(Rule::code).join(", ")
            )));
        }

        if self.fetch.timeout_ms == 0 {
            return Err(A11yError::config("fetch.timeout_ms must be greater than zero"));
        }

        if self.server.port == 0 {
            return Err(A11yError::config("server.port must be greater than zero"));
        }

        if let Some(engine) = &self.engine {
            if engine.program.trim().is_empty() {
                return Err(A11yError::config("engine.program must not be empty"));
            }
            if engine.timeout_ms == 0 {
                return Err(A11yError::config("engine.timeout_ms must be greater than zero"));
            }
        } else if self.strategy == Strategy::Engine {
            return Err(A11yError::config(
                "Strategy 'engine' requires an 'engine' section",
            ));
        }

        Ok(())
    }

    /// Whether `rule` runs under this configuration
    pub fn rule_enabled(&self, rule: Rule) -> bool {
        self.rules.get(rule.code()).map_or(true, |o| o.enabled)
    }

    /// Get effective severity for a rule (override or rule default)
    pub fn effective_severity(&self, rule: Rule) -> Severity {
        self.rules
            .get(rule.code())
            .and_then(|o| o.severity)
            .unwrap_or_else(|| rule.default_severity())
    }

    /// Render as YAML
    pub fn to_yaml(&self) -> A11yResult<String> {
        serde_yaml::to_string(self)
            .map_err(|e| A11yError::config(format!("Failed to serialize config: {e}")))
    }
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            strategy: Strategy::default(),
            fetch: FetchSettings::default(),
            server: ServerSettings::default(),
            rules: BTreeMap::new(),
            engine: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_engine_timeout() -> u64 {
    60_000
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: GuardianConfig,
}

impl ConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: GuardianConfig::default(),
        }
    }

    /// Override one rule
    pub fn rule(mut self, code: impl Into<String>, rule: RuleOverride) -> Self {
        self.config.rules.insert(code.into(), rule);
        self
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    pub fn engine(mut self, engine: EngineSettings) -> Self {
        self.config.engine = Some(engine);
        self
    }

    pub fn fetch(mut self, fetch: FetchSettings) -> Self {
        self.config.fetch = fetch;
        self
    }

    pub fn server(mut self, bind_address: impl Into<String>, port: u16) -> Self {
        self.config.server = ServerSettings {
            bind_address: bind_address.into(),
            port,
        };
        self
    }

    /// Build the final configuration
    pub fn build(self) -> A11yResult<GuardianConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FULL_CONFIG: &str = r#"
version: "1.0"
strategy: engine
fetch:
  user_agent: "guardian-test"
  timeout_ms: 5000
server:
  bind_address: "127.0.0.1"
  port: 8080
rules:
  heading-order:
    enabled: true
    severity: notice
  label:
    enabled: false
engine:
  kind: axe
  program: npx
  args: ["@axe-core/cli", "{url}", "--stdout"]
"#;

    #[test]
    fn test_defaults_validate() {
        let config = GuardianConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.strategy, Strategy::Heuristic);
        assert_eq!(config.fetch.timeout_ms, 30_000);
        assert_eq!(config.server.port, 3000);
        assert!(config.fetch.user_agent.contains("Chrome/91"));
    }

    #[test]
    fn test_load_full_config() {
        let config = GuardianConfig::load_from_str(FULL_CONFIG).unwrap();
        assert_eq!(config.strategy, Strategy::Engine);
        assert_eq!(config.fetch.user_agent, "guardian-test");
        assert_eq!(config.server.bind_address, "127.0.0.1");

        let engine = config.engine.as_ref().unwrap();
        assert_eq!(engine.kind, EngineKind::Axe);
        assert_eq!(engine.timeout_ms, 60_000);

        assert!(!config.rule_enabled(Rule::Label));
        assert!(config.rule_enabled(Rule::ImageAlt));
        assert_eq!(config.effective_severity(Rule::HeadingOrder), Severity::Notice);
        assert_eq!(config.effective_severity(Rule::LinkName), Severity::Error);
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = GuardianConfig::load_from_str("version: \"1.0\"\n").unwrap();
        assert_eq!(config, GuardianConfig::default());
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config = GuardianConfig::load_from_str(
            "version: \"1.0\"\nfetch:\n  timeout_ms: 10\nserver:\n  port: 9000\n",
        )
        .unwrap();
        assert_eq!(config.fetch.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.fetch.timeout_ms, 10);
        assert_eq!(config.server.bind_address, "0.0.0.0");
    }

    #[test]
    fn test_invalid_configs_are_rejected() {
        let cases = [
            "version: \"2.0\"\n",
            "version: \"1.0\"\nrules:\n  color-contrast:\n    enabled: true\n",
            "version: \"1.0\"\nstrategy: engine\n",
            "version: \"1.0\"\nfetch:\n  timeout_ms: 0\n",
            "version: \"1.0\"\nserver:\n  port: 0\n",
            "version: \"1.0\"\nengine:\n  kind: pa11y\n  program: \"  \"\n",
            "version: \"1.0\"\nstrategy: magic\n",
            "version: [",
        ];

        for case in cases {
            let err = GuardianConfig::load_from_str(case).unwrap_err();
            assert!(matches!(err, A11yError::Configuration { .. }), "{case}");
        }
    }

    #[test]
    fn test_load_from_file_and_discovery() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(GuardianConfig::discover_in(dir.path()).is_none());

        let path = dir.path().join(".a11y_guardian.yaml");
        let mut file = fs::File::create(&path).unwrap();
        write!(file, "version: \"1.0\"\nserver:\n  port: 4000\n").unwrap();

        assert_eq!(GuardianConfig::discover_in(dir.path()), Some(path.clone()));
        let config = GuardianConfig::resolve(Some(path.as_path())).unwrap();
        assert_eq!(config.server.port, 4000);

        // The non-hidden name wins when both exist
        fs::write(dir.path().join("a11y_guardian.yaml"), "version: \"1.0\"\n").unwrap();
        assert_eq!(
            GuardianConfig::discover_in(dir.path()),
            Some(dir.path().join("a11y_guardian.yaml"))
        );
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = GuardianConfig::load_from_file("/nonexistent/a11y_guardian.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_builder_validates() {
        let built = ConfigBuilder::new().server("127.0.0.1", 0).build();
        assert!(built.is_err());

        let config = ConfigBuilder::new()
            .strategy(Strategy::Engine)
            .engine(EngineSettings {
                kind: EngineKind::Pa11y,
                program: "pa11y".to_string(),
                args: vec!["--reporter".to_string(), "json".to_string()],
                timeout_ms: 1000,
            })
            .build()
            .unwrap();
        assert_eq!(config.strategy, Strategy::Engine);
    }

    #[test]
    fn test_yaml_serialization_round_trips() {
        let config = GuardianConfig::load_from_str(FULL_CONFIG).unwrap();
        let yaml = config.to_yaml().unwrap();
        assert_eq!(GuardianConfig::load_from_str(&yaml).unwrap(), config);
    }
}
