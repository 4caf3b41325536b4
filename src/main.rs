//! A11y Guardian CLI - Command-line interface for accessibility checks
//!
//! CDD Principle: Application Layer - CLI coordinates user interactions with domain services
//! - Translates user commands to domain operations
//! - Handles external concerns like terminal output, process exit codes and the server lifetime
//! - Provides clean separation between user interface and business logic

use a11y_guardian::server::{self, AppState};
use a11y_guardian::{
    A11yError, A11yResult, Guardian, GuardianConfig, OutputFormat, ReportFormatter, ReportOptions,
    Rule, Severity, Strategy,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

/// A11y Guardian - heuristic accessibility checks
#[derive(Parser)]
#[command(name = "a11y-guardian")]
#[command(version)]
#[command(about = "Heuristic accessibility checks for web pages")]
#[command(
    long_about = "A11y Guardian fetches web pages or reads local HTML files and reports accessibility issues: images without text alternatives, links without discernible text, unlabeled form controls and skipped heading levels. It can also run as an HTTP service or delegate to an external engine such as axe-core or pa11y."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check pages for accessibility issues
    Check {
        /// URLs, HTML files or directories of HTML files
        #[arg(required = true)]
        targets: Vec<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormatArg,

        /// Minimum severity level to report
        #[arg(short, long, value_enum)]
        severity: Option<SeverityArg>,

        /// Maximum number of issues to report per page
        #[arg(long)]
        max_issues: Option<usize>,

        /// Only run these rules
        #[arg(long, value_delimiter = ',')]
        rules: Vec<String>,

        /// Use the configured external engine instead of the built-in checks
        #[arg(long)]
        engine: bool,
    },

    /// Run the HTTP API
    Serve {
        /// Address to bind (overrides configuration)
        #[arg(long)]
        bind: Option<String>,

        /// Port to listen on (overrides configuration)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Validate configuration file
    ValidateConfig {
        /// Configuration file to validate
        config_file: Option<PathBuf>,
    },

    /// Explain what a specific rule does
    Explain {
        /// Rule code to explain
        rule_id: String,
    },

    /// List the built-in rules
    Rules {
        /// Show only enabled rules
        #[arg(long)]
        enabled_only: bool,
    },
}

#[derive(Copy, Clone, ValueEnum, PartialEq)]
enum OutputFormatArg {
    Human,
    Json,
    Junit,
    Sarif,
    Github,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Human => OutputFormat::Human,
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Junit => OutputFormat::Junit,
            OutputFormatArg::Sarif => OutputFormat::Sarif,
            OutputFormatArg::Github => OutputFormat::GitHub,
        }
    }
}

#[derive(Copy, Clone, ValueEnum)]
enum SeverityArg {
    Notice,
    Warning,
    Error,
}

impl From<SeverityArg> for Severity {
    fn from(arg: SeverityArg) -> Self {
        match arg {
            SeverityArg::Notice => Severity::Notice,
            SeverityArg::Warning => Severity::Warning,
            SeverityArg::Error => Severity::Error,
        }
    }
}

/// Options for the `check` command
struct CheckArgs {
    targets: Vec<String>,
    format: OutputFormatArg,
    severity: Option<SeverityArg>,
    max_issues: Option<usize>,
    rules: Vec<String>,
    engine: bool,
    use_colors: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json);

    match run_command(cli).await {
        Ok(exit_code) => {
            process::exit(exit_code);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

async fn run_command(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Commands::Check {
            targets,
            format,
            severity,
            max_issues,
            rules,
            engine,
        } => {
            let args = CheckArgs {
                targets,
                format,
                severity,
                max_issues,
                rules,
                engine,
                use_colors: !cli.no_color,
            };
            Ok(run_check(cli.config, args).await?)
        }
        Commands::Serve { bind, port } => run_serve(cli.config, bind, port).await,
        Commands::ValidateConfig { config_file } => {
            Ok(run_validate_config(config_file.or(cli.config))?)
        }
        Commands::Explain { rule_id } => Ok(run_explain(&rule_id)),
        Commands::Rules { enabled_only } => Ok(run_list_rules(cli.config, enabled_only)?),
    }
}

async fn run_check(config_path: Option<PathBuf>, args: CheckArgs) -> A11yResult<i32> {
    let mut config = GuardianConfig::resolve(config_path.as_deref())?;
    if args.engine {
        config.strategy = Strategy::Engine;
    }

    let formatter = ReportFormatter::new(ReportOptions {
        use_colors: args.use_colors,
        max_issues: args.max_issues,
        min_severity: args.severity.map(Severity::from),
        ..Default::default()
    });
    let guardian = Guardian::new_with_config(config)?.with_report_formatter(formatter);

    let pages = guardian.check_targets(&args.targets, &args.rules).await?;

    let formatted = guardian.format_reports(&pages, args.format.into())?;
    println!("{formatted}");

    if pages.iter().any(|page| page.has_errors()) {
        Ok(1)
    } else {
        Ok(0)
    }
}

async fn run_serve(
    config_path: Option<PathBuf>,
    bind: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<i32> {
    let mut config = GuardianConfig::resolve(config_path.as_deref())?;
    if let Some(bind) = bind {
        config.server.bind_address = bind;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let addr: SocketAddr = format!("{}:{}", config.server.bind_address, config.server.port)
        .parse()
        .map_err(|e| {
            A11yError::config(format!(
                "Invalid bind address '{}:{}': {e}",
                config.server.bind_address, config.server.port
            ))
        })?;

    let guardian = Guardian::new_with_config(config)?;
    server::start_server(addr, AppState::new(guardian.analyzer())).await?;

    Ok(0)
}

fn run_validate_config(config_path: Option<PathBuf>) -> A11yResult<i32> {
    let config_path = match config_path.or_else(GuardianConfig::discover) {
        Some(path) => path,
        None => {
            eprintln!("No configuration file found; the built-in defaults are in use");
            return Ok(1);
        }
    };

    println!("Validating configuration: {}", config_path.display());

    match GuardianConfig::load_from_file(&config_path) {
        Ok(config) => {
            println!("Configuration is valid");

            let enabled = Rule::ALL.iter().filter(|r| config.rule_enabled(**r)).count();
            let strategy = match config.strategy {
                Strategy::Heuristic => "heuristic".to_string(),
                Strategy::Engine => config
                    .engine
                    .as_ref()
                    .map(|e| format!("engine ({})", e.kind.runner_name()))
                    .unwrap_or_else(|| "engine".to_string()),
            };

            println!("Configuration summary:");
            println!("  Strategy: {strategy}");
            println!("  Rules: {} total, {} enabled", Rule::ALL.len(), enabled);
            println!("  Fetch timeout: {}ms", config.fetch.timeout_ms);
            println!(
                "  Server: {}:{}",
                config.server.bind_address, config.server.port
            );

            Ok(0)
        }
        Err(e) => {
            eprintln!("Configuration validation failed: {e}");
            Ok(1)
        }
    }
}

fn run_explain(rule_id: &str) -> i32 {
    let Some(rule) = Rule::from_code(rule_id) else {
        eprintln!("Rule '{rule_id}' not found");
        println!();
        println!("Available rules:");
        for rule in Rule::ALL {
            println!("  - {}", rule.code());
        }
        return 1;
    };

    println!("Rule: {}", rule.code());
    println!("Default severity: {}", rule.default_severity());
    println!();
    println!("Message:");
    println!("   {}", rule.summary());
    println!();
    println!("Description:");
    println!("   {}", rule.description());

    0
}

fn run_list_rules(config_path: Option<PathBuf>, enabled_only: bool) -> A11yResult<i32> {
    let config = GuardianConfig::resolve(config_path.as_deref())?;

    println!("Available Rules\n");

    for rule in Rule::ALL {
        let enabled = config.rule_enabled(rule);
        if enabled_only && !enabled {
            continue;
        }

        let status = if enabled { "on " } else { "off" };
        println!(
            "  [{}] {} [{}] - {}",
            status,
            rule.code(),
            config.effective_severity(rule),
            rule.summary()
        );
    }

    Ok(0)
}

fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn check_args(targets: Vec<String>) -> CheckArgs {
        CheckArgs {
            targets,
            format: OutputFormatArg::Json,
            severity: None,
            max_issues: None,
            rules: vec![],
            engine: false,
            use_colors: false,
        }
    }

    #[tokio::test]
    async fn test_check_command() {
        let temp_dir = TempDir::new().unwrap();
        let page = temp_dir.path().join("page.html");
        fs::write(&page, r#"<img src="a.jpg"><a></a><h1>T</h1><h3>U</h3>"#).unwrap();

        // Errors present: exit code 1
        let result = run_check(None, check_args(vec![page.display().to_string()])).await;
        assert_eq!(result.unwrap(), 1);

        // Only the heading warning remains: exit code 0
        let mut args = check_args(vec![page.display().to_string()]);
        args.rules = vec!["heading-order".to_string()];
        assert_eq!(run_check(None, args).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_check_command_errors() {
        let mut args = check_args(vec!["ftp://example.com".to_string()]);
        args.format = OutputFormatArg::Human;
        assert!(run_check(None, args).await.is_err());

        // Engine strategy without an engine section is a configuration error
        let temp_dir = TempDir::new().unwrap();
        let page = temp_dir.path().join("page.html");
        fs::write(&page, "<p></p>").unwrap();
        let mut args = check_args(vec![page.display().to_string()]);
        args.engine = true;
        let err = run_check(None, args).await.unwrap_err();
        assert!(matches!(err, A11yError::Configuration { .. }));
    }

    #[test]
    fn test_validate_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("test_config.yaml");

        let yaml = GuardianConfig::default().to_yaml().unwrap();
        fs::write(&config_file, yaml).unwrap();
        assert_eq!(run_validate_config(Some(config_file.clone())).unwrap(), 0);

        fs::write(&config_file, "version: \"9\"\n").unwrap();
        assert_eq!(run_validate_config(Some(config_file)).unwrap(), 1);
    }

    #[test]
    fn test_explain_rule() {
        assert_eq!(run_explain("image-alt"), 0);
        assert_eq!(run_explain("nonexistent_rule"), 1);
    }

    #[test]
    fn test_list_rules() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("a11y_guardian.yaml");
        fs::write(
            &config_file,
            "version: \"1.0\"\nrules:\n  label:\n    enabled: false\n",
        )
        .unwrap();

        assert_eq!(run_list_rules(Some(config_file.clone()), false).unwrap(), 0);
        assert_eq!(run_list_rules(Some(config_file), true).unwrap(), 0);
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "a11y-guardian",
            "check",
            "https://example.com",
            "--format",
            "sarif",
            "--rules",
            "image-alt,label",
            "--severity",
            "warning",
        ])
        .unwrap();

        match cli.command {
            Commands::Check { rules, format, .. } => {
                assert_eq!(rules, ["image-alt", "label"]);
                assert!(format == OutputFormatArg::Sarif);
            }
            _ => panic!("expected check"),
        }

        assert!(Cli::try_parse_from(["a11y-guardian", "check"]).is_err());
    }
}
