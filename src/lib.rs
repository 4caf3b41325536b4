//! A11y Guardian - heuristic accessibility checks for web pages
//!
//! Architecture: Clean Architecture - Library interface serves as the application layer
//! - Pure domain logic separated from infrastructure concerns
//! - Clean boundaries between the scanner, page retrieval and external engines
//! - The same facade backs the CLI and the HTTP server

pub mod analyzer;
pub mod config;
pub mod dom;
pub mod domain;
pub mod fetch;
pub mod report;
pub mod server;

// Re-export main types for convenient access
pub use domain::issues::{
    A11yError, A11yResult, Issue, PageReport, Report, Severity, Summary, CONTEXT_LIMIT,
};

pub use config::{ConfigBuilder, EngineSettings, GuardianConfig, RuleOverride, Strategy};

pub use analyzer::{
    parse_target, EngineAnalyzer, EngineKind, HeuristicAnalyzer, HeuristicScanner, PageAnalyzer,
    PageRequest, Rule,
};

pub use dom::Document;

pub use report::{OutputFormat, ReportFormatter, ReportOptions};

pub use reqwest::Url;

use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use walkdir::WalkDir;

/// File extensions picked up when a directory is given as a target
pub const HTML_EXTENSIONS: [&str; 2] = ["html", "htm"];

/// Main Guardian checker providing high-level operations
pub struct Guardian {
    config: GuardianConfig,
    analyzer: Arc<dyn PageAnalyzer>,
    report_formatter: ReportFormatter,
}

impl Guardian {
    /// Create a checker with the given configuration
    pub fn new_with_config(config: GuardianConfig) -> A11yResult<Self> {
        config.validate()?;
        let analyzer = analyzer::from_config(&config)?;

        Ok(Self {
            config,
            analyzer,
            report_formatter: ReportFormatter::default(),
        })
    }

    /// Create a checker with default configuration
    pub fn new() -> A11yResult<Self> {
        Self::new_with_config(GuardianConfig::default())
    }

    /// Set custom report formatter
    pub fn with_report_formatter(mut self, formatter: ReportFormatter) -> Self {
        self.report_formatter = formatter;
        self
    }

    pub fn config(&self) -> &GuardianConfig {
        &self.config
    }

    /// The analyzer selected by the configuration
    pub fn analyzer(&self) -> Arc<dyn PageAnalyzer> {
        Arc::clone(&self.analyzer)
    }

    /// Check one page, optionally restricted to some rule codes
    pub async fn check(&self, url: Url, rules: Vec<String>) -> A11yResult<PageReport> {
        self.analyzer
            .analyze(&PageRequest::new(url).with_rules(rules))
            .await
    }

    /// Check every target in order; stops at the first failure
    pub async fn check_targets(
        &self,
        targets: &[String],
        rules: &[String],
    ) -> A11yResult<Vec<PageReport>> {
        let urls = resolve_targets(targets)?;
        let mut pages = Vec::with_capacity(urls.len());

        for url in urls {
            debug!(url = %url, "Checking target");
            pages.push(self.check(url, rules.to_vec()).await?);
        }

        Ok(pages)
    }

    /// Scan markup that is already in memory with the configured heuristic rules
    pub fn check_html(&self, html: &str, page_url: &str) -> PageReport {
        let scanner = HeuristicScanner::from_config(&self.config);
        let (report, title) = analyzer::heuristic::scan_html(&scanner, html);
        PageReport::new(page_url, domain::issues::HEURISTIC_RUNNER, title, report)
    }

    /// Format page reports for output
    pub fn format_reports(&self, pages: &[PageReport], format: OutputFormat) -> A11yResult<String> {
        self.report_formatter.format_reports(pages, format)
    }
}

/// Expand CLI targets into URLs.
///
/// Existing paths become `file` URLs; directories are walked for HTML files
/// in sorted order. Anything else must be an `http(s)` or `file` URL.
pub fn resolve_targets(targets: &[String]) -> A11yResult<Vec<Url>> {
    let mut urls = Vec::new();

    for target in targets {
        let path = Path::new(target);

        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry.map_err(|e| {
                    A11yError::input(format!("Failed to walk '{}': {e}", path.display()))
                })?;
                if entry.file_type().is_file() && is_html_file(entry.path()) {
                    urls.push(file_url(entry.path())?);
                }
            }
        } else if path.is_file() {
            urls.push(file_url(path)?);
        } else {
            urls.push(parse_target(target, true)?);
        }
    }

    if urls.is_empty() {
        return Err(A11yError::input("No pages to check"));
    }

    Ok(urls)
}

fn is_html_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| HTML_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn file_url(path: &Path) -> A11yResult<Url> {
    let absolute = path.canonicalize()?;
    Url::from_file_path(&absolute)
        .map_err(|_| A11yError::input(format!("Cannot build a URL for '{}'", absolute.display())))
}

/// Convenience function to scan markup with every rule at its default severity
pub fn scan_html(html: &str) -> Report {
    analyzer::heuristic::scan(&Document::parse(html))
}
