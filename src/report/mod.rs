//! Report generation with multiple output formats
//!
//! CDD Principle: Anti-Corruption Layer - Formatters translate domain objects to external formats
//! - PageReport (domain) is converted to various external representations
//! - Each formatter encapsulates the rules for its specific output format
//! - Filtering happens once, through the domain, so summaries always match what is shown

use crate::analyzer::checks::Rule;
use crate::domain::issues::{A11yError, A11yResult, Issue, PageReport, Severity, Summary};
use serde_json::Value as JsonValue;

/// Supported output formats for page reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable format with colors and context
    Human,
    /// JSON format matching the HTTP API body
    Json,
    /// JUnit XML format for CI/CD integration
    Junit,
    /// SARIF format for code scanning tools
    Sarif,
    /// GitHub Actions format for workflow integration
    GitHub,
}

impl OutputFormat {
    /// Parse format from string
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "human" => Some(Self::Human),
            "json" => Some(Self::Json),
            "junit" => Some(Self::Junit),
            "sarif" => Some(Self::Sarif),
            "github" => Some(Self::GitHub),
            _ => None,
        }
    }

    /// Get all available format names
    pub fn all_formats() -> &'static [&'static str] {
        &["human", "json", "junit", "sarif", "github"]
    }
}

/// Options for customizing report output
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Whether to use colored output (for human format)
    pub use_colors: bool,
    /// Whether to show the markup snippet under each issue
    pub show_context: bool,
    /// Maximum number of issues to include per page
    pub max_issues: Option<usize>,
    /// Minimum severity level to include
    pub min_severity: Option<Severity>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            use_colors: true,
            show_context: true,
            max_issues: None,
            min_severity: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Style {
    Error,
    Warning,
    Notice,
    Success,
    Dim,
    Bold,
}

impl From<Severity> for Style {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Error => Self::Error,
            Severity::Warning => Self::Warning,
            Severity::Notice => Self::Notice,
        }
    }
}

/// Main report formatter that dispatches to specific formatters
pub struct ReportFormatter {
    options: ReportOptions,
}

impl ReportFormatter {
    /// Create a new report formatter with options
    pub fn new(options: ReportOptions) -> Self {
        Self { options }
    }

    /// Format page reports in the specified format
    pub fn format_reports(&self, pages: &[PageReport], format: OutputFormat) -> A11yResult<String> {
        let pages: Vec<PageReport> = pages
            .iter()
            .map(|page| page.filtered(self.options.min_severity, self.options.max_issues))
            .collect();

        match format {
            OutputFormat::Human => Ok(self.format_human(&pages)),
            OutputFormat::Json => self.format_json(&pages),
            OutputFormat::Junit => Ok(self.format_junit(&pages)),
            OutputFormat::Sarif => self.format_sarif(&pages),
            OutputFormat::GitHub => Ok(self.format_github(&pages)),
        }
    }

    #[cfg(feature = "colors")]
    fn paint(&self, text: &str, style: Style) -> String {
        use colored::Colorize;

        if !self.options.use_colors {
            return text.to_string();
        }

        match style {
            Style::Error => text.red().to_string(),
            Style::Warning => text.yellow().to_string(),
            Style::Notice => text.cyan().to_string(),
            Style::Success => text.green().to_string(),
            Style::Dim => text.dimmed().to_string(),
            Style::Bold => text.bold().to_string(),
        }
    }

    #[cfg(not(feature = "colors"))]
    fn paint(&self, text: &str, _style: Style) -> String {
        text.to_string()
    }

    /// Format reports in human-readable format
    fn format_human(&self, pages: &[PageReport]) -> String {
        let mut output = String::new();

        for page in pages {
            output.push_str(&format!(
                "{} {} ({}) [{}]\n",
                self.paint("Page", Style::Bold),
                page.page_url,
                page.document_title,
                page.test_runner
            ));

            if page.issues().is_empty() {
                output.push_str(&format!(
                    "  {}\n\n",
                    self.paint("No accessibility issues found", Style::Success)
                ));
                continue;
            }

            for issue in page.issues() {
                output.push_str(&format!(
                    "  {} [{}] {}: {}\n",
                    self.paint(&issue.selector, Style::Dim),
                    self.paint(issue.severity.as_str(), issue.severity.into()),
                    issue.code,
                    issue.message
                ));

                if self.options.show_context && !issue.context.is_empty() {
                    output.push_str(&format!(
                        "    {}\n",
                        self.paint(&format!("│ {}", issue.context), Style::Dim)
                    ));
                }

                if let Some(url) = &issue.help_url {
                    output.push_str(&format!("    {url}\n"));
                }
            }
            output.push('\n');
        }

        output.push_str(&self.format_summary(pages));
        output
    }

    /// Format the summary section
    fn format_summary(&self, pages: &[PageReport]) -> String {
        let total = pages.iter().map(PageReport::summary).fold(Summary::default(), |acc, s| Summary {
            total: acc.total + s.total,
            errors: acc.errors + s.errors,
            warnings: acc.warnings + s.warnings,
            notices: acc.notices + s.notices,
        });

        let page_count = format!(
            "{} page{}",
            pages.len(),
            if pages.len() == 1 { "" } else { "s" }
        );

        let mut summary = format!("{} ", self.paint("Summary:", Style::Bold));

        if total.total == 0 {
            summary.push_str(&format!("{} in {}\n", self.paint("0 issues", Style::Success), page_count));
            return summary;
        }

        let mut parts = Vec::new();
        for (count, singular, style) in [
            (total.errors, "error", Style::Error),
            (total.warnings, "warning", Style::Warning),
            (total.notices, "notice", Style::Notice),
        ] {
            if count > 0 {
                let text = format!("{} {}{}", count, singular, if count == 1 { "" } else { "s" });
                parts.push(self.paint(&text, style));
            }
        }

        summary.push_str(&format!("{} in {}\n", parts.join(", "), page_count));
        summary
    }

    /// One page renders as the API body; several render as an array of them
    fn format_json(&self, pages: &[PageReport]) -> A11yResult<String> {
        let rendered = match pages {
            [page] => serde_json::to_string_pretty(page),
            _ => serde_json::to_string_pretty(pages),
        };

        rendered.map_err(|e| A11yError::format(format!("JSON serialization failed: {e}")))
    }

    /// Format reports in JUnit XML format, one suite per page
    fn format_junit(&self, pages: &[PageReport]) -> String {
        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");

        let tests: usize = pages.iter().map(|p| p.issues().len()).sum();
        let failures: usize = pages.iter().map(|p| p.summary().errors).sum();
        xml.push_str(&format!(
            "<testsuites name=\"a11y-guardian\" tests=\"{tests}\" failures=\"{failures}\">\n"
        ));

        for page in pages {
            let summary = page.summary();
            xml.push_str(&format!(
                "  <testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" errors=\"0\" timestamp=\"{}\">\n",
                escape_xml(&page.page_url),
                summary.total,
                summary.errors,
                page.timestamp.to_rfc3339()
            ));

            for issue in page.issues() {
                xml.push_str(&format!(
                    "    <testcase classname=\"{}\" name=\"{}\">\n",
                    escape_xml(&issue.code),
                    escape_xml(&issue.selector)
                ));

                if issue.is_blocking() {
                    xml.push_str(&format!(
                        "      <failure message=\"{}\">\n",
                        escape_xml(&issue.message)
                    ));
                    xml.push_str(&format!("        Selector: {}\n", escape_xml(&issue.selector)));
                    if !issue.context.is_empty() {
                        xml.push_str(&format!("        Context: {}\n", escape_xml(&issue.context)));
                    }
                    xml.push_str("      </failure>\n");
                } else {
                    xml.push_str(&format!(
                        "      <system-out>[{}] {}</system-out>\n",
                        issue.severity,
                        escape_xml(&issue.message)
                    ));
                }

                xml.push_str("    </testcase>\n");
            }

            xml.push_str("  </testsuite>\n");
        }

        xml.push_str("</testsuites>\n");
        xml
    }

    /// Format reports in SARIF format
    fn format_sarif(&self, pages: &[PageReport]) -> A11yResult<String> {
        let results: Vec<JsonValue> = pages
            .iter()
            .flat_map(|page| page.issues().iter().map(move |issue| sarif_result(page, issue)))
            .collect();

        let rules: Vec<JsonValue> = Rule::ALL
            .iter()
            .map(|rule| {
                serde_json::json!({
                    "id": rule.code(),
                    "shortDescription": { "text": rule.summary() },
                    "fullDescription": { "text": rule.description() },
                    "defaultConfiguration": { "level": sarif_level(rule.default_severity()) }
                })
            })
            .collect();

        let sarif_report = serde_json::json!({
            "version": "2.1.0",
            "$schema": "https://json.schemastore.org/sarif-2.1.0.json",
            "runs": [{
                "tool": {
                    "driver": {
                        "name": "a11y-guardian",
                        "version": env!("CARGO_PKG_VERSION"),
                        "rules": rules
                    }
                },
                "results": results
            }]
        });

        serde_json::to_string_pretty(&sarif_report)
            .map_err(|e| A11yError::format(format!("SARIF serialization failed: {e}")))
    }

    /// Format reports as GitHub Actions workflow commands
    fn format_github(&self, pages: &[PageReport]) -> String {
        let mut output = String::new();

        for page in pages {
            for issue in page.issues() {
                let level = match issue.severity {
                    Severity::Error => "error",
                    Severity::Warning => "warning",
                    Severity::Notice => "notice",
                };

                output.push_str(&format!(
                    "::{} file={},title={}::{}\n",
                    level,
                    escape_github_property(&page.page_url),
                    escape_github_property(&issue.code),
                    escape_github_data(&format!("{} ({})", issue.message, issue.selector))
                ));
            }
        }

        output
    }
}

impl Default for ReportFormatter {
    fn default() -> Self {
        Self::new(ReportOptions::default())
    }
}

fn sarif_level(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
        Severity::Notice => "note",
    }
}

fn sarif_result(page: &PageReport, issue: &Issue) -> JsonValue {
    let mut result = serde_json::json!({
        "ruleId": issue.code,
        "level": sarif_level(issue.severity),
        "message": { "text": issue.message },
        "locations": [{
            "physicalLocation": {
                "artifactLocation": { "uri": page.page_url },
                "contextRegion": { "snippet": { "text": issue.context } }
            },
            "logicalLocations": [{ "fullyQualifiedName": issue.selector }]
        }]
    });

    if let Some(url) = &issue.help_url {
        result["helpUri"] = JsonValue::String(url.clone());
    }

    result
}

/// Escape XML special characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Escape a workflow command message
fn escape_github_data(s: &str) -> String {
    s.replace('%', "%25").replace('\r', "%0D").replace('\n', "%0A")
}

/// Escape a workflow command property value
fn escape_github_property(s: &str) -> String {
    escape_github_data(s).replace(':', "%3A").replace(',', "%2C")
}
