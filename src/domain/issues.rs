//! Core domain models for accessibility issues and page reports
//!
//! Architecture: Rich Domain Models - Issues are immutable value records, reports own them
//! - Report is the aggregate root; its summary is always derived, never stored
//! - PageReport wraps a report with the page metadata callers serialize
//! - The error taxonomy separates client mistakes from server-side failures

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

/// Maximum number of characters kept in an issue's context snippet
pub const CONTEXT_LIMIT: usize = 100;

/// Severity levels for accessibility issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Advisory findings worth a manual look
    Notice,
    /// Problems that degrade the experience but may not block it
    Warning,
    /// Problems that block assistive technology users
    Error,
}

impl Severity {
    /// Whether this severity level should fail a check run
    pub fn is_blocking(self) -> bool {
        matches!(self, Self::Error)
    }

    /// Convert to string for display
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Notice => "notice",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Parse a severity name, case-insensitively
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "notice" => Some(Self::Notice),
            "warning" => Some(Self::Warning),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Map an axe-core style impact level onto a severity.
    ///
    /// `critical` and `serious` are errors, `moderate` is a warning, `minor`
    /// is a notice. Anything else, including a missing impact, is a warning.
    pub fn from_impact(impact: Option<&str>) -> Self {
        match impact.map(str::trim) {
            Some("critical") | Some("serious") => Self::Error,
            Some("moderate") => Self::Warning,
            Some("minor") => Self::Notice,
            _ => Self::Warning,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An accessibility issue detected on a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// Severity level of this issue
    pub severity: Severity,
    /// Stable identifier of the rule that fired
    pub code: String,
    /// Human-readable description
    pub message: String,
    /// Best-effort CSS-like locator for the offending element
    pub selector: String,
    /// Truncated markup of the offending element
    pub context: String,
    /// Documentation link, when the issue came from an external engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_url: Option<String>,
}

impl Issue {
    /// Create a new issue. The context is truncated to [`CONTEXT_LIMIT`] characters.
    pub fn new(
        code: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        selector: impl Into<String>,
        context: &str,
    ) -> Self {
        Self {
            severity,
            code: code.into(),
            message: message.into(),
            selector: selector.into(),
            context: truncate_chars(context, CONTEXT_LIMIT),
            help_url: None,
        }
    }

    /// Attach a documentation link
    pub fn with_help_url(mut self, url: impl Into<String>) -> Self {
        self.help_url = Some(url.into());
        self
    }

    /// Whether this issue is blocking
    pub fn is_blocking(&self) -> bool {
        self.severity.is_blocking()
    }
}

/// Truncate a string to at most `limit` characters
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

/// Issue counts by severity, always computed from a report's issues
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub errors: usize,
    pub warnings: usize,
    pub notices: usize,
}

impl Summary {
    fn from_issues(issues: &[Issue]) -> Self {
        let mut summary = Self::default();
        for issue in issues {
            summary.total += 1;
            match issue.severity {
                Severity::Error => summary.errors += 1,
                Severity::Warning => summary.warnings += 1,
                Severity::Notice => summary.notices += 1,
            }
        }
        summary
    }
}

/// Ordered issues produced by one scan.
///
/// Issues can only be appended; the summary is recomputed on demand so it
/// can never disagree with the issue list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    issues: Vec<Issue>,
}

impl Report {
    /// Create a new empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an issue
    pub fn push(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    /// Issues in check order, then document order
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// Counts by severity
    pub fn summary(&self) -> Summary {
        Summary::from_issues(&self.issues)
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Whether the report contains blocking issues
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(Issue::is_blocking)
    }

    /// Build a new report keeping only issues at or above `min_severity`,
    /// capped at `max_issues`. Order is preserved.
    pub fn filtered(&self, min_severity: Option<Severity>, max_issues: Option<usize>) -> Self {
        let mut issues: Vec<Issue> = self
            .issues
            .iter()
            .filter(|i| min_severity.map_or(true, |min| i.severity >= min))
            .cloned()
            .collect();

        if let Some(max) = max_issues {
            issues.truncate(max);
        }

        Self { issues }
    }
}

impl FromIterator<Issue> for Report {
    fn from_iter<T: IntoIterator<Item = Issue>>(iter: T) -> Self {
        Self {
            issues: iter.into_iter().collect(),
        }
    }
}

impl Extend<Issue> for Report {
    fn extend<T: IntoIterator<Item = Issue>>(&mut self, iter: T) {
        self.issues.extend(iter);
    }
}

impl Serialize for Report {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Report", 2)?;
        state.serialize_field("issues", &self.issues)?;
        state.serialize_field("summary", &self.summary())?;
        state.end()
    }
}

/// Name used for the built-in heuristic checks in reports
pub const HEURISTIC_RUNNER: &str = "heuristic";

/// Title reported when a page has none
pub const UNKNOWN_TITLE: &str = "Unknown";

/// The result of checking one page
#[derive(Debug, Clone, PartialEq)]
pub struct PageReport {
    /// URL the page was loaded from
    pub page_url: String,
    /// Which runner produced the issues (`heuristic`, `axe-core`, `pa11y`)
    pub test_runner: String,
    /// Trimmed document title, or "Unknown"
    pub document_title: String,
    /// Issues found on the page
    pub report: Report,
    /// When the check completed
    pub timestamp: DateTime<Utc>,
}

impl PageReport {
    /// Create a page report stamped with the current time
    pub fn new(
        page_url: impl Into<String>,
        test_runner: impl Into<String>,
        document_title: Option<String>,
        report: Report,
    ) -> Self {
        let document_title = document_title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

        Self {
            page_url: page_url.into(),
            test_runner: test_runner.into(),
            document_title,
            report,
            timestamp: Utc::now(),
        }
    }

    pub fn issues(&self) -> &[Issue] {
        self.report.issues()
    }

    pub fn summary(&self) -> Summary {
        self.report.summary()
    }

    pub fn has_errors(&self) -> bool {
        self.report.has_errors()
    }

    /// Same page, with a filtered issue list
    pub fn filtered(&self, min_severity: Option<Severity>, max_issues: Option<usize>) -> Self {
        Self {
            report: self.report.filtered(min_severity, max_issues),
            ..self.clone()
        }
    }
}

impl Serialize for PageReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("PageReport", 6)?;
        state.serialize_field("pageUrl", &self.page_url)?;
        state.serialize_field("testRunner", &self.test_runner)?;
        state.serialize_field("documentTitle", &self.document_title)?;
        state.serialize_field("issues", self.report.issues())?;
        state.serialize_field("summary", &self.report.summary())?;
        state.serialize_field("timestamp", &self.timestamp.to_rfc3339())?;
        state.end()
    }
}

/// Error types that can occur while checking a page
#[derive(Debug, thiserror::Error)]
pub enum A11yError {
    /// The caller supplied a missing or invalid target
    #[error("Invalid input: {message}")]
    Input { message: String },

    /// The page could not be retrieved
    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    /// Parsing or scanning failed unexpectedly
    #[error("Scan error: {message}")]
    Scan { message: String },

    /// An external accessibility engine failed
    #[error("Engine '{engine}' failed: {message}")]
    Engine { engine: String, message: String },

    /// Configuration file could not be loaded or is inconsistent
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A report could not be rendered
    #[error("Format error: {message}")]
    Format { message: String },

    /// File could not be read or accessed
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl A11yError {
    /// Create an input error
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
        }
    }

    /// Create a fetch error
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a scan error
    pub fn scan(message: impl Into<String>) -> Self {
        Self::Scan {
            message: message.into(),
        }
    }

    /// Create an engine error
    pub fn engine(engine: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Engine {
            engine: engine.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a format error
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    /// Whether the caller is at fault (maps to a 400-class response)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Input { .. })
    }
}

/// Result type for a11y-guardian operations
pub type A11yResult<T> = Result<T, A11yError>;
