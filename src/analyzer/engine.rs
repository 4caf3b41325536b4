//! Adapter for external accessibility engines (axe-core, pa11y)
//!
//! Architecture: Anti-Corruption Layer - engine JSON is translated into domain issues here
//! - One child process per request; it is killed when the request future is dropped
//! - axe-core impacts and pa11y issue types both map onto Severity
//! - Nothing outside this module knows either engine's output format

use crate::analyzer::{PageAnalyzer, PageRequest};
use crate::config::EngineSettings;
use crate::domain::issues::{A11yError, A11yResult, Issue, PageReport, Report, Severity};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

/// Placeholder in engine arguments replaced with the page URL
pub const URL_PLACEHOLDER: &str = "{url}";

/// Output format of the external engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// axe-core results (`violations` with impacts)
    Axe,
    /// pa11y JSON reporter output (issues with types)
    Pa11y,
}

impl EngineKind {
    /// Runner name reported as `testRunner`
    pub fn runner_name(self) -> &'static str {
        match self {
            Self::Axe => "axe-core",
            Self::Pa11y => "pa11y",
        }
    }
}

/// Runs an external engine process per request and maps its findings
#[derive(Debug, Clone)]
pub struct EngineAnalyzer {
    settings: EngineSettings,
}

impl EngineAnalyzer {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    /// Arguments with the URL substituted, or appended when no placeholder is present
    fn arguments(&self, url: &str) -> Vec<String> {
        let mut args: Vec<String> = self
            .settings
            .args
            .iter()
            .map(|arg| arg.replace(URL_PLACEHOLDER, url))
            .collect();

        if !self.settings.args.iter().any(|arg| arg.contains(URL_PLACEHOLDER)) {
            args.push(url.to_string());
        }

        args
    }

    fn error(&self, message: impl Into<String>) -> A11yError {
        A11yError::engine(self.settings.kind.runner_name(), message)
    }

    /// Run the engine and return its standard output
    async fn run(&self, url: &str) -> A11yResult<String> {
        let mut command = Command::new(&self.settings.program);
        command
            .args(self.arguments(url))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command
            .spawn()
            .map_err(|e| self.error(format!("Failed to start '{}': {e}", self.settings.program)))?;

        // Dropping the wait future on timeout drops the child, which kills it
        let timeout = Duration::from_millis(self.settings.timeout_ms);
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| self.error(format!("Timed out after {}ms", self.settings.timeout_ms)))?
            .map_err(|e| self.error(format!("Failed to collect output: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();

        // pa11y exits with 2 when it found issues; treat any JSON-bearing run as a result
        if !output.status.success() && stdout.trim().is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.error(format!(
                "Exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        if !output.status.success() {
            warn!(status = %output.status, "Engine exited unsuccessfully but produced output");
        }

        Ok(stdout)
    }
}

#[async_trait]
impl PageAnalyzer for EngineAnalyzer {
    fn name(&self) -> &'static str {
        self.settings.kind.runner_name()
    }

    #[instrument(skip(self, request), fields(url = %request.url, engine = self.name()))]
    async fn analyze(&self, request: &PageRequest) -> A11yResult<PageReport> {
        let output = self.run(request.url.as_str()).await?;

        let parsed = match self.settings.kind {
            EngineKind::Axe => parse_axe_output(&output),
            EngineKind::Pa11y => parse_pa11y_output(&output),
        }
        .map_err(|e| self.error(format!("Unreadable output: {e}")))?;

        let report: Report = parsed
            .issues
            .into_iter()
            .filter(|issue| request.rules.is_empty() || request.rules.iter().any(|r| r.trim() == issue.code))
            .collect();

        debug!(issues = report.len(), "Engine run finished");
        Ok(PageReport::new(
            request.url.as_str(),
            self.name(),
            parsed.document_title,
            report,
        ))
    }
}

/// Issues and metadata recovered from an engine's output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOutput {
    pub document_title: Option<String>,
    pub issues: Vec<Issue>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AxeDocument {
    Many(Vec<AxeResults>),
    One(AxeResults),
}

#[derive(Debug, Deserialize)]
struct AxeResults {
    #[serde(default)]
    violations: Vec<AxeViolation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AxeViolation {
    id: String,
    impact: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    help: String,
    help_url: Option<String>,
    #[serde(default)]
    nodes: Vec<AxeNode>,
}

#[derive(Debug, Deserialize)]
struct AxeNode {
    #[serde(default)]
    html: String,
    #[serde(default)]
    target: Vec<serde_json::Value>,
}

/// Flatten an axe target list (which may nest for iframes and shadow roots)
fn flatten_target(values: &[serde_json::Value], parts: &mut Vec<String>) {
    for value in values {
        match value {
            serde_json::Value::String(s) => parts.push(s.clone()),
            serde_json::Value::Array(nested) => flatten_target(nested, parts),
            other => parts.push(other.to_string()),
        }
    }
}

/// Parse axe-core results: a results object, or an array whose first entry is used
pub fn parse_axe_output(output: &str) -> Result<EngineOutput, serde_json::Error> {
    let results = match serde_json::from_str::<AxeDocument>(output.trim())? {
        AxeDocument::One(results) => Some(results),
        AxeDocument::Many(all) => all.into_iter().next(),
    };

    let mut issues = Vec::new();
    for violation in results.map(|r| r.violations).unwrap_or_default() {
        let severity = Severity::from_impact(violation.impact.as_deref());
        let message = format!("{} ({})", violation.help, violation.description);

        for node in &violation.nodes {
            let mut parts = Vec::new();
            flatten_target(&node.target, &mut parts);

            let mut issue = Issue::new(
                violation.id.as_str(),
                severity,
                message.as_str(),
                parts.join(" "),
                &node.html,
            );
            if let Some(url) = &violation.help_url {
                issue = issue.with_help_url(url.as_str());
            }
            issues.push(issue);
        }
    }

    Ok(EngineOutput {
        document_title: None,
        issues,
    })
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Pa11yDocument {
    Issues(Vec<Pa11yIssue>),
    Results(Pa11yResults),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pa11yResults {
    document_title: Option<String>,
    #[serde(default)]
    issues: Vec<Pa11yIssue>,
}

#[derive(Debug, Deserialize)]
struct Pa11yIssue {
    code: String,
    #[serde(rename = "type")]
    issue_type: Option<String>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    selector: String,
}

/// Parse pa11y output: a bare issue array, or a results object with `issues`
pub fn parse_pa11y_output(output: &str) -> Result<EngineOutput, serde_json::Error> {
    let (document_title, raw_issues) = match serde_json::from_str::<Pa11yDocument>(output.trim())? {
        Pa11yDocument::Issues(issues) => (None, issues),
        Pa11yDocument::Results(results) => (results.document_title, results.issues),
    };

    let issues = raw_issues
        .into_iter()
        .map(|raw| {
            let severity = raw
                .issue_type
                .as_deref()
                .and_then(Severity::from_name)
                .unwrap_or(Severity::Warning);
            Issue::new(
                raw.code,
                severity,
                raw.message,
                raw.selector,
                raw.context.as_deref().unwrap_or(""),
            )
        })
        .collect();

    Ok(EngineOutput {
        document_title,
        issues,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Url;
    use std::io::Write;

    const AXE_RESULTS: &str = r#"{
        "url": "https://example.com",
        "violations": [
            {
                "id": "image-alt",
                "impact": "critical",
                "description": "Ensures <img> elements have alternate text",
                "help": "Images must have alternate text",
                "helpUrl": "https://dequeuniversity.com/rules/axe/4.8/image-alt",
                "nodes": [
                    { "html": "<img src=\"a.jpg\">", "target": ["img"] },
                    { "html": "<img src=\"b.jpg\">", "target": [["iframe#ad", "img.banner"]] }
                ]
            },
            {
                "id": "region",
                "impact": "moderate",
                "description": "Ensures all page content is contained by landmarks",
                "help": "All page content should be contained by landmarks",
                "nodes": [ { "html": "<div>", "target": ["div"] } ]
            },
            {
                "id": "odd",
                "impact": "unheard-of",
                "description": "d",
                "help": "h",
                "nodes": [ { "html": "<p>", "target": ["p"] } ]
            }
        ]
    }"#;

    const PA11Y_ISSUES: &str = r#"[
        {
            "code": "WCAG2AA.Principle1.Guideline1_1.1_1_1.H37",
            "type": "error",
            "typeCode": 1,
            "message": "Img element missing an alt attribute.",
            "context": "<img src=\"a.jpg\">",
            "selector": "html > body > img",
            "runner": "htmlcs"
        },
        {
            "code": "WCAG2AA.Principle2.Guideline2_4.2_4_2.H25.2",
            "type": "notice",
            "message": "Check that the title element describes the document.",
            "context": "<title>Shop</title>",
            "selector": "html > head > title"
        },
        {
            "code": "custom",
            "type": "mystery",
            "message": "m",
            "context": null,
            "selector": "div"
        }
    ]"#;

    #[test]
    fn test_parse_axe_output() {
        let output = parse_axe_output(AXE_RESULTS).unwrap();
        assert_eq!(output.issues.len(), 4);

        let first = &output.issues[0];
        assert_eq!(first.code, "image-alt");
        assert_eq!(first.severity, Severity::Error);
        assert_eq!(
            first.message,
            "Images must have alternate text (Ensures <img> elements have alternate text)"
        );
        assert_eq!(first.selector, "img");
        assert_eq!(first.context, "<img src=\"a.jpg\">");
        assert!(first.help_url.is_some());

        assert_eq!(output.issues[1].selector, "iframe#ad img.banner");
        assert_eq!(output.issues[2].severity, Severity::Warning);
        assert!(output.issues[2].help_url.is_none());
        assert_eq!(output.issues[3].severity, Severity::Warning);
    }

    #[test]
    fn test_parse_axe_cli_array_output() {
        let wrapped = format!("[{AXE_RESULTS}]");
        assert_eq!(parse_axe_output(&wrapped).unwrap().issues.len(), 4);
        assert!(parse_axe_output("[]").unwrap().issues.is_empty());
        assert!(parse_axe_output("not json").is_err());
    }

    #[test]
    fn test_parse_pa11y_output() {
        let output = parse_pa11y_output(PA11Y_ISSUES).unwrap();
        assert_eq!(output.document_title, None);

        let severities: Vec<_> = output.issues.iter().map(|i| i.severity).collect();
        assert_eq!(severities, [Severity::Error, Severity::Notice, Severity::Warning]);
        assert_eq!(output.issues[0].selector, "html > body > img");
        assert_eq!(output.issues[2].context, "");
    }

    #[test]
    fn test_parse_pa11y_results_object() {
        let wrapped = format!(r#"{{"documentTitle": "Shop", "pageUrl": "https://x", "issues": {PA11Y_ISSUES}}}"#);
        let output = parse_pa11y_output(&wrapped).unwrap();
        assert_eq!(output.document_title.as_deref(), Some("Shop"));
        assert_eq!(output.issues.len(), 3);
    }

    fn settings(kind: EngineKind, program: &str, args: &[&str], timeout_ms: u64) -> EngineSettings {
        EngineSettings {
            kind,
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            timeout_ms,
        }
    }

    #[test]
    fn test_url_placeholder_substitution() {
        let engine = EngineAnalyzer::new(settings(
            EngineKind::Axe,
            "npx",
            &["@axe-core/cli", "{url}", "--stdout"],
            1000,
        ));
        assert_eq!(
            engine.arguments("https://x"),
            ["@axe-core/cli", "https://x", "--stdout"]
        );

        let appended = EngineAnalyzer::new(settings(EngineKind::Pa11y, "pa11y", &["--reporter", "json"], 1000));
        assert_eq!(appended.arguments("https://x"), ["--reporter", "json", "https://x"]);
    }

    fn request() -> PageRequest {
        PageRequest::new(Url::parse("https://example.com").unwrap())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_engine_process_output_is_mapped() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{PA11Y_ISSUES}").unwrap();

        // The URL is appended and lands in $0, which the script ignores
        let script = format!("cat '{}'; exit 2", file.path().display());
        let engine = EngineAnalyzer::new(settings(EngineKind::Pa11y, "sh", &["-c", &script], 5_000));

        let page = engine.analyze(&request()).await.unwrap();
        assert_eq!(page.test_runner, "pa11y");
        assert_eq!(page.summary().total, 3);
        assert_eq!(page.summary().errors, 1);

        let filtered = engine
            .analyze(&request().with_rules(vec!["custom".to_string()]))
            .await
            .unwrap();
        assert_eq!(filtered.summary().total, 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_engine_timeout() {
        let engine = EngineAnalyzer::new(settings(EngineKind::Axe, "sh", &["-c", "sleep 10"], 100));
        let err = engine.analyze(&request()).await.unwrap_err();
        assert!(matches!(err, A11yError::Engine { .. }));
        assert!(err.to_string().contains("Timed out"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_engine_failure_without_output() {
        let engine = EngineAnalyzer::new(settings(
            EngineKind::Axe,
            "sh",
            &["-c", "echo 'browser crashed' >&2; exit 1"],
            5_000,
        ));
        let err = engine.analyze(&request()).await.unwrap_err();
        assert!(err.to_string().contains("browser crashed"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_engine_garbage_output() {
        let engine = EngineAnalyzer::new(settings(EngineKind::Axe, "sh", &["-c", "echo hello"], 5_000));
        let err = engine.analyze(&request()).await.unwrap_err();
        assert!(err.to_string().contains("Unreadable output"));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let engine = EngineAnalyzer::new(settings(
            EngineKind::Axe,
            "definitely-not-an-installed-engine",
            &[],
            1_000,
        ));
        let err = engine.analyze(&request()).await.unwrap_err();
        assert!(matches!(err, A11yError::Engine { .. }));
    }
}
