//! Heuristic scanner: runs the built-in checks over a parsed document
//!
//! Code Quality Principle: Specialized Analysis Services - the scanner owns rule selection only
//! - Implements PageAnalyzer for pages fetched over HTTP or read from disk
//! - Parsing and scanning run on the blocking pool; a panic there becomes a ScanError
//! - The scanner itself is pure and may be shared across threads

use crate::analyzer::checks::Rule;
use crate::analyzer::{PageAnalyzer, PageRequest};
use crate::config::GuardianConfig;
use crate::dom::Document;
use crate::domain::issues::{A11yError, A11yResult, PageReport, Report, Severity, HEURISTIC_RUNNER};
use crate::fetch::Fetcher;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

/// A rule together with the severity it reports at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleSetting {
    pub rule: Rule,
    pub severity: Severity,
}

/// Runs the fixed, ordered list of heuristic checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeuristicScanner {
    rules: Vec<RuleSetting>,
}

impl HeuristicScanner {
    /// Scanner with every rule enabled at its default severity
    pub fn new() -> Self {
        Self {
            rules: Rule::ALL
                .into_iter()
                .map(|rule| RuleSetting {
                    rule,
                    severity: rule.default_severity(),
                })
                .collect(),
        }
    }

    /// Scanner honoring the enable flags and severity overrides in `config`
    pub fn from_config(config: &GuardianConfig) -> Self {
        Self {
            rules: Rule::ALL
                .into_iter()
                .filter(|rule| config.rule_enabled(*rule))
                .map(|rule| RuleSetting {
                    rule,
                    severity: config.effective_severity(rule),
                })
                .collect(),
        }
    }

    /// Restrict the scanner to the given rule codes.
    ///
    /// An empty list keeps every rule. Unknown codes are an input error.
    pub fn restricted_to(&self, codes: &[String]) -> A11yResult<Self> {
        if codes.is_empty() {
            return Ok(self.clone());
        }

        let wanted = parse_rule_codes(codes)?;
        Ok(Self {
            rules: self
                .rules
                .iter()
                .filter(|setting| wanted.contains(&setting.rule))
                .copied()
                .collect(),
        })
    }

    /// Rules this scanner will run, in execution order
    pub fn rules(&self) -> &[RuleSetting] {
        &self.rules
    }

    /// Scan a document. Never fails.
    pub fn scan(&self, doc: &Document) -> Report {
        let mut issues = Vec::new();

        for setting in &self.rules {
            let before = issues.len();
            setting.rule.run(doc, setting.severity, &mut issues);
            debug!(rule = setting.rule.code(), found = issues.len() - before, "Ran check");
        }

        issues.into_iter().collect()
    }
}

impl Default for HeuristicScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse rule codes, rejecting unknown ones
pub fn parse_rule_codes(codes: &[String]) -> A11yResult<Vec<Rule>> {
    codes
        .iter()
        .map(|code| {
            Rule::from_code(code).ok_or_else(|| {
                A11yError::input(format!(
                    "Unknown rule '{}'. Available rules: {}",
                    code,
                    Rule::ALL.map(Rule::code).join(", ")
                ))
            })
        })
        .collect()
}

/// Scan a document with every rule at its default severity
pub fn scan(doc: &Document) -> Report {
    HeuristicScanner::new().scan(doc)
}

/// Parse HTML and scan it, returning the report and the document title
pub fn scan_html(scanner: &HeuristicScanner, html: &str) -> (Report, Option<String>) {
    let doc = Document::parse(html);
    (scanner.scan(&doc), doc.title())
}

/// Run CPU-bound document work on the blocking pool.
///
/// A panic inside `work` surfaces as a `ScanError` instead of unwinding
/// into the caller.
pub async fn run_blocking<F, T>(work: F) -> A11yResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| A11yError::scan(format!("Scan task failed: {e}")))
}

/// Fetches a page, then parses and scans it with the heuristic checks
pub struct HeuristicAnalyzer {
    scanner: HeuristicScanner,
    fetcher: Arc<dyn Fetcher>,
}

impl HeuristicAnalyzer {
    pub fn new(scanner: HeuristicScanner, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { scanner, fetcher }
    }
}

#[async_trait]
impl PageAnalyzer for HeuristicAnalyzer {
    fn name(&self) -> &'static str {
        HEURISTIC_RUNNER
    }

    #[instrument(skip(self, request), fields(url = %request.url))]
    async fn analyze(&self, request: &PageRequest) -> A11yResult<PageReport> {
        let scanner = self.scanner.restricted_to(&request.rules)?;
        let html = self.fetcher.fetch(&request.url).await?;

        let (report, title) = run_blocking(move || scan_html(&scanner, &html)).await?;

        debug!(issues = report.len(), "Heuristic scan finished");
        Ok(PageReport::new(request.url.as_str(), HEURISTIC_RUNNER, title, report))
    }
}
