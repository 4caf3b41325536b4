//! Page analysis strategies for A11y Guardian
//!
//! CDD Principle: Domain Services - analyzers turn a page request into a page report
//! - The heuristic analyzer runs the built-in checks over a parsed document
//! - The engine analyzer delegates to an external accessibility engine process
//! - Configuration selects exactly one strategy; callers only see PageAnalyzer

pub mod checks;
pub mod engine;
pub mod heuristic;

use crate::config::{GuardianConfig, Strategy};
use crate::domain::issues::{A11yError, A11yResult, PageReport};
use crate::fetch::{Fetcher, HttpFetcher};
use async_trait::async_trait;
use reqwest::Url;
use std::sync::Arc;

pub use checks::Rule;
pub use engine::{EngineAnalyzer, EngineKind};
pub use heuristic::{HeuristicAnalyzer, HeuristicScanner};

/// A request to check one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Page to check
    pub url: Url,
    /// Rule codes to restrict the check to (empty means all)
    pub rules: Vec<String>,
}

impl PageRequest {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            rules: Vec::new(),
        }
    }

    pub fn with_rules(mut self, rules: Vec<String>) -> Self {
        self.rules = rules;
        self
    }
}

/// Parse a user-supplied target into a URL.
///
/// Only `http` and `https` are accepted, plus `file` when `allow_files` is set.
pub fn parse_target(raw: &str, allow_files: bool) -> A11yResult<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(A11yError::input("URL is required"));
    }

    let url = Url::parse(raw).map_err(|e| A11yError::input(format!("Invalid URL '{raw}': {e}")))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        "file" if allow_files => Ok(url),
        scheme => Err(A11yError::input(format!(
            "Unsupported URL scheme '{scheme}': only http and https pages can be checked"
        ))),
    }
}

/// A strategy for producing an accessibility report for one page
#[async_trait]
pub trait PageAnalyzer: Send + Sync {
    /// Runner name reported as `testRunner`
    fn name(&self) -> &'static str;

    /// Check one page
    async fn analyze(&self, request: &PageRequest) -> A11yResult<PageReport>;
}

/// Build the analyzer selected by the configuration's strategy
pub fn from_config(config: &GuardianConfig) -> A11yResult<Arc<dyn PageAnalyzer>> {
    match config.strategy {
        Strategy::Heuristic => {
            let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(&config.fetch)?);
            Ok(Arc::new(HeuristicAnalyzer::new(
                HeuristicScanner::from_config(config),
                fetcher,
            )))
        }
        Strategy::Engine => {
            let settings = config.engine.clone().ok_or_else(|| {
                A11yError::config("Strategy 'engine' requires an 'engine' section")
            })?;
            Ok(Arc::new(EngineAnalyzer::new(settings)))
        }
    }
}
