//! Domain layer for A11y Guardian
//!
//! CDD Principle: Domain Model - Pure business logic for accessibility reporting
//! - Contains issues, reports, summaries and the error taxonomy
//! - Independent of infrastructure concerns like HTTP, processes or file systems
//! - Expresses the ubiquitous language of accessibility checking

pub mod issues;

// Re-export main domain types for convenience
pub use issues::*;
