//! Diagnostic collection for a single parse call

use crate::diagnostic::{ErrorKind, ParseError, Severity};
use edi_ir::Location;
use serde::Serialize;
use tracing::{debug, trace};

/// Ordered diagnostics of one parse
///
/// Diagnostics keep the order they were reported in. A collector is created
/// per parse call and never shared.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: Vec<ParseError>,
}

impl ErrorCollector {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic of `kind` at `location`
    ///
    /// Returns the recorded diagnostic so data items can be appended.
    pub fn report(&mut self, kind: ErrorKind, location: Location) -> &mut ParseError {
        self.push(ParseError::new(kind).at(location));
        let last = self.errors.len() - 1;
        &mut self.errors[last]
    }

    /// Record a fully built diagnostic
    pub fn push(&mut self, error: ParseError) {
        match error.severity() {
            Severity::Info => trace!(kind = %error.kind(), location = ?error.location(), "Diagnostic"),
            _ => debug!(
                kind = %error.kind(),
                severity = %error.severity(),
                location = ?error.location(),
                "Diagnostic"
            ),
        }
        self.errors.push(error);
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Whether anything of severity `Error` or worse was recorded
    pub fn has_errors(&self) -> bool {
        self.errors.iter().any(|e| e.severity() >= Severity::Error)
    }

    /// Number of diagnostics of exactly `severity`
    pub fn count(&self, severity: Severity) -> usize {
        self.errors
            .iter()
            .filter(|e| e.severity() == severity)
            .count()
    }

    /// Whether a diagnostic of `kind` was recorded
    pub fn contains(&self, kind: ErrorKind) -> bool {
        self.errors.iter().any(|e| e.kind() == kind)
    }

    /// Severity tally of everything collected so far
    pub fn summary(&self) -> DiagnosticSummary {
        DiagnosticSummary::from_errors(&self.errors)
    }

    pub fn into_errors(self) -> Vec<ParseError> {
        self.errors
    }
}

/// Severity tally of a list of diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticSummary {
    pub fatal: usize,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
}

impl DiagnosticSummary {
    pub fn from_errors(errors: &[ParseError]) -> Self {
        let mut summary = Self::default();
        for error in errors {
            match error.severity() {
                Severity::Fatal => summary.fatal += 1,
                Severity::Error => summary.errors += 1,
                Severity::Warning => summary.warnings += 1,
                Severity::Info => summary.infos += 1,
            }
        }
        summary
    }

    /// Whether the parse produced no `Error` or `Fatal` diagnostic
    pub fn is_clean(&self) -> bool {
        self.fatal == 0 && self.errors == 0
    }
}
