//! Acceptance policies and strictness levels

use edi_validation::Severity;
use serde::{Deserialize, Serialize};

/// Policy for handling files that fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptancePolicy {
    /// Report every file; the batch always succeeds
    #[default]
    AcceptAll,

    /// Stop scheduling files after the first failure
    FailAll,

    /// Set failed files aside and continue with the rest
    Quarantine,
}

/// Which diagnostics make a parsed file fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrictnessLevel {
    /// Only fatal diagnostics fail a file (real-world EDI)
    #[default]
    Permissive,

    /// Errors fail a file
    Standard,

    /// Warnings fail a file, and characters are checked against the
    /// syntax level's repertoire
    Strict,
}

impl StrictnessLevel {
    /// Lowest severity that fails a file
    pub fn threshold(self) -> Severity {
        match self {
            StrictnessLevel::Permissive => Severity::Fatal,
            StrictnessLevel::Standard => Severity::Error,
            StrictnessLevel::Strict => Severity::Warning,
        }
    }

    /// Whether a diagnostic of `severity` fails a file
    pub fn rejects(self, severity: Severity) -> bool {
        severity >= self.threshold()
    }
}
