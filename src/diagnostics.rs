//! Findings derived from analysis results.
//!
//! Nothing here scans text; every rule inspects the `FunctionMetadata` list
//! returned by `AnalysisContext::analyze`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::analysis::FunctionMetadata;

/// Severity levels for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Severity::Error),
            "warning" => Ok(Severity::Warning),
            "info" => Ok(Severity::Info),
            _ => Err(format!("unknown severity: {}", s)),
        }
    }
}

/// Rule names for different diagnostic types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticRule {
    DuplicateFunction,
    DuplicateParameter,
    MalformedSignature,
}

impl DiagnosticRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticRule::DuplicateFunction => "duplicate_function",
            DiagnosticRule::DuplicateParameter => "duplicate_parameter",
            DiagnosticRule::MalformedSignature => "malformed_signature",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "duplicate_function" => Some(DiagnosticRule::DuplicateFunction),
            "duplicate_parameter" => Some(DiagnosticRule::DuplicateParameter),
            "malformed_signature" => Some(DiagnosticRule::MalformedSignature),
            _ => None,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticRule::DuplicateFunction | DiagnosticRule::DuplicateParameter => {
                Severity::Error
            }
            DiagnosticRule::MalformedSignature => Severity::Warning,
        }
    }
}

impl std::fmt::Display for DiagnosticRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub rule: DiagnosticRule,
    pub message: String,
    pub file: String,
    /// 1-indexed line.
    pub line: usize,
    /// 1-indexed column.
    pub character: usize,
    pub severity: Severity,
}

/// Diagnostics for a set of files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub diagnostics: Vec<Diagnostic>,
    /// Number of files checked
    pub scanned: usize,
}

impl DiagnosticReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the diagnostics for one file.
    pub fn add_file(&mut self, diagnostics: Vec<Diagnostic>) {
        self.diagnostics.extend(diagnostics);
        self.scanned += 1;
    }

    /// Check if there are any error-severity diagnostics.
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

/// Run every rule over the analysis of `file`.
pub fn check(file: &str, functions: &[FunctionMetadata]) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    duplicate_functions(file, functions, &mut out);
    for func in functions {
        duplicate_parameters(file, func, &mut out);
        malformed_signature(file, func, &mut out);
    }
    out.sort_by_key(|d| (d.line, d.character));
    out
}

fn diagnostic(rule: DiagnosticRule, file: &str, func: &FunctionMetadata, message: String) -> Diagnostic {
    Diagnostic {
        rule,
        message,
        file: file.to_string(),
        line: func.location.start_line + 1,
        character: func.location.start_character + 1,
        severity: rule.severity(),
    }
}

/// Two declarations clash when they share a case-insensitive name, class and
/// enclosing function.
fn duplicate_functions(file: &str, functions: &[FunctionMetadata], out: &mut Vec<Diagnostic>) {
    let mut seen: HashMap<(Option<String>, Option<usize>, String), &FunctionMetadata> =
        HashMap::new();
    for (idx, func) in functions.iter().enumerate() {
        let parent = functions
            .iter()
            .enumerate()
            .filter(|(other, f)| *other != idx && f.location.encloses(&func.location))
            .max_by_key(|(_, f)| f.location.start())
            .map(|(other, _)| other);
        let key = (
            func.class_name.as_ref().map(|c| c.to_lowercase()),
            parent,
            func.name.to_lowercase(),
        );
        match seen.get(&key) {
            Some(first) => out.push(diagnostic(
                DiagnosticRule::DuplicateFunction,
                file,
                func,
                format!(
                    "{} is already declared at line {}",
                    func.qualified_name(),
                    first.location.start_line + 1
                ),
            )),
            None => {
                seen.insert(key, func);
            }
        }
    }
}

fn duplicate_parameters(file: &str, func: &FunctionMetadata, out: &mut Vec<Diagnostic>) {
    let mut seen: Vec<String> = Vec::new();
    for param in &func.parameters {
        if param.name == "*" {
            continue;
        }
        let lower = param.name.to_lowercase();
        if seen.contains(&lower) {
            out.push(diagnostic(
                DiagnosticRule::DuplicateParameter,
                file,
                func,
                format!(
                    "parameter {} appears more than once in {}",
                    param.name,
                    func.qualified_name()
                ),
            ));
        } else {
            seen.push(lower);
        }
    }
}

fn malformed_signature(file: &str, func: &FunctionMetadata, out: &mut Vec<Diagnostic>) {
    if let Some(ref err) = func.parse_error {
        out.push(diagnostic(
            DiagnosticRule::MalformedSignature,
            file,
            func,
            format!("cannot parse parameters of {}: {}", func.qualified_name(), err),
        ));
    }
}
