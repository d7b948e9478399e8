//! Output formatting for ahkmeta results.
//!
//! Supports two output formats:
//! - Pretty: colored terminal output for human readability
//! - JSON: structured output for editors and scripts

use std::io::Write;

use clap::ValueEnum;
use colored::*;
use serde::{Deserialize, Serialize};

use crate::analysis::{FunctionMetadata, VariableInfo};
use crate::diagnostics::{Diagnostic, DiagnosticReport, Severity};

/// Output format selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Pretty,
    Json,
}

// =============================================================================
// Report structures
// =============================================================================

/// Functions declared in one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileOutline {
    pub path: String,
    pub functions: Vec<FunctionMetadata>,
}

/// Result of the outline command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlineReport {
    pub version: String,
    pub files_scanned: usize,
    pub files: Vec<FileOutline>,
}

impl OutlineReport {
    pub fn new(files: Vec<FileOutline>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            files_scanned: files.len(),
            files,
        }
    }

    pub fn function_count(&self) -> usize {
        self.files.iter().map(|f| f.functions.len()).sum()
    }
}

/// Result of the hover command. Line and character are 1-indexed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoverReport {
    pub version: String,
    pub path: String,
    pub line: usize,
    pub character: usize,
    pub function: Option<FunctionMetadata>,
}

impl HoverReport {
    pub fn new(path: &str, line: usize, character: usize, function: Option<FunctionMetadata>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            path: path.to_string(),
            line,
            character,
            function,
        }
    }
}

/// Result of the lint command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LintReport {
    pub version: String,
    pub files_scanned: usize,
    pub passed: bool,
    pub errors: usize,
    pub warnings: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl From<DiagnosticReport> for LintReport {
    fn from(report: DiagnosticReport) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            files_scanned: report.scanned,
            passed: !report.has_errors(),
            errors: report.count(Severity::Error),
            warnings: report.count(Severity::Warning),
            diagnostics: report.diagnostics,
        }
    }
}

// =============================================================================
// JSON Format
// =============================================================================

/// Write any report as pretty-printed JSON followed by a newline.
pub fn write_json<W: Write, T: Serialize>(out: &mut W, report: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    writeln!(out, "{}", json)?;
    Ok(())
}

// =============================================================================
// Pretty Format
// =============================================================================

fn write_header<W: Write>(out: &mut W) -> std::io::Result<()> {
    writeln!(out)?;
    writeln!(out, "  {} v{}", "ahkmeta".cyan().bold(), env!("CARGO_PKG_VERSION"))?;
    writeln!(out)
}

/// Write an outline in pretty (human-readable) format.
pub fn write_outline_pretty<W: Write>(out: &mut W, report: &OutlineReport) -> std::io::Result<()> {
    write_header(out)?;

    for file in &report.files {
        let plural = if file.functions.len() != 1 { "s" } else { "" };
        writeln!(
            out,
            "  {}  {}",
            file.path.blue(),
            format!("({} function{})", file.functions.len(), plural).dimmed()
        )?;
        writeln!(out)?;

        for func in &file.functions {
            write_function_line(out, func)?;
        }
        if !file.functions.is_empty() {
            writeln!(out)?;
        }
    }

    writeln!(
        out,
        "  {}",
        format!(
            "{} functions in {} files",
            report.function_count(),
            report.files_scanned
        )
        .dimmed()
    )
}

fn write_function_line<W: Write>(out: &mut W, func: &FunctionMetadata) -> std::io::Result<()> {
    let position = format!(
        "{}:{}",
        func.location.start_line + 1,
        func.location.start_character + 1
    );
    let name = match func.class_name {
        Some(ref class) => format!("{}.{}", class, func.signature()),
        None => func.signature(),
    };
    write!(out, "    {:<8} {}", position.dimmed(), name.bold())?;
    write!(out, "  {}", arity(func).dimmed())?;
    if func.is_static {
        write!(out, " {}", "static".dimmed())?;
    }
    writeln!(out)?;

    if let Some(ref err) = func.parse_error {
        writeln!(out, "             {} {}", "!".yellow(), err.yellow())?;
    }
    if let Some(summary) = func.documentation.as_deref().and_then(|d| d.lines().next()) {
        writeln!(out, "             {}", summary.dimmed())?;
    }
    write_variable_summary(out, func)
}

fn write_variable_summary<W: Write>(out: &mut W, func: &FunctionMetadata) -> std::io::Result<()> {
    let groups = [
        ("static", &func.static_variables),
        ("global", &func.global_variables),
        ("local", &func.local_variables),
    ];
    let parts: Vec<String> = groups
        .iter()
        .filter(|(_, vars)| !vars.is_empty())
        .map(|(label, vars)| format!("{}: {}", label, variable_names(vars)))
        .collect();
    if parts.is_empty() {
        return Ok(());
    }
    writeln!(out, "             {}", parts.join("  ").dimmed())
}

fn variable_names(vars: &[VariableInfo]) -> String {
    vars.iter()
        .map(|v| v.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn arity(func: &FunctionMetadata) -> String {
    match func.max_params.count() {
        Some(max) if max == func.min_params => format!("[{}]", max),
        Some(max) => format!("[{}..{}]", func.min_params, max),
        None => format!("[{}..]", func.min_params),
    }
}

/// Write a hover result in pretty (human-readable) format.
pub fn write_hover_pretty<W: Write>(out: &mut W, report: &HoverReport) -> std::io::Result<()> {
    let Some(ref func) = report.function else {
        return writeln!(
            out,
            "  {}",
            format!(
                "no function at {}:{}:{}",
                report.path, report.line, report.character
            )
            .dimmed()
        );
    };

    writeln!(out)?;
    let name = match func.class_name {
        Some(ref class) => format!("{}.{}", class, func.signature()),
        None => func.signature(),
    };
    writeln!(out, "  {}", name.bold())?;
    writeln!(
        out,
        "  {}",
        format!("{}:{}  {}", report.path, func.location, arity(func)).dimmed()
    )?;

    if let Some(ref doc) = func.documentation {
        writeln!(out)?;
        for line in doc.lines() {
            writeln!(out, "  {}", line)?;
        }
    }

    if !func.parameters.is_empty() {
        writeln!(out)?;
        writeln!(out, "  {}", "Parameters:".bold())?;
        for p in &func.parameters {
            let mut flags = Vec::new();
            if p.is_by_ref {
                flags.push("byref".to_string());
            }
            if p.is_variadic {
                flags.push("variadic".to_string());
            } else if p.is_optional {
                flags.push("optional".to_string());
            }
            if let Some(ref default) = p.default {
                flags.push(format!("{} default {}", default.kind(), default.text()));
            }
            writeln!(out, "    {:<16} {}", p.name, flags.join(", ").dimmed())?;
        }
    }

    let vars: Vec<&VariableInfo> = func.variables().collect();
    if !vars.is_empty() {
        writeln!(out)?;
        writeln!(out, "  {}", "Variables:".bold())?;
        for v in vars {
            let hint = v.type_hint.as_deref().unwrap_or("");
            writeln!(
                out,
                "    {:<16} {:<7} {}",
                v.name,
                v.scope.as_str().dimmed(),
                hint.dimmed()
            )?;
        }
    }
    writeln!(out)
}

/// Write lint results in pretty (human-readable) format.
pub fn write_lint_pretty<W: Write>(out: &mut W, report: &LintReport) -> std::io::Result<()> {
    write_header(out)?;

    if report.passed {
        write!(out, "  {}", "✓ PASS".green())?;
    } else {
        write!(out, "  {}", "✗ FAIL".red())?;
    }
    writeln!(
        out,
        "  {} errors, {} warnings in {} files",
        report.errors, report.warnings, report.files_scanned
    )?;
    writeln!(out)?;

    if report.diagnostics.is_empty() {
        return Ok(());
    }

    writeln!(out, "  {} ({}):", "Diagnostics".bold(), report.diagnostics.len())?;
    writeln!(out)?;
    for d in &report.diagnostics {
        write_severity_tag(out, &d.severity)?;
        write!(out, "   {:<22}", d.rule.as_str().dimmed())?;
        write!(out, "{}", d.file.blue())?;
        writeln!(out, "{}", format!(":{}:{}", d.line, d.character).dimmed())?;

        // Message on next line, indented
        writeln!(out, "            {}", d.message)?;
        writeln!(out)?;
    }
    Ok(())
}

fn write_severity_tag<W: Write>(out: &mut W, severity: &Severity) -> std::io::Result<()> {
    match severity {
        Severity::Error => write!(out, "    {} ", "ERROR".red()),
        Severity::Warning => write!(out, "    {} ", "WARN ".yellow()),
        Severity::Info => write!(out, "    {} ", "INFO ".blue()),
    }
}
