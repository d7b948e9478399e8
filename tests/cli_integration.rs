//! Integration tests for the command handlers and their output formats.

use std::fs;
use std::path::{Path, PathBuf};

use ahkmeta::cli::{
    self, HoverArgs, LintArgs, OutlineArgs, EXIT_FAILED, EXIT_SUCCESS,
};
use ahkmeta::report::{HoverReport, LintReport, OutlineReport, OutputFormat};
use ahkmeta::{AnalysisContext, Config, DiagnosticRule, Severity};

fn testdata_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata")
}

fn setup() -> (Config, AnalysisContext) {
    colored::control::set_override(false);
    let config = Config::parse_file(testdata_path().join("ahkmeta.yaml"))
        .expect("should parse fixture config");
    let ctx = cli::context_for(&config);
    (config, ctx)
}

fn outline_json(path: &Path) -> OutlineReport {
    let (config, ctx) = setup();
    let args = OutlineArgs {
        path: path.to_path_buf(),
        format: OutputFormat::Json,
    };
    let mut out = Vec::new();
    let code = cli::run_outline(&args, &config, &ctx, &mut out).expect("outline should run");
    assert_eq!(code, EXIT_SUCCESS);
    serde_json::from_slice(&out).expect("outline output should be JSON")
}

#[test]
fn test_outline_single_file() {
    let report = outline_json(&testdata_path().join("library.ahk"));
    assert_eq!(report.files_scanned, 1);
    assert_eq!(report.files[0].path, "library.ahk");
    assert_eq!(report.function_count(), 9);
}

#[test]
fn test_outline_directory() {
    let report = outline_json(&testdata_path());
    let paths: Vec<&str> = report.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["broken.ahk", "library.ahk"]);
}

#[test]
fn test_outline_respects_exclusions_and_extensions() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("vendor")).unwrap();
    fs::write(dir.path().join("main.ahk2"), "Main() {\n}").unwrap();
    fs::write(dir.path().join("vendor/dep.ahk"), "Dep() {\n}").unwrap();
    fs::write(dir.path().join("readme.md"), "Doc() {\n}").unwrap();

    let report = outline_json(dir.path());
    assert_eq!(report.files.len(), 1);
    assert_eq!(report.files[0].path, "main.ahk2");
    assert_eq!(report.files[0].functions[0].name, "Main");
}

#[test]
fn test_outline_pretty() {
    let (config, ctx) = setup();
    let args = OutlineArgs {
        path: testdata_path().join("library.ahk"),
        format: OutputFormat::Pretty,
    };
    let mut out = Vec::new();
    cli::run_outline(&args, &config, &ctx, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert!(text.contains("library.ahk"));
    assert!(text.contains("(9 functions)"));
    assert!(text.contains("Counter.Create(start := 0)"));
    assert!(text.contains("global: PadCount"));
}

#[test]
fn test_hover_json() {
    let (config, ctx) = setup();
    let args = HoverArgs {
        file: testdata_path().join("library.ahk"),
        line: 42,
        character: 9,
        format: OutputFormat::Json,
    };
    let mut out = Vec::new();
    cli::run_hover(&args, &config, &ctx, &mut out).unwrap();

    let report: HoverReport = serde_json::from_slice(&out).unwrap();
    let func = report.function.expect("position is inside Counter.Add");
    assert_eq!(func.qualified_name(), "Counter.Add");
    assert_eq!(report.line, 42);
}

#[test]
fn test_hover_outside_any_function() {
    let (config, ctx) = setup();
    let args = HoverArgs {
        file: testdata_path().join("library.ahk"),
        line: 1,
        character: 1,
        format: OutputFormat::Json,
    };
    let mut out = Vec::new();
    cli::run_hover(&args, &config, &ctx, &mut out).unwrap();
    let report: HoverReport = serde_json::from_slice(&out).unwrap();
    assert!(report.function.is_none());
}

#[test]
fn test_hover_missing_file_is_an_error() {
    let (config, ctx) = setup();
    let args = HoverArgs {
        file: testdata_path().join("missing.ahk"),
        line: 1,
        character: 1,
        format: OutputFormat::Pretty,
    };
    assert!(cli::run_hover(&args, &config, &ctx, &mut Vec::new()).is_err());
}

#[test]
fn test_lint_reports_findings() {
    let (config, ctx) = setup();
    let args = LintArgs {
        path: testdata_path().join("broken.ahk"),
        format: OutputFormat::Json,
    };
    let mut out = Vec::new();
    let code = cli::run_lint(&args, &config, &ctx, &mut out).unwrap();
    assert_eq!(code, EXIT_FAILED);

    let report: LintReport = serde_json::from_slice(&out).unwrap();
    assert!(!report.passed);
    assert_eq!(report.errors, 2);
    assert_eq!(report.warnings, 1);

    let found: Vec<(DiagnosticRule, usize)> =
        report.diagnostics.iter().map(|d| (d.rule, d.line)).collect();
    assert_eq!(
        found,
        vec![
            (DiagnosticRule::DuplicateFunction, 4),
            (DiagnosticRule::DuplicateParameter, 7),
            (DiagnosticRule::MalformedSignature, 10),
        ]
    );
    assert_eq!(report.diagnostics[2].severity, Severity::Warning);
}

#[test]
fn test_lint_clean_file_passes() {
    let (config, ctx) = setup();
    let args = LintArgs {
        path: testdata_path().join("library.ahk"),
        format: OutputFormat::Pretty,
    };
    let mut out = Vec::new();
    let code = cli::run_lint(&args, &config, &ctx, &mut out).unwrap();
    assert_eq!(code, EXIT_SUCCESS);
    assert!(String::from_utf8(out).unwrap().contains("PASS"));
}

#[test]
fn test_missing_path_is_an_error() {
    let (config, ctx) = setup();
    let args = LintArgs {
        path: testdata_path().join("does-not-exist"),
        format: OutputFormat::Json,
    };
    assert!(cli::run_lint(&args, &config, &ctx, &mut Vec::new()).is_err());
}
