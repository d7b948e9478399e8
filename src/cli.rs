//! Command-line interface for ahkmeta.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use walkdir::WalkDir;

use crate::analysis::{AnalysisContext, DocumentVersion, Position};
use crate::cache::MetadataCache;
use crate::config::Config;
use crate::diagnostics::{self, DiagnosticReport};
use crate::logging;
use crate::report::{self, FileOutline, HoverReport, LintReport, OutlineReport, OutputFormat};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Files read from disk carry no editor version.
const DISK_VERSION: DocumentVersion = DocumentVersion(0);

/// Function metadata for AutoHotkey v2 scripts.
///
/// Lists declared functions and methods with their parameters, arity,
/// static/global/local variables and doc comments, answers "which function
/// is at this position", and reports duplicate or malformed declarations.
#[derive(Parser)]
#[command(name = "ahkmeta")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List every function in a file or directory
    #[command(visible_alias = "ls")]
    Outline(OutlineArgs),
    /// Show the function containing a position
    Hover(HoverArgs),
    /// Report duplicate and malformed declarations
    #[command(visible_alias = "check")]
    Lint(LintArgs),
}

/// Arguments for the outline command.
#[derive(Args)]
pub struct OutlineArgs {
    /// Path to analyze (file or directory)
    pub path: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
    pub format: OutputFormat,
}

/// Arguments for the hover command.
#[derive(Args)]
pub struct HoverArgs {
    /// Script file
    pub file: PathBuf,

    /// Line number (1-indexed)
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub line: u64,

    /// Column (1-indexed)
    #[arg(short = 'C', long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    pub character: u64,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
    pub format: OutputFormat,
}

/// Arguments for the lint command.
#[derive(Args)]
pub struct LintArgs {
    /// Path to check (file or directory)
    pub path: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
    pub format: OutputFormat,
}

/// Load config, set up logging and dispatch the subcommand.
pub fn run(cli: &Cli) -> anyhow::Result<i32> {
    let cwd = std::env::current_dir()?;
    let config = Config::load(cli.config.as_deref(), &cwd)?;
    logging::init_logging(&config.logging)?;

    let ctx = context_for(&config);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match &cli.command {
        Commands::Outline(args) => run_outline(args, &config, &ctx, &mut out),
        Commands::Hover(args) => run_hover(args, &config, &ctx, &mut out),
        Commands::Lint(args) => run_lint(args, &config, &ctx, &mut out),
    }
}

/// Build the analysis context described by `config`.
pub fn context_for(config: &Config) -> AnalysisContext {
    if config.cache.enabled {
        AnalysisContext::new(Arc::new(MetadataCache::with_ttl(config.cache.ttl())))
    } else {
        AnalysisContext::uncached()
    }
}

/// Run the outline command.
pub fn run_outline<W: Write>(
    args: &OutlineArgs,
    config: &Config,
    ctx: &AnalysisContext,
    out: &mut W,
) -> anyhow::Result<i32> {
    let (root, files) = resolve_files(&args.path, config)?;
    if files.is_empty() {
        tracing::warn!(path = %args.path.display(), "no files to analyze");
    }

    let mut outlines = Vec::with_capacity(files.len());
    for file in &files {
        let Some(text) = read_source(file, config)? else {
            continue;
        };
        let document = relative_path(file, &root);
        let functions = ctx.analyze(&document, &text, DISK_VERSION);
        outlines.push(FileOutline {
            path: document,
            functions: functions.as_ref().clone(),
        });
    }

    let report = OutlineReport::new(outlines);
    match args.format {
        OutputFormat::Json => report::write_json(out, &report)?,
        OutputFormat::Pretty => report::write_outline_pretty(out, &report)?,
    }
    Ok(EXIT_SUCCESS)
}

/// Run the hover command.
pub fn run_hover<W: Write>(
    args: &HoverArgs,
    config: &Config,
    ctx: &AnalysisContext,
    out: &mut W,
) -> anyhow::Result<i32> {
    if !args.file.is_file() {
        anyhow::bail!("not a file: {}", args.file.display());
    }
    let text = read_source(&args.file, config)?.unwrap_or_default();
    let document = args.file.to_string_lossy().to_string();
    let position = Position::new(args.line as usize - 1, args.character as usize - 1);
    let function = ctx.analyze_at(&document, &text, DISK_VERSION, position);

    let report = HoverReport::new(
        &document,
        args.line as usize,
        args.character as usize,
        function,
    );
    match args.format {
        OutputFormat::Json => report::write_json(out, &report)?,
        OutputFormat::Pretty => report::write_hover_pretty(out, &report)?,
    }
    Ok(EXIT_SUCCESS)
}

/// Run the lint command.
pub fn run_lint<W: Write>(
    args: &LintArgs,
    config: &Config,
    ctx: &AnalysisContext,
    out: &mut W,
) -> anyhow::Result<i32> {
    let (root, files) = resolve_files(&args.path, config)?;

    let mut diags = DiagnosticReport::new();
    for file in &files {
        let Some(text) = read_source(file, config)? else {
            continue;
        };
        let document = relative_path(file, &root);
        let functions = ctx.analyze(&document, &text, DISK_VERSION);
        diags.add_file(diagnostics::check(&document, &functions));
    }

    let report = LintReport::from(diags);
    match args.format {
        OutputFormat::Json => report::write_json(out, &report)?,
        OutputFormat::Pretty => report::write_lint_pretty(out, &report)?,
    }

    if report.passed {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_FAILED)
    }
}

/// Resolve `path` to a base directory and the files to analyze.
fn resolve_files(path: &Path, config: &Config) -> anyhow::Result<(PathBuf, Vec<PathBuf>)> {
    let abs_path = path
        .canonicalize()
        .map_err(|e| anyhow::anyhow!("cannot access path {:?}: {}", path, e))?;

    if abs_path.is_dir() {
        let files = collect_files(&abs_path, config)?;
        Ok((abs_path, files))
    } else {
        let root = abs_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| abs_path.clone());
        Ok((root, vec![abs_path]))
    }
}

/// Collect script files under `root`, sorted by path.
pub fn collect_files(root: &Path, config: &Config) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| {
            // Skip hidden directories
            let name = e.file_name().to_string_lossy();
            !(e.depth() > 0 && e.file_type().is_dir() && name.starts_with('.'))
        })
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !config.is_source_file(path) {
            continue;
        }
        let rel = path.strip_prefix(root).unwrap_or(path);
        if config.is_path_excluded(rel) {
            tracing::debug!(path = %rel.display(), "excluded by config");
            continue;
        }
        files.push(path.to_path_buf());
    }

    files.sort();
    Ok(files)
}

/// Read a script, skipping files over the configured size limit.
fn read_source(path: &Path, config: &Config) -> anyhow::Result<Option<String>> {
    let size = fs::metadata(path)?.len();
    if size > config.analysis.max_file_bytes {
        tracing::warn!(
            path = %path.display(),
            size,
            limit = config.analysis.max_file_bytes,
            "skipping oversized file"
        );
        return Ok(None);
    }

    let bytes = fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(Some(text.trim_start_matches('\u{feff}').to_string()))
}

/// Make a path relative to the base path for display.
fn relative_path(file: &Path, base: &Path) -> String {
    file.strip_prefix(base)
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_else(|_| file.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_collect_files_filters_extensions_and_hidden() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "main.ahk", "Main() {\n}");
        write(dir.path(), "lib/Util.ahk2", "Util() {\n}");
        write(dir.path(), "notes.txt", "Nope() {\n}");
        write(dir.path(), ".git/hook.ahk", "Hidden() {\n}");

        let root = dir.path().canonicalize().unwrap();
        let files = collect_files(&root, &Config::default()).unwrap();
        let names: Vec<String> = files.iter().map(|f| relative_path(f, &root)).collect();
        assert_eq!(names, vec!["lib/Util.ahk2", "main.ahk"]);
    }

    #[test]
    fn test_collect_files_honors_exclusions() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "main.ahk", "");
        write(dir.path(), "vendor/json.ahk", "");

        let config = Config {
            excluded_paths: vec!["vendor/**".to_string()],
            ..Config::default()
        };
        let root = dir.path().canonicalize().unwrap();
        let files = collect_files(&root, &config).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("main.ahk"));
    }

    #[test]
    fn test_read_source_skips_oversized_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "big.ahk", "Big() {\n}\n");

        let mut config = Config::default();
        config.analysis.max_file_bytes = 4;
        assert!(read_source(&dir.path().join("big.ahk"), &config)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_read_source_strips_bom() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "bom.ahk", "\u{feff}F() {\n}");
        let text = read_source(&dir.path().join("bom.ahk"), &Config::default())
            .unwrap()
            .unwrap();
        assert!(text.starts_with("F()"));
    }

    #[test]
    fn test_context_respects_cache_setting() {
        let mut config = Config::default();
        assert!(context_for(&config).cache().is_some());
        config.cache.enabled = false;
        assert!(context_for(&config).cache().is_none());
    }

    #[test]
    fn test_cli_parses_hover() {
        let cli = Cli::try_parse_from(["ahkmeta", "hover", "a.ahk", "--line", "3", "-C", "7"]).unwrap();
        match cli.command {
            Commands::Hover(args) => {
                assert_eq!(args.line, 3);
                assert_eq!(args.character, 7);
                assert_eq!(args.format, OutputFormat::Pretty);
            }
            _ => panic!("expected hover"),
        }
        assert!(Cli::try_parse_from(["ahkmeta", "hover", "a.ahk", "--line", "0"]).is_err());
    }
}
