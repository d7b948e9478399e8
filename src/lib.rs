//! ahkmeta - function metadata for AutoHotkey v2 scripts.
//!
//! ahkmeta reads AutoHotkey v2 source text and reports, for every function
//! and method, its parameters (by-reference, optional, defaulted, variadic,
//! annotated), its static, global and local variables, its arity bounds, its
//! location and the comment block documenting it. Editors use the results
//! for hover, outline and completion; the `ahkmeta` binary prints them.
//!
//! # Architecture
//!
//! - `analysis`: scanner, signature parser, body scanner and assembler,
//!   behind `AnalysisContext`
//! - `cache`: TTL-bounded store of analysis results
//! - `diagnostics`: findings derived from analysis results
//! - `config`: YAML configuration schema
//! - `logging`: tracing subscriber setup
//! - `report`: Output formatting (pretty, JSON)
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ahkmeta::{AnalysisContext, DocumentVersion, MetadataCache};
//!
//! let ctx = AnalysisContext::new(Arc::new(MetadataCache::new()));
//! let functions = ctx.analyze("lib.ahk", "Add(a, b := 1) => a + b", DocumentVersion(1));
//! assert_eq!(functions[0].name, "Add");
//! assert_eq!(functions[0].min_params, 1);
//! ```

pub mod analysis;
pub mod cache;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod logging;
pub mod report;

pub use analysis::{
    AnalysisContext, BodyKind, DefaultValue, DefaultValueKind, DocumentVersion, FunctionMetadata,
    Location, MaxParams, Parameter, Position, VariableInfo, VariableScope,
};
pub use cache::{CacheStats, CachedAnalysis, MetadataCache};
pub use config::Config;
pub use diagnostics::{Diagnostic, DiagnosticReport, DiagnosticRule, Severity};
