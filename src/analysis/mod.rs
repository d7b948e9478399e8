//! Function metadata extraction for AutoHotkey v2 source.
//!
//! Text goes through four stages, none of which builds a full syntax tree:
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Source Text │────▶│ Scanner      │────▶│ Signature    │
//! └─────────────┘     │ (regions,    │     │ Parser       │
//!                     │  braces)     │     └──────┬───────┘
//!                     └──────┬───────┘            │
//!                            │                    ▼
//!                            │             ┌──────────────┐
//!                            └────────────▶│ Body Scanner │
//!                                          └──────┬───────┘
//!                                                 ▼
//!                     ┌───────────────┐    ┌──────────────┐
//!                     │AnalysisContext│◀───│ Assembler    │
//!                     │ (cached)      │    │ (metadata)   │
//!                     └───────────────┘    └──────────────┘
//! ```
//!
//! Every stage tolerates half-typed code: unbalanced input shortens spans
//! instead of failing, and a parameter list that cannot be decomposed is
//! reported on the record rather than dropped.

mod assembler;
mod body;
mod context;
mod facts;
pub mod scanner;
pub mod signature;

pub use assembler::{assemble, find_at_position};
pub use body::{scan_body, BodyVariables};
pub use context::AnalysisContext;
pub use facts::{
    BodyKind, DefaultValue, DefaultValueKind, DocumentVersion, FunctionMetadata, Location,
    MaxParams, Parameter, Position, VariableInfo, VariableScope,
};
pub use scanner::{Region, ScannedSource};
pub use signature::{parse_declaration, Signature};
