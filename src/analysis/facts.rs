//! Fact structures extracted from function analysis.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Content-version stamp of a text buffer, incremented by the editor on
/// every edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentVersion(pub i32);

impl From<DocumentVersion> for i32 {
    fn from(val: DocumentVersion) -> Self {
        val.0
    }
}

impl fmt::Display for DocumentVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A cursor position (0-indexed line and character).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub character: usize,
}

impl Position {
    pub fn new(line: usize, character: usize) -> Self {
        Self { line, character }
    }
}

/// Source span of a declaration.
///
/// All coordinates are 0-indexed; characters count Unicode scalar values.
/// The end is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub start_line: usize,
    pub start_character: usize,
    pub end_line: usize,
    pub end_character: usize,
}

impl Location {
    pub fn start(&self) -> Position {
        Position::new(self.start_line, self.start_character)
    }

    pub fn end(&self) -> Position {
        Position::new(self.end_line, self.end_character)
    }

    /// Check whether `pos` lies inside this span (end-exclusive).
    pub fn contains(&self, pos: Position) -> bool {
        self.start() <= pos && pos < self.end()
    }

    /// Check whether `other` lies entirely inside this span.
    pub fn encloses(&self, other: &Location) -> bool {
        self.start() <= other.start() && other.end() <= self.end()
    }

    /// Check whether the two spans share at least one position.
    pub fn overlaps(&self, other: &Location) -> bool {
        self.start() < other.end() && other.start() < self.end()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start_line + 1,
            self.start_character + 1,
            self.end_line + 1,
            self.end_character + 1
        )
    }
}

/// Kind of a parameter default value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultValueKind {
    /// A literal: number, quoted string, `true`/`false` or `unset`.
    Constant,
    /// Anything else; only evaluable at call time.
    Expression,
}

impl DefaultValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DefaultValueKind::Constant => "constant",
            DefaultValueKind::Expression => "expression",
        }
    }
}

impl fmt::Display for DefaultValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A parameter default value with its trimmed source text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "lowercase")]
pub enum DefaultValue {
    Constant(String),
    Expression(String),
}

impl DefaultValue {
    pub fn text(&self) -> &str {
        match self {
            DefaultValue::Constant(text) | DefaultValue::Expression(text) => text,
        }
    }

    pub fn kind(&self) -> DefaultValueKind {
        match self {
            DefaultValue::Constant(_) => DefaultValueKind::Constant,
            DefaultValue::Expression(_) => DefaultValueKind::Expression,
        }
    }
}

/// One declared function parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Identifier text (`*` for an anonymous variadic tail).
    pub name: String,
    /// Declared with the `&` marker.
    pub is_by_ref: bool,
    /// Declared with `?` or carries a default.
    pub is_optional: bool,
    /// Default value, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    /// Text following a `:` annotation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_hint: Option<String>,
    /// Declared with a trailing `*`.
    pub is_variadic: bool,
    /// 0-indexed ordinal in the parameter list.
    pub position: usize,
}

impl Parameter {
    /// Create a plain required parameter.
    pub fn required(name: &str, position: usize) -> Self {
        Self {
            name: name.to_string(),
            is_by_ref: false,
            is_optional: false,
            default: None,
            type_hint: None,
            is_variadic: false,
            position,
        }
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub fn default_value_text(&self) -> Option<&str> {
        self.default.as_ref().map(|d| d.text())
    }

    pub fn default_value_kind(&self) -> Option<DefaultValueKind> {
        self.default.as_ref().map(|d| d.kind())
    }

    /// A parameter a caller must always supply.
    pub fn is_required(&self) -> bool {
        !self.is_optional && !self.has_default() && !self.is_variadic
    }

    /// Render the parameter the way it would appear in a signature.
    pub fn label(&self) -> String {
        let mut out = String::new();
        if self.is_by_ref {
            out.push('&');
        }
        if self.name != "*" {
            out.push_str(&self.name);
        }
        if let Some(ref hint) = self.type_hint {
            out.push_str(": ");
            out.push_str(hint);
        }
        if self.is_variadic {
            out.push('*');
        } else if let Some(ref default) = self.default {
            out.push_str(" := ");
            out.push_str(default.text());
        } else if self.is_optional {
            out.push('?');
        }
        out
    }
}

/// Scope of a variable declared inside a function body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableScope {
    Static,
    Local,
    Global,
}

impl VariableScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariableScope::Static => "static",
            VariableScope::Local => "local",
            VariableScope::Global => "global",
        }
    }

    /// Map a declaration keyword (case-insensitive) to its scope.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "static" => Some(VariableScope::Static),
            "local" => Some(VariableScope::Local),
            "global" => Some(VariableScope::Global),
            _ => None,
        }
    }
}

impl fmt::Display for VariableScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A static, local or global variable declared in a function body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableInfo {
    pub name: String,
    pub scope: VariableScope,
    pub has_initializer: bool,
    pub declaration_line: usize,
    pub declaration_character: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_hint: Option<String>,
}

/// Upper arity bound of a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaxParams {
    Count(usize),
    Variadic,
}

impl MaxParams {
    pub fn count(&self) -> Option<usize> {
        match self {
            MaxParams::Count(n) => Some(*n),
            MaxParams::Variadic => None,
        }
    }

    pub fn is_variadic(&self) -> bool {
        matches!(self, MaxParams::Variadic)
    }
}

impl fmt::Display for MaxParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxParams::Count(n) => write!(f, "{}", n),
            MaxParams::Variadic => write!(f, "variadic"),
        }
    }
}

/// How the function body is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyKind {
    /// `Name() { ... }`
    Block,
    /// `Name() => expr`
    Arrow,
}

/// Metadata for one function or method declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionMetadata {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub static_variables: Vec<VariableInfo>,
    pub local_variables: Vec<VariableInfo>,
    pub global_variables: Vec<VariableInfo>,
    pub min_params: usize,
    pub max_params: MaxParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    pub is_variadic: bool,
    pub location: Location,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    pub version: DocumentVersion,
    pub body_kind: BodyKind,
    /// Enclosing class for methods.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    /// Declared with a leading `static` (static method).
    pub is_static: bool,
    /// Set when the parameter list could not be decomposed; `parameters`
    /// is then empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
}

impl FunctionMetadata {
    /// Get the qualified name (Class.name for methods).
    pub fn qualified_name(&self) -> String {
        match self.class_name {
            Some(ref class) => format!("{}.{}", class, self.name),
            None => self.name.clone(),
        }
    }

    /// Render a one-line signature, e.g. `Join(sep, items*)`.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self.parameters.iter().map(Parameter::label).collect();
        let mut out = format!("{}({})", self.name, params.join(", "));
        if let Some(ref ret) = self.return_type {
            out.push_str(" -> ");
            out.push_str(ret);
        }
        out
    }

    /// Look up a parameter by name (case-insensitive).
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// All body variables in scope order: static, global, local.
    pub fn variables(&self) -> impl Iterator<Item = &VariableInfo> {
        self.static_variables
            .iter()
            .chain(self.global_variables.iter())
            .chain(self.local_variables.iter())
    }

    /// Check whether a call with `argc` arguments satisfies the arity bounds.
    pub fn accepts_arg_count(&self, argc: usize) -> bool {
        argc >= self.min_params
            && match self.max_params {
                MaxParams::Count(max) => argc <= max,
                MaxParams::Variadic => true,
            }
    }
}
