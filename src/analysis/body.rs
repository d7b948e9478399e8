//! Variable declarations inside a function body.
//!
//! Two passes over the body text (comments and string contents blanked,
//! nested declarations cut out):
//!
//! 1. Explicit declarations: `static`, `global` and `local` lines. Every
//!    identifier of a chained initializer inherits the modifier.
//! 2. Implicit locals: the first `name :=` occurrence of each identifier, plus
//!    `for` loop and `catch ... as` variables.
//!
//! Parameters shadow everything; explicit declarations shadow implicit
//! locals. Names compare case-insensitively.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use super::facts::{Location, Parameter, Position, VariableInfo, VariableScope};
use super::scanner::ScannedSource;

static DECLARATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?i:(static|global|local))\s+(\S.*)$").unwrap());

static CHAIN_HEAD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([^\W\d]\w*)\s*:=").unwrap());

static BARE_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*([^\W\d]\w*)\s*$").unwrap());

static IDENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\W\d]\w*").unwrap());

static FOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?i:for)(?:\s+|\s*\(\s*)([^\W\d]\w*)(?:\s*,\s*([^\W\d]\w*))?\s+(?i:in)\b")
        .unwrap()
});

static CATCH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:\}\s*)?(?i:catch)\b.*\b(?i:as)\s+([^\W\d]\w*)").unwrap()
});

static INTEGER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(?:0[xX][0-9a-fA-F]+|\d+)$").unwrap());

static FLOAT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(?:\d+\.\d*|\.\d+)(?:[eE][+-]?\d+)?$").unwrap());

static CONSTRUCTOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?i:(Map|Array|Object|Buffer))\(.*\)$").unwrap());

/// Variables found in one body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyVariables {
    pub static_variables: Vec<VariableInfo>,
    pub global_variables: Vec<VariableInfo>,
    pub local_variables: Vec<VariableInfo>,
}

impl BodyVariables {
    fn push(&mut self, var: VariableInfo) {
        match var.scope {
            VariableScope::Static => self.static_variables.push(var),
            VariableScope::Global => self.global_variables.push(var),
            VariableScope::Local => self.local_variables.push(var),
        }
    }
}

/// One body line reduced to scannable text.
struct BodyLine {
    line: usize,
    text: String,
}

impl BodyLine {
    /// Character column of a byte offset into `text`.
    fn column(&self, byte: usize) -> usize {
        self.text[..byte].chars().count()
    }
}

/// Scan the body span `body` for variable declarations.
///
/// `excluded` lists spans of nested declarations, which are skipped.
pub fn scan_body(
    source: &ScannedSource,
    body: Location,
    excluded: &[Location],
    parameters: &[Parameter],
) -> BodyVariables {
    let lines = body_lines(source, &body, excluded);
    let mut taken: HashSet<String> = parameters
        .iter()
        .map(|p| p.name.to_lowercase())
        .collect();
    let mut vars = BodyVariables::default();
    let mut declaration_lines = HashSet::new();

    for body_line in &lines {
        let Some(caps) = DECLARATION_RE.captures(&body_line.text) else {
            continue;
        };
        let (Some(keyword), Some(rest)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let Some(scope) = VariableScope::from_keyword(keyword.as_str()) else {
            continue;
        };
        declaration_lines.insert(body_line.line);

        for (seg_offset, segment) in split_commas(rest.as_str()) {
            let base = rest.start() + seg_offset;
            let (names, initializer) = parse_chain(segment);
            let hint = initializer.and_then(infer_type_hint);
            for (name, offset) in names {
                if taken.insert(name.to_lowercase()) {
                    vars.push(VariableInfo {
                        name: name.to_string(),
                        scope,
                        has_initializer: initializer.is_some(),
                        declaration_line: body_line.line,
                        declaration_character: body_line.column(base + offset),
                        type_hint: hint.clone(),
                    });
                }
            }
        }
    }

    for body_line in &lines {
        if declaration_lines.contains(&body_line.line) {
            continue;
        }
        for (name, byte, hint) in implicit_locals(&body_line.text) {
            if taken.insert(name.to_lowercase()) {
                vars.push(VariableInfo {
                    name: name.to_string(),
                    scope: VariableScope::Local,
                    has_initializer: true,
                    declaration_line: body_line.line,
                    declaration_character: body_line.column(byte),
                    type_hint: hint,
                });
            }
        }
    }

    vars
}

/// Masked text of every line in `body`, blanking anything outside the span
/// or inside an excluded span.
fn body_lines(source: &ScannedSource, body: &Location, excluded: &[Location]) -> Vec<BodyLine> {
    let last = body.end_line.min(source.line_count().saturating_sub(1));
    (body.start_line..=last)
        .filter_map(|idx| {
            let scanned = source.line(idx)?;
            let text = scanned
                .masked_text()
                .chars()
                .enumerate()
                .map(|(col, c)| {
                    let pos = Position::new(idx, col);
                    if body.contains(pos) && !excluded.iter().any(|e| e.contains(pos)) {
                        c
                    } else {
                        ' '
                    }
                })
                .collect::<String>();
            (!text.trim().is_empty()).then_some(BodyLine { line: idx, text })
        })
        .collect()
}

/// Split on commas outside brackets, returning byte offsets with segments.
fn split_commas(text: &str) -> Vec<(usize, &str)> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                segments.push((start, &text[start..i]));
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push((start, &text[start..]));
    segments
}

/// Parse `a := b := expr` or a bare `a`.
///
/// Returns each left-hand identifier with its byte offset in `segment`, and
/// the final initializer expression if there is one.
fn parse_chain(segment: &str) -> (Vec<(&str, usize)>, Option<&str>) {
    let mut names = Vec::new();
    let mut offset = 0;
    while let Some(caps) = CHAIN_HEAD_RE.captures(&segment[offset..]) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        names.push((name.as_str(), offset + name.start()));
        offset += whole.end();
    }

    if !names.is_empty() {
        return (names, Some(segment[offset..].trim()));
    }

    match BARE_NAME_RE.captures(segment).and_then(|c| c.get(1)) {
        Some(name) => (vec![(name.as_str(), name.start())], None),
        None => (Vec::new(), None),
    }
}

/// Find implicit local declarations on one line.
///
/// Returns `(name, byte offset, type hint)` triples in source order.
fn implicit_locals(text: &str) -> Vec<(&str, usize, Option<String>)> {
    let mut found = Vec::new();

    if let Some(caps) = FOR_RE.captures(text) {
        for m in [caps.get(1), caps.get(2)].into_iter().flatten() {
            found.push((m.as_str(), m.start(), None));
        }
    }
    if let Some(m) = CATCH_RE.captures(text).and_then(|c| c.get(1)) {
        found.push((m.as_str(), m.start(), None));
    }

    for m in IDENT_RE.find_iter(text) {
        let prev = text[..m.start()].chars().next_back();
        if matches!(prev, Some(c) if c == '.' || c == '%' || c == ']' || c.is_alphanumeric() || c == '_')
        {
            continue;
        }
        let after = &text[m.end()..];
        let Some(rhs) = after.trim_start().strip_prefix(":=") else {
            continue;
        };
        let (_, initializer) = parse_chain(rhs);
        let hint = match initializer {
            Some(expr) => infer_type_hint(expr),
            None => infer_type_hint(rhs.trim()),
        };
        found.push((m.as_str(), m.start(), hint));
    }

    found
}

/// Derive a type hint from a literal initializer.
///
/// Works on masked text, so string literals arrive as quotes around blanks.
fn infer_type_hint(expr: &str) -> Option<String> {
    let expr = expr.trim();
    let hint = if INTEGER_RE.is_match(expr) {
        "Integer"
    } else if FLOAT_RE.is_match(expr) {
        "Float"
    } else if is_single_literal(expr, '"') || is_single_literal(expr, '\'') {
        "String"
    } else if enclosed(expr, '[', ']') {
        "Array"
    } else if enclosed(expr, '{', '}') {
        "Object"
    } else if let Some(caps) = CONSTRUCTOR_RE.captures(expr) {
        return caps.get(1).map(|m| canonical_class(m.as_str()).to_string());
    } else {
        return None;
    };
    Some(hint.to_string())
}

fn is_single_literal(expr: &str, quote: char) -> bool {
    expr.len() >= 2
        && expr.starts_with(quote)
        && expr.ends_with(quote)
        && expr[1..expr.len() - 1].chars().all(|c| c != quote)
}

/// Whether `expr` is one bracketed literal, e.g. `[1, 2]` but not `[1][0]`.
fn enclosed(expr: &str, open: char, close: char) -> bool {
    if !expr.starts_with(open) || !expr.ends_with(close) {
        return false;
    }
    let mut depth = 0usize;
    for (i, c) in expr.char_indices() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return i + c.len_utf8() == expr.len();
            }
        }
    }
    false
}

fn canonical_class(name: &str) -> &'static str {
    match name.to_ascii_lowercase().as_str() {
        "map" => "Map",
        "array" => "Array",
        "buffer" => "Buffer",
        _ => "Object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn whole(source: &ScannedSource) -> Location {
        let end = source.end_position();
        Location {
            start_line: 0,
            start_character: 0,
            end_line: end.line,
            end_character: end.character,
        }
    }

    fn scan(src: &str, params: &[&str]) -> BodyVariables {
        let source = ScannedSource::scan(src);
        let params: Vec<Parameter> = params
            .iter()
            .enumerate()
            .map(|(i, n)| Parameter::required(n, i))
            .collect();
        scan_body(&source, whole(&source), &[], &params)
    }

    fn names(vars: &[VariableInfo]) -> Vec<&str> {
        vars.iter().map(|v| v.name.as_str()).collect()
    }

    #[test]
    fn test_chained_assignment_yields_each_name() {
        let vars = scan("a := b := c := 0", &[]);
        assert_eq!(names(&vars.local_variables), vec!["a", "b", "c"]);
        assert!(vars.local_variables.iter().all(|v| v.scope == VariableScope::Local));
        assert_eq!(vars.local_variables[1].declaration_character, 5);

        let vars = scan("a:=b:=1", &[]);
        assert_eq!(names(&vars.local_variables), vec!["a", "b"]);
    }

    #[test]
    fn test_static_declarations() {
        let vars = scan("    static count := 0, cache, calls := Map()", &[]);
        assert_eq!(names(&vars.static_variables), vec!["count", "cache", "calls"]);
        let s = &vars.static_variables;
        assert!(s[0].has_initializer);
        assert!(!s[1].has_initializer);
        assert_eq!(s[0].type_hint.as_deref(), Some("Integer"));
        assert_eq!(s[2].type_hint.as_deref(), Some("Map"));
        assert_eq!(s[0].declaration_character, 11);
        assert!(vars.local_variables.is_empty());
    }

    #[test]
    fn test_static_chain_inherits_scope() {
        let vars = scan("static a := b := 0", &[]);
        assert_eq!(names(&vars.static_variables), vec!["a", "b"]);
        assert!(vars.local_variables.is_empty());

        let vars = scan("Global x := y := \"\"", &[]);
        assert_eq!(names(&vars.global_variables), vec!["x", "y"]);
        assert_eq!(vars.global_variables[0].type_hint.as_deref(), Some("String"));
    }

    #[test]
    fn test_parameters_take_precedence() {
        let vars = scan("x := 1\nstatic X := 2\ny := x", &["x"]);
        assert!(vars.static_variables.is_empty());
        assert_eq!(names(&vars.local_variables), vec!["y"]);
    }

    #[test]
    fn test_statics_take_precedence_over_earlier_locals() {
        let vars = scan("total := 1\nstatic total := 0", &[]);
        assert_eq!(names(&vars.static_variables), vec!["total"]);
        assert!(vars.local_variables.is_empty());
    }

    #[test]
    fn test_first_assignment_wins() {
        let vars = scan("n := 1\nN := 2\nn := \"x\"", &[]);
        assert_eq!(vars.local_variables.len(), 1);
        assert_eq!(vars.local_variables[0].declaration_line, 0);
        assert_eq!(vars.local_variables[0].type_hint.as_deref(), Some("Integer"));
    }

    #[test]
    fn test_member_and_dynamic_assignments_are_skipped() {
        let vars = scan("this.x := 1\narr[1] := 2\n%name% := 3\nobj.y.z := 4", &[]);
        assert!(vars.local_variables.is_empty());
    }

    #[test]
    fn test_strings_and_comments_are_ignored() {
        let vars = scan("msg := \"a := b\" ; c := 1\n/* d := 2 */", &[]);
        assert_eq!(names(&vars.local_variables), vec!["msg"]);
        assert_eq!(vars.local_variables[0].type_hint.as_deref(), Some("String"));
    }

    #[test]
    fn test_assignment_inside_condition() {
        let vars = scan("if (pos := InStr(s, \"x\")) {\n}", &[]);
        assert_eq!(names(&vars.local_variables), vec!["pos"]);
        assert_eq!(vars.local_variables[0].type_hint, None);
    }

    #[test]
    fn test_loop_and_catch_variables() {
        let vars = scan("for key, value in items {\n}\ntry {\n} catch Error as err {\n}", &[]);
        assert_eq!(names(&vars.local_variables), vec!["key", "value", "err"]);
    }

    #[test]
    fn test_explicit_local() {
        let vars = scan("local tmp, buf := Buffer(16)", &[]);
        assert_eq!(names(&vars.local_variables), vec!["tmp", "buf"]);
        assert!(!vars.local_variables[0].has_initializer);
        assert_eq!(vars.local_variables[1].type_hint.as_deref(), Some("Buffer"));
    }

    #[test]
    fn test_nested_spans_are_excluded() {
        let src = "outer := 1\nInner() {\n    inner := 2\n}\nafter := 3";
        let source = ScannedSource::scan(src);
        let nested = Location {
            start_line: 1,
            start_character: 0,
            end_line: 3,
            end_character: 1,
        };
        let vars = scan_body(&source, whole(&source), &[nested], &[]);
        assert_eq!(names(&vars.local_variables), vec!["outer", "after"]);
    }

    #[test]
    fn test_body_span_limits() {
        let src = "F() { first := 1\n    second := 2 }\nthird := 3";
        let source = ScannedSource::scan(src);
        let body = Location {
            start_line: 0,
            start_character: 5,
            end_line: 1,
            end_character: 16,
        };
        let vars = scan_body(&source, body, &[], &[]);
        assert_eq!(names(&vars.local_variables), vec!["first", "second"]);
    }

    #[test]
    fn test_infer_type_hint() {
        assert_eq!(infer_type_hint("42").as_deref(), Some("Integer"));
        assert_eq!(infer_type_hint("0xFF").as_deref(), Some("Integer"));
        assert_eq!(infer_type_hint("1.5").as_deref(), Some("Float"));
        assert_eq!(infer_type_hint("\"   \"").as_deref(), Some("String"));
        assert_eq!(infer_type_hint("[1, 2]").as_deref(), Some("Array"));
        assert_eq!(infer_type_hint("{a: 1}").as_deref(), Some("Object"));
        assert_eq!(infer_type_hint("map()").as_deref(), Some("Map"));
        assert_eq!(infer_type_hint("[1][1]"), None);
        assert_eq!(infer_type_hint("\" \" . \" \""), None);
        assert_eq!(infer_type_hint("Foo()"), None);
    }
}
