//! Declaration header recognition and parameter-list decomposition.
//!
//! A line declares a function when its first code token is
//! `[static] Name(` with `Name` not a control-flow keyword, the parameter
//! list closes, and the closing `)` is followed by `{`, by `=>`, or by the
//! end of the line with the next code line opening with `{`. An optional
//! `-> Type` annotation may sit between `)` and the body.
//!
//! Everything else (calls, `if (x) {`, expressions) is rejected.

use once_cell::sync::Lazy;
use phf::phf_set;
use regex::Regex;

use super::facts::{DefaultValue, MaxParams, Parameter, Position};
use super::scanner::{Region, ScannedSource};

/// How far a parameter list may spill over continuation lines.
pub const MAX_SIGNATURE_LINES: usize = 32;

/// Words that look like `word(` at line start but never name a function.
static KEYWORDS: phf::Set<&'static str> = phf_set! {
    "and", "break", "case", "catch", "class", "contains", "continue", "else",
    "finally", "for", "global", "goto", "if", "in", "is", "local", "loop",
    "not", "or", "return", "static", "super", "switch", "throw", "try",
    "until", "while",
};

static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(?i:static)\s+)?([^\W\d]\w*)\s*\(").unwrap()
});

static IDENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\W\d]\w*$").unwrap());

static NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:0[xX][0-9a-fA-F]+|\d+(?:\.\d*)?(?:[eE][+-]?\d+)?|\.\d+(?:[eE][+-]?\d+)?)$")
        .unwrap()
});

static DOUBLE_QUOTED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^"(?:[^"`]|`.)*"$"#).unwrap());

static SINGLE_QUOTED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^'(?:[^'`]|`.)*'$").unwrap());

static LITERAL_KEYWORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:true|false|unset)$").unwrap());

/// Check whether `word` is a reserved control-flow or declaration keyword.
pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(word.to_ascii_lowercase().as_str())
}

/// Where a function body lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodySpan {
    /// `{ ... }`; `close` is None when the block never closes.
    Block {
        open: Position,
        close: Option<Position>,
    },
    /// `=> expr`; `start` is just past the arrow, `end` is exclusive.
    Arrow { start: Position, end: Position },
}

/// A recognized declaration header.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub name: String,
    /// First character of the declaration (`static` keyword or name).
    pub start: Position,
    pub is_static: bool,
    pub parameters: Vec<Parameter>,
    /// Why the parameter list could not be decomposed.
    pub parse_error: Option<String>,
    pub return_type: Option<String>,
    pub body: BodySpan,
    /// Last line belonging to the header (the `)` line, or the `{` line for
    /// brace-on-next-line style).
    pub header_end_line: usize,
}

impl Signature {
    /// End of the declaration (exclusive). Unterminated blocks run to the
    /// end of the buffer.
    pub fn end(&self, source: &ScannedSource) -> Position {
        match self.body {
            BodySpan::Block {
                close: Some(close), ..
            } => Position::new(close.line, close.character + 1),
            BodySpan::Block { close: None, .. } => source.end_position(),
            BodySpan::Arrow { end, .. } => end,
        }
    }

    pub fn min_params(&self) -> usize {
        arity(&self.parameters).0
    }

    pub fn max_params(&self) -> MaxParams {
        arity(&self.parameters).1
    }
}

/// Compute `(min, max)` arity bounds.
///
/// The minimum counts the contiguous prefix of required parameters; the
/// first optional, defaulted or variadic parameter ends it.
pub fn arity(params: &[Parameter]) -> (usize, MaxParams) {
    let min = params.iter().take_while(|p| p.is_required()).count();
    let max = match params.last() {
        Some(p) if p.is_variadic => MaxParams::Variadic,
        _ => MaxParams::Count(params.len()),
    };
    (min, max)
}

/// Try to parse a declaration starting on `line`.
///
/// Returns None if the line is not a function declaration.
pub fn parse_declaration(source: &ScannedSource, line: usize) -> Option<Signature> {
    let scanned = source.line(line)?;
    let first = scanned.first_code_char()?;

    let rest: String = scanned.code_text().chars().skip(first).collect();
    let caps = HEADER_RE.captures(&rest)?;
    let name_match = caps.get(1)?;
    let name = name_match.as_str();
    if is_keyword(name) {
        return None;
    }

    let is_static = name_match.start() > 0;
    let open_col = first + rest[..caps.get(0)?.end()].chars().count() - 1;
    let start = Position::new(line, first);

    let (param_chars, close) = collect_parameter_list(source, Position::new(line, open_col))?;
    let tail = parse_tail(source, close)?;

    let (parameters, parse_error) = match parse_parameters(&param_chars) {
        Ok(params) => (params, None),
        Err(msg) => {
            tracing::warn!(function = name, line, "malformed parameter list: {}", msg);
            (Vec::new(), Some(msg))
        }
    };

    Some(Signature {
        name: name.to_string(),
        start,
        is_static,
        parameters,
        parse_error,
        return_type: tail.return_type,
        body: tail.body,
        header_end_line: tail.header_end_line,
    })
}

/// Collect the characters between `(` at `open` and its matching `)`.
///
/// Comments and line breaks become spaces. Returns the characters with their
/// regions plus the position of the closing `)`.
fn collect_parameter_list(
    source: &ScannedSource,
    open: Position,
) -> Option<(Vec<(char, Region)>, Position)> {
    let mut depth = 0usize;
    let mut chars = Vec::new();
    let start = Position::new(open.line, open.character + 1);

    for (pos, c, region) in source.chars_from(start) {
        if pos.line > open.line + MAX_SIGNATURE_LINES {
            return None;
        }
        if c == '\n' || region.is_comment() {
            chars.push((' ', Region::Code));
            continue;
        }
        if region.is_code() {
            match c {
                '(' | '[' | '{' => depth += 1,
                ')' if depth == 0 => return Some((chars, pos)),
                ')' | ']' | '}' => {
                    if depth == 0 {
                        // Unbalanced closer: we have walked out of the list.
                        return None;
                    }
                    depth -= 1;
                }
                _ => {}
            }
        }
        chars.push((c, region));
    }
    None
}

struct Tail {
    return_type: Option<String>,
    body: BodySpan,
    header_end_line: usize,
}

/// Parse what follows the closing `)`: optional `-> Type`, then the body.
fn parse_tail(source: &ScannedSource, close: Position) -> Option<Tail> {
    let line = source.line(close.line)?;
    let chars = line.chars();
    let regions = line.regions();
    let at_code = |i: usize| i < chars.len() && regions[i].is_code();

    let skip_ws = |mut i: usize| {
        while at_code(i) && chars[i].is_whitespace() {
            i += 1;
        }
        i
    };

    let mut i = skip_ws(close.character + 1);
    let mut return_type = None;

    if at_code(i) && chars[i] == '-' && at_code(i + 1) && chars[i + 1] == '>' {
        i = skip_ws(i + 2);
        let type_start = i;
        while at_code(i)
            && !chars[i].is_whitespace()
            && chars[i] != '{'
            && !(chars[i] == '=' && at_code(i + 1) && chars[i + 1] == '>')
        {
            i += 1;
        }
        let text: String = chars[type_start..i].iter().collect();
        if text.is_empty() {
            return None;
        }
        return_type = Some(text);
        i = skip_ws(i);
    }

    if i >= chars.len() || regions[i].is_comment() {
        // Nothing but a comment or end of line: brace on a later line.
        let open = next_line_brace(source, close.line)?;
        return Some(Tail {
            return_type,
            body: BodySpan::Block {
                open,
                close: source.matching_brace(open),
            },
            header_end_line: open.line,
        });
    }

    if !at_code(i) {
        return None;
    }

    if chars[i] == '{' {
        let open = Position::new(close.line, i);
        return Some(Tail {
            return_type,
            body: BodySpan::Block {
                open,
                close: source.matching_brace(open),
            },
            header_end_line: close.line,
        });
    }

    if chars[i] == '=' && at_code(i + 1) && chars[i + 1] == '>' {
        let start = Position::new(close.line, i + 2);
        return Some(Tail {
            return_type,
            body: BodySpan::Arrow {
                start,
                end: arrow_end(source, start),
            },
            header_end_line: close.line,
        });
    }

    None
}

/// Find a `{` opening the first code line after `line`.
pub(crate) fn next_line_brace(source: &ScannedSource, line: usize) -> Option<Position> {
    let (idx, scanned) = source
        .lines()
        .iter()
        .enumerate()
        .skip(line + 1)
        .find(|(_, l)| !l.has_no_code())?;
    let col = scanned.first_code_char()?;
    (scanned.chars()[col] == '{').then(|| Position::new(idx, col))
}

/// End (exclusive) of a fat-arrow expression starting at `start`.
///
/// The expression ends at the first line break where all brackets opened
/// since `start` are closed again, or right before a closer that belongs to
/// an enclosing block.
fn arrow_end(source: &ScannedSource, start: Position) -> Position {
    let mut depth = 0usize;
    let mut last: Option<Position> = None;

    for (pos, c, region) in source.chars_from(start) {
        if c == '\n' {
            if depth == 0 {
                if let Some(end) = last {
                    return end;
                }
            }
            continue;
        }
        if region.is_comment() || c.is_whitespace() {
            continue;
        }
        if region.is_code() {
            match c {
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => {
                    if depth == 0 {
                        return last.unwrap_or(pos);
                    }
                    depth -= 1;
                }
                _ => {}
            }
        }
        last = Some(Position::new(pos.line, pos.character + 1));
    }

    last.unwrap_or_else(|| source.end_position())
}

/// Split a parameter list on top-level commas.
///
/// Commas inside `()`, `[]`, `{}` or string literals do not split.
pub fn split_top_level(chars: &[(char, Region)]) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for &(c, region) in chars {
        if region.is_code() {
            match c {
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => {
                    segments.push(std::mem::take(&mut current));
                    continue;
                }
                _ => {}
            }
        }
        current.push(c);
    }
    segments.push(current);
    segments
}

/// Decompose a parameter list into parameter records.
pub fn parse_parameters(chars: &[(char, Region)]) -> Result<Vec<Parameter>, String> {
    let segments = split_top_level(chars);
    if segments.len() == 1 && segments[0].trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut params = Vec::with_capacity(segments.len());
    for (position, segment) in segments.iter().enumerate() {
        params.push(parse_parameter(segment, position)?);
    }

    if let Some(p) = params
        .iter()
        .rev()
        .skip(1)
        .find(|p| p.is_variadic)
    {
        return Err(format!("variadic parameter {:?} must be last", p.name));
    }

    Ok(params)
}

/// Parse one parameter segment, e.g. `&name: Type := expr`.
fn parse_parameter(segment: &str, position: usize) -> Result<Parameter, String> {
    let text = segment.trim();
    if text.is_empty() {
        return Err(format!("empty parameter at position {}", position));
    }

    let (decl, default_text) = split_default(text);

    let mut decl = decl.trim();
    let is_by_ref = match decl.strip_prefix('&') {
        Some(rest) => {
            decl = rest.trim_start();
            true
        }
        None => false,
    };

    let mut is_variadic = false;
    let mut is_optional = false;

    let decl = strip_markers(decl, &mut is_variadic, &mut is_optional);
    let (name, type_hint) = match decl.split_once(':') {
        Some((name, hint)) => {
            let hint = hint.trim();
            if hint.is_empty() {
                return Err(format!("empty type annotation at position {}", position));
            }
            let name = strip_markers(name, &mut is_variadic, &mut is_optional);
            (name.trim(), Some(hint.to_string()))
        }
        None => (decl.trim(), None),
    };

    let name = if name.is_empty() && is_variadic {
        "*"
    } else if IDENT_RE.is_match(name) {
        name
    } else {
        return Err(format!("invalid parameter name {:?}", name));
    };

    let default = match default_text {
        Some(expr) if expr.is_empty() => {
            return Err(format!("missing default value for {:?}", name));
        }
        Some(_) if is_variadic => {
            return Err(format!("variadic parameter {:?} cannot have a default", name));
        }
        Some(expr) => Some(classify_default(expr)),
        None => None,
    };

    Ok(Parameter {
        name: name.to_string(),
        is_by_ref,
        is_optional: is_optional || default.is_some(),
        default,
        type_hint,
        is_variadic,
        position,
    })
}

/// Strip trailing `*` (variadic) and `?` (optional) markers in any order.
fn strip_markers<'a>(mut s: &'a str, is_variadic: &mut bool, is_optional: &mut bool) -> &'a str {
    loop {
        s = s.trim_end();
        if let Some(rest) = s.strip_suffix('*') {
            *is_variadic = true;
            s = rest;
        } else if let Some(rest) = s.strip_suffix('?') {
            *is_optional = true;
            s = rest;
        } else {
            return s;
        }
    }
}

/// Split `decl := expr` (or legacy `decl = expr`) at the first assignment.
fn split_default(text: &str) -> (&str, Option<&str>) {
    if let Some((decl, expr)) = text.split_once(":=") {
        return (decl, Some(expr.trim()));
    }

    let bytes = text.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'"' || b == b'\'' {
            break;
        }
        if b != b'=' {
            continue;
        }
        let prev = i.checked_sub(1).map(|p| bytes[p]);
        let next = bytes.get(i + 1).copied();
        let compound = matches!(prev, Some(b'!' | b'<' | b'>' | b'=' | b':'))
            || next == Some(b'=')
            || next == Some(b'>');
        if !compound {
            return (&text[..i], Some(text[i + 1..].trim()));
        }
    }
    (text, None)
}

/// Classify default-value text as a literal constant or an expression.
pub fn classify_default(text: &str) -> DefaultValue {
    let text = text.trim();
    if NUMBER_RE.is_match(text)
        || DOUBLE_QUOTED_RE.is_match(text)
        || SINGLE_QUOTED_RE.is_match(text)
        || LITERAL_KEYWORD_RE.is_match(text)
    {
        DefaultValue::Constant(text.to_string())
    } else {
        DefaultValue::Expression(text.to_string())
    }
}
