//! Composes scanner, signature and body results into `FunctionMetadata`.

use once_cell::sync::Lazy;
use regex::Regex;

use super::body::scan_body;
use super::facts::{BodyKind, DocumentVersion, FunctionMetadata, Location, Position};
use super::scanner::ScannedSource;
use super::signature::{next_line_brace, parse_declaration, BodySpan, Signature};

static CLASS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i:class)\s+([^\W\d]\w*)(?:\s+(?i:extends)\s+[\w.]+)?\s*(\{)?\s*$").unwrap()
});

/// A `class Name { ... }` block.
#[derive(Debug, Clone)]
struct ClassSpan {
    name: String,
    location: Location,
}

/// Build metadata for every declaration in `source`, ordered by start
/// position.
pub fn assemble(source: &ScannedSource, version: DocumentVersion) -> Vec<FunctionMetadata> {
    let signatures = find_signatures(source);
    let classes = find_classes(source);

    let locations: Vec<Location> = signatures
        .iter()
        .map(|sig| span(sig.start, sig.end(source)))
        .collect();

    let mut functions: Vec<FunctionMetadata> = signatures
        .iter()
        .zip(&locations)
        .map(|(sig, &location)| {
            let body = body_location(source, sig);
            let nested: Vec<Location> = locations
                .iter()
                .filter(|other| **other != location && body.encloses(other))
                .copied()
                .collect();
            let vars = scan_body(source, body, &nested, &sig.parameters);
            let (min_params, max_params) = (sig.min_params(), sig.max_params());

            tracing::trace!(
                function = %sig.name,
                %location,
                min_params,
                %max_params,
                "assembled declaration"
            );

            FunctionMetadata {
                name: sig.name.clone(),
                is_variadic: max_params.is_variadic(),
                parameters: sig.parameters.clone(),
                static_variables: vars.static_variables,
                local_variables: vars.local_variables,
                global_variables: vars.global_variables,
                min_params,
                max_params,
                return_type: sig.return_type.clone(),
                location,
                documentation: documentation(source, sig.start.line),
                version,
                body_kind: match sig.body {
                    BodySpan::Block { .. } => BodyKind::Block,
                    BodySpan::Arrow { .. } => BodyKind::Arrow,
                },
                class_name: owning_class(&location, &locations, &classes),
                is_static: sig.is_static,
                parse_error: sig.parse_error.clone(),
            }
        })
        .collect();

    functions.sort_by_key(|f| f.location.start());
    functions
}

/// Find the innermost record whose location contains `pos`.
///
/// Nested declarations overlap their parents; the one starting last wins.
pub fn find_at_position(functions: &[FunctionMetadata], pos: Position) -> Option<&FunctionMetadata> {
    functions
        .iter()
        .filter(|f| f.location.contains(pos))
        .max_by_key(|f| f.location.start())
}

fn span(start: Position, end: Position) -> Location {
    Location {
        start_line: start.line,
        start_character: start.character,
        end_line: end.line,
        end_character: end.character,
    }
}

fn find_signatures(source: &ScannedSource) -> Vec<Signature> {
    let mut signatures = Vec::new();
    let mut line = 0;
    while line < source.line_count() {
        match parse_declaration(source, line) {
            Some(sig) => {
                line = sig.header_end_line + 1;
                signatures.push(sig);
            }
            None => line += 1,
        }
    }
    signatures
}

fn find_classes(source: &ScannedSource) -> Vec<ClassSpan> {
    let mut classes = Vec::new();
    for (idx, scanned) in source.lines().iter().enumerate() {
        let Some(first) = scanned.first_code_char() else {
            continue;
        };
        let code: String = scanned.code_text().chars().skip(first).collect();
        let Some(caps) = CLASS_RE.captures(&code) else {
            continue;
        };
        let Some(name) = caps.get(1) else {
            continue;
        };

        let open = match caps.get(2) {
            Some(brace) => Some(Position::new(
                idx,
                first + code[..brace.start()].chars().count(),
            )),
            None => next_line_brace(source, idx),
        };
        let Some(open) = open else {
            continue;
        };
        let end = match source.matching_brace(open) {
            Some(close) => Position::new(close.line, close.character + 1),
            None => source.end_position(),
        };
        classes.push(ClassSpan {
            name: name.as_str().to_string(),
            location: span(Position::new(idx, first), end),
        });
    }
    classes
}

/// Span scanned for body variables: inside the braces, or the arrow
/// expression.
fn body_location(source: &ScannedSource, sig: &Signature) -> Location {
    match sig.body {
        BodySpan::Block { open, close } => span(
            Position::new(open.line, open.character + 1),
            close.unwrap_or_else(|| source.end_position()),
        ),
        BodySpan::Arrow { start, end } => span(start, end),
    }
}

/// Name of the class a declaration belongs to, if it is a method.
///
/// A function nested in a method belongs to the method, not the class.
fn owning_class(location: &Location, functions: &[Location], classes: &[ClassSpan]) -> Option<String> {
    let class = classes
        .iter()
        .filter(|c| c.location.encloses(location))
        .max_by_key(|c| c.location.start())?;
    let inside_function = functions
        .iter()
        .filter(|f| *f != location && f.encloses(location))
        .any(|f| f.start() > class.location.start());
    (!inside_function).then(|| class.name.clone())
}

/// Collect the comment block directly above `line`.
///
/// Walks upward over comment-only lines; a blank or code line ends it.
fn documentation(source: &ScannedSource, line: usize) -> Option<String> {
    let mut collected = Vec::new();
    for idx in (0..line).rev() {
        match source.line(idx) {
            Some(scanned) if scanned.is_comment_only() => collected.push(scanned.text()),
            _ => break,
        }
    }
    collected.reverse();

    let cleaned: Vec<String> = collected.iter().map(|l| clean_comment_line(l)).collect();
    let first = cleaned.iter().position(|l| !l.is_empty())?;
    let last = cleaned.iter().rposition(|l| !l.is_empty())?;
    Some(cleaned[first..=last].join("\n"))
}

fn clean_comment_line(line: &str) -> String {
    let mut text = line.trim();
    if text.starts_with(';') {
        text = text.trim_start_matches(';');
    } else {
        text = text.trim_start_matches("/**").trim_start_matches("/*");
        text = text.trim_end_matches("*/");
        text = text.trim_start();
        text = text.strip_prefix('*').unwrap_or(text);
    }
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::facts::{MaxParams, VariableScope};

    fn run(src: &str) -> Vec<FunctionMetadata> {
        assemble(&ScannedSource::scan(src), DocumentVersion(1))
    }

    #[test]
    fn test_simple_function() {
        let funcs = run("Simple() { return 1 }");
        assert_eq!(funcs.len(), 1);
        let f = &funcs[0];
        assert_eq!(f.name, "Simple");
        assert!(f.parameters.is_empty());
        assert_eq!(f.min_params, 0);
        assert_eq!(f.max_params, MaxParams::Count(0));
        assert_eq!(f.location.start(), Position::new(0, 0));
        assert_eq!(f.location.end(), Position::new(0, 21));
        assert_eq!(f.body_kind, BodyKind::Block);
        assert_eq!(f.version, DocumentVersion(1));
    }

    #[test]
    fn test_siblings_are_ordered_and_disjoint() {
        let src = "First(a) {\n    return a\n}\n\nSecond(b, c := 2) {\n    return b + c\n}\n";
        let funcs = run(src);
        assert_eq!(funcs.len(), 2);
        assert_eq!(funcs[0].name, "First");
        assert_eq!(funcs[1].name, "Second");
        assert!(!funcs[0].location.overlaps(&funcs[1].location));
        assert!(funcs[0].location.start() < funcs[1].location.start());
        assert_eq!((funcs[1].min_params, funcs[1].max_params), (1, MaxParams::Count(2)));
    }

    #[test]
    fn test_documentation_above_declaration() {
        let src = "; Adds two numbers.\n; Returns the sum.\nAdd(a, b) => a + b";
        let funcs = run(src);
        assert_eq!(
            funcs[0].documentation.as_deref(),
            Some("Adds two numbers.\nReturns the sum.")
        );
        assert_eq!(funcs[0].body_kind, BodyKind::Arrow);
    }

    #[test]
    fn test_block_comment_documentation() {
        let src = "/**\n * Greets someone.\n * @param name who\n */\nGreet(name) {\n}";
        let funcs = run(src);
        assert_eq!(
            funcs[0].documentation.as_deref(),
            Some("Greets someone.\n@param name who")
        );
    }

    #[test]
    fn test_blank_line_breaks_documentation() {
        let src = "; unrelated\n\nPlain() {\n}";
        assert_eq!(run(src)[0].documentation, None);

        let src = "x := 1 ; trailing\nPlain() {\n}";
        assert_eq!(run(src)[0].documentation, None);
    }

    #[test]
    fn test_methods_get_class_name() {
        let src = "class Counter extends Base {\n    static Create() {\n        return Counter()\n    }\n    Inc(by := 1) {\n        this.n += by\n    }\n}\nFree() {\n}";
        let funcs = run(src);
        let names: Vec<_> = funcs.iter().map(|f| f.qualified_name()).collect();
        assert_eq!(names, vec!["Counter.Create", "Counter.Inc", "Free"]);
        assert!(funcs[0].is_static);
        assert!(!funcs[1].is_static);
        assert!(funcs[1].local_variables.is_empty());
    }

    #[test]
    fn test_nested_function_variables_stay_local() {
        let src = "Outer() {\n    a := 1\n    Inner() {\n        b := 2\n    }\n    c := 3\n}";
        let funcs = run(src);
        assert_eq!(funcs.len(), 2);
        let outer: Vec<_> = funcs[0].local_variables.iter().map(|v| v.name.as_str()).collect();
        let inner: Vec<_> = funcs[1].local_variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(outer, vec!["a", "c"]);
        assert_eq!(inner, vec!["b"]);
        assert!(funcs[0].location.encloses(&funcs[1].location));
    }

    #[test]
    fn test_find_at_position_prefers_innermost() {
        let src = "Outer() {\n    a := 1\n    Inner() {\n        b := 2\n    }\n}\n\nOther() {\n}";
        let funcs = run(src);
        let at = |l, c| find_at_position(&funcs, Position::new(l, c)).map(|f| f.name.as_str());
        assert_eq!(at(1, 4), Some("Outer"));
        assert_eq!(at(3, 8), Some("Inner"));
        assert_eq!(at(6, 0), None);
        assert_eq!(at(7, 0), Some("Other"));
        assert_eq!(at(8, 1), None);
    }

    #[test]
    fn test_statics_and_chain() {
        let src = "Tally(x) {\n    static total := 0\n    a := b := c := 0\n    x := 5\n}";
        let f = &run(src)[0];
        assert_eq!(f.static_variables.len(), 1);
        assert_eq!(f.static_variables[0].scope, VariableScope::Static);
        let locals: Vec<_> = f.local_variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(locals, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_assemble_is_idempotent() {
        let src = "F(&a, b?, c := \"x\") {\n    static n := 0\n}\nG(*) => 0";
        let source = ScannedSource::scan(src);
        assert_eq!(
            assemble(&source, DocumentVersion(3)),
            assemble(&source, DocumentVersion(3))
        );
    }

    #[test]
    fn test_empty_and_garbage_input() {
        assert!(run("").is_empty());
        assert!(run("if (x) {\n}\nMsgBox(\"hi\")\n((((").is_empty());
    }

    #[test]
    fn test_unterminated_block_runs_to_end() {
        let funcs = run("Broken(a) {\n    x := 1\n");
        assert_eq!(funcs.len(), 1);
        assert_eq!(funcs[0].location.end(), Position::new(2, 0));
        assert_eq!(funcs[0].local_variables.len(), 1);
    }
}
