//! Tokenizing scanner for AutoHotkey v2 source text.
//!
//! Walks the buffer once, left to right, and classifies every character as
//! live code, line comment, block comment or string literal. Brace depth is
//! tracked over code characters only, and matching `{`/`}` pairs are recorded
//! so later stages can find the end of any block in O(1).
//!
//! The scanner never fails. Editor buffers are usually mid-edit, so:
//! - an unterminated block comment runs to end of input
//! - an unterminated string ends at end of line (strings are single-line)
//! - an unmatched `{` simply has no partner

use std::collections::HashMap;

use super::facts::Position;

/// Escape character inside string literals.
const ESCAPE: char = '`';

/// Lexical region a character belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Code,
    LineComment,
    BlockComment,
    StringSingle,
    StringDouble,
}

impl Region {
    pub fn is_code(self) -> bool {
        self == Region::Code
    }

    pub fn is_comment(self) -> bool {
        matches!(self, Region::LineComment | Region::BlockComment)
    }

    pub fn is_string(self) -> bool {
        matches!(self, Region::StringSingle | Region::StringDouble)
    }

    fn quote(self) -> Option<char> {
        match self {
            Region::StringSingle => Some('\''),
            Region::StringDouble => Some('"'),
            _ => None,
        }
    }
}

/// One line of scanned source.
#[derive(Debug, Clone)]
pub struct ScannedLine {
    chars: Vec<char>,
    regions: Vec<Region>,
    depth_at_start: usize,
}

impl ScannedLine {
    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Length in characters.
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Brace depth before the first character of the line.
    pub fn depth_at_start(&self) -> usize {
        self.depth_at_start
    }

    /// The raw line text.
    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }

    /// Line text with comments blanked out; strings are kept verbatim.
    pub fn code_text(&self) -> String {
        self.chars
            .iter()
            .zip(&self.regions)
            .map(|(&c, r)| if r.is_comment() { ' ' } else { c })
            .collect()
    }

    /// Line text with comments and string contents blanked out.
    ///
    /// Quote characters survive so the string boundaries stay visible, but
    /// nothing inside a literal can be mistaken for an identifier or operator.
    pub fn masked_text(&self) -> String {
        self.chars
            .iter()
            .zip(&self.regions)
            .map(|(&c, &r)| match r {
                Region::Code => c,
                Region::LineComment | Region::BlockComment => ' ',
                _ if r.quote() == Some(c) => c,
                _ => ' ',
            })
            .collect()
    }

    /// Whether the line contains nothing but whitespace.
    pub fn is_blank(&self) -> bool {
        self.chars.iter().all(|c| c.is_whitespace())
    }

    /// Whether the line holds a comment and nothing else.
    pub fn is_comment_only(&self) -> bool {
        let mut saw_comment = false;
        for (c, r) in self.chars.iter().zip(&self.regions) {
            if r.is_comment() {
                saw_comment = true;
            } else if !c.is_whitespace() {
                return false;
            }
        }
        saw_comment
    }

    /// Index of the first non-whitespace code character.
    pub fn first_code_char(&self) -> Option<usize> {
        self.chars
            .iter()
            .zip(&self.regions)
            .position(|(c, r)| r.is_code() && !c.is_whitespace())
    }

    /// Whether the line has no code apart from whitespace.
    pub fn has_no_code(&self) -> bool {
        self.first_code_char().is_none()
    }
}

/// A fully scanned buffer.
#[derive(Debug, Clone)]
pub struct ScannedSource {
    lines: Vec<ScannedLine>,
    /// Opening brace position -> matching closing brace position.
    brace_pairs: HashMap<Position, Position>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    LineComment,
    BlockComment,
    Str(Region),
}

impl ScannedSource {
    /// Scan `text` in a single pass.
    pub fn scan(text: &str) -> Self {
        let mut lines = Vec::new();
        let mut brace_pairs = HashMap::new();
        let mut open_braces: Vec<Position> = Vec::new();
        let mut state = State::Code;
        let mut depth = 0usize;

        for (line_idx, raw) in text.split('\n').enumerate() {
            let chars: Vec<char> = raw.strip_suffix('\r').unwrap_or(raw).chars().collect();
            let mut regions = Vec::with_capacity(chars.len());
            let depth_at_start = depth;

            let mut i = 0;
            while i < chars.len() {
                let c = chars[i];
                let next = chars.get(i + 1).copied();

                match state {
                    State::Code => {
                        if c == ';' && (i == 0 || chars[i - 1].is_whitespace()) {
                            state = State::LineComment;
                            regions.push(Region::LineComment);
                        } else if c == '/' && next == Some('*') {
                            state = State::BlockComment;
                            regions.push(Region::BlockComment);
                            regions.push(Region::BlockComment);
                            i += 2;
                            continue;
                        } else if c == '"' {
                            state = State::Str(Region::StringDouble);
                            regions.push(Region::StringDouble);
                        } else if c == '\'' {
                            state = State::Str(Region::StringSingle);
                            regions.push(Region::StringSingle);
                        } else {
                            regions.push(Region::Code);
                            let pos = Position::new(line_idx, i);
                            if c == '{' {
                                open_braces.push(pos);
                                depth += 1;
                            } else if c == '}' {
                                if let Some(open) = open_braces.pop() {
                                    brace_pairs.insert(open, pos);
                                }
                                depth = depth.saturating_sub(1);
                            }
                        }
                    }
                    State::LineComment => regions.push(Region::LineComment),
                    State::BlockComment => {
                        regions.push(Region::BlockComment);
                        if c == '*' && next == Some('/') {
                            regions.push(Region::BlockComment);
                            state = State::Code;
                            i += 2;
                            continue;
                        }
                    }
                    State::Str(region) => {
                        regions.push(region);
                        if c == ESCAPE && next.is_some() {
                            regions.push(region);
                            i += 2;
                            continue;
                        }
                        if Some(c) == region.quote() {
                            state = State::Code;
                        }
                    }
                }
                i += 1;
            }

            // Only block comments survive a line break.
            if state != State::BlockComment {
                state = State::Code;
            }

            lines.push(ScannedLine {
                chars,
                regions,
                depth_at_start,
            });
        }

        Self { lines, brace_pairs }
    }

    pub fn lines(&self) -> &[ScannedLine] {
        &self.lines
    }

    pub fn line(&self, idx: usize) -> Option<&ScannedLine> {
        self.lines.get(idx)
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Find the `}` matching the `{` at `open`.
    ///
    /// Returns None when `open` is not a code brace or is never closed.
    pub fn matching_brace(&self, open: Position) -> Option<Position> {
        self.brace_pairs.get(&open).copied()
    }

    /// Brace depth immediately before the character at `pos`.
    pub fn depth_before(&self, pos: Position) -> usize {
        let Some(line) = self.lines.get(pos.line) else {
            return 0;
        };
        let mut depth = line.depth_at_start as isize;
        for (c, r) in line.chars.iter().zip(&line.regions).take(pos.character) {
            if !r.is_code() {
                continue;
            }
            match c {
                '{' => depth += 1,
                '}' => depth -= 1,
                _ => {}
            }
        }
        depth.max(0) as usize
    }

    /// Position just past the last character of the buffer.
    pub fn end_position(&self) -> Position {
        let last = self.lines.len().saturating_sub(1);
        Position::new(last, self.lines.get(last).map_or(0, |l| l.len()))
    }

    /// Iterate positions with their characters and regions, starting at
    /// `from` and running to end of input. Line breaks yield `'\n'` in the
    /// region of the preceding line end (`Code` for empty lines).
    pub fn chars_from(&self, from: Position) -> impl Iterator<Item = (Position, char, Region)> + '_ {
        self.lines
            .iter()
            .enumerate()
            .skip(from.line)
            .flat_map(move |(idx, line)| {
                let start = if idx == from.line { from.character } else { 0 };
                let newline_region = line.regions.last().copied().unwrap_or(Region::Code);
                line.chars
                    .iter()
                    .zip(&line.regions)
                    .enumerate()
                    .skip(start)
                    .map(move |(col, (&c, &r))| (Position::new(idx, col), c, r))
                    .chain(std::iter::once((
                        Position::new(idx, line.len()),
                        '\n',
                        newline_region,
                    )))
            })
    }
}
