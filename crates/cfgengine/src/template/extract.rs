//! Static extraction of function calls from a template.
//!
//! The extractor never renders. It splits a template into literal text and
//! `{{ … }}` / `{% … %}` tags, tokenizes the tags, and reports every call
//! whose callee is a bare identifier bound as a global function in the
//! [`TemplateEnv`].
//!
//! The scan is shallow: a call counts only when it is not inside the
//! argument list of another call, filter, method or test. It is also purely
//! syntactic, so calls in branches that would not execute are still counted.
//!
//! ```text
//! {{ f() }}                 -> {f}
//! {{ f(g()) }}              -> {f}         g is an argument of f
//! {{ x | upper(g()) }}      -> {}          upper is a filter, g its argument
//! {{ obj.f() }}             -> {}          method call
//! {% if c %}{{ f() }}{% endif %} -> {f}    branches are not simulated
//! {% for f in items %}      -> {}          f is a loop variable, not a call
//! ```

use std::collections::BTreeSet;

use super::TemplateEnv;

/// Identifiers that introduce syntax rather than name a callee.
const KEYWORDS: &[&str] = &[
    "and", "as", "block", "call", "elif", "else", "extends", "filter", "for", "from", "if",
    "import", "in", "include", "is", "macro", "not", "or", "recursive", "set", "with",
];

/// The whole template is a single `{{ name(...) }}` expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoleCall<'a> {
    /// The callee.
    pub name: &'a str,
    /// Expression source between the delimiters, without whitespace markers.
    pub expression: &'a str,
}

/// Finds top-level function calls in templates rendered against `env`.
#[derive(Debug, Clone, Copy)]
pub struct FunctionCallExtractor<'env> {
    env: &'env TemplateEnv,
}

impl<'env> FunctionCallExtractor<'env> {
    pub fn new(env: &'env TemplateEnv) -> Self {
        Self { env }
    }

    /// Returns the distinct names of top-level calls to global functions.
    pub fn extract(&self, template: &str) -> BTreeSet<String> {
        let mut calls = BTreeSet::new();
        for segment in Segments::new(template) {
            if let Segment::Tag(body) = segment {
                let tokens: Vec<Token<'_>> = Lexer::new(body).collect();
                for name in top_level_calls(&tokens) {
                    if self.env.is_function(name) {
                        calls.insert(name.to_string());
                    }
                }
            }
        }
        calls
    }

    /// Returns the call when the rendered output of `template` is exactly one
    /// expression tag that is a single call to a global function.
    ///
    /// Text the renderer would drop does not count: one trailing newline, and
    /// whitespace next to a `{{-` or `-}}` marker.
    pub fn sole_call<'a>(&self, template: &'a str) -> Option<SoleCall<'a>> {
        let template = strip_trailing_newline(template);
        let core = template.trim_start();
        if core.len() < template.len() && !core.starts_with("{{-") {
            return None;
        }
        let trimmed = core.trim_end();
        if trimmed.len() < core.len() && !trimmed.ends_with("-}}") {
            return None;
        }
        if !trimmed.starts_with("{{") || !trimmed.ends_with("}}") {
            return None;
        }

        let mut segments = Segments::new(trimmed);
        let (Some(Segment::Tag(body)), None) = (segments.next(), segments.next()) else {
            return None;
        };

        let tokens: Vec<Token<'_>> = Lexer::new(body).collect();
        let name = match tokens.as_slice() {
            [Token::Ident(name), Token::Open('('), .., Token::Close(')')] => *name,
            _ => return None,
        };
        if matching_close(&tokens, 1) != Some(tokens.len() - 1) || !self.env.is_function(name) {
            return None;
        }
        Some(SoleCall {
            name,
            expression: body.trim(),
        })
    }
}

/// Drops one trailing `\n` or `\r\n`, as the renderer does.
fn strip_trailing_newline(template: &str) -> &str {
    match template.strip_suffix('\n') {
        Some(rest) => rest.strip_suffix('\r').unwrap_or(rest),
        None => template,
    }
}

/// Index of the bracket closing the one opened at `open`.
fn matching_close(tokens: &[Token<'_>], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        match token {
            Token::Open(_) => depth += 1,
            Token::Close(_) => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// What an open bracket on the scan stack belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bracket {
    /// Argument list of a call, filter, method or test.
    Args,
    /// Grouping parens, list/dict literals and subscripts.
    Other,
}

/// Callee names of calls that are not nested in another argument list.
fn top_level_calls<'a>(tokens: &[Token<'a>]) -> Vec<&'a str> {
    let mut calls = Vec::new();
    let mut stack: Vec<Bracket> = Vec::new();

    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::Ident(name) => {
                if tokens.get(i + 1) != Some(&Token::Open('(')) || KEYWORDS.contains(name) {
                    continue;
                }
                let nested = stack.contains(&Bracket::Args);
                if !nested && is_bare_callee(tokens, i) {
                    calls.push(*name);
                }
            }
            Token::Open(c) => {
                let args = *c == '(' && i > 0 && opens_arguments(&tokens[i - 1]);
                stack.push(if args { Bracket::Args } else { Bracket::Other });
            }
            Token::Close(_) => {
                stack.pop();
            }
            _ => {}
        }
    }
    calls
}

/// Whether a `(` following `prev` starts an argument list.
fn opens_arguments(prev: &Token<'_>) -> bool {
    match prev {
        Token::Ident(name) => !KEYWORDS.contains(name),
        Token::Close(')') | Token::Close(']') => true,
        _ => false,
    }
}

/// The identifier at `i` is not a method, filter, test or macro name.
fn is_bare_callee(tokens: &[Token<'_>], i: usize) -> bool {
    let prev = i.checked_sub(1).and_then(|p| tokens.get(p));
    match prev {
        Some(Token::Punct('.')) | Some(Token::Punct('|')) => false,
        Some(Token::Ident("is")) | Some(Token::Ident("macro")) => false,
        Some(Token::Ident("not")) => {
            !matches!(i.checked_sub(2).and_then(|p| tokens.get(p)), Some(Token::Ident("is")))
        }
        _ => true,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    /// Literal text outside any tag.
    Text,
    /// Body of an expression or statement tag, without delimiters.
    Tag(&'a str),
}

/// Splits a template into text and tag bodies. Comments are dropped and the
/// body of `{% raw %}` blocks is returned as text.
struct Segments<'a> {
    input: &'a str,
    pos: usize,
    in_raw: bool,
}

impl<'a> Segments<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            in_raw: false,
        }
    }

    fn next_tag_start(&self) -> Option<usize> {
        let rest = &self.input[self.pos..];
        let mut offset = 0;
        while let Some(found) = rest[offset..].find('{') {
            let at = offset + found;
            if matches!(rest.as_bytes().get(at + 1).copied(), Some(b'{' | b'%' | b'#')) {
                return Some(self.pos + at);
            }
            offset = at + 1;
        }
        None
    }

    /// Finds the `{% endraw %}` tag, returning its start and end offsets.
    fn find_endraw(&self) -> Option<(usize, usize)> {
        let mut search = self.pos;
        while let Some(found) = self.input[search..].find("{%") {
            let start = search + found;
            let (body, end) = scan_tag(self.input, start + 2, "%}");
            if statement_name(body) == Some("endraw") {
                return Some((start, end));
            }
            search = start + 2;
        }
        None
    }
}

impl<'a> Iterator for Segments<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Segment<'a>> {
        loop {
            if self.pos >= self.input.len() {
                return None;
            }

            if self.in_raw {
                self.in_raw = false;
                let (text_end, resume) = self
                    .find_endraw()
                    .unwrap_or((self.input.len(), self.input.len()));
                let empty = text_end == self.pos;
                self.pos = resume;
                if empty {
                    continue;
                }
                return Some(Segment::Text);
            }

            let start = match self.next_tag_start() {
                Some(start) if start > self.pos => {
                    self.pos = start;
                    return Some(Segment::Text);
                }
                Some(start) => start,
                None => {
                    self.pos = self.input.len();
                    return Some(Segment::Text);
                }
            };

            match self.input.as_bytes()[start + 1] {
                b'#' => {
                    self.pos = self.input[start + 2..]
                        .find("#}")
                        .map(|i| start + 2 + i + 2)
                        .unwrap_or(self.input.len());
                }
                b'{' => {
                    let (body, end) = scan_tag(self.input, start + 2, "}}");
                    self.pos = end;
                    return Some(Segment::Tag(strip_markers(body)));
                }
                _ => {
                    let (body, end) = scan_tag(self.input, start + 2, "%}");
                    self.pos = end;
                    let body = strip_markers(body);
                    if statement_name(body) == Some("raw") {
                        self.in_raw = true;
                        continue;
                    }
                    return Some(Segment::Tag(body));
                }
            }
        }
    }
}

/// Scans from `from` to the closing delimiter, skipping string literals.
/// Returns the body and the offset just past the delimiter. An unterminated
/// tag runs to the end of the input.
fn scan_tag<'a>(input: &'a str, from: usize, close: &str) -> (&'a str, usize) {
    let bytes = input.as_bytes();
    let mut i = from;
    let mut quote: Option<u8> = None;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => {
                if b == b'"' || b == b'\'' {
                    quote = Some(b);
                } else if bytes[i..].starts_with(close.as_bytes()) {
                    return (&input[from..i], i + close.len());
                }
            }
        }
        i += 1;
    }
    (&input[from..], input.len())
}

/// Removes whitespace-control markers (`-`, `+`) next to the delimiters.
fn strip_markers(body: &str) -> &str {
    let body = body.strip_prefix(['-', '+']).unwrap_or(body);
    body.strip_suffix(['-', '+']).unwrap_or(body)
}

fn statement_name(body: &str) -> Option<&str> {
    strip_markers(body).split_whitespace().next()
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token<'a> {
    Ident(&'a str),
    Str,
    Number,
    /// `(`, `[` or `{`.
    Open(char),
    /// `)`, `]` or `}`.
    Close(char),
    /// Any other single character (operators, `.`, `|`, `,`, ...).
    Punct(char),
}

/// Minimal lexer for Jinja expressions.
struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn take_while(&mut self, start: usize, pred: impl Fn(char) -> bool) -> &'a str {
        let rest = &self.input[start..];
        let len = rest.find(|c: char| !pred(c)).unwrap_or(rest.len());
        self.pos = start + len;
        &self.input[start..start + len]
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        let rest = &self.input[self.pos..];
        let trimmed = rest.trim_start();
        let start = self.pos + (rest.len() - trimmed.len());
        let c = trimmed.chars().next()?;

        let token = match c {
            c if c.is_alphabetic() || c == '_' => {
                Token::Ident(self.take_while(start, |c| c.is_alphanumeric() || c == '_'))
            }
            c if c.is_ascii_digit() => {
                self.take_while(start, |c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
                Token::Number
            }
            '"' | '\'' => {
                let bytes = self.input.as_bytes();
                let mut i = start + 1;
                while i < bytes.len() && bytes[i] != c as u8 {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
                self.pos = (i + 1).min(self.input.len());
                Token::Str
            }
            '(' | '[' | '{' => {
                self.pos = start + 1;
                Token::Open(c)
            }
            ')' | ']' | '}' => {
                self.pos = start + 1;
                Token::Close(c)
            }
            other => {
                self.pos = start + other.len_utf8();
                Token::Punct(other)
            }
        };
        Some(token)
    }
}
