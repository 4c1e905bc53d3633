#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    Str,
    Symbol,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Identifier name, literal body (without quotes), or symbol text.
    pub text: String,
    pub offset: usize,
}

impl Token {
    pub fn is_symbol(&self, symbol: &str) -> bool {
        self.kind == TokenKind::Symbol && self.text == symbol
    }

    pub fn is_ident(&self, name: &str) -> bool {
        self.kind == TokenKind::Ident && self.text.eq_ignore_ascii_case(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub offset: usize,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub errors: Vec<LexError>,
}

const TWO_CHAR_SYMBOLS: &[&str] = &["==", "!=", "=~", "!~", "<=", ">=", "<|", "=>", ".."];

const HYPHENATED_OPERATORS: &[&str] = &[
    "project-away",
    "project-keep",
    "project-rename",
    "project-reorder",
    "mv-expand",
    "mv-apply",
    "make-series",
    "parse-where",
    "parse-kv",
    "create-merge",
    "alter-merge",
    "materialized-view",
    "continuous-export",
];

/// Splits KQL text into tokens. Never fails; problems are reported in `errors`
/// and lexing resumes after the offending input.
pub fn tokenize(text: &str) -> Lexed {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut lexed = Lexed::default();
    let mut i = 0;

    while i < chars.len() {
        let (offset, c) = chars[i];
        let next = chars.get(i + 1).map(|(_, c)| *c);

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c == '/' && next == Some('/') {
            while i < chars.len() && chars[i].1 != '\n' {
                i += 1;
            }
            continue;
        }

        if c == '`' && next == Some('`') && chars.get(i + 2).map(|(_, c)| *c) == Some('`') {
            i = lex_fenced(&chars, i, &mut lexed);
            continue;
        }

        if c == '@' && matches!(next, Some('\'') | Some('"')) {
            i = lex_string(&chars, i + 1, offset, true, &mut lexed);
            continue;
        }

        if (c == 'h' || c == 'H') && matches!(next, Some('\'') | Some('"') | Some('@')) {
            if next == Some('@') {
                if matches!(chars.get(i + 2).map(|(_, c)| *c), Some('\'') | Some('"')) {
                    i = lex_string(&chars, i + 2, offset, true, &mut lexed);
                    continue;
                }
            } else {
                i = lex_string(&chars, i + 1, offset, false, &mut lexed);
                continue;
            }
        }

        if c == '\'' || c == '"' {
            i = lex_string(&chars, i, offset, false, &mut lexed);
            continue;
        }

        if c == '[' {
            if let Some(end) = lex_bracket_identifier(&chars, i, &mut lexed) {
                i = end;
                continue;
            }
        }

        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].1.is_ascii_digit() {
                i += 1;
            }
            if i + 1 < chars.len() && chars[i].1 == '.' && chars[i + 1].1.is_ascii_digit() {
                i += 1;
                while i < chars.len() && chars[i].1.is_ascii_digit() {
                    i += 1;
                }
            }
            while i < chars.len() && (chars[i].1.is_ascii_alphanumeric() || chars[i].1 == '_') {
                i += 1;
            }
            lexed.tokens.push(Token {
                kind: TokenKind::Number,
                text: collect(&chars[start..i]),
                offset,
            });
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].1.is_alphanumeric() || chars[i].1 == '_') {
                i += 1;
            }
            let mut word = collect(&chars[start..i]);
            if let Some(end) = hyphenated_extension(&chars, i, &word) {
                word = collect(&chars[start..end]);
                i = end;
            }
            lexed.tokens.push(Token {
                kind: TokenKind::Ident,
                text: word,
                offset,
            });
            continue;
        }

        if let Some(n) = next {
            let pair: String = [c, n].iter().collect();
            if TWO_CHAR_SYMBOLS.contains(&pair.as_str()) {
                lexed.tokens.push(Token {
                    kind: TokenKind::Symbol,
                    text: pair,
                    offset,
                });
                i += 2;
                continue;
            }
        }

        lexed.tokens.push(Token {
            kind: TokenKind::Symbol,
            text: c.to_string(),
            offset,
        });
        i += 1;
    }

    lexed
}

fn collect(chars: &[(usize, char)]) -> String {
    chars.iter().map(|(_, c)| *c).collect()
}

fn hyphenated_extension(chars: &[(usize, char)], end: usize, word: &str) -> Option<usize> {
    if chars.get(end).map(|(_, c)| *c) != Some('-') {
        return None;
    }
    let mut j = end + 1;
    while j < chars.len() && (chars[j].1.is_alphanumeric() || chars[j].1 == '_') {
        j += 1;
    }
    let candidate = format!("{}-{}", word, collect(&chars[end + 1..j]));
    if HYPHENATED_OPERATORS.contains(&candidate.to_ascii_lowercase().as_str()) {
        Some(j)
    } else {
        None
    }
}

/// Lexes a quoted literal starting at the quote character `chars[quote]`.
fn lex_string(
    chars: &[(usize, char)],
    quote: usize,
    offset: usize,
    verbatim: bool,
    lexed: &mut Lexed,
) -> usize {
    let delimiter = chars[quote].1;
    let mut body = String::new();
    let mut i = quote + 1;
    while i < chars.len() {
        let c = chars[i].1;
        if verbatim {
            if c == delimiter {
                if chars.get(i + 1).map(|(_, c)| *c) == Some(delimiter) {
                    body.push(c);
                    i += 2;
                    continue;
                }
                lexed.tokens.push(Token {
                    kind: TokenKind::Str,
                    text: body,
                    offset,
                });
                return i + 1;
            }
        } else if c == '\\' {
            if let Some((_, escaped)) = chars.get(i + 1) {
                body.push(*escaped);
                i += 2;
                continue;
            }
        } else if c == delimiter {
            lexed.tokens.push(Token {
                kind: TokenKind::Str,
                text: body,
                offset,
            });
            return i + 1;
        } else if c == '\n' {
            break;
        }
        body.push(c);
        i += 1;
    }
    lexed.errors.push(LexError {
        offset,
        message: "unterminated string literal".to_string(),
    });
    lexed.tokens.push(Token {
        kind: TokenKind::Str,
        text: body,
        offset,
    });
    i
}

fn lex_fenced(chars: &[(usize, char)], start: usize, lexed: &mut Lexed) -> usize {
    let offset = chars[start].0;
    let mut i = start + 3;
    let body_start = i;
    while i + 2 < chars.len() {
        if chars[i].1 == '`' && chars[i + 1].1 == '`' && chars[i + 2].1 == '`' {
            lexed.tokens.push(Token {
                kind: TokenKind::Str,
                text: collect(&chars[body_start..i]),
                offset,
            });
            return i + 3;
        }
        i += 1;
    }
    lexed.errors.push(LexError {
        offset,
        message: "unterminated multi-line string literal".to_string(),
    });
    chars.len()
}

/// `['name']` / `["name"]`; returns `None` when `[` opens an ordinary index.
fn lex_bracket_identifier(
    chars: &[(usize, char)],
    start: usize,
    lexed: &mut Lexed,
) -> Option<usize> {
    let offset = chars[start].0;
    let mut i = start + 1;
    while i < chars.len() && chars[i].1 == ' ' {
        i += 1;
    }
    let quote = chars.get(i).map(|(_, c)| *c)?;
    if quote != '\'' && quote != '"' {
        return None;
    }
    let mut scratch = Lexed::default();
    let mut end = lex_string(chars, i, offset, false, &mut scratch);
    let name = scratch.tokens.pop()?.text;
    while end < chars.len() && chars[end].1 == ' ' {
        end += 1;
    }
    if chars.get(end).map(|(_, c)| *c) != Some(']') || !scratch.errors.is_empty() {
        return None;
    }
    lexed.tokens.push(Token {
        kind: TokenKind::Ident,
        text: name,
        offset,
    });
    Some(end + 1)
}

/// Checks that brackets balance, reporting the first mismatch.
pub fn check_balance(tokens: &[Token]) -> Vec<LexError> {
    let mut stack: Vec<&Token> = Vec::new();
    let mut errors = Vec::new();
    for token in tokens.iter().filter(|t| t.kind == TokenKind::Symbol) {
        match token.text.as_str() {
            "(" | "[" | "{" => stack.push(token),
            ")" | "]" | "}" => {
                let expected = match token.text.as_str() {
                    ")" => "(",
                    "]" => "[",
                    _ => "{",
                };
                match stack.pop() {
                    Some(open) if open.text == expected => {}
                    _ => {
                        errors.push(LexError {
                            offset: token.offset,
                            message: format!("unexpected '{}'", token.text),
                        });
                        return errors;
                    }
                }
            }
            _ => {}
        }
    }
    if let Some(open) = stack.pop() {
        errors.push(LexError {
            offset: open.offset,
            message: format!("unclosed '{}'", open.text),
        });
    }
    errors
}
