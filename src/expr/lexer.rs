//! Regex-driven tokenizer for expression sources.
//!
//! Splits an expression string into position-preserving tokens. Matching is
//! longest-match-wins over an ordered pattern table; ties go to the earlier
//! pattern. Whitespace tokens are dropped before the stream is returned, and
//! anything the table does not recognize becomes a [`TokenKind::Other`]
//! token so the syntax check can point at it.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// Lexical category assigned to a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenKind {
    /// Quoted string literal (lexeme is the decoded content).
    String,
    /// Whitespace run; dropped before parsing.
    Space,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// `&&`, `||`, `and`, `or`
    AndOr,
    /// `<= < >= > == !=` and `le lt ge gt eq ne`
    Compare,
    /// Survey answer identifier (`digits X digits X digits` plus suffixes).
    Sgqa,
    /// Identifier-like word, optionally with one `:suffix` and dot suffixes.
    Word,
    /// Integer or decimal literal.
    Number,
    /// `!`
    Not,
    /// `=`, `+=`, `-=`, `*=`, `/=`
    Assign,
    /// `+ - * /`
    BinaryOp,
    /// Unrecognized input; always a syntax error.
    Other,
}

/// A lexeme with its byte offset in the source expression.
#[derive(Debug, Clone, Serialize)]
pub struct Token {
    /// Token text. For `String` tokens this is the decoded content; for all
    /// other kinds it is the exact source slice.
    pub lexeme: String,
    /// Byte offset of the token start (opening quote for strings).
    pub offset: usize,
    /// Lexical category.
    pub kind: TokenKind,
}

/// Upper bound on tokens per expression, guarding pathological inputs.
pub const MAX_EXPRESSION_TOKENS: usize = 2048;

struct Pattern {
    regex: Regex,
    kind: TokenKind,
}

fn pattern_table() -> &'static [Pattern] {
    static TABLE: OnceLock<Vec<Pattern>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let entry = |pattern: &str, kind: TokenKind| Pattern {
            regex: Regex::new(pattern).expect("valid token regex"),
            kind,
        };
        vec![
            entry(r#"\A"(?:\\.|[^"\\])*""#, TokenKind::String),
            entry(r"\A'(?:\\.|[^'\\])*'", TokenKind::String),
            entry(r"\A\s+", TokenKind::Space),
            entry(r"\A\(", TokenKind::LParen),
            entry(r"\A\)", TokenKind::RParen),
            entry(r"\A,", TokenKind::Comma),
            entry(r"\A!", TokenKind::Not),
            // Increment/decrement are not part of the grammar; tokenized as
            // Other so the syntax check rejects them with a position.
            entry(r"\A(?:\+\+|--)", TokenKind::Other),
            entry(r"\A(?:\+=|-=|\*=|/=|=)", TokenKind::Assign),
            entry(r"\A[+*/-]", TokenKind::BinaryOp),
            entry(
                r"\A(?:<=|>=|==|!=|<|>|(?i:le|lt|ge|gt|eq|ne)\b)",
                TokenKind::Compare,
            ),
            entry(r"\A(?:&&|\|\||(?i:and|or)\b)", TokenKind::AndOr),
            entry(
                r"\A[0-9]+X[0-9]+X[0-9]+[A-Za-z0-9_]*(?:#[12])?",
                TokenKind::Sgqa,
            ),
            entry(
                r"\A[A-Za-z][A-Za-z0-9_]*(?::[A-Za-z0-9_]+)?(?:\.[A-Za-z0-9_]+){0,4}",
                TokenKind::Word,
            ),
            entry(r"\A(?:[0-9]+\.[0-9]*|\.[0-9]+|[0-9]+)", TokenKind::Number),
        ]
    })
}

/// Tokenizes `source`, dropping whitespace.
///
/// Never fails: unrecognized input is retained as `Other` tokens and
/// rejected by the evaluator's syntax check.
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < source.len() {
        let rest = &source[pos..];
        let mut best: Option<(usize, TokenKind)> = None;
        for pattern in pattern_table() {
            if let Some(m) = pattern.regex.find(rest) {
                let len = m.end();
                if best.map_or(true, |(best_len, _)| len > best_len) {
                    best = Some((len, pattern.kind));
                }
            }
        }

        match best {
            Some((len, TokenKind::Space)) => {
                pos += len;
            }
            Some((len, TokenKind::String)) => {
                tokens.push(Token {
                    lexeme: decode_string(&rest[..len]),
                    offset: pos,
                    kind: TokenKind::String,
                });
                pos += len;
            }
            Some((len, kind)) => {
                tokens.push(Token {
                    lexeme: rest[..len].to_string(),
                    offset: pos,
                    kind,
                });
                pos += len;
            }
            None => {
                let ch = rest.chars().next().expect("non-empty remainder");
                // A lone quote means an unterminated string; capture the
                // rest of the input so the diagnostic spans it.
                let len = if ch == '"' || ch == '\'' {
                    rest.len()
                } else {
                    ch.len_utf8()
                };
                tokens.push(Token {
                    lexeme: rest[..len].to_string(),
                    offset: pos,
                    kind: TokenKind::Other,
                });
                pos += len;
            }
        }
    }

    tokens
}

/// Strips the surrounding quotes and decodes backslash escapes.
fn decode_string(raw: &str) -> String {
    let inner = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{tokenize, TokenKind};

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn classifies_operators_longest_first() {
        assert_eq!(kinds("<="), vec![TokenKind::Compare]);
        assert_eq!(kinds("!="), vec![TokenKind::Compare]);
        assert_eq!(kinds("=="), vec![TokenKind::Compare]);
        assert_eq!(kinds("+="), vec![TokenKind::Assign]);
        assert_eq!(kinds("="), vec![TokenKind::Assign]);
        assert_eq!(kinds("!"), vec![TokenKind::Not]);
        assert_eq!(kinds("++"), vec![TokenKind::Other]);
        assert_eq!(kinds("--"), vec![TokenKind::Other]);
    }

    #[test]
    fn keyword_operators_are_whole_word() {
        assert_eq!(kinds("le"), vec![TokenKind::Compare]);
        assert_eq!(kinds("LE"), vec![TokenKind::Compare]);
        assert_eq!(kinds("length"), vec![TokenKind::Word]);
        assert_eq!(kinds("and"), vec![TokenKind::AndOr]);
        assert_eq!(kinds("android"), vec![TokenKind::Word]);
        assert_eq!(kinds("||"), vec![TokenKind::AndOr]);
    }

    #[test]
    fn sgqa_wins_over_number() {
        let tokens = tokenize("12X34X56 * 12X3X5lab1_ber");
        assert_eq!(tokens[0].kind, TokenKind::Sgqa);
        assert_eq!(tokens[0].lexeme, "12X34X56");
        assert_eq!(tokens[2].kind, TokenKind::Sgqa);
        assert_eq!(tokens[2].lexeme, "12X3X5lab1_ber");
    }

    #[test]
    fn words_take_colon_and_dot_suffixes() {
        let tokens = tokenize("TOKEN:EMAIL q5pointChoice.value INSERTANS:123X45X67");
        assert_eq!(tokens[0].lexeme, "TOKEN:EMAIL");
        assert_eq!(tokens[1].lexeme, "q5pointChoice.value");
        assert_eq!(tokens[2].lexeme, "INSERTANS:123X45X67");
        assert!(tokens.iter().all(|t| t.kind == TokenKind::Word));
    }

    #[test]
    fn numbers_allow_leading_and_trailing_fractions() {
        for src in [".5", "0.7", "42", "72.35", "72."] {
            let tokens = tokenize(src);
            assert_eq!(tokens.len(), 1, "{src}");
            assert_eq!(tokens[0].kind, TokenKind::Number, "{src}");
            assert_eq!(tokens[0].lexeme, src);
        }
    }

    #[test]
    fn offsets_are_byte_positions_into_source() {
        let source = "one + 'hi there' * 2";
        for token in tokenize(source) {
            if token.kind == TokenKind::String {
                assert_eq!(source.as_bytes()[token.offset], b'\'');
                assert_eq!(token.lexeme, "hi there");
            } else {
                let end = token.offset + token.lexeme.len();
                assert_eq!(&source[token.offset..end], token.lexeme);
            }
        }
    }

    #[test]
    fn string_escapes_decode() {
        let tokens = tokenize(r#""a\"b" 'c\'d' "n\n""#);
        let lexemes: Vec<&str> = tokens.iter().map(|t| t.lexeme.as_str()).collect();
        assert_eq!(lexemes, vec!["a\"b", "c'd", "n\n"]);
    }

    #[test]
    fn unterminated_string_spans_remaining_input() {
        let tokens = tokenize("1 + 'oops");
        let last = tokens.last().unwrap();
        assert_eq!(last.kind, TokenKind::Other);
        assert_eq!(last.offset, 4);
        assert_eq!(last.lexeme, "'oops");
    }
}
