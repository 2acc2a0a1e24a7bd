//! Single-pass, left-to-right lexer.
//!
//! Scanning is non-fatal: unterminated strings and unexpected characters are
//! reported to the [`DiagnosticSink`] and scanning continues. The scanner is
//! an iterator so the parser can pull tokens one at a time.

use crate::diagnostics::DiagnosticSink;
use crate::token::{Token, TokenKind, TokenLiteral, keyword_kind};

/// Scans `source` lazily, yielding tokens terminated by exactly one `EOF`.
pub struct Scanner<'a, 'd> {
    source: &'a str,
    bytes: &'a [u8],
    start: usize,
    current: usize,
    diagnostics: &'d mut dyn DiagnosticSink,
    emitted_eof: bool,
}

impl<'a, 'd> Scanner<'a, 'd> {
    pub fn new(source: &'a str, diagnostics: &'d mut dyn DiagnosticSink) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            start: 0,
            current: 0,
            diagnostics,
            emitted_eof: false,
        }
    }

    fn at_end(&self) -> bool {
        self.current >= self.bytes.len()
    }

    fn advance(&mut self) -> u8 {
        let c = self.bytes[self.current];
        self.current += 1;
        c
    }

    fn peek(&self) -> u8 {
        if self.at_end() { b'\0' } else { self.bytes[self.current] }
    }

    fn peek_next(&self) -> u8 {
        if self.current + 1 >= self.bytes.len() {
            b'\0'
        } else {
            self.bytes[self.current + 1]
        }
    }

    fn matches(&mut self, expected: u8) -> bool {
        if self.at_end() || self.bytes[self.current] != expected {
            return false;
        }
        self.current += 1;
        true
    }

    fn lexeme(&self) -> &'a str {
        &self.source[self.start..self.current]
    }

    fn make(&self, kind: TokenKind) -> Token {
        self.make_with(kind, None)
    }

    fn make_with(&self, kind: TokenKind, literal: Option<TokenLiteral>) -> Token {
        let length = (self.current - self.start) as u32;
        Token::new(kind, self.lexeme().to_owned(), literal, self.start as u32, length)
    }

    fn string(&mut self) -> Option<Token> {
        while self.peek() != b'"' && !self.at_end() {
            self.advance();
        }
        if self.at_end() {
            self.diagnostics.scan_error(self.current as u32, "Unterminated string");
            return None;
        }
        // Closing quote.
        self.advance();
        let value = self.source[self.start + 1..self.current - 1].to_owned();
        Some(self.make_with(TokenKind::String, Some(TokenLiteral::String(value))))
    }

    fn number(&mut self) -> Option<Token> {
        while is_digit(self.peek()) {
            self.advance();
        }
        if self.peek() == b'.' && is_digit(self.peek_next()) {
            self.advance();
            while is_digit(self.peek()) {
                self.advance();
            }
        }
        let value: f64 = self.lexeme().parse().expect("scanned number lexeme must parse");
        Some(self.make_with(TokenKind::Number, Some(TokenLiteral::Number(value))))
    }

    fn identifier(&mut self) -> Option<Token> {
        while is_alnum(self.peek()) {
            self.advance();
        }
        let kind = keyword_kind(self.lexeme()).unwrap_or(TokenKind::Identifier);
        Some(self.make(kind))
    }

    fn scan_token(&mut self) -> Option<Token> {
        let c = self.advance();
        match c {
            b'(' => Some(self.make(TokenKind::LeftParen)),
            b')' => Some(self.make(TokenKind::RightParen)),
            b'{' => Some(self.make(TokenKind::LeftBrace)),
            b'}' => Some(self.make(TokenKind::RightBrace)),
            b',' => Some(self.make(TokenKind::Comma)),
            b'.' => Some(self.make(TokenKind::Dot)),
            b'-' => Some(self.make(TokenKind::Minus)),
            b'+' => Some(self.make(TokenKind::Plus)),
            b';' => Some(self.make(TokenKind::Semicolon)),
            b'*' => Some(self.make(TokenKind::Star)),
            b'!' => {
                let kind = if self.matches(b'=') { TokenKind::BangEqual } else { TokenKind::Bang };
                Some(self.make(kind))
            }
            b'=' => {
                let kind = if self.matches(b'=') { TokenKind::EqualEqual } else { TokenKind::Equal };
                Some(self.make(kind))
            }
            b'<' => {
                let kind = if self.matches(b'=') { TokenKind::LessEqual } else { TokenKind::Less };
                Some(self.make(kind))
            }
            b'>' => {
                let kind = if self.matches(b'=') { TokenKind::GreaterEqual } else { TokenKind::Greater };
                Some(self.make(kind))
            }
            b'/' => {
                if self.matches(b'/') {
                    while self.peek() != b'\n' && !self.at_end() {
                        self.advance();
                    }
                    None
                } else {
                    Some(self.make(TokenKind::Slash))
                }
            }
            b' ' | b'\t' | b'\r' | b'\n' => None,
            b'"' => self.string(),
            c if is_digit(c) => self.number(),
            c if is_alpha(c) => self.identifier(),
            _ => {
                self.diagnostics.scan_error(self.start as u32, "Unexpected character");
                None
            }
        }
    }
}

impl Iterator for Scanner<'_, '_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            if self.at_end() {
                if self.emitted_eof {
                    return None;
                }
                self.emitted_eof = true;
                return Some(Token::eof(self.current as u32));
            }
            self.start = self.current;
            if let Some(token) = self.scan_token() {
                return Some(token);
            }
        }
    }
}

fn is_digit(c: u8) -> bool {
    c.is_ascii_digit()
}

fn is_alpha(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_alnum(c: u8) -> bool {
    is_alpha(c) || is_digit(c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingDiagnostics;

    fn scan_all(source: &str) -> (Vec<Token>, CollectingDiagnostics) {
        let mut sink = CollectingDiagnostics::default();
        let tokens = Scanner::new(source, &mut sink).collect::<Vec<_>>();
        (tokens, sink)
    }

    #[test]
    fn emits_exactly_one_eof_with_non_decreasing_offsets() {
        let (tokens, sink) = scan_all("var x = 1 + 2;");
        assert!(!sink.had_error());
        assert_eq!(tokens.iter().filter(|t| t.kind == TokenKind::Eof).count(), 1);
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
        let mut last_offset = 0;
        for token in &tokens {
            assert!(token.offset >= last_offset);
            last_offset = token.offset;
        }
    }

    #[test]
    fn two_character_operators_are_recognized() {
        let (tokens, _) = scan_all("!= == <= >= = ! < >");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::BangEqual,
                TokenKind::EqualEqual,
                TokenKind::LessEqual,
                TokenKind::GreaterEqual,
                TokenKind::Equal,
                TokenKind::Bang,
                TokenKind::Less,
                TokenKind::Greater,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn number_with_trailing_dot_does_not_consume_dot() {
        let (tokens, _) = scan_all("123.");
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[0].lexeme, "123");
        assert_eq!(tokens[1].kind, TokenKind::Dot);
    }

    #[test]
    fn unterminated_string_reports_error_and_yields_no_token() {
        let (tokens, sink) = scan_all("\"abc");
        assert!(sink.had_error());
        assert_eq!(tokens.len(), 1); // just EOF
    }

    #[test]
    fn unexpected_character_is_skipped_after_reporting() {
        let (tokens, sink) = scan_all("@ 1");
        assert!(sink.had_error());
        assert_eq!(tokens[0].kind, TokenKind::Number);
    }

    #[test]
    fn keyword_vs_identifier() {
        let (tokens, _) = scan_all("class classic");
        assert_eq!(tokens[0].kind, TokenKind::Class);
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
    }

    #[test]
    fn line_comment_produces_no_token() {
        let (tokens, _) = scan_all("// a whole comment\nvar");
        assert_eq!(tokens[0].kind, TokenKind::Var);
    }
}
