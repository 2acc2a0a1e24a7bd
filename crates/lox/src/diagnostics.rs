//! The diagnostic sink: the abstract channel scan, parse/resolve, and runtime
//! errors are reported through.
//!
//! This mirrors the split between a `PrintWriter` trait and its concrete
//! implementations used elsewhere in this crate for `print()` output: one
//! trait describing the contract, several small implementations for
//! production (`StdDiagnostics`), testing (`CollectingDiagnostics`), and
//! suppression (`NoDiagnostics`).

use crate::token::{Token, TokenKind};

/// Receives scan, parse/resolve, and runtime errors and tracks whether any of
/// each category occurred.
pub trait DiagnosticSink {
    /// A scan error at the given byte offset into the source.
    fn scan_error(&mut self, offset: u32, message: &str);
    /// A parse or resolve error at `token`. Callers format the `at end` /
    /// `at '<lexeme>'` prefix; this method receives the raw message.
    fn parse_error(&mut self, token: &Token, message: &str);
    /// A runtime error at `token`.
    fn runtime_error(&mut self, token: &Token, message: &str);

    /// Whether a scan, parse, or resolve error has been recorded.
    fn had_error(&self) -> bool;
    /// Whether a runtime error has been recorded.
    fn had_runtime_error(&self) -> bool;
}

/// Formats the `at end` / `at '<lexeme>'` location prefix shared by parse and
/// runtime error reporting.
fn where_clause(token: &Token) -> String {
    if token.kind == TokenKind::Eof {
        "at end".to_owned()
    } else {
        format!("at '{}'", token.lexeme)
    }
}

/// Default sink: writes each error as one line to stderr, matching the
/// `[line] Error <where>: <message>` convention of a classic Lox driver.
#[derive(Debug, Default)]
pub struct StdDiagnostics {
    had_error: bool,
    had_runtime_error: bool,
}

impl StdDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DiagnosticSink for StdDiagnostics {
    fn scan_error(&mut self, offset: u32, message: &str) {
        eprintln!("[offset {offset}] Error: {message}");
        self.had_error = true;
    }

    fn parse_error(&mut self, token: &Token, message: &str) {
        eprintln!("[offset {}] Error {}: {message}", token.offset, where_clause(token));
        self.had_error = true;
    }

    fn runtime_error(&mut self, token: &Token, message: &str) {
        eprintln!("{message}\n[offset {}] in script", token.offset);
        self.had_runtime_error = true;
    }

    fn had_error(&self) -> bool {
        self.had_error
    }

    fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }
}

/// One recorded diagnostic, kept for tests that want to assert on message
/// text rather than just the `had_error` flags.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    Scan { offset: u32, message: String },
    Parse { lexeme: String, message: String },
    Runtime { lexeme: String, message: String },
}

/// Collects every diagnostic into a `Vec` instead of printing it. Used by the
/// test suite to assert on exact error messages without capturing stderr.
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
    pub diagnostics: Vec<Diagnostic>,
    had_error: bool,
    had_runtime_error: bool,
}

impl CollectingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.diagnostics.iter().map(|d| match d {
            Diagnostic::Scan { message, .. } | Diagnostic::Parse { message, .. } | Diagnostic::Runtime { message, .. } => {
                message.as_str()
            }
        })
    }
}

impl DiagnosticSink for CollectingDiagnostics {
    fn scan_error(&mut self, offset: u32, message: &str) {
        self.diagnostics.push(Diagnostic::Scan { offset, message: message.to_owned() });
        self.had_error = true;
    }

    fn parse_error(&mut self, token: &Token, message: &str) {
        self.diagnostics.push(Diagnostic::Parse { lexeme: token.lexeme.clone(), message: message.to_owned() });
        self.had_error = true;
    }

    fn runtime_error(&mut self, token: &Token, message: &str) {
        self.diagnostics.push(Diagnostic::Runtime { lexeme: token.lexeme.clone(), message: message.to_owned() });
        self.had_runtime_error = true;
    }

    fn had_error(&self) -> bool {
        self.had_error
    }

    fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }
}

/// Sink that discards every diagnostic. Useful for fuzzing or benchmarking
/// where only the `had_error` signal (not the message text) matters.
#[derive(Debug, Default)]
pub struct NoDiagnostics {
    had_error: bool,
    had_runtime_error: bool,
}

impl DiagnosticSink for NoDiagnostics {
    fn scan_error(&mut self, _offset: u32, _message: &str) {
        self.had_error = true;
    }

    fn parse_error(&mut self, _token: &Token, _message: &str) {
        self.had_error = true;
    }

    fn runtime_error(&mut self, _token: &Token, _message: &str) {
        self.had_runtime_error = true;
    }

    fn had_error(&self) -> bool {
        self.had_error
    }

    fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }
}
