//! A tree-walking interpreter for the Lox scripting language.
//!
//! The pipeline is scanner → parser → resolver → interpreter, each gated on
//! the previous stage's [`DiagnosticSink::had_error`]. See [`run_source`] for
//! the usual entry point; the stages are also exposed individually for
//! callers (a REPL, a test harness) that need to drive them one at a time.

pub mod ast;
pub mod callable;
pub mod diagnostics;
pub mod environment;
pub mod interpreter;
pub mod io;
pub mod natives;
pub mod parser;
pub mod resolver;
pub mod resource;
pub mod scanner;
pub mod token;
pub mod value;

pub use ast::{Expr, ExprId, ExprKind, FunctionStmt, LiteralValue, Stmt};
pub use callable::{Callable, Instance, LoxClass, LoxFunction, NativeFunction};
pub use diagnostics::{CollectingDiagnostics, Diagnostic, DiagnosticSink, NoDiagnostics, StdDiagnostics};
pub use environment::Environment;
pub use interpreter::{Interpreter, RuntimeError, Signal};
pub use io::{CollectStringPrint, NoPrint, PrintSink, StdPrint};
pub use resource::{LimitedTracker, NoLimitTracker, ResourceError, ResourceTracker};
pub use scanner::Scanner;
pub use token::{Token, TokenKind, TokenLiteral};

use parser::Parser;
use resolver::Resolver;

/// Runs one pipeline over `source`: scan, parse, resolve, interpret.
///
/// Each stage only runs if the previous one left `diagnostics.had_error()`
/// false; a caller inspects `diagnostics`/`had_error`/`had_runtime_error`
/// after the call to learn which stage (if any) failed.
pub fn run_source(source: &str, diagnostics: &mut dyn DiagnosticSink, print: &mut dyn PrintSink) {
    run_source_with_resource(source, diagnostics, print, Box::new(NoLimitTracker));
}

/// Like [`run_source`], but with an explicit [`ResourceTracker`] (e.g. a
/// [`LimitedTracker`] for an embedder that wants to bound recursion depth).
pub fn run_source_with_resource(
    source: &str,
    diagnostics: &mut dyn DiagnosticSink,
    print: &mut dyn PrintSink,
    resource: Box<dyn ResourceTracker>,
) {
    let tokens = Scanner::new(source, diagnostics).collect::<Vec<_>>();
    if diagnostics.had_error() {
        return;
    }

    let stmts = Parser::new(tokens, diagnostics).parse();
    if diagnostics.had_error() {
        return;
    }

    let locals = Resolver::new(diagnostics).resolve(&stmts);
    if diagnostics.had_error() {
        return;
    }

    let mut interpreter = Interpreter::new(diagnostics, print, resource);
    interpreter.interpret(&stmts, locals);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> (String, CollectingDiagnostics) {
        let mut diagnostics = CollectingDiagnostics::new();
        let mut print = CollectStringPrint::new();
        run_source(source, &mut diagnostics, &mut print);
        (print.into_output(), diagnostics)
    }

    #[test]
    fn closures_capture_by_reference() {
        let (out, diag) = run(
            "fun makeCounter() { var i = 0; fun count() { i = i + 1; print i; } return count; } \
             var c = makeCounter(); c(); c(); c();",
        );
        assert!(!diag.had_error());
        assert_eq!(out, "1\n2\n3\n");
    }

    #[test]
    fn lexical_resolution_wins_over_dynamic() {
        let (out, diag) =
            run(r#"var a = "global"; { fun showA() { print a; } showA(); var a = "block"; showA(); }"#);
        assert!(!diag.had_error());
        assert_eq!(out, "global\nglobal\n");
    }

    #[test]
    fn truthiness_and_short_circuit() {
        let (out, diag) = run(r#"print nil or "yes"; print "a" and "b"; print 0 and "x";"#);
        assert!(!diag.had_error());
        assert_eq!(out, "yes\nb\nx\n");
    }

    #[test]
    fn number_formatting_strips_trailing_zero() {
        let (out, diag) = run(r#"print 1 + 2; print 0.5 + 0.5; print "a" + "b";"#);
        assert!(!diag.had_error());
        assert_eq!(out, "3\n1\nab\n");
    }

    #[test]
    fn inheritance_and_super() {
        let (out, diag) = run(
            r#"class A { greet() { print "A"; } } class B < A { greet() { super.greet(); print "B"; } } B().greet();"#,
        );
        assert!(!diag.had_error());
        assert_eq!(out, "A\nB\n");
    }

    #[test]
    fn runtime_error_halts_the_program() {
        let (out, diag) = run(r#"print 1; print "x" - 1; print 2;"#);
        assert_eq!(out, "1\n");
        assert!(diag.had_runtime_error());
    }

    #[test]
    fn initializer_returns_bound_this_even_with_bare_return() {
        let (out, diag) = run(r#"class C { init(x) { this.x = x; return; } } var c = C(7); print c.x;"#);
        assert!(!diag.had_error());
        assert_eq!(out, "7\n");
    }

    #[test]
    fn method_binding_closes_over_the_receiving_instance() {
        let (out, diag) =
            run(r#"class C { getThis() { return this; } } var c = C(); var m = c.getThis(); print m == c;"#);
        assert!(!diag.had_error());
        assert_eq!(out, "true\n");
    }

    #[test]
    fn calling_a_non_callable_is_a_runtime_error() {
        let (_, diag) = run("var x = 1; x();");
        assert!(diag.had_runtime_error());
        assert!(diag.messages().any(|m| m.contains("Can only call functions and classes")));
    }

    #[test]
    fn arity_mismatch_is_a_runtime_error() {
        let (_, diag) = run("fun f(a, b) { return a + b; } f(1);");
        assert!(diag.had_runtime_error());
        assert!(diag.messages().any(|m| m.contains("Expected 2 arguments but got 1")));
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        let (_, diag) = run("print 1 / 0;");
        assert!(diag.had_runtime_error());
        assert!(diag.messages().any(|m| m.contains("Cannot divide by zero")));
    }

    #[test]
    fn plus_with_mismatched_operand_types_is_a_runtime_error() {
        let (_, diag) = run(r#"print "x" - 1;"#);
        assert!(diag.had_runtime_error());
    }

    #[test]
    fn resolver_errors_prevent_interpretation() {
        let (out, diag) = run("return 1;");
        assert!(diag.had_error());
        assert!(!diag.had_runtime_error());
        assert_eq!(out, "");
    }
}
