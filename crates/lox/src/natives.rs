//! The two built-in native functions: `clock` and `printf`.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::callable::{Callable, NativeFunction};
use crate::diagnostics::{CollectingDiagnostics, DiagnosticSink};
use crate::environment::Environment;
use crate::interpreter::{Interpreter, Signal};
use crate::parser::Parser;
use crate::scanner::Scanner;
use crate::token::{Token, TokenKind};
use crate::value::Value;

/// Installs `clock` and `printf` into the global frame.
pub fn install(globals: &Rc<RefCell<Environment>>) {
    globals.borrow_mut().define(
        "clock",
        Value::Callable(Callable::Native(Rc::new(NativeFunction {
            name: "clock".to_owned(),
            arity: 0,
            func: Rc::new(|_interpreter, _args| {
                let secs = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .expect("system clock is after the Unix epoch")
                    .as_secs_f64();
                Ok(Value::Number(secs))
            }),
        }))),
    );

    globals.borrow_mut().define(
        "printf",
        Value::Callable(Callable::Native(Rc::new(NativeFunction {
            name: "printf".to_owned(),
            arity: 1,
            func: Rc::new(printf),
        }))),
    );
}

/// `printf(fmt)`: prints `fmt` with each `{expr}` substring replaced by the
/// stringification of evaluating `expr` as a Lox expression in the calling
/// interpreter's current scope.
fn printf(interpreter: &mut Interpreter, args: &[Value]) -> Result<Value, Signal> {
    let Value::String(fmt) = &args[0] else {
        return Err(signal_error("printf() requires a string format argument."));
    };

    let mut output = String::new();
    let bytes = fmt.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            let Some(end) = fmt[i + 1..].find('}') else {
                return Err(signal_error("printf() format string has an unterminated '{'."));
            };
            let expr_source = &fmt[i + 1..i + 1 + end];
            let value = evaluate_embedded_expr(interpreter, expr_source)?;
            output.push_str(&value.to_string());
            i += end + 2;
        } else {
            output.push(bytes[i] as char);
            i += 1;
        }
    }

    interpreter.print_line(&output);
    Ok(Value::Nil)
}

fn evaluate_embedded_expr(interpreter: &mut Interpreter, source: &str) -> Result<Value, Signal> {
    let mut sink = CollectingDiagnostics::new();
    let tokens = Scanner::new(source, &mut sink).collect::<Vec<_>>();
    if sink.had_error() {
        return Err(signal_error(&format!("printf() could not parse embedded expression '{source}'.")));
    }
    let Some(expr) = Parser::new(tokens, &mut sink).parse_expression() else {
        return Err(signal_error(&format!("printf() could not parse embedded expression '{source}'.")));
    };
    interpreter.evaluate_in_current_scope(&expr)
}

fn signal_error(message: &str) -> Signal {
    Signal::Error(crate::interpreter::RuntimeError {
        token: Token::new(TokenKind::Identifier, "printf".to_owned(), None, 0, 0),
        message: message.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::StdDiagnostics;
    use crate::io::CollectStringPrint;
    use crate::resource::NoLimitTracker;

    fn run(source: &str) -> String {
        let mut diagnostics = StdDiagnostics::new();
        let mut print = CollectStringPrint::new();
        let mut interp = Interpreter::new(&mut diagnostics, &mut print, Box::new(NoLimitTracker));
        let mut parse_sink = CollectingDiagnostics::new();
        let tokens = Scanner::new(source, &mut parse_sink).collect::<Vec<_>>();
        let stmts = Parser::new(tokens, &mut parse_sink).parse();
        assert!(!parse_sink.had_error());
        let locals = crate::resolver::Resolver::new(&mut parse_sink).resolve(&stmts);
        assert!(!parse_sink.had_error());
        interp.interpret(&stmts, locals);
        print.into_output()
    }

    #[test]
    fn printf_substitutes_embedded_expressions() {
        let out = run(r#"var x = 2; printf("x = {x}, sum = {1 + x}");"#);
        assert_eq!(out, "x = 2, sum = 3\n");
    }

    #[test]
    fn printf_with_no_braces_prints_literally() {
        let out = run(r#"printf("hello world");"#);
        assert_eq!(out, "hello world\n");
    }

    #[test]
    fn clock_returns_a_number() {
        let out = run("print clock() >= 0;");
        assert_eq!(out, "true\n");
    }
}
