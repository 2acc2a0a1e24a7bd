//! Tree-walking evaluator.
//!
//! Walks the AST produced by the parser, consulting the resolver's side
//! table to resolve locals by hop distance and falling back to the global
//! frame for anything absent from it. A `Return` signal is control flow, not
//! an error — it shares the `Signal` result type with runtime errors purely
//! so both can propagate through `?`, but it is caught exclusively at a
//! function's call boundary (see `LoxFunction::call`).

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{Expr, ExprId, ExprKind, FunctionStmt, Stmt};
use crate::callable::{Callable, Instance, LoxClass, LoxFunction};
use crate::diagnostics::DiagnosticSink;
use crate::environment::Environment;
use crate::io::PrintSink;
use crate::resource::ResourceTracker;
use crate::token::{Token, TokenKind};
use crate::value::Value;

/// A runtime error: a faulting token plus a human-readable message.
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub token: Token,
    pub message: String,
}

/// Non-local control flow raised while executing a statement or evaluating
/// an expression: either a propagating `return`, or a runtime error.
pub enum Signal {
    Return(Value),
    Error(RuntimeError),
}

impl Signal {
    fn error(token: &Token, message: impl Into<String>) -> Self {
        Signal::Error(RuntimeError { token: token.clone(), message: message.into() })
    }
}

type EvalResult = Result<Value, Signal>;
type ExecResult = Result<(), Signal>;

pub struct Interpreter<'d, 'p> {
    pub(crate) globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: HashMap<ExprId, usize>,
    diagnostics: &'d mut dyn DiagnosticSink,
    print: &'p mut dyn PrintSink,
    resource: Box<dyn ResourceTracker>,
}

impl<'d, 'p> Interpreter<'d, 'p> {
    pub fn new(
        diagnostics: &'d mut dyn DiagnosticSink,
        print: &'p mut dyn PrintSink,
        resource: Box<dyn ResourceTracker>,
    ) -> Self {
        let globals = Environment::global();
        crate::natives::install(&globals);
        Self { environment: Rc::clone(&globals), globals, locals: HashMap::new(), diagnostics, print, resource }
    }

    /// Runs a resolved program. Halts at the first runtime error and reports
    /// it to the diagnostic sink; a dangling `Return` signal (which the
    /// resolver should have already rejected) is treated the same way a
    /// falling-off function body would be: discarded.
    pub fn interpret(&mut self, stmts: &[Stmt], locals: HashMap<ExprId, usize>) {
        self.locals = locals;
        for stmt in stmts {
            if let Err(signal) = self.execute(stmt) {
                if let Signal::Error(err) = signal {
                    self.diagnostics.runtime_error(&err.token, &err.message);
                }
                return;
            }
        }
    }

    pub(crate) fn evaluate_in_current_scope(&mut self, expr: &Expr) -> EvalResult {
        self.evaluate(expr)
    }

    pub(crate) fn print_line(&mut self, line: &str) {
        self.print.print_line(line);
    }

    // -- statement execution --------------------------------------------------

    fn execute(&mut self, stmt: &Stmt) -> ExecResult {
        match stmt {
            Stmt::Block { stmts } => {
                let child = Environment::child(&self.environment);
                self.execute_block(stmts, child)
            }
            Stmt::Class { name, superclass, methods } => self.execute_class(name, superclass, methods),
            Stmt::ExprStmt { expr } => {
                self.evaluate(expr)?;
                Ok(())
            }
            Stmt::Function(decl) => {
                let function = self.make_function(decl, false);
                self.environment.borrow_mut().define(decl.name.lexeme.clone(), function);
                Ok(())
            }
            Stmt::If { cond, then_branch, else_branch } => {
                if self.evaluate(cond)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(())
                }
            }
            Stmt::Print { expr } => {
                let value = self.evaluate(expr)?;
                let line = value.to_string();
                self.print.print_line(&line);
                Ok(())
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                Err(Signal::Return(value))
            }
            Stmt::Var { name, init } => {
                let value = match init {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                self.environment.borrow_mut().define(name.lexeme.clone(), value);
                Ok(())
            }
            Stmt::While { cond, body } => {
                while self.evaluate(cond)?.is_truthy() {
                    self.execute(body)?;
                }
                Ok(())
            }
        }
    }

    /// Executes `stmts` with `env` as the current frame, restoring the
    /// previous frame on every exit path (normal, error, or `Return`).
    pub(crate) fn execute_block(&mut self, stmts: &[Stmt], env: Rc<RefCell<Environment>>) -> ExecResult {
        let previous = std::mem::replace(&mut self.environment, env);
        let result = (|| {
            for stmt in stmts {
                self.execute(stmt)?;
            }
            Ok(())
        })();
        self.environment = previous;
        result
    }

    fn make_function(&self, decl: &Rc<FunctionStmt>, is_initializer: bool) -> Value {
        Value::Callable(Callable::Function(Rc::new(LoxFunction {
            declaration: Rc::clone(decl),
            closure: Rc::clone(&self.environment),
            is_initializer,
        })))
    }

    fn execute_class(&mut self, name: &Token, superclass_expr: &Option<Expr>, methods: &[Rc<FunctionStmt>]) -> ExecResult {
        let superclass = match superclass_expr {
            Some(expr) => {
                let value = self.evaluate(expr)?;
                match value {
                    Value::Callable(Callable::Class(class)) => Some(class),
                    _ => return Err(Signal::error(name, "Superclass must be a class.")),
                }
            }
            None => None,
        };

        self.environment.borrow_mut().define(name.lexeme.clone(), Value::Nil);

        let method_env = if let Some(superclass) = &superclass {
            let env = Environment::child(&self.environment);
            env.borrow_mut().define("super", Value::Callable(Callable::Class(Rc::clone(superclass))));
            env
        } else {
            Rc::clone(&self.environment)
        };

        let previous_env = std::mem::replace(&mut self.environment, method_env);
        let mut method_map = HashMap::new();
        for method in methods {
            let is_initializer = method.name.lexeme == "init";
            let function = Rc::new(LoxFunction {
                declaration: Rc::clone(method),
                closure: Rc::clone(&self.environment),
                is_initializer,
            });
            method_map.insert(method.name.lexeme.clone(), function);
        }
        self.environment = previous_env;

        let class = Value::Callable(Callable::Class(Rc::new(LoxClass {
            name: name.lexeme.clone(),
            superclass,
            methods: method_map,
        })));

        self.environment.borrow_mut().assign(name, class).map_err(|msg| Signal::error(name, msg))
    }

    // -- expression evaluation --------------------------------------------

    fn evaluate(&mut self, expr: &Expr) -> EvalResult {
        match &expr.kind {
            ExprKind::Literal { value } => Ok(match value {
                crate::ast::LiteralValue::Nil => Value::Nil,
                crate::ast::LiteralValue::Bool(b) => Value::Bool(*b),
                crate::ast::LiteralValue::Number(n) => Value::Number(*n),
                crate::ast::LiteralValue::String(s) => Value::String(s.clone()),
            }),
            ExprKind::Grouping { inner } => self.evaluate(inner),
            ExprKind::Variable { name } => self.lookup_variable(expr.id, name),
            ExprKind::This { keyword } => self.lookup_variable(expr.id, keyword),
            ExprKind::Assign { name, value } => {
                let value = self.evaluate(value)?;
                match self.locals.get(&expr.id) {
                    Some(&distance) => Environment::assign_at(&self.environment, distance, name, value.clone()),
                    None => {
                        if !Environment::assign_dynamic(&self.environment, &name.lexeme, value.clone()) {
                            return Err(Signal::error(name, format!("Undefined variable '{}'.", name.lexeme)));
                        }
                    }
                }
                Ok(value)
            }
            ExprKind::Unary { op, operand } => self.evaluate_unary(op, operand),
            ExprKind::Binary { left, op, right } => self.evaluate_binary(left, op, right),
            ExprKind::Logical { left, op, right } => {
                let left_value = self.evaluate(left)?;
                if op.kind == TokenKind::Or {
                    if left_value.is_truthy() { Ok(left_value) } else { self.evaluate(right) }
                } else if left_value.is_truthy() {
                    self.evaluate(right)
                } else {
                    Ok(left_value)
                }
            }
            ExprKind::Call { callee, paren, args } => self.evaluate_call(callee, paren, args),
            ExprKind::Get { object, name } => {
                let object = self.evaluate(object)?;
                match object {
                    Value::Instance(instance) => {
                        Instance::get(&instance, name).map_err(|msg| Signal::error(name, msg))
                    }
                    _ => Err(Signal::error(name, "Only instances have properties.")),
                }
            }
            ExprKind::Set { object, name, value } => {
                let object = self.evaluate(object)?;
                let Value::Instance(instance) = object else {
                    return Err(Signal::error(name, "Only instances have fields."));
                };
                let value = self.evaluate(value)?;
                Instance::set(&instance, name, value.clone());
                Ok(value)
            }
            ExprKind::Super { keyword, method } => self.evaluate_super(expr.id, keyword, method),
        }
    }

    /// Resolves a `Variable`/`This` reference. A missing entry in `locals`
    /// means the resolver never saw this node (a `printf` embedded
    /// substitution) rather than that the name is necessarily global, so the
    /// fallback walks the current environment chain by name instead of
    /// jumping straight to `self.globals`; for a genuinely resolver-checked
    /// program the chain still bottoms out at the same global frame.
    fn lookup_variable(&self, id: ExprId, name: &Token) -> EvalResult {
        match self.locals.get(&id) {
            Some(&distance) => Ok(Environment::get_at(&self.environment, distance, &name.lexeme)),
            None => Environment::get_dynamic(&self.environment, &name.lexeme)
                .ok_or_else(|| Signal::error(name, format!("Undefined variable '{}'.", name.lexeme))),
        }
    }

    fn evaluate_unary(&mut self, op: &Token, operand: &Expr) -> EvalResult {
        let value = self.evaluate(operand)?;
        match op.kind {
            TokenKind::Minus => match value {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(Signal::error(op, "Operand must be a number.")),
            },
            TokenKind::Bang => Ok(Value::Bool(!value.is_truthy())),
            _ => unreachable!("parser only produces '-' and '!' unary operators"),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, op: &Token, right: &Expr) -> EvalResult {
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;

        match op.kind {
            TokenKind::Minus => numeric_op(op, &left, &right, |a, b| Value::Number(a - b)),
            TokenKind::Star => numeric_op(op, &left, &right, |a, b| Value::Number(a * b)),
            TokenKind::Slash => match (&left, &right) {
                (Value::Number(_), Value::Number(b)) if *b == 0.0 => Err(Signal::error(op, "Cannot divide by zero.")),
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a / b)),
                _ => Err(Signal::error(op, "Operands must be numbers.")),
            },
            TokenKind::Greater => numeric_cmp(op, &left, &right, |a, b| a > b),
            TokenKind::GreaterEqual => numeric_cmp(op, &left, &right, |a, b| a >= b),
            TokenKind::Less => numeric_cmp(op, &left, &right, |a, b| a < b),
            TokenKind::LessEqual => numeric_cmp(op, &left, &right, |a, b| a <= b),
            TokenKind::Plus => match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
                _ => Err(Signal::error(op, "Operands must be two numbers or two strings.")),
            },
            TokenKind::BangEqual => Ok(Value::Bool(left != right)),
            TokenKind::EqualEqual => Ok(Value::Bool(left == right)),
            _ => unreachable!("parser only produces comparison/arithmetic/equality binary operators"),
        }
    }

    fn evaluate_call(&mut self, callee: &Expr, paren: &Token, arg_exprs: &[Expr]) -> EvalResult {
        let callee_value = self.evaluate(callee)?;
        let mut args = Vec::with_capacity(arg_exprs.len());
        for arg in arg_exprs {
            args.push(self.evaluate(arg)?);
        }

        let Value::Callable(callable) = callee_value else {
            return Err(Signal::error(paren, "Can only call functions and classes."));
        };

        let arity = callable.arity();
        if args.len() != arity {
            return Err(Signal::error(paren, format!("Expected {arity} arguments but got {}.", args.len())));
        }

        self.resource.enter_call().map_err(|err| Signal::error(paren, err.to_string()))?;
        let result = callable.call(self, &args);
        self.resource.exit_call();
        result
    }

    fn evaluate_super(&mut self, id: ExprId, keyword: &Token, method: &Token) -> EvalResult {
        // An embedded `printf` expression never runs through the resolver,
        // so it has no distance entry even inside a method body; fall back
        // to a dynamic by-name lookup of the ordinary 'super'/'this' bindings.
        let (superclass, this) = match self.locals.get(&id) {
            Some(&distance) => (
                Environment::get_at(&self.environment, distance, "super"),
                Environment::get_at(&self.environment, distance - 1, "this"),
            ),
            None => {
                let superclass = Environment::get_dynamic(&self.environment, "super")
                    .ok_or_else(|| Signal::error(keyword, "Can't use 'super' outside of a class."))?;
                let this = Environment::get_dynamic(&self.environment, "this")
                    .ok_or_else(|| Signal::error(keyword, "Can't use 'super' outside of a class."))?;
                (superclass, this)
            }
        };
        let Value::Callable(Callable::Class(superclass)) = superclass else {
            unreachable!("'super' is only ever bound to a class value");
        };
        let Value::Instance(instance) = this else {
            unreachable!("'this' is always bound to an instance alongside 'super'");
        };

        superclass
            .find_method(&method.lexeme)
            .map(|m| Value::Callable(Callable::Function(LoxFunction::bind(&m, &instance))))
            .ok_or_else(|| Signal::error(method, format!("Undefined property '{}'.", method.lexeme)))
    }
}

fn numeric_op(op: &Token, left: &Value, right: &Value, f: impl Fn(f64, f64) -> Value) -> EvalResult {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(f(*a, *b)),
        _ => Err(Signal::error(op, "Operands must be numbers.")),
    }
}

fn numeric_cmp(op: &Token, left: &Value, right: &Value, f: impl Fn(f64, f64) -> bool) -> EvalResult {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(f(*a, *b))),
        _ => Err(Signal::error(op, "Operands must be numbers.")),
    }
}
