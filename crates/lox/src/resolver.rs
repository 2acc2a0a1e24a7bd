//! Static resolution pass between parsing and interpretation.
//!
//! Walks the AST once, tracking a stack of lexical scopes, and records in a
//! side table (keyed by [`ExprId`](crate::ast::ExprId), not structural
//! equality) how many enclosing scopes a `Variable`/`Assign`/`This`/`Super`
//! expression must walk out through to find its binding. An absent entry
//! means the name is resolved dynamically against the global frame.

use std::collections::HashMap;

use crate::ast::{Expr, ExprId, ExprKind, FunctionStmt, Stmt};
use crate::diagnostics::DiagnosticSink;
use crate::token::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionKind {
    None,
    Function,
    Method,
    Initializer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClassKind {
    None,
    Class,
    Subclass,
}

pub struct Resolver<'d> {
    diagnostics: &'d mut dyn DiagnosticSink,
    scopes: Vec<HashMap<String, bool>>,
    locals: HashMap<ExprId, usize>,
    current_function: FunctionKind,
    current_class: ClassKind,
}

impl<'d> Resolver<'d> {
    pub fn new(diagnostics: &'d mut dyn DiagnosticSink) -> Self {
        Self {
            diagnostics,
            scopes: Vec::new(),
            locals: HashMap::new(),
            current_function: FunctionKind::None,
            current_class: ClassKind::None,
        }
    }

    /// Resolves `stmts` and returns the completed side table.
    pub fn resolve(mut self, stmts: &[Stmt]) -> HashMap<ExprId, usize> {
        self.resolve_stmts(stmts);
        self.locals
    }

    fn resolve_stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.resolve_stmt(stmt);
        }
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme) {
                self.diagnostics.parse_error(name, "Already a variable with this name in scope.");
            }
            scope.insert(name.lexeme.clone(), false);
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        let top = self.scopes.len();
        for (i, scope) in self.scopes.iter().enumerate().rev() {
            if scope.contains_key(&name.lexeme) {
                self.locals.insert(id, top - 1 - i);
                return;
            }
        }
        // Unresolved: falls back to the global frame.
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block { stmts } => {
                self.begin_scope();
                self.resolve_stmts(stmts);
                self.end_scope();
            }
            Stmt::Class { name, superclass, methods } => self.resolve_class(name, superclass, methods),
            Stmt::ExprStmt { expr } | Stmt::Print { expr } => self.resolve_expr(expr),
            Stmt::Function(decl) => {
                self.declare(&decl.name);
                self.define(&decl.name);
                self.resolve_function(decl, FunctionKind::Function);
            }
            Stmt::If { cond, then_branch, else_branch } => {
                self.resolve_expr(cond);
                self.resolve_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch);
                }
            }
            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionKind::None {
                    self.diagnostics.parse_error(keyword, "Can't return from top-level code.");
                }
                if let Some(value) = value {
                    if self.current_function == FunctionKind::Initializer {
                        self.diagnostics.parse_error(keyword, "Can't return a value from an initializer.");
                    }
                    self.resolve_expr(value);
                }
            }
            Stmt::Var { name, init } => {
                self.declare(name);
                if let Some(init) = init {
                    self.resolve_expr(init);
                }
                self.define(name);
            }
            Stmt::While { cond, body } => {
                self.resolve_expr(cond);
                self.resolve_stmt(body);
            }
        }
    }

    fn resolve_class(&mut self, name: &Token, superclass: &Option<Expr>, methods: &[std::rc::Rc<FunctionStmt>]) {
        let enclosing_class = self.current_class;
        self.current_class = ClassKind::Class;

        self.declare(name);
        self.define(name);

        if let Some(superclass) = superclass {
            if let ExprKind::Variable { name: super_name } = &superclass.kind {
                if super_name.lexeme == name.lexeme {
                    self.diagnostics.parse_error(super_name, "A class can't inherit from itself.");
                }
            }
            self.current_class = ClassKind::Subclass;
            self.resolve_expr(superclass);
        }

        if superclass.is_some() {
            self.begin_scope();
            self.scopes.last_mut().unwrap().insert("super".to_owned(), true);
        }

        self.begin_scope();
        self.scopes.last_mut().unwrap().insert("this".to_owned(), true);

        for method in methods {
            let kind = if method.name.lexeme == "init" { FunctionKind::Initializer } else { FunctionKind::Method };
            self.resolve_function(method, kind);
        }

        self.end_scope();

        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
    }

    fn resolve_function(&mut self, decl: &FunctionStmt, kind: FunctionKind) {
        let enclosing_function = self.current_function;
        self.current_function = kind;

        self.begin_scope();
        for param in &decl.params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_stmts(&decl.body);
        self.end_scope();

        self.current_function = enclosing_function;
    }

    fn resolve_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Variable { name } => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme) == Some(&false) {
                        self.diagnostics.parse_error(name, "Can't read local variable in its own initializer.");
                    }
                }
                self.resolve_local(expr.id, name);
            }
            ExprKind::Assign { name, value } => {
                self.resolve_expr(value);
                self.resolve_local(expr.id, name);
            }
            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            ExprKind::Call { callee, args, .. } => {
                self.resolve_expr(callee);
                for arg in args {
                    self.resolve_expr(arg);
                }
            }
            ExprKind::Get { object, .. } => self.resolve_expr(object),
            ExprKind::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }
            ExprKind::Grouping { inner } | ExprKind::Unary { operand: inner, .. } => self.resolve_expr(inner),
            ExprKind::Literal { .. } => {}
            ExprKind::Super { keyword, .. } => {
                if self.current_class == ClassKind::None {
                    self.diagnostics.parse_error(keyword, "Can't use 'super' outside of a class.");
                } else if self.current_class != ClassKind::Subclass {
                    self.diagnostics.parse_error(keyword, "Can't use 'super' in a class with no superclass.");
                }
                self.resolve_local(expr.id, keyword);
            }
            ExprKind::This { keyword } => {
                if self.current_class == ClassKind::None {
                    self.diagnostics.parse_error(keyword, "Can't use 'this' outside of a class.");
                }
                self.resolve_local(expr.id, keyword);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingDiagnostics;
    use crate::parser::Parser;
    use crate::scanner::Scanner;

    fn resolve(source: &str) -> (HashMap<ExprId, usize>, CollectingDiagnostics) {
        let mut sink = CollectingDiagnostics::default();
        let tokens = Scanner::new(source, &mut sink).collect::<Vec<_>>();
        let stmts = Parser::new(tokens, &mut sink).parse();
        assert!(!sink.had_error(), "unexpected parse error: {:?}", sink.diagnostics);
        let locals = Resolver::new(&mut sink).resolve(&stmts);
        (locals, sink)
    }

    #[test]
    fn shadowing_own_initializer_is_a_static_error() {
        let (_, sink) = resolve("var a = 1; { var a = a; }");
        assert!(sink.had_error());
        assert!(sink.messages().any(|m| m.contains("its own initializer")));
    }

    #[test]
    fn duplicate_local_declaration_is_an_error() {
        let (_, sink) = resolve("{ var a = 1; var a = 2; }");
        assert!(sink.had_error());
        assert!(sink.messages().any(|m| m.contains("Already a variable")));
    }

    #[test]
    fn top_level_return_is_an_error() {
        let (_, sink) = resolve("return 1;");
        assert!(sink.had_error());
        assert!(sink.messages().any(|m| m.contains("top-level code")));
    }

    #[test]
    fn return_value_in_initializer_is_an_error() {
        let (_, sink) = resolve("class C { init() { return 1; } }");
        assert!(sink.had_error());
        assert!(sink.messages().any(|m| m.contains("from an initializer")));
    }

    #[test]
    fn this_outside_class_is_an_error() {
        let (_, sink) = resolve("print this;");
        assert!(sink.had_error());
        assert!(sink.messages().any(|m| m.contains("'this' outside")));
    }

    #[test]
    fn super_without_superclass_is_an_error() {
        let (_, sink) = resolve("class A { m() { super.m(); } }");
        assert!(sink.had_error());
        assert!(sink.messages().any(|m| m.contains("no superclass")));
    }

    #[test]
    fn self_inheriting_class_is_an_error() {
        let (_, sink) = resolve("class A < A {}");
        assert!(sink.had_error());
        assert!(sink.messages().any(|m| m.contains("inherit from itself")));
    }

    #[test]
    fn global_reference_has_no_distance_entry() {
        let (locals, sink) = resolve("var a = 1; print a;");
        assert!(!sink.had_error());
        assert!(locals.is_empty());
    }

    #[test]
    fn block_local_reference_has_distance_zero() {
        let mut sink = CollectingDiagnostics::default();
        let tokens = Scanner::new("{ var a = 1; print a; }", &mut sink).collect::<Vec<_>>();
        let stmts = Parser::new(tokens, &mut sink).parse();
        let locals = Resolver::new(&mut sink).resolve(&stmts);
        assert!(!sink.had_error());
        assert_eq!(locals.values().copied().collect::<Vec<_>>(), vec![0]);
    }
}
