//! Recursive-descent, predictive parser.
//!
//! On error, `synchronize` discards tokens until a likely statement boundary
//! so the parser can keep going and report more than one error per run. The
//! returned statement list is whatever parsed successfully; callers must
//! check the diagnostic sink's `had_error` before trusting it.

use crate::ast::{Expr, ExprKind, FunctionStmt, LiteralValue, Stmt};
use crate::diagnostics::DiagnosticSink;
use crate::token::{Token, TokenKind};
use std::rc::Rc;

const MAX_ARGS: usize = 255;

pub struct Parser<'d> {
    tokens: Vec<Token>,
    current: usize,
    diagnostics: &'d mut dyn DiagnosticSink,
}

/// Internal signal that a parse error occurred and was already reported.
/// Distinct from a panic: callers decide whether to synchronize and resume.
struct ParseError;

type ParseResult<T> = Result<T, ParseError>;

impl<'d> Parser<'d> {
    pub fn new(tokens: Vec<Token>, diagnostics: &'d mut dyn DiagnosticSink) -> Self {
        Self { tokens, current: 0, diagnostics }
    }

    pub fn parse(mut self) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        while !self.at_end() {
            match self.declaration() {
                Ok(stmt) => stmts.push(stmt),
                Err(ParseError) => self.synchronize(),
            }
        }
        stmts
    }

    /// Parses a single expression with no trailing semicolon and no
    /// statement wrapper, for contexts that hand the parser a bare
    /// expression fragment (a `printf` embedded substitution). Returns
    /// `None` if the fragment isn't a single complete expression, or if
    /// trailing tokens remain afterward.
    pub fn parse_expression(mut self) -> Option<Expr> {
        let expr = self.expression().ok()?;
        if self.at_end() { Some(expr) } else { None }
    }

    // -- token cursor -----------------------------------------------------

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn check(&self, kind: TokenKind) -> bool {
        !self.at_end() && self.peek().kind == kind
    }

    fn advance(&mut self) -> Token {
        if !self.at_end() {
            self.current += 1;
        }
        self.previous().clone()
    }

    fn matches(&mut self, kinds: &[TokenKind]) -> bool {
        if kinds.iter().any(|k| self.check(*k)) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(&self.peek().clone(), message))
        }
    }

    fn error(&mut self, token: &Token, message: &str) -> ParseError {
        self.diagnostics.parse_error(token, message);
        ParseError
    }

    fn synchronize(&mut self) {
        self.advance();
        while !self.at_end() {
            if self.previous().kind == TokenKind::Semicolon {
                return;
            }
            match self.peek().kind {
                TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    // -- declarations -------------------------------------------------------

    fn declaration(&mut self) -> ParseResult<Stmt> {
        if self.matches(&[TokenKind::Class]) {
            self.class_decl()
        } else if self.matches(&[TokenKind::Fun]) {
            Ok(Stmt::Function(Rc::new(self.function("function")?)))
        } else if self.matches(&[TokenKind::Var]) {
            self.var_decl()
        } else {
            self.statement()
        }
    }

    fn class_decl(&mut self) -> ParseResult<Stmt> {
        let name = self.consume(TokenKind::Identifier, "Expect class name.")?;

        let superclass = if self.matches(&[TokenKind::Less]) {
            let super_name = self.consume(TokenKind::Identifier, "Expect superclass name.")?;
            Some(Expr::new(ExprKind::Variable { name: super_name }))
        } else {
            None
        };

        self.consume(TokenKind::LeftBrace, "Expect '{' before class body.")?;
        let mut methods = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.at_end() {
            methods.push(Rc::new(self.function("method")?));
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after class body.")?;

        Ok(Stmt::Class { name, superclass, methods })
    }

    fn function(&mut self, kind: &str) -> ParseResult<FunctionStmt> {
        let name = self.consume(TokenKind::Identifier, &format!("Expect {kind} name."))?;
        self.consume(TokenKind::LeftParen, &format!("Expect '(' after {kind} name."))?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if params.len() >= MAX_ARGS {
                    let token = self.peek().clone();
                    self.error(&token, "Can't have more than 255 parameters.");
                }
                params.push(self.consume(TokenKind::Identifier, "Expect parameter name.")?);
                if !self.matches(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.")?;
        self.consume(TokenKind::LeftBrace, &format!("Expect '{{' before {kind} body."))?;
        let body = self.block()?;
        Ok(FunctionStmt { name, params, body })
    }

    fn var_decl(&mut self) -> ParseResult<Stmt> {
        let name = self.consume(TokenKind::Identifier, "Expect variable name.")?;
        let init = if self.matches(&[TokenKind::Equal]) { Some(self.expression()?) } else { None };
        self.consume(TokenKind::Semicolon, "Expect ';' after variable declaration.")?;
        Ok(Stmt::Var { name, init })
    }

    // -- statements -----------------------------------------------------------

    fn statement(&mut self) -> ParseResult<Stmt> {
        if self.matches(&[TokenKind::For]) {
            self.for_stmt()
        } else if self.matches(&[TokenKind::If]) {
            self.if_stmt()
        } else if self.matches(&[TokenKind::Print]) {
            self.print_stmt()
        } else if self.matches(&[TokenKind::Return]) {
            self.return_stmt()
        } else if self.matches(&[TokenKind::While]) {
            self.while_stmt()
        } else if self.matches(&[TokenKind::LeftBrace]) {
            Ok(Stmt::Block { stmts: self.block()? })
        } else {
            self.expr_stmt()
        }
    }

    fn block(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.at_end() {
            stmts.push(self.declaration()?);
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after block.")?;
        Ok(stmts)
    }

    fn if_stmt(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'.")?;
        let cond = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after if condition.")?;
        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.matches(&[TokenKind::Else]) { Some(Box::new(self.statement()?)) } else { None };
        Ok(Stmt::If { cond, then_branch, else_branch })
    }

    fn print_stmt(&mut self) -> ParseResult<Stmt> {
        let expr = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after value.")?;
        Ok(Stmt::Print { expr })
    }

    fn return_stmt(&mut self) -> ParseResult<Stmt> {
        let keyword = self.previous().clone();
        let value = if self.check(TokenKind::Semicolon) { None } else { Some(self.expression()?) };
        self.consume(TokenKind::Semicolon, "Expect ';' after return value.")?;
        Ok(Stmt::Return { keyword, value })
    }

    fn while_stmt(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'while'.")?;
        let cond = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after condition.")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::While { cond, body })
    }

    /// Desugars `for (init; cond; inc) body` into a `while` loop wrapped in a
    /// block; there is no distinct `ForStmt` AST node.
    fn for_stmt(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'for'.")?;

        let init = if self.matches(&[TokenKind::Semicolon]) {
            None
        } else if self.matches(&[TokenKind::Var]) {
            Some(self.var_decl()?)
        } else {
            Some(self.expr_stmt()?)
        };

        let cond = if self.check(TokenKind::Semicolon) { None } else { Some(self.expression()?) };
        self.consume(TokenKind::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if self.check(TokenKind::RightParen) { None } else { Some(self.expression()?) };
        self.consume(TokenKind::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block { stmts: vec![body, Stmt::ExprStmt { expr: increment }] };
        }

        let cond = cond.unwrap_or_else(|| Expr::new(ExprKind::Literal { value: LiteralValue::Bool(true) }));
        body = Stmt::While { cond, body: Box::new(body) };

        if let Some(init) = init {
            body = Stmt::Block { stmts: vec![init, body] };
        }

        Ok(body)
    }

    fn expr_stmt(&mut self) -> ParseResult<Stmt> {
        let expr = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.")?;
        Ok(Stmt::ExprStmt { expr })
    }

    // -- expressions ----------------------------------------------------------

    fn expression(&mut self) -> ParseResult<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> ParseResult<Expr> {
        let expr = self.or()?;

        if self.matches(&[TokenKind::Equal]) {
            let equals = self.previous().clone();
            let value = self.assignment()?;

            return match expr.kind {
                ExprKind::Variable { name } => Ok(Expr::new(ExprKind::Assign { name, value: Box::new(value) })),
                ExprKind::Get { object, name } => Ok(Expr::new(ExprKind::Set { object, name, value: Box::new(value) })),
                _ => {
                    self.diagnostics.parse_error(&equals, "Invalid assignment target.");
                    Ok(expr)
                }
            };
        }

        Ok(expr)
    }

    fn or(&mut self) -> ParseResult<Expr> {
        let mut expr = self.and()?;
        while self.matches(&[TokenKind::Or]) {
            let op = self.previous().clone();
            let right = self.and()?;
            expr = Expr::new(ExprKind::Logical { left: Box::new(expr), op, right: Box::new(right) });
        }
        Ok(expr)
    }

    fn and(&mut self) -> ParseResult<Expr> {
        let mut expr = self.equality()?;
        while self.matches(&[TokenKind::And]) {
            let op = self.previous().clone();
            let right = self.equality()?;
            expr = Expr::new(ExprKind::Logical { left: Box::new(expr), op, right: Box::new(right) });
        }
        Ok(expr)
    }

    fn equality(&mut self) -> ParseResult<Expr> {
        self.binary_level(Self::comparison, &[TokenKind::BangEqual, TokenKind::EqualEqual])
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        self.binary_level(
            Self::term,
            &[TokenKind::Greater, TokenKind::GreaterEqual, TokenKind::Less, TokenKind::LessEqual],
        )
    }

    fn term(&mut self) -> ParseResult<Expr> {
        self.binary_level(Self::factor, &[TokenKind::Minus, TokenKind::Plus])
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        self.binary_level(Self::unary, &[TokenKind::Slash, TokenKind::Star])
    }

    fn binary_level(
        &mut self,
        mut operand: impl FnMut(&mut Self) -> ParseResult<Expr>,
        kinds: &[TokenKind],
    ) -> ParseResult<Expr> {
        let mut expr = operand(self)?;
        while self.matches(kinds) {
            let op = self.previous().clone();
            let right = operand(self)?;
            expr = Expr::new(ExprKind::Binary { left: Box::new(expr), op, right: Box::new(right) });
        }
        Ok(expr)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        if self.matches(&[TokenKind::Bang, TokenKind::Minus]) {
            let op = self.previous().clone();
            let operand = self.unary()?;
            return Ok(Expr::new(ExprKind::Unary { op, operand: Box::new(operand) }));
        }
        if self.check(TokenKind::Plus) {
            let token = self.peek().clone();
            return Err(self.error(&token, "Prefix-plus is not supported."));
        }
        self.call()
    }

    fn call(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            if self.matches(&[TokenKind::LeftParen]) {
                expr = self.finish_call(expr)?;
            } else if self.matches(&[TokenKind::Dot]) {
                let name = self.consume(TokenKind::Identifier, "Expect property name after '.'.")?;
                expr = Expr::new(ExprKind::Get { object: Box::new(expr), name });
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> ParseResult<Expr> {
        let mut args = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if args.len() >= MAX_ARGS {
                    let token = self.peek().clone();
                    self.error(&token, "Can't have more than 255 arguments.");
                }
                args.push(self.expression()?);
                if !self.matches(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        let paren = self.consume(TokenKind::RightParen, "Expect ')' after arguments.")?;
        Ok(Expr::new(ExprKind::Call { callee: Box::new(callee), paren, args }))
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        if self.matches(&[TokenKind::False]) {
            return Ok(Expr::new(ExprKind::Literal { value: LiteralValue::Bool(false) }));
        }
        if self.matches(&[TokenKind::True]) {
            return Ok(Expr::new(ExprKind::Literal { value: LiteralValue::Bool(true) }));
        }
        if self.matches(&[TokenKind::Nil]) {
            return Ok(Expr::new(ExprKind::Literal { value: LiteralValue::Nil }));
        }
        if self.matches(&[TokenKind::Number, TokenKind::String]) {
            let literal = self.previous().literal.clone().expect("scanner attaches a literal to NUMBER/STRING");
            return Ok(Expr::new(ExprKind::Literal { value: literal.into() }));
        }
        if self.matches(&[TokenKind::Super]) {
            let keyword = self.previous().clone();
            self.consume(TokenKind::Dot, "Expect '.' after 'super'.")?;
            let method = self.consume(TokenKind::Identifier, "Expect superclass method name.")?;
            return Ok(Expr::new(ExprKind::Super { keyword, method }));
        }
        if self.matches(&[TokenKind::This]) {
            return Ok(Expr::new(ExprKind::This { keyword: self.previous().clone() }));
        }
        if self.matches(&[TokenKind::Identifier]) {
            return Ok(Expr::new(ExprKind::Variable { name: self.previous().clone() }));
        }
        if self.matches(&[TokenKind::LeftParen]) {
            let inner = self.expression()?;
            self.consume(TokenKind::RightParen, "Expect ')' after expression.")?;
            return Ok(Expr::new(ExprKind::Grouping { inner: Box::new(inner) }));
        }

        let token = self.peek().clone();
        Err(self.error(&token, "Expect expression."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingDiagnostics;
    use crate::scanner::Scanner;

    fn parse(source: &str) -> (Vec<Stmt>, CollectingDiagnostics) {
        let mut sink = CollectingDiagnostics::default();
        let tokens = Scanner::new(source, &mut sink).collect::<Vec<_>>();
        let stmts = Parser::new(tokens, &mut sink).parse();
        (stmts, sink)
    }

    #[test]
    fn parses_var_decl_with_initializer() {
        let (stmts, sink) = parse("var x = 1 + 2;");
        assert!(!sink.had_error());
        assert_eq!(stmts.len(), 1);
        assert!(matches!(stmts[0], Stmt::Var { .. }));
    }

    #[test]
    fn for_loop_desugars_without_for_stmt_node() {
        let (stmts, sink) = parse("for (var i = 0; i < 3; i = i + 1) print i;");
        assert!(!sink.had_error());
        assert_eq!(stmts.len(), 1);
        match &stmts[0] {
            Stmt::Block { stmts } => {
                assert_eq!(stmts.len(), 2);
                assert!(matches!(stmts[0], Stmt::Var { .. }));
                assert!(matches!(stmts[1], Stmt::While { .. }));
            }
            _ => panic!("expected desugared block"),
        }
    }

    #[test]
    fn invalid_assignment_target_reports_but_does_not_abort() {
        let (stmts, sink) = parse("1 = 2;");
        assert!(sink.had_error());
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn prefix_plus_is_rejected() {
        let (_, sink) = parse("+1;");
        assert!(sink.had_error());
        assert!(sink.messages().any(|m| m.contains("Prefix-plus")));
    }

    #[test]
    fn set_expression_built_from_get_on_assignment() {
        let (stmts, sink) = parse("a.b = 1;");
        assert!(!sink.had_error());
        match &stmts[0] {
            Stmt::ExprStmt { expr } => assert!(matches!(expr.kind, ExprKind::Set { .. })),
            _ => panic!("expected expr stmt"),
        }
    }

    #[test]
    fn class_with_superclass_parses_variable_expr() {
        let (stmts, sink) = parse("class B < A {}");
        assert!(!sink.had_error());
        match &stmts[0] {
            Stmt::Class { superclass: Some(expr), .. } => assert!(matches!(expr.kind, ExprKind::Variable { .. })),
            _ => panic!("expected class with superclass"),
        }
    }

    #[test]
    fn parse_error_synchronizes_and_parses_remaining_statements() {
        let (stmts, sink) = parse("var ; print 1;");
        assert!(sink.had_error());
        assert_eq!(stmts.len(), 1);
        assert!(matches!(stmts[0], Stmt::Print { .. }));
    }
}
