//! Pratt parser.
//!
//! Expressions are parsed with a precedence table keyed by token kind;
//! left-associative operators recurse one precedence level higher.
//! Declarations and statements are recursive descent. On a syntax error the
//! parser reports once, enters panic mode, and skips to the next likely
//! statement boundary before continuing, so one mistake produces one
//! diagnostic.

use crate::ast::{
    Ast, Block, ClosureDecl, Expr, FunctionDecl, NativeDecl, OperatorSym, Primary, Stmt,
    StructDecl, Symbol, UnionDecl, VarDecl,
};
use crate::lexer::Lexer;
use crate::report::Report;
use crate::token::{Token, TokenKind};
use crate::types::{TypeId, TypeInterner};

/// Everything the caller needs after a parse: the tree, the interned
/// types, and the accumulated diagnostics.
#[derive(Debug)]
pub struct ParseOutcome {
    pub ast: Ast,
    pub types: TypeInterner,
    pub report: Report,
    pub had_error: bool,
}

/// Ascending binding power. `Primary` is never used as a floor; it exists
/// so `Access.next()` stays in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    None,
    Logic,
    Equality,
    Comparison,
    Term,
    Factor,
    Unary,
    Call,
    Subscript,
    Access,
    Primary,
}

impl Precedence {
    fn next(self) -> Precedence {
        match self {
            Precedence::None => Precedence::Logic,
            Precedence::Logic => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Unary,
            Precedence::Unary => Precedence::Call,
            Precedence::Call => Precedence::Subscript,
            Precedence::Subscript => Precedence::Access,
            Precedence::Access | Precedence::Primary => Precedence::Primary,
        }
    }
}

/// Hard limit shared by call arguments, literal elements, parameters,
/// struct members and union variants.
const MAX_ARGS: usize = 255;

pub struct Parser<'src> {
    source: &'src str,
    lexer: Lexer<'src>,
    token: Token,
    had_error: bool,
    panic: bool,
    types: TypeInterner,
    report: Report,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> Parser<'src> {
        let mut parser = Parser {
            source,
            lexer: Lexer::new(source),
            token: Token::INVALID,
            had_error: false,
            panic: false,
            types: TypeInterner::new(),
            report: Report::new(),
        };
        parser.advance();
        parser
    }

    pub fn parse(mut self) -> ParseOutcome {
        let mut statements = Vec::new();

        while !self.check(TokenKind::Eof) {
            let at = self.token;
            let stmt = match self.token.kind {
                TokenKind::Fn => self.global_fn(),
                TokenKind::Type => self.type_decl(),
                _ => {
                    self.error("Expected a function or type declaration.");
                    None
                }
            };
            if let Some(stmt) = stmt {
                statements.push(stmt);
            }
            self.synchronize();
            if self.token == at && !self.check(TokenKind::Eof) {
                self.advance();
            }
        }

        ParseOutcome {
            ast: Ast { statements },
            types: self.types,
            report: self.report,
            had_error: self.had_error,
        }
    }

    // ------------------------------------------------------------------
    // token plumbing

    fn advance(&mut self) -> Token {
        let previous = self.token;
        loop {
            let token = self.lexer.next_token();
            match token.kind {
                TokenKind::Comment => continue,
                TokenKind::Invalid => {
                    self.error_at(token, "Invalid token.");
                    continue;
                }
                _ => {
                    self.token = token;
                    break;
                }
            }
        }
        previous
    }

    /// One token of lookahead, skipping comments and invalid tokens
    /// without reporting them.
    fn peek(&self) -> Token {
        let mut lexer = self.lexer.clone();
        loop {
            let token = lexer.next_token();
            if !matches!(token.kind, TokenKind::Comment | TokenKind::Invalid) {
                return token;
            }
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.token.kind == kind
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Token {
        if self.check(kind) {
            return self.advance();
        }
        self.error(message);
        Token::INVALID
    }

    fn error(&mut self, message: &str) {
        self.error_at(self.token, message);
    }

    fn error_at(&mut self, token: Token, message: &str) {
        self.had_error = true;
        if !self.panic {
            self.report.error(token, message, self.source);
        }
        self.panic = true;
    }

    /// Skip to a plausible statement boundary. Clears panic, keeps
    /// `had_error`.
    fn synchronize(&mut self) {
        if !self.panic {
            return;
        }
        self.panic = false;
        while !self.check(TokenKind::Eof) {
            match self.token.kind {
                TokenKind::Int
                | TokenKind::Float
                | TokenKind::Bool
                | TokenKind::Fn
                | TokenKind::If
                | TokenKind::While
                | TokenKind::CurlyL
                | TokenKind::CurlyR => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // declarations

    fn global_fn(&mut self) -> Option<Stmt> {
        let (function, native) = self.fn_decl(true)?;
        if native {
            Some(Stmt::NativeFunction(NativeDecl { symbol: function.symbol }))
        } else {
            Some(Stmt::Function(function))
        }
    }

    /// `fn name(params) -> T` followed by a block body, `:= expr;`, or
    /// (top level only) `...;` for a native declaration.
    fn fn_decl(&mut self, allow_native: bool) -> Option<(FunctionDecl, bool)> {
        self.consume(TokenKind::Fn, "Expected 'fn'.");
        let name = self.consume(TokenKind::Identifier, "Expected function name.");

        self.consume(TokenKind::ParenL, "Expected '(' after function name.");
        let mut params = Vec::new();
        if !self.check(TokenKind::ParenR) {
            loop {
                if params.len() >= MAX_ARGS {
                    self.error("Cannot have more than 255 parameters.");
                    return None;
                }
                let ty = self.parse_type()?;
                let param = self.consume(TokenKind::Identifier, "Expected parameter name.");
                params.push(VarDecl { symbol: Symbol::new(param, ty), value: None });
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::ParenR, "Expected ')' after parameters.");

        let ret = if self.matches(TokenKind::Arrow) { self.parse_type()? } else { TypeId::VOID };
        let param_types = params.iter().map(|p| p.symbol.ty).collect();
        let fn_type = self.types.function(ret, param_types);
        let symbol = Symbol::new(name, fn_type);

        if self.check(TokenKind::CurlyL) {
            let body = self.braced_block()?;
            return Some((FunctionDecl { symbol, params, body }, false));
        }

        if self.matches(TokenKind::Assign) {
            let value = self.expression()?;
            self.consume(TokenKind::Semicolon, "Expected ';' after expression.");
            let body =
                Block { statements: vec![Stmt::Return { value: Some(value) }], var_count: 0 };
            return Some((FunctionDecl { symbol, params, body }, false));
        }

        if allow_native && self.matches(TokenKind::Ellipsis) {
            self.consume(TokenKind::Semicolon, "Expected ';' after native declaration.");
            return Some((FunctionDecl { symbol, params, body: Block::default() }, true));
        }

        self.error("Expected function body.");
        None
    }

    /// `type Name := { members }` or `type Name := [ variants ]`.
    fn type_decl(&mut self) -> Option<Stmt> {
        self.consume(TokenKind::Type, "Expected 'type'.");
        let name = self.consume(TokenKind::Identifier, "Expected type name.");
        self.consume(TokenKind::Assign, "Expected ':=' after type name.");

        if self.matches(TokenKind::CurlyL) {
            return self.struct_decl(name);
        }
        if self.matches(TokenKind::SqrL) {
            return self.union_decl(name);
        }
        self.error("Expected struct or union body.");
        None
    }

    fn struct_decl(&mut self, name: Token) -> Option<Stmt> {
        let mut members = Vec::new();
        if !self.check(TokenKind::CurlyR) {
            loop {
                if members.len() >= MAX_ARGS {
                    self.error("Cannot have more than 255 members.");
                    return None;
                }
                let ty = self.parse_type()?;
                let member = self.consume(TokenKind::Identifier, "Expected member name.");
                let value =
                    if self.matches(TokenKind::Assign) { Some(self.expression()?) } else { None };
                members.push(VarDecl { symbol: Symbol::new(member, ty), value });
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::CurlyR, "Expected '}' after struct members.");

        if members.is_empty() {
            self.error_at(name, "Struct must have at least one member.");
            return None;
        }

        let member_types = members
            .iter()
            .map(|m| (m.symbol.token.lexeme(self.source).into(), m.symbol.ty))
            .collect();
        let ty = self.types.register_struct(name.lexeme(self.source), member_types);
        Some(Stmt::Struct(StructDecl { symbol: Symbol::new(name, ty), members }))
    }

    fn union_decl(&mut self, name: Token) -> Option<Stmt> {
        let mut variants = Vec::new();
        if !self.check(TokenKind::SqrR) {
            loop {
                if variants.len() >= MAX_ARGS {
                    self.error("Cannot have more than 255 variants.");
                    return None;
                }
                variants.push(self.parse_type()?);
                if !self.matches(TokenKind::Pipe) {
                    break;
                }
            }
        }
        self.consume(TokenKind::SqrR, "Expected ']' after union variants.");

        if variants.is_empty() {
            self.error_at(name, "Union must have at least one variant.");
            return None;
        }

        let ty = self.types.register_union(name.lexeme(self.source), variants);
        Some(Stmt::Union(UnionDecl { symbol: Symbol::new(name, ty) }))
    }

    // ------------------------------------------------------------------
    // statements

    fn braced_block(&mut self) -> Option<Block> {
        self.consume(TokenKind::CurlyL, "Expected '{'.");
        let mut statements = Vec::new();
        while !self.check(TokenKind::CurlyR) && !self.check(TokenKind::Eof) {
            let at = self.token;
            match self.statement() {
                // A desugared `return fn ...` arrives as a bare Block pair;
                // splice it so the terminal-return check still sees the
                // return as the last statement.
                Some(Stmt::Block(inner)) => statements.extend(inner.statements),
                Some(stmt) => statements.push(stmt),
                None => self.synchronize(),
            }
            if self.token == at && !self.check(TokenKind::CurlyR) && !self.check(TokenKind::Eof) {
                self.advance();
            }
        }
        self.consume(TokenKind::CurlyR, "Expected '}' after block.");
        Some(Block { statements, var_count: 0 })
    }

    fn statement(&mut self) -> Option<Stmt> {
        match self.token.kind {
            TokenKind::CurlyL => Some(Stmt::Scope(self.braced_block()?)),
            TokenKind::If => self.if_stmt(),
            TokenKind::While => self.while_stmt(),
            TokenKind::Return => self.return_stmt(),
            TokenKind::Fn => self.closure_stmt(),
            TokenKind::Int
            | TokenKind::Float
            | TokenKind::Bool
            | TokenKind::String
            | TokenKind::Any
            | TokenKind::SqrL
            | TokenKind::ParenL => self.var_decl(),
            TokenKind::Identifier if self.peek().kind == TokenKind::Identifier => self.var_decl(),
            _ => self.expr_stmt(),
        }
    }

    /// A branch of `if`/`while`: either a braced block (the surrounding
    /// statement provides the scope) or a single statement.
    fn branch_body(&mut self) -> Option<Stmt> {
        if self.check(TokenKind::CurlyL) {
            Some(Stmt::Block(self.braced_block()?))
        } else {
            self.statement()
        }
    }

    fn if_stmt(&mut self) -> Option<Stmt> {
        self.consume(TokenKind::If, "Expected 'if'.");
        let condition = self.expression()?;
        self.consume(TokenKind::Colon, "Expected ':' after condition.");
        let then = Box::new(self.branch_body()?);
        let otherwise = if self.matches(TokenKind::Else) {
            Some(Box::new(self.branch_body()?))
        } else {
            None
        };
        Some(Stmt::If { condition, then, otherwise })
    }

    fn while_stmt(&mut self) -> Option<Stmt> {
        self.consume(TokenKind::While, "Expected 'while'.");
        let condition = self.expression()?;
        self.consume(TokenKind::Colon, "Expected ':' after condition.");
        let body = Box::new(self.branch_body()?);
        Some(Stmt::While { condition, body })
    }

    fn return_stmt(&mut self) -> Option<Stmt> {
        self.consume(TokenKind::Return, "Expected 'return'.");

        if self.matches(TokenKind::Semicolon) {
            return Some(Stmt::Return { value: None });
        }

        // `return fn name(...) ...` declares the closure, then returns it
        // by name.
        if self.check(TokenKind::Fn) {
            let closure = self.closure_stmt()?;
            let name = match &closure {
                Stmt::Closure(c) => c.function.symbol.token,
                _ => Token::INVALID,
            };
            let result = Expr::Primary(Primary { symbol: Symbol::new(name, TypeId::INVALID) });
            return Some(Stmt::Block(Block {
                statements: vec![closure, Stmt::Return { value: Some(result) }],
                var_count: 0,
            }));
        }

        let value = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expected ';' after return value.");
        Some(Stmt::Return { value: Some(value) })
    }

    fn closure_stmt(&mut self) -> Option<Stmt> {
        let (function, _) = self.fn_decl(false)?;
        Some(Stmt::Closure(ClosureDecl { function, upvalues: Vec::new() }))
    }

    fn var_decl(&mut self) -> Option<Stmt> {
        let ty = self.parse_type()?;
        let name = self.consume(TokenKind::Identifier, "Expected variable name.");
        let value = if self.matches(TokenKind::Assign) { Some(self.expression()?) } else { None };
        self.consume(TokenKind::Semicolon, "Expected ';' after declaration.");
        Some(Stmt::Var(VarDecl { symbol: Symbol::new(name, ty), value }))
    }

    /// `lvalue := expr ;` or a call used as a statement.
    fn expr_stmt(&mut self) -> Option<Stmt> {
        let expr = self.expression()?;
        if self.matches(TokenKind::Assign) {
            let rhs = self.expression()?;
            self.consume(TokenKind::Semicolon, "Expected ';' after assignment.");
            return Some(Stmt::Assignment { lhs: expr, rhs });
        }
        self.consume(TokenKind::Semicolon, "Expected ';' after expression.");
        Some(Stmt::Call(expr))
    }

    // ------------------------------------------------------------------
    // expressions

    fn expression(&mut self) -> Option<Expr> {
        self.parse_precedence(Precedence::Logic)
    }

    fn parse_precedence(&mut self, floor: Precedence) -> Option<Expr> {
        let token = self.advance();
        let Some(mut left) = self.prefix(token) else {
            self.error_at(token, "Expected expression.");
            return None;
        };

        while floor <= Self::precedence_of(self.token.kind) {
            let op = self.advance();
            left = self.infix(op, left)?;
        }

        Some(left)
    }

    fn precedence_of(kind: TokenKind) -> Precedence {
        match kind {
            TokenKind::AndAnd | TokenKind::OrOr => Precedence::Logic,
            TokenKind::Equal | TokenKind::BangEqual => Precedence::Equality,
            TokenKind::Less
            | TokenKind::LessEqual
            | TokenKind::Greater
            | TokenKind::GreaterEqual => Precedence::Comparison,
            TokenKind::Plus | TokenKind::Minus => Precedence::Term,
            TokenKind::Star | TokenKind::Slash => Precedence::Factor,
            TokenKind::ParenL => Precedence::Call,
            TokenKind::SqrL => Precedence::Subscript,
            TokenKind::Dot => Precedence::Access,
            _ => Precedence::None,
        }
    }

    fn prefix(&mut self, token: Token) -> Option<Expr> {
        match token.kind {
            TokenKind::IntLiteral
            | TokenKind::FloatLiteral
            | TokenKind::StringLiteral
            | TokenKind::True
            | TokenKind::False => Some(Expr::Literal { token }),
            TokenKind::Identifier => {
                Some(Expr::Primary(Primary { symbol: Symbol::new(token, TypeId::INVALID) }))
            }
            TokenKind::ParenL => {
                let inner = self.expression()?;
                self.consume(TokenKind::ParenR, "Expected ')' after expression.");
                Some(Expr::Grouping(Box::new(inner)))
            }
            TokenKind::Minus | TokenKind::Bang => {
                let right = self.parse_precedence(Precedence::Unary)?;
                Some(Expr::Unary { op: OperatorSym::new(token), right: Box::new(right) })
            }
            TokenKind::SqrL => self.array_literal(),
            TokenKind::CurlyL => self.map_literal(),
            _ => None,
        }
    }

    fn infix(&mut self, op: Token, left: Expr) -> Option<Expr> {
        match op.kind {
            TokenKind::ParenL => self.finish_call(left),
            TokenKind::SqrL => {
                let index = self.expression()?;
                self.consume(TokenKind::SqrR, "Expected ']' after index.");
                Some(Expr::Subscript { object: Box::new(left), index: Box::new(index) })
            }
            TokenKind::Dot => {
                let member = self.consume(TokenKind::Identifier, "Expected member name.");
                let element =
                    Expr::Primary(Primary { symbol: Symbol::new(member, TypeId::INVALID) });
                Some(Expr::Access { object: Box::new(left), element: Box::new(element) })
            }
            _ => {
                let floor = Self::precedence_of(op.kind).next();
                let right = self.parse_precedence(floor)?;
                Some(Expr::Binary {
                    op: OperatorSym::new(op),
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
        }
    }

    fn finish_call(&mut self, callee: Expr) -> Option<Expr> {
        let mut args = Vec::new();
        if !self.check(TokenKind::ParenR) {
            loop {
                if args.len() >= MAX_ARGS {
                    self.error("Cannot have more than 255 arguments.");
                    return None;
                }
                args.push(self.expression()?);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::ParenR, "Expected ')' after arguments.");
        Some(Expr::Call { callee: Box::new(callee), args })
    }

    fn array_literal(&mut self) -> Option<Expr> {
        let mut elements = Vec::new();
        loop {
            if elements.len() >= MAX_ARGS {
                self.error("Array literal can only have 255 elements.");
                return None;
            }
            elements.push(self.expression()?);
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::SqrR, "Expected ']' after array literal.");
        Some(Expr::ArrayLiteral { elements })
    }

    fn map_literal(&mut self) -> Option<Expr> {
        let mut entries = Vec::new();
        loop {
            if entries.len() >= MAX_ARGS {
                self.error("Map literal can only have 255 entries.");
                return None;
            }
            let key = self.expression()?;
            self.consume(TokenKind::Colon, "Expected ':' after map key.");
            let value = self.expression()?;
            entries.push((key, value));
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::CurlyR, "Expected '}' after map literal.");
        Some(Expr::MapLiteral { entries })
    }

    // ------------------------------------------------------------------
    // types

    fn parse_type(&mut self) -> Option<TypeId> {
        match self.token.kind {
            TokenKind::Int
            | TokenKind::Float
            | TokenKind::Bool
            | TokenKind::String
            | TokenKind::Any => {
                let token = self.advance();
                TypeInterner::from_token(token.kind)
            }
            TokenKind::SqrL => {
                self.advance();
                let first = self.parse_type()?;
                if self.matches(TokenKind::Comma) {
                    let value = self.parse_type()?;
                    self.consume(TokenKind::SqrR, "Expected ']' after map type.");
                    Some(self.types.map(first, value))
                } else {
                    self.consume(TokenKind::SqrR, "Expected ']' after array type.");
                    Some(self.types.array(first))
                }
            }
            TokenKind::ParenL => {
                self.advance();
                let mut params = Vec::new();
                if !self.check(TokenKind::ParenR) {
                    loop {
                        if params.len() >= MAX_ARGS {
                            self.error("Cannot have more than 255 parameters.");
                            return None;
                        }
                        params.push(self.parse_type()?);
                        if !self.matches(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.consume(TokenKind::ParenR, "Expected ')' after parameter types.");
                let ret =
                    if self.matches(TokenKind::Arrow) { self.parse_type()? } else { TypeId::VOID };
                Some(self.types.function(ret, params))
            }
            TokenKind::Identifier => {
                let name = self.advance();
                match self.types.user(name.lexeme(self.source)) {
                    Some(ty) => Some(ty),
                    None => {
                        self.error_at(name, "Unknown type.");
                        None
                    }
                }
            }
            _ => {
                self.error("Expected type.");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> ParseOutcome {
        Parser::new(source).parse()
    }

    fn parse_ok(source: &str) -> Ast {
        let outcome = parse(source);
        assert!(!outcome.had_error, "unexpected errors: {}", outcome.report);
        outcome.ast
    }

    #[test]
    fn parses_a_function_with_precedence() {
        let ast = parse_ok("fn main() -> Int { return 2 + 3 * 4; }");
        let Stmt::Function(f) = &ast.statements[0] else { panic!("expected function") };
        let Stmt::Return { value: Some(Expr::Binary { left, right, .. }) } = &f.body.statements[0]
        else {
            panic!("expected return of binary expression")
        };
        assert!(matches!(**left, Expr::Literal { .. }));
        assert!(matches!(**right, Expr::Binary { .. }), "* binds tighter than +");
    }

    #[test]
    fn expression_bodied_functions_desugar_to_return() {
        let ast = parse_ok("fn double(Int x) -> Int := x + x;");
        let Stmt::Function(f) = &ast.statements[0] else { panic!() };
        assert_eq!(f.params.len(), 1);
        assert!(matches!(f.body.statements[0], Stmt::Return { value: Some(_) }));
    }

    #[test]
    fn native_declarations_have_no_body() {
        let ast = parse_ok("fn print(Any value) ...;");
        assert!(matches!(ast.statements[0], Stmt::NativeFunction(_)));
    }

    #[test]
    fn identifier_statement_disambiguation() {
        let ast = parse_ok(
            "type P := { Int x } \
             fn main() { P p; p.x := 1; main(); }",
        );
        let Stmt::Function(f) = &ast.statements[1] else { panic!() };
        assert!(matches!(f.body.statements[0], Stmt::Var(_)));
        assert!(matches!(f.body.statements[1], Stmt::Assignment { .. }));
        assert!(matches!(f.body.statements[2], Stmt::Call(_)));
    }

    #[test]
    fn subscript_and_access_are_assignment_targets() {
        let ast = parse_ok("fn main() { [Int] xs := [1, 2]; xs[0] := 9; }");
        let Stmt::Function(f) = &ast.statements[0] else { panic!() };
        let Stmt::Assignment { lhs, .. } = &f.body.statements[1] else { panic!() };
        assert!(matches!(lhs, Expr::Subscript { .. }));
    }

    #[test]
    fn return_fn_desugars_into_closure_plus_return() {
        let ast = parse_ok(
            "fn make_adder(Int k) -> (Int) -> Int { return fn add(Int x) -> Int := x + k; }",
        );
        let Stmt::Function(f) = &ast.statements[0] else { panic!() };
        assert_eq!(f.body.statements.len(), 2);
        assert!(matches!(f.body.statements[0], Stmt::Closure(_)));
        assert!(matches!(f.body.statements[1], Stmt::Return { value: Some(_) }));
    }

    #[test]
    fn unions_parse_with_pipes() {
        let ast = parse_ok("type Number := [ Int | Float ]");
        assert!(matches!(ast.statements[0], Stmt::Union(_)));
    }

    #[test]
    fn empty_struct_and_union_are_errors() {
        assert!(parse("type P := { }").had_error);
        assert!(parse("type U := [ ]").had_error);
    }

    #[test]
    fn unknown_type_is_a_parse_error() {
        let outcome = parse("fn main() { Missing m; }");
        assert!(outcome.had_error);
        assert!(outcome.report.mentions("Unknown type"));
    }

    #[test]
    fn map_literals_take_key_value_pairs() {
        let ast = parse_ok("fn main() { [Int, Int] m := { 1 : 2, 3 : 4 }; }");
        let Stmt::Function(f) = &ast.statements[0] else { panic!() };
        let Stmt::Var(v) = &f.body.statements[0] else { panic!() };
        let Some(Expr::MapLiteral { entries }) = &v.value else { panic!() };
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn boundary_255_arguments_parse_and_256_fail() {
        let args_255 = vec!["1"; 255].join(", ");
        let ok = format!("fn main() {{ f({}); }}", args_255);
        assert!(!parse(&ok).had_error);

        let args_256 = vec!["1"; 256].join(", ");
        let too_many = format!("fn main() {{ f({}); }}", args_256);
        assert!(parse(&too_many).had_error);
    }

    #[test]
    fn recovery_resumes_at_statement_boundaries() {
        let outcome = parse(
            "fn main() { Int x := ; Int y := 2; }\
             fn other() { return 1; }",
        );
        assert!(outcome.had_error);
        // one report for the hole, not a cascade
        assert_eq!(outcome.report.len(), 1);
        assert_eq!(outcome.ast.statements.len(), 2);
    }

    #[test]
    fn errors_report_at_the_offending_token() {
        let outcome = parse("fn main() { return 1 }");
        assert!(outcome.had_error);
        assert!(outcome.report.mentions("Expected ';'"));
    }
}
