//! Two-pass semantic validator.
//!
//! Pass one loads every top-level name into the global scope so bodies can
//! reference declarations in any order. Pass two analyses each entity in a
//! fresh scope parented to the global one: it resolves identifiers through
//! the scope chain, type-checks every expression, assigns dense slot
//! indices, resolves closure upvalues, and rewrites a few nodes in place
//! (unbound assignments become declarations, struct variables without an
//! initializer gain a constructor call).
//!
//! Validation keeps going past errors inside a function; diagnostics
//! accumulate in the report and the overall result is a single bool.

use crate::ast::{
    Ast, Block, ClosureDecl, Expr, FunctionDecl, Primary, Stmt, StructDecl, Symbol, UpvalueSym,
    VarDecl,
};
use crate::report::Report;
use crate::scope::Scope;
use crate::token::{Token, TokenKind};
use crate::types::{Type, TypeId, TypeInterner};

struct ScopeFrame<'src> {
    scope: Scope<'src>,
    /// Index into `closures` of the innermost closure containing this
    /// scope, if any.
    closure: Option<usize>,
    /// Running slot counter; functions start a new family at zero.
    count: usize,
}

/// Upvalues collected while a closure body is being analysed; moved back
/// into the AST node afterwards.
struct ClosureFrame {
    upvalues: Vec<UpvalueSym>,
}

pub struct Validator<'a, 'src> {
    source: &'src str,
    types: &'a mut TypeInterner,
    report: Report,
    scopes: Vec<ScopeFrame<'src>>,
    closures: Vec<ClosureFrame>,
    /// Enclosing function return types, innermost last: (type, fn name).
    returns: Vec<(TypeId, Token)>,
}

impl<'a, 'src> Validator<'a, 'src> {
    pub fn new(source: &'src str, types: &'a mut TypeInterner) -> Validator<'a, 'src> {
        Validator {
            source,
            types,
            report: Report::new(),
            scopes: vec![ScopeFrame { scope: Scope::new(), closure: None, count: 0 }],
            closures: Vec::new(),
            returns: Vec::new(),
        }
    }

    pub fn into_report(self) -> Report {
        self.report
    }

    /// Run both passes. `false` when any statement failed; the AST is
    /// fully annotated for emission only on success.
    pub fn validate(&mut self, ast: &mut Ast) -> bool {
        let mut all_ok = true;

        for stmt in &mut ast.statements {
            all_ok = self.load_global(stmt) && all_ok;
        }

        for stmt in &mut ast.statements {
            all_ok = self.global_analysis(stmt) && all_ok;
        }

        all_ok
    }

    // ------------------------------------------------------------------
    // scopes and symbols

    fn push_scope(&mut self, reset_count: bool, closure: Option<usize>) {
        let top = self.scopes.last().expect("global scope always exists");
        let count = if reset_count || self.scopes.len() == 1 { 0 } else { top.count };
        let closure = closure.or(top.closure);
        self.scopes.push(ScopeFrame { scope: Scope::new(), closure, count });
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn find_symbol(&self, name: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|frame| frame.scope.get(name))
    }

    /// Register a symbol in the innermost scope, assigning the next slot.
    /// `None` when the name is already bound anywhere up the chain.
    fn add_symbol(&mut self, mut symbol: Symbol) -> Option<Symbol> {
        let name = symbol.token.lexeme(self.source);
        if self.find_symbol(name).is_some() {
            return None;
        }
        let depth = self.scopes.len() - 1;
        let frame = &mut self.scopes[depth];
        symbol.index = frame.count as u16;
        symbol.is_global = depth == 0;
        symbol.upvalue = false;
        frame.count += 1;
        frame.scope.insert(name, symbol);
        Some(symbol)
    }

    fn report_redefinition(&mut self, token: Token, message: &str) {
        self.report.error(token, message, self.source);
        if let Some(previous) = self.find_symbol(token.lexeme(self.source)) {
            let previous = previous.token;
            self.report.note(previous, "Previously defined here.", self.source);
        }
    }

    fn error(&mut self, token: Token, message: &str) {
        self.report.error(token, message, self.source);
    }

    // ------------------------------------------------------------------
    // closure upvalues

    fn in_closure(&self) -> bool {
        self.scopes.last().and_then(|f| f.closure).is_some()
    }

    /// Walk outward from `depth` looking for a captured name. A hit in the
    /// immediate parent captures a local of that frame; a transitive hit
    /// chains through the enclosing closure's upvalue table.
    fn resolve_upvalue(&mut self, depth: usize, token: Token) -> Option<u16> {
        if depth == 0 {
            return None;
        }
        let parent = depth - 1;
        let name = token.lexeme(self.source);
        if let Some(symbol) = self.scopes[parent].scope.get(name).copied() {
            return self.add_upvalue(depth, token, symbol.index, true);
        }
        if let Some(index) = self.resolve_upvalue(parent, token) {
            return self.add_upvalue(depth, token, index, false);
        }
        None
    }

    /// Append to the governing closure's upvalue table, de-duplicating by
    /// identifier text.
    fn add_upvalue(&mut self, depth: usize, token: Token, index: u16, local: bool) -> Option<u16> {
        let closure = self.scopes[depth].closure?;
        let upvalues = &mut self.closures[closure].upvalues;

        for (i, upvalue) in upvalues.iter().enumerate() {
            if upvalue.token.same_text(&token, self.source) {
                return Some(i as u16);
            }
        }

        if upvalues.len() >= u16::MAX as usize {
            return None;
        }
        upvalues.push(UpvalueSym { token, index, local });
        Some((upvalues.len() - 1) as u16)
    }

    // ------------------------------------------------------------------
    // expressions

    fn analyze_expr(&mut self, expr: &mut Expr) -> Option<TypeId> {
        match expr {
            Expr::Literal { token } => TypeInterner::from_token(token.kind),
            Expr::Primary(p) => self.analyze_primary(p),
            Expr::Grouping(inner) => self.analyze_expr(inner),
            Expr::Unary { op, right } => {
                let r = self.analyze_expr(right)?;
                op.ty = match op.token.kind {
                    TokenKind::Bang => TypeId::BOOL,
                    _ => r,
                };
                Some(op.ty)
            }
            Expr::Binary { op, left, right } => {
                let l = self.analyze_expr(left)?;
                let r = self.analyze_expr(right)?;

                let result = self.operator_type(op.token.kind, l, r);
                if result == TypeId::INVALID {
                    self.error(op.token, "Invalid operation between objects of different types.");
                    return None;
                }
                if l != r {
                    self.error(op.token, "Invalid operation between objects of different types.");
                    return None;
                }

                op.ty = result;
                Some(result)
            }
            Expr::Call { callee, args } => self.analyze_call(callee, args),
            Expr::Subscript { object, index } => self.analyze_subscript(object, index),
            Expr::Access { object, element } => self.analyze_access(object, element),
            Expr::ArrayLiteral { elements } => self.analyze_array_literal(elements),
            Expr::MapLiteral { entries } => self.analyze_map_literal(entries),
        }
    }

    /// Result type per operator: logic is Bool, arithmetic and comparison
    /// both take the numerically higher-ranked operand (Bool < Int <
    /// Float). Comparisons only use it to detect invalid mixes; the
    /// emitter picks the opcode per operand kind.
    fn operator_type(&self, op: TokenKind, lhs: TypeId, rhs: TypeId) -> TypeId {
        match op {
            TokenKind::Bang | TokenKind::AndAnd | TokenKind::OrOr => TypeId::BOOL,
            TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Star
            | TokenKind::Slash
            | TokenKind::Equal
            | TokenKind::BangEqual
            | TokenKind::Less
            | TokenKind::LessEqual
            | TokenKind::Greater
            | TokenKind::GreaterEqual => {
                if self.types.rank(lhs) >= self.types.rank(rhs) {
                    lhs
                } else {
                    rhs
                }
            }
            _ => TypeId::INVALID,
        }
    }

    fn analyze_primary(&mut self, primary: &mut Primary) -> Option<TypeId> {
        let token = primary.symbol.token;
        let name = token.lexeme(self.source);
        let Some(symbol) = self.find_symbol(name).copied() else {
            self.error(token, "Undeclared variable.");
            return None;
        };

        primary.symbol.ty = symbol.ty;
        primary.symbol.index = symbol.index;
        primary.symbol.is_global = symbol.is_global;
        primary.symbol.assignable = symbol.assignable;

        // Inside a closure, any non-global that is not a local of the
        // innermost scope resolves through the upvalue table.
        if self.in_closure() && !symbol.is_global {
            let depth = self.scopes.len() - 1;
            if self.scopes[depth].scope.get(name).is_none()
                && let Some(index) = self.resolve_upvalue(depth, token)
            {
                primary.symbol.upvalue = true;
                primary.symbol.index = index;
            }
        }

        Some(symbol.ty)
    }

    fn analyze_call(&mut self, callee: &mut Expr, args: &mut [Expr]) -> Option<TypeId> {
        let callee_type = self.analyze_expr(callee)?;

        let Type::Function { ret, params } = self.types.get(callee_type) else {
            self.error(callee.error_token(), "Expression is not callable.");
            return None;
        };
        let (ret, params) = (*ret, params.clone());

        if params.len() > args.len() {
            self.error(callee.error_token(), "Expected more arguments.");
            return None;
        }
        if params.len() < args.len() {
            self.error(callee.error_token(), "Too many arguments.");
            return None;
        }

        for (arg, param) in args.iter_mut().zip(params) {
            let from = self.analyze_expr(arg)?;
            if !self.types.check_assignment(param, from) {
                self.error(arg.error_token(), "Wrong type of argument.");
                return None;
            }
        }

        Some(ret)
    }

    fn analyze_subscript(&mut self, object: &mut Expr, index: &mut Expr) -> Option<TypeId> {
        let object_type = self.analyze_expr(object)?;
        let index_type = self.analyze_expr(index)?;

        match self.types.get(object_type) {
            Type::Array(_) => {
                if index_type != TypeId::INT {
                    self.error(index.error_token(), "Index has to be integral expression.");
                    return None;
                }
            }
            Type::Map(key, _) => {
                if index_type != *key {
                    self.error(index.error_token(), "Index doesn't match key type.");
                    return None;
                }
            }
            _ => {
                self.error(object.error_token(), "Expression is not subscriptable.");
                return None;
            }
        }

        Some(self.types.underlying(object_type))
    }

    fn analyze_access(&mut self, object: &mut Expr, element: &mut Expr) -> Option<TypeId> {
        let object_type = self.analyze_expr(object)?;

        let resolved = self.types.resolve(object_type);
        let Type::Struct { members, .. } = self.types.get(resolved) else {
            self.error(object.error_token(), "Expression is not accessible.");
            return None;
        };

        let Expr::Primary(member) = element else {
            self.error(element.error_token(), "Expression cannot be used as access expression.");
            return None;
        };

        let name = member.symbol.token.lexeme(self.source);
        for (i, (member_name, member_type)) in members.iter().enumerate() {
            if &**member_name == name {
                member.symbol.index = i as u16;
                member.symbol.ty = *member_type;
                return Some(*member_type);
            }
        }

        self.error(member.symbol.token, "No member.");
        None
    }

    fn analyze_array_literal(&mut self, elements: &mut [Expr]) -> Option<TypeId> {
        let mut iter = elements.iter_mut();
        let first = iter.next().expect("parser rejects empty array literals");
        let element_type = self.analyze_expr(first)?;

        for element in iter {
            let t = self.analyze_expr(element)?;
            if t != element_type {
                self.error(
                    element.error_token(),
                    "Array literal must contain expressions of the same type.",
                );
                return None;
            }
        }

        Some(self.types.array(element_type))
    }

    fn analyze_map_literal(&mut self, entries: &mut [(Expr, Expr)]) -> Option<TypeId> {
        let mut iter = entries.iter_mut();
        let (first_key, first_value) = iter.next().expect("parser rejects empty map literals");
        let key_type = self.analyze_expr(first_key)?;
        let value_type = self.analyze_expr(first_value)?;

        for (key, value) in iter {
            let k = self.analyze_expr(key)?;
            let v = self.analyze_expr(value)?;
            if k != key_type || v != value_type {
                self.error(
                    key.error_token(),
                    "Map literal must contain expressions of the same type.",
                );
                return None;
            }
        }

        Some(self.types.map(key_type, value_type))
    }

    // ------------------------------------------------------------------
    // statements

    fn analyze_stmt(&mut self, stmt: &mut Stmt) -> bool {
        match stmt {
            Stmt::Block(block) => self.analyze_block(block),
            Stmt::Scope(block) => {
                self.push_scope(false, None);
                let ok = self.analyze_block(block);
                self.pop_scope();
                ok
            }
            Stmt::Var(decl) => self.analyze_variable(decl),
            Stmt::Assignment { .. } => self.analyze_assignment(stmt),
            Stmt::If { condition, then, otherwise } => {
                let condition_ok = self.check_condition(condition);

                self.push_scope(false, None);
                let then_ok = self.analyze_stmt(then);
                self.pop_scope();

                let mut otherwise_ok = true;
                if let Some(otherwise) = otherwise {
                    self.push_scope(false, None);
                    otherwise_ok = self.analyze_stmt(otherwise);
                    self.pop_scope();
                }

                condition_ok && then_ok && otherwise_ok
            }
            Stmt::While { condition, body } => {
                let condition_ok = self.check_condition(condition);

                self.push_scope(false, None);
                let body_ok = self.analyze_stmt(body);
                self.pop_scope();

                condition_ok && body_ok
            }
            Stmt::Return { value } => self.analyze_return(value),
            Stmt::Call(expr) => self.analyze_expr(expr).is_some(),
            Stmt::Closure(decl) => self.analyze_closure(decl),
            Stmt::Function(decl) => self.analyze_fn(decl),
            Stmt::Struct(decl) => self.analyze_struct(decl),
            Stmt::Union(_) | Stmt::NativeFunction(_) => true,
        }
    }

    /// Conditions accept Int, Float and Bool.
    fn check_condition(&mut self, condition: &mut Expr) -> bool {
        let Some(t) = self.analyze_expr(condition) else { return false };
        let ok = matches!(self.types.get(t), Type::Int | Type::Float | Type::Bool);
        if !ok {
            self.error(condition.error_token(), "Expression doesn't return Bool.");
        }
        ok
    }

    fn analyze_block(&mut self, block: &mut Block) -> bool {
        let mut all_ok = true;
        let before = self.scopes.last().expect("scope").count;

        for stmt in &mut block.statements {
            all_ok = self.analyze_stmt(stmt) && all_ok;
        }

        let after = self.scopes.last().expect("scope").count;
        block.var_count = (after - before) as u16;
        all_ok
    }

    fn analyze_variable(&mut self, decl: &mut VarDecl) -> bool {
        let mut expr_ok = true;

        let value_type = match decl.value.as_mut() {
            Some(value) => {
                let t = self.analyze_expr(value);
                if t.is_none() {
                    expr_ok = false;
                }
                t
            }
            None => None,
        };

        // An assignment promoted to a declaration carries no declared
        // type; it is taken from the initializer.
        if decl.symbol.ty == TypeId::INVALID
            && let Some(t) = value_type
        {
            decl.symbol.ty = t;
        }

        let resolved = self.types.resolve(decl.symbol.ty);
        if matches!(self.types.get(resolved), Type::Struct { .. }) && decl.value.is_none() {
            decl.value = self.constructor_call(resolved);
        } else if let Some(value_type) = value_type
            && !self.types.check_assignment(decl.symbol.ty, value_type)
        {
            self.error(decl.symbol.token, "Invalid assignment to variable of different type.");
            expr_ok = false;
        }

        if decl.symbol.ty == TypeId::INVALID {
            expr_ok = false;
        }

        decl.symbol.assignable = true;
        self.load_var(decl) && expr_ok
    }

    /// Synthesize a zero-argument call to the struct's constructor, used
    /// as the implicit initializer of struct variables.
    fn constructor_call(&mut self, struct_type: TypeId) -> Option<Expr> {
        let Type::Struct { name, .. } = self.types.get(struct_type) else {
            return None;
        };
        let name = name.clone();
        let symbol = self.find_symbol(&name).copied();
        debug_assert!(symbol.is_some(), "struct type without a loaded global");
        let symbol = symbol?;
        Some(Expr::Call {
            callee: Box::new(Expr::Primary(Primary { symbol })),
            args: Vec::new(),
        })
    }

    fn load_var(&mut self, decl: &mut VarDecl) -> bool {
        if decl.symbol.ty == TypeId::ANY {
            self.error(
                decl.symbol.token,
                "'Any' expressions are only allowed as parameters to native functions.",
            );
            return false;
        }

        match self.add_symbol(decl.symbol) {
            Some(symbol) => {
                decl.symbol = symbol;
                true
            }
            None => {
                self.report_redefinition(decl.symbol.token, "Redefinition of name.");
                false
            }
        }
    }

    fn analyze_assignment(&mut self, stmt: &mut Stmt) -> bool {
        let Stmt::Assignment { lhs, rhs } = stmt else {
            return false;
        };

        // Assignment to a name with no binding declares it.
        if let Expr::Primary(p) = lhs
            && self.find_symbol(p.symbol.token.lexeme(self.source)).is_none()
        {
            let token = p.symbol.token;
            let value = std::mem::replace(rhs, Expr::Literal { token: Token::INVALID });
            *stmt = Stmt::Var(VarDecl {
                symbol: Symbol::new(token, TypeId::INVALID),
                value: Some(value),
            });
            return self.analyze_stmt(stmt);
        }

        let Some(lhs_type) = self.analyze_expr(lhs) else { return false };

        let assignable = match lhs {
            Expr::Primary(p) => p.symbol.assignable,
            Expr::Subscript { .. } | Expr::Access { .. } => true,
            _ => false,
        };
        if !assignable {
            self.error(lhs.error_token(), "Expression is not assignable.");
            return false;
        }

        let Some(rhs_type) = self.analyze_expr(rhs) else { return false };

        if !self.types.check_assignment(lhs_type, rhs_type) {
            self.error(lhs.error_token(), "Invalid assignment to variable of different type.");
            return false;
        }

        true
    }

    fn analyze_return(&mut self, value: &mut Option<Expr>) -> bool {
        let (expected, declared_at) = *self.returns.last().expect("return outside a function");

        let Some(value) = value.as_mut() else {
            if expected != TypeId::VOID {
                self.error(declared_at, "Non void function doesn't return anything.");
                return false;
            }
            return true;
        };

        let Some(value_type) = self.analyze_expr(value) else { return false };
        if value_type != expected {
            self.error(value.error_token(), "Incompatible return type.");
            self.report.note(declared_at, "As declared here.", self.source);
            return false;
        }
        true
    }

    /// Shared body analysis for functions and closures: the scope has
    /// already been pushed, parameters claim the first slots.
    fn analyze_function_body(&mut self, decl: &mut FunctionDecl) -> bool {
        let mut all_ok = true;

        let Type::Function { ret, .. } = self.types.get(decl.symbol.ty) else {
            return false;
        };
        let ret = *ret;
        self.returns.push((ret, decl.symbol.token));

        for param in &mut decl.params {
            all_ok = self.analyze_variable(param) && all_ok;
        }

        all_ok = self.analyze_block(&mut decl.body) && all_ok;

        if ret != TypeId::VOID && all_ok {
            let terminal_is_return =
                matches!(decl.body.statements.last(), Some(Stmt::Return { .. }));
            if !terminal_is_return {
                self.error(decl.symbol.token, "Non void function doesn't return anything.");
                all_ok = false;
            }
        }

        self.returns.pop();
        all_ok
    }

    fn analyze_fn(&mut self, decl: &mut FunctionDecl) -> bool {
        self.push_scope(true, None);
        let ok = self.analyze_function_body(decl);
        self.pop_scope();
        ok
    }

    fn analyze_closure(&mut self, decl: &mut ClosureDecl) -> bool {
        match self.add_symbol(decl.function.symbol) {
            Some(symbol) => decl.function.symbol = symbol,
            None => {
                self.report_redefinition(decl.function.symbol.token, "Redefinition of name.");
                return false;
            }
        }

        self.closures.push(ClosureFrame { upvalues: std::mem::take(&mut decl.upvalues) });
        let closure = self.closures.len() - 1;

        self.push_scope(true, Some(closure));
        let ok = self.analyze_function_body(&mut decl.function);
        self.pop_scope();

        decl.upvalues = self.closures.pop().expect("closure frame pushed above").upvalues;
        ok
    }

    fn analyze_struct(&mut self, decl: &mut StructDecl) -> bool {
        let mut all_ok = true;

        self.push_scope(true, None);
        for member in &mut decl.members {
            all_ok = self.analyze_variable(member) && all_ok;
        }
        self.pop_scope();

        all_ok
    }

    // ------------------------------------------------------------------
    // global passes

    fn load_global(&mut self, stmt: &mut Stmt) -> bool {
        let (symbol, message) = match stmt {
            Stmt::Function(decl) => (&mut decl.symbol, "Redefinition of name."),
            Stmt::NativeFunction(decl) => {
                (&mut decl.symbol, "Redefinition of name. (Native functions are not overloadable).")
            }
            Stmt::Struct(decl) => (&mut decl.symbol, "Redefinition of name."),
            Stmt::Union(decl) => (&mut decl.symbol, "Redefinition of name."),
            _ => {
                debug_assert!(false, "invalid top-level statement");
                return false;
            }
        };

        let declared = *symbol;
        match self.add_symbol(declared) {
            Some(loaded) => {
                *symbol = loaded;
                true
            }
            None => {
                self.report_redefinition(declared.token, message);
                false
            }
        }
    }

    fn global_analysis(&mut self, stmt: &mut Stmt) -> bool {
        match stmt {
            Stmt::Function(decl) => self.analyze_fn(decl),
            Stmt::Struct(decl) => self.analyze_struct(decl),
            Stmt::Union(_) | Stmt::NativeFunction(_) => true,
            _ => {
                debug_assert!(false, "invalid top-level statement");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    struct Checked {
        ast: Ast,
        report: Report,
        ok: bool,
    }

    fn validate(source: &str) -> Checked {
        let outcome = Parser::new(source).parse();
        assert!(!outcome.had_error, "parse failed: {}", outcome.report);
        let mut ast = outcome.ast;
        let mut types = outcome.types;
        let mut validator = Validator::new(source, &mut types);
        let ok = validator.validate(&mut ast);
        Checked { ast, report: validator.into_report(), ok }
    }

    fn assert_rejects(source: &str, message: &str) {
        let checked = validate(source);
        assert!(!checked.ok, "expected failure for: {}", source);
        assert!(
            checked.report.mentions(message),
            "expected '{}' in:\n{}",
            message,
            checked.report
        );
    }

    #[test]
    fn accepts_the_basics() {
        let checked = validate(
            "fn add(Int a, Int b) -> Int { return a + b; } \
             fn main() -> Int { return add(2, 3); }",
        );
        assert!(checked.ok, "{}", checked.report);
    }

    #[test]
    fn undeclared_names_are_errors() {
        assert_rejects("fn main() -> Int { return missing; }", "Undeclared variable.");
    }

    #[test]
    fn redefinitions_point_at_both_sites() {
        let checked = validate("fn f() { } fn f() { }");
        assert!(!checked.ok);
        assert!(checked.report.mentions("Redefinition of name."));
        assert!(checked.report.mentions("Previously defined here."));
    }

    #[test]
    fn operands_must_share_a_type() {
        assert_rejects(
            "fn main() -> Int { return 1 + 2.5; }",
            "Invalid operation between objects of different types.",
        );
    }

    #[test]
    fn call_arity_is_checked_both_ways() {
        assert_rejects(
            "fn one(Int a) -> Int { return a; } fn main() { one(); }",
            "Expected more arguments.",
        );
        assert_rejects(
            "fn one(Int a) -> Int { return a; } fn main() { one(1, 2); }",
            "Too many arguments.",
        );
        assert_rejects(
            "fn one(Int a) -> Int { return a; } fn main() { one(1.5); }",
            "Wrong type of argument.",
        );
    }

    #[test]
    fn only_functions_are_callable() {
        assert_rejects("fn main() { Int x := 1; x(); }", "Expression is not callable.");
    }

    #[test]
    fn conditions_take_numbers_and_bools_only() {
        assert!(validate("fn main() { if 1: return; }").ok);
        assert!(validate("fn main() { if 1.5: return; }").ok);
        assert!(validate("fn main() { if true: return; }").ok);
        assert_rejects("fn main() { if 'text': return; }", "Expression doesn't return Bool.");
        assert_rejects("fn main() { if [1, 2]: return; }", "Expression doesn't return Bool.");
    }

    #[test]
    fn non_void_functions_must_end_in_return() {
        assert_rejects(
            "fn main() -> Int { Int x := 1; }",
            "Non void function doesn't return anything.",
        );
    }

    #[test]
    fn return_type_must_match_exactly() {
        assert_rejects("fn main() -> Int { return 1.5; }", "Incompatible return type.");
    }

    #[test]
    fn subscript_rules() {
        assert!(validate("fn main() { [Int] xs := [1]; Int x := xs[0]; }").ok);
        assert_rejects(
            "fn main() { [Int] xs := [1]; Int x := xs[1.0]; }",
            "Index has to be integral expression.",
        );
        assert_rejects(
            "fn main() { [Int, Int] m := {1 : 2}; Int x := m['k']; }",
            "Index doesn't match key type.",
        );
        assert_rejects("fn main() { Int x := 1; Int y := x[0]; }", "Expression is not subscriptable.");
    }

    #[test]
    fn access_annotates_member_ordinals() {
        let checked = validate(
            "type P := { Int x, Int y } \
             fn main() -> Int { P p; return p.y; }",
        );
        assert!(checked.ok, "{}", checked.report);

        let Stmt::Function(f) = &checked.ast.statements[1] else { panic!() };
        let Stmt::Return { value: Some(Expr::Access { element, .. }) } = &f.body.statements[1]
        else {
            panic!("expected access in return")
        };
        let Expr::Primary(p) = &**element else { panic!() };
        assert_eq!(p.symbol.index, 1);
    }

    #[test]
    fn struct_variables_get_constructor_calls() {
        let checked = validate("type P := { Int x } fn main() { P p; }");
        assert!(checked.ok, "{}", checked.report);

        let Stmt::Function(f) = &checked.ast.statements[1] else { panic!() };
        let Stmt::Var(decl) = &f.body.statements[0] else { panic!() };
        let Some(Expr::Call { callee, args }) = &decl.value else {
            panic!("expected synthesized constructor call")
        };
        assert!(args.is_empty());
        let Expr::Primary(ctor) = &**callee else { panic!() };
        assert!(ctor.symbol.is_global);
        assert_eq!(ctor.symbol.index, 0);
    }

    #[test]
    fn unbound_assignment_becomes_a_declaration() {
        let checked = validate("fn main() -> Int { x := 4; return x; }");
        assert!(checked.ok, "{}", checked.report);

        let Stmt::Function(f) = &checked.ast.statements[0] else { panic!() };
        assert!(matches!(f.body.statements[0], Stmt::Var(_)));
        assert_eq!(f.body.var_count, 1);
    }

    #[test]
    fn assignment_respects_types() {
        assert_rejects(
            "fn main() { Int x := 1; x := 'no'; }",
            "Invalid assignment to variable of different type.",
        );
    }

    #[test]
    fn functions_are_not_assignable() {
        assert_rejects("fn f() { } fn main() { f := 1; }", "Expression is not assignable.");
    }

    #[test]
    fn unions_accept_their_variants_in_assignment() {
        let checked = validate(
            "type Number := [ Int | Float ] \
             fn main() { Number n := 1; n := 2.5; }",
        );
        assert!(checked.ok, "{}", checked.report);

        assert_rejects(
            "type Number := [ Int | Float ] fn main() { Number n := 'no'; }",
            "Invalid assignment to variable of different type.",
        );
    }

    #[test]
    fn any_variables_are_rejected() {
        assert_rejects(
            "fn main() { Any x := 1; }",
            "'Any' expressions are only allowed as parameters to native functions.",
        );
    }

    #[test]
    fn any_native_parameters_skip_argument_checks() {
        let checked = validate("fn print(Any value) ...; fn main() { print(1); print('s'); }");
        assert!(checked.ok, "{}", checked.report);
    }

    #[test]
    fn slot_indices_restart_per_function_and_globals_are_flagged() {
        let checked = validate(
            "fn f(Int a) -> Int { Int b := 1; return a + b; } \
             fn main() -> Int { Int c := 2; return f(c); }",
        );
        assert!(checked.ok, "{}", checked.report);

        let Stmt::Function(f) = &checked.ast.statements[0] else { panic!() };
        assert_eq!(f.params[0].symbol.index, 0);
        let Stmt::Var(b) = &f.body.statements[0] else { panic!() };
        assert_eq!(b.symbol.index, 1);
        assert!(!b.symbol.is_global);

        let Stmt::Function(main) = &checked.ast.statements[1] else { panic!() };
        assert!(main.symbol.is_global);
        assert_eq!(main.symbol.index, 1);
    }

    #[test]
    fn closures_capture_enclosing_locals_as_upvalues() {
        let checked = validate(
            "fn make_adder(Int k) -> (Int) -> Int { return fn add(Int x) -> Int := x + k; } \
             fn main() -> Int { (Int) -> Int a := make_adder(10); return a(5); }",
        );
        assert!(checked.ok, "{}", checked.report);

        let Stmt::Function(make_adder) = &checked.ast.statements[0] else { panic!() };
        let Stmt::Closure(closure) = &make_adder.body.statements[0] else { panic!() };
        assert_eq!(closure.upvalues.len(), 1);
        assert!(closure.upvalues[0].local);
        assert_eq!(closure.upvalues[0].index, 0);

        // inside the closure body, `k` reads upvalue 0 and `x` stays local
        let Stmt::Return { value: Some(Expr::Binary { left, right, .. }) } =
            &closure.function.body.statements[0]
        else {
            panic!()
        };
        let Expr::Primary(x) = &**left else { panic!() };
        assert!(!x.symbol.upvalue);
        assert_eq!(x.symbol.index, 0);
        let Expr::Primary(k) = &**right else { panic!() };
        assert!(k.symbol.upvalue);
        assert_eq!(k.symbol.index, 0);
    }

    #[test]
    fn nested_closures_chain_captures() {
        let checked = validate(
            "fn outer() -> Int { \
               Int a := 1; \
               fn mid() -> Int { \
                 fn inner() -> Int := a; \
                 return inner(); \
               } \
               return mid(); \
             }",
        );
        assert!(checked.ok, "{}", checked.report);

        let Stmt::Function(outer) = &checked.ast.statements[0] else { panic!() };
        let Stmt::Closure(mid) = &outer.body.statements[1] else { panic!() };
        assert_eq!(mid.upvalues.len(), 1);
        assert!(mid.upvalues[0].local, "mid captures outer's local directly");

        let Stmt::Closure(inner) = &mid.function.body.statements[0] else { panic!() };
        assert_eq!(inner.upvalues.len(), 1);
        assert!(!inner.upvalues[0].local, "inner chains through mid's upvalue table");
        assert_eq!(inner.upvalues[0].index, 0);
    }

    #[test]
    fn block_var_counts_track_direct_declarations() {
        let checked = validate(
            "fn main() { Int a := 1; { Int b := 2; Int c := 3; } Int d := 4; }",
        );
        assert!(checked.ok, "{}", checked.report);

        let Stmt::Function(f) = &checked.ast.statements[0] else { panic!() };
        assert_eq!(f.body.var_count, 2, "a and d belong to the body");
        let Stmt::Scope(inner) = &f.body.statements[1] else { panic!() };
        assert_eq!(inner.var_count, 2, "b and c belong to the scope");
    }
}
