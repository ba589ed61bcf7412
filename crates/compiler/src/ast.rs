//! Abstract syntax tree.
//!
//! Built by the parser, annotated and occasionally rewritten by the
//! validator (symbol indices, operator types, assignment promotion,
//! synthesized constructor calls), then consumed by the emitter. Nodes do
//! not outlive emission.

use crate::token::Token;
use crate::types::TypeId;

/// A resolved name: the defining token, its type, and the slot the
/// validator assigned. Indices are final after validation.
#[derive(Debug, Clone, Copy)]
pub struct Symbol {
    pub token: Token,
    pub ty: TypeId,
    pub index: u16,
    pub is_global: bool,
    pub upvalue: bool,
    pub assignable: bool,
}

impl Symbol {
    pub fn new(token: Token, ty: TypeId) -> Symbol {
        Symbol { token, ty, index: 0, is_global: false, upvalue: false, assignable: false }
    }
}

/// An operator occurrence. The validator fills `ty` with the operand type
/// so the emitter can pick the integer or float opcode.
#[derive(Debug, Clone, Copy)]
pub struct OperatorSym {
    pub token: Token,
    pub ty: TypeId,
}

impl OperatorSym {
    pub fn new(token: Token) -> OperatorSym {
        OperatorSym { token, ty: TypeId::INVALID }
    }
}

#[derive(Debug, Clone)]
pub struct Primary {
    pub symbol: Symbol,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal { token: Token },
    Primary(Primary),
    Unary { op: OperatorSym, right: Box<Expr> },
    Binary { op: OperatorSym, left: Box<Expr>, right: Box<Expr> },
    Grouping(Box<Expr>),
    Call { callee: Box<Expr>, args: Vec<Expr> },
    Subscript { object: Box<Expr>, index: Box<Expr> },
    /// Member access; `element` is always a `Primary` after parsing, and
    /// its symbol index becomes the member ordinal after validation.
    Access { object: Box<Expr>, element: Box<Expr> },
    ArrayLiteral { elements: Vec<Expr> },
    MapLiteral { entries: Vec<(Expr, Expr)> },
}

impl Expr {
    /// The token diagnostics should point at for this expression.
    pub fn error_token(&self) -> Token {
        match self {
            Expr::Literal { token } => *token,
            Expr::Primary(p) => p.symbol.token,
            Expr::Unary { op, .. } => op.token,
            Expr::Binary { op, .. } => op.token,
            Expr::Grouping(inner) => inner.error_token(),
            Expr::Call { callee, .. } => callee.error_token(),
            Expr::Subscript { object, .. } => object.error_token(),
            Expr::Access { object, .. } => object.error_token(),
            Expr::ArrayLiteral { elements } => {
                elements.first().map(Expr::error_token).unwrap_or(Token::INVALID)
            }
            Expr::MapLiteral { entries } => {
                entries.first().map(|(k, _)| k.error_token()).unwrap_or(Token::INVALID)
            }
        }
    }
}

/// Statement list plus the number of locals declared directly inside,
/// recorded by the validator and popped on block exit at runtime.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub var_count: u16,
}

#[derive(Debug, Clone)]
pub struct VarDecl {
    pub symbol: Symbol,
    pub value: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub symbol: Symbol,
    pub params: Vec<VarDecl>,
    pub body: Block,
}

/// A captured variable: where it lives relative to the scope that created
/// the closure.
#[derive(Debug, Clone, Copy)]
pub struct UpvalueSym {
    pub token: Token,
    pub index: u16,
    /// Captured from the enclosing frame's locals; otherwise from the
    /// enclosing closure's upvalue table.
    pub local: bool,
}

/// A nested function. Upvalues are resolved lazily by the validator as the
/// body references enclosing names.
#[derive(Debug, Clone)]
pub struct ClosureDecl {
    pub function: FunctionDecl,
    pub upvalues: Vec<UpvalueSym>,
}

#[derive(Debug, Clone)]
pub struct StructDecl {
    pub symbol: Symbol,
    pub members: Vec<VarDecl>,
}

#[derive(Debug, Clone)]
pub struct UnionDecl {
    pub symbol: Symbol,
}

/// A native declaration: signature only, bound by the host at run time.
#[derive(Debug, Clone)]
pub struct NativeDecl {
    pub symbol: Symbol,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Block(Block),
    /// A block that always opens its own child scope.
    Scope(Block),
    Var(VarDecl),
    Assignment { lhs: Expr, rhs: Expr },
    If { condition: Expr, then: Box<Stmt>, otherwise: Option<Box<Stmt>> },
    While { condition: Expr, body: Box<Stmt> },
    Return { value: Option<Expr> },
    Call(Expr),
    Function(FunctionDecl),
    NativeFunction(NativeDecl),
    Closure(ClosureDecl),
    Struct(StructDecl),
    Union(UnionDecl),
}

/// A parsed program: the top-level declaration list.
#[derive(Debug, Clone, Default)]
pub struct Ast {
    pub statements: Vec<Stmt>,
}
