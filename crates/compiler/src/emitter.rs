//! Bytecode emitter.
//!
//! Walks the validated AST and produces one chunk per function and per
//! struct constructor, collected into a package whose slot order matches
//! the validator's global indices. Forward jumps are emitted with a
//! `0xFFFF` placeholder and patched once the target block is known;
//! backward jumps compute their offset directly.

use crate::ast::{
    Ast, Block, ClosureDecl, Expr, FunctionDecl, Stmt, StructDecl, VarDecl,
};
use crate::token::TokenKind;
use crate::types::{Type, TypeId, TypeInterner};
use matiria_core::bytecode::{Chunk, OpCode};
use matiria_core::object::{ClosureProto, Function, Object};
use matiria_core::package::Package;
use std::rc::Rc;

/// Build the package for a validated program.
pub fn emit(ast: &Ast, types: &TypeInterner, source: &str) -> Package {
    let emitter = Emitter { source, types };
    let mut package = Package::new();

    for stmt in &ast.statements {
        match stmt {
            Stmt::Function(decl) => {
                let name = decl.symbol.token.lexeme(source);
                let mut chunk = Chunk::new();
                emitter.write_function(&mut chunk, decl);
                let object = Object::Function(Function { name: name.into(), chunk });
                package.insert(name, Some(Rc::new(object)));
            }
            Stmt::Struct(decl) => {
                let name = decl.symbol.token.lexeme(source);
                let mut chunk = Chunk::new();
                emitter.write_struct(&mut chunk, decl);
                let object = Object::Function(Function { name: name.into(), chunk });
                package.insert(name, Some(Rc::new(object)));
            }
            // Native slots are bound by the host; unions occupy a slot so
            // global indices keep lining up with stack positions.
            Stmt::NativeFunction(decl) => {
                package.insert(decl.symbol.token.lexeme(source), None);
            }
            Stmt::Union(decl) => {
                package.insert(decl.symbol.token.lexeme(source), None);
            }
            _ => {}
        }
    }

    package
}

struct Emitter<'a, 'src> {
    source: &'src str,
    types: &'a TypeInterner,
}

/// Emit `op` with a placeholder offset; returns the patch site.
fn emit_jump(chunk: &mut Chunk, op: OpCode) -> usize {
    chunk.write_op(op);
    chunk.write_u16(0xFFFF);
    chunk.len() - 2
}

/// Point the jump at `site` to the current end of the chunk. The offset is
/// relative to the byte after the two-byte operand.
fn patch_jump(chunk: &mut Chunk, site: usize) {
    let target = (chunk.len() - site - 2) as i16;
    chunk.patch_i16(site, target);
}

/// Backward jump to re-run the instruction owning the operand at `site`.
fn emit_loop(chunk: &mut Chunk, site: usize) {
    chunk.write_op(OpCode::Jmp);
    let back = site as i64 - chunk.len() as i64 - 3;
    chunk.write_i16(back as i16);
}

fn evaluate_int(text: &str) -> i64 {
    let mut value: u64 = 0;
    for digit in text.bytes() {
        value = value.wrapping_mul(10).wrapping_add(u64::from(digit - b'0'));
    }
    value as i64
}

fn evaluate_float(text: &str) -> f64 {
    let (whole, fraction) = text.split_once('.').unwrap_or((text, ""));
    let mut value = 0.0;
    for digit in whole.bytes() {
        value = value * 10.0 + f64::from(digit - b'0');
    }
    let mut scale = 10.0;
    for digit in fraction.bytes() {
        value += f64::from(digit - b'0') / scale;
        scale *= 10.0;
    }
    value
}

impl<'a, 'src> Emitter<'a, 'src> {
    fn write_function(&self, chunk: &mut Chunk, decl: &FunctionDecl) {
        self.write_block(chunk, &decl.body);
        // Fallthrough epilogue: a body that never returns still leaves the
        // caller exactly one result.
        chunk.write_op(OpCode::Nil);
        chunk.write_op(OpCode::Return);
    }

    /// A constructor chunk: every member's default initializer in
    /// declaration order, folded into one instance.
    fn write_struct(&self, chunk: &mut Chunk, decl: &StructDecl) {
        for member in &decl.members {
            self.write_variable(chunk, member);
        }
        chunk.write_op(OpCode::Constructor);
        chunk.write_u8(decl.members.len() as u8);
        chunk.write_op(OpCode::Return);
    }

    fn write_stmt(&self, chunk: &mut Chunk, stmt: &Stmt) {
        match stmt {
            Stmt::Var(decl) => self.write_variable(chunk, decl),
            Stmt::If { condition, then, otherwise } => {
                self.write_if(chunk, condition, then, otherwise.as_deref())
            }
            Stmt::While { condition, body } => self.write_while(chunk, condition, body),
            // Scopes only exist for validation; at runtime both are a
            // statement list plus a trailing pop of their locals.
            Stmt::Block(block) | Stmt::Scope(block) => self.write_block(chunk, block),
            Stmt::Assignment { lhs, rhs } => self.write_assignment(chunk, lhs, rhs),
            Stmt::Return { value } => {
                match value {
                    Some(value) => self.write_expr(chunk, value),
                    None => chunk.write_op(OpCode::Nil),
                }
                chunk.write_op(OpCode::Return);
            }
            Stmt::Call(expr) => {
                self.write_expr(chunk, expr);
                chunk.write_op(OpCode::Pop);
            }
            Stmt::Closure(decl) => self.write_closure(chunk, decl),
            Stmt::Function(_) | Stmt::NativeFunction(_) | Stmt::Struct(_) | Stmt::Union(_) => {}
        }
    }

    fn write_block(&self, chunk: &mut Chunk, block: &Block) {
        for stmt in &block.statements {
            self.write_stmt(chunk, stmt);
        }
        chunk.write_op(OpCode::PopV);
        chunk.write_u16(block.var_count);
    }

    fn write_variable(&self, chunk: &mut Chunk, decl: &VarDecl) {
        let Some(value) = &decl.value else {
            let resolved = self.types.resolve(decl.symbol.ty);
            let op = match self.types.get(resolved) {
                Type::String => OpCode::EmptyString,
                Type::Array(_) => OpCode::EmptyArray,
                Type::Map(_, _) => OpCode::EmptyMap,
                _ => OpCode::Nil,
            };
            chunk.write_op(op);
            return;
        };
        self.write_expr(chunk, value);
    }

    fn write_if(&self, chunk: &mut Chunk, condition: &Expr, then: &Stmt, otherwise: Option<&Stmt>) {
        self.write_expr(chunk, condition);
        let exit = emit_jump(chunk, OpCode::JmpZ);

        self.write_stmt(chunk, then);

        if let Some(otherwise) = otherwise {
            let done = emit_jump(chunk, OpCode::Jmp);
            patch_jump(chunk, exit);
            self.write_stmt(chunk, otherwise);
            patch_jump(chunk, done);
        } else {
            patch_jump(chunk, exit);
        }
    }

    fn write_while(&self, chunk: &mut Chunk, condition: &Expr, body: &Stmt) {
        self.write_expr(chunk, condition);
        let exit = emit_jump(chunk, OpCode::JmpZ);

        self.write_stmt(chunk, body);

        // the initial test consumed the condition, so re-emit it before
        // looping back to the test
        self.write_expr(chunk, condition);
        emit_loop(chunk, exit);

        patch_jump(chunk, exit);
    }

    fn write_assignment(&self, chunk: &mut Chunk, lhs: &Expr, rhs: &Expr) {
        self.write_expr(chunk, rhs);

        match lhs {
            Expr::Primary(p) => {
                let op = if p.symbol.upvalue { OpCode::UpvalueSet } else { OpCode::Set };
                chunk.write_op(op);
                chunk.write_u16(p.symbol.index);
            }
            Expr::Subscript { object, index } => {
                self.write_expr(chunk, object);
                self.write_expr(chunk, index);
                chunk.write_op(OpCode::IndexSet);
            }
            Expr::Access { object, element } => {
                self.write_expr(chunk, object);
                chunk.write_op(OpCode::StructSet);
                let Expr::Primary(member) = &**element else {
                    debug_assert!(false, "access element is always a primary");
                    return;
                };
                chunk.write_u16(member.symbol.index);
            }
            _ => debug_assert!(false, "invalid assignment target survived validation"),
        }
    }

    fn write_closure(&self, chunk: &mut Chunk, decl: &ClosureDecl) {
        let mut body = Chunk::new();
        self.write_function(&mut body, &decl.function);

        let proto = Rc::new(ClosureProto {
            name: decl.function.symbol.token.lexeme(self.source).into(),
            chunk: body,
            upvalue_count: decl.upvalues.len() as u16,
        });
        let index = chunk.add_proto(proto);

        chunk.write_op(OpCode::Closure);
        chunk.write_u16(index);
        for upvalue in &decl.upvalues {
            chunk.write_u16(upvalue.index);
            chunk.write_u8(upvalue.local as u8);
        }
    }

    // ------------------------------------------------------------------
    // expressions

    fn write_expr(&self, chunk: &mut Chunk, expr: &Expr) {
        match expr {
            Expr::Literal { token } => self.write_literal(chunk, token),
            Expr::Primary(p) => {
                let op = if p.symbol.is_global {
                    OpCode::GlobalGet
                } else if p.symbol.upvalue {
                    OpCode::UpvalueGet
                } else {
                    OpCode::Get
                };
                chunk.write_op(op);
                chunk.write_u16(p.symbol.index);
            }
            Expr::Grouping(inner) => self.write_expr(chunk, inner),
            Expr::Unary { op, right } => {
                self.write_expr(chunk, right);
                match op.token.kind {
                    TokenKind::Bang => chunk.write_op(OpCode::Not),
                    _ => {
                        let negate =
                            if op.ty == TypeId::INT { OpCode::NegateI } else { OpCode::NegateF };
                        chunk.write_op(negate);
                    }
                }
            }
            Expr::Binary { op, left, right } => self.write_binary(chunk, op.token.kind, op.ty, left, right),
            Expr::Call { callee, args } => {
                for arg in args {
                    self.write_expr(chunk, arg);
                }
                self.write_expr(chunk, callee);
                chunk.write_op(OpCode::Call);
                chunk.write_u8(args.len() as u8);
            }
            Expr::Subscript { object, index } => {
                self.write_expr(chunk, object);
                self.write_expr(chunk, index);
                chunk.write_op(OpCode::IndexGet);
            }
            Expr::Access { object, element } => {
                self.write_expr(chunk, object);
                chunk.write_op(OpCode::StructGet);
                let Expr::Primary(member) = &**element else {
                    debug_assert!(false, "access element is always a primary");
                    return;
                };
                chunk.write_u16(member.symbol.index);
            }
            Expr::ArrayLiteral { elements } => {
                // reversed so the engine pops back into insertion order
                for element in elements.iter().rev() {
                    self.write_expr(chunk, element);
                }
                chunk.write_op(OpCode::ArrayLiteral);
                chunk.write_u8(elements.len() as u8);
            }
            Expr::MapLiteral { entries } => {
                for (key, value) in entries.iter().rev() {
                    self.write_expr(chunk, key);
                    self.write_expr(chunk, value);
                }
                chunk.write_op(OpCode::MapLiteral);
                chunk.write_u8(entries.len() as u8);
            }
        }
    }

    fn write_literal(&self, chunk: &mut Chunk, token: &crate::token::Token) {
        match token.kind {
            TokenKind::IntLiteral => {
                chunk.write_op(OpCode::Int);
                chunk.write_i64(evaluate_int(token.lexeme(self.source)));
            }
            TokenKind::FloatLiteral => {
                chunk.write_op(OpCode::Float);
                chunk.write_f64(evaluate_float(token.lexeme(self.source)));
            }
            TokenKind::StringLiteral => {
                let quoted = token.lexeme(self.source);
                let index = chunk.add_string(&quoted[1..quoted.len() - 1]);
                chunk.write_op(OpCode::StringLiteral);
                chunk.write_u16(index);
            }
            TokenKind::True => chunk.write_op(OpCode::True),
            TokenKind::False => chunk.write_op(OpCode::False),
            _ => debug_assert!(false, "invalid literal kind survived validation"),
        }
    }

    fn write_binary(
        &self,
        chunk: &mut Chunk,
        op: TokenKind,
        operand: TypeId,
        left: &Expr,
        right: &Expr,
    ) {
        // && and || short-circuit: the decisive operand stays on the stack
        if op == TokenKind::AndAnd || op == TokenKind::OrOr {
            self.write_expr(chunk, left);
            let jump = if op == TokenKind::AndAnd { OpCode::And } else { OpCode::Or };
            let site = emit_jump(chunk, jump);
            self.write_expr(chunk, right);
            patch_jump(chunk, site);
            return;
        }

        self.write_expr(chunk, left);
        self.write_expr(chunk, right);

        let ops = match operand {
            TypeId::INT => Some([
                OpCode::AddI,
                OpCode::SubI,
                OpCode::MulI,
                OpCode::DivI,
                OpCode::LessI,
                OpCode::GreaterI,
                OpCode::EqualI,
            ]),
            TypeId::FLOAT => Some([
                OpCode::AddF,
                OpCode::SubF,
                OpCode::MulF,
                OpCode::DivF,
                OpCode::LessF,
                OpCode::GreaterF,
                OpCode::EqualF,
            ]),
            // other operand kinds have no opcode
            _ => None,
        };
        let Some([add, sub, mul, div, less, greater, equal]) = ops else { return };

        match op {
            TokenKind::Plus => chunk.write_op(add),
            TokenKind::Minus => chunk.write_op(sub),
            TokenKind::Star => chunk.write_op(mul),
            TokenKind::Slash => chunk.write_op(div),
            TokenKind::Less => chunk.write_op(less),
            TokenKind::Greater => chunk.write_op(greater),
            TokenKind::Equal => chunk.write_op(equal),
            TokenKind::LessEqual => {
                chunk.write_op(greater);
                chunk.write_op(OpCode::Not);
            }
            TokenKind::GreaterEqual => {
                chunk.write_op(less);
                chunk.write_op(OpCode::Not);
            }
            TokenKind::BangEqual => {
                chunk.write_op(equal);
                chunk.write_op(OpCode::Not);
            }
            _ => {}
        }
    }
}
