//! Chunk disassembler.
//!
//! Renders one instruction per line with its byte offset, in the same
//! terse shape the runtime's tracing output uses.

use crate::bytecode::{self, Chunk, OpCode};
use std::fmt::Write;

/// Render the instruction at `offset` into `out`, returning the offset of
/// the next instruction.
pub fn disassemble_instruction(chunk: &Chunk, offset: usize, out: &mut String) -> usize {
    let _ = write!(out, "{:04} ", offset);

    let Some(op) = OpCode::from_byte(chunk.code[offset]) else {
        let _ = writeln!(out, "??? {:#04x}", chunk.code[offset]);
        return offset + 1;
    };
    let mut next = offset + 1;

    match op {
        OpCode::Int => {
            let value = bytecode::read_i64(&chunk.code, next);
            next += 8;
            let _ = writeln!(out, "INT -> {}", value);
        }
        OpCode::Float => {
            let value = bytecode::read_f64(&chunk.code, next);
            next += 8;
            let _ = writeln!(out, "FLOAT -> {:.2}", value);
        }
        OpCode::StringLiteral => {
            let index = bytecode::read_u16(&chunk.code, next);
            next += 2;
            let _ = writeln!(out, "STRING -> '{}'", chunk.strings[index as usize]);
        }
        OpCode::ArrayLiteral | OpCode::MapLiteral | OpCode::Constructor | OpCode::Call => {
            let count = bytecode::read_u8(&chunk.code, next);
            next += 1;
            let name = match op {
                OpCode::ArrayLiteral => "ARRAY",
                OpCode::MapLiteral => "MAP",
                OpCode::Constructor => "CONSTRUCTOR",
                _ => "CALL",
            };
            let _ = writeln!(out, "{} {}", name, count);
        }
        OpCode::Get
        | OpCode::Set
        | OpCode::GlobalGet
        | OpCode::UpvalueGet
        | OpCode::UpvalueSet
        | OpCode::StructGet
        | OpCode::StructSet
        | OpCode::PopV => {
            let index = bytecode::read_u16(&chunk.code, next);
            next += 2;
            let name = match op {
                OpCode::Get => "GET",
                OpCode::Set => "SET",
                OpCode::GlobalGet => "GLOBAL_GET",
                OpCode::UpvalueGet => "UPVALUE_GET",
                OpCode::UpvalueSet => "UPVALUE_SET",
                OpCode::StructGet => "STRUCT_GET",
                OpCode::StructSet => "STRUCT_SET",
                _ => "POP_V",
            };
            let _ = writeln!(out, "{} at {}", name, index);
        }
        OpCode::Jmp | OpCode::JmpZ | OpCode::And | OpCode::Or => {
            let to = bytecode::read_i16(&chunk.code, next);
            next += 2;
            let name = match op {
                OpCode::Jmp => "JMP",
                OpCode::JmpZ => "ZJMP",
                OpCode::And => "AND",
                _ => "OR",
            };
            let _ = writeln!(out, "{} {}", name, to);
        }
        OpCode::Closure => {
            let index = bytecode::read_u16(&chunk.code, next);
            next += 2;
            let proto = &chunk.protos[index as usize];
            let _ = writeln!(out, "CLOSURE {} ({} upvalues)", proto.name, proto.upvalue_count);
            for _ in 0..proto.upvalue_count {
                let slot = bytecode::read_u16(&chunk.code, next);
                let local = bytecode::read_u8(&chunk.code, next + 2);
                next += 3;
                let _ = writeln!(
                    out,
                    "{:04}    | {} {}",
                    next - 3,
                    if local != 0 { "local" } else { "upvalue" },
                    slot
                );
            }
        }
        other => {
            let name = match other {
                OpCode::True => "TRUE",
                OpCode::False => "FALSE",
                OpCode::Nil => "NIL",
                OpCode::EmptyString => "EMPTY_STRING",
                OpCode::EmptyArray => "EMPTY_ARRAY",
                OpCode::EmptyMap => "EMPTY_MAP",
                OpCode::AddI => "ADD",
                OpCode::SubI => "SUB",
                OpCode::MulI => "MUL",
                OpCode::DivI => "DIV",
                OpCode::AddF => "fADD",
                OpCode::SubF => "fSUB",
                OpCode::MulF => "fMUL",
                OpCode::DivF => "fDIV",
                OpCode::LessI => "LESS",
                OpCode::GreaterI => "GREATER",
                OpCode::EqualI => "EQUAL",
                OpCode::LessF => "fLESS",
                OpCode::GreaterF => "fGREATER",
                OpCode::EqualF => "fEQUAL",
                OpCode::Not => "NOT",
                OpCode::NegateI => "NEG",
                OpCode::NegateF => "fNEG",
                OpCode::IndexGet => "INDEX_GET",
                OpCode::IndexSet => "INDEX_SET",
                OpCode::Return => "RETURN",
                OpCode::Pop => "POP",
                OpCode::IntCast => "INT_CAST",
                OpCode::FloatCast => "FLOAT_CAST",
                _ => unreachable!("handled above"),
            };
            let _ = writeln!(out, "{}", name);
        }
    }

    next
}

/// Render a whole chunk under a named header.
pub fn disassemble(chunk: &Chunk, name: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "====== {} =======", name);
    let mut offset = 0;
    while offset < chunk.code.len() {
        offset = disassemble_instruction(chunk, offset, &mut out);
    }
    out
}
