//! The virtual machine.
//!
//! A fixed-capacity value stack and a tight dispatch loop. `execute` pushes
//! every package callable so global slot indices equal absolute stack
//! positions, then invokes `main` with an empty frame on top of them.
//! Calls recurse on the host stack: `call` sets `frame = stack_top - argc`,
//! `Return` pops the result, resets the top to the frame base and pushes
//! the result back. Runtime errors are fatal; `execute` maps them to exit
//! code -1.

use matiria_core::bytecode::{self, Chunk, OpCode};
use matiria_core::error::RuntimeError;
use matiria_core::object::{Closure, Object, Vm};
use matiria_core::package::Package;
use matiria_core::value::{MapKey, Value};
use std::cell::RefCell;
use std::rc::Rc;

pub const DEFAULT_STACK_CAPACITY: usize = 1024;

macro_rules! arith_i {
    ($engine:ident, $method:ident) => {{
        let r = $engine.pop_int()?;
        let l = $engine.pop_int()?;
        $engine.push(Value::Int(l.$method(r)))?;
    }};
}

macro_rules! arith_f {
    ($engine:ident, $op:tt) => {{
        let r = $engine.pop_float()?;
        let l = $engine.pop_float()?;
        $engine.push(Value::Float(l $op r))?;
    }};
}

macro_rules! compare_i {
    ($engine:ident, $op:tt) => {{
        let r = $engine.pop_int()?;
        let l = $engine.pop_int()?;
        $engine.push(Value::Int((l $op r) as i64))?;
    }};
}

macro_rules! compare_f {
    ($engine:ident, $op:tt) => {{
        let r = $engine.pop_float()?;
        let l = $engine.pop_float()?;
        $engine.push(Value::Int((l $op r) as i64))?;
    }};
}

pub struct Engine {
    stack: Vec<Value>,
    capacity: usize,
    /// Emit a `trace!` event with the live stack before every dispatch.
    trace_stack: bool,
}

impl Default for Engine {
    fn default() -> Engine {
        Engine::new()
    }
}

impl Vm for Engine {
    fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.stack.len() >= self.capacity {
            return Err(RuntimeError::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().unwrap_or_default()
    }
}

impl Engine {
    pub fn new() -> Engine {
        Engine::with_capacity(DEFAULT_STACK_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Engine {
        Engine { stack: Vec::with_capacity(capacity), capacity, trace_stack: false }
    }

    /// Trace the value stack at every instruction dispatch. The events go
    /// out at `trace` level, so the subscriber filter still applies.
    pub fn set_trace_stack(&mut self, enabled: bool) {
        self.trace_stack = enabled;
    }

    /// Run a package: prepopulate the stack with its callables, find
    /// `main`, execute it. Exit code 0 on success, -1 on a missing `main`
    /// or a fatal runtime error.
    pub fn execute(&mut self, package: &Package) -> i32 {
        self.stack.clear();

        let Some(main) = package.get("main").cloned() else {
            tracing::error!("{}", RuntimeError::MissingMain);
            return -1;
        };

        if let Err(error) = self.execute_main(package, main) {
            tracing::error!("{}", error);
            return -1;
        }
        0
    }

    fn execute_main(
        &mut self,
        package: &Package,
        main: Rc<Object>,
    ) -> Result<(), RuntimeError> {
        // every callable lands at its global slot index; main runs with an
        // empty frame on top of the prelude so its locals number from zero
        for slot in package.iter() {
            match slot {
                Some(object) => self.push(Value::Object(object.clone()))?,
                None => self.push(Value::Nil)?,
            }
        }
        self.call_object(main, 0)
    }

    /// The value `main` left behind, if any.
    pub fn result(&self) -> Option<&Value> {
        self.stack.last()
    }

    /// Render the live stack bottom-to-top, for trace output.
    pub fn dump_stack(&self) -> String {
        let mut out = String::from("[");
        for (i, value) in self.stack.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&value.to_string());
        }
        out.push(']');
        out
    }

    fn call_object(&mut self, callee: Rc<Object>, argc: usize) -> Result<(), RuntimeError> {
        let frame = self.stack.len().saturating_sub(argc);
        match &*callee {
            Object::Function(function) => {
                tracing::trace!(name = %function.name, argc, "call");
                self.run(&function.chunk, frame, None)
            }
            Object::Closure(closure) => {
                tracing::trace!(name = %closure.proto.name, argc, "call closure");
                self.run(&closure.proto.chunk, frame, Some(closure))
            }
            Object::Native(native) => {
                tracing::trace!(name = %native.name, argc, "call native");
                (native.callback)(self, argc as u8)
            }
            other => Err(RuntimeError::UnsupportedOperation(format!(
                "<{}> object is not callable",
                other.type_name()
            ))),
        }
    }

    fn run(
        &mut self,
        chunk: &Chunk,
        frame: usize,
        closure: Option<&Closure>,
    ) -> Result<(), RuntimeError> {
        let code = &chunk.code;
        let mut ip = 0;

        while ip < code.len() {
            if self.trace_stack {
                tracing::trace!(stack = %self.dump_stack(), ip, "dispatch");
            }

            let op = OpCode::from_byte(code[ip]).ok_or_else(|| {
                RuntimeError::UnsupportedOperation(format!("corrupt opcode {:#04x}", code[ip]))
            })?;
            ip += 1;

            match op {
                OpCode::Int => {
                    let value = bytecode::read_i64(code, ip);
                    ip += 8;
                    self.push(Value::Int(value))?;
                }
                OpCode::Float => {
                    let value = bytecode::read_f64(code, ip);
                    ip += 8;
                    self.push(Value::Float(value))?;
                }
                OpCode::True => self.push(Value::Int(1))?,
                OpCode::False => self.push(Value::Int(0))?,
                OpCode::Nil => self.push(Value::Nil)?,
                OpCode::StringLiteral => {
                    let index = bytecode::read_u16(code, ip) as usize;
                    ip += 2;
                    self.push(Value::object(Object::String(chunk.strings[index].clone())))?;
                }
                OpCode::ArrayLiteral => {
                    let count = bytecode::read_u8(code, ip);
                    ip += 1;
                    // children were emitted in reverse, so popping restores
                    // insertion order
                    let mut elements = Vec::with_capacity(count as usize);
                    for _ in 0..count {
                        elements.push(self.pop());
                    }
                    self.push(Value::object(Object::Array(RefCell::new(elements))))?;
                }
                OpCode::MapLiteral => {
                    let count = bytecode::read_u8(code, ip);
                    ip += 1;
                    let mut entries = std::collections::HashMap::new();
                    for _ in 0..count {
                        let value = self.pop();
                        let key = self.pop();
                        entries.insert(Self::map_key(&key)?, value);
                    }
                    self.push(Value::object(Object::Map(RefCell::new(entries))))?;
                }
                OpCode::EmptyString => self.push(Value::object(Object::String("".into())))?,
                OpCode::EmptyArray => self.push(Value::object(Object::empty_array()))?,
                OpCode::EmptyMap => self.push(Value::object(Object::empty_map()))?,

                OpCode::AddI => arith_i!(self, wrapping_add),
                OpCode::SubI => arith_i!(self, wrapping_sub),
                OpCode::MulI => arith_i!(self, wrapping_mul),
                OpCode::DivI => {
                    let r = self.pop_int()?;
                    let l = self.pop_int()?;
                    if r == 0 {
                        return Err(RuntimeError::DivisionByZero);
                    }
                    self.push(Value::Int(l.wrapping_div(r)))?;
                }
                OpCode::AddF => arith_f!(self, +),
                OpCode::SubF => arith_f!(self, -),
                OpCode::MulF => arith_f!(self, *),
                OpCode::DivF => arith_f!(self, /),

                OpCode::LessI => compare_i!(self, <),
                OpCode::GreaterI => compare_i!(self, >),
                OpCode::EqualI => compare_i!(self, ==),
                OpCode::LessF => compare_f!(self, <),
                OpCode::GreaterF => compare_f!(self, >),
                OpCode::EqualF => compare_f!(self, ==),

                OpCode::Not => {
                    let value = self.pop();
                    self.push(Value::Int(!value.is_truthy() as i64))?;
                }
                OpCode::And => {
                    let offset = bytecode::read_i16(code, ip);
                    ip += 2;
                    if self.peek(0).is_truthy() {
                        self.pop();
                    } else {
                        ip = Self::offset_ip(ip, offset);
                    }
                }
                OpCode::Or => {
                    let offset = bytecode::read_i16(code, ip);
                    ip += 2;
                    if self.peek(0).is_truthy() {
                        ip = Self::offset_ip(ip, offset);
                    } else {
                        self.pop();
                    }
                }

                OpCode::NegateI => {
                    let value = self.pop_int()?;
                    self.push(Value::Int(value.wrapping_neg()))?;
                }
                OpCode::NegateF => {
                    let value = self.pop_float()?;
                    self.push(Value::Float(-value))?;
                }

                OpCode::Get => {
                    let index = bytecode::read_u16(code, ip) as usize;
                    ip += 2;
                    self.push(self.stack[frame + index].clone())?;
                }
                OpCode::Set => {
                    let index = bytecode::read_u16(code, ip) as usize;
                    ip += 2;
                    self.stack[frame + index] = self.pop();
                }
                OpCode::GlobalGet => {
                    let index = bytecode::read_u16(code, ip) as usize;
                    ip += 2;
                    self.push(self.stack[index].clone())?;
                }
                OpCode::UpvalueGet => {
                    let index = bytecode::read_u16(code, ip) as usize;
                    ip += 2;
                    let value = Self::with_closure(closure)?.upvalues.borrow()[index].clone();
                    self.push(value)?;
                }
                OpCode::UpvalueSet => {
                    let index = bytecode::read_u16(code, ip) as usize;
                    ip += 2;
                    let value = self.pop();
                    Self::with_closure(closure)?.upvalues.borrow_mut()[index] = value;
                }

                OpCode::IndexGet => {
                    let key = self.pop();
                    let object = self.pop_object()?;
                    self.index_get(&object, &key)?;
                }
                OpCode::IndexSet => {
                    let key = self.pop();
                    let object = self.pop_object()?;
                    let value = self.pop();
                    Self::index_set(&object, &key, value)?;
                }
                OpCode::StructGet => {
                    let index = bytecode::read_u16(code, ip) as usize;
                    ip += 2;
                    let object = self.pop_object()?;
                    let value = Self::instance_fields(&object)?.borrow()[index].clone();
                    self.push(value)?;
                }
                OpCode::StructSet => {
                    let index = bytecode::read_u16(code, ip) as usize;
                    ip += 2;
                    let object = self.pop_object()?;
                    let value = self.pop();
                    Self::instance_fields(&object)?.borrow_mut()[index] = value;
                }

                OpCode::Jmp => {
                    let offset = bytecode::read_i16(code, ip);
                    ip += 2;
                    ip = Self::offset_ip(ip, offset);
                }
                OpCode::JmpZ => {
                    let condition = self.pop();
                    let offset = bytecode::read_i16(code, ip);
                    ip += 2;
                    if !condition.is_truthy() {
                        ip = Self::offset_ip(ip, offset);
                    }
                }
                OpCode::Pop => {
                    self.pop();
                }
                OpCode::PopV => {
                    let count = bytecode::read_u16(code, ip) as usize;
                    ip += 2;
                    self.stack.truncate(self.stack.len().saturating_sub(count));
                }
                OpCode::Call => {
                    let argc = bytecode::read_u8(code, ip);
                    ip += 1;
                    let callee = self.pop_object()?;
                    self.call_object(callee, argc as usize)?;
                }
                OpCode::Return => {
                    let result = self.pop();
                    self.stack.truncate(frame);
                    self.push(result)?;
                    return Ok(());
                }

                OpCode::IntCast => {
                    let value = self.pop_float()?;
                    self.push(Value::Int(value as i64))?;
                }
                OpCode::FloatCast => {
                    let value = self.pop_int()?;
                    self.push(Value::Float(value as f64))?;
                }

                OpCode::Constructor => {
                    let fieldc = bytecode::read_u8(code, ip);
                    ip += 1;
                    let mut fields = Vec::with_capacity(fieldc as usize);
                    for _ in 0..fieldc {
                        fields.push(self.pop());
                    }
                    fields.reverse();
                    self.push(Value::object(Object::Instance(RefCell::new(fields))))?;
                }
                OpCode::Closure => {
                    let index = bytecode::read_u16(code, ip) as usize;
                    ip += 2;
                    let proto = chunk.protos[index].clone();
                    let mut upvalues = Vec::with_capacity(proto.upvalue_count as usize);
                    for _ in 0..proto.upvalue_count {
                        let slot = bytecode::read_u16(code, ip) as usize;
                        let local = bytecode::read_u8(code, ip + 2) != 0;
                        ip += 3;
                        let value = if local {
                            self.stack[frame + slot].clone()
                        } else {
                            Self::with_closure(closure)?.upvalues.borrow()[slot].clone()
                        };
                        upvalues.push(value);
                    }
                    self.push(Value::object(Object::Closure(Closure {
                        proto,
                        upvalues: RefCell::new(upvalues),
                    })))?;
                }
            }
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // helpers

    fn offset_ip(ip: usize, offset: i16) -> usize {
        (ip as i64 + offset as i64) as usize
    }

    fn peek(&self, distance: usize) -> &Value {
        &self.stack[self.stack.len() - distance - 1]
    }

    fn pop_int(&mut self) -> Result<i64, RuntimeError> {
        self.pop()
            .as_int()
            .ok_or_else(|| RuntimeError::UnsupportedOperation("expected an integer value".into()))
    }

    fn pop_float(&mut self) -> Result<f64, RuntimeError> {
        self.pop()
            .as_float()
            .ok_or_else(|| RuntimeError::UnsupportedOperation("expected a float value".into()))
    }

    fn pop_object(&mut self) -> Result<Rc<Object>, RuntimeError> {
        self.pop()
            .as_object()
            .cloned()
            .ok_or_else(|| RuntimeError::UnsupportedOperation("expected an object value".into()))
    }

    fn with_closure(closure: Option<&Closure>) -> Result<&Closure, RuntimeError> {
        closure.ok_or_else(|| {
            RuntimeError::UnsupportedOperation("upvalue access outside a closure".into())
        })
    }

    fn instance_fields(object: &Object) -> Result<&RefCell<Vec<Value>>, RuntimeError> {
        match object {
            Object::Instance(fields) => Ok(fields),
            other => Err(RuntimeError::UnsupportedOperation(format!(
                "<{}> object has no fields",
                other.type_name()
            ))),
        }
    }

    fn map_key(value: &Value) -> Result<MapKey, RuntimeError> {
        MapKey::from_value(value).ok_or_else(|| {
            RuntimeError::UnsupportedOperation("value cannot be used as a map key".into())
        })
    }

    fn index_get(&mut self, object: &Object, key: &Value) -> Result<(), RuntimeError> {
        match object {
            Object::String(_) => Err(RuntimeError::UnsupportedOperation(
                "String indexing not yet implemented".into(),
            )),
            Object::Array(elements) => {
                let elements = elements.borrow();
                let index = key.as_int().ok_or_else(|| {
                    RuntimeError::UnsupportedOperation("expected an integer index".into())
                })?;
                if index < 0 || index as usize >= elements.len() {
                    return Err(RuntimeError::OutOfBounds { index, len: elements.len() });
                }
                let value = elements[index as usize].clone();
                drop(elements);
                self.push(value)
            }
            Object::Map(entries) => {
                let value =
                    entries.borrow().get(&Self::map_key(key)?).cloned().unwrap_or(Value::Nil);
                self.push(value)
            }
            other => Err(RuntimeError::UnsupportedOperation(format!(
                "<{}> object is not indexable",
                other.type_name()
            ))),
        }
    }

    fn index_set(object: &Object, key: &Value, value: Value) -> Result<(), RuntimeError> {
        match object {
            Object::String(_) => Err(RuntimeError::UnsupportedOperation(
                "<String> object does not support item assignment".into(),
            )),
            Object::Array(elements) => {
                let mut elements = elements.borrow_mut();
                let index = key.as_int().ok_or_else(|| {
                    RuntimeError::UnsupportedOperation("expected an integer index".into())
                })?;
                if index < 0 || index as usize >= elements.len() {
                    return Err(RuntimeError::OutOfBounds { index, len: elements.len() });
                }
                elements[index as usize] = value;
                Ok(())
            }
            Object::Map(entries) => {
                entries.borrow_mut().insert(Self::map_key(key)?, value);
                Ok(())
            }
            other => Err(RuntimeError::UnsupportedOperation(format!(
                "<{}> object is not indexable",
                other.type_name()
            ))),
        }
    }
}
