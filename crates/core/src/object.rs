//! Heap objects.
//!
//! Objects are tag-dispatched: the engine matches on the variant whenever it
//! indexes or invokes one. Handles are `Rc` so an object lives from its
//! creation until the last stack slot or package slot holding it is torn
//! down; the core never collects mid-run.

use crate::bytecode::Chunk;
use crate::error::RuntimeError;
use crate::value::{MapKey, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// The stack operations a native callback is allowed to use. Implemented by
/// the engine; keeping it a trait lets callbacks live below the runtime
/// crate without a dependency cycle.
pub trait Vm {
    fn push(&mut self, value: Value) -> Result<(), RuntimeError>;
    fn pop(&mut self) -> Value;
}

/// Host callback invoked for a native function: pop `argc` arguments, push
/// exactly one result.
pub type NativeFn = fn(&mut dyn Vm, u8) -> Result<(), RuntimeError>;

/// A compiled function: one chunk, executed with `frame = stack_top - argc`.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: Box<str>,
    pub chunk: Chunk,
}

/// The compile-time shape of a closure: its code plus how many values it
/// captures. Shared by every closure object created from the same `fn`.
#[derive(Debug, Clone)]
pub struct ClosureProto {
    pub name: Box<str>,
    pub chunk: Chunk,
    pub upvalue_count: u16,
}

/// A closure object: prototype plus the captured values.
#[derive(Debug)]
pub struct Closure {
    pub proto: Rc<ClosureProto>,
    pub upvalues: RefCell<Vec<Value>>,
}

pub struct Native {
    pub name: Box<str>,
    pub callback: NativeFn,
}

impl std::fmt::Debug for Native {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Native").field("name", &self.name).finish()
    }
}

#[derive(Debug)]
pub enum Object {
    String(Box<str>),
    Array(RefCell<Vec<Value>>),
    Map(RefCell<HashMap<MapKey, Value>>),
    /// A struct value: fields in declaration order.
    Instance(RefCell<Vec<Value>>),
    Function(Function),
    Closure(Closure),
    Native(Native),
}

impl Object {
    pub fn empty_array() -> Object {
        Object::Array(RefCell::new(Vec::new()))
    }

    pub fn empty_map() -> Object {
        Object::Map(RefCell::new(HashMap::new()))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Object::String(_) => "String",
            Object::Array(_) => "Array",
            Object::Map(_) => "Map",
            Object::Instance(_) => "Struct",
            Object::Function(_) => "Function",
            Object::Closure(_) => "Closure",
            Object::Native(_) => "NativeFunction",
        }
    }
}

impl std::fmt::Display for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Object::String(s) => write!(f, "{}", s),
            Object::Array(elems) => {
                write!(f, "[")?;
                for (i, e) in elems.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, "]")
            }
            Object::Map(entries) => write!(f, "<Map of {} entries>", entries.borrow().len()),
            Object::Instance(fields) => write!(f, "<Struct of {} fields>", fields.borrow().len()),
            Object::Function(function) => write!(f, "<fn {}>", function.name),
            Object::Closure(closure) => write!(f, "<closure {}>", closure.proto.name),
            Object::Native(native) => write!(f, "<native fn {}>", native.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_covers_every_tag() {
        let function = Object::Function(Function { name: "main".into(), chunk: Chunk::new() });
        assert_eq!(function.to_string(), "<fn main>");
        assert_eq!(Object::String("hi".into()).to_string(), "hi");

        let array = Object::Array(RefCell::new(vec![Value::Int(1), Value::Int(2)]));
        assert_eq!(array.to_string(), "[1, 2]");
    }

    #[test]
    fn type_names_match_tags() {
        assert_eq!(Object::empty_map().type_name(), "Map");
        assert_eq!(Object::empty_array().type_name(), "Array");
    }
}
