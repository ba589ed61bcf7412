//! Matiria core data model
//!
//! The pieces shared between the compiler and the runtime: bytecode chunks
//! and the opcode set, runtime values and heap objects, compiled packages,
//! and the chunk disassembler. The compiler produces these, the engine
//! consumes them; neither crate depends on the other.

pub mod bytecode;
pub mod disasm;
pub mod error;
pub mod object;
pub mod package;
pub mod value;

pub use bytecode::{Chunk, OpCode};
pub use error::RuntimeError;
pub use object::{Closure, ClosureProto, Function, Native, NativeFn, Object, Vm};
pub use package::Package;
pub use value::{MapKey, Value};
