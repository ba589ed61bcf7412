//! Native function binding.
//!
//! Natives are declared in source with an ellipsis body
//! (`fn clock() -> Int ...;`); the compiler type-checks calls against the
//! declared signature and reserves a package slot. The host binds the
//! actual callback here before running. A callback pops its `argc`
//! arguments and pushes exactly one result.

use matiria_core::object::NativeFn;
use matiria_core::package::Package;

/// Bind `callback` into the package slot `name` declared as a native.
/// Fails when no such declaration exists or the slot holds compiled code.
pub fn register_native(
    package: &mut Package,
    name: &str,
    callback: NativeFn,
) -> Result<(), String> {
    package.bind_native(name, callback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use matiria_core::error::RuntimeError;
    use matiria_core::object::Vm;
    use matiria_core::value::Value;

    fn add_two(vm: &mut dyn Vm, argc: u8) -> Result<(), RuntimeError> {
        let mut sum = 0;
        for _ in 0..argc {
            sum += vm.pop().as_int().unwrap_or(0);
        }
        vm.push(Value::Int(sum))
    }

    #[test]
    fn bound_natives_run_through_the_engine() {
        let source = "fn add2(Int a, Int b) -> Int ...; \
                      fn main() -> Int { return add2(2, 40); }";
        let mut package = matiria_compiler::compile(source).expect("compiles");
        register_native(&mut package, "add2", add_two).unwrap();

        let mut engine = Engine::new();
        assert_eq!(engine.execute(&package), 0);
        assert_eq!(engine.result().unwrap().as_int(), Some(42));
    }

    #[test]
    fn calling_an_unbound_native_is_fatal() {
        let source = "fn missing() -> Int ...; \
                      fn main() -> Int { return missing(); }";
        let package = matiria_compiler::compile(source).expect("compiles");

        let mut engine = Engine::new();
        assert_eq!(engine.execute(&package), -1);
    }

    #[test]
    fn registering_an_unknown_name_fails() {
        let mut package = matiria_compiler::compile("fn main() { }").unwrap();
        assert!(register_native(&mut package, "nope", add_two).is_err());
    }
}
