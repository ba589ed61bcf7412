//! End-to-end execution: compile source, run it, check the exit code and
//! the value `main` leaves behind.

use matiria_compiler::compile;
use matiria_core::value::Value;
use matiria_runtime::Engine;

fn run_for_result(source: &str) -> Value {
    let package = compile(source).expect("program compiles");
    let mut engine = Engine::new();
    assert_eq!(engine.execute(&package), 0, "program exits cleanly");
    engine.result().expect("main leaves a result").clone()
}

fn run_int(source: &str) -> i64 {
    run_for_result(source).as_int().expect("integer result")
}

#[test]
fn arithmetic_precedence() {
    assert_eq!(run_int("fn main() -> Int { return 2 + 3 * 4; }"), 14);
}

#[test]
fn recursive_factorial() {
    let source = "fn fact(Int n) -> Int { \
                    if n < 2: return 1; \
                    return n * fact(n - 1); \
                  } \
                  fn main() -> Int { return fact(5); }";
    assert_eq!(run_int(source), 120);
}

#[test]
fn array_literals_and_element_assignment() {
    let source = "fn main() -> Int { \
                    [Int] xs := [1, 2, 3]; \
                    xs[1] := 9; \
                    return xs[0] + xs[1] + xs[2]; \
                  }";
    assert_eq!(run_int(source), 13);
}

#[test]
fn struct_fields_through_the_default_constructor() {
    let source = "type P := { Int x, Int y } \
                  fn main() -> Int { \
                    P p; \
                    p.x := 3; \
                    p.y := 4; \
                    return p.x * p.x + p.y * p.y; \
                  }";
    assert_eq!(run_int(source), 25);
}

#[test]
fn closures_capture_locals() {
    let source = "fn make_adder(Int k) -> (Int) -> Int { \
                    return fn add(Int x) -> Int := x + k; \
                  } \
                  fn main() -> Int { \
                    (Int) -> Int a := make_adder(10); \
                    return a(5); \
                  }";
    assert_eq!(run_int(source), 15);
}

#[test]
fn while_loops_rerun_their_condition() {
    let source = "fn main() -> Int { \
                    Int x := 1; \
                    while x < 100: x := x * 2; \
                    return x; \
                  }";
    assert_eq!(run_int(source), 128);
}

#[test]
fn float_arithmetic_keeps_its_kind() {
    let result = run_for_result("fn main() -> Float { return 1.5 + 2.25; }");
    assert_eq!(result.as_float(), Some(3.75));
}

#[test]
fn short_circuit_skips_the_right_operand() {
    // dividing by zero would be fatal; && must never evaluate it
    let source = "fn main() -> Int { \
                    Int x := 0; \
                    if x = 1 && 1 / x: return 1; \
                    return 2; \
                  }";
    assert_eq!(run_int(source), 2);
}

#[test]
fn map_literals_look_up_values() {
    let source = "fn main() -> Int { \
                    [Int, Int] m := { 1 : 10, 2 : 20 }; \
                    m[3] := 30; \
                    return m[1] + m[2] + m[3]; \
                  }";
    assert_eq!(run_int(source), 60);
}

#[test]
fn scopes_pop_their_locals() {
    let source = "fn main() -> Int { \
                    Int a := 1; \
                    { Int b := 10; a := a + b; } \
                    Int c := 100; \
                    return a + c; \
                  }";
    assert_eq!(run_int(source), 111);
}

#[test]
fn struct_values_flow_through_calls() {
    let source = "type P := { Int x, Int y } \
                  fn sum(P p) -> Int { return p.x + p.y; } \
                  fn main() -> Int { \
                    P p; \
                    p.x := 30; \
                    p.y := 12; \
                    return sum(p); \
                  }";
    assert_eq!(run_int(source), 42);
}

#[test]
fn out_of_bounds_is_a_fatal_runtime_error() {
    let source = "fn main() -> Int { [Int] xs := [1]; return xs[5]; }";
    let package = compile(source).expect("compiles");
    let mut engine = Engine::new();
    assert_eq!(engine.execute(&package), -1);
}

#[test]
fn stack_overflow_from_runaway_recursion() {
    let source = "fn loop_forever(Int n) -> Int { return loop_forever(n + 1); } \
                  fn main() -> Int { return loop_forever(0); }";
    let package = compile(source).expect("compiles");
    let mut engine = Engine::with_capacity(128);
    assert_eq!(engine.execute(&package), -1);
}

#[test]
fn else_branches_run_when_the_condition_fails() {
    let source = "fn main() -> Int { \
                    Int x := 0; \
                    if x: return 1; \
                    else { x := 7; } \
                    return x; \
                  }";
    assert_eq!(run_int(source), 7);
}

#[test]
fn unions_hold_any_variant_at_runtime() {
    let source = "type Number := [ Int | Float ] \
                  fn main() -> Int { \
                    Number n := 41; \
                    n := 42; \
                    return 0; \
                  }";
    assert_eq!(run_int(source), 0);
}

#[test]
fn booleans_and_comparison_chains() {
    let source = "fn main() -> Int { \
                    Bool ok := true; \
                    if ok: { if 3 > 2 && 2 > 1: return 1; } \
                    return 0; \
                  }";
    assert_eq!(run_int(source), 1);
}

#[test]
fn closures_mutate_their_captured_copies() {
    let source = "fn counter() -> (Int) -> Int { \
                    Int c := 0; \
                    fn bump(Int by) -> Int { c := c + by; return c; } \
                    return bump; \
                  } \
                  fn main() -> Int { \
                    (Int) -> Int bump := counter(); \
                    bump(2); \
                    return bump(40); \
                  }";
    assert_eq!(run_int(source), 42);
}

#[test]
fn nested_closures_reach_the_outermost_frame() {
    let source = "fn outer() -> Int { \
                    Int a := 40; \
                    fn mid() -> Int { \
                      fn inner() -> Int := a + 2; \
                      return inner(); \
                    } \
                    return mid(); \
                  } \
                  fn main() -> Int { return outer(); }";
    assert_eq!(run_int(source), 42);
}
