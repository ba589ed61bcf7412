//! Matiria runtime
//!
//! Executes the packages produced by `matiria-compiler`: a single-threaded
//! stack VM with host-stack call recursion, plus the native-function
//! binding hook. One compilation and one run proceed sequentially; distinct
//! packages are independent.

pub mod engine;
pub mod natives;

pub use engine::{DEFAULT_STACK_CAPACITY, Engine};
pub use natives::register_native;

use matiria_core::package::Package;

/// Run a package to completion. Exit code 0 on success, -1 on a missing
/// `main` or a fatal runtime error.
pub fn run(package: &Package) -> i32 {
    Engine::new().execute(package)
}
