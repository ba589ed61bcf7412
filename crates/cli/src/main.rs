//! Matiria CLI
//!
//! Host binary for compiling and running .mtr programs: `run` executes,
//! `check` stops after validation, `disasm` prints the emitted bytecode.
//! The standard natives (currently just `print`) are registered here; the
//! compiler and runtime crates stay host-agnostic.

mod config;

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{Shell, generate};
use config::Config;
use matiria_core::error::RuntimeError;
use matiria_core::object::Vm;
use matiria_core::package::Package;
use matiria_core::value::Value;
use matiria_core::{Object, disasm};
use matiria_runtime::{DEFAULT_STACK_CAPACITY, Engine, register_native};
use std::io;
use std::path::{Path, PathBuf};
use std::process;

#[derive(ClapParser)]
#[command(name = "mtr")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Matiria - compile and run .mtr programs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and run a .mtr program
    Run {
        /// Input .mtr source file
        input: PathBuf,

        /// Value stack capacity in slots (overrides mtr.toml)
        #[arg(long)]
        stack_capacity: Option<usize>,

        /// Trace the value stack at every instruction dispatch
        #[arg(long)]
        trace_stack: bool,
    },

    /// Compile a .mtr program without running it
    Check {
        /// Input .mtr source file
        input: PathBuf,
    },

    /// Print the bytecode of every callable in a .mtr program
    Disasm {
        /// Input .mtr source file
        input: PathBuf,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Run { input, stack_capacity, trace_stack } => {
            run(&input, stack_capacity, trace_stack)
        }
        Commands::Check { input } => check(&input),
        Commands::Disasm { input } => disassemble(&input),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
            0
        }
    };

    process::exit(code);
}

fn init_tracing(config: &Config, trace_stack: bool) {
    use tracing_subscriber::EnvFilter;

    // --trace-stack needs the runtime's trace events to pass the filter;
    // an explicit RUST_LOG still wins
    let fallback = if trace_stack {
        "matiria_runtime=trace".to_string()
    } else {
        config.run.log.clone().unwrap_or_else(|| "warn".to_string())
    };
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(env) => EnvFilter::new(env),
        Err(_) => EnvFilter::new(fallback),
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

fn compile_file(input: &Path) -> Result<Package, i32> {
    let source = match std::fs::read_to_string(input) {
        Ok(source) => source,
        Err(error) => {
            eprintln!("Failed to read {}: {}", input.display(), error);
            return Err(1);
        }
    };

    match matiria_compiler::compile(&source) {
        Ok(package) => Ok(package),
        Err(error) => {
            eprint!("{}", error.report());
            Err(1)
        }
    }
}

fn run(input: &Path, stack_capacity: Option<usize>, trace_stack: bool) -> i32 {
    let config = match Config::load_for(input) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("{}", error);
            return 1;
        }
    };
    init_tracing(&config, trace_stack);
    tracing::debug!(?config, input = %input.display(), "host configuration");

    let mut package = match compile_file(input) {
        Ok(package) => package,
        Err(code) => return code,
    };

    // bind the standard natives; programs that never declare them simply
    // have no slot to fill
    register_native(&mut package, "print", native_print).ok();

    if config.run.disassemble {
        print_package(&package);
    }

    let capacity = stack_capacity
        .or(config.run.stack_capacity)
        .unwrap_or(DEFAULT_STACK_CAPACITY);
    let mut engine = Engine::with_capacity(capacity);
    engine.set_trace_stack(trace_stack);
    engine.execute(&package)
}

fn check(input: &Path) -> i32 {
    match compile_file(input) {
        Ok(_) => {
            println!("{}: ok", input.display());
            0
        }
        Err(code) => code,
    }
}

fn disassemble(input: &Path) -> i32 {
    match compile_file(input) {
        Ok(package) => {
            print_package(&package);
            0
        }
        Err(code) => code,
    }
}

fn print_package(package: &Package) {
    for (name, object) in package.iter_named() {
        match object {
            Some(object) => {
                if let Object::Function(function) = &**object {
                    print!("{}", disasm::disassemble(&function.chunk, name));
                    for proto in &function.chunk.protos {
                        print!("{}", disasm::disassemble(&proto.chunk, &proto.name));
                    }
                }
            }
            None => println!("====== {} ======= (native)", name),
        }
    }
}

/// `fn print(Any value) ...;` - renders its arguments space-separated on
/// one line and returns nil.
fn native_print(vm: &mut dyn Vm, argc: u8) -> Result<(), RuntimeError> {
    let mut args = Vec::with_capacity(argc as usize);
    for _ in 0..argc {
        args.push(vm.pop());
    }
    args.reverse();

    let rendered: Vec<String> = args.iter().map(Value::to_string).collect();
    println!("{}", rendered.join(" "));

    vm.push(Value::Nil)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_program(dir: &tempfile::TempDir, text: &str) -> PathBuf {
        let path = dir.path().join("program.mtr");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(text.as_bytes()).unwrap();
        path
    }

    #[test]
    fn compile_file_surfaces_success_and_failure() {
        let dir = tempfile::tempdir().unwrap();

        let good = write_program(&dir, "fn main() -> Int { return 0; }");
        assert!(compile_file(&good).is_ok());

        let bad_path = dir.path().join("broken.mtr");
        std::fs::write(&bad_path, "fn main( {").unwrap();
        assert_eq!(compile_file(&bad_path).unwrap_err(), 1);
    }

    #[test]
    fn print_native_consumes_arguments_and_returns_nil() {
        let source = "fn print(Any value) ...; \
                      fn main() -> Int { print('hi'); return 0; }";
        let mut package = matiria_compiler::compile(source).unwrap();
        register_native(&mut package, "print", native_print).unwrap();

        let mut engine = Engine::new();
        assert_eq!(engine.execute(&package), 0);
        assert_eq!(engine.result().unwrap().as_int(), Some(0));
    }

    #[test]
    fn run_propagates_the_engine_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let ok = write_program(&dir, "fn main() -> Int { return 0; }");
        assert_eq!(run(&ok, None, false), 0);
    }
}
