use anyhow::{bail, Result};

use crate::ast::Program;
use crate::compiler::Compiler;
use crate::environment::global_environment;
use crate::evaluator::Evaluator;
use crate::object::Object;
use crate::vm::VM;

/// Executable artifact produced by a backend `prepare` step.
///
/// This keeps compilation and execution separated so benchmarks and tests can
/// measure/validate prepare-vs-run phases independently.
pub trait PreparedBackend {
    /// Runs the program and returns everything `puts` wrote. A program whose
    /// result is an Error value fails with that message.
    fn run(&self) -> Result<String>;
}

/// Common interface implemented by each execution backend.
///
/// `prepare` translates the AST into backend-owned executable state, while
/// `run` offers the convenience path for one-shot execution.
pub trait Backend {
    fn name(&self) -> &'static str;
    fn prepare(&self, program: &Program) -> Result<Box<dyn PreparedBackend>>;

    fn run(&self, program: &Program) -> Result<String> {
        self.prepare(program)?.run()
    }
}

pub fn backends() -> Vec<Box<dyn Backend>> {
    vec![Box::new(Eval), Box::new(Vm)]
}

/// Tree-walking backend.
pub struct Eval;

struct PreparedEval {
    program: Program,
}

impl Backend for Eval {
    fn name(&self) -> &'static str {
        "eval"
    }

    fn prepare(&self, program: &Program) -> Result<Box<dyn PreparedBackend>> {
        Ok(Box::new(PreparedEval {
            program: program.clone(),
        }))
    }
}

impl PreparedBackend for PreparedEval {
    fn run(&self) -> Result<String> {
        let env = global_environment();
        let mut evaluator = Evaluator::new();
        match evaluator.eval(&self.program, &env) {
            Object::Error(message) => bail!(message),
            _ => Ok(evaluator.output),
        }
    }
}

/// Compile-then-execute backend.
pub struct Vm;

struct PreparedVm {
    bytecode: crate::compiler::Bytecode,
}

impl Backend for Vm {
    fn name(&self) -> &'static str {
        "vm"
    }

    fn prepare(&self, program: &Program) -> Result<Box<dyn PreparedBackend>> {
        let mut compiler = Compiler::new();
        compiler.compile(program)?;
        Ok(Box::new(PreparedVm {
            bytecode: compiler.bytecode(),
        }))
    }
}

impl PreparedBackend for PreparedVm {
    fn run(&self) -> Result<String> {
        let mut vm = VM::new(self.bytecode.clone());
        match vm.run() {
            Ok(Object::Error(message)) => bail!(message),
            Ok(_) => Ok(vm.output),
            Err(err) => bail!(err.to_string()),
        }
    }
}
