//! Interactive read-eval-print loop.
//!
//! Both backends keep state alive across lines: the evaluator threads one
//! environment, the VM path threads the constant pool, globals array and
//! symbol table from each compile-and-run round to the next.

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::builtins::BUILTINS;
use crate::compiler::Compiler;
use crate::environment::global_environment;
use crate::evaluator::Evaluator;
use crate::object::Object;
use crate::symbol_table::SymbolTable;
use crate::vm::{GLOBALS_SIZE, VM};
use crate::{lexer, parser};

const PROMPT: &str = ">> ";

fn read_line(editor: &mut DefaultEditor) -> Result<Option<String>> {
    match editor.readline(PROMPT) {
        Ok(line) => Ok(Some(line)),
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn parse_line(line: &str) -> Option<crate::ast::Program> {
    let tokens = match lexer::tokenize(line) {
        Ok(tokens) => tokens,
        Err(err) => {
            println!("{err}");
            return None;
        }
    };
    match parser::parse_tokens(tokens) {
        Ok(program) => Some(program),
        Err(err) => {
            println!("{err}");
            None
        }
    }
}

fn should_exit(line: &str) -> bool {
    matches!(line.trim(), "exit" | "quit")
}

/// REPL over the tree-walking evaluator.
pub fn start_eval() -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    let env = global_environment();

    while let Some(line) = read_line(&mut editor)? {
        if should_exit(&line) {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        let Some(program) = parse_line(&line) else {
            continue;
        };

        let mut evaluator = Evaluator::new();
        let result = evaluator.eval(&program, &env);
        print!("{}", evaluator.output);
        println!("{}", result.inspect());
        let _ = editor.add_history_entry(&line);
    }
    Ok(())
}

/// REPL over the compiler and VM.
pub fn start_vm() -> Result<()> {
    let mut editor = DefaultEditor::new()?;

    let mut constants: Vec<Object> = Vec::new();
    let mut globals = vec![Object::Null; GLOBALS_SIZE];
    let mut symbol_table = SymbolTable::new();
    for (index, builtin) in BUILTINS.iter().enumerate() {
        symbol_table.define_builtin(index, builtin.name);
    }

    while let Some(line) = read_line(&mut editor)? {
        if should_exit(&line) {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        let Some(program) = parse_line(&line) else {
            continue;
        };

        let mut compiler = Compiler::with_state(symbol_table, constants);
        let compiled = compiler.compile(&program);
        let bytecode = compiler.bytecode();
        (symbol_table, constants) = compiler.into_state();
        if let Err(err) = compiled {
            println!("{err}");
            // A failure inside a function literal can leave the threaded
            // symbol table mid-scope; unwind it back to the root.
            while let Some(outer) = symbol_table.outer.take() {
                symbol_table = *outer;
            }
            continue;
        }

        let mut vm = VM::with_globals(bytecode, globals);
        match vm.run() {
            Ok(result) => {
                print!("{}", vm.output);
                println!("{}", result.inspect());
                let _ = editor.add_history_entry(&line);
            }
            Err(err) => {
                print!("{}", vm.output);
                println!("{err}");
            }
        }
        globals = vm.into_globals();
    }
    Ok(())
}
