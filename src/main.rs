use std::fs;

use anyhow::{bail, Context, Result};
use monkey::backend::{backends, Backend};
use monkey::{lexer, parser, repl};

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let mut backend_name = "eval".to_string();
    let mut print_ast = false;
    let mut script_paths = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--backend" | "-b" => {
                backend_name = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("Missing backend name after {arg}"))?;
            }
            "--ast" => {
                print_ast = true;
            }
            _ => {
                script_paths.push(arg);
            }
        }
    }

    if script_paths.is_empty() {
        return match backend_name.as_str() {
            "eval" => repl::start_eval(),
            "vm" => repl::start_vm(),
            other => bail!("Unknown backend '{other}'"),
        };
    }

    let backend = find_backend(&backend_name)?;
    for path in &script_paths {
        let source = fs::read_to_string(path).with_context(|| format!("Reading {path}"))?;
        let tokens = lexer::tokenize(&source).with_context(|| format!("Tokenizing {path}"))?;
        let program =
            parser::parse_tokens(tokens).with_context(|| format!("Parsing {path}"))?;

        if print_ast {
            println!("{program:#?}");
        }

        match backend.run(&program) {
            Ok(output) => {
                if !output.is_empty() {
                    print!("{output}");
                }
            }
            Err(err) => {
                eprintln!("ERROR: {err}");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn find_backend(name: &str) -> Result<Box<dyn Backend>> {
    for backend in backends() {
        if backend.name() == name {
            return Ok(backend);
        }
    }
    bail!("Unknown backend '{name}'")
}
