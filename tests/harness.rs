use std::fs;
use std::path::Path;

use anyhow::{ensure, Context, Result};

use monkey::backend::Backend;
use monkey::compiler::Compiler;
use monkey::environment::global_environment;
use monkey::evaluator::Evaluator;
use monkey::fixtures::{self, CaseClass};
use monkey::object::Object;
use monkey::vm::VM;
use monkey::{lexer, parser};

fn normalize_output(output: &str) -> String {
    output.replace("\r\n", "\n").trim_end().to_string()
}

fn run_programs_for_backend(backend: &dyn Backend) -> Result<()> {
    let cases = fixtures::load_cases(Path::new("tests/programs"))?;

    for case in cases {
        let source = fs::read_to_string(&case.program_path)
            .with_context(|| format!("Reading {}", case.name))?;
        let tokenized = lexer::tokenize(&source);

        match case.spec.class {
            CaseClass::RuntimeSuccess => {
                let stdout_file = case
                    .spec
                    .expected
                    .stdout_file
                    .as_deref()
                    .with_context(|| format!("Missing stdout_file in {}", case.name))?;
                let expected = case.read_text(stdout_file)?;
                let tokens = tokenized.with_context(|| format!("Tokenizing {}", case.name))?;
                let program = parser::parse_tokens(tokens)
                    .with_context(|| format!("Parsing {}", case.name))?;
                let output = backend.run(&program).with_context(|| {
                    format!("Backend {} failed for {}", backend.name(), case.name)
                })?;
                assert_eq!(
                    normalize_output(&output),
                    normalize_output(&expected),
                    "Backend {} mismatch for {}",
                    backend.name(),
                    case.name
                );
            }
            CaseClass::FrontendError => {
                let expected_file = case
                    .spec
                    .expected
                    .error_contains_file
                    .as_deref()
                    .with_context(|| format!("Missing error expectation file in {}", case.name))?;
                let expected_error = case.read_text(expected_file)?;
                let expected_error = expected_error.trim();
                let message = match tokenized {
                    Err(error) => error.to_string(),
                    Ok(tokens) => {
                        let parse_result = parser::parse_tokens(tokens);
                        ensure!(
                            parse_result.is_err(),
                            "Expected frontend error in {}, but parsing succeeded",
                            case.name
                        );
                        parse_result
                            .expect_err("parse_result checked as err")
                            .to_string()
                    }
                };
                ensure!(
                    message.contains(expected_error),
                    "Expected frontend error containing '{expected_error}' in {}, got '{message}'",
                    case.name
                );
            }
            CaseClass::RuntimeError => {
                let expected_file = case
                    .spec
                    .expected
                    .error_contains_file
                    .as_deref()
                    .with_context(|| format!("Missing error expectation file in {}", case.name))?;
                let expected_error = case.read_text(expected_file)?;
                let expected_error = expected_error.trim();
                let tokens = tokenized.with_context(|| format!("Tokenizing {}", case.name))?;
                let program = parser::parse_tokens(tokens)
                    .with_context(|| format!("Parsing {}", case.name))?;
                let result = backend.run(&program);
                ensure!(
                    result.is_err(),
                    "Expected runtime error for backend {} in {}",
                    backend.name(),
                    case.name
                );
                let message = result.expect_err("result checked as err").to_string();
                ensure!(
                    message.contains(expected_error),
                    "Expected runtime error containing '{expected_error}' in {}, got '{message}'",
                    case.name
                );
            }
        }
    }

    Ok(())
}

#[test]
fn runs_programs_eval_backend() -> Result<()> {
    run_programs_for_backend(&monkey::backend::Eval)
}

#[test]
fn runs_programs_vm_backend() -> Result<()> {
    run_programs_for_backend(&monkey::backend::Vm)
}

fn eval_result(input: &str) -> Object {
    let tokens = lexer::tokenize(input).expect("tokenize should succeed");
    let program = parser::parse_tokens(tokens).expect("parse should succeed");
    let env = global_environment();
    Evaluator::new().eval(&program, &env)
}

fn vm_result(input: &str) -> Object {
    let tokens = lexer::tokenize(input).expect("tokenize should succeed");
    let program = parser::parse_tokens(tokens).expect("parse should succeed");
    let mut compiler = Compiler::new();
    compiler.compile(&program).expect("compile should succeed");
    let mut vm = VM::new(compiler.bytecode());
    match vm.run() {
        Ok(value) => value,
        Err(err) => Object::Error(err.to_string()),
    }
}

/// Value-producing programs must yield structurally equal results under
/// both backends.
#[test]
fn backends_agree_on_scenario_results() {
    let scenarios = [
        ("(5 + 10 * 2 + 15 / 3) * 2 + -10", "50"),
        (
            "let newAdder = fn(x) { fn(y) { x + y } }; newAdder(2)(3)",
            "5",
        ),
        (
            "let count = fn(x) { if (x == 0) { return 0 } else { count(x - 1) } }; count(3)",
            "0",
        ),
        (
            r#"{ "one": 1, "two": 2 }["one"] + { 1: 10 }[1]"#,
            "11",
        ),
        ("let a = [1,2,3]; push(a, 4); len(a)", "3"),
        ("if (false) {10}", "null"),
        ("[1, 2, 3][-1]", "null"),
        ("[1, 2, 3][3]", "null"),
        (r#"{}["missing"]"#, "null"),
        ("if (0) { 1 } else { 2 }", "1"),
        (r#""Hello" + " " + "World!""#, "Hello World!"),
        ("!null", "true"),
        ("return 10; 9;", "10"),
    ];

    for (input, expected) in scenarios {
        let eval_value = eval_result(input);
        let vm_value = vm_result(input);
        assert_eq!(eval_value.inspect(), expected, "evaluator on {input}");
        assert_eq!(vm_value.inspect(), expected, "vm on {input}");
    }
}

#[test]
fn vm_enforces_arity_where_the_evaluator_ignores_extras() {
    let input = "fn(a){a}(1,2)";

    match eval_result(input) {
        Object::Integer(value) => assert_eq!(value, 1),
        other => panic!("expected evaluator to ignore the extra argument, got {other:?}"),
    }

    match vm_result(input) {
        Object::Error(message) => {
            assert_eq!(message, "wrong number of arguments: want=1, got=2")
        }
        other => panic!("expected vm arity error, got {other:?}"),
    }
}
