use criterion::{black_box, criterion_group, criterion_main, Criterion};

use monkey::backend::{Backend, Eval, Vm};
use monkey::compiler::Compiler;
use monkey::{lexer, parser};

const FIBONACCI: &str = "
let fibonacci = fn(x) {
  if (x < 2) {
    x
  } else {
    fibonacci(x - 1) + fibonacci(x - 2)
  }
};
puts(fibonacci(18));
";

fn bench_backends(c: &mut Criterion) {
    let tokens = lexer::tokenize(FIBONACCI).expect("tokenize fibonacci");
    let program = parser::parse_tokens(tokens.clone()).expect("parse fibonacci");

    c.bench_function("frontend_tokenize", |b| {
        b.iter(|| {
            let out = lexer::tokenize(black_box(FIBONACCI)).expect("tokenize");
            black_box(out);
        })
    });

    c.bench_function("frontend_tokenize_parse", |b| {
        b.iter(|| {
            let tokens = lexer::tokenize(black_box(FIBONACCI)).expect("tokenize");
            let out = parser::parse_tokens(tokens).expect("parse");
            black_box(out);
        })
    });

    c.bench_function("backend_vm_compile_only", |b| {
        b.iter(|| {
            let mut compiler = Compiler::new();
            compiler.compile(black_box(&program)).expect("compile");
            black_box(compiler.bytecode());
        })
    });

    c.bench_function("backend_eval_total", |b| {
        let backend = Eval;
        b.iter(|| {
            let output = backend.run(black_box(&program)).expect("run");
            black_box(output);
        })
    });

    c.bench_function("backend_vm_total", |b| {
        let backend = Vm;
        b.iter(|| {
            let output = backend.run(black_box(&program)).expect("run");
            black_box(output);
        })
    });

    c.bench_function("backend_vm_exec_only", |b| {
        let backend = Vm;
        let prepared = backend.prepare(&program).expect("prepare");
        b.iter(|| {
            let output = prepared.run().expect("run");
            black_box(output);
        })
    });
}

criterion_group!(benches, bench_backends);
criterion_main!(benches);
