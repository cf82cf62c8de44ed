mod common;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use orion::codegen::CodeGenerator;
use orion::target::{Target, TargetPlatform};
use orion::{lexer, parser};

fn bench_frontend(c: &mut Criterion) {
    for (label, path) in common::workloads() {
        let source = common::load_source(path);
        let program = common::load_program(path);

        c.bench_function(&format!("frontend_tokenize_{label}"), |b| {
            b.iter(|| {
                let out = lexer::tokenize(black_box(&source)).expect("tokenize");
                black_box(out);
            })
        });

        c.bench_function(&format!("frontend_tokenize_parse_{label}"), |b| {
            b.iter(|| {
                let tokens = lexer::tokenize(black_box(&source)).expect("tokenize");
                let out = parser::parse_tokens(tokens).expect("parse");
                black_box(out);
            })
        });

        c.bench_function(&format!("backend_generate_{label}"), |b| {
            let target = Target::for_platform(TargetPlatform::Linux);
            b.iter(|| {
                let out = CodeGenerator::new(target.clone()).generate(black_box(&program));
                black_box(out);
            })
        });

        c.bench_function(&format!("compile_{label}"), |b| {
            let target = Target::for_platform(TargetPlatform::Linux);
            b.iter(|| {
                let out = orion::compile(black_box(&source), &target).expect("compile");
                black_box(out);
            })
        });
    }
}

criterion_group!(benches, bench_frontend);
criterion_main!(benches);
