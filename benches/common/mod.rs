#![allow(dead_code)]
use std::fs;

use orion::ast::Program;
use orion::{lexer, parser};

pub const WORKLOADS: [(&str, &str); 2] = [
    ("recursion", "tests/programs/recursion/program.or"),
    ("control_flow", "tests/programs/control_flow/program.or"),
];

pub fn workloads() -> Vec<(&'static str, &'static str)> {
    WORKLOADS.to_vec()
}

pub fn load_source(path: &str) -> String {
    fs::read_to_string(path).unwrap_or_else(|err| panic!("read {path}: {err}"))
}

pub fn load_program(path: &str) -> Program {
    let source = load_source(path);
    let tokens = lexer::tokenize(&source).unwrap_or_else(|err| panic!("tokenize {path}: {err}"));
    parser::parse_tokens(tokens).unwrap_or_else(|err| panic!("parse {path}: {err}"))
}
