use std::fs;
use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result, bail};
use orion::CompileError;
use orion::target::{Target, TargetPlatform};

const USAGE: &str = "Usage: orion <input.or> [-o <output>] [--target linux|macos|windows] [--emit-asm]";

fn main() {
    let code = match run() {
        Ok(()) => 0,
        Err(error) => {
            eprintln!("{error:#}");
            if error.is::<CompileError>() { 1 } else { 2 }
        }
    };
    std::process::exit(code);
}

fn run() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let mut platform = TargetPlatform::detect_host();
    let mut output: Option<String> = None;
    let mut emit_asm_only = false;
    let mut input_path: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-o" => {
                output = Some(
                    args.next()
                        .ok_or_else(|| anyhow::anyhow!("Missing output path after -o"))?,
                );
            }
            "--target" | "-t" => {
                let name = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("Missing target name after {arg}"))?;
                platform = TargetPlatform::from_name(&name)
                    .ok_or_else(|| anyhow::anyhow!("Unknown target '{name}'"))?;
            }
            "--emit-asm" => {
                emit_asm_only = true;
            }
            _ => {
                input_path = Some(arg);
                if args.next().is_some() {
                    bail!("Only one input file is supported");
                }
                break;
            }
        }
    }

    let Some(input_path) = input_path else {
        bail!("{USAGE}");
    };
    let source =
        fs::read_to_string(&input_path).with_context(|| format!("Reading {input_path}"))?;

    let target = Target::for_platform(platform);
    let assembly = orion::compile(&source, &target)?;

    let stem = PathBuf::from(&input_path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".to_string());

    if emit_asm_only {
        let asm_path = output.unwrap_or_else(|| format!("{stem}.s"));
        fs::write(&asm_path, assembly).with_context(|| format!("Writing {asm_path}"))?;
        return Ok(());
    }

    let asm_path = format!("{stem}.s");
    fs::write(&asm_path, assembly).with_context(|| format!("Writing {asm_path}"))?;

    let exe_path = output.unwrap_or_else(|| format!("{stem}{}", target.exe_suffix));
    let command_line = target.link_invocation(&asm_path, &exe_path);
    let mut parts = command_line.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty link command for target {}", platform.name()))?;
    let status = Command::new(program)
        .args(parts)
        .status()
        .with_context(|| format!("Running '{command_line}'"))?;
    if !status.success() {
        bail!("Link step failed: '{command_line}'");
    }
    Ok(())
}
