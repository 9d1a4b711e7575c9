//! Command-line front end for the minic toolchain.
//!
//! # Usage
//! ```text
//! minic <COMMAND> [OPTIONS]
//! ```
//!
//! # Commands
//! - `asm <input.s>`: assemble a source file into a binary program
//! - `run <program.bin>`: execute a binary program, exiting with its exit code
//! - `lex <input.c>`: tokenize a C source file and print the token stream
//!
//! # Options
//! - `asm`: `-o, --output <file>` output path (defaults to `<input>.bin`)
//! - `run`: `--poolsize <bytes>` stack/data pool size, `--trace` per-instruction logging

use minic::lexer;
use minic::virtual_machine::assembler::assemble_file;
use minic::virtual_machine::errors::VMError;
use minic::virtual_machine::program::Program;
use minic::virtual_machine::vm::Vm;
use minic::virtual_machine::{VmConfig, DEFAULT_POOLSIZE};
use minic::{error, info};
use std::env;
use std::fs;
use std::path::Path;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(&args[0]);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    match args[1].as_str() {
        "asm" => cmd_asm(&args),
        "run" => cmd_run(&args),
        "lex" => cmd_lex(&args),
        other => {
            error!("Unknown command: {other}");
            print_usage(&args[0]);
            process::exit(1);
        }
    }
}

fn cmd_asm(args: &[String]) {
    if args.len() < 3 {
        error!("asm requires an input file");
        process::exit(1);
    }
    let input = &args[2];
    let mut output: Option<String> = None;

    let mut i = 3;
    while i < args.len() {
        match args[i].as_str() {
            k @ ("--output" | "-o") => {
                i += 1;
                if i >= args.len() {
                    error!("{k} requires an argument");
                    process::exit(1);
                }
                output = Some(args[i].clone());
                i += 1;
            }
            other => {
                error!("Unexpected argument: {other}");
                process::exit(1);
            }
        }
    }

    // Assembly failures already print a source diagnostic
    let program = match assemble_file(input) {
        Ok(p) => p,
        Err(e @ VMError::IoError { .. }) => {
            error!("{e}");
            process::exit(1);
        }
        Err(_) => process::exit(1),
    };

    let out_path = output.unwrap_or_else(|| {
        Path::new(input)
            .with_extension("bin")
            .to_string_lossy()
            .into_owned()
    });
    if let Err(e) = fs::write(&out_path, program.to_bytes()) {
        error!("Failed to write {out_path}: {e}");
        process::exit(1);
    }
    info!("Assembled {input} ({} words) -> {out_path}", program.len());
}

fn cmd_run(args: &[String]) {
    if args.len() < 3 {
        error!("run requires a program file");
        process::exit(1);
    }
    let input = &args[2];
    let mut config = VmConfig::default();

    let mut i = 3;
    while i < args.len() {
        match args[i].as_str() {
            "--poolsize" => {
                i += 1;
                if i >= args.len() {
                    error!("--poolsize requires an argument");
                    process::exit(1);
                }
                config.poolsize = args[i].parse().unwrap_or_else(|_| {
                    error!("Invalid pool size: '{}' is not a valid byte count", args[i]);
                    process::exit(1);
                });
                if config.poolsize == 0 {
                    error!("Pool size must be greater than 0 (default {DEFAULT_POOLSIZE})");
                    process::exit(1);
                }
                i += 1;
            }
            "--trace" => {
                config.trace = true;
                i += 1;
            }
            other => {
                error!("Unexpected argument: {other}");
                process::exit(1);
            }
        }
    }

    let bytes = match fs::read(input) {
        Ok(b) => b,
        Err(e) => {
            error!("Failed to read {input}: {e}");
            process::exit(1);
        }
    };
    let program = match Program::from_bytes(&bytes) {
        Ok(p) => p,
        Err(e) => {
            error!("Failed to load {input}: {e}");
            process::exit(1);
        }
    };

    match Vm::with_config(program, config).run() {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    }
}

fn cmd_lex(args: &[String]) {
    if args.len() < 3 {
        error!("lex requires an input file");
        process::exit(1);
    }
    let input = &args[2];

    let source = match fs::read_to_string(input) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to read {input}: {e}");
            process::exit(1);
        }
    };

    match lexer::tokenize(&source) {
        Ok(tokens) => {
            for token in &tokens {
                println!(
                    "{:>3}:{:<4}{:<12}{:?}",
                    token.line,
                    token.column,
                    format!("{:?}", token.kind),
                    token.text
                );
            }
        }
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    }
}

const USAGE: &str = "\
minic toolchain

USAGE:
    {program} <COMMAND> [OPTIONS]

COMMANDS:
    asm <input.s>        Assemble a source file into a binary program
    run <program.bin>    Execute a binary program
    lex <input.c>        Tokenize a C source file and print the token stream

OPTIONS (asm):
    -o, --output <file>  Output path (defaults to <input>.bin)

OPTIONS (run):
    --poolsize <bytes>   Stack and data pool size (default 262144)
    --trace              Log every executed instruction

    -h, --help           Print this help message

EXAMPLES:
    # Assemble and run a program
    {program} asm fib.s -o fib.bin
    {program} run fib.bin

    # Single step sizing for small test programs
    {program} run fib.bin --poolsize 4096 --trace
";

/// Prints usage information to stderr.
fn print_usage(program: &str) {
    eprintln!("{}", USAGE.replace("{program}", program));
}
