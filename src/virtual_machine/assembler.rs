//! Assembly language parser and word emitter.
//!
//! Converts human-readable assembly source into an executable [`Program`].
//! Mnemonics come from the single instruction list in
//! [`isa`](super::isa), so the assembler can never drift from the VM.
//!
//! # Syntax
//!
//! ```text
//! label:              # word offset of the next instruction
//! INSTRUCTION [operand]  # optional comment
//! ```
//!
//! - Instructions are uppercase (e.g., `IMM`, `ADD`)
//! - Operands are decimal integers (e.g., `42`, `-1`) or label names
//! - Labels resolve to absolute word offsets in the text segment
//! - Comments start with `#`
//! - A label may share a line with an instruction (`loop: JMP loop`)

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Instruction;
use crate::virtual_machine::program::Program;
use crate::virtual_machine::Word;
use std::collections::HashMap;
use std::fmt::Write;
use std::fs;
use std::path::Path;

const COMMENT_CHAR: char = '#';
const LABEL_SUFFIX: char = ':';

/// Return the line/column/message triple for assembly-related errors.
fn assembly_error_location(err: &VMError) -> Option<(usize, usize, String)> {
    match err {
        VMError::AssemblyError {
            line,
            offset,
            source,
        } => Some((*line, *offset, source.clone())),
        VMError::ParseError {
            line,
            offset,
            message,
        } => Some((*line, *offset, message.clone())),
        _ => None,
    }
}

/// Formats a compiler-style diagnostic for assembly failures.
fn render_assembly_diagnostic(
    file: &str,
    source: &str,
    line: usize,
    offset: usize,
    message: &str,
) -> String {
    let mut diag = String::new();
    let _ = writeln!(diag, "error: {message}");
    let _ = writeln!(diag, " --> {file}:{line}:{offset}");

    if let Some(raw_line) = source.lines().nth(line.saturating_sub(1)) {
        let line_text = raw_line.trim_end_matches('\r');
        let underline = " ".repeat(offset.saturating_sub(1));
        let _ = writeln!(diag, "  |");
        let _ = writeln!(diag, "{:>4} | {}", line, line_text);
        let _ = writeln!(diag, "  | {}^", underline);
    }

    diag
}

/// Emit a helpful diagnostic to stderr for assembly errors.
fn log_assembly_error(file: &str, source: &str, err: &VMError) {
    if let Some((line, offset, message)) = assembly_error_location(err) {
        eprintln!(
            "{}",
            render_assembly_diagnostic(file, source, line, offset, &message)
        );
    } else {
        eprintln!("error: {err}");
    }
}

#[derive(Debug, Clone)]
struct Token<'a> {
    text: &'a str,
    /// 1-based column offset in the line.
    offset: usize,
}

/// Tokenize a single line of assembly.
///
/// Rules:
/// - `#` starts a comment
/// - commas are ignored
/// - whitespace-separated tokens
fn tokenize(line: &str) -> Vec<Token<'_>> {
    let mut out = Vec::with_capacity(4);

    let mut start: Option<usize> = None;
    let bytes = line.as_bytes();

    for (i, &b) in bytes.iter().enumerate() {
        if b == COMMENT_CHAR as u8 {
            if let Some(s) = start.take() {
                out.push(Token {
                    text: &line[s..i],
                    offset: s + 1,
                });
            }
            return out;
        }
        match b {
            b',' | b' ' | b'\t' => {
                if let Some(s) = start.take() {
                    out.push(Token {
                        text: &line[s..i],
                        offset: s + 1,
                    });
                }
            }
            _ => {
                if start.is_none() {
                    start = Some(i);
                }
            }
        }
    }

    if let Some(s) = start {
        out.push(Token {
            text: &line[s..],
            offset: s + 1,
        });
    }

    out
}

/// Checks if a token is a label definition (ends with `:`)
fn is_label_def(tok: &str) -> bool {
    tok.ends_with(LABEL_SUFFIX) && tok.len() > 1
}

/// Extracts the label name from a label definition token.
fn label_name(tok: &str) -> &str {
    &tok[..tok.len() - 1]
}

/// Resolves an operand token: a decimal word, or a label's word offset.
fn parse_operand(tok: &str, labels: &HashMap<String, usize>) -> Result<Word, VMError> {
    if let Ok(v) = tok.parse::<Word>() {
        return Ok(v);
    }
    labels
        .get(tok)
        .map(|&offset| offset as Word)
        .ok_or(VMError::UndefinedLabel {
            label: tok.to_string(),
        })
}

/// Validates token count against the instruction's operand shape.
fn check_arity(instr: Instruction, tokens: &[Token]) -> Result<(), VMError> {
    let expected = instr.words();
    if tokens.len() < expected {
        return Err(VMError::OperandExpected {
            mnemonic: instr.mnemonic(),
        });
    }
    if tokens.len() > expected {
        return Err(VMError::UnexpectedOperand {
            mnemonic: instr.mnemonic(),
        });
    }
    Ok(())
}

/// Performs two-pass assembly.
///
/// Pass 1: tokenizes all lines, computes instruction sizes in words, and
/// records label positions as absolute word offsets.
///
/// Pass 2: parses operands with label resolution and emits text words.
fn assemble_passes(source: &str) -> Result<Program, VMError> {
    let mut labels: HashMap<String, usize> = HashMap::new();
    // (line_no, instruction, tokens) for each instruction line
    let mut parsed_lines: Vec<(usize, Instruction, Vec<Token>)> = Vec::new();
    let mut word_offset = 0usize;

    for (line_idx, line) in source.lines().enumerate() {
        let mut tokens = tokenize(line);
        if tokens.is_empty() {
            continue;
        }

        let at = |tokens: &[Token]| tokens.first().map(|t| t.offset).unwrap_or(1);

        // Leading label definitions, possibly followed by an instruction
        while let Some(first) = tokens.first() {
            if !is_label_def(first.text) {
                break;
            }
            let name = label_name(first.text).to_string();
            if labels.contains_key(&name) {
                return Err(VMError::AssemblyError {
                    line: line_idx + 1,
                    offset: first.offset,
                    source: VMError::DuplicateLabel { label: name }.to_string(),
                });
            }
            labels.insert(name, word_offset);
            tokens.remove(0);
        }

        if tokens.is_empty() {
            continue;
        }

        let instr = Instruction::from_mnemonic(tokens[0].text).map_err(|e| {
            VMError::AssemblyError {
                line: line_idx + 1,
                offset: at(&tokens),
                source: e.to_string(),
            }
        })?;
        check_arity(instr, &tokens).map_err(|e| VMError::AssemblyError {
            line: line_idx + 1,
            offset: at(&tokens),
            source: e.to_string(),
        })?;

        word_offset += instr.words();
        parsed_lines.push((line_idx + 1, instr, tokens));
    }

    // Second pass: emit words with label resolution
    let mut text = Vec::with_capacity(word_offset);
    for (line_no, instr, tokens) in parsed_lines {
        text.push(instr as Word);
        if instr.has_operand() {
            let operand_tok = &tokens[1];
            let operand = parse_operand(operand_tok.text, &labels).map_err(|e| {
                VMError::AssemblyError {
                    line: line_no,
                    offset: operand_tok.offset,
                    source: e.to_string(),
                }
            })?;
            text.push(operand);
        }
    }

    Ok(Program::new(text))
}

/// Assemble a full source string into a program.
///
/// Uses two-pass assembly:
/// 1. First pass: tokenize lines, record label word offsets
/// 2. Second pass: resolve operands and emit text words
pub fn assemble_source(source: impl AsRef<str>) -> Result<Program, VMError> {
    assemble_source_with_name(source.as_ref(), "<source>")
}

/// Assembles source with an associated filename for error diagnostics.
///
/// Logs a compiler-style diagnostic to stderr on failure, including
/// source location information.
fn assemble_source_with_name(source: &str, source_name: &str) -> Result<Program, VMError> {
    let result = assemble_passes(source);
    if let Err(err) = &result {
        log_assembly_error(source_name, source, err);
    }
    result
}

/// Convenience: assemble directly from file path
pub fn assemble_file<P: AsRef<Path>>(path: P) -> Result<Program, VMError> {
    let path_ref = path.as_ref();
    let source = fs::read_to_string(path_ref).map_err(|e| VMError::IoError {
        path: path_ref.display().to_string(),
        source: e.to_string(),
    })?;
    assemble_source_with_name(&source, &path_ref.display().to_string())
}
