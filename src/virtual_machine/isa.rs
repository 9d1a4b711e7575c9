//! Instruction Set Architecture (ISA) definitions.
//!
//! Defines the VM's instruction set. The [`for_each_instruction!`](crate::for_each_instruction)
//! macro holds the canonical instruction definitions and invokes a callback
//! macro for code generation, so the enum, the opcode decoder, and the
//! assembler's mnemonic tables all come from a single list.
//!
//! This module generates:
//! - The [`Instruction`] enum with opcode mappings
//! - `TryFrom<Word>` for decoding opcodes
//! - Mnemonic lookup in both directions and operand-shape queries
//!
//! # Bytecode Format
//!
//! Instructions are word-oriented:
//! - Opcode: 1 word
//! - Operand (`Imm` instructions only): 1 inline word following the opcode

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::Word;

/// Invokes a callback macro with the complete instruction definition list.
///
/// Each row gives the variant name, opcode value, assembly mnemonic, and
/// operand shape (`Imm` = one inline operand word, `None` = opcode only).
#[macro_export]
macro_rules! for_each_instruction {
    ($callback:ident) => {
        $callback! {
            // =========================
            // Addressing and immediates
            // =========================
            /// LEA imm ; ax = address of the frame slot at bp + imm
            Lea = 0, "LEA" => Imm,
            /// IMM imm ; ax = imm
            Imm = 1, "IMM" => Imm,
            // =========================
            // Control flow
            // =========================
            /// JMP target ; pc = target
            Jmp = 2, "JMP" => Imm,
            /// CALL target ; push return pc, pc = target
            Call = 3, "CALL" => Imm,
            /// JZ target ; if ax == 0 then pc = target
            Jz = 4, "JZ" => Imm,
            /// JNZ target ; if ax != 0 then pc = target
            Jnz = 5, "JNZ" => Imm,
            /// ENT n ; push bp, bp = sp, reserve n local words
            Ent = 6, "ENT" => Imm,
            /// ADJ n ; pop n argument words
            Adj = 7, "ADJ" => Imm,
            /// LEV ; sp = bp, restore bp, pop return pc
            Lev = 8, "LEV" => None,
            // =========================
            // Loads and stores
            // =========================
            /// LI ; ax = word at data[ax]
            Li = 9, "LI" => None,
            /// LC ; ax = byte at data[ax]
            Lc = 10, "LC" => None,
            /// SI ; word at data[pop()] = ax
            Si = 11, "SI" => None,
            /// SC ; byte at data[pop()] = ax & 0xff
            Sc = 12, "SC" => None,
            /// PUSH ; push ax
            Push = 13, "PUSH" => None,
            // =========================
            // ALU (left operand popped, right operand in ax)
            // =========================
            /// OR ; ax = pop() | ax
            Or = 14, "OR" => None,
            /// XOR ; ax = pop() ^ ax
            Xor = 15, "XOR" => None,
            /// AND ; ax = pop() & ax
            And = 16, "AND" => None,
            /// EQ ; ax = (pop() == ax)
            Eq = 17, "EQ" => None,
            /// NE ; ax = (pop() != ax)
            Ne = 18, "NE" => None,
            /// LT ; ax = (pop() < ax)
            Lt = 19, "LT" => None,
            /// GT ; ax = (pop() > ax)
            Gt = 20, "GT" => None,
            /// LE ; ax = (pop() <= ax)
            Le = 21, "LE" => None,
            /// GE ; ax = (pop() >= ax)
            Ge = 22, "GE" => None,
            /// SHL ; ax = pop() << ax
            Shl = 23, "SHL" => None,
            /// SHR ; ax = pop() >> ax (arithmetic)
            Shr = 24, "SHR" => None,
            /// ADD ; ax = pop() + ax
            Add = 25, "ADD" => None,
            /// SUB ; ax = pop() - ax
            Sub = 26, "SUB" => None,
            /// MUL ; ax = pop() * ax
            Mul = 27, "MUL" => None,
            /// DIV ; ax = pop() / ax (floor, trap on zero)
            Div = 28, "DIV" => None,
            /// MOD ; ax = pop() % ax (floor, trap on zero)
            Mod = 29, "MOD" => None,
            // =========================
            // Syscall traps
            // =========================
            /// OPEN ; ax = open(path @ sp+1, mode @ sp)
            Open = 30, "OPEN" => None,
            /// READ ; ax = read(fd @ sp+2, buf @ sp+1, count @ sp)
            Read = 31, "READ" => None,
            /// CLOS ; ax = close(fd @ sp)
            Clos = 32, "CLOS" => None,
            /// PRTF ; ax = printf(fmt @ sp, args @ sp+1..)
            Prtf = 33, "PRTF" => None,
            /// MALC ; ax = malloc(size @ sp)
            Malc = 34, "MALC" => None,
            /// MSET ; memset(addr @ sp+2, byte @ sp+1, n @ sp); ax = addr
            Mset = 35, "MSET" => None,
            /// MCMP ; ax = memcmp(a @ sp+2, b @ sp+1, n @ sp)
            Mcmp = 36, "MCMP" => None,
            /// EXIT ; halt with exit code at stack[sp]
            Exit = 37, "EXIT" => None,
        }
    };
}

#[macro_export]
macro_rules! define_instructions {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:literal, $mnemonic:literal => $operand:ident
        ),* $(,)?
    ) => {
        // =========================
        // VM instruction enum
        // =========================
        #[derive(Copy, Clone, Debug, Eq, PartialEq)]
        pub enum Instruction {
            $(
                $(#[$doc])*
                $name = $opcode,
            )*
        }

        impl TryFrom<Word> for Instruction {
            type Error = VMError;

            fn try_from(value: Word) -> Result<Self, Self::Error> {
                match value {
                    $( $opcode => Ok(Instruction::$name), )*
                    _ => Err(VMError::InvalidInstruction {
                        opcode: value,
                        pc: 0,
                    }),
                }
            }
        }

        impl Instruction {
            /// Returns the assembly mnemonic for this instruction.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( Instruction::$name => $mnemonic, )*
                }
            }

            /// Returns true if this instruction carries an inline operand word.
            pub const fn has_operand(&self) -> bool {
                match self {
                    $( Instruction::$name => define_instructions!(@operand $operand), )*
                }
            }

            /// Returns the encoded size of this instruction in words.
            pub const fn words(&self) -> usize {
                if self.has_operand() { 2 } else { 1 }
            }

            /// Looks up an instruction by its assembly mnemonic.
            pub fn from_mnemonic(name: &str) -> Result<Instruction, VMError> {
                match name {
                    $( $mnemonic => Ok(Instruction::$name), )*
                    _ => Err(VMError::UnknownMnemonic {
                        name: name.to_string(),
                    }),
                }
            }
        }
    };

    // ---------- operand shapes ----------
    (@operand Imm)  => { true };
    (@operand None) => { false };
}

for_each_instruction!(define_instructions);
