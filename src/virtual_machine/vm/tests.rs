use crate::virtual_machine::assembler::assemble_source;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Instruction;
use crate::virtual_machine::program::Program;
use crate::virtual_machine::vm::{StepOutcome, Vm};
use crate::virtual_machine::{VmConfig, Word};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Clonable sink that captures PRTF output for assertions.
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Assembles and runs `source`, returning the exit code.
fn run_vm(source: &str) -> Word {
    let program = assemble_source(source).unwrap();
    Vm::new(program).run().unwrap()
}

/// Assembles and runs `source`, returning the fault it must produce.
fn run_expect_err(source: &str) -> VMError {
    let program = assemble_source(source).unwrap();
    Vm::new(program).run().unwrap_err()
}

/// Runs `a OP b` with the left operand on the stack and the right in `ax`.
fn run_binop(op: &str, a: Word, b: Word) -> Word {
    run_vm(&format!("IMM {a}\nPUSH\nIMM {b}\n{op}\nPUSH\nEXIT"))
}

#[test]
fn exit_returns_top_of_stack() {
    assert_eq!(run_vm("IMM 42\nPUSH\nEXIT"), 42);
}

#[test]
fn exit_on_untouched_stack_returns_zero() {
    assert_eq!(run_vm("EXIT"), 0);
}

#[test]
fn arithmetic_operators() {
    assert_eq!(run_binop("ADD", 10, 3), 13);
    assert_eq!(run_binop("SUB", 10, 3), 7);
    assert_eq!(run_binop("MUL", -4, 6), -24);
}

#[test]
fn arithmetic_wraps_instead_of_panicking() {
    assert_eq!(run_binop("ADD", Word::MAX, 1), Word::MIN);
    assert_eq!(run_binop("MUL", Word::MAX, 2), -2);
}

#[test]
fn division_rounds_toward_negative_infinity() {
    assert_eq!(run_binop("DIV", 7, 2), 3);
    assert_eq!(run_binop("DIV", -7, 2), -4);
    assert_eq!(run_binop("DIV", 7, -2), -4);
    assert_eq!(run_binop("DIV", -7, -2), 3);
}

#[test]
fn modulo_takes_divisor_sign() {
    assert_eq!(run_binop("MOD", 7, 2), 1);
    assert_eq!(run_binop("MOD", -7, 2), 1);
    assert_eq!(run_binop("MOD", 7, -2), -1);
    assert_eq!(run_binop("MOD", -7, -2), -1);
}

#[test]
fn division_by_zero_faults_at_the_dividing_instruction() {
    // IMM(2) PUSH(1) IMM(2) puts DIV at word 5
    let err = run_expect_err("IMM 1\nPUSH\nIMM 0\nDIV\nPUSH\nEXIT");
    assert!(matches!(err, VMError::DivisionByZero { pc: 5 }));

    let err = run_expect_err("IMM 1\nPUSH\nIMM 0\nMOD\nPUSH\nEXIT");
    assert!(matches!(err, VMError::DivisionByZero { pc: 5 }));
}

#[test]
fn comparison_operators_yield_flags() {
    assert_eq!(run_binop("EQ", 5, 5), 1);
    assert_eq!(run_binop("EQ", 5, 6), 0);
    assert_eq!(run_binop("NE", 5, 6), 1);
    assert_eq!(run_binop("LT", -1, 0), 1);
    assert_eq!(run_binop("GT", -1, 0), 0);
    assert_eq!(run_binop("LE", 3, 3), 1);
    assert_eq!(run_binop("GE", 2, 3), 0);
}

#[test]
fn bitwise_operators() {
    assert_eq!(run_binop("OR", 0b1100, 0b1010), 0b1110);
    assert_eq!(run_binop("XOR", 0b1100, 0b1010), 0b0110);
    assert_eq!(run_binop("AND", 0b1100, 0b1010), 0b1000);
}

#[test]
fn shifts_mask_the_count_and_keep_the_sign() {
    assert_eq!(run_binop("SHL", 1, 4), 16);
    assert_eq!(run_binop("SHR", -8, 1), -4);
    // Counts are taken modulo the word width
    assert_eq!(run_binop("SHL", 1, 33), 2);
}

#[test]
fn jz_taken_on_zero() {
    let exit = run_vm(
        "IMM 0\n\
         JZ skip\n\
         IMM 1\n\
         PUSH\n\
         EXIT\n\
         skip: IMM 99\n\
         PUSH\n\
         EXIT",
    );
    assert_eq!(exit, 99);
}

#[test]
fn jnz_not_taken_on_zero() {
    let exit = run_vm(
        "IMM 0\n\
         JNZ skip\n\
         IMM 1\n\
         PUSH\n\
         EXIT\n\
         skip: IMM 99\n\
         PUSH\n\
         EXIT",
    );
    assert_eq!(exit, 1);
}

#[test]
fn countdown_loop_terminates() {
    // Decrements ax from 3 to 0, looping on JNZ
    let exit = run_vm(
        "IMM 3\n\
         loop: PUSH\n\
         IMM 1\n\
         SUB\n\
         JNZ loop\n\
         PUSH\n\
         EXIT",
    );
    assert_eq!(exit, 0);
}

#[test]
fn call_pushes_return_address_and_lev_returns() {
    let exit = run_vm(
        "CALL func\n\
         PUSH\n\
         EXIT\n\
         func: ENT 0\n\
         IMM 7\n\
         LEV",
    );
    assert_eq!(exit, 7);
}

#[test]
fn nested_calls_unwind_in_order() {
    let exit = run_vm(
        "CALL outer\n\
         PUSH\n\
         EXIT\n\
         outer: ENT 0\n\
         CALL inner\n\
         PUSH\n\
         IMM 1\n\
         ADD\n\
         LEV\n\
         inner: ENT 0\n\
         IMM 41\n\
         LEV",
    );
    assert_eq!(exit, 42);
}

#[test]
fn lea_computes_frame_relative_slot() {
    let program = assemble_source("ENT 2\nLEA -1\nPUSH\nEXIT").unwrap();
    let config = VmConfig {
        poolsize: 64,
        trace: false,
    };
    // sp = bp = 63; ENT pushes bp (sp = 62), rebases, reserves 2 locals.
    // The first local lives one slot below bp.
    let exit = Vm::with_config(program, config).run().unwrap();
    assert_eq!(exit, 61);
}

#[test]
fn adj_discards_stacked_words() {
    let exit = run_vm("IMM 1\nPUSH\nIMM 2\nPUSH\nADJ 1\nEXIT");
    assert_eq!(exit, 1);
}

#[test]
fn adj_past_stack_base_faults() {
    // Discarding more words than were pushed moves sp past the initial
    // top slot; the fault lands on the ADJ, not a later instruction
    let err = run_expect_err("IMM 1\nPUSH\nADJ 2\nEXIT");
    assert!(matches!(err, VMError::StackFault { register: "sp", .. }));
}

#[test]
fn frame_restores_registers_around_call() {
    let program = assemble_source(
        "IMM 5\n\
         PUSH\n\
         CALL func\n\
         ADJ 1\n\
         PUSH\n\
         EXIT\n\
         func: ENT 3\n\
         IMM 9\n\
         LEV",
    )
    .unwrap();
    let mut vm = Vm::new(program);
    let sp0 = vm.sp();
    assert_eq!(vm.run().unwrap(), 9);
    // One word was pushed for the exit code
    assert_eq!(vm.sp(), sp0 - 1);
}

#[test]
fn data_word_store_and_load() {
    let exit = run_vm(
        "IMM 8\n\
         PUSH\n\
         IMM 1234\n\
         SI\n\
         IMM 8\n\
         LI\n\
         PUSH\n\
         EXIT",
    );
    assert_eq!(exit, 1234);
}

#[test]
fn data_byte_store_truncates() {
    let exit = run_vm(
        "IMM 8\n\
         PUSH\n\
         IMM 300\n\
         SC\n\
         IMM 8\n\
         LC\n\
         PUSH\n\
         EXIT",
    );
    assert_eq!(exit, 300 & 0xff);
}

#[test]
fn negative_data_address_faults() {
    let err = run_expect_err("IMM -4\nPUSH\nIMM 1\nSI");
    assert!(matches!(err, VMError::MemoryFault { addr: -4, .. }));
}

#[test]
fn load_past_pool_end_faults() {
    let program = assemble_source("IMM 62\nLI\nPUSH\nEXIT").unwrap();
    let config = VmConfig {
        poolsize: 64,
        trace: false,
    };
    let err = Vm::with_config(program, config).run().unwrap_err();
    assert!(matches!(
        err,
        VMError::MemoryFault {
            addr: 62,
            size: 4,
            ..
        }
    ));
}

#[test]
fn pc_running_off_the_end_faults() {
    let err = run_expect_err("IMM 1");
    assert!(matches!(err, VMError::PcOutOfRange { pc: 2, len: 2 }));
}

#[test]
fn negative_jump_target_faults() {
    let err = run_expect_err("JMP -1");
    assert!(matches!(err, VMError::PcOutOfRange { pc: -1, .. }));
}

#[test]
fn unknown_opcode_reports_its_own_pc() {
    let program = Program::new(vec![Instruction::Imm as Word, 1, 99]);
    let err = Vm::new(program).run().unwrap_err();
    assert!(matches!(
        err,
        VMError::InvalidInstruction { opcode: 99, pc: 2 }
    ));
}

#[test]
fn negative_opcode_faults() {
    let program = Program::new(vec![-1]);
    let err = Vm::new(program).run().unwrap_err();
    assert!(matches!(
        err,
        VMError::InvalidInstruction { opcode: -1, pc: 0 }
    ));
}

#[test]
fn lev_without_matching_call_faults() {
    let err = run_expect_err("LEV");
    assert!(matches!(err, VMError::StackFault { register: "sp", .. }));
}

#[test]
fn push_loop_overflows_small_stack() {
    let program = assemble_source("loop: PUSH\nJMP loop").unwrap();
    let config = VmConfig {
        poolsize: 4,
        trace: false,
    };
    let err = Vm::with_config(program, config).run().unwrap_err();
    assert!(matches!(err, VMError::StackFault { register: "sp", .. }));
}

#[test]
fn step_executes_one_instruction_at_a_time() {
    let program = assemble_source("IMM 5\nPUSH\nEXIT").unwrap();
    let mut vm = Vm::new(program);

    assert_eq!(vm.step().unwrap(), StepOutcome::Continue);
    assert_eq!(vm.ax(), 5);
    assert_eq!(vm.pc(), 2);

    assert_eq!(vm.step().unwrap(), StepOutcome::Continue);
    assert_eq!(vm.step().unwrap(), StepOutcome::Exit(5));
}

#[test]
fn prtf_renders_conversions_and_returns_byte_count() {
    let program = assemble_source(
        "IMM 5\n\
         PUSH\n\
         IMM 3\n\
         PUSH\n\
         IMM 2\n\
         PUSH\n\
         IMM 64\n\
         PUSH\n\
         PRTF\n\
         PUSH\n\
         EXIT",
    )
    .unwrap();
    let out = SharedBuf::default();
    let mut vm = Vm::new(program).with_output(Box::new(out.clone()));
    vm.write_data(64, b"%d+%d=%d\0").unwrap();

    assert_eq!(vm.run().unwrap(), 5);
    assert_eq!(out.contents(), b"2+3=5");
}

#[test]
fn prtf_renders_string_arguments() {
    let program = assemble_source(
        "IMM 32\n\
         PUSH\n\
         IMM 64\n\
         PUSH\n\
         PRTF\n\
         PUSH\n\
         EXIT",
    )
    .unwrap();
    let out = SharedBuf::default();
    let mut vm = Vm::new(program).with_output(Box::new(out.clone()));
    vm.write_data(32, b"world\0").unwrap();
    vm.write_data(64, b"hello %s!\0").unwrap();

    assert_eq!(vm.run().unwrap(), 12);
    assert_eq!(out.contents(), b"hello world!");
}

#[test]
fn prtf_escape_adjacent_to_conversion() {
    let program = assemble_source("IMM 7\nPUSH\nIMM 64\nPUSH\nPRTF\nPUSH\nEXIT").unwrap();
    let out = SharedBuf::default();
    let mut vm = Vm::new(program).with_output(Box::new(out.clone()));
    vm.write_data(64, b"%%%d\0").unwrap();

    // One escape, one conversion: renders a literal % then the argument
    assert_eq!(vm.run().unwrap(), 2);
    assert_eq!(out.contents(), b"%7");
}

#[test]
fn prtf_bad_conversion_emits_nothing() {
    let program = assemble_source("IMM 64\nPUSH\nPRTF\nPUSH\nEXIT").unwrap();
    let out = SharedBuf::default();
    let mut vm = Vm::new(program).with_output(Box::new(out.clone()));
    vm.write_data(64, b"broken %q\0").unwrap();

    assert_eq!(vm.run().unwrap(), -1);
    assert!(out.contents().is_empty());
}

#[test]
fn prtf_unterminated_format_faults() {
    let program = assemble_source("IMM 60\nPUSH\nPRTF\nPUSH\nEXIT").unwrap();
    let config = VmConfig {
        poolsize: 64,
        trace: false,
    };
    // No NUL between the pointer and the end of the pool
    let mut vm = Vm::with_config(program, config);
    vm.write_data(60, b"abcd").unwrap();
    assert!(matches!(vm.run(), Err(VMError::MemoryFault { .. })));
}

#[test]
fn open_missing_file_returns_minus_one() {
    let program = assemble_source("IMM 16\nPUSH\nIMM 0\nPUSH\nOPEN\nPUSH\nEXIT").unwrap();
    let mut vm = Vm::new(program);
    vm.write_data(16, b"/nonexistent/minic_vm_test\0").unwrap();
    assert_eq!(vm.run().unwrap(), -1);
}

#[test]
fn open_unknown_mode_returns_minus_one() {
    let program = assemble_source("IMM 16\nPUSH\nIMM 9\nPUSH\nOPEN\nPUSH\nEXIT").unwrap();
    let mut vm = Vm::new(program);
    vm.write_data(16, b"/etc/hostname\0").unwrap();
    assert_eq!(vm.run().unwrap(), -1);
}

#[test]
fn open_read_close_roundtrip() {
    let path = std::env::temp_dir().join("minic_vm_read_roundtrip.txt");
    std::fs::write(&path, b"hello").unwrap();

    let program = assemble_source(
        "IMM 16\n\
         PUSH\n\
         IMM 0\n\
         PUSH\n\
         OPEN\n\
         ADJ 2\n\
         PUSH\n\
         IMM 128\n\
         PUSH\n\
         IMM 5\n\
         PUSH\n\
         READ\n\
         ADJ 2\n\
         CLOS\n\
         PUSH\n\
         EXIT",
    )
    .unwrap();
    let mut vm = Vm::new(program);
    let mut path_cstr = path.to_str().unwrap().as_bytes().to_vec();
    path_cstr.push(0);
    vm.write_data(16, &path_cstr).unwrap();

    // CLOS leaves 0 in ax after the descriptor is dropped
    assert_eq!(vm.run().unwrap(), 0);
    assert_eq!(vm.read_data(128, 5).unwrap(), b"hello");

    let _ = std::fs::remove_file(&path);
}

#[test]
fn read_unknown_descriptor_returns_minus_one() {
    let exit = run_vm(
        "IMM 9\n\
         PUSH\n\
         IMM 0\n\
         PUSH\n\
         IMM 4\n\
         PUSH\n\
         READ\n\
         PUSH\n\
         EXIT",
    );
    assert_eq!(exit, -1);
}

#[test]
fn read_negative_count_returns_minus_one() {
    let exit = run_vm(
        "IMM 3\n\
         PUSH\n\
         IMM 0\n\
         PUSH\n\
         IMM -4\n\
         PUSH\n\
         READ\n\
         PUSH\n\
         EXIT",
    );
    assert_eq!(exit, -1);
}

#[test]
fn clos_unknown_descriptor_returns_minus_one() {
    assert_eq!(run_vm("IMM 7\nPUSH\nCLOS\nPUSH\nEXIT"), -1);
}

#[test]
fn malc_allocates_from_the_upper_half() {
    let program = assemble_source("IMM 8\nPUSH\nMALC\nPUSH\nEXIT").unwrap();
    let config = VmConfig {
        poolsize: 1024,
        trace: false,
    };
    assert_eq!(Vm::with_config(program, config).run().unwrap(), 512);
}

#[test]
fn malc_rejects_non_positive_sizes() {
    assert_eq!(run_vm("IMM 0\nPUSH\nMALC\nPUSH\nEXIT"), -1);
    assert_eq!(run_vm("IMM -8\nPUSH\nMALC\nPUSH\nEXIT"), -1);
}

#[test]
fn mset_fills_and_returns_the_address() {
    let program = assemble_source(
        "IMM 32\n\
         PUSH\n\
         IMM 65\n\
         PUSH\n\
         IMM 4\n\
         PUSH\n\
         MSET\n\
         PUSH\n\
         EXIT",
    )
    .unwrap();
    let mut vm = Vm::new(program);
    assert_eq!(vm.run().unwrap(), 32);
    assert_eq!(vm.read_data(32, 4).unwrap(), b"AAAA");
}

#[test]
fn mset_negative_count_faults() {
    let err = run_expect_err(
        "IMM 0\n\
         PUSH\n\
         IMM 0\n\
         PUSH\n\
         IMM -1\n\
         PUSH\n\
         MSET",
    );
    assert!(matches!(err, VMError::MemoryFault { .. }));
}

#[test]
fn mcmp_orders_byte_regions() {
    let source = "IMM 0\n\
                  PUSH\n\
                  IMM 8\n\
                  PUSH\n\
                  IMM 2\n\
                  PUSH\n\
                  MCMP\n\
                  PUSH\n\
                  EXIT";

    let mut vm = Vm::new(assemble_source(source).unwrap());
    vm.write_data(0, b"ab").unwrap();
    vm.write_data(8, b"ac").unwrap();
    assert_eq!(vm.run().unwrap(), -1);

    let mut vm = Vm::new(assemble_source(source).unwrap());
    vm.write_data(0, b"ac").unwrap();
    vm.write_data(8, b"ab").unwrap();
    assert_eq!(vm.run().unwrap(), 1);

    let mut vm = Vm::new(assemble_source(source).unwrap());
    vm.write_data(0, b"ab").unwrap();
    vm.write_data(8, b"ab").unwrap();
    assert_eq!(vm.run().unwrap(), 0);
}

#[test]
fn trace_mode_does_not_change_results() {
    let program = assemble_source("IMM 2\nPUSH\nIMM 3\nADD\nPUSH\nEXIT").unwrap();
    let config = VmConfig {
        poolsize: 1024,
        trace: true,
    };
    assert_eq!(Vm::with_config(program, config).run().unwrap(), 5);
}

#[test]
fn assembled_binary_roundtrips_through_the_container() {
    let program = assemble_source("IMM 11\nPUSH\nEXIT").unwrap();
    let restored = Program::from_bytes(&program.to_bytes()).unwrap();
    assert_eq!(Vm::new(restored).run().unwrap(), 11);
}
