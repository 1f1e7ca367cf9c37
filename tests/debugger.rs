//! Integration tests for the debugger: stepping, breakpoints, the
//! expression language, and undo.

mod common;

use common::load_with;
use hera::data::Settings;
use hera::debugger::shell::Shell;
use hera::debugger::Debugger;

fn shell(text: &str) -> Shell {
    let mut settings = Settings::default();
    settings.no_ret_warn = true;
    let program = load_with(text, &settings);
    Shell::new(Debugger::new(program, &settings), settings)
}

const PROGRAM: &str = "\
SET(R1, 10)
SET(R2, 32)
LABEL(add_them)
ADD(R3, R1, R2)
HALT()
";

#[test]
fn next_steps_by_original_ops() {
    let mut shell = shell(PROGRAM);
    shell.handle_command("next");
    assert_eq!(shell.debugger.vm.registers[1], 10);
    assert_eq!(shell.debugger.vm.registers[2], 0);
    // The SET expansion ran as a unit: both real ops executed.
    assert_eq!(shell.debugger.vm.pc, 2);
}

#[test]
fn continue_runs_to_a_breakpoint() {
    let mut shell = shell(PROGRAM);
    shell.handle_command("break add_them");
    shell.handle_command("continue");
    assert_eq!(shell.debugger.vm.registers[2], 32);
    assert_eq!(shell.debugger.vm.registers[3], 0);
    assert!(!shell.debugger.is_finished());
}

#[test]
fn breakpoints_can_use_line_numbers() {
    let mut shell = shell(PROGRAM);
    shell.handle_command("break 4");
    shell.handle_command("continue");
    assert_eq!(shell.debugger.vm.registers[3], 0);
    shell.handle_command("continue");
    assert!(shell.debugger.is_finished());
    assert_eq!(shell.debugger.vm.registers[3], 42);
}

#[test]
fn assign_and_arithmetic() {
    let mut shell = shell(PROGRAM);
    shell.handle_command("R1 = 6 * 7");
    assert_eq!(shell.debugger.vm.registers[1], 42);

    shell.handle_command("@(R1 + 1) = 9");
    assert_eq!(shell.debugger.vm.memory[43], 9);
}

#[test]
fn undo_chains_backwards() {
    let mut shell = shell(PROGRAM);
    shell.handle_command("next");
    shell.handle_command("next");
    shell.handle_command("R5 = 1");
    assert_eq!(shell.debugger.vm.registers[5], 1);

    shell.handle_command("undo");
    assert_eq!(shell.debugger.vm.registers[5], 0);
    assert_eq!(shell.debugger.vm.registers[2], 32);

    shell.handle_command("undo");
    assert_eq!(shell.debugger.vm.registers[2], 0);
    assert_eq!(shell.debugger.vm.registers[1], 10);

    shell.handle_command("undo");
    assert_eq!(shell.debugger.vm.registers[1], 0);
}

#[test]
fn restart_keeps_data_in_memory() {
    let mut shell = shell("DLABEL(X)\nINTEGER(42)\nSET(R1, X)\nLOAD(R2, 0, R1)");
    shell.handle_command("continue");
    assert_eq!(shell.debugger.vm.registers[2], 42);

    shell.handle_command("restart");
    assert_eq!(shell.debugger.vm.registers[2], 0);
    // The data segment is still loaded, so a re-run behaves identically.
    shell.handle_command("continue");
    assert_eq!(shell.debugger.vm.registers[2], 42);
}

#[test]
fn execute_does_not_move_the_pc() {
    let mut shell = shell(PROGRAM);
    shell.handle_command("execute SET(R9, 7)");
    assert_eq!(shell.debugger.vm.registers[9], 7);
    assert_eq!(shell.debugger.vm.pc, 0);
}

#[test]
fn jump_skips_without_executing() {
    let mut shell = shell(PROGRAM);
    shell.handle_command("jump add_them");
    assert_eq!(shell.debugger.vm.registers[1], 0);
    shell.handle_command("continue");
    // Only the code after the jump target ran.
    assert_eq!(shell.debugger.vm.registers[3], 0);
    assert!(shell.debugger.is_finished());
}

#[test]
fn step_over_a_function_call() {
    let text = "\
SET(R1, 5)
CALL(FP_alt, triple)
HALT()
LABEL(triple)
SET(Rt, 3)
MUL(R1, R1, Rt)
RETURN(FP_alt, PC_ret)
";
    let mut shell = shell(text);
    shell.handle_command("next");
    shell.handle_command("step");
    assert_eq!(shell.debugger.vm.registers[1], 15);
    assert_eq!(shell.debugger.current_original().unwrap().name, "HALT");
}
