//! Shared helpers for the integration tests.
#![allow(dead_code)] // not every test binary uses every helper

use hera::{load_program, Program, Settings, VirtualMachine};

/// Load a program, failing the test on any diagnostic error.
pub fn load(text: &str) -> Program {
    load_with(text, &Settings::default())
}

pub fn load_with(text: &str, settings: &Settings) -> Program {
    let (program, messages) = load_program(text, None, settings);
    assert!(
        !messages.has_errors(),
        "program failed to load: {:?}",
        messages.errors
    );
    program.expect("clean load produces a program")
}

/// Load and run a program to completion, returning the final machine.
pub fn exec(text: &str) -> VirtualMachine {
    exec_with(text, Settings::default())
}

pub fn exec_with(text: &str, settings: Settings) -> VirtualMachine {
    let program = load_with(text, &settings);
    let mut vm = VirtualMachine::new(settings);
    vm.exec_many(&program);
    vm
}

/// The error messages produced by loading a program.
pub fn load_errors(text: &str) -> Vec<String> {
    let (_, messages) = load_program(text, None, &Settings::default());
    messages.errors.into_iter().map(|(msg, _)| msg).collect()
}
