//! A toolchain for HERA, the Haverford Educational RISC Architecture.
//!
//! HERA is a 16-bit teaching instruction set: sixteen registers (R0
//! hard-wired to zero), five status flags, and 2^16 words of memory. This
//! crate parses HERA source text, checks it, expands its pseudo-operations,
//! and can then execute the result on a simulated processor, assemble it to
//! object files, disassemble object files back into operations, or step
//! through execution under an interactive debugger.
//!
//! ## Example
//!
//! ```
//! use hera::{load_program, Settings, VirtualMachine};
//!
//! let settings = Settings::default();
//! let (program, messages) = load_program(
//!     "SET(R1, 20)\nSET(R2, 22)\nADD(R3, R1, R2)",
//!     None,
//!     &settings,
//! );
//! assert!(!messages.has_errors());
//!
//! let mut vm = VirtualMachine::new(settings);
//! vm.exec_many(&program.unwrap());
//! assert_eq!(vm.registers[3], 42);
//! ```

pub mod assembler;
pub mod bits;
pub mod checker;
pub mod cli;
pub mod data;
pub mod debugger;
pub mod disassembler;
pub mod instruction;
pub mod lexer;
pub mod op;
pub mod parser;
pub mod preprocessor;
pub mod stdlib;
pub mod vm;

pub use data::{Messages, Program, Settings};
pub use instruction::Instruction;
pub use vm::VirtualMachine;

pub const VERSION: &str = concat!("hera-rs ", env!("CARGO_PKG_VERSION"), " for HERA version 2.4");

pub const CREDITS: &str = "\
The HERA language and architecture were designed by David G. Wonnacott at
Haverford College for the CS240 and CS350 courses. This simulator follows
the HERA 2.4 manual and the behavior of the reference implementations.";

/// Parse, check and preprocess a HERA program in one call. All diagnostics
/// are accumulated in the returned [`Messages`]; the program is `None` when
/// any phase reported errors.
pub fn load_program(
    text: &str,
    path: Option<&str>,
    settings: &Settings,
) -> (Option<Program>, Messages) {
    let (ops, mut messages) = parser::parse(text, path, settings);
    if messages.has_errors() {
        return (None, messages);
    }

    let (program, check_messages) = preprocessor::check(ops, settings);
    messages.extend(check_messages);
    (program, messages)
}
