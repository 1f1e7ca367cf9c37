//! Debugger state: a virtual machine plus breakpoints, an undo chain, and
//! the bookkeeping that maps real operations back to what the user wrote.
//!
//! The code here distinguishes "real ops" from "original ops". Original ops
//! are the operations as they appear in the program text; real ops are what
//! the preprocessor expanded them into and what the machine actually runs.
//! Internally the debugger works on real ops, but everything it shows the
//! user is phrased in terms of original ops.

pub mod minilanguage;
pub mod shell;

use std::collections::HashMap;
use std::rc::Rc;

use crate::data::{Program, Settings, SymbolTable, SymbolValue};
use crate::op::Op;
use crate::vm::VirtualMachine;

pub use shell::debug;

#[derive(Clone)]
pub struct Debugger {
    pub program: Vec<crate::data::CodeOp>,
    pub symbol_table: SymbolTable,
    /// Code addresses to human-readable breakpoint names.
    breakpoints: HashMap<u16, String>,
    pub vm: VirtualMachine,
    /// CALLs without matching RETURNs, used by `step`.
    calls: i32,
    /// The previous state of the debugger, for `undo`. Every mutating
    /// command snapshots first, so this forms a chain back to the start.
    old: Option<Box<Debugger>>,
}

impl Debugger {
    pub fn new(program: Program, settings: &Settings) -> Self {
        let mut vm = VirtualMachine::new(settings.clone());
        vm.load_data(&program);
        vm.reset();
        Self {
            program: program.code,
            symbol_table: program.symbol_table,
            breakpoints: HashMap::new(),
            vm,
            calls: 0,
            old: None,
        }
    }

    pub fn breakpoints(&self) -> &HashMap<u16, String> {
        &self.breakpoints
    }

    pub fn set_breakpoint(&mut self, address: u16) {
        let name = self.breakpoint_name(address, true);
        self.breakpoints.insert(address, name);
    }

    /// Snapshot the current state so the next `undo` can restore it.
    pub fn save(&mut self) {
        let snapshot = self.clone();
        self.old = Some(Box::new(snapshot));
    }

    /// Restore the last snapshot, if there is one.
    pub fn undo(&mut self) -> bool {
        match self.old.take() {
            Some(old) => {
                *self = *old;
                true
            }
            None => false,
        }
    }

    /// Execute up to `n` original-op groups, stopping early when the
    /// program finishes or `until` fires.
    pub fn exec_ops(&mut self, n: Option<usize>, until: impl Fn(&Debugger) -> bool) {
        let n = n.unwrap_or(self.program.len());
        for _ in 0..n {
            if self.is_finished() {
                break;
            }
            let (start, end) = self.real_op_range();
            for index in start..end {
                if self.vm.pc as usize != index {
                    // A branch inside the group took over; stay with it.
                    break;
                }
                let op = self.program[index].clone();
                match op.inst {
                    crate::instruction::Instruction::Call(..) => self.calls += 1,
                    crate::instruction::Instruction::Return(..) => self.calls -= 1,
                    _ => {}
                }
                self.vm.exec_one(&op);
            }

            if self.is_finished() || until(self) {
                break;
            }
        }
    }

    /// The half-open range of real ops that share the current op's
    /// original.
    fn real_op_range(&self) -> (usize, usize) {
        let start = self.vm.pc as usize;
        if start >= self.program.len() {
            return (start, start);
        }
        let original = self.program[start].original.clone();
        let mut end = start + 1;
        while end < self.program.len() && same_original(&self.program[end].original, &original) {
            end += 1;
        }
        (start, end)
    }

    /// The real ops that correspond to the current original op.
    pub fn real_ops(&self) -> &[crate::data::CodeOp] {
        let (start, end) = self.real_op_range();
        &self.program[start..end]
    }

    /// The original op about to be executed.
    pub fn current_original(&self) -> Option<&Rc<Op>> {
        self.program
            .get(self.vm.pc as usize)
            .and_then(|op| op.original.as_ref())
    }

    pub fn is_finished(&self) -> bool {
        self.vm.halted || self.vm.pc as usize >= self.program.len()
    }

    pub fn reset(&mut self) {
        self.vm.reset();
        self.calls = 0;
    }

    pub fn calls(&self) -> i32 {
        self.calls
    }

    /// Resolve a user-supplied location (a line number or a label) into a
    /// code address.
    pub fn resolve_location(&self, spec: &str) -> Result<u16, String> {
        if let Ok(line) = spec.parse::<usize>() {
            for (pc, op) in self.program.iter().enumerate() {
                if op.loc.line == line {
                    return Ok(pc as u16);
                }
            }
            Err("could not find corresponding line".to_owned())
        } else {
            match self.symbol_table.get(spec) {
                Some(SymbolValue::Label(pc)) => Ok(*pc),
                _ => Err(format!("could not locate label `{}`", spec)),
            }
        }
    }

    /// Turn a code address into a human-readable location, optionally
    /// suffixed with a label that points there. The inverse of
    /// `resolve_location`.
    pub fn breakpoint_name(&self, address: u16, append_label: bool) -> String {
        let op = match self.program.get(address as usize) {
            Some(op) => op,
            None => return format!("<{}>", address),
        };
        let path = if &*op.loc.path == "-" {
            "<stdin>"
        } else {
            &op.loc.path
        };
        let loc = format!("{}:{}", path, op.loc.line);

        if append_label {
            for (symbol, value) in &self.symbol_table {
                if *value == SymbolValue::Label(address) {
                    return format!("{} ({})", loc, symbol);
                }
            }
        }
        loc
    }

    pub fn at_breakpoint(&self) -> bool {
        self.breakpoints.contains_key(&self.vm.pc)
    }
}

fn same_original(a: &Option<Rc<Op>>, b: &Option<Rc<Op>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::preprocessor::check;

    fn debugger(text: &str) -> Debugger {
        let mut settings = Settings::default();
        settings.no_ret_warn = true;
        let (ops, messages) = parse(text, None, &settings);
        assert!(!messages.has_errors());
        let (program, messages) = check(ops, &settings);
        assert!(!messages.has_errors(), "{:?}", messages.errors);
        Debugger::new(program.unwrap(), &settings)
    }

    const FIB: &str = "\
// compute the tenth Fibonacci number
SET(R1, 0)
SET(R2, 1)
SET(R3, 10)
LABEL(loop)
CMP(R0, R3)
BZ(done)
ADD(R4, R1, R2)
MOVE(R1, R2)
MOVE(R2, R4)
DEC(R3, 1)
BR(loop)
LABEL(done)
HALT()
";

    #[test]
    fn next_executes_one_original_op() {
        let mut debugger = debugger("SET(R1, 42)\nSET(R2, 7)");
        debugger.exec_ops(Some(1), |_| false);
        // Both halves of the SET expansion ran.
        assert_eq!(debugger.vm.pc, 2);
        assert_eq!(debugger.vm.registers[1], 42);
        assert_eq!(debugger.vm.registers[2], 0);
    }

    #[test]
    fn exec_ops_runs_to_completion() {
        let mut debugger = debugger(FIB);
        debugger.exec_ops(None, |_| false);
        assert!(debugger.is_finished());
        assert_eq!(debugger.vm.registers[1], 55);
    }

    #[test]
    fn breakpoints_stop_continue() {
        let mut debugger = debugger(FIB);
        let address = debugger.resolve_location("done").unwrap();
        debugger.set_breakpoint(address);
        debugger.exec_ops(None, Debugger::at_breakpoint);
        assert!(!debugger.is_finished());
        assert_eq!(debugger.vm.pc, address);
        assert_eq!(debugger.vm.registers[1], 55);
    }

    #[test]
    fn resolve_location_by_line_number() {
        let debugger = debugger(FIB);
        // Line 3 is SET(R2, 1), the second original op.
        assert_eq!(debugger.resolve_location("3"), Ok(2));
        assert!(debugger.resolve_location("999").is_err());
        assert!(debugger.resolve_location("nonsense").is_err());
    }

    #[test]
    fn breakpoint_names_include_labels() {
        let debugger = debugger(FIB);
        let address = debugger.resolve_location("loop").unwrap();
        let name = debugger.breakpoint_name(address, true);
        assert!(name.ends_with("(loop)"), "got {}", name);
    }

    #[test]
    fn undo_restores_prior_state() {
        let mut debugger = debugger("SET(R1, 42)\nSET(R2, 7)");
        debugger.save();
        debugger.exec_ops(Some(2), |_| false);
        assert_eq!(debugger.vm.registers[2], 7);
        assert!(debugger.undo());
        assert_eq!(debugger.vm.registers[1], 0);
        assert_eq!(debugger.vm.pc, 0);
        assert!(!debugger.undo());
    }

    #[test]
    fn step_runs_until_call_depth_returns() {
        let text = "\
SET(R1, 3)
CALL(FP_alt, double)
HALT()
LABEL(double)
ADD(R1, R1, R1)
RETURN(FP_alt, PC_ret)
";
        let mut debugger = debugger(text);
        debugger.exec_ops(Some(1), |_| false); // SET
        assert_eq!(debugger.current_original().unwrap().name, "CALL");

        let depth = debugger.calls();
        debugger.exec_ops(None, |debugger| debugger.calls() == depth);
        assert_eq!(debugger.vm.registers[1], 6);
        assert_eq!(debugger.current_original().unwrap().name, "HALT");
    }

    #[test]
    fn reset_allows_rerun() {
        let mut debugger = debugger(FIB);
        debugger.exec_ops(None, |_| false);
        assert!(debugger.is_finished());
        debugger.reset();
        assert_eq!(debugger.vm.pc, 0);
        debugger.exec_ops(None, |_| false);
        assert_eq!(debugger.vm.registers[1], 55);
    }
}
