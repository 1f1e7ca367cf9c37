//! The preprocessor: rewrite a type-checked op list into the executable
//! form the virtual machine consumes.
//!
//! Symbols are replaced with their concrete values, pseudo-operations are
//! expanded into real ones, and each produced op is lowered into its typed
//! instruction while keeping its source location and a shared back-pointer
//! to the operation the user actually wrote.

use std::rc::Rc;

use crate::checker::typecheck;
use crate::data::{CodeOp, Messages, Program, Settings, SymbolTable, SymbolValue};
use crate::instruction::Instruction;
use crate::op::{is_data_statement, ArgValue, Op, RELATIVE_BRANCHES};

/// Check and preprocess a parsed program. On success the returned program
/// has all symbols resolved, all pseudo-ops expanded, and data statements
/// separated from code.
pub fn check(ops: Vec<Op>, settings: &Settings) -> (Option<Program>, Messages) {
    let (symbol_table, mut messages) = typecheck(&ops, settings);
    if messages.has_errors() {
        return (None, messages);
    }

    let (program, preprocess_messages) = preprocess(ops, symbol_table, settings);
    messages.extend(preprocess_messages);
    if messages.has_errors() {
        (None, messages)
    } else {
        (Some(program), messages)
    }
}

/// Expand the op list against a finished symbol table. The program must
/// already have been type-checked.
fn preprocess(
    ops: Vec<Op>,
    symbol_table: SymbolTable,
    _settings: &Settings,
) -> (Program, Messages) {
    let mut messages = Messages::new();
    let mut data = Vec::new();
    let mut code: Vec<CodeOp> = Vec::new();

    for mut op in ops {
        let label_target = RELATIVE_BRANCHES.contains(&op.name.as_str())
            && op
                .args
                .first()
                .and_then(|arg| arg.sym())
                .map(|sym| matches!(symbol_table.get(sym), Some(SymbolValue::Label(_))))
                .unwrap_or(false);
        if label_target {
            // A label target becomes an offset from the op's own address.
            let target = symbol_table[op.args[0].sym().unwrap()].value();
            let jump = target - code.len() as i32;
            if !(-128..128).contains(&jump) {
                messages.err_at("label is too far for a relative branch", &op.args[0].loc);
                continue;
            }
            op.args[0].value = ArgValue::Int(jump);
        } else {
            substitute_symbols(&mut op, &symbol_table);
        }

        if is_data_statement(&op.name) {
            if op.name != "CONSTANT" && op.name != "DLABEL" {
                data.push(op);
            }
            continue;
        }

        let original = Rc::new(op);
        for real in original.convert() {
            match Instruction::build(&real) {
                Ok(inst) => code.push(CodeOp {
                    inst,
                    loc: real.loc.clone(),
                    original: Some(Rc::clone(&original)),
                }),
                Err(e) => messages.err_at(e.to_string(), &real.loc),
            }
        }
    }

    (
        Program {
            data,
            code,
            symbol_table,
        },
        messages,
    )
}

/// Replace every symbol argument with its value from the symbol table.
fn substitute_symbols(op: &mut Op, symbol_table: &SymbolTable) {
    // Declarations bind their first argument rather than using it.
    let skip = match op.name.as_str() {
        "LABEL" | "DLABEL" | "CONSTANT" => 1,
        _ => 0,
    };
    for arg in op.args.iter_mut().skip(skip) {
        if let ArgValue::Sym(s) = &arg.value {
            if let Some(value) = symbol_table.get(s.as_str()) {
                arg.value = ArgValue::Int(value.value());
            }
        }
    }
}

/// The values of the data segment, in order, as the VM loads them.
pub fn data_words(data: &[Op]) -> Vec<u16> {
    let mut words = Vec::new();
    for op in data {
        match op.name.as_str() {
            "INTEGER" => {
                let v = op.args[0].int().unwrap_or(0);
                words.push(crate::data::to_u16(v).unwrap_or(0));
            }
            "LP_STRING" | "TIGER_STRING" => {
                let s = op.args[0].string().unwrap_or("");
                words.push(s.chars().count() as u16);
                words.extend(s.chars().map(|c| c as u16));
            }
            "DSKIP" => {
                let n = op.args[0].int().unwrap_or(0).max(0) as usize;
                words.extend(std::iter::repeat(0).take(n));
            }
            _ => {}
        }
    }
    words
}
