//! The semantic checker: symbol redeclaration, address assignment, and
//! per-operation type checking.
//!
//! Checking never stops at the first problem; every op is examined and all
//! diagnostics are accumulated so one run surfaces as many errors as
//! possible.

use std::collections::{HashMap, HashSet};

use crate::data::{Messages, Settings, SymbolTable, SymbolValue};
use crate::op::{
    is_data_statement, Arg, ArgValue, Op, BINARY_OPS, REGISTER_BRANCHES, RELATIVE_BRANCHES,
    UNARY_OPS,
};

/// Type-check the program and build its symbol table. The table is returned
/// even when errors were found, so later phases can produce better
/// diagnostics.
pub fn typecheck(program: &[Op], settings: &Settings) -> (SymbolTable, Messages) {
    let mut messages = check_symbol_redeclaration(program);

    let (mut symbol_table, label_messages) = get_labels(program, settings);
    messages.extend(label_messages);

    let mut seen_code = false;
    for op in program {
        typecheck_op(op, &symbol_table, settings, &mut messages);

        if is_data_statement(&op.name) {
            if seen_code {
                messages.err_at("data statement after code", &op.loc);
            }
        } else {
            seen_code = true;
        }

        // Constants enter the symbol table as they are declared, so a
        // constant is not in scope before its declaration.
        if let Some((name, value)) = constant_declaration(op) {
            if out_of_range(value) {
                symbol_table.insert(name.to_owned(), SymbolValue::Constant(0));
            } else {
                symbol_table.insert(name.to_owned(), SymbolValue::Constant(value));
            }
        }
    }

    (symbol_table, messages)
}

/// Report every symbol declared more than once. The second and subsequent
/// declarations are the ones flagged.
fn check_symbol_redeclaration(program: &[Op]) -> Messages {
    let mut messages = Messages::new();
    let mut symbols = HashSet::new();
    for op in program {
        if matches!(op.name.as_str(), "CONSTANT" | "LABEL" | "DLABEL") && !op.args.is_empty() {
            if let Some(symbol) = op.args[0].sym() {
                if !symbols.insert(symbol.to_owned()) {
                    messages.err_at(
                        format!("symbol `{}` has already been defined", symbol),
                        &op.loc,
                    );
                }
            }
        }
    }
    messages
}

/// Walk the program maintaining the code counter and the data counter, and
/// record every label and data label. Constants are tracked separately so
/// DSKIP can use them, but only enter the returned table in `typecheck`.
fn get_labels(program: &[Op], settings: &Settings) -> (SymbolTable, Messages) {
    let mut messages = Messages::new();
    let mut symbol_table = SymbolTable::new();
    let mut constants: HashMap<String, i32> = HashMap::new();
    let mut pc: u32 = 0;
    let mut dc: u32 = settings.data_start as u32;

    for op in program {
        let odc = dc;
        match op.name.as_str() {
            "LABEL" => {
                if let Some(name) = op.args.first().and_then(Arg::sym) {
                    symbol_table.insert(name.to_owned(), SymbolValue::Label(pc as u16));
                }
            }
            "DLABEL" => {
                if let Some(name) = op.args.first().and_then(Arg::sym) {
                    // A dummy value once the data counter has overflowed, to
                    // avoid cascading range errors.
                    let value = if dc > 0xFFFF { 0 } else { dc as u16 };
                    symbol_table.insert(name.to_owned(), SymbolValue::DataLabel(value));
                }
            }
            "CONSTANT" => {
                if let Some((name, value)) = constant_declaration(op) {
                    constants.insert(name.to_owned(), value);
                }
            }
            "INTEGER" => dc += 1,
            "LP_STRING" | "TIGER_STRING" => {
                if let Some(s) = op.args.first().and_then(Arg::string) {
                    dc += s.chars().count() as u32 + 1;
                }
            }
            "DSKIP" => {
                if let Some(arg) = op.args.first() {
                    match &arg.value {
                        ArgValue::Int(n) if *n >= 0 => dc += *n as u32,
                        ArgValue::Sym(s) => {
                            if let Some(n) = constants.get(s.as_str()) {
                                if *n >= 0 {
                                    dc += *n as u32;
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => pc += operation_length(op) as u32,
        }

        if dc > 0xFFFF && odc <= 0xFFFF {
            messages.err_at("past the end of available memory", &op.loc);
        }
    }

    (symbol_table, messages)
}

/// The number of real operations an op occupies, which drives label
/// arithmetic. The preprocessor's expansion of every op has exactly this
/// length.
pub fn operation_length(op: &Op) -> u16 {
    match op.name.as_str() {
        name if REGISTER_BRANCHES.contains(&name) => {
            if op.args.len() == 1 && op.args[0].reg().is_some() {
                1
            } else {
                3
            }
        }
        "SET" | "CMP" | "FLAGS" | "NEG" => 2,
        "SETRF" => 4,
        "NOT" => 3,
        "CALL" => {
            if op.args.len() == 2 && op.args[1].reg().is_some() {
                1
            } else {
                3
            }
        }
        name if is_data_statement(name) => 0,
        "LABEL" => 0,
        _ => 1,
    }
}

fn constant_declaration(op: &Op) -> Option<(&str, i32)> {
    if op.name != "CONSTANT" || op.args.len() != 2 {
        return None;
    }
    Some((op.args[0].sym()?, op.args[1].int()?))
}

fn out_of_range(n: i32) -> bool {
    n < -32768 || n >= 65536
}

/// Type-check a single operation, dispatching on its mnemonic.
fn typecheck_op(op: &Op, symbol_table: &SymbolTable, settings: &Settings, messages: &mut Messages) {
    let name = op.name.as_str();
    let n = op.args.len();

    match name {
        "SETLO" | "SETHI" => {
            assert_arg_count(op, 2, messages);
            if n > 0 {
                assert_is_register(&op.args[0], messages);
            }
            if n > 1 {
                assert_is_integer(&op.args[1], symbol_table, 8, true, false, messages);
            }
        }
        "INC" | "DEC" => {
            assert_arg_count(op, 2, messages);
            if n > 0 {
                assert_is_register(&op.args[0], messages);
            }
            if n > 1 {
                assert_in_range(&op.args[1], symbol_table, 1, 65, false, messages);
            }
        }
        name if BINARY_OPS.contains(&name) => {
            assert_arg_count(op, 3, messages);
            for arg in op.args.iter().take(3) {
                assert_is_register(arg, messages);
            }
        }
        name if UNARY_OPS.contains(&name) => {
            assert_arg_count(op, 2, messages);
            for arg in op.args.iter().take(2) {
                assert_is_register(arg, messages);
            }
        }
        "MOVE" | "CMP" | "NEG" | "NOT" => {
            assert_arg_count(op, 2, messages);
            for arg in op.args.iter().take(2) {
                assert_is_register(arg, messages);
            }
        }
        "SAVEF" | "RSTRF" | "FLAGS" => {
            assert_arg_count(op, 1, messages);
            if n > 0 {
                assert_is_register(&op.args[0], messages);
            }
        }
        "print_reg" => {
            assert_no_debug_ops(op, settings, messages);
            assert_arg_count(op, 1, messages);
            if n > 0 {
                assert_is_register(&op.args[0], messages);
            }
        }
        "FON" | "FOFF" | "FSET5" => {
            assert_arg_count(op, 1, messages);
            if n > 0 {
                assert_is_integer(&op.args[0], symbol_table, 5, false, false, messages);
            }
        }
        "FSET4" | "SWI" => {
            assert_arg_count(op, 1, messages);
            if n > 0 {
                assert_is_integer(&op.args[0], symbol_table, 4, false, false, messages);
            }
        }
        "LOAD" | "STORE" => {
            assert_arg_count(op, 3, messages);
            if n > 0 {
                assert_is_register(&op.args[0], messages);
            }
            if n > 1 {
                assert_is_integer(&op.args[1], symbol_table, 5, false, false, messages);
            }
            if n > 2 {
                assert_is_register(&op.args[2], messages);
            }
        }
        "CALL" | "RETURN" => {
            assert_arg_count(op, 2, messages);
            if n > 0 {
                assert_is_register(&op.args[0], messages);
            }
            if n > 1 {
                assert_is_register_or_label(&op.args[1], symbol_table, messages);
            }
        }
        name if REGISTER_BRANCHES.contains(&name) => {
            assert_arg_count(op, 1, messages);
            if n > 0 {
                assert_is_register_or_label(&op.args[0], symbol_table, messages);
            }
        }
        name if RELATIVE_BRANCHES.contains(&name) => {
            assert_arg_count(op, 1, messages);
            if n > 0 {
                if let Some(symbol) = op.args[0].sym() {
                    // A symbolic target would silently go out of range in
                    // larger programs; the register form has no such limit.
                    if matches!(symbol_table.get(symbol), Some(SymbolValue::Label(_))) {
                        messages.err_at(
                            format!(
                                "relative branches cannot use labels (why not use {} instead?)",
                                &name[..name.len() - 1]
                            ),
                            &op.args[0].loc,
                        );
                    } else {
                        assert_is_integer(&op.args[0], symbol_table, 8, true, false, messages);
                    }
                } else {
                    assert_is_integer(&op.args[0], symbol_table, 8, true, false, messages);
                }
            }
        }
        "RTI" | "CBON" | "CON" | "COFF" | "CCBOFF" | "NOP" | "HALT" => {
            assert_arg_count(op, 0, messages);
        }
        "SET" => {
            assert_arg_count(op, 2, messages);
            if n > 0 {
                assert_is_register(&op.args[0], messages);
            }
            if n > 1 {
                assert_is_integer(&op.args[1], symbol_table, 16, true, true, messages);
            }
        }
        "SETRF" => {
            assert_arg_count(op, 2, messages);
            if n > 0 {
                assert_is_register(&op.args[0], messages);
            }
            if n > 1 {
                assert_is_integer(&op.args[1], symbol_table, 16, true, false, messages);
            }
        }
        "LABEL" | "DLABEL" => {
            assert_arg_count(op, 1, messages);
            if n > 0 {
                assert_is_label(&op.args[0], messages);
            }
        }
        "CONSTANT" => {
            assert_arg_count(op, 2, messages);
            if n > 0 {
                assert_is_label(&op.args[0], messages);
            }
            if n > 1 {
                assert_is_integer(&op.args[1], symbol_table, 16, true, false, messages);
            }
        }
        "INTEGER" => {
            assert_arg_count(op, 1, messages);
            if n > 0 {
                assert_is_integer(&op.args[0], symbol_table, 16, true, false, messages);
            }
        }
        "LP_STRING" | "TIGER_STRING" => {
            assert_arg_count(op, 1, messages);
            if n > 0 {
                assert_is_string(&op.args[0], messages);
            }
        }
        "print" | "println" => {
            assert_no_debug_ops(op, settings, messages);
            assert_arg_count(op, 1, messages);
            if n > 0 {
                assert_is_string(&op.args[0], messages);
            }
        }
        "DSKIP" => {
            assert_arg_count(op, 1, messages);
            if n > 0 {
                assert_is_integer(&op.args[0], symbol_table, 16, false, false, messages);
            }
        }
        _ => {
            messages.err_at(format!("unknown instruction `{}`", op.name), &op.loc);
        }
    }
}

fn assert_no_debug_ops(op: &Op, settings: &Settings, messages: &mut Messages) {
    if settings.no_debug_ops {
        messages.err_at(
            "debugging instructions disallowed with --no-debug-ops flag",
            &op.loc,
        );
    }
}

fn assert_arg_count(op: &Op, expected: usize, messages: &mut Messages) -> bool {
    if op.args.len() < expected {
        messages.err_at(
            format!("too few args to {} (expected {})", op.name, expected),
            &op.loc,
        );
        false
    } else if op.args.len() > expected {
        messages.err_at(
            format!("too many args to {} (expected {})", op.name, expected),
            &op.loc,
        );
        false
    } else {
        true
    }
}

fn assert_is_register(arg: &Arg, messages: &mut Messages) -> bool {
    if arg.reg().is_none() {
        messages.err_at("expected register", &arg.loc);
        false
    } else {
        true
    }
}

fn assert_is_register_or_label(
    arg: &Arg,
    symbol_table: &SymbolTable,
    messages: &mut Messages,
) -> bool {
    match &arg.value {
        ArgValue::Reg(_) => true,
        ArgValue::Sym(s) => match symbol_table.get(s.as_str()) {
            None => {
                messages.err_at("undefined symbol", &arg.loc);
                false
            }
            Some(SymbolValue::Constant(_)) => {
                messages.err_at("constant cannot be used as label", &arg.loc);
                false
            }
            Some(SymbolValue::DataLabel(_)) => {
                messages.err_at("data label cannot be used as branch label", &arg.loc);
                false
            }
            Some(SymbolValue::Label(_)) => true,
        },
        _ => {
            messages.err_at("expected register or label", &arg.loc);
            false
        }
    }
}

fn assert_is_label(arg: &Arg, messages: &mut Messages) -> bool {
    if arg.sym().is_none() {
        messages.err_at("expected label", &arg.loc);
        false
    } else {
        true
    }
}

fn assert_is_string(arg: &Arg, messages: &mut Messages) -> bool {
    if arg.string().is_none() {
        messages.err_at("expected string literal", &arg.loc);
        false
    } else {
        true
    }
}

fn assert_is_integer(
    arg: &Arg,
    symbol_table: &SymbolTable,
    bits: u32,
    signed: bool,
    labels: bool,
    messages: &mut Messages,
) -> bool {
    let lo = if signed { -(1 << (bits - 1)) } else { 0 };
    let hi = 1 << bits;
    assert_in_range(arg, symbol_table, lo, hi, labels, messages)
}

fn assert_in_range(
    arg: &Arg,
    symbol_table: &SymbolTable,
    lo: i64,
    hi: i64,
    labels: bool,
    messages: &mut Messages,
) -> bool {
    let value = match &arg.value {
        ArgValue::Sym(s) => match symbol_table.get(s.as_str()) {
            None => {
                messages.err_at("undefined constant", &arg.loc);
                return false;
            }
            Some(SymbolValue::Constant(v)) => *v,
            Some(other) => {
                if labels {
                    other.value()
                } else {
                    messages.err_at("cannot use label as constant", &arg.loc);
                    return false;
                }
            }
        },
        ArgValue::Int(v) => *v,
        _ => {
            messages.err_at("expected integer", &arg.loc);
            return false;
        }
    };

    if (value as i64) < lo || (value as i64) >= hi {
        if lo == 0 && value < 0 {
            messages.err_at("must not be negative", &arg.loc);
        } else {
            messages.err_at(
                format!("integer must be in range [{}, {})", lo, hi),
                &arg.loc,
            );
        }
        false
    } else {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn typecheck_text(text: &str) -> (SymbolTable, Messages) {
        let settings = Settings::default();
        let (ops, parse_messages) = parse(text, None, &settings);
        assert!(
            !parse_messages.has_errors(),
            "parse errors: {:?}",
            parse_messages.errors
        );
        typecheck(&ops, &settings)
    }

    fn errors(text: &str) -> Vec<String> {
        let (_, messages) = typecheck_text(text);
        messages.errors.into_iter().map(|(m, _)| m).collect()
    }

    #[test]
    fn well_typed_program_has_no_errors() {
        assert!(errors("SET(R1, 40)\nSET(R2, 2)\nADD(R3, R1, R2)").is_empty());
    }

    #[test]
    fn labels_get_code_addresses() {
        let (symbols, messages) = typecheck_text("SET(R1, 1)\nLABEL(top)\nBR(top)");
        assert!(!messages.has_errors());
        assert_eq!(symbols.get("top"), Some(&SymbolValue::Label(2)));
    }

    #[test]
    fn register_branch_lengths_depend_on_operand() {
        let (symbols, _) =
            typecheck_text("LABEL(a)\nBR(R1)\nLABEL(b)\nBR(a)\nLABEL(c)");
        assert_eq!(symbols.get("a"), Some(&SymbolValue::Label(0)));
        assert_eq!(symbols.get("b"), Some(&SymbolValue::Label(1)));
        assert_eq!(symbols.get("c"), Some(&SymbolValue::Label(4)));
    }

    #[test]
    fn pseudo_op_lengths() {
        let (symbols, _) = typecheck_text(
            "SET(R1, 1)\nCMP(R1, R2)\nSETRF(R3, 4)\nFLAGS(R1)\nNEG(R1, R2)\nNOT(R1, R2)\nLABEL(end)",
        );
        assert_eq!(symbols.get("end"), Some(&SymbolValue::Label(15)));
    }

    #[test]
    fn data_labels_use_data_counter() {
        let (symbols, _) =
            typecheck_text("DLABEL(X)\nINTEGER(1)\nLP_STRING(\"ab\")\nDLABEL(Y)\nSET(R1, X)");
        assert_eq!(
            symbols.get("X"),
            Some(&SymbolValue::DataLabel(crate::data::DATA_START))
        );
        assert_eq!(
            symbols.get("Y"),
            Some(&SymbolValue::DataLabel(crate::data::DATA_START + 4))
        );
    }

    #[test]
    fn dskip_accepts_earlier_constants() {
        let (symbols, messages) =
            typecheck_text("CONSTANT(N, 10)\nDLABEL(A)\nDSKIP(N)\nDLABEL(B)\nSET(R1, A)");
        assert!(!messages.has_errors());
        assert_eq!(
            symbols.get("B"),
            Some(&SymbolValue::DataLabel(crate::data::DATA_START + 10))
        );
    }

    #[test]
    fn redeclaration_is_an_error() {
        let errs = errors("LABEL(x)\nDLABEL(x)\nINTEGER(1)");
        assert!(errs.iter().any(|e| e.contains("already been defined")));
    }

    #[test]
    fn data_after_code_is_an_error() {
        let errs = errors("SET(R1, 1)\nINTEGER(42)");
        assert_eq!(errs, vec!["data statement after code".to_owned()]);
    }

    #[test]
    fn forward_constant_reference_is_undefined() {
        let errs = errors("SET(R1, N)\nCONSTANT(N, 4)");
        assert!(errs.iter().any(|e| e.contains("undefined constant")));
    }

    #[test]
    fn labels_rejected_where_constants_required() {
        let errs = errors("LABEL(top)\nINC(R1, top)");
        assert!(errs.iter().any(|e| e.contains("cannot use label as constant")));
    }

    #[test]
    fn constants_rejected_as_branch_targets() {
        let errs = errors("CONSTANT(N, 4)\nBR(N)");
        assert!(errs.iter().any(|e| e.contains("constant cannot be used as label")));
    }

    #[test]
    fn data_labels_rejected_as_branch_targets() {
        let errs = errors("DLABEL(X)\nINTEGER(1)\nBR(X)");
        assert!(errs
            .iter()
            .any(|e| e.contains("data label cannot be used as branch label")));
    }

    #[test]
    fn relative_branches_reject_labels() {
        let errs = errors("LABEL(top)\nBRR(top)");
        assert!(errs
            .iter()
            .any(|e| e.contains("relative branches cannot use labels")));
        assert!(errs.iter().any(|e| e.contains("BR")));
    }

    #[test]
    fn arity_errors() {
        let errs = errors("ADD(R1, R2)\nSET(R1, 1, 2)");
        assert!(errs.iter().any(|e| e.contains("too few args to ADD")));
        assert!(errs.iter().any(|e| e.contains("too many args to SET")));
    }

    #[test]
    fn operand_range_errors() {
        assert!(errors("INC(R1, 65)")
            .iter()
            .any(|e| e.contains("integer must be in range [1, 65)")));
        assert!(errors("LOAD(R1, 32, R2)")
            .iter()
            .any(|e| e.contains("integer must be in range [0, 32)")));
        assert!(errors("FON(32)").iter().any(|e| e.contains("[0, 32)")));
        assert!(errors("FSET4(16)").iter().any(|e| e.contains("[0, 16)")));
        assert!(errors("DSKIP(-1)")
            .iter()
            .any(|e| e.contains("must not be negative")));
    }

    #[test]
    fn unknown_mnemonic_reported() {
        let errs = errors("FLY(R1)");
        assert_eq!(errs, vec!["unknown instruction `FLY`".to_owned()]);
    }

    #[test]
    fn one_op_can_produce_multiple_errors() {
        let errs = errors("ADD(1, 2, 3)");
        assert_eq!(errs.len(), 3);
    }

    #[test]
    fn data_counter_overflow_is_reported_once() {
        let errs = errors("DSKIP(0x4000)\nINTEGER(1)\nINTEGER(2)");
        assert_eq!(
            errs.iter()
                .filter(|e| e.contains("past the end of available memory"))
                .count(),
            1
        );
    }

    #[test]
    fn no_debug_ops_flag_rejects_debug_instructions() {
        let mut settings = Settings::default();
        settings.no_debug_ops = true;
        let (ops, _) = parse("print_reg(R1)", None, &settings);
        let (_, messages) = typecheck(&ops, &settings);
        assert!(messages
            .errors
            .iter()
            .any(|(e, _)| e.contains("debugging instructions disallowed")));
    }
}
