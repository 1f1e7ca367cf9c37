//! Surface operations: the uniform `mnemonic(args...)` form produced by the
//! parser and rewritten by the preprocessor.
//!
//! A surface op's arguments start out as registers, integers, symbols and
//! strings. The checker verifies them against each mnemonic's contract, the
//! preprocessor replaces symbols with concrete integers and expands
//! pseudo-operations, and only then are ops lowered into typed
//! [`Instruction`](crate::instruction::Instruction)s.

use std::fmt;

use crate::data::{to_u16, Location, Register};

/// Mnemonics that take three registers.
pub const BINARY_OPS: &[&str] = &["AND", "OR", "ADD", "SUB", "MUL", "XOR"];

/// Shift mnemonics: two registers.
pub const UNARY_OPS: &[&str] = &["LSL", "LSR", "LSL8", "LSR8", "ASL", "ASR"];

/// Branches whose target is a register (or a label materialized into R11).
pub const REGISTER_BRANCHES: &[&str] = &[
    "BR", "BL", "BGE", "BLE", "BG", "BULE", "BUG", "BZ", "BNZ", "BC", "BNC", "BS", "BNS", "BV",
    "BNV",
];

/// Branches whose target is a signed 8-bit offset from the program counter.
pub const RELATIVE_BRANCHES: &[&str] = &[
    "BRR", "BLR", "BGER", "BLER", "BGR", "BULER", "BUGR", "BZR", "BNZR", "BCR", "BNCR", "BSR",
    "BNSR", "BVR", "BNVR",
];

/// Statements that contribute to the data segment rather than the code.
pub const DATA_STATEMENTS: &[&str] = &[
    "CONSTANT",
    "DLABEL",
    "INTEGER",
    "LP_STRING",
    "TIGER_STRING",
    "DSKIP",
];

pub fn is_branch(name: &str) -> bool {
    REGISTER_BRANCHES.contains(&name) || RELATIVE_BRANCHES.contains(&name)
}

pub fn is_data_statement(name: &str) -> bool {
    DATA_STATEMENTS.contains(&name)
}

/// A single argument to a surface operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub value: ArgValue,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Reg(Register),
    Int(i32),
    Sym(String),
    Str(String),
}

impl Arg {
    pub fn reg(&self) -> Option<Register> {
        match self.value {
            ArgValue::Reg(r) => Some(r),
            _ => None,
        }
    }

    pub fn int(&self) -> Option<i32> {
        match self.value {
            ArgValue::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn sym(&self) -> Option<&str> {
        match &self.value {
            ArgValue::Sym(s) => Some(s),
            _ => None,
        }
    }

    pub fn string(&self) -> Option<&str> {
        match &self.value {
            ArgValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            ArgValue::Reg(r) => write!(f, "{}", r),
            ArgValue::Int(v) => write!(f, "{}", v),
            ArgValue::Sym(s) => write!(f, "{}", s),
            ArgValue::Str(s) => write!(f, "{:?}", s),
        }
    }
}

/// A surface operation: a mnemonic applied to a list of arguments, with the
/// location of the mnemonic token.
#[derive(Debug, Clone, PartialEq)]
pub struct Op {
    pub name: String,
    pub args: Vec<Arg>,
    pub loc: Location,
}

impl Op {
    pub fn new(name: impl Into<String>, args: Vec<Arg>, loc: Location) -> Self {
        Self {
            name: name.into(),
            args,
            loc,
        }
    }

    /// Construct a derived op at the same location, used by `convert`.
    fn derived(&self, name: &str, values: Vec<ArgValue>) -> Op {
        Op {
            name: name.to_owned(),
            args: values
                .into_iter()
                .map(|value| Arg {
                    value,
                    loc: self.loc.clone(),
                })
                .collect(),
            loc: self.loc.clone(),
        }
    }

    /// Expand a pseudo-operation into the real operations that implement it.
    ///
    /// All symbol arguments must already be replaced with their concrete
    /// values. Every pseudo-op expands to a fixed number of real ops so that
    /// the checker's operation lengths stay exact; in particular `SET`
    /// always becomes a SETLO/SETHI pair even when the high byte is zero.
    /// `LABEL`, `DLABEL` and `CONSTANT` expand to nothing.
    pub fn convert(&self) -> Vec<Op> {
        use ArgValue::{Int, Reg};

        match self.name.as_str() {
            "LABEL" | "DLABEL" | "CONSTANT" => vec![],
            "SET" => {
                let d = self.args[0].reg().expect("SET destination");
                let v = to_u16(self.args[1].int().expect("SET value")).expect("checked value");
                vec![
                    self.derived("SETLO", vec![Reg(d), Int((v & 0xFF) as i32)]),
                    self.derived("SETHI", vec![Reg(d), Int((v >> 8) as i32)]),
                ]
            }
            "SETRF" => {
                let d = self.args[0].reg().expect("SETRF destination");
                let mut ops = self.convert_as("SET");
                ops.push(self.derived("FOFF", vec![Int(8)]));
                ops.push(self.derived("ADD", vec![Reg(Register::R0), Reg(d), Reg(Register::R0)]));
                ops
            }
            "MOVE" => {
                let d = self.args[0].reg().expect("MOVE destination");
                let s = self.args[1].reg().expect("MOVE source");
                vec![self.derived("OR", vec![Reg(d), Reg(s), Reg(Register::R0)])]
            }
            "CMP" => {
                let a = self.args[0].reg().expect("CMP operand");
                let b = self.args[1].reg().expect("CMP operand");
                vec![
                    self.derived("FON", vec![Int(8)]),
                    self.derived("SUB", vec![Reg(Register::R0), Reg(a), Reg(b)]),
                ]
            }
            "CON" => vec![self.derived("FON", vec![Int(8)])],
            "COFF" => vec![self.derived("FOFF", vec![Int(8)])],
            "CBON" => vec![self.derived("FON", vec![Int(16)])],
            "CCBOFF" => vec![self.derived("FOFF", vec![Int(24)])],
            "FLAGS" => {
                let d = self.args[0].reg().expect("FLAGS operand");
                vec![
                    self.derived("FOFF", vec![Int(8)]),
                    self.derived("ADD", vec![Reg(Register::R0), Reg(d), Reg(Register::R0)]),
                ]
            }
            "NEG" => {
                let d = self.args[0].reg().expect("NEG destination");
                let s = self.args[1].reg().expect("NEG source");
                vec![
                    self.derived("FON", vec![Int(8)]),
                    self.derived("SUB", vec![Reg(d), Reg(Register::R0), Reg(s)]),
                ]
            }
            "NOT" => {
                let d = self.args[0].reg().expect("NOT destination");
                let s = self.args[1].reg().expect("NOT source");
                vec![
                    self.derived("SETLO", vec![Reg(Register::RT), Int(0xFF)]),
                    self.derived("SETHI", vec![Reg(Register::RT), Int(0xFF)]),
                    self.derived("XOR", vec![Reg(d), Reg(Register::RT), Reg(s)]),
                ]
            }
            "HALT" => vec![self.derived("BRR", vec![Int(0)])],
            "NOP" => vec![self.derived("BRR", vec![Int(1)])],
            "CALL" => match self.args[1].value {
                Reg(_) => vec![self.clone()],
                Int(target) => {
                    let a = self.args[0].reg().expect("CALL frame register");
                    let v = to_u16(target).expect("checked value");
                    vec![
                        self.derived("SETLO", vec![Reg(Register::PC_RET), Int((v & 0xFF) as i32)]),
                        self.derived("SETHI", vec![Reg(Register::PC_RET), Int((v >> 8) as i32)]),
                        self.derived("CALL", vec![Reg(a), Reg(Register::PC_RET)]),
                    ]
                }
                _ => vec![self.clone()],
            },
            name if REGISTER_BRANCHES.contains(&name) => match self.args[0].value {
                Reg(_) => vec![self.clone()],
                Int(target) => {
                    let v = to_u16(target).expect("checked value");
                    vec![
                        self.derived("SETLO", vec![Reg(Register::RT), Int((v & 0xFF) as i32)]),
                        self.derived("SETHI", vec![Reg(Register::RT), Int((v >> 8) as i32)]),
                        self.derived(name, vec![Reg(Register::RT)]),
                    ]
                }
                _ => vec![self.clone()],
            },
            _ => vec![self.clone()],
        }
    }

    /// Expand as if this op had a different mnemonic (SETRF reuses SET).
    fn convert_as(&self, name: &str) -> Vec<Op> {
        let mut aliased = self.clone();
        aliased.name = name.to_owned();
        aliased.convert()
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", arg)?;
        }
        write!(f, ")")
    }
}
