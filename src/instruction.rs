//! The typed instruction model: every real operation the machine can
//! execute, with its mnemonic, its 16-bit encoding pattern, and the
//! conversion from checked surface ops.
//!
//! Encoding and decoding are both driven by the pattern table, so
//! `decode(encode(inst))` is the identity by construction.

use std::fmt;

use crate::bits::{match_bits, substitute_bits, Fields};
use crate::data::{HeraError, Register};
use crate::op::Op;

/// A branch condition, shared by the register-target and relative forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Always,
    /// Signed less-than: sign xor overflow.
    L,
    /// Signed greater-or-equal.
    Ge,
    /// Signed less-or-equal.
    Le,
    /// Signed greater-than.
    G,
    /// Unsigned less-or-equal: not carry, or zero.
    Ule,
    /// Unsigned greater-than: carry and not zero.
    Ug,
    Zero,
    NotZero,
    Carry,
    NotCarry,
    Sign,
    NotSign,
    Overflow,
    NotOverflow,
}

impl Condition {
    pub const ALL: [Condition; 15] = [
        Condition::Always,
        Condition::L,
        Condition::Ge,
        Condition::Le,
        Condition::G,
        Condition::Ule,
        Condition::Ug,
        Condition::Zero,
        Condition::NotZero,
        Condition::Carry,
        Condition::NotCarry,
        Condition::Sign,
        Condition::NotSign,
        Condition::Overflow,
        Condition::NotOverflow,
    ];

    /// The register-branch mnemonic for this condition. The relative form
    /// appends "R".
    pub fn mnemonic(self) -> &'static str {
        match self {
            Condition::Always => "BR",
            Condition::L => "BL",
            Condition::Ge => "BGE",
            Condition::Le => "BLE",
            Condition::G => "BG",
            Condition::Ule => "BULE",
            Condition::Ug => "BUG",
            Condition::Zero => "BZ",
            Condition::NotZero => "BNZ",
            Condition::Carry => "BC",
            Condition::NotCarry => "BNC",
            Condition::Sign => "BS",
            Condition::NotSign => "BNS",
            Condition::Overflow => "BV",
            Condition::NotOverflow => "BNV",
        }
    }

    /// The condition's nibble in the branch encodings.
    pub fn field(self) -> u16 {
        match self {
            Condition::Always => 0b0000,
            Condition::L => 0b0010,
            Condition::Ge => 0b0011,
            Condition::Le => 0b0100,
            Condition::G => 0b0101,
            Condition::Ule => 0b0110,
            Condition::Ug => 0b0111,
            Condition::Zero => 0b1000,
            Condition::NotZero => 0b1001,
            Condition::Carry => 0b1010,
            Condition::NotCarry => 0b1011,
            Condition::Sign => 0b1100,
            Condition::NotSign => 0b1101,
            Condition::Overflow => 0b1110,
            Condition::NotOverflow => 0b1111,
        }
    }

    pub fn from_field(field: u16) -> Option<Condition> {
        Condition::ALL.iter().copied().find(|c| c.field() == field)
    }

    /// Look up a condition by its register-branch mnemonic.
    pub fn from_mnemonic(name: &str) -> Option<Condition> {
        Condition::ALL
            .iter()
            .copied()
            .find(|c| c.mnemonic() == name)
    }

    /// Look up a condition by its relative-branch mnemonic (`BRR`, `BZR`, ...).
    pub fn from_relative_mnemonic(name: &str) -> Option<Condition> {
        let base = name.strip_suffix('R')?;
        Condition::from_mnemonic(base)
    }
}

/// A real HERA operation with typed operands.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Setlo(Register, u8),
    Sethi(Register, u8),
    And(Register, Register, Register),
    Or(Register, Register, Register),
    Add(Register, Register, Register),
    Sub(Register, Register, Register),
    Mul(Register, Register, Register),
    Xor(Register, Register, Register),
    /// Increment by 1..=64.
    Inc(Register, u8),
    Dec(Register, u8),
    Lsl(Register, Register),
    Lsr(Register, Register),
    Lsl8(Register, Register),
    Lsr8(Register, Register),
    Asl(Register, Register),
    Asr(Register, Register),
    /// Set the flags named by the 5-bit mask.
    Fon(u8),
    Foff(u8),
    Fset5(u8),
    /// Assign the four low flags; carry-block is untouched.
    Fset4(u8),
    Savef(Register),
    Rstrf(Register),
    /// `LOAD(Rd, offset, Rs)` with a 5-bit unsigned offset.
    Load(Register, u8, Register),
    Store(Register, u8, Register),
    Branch(Condition, Register),
    BranchRel(Condition, i8),
    Call(Register, Register),
    Return(Register, Register),
    Swi(u8),
    Rti,

    // Debugging operations: executable, but with no binary encoding.
    PrintReg(Register),
    Print(String),
    Println(String),
}

/// Mnemonic-to-pattern table for every encodable operation. Branches are
/// listed via their condition nibble by `pattern_for`.
const PATTERNS: &[(&str, &str)] = &[
    ("SETLO", "1110AAAAvvvvvvvv"),
    ("SETHI", "1111AAAAvvvvvvvv"),
    ("AND", "1000AAAABBBBCCCC"),
    ("OR", "1001AAAABBBBCCCC"),
    ("ADD", "1010AAAABBBBCCCC"),
    ("SUB", "1011AAAABBBBCCCC"),
    ("MUL", "1100AAAABBBBCCCC"),
    ("XOR", "1101AAAABBBBCCCC"),
    // INC/DEC store the amount minus one in a six-bit field.
    ("INC", "0011AAAA10vvvvvv"),
    ("DEC", "0011AAAA11vvvvvv"),
    ("LSL", "0011AAAA0000BBBB"),
    ("LSR", "0011AAAA0001BBBB"),
    ("LSL8", "0011AAAA0010BBBB"),
    ("LSR8", "0011AAAA0011BBBB"),
    ("ASL", "0011AAAA0100BBBB"),
    ("ASR", "0011AAAA0101BBBB"),
    // Flag operations put the value's top bit in the second nibble.
    ("FON", "0011000v0110vvvv"),
    ("FSET5", "0011010v0110vvvv"),
    ("FOFF", "0011100v0110vvvv"),
    ("FSET4", "0011110v0110vvvv"),
    ("SAVEF", "0011AAAA01110000"),
    ("RSTRF", "0011AAAA01111000"),
    ("LOAD", "010oAAAAooooBBBB"),
    ("STORE", "011oAAAAooooBBBB"),
    ("CALL", "00100000AAAABBBB"),
    ("RETURN", "00100001AAAABBBB"),
    ("SWI", "001000100000vvvv"),
    ("RTI", "0010001100000000"),
];

impl Instruction {
    pub fn mnemonic(&self) -> String {
        match self {
            Instruction::Setlo(..) => "SETLO".to_owned(),
            Instruction::Sethi(..) => "SETHI".to_owned(),
            Instruction::And(..) => "AND".to_owned(),
            Instruction::Or(..) => "OR".to_owned(),
            Instruction::Add(..) => "ADD".to_owned(),
            Instruction::Sub(..) => "SUB".to_owned(),
            Instruction::Mul(..) => "MUL".to_owned(),
            Instruction::Xor(..) => "XOR".to_owned(),
            Instruction::Inc(..) => "INC".to_owned(),
            Instruction::Dec(..) => "DEC".to_owned(),
            Instruction::Lsl(..) => "LSL".to_owned(),
            Instruction::Lsr(..) => "LSR".to_owned(),
            Instruction::Lsl8(..) => "LSL8".to_owned(),
            Instruction::Lsr8(..) => "LSR8".to_owned(),
            Instruction::Asl(..) => "ASL".to_owned(),
            Instruction::Asr(..) => "ASR".to_owned(),
            Instruction::Fon(..) => "FON".to_owned(),
            Instruction::Foff(..) => "FOFF".to_owned(),
            Instruction::Fset5(..) => "FSET5".to_owned(),
            Instruction::Fset4(..) => "FSET4".to_owned(),
            Instruction::Savef(..) => "SAVEF".to_owned(),
            Instruction::Rstrf(..) => "RSTRF".to_owned(),
            Instruction::Load(..) => "LOAD".to_owned(),
            Instruction::Store(..) => "STORE".to_owned(),
            Instruction::Branch(c, _) => c.mnemonic().to_owned(),
            Instruction::BranchRel(c, _) => format!("{}R", c.mnemonic()),
            Instruction::Call(..) => "CALL".to_owned(),
            Instruction::Return(..) => "RETURN".to_owned(),
            Instruction::Swi(..) => "SWI".to_owned(),
            Instruction::Rti => "RTI".to_owned(),
            Instruction::PrintReg(..) => "print_reg".to_owned(),
            Instruction::Print(..) => "print".to_owned(),
            Instruction::Println(..) => "println".to_owned(),
        }
    }

    /// True for the debugging operations, which have no binary form and can
    /// be disallowed with `--no-debug-ops`.
    pub fn is_debug_op(&self) -> bool {
        matches!(
            self,
            Instruction::PrintReg(..) | Instruction::Print(..) | Instruction::Println(..)
        )
    }

    fn fields(&self) -> Fields {
        match *self {
            Instruction::Setlo(d, v) | Instruction::Sethi(d, v) => {
                vec![('A', d.field()), ('v', v as u16)]
            }
            Instruction::And(d, a, b)
            | Instruction::Or(d, a, b)
            | Instruction::Add(d, a, b)
            | Instruction::Sub(d, a, b)
            | Instruction::Mul(d, a, b)
            | Instruction::Xor(d, a, b) => {
                vec![('A', d.field()), ('B', a.field()), ('C', b.field())]
            }
            Instruction::Inc(d, v) | Instruction::Dec(d, v) => {
                vec![('A', d.field()), ('v', (v - 1) as u16)]
            }
            Instruction::Lsl(d, s)
            | Instruction::Lsr(d, s)
            | Instruction::Lsl8(d, s)
            | Instruction::Lsr8(d, s)
            | Instruction::Asl(d, s)
            | Instruction::Asr(d, s) => vec![('A', d.field()), ('B', s.field())],
            Instruction::Fon(v)
            | Instruction::Foff(v)
            | Instruction::Fset5(v)
            | Instruction::Fset4(v) => vec![('v', v as u16)],
            Instruction::Savef(d) | Instruction::Rstrf(d) => vec![('A', d.field())],
            Instruction::Load(d, o, s) | Instruction::Store(d, o, s) => {
                vec![('o', o as u16), ('A', d.field()), ('B', s.field())]
            }
            Instruction::Branch(_, d) => vec![('A', d.field())],
            Instruction::BranchRel(_, imm) => vec![('v', imm as u8 as u16)],
            Instruction::Call(a, b) | Instruction::Return(a, b) => {
                vec![('A', a.field()), ('B', b.field())]
            }
            Instruction::Swi(v) => vec![('v', v as u16)],
            Instruction::Rti => vec![],
            Instruction::PrintReg(..) | Instruction::Print(..) | Instruction::Println(..) => {
                vec![]
            }
        }
    }

    fn pattern(&self) -> Option<String> {
        match self {
            Instruction::Branch(c, _) => {
                Some(format!("0001{:04b}0000AAAA", c.field()))
            }
            Instruction::BranchRel(c, _) => Some(format!("0000{:04b}vvvvvvvv", c.field())),
            Instruction::PrintReg(..) | Instruction::Print(..) | Instruction::Println(..) => None,
            _ => {
                let name = self.mnemonic();
                PATTERNS
                    .iter()
                    .find(|(n, _)| *n == name)
                    .map(|(_, p)| (*p).to_owned())
            }
        }
    }

    /// Encode this operation into its 16-bit code unit.
    pub fn encode(&self) -> Result<u16, HeraError> {
        match self.pattern() {
            Some(pattern) => Ok(substitute_bits(&pattern, &self.fields())),
            None => Err(HeraError::NotEncodable(match self {
                Instruction::PrintReg(..) => "print_reg",
                Instruction::Print(..) => "print",
                Instruction::Println(..) => "println",
                _ => unreachable!("every real operation has a pattern"),
            })),
        }
    }

    /// Decode a 16-bit code unit back into an operation: the inverse of
    /// [`encode`](Instruction::encode).
    pub fn decode(word: u16) -> Result<Instruction, HeraError> {
        for &(name, pattern) in PATTERNS {
            if let Some(fields) = match_bits(pattern, word) {
                return Instruction::from_fields(name, &fields);
            }
        }

        // Branches, by condition nibble.
        if let Some(fields) = match_bits("0001cccc0000AAAA", word) {
            let cond = Condition::from_field(field(&fields, 'c'))
                .ok_or(HeraError::UnknownInstruction)?;
            let d = register(field(&fields, 'A'));
            return Ok(Instruction::Branch(cond, d));
        }
        if let Some(fields) = match_bits("0000ccccvvvvvvvv", word) {
            let cond = Condition::from_field(field(&fields, 'c'))
                .ok_or(HeraError::UnknownInstruction)?;
            return Ok(Instruction::BranchRel(cond, field(&fields, 'v') as u8 as i8));
        }

        Err(HeraError::UnknownInstruction)
    }

    fn from_fields(name: &str, fields: &Fields) -> Result<Instruction, HeraError> {
        let a = || register(field(fields, 'A'));
        let b = || register(field(fields, 'B'));
        let c = || register(field(fields, 'C'));
        let v = field(fields, 'v');

        Ok(match name {
            "SETLO" => Instruction::Setlo(a(), v as u8),
            "SETHI" => Instruction::Sethi(a(), v as u8),
            "AND" => Instruction::And(a(), b(), c()),
            "OR" => Instruction::Or(a(), b(), c()),
            "ADD" => Instruction::Add(a(), b(), c()),
            "SUB" => Instruction::Sub(a(), b(), c()),
            "MUL" => Instruction::Mul(a(), b(), c()),
            "XOR" => Instruction::Xor(a(), b(), c()),
            "INC" => Instruction::Inc(a(), v as u8 + 1),
            "DEC" => Instruction::Dec(a(), v as u8 + 1),
            "LSL" => Instruction::Lsl(a(), b()),
            "LSR" => Instruction::Lsr(a(), b()),
            "LSL8" => Instruction::Lsl8(a(), b()),
            "LSR8" => Instruction::Lsr8(a(), b()),
            "ASL" => Instruction::Asl(a(), b()),
            "ASR" => Instruction::Asr(a(), b()),
            "FON" => Instruction::Fon(v as u8),
            "FOFF" => Instruction::Foff(v as u8),
            "FSET5" => Instruction::Fset5(v as u8),
            "FSET4" => Instruction::Fset4(v as u8),
            "SAVEF" => Instruction::Savef(a()),
            "RSTRF" => Instruction::Rstrf(a()),
            "LOAD" => Instruction::Load(a(), field(fields, 'o') as u8, b()),
            "STORE" => Instruction::Store(a(), field(fields, 'o') as u8, b()),
            "CALL" => Instruction::Call(a(), b()),
            "RETURN" => Instruction::Return(a(), b()),
            "SWI" => Instruction::Swi(v as u8),
            "RTI" => Instruction::Rti,
            _ => return Err(HeraError::UnknownInstruction),
        })
    }

    /// Lower a checked, substituted, expanded surface op into its typed
    /// form. The checker guarantees the argument shapes; any mismatch here
    /// is an internal error.
    pub fn build(op: &Op) -> Result<Instruction, HeraError> {
        let internal =
            || HeraError::Eval(format!("malformed operation reached lowering: {}", op));

        let reg = |i: usize| op.args.get(i).and_then(|a| a.reg()).ok_or_else(internal);
        let int = |i: usize| op.args.get(i).and_then(|a| a.int()).ok_or_else(internal);
        let string = |i: usize| {
            op.args
                .get(i)
                .and_then(|a| a.string())
                .map(str::to_owned)
                .ok_or_else(internal)
        };
        // Immediates in [-128, 256) are stored as their low byte.
        let byte = |i: usize| int(i).map(|v| v as u8);

        if let Some(cond) = Condition::from_mnemonic(&op.name) {
            return Ok(Instruction::Branch(cond, reg(0)?));
        }
        if let Some(cond) = Condition::from_relative_mnemonic(&op.name) {
            return Ok(Instruction::BranchRel(cond, int(0)? as i8));
        }

        Ok(match op.name.as_str() {
            "SETLO" => Instruction::Setlo(reg(0)?, byte(1)?),
            "SETHI" => Instruction::Sethi(reg(0)?, byte(1)?),
            "AND" => Instruction::And(reg(0)?, reg(1)?, reg(2)?),
            "OR" => Instruction::Or(reg(0)?, reg(1)?, reg(2)?),
            "ADD" => Instruction::Add(reg(0)?, reg(1)?, reg(2)?),
            "SUB" => Instruction::Sub(reg(0)?, reg(1)?, reg(2)?),
            "MUL" => Instruction::Mul(reg(0)?, reg(1)?, reg(2)?),
            "XOR" => Instruction::Xor(reg(0)?, reg(1)?, reg(2)?),
            "INC" => Instruction::Inc(reg(0)?, int(1)? as u8),
            "DEC" => Instruction::Dec(reg(0)?, int(1)? as u8),
            "LSL" => Instruction::Lsl(reg(0)?, reg(1)?),
            "LSR" => Instruction::Lsr(reg(0)?, reg(1)?),
            "LSL8" => Instruction::Lsl8(reg(0)?, reg(1)?),
            "LSR8" => Instruction::Lsr8(reg(0)?, reg(1)?),
            "ASL" => Instruction::Asl(reg(0)?, reg(1)?),
            "ASR" => Instruction::Asr(reg(0)?, reg(1)?),
            "FON" => Instruction::Fon(int(0)? as u8),
            "FOFF" => Instruction::Foff(int(0)? as u8),
            "FSET5" => Instruction::Fset5(int(0)? as u8),
            "FSET4" => Instruction::Fset4(int(0)? as u8),
            "SAVEF" => Instruction::Savef(reg(0)?),
            "RSTRF" => Instruction::Rstrf(reg(0)?),
            "LOAD" => Instruction::Load(reg(0)?, int(1)? as u8, reg(2)?),
            "STORE" => Instruction::Store(reg(0)?, int(1)? as u8, reg(2)?),
            "CALL" => Instruction::Call(reg(0)?, reg(1)?),
            "RETURN" => Instruction::Return(reg(0)?, reg(1)?),
            "SWI" => Instruction::Swi(int(0)? as u8),
            "RTI" => Instruction::Rti,
            "print_reg" => Instruction::PrintReg(reg(0)?),
            "print" => Instruction::Print(string(0)?),
            "println" => Instruction::Println(string(0)?),
            _ => return Err(internal()),
        })
    }
}

fn field(fields: &Fields, name: char) -> u16 {
    fields
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, v)| *v)
        .unwrap_or(0)
}

fn register(index: u16) -> Register {
    Register::new(index as u8).expect("4-bit register field")
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Setlo(d, v) | Instruction::Sethi(d, v) => {
                write!(f, "{}({}, {})", self.mnemonic(), d, v)
            }
            Instruction::And(d, a, b)
            | Instruction::Or(d, a, b)
            | Instruction::Add(d, a, b)
            | Instruction::Sub(d, a, b)
            | Instruction::Mul(d, a, b)
            | Instruction::Xor(d, a, b) => {
                write!(f, "{}({}, {}, {})", self.mnemonic(), d, a, b)
            }
            Instruction::Inc(d, v) | Instruction::Dec(d, v) => {
                write!(f, "{}({}, {})", self.mnemonic(), d, v)
            }
            Instruction::Lsl(d, s)
            | Instruction::Lsr(d, s)
            | Instruction::Lsl8(d, s)
            | Instruction::Lsr8(d, s)
            | Instruction::Asl(d, s)
            | Instruction::Asr(d, s) => write!(f, "{}({}, {})", self.mnemonic(), d, s),
            Instruction::Fon(v)
            | Instruction::Foff(v)
            | Instruction::Fset5(v)
            | Instruction::Fset4(v)
            | Instruction::Swi(v) => write!(f, "{}({})", self.mnemonic(), v),
            Instruction::Savef(d) | Instruction::Rstrf(d) | Instruction::PrintReg(d) => {
                write!(f, "{}({})", self.mnemonic(), d)
            }
            Instruction::Load(d, o, s) | Instruction::Store(d, o, s) => {
                write!(f, "{}({}, {}, {})", self.mnemonic(), d, o, s)
            }
            Instruction::Branch(_, d) => write!(f, "{}({})", self.mnemonic(), d),
            Instruction::BranchRel(_, imm) => write!(f, "{}({})", self.mnemonic(), imm),
            Instruction::Call(a, b) | Instruction::Return(a, b) => {
                write!(f, "{}({}, {})", self.mnemonic(), a, b)
            }
            Instruction::Rti => write!(f, "RTI()"),
            Instruction::Print(s) | Instruction::Println(s) => {
                write!(f, "{}({:?})", self.mnemonic(), s)
            }
        }
    }
}
