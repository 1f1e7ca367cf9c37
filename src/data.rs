//! Shared data types: source locations, tokens, the diagnostic sink, run
//! settings, and the symbol table.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::instruction::Instruction;
use crate::op::Op;

/// Default origin of the data segment.
pub const DATA_START: u16 = 0xC001;
/// Data segment origin under `--big-stack`, matching HERA-C.
pub const BIG_STACK_DATA_START: u16 = 0xC167;

/// A position in a source file.
///
/// Every location shares the full line listing of its file so that error
/// messages can render the offending line with a caret.
#[derive(Debug, Clone)]
pub struct Location {
    pub line: usize,
    pub column: usize,
    pub path: Rc<str>,
    pub file_lines: Rc<[String]>,
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.line == other.line && self.column == other.column && self.path == other.path
    }
}

impl Location {
    pub fn new(line: usize, column: usize, path: Rc<str>, file_lines: Rc<[String]>) -> Self {
        Self {
            line,
            column,
            path,
            file_lines,
        }
    }
}

/// The kinds of token produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Values
    Int,
    Register,
    Symbol,
    Str,
    Char,

    // Operators (used by the debugger's expression language)
    Minus,
    Plus,
    Asterisk,
    Slash,
    At,

    Lparen,
    Rparen,
    Lbrace,
    Rbrace,
    Comma,
    Semicolon,

    /// `:spec` format prefix for the debugger's print command.
    Fmt,
    /// A `#`-prefixed preprocessor directive (`#include`, `#ifdef`, ...).
    Include,
    /// The inner text of an angle-bracketed include path.
    Bracketed,
    Eof,
    Unknown,
}

/// A single token with its source location.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub location: Location,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, location: Location) -> Self {
        Self {
            kind,
            text: text.into(),
            location,
        }
    }
}

/// One of the sixteen HERA registers, stored by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Register(u8);

impl Register {
    pub const R0: Register = Register(0);
    pub const RT: Register = Register(11);
    pub const FP_ALT: Register = Register(12);
    pub const PC_RET: Register = Register(13);
    pub const FP: Register = Register(14);
    pub const SP: Register = Register(15);

    pub fn new(index: u8) -> Option<Register> {
        if index < 16 {
            Some(Register(index))
        } else {
            None
        }
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn field(self) -> u16 {
        self.0 as u16
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// Resolve a register spelling (`R7`, `Rt`, `FP_alt`, `SP`, `PC_ret`, `FP`)
/// to its index. `PC` is deliberately not accepted; the program counter is
/// not a general-purpose register.
pub fn register_to_index(name: &str) -> Result<Register, HeraError> {
    let lower = name.to_ascii_lowercase();
    let index = match lower.as_str() {
        "rt" => 11,
        "fp_alt" => 12,
        "pc_ret" => 13,
        "fp" => 14,
        "sp" => 15,
        _ => {
            let digits = lower
                .strip_prefix('r')
                .ok_or_else(|| HeraError::InvalidRegister(name.to_owned()))?;
            digits
                .parse::<u8>()
                .ok()
                .filter(|&v| v < 16)
                .ok_or_else(|| HeraError::InvalidRegister(name.to_owned()))?
        }
    };
    Ok(Register(index))
}

/// Reinterpret a signed integer as a 16-bit unsigned integer.
///
/// Accepts the full surface range of HERA integer literals: positive values
/// up to 2^16 and negative values down to -2^15.
pub fn to_u16(n: i32) -> Result<u16, HeraError> {
    if n >= 1 << 16 || n < -(1 << 15) {
        Err(HeraError::Eval(
            "signed integer too large for 16 bits".to_owned(),
        ))
    } else if n < 0 {
        Ok((n + (1 << 16)) as u16)
    } else {
        Ok(n as u16)
    }
}

/// Reinterpret an unsigned 16-bit integer as a signed integer.
pub fn from_u16(n: u16) -> i32 {
    n as i16 as i32
}

/// Render an integer according to a format specification.
///
/// Each character of `spec` selects one rendering: `d` decimal, `x` hex,
/// `o` octal, `b` binary, `c` character literal, `s` signed decimal. The
/// `c` and `s` formats are silent when inapplicable; `C` and `S` force
/// output either way. The renderings are joined with " = ".
pub fn format_int(v: u16, spec: &str) -> String {
    let mut parts = Vec::new();
    for c in spec.chars() {
        match c {
            'd' => parts.push(v.to_string()),
            'x' => parts.push(format!("{:#06x}", v)),
            'o' => parts.push(format!("0o{:0>8o}", v)),
            'b' => parts.push(format!("0b{:0>16b}", v)),
            'c' => {
                if v < 128 && !(v as u8 as char).is_control() {
                    parts.push(format!("{:?}", v as u8 as char));
                }
            }
            'C' => {
                if v < 128 {
                    parts.push(format!("{:?}", v as u8 as char));
                } else {
                    parts.push("not an ASCII character".to_owned());
                }
            }
            's' => {
                if v & 0x8000 != 0 {
                    parts.push(from_u16(v).to_string());
                }
            }
            'S' => {
                if v & 0x8000 != 0 {
                    parts.push(from_u16(v).to_string());
                } else {
                    parts.push("not a signed integer".to_owned());
                }
            }
            _ => {}
        }
    }
    parts.join(" = ")
}

/// The value bound to a name in the symbol table.
///
/// Code labels, data labels and constants all resolve to integers, but they
/// must stay distinguishable: a constant cannot be branched to, a label
/// cannot be used where a constant is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolValue {
    Label(u16),
    DataLabel(u16),
    Constant(i32),
}

impl SymbolValue {
    pub fn value(self) -> i32 {
        match self {
            SymbolValue::Label(v) | SymbolValue::DataLabel(v) => v as i32,
            SymbolValue::Constant(v) => v,
        }
    }
}

pub type SymbolTable = HashMap<String, SymbolValue>;

/// A fully checked and preprocessed program.
#[derive(Debug, Default)]
pub struct Program {
    /// Data statements, in data-segment order, with concrete arguments.
    pub data: Vec<Op>,
    /// Executable real operations.
    pub code: Vec<CodeOp>,
    pub symbol_table: SymbolTable,
}

/// One executable operation, annotated with the location it came from and
/// the user-written operation it was expanded from.
#[derive(Debug, Clone)]
pub struct CodeOp {
    pub inst: Instruction,
    pub loc: Location,
    /// The pre-expansion operation, shared between all real ops produced
    /// from the same original. The debugger displays this form.
    pub original: Option<Rc<Op>>,
}

/// The accumulating diagnostic sink.
///
/// Phases append as many errors and warnings as they can find; the driver
/// renders them all at once and decides the exit code.
#[derive(Debug, Default)]
pub struct Messages {
    pub errors: Vec<(String, Option<Location>)>,
    pub warnings: Vec<(String, Option<Location>)>,
}

impl Messages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn err(&mut self, msg: impl Into<String>) {
        self.errors.push((msg.into(), None));
    }

    pub fn err_at(&mut self, msg: impl Into<String>, loc: &Location) {
        self.errors.push((msg.into(), Some(loc.clone())));
    }

    pub fn warn_at(&mut self, msg: impl Into<String>, loc: &Location) {
        self.warnings.push((msg.into(), Some(loc.clone())));
    }

    pub fn extend(&mut self, other: Messages) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Output volume for the command-line driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Volume {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

/// Run-wide settings, assembled from command-line flags.
#[derive(Debug, Clone)]
pub struct Settings {
    pub color: bool,
    pub data_start: u16,
    pub no_debug_ops: bool,
    pub no_ret_warn: bool,
    pub warn_octal_on: bool,
    pub volume: Volume,
    pub throttle: Option<u64>,
    /// Initial register assignments from `--init`.
    pub init: Vec<(Register, u16)>,
    /// With `assemble`, print only the code segment to stdout.
    pub code: bool,
    /// With `assemble`, print only the data segment to stdout.
    pub data: bool,
    /// Warnings emitted so far, across all phases.
    pub warning_count: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            color: true,
            data_start: DATA_START,
            no_debug_ops: false,
            no_ret_warn: false,
            warn_octal_on: false,
            volume: Volume::Normal,
            throttle: None,
            init: Vec::new(),
            code: false,
            data: false,
            warning_count: 0,
        }
    }
}

/// Errors raised outside the accumulate-and-continue pipeline: file I/O,
/// disassembly of unknown words, and the debugger's expression language.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeraError {
    #[error("{0}")]
    Eval(String),
    #[error("{0}")]
    Syntax(String),
    #[error("{0} is not a valid register")]
    InvalidRegister(String),
    #[error("file \"{0}\" does not exist")]
    FileNotFound(String),
    #[error("could not open file \"{0}\"")]
    FileUnreadable(String),
    #[error("unknown instruction")]
    UnknownInstruction,
    #[error("all HERA operations are two bytes")]
    TruncatedWord,
    #[error("{0} has no binary encoding")]
    NotEncodable(&'static str),
}
