//! The disassembler: the literal inverse of the assembler.
//!
//! Every encodable operation round-trips: decoding the word an operation
//! assembles to yields the operation back. Unknown bit patterns are
//! reported with the offending bytes.

use crate::data::{HeraError, Messages};
use crate::instruction::Instruction;

/// Decode a single two-byte code unit.
pub fn disassemble(data: &[u8]) -> Result<Instruction, HeraError> {
    if data.len() != 2 {
        return Err(HeraError::TruncatedWord);
    }
    let word = u16::from_be_bytes([data[0], data[1]]);
    Instruction::decode(word)
}

/// Disassemble the text of a `.lcode` file: one hex word per line. Bad
/// lines are reported and skipped so the rest of the file still decodes.
pub fn disassemble_code_file(text: &str) -> (Vec<Instruction>, Messages) {
    let mut ops = Vec::new();
    let mut messages = Messages::new();

    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match u16::from_str_radix(line, 16) {
            Ok(word) => match Instruction::decode(word) {
                Ok(op) => ops.push(op),
                Err(_) => {
                    messages.err(format!(
                        "unknown instruction (0x{:04x}) on line {}",
                        word,
                        lineno + 1
                    ));
                }
            },
            Err(_) => {
                messages.err(format!(
                    "invalid hex word `{}` on line {}",
                    line,
                    lineno + 1
                ));
            }
        }
    }

    (ops, messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Register;
    use crate::instruction::Condition;

    fn r(i: u8) -> Register {
        Register::new(i).unwrap()
    }

    #[test]
    fn disassemble_byte_pairs() {
        assert_eq!(
            disassemble(&[0xE1, 0xFF]).unwrap(),
            Instruction::Setlo(r(1), 255)
        );
        assert_eq!(
            disassemble(&[0xF3, 0x2A]).unwrap(),
            Instruction::Sethi(r(3), 42)
        );
        assert_eq!(
            disassemble(&[0x81, 0x7C]).unwrap(),
            Instruction::And(r(1), r(7), r(12))
        );
    }

    #[test]
    fn wrong_length_is_an_error() {
        assert_eq!(disassemble(&[0xE1]), Err(HeraError::TruncatedWord));
        assert_eq!(
            disassemble(&[0xE1, 0xFF, 0x00]),
            Err(HeraError::TruncatedWord)
        );
    }

    #[test]
    fn code_file_round_trip() {
        let text = "e1ff\nf32a\n20cd\n0000\n";
        let (ops, messages) = disassemble_code_file(text);
        assert!(!messages.has_errors());
        assert_eq!(
            ops,
            vec![
                Instruction::Setlo(r(1), 255),
                Instruction::Sethi(r(3), 42),
                Instruction::Call(r(12), r(13)),
                Instruction::BranchRel(Condition::Always, 0),
            ]
        );
    }

    #[test]
    fn bad_lines_are_reported_and_skipped() {
        let (ops, messages) = disassemble_code_file("e1ff\nzzzz\n0100\nf32a\n");
        assert_eq!(ops.len(), 2);
        assert_eq!(messages.errors.len(), 2);
        assert!(messages.errors[0].0.contains("invalid hex word `zzzz`"));
        assert!(messages.errors[1].0.contains("unknown instruction (0x0100)"));
    }
}
