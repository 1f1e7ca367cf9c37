//! The HERA assembler: encode a checked program into its object-file form.
//!
//! Assembling produces two sibling files, `<path>.lcode` and
//! `<path>.ldata`. The code file holds one hex-encoded 16-bit word per
//! line. The data file begins with `N*0` (N zero cells up to the data
//! origin), then the index of the first free cell after the data segment,
//! then one hex word per data cell.

use std::fs;
use std::io;

use crate::data::{Messages, Program, Settings};
use crate::preprocessor::data_words;

/// Encode the program's code and data segments. Debugging operations have
/// no binary form and are reported as errors.
pub fn assemble(program: &Program) -> Result<(Vec<u16>, Vec<u16>), Messages> {
    let mut messages = Messages::new();
    let mut code = Vec::new();

    for op in &program.code {
        match op.inst.encode() {
            Ok(word) => code.push(word),
            Err(e) => messages.err_at(format!("cannot assemble: {}", e), &op.loc),
        }
    }

    if messages.has_errors() {
        Err(messages)
    } else {
        Ok((code, data_words(&program.data)))
    }
}

/// The text of the `.lcode` file: one four-digit hex word per line.
pub fn code_text(code: &[u16]) -> String {
    let mut text = String::new();
    for word in code {
        text.push_str(&format!("{:04x}\n", word));
    }
    text
}

/// The text of the `.ldata` file.
pub fn data_text(data: &[u16], data_start: u16) -> String {
    let mut lines = vec![
        format!("{}*0", data_start - 1),
        format!("{:x}", data.len() as u32 + data_start as u32),
    ];
    lines.extend(data.iter().map(|word| format!("{:x}", word)));
    lines.join("\n") + "\n"
}

/// Write (or, with `--code`/`--data`, print) the assembled program.
pub fn assemble_and_write(
    program: &Program,
    settings: &Settings,
    path: &str,
) -> Result<(), Messages> {
    let (code, data) = assemble(program)?;
    let code = code_text(&code);
    let data = data_text(&data, settings.data_start);

    if settings.code {
        print!("{}", code);
        return Ok(());
    }
    if settings.data {
        print!("{}", data);
        return Ok(());
    }

    let stem = if path == "-" { "stdin" } else { path };
    write_object_file(&format!("{}.lcode", stem), &code)?;
    write_object_file(&format!("{}.ldata", stem), &data)?;
    Ok(())
}

fn write_object_file(path: &str, contents: &str) -> Result<(), Messages> {
    fs::write(path, contents).map_err(|e: io::Error| {
        let mut messages = Messages::new();
        messages.err(format!("could not write \"{}\": {}", path, e));
        messages
    })
}
