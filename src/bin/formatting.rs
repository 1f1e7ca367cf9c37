//! Terminal rendering for the driver: colored diagnostics with source
//! carets, and the post-run machine-state dump.

use std::io;

use crossterm::style::Stylize;
use crossterm::tty::IsTty;

use hera::data::{format_int, Location, Messages, Settings, Volume};
use hera::VirtualMachine;

pub fn stderr_is_tty() -> bool {
    io::stderr().is_tty()
}

/// Print every accumulated warning and error, counting the warnings into
/// the settings.
pub fn print_messages(messages: &Messages, settings: &mut Settings) {
    for (msg, loc) in &messages.warnings {
        print_warning(msg, loc.as_ref(), settings);
    }
    settings.warning_count += messages.warnings.len() as u32;

    for (msg, loc) in &messages.errors {
        print_error(msg, loc.as_ref(), settings);
    }
}

pub fn print_warning(msg: &str, loc: Option<&Location>, settings: &Settings) {
    let prefix = if settings.color {
        format!("{}", "Warning".magenta().bold())
    } else {
        "Warning".to_owned()
    };
    print_message(&format!("{}: {}", prefix, msg), loc);
}

pub fn print_error(msg: &str, loc: Option<&Location>, settings: &Settings) {
    let prefix = if settings.color {
        format!("{}", "Error".red().bold())
    } else {
        "Error".to_owned()
    };
    print_message(&format!("{}: {}", prefix, msg), loc);
}

/// Print a message to stderr. With a location, the offending line is shown
/// with a caret underneath the offending column.
fn print_message(msg: &str, loc: Option<&Location>) {
    match loc {
        Some(loc) => {
            let line_text = loc
                .file_lines
                .get(loc.line.saturating_sub(1))
                .map(String::as_str)
                .unwrap_or("");
            if line_text.trim().is_empty() {
                eprintln!("{}, line {} col {} of {}", msg, loc.line, loc.column, loc.path);
            } else {
                let caret = align_caret(line_text, loc.column);
                eprintln!(
                    "{}, line {} col {} of {}\n\n  {}\n  {}^\n",
                    msg, loc.line, loc.column, loc.path, line_text, caret
                );
            }
        }
        None => eprintln!("{}", msg),
    }
}

/// The whitespace needed to put a caret under the desired column. Tabs in
/// the line must stay tabs so the caret lines up.
fn align_caret(line: &str, column: usize) -> String {
    line.chars()
        .take(column.saturating_sub(1))
        .map(|c| if c == '\t' { '\t' } else { ' ' })
        .collect()
}

/// Print the virtual machine's registers and flags to stderr, in the style
/// of the post-execution report.
pub fn dump_state(vm: &VirtualMachine, settings: &Settings) {
    let verbose = settings.volume == Volume::Verbose;

    let last_register = if verbose {
        15
    } else {
        let mut last = 10;
        while last > 0 && vm.registers[last] == 0 {
            last -= 1;
        }
        last
    };

    eprintln!("\nVirtual machine state after execution:");
    for i in 1..=last_register {
        let name = format!("    R{}{}", i, if i < 10 { " " } else { "" });
        eprintln!("{} = {}", name, format_int(vm.registers[i], "xdsc"));
    }

    if last_register > 0 {
        eprintln!();
    } else {
        eprintln!("    R1 through R10 are all zero.\n");
    }

    let flags = [
        vm.flag_carry_block,
        vm.flag_carry,
        vm.flag_overflow,
        vm.flag_zero,
        vm.flag_sign,
    ];
    if !verbose && flags.iter().all(|f| *f) {
        eprintln!("    All flags are ON");
    } else if !verbose && flags.iter().all(|f| !*f) {
        eprintln!("    All flags are OFF");
    } else {
        eprintln!(
            "    Carry-block flag is {}",
            if vm.flag_carry_block { "ON" } else { "OFF" }
        );
        eprintln!("    Carry flag is {}", if vm.flag_carry { "ON" } else { "OFF" });
        eprintln!(
            "    Overflow flag is {}",
            if vm.flag_overflow { "ON" } else { "OFF" }
        );
        eprintln!("    Zero flag is {}", if vm.flag_zero { "ON" } else { "OFF" });
        eprintln!("    Sign flag is {}", if vm.flag_sign { "ON" } else { "OFF" });
    }

    if settings.warning_count > 0 {
        let count = settings.warning_count;
        eprintln!(
            "\n{} warning{} emitted.",
            count,
            if count == 1 { "" } else { "s" }
        );
    }
}
