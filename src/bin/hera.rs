use std::io::{self, Read};
use std::process::exit;

use clap::error::ErrorKind;
use clap::Parser;

use hera::cli::{Cli, Mode};
use hera::data::{Program, Settings, Volume};
use hera::{assembler, debugger, disassembler, load_program, VirtualMachine};

mod formatting;

/// Exit code for compilation and load errors. CLI misuse exits 1.
const COMPILE_ERROR: i32 = 3;

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            exit(0);
        }
        Err(e) => {
            let _ = e.print();
            exit(1);
        }
    };

    if cli.credits {
        println!("{}", hera::CREDITS);
        return;
    }

    if let Err(msg) = cli.validate() {
        eprintln!("{}", msg);
        exit(1);
    }

    let mut settings = match cli.to_settings() {
        Ok(settings) => settings,
        Err(msg) => {
            eprintln!("{}", msg);
            exit(1);
        }
    };
    if !formatting::stderr_is_tty() {
        settings.color = false;
    }

    let path = match cli.target_path() {
        Some(path) => path.to_owned(),
        None => {
            eprintln!("No file path supplied.");
            exit(1);
        }
    };

    match cli.command {
        None => run_execute(&path, &settings),
        Some(Mode::Preprocess { .. }) => run_preprocess(&path, &settings),
        Some(Mode::Debug { .. }) => run_debug(&path, &settings),
        Some(Mode::Assemble { .. }) => run_assemble(&path, &settings),
        Some(Mode::Disassemble { .. }) => run_disassemble(&path, &settings),
    }
}

/// Read the program source, either from a file or from standard input when
/// the path is "-".
fn read_source(path: &str, settings: &Settings) -> String {
    if path == "-" {
        let mut text = String::new();
        if io::stdin().read_to_string(&mut text).is_err() {
            eprintln!("could not read standard input");
            exit(COMPILE_ERROR);
        }
        // Separate the program from its output visually.
        println!();
        text
    } else {
        match hera::parser::read_file(path) {
            Ok(text) => text,
            Err(e) => {
                formatting::print_error(&e.to_string(), None, settings);
                exit(COMPILE_ERROR);
            }
        }
    }
}

/// Load a program, printing every accumulated diagnostic. Exits with code 3
/// if any phase reported errors.
fn load_or_exit(path: &str, settings: &mut Settings) -> Program {
    let text = read_source(path, settings);
    let source_path = if path == "-" { "<stdin>" } else { path };
    let (program, messages) = load_program(&text, Some(source_path), settings);
    formatting::print_messages(&messages, settings);
    match program {
        Some(program) => program,
        None => exit(COMPILE_ERROR),
    }
}

fn run_execute(path: &str, settings: &Settings) {
    let mut settings = settings.clone();
    let program = load_or_exit(path, &mut settings);

    let mut vm = VirtualMachine::new(settings.clone());
    vm.exec_many(&program);
    settings.warning_count += vm.warning_count;

    if settings.volume != Volume::Quiet {
        formatting::dump_state(&vm, &settings);
    }
}

fn run_preprocess(path: &str, settings: &Settings) {
    let mut settings = settings.clone();
    let program = load_or_exit(path, &mut settings);

    if !program.data.is_empty() {
        println!("[DATA]");
        for data_op in &program.data {
            println!("  {}", data_op);
        }
        if !program.code.is_empty() {
            println!();
            println!("[CODE]");
        }
    }

    for (i, op) in program.code.iter().enumerate() {
        println!("  {:0>4}  {}", i, op.inst);
    }
}

fn run_debug(path: &str, settings: &Settings) {
    let mut settings = settings.clone();
    let program = load_or_exit(path, &mut settings);
    debugger::debug(program, &settings);
}

fn run_assemble(path: &str, settings: &Settings) {
    let mut settings = settings.clone();
    let program = load_or_exit(path, &mut settings);

    if let Err(messages) = assembler::assemble_and_write(&program, &settings, path) {
        formatting::print_messages(&messages, &mut settings);
        exit(COMPILE_ERROR);
    }
}

fn run_disassemble(path: &str, settings: &Settings) {
    let mut settings = settings.clone();
    let text = read_source(path, &settings);
    let (ops, messages) = disassembler::disassemble_code_file(&text);
    formatting::print_messages(&messages, &mut settings);
    for op in &ops {
        println!("{}", op);
    }
    if messages.has_errors() {
        exit(COMPILE_ERROR);
    }
}
