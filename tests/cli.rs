//! End-to-end tests of the `hera` binary: flags, subcommands, exit codes.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn hera() -> Command {
    Command::cargo_bin("hera").unwrap()
}

fn write_program(dir: &TempDir, name: &str, text: &str) -> String {
    let path = dir.path().join(name);
    fs::write(&path, text).unwrap();
    path.to_str().unwrap().to_owned()
}

#[test]
fn version_flag() {
    hera()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("hera-rs"));
    hera()
        .arg("-v")
        .assert()
        .success()
        .stdout(predicate::str::contains("HERA version 2.4"));
}

#[test]
fn help_flag() {
    hera()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Haverford Educational RISC Architecture"));
}

#[test]
fn credits_flag() {
    hera().arg("--credits").assert().success().stdout(
        predicate::str::contains("HERA").and(predicate::str::contains("Haverford")),
    );
}

#[test]
fn no_path_is_cli_misuse() {
    hera()
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No file path supplied."));
}

#[test]
fn quiet_and_verbose_conflict() {
    hera().args(["--quiet", "--verbose", "-"]).assert().code(1);
}

#[test]
fn executes_a_program_from_stdin() {
    hera()
        .arg("-")
        .write_stdin("SET(R1, 20)\nSET(R2, 22)\nADD(R3, R1, R2)\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("R3 ").and(predicate::str::contains("42")));
}

#[test]
fn quiet_mode_suppresses_the_state_dump() {
    hera()
        .args(["--quiet", "-"])
        .write_stdin("SET(R1, 1)\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("Virtual machine state").not());
}

#[test]
fn compile_errors_exit_three() {
    hera()
        .args(["--no-color", "-"])
        .write_stdin("FLY(R1)\n")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Error: unknown instruction `FLY`"));
}

#[test]
fn missing_file_exits_three() {
    hera()
        .args(["--no-color", "does-not-exist.hera"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn error_messages_point_at_the_source_line() {
    hera()
        .args(["--no-color", "-"])
        .write_stdin("SET(R1, 1)\nADD(R1, R2)\n")
        .assert()
        .code(3)
        .stderr(
            predicate::str::contains("too few args to ADD")
                .and(predicate::str::contains("line 2 col 1 of <stdin>"))
                .and(predicate::str::contains("ADD(R1, R2)")),
        );
}

#[test]
fn no_debug_ops_flag_rejects_print_reg() {
    hera()
        .args(["--no-debug-ops", "--no-color", "-"])
        .write_stdin("print_reg(R1)\n")
        .assert()
        .code(3)
        .stderr(predicate::str::contains(
            "debugging instructions disallowed with --no-debug-ops flag",
        ));
}

#[test]
fn preprocess_prints_the_expanded_program() {
    hera()
        .args(["preprocess", "-"])
        .write_stdin("DLABEL(X)\nINTEGER(42)\nSET(R1, X)\n")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("[DATA]")
                .and(predicate::str::contains("INTEGER(42)"))
                .and(predicate::str::contains("[CODE]"))
                .and(predicate::str::contains("SETLO(R1, 1)"))
                .and(predicate::str::contains("SETHI(R1, 192)")),
        );
}

#[test]
fn assemble_writes_object_files() {
    let dir = TempDir::new().unwrap();
    let path = write_program(&dir, "prog.hera", "SETLO(R1, 255)\nSETHI(R3, 42)\n");

    hera().args(["assemble", &path]).assert().success();

    let code = fs::read_to_string(format!("{}.lcode", path)).unwrap();
    assert_eq!(code, "e1ff\nf32a\n");

    let data = fs::read_to_string(format!("{}.ldata", path)).unwrap();
    assert!(data.starts_with("49152*0\n"));
}

#[test]
fn assemble_code_flag_prints_to_stdout() {
    let dir = TempDir::new().unwrap();
    let path = write_program(&dir, "prog.hera", "SETLO(R1, 255)\n");

    hera()
        .args(["assemble", "--code", &path])
        .assert()
        .success()
        .stdout("e1ff\n");
    assert!(!dir.path().join("prog.hera.lcode").exists());
}

#[test]
fn code_flag_without_assemble_is_misuse() {
    hera()
        .args(["--code", "-"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("assemble"));
}

#[test]
fn throttle_is_incompatible_with_preprocess() {
    hera()
        .args(["preprocess", "--throttle", "10", "x.hera"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--throttle is incompatible"));
}

#[test]
fn disassemble_round_trips_an_assembled_file() {
    let dir = TempDir::new().unwrap();
    let path = write_program(&dir, "prog.hera", "SET(R1, 0x1234)\nAND(R1, R7, R12)\n");

    hera().args(["assemble", &path]).assert().success();
    hera()
        .args(["disassemble", &format!("{}.lcode", path)])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("SETLO(R1, 52)")
                .and(predicate::str::contains("SETHI(R1, 18)"))
                .and(predicate::str::contains("AND(R1, R7, R12)")),
        );
}

#[test]
fn disassemble_reports_unknown_words() {
    let dir = TempDir::new().unwrap();
    let path = write_program(&dir, "bad.lcode", "e1ff\n0100\n");

    hera()
        .args(["--no-color", "disassemble", &path])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("unknown instruction (0x0100)"));
}

#[test]
fn warnings_do_not_change_the_exit_code() {
    hera()
        .args(["--no-color", "-"])
        .write_stdin("SWI(1)\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("Warning: SWI is a no-op"));
}

#[test]
fn octal_warning_is_opt_in() {
    hera()
        .args(["--no-color", "--quiet", "-"])
        .write_stdin("SET(R1, 0755)\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("0o").not());

    hera()
        .args(["--no-color", "--warn-octal-on", "--quiet", "-"])
        .write_stdin("SET(R1, 0755)\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("consider using \"0o\" prefix"));
}

#[test]
fn big_stack_moves_the_data_segment() {
    hera()
        .args(["--big-stack", "-"])
        .write_stdin("DLABEL(X)\nINTEGER(1)\nSET(R1, X)\n")
        .assert()
        .success()
        // 0xC167 in decimal.
        .stderr(predicate::str::contains("49511"));
}

#[test]
fn print_reg_writes_to_stdout() {
    hera()
        .args(["--quiet", "-"])
        .write_stdin("SET(R1, 42)\nprint_reg(R1)\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("R1 = 0x002a = 42"));
}
