//! Include resolution: relative paths, recursion detection, and the
//! embedded standard library.

mod common;

use std::fs;

use hera::data::Settings;
use hera::parser::parse;
use tempfile::TempDir;

fn parse_file(dir: &TempDir, name: &str) -> (usize, Vec<String>, Vec<String>) {
    let path = dir.path().join(name);
    let text = fs::read_to_string(&path).unwrap();
    let settings = Settings::default();
    let (ops, messages) = parse(&text, Some(path.to_str().unwrap()), &settings);
    (
        ops.len(),
        messages.errors.into_iter().map(|(m, _)| m).collect(),
        messages.warnings.into_iter().map(|(m, _)| m).collect(),
    )
}

#[test]
fn include_pastes_ops_in_place() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("lib.hera"), "SET(R2, 2)\n").unwrap();
    fs::write(
        dir.path().join("main.hera"),
        "SET(R1, 1)\n#include \"lib.hera\"\nSET(R3, 3)\n",
    )
    .unwrap();

    let (count, errors, _) = parse_file(&dir, "main.hera");
    assert!(errors.is_empty(), "{:?}", errors);
    assert_eq!(count, 3);
}

#[test]
fn includes_resolve_relative_to_the_including_file() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("sub/inner.hera"), "SET(R2, 2)\n").unwrap();
    fs::write(
        dir.path().join("sub/outer.hera"),
        "#include \"inner.hera\"\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("main.hera"),
        "#include \"sub/outer.hera\"\nSET(R1, 1)\n",
    )
    .unwrap();

    let (count, errors, _) = parse_file(&dir, "main.hera");
    assert!(errors.is_empty(), "{:?}", errors);
    assert_eq!(count, 2);
}

#[test]
fn self_include_is_recursive() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("loop.hera"), "#include \"loop.hera\"\n").unwrap();

    let (_, errors, _) = parse_file(&dir, "loop.hera");
    assert_eq!(errors, vec!["recursive include".to_owned()]);
}

#[test]
fn mutual_includes_are_recursive() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.hera"), "#include \"b.hera\"\n").unwrap();
    fs::write(dir.path().join("b.hera"), "#include \"a.hera\"\n").unwrap();

    let (_, errors, _) = parse_file(&dir, "a.hera");
    assert_eq!(errors, vec!["recursive include".to_owned()]);
}

#[test]
fn repeated_include_at_different_sites_is_recursive() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("lib.hera"), "SET(R2, 2)\n").unwrap();
    fs::write(
        dir.path().join("main.hera"),
        "#include \"lib.hera\"\n#include \"lib.hera\"\n",
    )
    .unwrap();

    let (count, errors, _) = parse_file(&dir, "main.hera");
    assert_eq!(errors, vec!["recursive include".to_owned()]);
    assert_eq!(count, 1);
}

#[test]
fn missing_include_reports_the_path() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("main.hera"), "#include \"gone.hera\"\n").unwrap();

    let (_, errors, _) = parse_file(&dir, "main.hera");
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("does not exist"));
    assert!(errors[0].contains("gone.hera"));
}

#[test]
fn hera_h_is_dropped_with_a_warning() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("main.hera"),
        "#include <HERA.h>\nvoid HERA_main() {\n  SET(R1, 1)\n}\n",
    )
    .unwrap();

    let (count, errors, warnings) = parse_file(&dir, "main.hera");
    assert!(errors.is_empty());
    assert_eq!(count, 1);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("not necessary"));
}

#[test]
fn stdlib_program_loads_and_runs() {
    let text = "\
#include <Tiger-stdlib-stack-data.hera>
SET(SP, 0x100)
MOVE(FP, SP)
SET(R1, 6)
STORE(R1, 3, FP)
MOVE(FP_alt, FP)
CALL(FP_alt, malloc)
LOAD(R2, 3, FP)
STORE(R2, 3, FP)
MOVE(FP_alt, FP)
CALL(FP_alt, free)
HALT()
#include <Tiger-stdlib-stack.hera>
";
    let program = common::load(text);
    let mut vm = hera::VirtualMachine::new(Settings::default());
    vm.exec_many(&program);
    // malloc returned the base of the arena.
    assert_eq!(vm.registers[2], 0xE000);
}
