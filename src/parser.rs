//! The parser for the HERA language.
//!
//! Abstract grammar:
//!
//! ```text
//!   program := (op | include | conditional-block | cpp-boilerplate)*
//!
//!   op      := SYMBOL LPAREN arglist? RPAREN SEMICOLON?
//!   include := INCLUDE (STRING | BRACKETED)
//!
//!   arglist := (value COMMA)* value
//! ```
//!
//! `#include "file"` pastes the parsed contents of another file in place;
//! `#include <file>` consults the embedded standard-library table and the
//! `HERA_C_DIR` search root. `#ifdef`/`#ifndef`/`#else`/`#endif` blocks are
//! evaluated here, before any op is built. Errors do not stop the parse:
//! the parser resynchronizes and keeps going so one run reports as much as
//! possible.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::data::{register_to_index, HeraError, Messages, Settings, Token, TokenKind};
use crate::lexer::Lexer;
use crate::op::{Arg, ArgValue, Op};
use crate::stdlib::{TIGER_STDLIB_STACK, TIGER_STDLIB_STACK_DATA};

/// Symbols that are defined for `#ifdef` before parsing begins. `HERA_CPP`
/// is deliberately absent.
const DEFINED_SYMBOLS: &[&str] = &["HERA_RS", "HERA_PY"];

const DEFAULT_LIBRARY_DIR: &str = "/home/courses/lib/HERA-lib";

/// Parse a HERA program. `path` is how the file is named in diagnostics; it
/// defaults to `<string>`.
pub fn parse(text: &str, path: Option<&str>, settings: &Settings) -> (Vec<Op>, Messages) {
    let mut parser = Parser::new(settings);
    let mut lexer = Lexer::new(text, path);
    let ops = parser.parse(&mut lexer);
    (ops, parser.messages)
}

/// Read a file into a string, translating I/O failures into HERA errors.
pub fn read_file(path: &str) -> Result<String, HeraError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(HeraError::FileNotFound(path.to_owned()))
        }
        Err(_) => Err(HeraError::FileUnreadable(path.to_owned())),
    }
}

struct Parser<'a> {
    /// Canonical paths of every file entered, for recursive-include
    /// detection.
    visited: HashSet<PathBuf>,
    settings: &'a Settings,
    messages: Messages,
}

impl<'a> Parser<'a> {
    fn new(settings: &'a Settings) -> Self {
        Self {
            visited: HashSet::new(),
            settings,
            messages: Messages::new(),
        }
    }

    fn parse(&mut self, lexer: &mut Lexer) -> Vec<Op> {
        self.visited.insert(get_canonical_path(lexer.path()));
        let ops = self.match_program(lexer);
        // Capture any diagnostics the lexer produced along the way.
        self.messages.extend(std::mem::take(&mut lexer.messages));
        ops
    }

    fn match_program(&mut self, lexer: &mut Lexer) -> Vec<Op> {
        let mut ops = Vec::new();
        let mut expecting_brace = false;
        // One entry per #ifdef/#ifndef block we are currently inside.
        let mut conditionals: Vec<Token> = Vec::new();

        while lexer.tkn.kind != TokenKind::Eof {
            match lexer.tkn.kind {
                TokenKind::Include => {
                    let directive = lexer.tkn.clone();
                    match directive.text.as_str() {
                        "include" => ops.extend(self.match_include(lexer)),
                        "ifdef" | "ifndef" => {
                            self.match_conditional(lexer, &directive, &mut conditionals)
                        }
                        "else" => {
                            lexer.next_token();
                            if conditionals.is_empty() {
                                self.err("#else without matching #ifdef", &directive);
                            } else {
                                // The active branch ends here; skip its #else arm.
                                self.skip_conditional(lexer, &directive, true);
                                conditionals.pop();
                            }
                        }
                        "endif" => {
                            lexer.next_token();
                            if conditionals.pop().is_none() {
                                self.err("#endif without matching #ifdef", &directive);
                            }
                        }
                        _ => {
                            self.err(
                                format!("unknown preprocessor directive `#{}`", directive.text),
                                &directive,
                            );
                            lexer.next_token();
                        }
                    }
                }
                TokenKind::Symbol => {
                    let name_tkn = lexer.tkn.clone();
                    lexer.next_token();
                    // Legacy HERA programs wrap their ops in
                    // void HERA_main() { ... }.
                    if lexer.tkn.kind == TokenKind::Symbol && name_tkn.text == "void" {
                        expecting_brace = true;
                        self.match_cpp_boilerplate(lexer);
                    } else if lexer.tkn.kind == TokenKind::Lparen {
                        if let Some(op) = self.match_op(lexer, name_tkn) {
                            ops.push(op);
                        }
                        if lexer.tkn.kind == TokenKind::Semicolon {
                            lexer.next_token();
                        }
                    } else {
                        self.err("expected left parenthesis", &lexer.tkn.clone());
                    }
                }
                TokenKind::Rbrace => {
                    if expecting_brace {
                        expecting_brace = false;
                    } else {
                        self.err("unexpected right brace", &lexer.tkn.clone());
                    }
                    lexer.next_token();
                }
                _ => {
                    self.err("expected HERA operation or #include", &lexer.tkn.clone());
                    self.skip_until(lexer, &[TokenKind::Include, TokenKind::Symbol]);
                }
            }
        }

        for directive in conditionals {
            self.err("#ifdef block is never closed", &directive);
        }

        ops
    }

    /// Evaluate an `#ifdef NAME` or `#ifndef NAME` directive. If the block
    /// is inactive, skip ahead to its `#else` or `#endif`.
    fn match_conditional(
        &mut self,
        lexer: &mut Lexer,
        directive: &Token,
        conditionals: &mut Vec<Token>,
    ) {
        lexer.next_token();
        if lexer.tkn.kind != TokenKind::Symbol {
            self.err("expected symbol after preprocessor directive", &lexer.tkn.clone());
            return;
        }
        let defined = DEFINED_SYMBOLS.contains(&lexer.tkn.text.as_str());
        let active = defined == (directive.text == "ifdef");
        lexer.next_token();

        if active {
            conditionals.push(directive.clone());
        } else if self.skip_conditional(lexer, directive, false) {
            // Skipping stopped at #else: the else-arm is parsed normally.
            conditionals.push(directive.clone());
        }
    }

    /// Consume tokens until the `#endif` (or, when `to_end` is false, the
    /// `#else`) that matches the current block, honoring nesting. Returns
    /// true if stopped at `#else`.
    fn skip_conditional(&mut self, lexer: &mut Lexer, directive: &Token, to_end: bool) -> bool {
        let mut depth = 0usize;
        loop {
            match lexer.tkn.kind {
                TokenKind::Eof => {
                    self.err("#ifdef block is never closed", directive);
                    return false;
                }
                TokenKind::Include => {
                    match lexer.tkn.text.as_str() {
                        "ifdef" | "ifndef" => depth += 1,
                        "endif" => {
                            if depth == 0 {
                                lexer.next_token();
                                return false;
                            }
                            depth -= 1;
                        }
                        "else" => {
                            if depth == 0 && !to_end {
                                lexer.next_token();
                                return true;
                            }
                        }
                        _ => {}
                    }
                    lexer.next_token();
                }
                _ => {
                    lexer.next_token();
                }
            }
        }
    }

    /// Match an operation, assuming the current token is the left
    /// parenthesis. Unknown mnemonics are kept; the checker reports them.
    fn match_op(&mut self, lexer: &mut Lexer, name_tkn: Token) -> Option<Op> {
        lexer.next_token();
        let args = self.match_optional_arglist(lexer);
        if lexer.tkn.kind == TokenKind::Rparen {
            lexer.next_token();
        } else {
            self.err("expected right parenthesis", &lexer.tkn.clone());
        }
        Some(Op::new(name_tkn.text.clone(), args, name_tkn.location))
    }

    fn match_optional_arglist(&mut self, lexer: &mut Lexer) -> Vec<Arg> {
        let mut args = Vec::new();
        if lexer.tkn.kind == TokenKind::Rparen {
            return args;
        }
        loop {
            match self.match_value(lexer) {
                Some(arg) => args.push(arg),
                None => {
                    self.skip_until(lexer, &[TokenKind::Comma, TokenKind::Rparen]);
                    if lexer.tkn.kind == TokenKind::Comma {
                        lexer.next_token();
                        continue;
                    } else {
                        break;
                    }
                }
            }

            if lexer.tkn.kind == TokenKind::Rparen {
                break;
            } else if lexer.tkn.kind == TokenKind::Comma {
                lexer.next_token();
            } else {
                self.err("expected comma or right parenthesis", &lexer.tkn.clone());
                self.skip_until(lexer, &[TokenKind::Comma, TokenKind::Rparen]);
                if lexer.tkn.kind != TokenKind::Comma {
                    break;
                }
                lexer.next_token();
            }
        }
        args
    }

    /// Match one argument value. The current token is consumed on success.
    fn match_value(&mut self, lexer: &mut Lexer) -> Option<Arg> {
        let tkn = lexer.tkn.clone();
        match tkn.kind {
            TokenKind::Int => {
                let value = self.int_literal(&tkn, false)?;
                lexer.next_token();
                Some(Arg {
                    value: ArgValue::Int(value),
                    loc: tkn.location,
                })
            }
            TokenKind::Minus => {
                lexer.next_token();
                let int_tkn = lexer.tkn.clone();
                if int_tkn.kind != TokenKind::Int {
                    self.err("expected integer", &int_tkn);
                    return None;
                }
                let value = self.int_literal(&int_tkn, true)?;
                lexer.next_token();
                Some(Arg {
                    value: ArgValue::Int(value),
                    loc: tkn.location,
                })
            }
            TokenKind::Char => {
                lexer.next_token();
                let code = tkn.text.chars().next().map(|c| c as i32).unwrap_or(0);
                Some(Arg {
                    value: ArgValue::Int(code),
                    loc: tkn.location,
                })
            }
            TokenKind::Register => {
                lexer.next_token();
                if tkn.text.eq_ignore_ascii_case("pc") {
                    self.err(
                        "program counter cannot be accessed or changed directly",
                        &tkn,
                    );
                    return None;
                }
                match register_to_index(&tkn.text) {
                    Ok(register) => Some(Arg {
                        value: ArgValue::Reg(register),
                        loc: tkn.location,
                    }),
                    Err(_) => {
                        self.err(format!("{} is not a valid register", tkn.text), &tkn);
                        None
                    }
                }
            }
            TokenKind::Symbol => {
                lexer.next_token();
                Some(Arg {
                    value: ArgValue::Sym(tkn.text.clone()),
                    loc: tkn.location,
                })
            }
            TokenKind::Str => {
                lexer.next_token();
                Some(Arg {
                    value: ArgValue::Str(tkn.text.clone()),
                    loc: tkn.location,
                })
            }
            TokenKind::Eof => {
                self.err("premature end of input", &tkn);
                None
            }
            _ => {
                self.err("expected value", &tkn);
                None
            }
        }
    }

    /// Decode an integer literal token, detecting its base from the prefix.
    /// Zero-prefixed octal is accepted with an optional warning.
    fn int_literal(&mut self, tkn: &Token, negated: bool) -> Option<i32> {
        let text = tkn.text.as_str();
        let (digits, base) = if let Some(rest) = strip_prefix_ci(text, "0x") {
            (rest, 16)
        } else if let Some(rest) = strip_prefix_ci(text, "0b") {
            (rest, 2)
        } else if let Some(rest) = strip_prefix_ci(text, "0o") {
            (rest, 8)
        } else if text.len() > 1
            && text.starts_with('0')
            && text.chars().all(|c| c.is_ascii_digit())
        {
            if self.settings.warn_octal_on {
                self.warn("consider using \"0o\" prefix for octal numbers", tkn);
            }
            (text, 8)
        } else {
            (text, 10)
        };

        let magnitude = match i64::from_str_radix(digits, base) {
            Ok(v) => v,
            Err(_) => {
                self.err("invalid integer literal", tkn);
                return None;
            }
        };
        let value = if negated { -magnitude } else { magnitude };

        if !(-(1 << 15)..(1 << 16)).contains(&value) {
            self.err("integer literal exceeds 16 bits", tkn);
            return None;
        }
        Some(value as i32)
    }

    /// Consume `void HERA_main ( ) {`, having already seen `void` and with
    /// the current token on `HERA_main`.
    fn match_cpp_boilerplate(&mut self, lexer: &mut Lexer) {
        lexer.next_token();
        if self.expect(lexer, TokenKind::Lparen, "expected left parenthesis") {
            lexer.next_token();
        }
        if self.expect(lexer, TokenKind::Rparen, "expected right parenthesis") {
            lexer.next_token();
        }
        if self.expect(lexer, TokenKind::Lbrace, "expected left curly brace") {
            lexer.next_token();
        }
    }

    fn match_include(&mut self, lexer: &mut Lexer) -> Vec<Op> {
        let root_path = lexer.path().to_owned();
        let tkn = lexer.next_token();
        match tkn.kind {
            TokenKind::Str => {
                lexer.next_token();
                let include_path = Path::new(&root_path)
                    .parent()
                    .unwrap_or_else(|| Path::new(""))
                    .join(&tkn.text);
                let include_path = include_path.to_string_lossy().into_owned();

                if self.visited.contains(&get_canonical_path(&include_path)) {
                    self.err("recursive include", &tkn);
                    return Vec::new();
                }

                match read_file(&include_path) {
                    Ok(text) => self.parse(&mut Lexer::new(&text, Some(&include_path))),
                    Err(e) => {
                        self.err(e.to_string(), &tkn);
                        Vec::new()
                    }
                }
            }
            TokenKind::Bracketed => {
                lexer.next_token();
                self.expand_angle_include(&tkn)
            }
            _ => {
                self.err("expected quote or angle-bracket delimited string", &tkn);
                lexer.next_token();
                Vec::new()
            }
        }
    }

    /// Angle-bracket includes name system libraries. There is no recursion
    /// check here; system libraries are assumed not to include themselves.
    fn expand_angle_include(&mut self, include_path: &Token) -> Vec<Op> {
        let text = match include_path.text.as_str() {
            "HERA.h" => {
                self.warn("#include <HERA.h> is not necessary for hera-rs", include_path);
                return Vec::new();
            }
            "Tiger-stdlib-stack-data.hera" => TIGER_STDLIB_STACK_DATA.to_owned(),
            "Tiger-stdlib-stack.hera" => TIGER_STDLIB_STACK.to_owned(),
            name => {
                let root =
                    env::var("HERA_C_DIR").unwrap_or_else(|_| DEFAULT_LIBRARY_DIR.to_owned());
                let full_path = Path::new(&root).join(name).to_string_lossy().into_owned();
                match read_file(&full_path) {
                    Ok(text) => text,
                    Err(e) => {
                        self.err(e.to_string(), include_path);
                        return Vec::new();
                    }
                }
            }
        };
        self.parse(&mut Lexer::new(&text, Some(&include_path.text)))
    }

    fn expect(&mut self, lexer: &mut Lexer, kind: TokenKind, msg: &str) -> bool {
        if lexer.tkn.kind == kind {
            true
        } else if lexer.tkn.kind == TokenKind::Eof {
            self.err("premature end of input", &lexer.tkn.clone());
            false
        } else {
            self.err(msg, &lexer.tkn.clone());
            false
        }
    }

    fn skip_until(&mut self, lexer: &mut Lexer, kinds: &[TokenKind]) {
        while lexer.tkn.kind != TokenKind::Eof && !kinds.contains(&lexer.tkn.kind) {
            lexer.next_token();
        }
    }

    fn err(&mut self, msg: impl Into<String>, tkn: &Token) {
        self.messages.err_at(msg, &tkn.location);
    }

    fn warn(&mut self, msg: impl Into<String>, tkn: &Token) {
        self.messages.warn_at(msg, &tkn.location);
    }
}

fn strip_prefix_ci<'t>(text: &'t str, prefix: &str) -> Option<&'t str> {
    if text.len() >= prefix.len() && text[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&text[prefix.len()..])
    } else {
        None
    }
}

fn get_canonical_path(path: &str) -> PathBuf {
    if path == "-" || path == "<string>" {
        PathBuf::from(path)
    } else {
        fs::canonicalize(path).unwrap_or_else(|_| PathBuf::from(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Register;

    fn parse_ok(text: &str) -> Vec<Op> {
        let settings = Settings::default();
        let (ops, messages) = parse(text, None, &settings);
        assert!(!messages.has_errors(), "errors: {:?}", messages.errors);
        ops
    }

    fn parse_errors(text: &str) -> Vec<String> {
        let settings = Settings::default();
        let (_, messages) = parse(text, None, &settings);
        messages.errors.into_iter().map(|(m, _)| m).collect()
    }

    #[test]
    fn parse_single_op() {
        let ops = parse_ok("SET(R1, 42)");
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].name, "SET");
        assert_eq!(ops[0].args[0].reg(), Some(Register::new(1).unwrap()));
        assert_eq!(ops[0].args[1].int(), Some(42));
    }

    #[test]
    fn parse_negative_and_based_integers() {
        let ops = parse_ok("SET(R1, -12)\nSET(R2, 0x2A)\nSET(R3, 0b1010)\nSET(R4, 0o17)");
        assert_eq!(ops[0].args[1].int(), Some(-12));
        assert_eq!(ops[1].args[1].int(), Some(42));
        assert_eq!(ops[2].args[1].int(), Some(10));
        assert_eq!(ops[3].args[1].int(), Some(15));
    }

    #[test]
    fn zero_prefixed_octal_is_octal() {
        let ops = parse_ok("SET(R1, 0755)");
        assert_eq!(ops[0].args[1].int(), Some(0o755));

        // The nudge toward 0o only appears under --warn-octal-on.
        let mut settings = Settings::default();
        settings.warn_octal_on = true;
        let (_, messages) = parse("SET(R1, 0755)", None, &settings);
        assert_eq!(messages.warnings.len(), 1);
        assert!(messages.warnings[0].0.contains("0o"));
    }

    #[test]
    fn char_literals_become_integers() {
        let ops = parse_ok("SET(R1, 'a')\nSET(R2, '\\n')");
        assert_eq!(ops[0].args[1].int(), Some(97));
        assert_eq!(ops[1].args[1].int(), Some(10));
    }

    #[test]
    fn semicolons_are_allowed_between_ops() {
        let ops = parse_ok("SET(R1, 1); SET(R2, 2);");
        assert_eq!(ops.len(), 2);
    }

    #[test]
    fn cpp_boilerplate_is_tolerated() {
        let ops = parse_ok("void HERA_main() {\n  SET(R1, 1)\n}");
        assert_eq!(ops.len(), 1);
    }

    #[test]
    fn unexpected_brace_is_an_error() {
        let errs = parse_errors("}");
        assert_eq!(errs, vec!["unexpected right brace".to_owned()]);
    }

    #[test]
    fn pc_is_not_a_register_argument() {
        let errs = parse_errors("BR(PC)");
        assert!(errs
            .iter()
            .any(|e| e.contains("program counter cannot be accessed")));
    }

    #[test]
    fn missing_comma_is_an_error() {
        let settings = Settings::default();
        let (_, messages) = parse("ADD(R1 R2, R3)", None, &settings);
        let (msg, loc) = &messages.errors[0];
        assert_eq!(msg, "expected comma or right parenthesis");
        assert_eq!(loc.as_ref().unwrap().column, 8);
    }

    #[test]
    fn oversized_literal_is_an_error() {
        assert!(parse_errors("SET(R1, 65536)")
            .iter()
            .any(|e| e.contains("exceeds 16 bits")));
        assert!(parse_errors("SET(R1, -32769)")
            .iter()
            .any(|e| e.contains("exceeds 16 bits")));
        assert!(parse_ok("SET(R1, 65535)").len() == 1);
    }

    #[test]
    fn errors_do_not_stop_the_parse() {
        let settings = Settings::default();
        let (ops, messages) = parse("SET(R1, )\nSET(R2, 2)", None, &settings);
        assert!(messages.has_errors());
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[1].args[1].int(), Some(2));
    }

    #[test]
    fn ifdef_with_defined_symbol_keeps_block() {
        let ops = parse_ok("#ifdef HERA_PY\nSET(R1, 1)\n#endif");
        assert_eq!(ops.len(), 1);
    }

    #[test]
    fn ifdef_with_undefined_symbol_drops_block() {
        let ops = parse_ok("#ifdef HERA_CPP\nSET(R1, 1)\n#endif\nSET(R2, 2)");
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].name, "SET");
        assert_eq!(ops[0].args[0].reg(), Some(Register::new(2).unwrap()));
    }

    #[test]
    fn ifndef_and_else_branches() {
        let ops = parse_ok("#ifndef HERA_CPP\nSET(R1, 1)\n#else\nSET(R2, 2)\n#endif");
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].args[0].reg(), Some(Register::new(1).unwrap()));

        let ops = parse_ok("#ifdef HERA_CPP\nSET(R1, 1)\n#else\nSET(R2, 2)\n#endif");
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].args[0].reg(), Some(Register::new(2).unwrap()));
    }

    #[test]
    fn conditional_blocks_nest() {
        let ops = parse_ok(
            "#ifdef HERA_PY\n#ifdef HERA_CPP\nSET(R1, 1)\n#else\nSET(R2, 2)\n#endif\n#endif",
        );
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].args[0].reg(), Some(Register::new(2).unwrap()));
    }

    #[test]
    fn unclosed_conditional_is_an_error() {
        let errs = parse_errors("#ifdef HERA_PY\nSET(R1, 1)");
        assert!(errs.iter().any(|e| e.contains("never closed")));
    }

    #[test]
    fn stray_else_and_endif_are_errors() {
        assert!(parse_errors("#else")
            .iter()
            .any(|e| e.contains("#else without matching #ifdef")));
        assert!(parse_errors("#endif")
            .iter()
            .any(|e| e.contains("#endif without matching #ifdef")));
    }

    #[test]
    fn hera_h_include_warns_and_vanishes() {
        let settings = Settings::default();
        let (ops, messages) = parse("#include <HERA.h>\nSET(R1, 1)", None, &settings);
        assert_eq!(ops.len(), 1);
        assert!(!messages.has_errors());
        assert!(messages.warnings[0].0.contains("not necessary"));
    }

    #[test]
    fn missing_quote_include_is_an_error() {
        let errs = parse_errors("#include \"does/not/exist.hera\"");
        assert!(errs.iter().any(|e| e.contains("does not exist")));
    }

    #[test]
    fn stdlib_data_include_parses() {
        let ops = parse_ok("#include <Tiger-stdlib-stack-data.hera>");
        assert!(!ops.is_empty());
        assert!(ops.iter().all(|op| crate::op::is_data_statement(&op.name)));
    }
}
