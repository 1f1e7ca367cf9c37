//! The embedded Tiger standard library, resolved by `#include <...>`.
//!
//! Two assets: the data segment (error messages and the heap pointer) and
//! the code segment (the library routines themselves). Programs that use
//! the routines include both, data first.
//!
//! Calling convention: arguments start at `M[FP + 3]`, the first argument
//! cell doubles as the return-value cell, and routines are entered with
//! `CALL(FP_alt, name)` after setting up the frame.

/// `#include <Tiger-stdlib-stack-data.hera>`
pub const TIGER_STDLIB_STACK_DATA: &str = r#"
// Tiger standard library: data segment.

DLABEL(tstdlib_div_by_zero_msg)
LP_STRING("Error: division by zero")

DLABEL(tstdlib_heap_overflow_msg)
LP_STRING("Error: heap overflow")

// The allocation break; zero until the first malloc.
DLABEL(tstdlib_heap_pointer)
INTEGER(0)

CONSTANT(tstdlib_heap_base, 0xE000)
CONSTANT(tstdlib_heap_limit, 0xFF00)
"#;

/// `#include <Tiger-stdlib-stack.hera>`
pub const TIGER_STDLIB_STACK: &str = r#"
// Tiger standard library: stack calling convention.

LABEL(printint)
  STORE(R1, 5, FP)
  LOAD(R1, 3, FP)
  print_reg(R1)
  LOAD(R1, 5, FP)
  RETURN(FP_alt, PC_ret)


LABEL(exit)
  SET(Rt, 0xFFFF)
  BR(Rt)


// div(a, b): unsigned quotient by repeated subtraction.
// regs: a(1), b(2), quotient(3)
LABEL(div)
  STORE(R1, 5, FP)
  STORE(R2, 6, FP)
  STORE(R3, 7, FP)
  LOAD(R1, 3, FP)
  LOAD(R2, 4, FP)
  SET(R3, 0)

  FLAGS(R2)
  BZ(tstdlib_label_div_by_zero)
LABEL(tstdlib_label_div_loop)
  CMP(R1, R2)
  BNC(tstdlib_label_div_done)   // borrow: dividend has run out
  SUB(R1, R1, R2)
  INC(R3, 1)
  BR(tstdlib_label_div_loop)
LABEL(tstdlib_label_div_done)
  STORE(R3, 3, FP)
  LOAD(R1, 5, FP)
  LOAD(R2, 6, FP)
  LOAD(R3, 7, FP)
  RETURN(FP_alt, PC_ret)
LABEL(tstdlib_label_div_by_zero)
  println("Error: division by zero")
  SET(Rt, 0xFFFF)
  BR(Rt)


// mod(a, b): unsigned remainder, same loop as div.
LABEL(mod)
  STORE(R1, 5, FP)
  STORE(R2, 6, FP)
  LOAD(R1, 3, FP)
  LOAD(R2, 4, FP)

  FLAGS(R2)
  BZ(tstdlib_label_div_by_zero)
LABEL(tstdlib_label_mod_loop)
  CMP(R1, R2)
  BNC(tstdlib_label_mod_done)
  SUB(R1, R1, R2)
  BR(tstdlib_label_mod_loop)
LABEL(tstdlib_label_mod_done)
  STORE(R1, 3, FP)
  LOAD(R1, 5, FP)
  LOAD(R2, 6, FP)
  RETURN(FP_alt, PC_ret)


// malloc(n): bump allocation from a fixed arena.
// regs: pointer cell(1), break(2), result(3)
LABEL(malloc)
  STORE(R1, 5, FP)
  STORE(R2, 6, FP)
  STORE(R3, 7, FP)
  SET(R1, tstdlib_heap_pointer)
  LOAD(R2, 0, R1)
  FLAGS(R2)
  BNZ(tstdlib_label_malloc_bump)
  SET(R2, tstdlib_heap_base)
LABEL(tstdlib_label_malloc_bump)
  MOVE(R3, R2)
  LOAD(Rt, 3, FP)
  STORE(R3, 3, FP)
  ADD(R2, R2, Rt)
  STORE(R2, 0, R1)
  SET(Rt, tstdlib_heap_limit)
  CMP(Rt, R2)
  BNC(tstdlib_label_malloc_overflow)
  LOAD(R1, 5, FP)
  LOAD(R2, 6, FP)
  LOAD(R3, 7, FP)
  RETURN(FP_alt, PC_ret)
LABEL(tstdlib_label_malloc_overflow)
  println("Error: heap overflow")
  SET(Rt, 0xFFFF)
  BR(Rt)


// free is a no-op with a bump allocator.
LABEL(free)
  RETURN(FP_alt, PC_ret)
"#;

#[cfg(test)]
mod tests {
    use crate::data::Settings;
    use crate::parser::parse;
    use crate::preprocessor::check;

    #[test]
    fn stdlib_texts_check_cleanly() {
        let settings = Settings::default();
        let text = "#include <Tiger-stdlib-stack-data.hera>\n#include <Tiger-stdlib-stack.hera>";
        let (ops, messages) = parse(text, None, &settings);
        assert!(!messages.has_errors(), "{:?}", messages.errors);
        let (program, messages) = check(ops, &settings);
        assert!(!messages.has_errors(), "{:?}", messages.errors);
        assert!(program.unwrap().code.len() > 30);
    }
}
