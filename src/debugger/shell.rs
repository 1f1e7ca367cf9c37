//! The interactive debugging shell: a line-based command loop over the
//! [`Debugger`] state.
//!
//! Commands can be abbreviated to any unique prefix, except `restart`,
//! which must be typed in full so nobody loses a session to a stray `r`.

use std::io::{self, BufRead, Write};

use super::minilanguage::{self, InfixOp, Node};
use crate::data::{
    format_int, register_to_index, to_u16, HeraError, Location, Program, Settings, SymbolValue,
};
use crate::debugger::Debugger;
use crate::op::{is_branch, is_data_statement};
use crate::parser::parse;
use crate::preprocessor::check;

const DEFAULT_SPEC: &str = "dsc";

/// Start the debug loop on an already loaded program.
pub fn debug(program: Program, settings: &Settings) {
    let debugger = Debugger::new(program, settings);
    Shell::new(debugger, settings.clone()).run();
}

pub struct Shell {
    pub debugger: Debugger,
    settings: Settings,
}

impl Shell {
    pub fn new(debugger: Debugger, settings: Settings) -> Self {
        Self { debugger, settings }
    }

    fn run(&mut self) {
        if self.debugger.program.is_empty() {
            println!("Cannot debug an empty program.");
            return;
        }

        self.print_current_op();

        let stdin = io::stdin();
        loop {
            print!(">>> ");
            let _ = io::stdout().flush();

            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => {
                    println!();
                    break;
                }
                Ok(_) => {}
            }

            let response = line.trim();
            if response.is_empty() {
                continue;
            }
            if "quit".starts_with(&response.to_lowercase()) {
                break;
            }
            self.handle_command(response);
        }
    }

    /// Parse a command line and dispatch it.
    pub fn handle_command(&mut self, response: &str) {
        let (cmd, argstr) = match response.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (response, ""),
        };
        let arglist: Vec<&str> = argstr.split_whitespace().collect();
        let cmd = cmd.to_lowercase();

        if "assign".starts_with(&cmd) {
            self.handle_assign(&arglist);
        } else if "break".starts_with(&cmd) {
            self.save();
            self.handle_break(&arglist);
        } else if "continue".starts_with(&cmd) {
            self.save();
            self.handle_continue(&arglist);
        } else if "execute".starts_with(&cmd) {
            self.save();
            self.handle_execute(argstr);
        } else if "help".starts_with(&cmd) {
            self.handle_help(&arglist);
        } else if "info".starts_with(&cmd) {
            self.handle_info(&arglist);
        } else if "jump".starts_with(&cmd) {
            self.save();
            self.handle_jump(&arglist);
        } else if cmd == "ll" {
            self.handle_ll(&arglist);
        } else if "list".starts_with(&cmd) {
            self.handle_list(&arglist);
        } else if "next".starts_with(&cmd) {
            self.save();
            self.handle_next(&arglist);
        } else if cmd == "off" {
            self.save();
            self.handle_off(&arglist);
        } else if cmd == "on" {
            self.save();
            self.handle_on(&arglist);
        } else if "print".starts_with(&cmd) {
            self.handle_print(argstr);
        } else if cmd == "restart" {
            // Never abbreviated, so nobody restarts by accident.
            self.save();
            self.handle_restart(&arglist);
        } else if "step".starts_with(&cmd) {
            self.save();
            self.handle_step(&arglist);
        } else if "undo".starts_with(&cmd) {
            self.handle_undo(&arglist);
        } else if response.contains('=') {
            let parts: Vec<&str> = response.splitn(2, '=').collect();
            self.handle_assign(&parts);
        } else {
            println!("{} is not a recognized command.", cmd);
        }
    }

    fn save(&mut self) {
        self.debugger.save();
    }

    fn handle_assign(&mut self, args: &[&str]) {
        if args.len() != 2 {
            println!("assign takes two arguments.");
            return;
        }

        let (ltree, rtree) = match (minilanguage::parse(args[0]), minilanguage::parse(args[1])) {
            (Ok(l), Ok(r)) => (l, r),
            (Err(e), _) | (_, Err(e)) => {
                println!("Parse error: {}.", e);
                return;
            }
        };

        if ltree.seq.len() > 1 {
            println!("Parse error: cannot assign to sequence.");
            return;
        }
        if rtree.seq.len() > 1 {
            println!("Parse error: cannot assign sequence value.");
            return;
        }

        self.save();
        if let Err(e) = self.assign(&ltree.seq[0], &rtree.seq[0]) {
            println!("Eval error: {}.", e);
        }
    }

    fn assign(&mut self, ltree: &Node, rtree: &Node) -> Result<(), HeraError> {
        let rhs = self.evaluate_node(rtree)?;
        match ltree {
            Node::Register(name) => {
                if name.eq_ignore_ascii_case("pc") {
                    self.debugger.vm.pc = to_u16(rhs)?;
                } else {
                    let register = register_to_index(name)?;
                    let value = to_u16(rhs)?;
                    self.debugger.vm.store_register(register, value);
                }
                Ok(())
            }
            Node::Memory(address) => {
                let address = to_u16(self.evaluate_node(address)?)?;
                let value = to_u16(rhs)?;
                self.debugger.vm.assign_memory(address, value);
                Ok(())
            }
            Node::Symbol(_) => Err(HeraError::Eval("cannot assign to symbol".to_owned())),
            _ => Err(HeraError::Eval(
                "cannot assign to arithmetic expression".to_owned(),
            )),
        }
    }

    fn handle_break(&mut self, args: &[&str]) {
        if args.len() > 1 {
            println!("break takes zero or one arguments.");
            return;
        }

        if args.is_empty() {
            if self.debugger.breakpoints().is_empty() {
                println!("No breakpoints set.");
            } else {
                let mut names: Vec<&String> = self.debugger.breakpoints().values().collect();
                names.sort();
                for name in names {
                    println!("{}", name);
                }
            }
        } else {
            match self.debugger.resolve_location(args[0]) {
                Ok(address) => self.debugger.set_breakpoint(address),
                Err(e) => println!("Error: {}.", e),
            }
        }
    }

    fn handle_continue(&mut self, args: &[&str]) {
        if !args.is_empty() {
            println!("continue takes no arguments.");
            return;
        }

        self.debugger.exec_ops(None, Debugger::at_breakpoint);
        self.print_current_op();
    }

    fn handle_execute(&mut self, argstr: &str) {
        let (ops, parse_messages) = parse(argstr, None, &self.settings);
        if parse_messages.has_errors() {
            for (msg, _) in &parse_messages.errors {
                println!("Error: {}.", msg);
            }
            return;
        }

        for op in &ops {
            if is_branch(&op.name) || op.name == "CALL" || op.name == "RETURN" {
                println!("execute cannot take branching operations.");
                return;
            }
            if is_data_statement(&op.name) {
                println!("execute cannot take data statements.");
                return;
            }
            if op.name == "LABEL" {
                println!("execute cannot take labels.");
                return;
            }
        }

        let (program, messages) = check(ops, &self.settings);
        match program {
            Some(program) => {
                let old_pc = self.debugger.vm.pc;
                for op in &program.code {
                    self.debugger.vm.exec_one(op);
                }
                self.debugger.vm.pc = old_pc;
            }
            None => {
                for (msg, _) in &messages.errors {
                    println!("Error: {}.", msg);
                }
            }
        }
    }

    fn handle_help(&self, args: &[&str]) {
        if args.is_empty() {
            println!("{}", HELP);
        } else {
            for (i, arg) in args.iter().enumerate() {
                match help_for(arg) {
                    Some(text) => println!("{}", text),
                    None => println!("{} is not a recognized command.", arg),
                }
                if i != args.len() - 1 {
                    println!();
                }
            }
        }
    }

    fn handle_info(&self, args: &[&str]) {
        if !args.is_empty() {
            println!("info takes no arguments.");
            return;
        }

        self.print_registers();
        self.print_flags();
        println!();

        let mut constants = Vec::new();
        let mut labels = Vec::new();
        let mut dlabels = Vec::new();
        for (key, value) in &self.debugger.symbol_table {
            match value {
                SymbolValue::Label(v) => {
                    labels.push(format!("{} ({})", key, self.debugger.breakpoint_name(*v, false)))
                }
                SymbolValue::DataLabel(v) => dlabels.push(format!("{} ({:#x})", key, v)),
                SymbolValue::Constant(v) => constants.push(format!("{} ({})", key, v)),
            }
        }
        constants.sort();
        labels.sort();
        dlabels.sort();

        if !constants.is_empty() {
            println!("Constants: {}", constants.join(", "));
        }
        if !labels.is_empty() {
            println!("Labels: {}", labels.join(", "));
        }
        if !dlabels.is_empty() {
            println!("Data labels: {}", dlabels.join(", "));
        }
    }

    fn handle_jump(&mut self, args: &[&str]) {
        if args.len() > 1 {
            println!("jump takes zero or one arguments.");
            return;
        }

        if let Some(spec) = args.first() {
            match self.debugger.resolve_location(spec) {
                Ok(address) => self.debugger.vm.pc = address,
                Err(e) => {
                    println!("Error: {}.", e);
                    return;
                }
            }
        } else {
            self.debugger.vm.pc += self.debugger.real_ops().len() as u16;
        }

        self.print_current_op();
    }

    fn handle_list(&mut self, args: &[&str]) {
        if args.len() > 1 {
            println!("list takes zero or one arguments.");
            return;
        }

        let context = match args.first() {
            Some(arg) => match arg.parse::<usize>() {
                Ok(n) => n,
                Err(_) => {
                    println!("Could not parse argument to list.");
                    return;
                }
            },
            None => 3,
        };

        if let Some(loc) = self.current_loc() {
            self.print_range_of_ops(&loc, Some(context));
        }
    }

    fn handle_ll(&mut self, args: &[&str]) {
        if !args.is_empty() {
            println!("ll takes no arguments.");
            return;
        }

        if let Some(loc) = self.current_loc() {
            self.print_range_of_ops(&loc, None);
        }
    }

    fn handle_next(&mut self, args: &[&str]) {
        if args.len() > 1 {
            println!("next takes zero or one arguments.");
            return;
        }

        if self.debugger.is_finished() {
            println!("Program has finished executing. Enter 'restart' to restart.");
            return;
        }

        let n = match args.first() {
            Some(arg) => match arg.parse::<usize>() {
                Ok(n) => n,
                Err(_) => {
                    println!("Could not parse argument to next.");
                    return;
                }
            },
            None => 1,
        };

        self.debugger.exec_ops(Some(n), |_| false);
        self.print_current_op();
    }

    fn handle_off(&mut self, args: &[&str]) {
        if args.is_empty() {
            println!("off takes one or more arguments.");
            return;
        }
        self.set_flags(args, false);
    }

    fn handle_on(&mut self, args: &[&str]) {
        if args.is_empty() {
            println!("on takes one or more arguments.");
            return;
        }
        self.set_flags(args, true);
    }

    fn set_flags(&mut self, args: &[&str], value: bool) {
        let vm = &mut self.debugger.vm;
        for arg in args {
            let flag = match arg.replace('-', "_").as_str() {
                "cb" | "carry_block" => &mut vm.flag_carry_block,
                "c" | "carry" => &mut vm.flag_carry,
                "v" | "overflow" => &mut vm.flag_overflow,
                "s" | "sign" => &mut vm.flag_sign,
                "z" | "zero" => &mut vm.flag_zero,
                _ => {
                    println!("Unrecognized flag: `{}`.", arg);
                    return;
                }
            };
            *flag = value;
        }
    }

    fn handle_print(&mut self, argstr: &str) {
        if argstr.is_empty() {
            println!("print takes one or more arguments.");
            return;
        }

        let tree = match minilanguage::parse(argstr) {
            Ok(tree) => tree,
            Err(e) => {
                println!("Parse error: {}.", e);
                return;
            }
        };

        for c in tree.fmt.chars() {
            if !"dxobcsl".contains(c) {
                println!("Unknown format specifier `{}`.", c);
                return;
            }
        }
        // An explicitly requested format is always rendered, even when the
        // value is not a printable character or a negative integer.
        let spec = tree.fmt.replace('c', "C").replace('s', "S");

        let result = if tree.seq.len() > 1 {
            tree.seq
                .iter()
                .try_for_each(|arg| self.print_one_expr(arg, &spec, true))
        } else {
            self.print_one_expr(&tree.seq[0], &spec, false)
        };
        if let Err(e) = result {
            println!("Eval error: {}.", e);
        }
    }

    /// Print a single expression with the given format specification.
    fn print_one_expr(&mut self, tree: &Node, spec: &str, with_lhs: bool) -> Result<(), HeraError> {
        let mut spec = spec.to_owned();

        // Tailor the default rendering to the kind of expression.
        match tree {
            Node::Register(name) => {
                if name.eq_ignore_ascii_case("pc") {
                    spec = augment_spec(&spec, 'l');
                } else {
                    let register = register_to_index(name)?;
                    // R13 holds return addresses, so show the location.
                    if register.index() == 13 && spec.is_empty() {
                        spec = augment_spec(&spec, 'l');
                    }
                }
            }
            Node::Symbol(name) => match self.debugger.symbol_table.get(name.as_str()) {
                Some(SymbolValue::Label(_)) => spec = augment_spec(&spec, 'l'),
                Some(_) => {}
                None => return Err(HeraError::Eval(format!("{} is not defined", name))),
            },
            Node::Int(_) => {
                if spec.is_empty() {
                    spec = "d".to_owned();
                }
            }
            _ => {}
        }

        let value = self.evaluate_node(tree)?;
        let rendered = self.format_value(value, &spec)?;
        if with_lhs {
            println!("{} = {}", tree, rendered);
        } else {
            println!("{}", rendered);
        }
        Ok(())
    }

    fn format_value(&self, value: i32, spec: &str) -> Result<String, HeraError> {
        let spec = if spec.is_empty() { DEFAULT_SPEC } else { spec };
        let (spec, with_loc) = if spec.contains('l') {
            (spec.replace('l', ""), true)
        } else {
            (spec.to_owned(), false)
        };

        let word = to_u16(value)?;
        let rendered = format_int(word, &spec);
        if with_loc && (word as usize) < self.debugger.program.len() {
            Ok(format!(
                "{} [{}]",
                rendered,
                self.debugger.breakpoint_name(word, false)
            ))
        } else {
            Ok(rendered)
        }
    }

    fn handle_restart(&mut self, args: &[&str]) {
        if !args.is_empty() {
            println!("restart takes no arguments.");
            return;
        }

        self.debugger.reset();
        self.print_current_op();
    }

    fn handle_step(&mut self, args: &[&str]) {
        if !args.is_empty() {
            println!("step takes no arguments.");
            return;
        }

        match self.debugger.current_original() {
            Some(original) if original.name == "CALL" => {}
            _ => {
                println!("step is only valid when the current instruction is CALL.");
                return;
            }
        }

        let depth = self.debugger.calls();
        self.debugger.exec_ops(None, |debugger| debugger.calls() == depth);
        self.print_current_op();
    }

    fn handle_undo(&mut self, args: &[&str]) {
        if !args.is_empty() {
            println!("undo takes no arguments.");
            return;
        }

        if !self.debugger.undo() {
            println!("Nothing to undo.");
        }
    }

    fn evaluate_node(&self, node: &Node) -> Result<i32, HeraError> {
        let vm = &self.debugger.vm;
        match node {
            Node::Int(v) => {
                if *v >= 1 << 16 {
                    Err(HeraError::Eval("integer literal exceeds 16 bits".to_owned()))
                } else {
                    Ok(*v)
                }
            }
            Node::Register(name) => {
                if name.eq_ignore_ascii_case("pc") {
                    Ok(vm.pc as i32)
                } else {
                    let register = register_to_index(name)
                        .map_err(|_| HeraError::Eval("no such register".to_owned()))?;
                    Ok(vm.get_register(register) as i32)
                }
            }
            Node::Memory(address) => {
                let address = to_u16(self.evaluate_node(address)?)?;
                Ok(vm.access_memory(address) as i32)
            }
            Node::Symbol(name) => match self.debugger.symbol_table.get(name.as_str()) {
                Some(value) => Ok(value.value()),
                None => Err(HeraError::Eval(format!("{} is not defined", name))),
            },
            Node::Minus(arg) => check_overflow(-self.evaluate_node(arg)?, "negation"),
            Node::Infix(op, left, right) => {
                let left = self.evaluate_node(left)?;
                let right = self.evaluate_node(right)?;
                match op {
                    InfixOp::Add => check_overflow(left + right, "addition"),
                    InfixOp::Sub => check_overflow(left - right, "subtraction"),
                    InfixOp::Mul => check_overflow(
                        left.checked_mul(right)
                            .unwrap_or(i32::MAX),
                        "multiplication",
                    ),
                    InfixOp::Div => {
                        if right == 0 {
                            Err(HeraError::Eval("division by zero".to_owned()))
                        } else {
                            check_overflow(left.div_euclid(right), "division")
                        }
                    }
                }
            }
        }
    }

    fn print_registers(&self) {
        let mut nonzero = Vec::new();
        for i in 1..16 {
            let value = self.debugger.vm.registers[i];
            if value != 0 {
                nonzero.push(format!("R{} = {}", i, value));
            }
        }

        if nonzero.is_empty() {
            println!("All registers set to zero.");
        } else if nonzero.len() < 15 {
            println!("{}, all other registers set to zero.", nonzero.join(", "));
        } else {
            println!("{}", nonzero.join(", "));
        }
    }

    fn print_flags(&self) {
        let vm = &self.debugger.vm;
        let mut flags = Vec::new();
        if vm.flag_carry_block {
            flags.push("carry-block flag is on");
        }
        if vm.flag_carry {
            flags.push("carry flag is on");
        }
        if vm.flag_overflow {
            flags.push("overflow flag is on");
        }
        if vm.flag_zero {
            flags.push("zero flag is on");
        }
        if vm.flag_sign {
            flags.push("sign flag is on");
        }

        if flags.len() == 5 {
            println!("All flags are on.");
        } else if flags.is_empty() {
            println!("All flags are off.");
        } else {
            let joined = flags.join(", ");
            let mut chars = joined.chars();
            let capitalized = match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => joined.clone(),
            };
            println!("{}, all other flags are off.", capitalized);
        }
    }

    fn current_loc(&self) -> Option<Location> {
        self.debugger
            .program
            .get(self.debugger.vm.pc as usize)
            .map(|op| op.loc.clone())
    }

    /// Print the next operation to be executed, or a completion notice.
    fn print_current_op(&self) {
        if self.debugger.is_finished() {
            println!("Program has finished executing.");
            return;
        }
        if let Some(loc) = self.current_loc() {
            self.print_range_of_ops(&loc, Some(1));
        }
    }

    /// Print the line at `loc` along with `context` lines on either side,
    /// or the whole file when `context` is None.
    fn print_range_of_ops(&self, loc: &Location, context: Option<usize>) {
        let lines = &loc.file_lines;
        let lineno = loc.line - 1;
        let width = lines.len().to_string().len();

        let (lo, hi) = match context {
            None => (0, lines.len()),
            Some(context) => (
                lineno.saturating_sub(context),
                (lineno + context + 1).min(lines.len()),
            ),
        };

        println!("[{}]\n", loc.path);
        for i in lo..hi {
            let prefix = if i == lineno { "->  " } else { "    " };
            let line = lines[i].trim_end();
            if line.is_empty() {
                println!("{}{:>width$}", prefix, i + 1, width = width);
            } else {
                println!("{}{:>width$}  {}", prefix, i + 1, line, width = width);
            }
        }
    }
}

fn check_overflow(v: i32, operation: &str) -> Result<i32, HeraError> {
    if v >= 1 << 16 || v < -(1 << 15) {
        Err(HeraError::Eval(format!("{} overflow", operation)))
    } else {
        Ok(v)
    }
}

/// Add a format character to a specification, starting from the default
/// when none was given.
fn augment_spec(spec: &str, f: char) -> String {
    if spec.is_empty() {
        augment_spec(DEFAULT_SPEC, f)
    } else if spec.contains(f) {
        spec.to_owned()
    } else {
        format!("{}{}", spec, f)
    }
}

const HELP: &str = "\
Available commands:
    assign <x> <y>  Assign the value of y to x.

    break <loc>     Set a breakpoint at the given location. When no arguments
                    are given, all current breakpoints are printed.

    continue        Execute the program until a breakpoint is encountered or
                    the program terminates.

    execute <op>    Execute a HERA operation.

    help            Print this help message.

    info            Print information about the current state of the program.

    jump <loc>      Jump to the given location.

    list <n>        Print the current lines of source code and the n previous
                    and next lines. If not provided, n defaults to 3.

    ll              Print the entire program.

    next            Execute the current line.

    off <flag>      Turn the given machine flag off.

    on <flag>       Turn the given machine flag on.

    print <x>       Print the value of x.

    restart         Restart the execution of the program from the beginning.

    step            Step over the execution of a function.

    undo            Undo the last operation.

    quit            Exit the debugger.

    <x> = <y>       Alias for \"assign <x> <y>\".

Command names can generally be abbreviated with a unique prefix, e.g. \"n\" for
\"next\".";

fn help_for(command: &str) -> Option<&'static str> {
    let text = match command {
        "assign" => {
            "assign <x> <y>:\n  Assign the value of y to x. x may be a register, a memory \
             location, or the\n  program counter. y may be a register, a memory location, the \
             program counter,\n  a symbol, or an integer.\n\n<x> = <y>:\n  Alias for \"assign <x> \
             <y>\", with the additional advantage that <x> and <y>\n  may contain spaces."
        }
        "break" => {
            "break:\n  Print all current breakpoints.\n\nbreak <loc>:\n  Set a breakpoint at the \
             given location. The location may be a line number or\n  a label."
        }
        "continue" => {
            "continue:\n  Execute the program until a breakpoint is encountered or the program\n  \
             terminates."
        }
        "execute" => {
            "execute <op>:\n  Execute a HERA operation. The operation must not be a data \
             statement or a\n  branch. The operation may affect registers and memory."
        }
        "help" => {
            "help:\n  Print a summary of all debugging commands.\n\nhelp <cmd>...:\n  Print a \
             detailed help message for each command listed."
        }
        "info" => "info:\n  Print information about the current state of the program.",
        "jump" => {
            "jump:\n  Skip the current instruction.\n\njump <loc>:\n  Jump to the given location \
             (either a line number or a label) without\n  executing any of the intermediate \
             instructions."
        }
        "list" => {
            "list:\n  Print the current line of source and the three previous and next \
             lines.\n\nlist <n>:\n  Print the current line of source code and the `n` previous \
             and next lines."
        }
        "ll" => "ll:\n  Print every line of the program's source code.",
        "next" => {
            "next:\n  Execute the current line. If the current line is a CALL instruction, the\n  \
             debugger enters the function being called. If you wish to skip over the\n  function \
             call, use `step` instead.\n\nnext <n>:\n  Execute the next n instructions. This \
             command will follow branches, so be\n  careful!"
        }
        "off" => {
            "off <f1> <f2>...:\n    Turn off all the HERA machine flags listed. Flags may be \
             given in long\n    form (carry-block, carry, overflow, sign, zero) or short form \
             (cb, c, v,\n    s, z)."
        }
        "on" => {
            "on <f1> <f2>...:\n    Turn on all the HERA machine flags listed. Flags may be given \
             in long form\n    (carry-block, carry, overflow, sign, zero) or short form (cb, c, \
             v, s, z)."
        }
        "print" => {
            "print <x> <y> <z>...:\n  Print the values of all the supplied arguments. The first \
             argument may\n  optionally be a format specifier, e.g. \":xds\". Each character of \
             the string\n  identifies a format in which to print the value. The following \
             formats are\n  recognized: d for decimal, x for hexadecimal, o for octal, b for \
             binary, c\n  for character literals, s for signed integers, and l for source code\n  \
             locations."
        }
        "restart" => {
            "restart:\n  Restart execution of the program from the beginning. All registers are\n  \
             reset."
        }
        "step" => {
            "step:\n  Step over the execution of a function. The step command is only valid \
             when\n  the current instruction is CALL."
        }
        "undo" => "undo:\n  Undo the last operation that changed the state of the debugger.",
        "quit" => "quit:\n  Exit the debugger.",
        _ => return None,
    };
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell(text: &str) -> Shell {
        let mut settings = Settings::default();
        settings.no_ret_warn = true;
        let (ops, messages) = parse(text, None, &settings);
        assert!(!messages.has_errors());
        let (program, messages) = check(ops, &settings);
        assert!(!messages.has_errors(), "{:?}", messages.errors);
        Shell::new(Debugger::new(program.unwrap(), &settings), settings)
    }

    #[test]
    fn assign_to_register_and_memory() {
        let mut shell = shell("SET(R1, 1)");
        shell.handle_command("R1 = 42");
        assert_eq!(shell.debugger.vm.registers[1], 42);

        shell.handle_command("assign @100 77");
        assert_eq!(shell.debugger.vm.memory[100], 77);

        shell.handle_command("@@100 = 5");
        assert_eq!(shell.debugger.vm.memory[77], 5);

        shell.handle_command("pc = 1");
        assert_eq!(shell.debugger.vm.pc, 1);
    }

    #[test]
    fn assign_is_undoable() {
        let mut shell = shell("SET(R1, 1)");
        shell.handle_command("R1 = 42");
        shell.handle_command("undo");
        assert_eq!(shell.debugger.vm.registers[1], 0);
    }

    #[test]
    fn next_and_continue() {
        let mut shell = shell("SET(R1, 1)\nSET(R2, 2)\nSET(R3, 3)");
        shell.handle_command("n");
        assert_eq!(shell.debugger.vm.registers[1], 1);
        assert_eq!(shell.debugger.vm.registers[2], 0);

        shell.handle_command("c");
        assert_eq!(shell.debugger.vm.registers[3], 3);
        assert!(shell.debugger.is_finished());
    }

    #[test]
    fn next_with_count() {
        let mut shell = shell("SET(R1, 1)\nSET(R2, 2)\nSET(R3, 3)");
        shell.handle_command("next 2");
        assert_eq!(shell.debugger.vm.registers[2], 2);
        assert_eq!(shell.debugger.vm.registers[3], 0);
    }

    #[test]
    fn break_then_continue_stops_at_breakpoint() {
        let mut shell = shell("SET(R1, 1)\nLABEL(spot)\nSET(R2, 2)");
        shell.handle_command("break spot");
        shell.handle_command("continue");
        assert_eq!(shell.debugger.vm.registers[1], 1);
        assert_eq!(shell.debugger.vm.registers[2], 0);
        assert!(!shell.debugger.is_finished());
    }

    #[test]
    fn execute_runs_op_in_place() {
        let mut shell = shell("SET(R1, 1)");
        shell.handle_command("execute SET(R7, 99)");
        assert_eq!(shell.debugger.vm.registers[7], 99);
        assert_eq!(shell.debugger.vm.pc, 0);
    }

    #[test]
    fn flags_toggle_by_name() {
        let mut shell = shell("SET(R1, 1)");
        shell.handle_command("on cb z");
        assert!(shell.debugger.vm.flag_carry_block);
        assert!(shell.debugger.vm.flag_zero);
        shell.handle_command("off carry-block");
        assert!(!shell.debugger.vm.flag_carry_block);
        assert!(shell.debugger.vm.flag_zero);
    }

    #[test]
    fn restart_is_not_abbreviated() {
        let mut shell = shell("SET(R1, 1)");
        shell.handle_command("n");
        assert_eq!(shell.debugger.vm.registers[1], 1);
        // "r" alone is not a restart; registers stay put.
        shell.handle_command("r");
        assert_eq!(shell.debugger.vm.registers[1], 1);
        shell.handle_command("restart");
        assert_eq!(shell.debugger.vm.registers[1], 0);
    }

    #[test]
    fn undo_unwinds_multiple_commands() {
        let mut shell = shell("SET(R1, 1)\nSET(R2, 2)");
        shell.handle_command("n");
        shell.handle_command("n");
        shell.handle_command("undo");
        assert_eq!(shell.debugger.vm.registers[1], 1);
        assert_eq!(shell.debugger.vm.registers[2], 0);
        shell.handle_command("undo");
        assert_eq!(shell.debugger.vm.registers[1], 0);
    }

    #[test]
    fn evaluation_checks_overflow_and_division() {
        let shell = shell("SET(R1, 1)");
        let expr = minilanguage::parse("65535 + 1").unwrap();
        assert_eq!(
            shell.evaluate_node(&expr.seq[0]),
            Err(HeraError::Eval("addition overflow".to_owned()))
        );

        let expr = minilanguage::parse("1 / 0").unwrap();
        assert_eq!(
            shell.evaluate_node(&expr.seq[0]),
            Err(HeraError::Eval("division by zero".to_owned()))
        );
    }

    #[test]
    fn evaluation_reads_machine_state() {
        let mut shell = shell("SET(R1, 1)");
        shell.debugger.vm.registers[1] = 30;
        shell.debugger.vm.memory[30] = 99;

        let expr = minilanguage::parse("@R1 + 1").unwrap();
        assert_eq!(shell.evaluate_node(&expr.seq[0]), Ok(100));
    }

    #[test]
    fn symbols_evaluate_to_their_values() {
        let shell = shell("CONSTANT(N, 42)\nSET(R1, N)");
        let expr = minilanguage::parse("N * 2").unwrap();
        assert_eq!(shell.evaluate_node(&expr.seq[0]), Ok(84));

        let expr = minilanguage::parse("missing").unwrap();
        assert!(shell.evaluate_node(&expr.seq[0]).is_err());
    }
}
