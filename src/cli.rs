//! Command-line interface definition and the translation from flags to
//! [`Settings`](crate::data::Settings).

#[cfg(feature = "repl")]
use clap::{ArgAction, Parser, Subcommand};

use crate::data::{register_to_index, Register};
#[cfg(feature = "repl")]
use crate::data::{Settings, Volume};

/// Command-line arguments for the `hera` binary.
#[cfg(feature = "repl")]
#[derive(Parser, Debug)]
#[command(name = "hera")]
#[command(about = "An interpreter for the Haverford Educational RISC Architecture")]
#[command(version = crate::VERSION, disable_version_flag = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Mode>,

    /// Path of the program to execute ("-" reads standard input)
    #[arg(value_name = "path")]
    pub path: Option<String>,

    /// Do not print colored output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Disallow debugging instructions like print_reg
    #[arg(long = "no-debug-ops", global = true)]
    pub no_debug_ops: bool,

    /// Do not warn about invalid RETURN addresses
    #[arg(long = "no-ret-warn", global = true)]
    pub no_ret_warn: bool,

    /// Reserve more space for the stack
    #[arg(long = "big-stack", global = true)]
    pub big_stack: bool,

    /// Set output level to quiet
    #[arg(short = 'q', long = "quiet", global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Set output level to verbose
    #[arg(long = "verbose", global = true)]
    pub verbose: bool,

    /// Warn on octal literals without the 0o prefix
    #[arg(long = "warn-octal-on", global = true)]
    pub warn_octal_on: bool,

    /// Stop execution after N instructions
    #[arg(long = "throttle", value_name = "N", global = true)]
    pub throttle: Option<u64>,

    /// Set registers before execution, e.g. --init "R1=4, R2=5"
    #[arg(long = "init", value_name = "REGISTERS", global = true)]
    pub init: Option<String>,

    /// With assemble, print only the code segment to standard output
    #[arg(long = "code", global = true)]
    pub code: bool,

    /// With assemble, print only the data segment to standard output
    #[arg(long = "data", global = true)]
    pub data: bool,

    /// Print the version and exit
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    version: Option<bool>,

    /// Print the credits and exit
    #[arg(long = "credits")]
    pub credits: bool,
}

#[cfg(feature = "repl")]
#[derive(Subcommand, Debug)]
pub enum Mode {
    /// Print the preprocessed form of the program
    Preprocess {
        #[arg(value_name = "path")]
        path: String,
    },
    /// Run the program under the interactive debugger
    Debug {
        #[arg(value_name = "path")]
        path: String,
    },
    /// Assemble the program into .lcode and .ldata files
    Assemble {
        #[arg(value_name = "path")]
        path: String,
    },
    /// Decode an assembled code file back into operations
    Disassemble {
        #[arg(value_name = "path")]
        path: String,
    },
}

#[cfg(feature = "repl")]
impl Cli {
    /// Reject flags that make no sense with the chosen subcommand.
    pub fn validate(&self) -> Result<(), String> {
        let subcommand = match &self.command {
            None => {
                if self.code || self.data {
                    return Err(
                        "--code and --data may only be used with the assemble subcommand"
                            .to_owned(),
                    );
                }
                return Ok(());
            }
            Some(mode) => mode,
        };

        let name = match subcommand {
            Mode::Preprocess { .. } => "preprocess",
            Mode::Debug { .. } => "debug",
            Mode::Assemble { .. } => "assemble",
            Mode::Disassemble { .. } => "disassemble",
        };

        if (self.code || self.data) && !matches!(subcommand, Mode::Assemble { .. }) {
            return Err(format!(
                "--code and --data are incompatible with the {} subcommand",
                name
            ));
        }
        if self.init.is_some() && !matches!(subcommand, Mode::Debug { .. }) {
            return Err(format!(
                "--init is incompatible with the {} subcommand",
                name
            ));
        }
        if self.throttle.is_some() && !matches!(subcommand, Mode::Debug { .. }) {
            return Err(format!(
                "--throttle is incompatible with the {} subcommand",
                name
            ));
        }
        Ok(())
    }

    /// The path to operate on, wherever it was given.
    pub fn target_path(&self) -> Option<&str> {
        match &self.command {
            Some(
                Mode::Preprocess { path }
                | Mode::Debug { path }
                | Mode::Assemble { path }
                | Mode::Disassemble { path },
            ) => Some(path),
            None => self.path.as_deref(),
        }
    }

    pub fn to_settings(&self) -> Result<Settings, String> {
        let mut settings = Settings::default();
        if self.no_color {
            settings.color = false;
        }
        if self.big_stack {
            settings.data_start = crate::data::BIG_STACK_DATA_START;
        }
        settings.no_debug_ops = self.no_debug_ops;
        settings.no_ret_warn = self.no_ret_warn;
        settings.warn_octal_on = self.warn_octal_on;
        settings.throttle = self.throttle;
        settings.code = self.code;
        settings.data = self.data;
        if self.quiet {
            settings.volume = Volume::Quiet;
        } else if self.verbose {
            settings.volume = Volume::Verbose;
        }
        if let Some(init) = &self.init {
            settings.init = parse_init(init)?;
        }
        Ok(settings)
    }
}

/// Parse the argument of `--init`: comma-separated `register=value` pairs.
pub fn parse_init(text: &str) -> Result<Vec<(Register, u16)>, String> {
    let mut assignments = Vec::new();
    for pair in text.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("invalid register assignment: {}", pair))?;
        let register = register_to_index(name.trim())
            .map_err(|_| format!("{} is not a valid register", name.trim()))?;
        let value = parse_u16(value.trim())
            .ok_or_else(|| format!("invalid value for {}: {}", name.trim(), value.trim()))?;
        assignments.push((register, value));
    }
    Ok(assignments)
}

fn parse_u16(text: &str) -> Option<u16> {
    let (negative, text) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let value = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i32::from_str_radix(hex, 16).ok()?
    } else if let Some(bin) = text.strip_prefix("0b").or_else(|| text.strip_prefix("0B")) {
        i32::from_str_radix(bin, 2).ok()?
    } else if let Some(oct) = text.strip_prefix("0o").or_else(|| text.strip_prefix("0O")) {
        i32::from_str_radix(oct, 8).ok()?
    } else {
        text.parse::<i32>().ok()?
    };
    let value = if negative { -value } else { value };
    crate::data::to_u16(value).ok()
}
