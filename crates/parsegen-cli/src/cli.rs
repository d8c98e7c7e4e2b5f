use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use parsegen_core::grammar::Charset;

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum CharsetArg {
    #[default]
    Utf8,
    Ascii,
}

impl CharsetArg {
    pub fn to_charset(self) -> Charset {
        match self {
            CharsetArg::Utf8 => Charset::Utf8,
            CharsetArg::Ascii => Charset::Ascii,
        }
    }
}

/// Reads a grammar file and emits a self-contained lexer, LALR parser, and
/// AST walker.
#[derive(Parser)]
#[command(name = "parsegen", bin_name = "parsegen", disable_version_flag = true)]
#[command(about = "Generates a lexer, parser, and AST walker from a grammar file")]
pub struct Cli {
    /// Print version information and exit
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version)]
    pub version: (),

    /// Read the grammar from this file
    #[arg(short = 'f', long = "file", value_name = "GRAMMAR")]
    pub grammar_file: Option<PathBuf>,

    /// Read the grammar from this argument instead of a file
    #[arg(short = 's', long = "string", value_name = "GRAMMAR")]
    pub grammar_string: Option<String>,

    /// Character encoding of the generated lexer
    #[arg(short = 'c', long = "charset", value_enum, default_value = "utf8")]
    pub charset: CharsetArg,

    /// Output directory for the generated program
    #[arg(short = 'd', long = "dir", value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Base name for the generated output files
    #[arg(short = 'n', long = "name", value_name = "NAME")]
    pub basename: Option<String>,

    /// Emit a single amalgamated file instead of a header/source split
    #[arg(short = 'a', long = "amalgamated")]
    pub amalgamated: bool,

    /// Suppress source-position directives in the generated program
    #[arg(short = 'r', long = "no-line-directives")]
    pub suppress_line_directives: bool,

    /// Report pipeline progress on stdout
    #[arg(short = 'm', long = "verbose")]
    pub verbose: bool,

    /// Write diagnostics to this log file ("-" means stdout)
    #[arg(short = 'l', long = "log", value_name = "LOG")]
    pub log_file: Option<String>,

    /// Emit a Markdown grammar dump to this file
    #[arg(short = 'g', long = "dump", value_name = "FILE")]
    pub dump_file: Option<PathBuf>,
}
