mod cli;

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;

use parsegen_compiler::diagnostics::DiagnosticsPrinter;
use parsegen_compiler::pipeline::{self, Options};
use parsegen_compiler::progress::Progress;

use cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let (source, file_name) = match read_grammar(&cli) {
        Ok(pair) => pair,
        Err(msg) => {
            eprintln!("error: {msg}");
            return ExitCode::FAILURE;
        }
    };

    let mut progress = if cli.verbose {
        Progress::Stdout
    } else {
        match &cli.log_file {
            Some(path) => match Progress::file(path) {
                Ok(p) => p,
                Err(err) => {
                    eprintln!("error: could not open log file '{path}': {err}");
                    return ExitCode::FAILURE;
                }
            },
            None => Progress::Null,
        }
    };

    let options = Options {
        default_charset: cli.charset.to_charset(),
        amalgamated: cli.amalgamated,
        suppress_line_directives: cli.suppress_line_directives,
        log_lexer: false,
        log_parser: false,
        dump_grammar: cli.dump_file.is_some(),
    };

    let output = match pipeline::generate(&source, &file_name, &options, &mut progress) {
        Ok(output) => output,
        Err(err) => {
            let rendered = DiagnosticsPrinter::new().source(&source).path(&file_name).render(&err);
            eprintln!("{rendered}");
            return ExitCode::FAILURE;
        }
    };

    for warning in &output.warnings {
        eprintln!("warning: {warning}");
    }

    if let Err(err) = write_output(&cli, &output) {
        eprintln!("error: {err}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn read_grammar(cli: &Cli) -> Result<(String, String), String> {
    match (&cli.grammar_file, &cli.grammar_string) {
        (Some(path), _) => {
            let source = fs::read_to_string(path).map_err(|err| format!("could not open grammar '{}': {err}", path.display()))?;
            Ok((source, path.display().to_string()))
        }
        (None, Some(text)) => Ok((text.clone(), "<command-line>".to_string())),
        (None, None) => Err("either -f <grammar> or -s <string> is required".to_string()),
    }
}

fn write_output(cli: &Cli, output: &pipeline::GeneratedOutput) -> std::io::Result<()> {
    let basename = cli.basename.as_deref().unwrap_or("generated");
    fs::create_dir_all(&cli.output_dir)?;

    if cli.amalgamated {
        fs::write(file_path(&cli.output_dir, basename, "rs"), &output.header)?;
    } else {
        fs::write(file_path(&cli.output_dir, basename, "rs"), &output.header)?;
        if let Some(source) = &output.source {
            fs::write(file_path(&cli.output_dir, &format!("{basename}_impl"), "rs"), source)?;
        }
    }

    for (name, contents) in &output.walker_files {
        fs::write(cli.output_dir.join(name), contents)?;
    }

    if let Some(dump_path) = &cli.dump_file {
        if let Some(dump) = &output.grammar_dump {
            fs::write(dump_path, dump)?;
        }
    }

    Ok(())
}

fn file_path(dir: &Path, basename: &str, extension: &str) -> std::path::PathBuf {
    dir.join(format!("{basename}.{extension}"))
}
