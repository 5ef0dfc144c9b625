use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use clap::error::ErrorKind;
use tracing_subscriber::EnvFilter;

use treelox::Lox;

const EXIT_USAGE: u8 = 64;
const EXIT_NO_INPUT: u8 = 66;
const EXIT_IO_ERROR: u8 = 74;

/// Tree-walking interpreter for the Lox scripting language.
#[derive(Debug, Parser)]
#[command(name = "treelox", version, about)]
struct Cli {
    /// Script to run. Starts an interactive prompt when omitted.
    script: Option<PathBuf>,

    /// Print the parsed program instead of running it.
    #[arg(long)]
    print_ast: bool,
}

fn main() -> ExitCode {
    init_tracing();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_USAGE),
            };
        }
    };

    match &cli.script {
        Some(path) => run_file(path, cli.print_ast).unwrap_or_else(|e| {
            eprintln!("{e:?}");
            ExitCode::from(EXIT_NO_INPUT)
        }),
        None => match run_prompt(cli.print_ast) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{e:?}");
                ExitCode::from(EXIT_IO_ERROR)
            }
        },
    }
}

/// Logs go to stderr, and only when `RUST_LOG` is set.
fn init_tracing() {
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(io::stderr)
            .with_target(true)
            .init();
    }
}

fn run_file(path: &Path, print_ast: bool) -> anyhow::Result<ExitCode> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("failed to read script {}", path.display()))?;

    if print_ast {
        return Ok(dump_ast(&source));
    }

    let mut lox = Lox::new(io::stdout().lock());
    match lox.run(&source) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("{e}");
            Ok(ExitCode::from(e.exit_code()))
        }
    }
}

fn run_prompt(print_ast: bool) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut lox = Lox::new(io::stdout());
    let mut buffer = String::new();

    loop {
        print!("> ");
        io::stdout().flush().context("failed to write prompt")?;

        buffer.clear();
        let read = stdin
            .read_line(&mut buffer)
            .context("failed to read prompt")?;
        let line = buffer.trim();
        if read == 0 || line.is_empty() {
            break;
        }

        if print_ast {
            dump_ast(line);
        } else if let Err(e) = lox.run(line) {
            eprintln!("{e}");
        }
    }
    Ok(())
}

fn dump_ast(source: &str) -> ExitCode {
    match treelox::parse(source) {
        Ok(statements) => {
            for stmt in &statements {
                println!("{}", stmt.print());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}
