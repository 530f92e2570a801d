//! Vire Compiler
//!
//! Command line front end: checks a source file and reports diagnostics.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use vire::config::Config;
use vire::feedback::{CheckFeedback, CheckStats};
use vire::frontend::check_source;
use vire::frontend::lexer::Lexer;
use vire::utils::DiagnosticBuilder;

/// Vire Compiler
#[derive(Parser, Debug)]
#[command(name = "virec")]
#[command(version)]
#[command(about = "Vire compiler front end - tokenizer, parser and semantic analyzer")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input source file (checked when no subcommand is given)
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check a source file for errors
    Check {
        /// Input source file
        input: PathBuf,

        /// Print diagnostics as JSON
        #[arg(long)]
        json: bool,

        /// Operator precedence / diagnostic prefix overrides (JSON)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
    /// Print the token stream
    Tokens {
        /// Input source file
        input: PathBuf,
    },
    /// Dump the verified syntax tree
    Ast {
        /// Input source file
        input: PathBuf,

        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
    /// Print version information
    Version,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match &cli.command {
        Some(Commands::Check { input, json, config }) => check_file(input, *json, config.as_deref()),
        Some(Commands::Tokens { input }) => dump_tokens(input).map(|_| true),
        Some(Commands::Ast { input, config }) => dump_ast(input, config.as_deref()),
        Some(Commands::Version) => {
            println!("virec {}", env!("CARGO_PKG_VERSION"));
            println!("Vire compiler front end");
            Ok(true)
        }
        None => match &cli.input {
            Some(input) => check_file(input, false, None),
            None => {
                eprintln!("Error: No input file specified");
                eprintln!("Usage: virec <FILE> or virec check <FILE>");
                process::exit(1);
            }
        },
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Ok(Config::new()),
    }
}

fn read_source(input: &Path) -> Result<String> {
    fs::read_to_string(input).with_context(|| format!("cannot read {}", input.display()))
}

/// Check a source file; returns whether verification passed
fn check_file(input: &Path, json: bool, config: Option<&Path>) -> Result<bool> {
    let config = load_config(config)?;
    let source = read_source(input)?;
    log::info!("checking {}", input.display());

    let mut diags = DiagnosticBuilder::with_prefix(config.diagnostic_prefix.clone());
    let (ok, module) = check_source(&source, &config, &mut diags);

    if json {
        let file_name = input.display().to_string();
        let stats = CheckStats::collect(&module, diags.diagnostics(), &source);
        let feedback = CheckFeedback::new(ok, &file_name, diags.diagnostics(), stats);
        println!("{}", feedback.to_json().context("cannot serialize report")?);
    } else {
        for message in diags.render(&source) {
            eprintln!("{}\n", message);
        }
        if ok {
            println!(
                "[✓] {} verified ({} warning(s))",
                input.display(),
                diags.warning_count()
            );
        } else {
            println!(
                "[✗] {}: {} error(s), {} warning(s)",
                input.display(),
                diags.error_count(),
                diags.warning_count()
            );
        }
    }

    Ok(ok)
}

fn dump_tokens(input: &Path) -> Result<()> {
    let source = read_source(input)?;
    let mut diags = DiagnosticBuilder::new();
    let tokens = Lexer::new(&source).tokenize(&mut diags);

    for token in &tokens {
        println!("{:>4}:{:<3} {:?}", token.span.line, token.span.column, token.kind);
    }
    for message in diags.render(&source) {
        eprintln!("{}\n", message);
    }
    Ok(())
}

fn dump_ast(input: &Path, config: Option<&Path>) -> Result<bool> {
    let config = load_config(config)?;
    let source = read_source(input)?;

    let mut diags = DiagnosticBuilder::with_prefix(config.diagnostic_prefix.clone());
    let (ok, module) = check_source(&source, &config, &mut diags);

    println!("{:#?}", module);
    for message in diags.render(&source) {
        eprintln!("{}\n", message);
    }
    Ok(ok)
}
