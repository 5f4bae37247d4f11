use std::fs;
use std::path::PathBuf;

use loxide as lox;

use anyhow::Context;
use clap::Parser as ClapParser;
use clap::Subcommand;
use log::info;

use lox::ast_printer::AstPrinter;
use lox::interpreter::Interpreter;
use lox::parser::Parser;
use lox::scanner::Scanner;
use lox::token::Token;

#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes the input and prints one line per token
    Tokenize { filename: PathBuf },

    /// Parses expressions and prints their s-expression form
    Parse { filename: PathBuf },

    /// Evaluates a single expression and prints its value
    Evaluate { filename: PathBuf },

    /// Runs the program
    Run { filename: PathBuf },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Cli = match Cli::try_parse() {
        Ok(args) => args,

        Err(e) => {
            // Usage problems are exit code 1, not clap's default 2.
            e.print()?;
            std::process::exit(1);
        }
    };

    match args.commands {
        Commands::Tokenize { filename } => {
            info!("Tokenizing {}", filename.display());

            let scanner = Scanner::new(read_source(&filename)?);
            let mut had_error = false;

            for result in scanner {
                match result {
                    Ok(token) => println!("{}", token),

                    Err(e) => {
                        had_error = true;
                        eprintln!("{}", e);
                    }
                }
            }

            if had_error {
                std::process::exit(65);
            }
        }

        Commands::Parse { filename } => {
            info!("Parsing {}", filename.display());

            let mut parser = Parser::new(lex_or_exit(read_source(&filename)?));

            while let Some(result) = parser.next_expression() {
                match result {
                    Ok(expr) => println!("{}", AstPrinter::print(&expr)),

                    Err(e) => {
                        eprintln!("{}", e);
                        std::process::exit(65);
                    }
                }
            }
        }

        Commands::Evaluate { filename } => {
            info!("Evaluating {}", filename.display());

            let mut parser = Parser::new(lex_or_exit(read_source(&filename)?));

            if let Some(result) = parser.next_expression() {
                match result {
                    Ok(expr) => {
                        let mut interpreter = Interpreter::new();

                        match interpreter.evaluate(&expr) {
                            Ok(value) => println!("{}", value),

                            Err(e) => {
                                eprintln!("{}", e);
                                std::process::exit(e.exit_code());
                            }
                        }
                    }

                    Err(e) => {
                        eprintln!("{}", e);
                        std::process::exit(65);
                    }
                }
            }
        }

        Commands::Run { filename } => {
            info!("Running {}", filename.display());

            let mut parser = Parser::new(lex_or_exit(read_source(&filename)?));
            let mut interpreter = Interpreter::new();

            while let Some(result) = parser.next_declaration() {
                match result {
                    Ok(stmt) => {
                        if let Err(e) = interpreter.interpret(&stmt) {
                            eprintln!("{}", e);
                            std::process::exit(e.exit_code());
                        }
                    }

                    Err(e) => {
                        eprintln!("{}", e);
                        std::process::exit(65);
                    }
                }
            }
        }
    }

    Ok(())
}

fn read_source(filename: &PathBuf) -> anyhow::Result<Vec<u8>> {
    fs::read(filename).with_context(|| format!("Error reading file: {}", filename.display()))
}

/// Scans the whole input up front for the parsing modes.  Lexical errors
/// all go to stderr, then the process exits 65; the parser only ever sees
/// a clean token list ending in `EOF`.
fn lex_or_exit(source: Vec<u8>) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut had_error = false;

    for result in Scanner::new(source) {
        match result {
            Ok(token) => tokens.push(token),

            Err(e) => {
                had_error = true;
                eprintln!("{}", e);
            }
        }
    }

    if had_error {
        std::process::exit(65);
    }

    tokens
}
