use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{anyhow, Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};
use memmap2::Mmap;

use rox::ast_printer::{AstPrinter, RpnPrinter};
use rox::error::LoxError;
use rox::interpreter::{Interpreter, DEFAULT_MAX_DEPTH};
use rox::lox::{parse_source, Lox};
use rox::scanner::Scanner;

/// Stack for the thread running user code; deep Lox recursion needs far
/// more than the main thread's default before the depth limit trips.
const INTERPRETER_STACK_SIZE: usize = 256 * 1024 * 1024;

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,

    /// Maximum call depth before a run aborts with a stack overflow
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Print the tokens as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Parses a program from a file and prints its AST
    Parse {
        filename: PathBuf,

        /// Print the AST as JSON
        #[arg(long)]
        json: bool,

        /// Print expressions in reverse Polish notation
        #[arg(long, conflicts_with = "json")]
        rpn: bool,
    },

    /// Runs input from a file as a Lox program
    Run { filename: PathBuf },

    /// Starts an interactive prompt
    Repl,
}

/// Memory‑maps a source file and checks that it is UTF‑8.
fn read_file(filename: &Path) -> Result<String> {
    info!("Reading file: {:?}", filename);
    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;

    // SAFETY: the map is read once and copied out before the file could
    // be modified by anyone else.
    let map = unsafe { Mmap::map(&file) }
        .context(format!("Failed to map file {:?}", filename))?;

    let source = std::str::from_utf8(&map)
        .map_err(LoxError::from)
        .context(format!("File {:?} is not valid UTF-8", filename))?;

    info!("Read {} bytes from {:?}", source.len(), filename);

    Ok(source.to_string())
}

fn init_logger() -> Result<()> {
    // Create or open the log file
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    Builder::new()
        .format(|buf, record| {
            // Strip the crate prefix from the module path
            let module = record.module_path().unwrap_or("<unnamed>");
            let module = module.strip_prefix("rox::").unwrap_or(module);
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug) // Default to Debug, override with RUST_LOG
        .parse_default_env()
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

/// Print every diagnostic and pick the exit code for the worst of them.
fn report(errors: &[LoxError]) -> i32 {
    for e in errors {
        debug!("Reporting: {:?}", e);
        eprintln!("{}", e);
    }

    errors.iter().map(LoxError::exit_code).max().unwrap_or(0)
}

fn tokenize(filename: &Path, json: bool) -> Result<i32> {
    info!("Running Tokenize subcommand");
    let source = read_file(filename)?;
    let (tokens, errors) = Scanner::new(&source).scan_tokens();

    if json {
        println!("{}", serde_json::to_string_pretty(&tokens)?);
    } else {
        for token in &tokens {
            println!("{}", token);
        }
    }

    Ok(report(&errors))
}

fn parse(filename: &Path, json: bool, rpn: bool) -> Result<i32> {
    info!("Running Parse subcommand");
    let source = read_file(filename)?;

    match parse_source(&source) {
        Ok(statements) if json => {
            println!("{}", serde_json::to_string_pretty(&statements)?);
            Ok(0)
        }
        Ok(statements) if rpn => {
            for stmt in &statements {
                println!("{}", RpnPrinter.print_stmt(stmt));
            }
            Ok(0)
        }
        Ok(statements) => {
            for stmt in &statements {
                println!("{}", AstPrinter.print_stmt(stmt));
            }
            Ok(0)
        }
        Err(errors) => Ok(report(&errors)),
    }
}

fn run(filename: &Path, max_depth: usize) -> Result<i32> {
    info!("Running Run subcommand");
    let source = read_file(filename)?;

    let mut lox = Lox::with_interpreter(Interpreter::new().with_max_depth(max_depth));

    match lox.run(&source) {
        Ok(()) => {
            info!("Program executed successfully");
            Ok(0)
        }
        Err(errors) => Ok(report(&errors)),
    }
}

fn repl(max_depth: usize) -> Result<i32> {
    info!("Starting REPL");

    let mut lox = Lox::with_interpreter(Interpreter::new().with_max_depth(max_depth));
    let stdin = io::stdin();
    let mut line = String::new();

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            break;
        }

        if line.trim().is_empty() {
            continue;
        }

        // A bad line is reported; the session carries on.
        if let Err(errors) = lox.run_line(&line) {
            report(&errors);
        }
    }

    info!("REPL finished");
    Ok(0)
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    // Initialize logger only if --log flag is provided
    if args.log {
        init_logger()?;
    } else {
        // Initialize a minimal logger to avoid "no logger" errors
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    let max_depth = args.max_depth;
    let worker = thread::Builder::new()
        .name("interpreter".into())
        .stack_size(INTERPRETER_STACK_SIZE)
        .spawn(move || match args.commands {
            Commands::Tokenize { filename, json } => tokenize(&filename, json),
            Commands::Parse {
                filename,
                json,
                rpn,
            } => parse(&filename, json, rpn),
            Commands::Run { filename } => run(&filename, max_depth),
            Commands::Repl => repl(max_depth),
        })
        .context("Failed to spawn interpreter thread")?;

    let code = worker
        .join()
        .map_err(|_| anyhow!("Interpreter thread panicked"))??;

    if code != 0 {
        debug!("Exiting with code {}", code);
        std::process::exit(code);
    }

    Ok(())
}
