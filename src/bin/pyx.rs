//! pyx - Python snippet runner
//!
//! Runs a snippet file, or evaluates one snippet per line interactively.
//! Every evaluation is a separate call with its own namespace.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

use pyexec::{Config, Isolation};

#[derive(Parser, Debug)]
#[command(name = "pyx", about = "Run Python snippets through an embedded libpython")]
struct Args {
    /// Snippet file to run; starts a prompt when omitted
    file: Option<PathBuf>,

    /// JSON object bound as the snippet's input
    #[arg(short, long)]
    input: Option<String>,

    /// Exact libpython to load
    #[arg(long)]
    libpython: Option<PathBuf>,

    /// Run in the main interpreter under the shared lock
    #[arg(long)]
    shared: bool,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let input = match parse_input(args.input.as_deref()) {
        Ok(input) => input,
        Err(e) => {
            eprintln!("Error: invalid --input: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(path) = args.libpython {
        config = config.with_library_path(path);
    }
    if args.shared {
        config = config.with_isolation(Isolation::SharedLock);
    }
    if let Err(e) = pyexec::initialize(config) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    match args.file {
        Some(file) => run_file(&file, &input),
        None => run_repl(&input),
    }
}

fn parse_input(raw: Option<&str>) -> Result<Map<String, Value>, String> {
    match raw {
        None => Ok(Map::new()),
        Some(raw) => match serde_json::from_str(raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err("expected a JSON object".to_string()),
            Err(e) => Err(e.to_string()),
        },
    }
}

fn run_file(file: &Path, input: &Map<String, Value>) -> ExitCode {
    let source = match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading {}: {}", file.display(), e);
            return ExitCode::FAILURE;
        }
    };

    match pyexec::exec(&source, Some(input)) {
        Ok(result) => {
            println!("{}", result);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_repl(input: &Map<String, Value>) -> ExitCode {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("Error starting prompt: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Ok(rt) = pyexec::runtime() {
        println!("pyx - {} ({})", rt.library().display(), rt.isolation());
    }
    println!("Each line runs in a fresh namespace. Ctrl+D to exit.\n");

    loop {
        match editor.readline(">>> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line);

                match pyexec::exec(line, Some(input)) {
                    Ok(result) => println!("{}", result),
                    Err(e) => println!("Error: {}", e),
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Error reading input: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}
