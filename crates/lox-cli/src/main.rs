use std::io::Write;
use std::process::ExitCode;
use std::{env, fs, io};

use lox::{DiagnosticSink, StdDiagnostics, StdPrint, run_source};

const PROMPT: &str = "> ";

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    if args.len() > 2 {
        eprintln!("Usage: {} [script]", args.first().map(String::as_str).unwrap_or("lox"));
        return ExitCode::from(64);
    }

    if args.len() == 2 { run_file(&args[1]) } else { run_prompt() }
}

fn run_file(path: &str) -> ExitCode {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error reading {path}: {err}");
            return ExitCode::from(74);
        }
    };

    let mut diagnostics = StdDiagnostics::new();
    let mut print = StdPrint;
    run_source(&source, &mut diagnostics, &mut print);

    if diagnostics.had_error() {
        ExitCode::from(65)
    } else if diagnostics.had_runtime_error() {
        ExitCode::from(70)
    } else {
        ExitCode::SUCCESS
    }
}

fn run_prompt() -> ExitCode {
    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("{PROMPT}");
        if io::stdout().flush().is_err() {
            return ExitCode::SUCCESS;
        }

        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) => return ExitCode::SUCCESS,
            Ok(_) => {}
            Err(err) => {
                eprintln!("error reading stdin: {err}");
                return ExitCode::from(74);
            }
        }

        let mut diagnostics = StdDiagnostics::new();
        let mut print = StdPrint;
        run_source(&line, &mut diagnostics, &mut print);
        // A REPL line's errors never end the session; only a script's do.
    }
}
