//! CLI tool to check, dump and format rest-test files.

use std::process::ExitCode;

use rest_test::{Options, ScopeId, SymbolTables, TestRecord, Token, TokenKind};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const DEFINE_SOURCE: &str = "<command line>";

fn usage() {
    eprintln!("Usage: rest-test [options] <command> [files...]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  check     Parse and evaluate test file(s)");
    eprintln!("  dump      Print the parsed records of test file(s)");
    eprintln!("  fmt       Print test file(s) in canonical form");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -D NAME=VALUE          Define a global symbol");
    eprintln!("  --max-line-length N    Reject lines longer than N bytes");
    eprintln!("  -v                     Debug logging (RUST_LOG also works)");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  rest-test check api.rtest");
    eprintln!("  rest-test -D BASE=localhost:8081 check api.rtest");
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

struct Cli {
    command: String,
    files: Vec<String>,
    defines: Vec<(String, String)>,
    options: Options,
    verbose: bool,
}

fn parse_args(args: &[String]) -> Result<Cli, String> {
    let mut command = None;
    let mut files = Vec::new();
    let mut defines = Vec::new();
    let mut options = Options::default();
    let mut verbose = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => return Err(String::new()),
            "-v" => verbose = true,
            "-D" => {
                let def = iter.next().ok_or("-D needs NAME=VALUE")?;
                let (name, value) = def
                    .split_once('=')
                    .ok_or_else(|| format!("invalid define '{def}', expected NAME=VALUE"))?;
                defines.push((name.to_string(), value.to_string()));
            }
            "--max-line-length" => {
                let limit = iter.next().ok_or("--max-line-length needs a number")?;
                let limit = limit
                    .parse()
                    .map_err(|_| format!("invalid line length '{limit}'"))?;
                options = options.max_line_length(limit);
            }
            _ if command.is_none() => command = Some(arg.clone()),
            _ => files.push(arg.clone()),
        }
    }

    let command = command.ok_or_else(String::new)?;
    if files.is_empty() {
        return Err("no files specified".to_string());
    }
    Ok(Cli {
        command,
        files,
        defines,
        options,
        verbose,
    })
}

fn check(path: &str, records: &mut [TestRecord], tables: &SymbolTables) -> bool {
    for record in records.iter_mut() {
        if let Err(err) = record.evaluate(tables) {
            eprintln!("{path}: test '{}': {err}", record.name());
            if let Some(token) = record.failed_token(&err) {
                eprintln!("  offending token: {token}");
            }
            return false;
        }
    }
    let tests = records.len().saturating_sub(1);
    println!("{path}: ok ({tests} test(s))");
    true
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("Error: {msg}");
            }
            usage();
            return ExitCode::from(2);
        }
    };

    if !matches!(cli.command.as_str(), "check" | "dump" | "fmt") {
        eprintln!("Unknown command: {}", cli.command);
        return ExitCode::from(2);
    }

    init_logging(cli.verbose);

    let mut tables = SymbolTables::new();
    let global = tables.create("global", None, cli.options.scope_capacity);
    for (name, value) in &cli.defines {
        let token = Token::new(TokenKind::String, value, DEFINE_SOURCE, 0);
        if tables.add(global, name, &token).is_err() {
            eprintln!("Error: out of memory defining {name}");
            return ExitCode::FAILURE;
        }
        debug!(%name, "defined");
    }

    let mut had_error = false;

    for path in &cli.files {
        let scope: ScopeId = tables.create(path, Some(global), cli.options.scope_capacity);
        let mut records = match rest_test::parse_file(&mut tables, scope, path, &cli.options) {
            Ok(records) => records,
            Err(e) => {
                eprintln!("{path}: {e}");
                had_error = true;
                continue;
            }
        };

        match cli.command.as_str() {
            "check" => {
                if !check(path, &mut records, &tables) {
                    had_error = true;
                }
            }
            "dump" => print!("{}", rest_test::dump(&records, &tables)),
            _ => print!("{}", rest_test::format(&records, &tables)),
        }
    }

    if had_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
