use std::{fs, process::ExitCode};

use clap::Parser;
use pyrpn::{CompileOptions, Program, RpnError, transpile};
use tracing::{Level, debug};

/// ANSI escape code for bold red text (errors).
const BOLD_RED: &str = "\x1b[1m\x1b[31m";
/// ANSI escape code for dim/gray text.
const DIM: &str = "\x1b[2m";
/// ANSI escape code to reset all text styling.
const RESET: &str = "\x1b[0m";

/// pyrpn: converts a Python subset into HP-42S / Free42 RPN programs.
///
/// - `pyrpn <file>` transpiles the file
/// - `pyrpn -c <code>` transpiles `<code>`
#[derive(Parser)]
#[command(version)]
struct Cli {
    /// Transpile a program passed as a string (like `python -c`).
    #[arg(short = 'c')]
    command: Option<String>,

    /// Python file to transpile.
    file: Option<String>,

    /// Write the program to this file instead of stdout.
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Load compile options from a JSON file; flags below override it.
    #[arg(long = "options")]
    options: Option<String>,

    /// Append `// comments` to generated lines.
    #[arg(long = "comments")]
    comments: bool,

    /// Prefix each line with its line number.
    #[arg(short = 'n', long = "linenos")]
    linenos: bool,

    /// Leave the support library out of the program.
    #[arg(long = "no-library")]
    no_library: bool,

    /// Keep global `LBL "pXXX"` labels in the support library.
    #[arg(long = "global-library-labels")]
    global_library_labels: bool,

    /// Number of numbered registers available (`00` up to this minus one).
    #[arg(long = "max-registers")]
    max_registers: Option<u16>,

    /// Print the program as JSON, one object per line.
    #[arg(long = "json")]
    json: bool,

    /// Log progress to stderr; repeat for more detail.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let (file_name, code) = match (&cli.command, cli.file.as_deref()) {
        (Some(_), Some(_)) => {
            eprintln!("{BOLD_RED}error{RESET}: cannot specify both -c and a file");
            return ExitCode::FAILURE;
        }
        (Some(code), None) => ("<string>", code.clone()),
        (None, Some(file_path)) => match read_file(file_path) {
            Ok(code) => (file_path, code),
            Err(err) => {
                eprintln!("{BOLD_RED}error{RESET}: {err}");
                return ExitCode::FAILURE;
            }
        },
        (None, None) => {
            eprintln!("{BOLD_RED}error{RESET}: expected a file or -c <code>");
            return ExitCode::FAILURE;
        }
    };

    let options = match build_options(&cli) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{BOLD_RED}error{RESET}: {err}");
            return ExitCode::FAILURE;
        }
    };
    debug!(file = file_name, ?options, "transpiling");

    let program = match transpile(&code, &options) {
        Ok(program) => program,
        Err(err) => {
            report(file_name, &err);
            return ExitCode::FAILURE;
        }
    };

    let rendered = if cli.json {
        match render_json(&program) {
            Ok(rendered) => rendered,
            Err(err) => {
                eprintln!("{BOLD_RED}error{RESET}: {err}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        program.render(options.emit_comments, options.emit_linenos)
    };

    match &cli.output {
        Some(path) => {
            if let Err(err) = fs::write(path, rendered + "\n") {
                eprintln!("{BOLD_RED}error{RESET}: writing {path}: {err}");
                return ExitCode::FAILURE;
            }
            eprintln!("{DIM}{} lines written to {path}{RESET}", program.len());
        }
        None => println!("{rendered}"),
    }
    ExitCode::SUCCESS
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => return,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Options file first, then command line flags on top.
fn build_options(cli: &Cli) -> Result<CompileOptions, String> {
    let mut options = match &cli.options {
        Some(path) => {
            let text = read_file(path)?;
            serde_json::from_str::<CompileOptions>(&text).map_err(|err| format!("parsing {path}: {err}"))?
        }
        None => CompileOptions::new(),
    };
    if cli.comments {
        options = options.emit_comments(true);
    }
    if cli.linenos {
        options = options.emit_linenos(true);
    }
    if cli.no_library {
        options = options.emit_support_library(false);
    }
    if cli.global_library_labels {
        options = options.rewrite_support_library_to_local_labels(false);
    }
    if let Some(max_registers) = cli.max_registers {
        options = options.max_registers(max_registers);
    }
    Ok(options)
}

fn render_json(program: &Program) -> Result<String, String> {
    program
        .lines()
        .iter()
        .map(|line| serde_json::to_string(line).map_err(|err| err.to_string()))
        .collect::<Result<Vec<_>, _>>()
        .map(|lines| lines.join("\n"))
}

fn report(file_name: &str, err: &RpnError) {
    eprintln!("{BOLD_RED}error{RESET} in {file_name} [{}]:\n{err}", err.kind());
}

/// Reads a Python source file from disk.
///
/// Returns an error message if the path doesn't exist, isn't a file, or can't be read.
fn read_file(file_path: &str) -> Result<String, String> {
    match fs::metadata(file_path) {
        Ok(metadata) => {
            if !metadata.is_file() {
                return Err(format!("{file_path} is not a file"));
            }
        }
        Err(err) => {
            return Err(format!("reading {file_path}: {err}"));
        }
    }
    fs::read_to_string(file_path).map_err(|err| format!("reading {file_path}: {err}"))
}
