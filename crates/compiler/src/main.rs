//! oomph compiler CLI
//!
//! Compiles one source file, runs the result, and mirrors its exit code.

use clap::{CommandFactory, Parser as ClapParser};
use clap_complete::{Shell, generate};
use oomphc::CompilerConfig;
use std::io;
use std::path::PathBuf;
use std::process;

#[derive(ClapParser)]
#[command(name = "oomphc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "oomph compiler - compile and run oomph programs", long_about = None)]
struct Cli {
    /// Input .oomph source file
    input: Option<PathBuf>,

    /// Print the generated C code to stdout and exit
    #[arg(long)]
    c_code: bool,

    /// Run the compiled program under valgrind
    #[arg(long)]
    valgrind: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Generate shell completions and exit
    #[arg(long, value_enum, value_name = "SHELL")]
    completions: Option<Shell>,

    /// Arguments passed through to the compiled program
    #[arg(last = true)]
    program_args: Vec<String>,
}

fn main() {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        let mut command = Cli::command();
        generate(shell, &mut command, "oomphc", &mut io::stdout());
        return;
    }

    let Some(input) = cli.input else {
        eprintln!("Error: no input file");
        process::exit(2);
    };

    if cli.c_code {
        let source = match std::fs::read_to_string(&input) {
            Ok(source) => source,
            Err(e) => fail(&input, &format!("failed to read {}: {}", input.display(), e)),
        };
        match oomphc::compile_to_c(&source) {
            Ok(c_code) => print!("{}", c_code),
            Err(e) => fail(&input, &e),
        }
        return;
    }

    let config = match CompilerConfig::load_for(&input) {
        Ok(config) => config,
        Err(e) => fail(&input, &e),
    };
    let exe_path = match oomphc::compile_file(&input, &config, cli.verbose) {
        Ok(path) => path,
        Err(e) => fail(&input, &e),
    };
    match oomphc::run_program(&exe_path, &cli.program_args, cli.valgrind, cli.verbose) {
        Ok(code) => process::exit(code),
        Err(e) => fail(&input, &e),
    }
}

fn fail(input: &std::path::Path, message: &str) -> ! {
    eprintln!("Error: {}", message);
    eprintln!("This happened while compiling {}", input.display());
    process::exit(1);
}
