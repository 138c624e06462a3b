//! oomph compiler library
//!
//! Compiles oomph source to C, hands the result to an external C compiler,
//! and runs the produced executable. The pipeline is strictly one-way:
//!
//! 1. [`lexer`] - text to tokens, with indentation turned into block tokens
//! 2. [`parser`] - tokens to the untyped AST
//! 3. [`typer`] - untyped AST to typed IR, with refcount bookkeeping
//! 4. [`codegen`] - typed IR to one C translation unit
//!
//! [`compile_to_c`] runs steps 1-4 on a source string; [`compile_file`] also
//! writes the artifacts and invokes the C compiler; [`run_program`] runs the
//! result, mirroring its exit code and reporting death by signal.

pub mod ast;
pub mod builtins;
pub mod codegen;
pub mod config;
pub mod imports;
pub mod ir;
pub mod lexer;
pub mod parser;
pub mod runtime_embed;
pub mod typer;
pub mod types;

pub use config::CompilerConfig;
pub use parser::parse_file;
pub use types::TypeRegistry;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Compile one source unit to C text.
pub fn compile_to_c(source: &str) -> Result<String, String> {
    let program = parse_file(source)?;
    if program
        .iter()
        .any(|declaration| matches!(declaration, ast::ToplevelDeclaration::Import(_)))
    {
        return Err(
            "imports are resolved by the build driver; compile one unit at a time".to_string(),
        );
    }
    let mut registry = TypeRegistry::new();
    let declarations = typer::convert_program(&mut registry, &program)?;
    Ok(codegen::run(&registry, &declarations))
}

fn default_cache_dir(input: &Path) -> PathBuf {
    let next_to_input = input
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(|parent| parent.join(".oomph-cache"));
    match next_to_input {
        Some(dir) if fs::create_dir_all(&dir).is_ok() => dir,
        // e.g. the source directory is read-only
        _ => PathBuf::from(".oomph-cache"),
    }
}

/// Compile a source file to an executable in the cache directory.
pub fn compile_file(
    input: &Path,
    config: &CompilerConfig,
    verbose: bool,
) -> Result<PathBuf, String> {
    let source = fs::read_to_string(input)
        .map_err(|e| format!("failed to read {}: {}", input.display(), e))?;
    if verbose {
        eprintln!("Parsing {}", input.display());
    }
    let c_code = compile_to_c(&source)?;

    let cache_dir = config
        .cache_dir
        .clone()
        .unwrap_or_else(|| default_cache_dir(input));
    fs::create_dir_all(&cache_dir)
        .map_err(|e| format!("failed to create {}: {}", cache_dir.display(), e))?;

    let stem = input
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned();
    let c_path = cache_dir.join(format!("{}.c", stem));
    fs::write(&c_path, &c_code)
        .map_err(|e| format!("failed to write {}: {}", c_path.display(), e))?;
    let runtime_c = runtime_embed::write_runtime(&cache_dir)?;

    let exe_path = cache_dir.join(&stem);
    let mut command = Command::new(&config.cc);
    command
        .args(&config.cflags)
        .arg(&c_path)
        .arg(&runtime_c)
        .arg("-I")
        .arg(&cache_dir)
        .arg("-o")
        .arg(&exe_path)
        .args(&config.ldflags);
    if verbose {
        eprintln!("Running: {:?}", command);
    }
    let output = command
        .output()
        .map_err(|e| format!("failed to run {}: {}", config.cc, e))?;
    if !output.status.success() {
        return Err(format!(
            "C compiler failed:\n{}",
            String::from_utf8_lossy(&output.stderr)
        ));
    }
    Ok(exe_path)
}

/// Run a compiled program, optionally under valgrind. Returns the exit code
/// to propagate; death by signal is reported to stderr.
pub fn run_program(
    exe: &Path,
    program_args: &[String],
    valgrind: bool,
    verbose: bool,
) -> Result<i32, String> {
    let mut command = if valgrind {
        let mut command = Command::new("valgrind");
        command
            .arg("-q")
            .arg("--leak-check=full")
            .arg("--show-leak-kinds=all")
            .arg(exe);
        command
    } else {
        Command::new(exe)
    };
    command.args(program_args);
    if verbose {
        eprintln!("Running: {:?}", command);
    }
    let status = command
        .status()
        .map_err(|e| format!("failed to run {}: {}", exe.display(), e))?;

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            let mut message = format!("Program killed by signal {}", signal);
            if let Some(name) = signal_name(signal) {
                message.push_str(&format!(" ({})", name));
            }
            eprintln!("{}", message);
            return Ok(128 + signal);
        }
    }
    Ok(status.code().unwrap_or(1))
}

#[cfg(unix)]
fn signal_name(signal: i32) -> Option<&'static str> {
    match signal {
        1 => Some("SIGHUP"),
        2 => Some("SIGINT"),
        3 => Some("SIGQUIT"),
        4 => Some("SIGILL"),
        6 => Some("SIGABRT"),
        7 => Some("SIGBUS"),
        8 => Some("SIGFPE"),
        9 => Some("SIGKILL"),
        11 => Some("SIGSEGV"),
        13 => Some("SIGPIPE"),
        14 => Some("SIGALRM"),
        15 => Some("SIGTERM"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imports_are_rejected() {
        let err = compile_to_c(
            "import \"utils.oomph\" as utils\nfunc main() -> void:\n    pass\n",
        )
        .unwrap_err();
        assert!(err.contains("one unit at a time"), "{}", err);
    }

    #[test]
    #[cfg(unix)]
    fn test_signal_names() {
        assert_eq!(signal_name(11), Some("SIGSEGV"));
        assert_eq!(signal_name(9), Some("SIGKILL"));
        assert_eq!(signal_name(64), None);
    }

    #[test]
    fn test_compile_file_writes_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("hello.oomph");
        fs::write(&input, "func main() -> void:\n    print(\"hi\")\n").unwrap();

        // Use a compiler that surely exists so the test only checks our side
        // of the contract: artifacts written, command assembled.
        let config = CompilerConfig {
            cc: "true".to_string(),
            cflags: vec![],
            ldflags: vec![],
            cache_dir: None,
        };
        compile_file(&input, &config, false).unwrap();

        let cache = dir.path().join(".oomph-cache");
        assert!(cache.join("hello.c").exists());
        assert!(cache.join("lib/oomph.h").exists());
        assert!(cache.join("lib/oomph.c").exists());
        let c_code = fs::read_to_string(cache.join("hello.c")).unwrap();
        assert!(c_code.starts_with("#include \"lib/oomph.h\""));
    }
}
