//! Embedded C runtime
//!
//! The runtime header and source are baked into the compiler binary, so a
//! compiled `oomphc` is self-contained: the files are written next to the
//! generated translation unit before the C compiler runs.

use std::fs;
use std::path::{Path, PathBuf};

pub static RUNTIME_HEADER: &str = include_str!("../lib/oomph.h");
pub static RUNTIME_SOURCE: &str = include_str!("../lib/oomph.c");

/// Write `lib/oomph.h` and `lib/oomph.c` under `dir`, returning the path of
/// the C file for the compiler command line.
pub fn write_runtime(dir: &Path) -> Result<PathBuf, String> {
    let lib_dir = dir.join("lib");
    fs::create_dir_all(&lib_dir)
        .map_err(|e| format!("failed to create {}: {}", lib_dir.display(), e))?;
    let header_path = lib_dir.join("oomph.h");
    let source_path = lib_dir.join("oomph.c");
    fs::write(&header_path, RUNTIME_HEADER)
        .map_err(|e| format!("failed to write {}: {}", header_path.display(), e))?;
    fs::write(&source_path, RUNTIME_SOURCE)
        .map_err(|e| format!("failed to write {}: {}", source_path.display(), e))?;
    Ok(source_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_has_required_symbols() {
        for symbol in [
            "REFCOUNT_HEADER",
            "incref",
            "decref",
            "struct class_Str",
            "cstr_to_string",
            "string_concat_inplace",
            "var_print",
            "var_assert",
        ] {
            assert!(RUNTIME_HEADER.contains(symbol), "missing {}", symbol);
        }
    }

    #[test]
    fn test_write_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let c_path = write_runtime(dir.path()).unwrap();
        assert!(c_path.ends_with("lib/oomph.c"));
        assert!(dir.path().join("lib/oomph.h").exists());
    }
}
