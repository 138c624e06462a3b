//! Compiler configuration
//!
//! Controls how the produced C translation unit is turned into an
//! executable: which C compiler to run and with which flags. Defaults are
//! pinned so that the emitted C compiles without warnings; a project can
//! override them with an `oomph.toml` next to the source file.
//!
//! ```toml
//! cc = "clang"
//! cflags = ["-std=c11", "-Wall", "-O0", "-g"]
//! ldflags = ["-lm"]
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    /// C compiler command.
    pub cc: String,
    /// Flags passed before the input files.
    pub cflags: Vec<String>,
    /// Flags passed after the input files (libraries).
    pub ldflags: Vec<String>,
    /// Where compilation artifacts go. Defaults to `.oomph-cache` next to
    /// the source file.
    pub cache_dir: Option<PathBuf>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            cc: "cc".to_string(),
            cflags: vec![
                "-std=c11".to_string(),
                "-Wall".to_string(),
                "-O2".to_string(),
                "-g".to_string(),
            ],
            ldflags: vec!["-lm".to_string()],
            cache_dir: None,
        }
    }
}

impl CompilerConfig {
    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("invalid configuration: {}", e))
    }

    /// The configuration for compiling `source_path`: `oomph.toml` in the
    /// same directory if present, the defaults otherwise.
    pub fn load_for(source_path: &Path) -> Result<Self, String> {
        let config_path = source_path
            .parent()
            .map(|dir| dir.join("oomph.toml"))
            .filter(|path| path.exists());
        match config_path {
            Some(path) => {
                let content = std::fs::read_to_string(&path)
                    .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
                Self::from_toml(&content)
            }
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CompilerConfig::default();
        assert_eq!(config.cc, "cc");
        assert!(config.cflags.contains(&"-Wall".to_string()));
        assert!(config.ldflags.contains(&"-lm".to_string()));
        assert!(config.cache_dir.is_none());
    }

    #[test]
    fn test_from_toml_overrides() {
        let config = CompilerConfig::from_toml(
            "cc = \"clang\"\ncflags = [\"-O0\"]\n",
        )
        .unwrap();
        assert_eq!(config.cc, "clang");
        assert_eq!(config.cflags, vec!["-O0"]);
        // unspecified fields keep their defaults
        assert_eq!(config.ldflags, vec!["-lm"]);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(CompilerConfig::from_toml("compiler = \"gcc\"\n").is_err());
    }
}
