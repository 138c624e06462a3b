//! Import dependency ordering
//!
//! The compiler core works on one unit at a time; a build driver that
//! understands `import "path" as name` feeds units to it in dependency
//! order. This module computes that order: a depth-first postorder over the
//! import graph, failing on cycles with the offending chain spelled out.

use crate::ast::ToplevelDeclaration;
use crate::parser::parse_file;
use std::path::{Path, PathBuf};

/// The import paths a source file declares, resolved against its directory.
pub fn import_paths(source: &str, source_path: &Path) -> Result<Vec<PathBuf>, String> {
    let program = parse_file(source)?;
    let base = source_path.parent().unwrap_or_else(|| Path::new("."));
    Ok(program
        .iter()
        .filter_map(|declaration| match declaration {
            ToplevelDeclaration::Import(import) => Some(base.join(&import.path)),
            _ => None,
        })
        .collect())
}

/// Compute the order in which units must be compiled so that every unit
/// comes after everything it imports. `list_deps` maps a unit to the units
/// it imports (typically [`import_paths`] over the file's contents).
pub fn compilation_order(
    entry: &Path,
    list_deps: &dyn Fn(&Path) -> Result<Vec<PathBuf>, String>,
) -> Result<Vec<PathBuf>, String> {
    let mut order = Vec::new();
    let mut visiting = Vec::new();
    visit(&entry.to_path_buf(), list_deps, &mut visiting, &mut order)?;
    Ok(order)
}

fn visit(
    unit: &PathBuf,
    list_deps: &dyn Fn(&Path) -> Result<Vec<PathBuf>, String>,
    visiting: &mut Vec<PathBuf>,
    order: &mut Vec<PathBuf>,
) -> Result<(), String> {
    if order.contains(unit) {
        return Ok(());
    }
    if visiting.contains(unit) {
        let mut chain: Vec<String> = visiting
            .iter()
            .skip_while(|p| **p != *unit)
            .map(|p| file_name(p))
            .collect();
        chain.push(file_name(unit));
        return Err(format!("cyclic imports: {}", chain.join(" --> ")));
    }

    visiting.push(unit.clone());
    for dep in list_deps(unit)? {
        visit(&dep, list_deps, visiting, order)?;
    }
    visiting.pop();
    order.push(unit.clone());
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;

    fn graph(edges: &[(&str, &[&str])]) -> HashMap<PathBuf, Vec<PathBuf>> {
        edges
            .iter()
            .map(|(from, to)| {
                (
                    PathBuf::from(from),
                    to.iter().map(PathBuf::from).collect(),
                )
            })
            .collect()
    }

    fn order_of(edges: &[(&str, &[&str])], entry: &str) -> Result<Vec<PathBuf>, String> {
        let deps = graph(edges);
        compilation_order(Path::new(entry), &|path: &Path| {
            Ok(deps.get(path).cloned().unwrap_or_default())
        })
    }

    #[test]
    fn test_dependencies_come_first() {
        let order = order_of(
            &[("main.oomph", &["a.oomph", "b.oomph"]), ("a.oomph", &["b.oomph"])],
            "main.oomph",
        )
        .unwrap();
        assert_eq!(
            order,
            vec![
                PathBuf::from("b.oomph"),
                PathBuf::from("a.oomph"),
                PathBuf::from("main.oomph"),
            ]
        );
    }

    #[test]
    fn test_shared_dependency_compiled_once() {
        let order = order_of(
            &[
                ("main.oomph", &["a.oomph", "b.oomph"]),
                ("a.oomph", &["common.oomph"]),
                ("b.oomph", &["common.oomph"]),
            ],
            "main.oomph",
        )
        .unwrap();
        assert_eq!(order.len(), 4);
        assert_eq!(order[0], PathBuf::from("common.oomph"));
    }

    #[test]
    fn test_cycle_is_fatal() {
        let err = order_of(
            &[("a.oomph", &["b.oomph"]), ("b.oomph", &["a.oomph"])],
            "a.oomph",
        )
        .unwrap_err();
        assert_eq!(err, "cyclic imports: a.oomph --> b.oomph --> a.oomph");
    }

    #[test]
    fn test_self_import_is_fatal() {
        let err = order_of(&[("a.oomph", &["a.oomph"])], "a.oomph").unwrap_err();
        assert!(err.contains("cyclic imports"));
    }

    #[test]
    fn test_import_paths_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("main.oomph");
        fs::write(
            &main,
            "import \"utils.oomph\" as utils\nfunc main() -> void:\n    pass\n",
        )
        .unwrap();

        let source = fs::read_to_string(&main).unwrap();
        let paths = import_paths(&source, &main).unwrap();
        assert_eq!(paths, vec![dir.path().join("utils.oomph")]);
    }
}
