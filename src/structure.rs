//! Directory tree and README extraction for the initial analysis prompt.

use std::fs;
use std::path::Path;

use anyhow::Context;
use walkdir::WalkDir;

pub const README_NOT_FOUND: &str = "No README.md file found.";

/// Noise directories that never appear in the tree.
pub const SKIPPED_DIRS: [&str; 6] = [".git", "node_modules", "venv", "__pycache__", ".vscode", ".idea"];

/// Renders every directory (`name/`) and file under `root`, indented four
/// spaces per nesting level. Within a directory, files precede
/// subdirectories and both are sorted by name.
pub fn describe(root: &Path) -> anyhow::Result<String> {
    let walker = WalkDir::new(root)
        .sort_by(|a, b| {
            a.file_type()
                .is_dir()
                .cmp(&b.file_type().is_dir())
                .then_with(|| a.file_name().cmp(b.file_name()))
        })
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !(entry.file_type().is_dir()
                    && entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| SKIPPED_DIRS.contains(&name)))
        });

    let mut tree = String::new();
    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        let indent = " ".repeat(4 * entry.depth());
        let name = entry.file_name().to_string_lossy();
        if entry.file_type().is_dir() {
            tree.push_str(&format!("{indent}{name}/\n"));
        } else {
            tree.push_str(&format!("{indent}{name}\n"));
        }
    }

    Ok(tree)
}

/// Top-level `README.md`, decoded lossily, if present.
pub fn read_readme(root: &Path) -> Option<String> {
    let bytes = fs::read(root.join("README.md")).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

/// README text, or [`README_NOT_FOUND`].
pub fn readme_or_sentinel(root: &Path) -> String {
    read_readme(root).unwrap_or_else(|| README_NOT_FOUND.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("create dirs");
        fs::write(path, b"x").expect("write");
    }

    #[test]
    fn tree_is_indented_by_depth() {
        let parent = tempdir().expect("tempdir");
        let root = parent.path().join("demo");
        touch(&root, "README.md");
        touch(&root, "src/main.py");
        touch(&root, "src/util/helpers.py");
        touch(&root, "setup.py");

        let tree = describe(&root).expect("describe");
        let expected = "\
demo/
    README.md
    setup.py
    src/
        main.py
        util/
            helpers.py
";
        assert_eq!(tree, expected);
    }

    #[test]
    fn noise_directories_are_never_listed() {
        let dir = tempdir().expect("tempdir");
        for skipped in SKIPPED_DIRS {
            touch(dir.path(), &format!("{skipped}/inner/file.txt"));
            touch(dir.path(), &format!("nested/{skipped}/file.txt"));
        }
        touch(dir.path(), "nested/keep.rs");

        let tree = describe(dir.path()).expect("describe");
        for skipped in SKIPPED_DIRS {
            assert!(!tree.contains(&format!("{skipped}/")), "{skipped} leaked:\n{tree}");
        }
        assert!(!tree.contains("file.txt"));
        assert!(tree.contains("        keep.rs\n"));
    }

    #[test]
    fn hidden_files_outside_the_denylist_are_listed() {
        let dir = tempdir().expect("tempdir");
        touch(dir.path(), ".gitignore");
        touch(dir.path(), ".github/workflows/ci.yml");

        let tree = describe(dir.path()).expect("describe");
        assert!(tree.contains("    .gitignore\n"));
        assert!(tree.contains("    .github/\n"));
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempdir().expect("tempdir");
        assert!(describe(&dir.path().join("gone")).is_err());
    }

    #[test]
    fn readme_is_returned_verbatim() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("README.md"), "Hello World").expect("write");
        assert_eq!(readme_or_sentinel(dir.path()), "Hello World");
    }

    #[test]
    fn readme_invalid_bytes_are_replaced() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("README.md"), b"caf\xe9").expect("write");
        assert_eq!(read_readme(dir.path()).as_deref(), Some("caf\u{FFFD}"));
    }

    #[test]
    fn absent_readme_yields_sentinel() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("readme.txt"), "other").expect("write");
        assert_eq!(read_readme(dir.path()), None);
        assert_eq!(readme_or_sentinel(dir.path()), "No README.md file found.");
    }
}
