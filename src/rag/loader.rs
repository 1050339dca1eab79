use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::Serialize;
use walkdir::WalkDir;

/// Extensions (without the dot) that are worth indexing.
pub const SOURCE_EXTENSIONS: [&str; 9] = ["py", "js", "ts", "md", "java", "go", "rs", "html", "css"];
/// Files matched by exact name regardless of extension.
pub const SOURCE_FILE_NAMES: [&str; 1] = ["Dockerfile"];
/// Hidden entries, bytecode caches and vendored dependencies.
pub const DEFAULT_EXCLUDES: [&str; 3] = ["**/.*", "**/__pycache__", "**/node_modules"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceLanguage {
    Python,
    JavaScript,
    TypeScript,
    Markdown,
    Java,
    Go,
    Rust,
    Html,
    Css,
    Dockerfile,
}

impl SourceLanguage {
    pub fn from_path(path: &Path) -> Option<Self> {
        if path.file_name().and_then(|name| name.to_str()) == Some("Dockerfile") {
            return Some(SourceLanguage::Dockerfile);
        }

        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase());

        match ext.as_deref() {
            Some("py") => Some(SourceLanguage::Python),
            Some("js") => Some(SourceLanguage::JavaScript),
            Some("ts") => Some(SourceLanguage::TypeScript),
            Some("md") => Some(SourceLanguage::Markdown),
            Some("java") => Some(SourceLanguage::Java),
            Some("go") => Some(SourceLanguage::Go),
            Some("rs") => Some(SourceLanguage::Rust),
            Some("html") => Some(SourceLanguage::Html),
            Some("css") => Some(SourceLanguage::Css),
            _ => None,
        }
    }
}

/// One loaded file, keyed by its path relative to the walk root.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: String,
    pub language: Option<SourceLanguage>,
    pub text: String,
}

#[derive(Clone)]
pub struct SourceLoader {
    extensions: Vec<String>,
    file_names: Vec<String>,
    excludes: GlobSet,
}

impl SourceLoader {
    pub fn new(
        extensions: &[&str],
        file_names: &[&str],
        exclude_globs: &[&str],
    ) -> anyhow::Result<Self> {
        Ok(Self {
            extensions: extensions.iter().map(|ext| ext.to_string()).collect(),
            file_names: file_names.iter().map(|name| name.to_string()).collect(),
            excludes: build_globset(exclude_globs)?,
        })
    }

    pub fn with_defaults() -> anyhow::Result<Self> {
        Self::new(&SOURCE_EXTENSIONS, &SOURCE_FILE_NAMES, &DEFAULT_EXCLUDES)
    }

    /// Lists candidate files under `root`, sorted by relative path. Excluded
    /// directories are pruned rather than walked.
    pub fn discover(&self, root: &Path) -> anyhow::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !self.is_excluded(root, entry.path()));

        for entry in walker {
            let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
            if entry.file_type().is_file() && self.is_allowed(entry.path()) {
                files.push(entry.into_path());
            }
        }

        files.sort();
        Ok(files)
    }

    /// Reads every discovered file. Invalid UTF-8 is replaced, not rejected.
    pub fn load(&self, root: &Path) -> anyhow::Result<Vec<SourceDocument>> {
        self.discover(root)?
            .into_iter()
            .map(|path| {
                let bytes = fs::read(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                Ok(SourceDocument {
                    path: relative_path(root, &path),
                    language: SourceLanguage::from_path(&path),
                    text: String::from_utf8_lossy(&bytes).into_owned(),
                })
            })
            .collect()
    }

    fn is_excluded(&self, root: &Path, path: &Path) -> bool {
        self.excludes.is_match(relative_path(root, path))
    }

    fn is_allowed(&self, path: &Path) -> bool {
        let name_match = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| self.file_names.iter().any(|allowed| allowed == name));
        let ext_match = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|allowed| allowed == ext));
        name_match || ext_match
    }
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn build_globset(patterns: &[&str]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .with_context(|| format!("Invalid exclude glob: {pattern}"))?;
        builder.add(glob);
    }
    builder.build().context("Failed to build exclude globset")
}
