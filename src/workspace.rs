use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{info, instrument, warn};

use crate::error::FetchError;

pub type SharedFetcher = Arc<dyn RepoFetcher>;

/// Fetches a remote repository into an existing, empty directory.
#[async_trait]
pub trait RepoFetcher: Send + Sync {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), FetchError>;
}

/// Shells out to `git clone`.
#[derive(Debug, Clone)]
pub struct GitCliFetcher {
    shallow: bool,
}

impl GitCliFetcher {
    pub fn new(shallow: bool) -> Self {
        Self { shallow }
    }
}

#[async_trait]
impl RepoFetcher for GitCliFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        let mut cmd = Command::new("git");
        cmd.arg("clone");
        if self.shallow {
            cmd.args(["--depth", "1"]);
        }
        cmd.arg(url).arg(dest);
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd.kill_on_drop(true);

        let output = cmd.output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FetchError::Failed {
                diagnostic: stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Private temporary directory holding at most one cloned repository.
///
/// Removal is best-effort and happens at most once: explicitly through
/// [`Workspace::destroy`], or when the workspace is dropped.
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl Workspace {
    pub fn create() -> anyhow::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("repo-buddy-")
            .tempdir()
            .context("Failed to allocate a workspace directory")?;
        let path = dir.path().to_path_buf();
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    pub fn is_live(&self) -> bool {
        self.dir.is_some()
    }

    /// Clones `url` into the workspace. On failure the workspace is torn
    /// down before the error is returned.
    #[instrument(skip(self, fetcher), fields(dest = %self.path.display()))]
    pub async fn populate(&mut self, fetcher: &dyn RepoFetcher, url: &str) -> Result<(), FetchError> {
        match fetcher.fetch(url, &self.path).await {
            Ok(()) => {
                info!("Repository cloned");
                Ok(())
            }
            Err(err) => {
                warn!(%err, "Clone failed; removing workspace");
                self.destroy();
                Err(err)
            }
        }
    }

    /// Idempotent; never fails.
    pub fn destroy(&mut self) {
        if let Some(dir) = self.dir.take() {
            if let Err(err) = dir.close() {
                warn!(%err, path = %self.path.display(), "Workspace cleanup failed");
            }
        }
    }
}
