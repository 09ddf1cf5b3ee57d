//! Version control collaborator.
//!
//! Git is always invoked with argument vectors; commit messages are never
//! interpolated into a shell line.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};

/// Staged commits and undo of the last one.
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Stage every working-tree change and commit it.
    async fn commit_all(&self, message: &str) -> Result<()>;

    /// Undo the last commit, keeping its changes staged.
    async fn undo(&self) -> Result<()>;
}

/// [`Vcs`] backed by the `git` executable.
#[derive(Debug, Clone)]
pub struct GitVcs {
    root: PathBuf,
}

impl GitVcs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn git(&self, args: &[&str]) -> Result<String> {
        git(&self.root, args).await
    }
}

#[async_trait]
impl Vcs for GitVcs {
    async fn commit_all(&self, message: &str) -> Result<()> {
        self.git(&["add", "-A"]).await?;
        self.git(&["commit", "-m", message]).await?;
        Ok(())
    }

    async fn undo(&self) -> Result<()> {
        self.git(&["reset", "--soft", "HEAD~1"]).await?;
        Ok(())
    }
}

/// Run `git -C <dir> <args>` and return its trimmed stdout.
pub async fn git(dir: &Path, args: &[&str]) -> Result<String> {
    debug!("git {}", args.join(" "));
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let message = if stderr.trim().is_empty() { stdout } else { stderr };
        return Err(Error::Vcs {
            command: format!("git {}", args.join(" ")),
            message: message.trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Top level of the git work tree containing `dir`, if any.
pub async fn repo_root(dir: &Path) -> Option<PathBuf> {
    git(dir, &["rev-parse", "--show-toplevel"])
        .await
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

/// Files tracked by git under `root`, relative to it.
pub async fn tracked_files(root: &Path) -> Option<Vec<String>> {
    let listing = git(root, &["ls-files"]).await.ok()?;
    Some(
        listing
            .lines()
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    pub(crate) fn git_available() -> bool {
        std::process::Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    pub(crate) async fn init_repo(dir: &Path) {
        git(dir, &["init", "-q"]).await.unwrap();
        git(dir, &["config", "user.email", "dev@example.com"]).await.unwrap();
        git(dir, &["config", "user.name", "Dev"]).await.unwrap();
        git(dir, &["config", "commit.gpgsign", "false"]).await.unwrap();
    }

    #[tokio::test]
    async fn test_commit_and_undo() {
        if !git_available() {
            return;
        }
        let dir = TempDir::new().unwrap();
        init_repo(dir.path()).await;
        let vcs = GitVcs::new(dir.path());

        std::fs::write(dir.path().join("a.txt"), "one").unwrap();
        vcs.commit_all("first 'quoted' $(message)").await.unwrap();
        let log = git(dir.path(), &["log", "--format=%s"]).await.unwrap();
        assert_eq!(log, "first 'quoted' $(message)");

        std::fs::write(dir.path().join("b.txt"), "two").unwrap();
        vcs.commit_all("second").await.unwrap();
        vcs.undo().await.unwrap();
        let log = git(dir.path(), &["log", "--format=%s"]).await.unwrap();
        assert_eq!(log, "first 'quoted' $(message)");
        let staged = git(dir.path(), &["diff", "--cached", "--name-only"]).await.unwrap();
        assert_eq!(staged, "b.txt");
    }

    #[tokio::test]
    async fn test_tracked_files_and_root() {
        if !git_available() {
            return;
        }
        let dir = TempDir::new().unwrap();
        init_repo(dir.path()).await;
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "").unwrap();
        git(dir.path(), &["add", "-A"]).await.unwrap();

        assert_eq!(
            tracked_files(dir.path()).await.unwrap(),
            vec!["src/lib.rs".to_string()]
        );
        let root = repo_root(&dir.path().join("src")).await.unwrap();
        assert_eq!(
            root.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[tokio::test]
    async fn test_failure_outside_repository() {
        if !git_available() {
            return;
        }
        let dir = TempDir::new().unwrap();
        let err = GitVcs::new(dir.path()).undo().await.unwrap_err();
        assert!(matches!(err, Error::Vcs { .. }));
    }
}
