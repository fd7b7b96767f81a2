//! Checkout manager.
//!
//! One isolated git worktree per session branch under
//! `~/.hydra/worktrees/<repo-name>/`, so each wrapped agent works in its own
//! copy of the repository. Checkouts are left in place on shutdown; the next
//! startup re-attaches sessions to them and `prune_orphans` sweeps
//! directories that no longer back a registered worktree.
//!
//! Branch names are used verbatim as directory components. A branch with
//! slashes nests below the base directory, which collides with the layout of
//! other branches sharing the prefix. A known caveat, not sanitized away.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::git;

/// One on-disk checkout and the branch it tracks.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkout {
    pub path: PathBuf,
    pub branch: String,
}

pub struct CheckoutManager {
    repo_root: PathBuf,
    base: PathBuf,
}

impl CheckoutManager {
    /// `base = <home>/.hydra/worktrees/<repo-name>`.
    pub fn new(repo_root: PathBuf, home: &Path) -> Self {
        let base = home
            .join(".hydra")
            .join("worktrees")
            .join(git::repo_name(&repo_root));
        Self { repo_root, base }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base
    }

    /// Create (or attach to) the checkout for `branch` and return its path.
    pub async fn add(&self, branch: &str) -> Result<PathBuf> {
        let path = self.base.join(branch);
        if path.join(".git").exists() {
            debug!(branch = %branch, path = %path.display(), "Reusing existing checkout");
            return Ok(path);
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let path_str = path.to_string_lossy().into_owned();
        if git::branch_exists(&self.repo_root, branch).await? {
            git::run(&self.repo_root, &["worktree", "add", &path_str, branch]).await?;
        } else {
            git::run(&self.repo_root, &["worktree", "add", "-b", branch, &path_str]).await?;
        }

        info!(branch = %branch, path = %path.display(), "Checkout created");
        Ok(path)
    }

    /// Remove a checkout. Best-effort: a failed `git worktree remove` falls
    /// back to deleting the directory so the session can still close.
    pub async fn remove(&self, path: &Path) -> Result<()> {
        let path_str = path.to_string_lossy().into_owned();
        if let Err(e) = git::run(
            &self.repo_root,
            &["worktree", "remove", "--force", &path_str],
        )
        .await
        {
            warn!(path = %path.display(), error = %e, "git worktree remove failed, deleting directory");
            std::fs::remove_dir_all(path)
                .with_context(|| format!("failed to remove {}", path.display()))?;
        }
        info!(path = %path.display(), "Checkout removed");
        Ok(())
    }

    /// All checkouts currently on disk. The branch is the path relative to
    /// the base directory, so slashed branch names round-trip.
    pub fn list(&self) -> Vec<Checkout> {
        let mut found = Vec::new();
        scan(&self.base, &self.base, &mut found);
        found.sort_by(|a, b| a.branch.cmp(&b.branch));
        found
    }

    /// Drop stale worktree registrations, then delete directories under the
    /// base that no longer contain a checkout.
    pub async fn prune_orphans(&self) {
        if let Err(e) = git::run(&self.repo_root, &["worktree", "prune"]).await {
            warn!(error = %e, "git worktree prune failed");
        }

        let entries = match std::fs::read_dir(&self.base) {
            Ok(entries) => entries,
            Err(_) => return,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let mut contained = Vec::new();
            scan(&path, &self.base, &mut contained);
            if contained.is_empty() {
                info!(path = %path.display(), "Removing orphaned checkout directory");
                if let Err(e) = std::fs::remove_dir_all(&path) {
                    warn!(path = %path.display(), error = %e, "failed to remove orphan");
                }
            }
        }
    }
}

/// Depth-first walk collecting directories that hold a worktree `.git` file.
fn scan(dir: &Path, base: &Path, out: &mut Vec<Checkout>) {
    if dir.join(".git").exists() {
        let branch = dir
            .strip_prefix(base)
            .unwrap_or(dir)
            .to_string_lossy()
            .into_owned();
        out.push(Checkout {
            path: dir.to_path_buf(),
            branch,
        });
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            scan(&path, base, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("hydra-checkout-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn fake_checkout(base: &Path, branch: &str) {
        let dir = base.join(branch);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(".git"), "gitdir: elsewhere\n").unwrap();
    }

    #[test]
    fn test_base_layout() {
        let mgr = CheckoutManager::new(
            PathBuf::from("/src/myrepo"),
            Path::new("/home/me"),
        );
        assert_eq!(
            mgr.base_dir(),
            Path::new("/home/me/.hydra/worktrees/myrepo")
        );
    }

    #[test]
    fn test_list_flat_and_nested() {
        let home = scratch_dir("list");
        let mgr = CheckoutManager::new(PathBuf::from("/src/myrepo"), &home);
        std::fs::create_dir_all(mgr.base_dir()).unwrap();
        fake_checkout(mgr.base_dir(), "main");
        fake_checkout(mgr.base_dir(), "feature/login");

        let listed = mgr.list();
        let branches: Vec<&str> = listed.iter().map(|c| c.branch.as_str()).collect();
        assert_eq!(branches, vec!["feature/login", "main"]);
        assert_eq!(listed[1].path, mgr.base_dir().join("main"));

        let _ = std::fs::remove_dir_all(&home);
    }

    #[test]
    fn test_list_missing_base_is_empty() {
        let home = scratch_dir("missing");
        let mgr = CheckoutManager::new(PathBuf::from("/src/gone"), &home);
        assert!(mgr.list().is_empty());
        let _ = std::fs::remove_dir_all(&home);
    }
}
