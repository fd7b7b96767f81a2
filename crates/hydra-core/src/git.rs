//! Source-control driver.
//!
//! Shells out to `git` for the handful of repository operations hydra needs.
//! Failures surface as `anyhow` errors carrying git's stderr; callers decide
//! whether they are fatal (preflight) or reportable (session create).

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tokio::process::Command;

/// Run git in `cwd` and return trimmed stdout, failing with stderr context.
pub async fn run(cwd: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .await
        .with_context(|| format!("failed to run git {}", args.join(" ")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Root of the repository containing `cwd`, or an error when outside one.
pub async fn repo_root(cwd: &Path) -> Result<PathBuf> {
    let root = run(cwd, &["rev-parse", "--show-toplevel"])
        .await
        .context("not inside a git repository")?;
    Ok(PathBuf::from(root))
}

/// Basename of the repository root, used as the checkout namespace.
pub fn repo_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "repo".to_string())
}

/// Whether a local branch with this name exists.
pub async fn branch_exists(root: &Path, branch: &str) -> Result<bool> {
    Ok(run(
        root,
        &[
            "rev-parse",
            "--verify",
            "--quiet",
            &format!("refs/heads/{branch}"),
        ],
    )
    .await
    .is_ok())
}
