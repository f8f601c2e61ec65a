use anyhow::{bail, Context, Result};
use std::path::Path;
use std::process::{Command, Output};

const BANNER: &str = "====================";

fn git_pull(dir: &Path) -> Result<Output> {
    Command::new("git")
        .arg("pull")
        .current_dir(dir)
        .output()
        .context("Failed to run git; is it installed and on PATH?")
}

/// Update the checkout in `dir` with `git pull`, echoing git's output between banners.
///
/// Changes only take effect after the bot restarts.
pub fn self_update(dir: &Path) -> Result<()> {
    println!("{BANNER}\nUpdating from git in {}\n{BANNER}", dir.display());
    let output = git_pull(dir)?;
    print!("{}", String::from_utf8_lossy(&output.stdout));
    eprint!("{}", String::from_utf8_lossy(&output.stderr));
    println!("{BANNER}");

    if !output.status.success() {
        bail!("git pull failed with {}", output.status);
    }
    tracing::info!(dir = %dir.display(), "Update pulled");
    println!("Update complete. Restart the bot to apply changes.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fails_outside_a_git_checkout() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(self_update(tmp.path()).is_err());
    }
}
