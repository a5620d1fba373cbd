//! Build script for tempsync
//!
//! Embeds the git revision, build timestamp, target and profile so that
//! `tempsync version` can report exactly which binary is talking on the wire.

use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");

    let git_hash = git(&["rev-parse", "--short=8", "HEAD"]);
    let git_branch = git(&["rev-parse", "--abbrev-ref", "HEAD"]);
    let git_dirty = is_git_dirty();

    let build_timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    let target = env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=TEMPSYNC_GIT_HASH={}", git_hash);
    println!("cargo:rustc-env=TEMPSYNC_GIT_BRANCH={}", git_branch);
    println!("cargo:rustc-env=TEMPSYNC_GIT_DIRTY={}", git_dirty);
    println!("cargo:rustc-env=TEMPSYNC_BUILD_TIMESTAMP={}", build_timestamp);
    println!("cargo:rustc-env=TEMPSYNC_TARGET={}", target);
    println!("cargo:rustc-env=TEMPSYNC_PROFILE={}", profile);
}

/// Run a git command and return its trimmed stdout, or "unknown"
fn git(args: &[&str]) -> String {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                String::from_utf8(output.stdout).ok()
            } else {
                None
            }
        })
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Check if the git working directory is dirty
fn is_git_dirty() -> &'static str {
    Command::new("git")
        .args(["status", "--porcelain"])
        .output()
        .ok()
        .map(|output| {
            if output.status.success() && !output.stdout.is_empty() {
                "true"
            } else {
                "false"
            }
        })
        .unwrap_or("unknown")
}
