//! Build script for twinmaker-access
//!
//! Captures the compiler version and the git revision so the outbound
//! identification string can report them.

use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=.git/HEAD");

    let rustc = std::env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    if let Some(version) = command_output(&rustc, &["--version"]) {
        // "rustc 1.84.0 (9fc6b4312 2025-01-07)" -> "1.84.0"
        if let Some(number) = version.split_whitespace().nth(1) {
            println!("cargo:rustc-env=TWINMAKER_RUSTC_VERSION={}", number);
        }
    }

    if let Some(hash) = command_output("git", &["rev-parse", "HEAD"]) {
        println!("cargo:rustc-env=TWINMAKER_BUILD_HASH={}", hash);
    }
}

fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
