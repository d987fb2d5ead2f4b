// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-env-changed=EDGEVIEW_VERSION");

    // Packagers can pin the reported version without a git checkout
    let version = std::env::var("EDGEVIEW_VERSION").unwrap_or_else(|_| describe());

    println!("cargo::rustc-env=EDGEVIEW_BUILD_VERSION={}", version);
}

/// `<crate version>-<short hash>` when built from git, plain crate version otherwise.
fn describe() -> String {
    let crate_version = std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".into());
    match short_hash() {
        Some(hash) => format!("{}-{}", crate_version, hash),
        None => crate_version,
    }
}

fn short_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;

    if output.status.success() {
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        None
    }
}
