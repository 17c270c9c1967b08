// SPDX-FileCopyrightText: 2025 Maciej Borzecki <maciek.borzecki@gmail.com>
//
// SPDX-License-Identifier: MIT

use std::io;

fn build_git_version() -> Result<String, io::Error> {
    use std::process::Command;

    let args = &["describe", "--always", "--dirty"];
    let output = Command::new("git").args(args).output()?;
    if !output.status.success() {
        return Err(io::Error::other("git describe failed"));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn main() {
    let vers = build_git_version().unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());
    println!("cargo:rustc-env=BUILD_GIT_VERSION={}", vers);
    println!("cargo:rerun-if-changed=.git/HEAD");
}
