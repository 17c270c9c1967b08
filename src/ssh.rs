// SPDX-FileCopyrightText: 2025 Maciej Borzecki <maciek.borzecki@gmail.com>
//
// SPDX-License-Identifier: MIT

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use log;
use thiserror;

/// Wraps SSH key generation errors.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("cannot start ssh-keygen: {0}")]
    Start(io::Error),
    #[error("ssh-keygen exited with status {exit_code}, stderr:\n{stderr}")]
    Execution { stderr: String, exit_code: i32 },
    #[error("cannot read public key {path}: {source}")]
    ReadPublicKey { path: PathBuf, source: io::Error },
}

/// Trait representing a way to generate an SSH key pair.
pub trait KeyGenerator {
    /// Generate a private key at path, with the public key next to it in
    /// <path>.pub.
    fn generate(&mut self, path: &Path) -> Result<(), Error>;
}

/// Generates RSA keys using ssh-keygen.
pub struct SshKeygen;

impl SshKeygen {
    fn command(path: &Path) -> Command {
        let mut cmd = Command::new("ssh-keygen");
        cmd.args(["-t", "rsa", "-b", "2048", "-N", "", "-q", "-f"]);
        cmd.arg(path);
        cmd
    }
}

impl KeyGenerator for SshKeygen {
    fn generate(&mut self, path: &Path) -> Result<(), Error> {
        let mut cmd = Self::command(path);

        log::trace!(
            "running ssh-keygen with: {:?}",
            cmd.get_args()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
        );

        let res = cmd.output().map_err(Error::Start)?;
        if !res.status.success() {
            return Err(Error::Execution {
                stderr: String::from_utf8_lossy(&res.stderr).trim().to_string(),
                exit_code: res.status.code().unwrap_or(255),
            });
        }
        Ok(())
    }
}

/// Path of the public key matching a private key.
pub fn public_key_path(path: &Path) -> PathBuf {
    let mut p = OsString::from(path.as_os_str());
    p.push(".pub");
    PathBuf::from(p)
}

/// Read the public key of a key pair generated at path, without the trailing
/// newline.
pub fn read_public_key(path: &Path) -> Result<String, Error> {
    let pub_path = public_key_path(path);
    let data = fs::read_to_string(&pub_path).map_err(|e| Error::ReadPublicKey {
        path: pub_path,
        source: e,
    })?;
    Ok(data.trim_end_matches(['\r', '\n']).to_string())
}
