// SPDX-FileCopyrightText: 2025 Maciej Borzecki <maciek.borzecki@gmail.com>
//
// SPDX-License-Identifier: MIT

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use log;
use serde;
use serde_yml;
use thiserror;

use crate::flags::DriverOptions;

const MACHINES_DIR: &str = "machines";
const STATE_FILE: &str = "driver.yaml";

/// Wraps machine store errors.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid machine name \"{0}\"")]
    InvalidName(String),
    #[error("machine \"{0}\" not found")]
    NotFound(String),
    #[error("cannot determine data directory")]
    NoDataDir,
    #[error("cannot access {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("cannot parse machine state: {0}")]
    Parse(serde_yml::Error),
    #[error("cannot serialize machine state: {0}")]
    Serialize(serde_yml::Error),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> Error + '_ {
    move |source| Error::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Persisted state of a machine.
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone, Default, PartialEq)]
pub struct Machine {
    pub name: String,
    #[serde(default)]
    pub options: DriverOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloned_drive_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

impl Machine {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

/// Machine names are used as directory names and server names.
fn validate_name(name: &str) -> Result<(), Error> {
    let valid = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'));
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidName(name.to_string()))
    }
}

/// Directory backed store of machines, each machine is kept in
/// <root>/machines/<name>/.
#[derive(Debug, Clone)]
pub struct MachineStore {
    root: PathBuf,
}

impl MachineStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Returns the platform specific data directory.
    pub fn default_root() -> Result<PathBuf, Error> {
        ProjectDirs::from("com", "cloudsigma", "cloudsigma-machine-driver")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or(Error::NoDataDir)
    }

    pub fn machine_dir(&self, name: &str) -> Result<PathBuf, Error> {
        validate_name(name)?;
        Ok(self.root.join(MACHINES_DIR).join(name))
    }

    pub fn exists(&self, name: &str) -> Result<bool, Error> {
        Ok(self.machine_dir(name)?.join(STATE_FILE).exists())
    }

    /// Save machine state, creating its directory if needed.
    pub fn save(&self, machine: &Machine) -> Result<(), Error> {
        let dir = self.machine_dir(&machine.name)?;
        fs::create_dir_all(&dir).map_err(io_error(&dir))?;

        let data = serde_yml::to_string(machine).map_err(Error::Serialize)?;
        let path = dir.join(STATE_FILE);
        log::debug!("saving machine state to {}", path.display());
        fs::write(&path, data).map_err(io_error(&path))
    }

    pub fn load(&self, name: &str) -> Result<Machine, Error> {
        let path = self.machine_dir(name)?.join(STATE_FILE);
        log::debug!("loading machine state from {}", path.display());

        let f = match fs::File::open(&path) {
            Ok(f) => f,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(Error::NotFound(name.to_string()))
            }
            Err(err) => return Err(io_error(&path)(err)),
        };
        serde_yml::from_reader(f).map_err(Error::Parse)
    }

    /// Remove the machine directory. Removing a machine which does not exist
    /// is not an error.
    pub fn remove(&self, name: &str) -> Result<(), Error> {
        let dir = self.machine_dir(name)?;
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(&dir)(err)),
        }
    }

    /// Names of all machines in the store.
    pub fn list(&self) -> Result<Vec<String>, Error> {
        let dir = self.root.join(MACHINES_DIR);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(vec![]),
            Err(err) => return Err(io_error(&dir)(err)),
        };

        let mut names = vec![];
        for entry in entries {
            let entry = entry.map_err(io_error(&dir))?;
            if entry.path().join(STATE_FILE).exists() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_machine_dir() {
        let s = MachineStore::new("/tmp/store");
        assert_eq!(
            s.machine_dir("default").unwrap(),
            PathBuf::from("/tmp/store/machines/default")
        );
    }

    #[test]
    fn test_invalid_names() {
        let s = MachineStore::new("/tmp/store");
        for name in ["", "..", "../foo", "foo/bar", ".hidden", "foo bar"] {
            assert!(
                matches!(s.machine_dir(name), Err(Error::InvalidName(_))),
                "name {:?} accepted",
                name
            );
        }
        assert!(s.machine_dir("cloudsigma-1234.test_1").is_ok());
    }

    #[test]
    fn test_save_load_remove() {
        let root = tempfile::tempdir().unwrap();
        let s = MachineStore::new(root.path());

        assert!(!s.exists("default").unwrap());
        assert!(matches!(s.load("default"), Err(Error::NotFound(_))));

        let mut m = Machine::new("default");
        m.server_uuid = Some("server-uuid".to_string());
        m.options.cpu = 1000;
        s.save(&m).unwrap();

        assert!(s.exists("default").unwrap());
        assert_eq!(s.load("default").unwrap(), m);
        assert_eq!(s.list().unwrap(), vec!["default".to_string()]);

        s.remove("default").unwrap();
        assert!(!s.exists("default").unwrap());
        assert!(!root.path().join("machines/default").exists());
        // already gone
        s.remove("default").unwrap();
    }

    #[test]
    fn test_load_partial_state() {
        let root = tempfile::tempdir().unwrap();
        let s = MachineStore::new(root.path());
        let dir = s.machine_dir("partial").unwrap();
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(STATE_FILE), "name: partial\nssh_key_uuid: key-uuid\n").unwrap();

        let m = s.load("partial").unwrap();
        assert_eq!(m.name, "partial");
        assert_eq!(m.ssh_key_uuid.as_deref(), Some("key-uuid"));
        assert_eq!(m.server_uuid, None);
        assert_eq!(m.options, DriverOptions::default());
    }

    #[test]
    fn test_load_garbage() {
        let root = tempfile::tempdir().unwrap();
        let s = MachineStore::new(root.path());
        let dir = s.machine_dir("broken").unwrap();
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(STATE_FILE), "- not\n- a machine\n").unwrap();

        assert!(matches!(s.load("broken"), Err(Error::Parse(_))));
    }

    #[test]
    fn test_list_empty() {
        let root = tempfile::tempdir().unwrap();
        let s = MachineStore::new(root.path());
        assert!(s.list().unwrap().is_empty());
    }
}
