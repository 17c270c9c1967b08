// SPDX-FileCopyrightText: 2025 Maciej Borzecki <maciek.borzecki@gmail.com>
//
// SPDX-License-Identifier: MIT

use clap;
use serde;
use thiserror;

pub const DEFAULT_CPU: u64 = 2000;
pub const DEFAULT_DRIVE_NAME: &str = "ubuntu";
pub const DEFAULT_DRIVE_SIZE: u64 = 20;
pub const DEFAULT_MEMORY: u64 = 1024;
pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_SSH_USER: &str = "cloudsigma";

/// Wraps option validation errors.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("cloudsigma driver requires the --{0} option")]
    Missing(&'static str),
    #[error("--cloudsigma-drive-name and --cloudsigma-drive-uuid are mutually exclusive")]
    DriveNameAndUuid,
    #[error("either --cloudsigma-drive-name or --cloudsigma-drive-uuid is required")]
    NoDrive,
}

/// Options controlling how a machine is provisioned.
#[derive(clap::Args, serde::Deserialize, serde::Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DriverOptions {
    /// CloudSigma API location endpoint code
    #[arg(long = "cloudsigma-api-location", env = "CLOUDSIGMA_API_LOCATION")]
    pub api_location: Option<String>,

    /// CPU clock speed for the host in MHz
    #[arg(long = "cloudsigma-cpu", env = "CLOUDSIGMA_CPU", default_value_t = DEFAULT_CPU)]
    pub cpu: u64,

    /// CPU type
    #[arg(long = "cloudsigma-cpu-type", env = "CLOUDSIGMA_CPU_TYPE")]
    pub cpu_type: Option<String>,

    /// Enclave Page Cache (EPC) size
    #[arg(long = "cloudsigma-cpu-epc-size", env = "CLOUDSIGMA_CPU_EPC_SIZE")]
    pub cpu_epc_size: Option<String>,

    /// CloudSigma drive name
    #[arg(
        long = "cloudsigma-drive-name",
        env = "CLOUDSIGMA_DRIVE_NAME",
        default_value = DEFAULT_DRIVE_NAME
    )]
    pub drive_name: String,

    /// Drive size for the host in GiB
    #[arg(
        long = "cloudsigma-drive-size",
        env = "CLOUDSIGMA_DRIVE_SIZE",
        default_value_t = DEFAULT_DRIVE_SIZE
    )]
    pub drive_size: u64,

    /// CloudSigma drive uuid
    #[arg(long = "cloudsigma-drive-uuid", env = "CLOUDSIGMA_DRIVE_UUID")]
    pub drive_uuid: Option<String>,

    /// Size of memory for the host in MB
    #[arg(
        long = "cloudsigma-memory",
        env = "CLOUDSIGMA_MEMORY",
        default_value_t = DEFAULT_MEMORY
    )]
    pub memory: u64,

    /// CloudSigma password
    #[arg(
        long = "cloudsigma-password",
        env = "CLOUDSIGMA_PASSWORD",
        hide_env_values = true
    )]
    pub password: Option<String>,

    /// SSH port to connect
    #[arg(
        long = "cloudsigma-ssh-port",
        env = "CLOUDSIGMA_SSH_PORT",
        default_value_t = DEFAULT_SSH_PORT
    )]
    pub ssh_port: u16,

    /// SSH username to connect
    #[arg(
        long = "cloudsigma-ssh-user",
        env = "CLOUDSIGMA_SSH_USER",
        default_value = DEFAULT_SSH_USER
    )]
    pub ssh_user: String,

    /// CloudSigma network adapter's static IP address
    #[arg(long = "cloudsigma-static-ip", env = "CLOUDSIGMA_STATIC_IP")]
    pub static_ip: Option<String>,

    /// CloudSigma user email
    #[arg(long = "cloudsigma-username", env = "CLOUDSIGMA_USERNAME")]
    pub username: Option<String>,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            api_location: None,
            cpu: DEFAULT_CPU,
            cpu_type: None,
            cpu_epc_size: None,
            drive_name: DEFAULT_DRIVE_NAME.to_string(),
            drive_size: DEFAULT_DRIVE_SIZE,
            drive_uuid: None,
            memory: DEFAULT_MEMORY,
            password: None,
            ssh_port: DEFAULT_SSH_PORT,
            ssh_user: DEFAULT_SSH_USER.to_string(),
            static_ip: None,
            username: None,
        }
    }
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().filter(|s| !s.is_empty())
}

impl DriverOptions {
    /// Check that the options are complete and consistent.
    pub fn validate(&self) -> Result<(), Error> {
        if non_empty(&self.username).is_none() {
            return Err(Error::Missing("cloudsigma-username"));
        }
        if non_empty(&self.password).is_none() {
            return Err(Error::Missing("cloudsigma-password"));
        }
        if !self.drive_name.is_empty() && non_empty(&self.drive_uuid).is_some() {
            return Err(Error::DriveNameAndUuid);
        }
        if self.drive_name.is_empty() && non_empty(&self.drive_uuid).is_none() {
            return Err(Error::NoDrive);
        }
        Ok(())
    }

    pub fn username(&self) -> &str {
        non_empty(&self.username).unwrap_or_default()
    }

    pub fn password(&self) -> &str {
        non_empty(&self.password).unwrap_or_default()
    }

    pub fn api_location(&self) -> Option<&str> {
        non_empty(&self.api_location)
    }

    pub fn cpu_type(&self) -> Option<&str> {
        non_empty(&self.cpu_type)
    }

    pub fn cpu_epc_size(&self) -> Option<&str> {
        non_empty(&self.cpu_epc_size)
    }

    pub fn drive_uuid(&self) -> Option<&str> {
        non_empty(&self.drive_uuid)
    }

    pub fn static_ip(&self) -> Option<&str> {
        non_empty(&self.static_ip)
    }
}

/// Describes a single provisioning flag.
#[derive(serde::Serialize, Debug, Clone, PartialEq)]
pub struct Flag {
    pub name: String,
    pub env_var: String,
    pub usage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// Returns the provisioning flags accepted by the driver.
pub fn create_flags() -> Vec<Flag> {
    let cmd = <DriverOptions as clap::Args>::augment_args(clap::Command::new("create"));

    cmd.get_arguments()
        .filter_map(|arg| {
            let name = arg.get_long()?;
            Some(Flag {
                name: name.to_string(),
                env_var: arg
                    .get_env()
                    .map(|e| e.to_string_lossy().to_string())
                    .unwrap_or_default(),
                usage: arg.get_help().map(|h| h.to_string()).unwrap_or_default(),
                default: arg
                    .get_default_values()
                    .first()
                    .map(|v| v.to_string_lossy().to_string()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(clap::Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        opts: DriverOptions,
    }

    fn parse(args: &[&str]) -> DriverOptions {
        let mut argv = vec!["test"];
        argv.extend_from_slice(args);
        TestCli::try_parse_from(argv)
            .expect("cannot parse arguments")
            .opts
    }

    #[test]
    fn test_defaults() {
        let opts = parse(&[]);
        assert_eq!(opts, DriverOptions::default());
        assert_eq!(opts.drive_name, "ubuntu");
        assert_eq!(opts.ssh_user, "cloudsigma");
        assert_eq!(opts.ssh_port, 22);
    }

    #[test]
    fn test_validate_empty_password() {
        let opts = parse(&["--cloudsigma-username", "user@cloudsigma.com"]);
        assert_eq!(opts.validate(), Err(Error::Missing("cloudsigma-password")));
    }

    #[test]
    fn test_validate_empty_username() {
        let opts = parse(&["--cloudsigma-password", "password"]);
        let err = opts.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "cloudsigma driver requires the --cloudsigma-username option"
        );
    }

    #[test]
    fn test_validate() {
        let opts = parse(&[
            "--cloudsigma-password",
            "password",
            "--cloudsigma-username",
            "user@cloudsigma.com",
        ]);
        assert!(opts.validate().is_ok());
        assert_eq!(opts.username(), "user@cloudsigma.com");
        assert_eq!(opts.password(), "password");
        assert_eq!(opts.api_location(), None);
    }

    #[test]
    fn test_custom_ssh_user_and_port() {
        let opts = parse(&[
            "--cloudsigma-password",
            "password",
            "--cloudsigma-ssh-port",
            "2222",
            "--cloudsigma-ssh-user",
            "ssh_user",
            "--cloudsigma-username",
            "user@cloudsigma.com",
        ]);
        assert!(opts.validate().is_ok());
        assert_eq!(opts.ssh_user, "ssh_user");
        assert_eq!(opts.ssh_port, 2222);
    }

    #[test]
    fn test_custom_server_parameters() {
        let opts = parse(&[
            "--cloudsigma-api-location",
            "wdc",
            "--cloudsigma-cpu",
            "1500",
            "--cloudsigma-drive-name",
            "",
            "--cloudsigma-drive-size",
            "15",
            "--cloudsigma-drive-uuid",
            "generated-uuid",
            "--cloudsigma-memory",
            "512",
            "--cloudsigma-password",
            "password",
            "--cloudsigma-static-ip",
            "192.168.0.1",
            "--cloudsigma-username",
            "user@cloudsigma.com",
        ]);
        assert!(opts.validate().is_ok());
        assert_eq!(opts.api_location(), Some("wdc"));
        assert_eq!(opts.cpu, 1500);
        assert_eq!(opts.drive_name, "");
        assert_eq!(opts.drive_size, 15);
        assert_eq!(opts.drive_uuid(), Some("generated-uuid"));
        assert_eq!(opts.memory, 512);
        assert_eq!(opts.static_ip(), Some("192.168.0.1"));
    }

    #[test]
    fn test_validate_exclusive_options() {
        let opts = parse(&[
            "--cloudsigma-drive-name",
            "debian",
            "--cloudsigma-drive-uuid",
            "generated-uuid",
            "--cloudsigma-password",
            "password",
            "--cloudsigma-username",
            "user@cloudsigma.com",
        ]);
        assert_eq!(opts.validate(), Err(Error::DriveNameAndUuid));
    }

    #[test]
    fn test_validate_drive_uuid_with_default_name() {
        let opts = parse(&[
            "--cloudsigma-drive-uuid",
            "generated-uuid",
            "--cloudsigma-password",
            "password",
            "--cloudsigma-username",
            "user@cloudsigma.com",
        ]);
        assert_eq!(opts.validate(), Err(Error::DriveNameAndUuid));
    }

    #[test]
    fn test_validate_no_drive() {
        let opts = parse(&[
            "--cloudsigma-drive-name",
            "",
            "--cloudsigma-password",
            "password",
            "--cloudsigma-username",
            "user@cloudsigma.com",
        ]);
        assert_eq!(opts.validate(), Err(Error::NoDrive));
    }

    #[test]
    fn test_create_flags() {
        let flags = create_flags();
        assert_eq!(flags.len(), 13);

        let cpu = flags
            .iter()
            .find(|f| f.name == "cloudsigma-cpu")
            .expect("no cpu flag");
        assert_eq!(
            cpu,
            &Flag {
                name: "cloudsigma-cpu".to_string(),
                env_var: "CLOUDSIGMA_CPU".to_string(),
                usage: "CPU clock speed for the host in MHz".to_string(),
                default: Some("2000".to_string()),
            }
        );

        let username = flags
            .iter()
            .find(|f| f.name == "cloudsigma-username")
            .expect("no username flag");
        assert_eq!(username.env_var, "CLOUDSIGMA_USERNAME");
        assert_eq!(username.default, None);

        assert!(flags
            .iter()
            .all(|f| f.name.starts_with("cloudsigma-") && f.env_var.starts_with("CLOUDSIGMA_")));
    }

    #[test]
    fn test_options_yaml() {
        let opts = DriverOptions {
            username: Some("user@cloudsigma.com".to_string()),
            password: Some("password".to_string()),
            ..Default::default()
        };
        let data = serde_yml::to_string(&opts).unwrap();
        let back: DriverOptions = serde_yml::from_str(&data).unwrap();
        assert_eq!(back, opts);

        let partial: DriverOptions = serde_yml::from_str("cpu: 1000\n").unwrap();
        assert_eq!(partial.cpu, 1000);
        assert_eq!(partial.drive_name, "ubuntu");
    }
}
