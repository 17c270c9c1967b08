// SPDX-FileCopyrightText: 2025 Maciej Borzecki <maciek.borzecki@gmail.com>
//
// SPDX-License-Identifier: MIT

use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use bytesize::ByteSize;
use log;
use thiserror;

use crate::api::drives::{DriveCloneRequest, STATUS_UNMOUNTED};
use crate::api::keypairs::Keypair;
use crate::api::library_drives::{LibraryDrive, LibraryDriveListOptions};
use crate::api::servers::{
    AttachDriveRequest, IpConfiguration, Nic, ResourceRef, ServerCreateRequest, ServerDrive,
};
use crate::api::{self, Client, HttpTransport, Transport};
use crate::flags::{self, DriverOptions};
use crate::ssh::{self, KeyGenerator, SshKeygen};
use crate::store::{self, Machine, MachineStore};

pub const DRIVER_NAME: &str = "cloudsigma";

const SSH_KEY_NAME: &str = "id_rsa";
const DOCKER_PORT: u16 = 2376;
const VNC_PASSWORD: &str = "cloudsigma";
const STORAGE_TYPE: &str = "dssd";
const NIC_MODEL: &str = "virtio";
const IMAGE_TYPE_PREINSTALLED: &str = "preinst";
/// Library images known to be unusable for provisioning.
const EXCLUDED_LIBRARY_DRIVES: &[&str] = &["Ubuntu 20.10"];

const STATUS_RUNNING: &str = "running";
const STATUS_STOPPED: &str = "stopped";

/// Wraps driver errors.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] flags::Error),
    #[error(transparent)]
    Api(#[from] api::Error),
    #[error("cannot set up SSH key: {0}")]
    Ssh(#[from] ssh::Error),
    #[error("cannot persist machine state: {0}")]
    Store(#[from] store::Error),
    #[error("{0} is not a valid textual representation of an IP address")]
    InvalidIp(String),
    #[error("could not find any library drive with name {0}")]
    NoLibraryDrive(String),
    #[error("could not stop server {0}")]
    StopFailed(String),
    #[error("IP address is not set")]
    IpNotSet,
    #[error("machine has no {0}")]
    NotCreated(&'static str),
}

/// State of a machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    None,
    Running,
    Paused,
    Starting,
    Stopped,
    Stopping,
    Error,
}

impl State {
    fn from_status(status: &str) -> Self {
        match status {
            "paused" => State::Paused,
            "running" => State::Running,
            "starting" => State::Starting,
            "stopped" => State::Stopped,
            "stopping" => State::Stopping,
            _ => State::None,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            State::None => "",
            State::Running => "Running",
            State::Paused => "Paused",
            State::Starting => "Starting",
            State::Stopped => "Stopped",
            State::Stopping => "Stopping",
            State::Error => "Error",
        };
        write!(f, "{}", s)
    }
}

/// Pick the preinstalled library drive with the highest version. On equal
/// versions the first one wins.
fn pick_library_drive(drives: &[LibraryDrive]) -> Option<&LibraryDrive> {
    drives
        .iter()
        .filter(|d| d.image_type == IMAGE_TYPE_PREINSTALLED)
        .filter(|d| {
            let excluded = EXCLUDED_LIBRARY_DRIVES
                .iter()
                .any(|name| d.name.contains(name));
            if excluded {
                log::debug!("skip library drive {} ({})", d.uuid, d.name);
            }
            !excluded
        })
        .fold(None, |best: Option<&LibraryDrive>, d| match best {
            Some(best) if best.version >= d.version => Some(best),
            _ => Some(d),
        })
}

/// Treat a missing resource as already deleted.
fn ignore_not_found(res: Result<(), api::Error>, what: &str) -> Result<(), api::Error> {
    match res {
        Err(err) if err.is_not_found() => {
            log::info!("{} doesn't exist, assuming it is already deleted", what);
            Ok(())
        }
        res => res,
    }
}

/// Provisions and manages a single CloudSigma machine.
pub struct Driver<T>
where
    T: Transport,
{
    client: Client<T>,
    store: MachineStore,
    machine: Machine,
    keygen: Box<dyn KeyGenerator>,
    poll_interval: Duration,
}

impl Driver<HttpTransport> {
    /// Returns a driver for the machine talking to the CloudSigma API.
    pub fn new(store: MachineStore, machine: Machine) -> Result<Self, Error> {
        let client =
            Client::new_basic_auth(machine.options.username(), machine.options.password())?;
        Ok(Self::with_client(client, store, machine, Box::new(SshKeygen)))
    }
}

impl<T> Driver<T>
where
    T: Transport,
{
    pub fn with_transport(
        transport: T,
        store: MachineStore,
        machine: Machine,
        keygen: Box<dyn KeyGenerator>,
    ) -> Self {
        let client = Client::with_transport(
            transport,
            machine.options.username(),
            machine.options.password(),
        );
        Self::with_client(client, store, machine, keygen)
    }

    fn with_client(
        mut client: Client<T>,
        store: MachineStore,
        machine: Machine,
        keygen: Box<dyn KeyGenerator>,
    ) -> Self {
        if let Some(location) = machine.options.api_location() {
            client.set_location(location);
        }

        Self {
            client,
            store,
            machine,
            keygen,
            poll_interval: Duration::from_secs(1),
        }
    }

    #[cfg(test)]
    fn test_into_transport(self) -> T {
        self.client.test_into_transport()
    }

    pub fn driver_name(&self) -> &'static str {
        DRIVER_NAME
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    #[cfg(test)]
    fn set_poll_interval(&mut self, interval: Duration) {
        self.poll_interval = interval;
    }

    /// Validate and apply provisioning options.
    pub fn set_config_from_flags(&mut self, options: DriverOptions) -> Result<(), Error> {
        options.validate()?;

        self.client
            .set_basic_auth(options.username(), options.password());
        self.client
            .set_location(options.api_location().unwrap_or(api::DEFAULT_LOCATION));
        self.machine.options = options;
        Ok(())
    }

    /// Check that the machine can be created with the current options.
    pub fn pre_create_check(&mut self) -> Result<(), Error> {
        if let Some(ip) = self.machine.options.static_ip() {
            let ip = ip.to_string();
            if ip.parse::<IpAddr>().is_err() {
                return Err(Error::InvalidIp(ip));
            }
            self.client.ips().get(&ip)?;
        }
        Ok(())
    }

    /// Create and start the machine. The state is saved after each step, so
    /// that a partially created machine can be removed.
    pub fn create(&mut self) -> Result<(), Error> {
        log::info!("Creating SSH key...");
        self.create_ssh_key()?;

        log::info!("Cloning CloudSigma library drive...");
        self.clone_library_drive()?;

        log::info!("Creating CloudSigma server...");
        self.create_server()?;

        log::info!("Starting CloudSigma server...");
        self.start_server()?;

        log::debug!(
            "created server UUID {:?}, drive UUID {:?}, IP address {:?}",
            self.machine.server_uuid,
            self.machine.cloned_drive_uuid,
            self.machine.ip_address
        );
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), Error> {
        self.start_server()
    }

    pub fn stop(&mut self) -> Result<(), Error> {
        self.stop_server()
    }

    pub fn restart(&mut self) -> Result<(), Error> {
        self.stop_server()?;
        self.start_server()
    }

    /// Power off the server without a graceful shutdown.
    pub fn kill(&mut self) -> Result<(), Error> {
        let uuid = self.server_uuid()?;
        self.client.servers().stop(&uuid)?;
        Ok(())
    }

    /// Stop and delete the server with its drives and SSH key, then drop the
    /// machine from the store. The cloned drive is deleted on its own too, as
    /// it may have never been attached.
    pub fn remove(&mut self) -> Result<(), Error> {
        let server_uuid = self.machine.server_uuid.clone();

        if server_uuid.is_some() {
            log::info!("Stopping CloudSigma server...");
            self.stop_server()?;
        }

        if let Some(key_uuid) = self.machine.ssh_key_uuid.clone() {
            log::info!("Deleting SSH key...");
            ignore_not_found(self.client.keypairs().delete(&key_uuid), "SSH key")?;
        }

        if let Some(uuid) = server_uuid {
            log::info!("Deleting CloudSigma server...");
            ignore_not_found(
                self.client.servers().delete_with_drives(&uuid),
                "CloudSigma server",
            )?;
        }

        if let Some(drive_uuid) = self.machine.cloned_drive_uuid.clone() {
            log::info!("Deleting cloned drive...");
            ignore_not_found(self.client.drives().delete(&drive_uuid), "cloned drive")?;
        }

        self.store.remove(&self.machine.name)?;
        Ok(())
    }

    pub fn get_state(&mut self) -> Result<State, Error> {
        let uuid = self.server_uuid()?;
        let server = self.client.servers().get(&uuid)?;
        Ok(State::from_status(&server.status))
    }

    pub fn get_ip(&self) -> Result<&str, Error> {
        self.machine
            .ip_address
            .as_deref()
            .filter(|ip| !ip.is_empty())
            .ok_or(Error::IpNotSet)
    }

    /// Docker endpoint URL, empty unless the machine is running.
    pub fn get_url(&mut self) -> String {
        match self.get_state() {
            Ok(State::Running) => {}
            _ => return String::new(),
        }

        match self.get_ip() {
            Ok(ip) if ip.contains(':') => format!("tcp://[{}]:{}", ip, DOCKER_PORT),
            Ok(ip) => format!("tcp://{}:{}", ip, DOCKER_PORT),
            Err(_) => String::new(),
        }
    }

    pub fn get_ssh_hostname(&self) -> Result<&str, Error> {
        self.get_ip()
    }

    pub fn get_ssh_key_path(&self) -> Result<PathBuf, Error> {
        match self.machine.ssh_key_path.as_ref() {
            Some(path) => Ok(path.clone()),
            None => Ok(self.store.machine_dir(&self.machine.name)?.join(SSH_KEY_NAME)),
        }
    }

    pub fn get_ssh_port(&self) -> u16 {
        self.machine.options.ssh_port
    }

    pub fn get_ssh_username(&self) -> &str {
        &self.machine.options.ssh_user
    }

    fn save(&self) -> Result<(), Error> {
        self.store.save(&self.machine)?;
        Ok(())
    }

    fn server_uuid(&self) -> Result<String, Error> {
        self.machine
            .server_uuid
            .clone()
            .ok_or(Error::NotCreated("server"))
    }

    fn create_ssh_key(&mut self) -> Result<(), Error> {
        let key_path = self.get_ssh_key_path()?;
        self.machine.ssh_key_path = Some(key_path.clone());
        // creates the machine directory
        self.save()?;

        self.keygen.generate(&key_path)?;
        let public_key = ssh::read_public_key(&key_path)?;

        let keypair = self.client.keypairs().create(&[Keypair {
            name: self.machine.name.clone(),
            public_key,
            ..Default::default()
        }])?;
        log::debug!("created keypair {}", keypair.uuid);

        self.machine.ssh_key_uuid = Some(keypair.uuid);
        self.save()
    }

    fn find_library_drive(&mut self, name: &str) -> Result<String, Error> {
        let drives = self
            .client
            .library_drives()
            .list(&LibraryDriveListOptions {
                name_contains: Some(name.to_string()),
                limit: 0,
            })?;

        let drive = pick_library_drive(&drives)
            .ok_or_else(|| Error::NoLibraryDrive(name.to_string()))?;
        log::debug!(
            "found library drive: {}, version: {}, UUID: {}",
            name,
            drive.version,
            drive.uuid
        );
        Ok(drive.uuid.clone())
    }

    fn clone_library_drive(&mut self) -> Result<(), Error> {
        let drive_name = self.machine.options.drive_name.clone();
        let drive_uuid = self.machine.options.drive_uuid().map(String::from);
        let source_uuid = match drive_uuid {
            _ if !drive_name.is_empty() => self.find_library_drive(&drive_name)?,
            Some(uuid) => {
                let libdrive = self.client.library_drives().get(&uuid)?;
                log::debug!("using library drive {} ({})", libdrive.uuid, libdrive.name);
                uuid
            }
            None => return Err(flags::Error::NoDrive.into()),
        };

        let clone = DriveCloneRequest {
            name: Some(self.machine.name.clone()),
            size: Some(ByteSize::gib(self.machine.options.drive_size).as_u64()),
            storage_type: Some(STORAGE_TYPE.to_string()),
            ..Default::default()
        };
        let drive = self
            .client
            .library_drives()
            .clone_drive(&source_uuid, Some(&clone))?;

        self.machine.cloned_drive_uuid = Some(drive.uuid.clone());
        self.save()?;

        log::debug!("waiting until drive {} is cloned...", drive.uuid);
        loop {
            let current = self.client.drives().get(&drive.uuid)?;
            if current.status == STATUS_UNMOUNTED {
                break;
            }
            log::trace!("drive status: {}", current.status);
            thread::sleep(self.poll_interval);
        }
        log::debug!("created drive UUID {}", drive.uuid);
        Ok(())
    }

    fn create_server(&mut self) -> Result<(), Error> {
        let opts = &self.machine.options;
        let key_uuid = self
            .machine
            .ssh_key_uuid
            .clone()
            .ok_or(Error::NotCreated("SSH key"))?;
        let drive_uuid = self
            .machine
            .cloned_drive_uuid
            .clone()
            .ok_or(Error::NotCreated("drive"))?;

        let ipv4_configuration = match opts.static_ip() {
            Some(ip) => {
                log::debug!("using static IP address {} for NIC configuration", ip);
                IpConfiguration::static_ip(ip)
            }
            None => IpConfiguration::dhcp(),
        };

        let req = ServerCreateRequest {
            cpu: opts.cpu,
            cpu_type: opts.cpu_type().map(String::from),
            epc_size: opts.cpu_epc_size().map(String::from),
            memory: ByteSize::mib(opts.memory).as_u64(),
            name: self.machine.name.clone(),
            nics: vec![Nic {
                ipv4_configuration: Some(ipv4_configuration),
                model: NIC_MODEL.to_string(),
            }],
            public_keys: vec![ResourceRef::new(&key_uuid)],
            vnc_password: VNC_PASSWORD.to_string(),
        };

        log::debug!("creating CloudSigma virtual server...");
        let server = self.client.servers().create(&req)?;
        self.machine.server_uuid = Some(server.uuid.clone());
        self.save()?;

        log::debug!("attaching drive {} to server {}...", drive_uuid, server.uuid);
        let attach = AttachDriveRequest {
            cpu: server.cpu,
            drives: vec![ServerDrive {
                boot_order: Some(1),
                dev_channel: "0:0".to_string(),
                device: NIC_MODEL.to_string(),
                drive: ResourceRef::new(&drive_uuid),
            }],
            memory: server.memory,
            name: server.name.clone(),
            vnc_password: server.vnc_password.clone(),
        };
        self.client.servers().attach_drive(&server.uuid, &attach)?;
        Ok(())
    }

    fn start_server(&mut self) -> Result<(), Error> {
        let uuid = self.server_uuid()?;

        log::debug!("checking server state...");
        let server = self.client.servers().get(&uuid)?;
        if server.status == STATUS_RUNNING {
            log::debug!("server is already running");
            if let Some(ip) = server.public_ipv4() {
                self.machine.ip_address = Some(ip.to_string());
                self.save()?;
            }
            return Ok(());
        }

        log::debug!("starting CloudSigma virtual server...");
        self.client.servers().start(&uuid)?;

        self.machine.ip_address = None;
        log::debug!("waiting for IP address to be assigned to the server...");
        loop {
            let server = self.client.servers().get(&uuid)?;
            if let Some(ip) = server.public_ipv4() {
                self.machine.ip_address = Some(ip.to_string());
            }
            if self.machine.ip_address.is_some() && server.status == STATUS_RUNNING {
                break;
            }
            log::trace!("server status: {}", server.status);
            thread::sleep(self.poll_interval);
        }
        self.save()
    }

    fn stop_server(&mut self) -> Result<(), Error> {
        let uuid = self.server_uuid()?;

        log::debug!("checking server state...");
        let server = match self.client.servers().get(&uuid) {
            Ok(server) => server,
            Err(err) if err.is_not_found() => {
                log::info!("server {} doesn't exist, nothing to stop", uuid);
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };
        if server.status == STATUS_STOPPED {
            log::debug!("server is already stopped");
            return Ok(());
        }

        log::debug!("stopping CloudSigma virtual server...");
        self.client.servers().shutdown(&uuid)?;

        log::debug!("waiting until server is stopped...");
        loop {
            let server = self.client.servers().get(&uuid)?;
            match server.status.as_str() {
                STATUS_RUNNING => return Err(Error::StopFailed(uuid)),
                STATUS_STOPPED => break,
                status => log::trace!("server status: {}", status),
            }
            thread::sleep(self.poll_interval);
        }
        Ok(())
    }
}
