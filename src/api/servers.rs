// SPDX-FileCopyrightText: 2025 Maciej Borzecki <maciek.borzecki@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Servers, see <https://cloudsigma-docs.readthedocs.io/en/latest/servers.html>.

use reqwest::Method;
use serde;

use super::{require, Client, Error, Objects, Transport};

const SERVERS_PATH: &str = "servers";

/// Reference to another resource, as found in server definitions.
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone, Default, PartialEq)]
pub struct ResourceRef {
    #[serde(default, deserialize_with = "super::nullable")]
    pub uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_uri: Option<String>,
}

impl ResourceRef {
    pub fn new(uuid: &str) -> Self {
        Self {
            uuid: uuid.to_string(),
            resource_uri: None,
        }
    }
}

/// A CloudSigma server.
#[derive(serde::Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Server {
    #[serde(deserialize_with = "super::nullable")]
    pub cpu: u64,
    pub cpu_type: Option<String>,
    #[serde(rename = "mem", deserialize_with = "super::nullable")]
    pub memory: u64,
    #[serde(deserialize_with = "super::nullable")]
    pub name: String,
    pub owner: Option<ResourceRef>,
    #[serde(deserialize_with = "super::nullable")]
    pub resource_uri: String,
    pub runtime: Option<Runtime>,
    #[serde(deserialize_with = "super::nullable")]
    pub status: String,
    #[serde(deserialize_with = "super::nullable")]
    pub uuid: String,
    #[serde(deserialize_with = "super::nullable")]
    pub vnc_password: String,
    #[serde(deserialize_with = "super::nullable")]
    pub nics: Vec<Nic>,
    #[serde(deserialize_with = "super::nullable")]
    pub drives: Vec<ServerDrive>,
    #[serde(rename = "pubkeys", deserialize_with = "super::nullable")]
    pub public_keys: Vec<ResourceRef>,
}

impl Server {
    /// Returns the IPv4 address of the first public runtime NIC.
    pub fn public_ipv4(&self) -> Option<&str> {
        self.runtime
            .as_ref()?
            .nics
            .iter()
            .filter(|nic| nic.interface_type == "public")
            .filter_map(|nic| nic.ip_v4.as_ref())
            .map(|ip| ip.uuid.as_str())
            .find(|ip| !ip.is_empty())
    }
}

/// Live state of a running server.
#[derive(serde::Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Runtime {
    #[serde(deserialize_with = "super::nullable")]
    pub nics: Vec<RuntimeNic>,
}

/// Live configuration of a server network interface.
#[derive(serde::Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct RuntimeNic {
    #[serde(deserialize_with = "super::nullable")]
    pub interface_type: String,
    pub ip_v4: Option<ResourceRef>,
}

#[derive(serde::Deserialize, serde::Serialize, Debug, Clone, Default, PartialEq)]
pub struct Nic {
    /// Absent for NICs attached to a VLAN.
    #[serde(rename = "ip_v4_conf", default, skip_serializing_if = "Option::is_none")]
    pub ipv4_configuration: Option<IpConfiguration>,
    #[serde(
        default,
        deserialize_with = "super::nullable",
        skip_serializing_if = "String::is_empty"
    )]
    pub model: String,
}

#[derive(serde::Deserialize, serde::Serialize, Debug, Clone, Default, PartialEq)]
pub struct IpConfiguration {
    /// One of "dhcp", "static" or "manual".
    #[serde(
        rename = "conf",
        default,
        deserialize_with = "super::nullable",
        skip_serializing_if = "String::is_empty"
    )]
    pub configuration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<ResourceRef>,
}

impl IpConfiguration {
    pub fn dhcp() -> Self {
        Self {
            configuration: "dhcp".to_string(),
            ip: None,
        }
    }

    pub fn static_ip(ip: &str) -> Self {
        Self {
            configuration: "static".to_string(),
            ip: Some(ResourceRef::new(ip)),
        }
    }
}

/// Drive attached to a server.
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone, Default, PartialEq)]
pub struct ServerDrive {
    /// Not set for drives the server does not boot from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_order: Option<u32>,
    #[serde(default, deserialize_with = "super::nullable")]
    pub dev_channel: String,
    #[serde(default, deserialize_with = "super::nullable")]
    pub device: String,
    #[serde(default, deserialize_with = "super::nullable")]
    pub drive: ResourceRef,
}

#[derive(serde::Deserialize, serde::Serialize, Debug, Clone, Default, PartialEq)]
pub struct ServerCreateRequest {
    pub cpu: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_type: Option<String>,
    /// SGX enclave page cache size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epc_size: Option<String>,
    #[serde(rename = "mem")]
    pub memory: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nics: Vec<Nic>,
    #[serde(rename = "pubkeys", default, skip_serializing_if = "Vec::is_empty")]
    pub public_keys: Vec<ResourceRef>,
    pub vnc_password: String,
}

/// Server update attaching drives, all server properties need to be
/// repeated.
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone, Default, PartialEq)]
pub struct AttachDriveRequest {
    pub cpu: u64,
    pub drives: Vec<ServerDrive>,
    #[serde(rename = "mem")]
    pub memory: u64,
    pub name: String,
    pub vnc_password: String,
}

/// Result of a server action.
#[derive(serde::Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ActionResult {
    #[serde(deserialize_with = "super::nullable")]
    pub action: String,
    #[serde(deserialize_with = "super::nullable")]
    pub result: String,
    #[serde(deserialize_with = "super::nullable")]
    pub uuid: String,
}

pub struct Servers<'a, T>
where
    T: Transport,
{
    client: &'a mut Client<T>,
}

impl<'a, T> Servers<'a, T>
where
    T: Transport,
{
    pub(crate) fn new(client: &'a mut Client<T>) -> Self {
        Self { client }
    }

    /// Get server identified by uuid.
    pub fn get(&mut self, uuid: &str) -> Result<Server, Error> {
        require("server uuid", uuid)?;

        let req = self
            .client
            .new_request(Method::GET, &format!("{}/{}/", SERVERS_PATH, uuid))?;
        self.client.execute_json(req)
    }

    /// Create a server.
    pub fn create(&mut self, server: &ServerCreateRequest) -> Result<Server, Error> {
        let req = self
            .client
            .new_json_request(Method::POST, &format!("{}/", SERVERS_PATH), server)?;
        self.client
            .execute_json::<Objects<Server>>(req)?
            .single("server")
    }

    /// Attach drives to a server identified by uuid.
    pub fn attach_drive(
        &mut self,
        uuid: &str,
        attach: &AttachDriveRequest,
    ) -> Result<Server, Error> {
        require("server uuid", uuid)?;
        if attach.drives.is_empty() {
            return Err(Error::EmptyPayload);
        }

        let req = self.client.new_json_request(
            Method::PUT,
            &format!("{}/{}/", SERVERS_PATH, uuid),
            attach,
        )?;
        self.client.execute_json(req)
    }

    /// Delete a server identified by uuid. Attached drives are kept.
    #[cfg(test)]
    pub fn delete(&mut self, uuid: &str) -> Result<(), Error> {
        require("server uuid", uuid)?;

        let req = self
            .client
            .new_request(Method::DELETE, &format!("{}/{}/", SERVERS_PATH, uuid))?;
        self.client.execute(req).map(|_| ())
    }

    /// Delete a server identified by uuid together with all its drives.
    pub fn delete_with_drives(&mut self, uuid: &str) -> Result<(), Error> {
        require("server uuid", uuid)?;

        let mut req = self
            .client
            .new_request(Method::DELETE, &format!("{}/{}/", SERVERS_PATH, uuid))?;
        req.url
            .query_pairs_mut()
            .append_pair("recurse", "all_drives");
        self.client.execute(req).map(|_| ())
    }

    /// Start a server.
    pub fn start(&mut self, uuid: &str) -> Result<ActionResult, Error> {
        self.action(uuid, "start")
    }

    /// Power off a server immediately.
    pub fn stop(&mut self, uuid: &str) -> Result<ActionResult, Error> {
        self.action(uuid, "stop")
    }

    /// Request an ACPI shutdown of a server.
    pub fn shutdown(&mut self, uuid: &str) -> Result<ActionResult, Error> {
        self.action(uuid, "shutdown")
    }

    fn action(&mut self, uuid: &str, action: &str) -> Result<ActionResult, Error> {
        require("server uuid", uuid)?;
        require("action", action)?;

        let mut req = self.client.new_request(
            Method::POST,
            &format!("{}/{}/action/", SERVERS_PATH, uuid),
        )?;
        req.url.query_pairs_mut().append_pair("do", action);
        self.client.execute_json(req)
    }
}
