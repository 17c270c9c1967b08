// SPDX-FileCopyrightText: 2025 Maciej Borzecki <maciek.borzecki@gmail.com>
//
// SPDX-License-Identifier: MIT

//! IP addresses, see
//! <https://cloudsigma-docs.readthedocs.io/en/latest/networking.html#ips>.

use reqwest::Method;
use serde;

use super::{require, Client, Error, Transport};

const IPS_PATH: &str = "ips";

/// A CloudSigma IP address, the address itself is the uuid.
#[derive(serde::Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Ip {
    pub gateway: Option<String>,
    #[serde(deserialize_with = "super::nullable")]
    pub nameservers: Vec<String>,
    pub netmask: Option<u32>,
    #[serde(deserialize_with = "super::nullable")]
    pub uuid: String,
}

pub struct Ips<'a, T>
where
    T: Transport,
{
    client: &'a mut Client<T>,
}

impl<'a, T> Ips<'a, T>
where
    T: Transport,
{
    pub(crate) fn new(client: &'a mut Client<T>) -> Self {
        Self { client }
    }

    /// Get IP address identified by uuid.
    pub fn get(&mut self, uuid: &str) -> Result<Ip, Error> {
        require("IP uuid", uuid)?;

        let req = self
            .client
            .new_request(Method::GET, &format!("{}/{}/", IPS_PATH, uuid))?;
        self.client.execute_json(req)
    }
}
