// SPDX-FileCopyrightText: 2025 Maciej Borzecki <maciek.borzecki@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Drives, see <https://cloudsigma-docs.readthedocs.io/en/latest/drives.html>.

use reqwest::Method;
use serde;

use super::{require, Client, Error, Transport};

const DRIVES_PATH: &str = "drives";

/// Drive status once it is ready and not attached to a running server.
pub const STATUS_UNMOUNTED: &str = "unmounted";

/// A CloudSigma drive.
#[derive(serde::Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Drive {
    #[serde(deserialize_with = "super::nullable")]
    pub media: String,
    #[serde(deserialize_with = "super::nullable")]
    pub name: String,
    #[serde(deserialize_with = "super::nullable")]
    pub resource_uri: String,
    /// Size in bytes.
    #[serde(deserialize_with = "super::nullable")]
    pub size: u64,
    #[serde(deserialize_with = "super::nullable")]
    pub status: String,
    #[serde(deserialize_with = "super::nullable")]
    pub storage_type: String,
    #[serde(deserialize_with = "super::nullable")]
    pub uuid: String,
}

/// Properties of a drive clone, all optional.
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone, Default, PartialEq)]
pub struct DriveCloneRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_type: Option<String>,
}

pub struct Drives<'a, T>
where
    T: Transport,
{
    client: &'a mut Client<T>,
}

impl<'a, T> Drives<'a, T>
where
    T: Transport,
{
    pub(crate) fn new(client: &'a mut Client<T>) -> Self {
        Self { client }
    }

    /// Get drive identified by uuid.
    pub fn get(&mut self, uuid: &str) -> Result<Drive, Error> {
        require("drive uuid", uuid)?;

        let req = self
            .client
            .new_request(Method::GET, &format!("{}/{}/", DRIVES_PATH, uuid))?;
        self.client.execute_json(req)
    }

    /// Delete drive identified by uuid.
    pub fn delete(&mut self, uuid: &str) -> Result<(), Error> {
        require("drive uuid", uuid)?;

        let req = self
            .client
            .new_request(Method::DELETE, &format!("{}/{}/", DRIVES_PATH, uuid))?;
        self.client.execute(req).map(|_| ())
    }
}
