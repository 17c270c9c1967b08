// SPDX-FileCopyrightText: 2025 Maciej Borzecki <maciek.borzecki@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Library drives, see
//! <https://cloudsigma-docs.readthedocs.io/en/latest/libdrives.html>.

use reqwest::Method;
use serde;

use super::drives::{Drive, DriveCloneRequest};
use super::{require, Client, Error, Objects, Transport};

const LIBDRIVES_PATH: &str = "libdrives";

/// A drive image from the CloudSigma library.
#[derive(serde::Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct LibraryDrive {
    #[serde(deserialize_with = "super::nullable")]
    pub arch: String,
    #[serde(deserialize_with = "super::nullable")]
    pub description: String,
    #[serde(deserialize_with = "super::nullable")]
    pub favourite: bool,
    /// Either "install" (installation media) or "preinst" (preinstalled
    /// system).
    #[serde(deserialize_with = "super::nullable")]
    pub image_type: String,
    #[serde(deserialize_with = "super::nullable")]
    pub media: String,
    #[serde(deserialize_with = "super::nullable")]
    pub name: String,
    #[serde(deserialize_with = "super::nullable")]
    pub os: String,
    #[serde(deserialize_with = "super::nullable")]
    pub paid: bool,
    #[serde(deserialize_with = "super::nullable")]
    pub resource_uri: String,
    #[serde(deserialize_with = "super::nullable")]
    pub size: u64,
    #[serde(deserialize_with = "super::nullable")]
    pub status: String,
    #[serde(deserialize_with = "super::nullable")]
    pub storage_type: String,
    #[serde(deserialize_with = "super::nullable")]
    pub uuid: String,
    #[serde(deserialize_with = "super::nullable")]
    pub version: String,
}

/// Filters for listing library drives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LibraryDriveListOptions {
    /// Only drives with a name containing this string (case insensitive).
    pub name_contains: Option<String>,
    /// Maximum number of results, 0 means no limit.
    pub limit: u32,
}

pub struct LibraryDrives<'a, T>
where
    T: Transport,
{
    client: &'a mut Client<T>,
}

impl<'a, T> LibraryDrives<'a, T>
where
    T: Transport,
{
    pub(crate) fn new(client: &'a mut Client<T>) -> Self {
        Self { client }
    }

    /// Get library drive identified by uuid.
    pub fn get(&mut self, uuid: &str) -> Result<LibraryDrive, Error> {
        require("library drive uuid", uuid)?;

        let req = self
            .client
            .new_request(Method::GET, &format!("{}/{}/", LIBDRIVES_PATH, uuid))?;
        self.client.execute_json(req)
    }

    /// List library drives matching the options.
    pub fn list(&mut self, opts: &LibraryDriveListOptions) -> Result<Vec<LibraryDrive>, Error> {
        let mut req = self
            .client
            .new_request(Method::GET, &format!("{}/", LIBDRIVES_PATH))?;
        {
            let mut query = req.url.query_pairs_mut();
            query.append_pair("limit", &opts.limit.to_string());
            if let Some(name) = opts.name_contains.as_ref() {
                query.append_pair("name__icontains", name);
            }
        }

        Ok(self
            .client
            .execute_json::<Objects<LibraryDrive>>(req)?
            .objects)
    }

    /// Clone library drive identified by uuid into a regular drive. Clone
    /// properties are optional.
    pub fn clone_drive(
        &mut self,
        uuid: &str,
        clone: Option<&DriveCloneRequest>,
    ) -> Result<Drive, Error> {
        require("library drive uuid", uuid)?;

        let path = format!("{}/{}/action/", LIBDRIVES_PATH, uuid);
        let mut req = match clone {
            Some(clone) => self.client.new_json_request(Method::POST, &path, clone)?,
            None => self.client.new_request(Method::POST, &path)?,
        };
        req.url.query_pairs_mut().append_pair("do", "clone");

        self.client
            .execute_json::<Objects<Drive>>(req)?
            .single("drive")
    }
}
