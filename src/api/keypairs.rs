// SPDX-FileCopyrightText: 2025 Maciej Borzecki <maciek.borzecki@gmail.com>
//
// SPDX-License-Identifier: MIT

//! SSH keypairs, see
//! <https://cloudsigma-docs.readthedocs.io/en/latest/keypairs.html>.

use reqwest::Method;
use serde;

use super::{require, Client, Error, Objects, Transport};

const KEYPAIRS_PATH: &str = "keypairs";

/// A CloudSigma SSH keypair.
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Keypair {
    #[serde(deserialize_with = "super::nullable", skip_serializing_if = "String::is_empty")]
    pub fingerprint: String,
    #[serde(deserialize_with = "super::nullable", skip_serializing_if = "std::ops::Not::not")]
    pub has_private_key: bool,
    #[serde(deserialize_with = "super::nullable")]
    pub name: String,
    #[serde(deserialize_with = "super::nullable", skip_serializing_if = "String::is_empty")]
    pub private_key: String,
    #[serde(deserialize_with = "super::nullable")]
    pub public_key: String,
    #[serde(deserialize_with = "super::nullable", skip_serializing_if = "String::is_empty")]
    pub resource_uri: String,
    #[serde(deserialize_with = "super::nullable", skip_serializing_if = "String::is_empty")]
    pub uuid: String,
}

pub struct Keypairs<'a, T>
where
    T: Transport,
{
    client: &'a mut Client<T>,
}

impl<'a, T> Keypairs<'a, T>
where
    T: Transport,
{
    pub(crate) fn new(client: &'a mut Client<T>) -> Self {
        Self { client }
    }

    /// Get keypair identified by uuid.
    #[cfg(test)]
    pub fn get(&mut self, uuid: &str) -> Result<Keypair, Error> {
        require("keypair uuid", uuid)?;

        let req = self
            .client
            .new_request(Method::GET, &format!("{}/{}/", KEYPAIRS_PATH, uuid))?;
        self.client.execute_json(req)
    }

    /// Upload a keypair, only one keypair at a time is supported.
    pub fn create(&mut self, keypairs: &[Keypair]) -> Result<Keypair, Error> {
        if keypairs.is_empty() {
            return Err(Error::EmptyPayload);
        }

        let req = self.client.new_json_request(
            Method::POST,
            &format!("{}/", KEYPAIRS_PATH),
            &Objects {
                objects: keypairs.to_vec(),
            },
        )?;
        self.client
            .execute_json::<Objects<Keypair>>(req)?
            .single("keypair")
    }

    /// Delete keypair identified by uuid.
    pub fn delete(&mut self, uuid: &str) -> Result<(), Error> {
        require("keypair uuid", uuid)?;

        let req = self
            .client
            .new_request(Method::DELETE, &format!("{}/{}/", KEYPAIRS_PATH, uuid))?;
        self.client.execute(req).map(|_| ())
    }
}
