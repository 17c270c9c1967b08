// SPDX-FileCopyrightText: 2025 Maciej Borzecki <maciek.borzecki@gmail.com>
//
// SPDX-License-Identifier: MIT

use std::fmt;

use reqwest::{Method, StatusCode, Url};
use serde;
use thiserror;

/// Wraps CloudSigma API client errors.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("(api) empty {0} not allowed")]
    EmptyArgument(&'static str),
    #[error("(api) empty payload not allowed")]
    EmptyPayload,
    #[error("base URL must have a trailing slash, but {0:?} does not")]
    InvalidBaseUrl(String),
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("invalid header value: {0}")]
    InvalidHeader(String),
    #[error("cannot encode request body: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("cannot decode response body: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{0}")]
    Api(ErrorResponse),
    #[error("expected exactly one {resource} in response, got {count}")]
    UnexpectedObjectCount { resource: &'static str, count: usize },
}

impl Error {
    /// Returns the HTTP status of an API error response, if this is one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Api(resp) => Some(resp.status),
            _ => None,
        }
    }

    /// Returns true when the API reported that the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }
}

/// Reports one or more errors caused by an API request.
///
/// See <https://cloudsigma-docs.readthedocs.io/en/latest/errors.html>.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub method: Method,
    pub url: Url,
    pub status: StatusCode,
    pub elements: Vec<ErrorElement>,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {} [",
            self.method,
            self.url,
            self.status.as_u16()
        )?;
        for (i, elem) in self.elements.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", elem)?;
        }
        write!(f, "]")
    }
}

/// A single error as reported in the API error response body.
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone, Default, PartialEq)]
pub struct ErrorElement {
    #[serde(rename = "error_message", default, deserialize_with = "super::nullable")]
    pub message: String,
    #[serde(rename = "error_point", default)]
    pub point: Option<String>,
    #[serde(rename = "error_type", default, deserialize_with = "super::nullable")]
    pub kind: String,
}

impl fmt::Display for ErrorElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.message)?;
        if !self.kind.is_empty() {
            write!(f, " type={}", self.kind)?;
        }
        if let Some(point) = self.point.as_ref().filter(|p| !p.is_empty()) {
            write!(f, " point={}", point)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_message_format() {
        let err = Error::Api(ErrorResponse {
            method: Method::GET,
            url: Url::parse("https://cloudsigma.com/api").unwrap(),
            status: StatusCode::OK,
            elements: vec![
                ErrorElement {
                    message: "first".to_string(),
                    point: None,
                    kind: "permission".to_string(),
                },
                ErrorElement {
                    message: "second".to_string(),
                    ..Default::default()
                },
            ],
        });

        assert_eq!(
            err.to_string(),
            r#"GET https://cloudsigma.com/api: 200 ["first" type=permission, "second"]"#
        );
    }

    #[test]
    fn test_is_not_found() {
        let err = Error::Api(ErrorResponse {
            method: Method::DELETE,
            url: Url::parse("https://zrh.cloudsigma.com/api/2.0/servers/uuid/").unwrap(),
            status: StatusCode::NOT_FOUND,
            elements: vec![],
        });
        assert!(err.is_not_found());
        assert!(!Error::EmptyPayload.is_not_found());
        assert_eq!(Error::EmptyPayload.status(), None);
    }
}
