// SPDX-FileCopyrightText: 2025 Maciej Borzecki <maciek.borzecki@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Minimal client for the CloudSigma REST API.
//!
//! See <https://cloudsigma-docs.readthedocs.io/en/latest/>.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use log;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use serde;

mod error;

pub mod drives;
pub mod ips;
pub mod keypairs;
pub mod library_drives;
pub mod servers;

pub use error::{Error, ErrorElement, ErrorResponse};

/// Location used unless configured otherwise.
pub const DEFAULT_LOCATION: &str = "zrh";
const MEDIA_TYPE: &str = "application/json";

/// Returns the API base URL for a given location code, eg. "zrh" or "wdc".
pub fn base_url_for_location(location: &str) -> String {
    format!("https://{}.cloudsigma.com/api/2.0/", location)
}

/// Returns the default user agent.
pub fn default_user_agent() -> String {
    format!("cloudsigma-machine-driver/{}", env!("BUILD_GIT_VERSION"))
}

/// An API request ready to be sent.
#[derive(Debug)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

/// Raw API response.
#[derive(Debug)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

/// Trait representing a way of sending API requests.
pub trait Transport {
    fn send(&mut self, req: ApiRequest) -> Result<ApiResponse, Error>;
}

/// Transport sending requests over HTTPS.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, Error> {
        Ok(Self {
            client: reqwest::blocking::Client::builder().build()?,
        })
    }
}

impl Transport for HttpTransport {
    fn send(&mut self, req: ApiRequest) -> Result<ApiResponse, Error> {
        let ApiRequest {
            method,
            url,
            headers,
            body,
        } = req;

        let mut builder = self.client.request(method, url).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let resp = builder.send()?;
        let status = resp.status();
        let body = resp.bytes()?.to_vec();
        Ok(ApiResponse { status, body })
    }
}

/// Response body of endpoints which wrap their results in a list of objects.
#[derive(serde::Deserialize, serde::Serialize, Debug, PartialEq)]
pub(crate) struct Objects<T> {
    pub objects: Vec<T>,
}

impl<T> Objects<T> {
    /// Unwraps exactly one object, anything else is an error.
    pub(crate) fn single(self, resource: &'static str) -> Result<T, Error> {
        let count = self.objects.len();
        let mut objects = self.objects.into_iter();
        match (objects.next(), objects.next()) {
            (Some(obj), None) => Ok(obj),
            _ => Err(Error::UnexpectedObjectCount { resource, count }),
        }
    }
}

/// Decodes an explicit JSON null as the default value of the field type.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::Deserialize<'de> + Default,
{
    Ok(<Option<T> as serde::Deserialize>::deserialize(deserializer)?.unwrap_or_default())
}

/// Fails when a required argument is empty.
pub(crate) fn require(name: &'static str, value: &str) -> Result<(), Error> {
    if value.is_empty() {
        Err(Error::EmptyArgument(name))
    } else {
        Ok(())
    }
}

/// A client of the CloudSigma API.
pub struct Client<T>
where
    T: Transport,
{
    transport: T,
    /// Base URL for API requests, always with a trailing slash.
    base_url: String,
    user_agent: String,
    /// User email.
    username: String,
    password: String,
}

impl Client<HttpTransport> {
    /// Returns a new API client authenticating with user's email and
    /// password.
    pub fn new_basic_auth(username: &str, password: &str) -> Result<Self, Error> {
        Ok(Self::with_transport(HttpTransport::new()?, username, password))
    }
}

impl<T> Client<T>
where
    T: Transport,
{
    pub fn with_transport(transport: T, username: &str, password: &str) -> Self {
        Self {
            transport,
            base_url: base_url_for_location(DEFAULT_LOCATION),
            user_agent: default_user_agent(),
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    // Consume self and return the underlying transport.
    #[cfg(test)]
    pub(crate) fn test_into_transport(self) -> T {
        self.transport
    }

    #[cfg(test)]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[cfg(test)]
    pub fn set_base_url(&mut self, url: &str) {
        self.base_url = url.to_string();
    }

    /// Point the client at the API endpoint of a given location. Empty
    /// location keeps the current base URL.
    pub fn set_location(&mut self, location: &str) {
        if !location.is_empty() {
            self.base_url = base_url_for_location(location);
        }
    }

    /// Replace the credentials used for basic authentication.
    pub fn set_basic_auth(&mut self, username: &str, password: &str) {
        self.username = username.to_string();
        self.password = password.to_string();
    }

    #[cfg(test)]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn servers(&mut self) -> servers::Servers<'_, T> {
        servers::Servers::new(self)
    }

    pub fn drives(&mut self) -> drives::Drives<'_, T> {
        drives::Drives::new(self)
    }

    pub fn library_drives(&mut self) -> library_drives::LibraryDrives<'_, T> {
        library_drives::LibraryDrives::new(self)
    }

    pub fn ips(&mut self) -> ips::Ips<'_, T> {
        ips::Ips::new(self)
    }

    pub fn keypairs(&mut self) -> keypairs::Keypairs<'_, T> {
        keypairs::Keypairs::new(self)
    }

    /// Creates a request without a body. The path is resolved relative to
    /// the base URL and must not have a leading slash.
    pub fn new_request(&self, method: Method, path: &str) -> Result<ApiRequest, Error> {
        let base = Url::parse(&self.base_url)
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        if !base.path().ends_with('/') {
            return Err(Error::InvalidBaseUrl(self.base_url.clone()));
        }
        let url = base
            .join(path)
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", path, e)))?;

        let credentials = BASE64.encode(format!("{}:{}", self.username, self.password));
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header_value(&format!("Basic {}", credentials))?,
        );
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(MEDIA_TYPE));
        headers.insert(header::ACCEPT, HeaderValue::from_static(MEDIA_TYPE));
        headers.insert(header::USER_AGENT, header_value(&self.user_agent)?);

        Ok(ApiRequest {
            method,
            url,
            headers,
            body: None,
        })
    }

    /// Creates a request with a JSON encoded body.
    pub fn new_json_request<B>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<ApiRequest, Error>
    where
        B: serde::Serialize + ?Sized,
    {
        let mut req = self.new_request(method, path)?;
        req.body = Some(serde_json::to_vec(body).map_err(Error::Encode)?);
        Ok(req)
    }

    /// Sends the request and checks the response for API errors.
    pub fn execute(&mut self, req: ApiRequest) -> Result<ApiResponse, Error> {
        log::debug!("{} {}", req.method, req.url);

        let method = req.method.clone();
        let url = req.url.clone();
        let resp = self.transport.send(req)?;

        log::trace!(
            "response {}: {}",
            resp.status,
            String::from_utf8_lossy(&resp.body)
        );

        check_response(&method, &url, resp)
    }

    /// Sends the request and decodes the response body.
    pub fn execute_json<V>(&mut self, req: ApiRequest) -> Result<V, Error>
    where
        V: serde::de::DeserializeOwned,
    {
        let resp = self.execute(req)?;
        serde_json::from_slice(&resp.body).map_err(Error::Decode)
    }
}

fn header_value(value: &str) -> Result<HeaderValue, Error> {
    HeaderValue::from_str(value).map_err(|e| Error::InvalidHeader(e.to_string()))
}

/// Checks the API response for errors. A response is considered an error if
/// its status is outside of the 2xx range, in which case the body is expected
/// to carry a list of error elements.
pub fn check_response(
    method: &Method,
    url: &Url,
    resp: ApiResponse,
) -> Result<ApiResponse, Error> {
    if resp.status.is_success() {
        return Ok(resp);
    }

    let elements = if resp.body.is_empty() {
        vec![]
    } else {
        serde_json::from_slice::<Vec<ErrorElement>>(&resp.body).map_err(Error::Decode)?
    };

    Err(Error::Api(ErrorResponse {
        method: method.clone(),
        url: url.clone(),
        status: resp.status,
        elements,
    }))
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn url() -> Url {
        Url::parse("https://zrh.cloudsigma.com/api/2.0/").unwrap()
    }

    #[test]
    fn test_check_response_error_elements() {
        let resp = ApiResponse {
            status: StatusCode::BAD_REQUEST,
            body: br#"[{"error_message":"error"}]"#.to_vec(),
        };

        let res = check_response(&Method::GET, &url(), resp);
        match res {
            Err(Error::Api(err)) => {
                assert_eq!(err.status, StatusCode::BAD_REQUEST);
                assert_eq!(
                    err.elements,
                    vec![ErrorElement {
                        message: "error".to_string(),
                        ..Default::default()
                    }]
                );
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_check_response_error_elements_verbatim() {
        let resp = ApiResponse {
            status: StatusCode::FORBIDDEN,
            body: br#"[{"error_message":"denied","error_point":"name","error_type":"permission"},
                       {"error_message":"also","error_type":"validation"}]"#
                .to_vec(),
        };

        let err = check_response(&Method::POST, &url(), resp).unwrap_err();
        let Error::Api(err) = err else {
            panic!("expected API error");
        };
        assert_eq!(err.method, Method::POST);
        assert_eq!(
            err.elements,
            vec![
                ErrorElement {
                    message: "denied".to_string(),
                    point: Some("name".to_string()),
                    kind: "permission".to_string(),
                },
                ErrorElement {
                    message: "also".to_string(),
                    point: None,
                    kind: "validation".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_check_response_error_when_unmarshal() {
        let resp = ApiResponse {
            status: StatusCode::BAD_REQUEST,
            body: br#"{"error_message":"response is always an array of errors"}"#.to_vec(),
        };

        let res = check_response(&Method::GET, &url(), resp);
        assert!(matches!(res, Err(Error::Decode(_))));
    }

    #[test]
    fn test_check_response_no_body() {
        let resp = ApiResponse {
            status: StatusCode::BAD_REQUEST,
            body: vec![],
        };

        let err = check_response(&Method::GET, &url(), resp).unwrap_err();
        let Error::Api(err) = err else {
            panic!("expected API error");
        };
        assert_eq!(err.status.as_u16(), 400);
        assert!(err.elements.is_empty());
    }

    #[test]
    fn test_check_response_no_error_status() {
        let resp = ApiResponse {
            status: StatusCode::OK,
            body: vec![],
        };

        assert!(check_response(&Method::GET, &url(), resp).is_ok());
    }

    #[test]
    fn test_execute_json() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Foo {
            a: String,
        }

        let mut c = client(vec![respond(200, r#"{"a":"a"}"#)]);
        let req = c.new_request(Method::GET, ".").unwrap();
        let res: Foo = c.execute_json(req).unwrap();
        assert_eq!(
            res,
            Foo {
                a: "a".to_string()
            }
        );

        let mut t = c.test_into_transport();
        let req = t.seen_requests.pop_front().expect("expected a request");
        assert_eq!(req.method, Method::GET);
        assert_eq!(req.url.as_str(), "https://zrh.cloudsigma.com/api/2.0/");
    }

    #[test]
    fn test_execute_http_error() {
        let mut c = client(vec![respond(400, "")]);
        let req = c.new_request(Method::GET, ".").unwrap();
        let err = c.execute(req).unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_new_basic_auth_defaults() {
        let c = client(vec![]);
        assert_eq!(c.base_url(), "https://zrh.cloudsigma.com/api/2.0/");
        assert!(c.user_agent().starts_with("cloudsigma-machine-driver/"));
    }

    #[test]
    fn test_new_request() {
        let c = client(vec![]);
        let req = c.new_request(Method::GET, "ips/uuid/").unwrap();
        assert_eq!(req.url.as_str(), "https://zrh.cloudsigma.com/api/2.0/ips/uuid/");
        assert_eq!(req.authorization(), AUTHORIZATION);
        assert_eq!(req.headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(req.headers[header::ACCEPT], "application/json");
        assert_eq!(req.headers[header::USER_AGENT], c.user_agent());
        assert!(req.body.is_none());
    }

    #[test]
    fn test_new_json_request() {
        let c = client(vec![]);
        let req = c
            .new_json_request(Method::POST, "servers/", &serde_json::json!({"name": "foo"}))
            .unwrap();
        assert_eq!(req.json_body::<serde_json::Value>()["name"], "foo");
    }

    #[test]
    fn test_new_request_base_url_without_trailing_slash() {
        let mut c = client(vec![]);
        c.set_base_url("https://zrh.cloudsigma.com/api/2.0");
        let res = c.new_request(Method::GET, "ips/uuid/");
        assert!(matches!(res, Err(Error::InvalidBaseUrl(_))));
    }

    #[test]
    fn test_new_request_relative_base_url() {
        let mut c = client(vec![]);
        c.set_base_url("/");
        let res = c.new_request(Method::GET, ":%31");
        assert!(matches!(res, Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_set_basic_auth() {
        let mut c = client(vec![]);
        c.set_basic_auth("other", "secret");
        let req = c.new_request(Method::GET, "ips/uuid/").unwrap();
        assert_eq!(req.authorization(), "Basic b3RoZXI6c2VjcmV0");
    }

    #[test]
    fn test_set_location() {
        let mut c = client(vec![]);
        c.set_location("wdc");
        assert_eq!(c.base_url(), "https://wdc.cloudsigma.com/api/2.0/");
        c.set_location("");
        assert_eq!(c.base_url(), "https://wdc.cloudsigma.com/api/2.0/");
    }

    #[test]
    fn test_objects_single() {
        let one = Objects {
            objects: vec![1],
        };
        assert_eq!(one.single("number").unwrap(), 1);

        let none: Objects<u32> = Objects { objects: vec![] };
        assert!(matches!(
            none.single("number"),
            Err(Error::UnexpectedObjectCount { count: 0, .. })
        ));

        let two = Objects {
            objects: vec![1, 2],
        };
        assert!(matches!(
            two.single("number"),
            Err(Error::UnexpectedObjectCount { count: 2, .. })
        ));
    }
}
