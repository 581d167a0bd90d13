//! Gateway response builder.
//!
//! Turns a handler [`Reply`] plus route metadata into the JSON document API
//! Gateway expects from a proxy integration: status code, headers, body, and
//! the `isBase64Encoded` flag.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use flate2::Compression as Level;
use flate2::write::{DeflateEncoder, GzEncoder, ZlibEncoder};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use super::{Body, Method, Reply, StatusCode};

/// Payload compression mode of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    Gzip,
    Zlib,
    Deflate,
}

/// Returned when parsing an unknown compression name.
#[derive(Debug, Error)]
#[error("unsupported compression method: {0:?} (expected gzip, zlib or deflate)")]
pub struct UnknownCompression(pub String);

impl Compression {
    /// The `Content-Encoding` token, `None` when compression is off.
    pub fn as_str(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Gzip => Some("gzip"),
            Self::Zlib => Some("zlib"),
            Self::Deflate => Some("deflate"),
        }
    }

    // Returns `true` if `accept_encoding` lists this coding.
    fn accepted_by(self, accept_encoding: &str) -> bool {
        let Some(token) = self.as_str() else {
            return false;
        };
        accept_encoding
            .split(',')
            .map(|item| item.split(';').next().unwrap_or("").trim())
            .any(|coding| coding.eq_ignore_ascii_case(token))
    }

    /// Compress `data` at the best compression level.
    pub fn compress(self, data: &[u8]) -> io::Result<Vec<u8>> {
        match self {
            Self::None => Ok(data.to_vec()),
            Self::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), Level::best());
                encoder.write_all(data)?;
                encoder.finish()
            }
            Self::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::new(), Level::best());
                encoder.write_all(data)?;
                encoder.finish()
            }
            Self::Deflate => {
                let mut encoder = DeflateEncoder::new(Vec::new(), Level::best());
                encoder.write_all(data)?;
                encoder.finish()
            }
        }
    }
}

impl FromStr for Compression {
    type Err = UnknownCompression;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "gzip" => Ok(Self::Gzip),
            "zlib" => Ok(Self::Zlib),
            "deflate" => Ok(Self::Deflate),
            _ => Err(UnknownCompression(s.to_owned())),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str().unwrap_or("none"))
    }
}

/// Route-derived settings applied when building a [`ProxyResponse`].
#[derive(Debug, Clone, Default)]
pub struct ResponseOptions {
    pub cors: bool,
    pub methods: Vec<Method>,
    /// The request's `accept-encoding` header, empty when absent.
    pub accept_encoding: String,
    pub compression: Compression,
    pub b64encode: bool,
    /// `Cache-Control` value sent with success replies.
    pub cache_control: Option<String>,
}

/// A proxy-integration response, serialized with API Gateway's field names.
///
/// # Examples
///
/// ```
/// use rttp_cache::http::{ProxyResponse, Reply, ResponseOptions, StatusCode};
///
/// let response = ProxyResponse::build(
///     StatusCode::Ok,
///     Reply::ok("text/plain", "heyyyy"),
///     &ResponseOptions::default(),
/// );
/// assert_eq!(response.status_code(), 200);
/// assert_eq!(response.header("Content-Type"), Some("text/plain"));
/// assert_eq!(response.body(), "heyyyy");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
    status_code: u16,
    headers: BTreeMap<String, String>,
    body: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    is_base64_encoded: bool,
}

impl ProxyResponse {
    /// Build the gateway response for `reply`, sent with `status`.
    ///
    /// Header rules:
    /// - `Content-Type` is always the reply's content type.
    /// - With `cors`, `Access-Control-Allow-{Origin,Methods,Credentials}` are added.
    /// - `Cache-Control` carries the route value for `OK` replies and `no-cache`
    ///   for any other status class.
    /// - When the route compression is listed in `accept_encoding`, the body is
    ///   compressed, `Content-Encoding` is set, and the body is base64-encoded.
    /// - Binary bodies are always base64-encoded, whatever the route says.
    pub fn build(status: StatusCode, reply: Reply, options: &ResponseOptions) -> Self {
        let (class, content_type, body) = reply.into_parts();

        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_owned(), content_type);

        if options.cors {
            let methods = options
                .methods
                .iter()
                .map(Method::as_str)
                .collect::<Vec<_>>()
                .join(",");
            headers.insert("Access-Control-Allow-Origin".to_owned(), "*".to_owned());
            headers.insert("Access-Control-Allow-Methods".to_owned(), methods);
            headers.insert(
                "Access-Control-Allow-Credentials".to_owned(),
                "true".to_owned(),
            );
        }

        if let Some(cache_control) = &options.cache_control {
            let value = if class.is_success() {
                cache_control.clone()
            } else {
                "no-cache".to_owned()
            };
            headers.insert("Cache-Control".to_owned(), value);
        }

        let mut b64encode = options.b64encode || matches!(body, Body::Binary(_));
        let mut payload = body.into_bytes().to_vec();

        if options.compression.accepted_by(&options.accept_encoding) {
            match options.compression.compress(&payload) {
                Ok(compressed) => {
                    payload = compressed;
                    b64encode = true;
                    headers.insert(
                        "Content-Encoding".to_owned(),
                        options.compression.to_string(),
                    );
                }
                Err(e) => {
                    warn!(compression = %options.compression, error = %e, "compression failed, sending identity body");
                }
            }
        }

        let body = if b64encode {
            BASE64.encode(&payload)
        } else {
            match String::from_utf8(payload) {
                Ok(text) => text,
                Err(e) => {
                    b64encode = true;
                    BASE64.encode(e.as_bytes())
                }
            }
        };

        Self {
            status_code: status.as_u16(),
            headers,
            body,
            is_base64_encoded: b64encode,
        }
    }

    /// Set a header, replacing any previous value with the same name.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Returns a header value by its exact name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn is_base64_encoded(&self) -> bool {
        self.is_base64_encoded
    }
}
