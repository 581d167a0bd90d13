//! Handler-level replies: the `(status, content-type, body)` triple.
//!
//! A [`Reply`] is what route handlers return and what cache backends store.
//! It serializes as a three-element JSON array, e.g.
//! `["OK","text/plain","heyyyy"]`, so cached entries stay readable in the
//! backing store.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::StatusCode;

/// Status class of a reply.
///
/// Only [`Status::Ok`] is success-class; every other marker is excluded from
/// the response cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Ok,
    Empty,
    Nok,
    Found,
    NotFound,
    Conflict,
    Error,
}

impl Status {
    /// The HTTP status code a reply of this class is sent with.
    pub fn status_code(self) -> StatusCode {
        match self {
            Self::Ok => StatusCode::Ok,
            Self::Empty => StatusCode::NoContent,
            Self::Nok => StatusCode::BadRequest,
            Self::Found => StatusCode::Found,
            Self::NotFound => StatusCode::NotFound,
            Self::Conflict => StatusCode::Conflict,
            Self::Error => StatusCode::InternalServerError,
        }
    }

    /// Returns `true` for the success marker.
    pub fn is_success(self) -> bool {
        self == Self::Ok
    }

    /// The wire marker, e.g. `"NOT_FOUND"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Empty => "EMPTY",
            Self::Nok => "NOK",
            Self::Found => "FOUND",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::Error => "ERROR",
        }
    }
}

/// Reply payload, either UTF-8 text or raw bytes (images, archives...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Text(String),
    Binary(Bytes),
}

impl Body {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Body::Text(text) => text.as_bytes(),
            Body::Binary(bytes) => bytes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        match self {
            Body::Text(text) => Bytes::from(text),
            Body::Binary(bytes) => bytes,
        }
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_owned())
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Binary(Bytes::from(bytes))
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Binary(bytes)
    }
}

// Text is stored as a bare JSON string; binary as `{"base64": "..."}`.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum BodyRepr {
    Text(String),
    Binary { base64: String },
}

impl Serialize for Body {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Body::Text(text) => serializer.serialize_str(text),
            Body::Binary(bytes) => BodyRepr::Binary {
                base64: BASE64.encode(bytes),
            }
            .serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Body {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match BodyRepr::deserialize(deserializer)? {
            BodyRepr::Text(text) => Ok(Body::Text(text)),
            BodyRepr::Binary { base64 } => BASE64
                .decode(base64)
                .map(Body::from)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// The `(status, content-type, body)` triple returned by route handlers.
///
/// # Examples
///
/// ```
/// use rttp_cache::http::{Reply, Status};
///
/// let reply = Reply::ok("text/plain", "heyyyy");
/// assert_eq!(reply.status(), Status::Ok);
/// assert_eq!(
///     serde_json::to_string(&reply).unwrap(),
///     r#"["OK","text/plain","heyyyy"]"#
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(Status, String, Body)", into = "(Status, String, Body)")]
pub struct Reply {
    status: Status,
    content_type: String,
    body: Body,
}

impl Reply {
    pub fn new(status: Status, content_type: impl Into<String>, body: impl Into<Body>) -> Self {
        Self {
            status,
            content_type: content_type.into(),
            body: body.into(),
        }
    }

    /// Success-class reply.
    pub fn ok(content_type: impl Into<String>, body: impl Into<Body>) -> Self {
        Self::new(Status::Ok, content_type, body)
    }

    /// `application/json` reply with a serialized JSON body.
    pub fn json(status: Status, value: &serde_json::Value) -> Self {
        Self::new(status, "application/json", value.to_string())
    }

    /// `application/json` reply carrying `{"errorMessage": message}`.
    pub fn error_message(status: Status, message: impl Into<String>) -> Self {
        Self::json(
            status,
            &serde_json::json!({ "errorMessage": message.into() }),
        )
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn into_parts(self) -> (Status, String, Body) {
        (self.status, self.content_type, self.body)
    }
}

impl From<(Status, String, Body)> for Reply {
    fn from((status, content_type, body): (Status, String, Body)) -> Self {
        Self {
            status,
            content_type,
            body,
        }
    }
}

impl From<Reply> for (Status, String, Body) {
    fn from(reply: Reply) -> Self {
        reply.into_parts()
    }
}
