//! API Gateway proxy events and their normalized [`Request`] form.

use std::collections::HashMap;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use super::{Headers, Method};

/// Errors produced while normalizing an event body.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("request body is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("decoded request body is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Raw proxy-integration event as delivered by API Gateway.
///
/// Only the fields the dispatcher reads are modelled; unknown fields are
/// ignored. Gateways send `null` for empty maps, which deserializes as an
/// empty map here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiGatewayEvent {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub http_method: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub headers: HashMap<String, String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub query_string_parameters: HashMap<String, String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub path_parameters: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
    #[serde(default)]
    pub request_context: Option<RequestContext>,
}

/// The subset of `requestContext` used for logging.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<HashMap<String, String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A normalized request: lowercase header names, parsed method, resolved path.
///
/// # Examples
///
/// ```
/// use rttp_cache::http::{ApiGatewayEvent, Method, Request};
///
/// let event: ApiGatewayEvent = serde_json::from_value(serde_json::json!({
///     "path": "/test/remote/pixel",
///     "httpMethod": "GET",
///     "headers": {"Accept-Encoding": "gzip"},
///     "queryStringParameters": null,
/// })).unwrap();
///
/// let request = Request::from_event(event);
/// assert_eq!(request.method(), &Method::Get);
/// assert_eq!(request.path(), Some("/test/remote/pixel"));
/// assert_eq!(request.headers().get("accept-encoding"), Some("gzip"));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: Option<String>,
    headers: Headers,
    query: HashMap<String, String>,
    body: Option<String>,
    is_base64_encoded: bool,
    request_id: Option<String>,
}

impl Request {
    /// Normalize a gateway event.
    ///
    /// The path comes from the `{proxy+}` path parameter when the event was
    /// routed through a catch-all resource, and from `path` otherwise.
    pub fn from_event(event: ApiGatewayEvent) -> Self {
        let path = match event.path_parameters.get("proxy") {
            Some(proxy) => Some(format!("/{}", proxy.trim_start_matches('/'))),
            None => event.path.filter(|p| !p.is_empty()),
        };

        Self {
            method: Method::from(event.http_method.as_str()),
            path,
            headers: event.headers.into_iter().collect(),
            query: event.query_string_parameters,
            body: event.body,
            is_base64_encoded: event.is_base64_encoded,
            request_id: event.request_context.and_then(|ctx| ctx.request_id),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request path, or `None` when the event carried no usable path.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn query(&self) -> &HashMap<String, String> {
        &self.query
    }

    /// Returns a query parameter value by key.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// The request body as text, base64-decoded when the gateway flagged it.
    ///
    /// Returns `Ok(None)` when the event has no body or an empty one.
    pub fn decoded_body(&self) -> Result<Option<String>, EventError> {
        let Some(body) = self.body.as_deref().filter(|b| !b.is_empty()) else {
            return Ok(None);
        };
        if self.is_base64_encoded {
            let raw = BASE64.decode(body)?;
            Ok(Some(String::from_utf8(raw)?))
        } else {
            Ok(Some(body.to_owned()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(value: serde_json::Value) -> ApiGatewayEvent {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn null_maps_are_empty() {
        let ev = event(json!({
            "path": "/a",
            "httpMethod": "GET",
            "headers": null,
            "queryStringParameters": null,
            "pathParameters": null,
        }));
        let req = Request::from_event(ev);
        assert!(req.headers().is_empty());
        assert!(req.query().is_empty());
    }

    #[test]
    fn proxy_path_parameter_wins() {
        let ev = event(json!({
            "path": "/prod/users/42",
            "httpMethod": "GET",
            "pathParameters": {"proxy": "users/42"},
        }));
        assert_eq!(Request::from_event(ev).path(), Some("/users/42"));
    }

    #[test]
    fn missing_path() {
        let ev = event(json!({"httpMethod": "GET"}));
        assert_eq!(Request::from_event(ev).path(), None);
    }

    #[test]
    fn header_names_are_lowercased() {
        let ev = event(json!({
            "path": "/",
            "httpMethod": "GET",
            "headers": {"Accept-Encoding": "gzip", "AUTHORIZATION": "Bearer t"},
        }));
        let req = Request::from_event(ev);
        let mut names: Vec<_> = req.headers().iter().map(|(k, _)| k.to_owned()).collect();
        names.sort();
        assert_eq!(names, vec!["accept-encoding", "authorization"]);
    }

    #[test]
    fn base64_body_is_decoded() {
        let ev = event(json!({
            "path": "/",
            "httpMethod": "POST",
            "body": "eyJhIjogMX0=",
            "isBase64Encoded": true,
        }));
        let req = Request::from_event(ev);
        assert_eq!(req.decoded_body().unwrap().as_deref(), Some("{\"a\": 1}"));
    }

    #[test]
    fn invalid_base64_body_is_an_error() {
        let ev = event(json!({
            "path": "/",
            "httpMethod": "POST",
            "body": "not base64!",
            "isBase64Encoded": true,
        }));
        assert!(matches!(
            Request::from_event(ev).decoded_body(),
            Err(EventError::Base64(_))
        ));
    }

    #[test]
    fn empty_body_is_none() {
        let ev = event(json!({"path": "/", "httpMethod": "POST", "body": ""}));
        assert_eq!(Request::from_event(ev).decoded_body().unwrap(), None);
    }
}
