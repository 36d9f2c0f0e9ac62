//! Transport-independent request and response types.
//!
//! The dispatch core never touches sockets. It consumes a [`RouteRequest`]
//! (method, path, query, headers, body and a mutable attribute bag that
//! middleware may enrich) and produces a [`RouteResponse`]. Both convert
//! from/to the `http` crate types so any server adapter can plug in.
use std::{borrow::Cow, collections::HashMap};

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, HeaderValue, Method, StatusCode, header::HeaderName};
use serde_json::Value;

/// An already-parsed inbound request.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
    attributes: HashMap<String, Value>,
}

impl RouteRequest {
    /// Create a request from a method and a request target (`/path?query`).
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (target, None),
        };
        let path = if path.is_empty() { "/" } else { path };

        Self {
            method,
            path: path.to_string(),
            query,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            attributes: HashMap::new(),
        }
    }

    pub fn get(target: &str) -> Self {
        Self::new(Method::GET, target)
    }

    pub fn post(target: &str) -> Self {
        Self::new(Method::POST, target)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_attribute(key, value);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw query string without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Decoded query pairs. Later duplicates overwrite earlier ones.
    pub fn query_params(&self) -> HashMap<String, String> {
        self.query
            .as_deref()
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Convenience accessor for string-valued attributes.
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn attributes(&self) -> &HashMap<String, Value> {
        &self.attributes
    }
}

impl From<http::Request<Bytes>> for RouteRequest {
    fn from(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        let path = parts.uri.path();
        let mut request = Self::new(parts.method, if path.is_empty() { "/" } else { path });
        request.query = parts.uri.query().map(str::to_string);
        request.headers = parts.headers;
        request.body = body;
        request
    }
}

/// A buildable outbound response: status, headers and a writable body.
#[derive(Debug, Clone)]
pub struct RouteResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: BytesMut,
}

impl Default for RouteResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteResponse {
    /// An empty `200 OK` response.
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: BytesMut::new(),
        }
    }

    pub fn with_status(status: StatusCode) -> Self {
        Self {
            status,
            ..Self::new()
        }
    }

    /// Plain text response with a `text/plain` content type.
    pub fn text(status: StatusCode, body: impl AsRef<str>) -> Self {
        let mut response = Self::with_status(status).with_header(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response.write(body.as_ref());
        response
    }

    /// JSON response with an `application/json` content type.
    pub fn json(status: StatusCode, body: &Value) -> Self {
        let mut response = Self::with_status(status).with_header(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        response.write(body.to_string());
        response
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Append bytes to the body.
    pub fn write(&mut self, data: impl AsRef<[u8]>) {
        self.body.extend_from_slice(data.as_ref());
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn into_http(self) -> http::Response<Bytes> {
        let mut response = http::Response::new(self.body.freeze());
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_splits_query() {
        let req = RouteRequest::get("/posts?page=2&sort=desc");
        assert_eq!(req.path(), "/posts");
        assert_eq!(req.query(), Some("page=2&sort=desc"));
        let params = req.query_params();
        assert_eq!(params.get("page").map(String::as_str), Some("2"));
        assert_eq!(params.get("sort").map(String::as_str), Some("desc"));
    }

    #[test]
    fn test_request_from_http() {
        let http_req = http::Request::builder()
            .method(Method::PUT)
            .uri("/posts/7?draft=1")
            .header("x-request-id", "abc")
            .body(Bytes::from_static(b"payload"))
            .unwrap();

        let req = RouteRequest::from(http_req);
        assert_eq!(req.method(), Method::PUT);
        assert_eq!(req.path(), "/posts/7");
        assert_eq!(req.query(), Some("draft=1"));
        assert_eq!(req.headers().get("x-request-id").unwrap(), "abc");
        assert_eq!(req.body().as_ref(), b"payload");
    }

    #[test]
    fn test_attributes() {
        let mut req = RouteRequest::get("/").with_attribute("user", "alice");
        req.set_attribute("admin", true);
        assert_eq!(req.attribute_str("user"), Some("alice"));
        assert_eq!(req.attribute("admin"), Some(&Value::Bool(true)));
        assert!(req.attribute("missing").is_none());
    }

    #[test]
    fn test_response_write_and_convert() {
        let mut response = RouteResponse::text(StatusCode::CREATED, "hello");
        response.write(", world");
        assert_eq!(response.body_text(), "hello, world");

        let http_response = response.into_http();
        assert_eq!(http_response.status(), StatusCode::CREATED);
        assert_eq!(
            http_response.headers().get(http::header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
        assert_eq!(http_response.body().as_ref(), b"hello, world");
    }
}
