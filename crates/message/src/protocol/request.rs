//! Client-side HTTP request value.
//!
//! A [`Request`] adds the method, the target [`Uri`] and an optional explicit
//! request-target on top of the shared [`Message`] state. The request
//! operations live in [`RequestMessage`] so [`ServerRequest`] gets them too.
//!
//! [`ServerRequest`]: crate::protocol::ServerRequest

use bytes::Bytes;
use http::{Method, Version};
use tracing::trace;

use crate::protocol::message::{HttpMessage, Message};
use crate::protocol::uri::Uri;
use crate::protocol::{HttpError, InvalidInput};

/// Methods accepted by [`RequestMessage::with_method`], compared case-insensitively.
pub const METHODS: [&str; 8] = ["GET", "POST", "HEAD", "PUT", "DELETE", "TRACE", "CONNECT", "OPTIONS"];

/// Request-target reported when neither a target nor a URI is set.
pub const DEFAULT_REQUEST_TARGET: &str = "/";

#[derive(Debug, Clone, Default)]
pub struct Request {
    message: Message,
    method: String,
    uri: Option<Uri>,
    target: Option<String>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    /// Converts into an [`http::Request`] carrying the whole body.
    ///
    /// An unset method becomes `GET`. The request-target is used as the
    /// request URI and the body stream is read from its start.
    pub fn to_http(&self) -> Result<http::Request<Bytes>, HttpError> {
        let target = self.request_target();
        let Ok(uri) = target.parse::<http::Uri>() else {
            return Err(InvalidInput::malformed_uri(target, "not a valid request-target").into());
        };

        let method = if self.method.is_empty() {
            Method::GET
        } else {
            let Ok(method) = Method::from_bytes(self.method.to_ascii_uppercase().as_bytes()) else {
                return Err(InvalidInput::invalid_method(&self.method).into());
            };
            method
        };

        let mut request = http::Request::new(self.body().read_all()?);
        *request.method_mut() = method;
        *request.uri_mut() = uri;
        *request.version_mut() = http_version(self.protocol_version());
        *request.headers_mut() = self.header_store().to_header_map()?;
        Ok(request)
    }
}

pub(crate) fn http_version(version: &str) -> Version {
    match version {
        "1.0" => Version::HTTP_10,
        _ => Version::HTTP_11,
    }
}

impl HttpMessage for Request {
    fn message(&self) -> &Message {
        &self.message
    }

    fn message_mut(&mut self) -> &mut Message {
        &mut self.message
    }
}

impl RequestMessage for Request {
    fn request(&self) -> &Request {
        self
    }

    fn request_mut(&mut self) -> &mut Request {
        self
    }
}

/// Accessors and `with_*` operations of a request.
pub trait RequestMessage: HttpMessage {
    fn request(&self) -> &Request;

    fn request_mut(&mut self) -> &mut Request;

    /// The explicit request-target, else the rendered URI, else `/`.
    fn request_target(&self) -> String {
        let request = self.request();
        if let Some(target) = &request.target {
            return target.clone();
        }

        match &request.uri {
            Some(uri) => uri.to_string(),
            None => DEFAULT_REQUEST_TARGET.to_owned(),
        }
    }

    fn with_request_target(&self, target: &str) -> Self {
        let mut updated = self.clone();
        updated.request_mut().target = Some(target.to_owned());
        updated
    }

    /// The method exactly as it was set; empty when unset.
    fn method(&self) -> &str {
        &self.request().method
    }

    /// Returns a copy using `method`, which must be one of [`METHODS`] in any letter case.
    ///
    /// The caller's casing is stored unchanged.
    fn with_method(&self, method: &str) -> Result<Self, InvalidInput> {
        if !METHODS.iter().any(|allowed| allowed.eq_ignore_ascii_case(method)) {
            return Err(InvalidInput::invalid_method(method));
        }

        let mut updated = self.clone();
        updated.request_mut().method = method.to_owned();
        Ok(updated)
    }

    fn uri(&self) -> Option<&Uri> {
        self.request().uri.as_ref()
    }

    /// Returns a copy targeting `uri`.
    ///
    /// The `Host` header is taken from the URI's host when it has one. With
    /// `preserve_host` an existing `Host` header is kept as is, and only a
    /// missing one is filled in.
    fn with_uri(&self, uri: Uri, preserve_host: bool) -> Self {
        let host = uri.host();
        let mut updated = self.clone();
        updated.request_mut().uri = Some(uri);

        if preserve_host && self.has_header("Host") {
            trace!("keep the existing host header");
            return updated;
        }

        if !host.is_empty() {
            updated.message_mut().headers_mut().set("Host", vec![host]);
        }
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(raw: &str) -> Uri {
        Uri::parse(raw).unwrap()
    }

    #[test]
    fn request_target() {
        let request = Request::new();
        assert_eq!(request.request_target(), "/");

        let request = request.with_uri(uri("https://example.com/a/b?x=1"), false);
        assert_eq!(request.request_target(), "https://example.com/a/b?x=1");

        let request = request.with_request_target("*");
        assert_eq!(request.request_target(), "*");
    }

    #[test]
    fn method_keeps_callers_casing() {
        let request = Request::new();
        assert_eq!(request.method(), "");

        let request = request.with_method("post").unwrap();
        assert_eq!(request.method(), "post");

        let request = request.with_method("OPTIONS").unwrap();
        assert_eq!(request.method(), "OPTIONS");
    }

    #[test]
    fn rejects_unknown_method() {
        let err = Request::new().with_method("PATCH").unwrap_err();
        assert!(matches!(err, InvalidInput::InvalidMethod { ref method } if method == "PATCH"));

        assert!(matches!(Request::new().with_method(""), Err(InvalidInput::InvalidMethod { .. })));
    }

    #[test]
    fn with_uri_sets_host() {
        let request = Request::new().with_uri(uri("http://abc.com/index"), false);

        assert_eq!(request.uri().map(Uri::host).as_deref(), Some("abc.com"));
        assert_eq!(request.header_line("Host"), "abc.com");
    }

    #[test]
    fn with_uri_replaces_host() {
        let request = Request::new().with_header("Host", "old.com").unwrap();
        let request = request.with_uri(uri("http://abc.com"), false);

        assert_eq!(request.header_line("host"), "abc.com");
    }

    #[test]
    fn with_uri_preserves_host() {
        let request = Request::new().with_header("Host", "old.com").unwrap();
        let preserved = request.with_uri(uri("http://abc.com"), true);
        assert_eq!(preserved.header_line("Host"), "old.com");

        let filled = Request::new().with_uri(uri("http://abc.com"), true);
        assert_eq!(filled.header_line("Host"), "abc.com");
    }

    #[test]
    fn with_uri_without_host_keeps_header() {
        let request = Request::new().with_header("Host", "old.com").unwrap();
        let request = request.with_uri(uri("/only/path"), false);

        assert_eq!(request.header_line("Host"), "old.com");
    }

    #[test]
    fn with_operations_leave_original_untouched() {
        let original = Request::new().with_method("GET").unwrap();
        let _ = original.with_method("POST").unwrap();
        let _ = original.with_uri(uri("http://abc.com"), false);
        let _ = original.with_request_target("*");

        assert_eq!(original.method(), "GET");
        assert!(original.uri().is_none());
        assert!(!original.has_header("Host"));
        assert_eq!(original.request_target(), "/");
    }

    #[test]
    fn into_http_request() {
        let request = Request::new()
            .with_method("post")
            .unwrap()
            .with_uri(uri("http://abc.com/submit?a=1"), false)
            .with_protocol_version("1.0")
            .with_header("Content-Type", "text/plain")
            .unwrap()
            .with_body("hello");

        let http_request = request.to_http().unwrap();
        assert_eq!(http_request.method(), Method::POST);
        assert_eq!(http_request.uri().host(), Some("abc.com"));
        assert_eq!(http_request.uri().path(), "/submit");
        assert_eq!(http_request.uri().query(), Some("a=1"));
        assert_eq!(http_request.version(), Version::HTTP_10);
        assert_eq!(http_request.headers().get(http::header::HOST).unwrap(), "abc.com");
        assert_eq!(http_request.headers().get(http::header::CONTENT_TYPE).unwrap(), "text/plain");
        assert_eq!(http_request.body().as_ref(), b"hello");
    }

    #[test]
    fn into_http_request_defaults() {
        let http_request = Request::new().to_http().unwrap();

        assert_eq!(http_request.method(), Method::GET);
        assert_eq!(http_request.uri().path(), "/");
        assert_eq!(http_request.version(), Version::HTTP_11);
        assert!(http_request.body().is_empty());
    }
}
