//! Server-side HTTP response value.
//!
//! A [`Response`] adds the status line on top of the shared [`Message`]
//! state. A fresh response is `200` with an empty reason phrase.

use bytes::Bytes;
use http::StatusCode;

use crate::protocol::message::{HttpMessage, Message};
use crate::protocol::request::http_version;
use crate::protocol::{HttpError, InvalidInput};

/// Default reason phrases used when [`Response::with_status`] gets an empty reason.
const REASON_PHRASES: [(u16, &str); 34] = [
    (100, "Continue"),
    (101, "Switching Protocols"),
    (200, "OK"),
    (201, "Created"),
    (202, "Accepted"),
    (203, "Non-Authoritative Information"),
    (204, "No Content"),
    (205, "Reset Content"),
    (206, "Partial Content"),
    (300, "Multiple Choices"),
    (301, "Moved Permanently"),
    (302, "Moved Temporarily"),
    (303, "See Other"),
    (304, "Not Modified"),
    (305, "Use Proxy"),
    (307, "Temporary Redirect"),
    (400, "Bad Request"),
    (401, "Unauthorized"),
    (402, "Payment Required"),
    (403, "Forbidden"),
    (404, "Not Found"),
    (405, "Method Not Allowed"),
    (406, "Not Acceptable"),
    (407, "Proxy Authentication Required"),
    (408, "Request Timeout"),
    (409, "Conflict"),
    (410, "Gone"),
    (411, "Length Required"),
    (412, "Precondition Failed"),
    (502, "Bad Gateway"),
    (503, "Service Unavailable"),
    (504, "Gateway Timeout"),
    (505, "HTTP Version Not Supported"),
    (509, "Bandwidth Limit Exceeded"),
];

/// Looks up the default reason phrase of `code`.
pub fn default_reason_phrase(code: u16) -> Option<&'static str> {
    REASON_PHRASES.iter().find(|(known, _)| *known == code).map(|(_, phrase)| *phrase)
}

/// Conversion into a three digit [`StatusCode`].
pub trait IntoStatusCode {
    fn into_status_code(self) -> Result<StatusCode, InvalidInput>;
}

impl IntoStatusCode for StatusCode {
    fn into_status_code(self) -> Result<StatusCode, InvalidInput> {
        Ok(self)
    }
}

// Three digits in 100..=999; `http::StatusCode` cannot hold "000" to "099".
impl IntoStatusCode for &str {
    fn into_status_code(self) -> Result<StatusCode, InvalidInput> {
        let Ok(status) = StatusCode::from_bytes(self.as_bytes()) else {
            return Err(InvalidInput::invalid_status(self));
        };
        Ok(status)
    }
}

impl IntoStatusCode for String {
    fn into_status_code(self) -> Result<StatusCode, InvalidInput> {
        self.as_str().into_status_code()
    }
}

macro_rules! integer_status_code {
    ($($ty:ty),*) => {
        $(
            impl IntoStatusCode for $ty {
                fn into_status_code(self) -> Result<StatusCode, InvalidInput> {
                    let Some(status) = u16::try_from(self).ok().and_then(|code| StatusCode::from_u16(code).ok()) else {
                        return Err(InvalidInput::invalid_status(self));
                    };
                    Ok(status)
                }
            }
        )*
    };
}

integer_status_code!(u16, u32, u64, i32, i64, usize);

#[derive(Debug, Clone)]
pub struct Response {
    message: Message,
    status: StatusCode,
    reason: String,
}

impl Default for Response {
    fn default() -> Self {
        Self { message: Message::new(), status: StatusCode::OK, reason: String::new() }
    }
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn reason_phrase(&self) -> &str {
        &self.reason
    }

    /// Returns a copy with the status `code` and `reason`.
    ///
    /// `code` must be a three digit number, given as an integer or a string.
    /// An empty `reason` is replaced by the default phrase of the code, and a
    /// code without a default phrase is then rejected.
    pub fn with_status<C: IntoStatusCode>(&self, code: C, reason: &str) -> Result<Self, InvalidInput> {
        let status = code.into_status_code()?;

        let reason = if reason.is_empty() {
            default_reason_phrase(status.as_u16())
                .ok_or(InvalidInput::UnknownReasonPhrase { code: status.as_u16() })?
        } else {
            reason
        };

        let mut updated = self.clone();
        updated.status = status;
        updated.reason = reason.to_owned();
        Ok(updated)
    }

    /// Converts into an [`http::Response`] carrying the whole body.
    ///
    /// The reason phrase is not carried over.
    pub fn to_http(&self) -> Result<http::Response<Bytes>, HttpError> {
        let mut response = http::Response::new(self.body().read_all()?);
        *response.status_mut() = self.status;
        *response.version_mut() = http_version(self.protocol_version());
        *response.headers_mut() = self.header_store().to_header_map()?;
        Ok(response)
    }
}

impl HttpMessage for Response {
    fn message(&self) -> &Message {
        &self.message
    }

    fn message_mut(&mut self) -> &mut Message {
        &mut self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let response = Response::new();
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.reason_phrase(), "");
        assert_eq!(response.protocol_version(), "1.1");
    }

    #[test]
    fn status_with_default_reason() {
        let response = Response::new().with_status(400, "").unwrap();
        assert_eq!(response.status_code(), 400);
        assert_eq!(response.reason_phrase(), "Bad Request");

        let response = response.with_status(302, "").unwrap();
        assert_eq!(response.reason_phrase(), "Moved Temporarily");
    }

    #[test]
    fn status_from_string() {
        let response = Response::new().with_status("404", "").unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.reason_phrase(), "Not Found");
    }

    #[test]
    fn status_with_custom_reason() {
        let response = Response::new().with_status(418, "I'm a teapot").unwrap();
        assert_eq!(response.status_code(), 418);
        assert_eq!(response.reason_phrase(), "I'm a teapot");
    }

    #[test]
    fn rejects_malformed_status() {
        let err = Response::new().with_status("abc", "").unwrap_err();
        assert!(matches!(err, InvalidInput::InvalidStatus { ref code } if code == "abc"));

        assert!(matches!(Response::new().with_status(99, "x"), Err(InvalidInput::InvalidStatus { .. })));
        assert!(matches!(Response::new().with_status("099", "x"), Err(InvalidInput::InvalidStatus { .. })));
        assert!(matches!(Response::new().with_status("20", "x"), Err(InvalidInput::InvalidStatus { .. })));
        assert!(matches!(Response::new().with_status(1000, "x"), Err(InvalidInput::InvalidStatus { .. })));
        assert!(matches!(Response::new().with_status(-200, "x"), Err(InvalidInput::InvalidStatus { .. })));
    }

    #[test]
    fn rejects_unknown_code_without_reason() {
        let err = Response::new().with_status(500, "").unwrap_err();
        assert!(matches!(err, InvalidInput::UnknownReasonPhrase { code: 500 }));

        let response = Response::new().with_status(500, "Internal Server Error").unwrap();
        assert_eq!(response.reason_phrase(), "Internal Server Error");
    }

    #[test]
    fn with_status_leaves_original_untouched() {
        let original = Response::new();
        let _ = original.with_status(404, "").unwrap();

        assert_eq!(original.status_code(), 200);
        assert_eq!(original.reason_phrase(), "");
    }

    #[test]
    fn into_http_response() {
        let response = Response::new()
            .with_status(201, "")
            .unwrap()
            .with_header("Location", "/items/1")
            .unwrap()
            .with_body("created");

        let http_response = response.to_http().unwrap();
        assert_eq!(http_response.status(), StatusCode::CREATED);
        assert_eq!(http_response.headers().get(http::header::LOCATION).unwrap(), "/items/1");
        assert_eq!(http_response.body().as_ref(), b"created");
    }
}
