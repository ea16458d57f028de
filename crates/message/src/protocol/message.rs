//! The part every HTTP message shares: protocol version, headers and body.
//!
//! [`Message`] holds the state, [`HttpMessage`] exposes it. Requests,
//! responses and server requests embed a [`Message`] and implement
//! [`HttpMessage`] by pointing at it, so every header and body operation is
//! written once and returns the concrete message type.
//!
//! All `with_*` operations clone the receiver and return the updated copy;
//! the receiver is never modified. Clones share the body stream.

use indexmap::IndexMap;
use tracing::debug;

use crate::protocol::header::{HeaderStore, IntoHeaderValues};
use crate::protocol::stream::Body;
use crate::protocol::InvalidInput;

/// Protocol versions accepted by [`HttpMessage::with_protocol_version`].
pub const PROTOCOL_VERSIONS: [&str; 2] = ["1.0", "1.1"];

/// Protocol version of a freshly created message.
pub const DEFAULT_PROTOCOL_VERSION: &str = "1.1";

#[derive(Debug, Clone)]
pub struct Message {
    version: String,
    headers: HeaderStore,
    body: Body,
}

impl Default for Message {
    fn default() -> Self {
        Self { version: DEFAULT_PROTOCOL_VERSION.to_owned(), headers: HeaderStore::new(), body: Body::empty() }
    }
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn headers_mut(&mut self) -> &mut HeaderStore {
        &mut self.headers
    }
}

impl HttpMessage for Message {
    fn message(&self) -> &Message {
        self
    }

    fn message_mut(&mut self) -> &mut Message {
        self
    }
}

/// Accessors and `with_*` operations shared by every message type.
pub trait HttpMessage: Clone {
    fn message(&self) -> &Message;

    fn message_mut(&mut self) -> &mut Message;

    fn protocol_version(&self) -> &str {
        &self.message().version
    }

    /// Returns a copy using `version`, which must be `1.0` or `1.1`.
    ///
    /// Any other version is ignored and the copy keeps the current one.
    fn with_protocol_version(&self, version: &str) -> Self {
        let mut updated = self.clone();
        if PROTOCOL_VERSIONS.contains(&version) {
            updated.message_mut().version = version.to_owned();
        } else {
            debug!(version, "unsupported protocol version ignored");
        }
        updated
    }

    fn header_store(&self) -> &HeaderStore {
        &self.message().headers
    }

    /// Every header as original-case name to values.
    fn headers(&self) -> IndexMap<String, Vec<String>> {
        self.message().headers.to_map()
    }

    fn has_header(&self, name: &str) -> bool {
        self.message().headers.has(name)
    }

    fn header(&self, name: &str) -> Vec<&str> {
        self.message().headers.get(name)
    }

    fn header_line(&self, name: &str) -> String {
        self.message().headers.get_line(name)
    }

    /// Returns a copy where `value` replaces the header stored under the exact casing `name`.
    fn with_header<V: IntoHeaderValues>(&self, name: &str, value: V) -> Result<Self, InvalidInput> {
        let values = value.into_header_values()?;
        let mut updated = self.clone();
        updated.message_mut().headers.set(name, values);
        Ok(updated)
    }

    /// Returns a copy with `value` appended to the header stored under the exact casing `name`.
    fn with_added_header<V: IntoHeaderValues>(&self, name: &str, value: V) -> Result<Self, InvalidInput> {
        let values = value.into_header_values()?;
        let mut updated = self.clone();
        updated.message_mut().headers.append(name, values);
        Ok(updated)
    }

    /// Returns a copy without the header stored under the exact casing `name`.
    fn without_header(&self, name: &str) -> Self {
        let mut updated = self.clone();
        updated.message_mut().headers.remove(name);
        updated
    }

    fn body(&self) -> &Body {
        &self.message().body
    }

    fn with_body<B: Into<Body>>(&self, body: B) -> Self {
        let mut updated = self.clone();
        updated.message_mut().body = body.into();
        updated
    }
}
