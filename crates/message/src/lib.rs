//! Immutable HTTP message value objects
//!
//! This crate models the pieces of an HTTP exchange as values: protocol
//! version, headers, body, URI, status line, uploaded files and request
//! attributes. Every mutating operation is a `with_*` method that returns an
//! updated copy and leaves the receiver as it was, so a message can be
//! handed around freely without anyone observing a change they did not make.
//!
//! # Features
//!
//! - Case-insensitive header lookup that keeps the original header casing
//! - URI component model with normalization, percent-encoding and validated mutators
//! - Normalization of nested and parallel-array upload descriptions into a file tree
//! - Server requests built from an explicit request snapshot, never from globals
//! - Conversion into `http::Request` and `http::Response`
//!
//! # Example
//!
//! ```
//! use micro_message::protocol::{HttpMessage, RequestContext, RequestMessage, ServerRequest};
//!
//! let context = RequestContext::from_server_vars([
//!     ("REQUEST_METHOD", "GET"),
//!     ("REQUEST_URI", "http://example.com/users?page=2"),
//!     ("QUERY_STRING", "page=2"),
//!     ("HTTP_ACCEPT_LANGUAGE", "en-US,en"),
//! ]);
//!
//! let request = ServerRequest::from_context(context).unwrap();
//! assert_eq!(request.method(), "GET");
//! assert_eq!(request.header_line("host"), "example.com");
//! assert_eq!(request.header("accept-language"), vec!["en-US", "en"]);
//! assert_eq!(request.query_params()["page"], "2");
//!
//! let tagged = request.with_attribute("route", "users.index");
//! assert!(request.attributes().is_empty());
//! assert_eq!(tagged.attributes().len(), 1);
//! ```
//!
//! # Architecture
//!
//! Everything lives in [`protocol`]:
//!
//! - [`protocol::HeaderStore`]: the header multimap
//! - [`protocol::Uri`]: the URI component model
//! - [`protocol::UploadedFiles`]: the uploaded-file tree and its builder
//! - [`protocol::Stream`] and [`protocol::Body`]: the body byte stream
//! - [`protocol::Message`], [`protocol::Request`], [`protocol::Response`] and
//!   [`protocol::ServerRequest`]: the message values, sharing their operations
//!   through the [`protocol::HttpMessage`] and [`protocol::RequestMessage`] traits
//! - [`protocol::RequestContext`]: the snapshot a server request is built from
//!
//! ## Error Handling
//!
//! - [`protocol::HttpError`]: Top-level error type
//! - [`protocol::InvalidInput`]: The caller supplied a value violating a contract
//! - [`protocol::ResourceFault`]: A stream or filesystem operation failed

pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
