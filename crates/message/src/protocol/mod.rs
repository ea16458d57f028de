//! HTTP message value objects.
//!
//! The module is organized into leaf components and the messages composed
//! from them:
//!
//! - **Headers** ([`header`]): [`HeaderStore`] keeps every header under its
//!   original casing and answers lookups case-insensitively
//!
//! - **URI** ([`uri`]): [`Uri`] parses a raw URI once, exposes normalized
//!   components and validates every component mutation
//!
//! - **Uploads** ([`upload`]): [`UploadedFiles`] turns nested or
//!   parallel-array upload descriptions into a tree of [`UploadedFile`]s
//!
//! - **Body** ([`stream`]): [`Stream`] is the byte stream port and [`Body`]
//!   the shared handle messages carry
//!
//! - **Messages** ([`message`], [`request`], [`response`], [`server_request`]):
//!   [`Message`] holds version, headers and body; [`Request`], [`Response`]
//!   and [`ServerRequest`] build on it
//!
//! - **Context** ([`context`]): [`RequestContext`] is the explicit snapshot of
//!   an incoming exchange
//!
//! - **Errors** ([`error`]): [`HttpError`] with its two kinds,
//!   [`InvalidInput`] and [`ResourceFault`]
//!
//! Every `with_*` operation returns a new value and leaves the receiver
//! unchanged.

pub mod context;
pub mod header;
pub mod message;
pub mod request;
pub mod response;
pub mod server_request;
pub mod stream;
pub mod upload;
pub mod uri;

mod error;
pub use error::HttpError;
pub use error::InvalidInput;
pub use error::ResourceFault;

pub use context::{Credentials, RequestContext};
pub use header::{HeaderStore, IntoHeaderValues};
pub use message::{HttpMessage, Message};
pub use request::{Request, RequestMessage};
pub use response::{IntoStatusCode, Response};
pub use server_request::{ParsedBody, ServerRequest};
pub use stream::{Body, Stream, StreamIo, StreamMetadata};
pub use upload::{UploadEntry, UploadErrorCode, UploadedFile, UploadedFileNode, UploadedFiles};
pub use uri::Uri;
