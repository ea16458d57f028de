//! Server-side view of an incoming request.
//!
//! A [`ServerRequest`] is a [`Request`] plus everything the server derived
//! from the incoming exchange: server parameters, cookies, query parameters,
//! posted form fields, the uploaded-file tree, a parsed body and free-form
//! attributes.
//!
//! Build one from a [`RequestContext`] snapshot with
//! [`ServerRequest::from_context`]; no process-wide state is read.

use indexmap::IndexMap;
use mime::Mime;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::protocol::context::RequestContext;
use crate::protocol::message::{HttpMessage, Message};
use crate::protocol::request::{Request, RequestMessage};
use crate::protocol::stream::Body;
use crate::protocol::upload::{UploadEntry, UploadedFiles};
use crate::protocol::uri::Uri;
use crate::protocol::{HttpError, InvalidInput};

/// A request body decoded into structured data.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBody {
    /// Url-encoded form fields posted with the request.
    Form(IndexMap<String, String>),
    /// A body sent as `application/json` or `application/*+json`.
    Json(Value),
    /// The raw document of a body sent as `application/xml` or `application/*+xml`.
    Xml(String),
    /// Data supplied by the caller through [`ServerRequest::with_parsed_body`].
    Data(Value),
}

impl From<Value> for ParsedBody {
    fn from(value: Value) -> Self {
        ParsedBody::Data(value)
    }
}

impl From<IndexMap<String, String>> for ParsedBody {
    fn from(form: IndexMap<String, String>) -> Self {
        ParsedBody::Form(form)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Xml,
}

impl BodyKind {
    fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type.parse::<Mime>().ok()?;
        if mime.type_() != mime::APPLICATION {
            return None;
        }

        if mime.subtype() == mime::JSON || mime.suffix() == Some(mime::JSON) {
            Some(BodyKind::Json)
        } else if mime.subtype() == mime::XML || mime.suffix() == Some(mime::XML) {
            Some(BodyKind::Xml)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ServerRequest {
    request: Request,
    server_params: IndexMap<String, String>,
    context_cookies: IndexMap<String, String>,
    cookies: IndexMap<String, String>,
    context_query: IndexMap<String, String>,
    query: IndexMap<String, String>,
    form: IndexMap<String, String>,
    uploaded_files: UploadedFiles,
    parsed_body: Option<ParsedBody>,
    attributes: IndexMap<String, Value>,
}

impl ServerRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a server request from a snapshot of the incoming exchange.
    ///
    /// The method and target are applied only when the snapshot has a
    /// method, and the URI then fills in the `Host` header. Headers are
    /// added in this order: `Authorization` from credentials,
    /// `Content-Length`, `Content-Type`, then every snapshot header with its
    /// value split on `,`. Snapshot headers sharing an exact name are merged.
    pub fn from_context(context: RequestContext) -> Result<Self, HttpError> {
        let RequestContext {
            method,
            target,
            protocol_version,
            server_params,
            headers,
            content_length,
            content_type,
            credentials,
            body,
            query,
            cookies,
            form,
            files,
        } = context;

        let mut request = ServerRequest {
            server_params,
            context_cookies: cookies,
            context_query: query,
            form,
            uploaded_files: UploadedFiles::build(&files, true),
            ..ServerRequest::default()
        };

        if let Some(version) = protocol_version {
            request = request.with_protocol_version(version.strip_prefix("HTTP/").unwrap_or(&version));
        }

        if !method.is_empty() {
            request = request.with_method(&method)?;
            request = request.with_uri(Uri::parse(&target)?, false);
        }

        let mut collected: IndexMap<String, Vec<String>> = IndexMap::new();
        if let Some(credentials) = credentials {
            collected.insert("Authorization".to_owned(), vec![credentials.authorization()]);
        }
        if let Some(length) = content_length {
            collected.insert("Content-Length".to_owned(), vec![length]);
        }
        if let Some(content_type) = content_type {
            collected.insert("Content-Type".to_owned(), vec![content_type]);
        }
        for (name, raw) in headers {
            collected.entry(name).or_default().extend(raw.split(',').map(|value| value.trim().to_owned()));
        }

        for (name, values) in collected {
            request = request.with_header(&name, values)?;
        }

        debug!(
            method = request.method(),
            target = %request.request_target(),
            headers = request.header_store().len(),
            uploads = request.uploaded_files.len(),
            "build server request from context"
        );

        Ok(request.with_body(Body::from(body)))
    }

    pub fn server_params(&self) -> &IndexMap<String, String> {
        &self.server_params
    }

    /// Cookies from the request context merged with the explicitly set ones.
    ///
    /// An explicitly set cookie wins over a context cookie of the same name.
    pub fn cookie_params(&self) -> IndexMap<String, String> {
        merge(&self.context_cookies, &self.cookies)
    }

    /// Returns a copy whose explicitly set cookies are replaced by `cookies`.
    pub fn with_cookie_params<I, K, V>(&self, cookies: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut updated = self.clone();
        updated.cookies = cookies.into_iter().map(|(name, value)| (name.into(), value.into())).collect();
        updated
    }

    /// Query parameters from the request context merged with the explicitly set ones.
    ///
    /// An explicitly set parameter wins over a context parameter of the same name.
    pub fn query_params(&self) -> IndexMap<String, String> {
        merge(&self.context_query, &self.query)
    }

    /// Returns a copy whose explicitly set query parameters are replaced by `query`.
    pub fn with_query_params<I, K, V>(&self, query: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut updated = self.clone();
        updated.query = query.into_iter().map(|(name, value)| (name.into(), value.into())).collect();
        updated
    }

    pub fn uploaded_files(&self) -> &UploadedFiles {
        &self.uploaded_files
    }

    /// Returns a copy whose uploaded-file tree is built from `entries`.
    ///
    /// Fails if any leaf of `entries` is not an uploaded file.
    pub fn with_uploaded_files(&self, entries: IndexMap<String, UploadEntry>) -> Result<Self, InvalidInput> {
        let files = UploadedFiles::try_from_entries(entries)?;
        let mut updated = self.clone();
        updated.uploaded_files = files;
        Ok(updated)
    }

    /// The structured request body, if any can be produced.
    ///
    /// Explicitly set data is returned first. Otherwise a `POST` with posted
    /// form fields yields [`ParsedBody::Form`]. Otherwise the `Content-Type`
    /// decides: JSON bodies are decoded, XML bodies are returned as text, and
    /// anything else yields `None`. A JSON body that does not decode yields
    /// `None` as well.
    pub fn parsed_body(&self) -> Result<Option<ParsedBody>, HttpError> {
        if let Some(parsed) = &self.parsed_body {
            return Ok(Some(parsed.clone()));
        }

        if self.method().eq_ignore_ascii_case("POST") && !self.form.is_empty() {
            return Ok(Some(ParsedBody::Form(self.form.clone())));
        }

        let Some(content_type) = self.header("Content-Type").first().copied() else {
            return Ok(None);
        };

        match BodyKind::from_content_type(content_type) {
            Some(BodyKind::Json) => {
                let raw = self.body().read_all()?;
                match serde_json::from_slice::<Value>(&raw) {
                    Ok(value) => Ok(Some(ParsedBody::Json(value))),
                    Err(e) => {
                        warn!(cause = %e, "request body is not valid json");
                        Ok(None)
                    }
                }
            }
            Some(BodyKind::Xml) => {
                let raw = self.body().read_all()?;
                Ok(Some(ParsedBody::Xml(String::from_utf8_lossy(&raw).into_owned())))
            }
            None => {
                trace!(content_type, "no decoder for content type");
                Ok(None)
            }
        }
    }

    pub fn with_parsed_body<B: Into<ParsedBody>>(&self, data: B) -> Self {
        let mut updated = self.clone();
        updated.parsed_body = Some(data.into());
        updated
    }

    pub fn attributes(&self) -> &IndexMap<String, Value> {
        &self.attributes
    }

    /// The attribute stored under `name`, or `default` when there is none.
    pub fn attribute(&self, name: &str, default: Value) -> Value {
        self.attributes.get(name).cloned().unwrap_or(default)
    }

    pub fn with_attribute<V: Into<Value>>(&self, name: &str, value: V) -> Self {
        let mut updated = self.clone();
        updated.attributes.insert(name.to_owned(), value.into());
        updated
    }

    pub fn without_attribute(&self, name: &str) -> Self {
        let mut updated = self.clone();
        updated.attributes.shift_remove(name);
        updated
    }
}

fn merge(base: &IndexMap<String, String>, overrides: &IndexMap<String, String>) -> IndexMap<String, String> {
    let mut merged = base.clone();
    merged.extend(overrides.iter().map(|(name, value)| (name.clone(), value.clone())));
    merged
}

impl HttpMessage for ServerRequest {
    fn message(&self) -> &Message {
        self.request.message()
    }

    fn message_mut(&mut self) -> &mut Message {
        self.request.message_mut()
    }
}

impl RequestMessage for ServerRequest {
    fn request(&self) -> &Request {
        &self.request
    }

    fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }
}
