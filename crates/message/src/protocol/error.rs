use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid input: {source}")]
    InvalidInput {
        #[from]
        source: InvalidInput,
    },

    #[error("resource fault: {source}")]
    ResourceFault {
        #[from]
        source: ResourceFault,
    },
}

impl HttpError {
    /// Returns true if the caller supplied a value violating a contract.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, HttpError::InvalidInput { .. })
    }

    /// Returns true if an underlying stream or filesystem operation failed.
    pub fn is_resource_fault(&self) -> bool {
        matches!(self, HttpError::ResourceFault { .. })
    }
}

#[derive(Error, Debug)]
pub enum InvalidInput {
    #[error("header value must be a string or a list of visible ascii strings, got: {found}")]
    InvalidHeaderValue { found: String },

    #[error("invalid header name: {name}")]
    InvalidHeaderName { name: String },

    #[error("invalid http method: {method}")]
    InvalidMethod { method: String },

    #[error("the uri is malformed, the input is {uri}: {reason}")]
    MalformedUri { uri: String, reason: &'static str },

    #[error("scheme only accept http or https, the input is {scheme}")]
    InvalidScheme { scheme: String },

    #[error("only accept valid hostname, the input is {host}")]
    InvalidHost { host: String },

    #[error("port exceed valid range, the input is {port}")]
    InvalidPort { port: String },

    #[error("{component} can not start with '{delimiter}', the input is {value}")]
    LeadingDelimiter { component: &'static str, delimiter: char, value: String },

    #[error("invalid http status code: {code}")]
    InvalidStatus { code: String },

    #[error("no default reason phrase for status code {code}")]
    UnknownReasonPhrase { code: u16 },

    #[error("invalid structure of uploaded files, leaf at {path} is not an uploaded file")]
    InvalidUploadTree { path: String },
}

impl InvalidInput {
    pub fn invalid_header_value<S: ToString>(found: S) -> Self {
        Self::InvalidHeaderValue { found: found.to_string() }
    }

    pub fn invalid_header_name<S: ToString>(name: S) -> Self {
        Self::InvalidHeaderName { name: name.to_string() }
    }

    pub fn invalid_method<S: ToString>(method: S) -> Self {
        Self::InvalidMethod { method: method.to_string() }
    }

    pub fn malformed_uri<S: ToString>(uri: S, reason: &'static str) -> Self {
        Self::MalformedUri { uri: uri.to_string(), reason }
    }

    pub fn invalid_scheme<S: ToString>(scheme: S) -> Self {
        Self::InvalidScheme { scheme: scheme.to_string() }
    }

    pub fn invalid_host<S: ToString>(host: S) -> Self {
        Self::InvalidHost { host: host.to_string() }
    }

    pub fn invalid_port<S: ToString>(port: S) -> Self {
        Self::InvalidPort { port: port.to_string() }
    }

    pub fn leading_delimiter<S: ToString>(component: &'static str, delimiter: char, value: S) -> Self {
        Self::LeadingDelimiter { component, delimiter, value: value.to_string() }
    }

    pub fn invalid_status<S: ToString>(code: S) -> Self {
        Self::InvalidStatus { code: code.to_string() }
    }

    pub fn invalid_upload_tree<S: ToString>(path: S) -> Self {
        Self::InvalidUploadTree { path: path.to_string() }
    }
}

#[derive(Error, Debug)]
pub enum ResourceFault {
    #[error("open stream {name} with mode {mode} error: {source}")]
    Open { name: String, mode: String, source: io::Error },

    #[error("invalid access mode {mode} for stream {name}")]
    InvalidMode { name: String, mode: String },

    #[error("read stream {name} error: {source}")]
    Read { name: String, source: io::Error },

    #[error("write stream {name} error: {source}")]
    Write { name: String, source: io::Error },

    #[error("seek stream {name} error: {source}")]
    Seek { name: String, source: io::Error },

    #[error("find the current position of stream {name} error: {source}")]
    Tell { name: String, source: io::Error },

    #[error("close stream {name} error: {source}")]
    Close { name: String, source: io::Error },

    #[error("stream {name} is not {access}")]
    NotPermitted { name: String, access: &'static str },

    #[error("stream {name} has been detached")]
    Detached { name: String },

    #[error("{name} has already been moved")]
    AlreadyMoved { name: String },

    #[error("{name} is not an uploaded file")]
    NotUploaded { name: String },

    #[error("{name} was not uploaded successfully, error code {code}")]
    UploadFailed { name: String, code: u16 },

    #[error("moving file {name} to {target} fails: {source}")]
    Move { name: String, target: PathBuf, source: io::Error },
}

impl ResourceFault {
    pub fn detached<S: ToString>(name: S) -> Self {
        Self::Detached { name: name.to_string() }
    }

    pub fn read<S: ToString>(name: S, source: io::Error) -> Self {
        Self::Read { name: name.to_string(), source }
    }

    pub fn write<S: ToString>(name: S, source: io::Error) -> Self {
        Self::Write { name: name.to_string(), source }
    }

    pub fn seek<S: ToString>(name: S, source: io::Error) -> Self {
        Self::Seek { name: name.to_string(), source }
    }

    pub fn tell<S: ToString>(name: S, source: io::Error) -> Self {
        Self::Tell { name: name.to_string(), source }
    }

    pub fn close<S: ToString>(name: S, source: io::Error) -> Self {
        Self::Close { name: name.to_string(), source }
    }

    pub fn moving<S: ToString>(name: S, target: &Path, source: io::Error) -> Self {
        Self::Move { name: name.to_string(), target: target.to_path_buf(), source }
    }
}
