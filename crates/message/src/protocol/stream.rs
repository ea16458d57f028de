//! Byte stream port used for message bodies and uploaded files.
//!
//! [`Stream`] is a thin wrapper over any `Read + Write + Seek` handle that
//! remembers its name and fopen-style access mode. [`Body`] is the shared,
//! cheaply cloned handle a message keeps to its stream, so every value derived
//! from a message through a `with_*` call reads the same underlying bytes.

use std::fmt;
use std::fs::OpenOptions;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use tracing::trace;

use crate::protocol::ResourceFault;

/// Name reported by in-memory streams.
pub const MEMORY_STREAM: &str = "memory";

/// Any handle a [`Stream`] can drive.
pub trait StreamIo: Read + Write + Seek + Send + fmt::Debug {}

impl<T: Read + Write + Seek + Send + fmt::Debug> StreamIo for T {}

/// Snapshot of a stream's properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMetadata {
    pub name: String,
    pub mode: String,
    pub readable: bool,
    pub writable: bool,
    pub seekable: bool,
}

#[derive(Debug)]
pub struct Stream {
    name: String,
    mode: String,
    readable: bool,
    writable: bool,
    inner: Option<Box<dyn StreamIo>>,
}

impl Stream {
    /// Opens the file `name` with an fopen-style `mode`
    /// (`r`, `w`, `a`, `x`, `c`, each optionally followed by `+`, `b` or `t`).
    pub fn open(name: &str, mode: &str) -> Result<Self, ResourceFault> {
        let access = AccessMode::parse(mode)
            .ok_or_else(|| ResourceFault::InvalidMode { name: name.to_owned(), mode: mode.to_owned() })?;

        let file = access
            .options()
            .open(name)
            .map_err(|source| ResourceFault::Open { name: name.to_owned(), mode: mode.to_owned(), source })?;

        trace!(name, mode, "opened stream");
        Ok(Self {
            name: name.to_owned(),
            mode: mode.to_owned(),
            readable: access.readable,
            writable: access.writable,
            inner: Some(Box::new(file)),
        })
    }

    /// Creates a readable and writable in-memory stream holding `bytes`,
    /// positioned at the start.
    pub fn memory<B: Into<Bytes>>(bytes: B) -> Self {
        let bytes: Bytes = bytes.into();
        Self::from_io(MEMORY_STREAM, "r+", Cursor::new(bytes.to_vec()))
    }

    /// Wraps an existing handle. Readability and writability follow `mode`;
    /// an unknown mode leaves the stream readable only.
    pub fn from_io<T: StreamIo + 'static>(name: &str, mode: &str, io: T) -> Self {
        let access = AccessMode::parse(mode).unwrap_or(AccessMode { readable: true, ..AccessMode::default() });
        Self {
            name: name.to_owned(),
            mode: mode.to_owned(),
            readable: access.readable,
            writable: access.writable,
            inner: Some(Box::new(io)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_readable(&self) -> bool {
        self.inner.is_some() && self.readable
    }

    pub fn is_writable(&self) -> bool {
        self.inner.is_some() && self.writable
    }

    /// Every attached handle is seekable through the [`StreamIo`] bound.
    pub fn is_seekable(&self) -> bool {
        self.inner.is_some()
    }

    pub fn metadata(&self) -> StreamMetadata {
        StreamMetadata {
            name: self.name.clone(),
            mode: self.mode.clone(),
            readable: self.is_readable(),
            writable: self.is_writable(),
            seekable: self.is_seekable(),
        }
    }

    fn io(&mut self) -> Result<&mut Box<dyn StreamIo>, ResourceFault> {
        match self.inner.as_mut() {
            Some(io) => Ok(io),
            None => Err(ResourceFault::detached(&self.name)),
        }
    }

    /// Reads up to `length` bytes; fewer are returned at the end of the stream.
    pub fn read(&mut self, length: usize) -> Result<Bytes, ResourceFault> {
        self.ensure_readable()?;
        let name = self.name.clone();
        let io = self.io()?;

        let mut buf = Vec::new();
        io.take(length as u64).read_to_end(&mut buf).map_err(|e| ResourceFault::read(name, e))?;
        Ok(Bytes::from(buf))
    }

    /// Writes every byte of `bytes` and returns how many were written.
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize, ResourceFault> {
        if !self.writable {
            return Err(ResourceFault::NotPermitted { name: self.name.clone(), access: "writable" });
        }
        let name = self.name.clone();
        self.io()?.write_all(bytes).map_err(|e| ResourceFault::write(name, e))?;
        Ok(bytes.len())
    }

    pub fn seek(&mut self, position: SeekFrom) -> Result<u64, ResourceFault> {
        let name = self.name.clone();
        self.io()?.seek(position).map_err(|e| ResourceFault::seek(name, e))
    }

    pub fn rewind(&mut self) -> Result<(), ResourceFault> {
        self.seek(SeekFrom::Start(0)).map(|_| ())
    }

    /// Current position of the read/write pointer.
    pub fn tell(&mut self) -> Result<u64, ResourceFault> {
        let name = self.name.clone();
        self.io()?.stream_position().map_err(|e| ResourceFault::tell(name, e))
    }

    /// Returns true when the pointer is at or past the end of the stream.
    pub fn eof(&mut self) -> Result<bool, ResourceFault> {
        let position = self.tell()?;
        let size = self.size().unwrap_or(0);
        Ok(position >= size)
    }

    /// Total size in bytes, or `None` when it cannot be determined.
    pub fn size(&mut self) -> Option<u64> {
        let io = self.inner.as_mut()?;
        let position = io.stream_position().ok()?;
        let end = io.seek(SeekFrom::End(0)).ok()?;
        io.seek(SeekFrom::Start(position)).ok()?;
        Some(end)
    }

    /// Reads the remainder of the stream from the current position.
    pub fn contents(&mut self) -> Result<Bytes, ResourceFault> {
        self.ensure_readable()?;
        let name = self.name.clone();

        let mut buf = Vec::new();
        self.io()?.read_to_end(&mut buf).map_err(|e| ResourceFault::read(name, e))?;
        Ok(Bytes::from(buf))
    }

    /// Rewinds, then reads the whole stream.
    pub fn read_all(&mut self) -> Result<Bytes, ResourceFault> {
        self.rewind()?;
        self.contents()
    }

    /// Flushes and releases the underlying handle. The handle is released
    /// even when the flush fails.
    pub fn close(&mut self) -> Result<(), ResourceFault> {
        let Some(mut io) = self.inner.take() else {
            return Ok(());
        };

        io.flush().map_err(|e| ResourceFault::close(&self.name, e))?;
        trace!(name = %self.name, "closed stream");
        Ok(())
    }

    /// Separates the underlying handle from the stream, leaving it unusable.
    pub fn detach(&mut self) -> Option<Box<dyn StreamIo>> {
        self.inner.take()
    }

    fn ensure_readable(&self) -> Result<(), ResourceFault> {
        if self.readable {
            Ok(())
        } else {
            Err(ResourceFault::NotPermitted { name: self.name.clone(), access: "readable" })
        }
    }
}

/// Parsed fopen-style access mode.
#[derive(Debug, Default, Clone, Copy)]
struct AccessMode {
    readable: bool,
    writable: bool,
    truncate: bool,
    append: bool,
    create: bool,
    create_new: bool,
}

impl AccessMode {
    fn parse(mode: &str) -> Option<Self> {
        let mut chars = mode.chars().filter(|ch| !matches!(ch, 'b' | 't'));
        let base = chars.next()?;
        let plus = match chars.next() {
            None => false,
            Some('+') => true,
            Some(_) => return None,
        };
        if chars.next().is_some() {
            return None;
        }

        let mut access = match base {
            'r' => AccessMode { readable: true, ..Default::default() },
            'w' => AccessMode { writable: true, truncate: true, create: true, ..Default::default() },
            'a' => AccessMode { writable: true, append: true, create: true, ..Default::default() },
            'x' => AccessMode { writable: true, create_new: true, ..Default::default() },
            'c' => AccessMode { writable: true, create: true, ..Default::default() },
            _ => return None,
        };
        if plus {
            access.readable = true;
            access.writable = true;
        }
        Some(access)
    }

    fn options(self) -> OpenOptions {
        let mut options = OpenOptions::new();
        options
            .read(self.readable)
            .write(self.writable && !self.append)
            .append(self.append)
            .truncate(self.truncate)
            .create(self.create)
            .create_new(self.create_new);
        options
    }
}

/// Shared handle to a message body.
///
/// Clones point at the same [`Stream`]; the stream is locked for the duration
/// of each [`Body::apply`] call.
#[derive(Debug, Clone)]
pub struct Body {
    inner: Arc<Mutex<Stream>>,
}

impl Body {
    pub fn new(stream: Stream) -> Self {
        Self { inner: Arc::new(Mutex::new(stream)) }
    }

    pub fn empty() -> Self {
        Self::new(Stream::memory(Bytes::new()))
    }

    /// Runs `f` against the locked stream.
    pub fn apply<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&mut Stream) -> T,
    {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Rewinds, then reads the whole body.
    pub fn read_all(&self) -> Result<Bytes, ResourceFault> {
        self.apply(Stream::read_all)
    }

    /// Returns true if both handles point at the same stream.
    pub fn ptr_eq(&self, other: &Body) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Stream> for Body {
    fn from(stream: Stream) -> Self {
        Self::new(stream)
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self::new(Stream::memory(bytes))
    }
}

impl From<&'static str> for Body {
    fn from(value: &'static str) -> Self {
        Self::new(Stream::memory(value))
    }
}

impl From<String> for Body {
    fn from(value: String) -> Self {
        Self::new(Stream::memory(value))
    }
}
