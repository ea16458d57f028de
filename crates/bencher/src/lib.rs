//! Fixtures shared by the micro-message benchmarks.

/// Rough size class of a fixture, used to name benchmark groups.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FixtureSize {
    Small,
    Large,
}

impl FixtureSize {
    pub fn label(self) -> &'static str {
        match self {
            FixtureSize::Small => "small",
            FixtureSize::Large => "large",
        }
    }
}

/// A named benchmark input loaded from `resources/`.
#[derive(Debug, Copy, Clone)]
pub struct Fixture {
    name: &'static str,
    size: FixtureSize,
    file_name: &'static str,
    content: &'static str,
}

impl Fixture {
    pub const fn small(name: &'static str, file_name: &'static str, content: &'static str) -> Self {
        Self { name, size: FixtureSize::Small, file_name, content }
    }

    pub const fn large(name: &'static str, file_name: &'static str, content: &'static str) -> Self {
        Self { name, size: FixtureSize::Large, file_name, content }
    }

    /// Benchmark id in `size/name` form.
    pub fn id(&self) -> String {
        format!("{}/{}", self.size.label(), self.name)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn size(&self) -> FixtureSize {
        self.size
    }

    pub fn file_name(&self) -> &'static str {
        self.file_name
    }

    /// The content with surrounding whitespace removed.
    pub fn content(&self) -> &'static str {
        self.content.trim()
    }

    /// Content length in bytes, for throughput reporting.
    pub fn bytes(&self) -> u64 {
        self.content().len() as u64
    }
}

/// CGI-style variables of a typical upload request.
pub const UPLOAD_SERVER_VARS: [(&str, &str); 7] = [
    ("REQUEST_METHOD", "POST"),
    ("REQUEST_URI", "http://example.com/upload?album=1"),
    ("SERVER_PROTOCOL", "HTTP/1.1"),
    ("QUERY_STRING", "album=1"),
    ("CONTENT_TYPE", "multipart/form-data; boundary=xyz"),
    ("HTTP_ACCEPT", "text/html, application/xhtml+xml, */*"),
    ("HTTP_COOKIE", "session=abc; theme=dark"),
];
