use crate::status;
use std::collections::{BTreeMap, HashMap};
use std::io::{self, Write};

/// The fixed body of every not-found response.
pub(crate) const NOT_FOUND_BODY: &str = r#"{"error":"Not Found"}"#;

/// An outbound HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Response {
    status: u16,
    headers: BTreeMap<String, String>,
    body: Vec<u8>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: status::OK,
            headers: BTreeMap::new(),
            body: Vec::new(),
        }
    }
}

impl Response {
    /// The standard not-found response: 404, the fixed JSON body, plus
    /// whatever headers the caller of the not-found path supplies.
    pub fn not_found(headers: &HashMap<String, String>) -> Self {
        Response::default()
            .set_status(status::NOT_FOUND)
            .set_headers(headers)
            .set_body(NOT_FOUND_BODY.as_bytes().to_vec())
    }

    /// Sets the status code of the response to `code`
    pub fn set_status(mut self, code: u16) -> Self {
        self.status = code;
        self
    }

    /// Sets the response header `key` to `value`
    ///
    /// If `key` was already present, the value is updated
    pub fn set_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Adds every header in `headers` to the response
    pub fn set_headers(mut self, headers: &HashMap<String, String>) -> Self {
        for (key, value) in headers {
            self.headers.insert(key.clone(), value.clone());
        }
        self
    }

    /// Sets the response body
    pub fn set_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    fn has_header(&self, name: &str) -> bool {
        self.headers.keys().any(|k| k.eq_ignore_ascii_case(name))
    }

    /// Serializes the response as an HTTP/1.1 message: status line, declared
    /// headers, then the framing headers the transport owns (Content-Length,
    /// Connection), then the body. The response is fully built before any
    /// byte hits the wire, so headers cannot change once the status line is
    /// out.
    pub(crate) fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<(), io::Error> {
        write!(
            writer,
            "HTTP/1.1 {} {}\r\n",
            self.status,
            status::reason(self.status)
        )?;

        for (key, value) in self.headers.iter() {
            write!(writer, "{key}: {value}\r\n")?;
        }

        if !self.has_header("content-length") {
            write!(writer, "Content-Length: {}\r\n", self.body.len())?;
        }
        if !self.has_header("connection") {
            write!(writer, "Connection: close\r\n")?;
        }

        write!(writer, "\r\n")?;
        writer.write_all(&self.body)
    }
}
