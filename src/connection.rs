use crate::error::Error;
use crate::request::Request;
use crate::response::Response;
use bufstream::BufStream;
use std::collections::BTreeMap;
#[cfg(test)]
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::os::fd::{FromRawFd, IntoRawFd};

#[derive(Debug)]
pub(crate) enum Connection {
    Tcp(BufStream<TcpStream>),
    #[cfg(test)]
    Test(VecDeque<u8>),
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Connection::Tcp(w) => w.write(buf),
            #[cfg(test)]
            Connection::Test(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Connection::Tcp(w) => w.flush(),
            #[cfg(test)]
            Connection::Test(w) => w.flush(),
        }
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Connection::Tcp(r) => r.read(buf),
            #[cfg(test)]
            Connection::Test(r) => r.read(buf),
        }
    }
}

impl TryFrom<mio::net::TcpStream> for Connection {
    type Error = io::Error;

    // The accept loop hands out non-blocking sockets. A worker reads and
    // writes one request sequentially, so the socket goes back to blocking
    // mode first.
    fn try_from(stream: mio::net::TcpStream) -> Result<Self, io::Error> {
        // SAFETY: `into_raw_fd` transfers ownership of a valid, open socket
        // descriptor, and `from_raw_fd` takes it over exactly once.
        let stream = unsafe { TcpStream::from_raw_fd(stream.into_raw_fd()) };
        stream.set_nonblocking(false)?;
        Ok(Connection::Tcp(BufStream::new(stream)))
    }
}

impl Connection {
    // Reads one head line, accepting both CRLF and bare-LF endings.
    fn read_line(&mut self) -> Result<String, Error> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];

        loop {
            self.read_exact(&mut byte)
                .map_err(Error::UnexpectedSocketClose)?;
            if byte[0] == b'\n' {
                break;
            }
            line.push(byte[0]);
        }

        if line.last() == Some(&b'\r') {
            line.pop();
        }

        String::from_utf8(line).map_err(|_| Error::InvalidUtf8RequestHead)
    }

    /// Reads the head of an HTTP/1.1 request: the request line plus the
    /// header block. The body is left on the socket; callers read it with
    /// [`read_body`](Connection::read_body) once they know they want it.
    pub fn read_request(&mut self) -> Result<Request, Error> {
        let request_line = self.read_line()?;

        let mut parts = request_line.split_whitespace();
        let (method, target) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(method), Some(target), Some(_version), None) => {
                (method.to_string(), target.to_string())
            }
            _ => return Err(Error::MalformedRequestLine(request_line)),
        };

        let mut headers = BTreeMap::new();
        loop {
            let line = self.read_line()?;
            if line.is_empty() {
                break;
            }

            let Some((name, value)) = line.split_once(':') else {
                return Err(Error::MalformedHeader(line));
            };

            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        let mut request = Request::default();
        request.method = method;
        request.target = target;
        request.headers = headers;
        Ok(request)
    }

    /// Reads exactly `length` body bytes off the socket.
    pub fn read_body(&mut self, length: usize) -> Result<Vec<u8>, io::Error> {
        let mut body = vec![0u8; length];
        self.read_exact(&mut body)?;
        Ok(body)
    }

    /// Consumes and discards up to `count` unread bytes.
    ///
    /// Closing a socket with request bytes still unread can reset the
    /// connection before the peer has read the response, so a worker drains
    /// any body it chose not to read before responding.
    pub fn discard(&mut self, count: usize) -> Result<(), io::Error> {
        let mut unread = Read::by_ref(self).take(count as u64);
        io::copy(&mut unread, &mut io::sink())?;
        Ok(())
    }

    /// Serializes `response` and writes it to the socket.
    pub fn write_response(&mut self, response: &Response) -> Result<(), io::Error> {
        let mut payload = vec![];
        response.write_bytes(&mut payload)?;

        self.write_all(&payload)?;
        // Don't forget to flush.
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn connection_with(input: &str) -> Connection {
        Connection::Test(VecDeque::from(input.as_bytes().to_vec()))
    }

    #[test]
    fn parses_a_request_head() {
        let mut conn = connection_with(
            "GET /test/query?q=1 HTTP/1.1\r\nHost: localhost\r\nX-Fake: yes\r\n\r\n",
        );

        let request = conn.read_request().unwrap();
        assert_eq!(request.method, "GET");
        assert_eq!(request.target, "/test/query?q=1");
        assert_eq!(request.header("host"), Some("localhost"));
        assert_eq!(request.header("x-fake"), Some("yes"));
    }

    #[test]
    fn header_names_are_lowercased() {
        let mut conn = connection_with("GET / HTTP/1.1\r\nCoNtEnT-LeNgTh: 3\r\n\r\n");

        let request = conn.read_request().unwrap();
        assert_eq!(request.content_length(), 3);
    }

    #[test]
    fn accepts_bare_lf_line_endings() {
        let mut conn = connection_with("POST /p HTTP/1.1\nHost: x\n\n");

        let request = conn.read_request().unwrap();
        assert_eq!(request.method, "POST");
        assert_eq!(request.target, "/p");
    }

    #[test]
    fn rejects_a_malformed_request_line() {
        let mut conn = connection_with("garbage\r\n\r\n");
        assert_matches!(conn.read_request(), Err(Error::MalformedRequestLine(_)));

        let mut conn = connection_with("GET / HTTP/1.1 extra\r\n\r\n");
        assert_matches!(conn.read_request(), Err(Error::MalformedRequestLine(_)));
    }

    #[test]
    fn rejects_a_malformed_header() {
        let mut conn = connection_with("GET / HTTP/1.1\r\nno-colon-here\r\n\r\n");
        assert_matches!(conn.read_request(), Err(Error::MalformedHeader(_)));
    }

    #[test]
    fn reports_a_truncated_head() {
        let mut conn = connection_with("GET / HTTP/1.1\r\nHost: loc");
        assert_matches!(conn.read_request(), Err(Error::UnexpectedSocketClose(_)));
    }

    #[test]
    fn reads_and_discards_body_bytes() {
        let mut conn = connection_with("GET / HTTP/1.1\r\n\r\nhello world");
        conn.read_request().unwrap();

        assert_eq!(conn.read_body(5).unwrap(), b"hello");
        conn.discard(1).unwrap();
        assert_eq!(conn.read_body(5).unwrap(), b"world");
    }

    #[test]
    fn writes_a_serialized_response() {
        let mut conn = Connection::Test(VecDeque::new());

        let response = Response::default().set_status(204);
        conn.write_response(&response).unwrap();

        let mut written = String::new();
        conn.read_to_string(&mut written).unwrap();
        assert_eq!(
            written,
            "HTTP/1.1 204 No Content\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        );
    }
}
