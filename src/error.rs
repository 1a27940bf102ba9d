use std::io;

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("The connection socket was closed unexpectedly")]
    UnexpectedSocketClose(#[source] io::Error),

    #[error("Malformed HTTP request line: '{0}'")]
    MalformedRequestLine(String),

    #[error("Malformed HTTP header line: '{0}'")]
    MalformedHeader(String),

    #[error("Detected invalid utf8 in the request head")]
    InvalidUtf8RequestHead,
}
