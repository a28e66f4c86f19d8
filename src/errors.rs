use std::{io, time::Duration};

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error a route handler may return. Any `std::error::Error` converts into it
/// with `?`, and so does a plain `&str` or `String`.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// What a route handler produces.
pub type HandlerResult = Result<crate::Response, HandlerError>;

/// Every failure the client, the codec and the server can report.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid URL {0:?}: missing scheme or host")]
    InvalidUrl(String),

    #[error("failed to resolve host {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to connect to {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to send request: {0}")]
    Send(#[source] io::Error),
    #[error("failed to read response: {0}")]
    Receive(#[source] io::Error),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to parse response: {0}")]
    ResponseParse(&'static str),
    #[error("empty request")]
    EmptyRequest,
    #[error("unsupported request method {0:?}")]
    InvalidMethod(String),
    #[error("request head is not valid UTF-8")]
    InvalidEncoding,

    #[error("failed to create socket: {0}")]
    Socket(#[source] io::Error),
    #[error("failed to bind to port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("failed to listen: {0}")]
    Listen(#[source] io::Error),
    #[error("server cannot {0} in its current state")]
    InvalidState(&'static str),

    #[error("failed to build runtime: {0}")]
    Runtime(#[source] io::Error),
}

impl Error {
    /// Whether the error came from the transport rather than from parsing.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Error::Resolve { .. }
                | Error::Connect { .. }
                | Error::Send(_)
                | Error::Receive(_)
                | Error::Socket(_)
                | Error::Bind { .. }
                | Error::Listen(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        let cases = [
            (
                Error::InvalidUrl("not-a-url".into()),
                r#"invalid URL "not-a-url": missing scheme or host"#,
            ),
            (
                Error::ResponseParse("header terminator not found"),
                "failed to parse response: header terminator not found",
            ),
            (Error::EmptyRequest, "empty request"),
            (
                Error::InvalidState("run"),
                "server cannot run in its current state",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
            assert!(!error.is_io());
        }
    }

    #[test]
    fn io_source() {
        let err = Error::Bind {
            port: 80,
            source: io::Error::new(io::ErrorKind::AddrInUse, "in use"),
        };

        assert!(err.is_io());
        assert_eq!(err.to_string(), "failed to bind to port 80: in use");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn handler_error_from_str() {
        let err: HandlerError = "boom".into();
        assert_eq!(err.to_string(), "boom");
    }
}
