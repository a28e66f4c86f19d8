//! HTTP/1.1 client over plain TCP.
//!
//! Every exchange opens its own connection, writes the serialized request,
//! reads until the response is framed (or the peer closes) and drops the
//! socket. The socket is released on every path, errors included.

use crate::{
    errors::Error,
    http::codec::{encode_request, ResponseParser},
    limits::ClientLimits,
    Method, Request, Response, Url,
};
use std::io;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{lookup_host, TcpStream},
    runtime,
    task::JoinHandle,
    time::timeout,
};

/// HTTP client.
///
/// The client holds no connection state, so one value can serve any number of
/// concurrent requests and is cheap to clone.
///
/// # Examples
/// ```no_run
/// use wire_http::Client;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), wire_http::Error> {
/// let client = Client::new();
///
/// let resp = client.get("http://127.0.0.1:8080/test").await?;
/// println!("{} {}", resp.status_code(), resp.body_text());
///
/// let resp = client.post("http://127.0.0.1:8080/echo", "plain body").await?;
/// assert!(resp.is_success());
///
/// let resp = client
///     .post_with_type("http://127.0.0.1:8080/echo", r#"{"a":1}"#, "application/json")
///     .await?;
/// assert!(resp.is_success());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Client {
    limits: ClientLimits,
}

impl Client {
    #[inline(always)]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn with_limits(limits: ClientLimits) -> Self {
        Self { limits }
    }
}

// Public API
impl Client {
    /// Sends `GET url`. A malformed URL fails before any network activity.
    pub async fn get(&self, url: &str) -> Result<Response, Error> {
        let url = Url::parse(url)?;
        self.async_send(Request::new(Method::Get, url)).await
    }

    /// Sends `POST url` with `body`. Only `Content-Length` is added, no
    /// `Content-Type`.
    pub async fn post(&self, url: &str, body: impl Into<Vec<u8>>) -> Result<Response, Error> {
        let mut req = Request::new(Method::Post, Url::parse(url)?);
        req.set_body(body);

        self.async_send(req).await
    }

    /// Like [`post`](Client::post), also sending the given `Content-Type`.
    pub async fn post_with_type(
        &self,
        url: &str,
        body: impl Into<Vec<u8>>,
        content_type: &str,
    ) -> Result<Response, Error> {
        let mut req = Request::new(Method::Post, Url::parse(url)?);
        req.set_header("Content-Type", content_type);
        req.set_body(body);

        self.async_send(req).await
    }

    /// Performs one exchange.
    ///
    /// The whole exchange (resolve, connect, send, receive) is bounded by
    /// [`Request::timeout`].
    ///
    /// # Errors
    ///
    /// | Stage            | Error                  |
    /// |------------------|------------------------|
    /// | name resolution  | [`Error::Resolve`]     |
    /// | connect          | [`Error::Connect`]     |
    /// | write            | [`Error::Send`]        |
    /// | read, no headers | [`Error::Receive`]     |
    /// | parse            | [`Error::ResponseParse`] |
    /// | time budget      | [`Error::Timeout`]     |
    pub async fn async_send(&self, req: Request) -> Result<Response, Error> {
        let budget = req.timeout();

        match timeout(budget, self.exchange(&req)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!(url = %req.url(), ?budget, "request timed out");
                Err(Error::Timeout(budget))
            }
        }
    }

    /// Runs [`async_send`](Client::async_send) as a separate task on the
    /// current runtime.
    ///
    /// # Panics
    /// Outside of a Tokio runtime.
    pub fn spawn(&self, req: Request) -> JoinHandle<Result<Response, Error>> {
        let client = self.clone();
        tokio::spawn(async move { client.async_send(req).await })
    }

    /// Blocking form of [`async_send`](Client::async_send).
    ///
    /// Drives the exchange on a private single-threaded runtime, so it must
    /// not be called from inside an async context.
    pub fn send(&self, req: Request) -> Result<Response, Error> {
        let rt = runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(Error::Runtime)?;

        rt.block_on(self.async_send(req))
    }
}

impl Client {
    async fn exchange(&self, req: &Request) -> Result<Response, Error> {
        let url = req.url();
        let mut stream = Self::connect(url).await?;

        tracing::debug!(method = %req.method(), %url, "sending request");
        stream
            .write_all(&encode_request(req))
            .await
            .map_err(Error::Send)?;

        let resp = self.receive(&mut stream).await?;
        tracing::debug!(
            status = resp.status_code(),
            body_len = resp.body().len(),
            "response received"
        );

        Ok(resp)
    }

    // Tries every resolved address in order.
    async fn connect(url: &Url) -> Result<TcpStream, Error> {
        let target = format!("{}:{}", url.host(), url.port());

        let addrs = lookup_host(&target).await.map_err(|source| Error::Resolve {
            host: url.host().to_owned(),
            source,
        })?;

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect(addr).await {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    tracing::trace!(%addr, error = %e, "connect attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(Error::Connect {
            target,
            source: last_error.unwrap_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
            }),
        })
    }

    async fn receive(&self, stream: &mut TcpStream) -> Result<Response, Error> {
        let mut parser = ResponseParser::new();
        let mut chunk = vec![0; self.limits.read_chunk_size.max(1)];

        loop {
            match stream.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => {
                    if parser.feed(&chunk[..n])? {
                        break;
                    }
                }
                // Once framed, a broken read ends the body like a close would
                Err(e) if parser.has_head() => {
                    tracing::debug!(error = %e, "read failed after response head");
                    break;
                }
                Err(e) => return Err(Error::Receive(e)),
            }
        }

        parser.finish()
    }
}
