//! wire_http - small HTTP/1.x client and routing server over plain TCP
//!
//! The crate speaks just enough HTTP/1.1 to exchange one request and one
//! response per connection:
//!
//! - [`Client`]: async and blocking requests against `http://host:port/path`
//!   URLs, responses framed by `Content-Length` or by connection close
//! - [`Server`]: exact-match routing of `(method, path)` to closure handlers,
//!   served inline or by a pool of worker tasks
//! - [`codec`]: the wire format both sides share
//!
//! # Protocol Support
//!
//! - **HTTP/1.1** and **HTTP/1.0** request and status lines
//! - `Transfer-Encoding: chunked` is detected but not decoded, see
//!   [`Response::is_chunked`]
//! - No TLS, no keep-alive, no redirects, no compression
//!
//! # Examples
//!
//! Server:
//! ```no_run
//! use wire_http::{Method, Response, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), wire_http::Error> {
//!     let mut server = Server::builder()
//!         .port(8080)
//!         .route("/test", Method::Get, |_| Ok(Response::new(200, "ok")))
//!         .route("/fail", Method::Get, |_| Err("not today".into()))
//!         .build();
//!
//!     server.start()?;
//!     server.run().await
//! }
//! ```
//! Client:
//! ```no_run
//! use wire_http::{Client, Method, Request, Url};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), wire_http::Error> {
//! let client = Client::new();
//!
//! let resp = client.get("http://127.0.0.1:8080/test").await?;
//! assert_eq!(resp.body_text(), "ok");
//!
//! let req = Request::new(Method::Put, Url::parse("http://127.0.0.1:8080/item?id=7")?)
//!     .with_header("Content-Type", "application/json")
//!     .with_body(r#"{"name":"x"}"#)
//!     .with_timeout(Duration::from_secs(5));
//! let resp = client.async_send(req).await?;
//! println!("{} {}", resp.status_code(), resp.status_text());
//! # Ok(())
//! # }
//! ```
//!
//! # Logging
//!
//! Events are emitted through [`tracing`]; install any subscriber to see them.
//! Lifecycle events are `info`, handler failures `warn`, per-exchange details
//! `debug` and `trace`.

pub(crate) mod http {
    pub mod codec;
    pub(crate) mod headers;
    pub mod query;
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod types;
    pub(crate) mod url;
}
pub(crate) mod server {
    pub(crate) mod connection;
    pub(crate) mod server_impl;
}
pub(crate) mod client;
pub(crate) mod errors;
pub mod limits;

pub use crate::{
    client::Client,
    errors::{Error, HandlerError, HandlerResult, Result},
    http::{
        codec,
        headers::Headers,
        query,
        request::Request,
        response::Response,
        types::{reason_phrase, Method},
        url::Url,
    },
    server::server_impl::{Route, Server, ServerBuilder, ServerConfig, State},
};
