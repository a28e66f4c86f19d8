use crate::{
    http::codec::parse_request,
    limits::ConnLimits,
    server::server_impl::Route,
    Request, Response,
};
use std::{
    any::Any,
    net::SocketAddr,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};
use tokio::{io::AsyncReadExt, net::TcpStream, task, time::timeout};

/// Serves one request per connection: read once, dispatch, write, close.
///
/// The read buffer is allocated once and reused for every connection the
/// owner (the accept loop or a worker) hands over.
pub(crate) struct HttpConnection {
    routes: Arc<Vec<Route>>,
    buffer: Vec<u8>,
    limits: ConnLimits,
    // Handlers run on the blocking pool instead of the async worker thread
    offload: bool,
}

impl HttpConnection {
    #[inline]
    pub(crate) fn new(routes: Arc<Vec<Route>>, limits: ConnLimits) -> Self {
        Self {
            routes,
            buffer: vec![0; limits.read_buffer_size.max(1)],
            limits,
            offload: false,
        }
    }

    /// Connection for a pool worker: handlers are synchronous and may block,
    /// so each one runs through [`tokio::task::spawn_blocking`] and the worker
    /// only awaits its result.
    #[inline]
    pub(crate) fn pooled(routes: Arc<Vec<Route>>, limits: ConnLimits) -> Self {
        Self {
            offload: true,
            ..Self::new(routes, limits)
        }
    }

    pub(crate) async fn serve(&mut self, mut stream: TcpStream, addr: SocketAddr) {
        let read = timeout(self.limits.socket_read_timeout, stream.read(&mut self.buffer)).await;

        let len = match read {
            Ok(Ok(0)) => return,
            Ok(Ok(len)) => len,
            Ok(Err(e)) => {
                tracing::debug!(%addr, error = %e, "failed to read request");
                return;
            }
            Err(_) => {
                tracing::debug!(%addr, "request read timed out");
                return;
            }
        };

        let response = match self.offload {
            true => self.respond_blocking(len).await,
            false => self.respond(&self.buffer[..len]),
        };

        if let Err(e) =
            writer::write_response(&mut stream, &response, self.limits.socket_write_timeout).await
        {
            tracing::debug!(%addr, error = %e, "failed to write response");
        }
        writer::close(&mut stream).await;
    }

    /// Turns the raw bytes of one read into the response to send back.
    #[inline]
    pub(crate) fn respond(&self, raw: &[u8]) -> Response {
        respond(&self.routes, raw)
    }

    async fn respond_blocking(&self, len: usize) -> Response {
        let routes = self.routes.clone();
        let raw = self.buffer[..len].to_vec();

        match task::spawn_blocking(move || respond(&routes, &raw)).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "handler task failed");
                Response::new(500, format!("Error: {e}"))
            }
        }
    }
}

fn respond(routes: &[Route], raw: &[u8]) -> Response {
    let request = match parse_request(raw) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(error = %e, "unparsable request");
            return not_found();
        }
    };

    let method = request.method();
    let path = request.url().path();

    match routes.iter().find(|route| route.matches(method, path)) {
        Some(route) => dispatch(route, &request),
        None => {
            tracing::debug!(%method, path, "no route");
            not_found()
        }
    }
}

#[inline]
fn not_found() -> Response {
    Response::new(404, "Not Found")
}

// Handler failures, returned or panicked, become a 500 carrying the message.
fn dispatch(route: &Route, request: &Request) -> Response {
    match panic::catch_unwind(AssertUnwindSafe(|| route.call(request))) {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            tracing::warn!(path = route.path(), error = %e, "handler returned an error");
            Response::new(500, format!("Error: {e}"))
        }
        Err(payload) => {
            let reason = panic_message(&*payload);
            tracing::warn!(path = route.path(), reason, "handler panicked");
            Response::new(500, format!("Error: {reason}"))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "handler panicked"
    }
}

pub(crate) mod writer {
    use crate::{http::codec::encode_response, Response};
    use std::{io, time::Duration};
    use tokio::{io::AsyncWriteExt, net::TcpStream, time::timeout};

    #[inline]
    pub(crate) async fn write_response(
        stream: &mut TcpStream,
        response: &Response,
        time: Duration,
    ) -> Result<(), io::Error> {
        timeout(time, stream.write_all(&encode_response(response))).await?
    }

    /// Best effort, the socket is dropped right after either way.
    #[inline]
    pub(crate) async fn close(stream: &mut TcpStream) {
        let _ = stream.shutdown().await;
    }
}
