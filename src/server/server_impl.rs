use crate::{
    errors::{Error, HandlerResult},
    limits::{ConnLimits, ServerLimits, WaitStrategy},
    server::connection::{writer, HttpConnection},
    Method, Request, Response,
};
use crossbeam::queue::SegQueue;
use socket2::{Domain, Protocol, Socket, Type};
use std::{
    fmt, io,
    net::{Ipv4Addr, SocketAddr},
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::watch,
    task::{yield_now, JoinSet},
    time::sleep as tokio_sleep,
};

type Handler = dyn Fn(&Request) -> HandlerResult + Send + Sync + 'static;
type TcpQueue = Arc<SegQueue<(TcpStream, SocketAddr)>>;

/// A registered `(path, method)` pair and its handler.
///
/// Matching is exact: the method must be equal and the request path (query
/// excluded) must be byte-for-byte identical to `path`.
#[derive(Clone)]
pub struct Route {
    path: String,
    method: Method,
    handler: Arc<Handler>,
}

impl Route {
    pub fn new<F>(path: impl Into<String>, method: Method, handler: F) -> Self
    where
        F: Fn(&Request) -> HandlerResult + Send + Sync + 'static,
    {
        Self {
            path: path.into(),
            method,
            handler: Arc::new(handler),
        }
    }

    #[inline(always)]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline(always)]
    pub fn method(&self) -> Method {
        self.method
    }

    #[inline(always)]
    pub(crate) fn matches(&self, method: Method, path: &str) -> bool {
        self.method == method && self.path == path
    }

    #[inline(always)]
    pub(crate) fn call(&self, request: &Request) -> HandlerResult {
        (self.handler)(request)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("path", &self.path)
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

/// Lifecycle of a [`Server`].
///
/// ```text
/// Created --start()--> Started --run()--> Running
///    |                    |                  |
///    \----------------- stop() --------------/--> Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum State {
    Created = 0,
    Started = 1,
    Running = 2,
    Stopped = 3,
}

impl State {
    #[inline(always)]
    fn from_u8(value: u8) -> Self {
        match value {
            0 => State::Created,
            1 => State::Started,
            2 => State::Running,
            _ => State::Stopped,
        }
    }
}

/// Server settings.
///
/// # Examples
/// ```
/// use wire_http::ServerConfig;
///
/// let config = ServerConfig {
///     port: 3000,
///     multithreaded: true,
///     ..ServerConfig::default()
/// };
/// assert_eq!(config.server_limits.max_connections, 100);
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port to listen on, `0` picks a free one (default: `8080`).
    pub port: u16,

    /// Serve connections from a pool of worker tasks instead of inline in
    /// the accept loop (default: `false`).
    pub multithreaded: bool,

    pub server_limits: ServerLimits,
    pub conn_limits: ConnLimits,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            multithreaded: false,
            server_limits: ServerLimits::default(),
            conn_limits: ConnLimits::default(),

            _priv: (),
        }
    }
}

struct Shared {
    state: AtomicU8,
    shutdown: watch::Sender<bool>,
}

impl Shared {
    #[inline(always)]
    fn state(&self) -> State {
        State::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    fn transition(&self, from: State, to: State) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    // Returns the state before the call.
    #[inline]
    fn shut_down(&self) -> State {
        let previous = self.state.swap(State::Stopped as u8, Ordering::AcqRel);
        self.shutdown.send_replace(true);

        State::from_u8(previous)
    }
}

/// Routing HTTP server.
///
/// Requests are matched against the registered routes in registration order;
/// the first route with the same method and exact path handles the request.
/// Unmatched or unparsable requests get `404 Not Found`, a handler that
/// returns an error or panics yields `500 Internal Server Error` with body
/// `Error: <message>`.
///
/// Each connection carries exactly one request: the server reads once,
/// answers and closes.
///
/// # Examples
///
/// ```no_run
/// use wire_http::{Method, Response, Server};
///
/// #[tokio::main]
/// async fn main() -> Result<(), wire_http::Error> {
///     let mut server = Server::builder()
///         .port(8080)
///         .route("/test", Method::Get, |_| Ok(Response::new(200, "ok")))
///         .route("/echo", Method::Post, |req| {
///             Ok(Response::new(200, req.body().to_vec())
///                 .with_header("Content-Type", "application/json"))
///         })
///         .build();
///
///     server.start()?;
///     server.run().await
/// }
/// ```
///
/// [`run`](Server::run) and [`stop`](Server::stop) take `&self`, so a server
/// shared through an [`Arc`] can be stopped from another task:
///
/// ```no_run
/// use std::sync::Arc;
/// use wire_http::{Server, ServerConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), wire_http::Error> {
/// let mut server = Server::new(ServerConfig { port: 0, ..ServerConfig::default() });
/// server.start()?;
///
/// let server = Arc::new(server);
/// let running = tokio::spawn({
///     let server = server.clone();
///     async move { server.run().await }
/// });
///
/// server.stop();
/// running.await.unwrap()?;
/// # Ok(())
/// # }
/// ```
pub struct Server {
    config: ServerConfig,
    routes: Arc<Vec<Route>>,
    shared: Shared,
    listener: Mutex<Option<TcpListener>>,
    local_addr: Option<SocketAddr>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown, _) = watch::channel(false);

        Self {
            config,
            routes: Arc::new(Vec::new()),
            shared: Shared {
                state: AtomicU8::new(State::Created as u8),
                shutdown,
            },
            listener: Mutex::new(None),
            local_addr: None,
        }
    }

    /// Creates a new builder for configuring the server instance.
    #[inline]
    pub fn builder() -> ServerBuilder {
        ServerBuilder {
            config: ServerConfig::default(),
            routes: Vec::new(),
        }
    }
}

// Public API
impl Server {
    /// Registers `handler` for requests with `method` and exactly `path`.
    ///
    /// Routes must be registered before [`run`](Server::run); when two routes
    /// match, the one registered first wins.
    pub fn route<F>(&mut self, path: &str, method: Method, handler: F) -> &mut Self
    where
        F: Fn(&Request) -> HandlerResult + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.routes).push(Route::new(path, method, handler));
        self
    }

    #[inline]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    #[inline(always)]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    #[inline]
    pub fn state(&self) -> State {
        self.shared.state()
    }

    /// Address the listener is bound to, once [`start`](Server::start)
    /// succeeded.
    #[inline(always)]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Creates the listening socket on `127.0.0.1:port` with address reuse
    /// enabled.
    ///
    /// # Errors
    /// - [`Error::InvalidState`] unless the server was just created
    /// - [`Error::Socket`], [`Error::Bind`], [`Error::Listen`] from the
    ///   corresponding socket calls
    ///
    /// # Panics
    /// Outside of a Tokio runtime with I/O enabled.
    pub fn start(&mut self) -> Result<(), Error> {
        if self.shared.state() != State::Created {
            return Err(Error::InvalidState("start"));
        }

        let port = self.config.port;
        let listener = Self::bind(port, self.config.server_limits.backlog)?;
        let local_addr = listener.local_addr().map_err(Error::Listen)?;

        if !self.shared.transition(State::Created, State::Started) {
            return Err(Error::InvalidState("start"));
        }

        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = Some(listener);
        self.local_addr = Some(local_addr);

        tracing::info!(
            address = %local_addr,
            multithreaded = self.config.multithreaded,
            routes = self.routes.len(),
            "server started"
        );

        Ok(())
    }

    /// Accepts and serves connections until [`stop`](Server::stop) is called.
    ///
    /// In multithreaded mode `max_connections` worker tasks are spawned and
    /// joined before this returns, so every accepted connection is answered.
    ///
    /// # Errors
    /// - [`Error::InvalidState`] unless [`start`](Server::start) succeeded and
    ///   `run` was not called yet
    /// - [`Error::Listen`] if accepting fails for good
    pub async fn run(&self) -> Result<(), Error> {
        if !self.shared.transition(State::Started, State::Running) {
            return Err(Error::InvalidState("run"));
        }

        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(listener) = listener else {
            return Err(Error::InvalidState("run"));
        };

        tracing::info!(address = ?self.local_addr, "server running");

        let result = match self.config.multithreaded {
            true => self.accept_pooled(&listener).await,
            false => self.accept_inline(&listener).await,
        };

        drop(listener);
        self.shared.shut_down();
        tracing::info!(address = ?self.local_addr, "server stopped");

        result
    }

    /// Ends [`run`](Server::run) and releases the listening socket.
    ///
    /// Connections already accepted are still answered. Calling it again, or
    /// on a server that never started, only marks it stopped.
    pub fn stop(&self) {
        let previous = self.shared.shut_down();

        // Still parked here when `run` was never called
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(listener);

        if matches!(previous, State::Started | State::Running) {
            tracing::info!(address = ?self.local_addr, "server stop requested");
        }
    }
}

impl Server {
    fn bind(port: u16, backlog: i32) -> Result<TcpListener, Error> {
        let socket =
            Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP)).map_err(Error::Socket)?;
        socket.set_reuse_address(true).map_err(Error::Socket)?;

        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        socket
            .bind(&addr.into())
            .map_err(|source| Error::Bind { port, source })?;

        socket.listen(backlog).map_err(Error::Listen)?;
        socket.set_nonblocking(true).map_err(Error::Listen)?;

        TcpListener::from_std(socket.into()).map_err(Error::Listen)
    }

    // Next connection, or `None` once stopped or the listener broke for good.
    async fn accept(
        listener: &TcpListener,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<Result<(TcpStream, SocketAddr), io::Error>> {
        loop {
            if *shutdown.borrow() {
                return None;
            }

            let accepted = tokio::select! {
                biased;

                _ = shutdown.changed() => return None,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok(value) => return Some(Ok(value)),
                Err(e) if is_fatal(&e) => {
                    tracing::error!(error = %e, "accept failed, stopping");
                    return Some(Err(e));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    tokio_sleep(Duration::from_millis(1)).await;
                }
            }
        }
    }

    async fn accept_inline(&self, listener: &TcpListener) -> Result<(), Error> {
        let mut shutdown = self.shared.shutdown.subscribe();
        let mut conn = HttpConnection::new(self.routes.clone(), self.config.conn_limits.clone());

        while let Some(accepted) = Self::accept(listener, &mut shutdown).await {
            let (stream, addr) = accepted.map_err(Error::Listen)?;

            tracing::debug!(%addr, "connection accepted");
            conn.serve(stream, addr).await;
        }

        Ok(())
    }

    async fn accept_pooled(&self, listener: &TcpListener) -> Result<(), Error> {
        let limits = &self.config.server_limits;
        let mut shutdown = self.shared.shutdown.subscribe();

        let queue: TcpQueue = Arc::new(SegQueue::new());
        let mut workers = JoinSet::new();

        for _ in 0..limits.max_connections.max(1) {
            let conn = HttpConnection::pooled(self.routes.clone(), self.config.conn_limits.clone());

            workers.spawn(Self::worker(
                queue.clone(),
                conn,
                limits.wait_strategy.clone(),
                self.shared.shutdown.subscribe(),
            ));
        }

        let mut result = Ok(());
        while let Some(accepted) = Self::accept(listener, &mut shutdown).await {
            let (stream, addr) = match accepted {
                Ok(value) => value,
                Err(e) => {
                    result = Err(Error::Listen(e));
                    break;
                }
            };

            tracing::debug!(%addr, "connection accepted");
            match queue.len() < limits.max_pending_connections {
                true => queue.push((stream, addr)),
                false => {
                    tracing::warn!(%addr, "connection queue full, answering 503");
                    // Joined with the workers so no answer outlives `run`
                    workers.spawn(Self::reject(
                        stream,
                        self.config.conn_limits.socket_write_timeout,
                    ));
                }
            }
        }

        // Workers drain the queue and exit once they see the shutdown
        self.shared.shut_down();
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "worker task failed");
            }
        }

        result
    }

    async fn worker(
        queue: TcpQueue,
        mut conn: HttpConnection,
        wait: WaitStrategy,
        shutdown: watch::Receiver<bool>,
    ) {
        loop {
            if let Some((stream, addr)) = queue.pop() {
                conn.serve(stream, addr).await;
                continue;
            }

            if *shutdown.borrow() {
                break;
            }

            match wait {
                WaitStrategy::Yield => yield_now().await,
                WaitStrategy::Sleep(time) => tokio_sleep(time).await,
            }
        }
    }

    async fn reject(mut stream: TcpStream, write_timeout: Duration) {
        let response = Response::new(503, "Service Unavailable");

        let _ = writer::write_response(&mut stream, &response, write_timeout).await;
        writer::close(&mut stream).await;
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("routes", &self.routes)
            .field("state", &self.state())
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}

// Errors that will not go away by accepting again, i.e. the listening socket
// itself is broken. Anything else is about one connection or a passing
// resource shortage, and the loop keeps accepting.
#[inline]
fn is_fatal(e: &io::Error) -> bool {
    #[cfg(unix)]
    if let Some(code) = e.raw_os_error() {
        return matches!(code, libc::EBADF | libc::EINVAL | libc::ENOTSOCK);
    }

    e.kind() == io::ErrorKind::InvalidInput
}

//

/// Builder for configuring and creating [`Server`] instances.
///
/// # Examples
///
/// ```no_run
/// use wire_http::{limits::ServerLimits, Method, Response, Server};
///
/// let server = Server::builder()
///     .port(3000)
///     .multithreaded(true)
///     .server_limits(ServerLimits {
///         max_connections: 8,
///         ..ServerLimits::default() // Required line
///     })
///     .route("/health", Method::Get, |_| Ok(Response::new(200, "up")))
///     .build();
/// ```
#[derive(Debug)]
pub struct ServerBuilder {
    config: ServerConfig,
    routes: Vec<Route>,
}

impl ServerBuilder {
    #[inline(always)]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    #[inline(always)]
    pub fn multithreaded(mut self, multithreaded: bool) -> Self {
        self.config.multithreaded = multithreaded;
        self
    }

    #[inline(always)]
    pub fn server_limits(mut self, limits: ServerLimits) -> Self {
        self.config.server_limits = limits;
        self
    }

    #[inline(always)]
    pub fn connection_limits(mut self, limits: ConnLimits) -> Self {
        self.config.conn_limits = limits;
        self
    }

    /// See [`Server::route`].
    #[inline]
    pub fn route<F>(mut self, path: &str, method: Method, handler: F) -> Self
    where
        F: Fn(&Request) -> HandlerResult + Send + Sync + 'static,
    {
        self.routes.push(Route::new(path, method, handler));
        self
    }

    #[inline]
    pub fn build(self) -> Server {
        let mut server = Server::new(self.config);
        server.routes = Arc::new(self.routes);
        server
    }
}
