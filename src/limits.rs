//! Server, connection and client limits and timeouts
//!
//! Every struct carries documented defaults and a hidden `_priv` field, so new
//! settings can be added without breaking callers. Always finish a literal
//! with `..Default::default()`.
//!
//! # Examples
//!
//! ```no_run
//! use wire_http::{Server, limits::{ConnLimits, ServerLimits}};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), wire_http::Error> {
//! let mut server = Server::builder()
//!     .port(8080)
//!     .multithreaded(true)
//!     .server_limits(ServerLimits {
//!         max_connections: 16,
//!         ..ServerLimits::default()
//!     })
//!     .connection_limits(ConnLimits {
//!         socket_read_timeout: Duration::from_secs(5),
//!         ..ConnLimits::default()
//!     })
//!     .build();
//!
//! server.start()?;
//! server.run().await
//! # }
//! ```

use std::time::Duration;

/// Controls the accept loop and, in multithreaded mode, the worker pool.
///
/// # Connection management (multithreaded mode)
/// ```text
///                            [------------]
///                            [ Tcp accept ]
///                            [------------]
///                                  ||
///                                  || TCP_STREAM
///                                  \/
/// [--------------]   Yes   /----------------\   No   [-------------]
/// [ Add to queue ] <====== | Queue has room? | ====> [ Sending 503 ]
/// [--------------]         \----------------/        [-------------]
///        ||
///        \==================\\          //====================\
///                            V          V                    ||
/// [--------]   Yes   /--------------------------\   No   [------]
/// [ Worker ] <====== | Is there a free worker?  | =====> [ Wait ]
/// [--------]         \--------------------------/        [------]
/// ```
///
/// Workers are created once when [`Server::run`](crate::Server::run) starts and
/// are joined before it returns. In single-threaded mode none of the pool
/// settings apply: each connection is served inline by the accept loop.
#[derive(Debug, Clone)]
pub struct ServerLimits {
    /// Number of worker tasks in multithreaded mode (default: `100`).
    pub max_connections: usize,

    /// Maximum number of accepted connections waiting for a worker
    /// (default: `250`).
    ///
    /// Connections accepted while the queue is full are answered with
    /// `503 Service Unavailable` and closed.
    pub max_pending_connections: usize,

    /// How idle workers wait for the queue (default: `Sleep(50µs)`).
    pub wait_strategy: WaitStrategy,

    /// `listen(2)` backlog of the listening socket (default: `10`).
    pub backlog: i32,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ServerLimits {
    fn default() -> Self {
        Self {
            max_connections: 100,
            max_pending_connections: 250,
            wait_strategy: WaitStrategy::Sleep(Duration::from_micros(50)),
            backlog: 10,

            _priv: (),
        }
    }
}

/// Strategy for worker task waiting when no connections are available
#[derive(Debug, Clone)]
pub enum WaitStrategy {
    /// While waiting, uses [`tokio::task::yield_now()`]
    ///
    /// Keeps latency lowest at the price of a busy CPU.
    Yield,

    /// While waiting, uses [`tokio::time::sleep()`]
    Sleep(Duration),
}

/// Per-connection settings on the server side.
#[derive(Debug, Clone)]
pub struct ConnLimits {
    /// Size of the buffer the request is read into (default: `8192`).
    ///
    /// A request is read with a single read call, so anything past this size
    /// is never seen by the parser.
    pub read_buffer_size: usize,

    /// Time allowed for the request to arrive (default: `2s`).
    pub socket_read_timeout: Duration,

    /// Time allowed for the response to be written (default: `3s`).
    pub socket_write_timeout: Duration,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ConnLimits {
    #[inline(always)]
    fn default() -> Self {
        Self {
            read_buffer_size: 8192,
            socket_read_timeout: Duration::from_secs(2),
            socket_write_timeout: Duration::from_secs(3),

            _priv: (),
        }
    }
}

/// Client side settings.
///
/// The time budget of an exchange belongs to each
/// [`Request`](crate::Request::timeout), not to the client.
#[derive(Debug, Clone)]
pub struct ClientLimits {
    /// Size of each read from the socket while a response arrives
    /// (default: `4096`).
    pub read_chunk_size: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ClientLimits {
    fn default() -> Self {
        Self {
            read_chunk_size: 4096,

            _priv: (),
        }
    }
}
