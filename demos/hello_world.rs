use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wire_http::{Method, Response, Server};

#[tokio::main]
async fn main() -> Result<(), wire_http::Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wire_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut server = Server::builder()
        .port(8080)
        .route("/", Method::Get, |_| Ok(Response::new(200, "Hello, world!")))
        .build();

    server.start()?;
    server.run().await
}
