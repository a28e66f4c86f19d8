//! Starts an echo service on a free port, talks to it with the client, then
//! shuts it down.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wire_http::{Client, Method, Request, Response, Server, Url};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wire_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut server = Server::builder()
        .port(0)
        .multithreaded(true)
        .route("/echo", Method::Post, |req: &Request| {
            let content_type = req.header("content-type").unwrap_or("text/plain");

            Ok(Response::new(200, req.body().to_vec()).with_header("Content-Type", content_type))
        })
        .route("/url", Method::Get, |req: &Request| {
            let pairs: Vec<String> = req
                .url()
                .query_pairs()
                .into_iter()
                .map(|(k, v)| format!("{k:?}: {v:?}"))
                .collect();

            Ok(Response::new(
                200,
                format!(r#"{{"path": {:?}, "query": {{{}}}}}"#, req.url().path(), pairs.join(", ")),
            )
            .with_header("Content-Type", "application/json"))
        })
        .build();

    server.start()?;
    let addr = server.local_addr().ok_or("server has no address")?;

    let server = Arc::new(server);
    let running = tokio::spawn({
        let server = server.clone();
        async move { server.run().await }
    });

    let client = Client::new();

    let resp = client
        .post_with_type(&format!("http://{addr}/echo"), r#"{"a":1}"#, "application/json")
        .await?;
    println!("{} {}: {}", resp.status_code(), resp.status_text(), resp.body_text());

    let req = Request::new(Method::Get, Url::parse(&format!("http://{addr}/url?name=echo&x"))?);
    let resp = client.async_send(req).await?;
    println!("{} {}: {}", resp.status_code(), resp.status_text(), resp.body_text());

    let resp = client.get(&format!("http://{addr}/missing")).await?;
    println!("{} {}: {}", resp.status_code(), resp.status_text(), resp.body_text());

    server.stop();
    running.await??;

    Ok(())
}
