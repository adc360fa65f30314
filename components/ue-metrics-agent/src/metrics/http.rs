// External crates
use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode,
    body::Incoming,
    header::{CONTENT_TYPE, HeaderValue},
    service::service_fn,
};
use hyper_util::{rt::TokioExecutor, rt::TokioIo, server::conn::auto::Builder as HyperServerBuilder};
use prometheus::{Encoder, TextEncoder};
use std::{convert::Infallible, net::SocketAddr};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

fn metrics_response() -> Response<Full<Bytes>> {
    tracing::debug!("Collecting all registered prometheus metrics");
    let metric_families = prometheus::gather();

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode prometheus metrics");
        let mut response = Response::new(Full::new(Bytes::from_static(b"encoding error")));
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        return response;
    }

    let mut response = Response::new(Full::new(Bytes::from(buffer)));
    if let Ok(content_type) = HeaderValue::from_str(encoder.format_type()) {
        response.headers_mut().insert(CONTENT_TYPE, content_type);
    }
    response
}

async fn route(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => Ok(metrics_response()),
        _ => {
            let mut not_found = Response::new(Full::new(Bytes::from_static(b"Not Found")));
            *not_found.status_mut() = StatusCode::NOT_FOUND;
            Ok(not_found)
        }
    }
}

pub async fn bind_metrics_listener(addr: &str) -> Result<TcpListener> {
    let addr: SocketAddr = addr
        .parse()
        .with_context(|| format!("Invalid metrics listen address {addr}"))?;
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind metrics endpoint on {addr}"))
}

/// Serve `/metrics` on `listener` until `shutdown` is cancelled.
#[instrument(
    name = "ue_metrics_server::serve",
    target = "metrics::http",
    skip_all,
    level = "debug"
)]
pub async fn serve_metrics(listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
    let local_addr = listener.local_addr()?;
    tracing::info!(
        metrics_endpoint = %local_addr,
        "Agent metrics available at http://{local_addr}/metrics"
    );

    loop {
        let (stream, _) = tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::debug!("Metrics endpoint shutting down");
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to accept metrics connection");
                    continue;
                }
            },
        };

        let io = TokioIo::new(stream);
        tokio::spawn(async move {
            if let Err(err) = HyperServerBuilder::new(TokioExecutor::new())
                .serve_connection(io, service_fn(route))
                .await
            {
                tracing::error!(error = %err, "Metrics endpoint connection error");
            }
        });
    }
}
