//! Endpoint server for exposing metrics and health checks
//!
//! `GET /metrics` serves the Prometheus text format, `GET /health` a JSON
//! body with the tracker's last observed ordinal (informational only).

use crate::metrics::metrics;
use crate::sequence::SequenceTracker;
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    counter: String,
    last_observed_ordinal: Option<u64>,
    subscriptions: usize,
}

/// Start the endpoint server on `port`; runs until the listener fails
pub async fn endpoint_server(port: u16, tracker: Arc<SequenceTracker>) -> Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    serve(listener, tracker).await
}

pub async fn serve(listener: TcpListener, tracker: Arc<SequenceTracker>) -> Result<()> {
    tracing::info!(addr = %listener.local_addr()?, "Metrics endpoint listening");

    loop {
        match listener.accept().await {
            Ok((mut socket, _)) => {
                let tracker = Arc::clone(&tracker);
                tokio::spawn(async move {
                    let mut buf = [0; 1024];
                    match socket.read(&mut buf).await {
                        Ok(n) => {
                            let response = respond(&buf[..n], &tracker);
                            if let Err(e) = socket.write_all(response.as_bytes()).await {
                                tracing::debug!(error = %e, "Failed to write response");
                            }
                        }
                        Err(e) => {
                            tracing::error!("Failed to read from socket: {}", e);
                        }
                    }
                });
            }
            Err(e) => {
                tracing::error!("Failed to accept connection: {}", e);
            }
        }
    }
}

fn respond(request: &[u8], tracker: &SequenceTracker) -> String {
    let request = String::from_utf8_lossy(request);
    let path = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/");

    match path {
        "/metrics" => http(200, "text/plain; version=0.0.4", &metrics().render()),
        "/health" => {
            let body = HealthBody {
                status: "ok",
                counter: tracker.counter_address().to_string(),
                last_observed_ordinal: tracker.last_observed(),
                subscriptions: tracker.subscription_count(),
            };
            let json = serde_json::to_string(&body).unwrap_or_else(|_| "{}".to_string());
            http(200, "application/json", &json)
        }
        _ => http(404, "text/plain", "not found"),
    }
}

fn http(status: u16, content_type: &str, body: &str) -> String {
    let reason = if status == 200 { "OK" } else { "Not Found" };
    format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::TrackerConfig;
    use crate::test_utils::MockLedger;
    use tokio::net::TcpStream;

    async fn get(addr: std::net::SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n").as_bytes())
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_health_and_metrics() {
        let ledger = Arc::new(MockLedger::with_counter(12));
        let counter = ledger.counter_address();
        let tracker = Arc::new(SequenceTracker::new(ledger, counter, TrackerConfig::default()));
        tracker.fetch_current().await.unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, Arc::clone(&tracker)));

        let health = get(addr, "/health").await;
        assert!(health.starts_with("HTTP/1.1 200"));
        assert!(health.contains(r#""last_observed_ordinal":12"#));

        let metrics = get(addr, "/metrics").await;
        assert!(metrics.contains("continuum_observed_ordinal"));

        assert!(get(addr, "/nope").await.starts_with("HTTP/1.1 404"));
    }
}
