//! Streaming HTTP transport over reqwest.
//!
//! Both endpoints take a JSON POST body. The response body is handed to the
//! receivers unparsed, one network read per item; dropping the stream
//! aborts the request.

use crate::config::FileEndpointConfig;
use async_trait::async_trait;
use futures::StreamExt;
use murmur_application::{ByteStream, StreamTransport, TokenProvider, TransportError};
use murmur_domain::{ChunkedRequestBody, EventStreamRequestBody};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Header carrying a per-request UUID for server-side correlation.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Longest error body kept in [`TransportError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// [`StreamTransport`] over HTTP.
pub struct HttpStreamTransport {
    client: reqwest::Client,
    sse_url: String,
    chunked_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl HttpStreamTransport {
    pub fn new(
        endpoint: &FileEndpointConfig,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(endpoint.connect_timeout_secs.max(1)))
            .build()
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            sse_url: endpoint.sse_url(),
            chunked_url: endpoint.chunked_url(),
            tokens,
        })
    }

    async fn post<B>(&self, url: &str, body: &B, accept: &str) -> Result<ByteStream, TransportError>
    where
        B: Serialize + Sync,
    {
        let request_id = uuid::Uuid::new_v4().to_string();
        let mut request = self
            .client
            .post(url)
            .header(ACCEPT, accept)
            .header(REQUEST_ID_HEADER, &request_id)
            .json(body);
        if let Some(token) = self.tokens.token() {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        debug!("POST {} ({})", url, request_id);
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            let body: String = body.chars().take(MAX_ERROR_BODY).collect();
            warn!("{} returned HTTP {} ({})", url, status.as_u16(), request_id);
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::Read(e.to_string())))
            .boxed())
    }
}

#[async_trait]
impl StreamTransport for HttpStreamTransport {
    async fn open_event_stream(
        &self,
        body: &EventStreamRequestBody,
    ) -> Result<ByteStream, TransportError> {
        self.post(&self.sse_url, body, "text/event-stream").await
    }

    async fn open_chunked(&self, body: &ChunkedRequestBody) -> Result<ByteStream, TransportError> {
        self.post(&self.chunked_url, body, "*/*").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_application::{NoToken, StaticToken};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one request with `response`, returning the raw request text.
    async fn serve_once(response: String) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let length = text[..header_end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if raw.len() >= header_end + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&raw).to_string()
        });
        (base_url, handle)
    }

    fn ok_response(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        )
    }

    fn endpoint(base_url: String) -> FileEndpointConfig {
        FileEndpointConfig {
            base_url,
            ..Default::default()
        }
    }

    async fn collect(mut stream: ByteStream) -> String {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn test_event_stream_request_and_body() {
        let frame = "data: {\"type\":\"turnComplete\"}\n\n";
        let (base_url, server) = serve_once(ok_response(frame)).await;
        let transport =
            HttpStreamTransport::new(&endpoint(base_url), Arc::new(StaticToken::new("s3cret")))
                .unwrap();

        let body = EventStreamRequestBody::new("Hello")
            .with_system_instruction(Some("Be brief".to_string()));
        let stream = transport.open_event_stream(&body).await.unwrap();
        assert_eq!(collect(stream).await, frame);

        let request = server.await.unwrap();
        let lower = request.to_ascii_lowercase();
        assert!(request.starts_with("POST /api/chat/stream "));
        assert!(lower.contains("authorization: bearer s3cret"));
        assert!(lower.contains("x-request-id: "));
        assert!(lower.contains("accept: text/event-stream"));
        assert!(request.contains("\"message\":\"Hello\""));
        assert!(request.contains("\"systemInstruction\":\"Be brief\""));
    }

    #[tokio::test]
    async fn test_chunked_request_without_token() {
        let (base_url, server) = serve_once(ok_response("")).await;
        let transport = HttpStreamTransport::new(&endpoint(base_url), Arc::new(NoToken)).unwrap();

        let stream = transport
            .open_chunked(&ChunkedRequestBody::text("ping"))
            .await
            .unwrap();
        assert_eq!(collect(stream).await, "");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/chat/chunked "));
        assert!(!request.to_ascii_lowercase().contains("authorization:"));
        assert!(request.contains("\"type\":\"text\""));
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let body = "rate limited";
        let response = format!(
            "HTTP/1.1 429 Too Many Requests\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let (base_url, _server) = serve_once(response).await;
        let transport = HttpStreamTransport::new(&endpoint(base_url), Arc::new(NoToken)).unwrap();

        let err = transport
            .open_event_stream(&EventStreamRequestBody::new("Hi"))
            .await
            .err()
            .unwrap();
        assert_eq!(
            err,
            TransportError::Status {
                status: 429,
                body: "rate limited".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let transport = HttpStreamTransport::new(&endpoint(base_url), Arc::new(NoToken)).unwrap();
        let err = transport
            .open_event_stream(&EventStreamRequestBody::new("Hi"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TransportError::Connection(_)));
    }
}
