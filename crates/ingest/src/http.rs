//! reqwest-backed transport with request-level retries.
//!
//! Retries here recover a single request (connection failures, timeouts and
//! 5xx responses that carry no recovery header). Recovering a whole failed
//! transfer is the client's job.

use std::time::Duration;

use reqwest::header::HeaderMap;
use tracing::{debug, warn};
use videra_protocol::constants::{
    HEADER_ID, HEADER_MAX_REQUEST_SIZE, HEADER_OFFSET, HEADER_REQUEST_TYPE, REQUEST_TYPE_APPEND,
};
use videra_protocol::{
    AppendResponse, InitRequest, InitResponse, MasterResponse, has_recovery_header,
};

use crate::error::IngestError;
use crate::transport::{IngestTransport, TransportFuture};

/// Time allowed to establish a TCP connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Time allowed for a whole request, from sending it to reading the
/// response body. Covers a full default-size chunk on a slow link.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// HTTP transport for masters and data nodes.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    max_retries: u32,
    wait: Duration,
}

impl HttpTransport {
    /// Creates a transport retrying each request up to `max_retries` times,
    /// `wait` apart, each try bounded by [`REQUEST_TIMEOUT`].
    pub fn new(max_retries: u32, wait: Duration) -> Result<Self, IngestError> {
        Self::with_request_timeout(max_retries, wait, REQUEST_TIMEOUT)
    }

    /// Like [`new`](Self::new) with a custom per-request timeout. A server
    /// that accepts the connection and never answers fails the request once
    /// `request_timeout` elapses.
    pub fn with_request_timeout(
        max_retries: u32,
        wait: Duration,
        request_timeout: Duration,
    ) -> Result<Self, IngestError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            http,
            max_retries,
            wait,
        })
    }

    /// Sends the request built by `make`, rebuilding it for each retry.
    async fn send_with_retry<F>(&self, what: &str, make: F) -> Result<reqwest::Response, IngestError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut retry = 0;
        loop {
            match make().send().await {
                Ok(resp) if retry < self.max_retries && is_retryable_status(&resp) => {
                    warn!(
                        request = what,
                        status = resp.status().as_u16(),
                        retry = retry + 1,
                        max_retries = self.max_retries,
                        "server error, retrying request"
                    );
                }
                Ok(resp) => return Ok(resp),
                Err(e) if retry < self.max_retries && (e.is_connect() || e.is_timeout()) => {
                    warn!(
                        request = what,
                        error = %e,
                        retry = retry + 1,
                        max_retries = self.max_retries,
                        "request failed, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
            retry += 1;
            tokio::time::sleep(self.wait).await;
        }
    }
}

fn is_retryable_status(resp: &reqwest::Response) -> bool {
    let headers = resp.headers();
    resp.status().is_server_error()
        && !has_recovery_header(
            header(headers, HEADER_OFFSET).as_deref(),
            header(headers, HEADER_MAX_REQUEST_SIZE).as_deref(),
        )
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

/// Reads the body of a failure response for error messages.
async fn error_body(resp: reqwest::Response) -> String {
    if resp.status().is_success() {
        return String::new();
    }
    resp.text().await.unwrap_or_default()
}

impl IngestTransport for HttpTransport {
    fn query_master<'a>(&'a self, master: &'a str) -> TransportFuture<'a, MasterResponse> {
        Box::pin(async move {
            let resp = self
                .send_with_retry("master", || self.http.get(master))
                .await?;
            let status = resp.status().as_u16();
            let body = resp.text().await?;
            debug!(master, status, "master replied");
            Ok(MasterResponse { status, body })
        })
    }

    fn send_init<'a>(
        &'a self,
        upload_url: &'a str,
        request: &'a InitRequest,
    ) -> TransportFuture<'a, InitResponse> {
        Box::pin(async move {
            let headers = request.headers();
            let resp = self
                .send_with_retry("init", || {
                    headers
                        .iter()
                        .fold(self.http.post(upload_url), |req, (name, value)| {
                            req.header(*name, value)
                        })
                })
                .await?;

            let status = resp.status().as_u16();
            let transfer_id = header(resp.headers(), HEADER_ID);
            let max_request_size = header(resp.headers(), HEADER_MAX_REQUEST_SIZE);
            let body = error_body(resp).await;
            Ok(InitResponse {
                status,
                transfer_id,
                max_request_size,
                body,
            })
        })
    }

    fn send_append<'a>(
        &'a self,
        upload_url: &'a str,
        transfer_id: &'a str,
        offset: u64,
        data: Vec<u8>,
    ) -> TransportFuture<'a, AppendResponse> {
        Box::pin(async move {
            let offset = offset.to_string();
            let resp = self
                .send_with_retry("append", || {
                    self.http
                        .post(upload_url)
                        .header(HEADER_REQUEST_TYPE, REQUEST_TYPE_APPEND)
                        .header(HEADER_ID, transfer_id)
                        .header(HEADER_OFFSET, &offset)
                        .body(data.clone())
                })
                .await?;

            let status = resp.status().as_u16();
            let offset = header(resp.headers(), HEADER_OFFSET);
            let max_request_size = header(resp.headers(), HEADER_MAX_REQUEST_SIZE);
            let body = error_body(resp).await;
            Ok(AppendResponse {
                status,
                offset,
                max_request_size,
                body,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;
    use videra_protocol::{FileKind, GroupSizes};

    /// A request as seen by the mock server.
    #[derive(Debug)]
    struct Received {
        head: String,
        body: Vec<u8>,
    }

    impl Received {
        fn header(&self, name: &str) -> Option<&str> {
            self.head.lines().find_map(|line| {
                let (k, v) = line.split_once(':')?;
                k.trim().eq_ignore_ascii_case(name).then(|| v.trim())
            })
        }
    }

    /// Reads one HTTP/1.1 request: head up to the blank line, then
    /// `Content-Length` bytes of body.
    async fn read_request(stream: &mut TcpStream) -> Received {
        let mut buf = Vec::new();
        let mut tmp = [0u8; 4096];
        let head_end = loop {
            let n = stream.read(&mut tmp).await.unwrap();
            assert!(n > 0, "connection closed before request head");
            buf.extend_from_slice(&tmp[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
        let mut received = Received {
            head,
            body: buf[head_end..].to_vec(),
        };
        let len: usize = received
            .header("content-length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        while received.body.len() < len {
            let n = stream.read(&mut tmp).await.unwrap();
            if n == 0 {
                break;
            }
            received.body.extend_from_slice(&tmp[..n]);
        }
        received
    }

    /// Serves one canned response per connection, in order, and forwards
    /// each received request.
    async fn mock_server(
        responses: Vec<String>,
    ) -> (String, mpsc::UnboundedReceiver<Received>, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}/upload");
        let (tx, rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            for resp in responses {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let req = read_request(&mut stream).await;
                let _ = tx.send(req);
                let _ = stream.write_all(resp.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        (url, rx, handle)
    }

    fn response(status: &str, headers: &[(&str, &str)], body: &str) -> String {
        let mut resp = format!("HTTP/1.1 {status}\r\n");
        for (k, v) in headers {
            resp.push_str(&format!("{k}: {v}\r\n"));
        }
        resp.push_str(&format!(
            "Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        ));
        resp
    }

    fn transport(max_retries: u32) -> HttpTransport {
        HttpTransport::new(max_retries, Duration::from_millis(10)).unwrap()
    }

    #[tokio::test]
    async fn master_body_is_returned_verbatim() {
        let (url, mut rx, handle) =
            mock_server(vec![response("200 OK", &[], "http://10.0.0.9:7000/upload")]).await;

        let resp = transport(0).query_master(&url).await.unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, "http://10.0.0.9:7000/upload");
        assert!(rx.recv().await.unwrap().head.starts_with("GET "));

        handle.abort();
    }

    #[tokio::test]
    async fn init_sends_metadata_headers() {
        let (url, mut rx, handle) = mock_server(vec![response(
            "201 Created",
            &[("ID", "t-77"), ("Max-Request-Size", "2048")],
            "",
        )])
        .await;

        let req = InitRequest {
            filename: "net.onnx".into(),
            kind: FileKind::Model,
            sizes: GroupSizes::Model {
                model: 10,
                config: 20,
                code: 30,
            },
            associated_model_id: None,
        };
        let resp = transport(0).send_init(&url, &req).await.unwrap();
        assert_eq!(resp.status, 201);
        assert_eq!(resp.transfer_id.as_deref(), Some("t-77"));
        assert_eq!(resp.max_request_size.as_deref(), Some("2048"));

        let received = rx.recv().await.unwrap();
        assert!(received.head.starts_with("POST /upload"));
        assert_eq!(received.header("request-type"), Some("init"));
        assert_eq!(received.header("filename"), Some("net.onnx"));
        assert_eq!(received.header("filetype"), Some("model"));
        assert_eq!(received.header("filesize"), Some("60"));
        assert_eq!(received.header("model-size"), Some("10"));
        assert_eq!(received.header("config-size"), Some("20"));
        assert_eq!(received.header("code-size"), Some("30"));

        handle.abort();
    }

    #[tokio::test]
    async fn append_sends_body_and_reads_offset() {
        let (url, mut rx, handle) = mock_server(vec![response(
            "409 Conflict",
            &[("Offset", "120")],
            "offset mismatch",
        )])
        .await;

        let resp = transport(0)
            .send_append(&url, "t-1", 64, b"chunk-bytes".to_vec())
            .await
            .unwrap();
        assert_eq!(resp.status, 409);
        assert_eq!(resp.offset.as_deref(), Some("120"));
        assert_eq!(resp.body, "offset mismatch");

        let received = rx.recv().await.unwrap();
        assert_eq!(received.header("request-type"), Some("APPEND"));
        assert_eq!(received.header("id"), Some("t-1"));
        assert_eq!(received.header("offset"), Some("64"));
        assert_eq!(received.body, b"chunk-bytes");

        handle.abort();
    }

    #[tokio::test]
    async fn server_error_is_retried_at_transport_level() {
        let (url, mut rx, handle) = mock_server(vec![
            response("503 Service Unavailable", &[], "busy"),
            response("200 OK", &[], ""),
        ])
        .await;

        let resp = transport(1)
            .send_append(&url, "t-1", 0, b"abc".to_vec())
            .await
            .unwrap();
        assert_eq!(resp.status, 200);

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.body, b"abc");
        assert_eq!(second.body, b"abc");

        handle.abort();
    }

    #[tokio::test]
    async fn server_error_with_recovery_header_is_not_retried() {
        let (url, _rx, handle) = mock_server(vec![response(
            "500 Internal Server Error",
            &[("Max-Request-Size", "2")],
            "",
        )])
        .await;

        let resp = transport(3)
            .send_append(&url, "t-1", 0, b"abc".to_vec())
            .await
            .unwrap();
        assert_eq!(resp.status, 500);
        assert_eq!(resp.max_request_size.as_deref(), Some("2"));

        handle.abort();
    }

    #[tokio::test]
    async fn exhausted_server_errors_return_last_response() {
        let (url, _rx, handle) = mock_server(vec![
            response("502 Bad Gateway", &[], "down"),
            response("502 Bad Gateway", &[], "still down"),
        ])
        .await;

        let resp = transport(1).query_master(&url).await.unwrap();
        assert_eq!(resp.status, 502);
        assert_eq!(resp.body, "still down");

        handle.abort();
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (accepted_tx, mut accepted_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((mut stream, _)) = listener.accept().await {
                read_request(&mut stream).await;
                let _ = accepted_tx.send(());
                // Keep the connection open without answering.
                held.push(stream);
            }
        });

        let transport = HttpTransport::with_request_timeout(
            1,
            Duration::from_millis(10),
            Duration::from_millis(200),
        )
        .unwrap();
        let err = transport
            .query_master(&format!("http://127.0.0.1:{port}/"))
            .await
            .unwrap_err();
        match err {
            IngestError::Http(e) => assert!(e.is_timeout()),
            other => panic!("unexpected error: {other}"),
        }
        // The timed-out request was retried once.
        accepted_rx.recv().await.unwrap();
        accepted_rx.recv().await.unwrap();

        handle.abort();
    }

    #[tokio::test]
    async fn unreachable_host_is_an_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = transport(0)
            .query_master(&format!("http://127.0.0.1:{port}/"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Http(_)));
    }
}
