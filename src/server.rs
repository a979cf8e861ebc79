//! HTTP front end
//!
//! Minimal HTTP/1.1 handling on tokio's TCP listener: one task per
//! connection, one request per connection, all sharing one pipeline.

use crate::error::Result;
use crate::pipeline::{QaPipeline, INVALID_QUESTION};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn, Instrument};

const INDEX_HTML: &str = include_str!("../static/index.html");
const MAX_REQUEST_BYTES: usize = 64 * 1024;
const READ_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct AskRequest {
    #[serde(default)]
    question: String,
}

#[derive(Debug, Serialize)]
struct AskResponse<'a> {
    answer: &'a str,
}

/// A parsed request line, headers and body.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl HttpResponse {
    fn json(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: "application/json",
            body,
        }
    }

    fn html(body: &str) -> Self {
        Self {
            status: 200,
            content_type: "text/html; charset=utf-8",
            body: body.to_string(),
        }
    }

    pub fn to_http(&self) -> String {
        format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n\
             Connection: close\r\n\r\n{}",
            self.status,
            status_text(self.status),
            self.content_type,
            self.body.len(),
            self.body
        )
    }
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        413 => "Payload Too Large",
        _ => "Internal Server Error",
    }
}

/// Accept connections until the listener fails.
pub async fn serve(listener: TcpListener, pipeline: Arc<QaPipeline>) -> Result<()> {
    info!("Server listening on {}", listener.local_addr()?);

    loop {
        let (stream, addr) = listener.accept().await?;
        debug!("New connection from {}", addr);
        let pipeline = pipeline.clone();
        let span = tracing::info_span!("request", id = %uuid::Uuid::new_v4(), peer = %addr);
        tokio::spawn(handle_connection(stream, pipeline).instrument(span));
    }
}

async fn handle_connection(mut stream: TcpStream, pipeline: Arc<QaPipeline>) {
    let response = match read_request(&mut stream).await {
        Ok(Some(raw)) => match parse_request(&raw) {
            Some(request) => handle_request(&request, &pipeline).await,
            None => HttpResponse::json(400, r#"{"error":"Malformed request"}"#.to_string()),
        },
        Ok(None) => HttpResponse::json(413, r#"{"error":"Request too large"}"#.to_string()),
        Err(e) => {
            warn!("Failed to read from stream: {}", e);
            return;
        }
    };

    if let Err(e) = stream.write_all(response.to_http().as_bytes()).await {
        error!("Failed to write response: {}", e);
    }
}

/// Read headers plus `Content-Length` bytes of body. `None` if oversized.
async fn read_request(stream: &mut TcpStream) -> std::io::Result<Option<String>> {
    read_request_within(stream, READ_TIMEOUT).await
}

async fn read_request_within<R>(reader: &mut R, limit: Duration) -> std::io::Result<Option<String>>
where
    R: AsyncRead + Unpin,
{
    match tokio::time::timeout(limit, read_until_complete(reader)).await {
        Ok(result) => result,
        Err(_) => Err(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("request not complete after {:?}", limit),
        )),
    }
}

async fn read_until_complete<R>(reader: &mut R) -> std::io::Result<Option<String>>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let size = reader.read(&mut chunk).await?;
        if size == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..size]);
        if buffer.len() > MAX_REQUEST_BYTES {
            return Ok(None);
        }

        if let Some(header_end) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            let expected = content_length(&String::from_utf8_lossy(&buffer[..header_end]));
            if buffer.len() >= header_end + 4 + expected {
                break;
            }
        }
    }

    Ok(Some(String::from_utf8_lossy(&buffer).into_owned()))
}

fn content_length(head: &str) -> usize {
    head.lines()
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

pub fn parse_request(raw: &str) -> Option<HttpRequest> {
    let (head, body) = raw.split_once("\r\n\r\n").unwrap_or((raw, ""));
    let mut lines = head.lines();

    let mut parts = lines.next()?.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?;

    let without_query = target.split('?').next().unwrap_or(target);
    let trimmed = without_query.trim_end_matches('/');
    let path = if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    };

    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_string()))
        .collect();

    Some(HttpRequest {
        method,
        path,
        headers,
        body: body.to_string(),
    })
}

/// Trimmed question from an `/ask` body; `None` when blank or unparsable.
pub fn extract_question(body: &str) -> Option<String> {
    let request: AskRequest = serde_json::from_str(body.trim()).ok()?;
    let question = request.question.trim();
    if question.is_empty() {
        None
    } else {
        Some(question.to_string())
    }
}

fn answer_json(answer: &str) -> String {
    serde_json::to_string(&AskResponse { answer })
        .unwrap_or_else(|_| r#"{"error":"Failed to serialize response"}"#.to_string())
}

pub async fn handle_request(request: &HttpRequest, pipeline: &QaPipeline) -> HttpResponse {
    debug!("Request: {} {}", request.method, request.path);

    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/") => HttpResponse::html(INDEX_HTML),
        ("GET", "/api/health") => HttpResponse::json(200, r#"{"status":"ok"}"#.to_string()),
        ("POST", "/ask") => {
            let answer = match extract_question(&request.body) {
                Some(question) => {
                    info!("Question: {}", question);
                    pipeline.answer(&question).await
                }
                None => INVALID_QUESTION.to_string(),
            };
            HttpResponse::json(200, answer_json(&answer))
        }
        _ => HttpResponse::json(404, r#"{"error":"Not found"}"#.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result as QaResult;
    use crate::execution::PolarsStore;
    use crate::llm::{ChatRequest, TextGenerator};
    use crate::sql_generator::SqlGenerator;
    use crate::vocabulary::Vocabulary;
    use async_trait::async_trait;
    use polars::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLlm {
        reply: String,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextGenerator for CountingLlm {
        fn name(&self) -> &str {
            "counting"
        }

        async fn chat(&self, _request: &ChatRequest) -> QaResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    fn test_pipeline(reply: &str) -> (QaPipeline, Arc<CountingLlm>) {
        let llm = Arc::new(CountingLlm {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        });
        let holdings = df!["PortfolioName" => ["Fund A"], "PL_YTD" => [100i64]].unwrap();
        let trades = df!["PortfolioName" => ["Fund A"], "Quantity" => [10i64]].unwrap();
        let store = Arc::new(PolarsStore::from_frames(holdings, trades));
        let generator = SqlGenerator::new(Arc::new(Vocabulary::standard()), llm.clone());
        (QaPipeline::new(generator, store), llm)
    }

    fn post_ask(body: &str) -> HttpRequest {
        parse_request(&format!(
            "POST /ask HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\n\
             Content-Length: {}\r\n\r\n{}",
            body.len(),
            body
        ))
        .unwrap()
    }

    #[test]
    fn test_parse_request_normalizes_path() {
        let request =
            parse_request("GET /api/health/?verbose=1 HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
        assert_eq!(request.method, "GET");
        assert_eq!(request.path, "/api/health");
        assert_eq!(request.headers.get("host").map(String::as_str), Some("x"));

        assert_eq!(parse_request("GET / HTTP/1.1\r\n\r\n").unwrap().path, "/");
        assert!(parse_request("").is_none());
    }

    #[test]
    fn test_extract_question() {
        assert_eq!(
            extract_question(r#"{"question": "  profit by fund  "}"#),
            Some("profit by fund".to_string())
        );
        assert_eq!(extract_question(r#"{"question": "   "}"#), None);
        assert_eq!(extract_question(r#"{}"#), None);
        assert_eq!(extract_question("not json"), None);
    }

    #[test]
    fn test_content_length_header_is_case_insensitive() {
        assert_eq!(content_length("POST /ask HTTP/1.1\r\ncontent-LENGTH: 42"), 42);
        assert_eq!(content_length("GET / HTTP/1.1\r\nHost: x"), 0);
    }

    #[tokio::test]
    async fn test_short_body_times_out() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        client
            .write_all(b"POST /ask HTTP/1.1\r\nContent-Length: 100\r\n\r\n{\"question\"")
            .await
            .unwrap();

        let err = read_request_within(&mut server, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::TimedOut);
        drop(client);
    }

    #[tokio::test]
    async fn test_non_utf8_header_keeps_full_body() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        let mut raw = b"POST /ask HTTP/1.1\r\nX-Trace: \xff\xfe\xfd\r\n".to_vec();
        raw.extend_from_slice(b"Content-Length: 4\r\n\r\nabcd");
        client.write_all(&raw).await.unwrap();

        // The client stays open, so only the declared length can end the read.
        let raw = read_request_within(&mut server, Duration::from_secs(5))
            .await
            .unwrap()
            .unwrap();
        assert!(raw.ends_with("\r\n\r\nabcd"));
        drop(client);
    }

    #[tokio::test]
    async fn test_blank_question_does_not_reach_generator() {
        let (pipeline, llm) = test_pipeline("SELECT * FROM holdings");

        for body in [r#"{"question": ""}"#, r#"{"question": "   "}"#] {
            let response = handle_request(&post_ask(body), &pipeline).await;
            assert_eq!(response.status, 200);
            let json: serde_json::Value = serde_json::from_str(&response.body).unwrap();
            assert_eq!(json["answer"], INVALID_QUESTION);
        }
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ask_returns_rendered_answer() {
        let (pipeline, llm) = test_pipeline("SELECT PortfolioName, PL_YTD FROM holdings");

        let request = post_ask(r#"{"question": "profit by fund"}"#);
        let response = handle_request(&request, &pipeline).await;
        let json: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        let answer = json["answer"].as_str().unwrap();

        assert!(answer.starts_with("PortfolioName  PL_YTD"));
        assert!(answer.contains("Fund A"));
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_other_routes() {
        let (pipeline, _) = test_pipeline("NONE");

        let index = parse_request("GET / HTTP/1.1\r\n\r\n").unwrap();
        let response = handle_request(&index, &pipeline).await;
        assert_eq!(response.status, 200);
        assert!(response.content_type.starts_with("text/html"));

        let health = parse_request("GET /api/health HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(handle_request(&health, &pipeline).await.body, r#"{"status":"ok"}"#);

        let missing = parse_request("GET /nope HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(handle_request(&missing, &pipeline).await.status, 404);
    }

    #[tokio::test]
    async fn test_serve_over_tcp() {
        let (pipeline, _) = test_pipeline("NONE");
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, Arc::new(pipeline)));

        let mut client = TcpStream::connect(addr).await.unwrap();
        let body = r#"{"question": "anything"}"#;
        let request = format!(
            "POST /ask HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        client.write_all(request.as_bytes()).await.unwrap();

        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.ends_with(r#"{"answer":"Sorry can not find the answer"}"#));
    }
}
