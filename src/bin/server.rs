//! HTTP server for tabula-qa
//! Minimal HTTP/1.1 handling on top of tokio
//!
//! Routes:
//! - GET  /api/health
//! - POST /upload  (CSV body, optional `?filename=`) -> session id and columns
//! - POST /ask     ({"session_id", "question"})      -> answer and history

use serde::Deserialize;
use std::sync::Arc;
use tabula_qa::config::EngineConfig;
use tabula_qa::dataset::read_csv_bytes;
use tabula_qa::session::SessionStore;
use tabula_qa::{QaError, QueryAssistant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const MAX_REQUEST_BYTES: usize = 64 * 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = EngineConfig::from_env()?;
    let store = Arc::new(SessionStore::new(QueryAssistant::from_config(&config)));

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("Server listening on {}", config.bind_addr);

    loop {
        let (stream, addr) = listener.accept().await?;
        info!("New connection from: {}", addr);
        tokio::spawn(handle_connection(stream, Arc::clone(&store)));
    }
}

#[derive(Debug)]
struct Request {
    method: String,
    path: String,
    query: String,
    body: Vec<u8>,
}

#[derive(Deserialize)]
struct AskPayload {
    session_id: Option<String>,
    question: Option<String>,
}

async fn handle_connection(mut stream: TcpStream, store: Arc<SessionStore>) {
    let response = match read_request(&mut stream).await {
        Ok(Some(request)) => handle_request(&request, &store),
        Ok(None) => create_response(400, "Bad Request", r#"{"detail":"Malformed request"}"#),
        Err(e) => {
            error!("Failed to read from stream: {}", e);
            return;
        }
    };

    if let Err(e) = stream.write_all(response.as_bytes()).await {
        error!("Failed to write response: {}", e);
    }
}

/// Read the head, then as many body bytes as Content-Length announces.
async fn read_request(stream: &mut TcpStream) -> std::io::Result<Option<Request>> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 8192];

    let head_end = loop {
        if let Some(pos) = find_head_end(&buffer) {
            break pos;
        }
        let size = stream.read(&mut chunk).await?;
        if size == 0 || buffer.len() > MAX_REQUEST_BYTES {
            return Ok(None);
        }
        buffer.extend_from_slice(&chunk[..size]);
    };

    let head = String::from_utf8_lossy(&buffer[..head_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    if content_length > MAX_REQUEST_BYTES {
        return Ok(None);
    }

    let body_start = head_end + 4;
    while buffer.len() < body_start + content_length {
        let size = stream.read(&mut chunk).await?;
        if size == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..size]);
    }
    let body_end = buffer.len().min(body_start + content_length);

    Ok(parse_head(&head).map(|(method, path, query)| Request {
        method,
        path,
        query,
        body: buffer[body_start..body_end].to_vec(),
    }))
}

fn find_head_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|window| window == b"\r\n\r\n")
}

fn parse_head(head: &str) -> Option<(String, String, String)> {
    let request_line = head.lines().next()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?;

    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    let mut path = path.trim_end_matches('/').to_string();
    if path.is_empty() {
        path = "/".to_string();
    }
    Some((method, path, query.to_string()))
}

fn handle_request(request: &Request, store: &SessionStore) -> String {
    info!("Request: {} {}", request.method, request.path);

    match (request.method.as_str(), request.path.as_str()) {
        ("OPTIONS", _) => create_response(204, "No Content", ""),
        ("GET", "/api/health") => {
            create_response(200, "OK", r#"{"status":"ok","service":"tabula-qa"}"#)
        }
        ("POST", "/upload") => handle_upload(request, store),
        ("POST", "/ask") => handle_ask(request, store),
        _ => create_response(404, "Not Found", r#"{"detail":"Not Found"}"#),
    }
}

fn handle_upload(request: &Request, store: &SessionStore) -> String {
    let filename = query_param(&request.query, "filename").unwrap_or_else(|| "upload.csv".to_string());
    if !filename.to_lowercase().ends_with(".csv") {
        return error_response(400, "Bad Request", "Apenas arquivos .csv são suportados");
    }
    if request.body.is_empty() {
        return error_response(400, "Bad Request", "Arquivo vazio");
    }

    let dataset = match read_csv_bytes(&request.body) {
        Ok(dataset) => dataset,
        Err(e) => {
            warn!("Rejected upload {}: {}", filename, e);
            return error_response(400, "Bad Request", &format!("Não foi possível ler o arquivo: {}", e));
        }
    };

    let columns = dataset.columns();
    let session_id = store.insert(dataset);
    json_response(
        200,
        "OK",
        &serde_json::json!({
            "session_id": session_id,
            "message": format!("Arquivo {} recebido com sucesso", filename),
            "columns": columns,
        }),
    )
}

fn handle_ask(request: &Request, store: &SessionStore) -> String {
    let payload: AskPayload = match serde_json::from_slice(&request.body) {
        Ok(payload) => payload,
        Err(_) => AskPayload {
            session_id: None,
            question: None,
        },
    };

    let (Some(session_id), Some(question)) = (
        payload.session_id.filter(|s| !s.is_empty()),
        payload.question.filter(|q| !q.is_empty()),
    ) else {
        return error_response(400, "Bad Request", r#""session_id" e "question" são obrigatórios!"#);
    };

    let Ok(session_id) = Uuid::parse_str(&session_id) else {
        return error_response(404, "Not Found", "Sessão não encontrada");
    };

    match store.ask(&session_id, &question) {
        Ok((answer, history)) => json_response(
            200,
            "OK",
            &serde_json::json!({ "answer": answer, "history": history }),
        ),
        Err(QaError::SessionNotFound(_)) => error_response(404, "Not Found", "Sessão não encontrada"),
        Err(e) => error_response(500, "Internal Server Error", &e.to_string()),
    }
}

fn query_param(query: &str, name: &str) -> Option<String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

fn error_response(status: u16, status_text: &str, detail: &str) -> String {
    json_response(status, status_text, &serde_json::json!({ "detail": detail }))
}

fn json_response(status: u16, status_text: &str, body: &serde_json::Value) -> String {
    let body = serde_json::to_string(body)
        .unwrap_or_else(|_| r#"{"detail":"Failed to serialize response"}"#.to_string());
    create_response(status, status_text, &body)
}

fn create_response(status: u16, status_text: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: application/json\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
         Access-Control-Allow-Headers: *\r\n\
         Access-Control-Allow-Credentials: true\r\n\
         Content-Length: {}\r\n\
         \r\n\
         {}",
        status,
        status_text,
        body.len(),
        body
    )
}
