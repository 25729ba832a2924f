//! Minimal hand-rolled HTTP server standing in for the R2 worker and the
//! queue manager in integration tests.
//!
//! One blocking listener, one thread per connection, headers and bodies
//! parsed by hand - the same shape as `ddm-core`'s range-serving test
//! server. Pulling in a full mock-HTTP crate for two endpoints this simple
//! wasn't worth the dependency.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use serde_json::{json, Value};

#[derive(Default)]
pub struct MockState {
    /// Every `node_job` document posted to the queue manager, in order.
    pub node_jobs: Vec<Value>,
    /// The `parts` array submitted at `mpu-complete`, if it happened.
    pub completed_parts: Option<Vec<Value>>,
    pub abort_count: u32,
    pub uploaded_parts: HashMap<u32, Vec<u8>>,
    pub single_uploads: Vec<Vec<u8>>,
    /// Canned `job_details` response body for download initialization.
    pub job_details: Option<Value>,
    /// Canned GET bodies keyed by request path (e.g. `/job-1/output/0001.png`).
    pub get_bodies: HashMap<String, Vec<u8>>,
}

pub struct MockRemote {
    pub base_url: String,
    pub state: Arc<Mutex<MockState>>,
}

impl MockRemote {
    pub fn set_job_details(&self, value: Value) {
        self.state.lock().expect("mock state lock poisoned").job_details = Some(value);
    }

    pub fn set_get_body(&self, path: impl Into<String>, body: Vec<u8>) {
        self.state
            .lock()
            .expect("mock state lock poisoned")
            .get_bodies
            .insert(path.into(), body);
    }

    pub fn node_jobs(&self) -> Vec<Value> {
        self.state.lock().expect("mock state lock poisoned").node_jobs.clone()
    }

    pub fn completed_parts(&self) -> Option<Vec<Value>> {
        self.state.lock().expect("mock state lock poisoned").completed_parts.clone()
    }

    pub fn abort_count(&self) -> u32 {
        self.state.lock().expect("mock state lock poisoned").abort_count
    }
}

/// Starts the mock server in a background thread. It runs until the process
/// exits - fine for short-lived test binaries.
pub fn start() -> MockRemote {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock remote");
    let port = listener.local_addr().expect("local addr").port();
    let state = Arc::new(Mutex::new(MockState::default()));

    let accept_state = Arc::clone(&state);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let state = Arc::clone(&accept_state);
            thread::spawn(move || handle(stream, &state));
        }
    });

    MockRemote {
        base_url: format!("http://127.0.0.1:{port}"),
        state,
    }
}

fn handle(mut stream: TcpStream, state: &Arc<Mutex<MockState>>) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(10)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(10)));

    let Some((method, path_and_query, body)) = read_request(&mut stream) else {
        return;
    };

    let (path, query) = path_and_query.split_once('?').unwrap_or((path_and_query.as_str(), ""));
    let params: HashMap<&str, &str> = query.split('&').filter_map(|kv| kv.split_once('=')).collect();

    if path == "/qm/uber_api" {
        handle_queue_manager(&mut stream, &body, state);
        return;
    }

    handle_r2(&mut stream, &method, path, &params, body, state);
}

fn handle_queue_manager(stream: &mut TcpStream, body: &[u8], state: &Arc<Mutex<MockState>>) {
    let Ok(envelope) = serde_json::from_slice::<Value>(body) else {
        write_bytes(stream, "400 Bad Request", "text/plain", b"bad json");
        return;
    };

    if let Some(job) = envelope.get("node_job") {
        state.lock().expect("mock state lock poisoned").node_jobs.push(job.clone());
        write_json(stream, "200 OK", &json!({ "node_job": { "status": "success", "body": {} } }));
        return;
    }

    if envelope.get("job_details").is_some() {
        let details = state
            .lock()
            .expect("mock state lock poisoned")
            .job_details
            .clone()
            .unwrap_or_else(|| json!({}));
        write_json(
            stream,
            "200 OK",
            &json!({ "job_details": { "status": "success", "body": details } }),
        );
        return;
    }

    write_bytes(stream, "400 Bad Request", "text/plain", b"unknown endpoint");
}

fn handle_r2(
    stream: &mut TcpStream,
    method: &str,
    path: &str,
    params: &HashMap<&str, &str>,
    body: Vec<u8>,
    state: &Arc<Mutex<MockState>>,
) {
    match (method, params.get("action").copied()) {
        ("POST", Some("mpu-create")) => {
            write_json(stream, "200 OK", &json!({ "uploadId": "mock-upload-id" }));
        }
        ("PUT", Some("mpu-uploadpart")) => {
            let part_number: u32 = params.get("partNumber").and_then(|p| p.parse().ok()).unwrap_or(0);
            state
                .lock()
                .expect("mock state lock poisoned")
                .uploaded_parts
                .insert(part_number, body);
            write_json(
                stream,
                "200 OK",
                &json!({ "partNumber": part_number, "etag": format!("etag-{part_number}") }),
            );
        }
        ("PUT", Some("single-upload")) => {
            state.lock().expect("mock state lock poisoned").single_uploads.push(body);
            write_json(stream, "200 OK", &json!({}));
        }
        ("POST", Some("mpu-complete")) => {
            let parsed: Value = serde_json::from_slice(&body).unwrap_or_default();
            let parts = parsed
                .get("parts")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            state.lock().expect("mock state lock poisoned").completed_parts = Some(parts);
            write_json(stream, "200 OK", &json!({}));
        }
        ("DELETE", Some("mpu-abort")) => {
            state.lock().expect("mock state lock poisoned").abort_count += 1;
            write_json(stream, "200 OK", &json!({}));
        }
        ("GET", Some("get")) => {
            let found = state
                .lock()
                .expect("mock state lock poisoned")
                .get_bodies
                .get(path)
                .cloned();
            match found {
                Some(contents) => write_bytes(stream, "200 OK", "application/octet-stream", &contents),
                None => write_bytes(stream, "404 Not Found", "text/plain", b"not found"),
            }
        }
        _ => write_bytes(stream, "400 Bad Request", "text/plain", b"unrecognized action"),
    }
}

/// Reads one HTTP/1.1 request off `stream`: method, raw path+query, and the
/// body (read out fully per `Content-Length`).
fn read_request(stream: &mut TcpStream) -> Option<(String, String, Vec<u8>)> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 16 * 1024];

    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let header_str = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = header_str.split("\r\n");
    let request_line = lines.next()?;
    let mut request_parts = request_line.split_whitespace();
    let method = request_parts.next()?.to_owned();
    let path_and_query = request_parts.next()?.to_owned();

    let mut content_length = 0usize;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }

    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);

    Some((method, path_and_query, body))
}

fn write_json(stream: &mut TcpStream, status: &str, value: &Value) {
    let body = serde_json::to_vec(value).unwrap_or_default();
    write_bytes(stream, status, "application/json", &body);
}

fn write_bytes(stream: &mut TcpStream, status: &str, content_type: &str, body: &[u8]) {
    let header = format!(
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(body);
}
