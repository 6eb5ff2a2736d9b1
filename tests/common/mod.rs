/*!
 * Common test utilities for the quillsync test suite
 */

#![allow(dead_code)]

use anyhow::Result;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use quillsync::database::Repository;
use quillsync::glossary::GlossaryStore;
use quillsync::providers::models::Clock;

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// In-memory SQLite repository and a glossary store on top of it
pub fn memory_store() -> (Arc<Repository>, GlossaryStore) {
    let repository = Arc::new(Repository::new_in_memory().expect("in-memory database"));
    let store = GlossaryStore::new(repository.clone());
    (repository, store)
}

/// Three chapters of Chinese text
pub fn three_chapter_text() -> String {
    "第1章 开始\n林动走进了山谷。\n\n第2章 修炼\n他开始修炼元婴期的功法。\n\n第3章 结束\n魔法很强。".to_string()
}

/// Clock the test moves by hand
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn at(millis: i64) -> Arc<Self> {
        Arc::new(Self {
            now: AtomicI64::new(millis),
        })
    }

    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// A canned HTTP response
#[derive(Debug, Clone)]
pub struct CannedResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
    pub delay: Duration,
    /// When set, the body is written in these pieces with `gap` between them
    pub parts: Vec<String>,
    pub gap: Duration,
}

impl CannedResponse {
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.into(),
            delay: Duration::ZERO,
            parts: Vec::new(),
            gap: Duration::ZERO,
        }
    }

    pub fn event_stream(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: "text/event-stream",
            body: body.into(),
            delay: Duration::ZERO,
            parts: Vec::new(),
            gap: Duration::ZERO,
        }
    }

    /// Event stream whose events trickle out with a pause before each one after the first
    pub fn paced_event_stream(events: &[&str], gap: Duration) -> Self {
        let mut response = Self::event_stream(events.concat());
        response.parts = events.iter().map(|e| e.to_string()).collect();
        response.gap = gap;
        response
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Minimal HTTP/1.1 server that answers every request with one response
pub struct MockHttpServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockHttpServer {
    pub async fn start(response: CannedResponse) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind test server");
        let address = listener.local_addr().expect("local address");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let response = response.clone();
                let recorded = recorded.clone();
                tokio::spawn(async move {
                    let request = read_request(&mut socket).await;
                    recorded.lock().push(request);

                    if !response.delay.is_zero() {
                        tokio::time::sleep(response.delay).await;
                    }

                    let head = format!(
                        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        response.status,
                        reason_phrase(response.status),
                        response.content_type,
                        response.body.len()
                    );
                    let _ = socket.write_all(head.as_bytes()).await;
                    if response.parts.is_empty() {
                        let _ = socket.write_all(response.body.as_bytes()).await;
                    } else {
                        for (index, part) in response.parts.iter().enumerate() {
                            if index > 0 {
                                tokio::time::sleep(response.gap).await;
                            }
                            let _ = socket.write_all(part.as_bytes()).await;
                            let _ = socket.flush().await;
                        }
                    }
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self {
            base_url: format!("http://{}", address),
            requests,
        }
    }

    /// Raw text of every request received so far
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut data = Vec::new();
    let mut buffer = [0u8; 4096];

    loop {
        let read = match socket.read(&mut buffer).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        data.extend_from_slice(&buffer[..read]);

        let text = String::from_utf8_lossy(&data);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if data.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }

    String::from_utf8_lossy(&data).into_owned()
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}
