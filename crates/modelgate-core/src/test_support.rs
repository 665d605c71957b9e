//! Helpers shared by the unit tests: token builders, scratch directories
//! and a canned-response HTTP server.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::auth::{CredentialBackend, MemoryBackend};

/// Build an unsigned JWT; `EXP` in `payload` is replaced by `exp`.
pub fn jwt(payload: &str, exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.replace("EXP", &exp.to_string()));
    format!("{header}.{body}.c2lnbmF0dXJl")
}

/// Fresh, not yet created, directory under the system temp dir
pub fn temp_dir(label: &str) -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    std::env::temp_dir().join(format!("modelgate-test-{}-{}-{}", label, std::process::id(), n))
}

/// One backend shared between several stores, standing in for
/// storage that outlives a process restart
pub struct SharedBackend(pub Arc<MemoryBackend>);

impl CredentialBackend for SharedBackend {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        self.0.get(key)
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.0.set(key, value)
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.0.remove(key)
    }
}

/// Shared backend whose writes or removals fail for chosen keys
#[derive(Clone)]
pub struct FlakyBackend {
    inner: Arc<MemoryBackend>,
    failing_sets: Arc<std::sync::Mutex<Vec<String>>>,
    failing_removes: Arc<std::sync::Mutex<Vec<String>>>,
}

impl FlakyBackend {
    pub fn new(inner: Arc<MemoryBackend>) -> Self {
        Self {
            inner,
            failing_sets: Arc::default(),
            failing_removes: Arc::default(),
        }
    }

    pub fn fail_set(&self, key: &str) {
        self.failing_sets.lock().unwrap().push(key.to_string());
    }

    pub fn fail_remove(&self, key: &str) {
        self.failing_removes.lock().unwrap().push(key.to_string());
    }

    fn fails(list: &std::sync::Mutex<Vec<String>>, key: &str) -> bool {
        list.lock().unwrap().iter().any(|k| k == key)
    }
}

impl CredentialBackend for FlakyBackend {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        if Self::fails(&self.failing_sets, key) {
            anyhow::bail!("disk full writing {}", key);
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        if Self::fails(&self.failing_removes, key) {
            anyhow::bail!("permission denied removing {}", key);
        }
        self.inner.remove(key)
    }
}

/// Value of a header in a raw request head, matched case-insensitively
pub fn header(request: &str, name: &str) -> Option<String> {
    request.lines().skip(1).find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim().to_string())
    })
}

pub struct Canned {
    status: u16,
    body: String,
}

impl Canned {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }
}

pub struct TestServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl TestServer {
    /// Raw requests received so far (head plus body)
    pub async fn requests(&self) -> Vec<String> {
        self.requests.lock().await.clone()
    }
}

/// Serve `responses` in order, one per connection, then stop answering.
pub async fn serve(responses: Vec<Canned>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let requests = Arc::new(Mutex::new(Vec::new()));
    let queue = Arc::new(Mutex::new(VecDeque::from(responses)));

    let recorded = requests.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let recorded = recorded.clone();
            let queue = queue.clone();
            tokio::spawn(async move {
                handle(stream, recorded, queue).await;
            });
        }
    });

    TestServer { base_url, requests }
}

async fn handle(
    mut stream: TcpStream,
    recorded: Arc<Mutex<Vec<String>>>,
    queue: Arc<Mutex<VecDeque<Canned>>>,
) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        let Ok(n) = stream.read(&mut chunk).await else {
            return;
        };
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let content_length = header(&head, "content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < head_end + content_length {
        let Ok(n) = stream.read(&mut chunk).await else {
            return;
        };
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    recorded
        .lock()
        .await
        .push(String::from_utf8_lossy(&buf).to_string());

    let Some(canned) = queue.lock().await.pop_front() else {
        return;
    };
    let response = format!(
        "HTTP/1.1 {} Canned\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        canned.status,
        canned.body.len(),
        canned.body
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

#[test]
fn test_header_lookup() {
    let head = "POST /login HTTP/1.1\r\nContent-Type: application/x-www-form-urlencoded\r\n\r\n";
    assert_eq!(
        header(head, "content-type").as_deref(),
        Some("application/x-www-form-urlencoded")
    );
    assert_eq!(header(head, "authorization"), None);
}
