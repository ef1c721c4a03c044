//! Throwaway HTTP/1.1 server writing scripted chunked responses.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone)]
pub enum Step {
    Chunk(Vec<u8>),
    Pause(Duration),
}

/// How the response body ends.
#[derive(Debug, Clone, Copy)]
pub enum End {
    /// Terminating zero-length chunk.
    Finish,
    /// Drop the socket mid-body.
    Abort,
    /// Keep the connection open until the client goes away.
    Hold,
}

#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub content_type: Option<String>,
    pub steps: Vec<Step>,
    pub end: End,
}

impl Reply {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            content_type: None,
            steps: Vec::new(),
            end: End::Finish,
        }
    }

    pub fn text_stream(chunks: &[&[u8]]) -> Self {
        Self::new(200)
            .content_type("text/plain; charset=utf-8")
            .chunks(chunks)
    }

    pub fn multipart(boundary: &str, chunks: &[&[u8]]) -> Self {
        Self::new(200)
            .content_type(&format!("multipart/x-mixed-replace; boundary={boundary}"))
            .chunks(chunks)
    }

    pub fn json(status: u16, body: &str) -> Self {
        Self::new(status)
            .content_type("application/json")
            .chunks(&[body.as_bytes()])
    }

    pub fn content_type(mut self, value: &str) -> Self {
        self.content_type = Some(value.to_string());
        self
    }

    pub fn chunks(mut self, chunks: &[&[u8]]) -> Self {
        self.steps
            .extend(chunks.iter().map(|chunk| Step::Chunk(chunk.to_vec())));
        self
    }

    pub fn pause(mut self, duration: Duration) -> Self {
        self.steps.push(Step::Pause(duration));
        self
    }

    pub fn end(mut self, end: End) -> Self {
        self.end = end;
        self
    }
}

/// A received request: head text and body bytes.
#[derive(Debug, Clone)]
pub struct Received {
    pub head: String,
    pub body: Vec<u8>,
}

impl Received {
    pub fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim())
        })
    }
}

pub struct TestServer {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<Received>>>,
    disconnects: Arc<AtomicUsize>,
}

impl TestServer {
    /// Serve `reply` to every connection.
    pub async fn start(reply: Reply) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let addr = listener.local_addr().expect("listener should have an address");
        let received = Arc::new(Mutex::new(Vec::new()));
        let disconnects = Arc::new(AtomicUsize::new(0));

        let seen = Arc::clone(&received);
        let gone = Arc::clone(&disconnects);
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let reply = reply.clone();
                let seen = Arc::clone(&seen);
                let gone = Arc::clone(&gone);
                tokio::spawn(async move {
                    let _ = handle(socket, reply, seen).await;
                    gone.fetch_add(1, Ordering::SeqCst);
                });
            }
        });

        Self {
            addr,
            received,
            disconnects,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/api/v1", self.addr)
    }

    pub fn received(&self) -> Vec<Received> {
        self.received.lock().expect("lock").clone()
    }

    /// Wait until `count` connections have finished, or panic after `timeout`.
    pub async fn wait_for_disconnects(&self, count: usize, timeout: Duration) {
        tokio::time::timeout(timeout, async {
            while self.disconnects.load(Ordering::SeqCst) < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("client should have closed the connection");
    }
}

async fn handle(
    mut socket: TcpStream,
    reply: Reply,
    seen: Arc<Mutex<Vec<Received>>>,
) -> std::io::Result<()> {
    let mut data = Vec::new();
    let mut buf = [0_u8; 4096];
    let head_end = loop {
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = socket.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        data.extend_from_slice(&buf[..n]);
    };

    let head = String::from_utf8_lossy(&data[..head_end]).into_owned();
    let mut request = Received {
        head,
        body: data[head_end..].to_vec(),
    };
    let content_length = request
        .header("content-length")
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(0);
    while request.body.len() < content_length {
        let n = socket.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        request.body.extend_from_slice(&buf[..n]);
    }
    seen.lock().expect("lock").push(request);

    let mut head = format!(
        "HTTP/1.1 {} {}\r\nconnection: close\r\ntransfer-encoding: chunked\r\n",
        reply.status,
        reason(reply.status)
    );
    if let Some(content_type) = &reply.content_type {
        head.push_str(&format!("content-type: {content_type}\r\n"));
    }
    head.push_str("\r\n");
    socket.write_all(head.as_bytes()).await?;
    socket.flush().await?;

    for step in &reply.steps {
        match step {
            Step::Chunk(bytes) => {
                socket
                    .write_all(format!("{:x}\r\n", bytes.len()).as_bytes())
                    .await?;
                socket.write_all(bytes).await?;
                socket.write_all(b"\r\n").await?;
                socket.flush().await?;
            }
            Step::Pause(duration) => tokio::time::sleep(*duration).await,
        }
    }

    match reply.end {
        End::Finish => {
            socket.write_all(b"0\r\n\r\n").await?;
            socket.flush().await?;
        }
        End::Abort => {}
        End::Hold => loop {
            if socket.read(&mut buf).await? == 0 {
                break;
            }
        },
    }
    Ok(())
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        412 => "Precondition Failed",
        500 => "Internal Server Error",
        _ => "Status",
    }
}
