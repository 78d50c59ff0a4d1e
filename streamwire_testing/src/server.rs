//! Loopback HTTP/1.1 server that pushes scripted chunked responses.
//!
//! Every accepted connection consumes the next [`ServedResponse`]. The
//! request head and body are recorded for assertions. Connections beyond
//! the script are closed without a reply.

use std::{
    collections::VecDeque,
    io,
    net::SocketAddr,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use bytes::Bytes;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};

use crate::scripted::reason_phrase;

#[derive(Clone, Debug)]
enum Part {
    Chunk(Bytes),
    Pause(Duration),
}

/// One scripted HTTP response.
#[derive(Clone, Debug)]
pub struct ServedResponse {
    status: u16,
    headers: Vec<(String, String)>,
    parts: Vec<Part>,
    hold_open: bool,
}

impl ServedResponse {
    /// A chunked response with `status`.
    #[must_use]
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            parts: Vec::new(),
            hold_open: false,
        }
    }

    /// Add a response header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Send `chunk` as one HTTP chunk.
    #[must_use]
    pub fn chunk(mut self, chunk: impl Into<Bytes>) -> Self {
        self.parts.push(Part::Chunk(chunk.into()));
        self
    }

    /// Wait before sending the next part.
    #[must_use]
    pub fn pause(mut self, duration: Duration) -> Self {
        self.parts.push(Part::Pause(duration));
        self
    }

    /// Keep the connection open without sending anything after the last
    /// part, until the client goes away.
    #[must_use]
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }
}

/// A request as the server received it.
#[derive(Clone, Debug, Default)]
pub struct ReceivedRequest {
    /// Request method.
    pub method: String,
    /// Request target including any query string.
    pub target: String,
    /// Header name and value pairs in arrival order.
    pub headers: Vec<(String, String)>,
    /// Request body, if any.
    pub body: String,
}

impl ReceivedRequest {
    /// First header named `name`, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

type Script = Arc<Mutex<VecDeque<ServedResponse>>>;
type Received = Arc<Mutex<Vec<ReceivedRequest>>>;

/// Handle to a running server. The server stops when this is dropped.
pub struct StreamServer {
    addr: SocketAddr,
    received: Received,
    task: JoinHandle<()>,
}

impl StreamServer {
    /// Bind to an ephemeral loopback port and start serving `responses`.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start(responses: impl IntoIterator<Item = ServedResponse>) -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let script: Script = Arc::new(Mutex::new(responses.into_iter().collect()));
        let received: Received = Arc::default();

        let task = tokio::spawn(accept_loop(listener, script, Arc::clone(&received)));
        Ok(Self {
            addr,
            received,
            task,
        })
    }

    /// Bound address.
    #[must_use]
    pub fn addr(&self) -> SocketAddr { self.addr }

    /// `http://` base URL of the server.
    #[must_use]
    pub fn base_url(&self) -> String { format!("http://{}", self.addr) }

    /// URL for `path` on this server.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url(), path.trim_start_matches('/'))
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<ReceivedRequest> {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Drop for StreamServer {
    fn drop(&mut self) { self.task.abort(); }
}

async fn accept_loop(listener: TcpListener, script: Script, received: Received) {
    while let Ok((stream, _)) = listener.accept().await {
        let next = script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let received = Arc::clone(&received);
        tokio::spawn(async move {
            if let Err(err) = serve(stream, next, received).await {
                log::debug!("test server connection ended: {err}");
            }
        });
    }
}

async fn serve(
    mut stream: TcpStream,
    response: Option<ServedResponse>,
    received: Received,
) -> io::Result<()> {
    let request = read_request(&mut stream).await?;
    received
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(request);
    let Some(response) = response else {
        return Ok(());
    };

    let mut head = format!(
        "HTTP/1.1 {} {}\r\nTransfer-Encoding: chunked\r\n",
        response.status,
        reason_phrase(response.status)
    );
    for (name, value) in &response.headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str("\r\n");
    stream.write_all(head.as_bytes()).await?;
    stream.flush().await?;

    for part in response.parts {
        match part {
            Part::Chunk(chunk) if chunk.is_empty() => {}
            Part::Chunk(chunk) => {
                stream
                    .write_all(format!("{:x}\r\n", chunk.len()).as_bytes())
                    .await?;
                stream.write_all(&chunk).await?;
                stream.write_all(b"\r\n").await?;
                stream.flush().await?;
            }
            Part::Pause(duration) => tokio::time::sleep(duration).await,
        }
    }

    if response.hold_open {
        let mut sink = [0_u8; 64];
        while stream.read(&mut sink).await? > 0 {}
        return Ok(());
    }
    stream.write_all(b"0\r\n\r\n").await?;
    stream.shutdown().await
}

async fn read_request(stream: &mut TcpStream) -> io::Result<ReceivedRequest> {
    let mut buf = Vec::with_capacity(1024);
    let head_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos;
        }
        let mut chunk = [0_u8; 1024];
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        buf.extend_from_slice(&chunk[..read]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_owned();
    let target = request_line.next().unwrap_or_default().to_owned();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_owned(), value.trim().to_owned()))
        .collect();

    let length = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < length {
        let mut chunk = [0_u8; 1024];
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..read]);
    }

    Ok(ReceivedRequest {
        method,
        target,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
