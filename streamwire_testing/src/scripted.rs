//! In-memory [`Transport`] that replays scripted responses.
//!
//! Each call to `perform` consumes the next [`Attempt`]. Header lines and
//! body chunks are pushed into the sink in the order they were scripted, and
//! the sink's [`Flow::Abort`] is honoured the way a real transport would.

use std::{collections::VecDeque, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use streamwire::transport::{
    Flow,
    PreparedRequest,
    ResponseSink,
    Transport,
    TransportError,
    TransportErrorKind,
};

#[derive(Clone, Debug)]
enum Event {
    Header(String),
    Chunk(Bytes),
    Pause(Duration),
}

/// One scripted connection attempt.
#[derive(Clone, Debug, Default)]
pub struct Attempt {
    status: Option<u16>,
    events: Vec<Event>,
    error: Option<TransportError>,
}

impl Attempt {
    /// A response with `status`; the status line is sent first.
    #[must_use]
    pub fn ok(status: u16) -> Self {
        Self {
            status: Some(status),
            events: vec![Event::Header(format!(
                "HTTP/1.1 {status} {}",
                reason_phrase(status)
            ))],
            error: None,
        }
    }

    /// A connection that fails before any response arrives.
    #[must_use]
    pub fn refused() -> Self {
        Self::default().fail(TransportErrorKind::CouldNotConnect)
    }

    /// Add a header line, such as `Connection: close`.
    #[must_use]
    pub fn header(mut self, line: impl Into<String>) -> Self {
        self.events.push(Event::Header(line.into()));
        self
    }

    /// Add a body chunk.
    #[must_use]
    pub fn chunk(mut self, chunk: impl Into<Bytes>) -> Self {
        self.events.push(Event::Chunk(chunk.into()));
        self
    }

    /// Sleep between events. Pairs well with paused tokio time.
    #[must_use]
    pub fn pause(mut self, duration: Duration) -> Self {
        self.events.push(Event::Pause(duration));
        self
    }

    /// End the attempt with a transport error of `kind` once every event
    /// has been delivered.
    #[must_use]
    pub fn fail(self, kind: TransportErrorKind) -> Self {
        self.fail_with(TransportError::new(kind, "scripted failure"))
    }

    /// End the attempt with `error` once every event has been delivered.
    #[must_use]
    pub fn fail_with(mut self, error: TransportError) -> Self {
        self.error = Some(error);
        self
    }
}

/// Replays [`Attempt`]s in order and records every request it receives.
///
/// Once the script runs out, further attempts fail to connect.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    attempts: VecDeque<Attempt>,
    requests: Vec<PreparedRequest>,
    status: Option<u16>,
}

impl ScriptedTransport {
    /// Script the given attempts.
    #[must_use]
    pub fn new(attempts: impl IntoIterator<Item = Attempt>) -> Self {
        Self {
            attempts: attempts.into_iter().collect(),
            requests: Vec::new(),
            status: None,
        }
    }

    /// Requests performed so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> &[PreparedRequest] { &self.requests }

    /// Attempts not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize { self.attempts.len() }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn perform(
        &mut self,
        request: &PreparedRequest,
        sink: &mut dyn ResponseSink,
    ) -> Result<(), TransportError> {
        self.requests.push(request.clone());
        self.status = None;
        let Some(attempt) = self.attempts.pop_front() else {
            return Err(TransportError::new(
                TransportErrorKind::CouldNotConnect,
                "script exhausted",
            ));
        };
        self.status = attempt.status;

        for event in attempt.events {
            let flow = match event {
                Event::Header(line) => sink.on_header(&line),
                Event::Chunk(chunk) => sink.on_data(&chunk),
                Event::Pause(duration) => {
                    tokio::time::sleep(duration).await;
                    Flow::Continue
                }
            };
            if flow == Flow::Abort {
                return Err(TransportError::write_aborted());
            }
        }
        attempt.error.map_or(Ok(()), Err)
    }

    fn final_status(&self) -> Option<u16> { self.status }
}

/// Reason phrase used in synthesized status lines.
#[must_use]
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        406 => "Not Acceptable",
        420 => "Enhance Your Calm",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unknown",
    }
}
